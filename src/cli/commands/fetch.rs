//! CLI command for `candi fetch`
//!
//! Downloads every source the plan needs without building anything.

use anyhow::{Context, Result};
use serde_json::json;

use crate::cli::commands::plan::{plan_for, registry_for};
use crate::cli::output::{create_spinner, is_json, print_detail, print_info, print_json, print_success, print_warning};
use crate::cli::RunSettings;
use crate::core::fetch::{fetch_sources, FetchOptions, FetchResult};

/// Fetch the plan's sources into the context's source root
pub async fn fetch_plan_sources(settings: &RunSettings, force: bool) -> Result<FetchResult> {
    let registry = registry_for(settings);
    let plan = plan_for(settings);
    let ctx = settings.context();
    let options = FetchOptions {
        force,
        ..FetchOptions::default()
    };

    let spinner = create_spinner(&format!("Fetching sources for {} packages...", plan.len()));
    let result = fetch_sources(&plan, &registry, &ctx.source_root, &options)
        .await
        .context("Failed to fetch sources")?;
    spinner.finish_and_clear();
    Ok(result)
}

/// Execute the fetch command
pub async fn execute(settings: &RunSettings, force: bool) -> Result<()> {
    if settings.config.use_spack {
        print_warning("use_spack is ON; spack fetches its own sources");
        return Ok(());
    }

    let result = fetch_plan_sources(settings, force).await?;

    if is_json() {
        print_json(&json!({
            "status": if result.is_complete() { "success" } else { "error" },
            "fetched": result.fetched.iter().map(|f| json!({
                "name": f.name,
                "path": f.path,
            })).collect::<Vec<_>>(),
            "skipped": result.skipped,
            "failed": result.failed.iter().map(|(name, error)| json!({
                "name": name,
                "error": error,
            })).collect::<Vec<_>>(),
        }))?;
    } else {
        for source in &result.fetched {
            print_success(&format!("{} -> {}", source.name, source.path.display()));
        }
        if !result.skipped.is_empty() {
            print_info(&format!("Already fetched: {}", result.skipped.join(", ")));
        }
        for (name, error) in &result.failed {
            print_warning(&format!("{name}: {error}"));
        }
        print_detail(&format!(
            "{} fetched, {} skipped, {} failed",
            result.fetched.len(),
            result.skipped.len(),
            result.failed.len()
        ));
    }

    result.into_result()?;
    Ok(())
}
