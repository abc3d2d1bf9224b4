//! CLI command for `candi plan`
//!
//! Prints the ordered install plan without touching the host.

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::{is_json, print_detail, print_info, print_json, print_warning, status};
use crate::cli::RunSettings;
use crate::core::context::InstallContext;
use crate::core::descriptor::DescriptorRegistry;
use crate::core::plan::{build_plan, InstallPlan};
use crate::core::recipes::recipe;
use crate::core::spack::SpackDescriptor;

/// Registry for the configured install mode
pub fn registry_for(settings: &RunSettings) -> DescriptorRegistry {
    if settings.config.use_spack {
        DescriptorRegistry::spack_defaults()
    } else {
        DescriptorRegistry::source_defaults()
    }
}

/// Ordered plan for the configured packages
pub fn plan_for(settings: &RunSettings) -> InstallPlan {
    build_plan(
        &settings.config.requested_packages(),
        settings.config.dealii.cuda,
    )
}

#[derive(Debug, Serialize)]
struct PlanEntry {
    name: String,
    version: Option<String>,
    variants: Vec<String>,
    spec: String,
    /// `None` when spack or the system decides
    prefix: Option<PathBuf>,
    registered: bool,
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    mode: &'static str,
    prefix: PathBuf,
    jobs: usize,
    packages: Vec<PlanEntry>,
}

fn describe(
    plan: &InstallPlan,
    registry: &DescriptorRegistry,
    ctx: &InstallContext,
    spack: bool,
) -> Vec<PlanEntry> {
    plan.entries()
        .iter()
        .map(|request| {
            let (version, spec, prefix) = if spack {
                (
                    request.version.clone(),
                    SpackDescriptor::spec_for(request, ctx),
                    None,
                )
            } else if let Some(recipe) = recipe(&request.name) {
                let version = recipe.version_for(request).to_string();
                let prefix = ctx.prefix_for(&request.name, &version);
                (Some(version), request.spec(), Some(prefix))
            } else {
                (request.version.clone(), request.spec(), None)
            };
            PlanEntry {
                name: request.name.clone(),
                version,
                variants: request.variants.clone(),
                spec,
                prefix,
                registered: registry.contains(&request.name),
            }
        })
        .collect()
}

/// Execute the plan command
pub fn execute(settings: &RunSettings) -> Result<()> {
    let spack = settings.config.use_spack;
    let registry = registry_for(settings);
    let plan = plan_for(settings);
    let ctx = settings.context();
    let entries = describe(&plan, &registry, &ctx, spack);

    if is_json() {
        return print_json(&PlanOutput {
            mode: if spack { "spack" } else { "source" },
            prefix: settings.prefix.clone(),
            jobs: settings.jobs,
            packages: entries,
        });
    }

    print_info(&format!(
        "{} packages into {} ({} jobs, {})",
        entries.len(),
        settings.prefix.display(),
        settings.jobs,
        if spack { "spack" } else { "from source" }
    ));
    for (index, entry) in entries.iter().enumerate() {
        let location = match &entry.prefix {
            Some(prefix) => prefix.display().to_string(),
            None if spack => "managed by spack".to_string(),
            None => "provided by the system".to_string(),
        };
        let marker = if entry.registered { status::SUCCESS } else { status::ERROR };
        print_detail(&format!("{:>2}. {marker} {} -> {location}", index + 1, entry.spec));
    }

    let missing: Vec<&str> = entries
        .iter()
        .filter(|e| !e.registered)
        .map(|e| e.name.as_str())
        .collect();
    if !missing.is_empty() {
        print_warning(&format!("No installer for: {}", missing.join(", ")));
    }
    Ok(())
}
