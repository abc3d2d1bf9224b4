//! CLI command for `candi install`
//!
//! Source path: check the plan, pick the compiler, fetch every source, then
//! build package by package. Spack path: make the compiler known to spack,
//! then hand each package to `spack install`.

use anyhow::{Context, Result};
use serde_json::json;

use crate::cli::commands::fetch::fetch_plan_sources;
use crate::cli::commands::plan::{plan_for, registry_for};
use crate::cli::output::{
    create_build_bar, is_json, is_verbose, print_detail, print_info, print_json, print_success, status,
};
use crate::cli::RunSettings;
use crate::core::context::InstallContext;
use crate::core::sequencer::{PackageOutcome, Sequencer, SequencerEvent};
use crate::core::spack::{ensure_compiler, CompilerGate};
use crate::error::SequencerError;
use crate::infra::process::{SystemToolRunner, ToolRunner};
use crate::infra::toolchain::{detect_compiler, CompilerDetection};

/// Execute the install command
pub async fn execute(settings: &RunSettings) -> Result<()> {
    let registry = registry_for(settings);
    let plan = plan_for(settings);
    let tools = SystemToolRunner::new();
    let sequencer = Sequencer::new(&registry, &tools);

    sequencer.check(&plan)?;
    print_info(&format!(
        "Installing {} packages into {}",
        plan.len(),
        settings.prefix.display()
    ));

    let ctx = if settings.config.use_spack {
        prepare_spack(settings, &tools)?
    } else {
        let ctx = prepare_source(settings, &tools)?;
        let fetched = fetch_plan_sources(settings, false).await?.into_result()?;
        tracing::info!(
            "Sources ready: {} fetched, {} already present",
            fetched.fetched.len(),
            fetched.skipped.len()
        );
        ctx
    };

    let bar = create_build_bar(plan.len() as u64);
    let outcome = sequencer.execute_observed(&plan, &ctx, |event| match event {
        SequencerEvent::Starting {
            package,
            index,
            total,
        } => {
            if is_verbose() {
                bar.println(format!("{} [{index}/{total}] {package}", status::INFO));
            }
            bar.set_message(package.to_string());
        }
        SequencerEvent::Skipped { .. } | SequencerEvent::Finished { .. } => bar.inc(1),
    });
    let report = match outcome {
        Ok(report) => {
            bar.finish_and_clear();
            report
        }
        Err(e) => {
            bar.abandon();
            print_detail(&format!("Build logs are under {}", ctx.build_root.display()));
            return Err(e).context("Install stopped");
        }
    };

    if is_json() {
        return print_json(&json!({
            "status": "success",
            "prefix": settings.prefix,
            "installed": report.installed_count(),
            "already_present": report.present_count(),
            "packages": report.entries,
        }));
    }

    for entry in &report.entries {
        let glyph = match entry.outcome {
            PackageOutcome::Installed => status::SUCCESS,
            PackageOutcome::AlreadyPresent => status::SKIPPED,
        };
        print_detail(&format!("{glyph} {}", entry.location));
    }
    print_success(&format!(
        "{} installed, {} already present",
        report.installed_count(),
        report.present_count()
    ));
    if let Some(dealii) = report.location("dealii") {
        print_detail(&format!("Point DEAL_II_DIR at {}", dealii.prefix.display()));
    }
    Ok(())
}

/// Context for a source build, with the requested compiler located on the host
fn prepare_source(settings: &RunSettings, tools: &dyn ToolRunner) -> Result<InstallContext> {
    let ctx = settings.context();
    if settings.config.use_default_compiler {
        return Ok(ctx);
    }

    let compiler = &settings.config.compiler;
    match detect_compiler(compiler, tools) {
        CompilerDetection::Found(exes) => {
            print_info(&format!("Using {compiler} at {}", exes.cc.display()));
            Ok(ctx.with_explicit_compiler(Some(exes)))
        }
        CompilerDetection::NotFound { reason } => Err(SequencerError::CompilerUnavailable {
            compiler: compiler.to_string(),
            reason,
        }
        .into()),
    }
}

fn prepare_spack(settings: &RunSettings, tools: &dyn ToolRunner) -> Result<InstallContext> {
    let config = &settings.config;
    match ensure_compiler(
        &config.compiler,
        config.use_default_compiler,
        &settings.prefix,
        tools,
    )? {
        CompilerGate::Deferred => tracing::debug!("Leaving compiler choice to spack"),
        CompilerGate::Present => print_info(&format!("spack already knows {}", config.compiler)),
        CompilerGate::Installed { prefix } => print_success(&format!(
            "Installed {} at {}",
            config.compiler,
            prefix.display()
        )),
    }
    Ok(settings.context())
}
