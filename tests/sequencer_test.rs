//! Integration tests for install sequencing
//!
//! Runs real source recipes through the sequencer with a recording tool
//! runner, so no compiler or network is needed.

use std::fs;
use std::sync::Mutex;

use candi::core::context::InstallContext;
use candi::core::descriptor::DescriptorRegistry;
use candi::core::package::CompilerSpec;
use candi::core::package::PackageRequest;
use candi::core::plan::{build_plan, build_plan_from_names};
use candi::core::sequencer::{PackageOutcome, Sequencer};
use candi::error::SequencerError;
use candi::infra::process::{ToolError, ToolInvocation, ToolOutput, ToolRunner};
use tempfile::TempDir;

/// Records command lines; fails any whose program is `fail_program`
#[derive(Default)]
struct RecordingRunner {
    fail_program: Option<&'static str>,
    calls: Mutex<Vec<ToolInvocation>>,
}

impl RecordingRunner {
    fn failing(program: &'static str) -> Self {
        Self {
            fail_program: Some(program),
            ..Self::default()
        }
    }

    fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.program.clone())
            .collect()
    }

    fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }
}

impl ToolRunner for RecordingRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(invocation.clone());
        if self.fail_program == Some(invocation.program.as_str()) {
            return Ok(ToolOutput::failed(2));
        }
        Ok(ToolOutput::ok(""))
    }
}

fn context(root: &TempDir) -> InstallContext {
    InstallContext::new(root.path(), 4, CompilerSpec::new("gcc", "13.2.0"))
}

/// Put a placeholder archive where the fetch phase would have left it
fn seed_sources(ctx: &InstallContext, files: &[&str]) {
    fs::create_dir_all(&ctx.source_root).unwrap();
    for file in files {
        fs::write(ctx.source_root.join(file), b"archive").unwrap();
    }
}

#[test]
fn test_source_install_runs_tool_steps_and_stamps() {
    let root = TempDir::new().unwrap();
    let ctx = context(&root);
    seed_sources(&ctx, &["zlib-1.3.1.tar.gz", "gsl-2.8.tar.gz"]);

    let registry = DescriptorRegistry::source_defaults();
    let runner = RecordingRunner::default();
    let plan = build_plan_from_names(&["zlib", "gsl"], false);

    let report = Sequencer::new(&registry, &runner).execute(&plan, &ctx).unwrap();

    assert_eq!(report.installed_count(), 2);
    assert_eq!(
        runner.programs(),
        vec!["tar", "cmake", "make", "make", "tar", "./configure", "make", "make"]
    );
    let zlib = report.location("zlib").unwrap();
    assert_eq!(zlib.prefix, root.path().join("zlib-1.3.1"));
    let stamp = fs::read_to_string(zlib.prefix.join(".candi-installed")).unwrap();
    assert!(stamp.starts_with("zlib@1.3.1\ncompiler=default\n"));
}

#[test]
fn test_second_run_finds_everything_present() {
    let root = TempDir::new().unwrap();
    let ctx = context(&root);
    seed_sources(&ctx, &["zlib-1.3.1.tar.gz"]);

    let registry = DescriptorRegistry::source_defaults();
    let plan = build_plan_from_names(&["zlib"], false);

    let first = RecordingRunner::default();
    Sequencer::new(&registry, &first).execute(&plan, &ctx).unwrap();

    let second = RecordingRunner::default();
    let report = Sequencer::new(&registry, &second).execute(&plan, &ctx).unwrap();

    assert!(second.calls().is_empty());
    assert_eq!(report.entries[0].outcome, PackageOutcome::AlreadyPresent);
}

#[test]
fn test_changed_variants_reinstall() {
    let root = TempDir::new().unwrap();
    let ctx = context(&root);
    seed_sources(&ctx, &["gsl-2.8.tar.gz"]);
    fs::create_dir_all(ctx.source_root.join("dealii-9.6.0")).unwrap();

    let registry = DescriptorRegistry::source_defaults();
    let plain = build_plan(&[PackageRequest::new("dealii").with_version("9.6.0")], false);
    Sequencer::new(&registry, &RecordingRunner::default())
        .execute(&plain, &ctx)
        .unwrap();

    let reconfigured = build_plan(
        &[
            PackageRequest::new("gsl"),
            PackageRequest::new("dealii")
                .with_version("9.6.0")
                .with_variant("+gsl")
                .with_variant("+int64"),
        ],
        false,
    );
    let runner = RecordingRunner::default();
    let report = Sequencer::new(&registry, &runner)
        .execute(&reconfigured, &ctx)
        .unwrap();

    let dealii = report.entries.iter().find(|e| e.location.name == "dealii").unwrap();
    assert_eq!(dealii.outcome, PackageOutcome::Installed);
    let cmake = runner
        .calls()
        .into_iter()
        .rev()
        .find(|c| c.program == "cmake")
        .unwrap();
    assert!(cmake.args.contains(&"-DDEAL_II_WITH_64BIT_INDICES=ON".to_string()));
    assert!(cmake.args.iter().any(|a| a.starts_with("-DGSL_DIR=")));
}

#[test]
fn test_later_packages_see_earlier_prefixes() {
    let root = TempDir::new().unwrap();
    let ctx = context(&root);
    seed_sources(&ctx, &["zlib-1.3.1.tar.gz", "gsl-2.8.tar.gz"]);

    let registry = DescriptorRegistry::source_defaults();
    let runner = RecordingRunner::default();
    let plan = build_plan_from_names(&["zlib", "gsl"], false);
    Sequencer::new(&registry, &runner).execute(&plan, &ctx).unwrap();

    let gsl_configure = runner
        .calls()
        .into_iter()
        .find(|c| c.program == "./configure")
        .unwrap();
    let zlib_bin = root.path().join("zlib-1.3.1").join("bin");
    assert!(gsl_configure.env["PATH"].starts_with(&zlib_bin.display().to_string()));
}

#[test]
fn test_missing_sources_stop_the_run() {
    let root = TempDir::new().unwrap();
    let ctx = context(&root);

    let registry = DescriptorRegistry::source_defaults();
    let runner = RecordingRunner::default();
    let plan = build_plan_from_names(&["zlib"], false);

    let err = Sequencer::new(&registry, &runner).execute(&plan, &ctx).unwrap_err();

    assert_eq!(err.package(), Some("zlib"));
    assert!(err.to_string().contains("candi fetch"));
    assert!(runner.calls().is_empty());
}

#[test]
fn test_tool_failure_reports_package_and_status() {
    let root = TempDir::new().unwrap();
    let ctx = context(&root);
    seed_sources(&ctx, &["zlib-1.3.1.tar.gz", "gsl-2.8.tar.gz"]);

    let registry = DescriptorRegistry::source_defaults();
    let runner = RecordingRunner::failing("cmake");
    let plan = build_plan_from_names(&["zlib", "gsl"], false);

    let err = Sequencer::new(&registry, &runner).execute(&plan, &ctx).unwrap_err();

    match err {
        SequencerError::PackageFailed { package, source } => {
            assert_eq!(package, "zlib");
            assert_eq!(source.tool_status(), Some(2));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runner.programs(), vec!["tar", "cmake"]);
    assert!(!root.path().join("zlib-1.3.1").join(".candi-installed").exists());
}

#[test]
fn test_unknown_package_installs_nothing() {
    let root = TempDir::new().unwrap();
    let ctx = context(&root);
    seed_sources(&ctx, &["zlib-1.3.1.tar.gz"]);

    let registry = DescriptorRegistry::source_defaults();
    let runner = RecordingRunner::default();
    let plan = build_plan_from_names(&["zlib", "trilinos"], false);

    let err = Sequencer::new(&registry, &runner).execute(&plan, &ctx).unwrap_err();

    assert!(matches!(err, SequencerError::MissingDescriptor { ref package } if package == "trilinos"));
    assert!(runner.calls().is_empty());
}
