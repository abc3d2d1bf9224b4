//! Install context and per-package step state
//!
//! [`InstallContext`] holds everything that is fixed for one run: the
//! directory layout, job count, compiler and deal.II build options. It is
//! shared read-only by all descriptors.
//!
//! [`InstallStep`] is built fresh for every plan entry. It borrows the
//! context and owns the environment that one package's tools run with, so
//! nothing a descriptor sets can leak into the next package.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::config::{BuildType, Config};
use crate::core::descriptor::{DescriptorError, InstalledLocation};
use crate::core::package::{CompilerSpec, PackageRequest};
use crate::infra::process::{ToolInvocation, ToolOutput, ToolRunner};
use crate::infra::toolchain::CompilerExecutables;

/// Build options every descriptor may consult
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// CMake build type for deal.II
    pub build_type: BuildType,
    /// Compile with `-march=native`
    pub native_optimizations: bool,
    /// 64-bit global indices
    pub use_64bit_indices: bool,
    /// CUDA support through Kokkos
    pub cuda: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            build_type: BuildType::Release,
            native_optimizations: false,
            use_64bit_indices: false,
            cuda: false,
        }
    }
}

impl From<&Config> for BuildOptions {
    fn from(config: &Config) -> Self {
        Self {
            build_type: config.dealii.build_type,
            native_optimizations: config.dealii.native_optimizations,
            use_64bit_indices: config.dealii.use_64bit_indices,
            cuda: config.dealii.cuda,
        }
    }
}

/// Read-only state shared by every package install in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallContext {
    /// Packages install into `<install_root>/<name>-<version>`
    pub install_root: PathBuf,
    /// Intermediate build trees
    pub build_root: PathBuf,
    /// Downloaded archives and git checkouts
    pub source_root: PathBuf,
    /// Parallel build jobs handed to `make`
    pub jobs: usize,
    /// Compiler selecting every package's variant
    pub compiler: CompilerSpec,
    /// Defer to the default compiler instead of [`InstallContext::compiler`]
    pub use_default_compiler: bool,
    /// Compiler executables found on the host, when one was requested
    pub toolchain: Option<CompilerExecutables>,
    /// Feature switches
    pub options: BuildOptions,
}

impl InstallContext {
    /// Create a context rooted at `install_root`
    ///
    /// Sources go to `<install_root>/tmp/src` and build trees to
    /// `<install_root>/tmp/build`.
    pub fn new(install_root: impl Into<PathBuf>, jobs: usize, compiler: CompilerSpec) -> Self {
        let install_root = install_root.into();
        let tmp = install_root.join("tmp");
        Self {
            build_root: tmp.join("build"),
            source_root: tmp.join("src"),
            install_root,
            jobs,
            compiler,
            use_default_compiler: true,
            toolchain: None,
            options: BuildOptions::default(),
        }
    }

    /// Set the build options
    #[must_use]
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Use the configured compiler instead of the default one
    #[must_use]
    pub fn with_explicit_compiler(mut self, toolchain: Option<CompilerExecutables>) -> Self {
        self.use_default_compiler = false;
        self.toolchain = toolchain;
        self
    }

    /// Install prefix of a package version
    pub fn prefix_for(&self, name: &str, version: &str) -> PathBuf {
        self.install_root.join(format!("{name}-{version}"))
    }

    /// Build tree of a package version
    pub fn build_dir_for(&self, name: &str, version: &str) -> PathBuf {
        self.build_root.join(format!("{name}-{version}"))
    }

    /// Environment every tool in the run starts from
    pub fn env_map(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("JOBS".to_string(), self.jobs.to_string());
        env.insert("MAKEFLAGS".to_string(), format!("-j{}", self.jobs));

        if let Some(toolchain) = &self.toolchain {
            env.insert("CC".to_string(), toolchain.cc.display().to_string());
            env.insert("CXX".to_string(), toolchain.cxx.display().to_string());
            if let Some(fc) = &toolchain.fc {
                env.insert("FC".to_string(), fc.display().to_string());
                env.insert("F77".to_string(), fc.display().to_string());
            }
        }

        env
    }
}

/// State for installing one plan entry
///
/// Created by the sequencer right before a descriptor runs and dropped right
/// after it returns.
pub struct InstallStep<'a> {
    /// Run-wide context
    pub ctx: &'a InstallContext,
    /// The plan entry being installed
    pub request: &'a PackageRequest,
    /// Packages installed earlier in this run (or found already present), in plan order
    pub installed: &'a [InstalledLocation],
    /// External tool runner
    pub tools: &'a dyn ToolRunner,
    /// Environment for this package's tools only
    pub env: BTreeMap<String, String>,
}

impl<'a> InstallStep<'a> {
    /// Build a fresh step
    ///
    /// Earlier installs are put on `PATH`, `LD_LIBRARY_PATH` and
    /// `CMAKE_PREFIX_PATH` in install order so configure scripts find them.
    pub fn new(
        ctx: &'a InstallContext,
        request: &'a PackageRequest,
        installed: &'a [InstalledLocation],
        tools: &'a dyn ToolRunner,
    ) -> Self {
        let mut env = ctx.env_map();

        if !installed.is_empty() {
            prepend_paths(&mut env, "PATH", installed.iter().map(InstalledLocation::bin_dir));
            prepend_paths(
                &mut env,
                "LD_LIBRARY_PATH",
                installed.iter().map(InstalledLocation::lib_dir),
            );
            prepend_paths(
                &mut env,
                "CMAKE_PREFIX_PATH",
                installed.iter().map(|loc| loc.prefix.clone()),
            );
        }

        Self {
            ctx,
            request,
            installed,
            tools,
            env,
        }
    }

    /// Requested version, or `default` when the request does not pin one
    pub fn version_or<'b>(&'b self, default: &'b str) -> &'b str {
        self.request.version.as_deref().unwrap_or(default)
    }

    /// Location of a package installed earlier in the run
    pub fn location(&self, name: &str) -> Option<&InstalledLocation> {
        self.installed.iter().find(|loc| loc.name == name)
    }

    /// Run a tool as part of `step`, failing on a non-zero exit
    pub fn run(&self, step: &str, invocation: ToolInvocation) -> Result<ToolOutput, DescriptorError> {
        let invocation = invocation.envs(&self.env);
        tracing::debug!("[{}] {step}: {}", self.request.name, invocation.command_line());
        self.tools
            .run_checked(&invocation)
            .map_err(|source| DescriptorError::Tool {
                step: step.to_string(),
                source,
            })
    }

    /// Run a query tool; a non-zero exit is reported, not raised
    pub fn query(&self, invocation: ToolInvocation) -> Option<ToolOutput> {
        let invocation = invocation.envs(&self.env);
        match self.tools.run(&invocation) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::debug!("Query '{}' failed: {e}", invocation.command_line());
                None
            }
        }
    }
}

fn prepend_paths(
    env: &mut BTreeMap<String, String>,
    key: &str,
    paths: impl Iterator<Item = PathBuf>,
) {
    let mut parts: Vec<String> = paths.map(|p| p.display().to_string()).collect();
    let existing = env
        .get(key)
        .cloned()
        .or_else(|| std::env::var(key).ok())
        .filter(|v| !v.is_empty());
    if let Some(existing) = existing {
        parts.push(existing);
    }
    env.insert(key.to_string(), parts.join(":"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedRunner;

    fn context() -> InstallContext {
        InstallContext::new("/opt/candi", 8, CompilerSpec::new("gcc", "13.2.0"))
    }

    #[test]
    fn test_layout_under_install_root() {
        let ctx = context();
        assert_eq!(ctx.source_root, PathBuf::from("/opt/candi/tmp/src"));
        assert_eq!(ctx.build_root, PathBuf::from("/opt/candi/tmp/build"));
        assert_eq!(
            ctx.prefix_for("p4est", "2.8.6"),
            PathBuf::from("/opt/candi/p4est-2.8.6")
        );
        assert_eq!(
            ctx.build_dir_for("p4est", "2.8.6"),
            PathBuf::from("/opt/candi/tmp/build/p4est-2.8.6")
        );
    }

    #[test]
    fn test_env_map_without_toolchain() {
        let env = context().env_map();
        assert_eq!(env.get("JOBS").unwrap(), "8");
        assert_eq!(env.get("MAKEFLAGS").unwrap(), "-j8");
        assert!(!env.contains_key("CC"));
    }

    #[test]
    fn test_env_map_with_toolchain() {
        let ctx = context().with_explicit_compiler(Some(CompilerExecutables {
            cc: PathBuf::from("/usr/bin/gcc-13"),
            cxx: PathBuf::from("/usr/bin/g++-13"),
            fc: Some(PathBuf::from("/usr/bin/gfortran-13")),
        }));
        let env = ctx.env_map();
        assert!(!ctx.use_default_compiler);
        assert_eq!(env.get("CC").unwrap(), "/usr/bin/gcc-13");
        assert_eq!(env.get("CXX").unwrap(), "/usr/bin/g++-13");
        assert_eq!(env.get("FC").unwrap(), "/usr/bin/gfortran-13");
    }

    #[test]
    fn test_step_puts_earlier_installs_on_path() {
        let ctx = context();
        let request = PackageRequest::new("p4est");
        let installed = vec![InstalledLocation::new("openmpi", "5.0.6", "/opt/candi/openmpi-5.0.6")];
        let runner = ScriptedRunner::new();
        let step = InstallStep::new(&ctx, &request, &installed, &runner);

        assert!(step.env["PATH"].starts_with("/opt/candi/openmpi-5.0.6/bin"));
        assert!(step.env["LD_LIBRARY_PATH"].starts_with("/opt/candi/openmpi-5.0.6/lib"));
        assert!(step.env["CMAKE_PREFIX_PATH"].starts_with("/opt/candi/openmpi-5.0.6"));
        assert!(step.location("openmpi").is_some());
        assert!(step.location("zlib").is_none());
    }

    #[test]
    fn test_step_paths_follow_install_order() {
        let ctx = context();
        let request = PackageRequest::new("dealii");
        let installed = vec![
            InstalledLocation::new("zlib", "1.3.1", "/opt/candi/zlib-1.3.1"),
            InstalledLocation::new("openmpi", "5.0.6", "/opt/candi/openmpi-5.0.6"),
        ];
        let runner = ScriptedRunner::new();
        let step = InstallStep::new(&ctx, &request, &installed, &runner);

        assert!(step.env["CMAKE_PREFIX_PATH"].starts_with("/opt/candi/zlib-1.3.1:/opt/candi/openmpi-5.0.6"));
        assert!(step.env["PATH"].starts_with("/opt/candi/zlib-1.3.1/bin:/opt/candi/openmpi-5.0.6/bin"));
    }

    #[test]
    fn test_step_env_is_private_to_the_step() {
        let ctx = context();
        let request = PackageRequest::new("zlib");
        let installed: Vec<InstalledLocation> = Vec::new();
        let runner = ScriptedRunner::new();

        let mut first = InstallStep::new(&ctx, &request, &installed, &runner);
        first.env.insert("CC".to_string(), "mpicc".to_string());
        let second = InstallStep::new(&ctx, &request, &installed, &runner);

        assert!(!second.env.contains_key("CC"));
    }

    #[test]
    fn test_step_run_wraps_tool_failure() {
        let ctx = context();
        let request = PackageRequest::new("zlib");
        let installed: Vec<InstalledLocation> = Vec::new();
        let runner = ScriptedRunner::new().fail_on("make", 2);
        let step = InstallStep::new(&ctx, &request, &installed, &runner);

        let err = step.run("build", ToolInvocation::new("make")).unwrap_err();
        match err {
            DescriptorError::Tool { step, source } => {
                assert_eq!(step, "build");
                assert_eq!(source.status(), Some(2));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.invocations()[0].env.get("JOBS").unwrap(), "8");
    }

    #[test]
    fn test_version_or_default() {
        let ctx = context();
        let installed: Vec<InstalledLocation> = Vec::new();
        let runner = ScriptedRunner::new();
        let pinned = PackageRequest::new("zlib").with_version("1.3");
        let unpinned = PackageRequest::new("zlib");

        let step = InstallStep::new(&ctx, &pinned, &installed, &runner);
        assert_eq!(step.version_or("1.3.1"), "1.3");
        let step = InstallStep::new(&ctx, &unpinned, &installed, &runner);
        assert_eq!(step.version_or("1.3.1"), "1.3.1");
    }
}
