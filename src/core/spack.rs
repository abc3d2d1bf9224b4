//! Spack-backed installs
//!
//! With `use_spack = ON` every package is handed to spack. candi only builds
//! the spack spec, runs `spack install`, and asks spack where the package
//! landed so later packages (and the summary) can point at it. Every spack
//! call has its install tree rooted at the install prefix.

use std::path::{Path, PathBuf};

use crate::core::context::{InstallContext, InstallStep};
use crate::core::descriptor::{DescriptorError, DescriptorRegistry, InstalledLocation, PackageDescriptor};
use crate::core::package::{CompilerSpec, PackageRequest};
use crate::error::SequencerError;
use crate::infra::process::{ToolInvocation, ToolRunner};

/// Packages candi knows how to request from spack
pub const SPACK_PACKAGES: &[&str] = &[
    "cuda", "zlib", "openblas", "p4est", "kokkos", "openmpi", "gsl", "sundials", "caliper", "dealii",
];

/// Installs one package through spack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpackDescriptor {
    name: String,
}

impl SpackDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Spec handed to spack: the request plus `%compiler` when one is forced
    pub fn spec_for(request: &PackageRequest, ctx: &InstallContext) -> String {
        let mut spec = request.spec();
        if !ctx.use_default_compiler {
            spec.push_str(&format!(" %{}", ctx.compiler));
        }
        spec
    }

    fn location(
        &self,
        step: &InstallStep<'_>,
        spec: &str,
    ) -> Result<InstalledLocation, DescriptorError> {
        let output = step.run("locate", spack(&step.ctx.install_root, ["location", "-i"], spec))?;
        let prefix = PathBuf::from(output.stdout.trim());
        let version = step
            .request
            .version
            .clone()
            .or_else(|| installed_version(step, spec))
            .unwrap_or_else(|| "spack".to_string());
        Ok(InstalledLocation::new(self.name.clone(), version, prefix))
    }
}

impl PackageDescriptor for SpackDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn probe(&self, step: &InstallStep<'_>) -> Option<InstalledLocation> {
        let spec = Self::spec_for(step.request, step.ctx);
        let found = step.query(spack(&step.ctx.install_root, ["find"], &spec))?;
        if !found.success() {
            return None;
        }
        self.location(step, &spec).ok()
    }

    fn install(&self, step: &mut InstallStep<'_>) -> Result<InstalledLocation, DescriptorError> {
        let spec = Self::spec_for(step.request, step.ctx);
        let jobs = step.ctx.jobs.to_string();

        let logs = step.ctx.build_root.join(&self.name).join("logs");
        std::fs::create_dir_all(&logs).map_err(|e| DescriptorError::Io {
            path: logs.clone(),
            error: e.to_string(),
        })?;

        step.run(
            "spack install",
            spack(&step.ctx.install_root, ["install", "-j", jobs.as_str()], &spec)
                .log_to(logs.join("spack-install.log")),
        )?;
        self.location(step, &spec)
    }
}

impl DescriptorRegistry {
    /// A spack descriptor for every supported package
    pub fn spack_defaults() -> Self {
        let mut registry = Self::new();
        for name in SPACK_PACKAGES {
            registry.register(Box::new(SpackDescriptor::new(*name)));
        }
        registry
    }
}

/// What [`ensure_compiler`] had to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerGate {
    /// The default compiler is used; nothing checked
    Deferred,
    /// spack already knows the compiler
    Present,
    /// The compiler was installed and registered with spack
    Installed { prefix: PathBuf },
}

/// Make `compiler` available to spack before any package install
///
/// A compiler spack has to build lands in the same install tree as the
/// packages.
pub fn ensure_compiler(
    compiler: &CompilerSpec,
    use_default: bool,
    install_root: &Path,
    tools: &dyn ToolRunner,
) -> Result<CompilerGate, SequencerError> {
    if use_default {
        return Ok(CompilerGate::Deferred);
    }

    let spec = compiler.to_string();
    let unavailable = |reason: String| SequencerError::CompilerUnavailable {
        compiler: spec.clone(),
        reason,
    };

    let known = tools
        .run(&spack(install_root, ["compiler", "info"], &spec))
        .map_err(|e| unavailable(e.to_string()))?;
    if known.success() {
        tracing::info!("Compiler {spec} already registered with spack");
        return Ok(CompilerGate::Present);
    }

    tracing::info!("Installing compiler {spec} with spack");
    tools
        .run_checked(&spack(install_root, ["install"], &spec))
        .map_err(|e| unavailable(e.to_string()))?;

    let location = tools
        .run_checked(&spack(install_root, ["location", "-i"], &spec))
        .map_err(|e| unavailable(e.to_string()))?;
    let prefix = PathBuf::from(location.stdout.trim());
    if prefix.as_os_str().is_empty() {
        return Err(unavailable("spack reported no install prefix".to_string()));
    }

    tools
        .run_checked(&spack(
            install_root,
            ["compiler", "find"],
            &prefix.display().to_string(),
        ))
        .map_err(|e| unavailable(e.to_string()))?;

    Ok(CompilerGate::Installed { prefix })
}

/// `spack <subcommand> <spec>` with the install tree at `install_root`
fn spack<'s>(
    install_root: &Path,
    subcommand: impl IntoIterator<Item = &'s str>,
    spec: &str,
) -> ToolInvocation {
    ToolInvocation::new("spack")
        .arg("-c")
        .arg(format!("config:install_tree:root:{}", install_root.display()))
        .args(subcommand)
        .args(spec.split_whitespace())
}

fn installed_version(step: &InstallStep<'_>, spec: &str) -> Option<String> {
    let output = step.query(spack(&step.ctx.install_root, ["find", "--format", "{version}"], spec))?;
    output
        .success()
        .then(|| output.stdout.lines().next().map(|l| l.trim().to_string()))
        .flatten()
        .filter(|v| !v.is_empty())
}
