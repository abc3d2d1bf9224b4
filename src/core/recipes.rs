//! Source build recipes
//!
//! One static entry per package candi can build from source. A recipe names
//! its default version, where its sources live, which build system drives it,
//! and how to derive configure flags from the step (so deal.II can point at
//! the p4est and OpenBLAS installed earlier in the same run).

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults::INSTALL_STAMP;
use crate::config::urls;
use crate::core::context::InstallStep;
use crate::core::descriptor::{
    DescriptorError, DescriptorRegistry, InstalledLocation, PackageDescriptor, SourceSpec,
};
use crate::core::package::PackageRequest;
use crate::core::version::dealii_tag;
use crate::infra::process::ToolInvocation;

const ZLIB_1_3_1_SHA256: &str = "9a93b2b7dfdac77ceba5a558a580e74667dd6fede4585b91eefb60f03b72df23";

/// How a package is configured and built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSystem {
    /// Out-of-tree `cmake -S -B`, then `make`
    CMake,
    /// In-tree `./configure --prefix`, then `make`
    Autotools,
    /// Plain `make`; flags go to both `make` and `make install`
    Make,
}

/// A package built from source
#[derive(Clone, Copy)]
pub struct SourceRecipe {
    pub name: &'static str,
    /// Version used when the request does not pin one
    pub version: &'static str,
    pub build: BuildSystem,
    source: fn(&str) -> SourceSpec,
    flags: fn(&InstallStep<'_>) -> Vec<String>,
    /// Adjusts the step environment before configuring
    prepare: Option<fn(&mut InstallStep<'_>)>,
}

impl std::fmt::Debug for SourceRecipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRecipe")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("build", &self.build)
            .finish_non_exhaustive()
    }
}

/// Every package candi builds from source
pub const SOURCE_RECIPES: &[SourceRecipe] = &[
    SourceRecipe {
        name: "zlib",
        version: "1.3.1",
        build: BuildSystem::CMake,
        source: zlib_source,
        flags: no_flags,
        prepare: None,
    },
    SourceRecipe {
        name: "openblas",
        version: "0.3.28",
        build: BuildSystem::Make,
        source: openblas_source,
        flags: openblas_flags,
        prepare: None,
    },
    SourceRecipe {
        name: "p4est",
        version: "2.8.6",
        build: BuildSystem::Autotools,
        source: p4est_source,
        flags: p4est_flags,
        prepare: Some(use_mpi_wrappers),
    },
    SourceRecipe {
        name: "kokkos",
        version: "4.5.01",
        build: BuildSystem::CMake,
        source: kokkos_source,
        flags: kokkos_flags,
        prepare: None,
    },
    SourceRecipe {
        name: "openmpi",
        version: "5.0.6",
        build: BuildSystem::Autotools,
        source: openmpi_source,
        flags: openmpi_flags,
        prepare: None,
    },
    SourceRecipe {
        name: "gsl",
        version: "2.8",
        build: BuildSystem::Autotools,
        source: gsl_source,
        flags: no_flags,
        prepare: None,
    },
    SourceRecipe {
        name: "sundials",
        version: "6.7.0",
        build: BuildSystem::CMake,
        source: sundials_source,
        flags: sundials_flags,
        prepare: None,
    },
    SourceRecipe {
        name: "caliper",
        version: "2.12.1",
        build: BuildSystem::CMake,
        source: caliper_source,
        flags: caliper_flags,
        prepare: None,
    },
    SourceRecipe {
        name: "dealii",
        version: crate::config::defaults::DEFAULT_DEAL_II_VERSION,
        build: BuildSystem::CMake,
        source: dealii_source,
        flags: dealii_flags,
        prepare: None,
    },
];

/// Recipe for `name`
pub fn recipe(name: &str) -> Option<&'static SourceRecipe> {
    SOURCE_RECIPES.iter().find(|r| r.name == name)
}

impl SourceRecipe {
    /// Version a step installs
    pub fn version_for<'s>(&'s self, request: &'s PackageRequest) -> &'s str {
        request.version.as_deref().unwrap_or(self.version)
    }

    /// Configure flags for `step`
    pub fn flags_for(&self, step: &InstallStep<'_>) -> Vec<String> {
        (self.flags)(step)
    }

    /// Contents of the install stamp for `step`
    ///
    /// The resolved spec, the compiler and the configure flags, one per line.
    /// A stamp written under any other combination does not count as installed.
    pub fn stamp_for(&self, step: &InstallStep<'_>) -> String {
        let resolved = step.request.clone().with_version(self.version_for(step.request));
        let compiler = if step.ctx.use_default_compiler {
            "default".to_string()
        } else {
            step.ctx.compiler.to_string()
        };

        let mut lines = vec![resolved.spec(), format!("compiler={compiler}")];
        lines.extend(self.flags_for(step));
        lines.join("\n") + "\n"
    }
}

impl PackageDescriptor for SourceRecipe {
    fn name(&self) -> &str {
        self.name
    }

    fn source(&self, request: &PackageRequest) -> Option<SourceSpec> {
        Some((self.source)(self.version_for(request)))
    }

    fn probe(&self, step: &InstallStep<'_>) -> Option<InstalledLocation> {
        let version = self.version_for(step.request);
        let prefix = step.ctx.prefix_for(self.name, version);
        let stamp = fs::read_to_string(prefix.join(INSTALL_STAMP)).ok()?;
        if stamp != self.stamp_for(step) {
            tracing::debug!("{} at {} was built differently", self.name, prefix.display());
            return None;
        }
        Some(InstalledLocation::new(self.name, version, prefix))
    }

    fn install(&self, step: &mut InstallStep<'_>) -> Result<InstalledLocation, DescriptorError> {
        let ctx = step.ctx;
        let version = self.version_for(step.request).to_string();
        let prefix = ctx.prefix_for(self.name, &version);
        let build_dir = ctx.build_dir_for(self.name, &version);
        let logs = build_dir.join("logs");
        create_dir(&logs)?;

        let source = (self.source)(&version);
        let fetched = source.local_path(&ctx.source_root);
        if !fetched.exists() {
            return Err(DescriptorError::SourceMissing { path: fetched });
        }

        let src_dir = match source {
            SourceSpec::Archive { .. } => {
                let src_dir = build_dir.join("src");
                if src_dir.exists() {
                    fs::remove_dir_all(&src_dir).map_err(|e| io_error(&src_dir, &e))?;
                }
                create_dir(&src_dir)?;
                step.run(
                    "unpack",
                    ToolInvocation::new("tar")
                        .arg("-xf")
                        .arg(fetched.display().to_string())
                        .arg("-C")
                        .arg(src_dir.display().to_string())
                        .arg("--strip-components=1")
                        .log_to(logs.join("unpack.log")),
                )?;
                src_dir
            }
            SourceSpec::Git { .. } => fetched,
        };

        if let Some(prepare) = self.prepare {
            prepare(step);
        }
        let flags = (self.flags)(step);
        let stamp_contents = self.stamp_for(step);
        let make_jobs = format!("-j{}", ctx.jobs);

        let work_dir = match self.build {
            BuildSystem::CMake => {
                let cmake_build = build_dir.join("build");
                let mut configure = ToolInvocation::new("cmake")
                    .arg("-S")
                    .arg(src_dir.display().to_string())
                    .arg("-B")
                    .arg(cmake_build.display().to_string())
                    .arg(format!("-DCMAKE_INSTALL_PREFIX={}", prefix.display()));
                if !flags.iter().any(|f| f.starts_with("-DCMAKE_BUILD_TYPE=")) {
                    configure = configure.arg("-DCMAKE_BUILD_TYPE=Release");
                }
                step.run(
                    "configure",
                    configure.args(flags.iter().cloned()).log_to(logs.join("configure.log")),
                )?;
                cmake_build
            }
            BuildSystem::Autotools => {
                step.run(
                    "configure",
                    ToolInvocation::new("./configure")
                        .arg(format!("--prefix={}", prefix.display()))
                        .args(flags.iter().cloned())
                        .current_dir(&src_dir)
                        .log_to(logs.join("configure.log")),
                )?;
                src_dir.clone()
            }
            BuildSystem::Make => src_dir.clone(),
        };

        let make_flags: &[String] = if self.build == BuildSystem::Make { &flags } else { &[] };

        step.run(
            "build",
            ToolInvocation::new("make")
                .arg(make_jobs)
                .args(make_flags.iter().cloned())
                .current_dir(&work_dir)
                .log_to(logs.join("build.log")),
        )?;

        let mut install = ToolInvocation::new("make").arg("install");
        if self.build == BuildSystem::Make {
            install = install
                .args(make_flags.iter().cloned())
                .arg(format!("PREFIX={}", prefix.display()));
        }
        step.run(
            "install",
            install.current_dir(&work_dir).log_to(logs.join("install.log")),
        )?;

        create_dir(&prefix)?;
        let stamp = prefix.join(INSTALL_STAMP);
        fs::write(&stamp, stamp_contents).map_err(|e| io_error(&stamp, &e))?;

        Ok(InstalledLocation::new(self.name, version, prefix))
    }
}

/// CUDA comes from the system; candi only locates it
#[derive(Debug, Clone, Copy)]
pub struct SystemCuda {
    lookup: fn(&str) -> Option<PathBuf>,
}

impl SystemCuda {
    pub fn new() -> Self {
        Self {
            lookup: |name| which::which(name).ok(),
        }
    }

    /// Locate `nvcc` with a custom lookup
    pub fn with_lookup(lookup: fn(&str) -> Option<PathBuf>) -> Self {
        Self { lookup }
    }
}

impl Default for SystemCuda {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageDescriptor for SystemCuda {
    fn name(&self) -> &str {
        "cuda"
    }

    fn probe(&self, step: &InstallStep<'_>) -> Option<InstalledLocation> {
        let nvcc = (self.lookup)("nvcc")?;
        let prefix = nvcc.parent()?.parent()?.to_path_buf();
        let version = step
            .query(ToolInvocation::new(nvcc.display().to_string()).arg("--version"))
            .filter(|o| o.success())
            .and_then(|o| parse_nvcc_release(&o.stdout))
            .unwrap_or_else(|| "system".to_string());
        Some(InstalledLocation::new("cuda", version, prefix))
    }

    fn install(&self, _step: &mut InstallStep<'_>) -> Result<InstalledLocation, DescriptorError> {
        Err(DescriptorError::Unsupported {
            package: "cuda".to_string(),
            reason: "install the CUDA toolkit from your vendor and put nvcc on PATH".to_string(),
        })
    }
}

fn parse_nvcc_release(text: &str) -> Option<String> {
    let re = Regex::new(r"release (\d+\.\d+)").ok()?;
    re.captures(text).map(|c| c[1].to_string())
}

impl DescriptorRegistry {
    /// Every source recipe plus the system CUDA locator
    pub fn source_defaults() -> Self {
        let mut registry = Self::new();
        for recipe in SOURCE_RECIPES {
            registry.register(Box::new(*recipe));
        }
        registry.with(SystemCuda::new())
    }
}

fn create_dir(path: &Path) -> Result<(), DescriptorError> {
    fs::create_dir_all(path).map_err(|e| io_error(path, &e))
}

fn io_error(path: &Path, error: &std::io::Error) -> DescriptorError {
    DescriptorError::Io {
        path: path.to_path_buf(),
        error: error.to_string(),
    }
}

fn archive(url: String, file_name: String) -> SourceSpec {
    SourceSpec::Archive {
        url,
        file_name,
        sha256: None,
    }
}

fn zlib_source(version: &str) -> SourceSpec {
    let file_name = format!("zlib-{version}.tar.gz");
    SourceSpec::Archive {
        url: format!("{}/{file_name}", urls::ZLIB_DOWNLOAD),
        sha256: (version == "1.3.1").then(|| ZLIB_1_3_1_SHA256.to_string()),
        file_name,
    }
}

fn openblas_source(version: &str) -> SourceSpec {
    archive(
        format!("{}/v{version}/OpenBLAS-{version}.tar.gz", urls::OPENBLAS_DOWNLOAD),
        format!("OpenBLAS-{version}.tar.gz"),
    )
}

fn p4est_source(version: &str) -> SourceSpec {
    archive(
        format!("{}/p4est-{version}.tar.gz", urls::P4EST_DOWNLOAD),
        format!("p4est-{version}.tar.gz"),
    )
}

fn kokkos_source(version: &str) -> SourceSpec {
    archive(
        format!("{}/{version}.tar.gz", urls::KOKKOS_DOWNLOAD),
        format!("kokkos-{version}.tar.gz"),
    )
}

fn openmpi_source(version: &str) -> SourceSpec {
    let series: Vec<&str> = version.split('.').take(2).collect();
    archive(
        format!(
            "{}/v{}/openmpi-{version}.tar.gz",
            urls::OPENMPI_DOWNLOAD,
            series.join(".")
        ),
        format!("openmpi-{version}.tar.gz"),
    )
}

fn gsl_source(version: &str) -> SourceSpec {
    archive(
        format!("{}/gsl-{version}.tar.gz", urls::GSL_DOWNLOAD),
        format!("gsl-{version}.tar.gz"),
    )
}

fn sundials_source(version: &str) -> SourceSpec {
    archive(
        format!("{}/v{version}/sundials-{version}.tar.gz", urls::SUNDIALS_DOWNLOAD),
        format!("sundials-{version}.tar.gz"),
    )
}

fn caliper_source(version: &str) -> SourceSpec {
    SourceSpec::Git {
        url: urls::CALIPER_GIT.to_string(),
        tag: format!("v{version}"),
        dir_name: format!("caliper-{version}"),
    }
}

fn dealii_source(version: &str) -> SourceSpec {
    let tag = semver::Version::parse(version)
        .map(|v| dealii_tag(&v))
        .unwrap_or_else(|_| format!("v{version}"));
    SourceSpec::Git {
        url: urls::DEAL_II_GIT.to_string(),
        tag,
        dir_name: format!("dealii-{version}"),
    }
}

fn no_flags(_step: &InstallStep<'_>) -> Vec<String> {
    Vec::new()
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

fn openblas_flags(_step: &InstallStep<'_>) -> Vec<String> {
    vec!["NO_AFFINITY=1".to_string(), "USE_OPENMP=0".to_string()]
}

fn use_mpi_wrappers(step: &mut InstallStep<'_>) {
    let Some(mpi) = step.location("openmpi") else {
        return;
    };
    let bin = mpi.bin_dir();
    for (var, wrapper) in [("CC", "mpicc"), ("CXX", "mpicxx"), ("FC", "mpifort"), ("F77", "mpifort")] {
        let path = bin.join(wrapper).display().to_string();
        step.env.insert(var.to_string(), path);
    }
}

fn p4est_flags(_step: &InstallStep<'_>) -> Vec<String> {
    ["--enable-mpi", "--enable-shared", "--disable-vtk-binary", "--without-blas"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn kokkos_flags(step: &InstallStep<'_>) -> Vec<String> {
    let options = &step.ctx.options;
    let mut flags = vec![
        "-DKokkos_ENABLE_SERIAL=ON".to_string(),
        "-DBUILD_SHARED_LIBS=ON".to_string(),
        format!("-DKokkos_ENABLE_CUDA={}", on_off(options.cuda)),
    ];
    if options.cuda {
        flags.push("-DKokkos_ENABLE_CUDA_CONSTEXPR=ON".to_string());
    }
    if options.native_optimizations {
        flags.push("-DKokkos_ARCH_NATIVE=ON".to_string());
    }
    flags
}

fn openmpi_flags(step: &InstallStep<'_>) -> Vec<String> {
    let mut flags = vec!["--enable-shared".to_string()];
    if let Some(cuda) = step.location("cuda") {
        flags.push(format!("--with-cuda={}", cuda.prefix.display()));
    }
    flags
}

fn sundials_flags(step: &InstallStep<'_>) -> Vec<String> {
    vec![
        "-DBUILD_SHARED_LIBS=ON".to_string(),
        "-DEXAMPLES_ENABLE_C=OFF".to_string(),
        format!("-DENABLE_MPI={}", on_off(step.location("openmpi").is_some())),
    ]
}

fn caliper_flags(step: &InstallStep<'_>) -> Vec<String> {
    vec![format!(
        "-DWITH_MPI={}",
        on_off(step.location("openmpi").is_some())
    )]
}

fn dealii_flags(step: &InstallStep<'_>) -> Vec<String> {
    let options = &step.ctx.options;
    let mut flags = vec![
        format!("-DCMAKE_BUILD_TYPE={}", options.build_type),
        "-DDEAL_II_COMPONENT_EXAMPLES=OFF".to_string(),
        format!(
            "-DDEAL_II_WITH_64BIT_INDICES={}",
            on_off(options.use_64bit_indices || step.request.has_variant("int64"))
        ),
        format!("-DDEAL_II_WITH_MPI={}", on_off(step.location("openmpi").is_some())),
    ];

    if let Some(p4est) = step.location("p4est") {
        flags.push("-DDEAL_II_WITH_P4EST=ON".to_string());
        flags.push(format!("-DP4EST_DIR={}", p4est.prefix.display()));
    }
    if let Some(blas) = step.location("openblas") {
        flags.push("-DDEAL_II_WITH_LAPACK=ON".to_string());
        flags.push(format!("-DLAPACK_DIR={}", blas.prefix.display()));
        flags.push(format!("-DBLAS_DIR={}", blas.prefix.display()));
    }
    if let Some(zlib) = step.location("zlib") {
        flags.push("-DDEAL_II_WITH_ZLIB=ON".to_string());
        flags.push(format!("-DZLIB_DIR={}", zlib.prefix.display()));
    }
    if let Some(kokkos) = step.location("kokkos") {
        flags.push("-DDEAL_II_WITH_KOKKOS=ON".to_string());
        flags.push(format!("-DKOKKOS_DIR={}", kokkos.prefix.display()));
    }
    for (package, feature, var) in [
        ("gsl", "GSL", "GSL_DIR"),
        ("sundials", "SUNDIALS", "SUNDIALS_DIR"),
        ("caliper", "CALIPER", "CALIPER_DIR"),
    ] {
        if let Some(loc) = step.location(package) {
            flags.push(format!("-DDEAL_II_WITH_{feature}=ON"));
            flags.push(format!("-D{var}={}", loc.prefix.display()));
        }
    }
    if options.native_optimizations {
        flags.push("-DCMAKE_CXX_FLAGS=-march=native".to_string());
    }

    flags
}
