//! Install configuration (`candi.toml`)
//!
//! The config file is read once at startup and validated in full before the
//! command line is looked at. Toggles take the literal values `ON` or `OFF`;
//! anything else is rejected with the field name in the error.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::package::{CompilerSpec, PackageRequest};
use crate::core::version;
use crate::error::ConfigError;

const ON: &str = "ON";
const OFF: &str = "OFF";

/// Config file as written on disk, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Delegate every install to spack
    pub use_spack: String,

    /// Packages to install, in spack spec syntax
    pub packages: Option<Vec<String>>,

    /// deal.II options
    pub dealii: DealiiSection,

    /// Compiler selection
    pub compiler: CompilerSection,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            use_spack: OFF.to_string(),
            packages: None,
            dealii: DealiiSection::default(),
            compiler: CompilerSection::default(),
        }
    }
}

/// `[dealii]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DealiiSection {
    /// deal.II release
    pub version: String,
    /// CMake build type
    pub build_type: String,
    /// Build with `-march=native`
    pub native_optimizations: String,
    /// 64-bit global indices
    pub use_64bit_indices: String,
    /// CUDA support through Kokkos
    pub cuda: String,
    /// GNU Scientific Library support
    pub gsl: String,
    /// SUNDIALS support
    pub sundials: String,
    /// Caliper profiling library
    pub caliper: String,
}

impl Default for DealiiSection {
    fn default() -> Self {
        Self {
            version: defaults::DEFAULT_DEAL_II_VERSION.to_string(),
            build_type: BuildType::Release.to_string(),
            native_optimizations: OFF.to_string(),
            use_64bit_indices: OFF.to_string(),
            cuda: OFF.to_string(),
            gsl: OFF.to_string(),
            sundials: OFF.to_string(),
            caliper: OFF.to_string(),
        }
    }
}

/// `[compiler]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerSection {
    /// Compiler family
    #[serde(rename = "type")]
    pub kind: String,
    /// Compiler version
    pub version: String,
    /// Use whatever compiler the host or spack picks by default
    pub use_default: String,
}

impl Default for CompilerSection {
    fn default() -> Self {
        Self {
            kind: defaults::DEFAULT_COMPILER_TYPE.to_string(),
            version: defaults::DEFAULT_COMPILER_VERSION.to_string(),
            use_default: ON.to_string(),
        }
    }
}

/// CMake build type for deal.II
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildType {
    /// Debug only
    Debug,
    /// Release only
    Release,
    /// Both debug and release libraries
    DebugRelease,
}

impl BuildType {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "Debug" => Ok(Self::Debug),
            "Release" => Ok(Self::Release),
            "DebugRelease" => Ok(Self::DebugRelease),
            other => Err(ConfigError::InvalidValue {
                field: "dealii.build_type".to_string(),
                value: other.to_string(),
                reason: "expected Debug, Release or DebugRelease".to_string(),
            }),
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "Debug"),
            Self::Release => write!(f, "Release"),
            Self::DebugRelease => write!(f, "DebugRelease"),
        }
    }
}

/// Validated deal.II options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealiiOptions {
    pub version: Version,
    pub build_type: BuildType,
    pub native_optimizations: bool,
    pub use_64bit_indices: bool,
    pub cuda: bool,
    pub gsl: bool,
    pub sundials: bool,
    pub caliper: bool,
}

/// Validated configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Install through spack instead of building from source
    pub use_spack: bool,
    /// Packages in config-declared order
    pub packages: Vec<PackageRequest>,
    /// deal.II options
    pub dealii: DealiiOptions,
    /// Compiler to build with when not using the default one
    pub compiler: CompilerSpec,
    /// Use the default compiler instead of [`Config::compiler`]
    pub use_default_compiler: bool,
}

/// A config file path and how it was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Named by `$CANDI_CONFIG`
    Explicit(PathBuf),
    /// `candi.toml` in the working directory
    WorkingDir(PathBuf),
}

impl Default for Config {
    fn default() -> Self {
        // The default file content is valid by construction.
        Self::validate(ConfigFile::default()).unwrap_or_else(|e| unreachable!("{e}"))
    }
}

impl Config {
    /// Where the config comes from: `$CANDI_CONFIG`, else `./candi.toml`
    pub fn locate(working_dir: &Path) -> ConfigLocation {
        match std::env::var_os(defaults::ENV_CONFIG_PATH) {
            Some(path) => ConfigLocation::Explicit(PathBuf::from(path)),
            None => ConfigLocation::WorkingDir(working_dir.join(defaults::CONFIG_FILE_NAME)),
        }
    }

    /// Load the config at `location`
    ///
    /// Only a missing `./candi.toml` yields the defaults; a file named
    /// explicitly must exist.
    pub fn load_from(location: &ConfigLocation) -> Result<Self, ConfigError> {
        match location {
            ConfigLocation::WorkingDir(path) if !path.exists() => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            ConfigLocation::Explicit(path) | ConfigLocation::WorkingDir(path) => Self::load(path),
        }
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config = Self::from_toml(&content, path)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML content; `path` only labels errors
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::validate(file)
    }

    /// Validate every field of a parsed config file
    pub fn validate(file: ConfigFile) -> Result<Self, ConfigError> {
        let use_spack = parse_toggle("use_spack", &file.use_spack)?;

        let d = &file.dealii;
        let native_optimizations =
            parse_toggle("dealii.native_optimizations", &d.native_optimizations)?;
        let use_64bit_indices = parse_toggle("dealii.use_64bit_indices", &d.use_64bit_indices)?;
        let cuda = parse_toggle("dealii.cuda", &d.cuda)?;
        let gsl = parse_toggle("dealii.gsl", &d.gsl)?;
        let sundials = parse_toggle("dealii.sundials", &d.sundials)?;
        let caliper = parse_toggle("dealii.caliper", &d.caliper)?;
        let use_default_compiler =
            parse_toggle("compiler.use_default", &file.compiler.use_default)?;

        let version = version::parse_dealii_version("dealii.version", &d.version)?;
        let build_type = BuildType::parse(&d.build_type)?;

        if file.compiler.kind.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "compiler.type".to_string(),
                value: file.compiler.kind.clone(),
                reason: "must not be empty".to_string(),
            });
        }
        if !use_default_compiler && file.compiler.version.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "compiler.version".to_string(),
                value: file.compiler.version.clone(),
                reason: "required when compiler.use_default is OFF".to_string(),
            });
        }

        let specs: Vec<String> = file.packages.clone().unwrap_or_else(|| {
            defaults::DEFAULT_PACKAGES
                .iter()
                .map(|s| (*s).to_string())
                .collect()
        });
        let packages = specs
            .iter()
            .map(|s| PackageRequest::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        for pkg in packages.iter().filter(|p| p.name == "dealii") {
            if let Some(pinned) = &pkg.version {
                let pinned_version = version::parse_release("packages.dealii", pinned)?;
                if pinned_version != version {
                    return Err(ConfigError::InvalidValue {
                        field: "packages".to_string(),
                        value: pkg.spec(),
                        reason: format!("conflicts with dealii.version = {version}"),
                    });
                }
            }
        }

        Ok(Self {
            use_spack,
            packages,
            dealii: DealiiOptions {
                version,
                build_type,
                native_optimizations,
                use_64bit_indices,
                cuda,
                gsl,
                sundials,
                caliper,
            },
            compiler: CompilerSpec::new(file.compiler.kind.trim(), file.compiler.version.trim()),
            use_default_compiler,
        })
    }

    /// Packages to hand to the planner
    ///
    /// Declared packages come first, in declared order. Optional libraries
    /// switched on in `[dealii]` are inserted just before `dealii` (or
    /// appended when `dealii` is not requested), and the `dealii` entry gets
    /// the configured version and matching variants.
    pub fn requested_packages(&self) -> Vec<PackageRequest> {
        let optional: Vec<PackageRequest> = [
            ("gsl", self.dealii.gsl),
            ("sundials", self.dealii.sundials),
            ("caliper", self.dealii.caliper),
        ]
        .into_iter()
        .filter(|(name, enabled)| *enabled && !self.packages.iter().any(|p| p.name == *name))
        .map(|(name, _)| PackageRequest::new(name))
        .collect();

        let mut requested = Vec::with_capacity(self.packages.len() + optional.len());
        let mut optional_pending = Some(optional);

        for pkg in &self.packages {
            if pkg.name == "dealii" {
                if let Some(extra) = optional_pending.take() {
                    requested.extend(extra);
                }
                requested.push(self.dealii_request(pkg));
            } else {
                requested.push(pkg.clone());
            }
        }
        if let Some(extra) = optional_pending {
            requested.extend(extra);
        }

        requested
    }

    fn dealii_request(&self, declared: &PackageRequest) -> PackageRequest {
        let mut req = declared
            .clone()
            .with_version(self.dealii.version.to_string());
        for (variant, enabled) in [
            ("+cuda", self.dealii.cuda),
            ("+gsl", self.dealii.gsl),
            ("+sundials", self.dealii.sundials),
            ("+caliper", self.dealii.caliper),
            ("+int64", self.dealii.use_64bit_indices),
        ] {
            if enabled {
                req = req.with_variant(variant);
            }
        }
        req
    }
}

/// Parse an `ON`/`OFF` toggle
pub fn parse_toggle(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        ON => Ok(true),
        OFF => Ok(false),
        other => Err(ConfigError::InvalidToggle {
            field: field.to_string(),
            value: other.to_string(),
        }),
    }
}
