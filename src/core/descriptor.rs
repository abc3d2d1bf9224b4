//! Package descriptor contract
//!
//! A descriptor knows how to install exactly one package. The sequencer
//! treats all of them alike: look one up by name, hand it a fresh
//! [`InstallStep`], get back where the package landed.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::context::InstallStep;
use crate::core::package::PackageRequest;
use crate::infra::process::ToolError;

/// Errors raised by a descriptor's install
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// An external tool failed during `step`
    #[error("step '{step}' failed: {source}")]
    Tool {
        step: String,
        #[source]
        source: ToolError,
    },

    /// Sources were not fetched before the install started
    #[error("sources not found at '{path}'; run 'candi fetch' first")]
    SourceMissing { path: PathBuf },

    /// The package cannot be installed this way
    #[error("'{package}' cannot be installed here: {reason}")]
    Unsupported { package: String, reason: String },

    /// Filesystem error while preparing or recording an install
    #[error("IO error for '{path}': {error}")]
    Io { path: PathBuf, error: String },
}

impl DescriptorError {
    /// Exit status of the failing tool, when a tool failed
    pub fn tool_status(&self) -> Option<i32> {
        match self {
            Self::Tool { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Where a package ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledLocation {
    /// Package name
    pub name: String,
    /// Installed version
    pub version: String,
    /// Install prefix
    pub prefix: PathBuf,
}

impl InstalledLocation {
    pub fn new(name: impl Into<String>, version: impl Into<String>, prefix: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            prefix: prefix.into(),
        }
    }

    /// `<prefix>/lib`
    pub fn lib_dir(&self) -> PathBuf {
        self.prefix.join("lib")
    }

    /// `<prefix>/bin`
    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }
}

impl fmt::Display for InstalledLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version, self.prefix.display())
    }
}

/// Where a package's sources come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// A release archive
    Archive {
        url: String,
        /// File name under the source root
        file_name: String,
        /// Expected sha256, verified when known
        sha256: Option<String>,
    },
    /// A git repository at a release tag
    Git {
        url: String,
        tag: String,
        /// Checkout directory name under the source root
        dir_name: String,
    },
}

impl SourceSpec {
    /// Path of the fetched source under `source_root`
    pub fn local_path(&self, source_root: &Path) -> PathBuf {
        match self {
            Self::Archive { file_name, .. } => source_root.join(file_name),
            Self::Git { dir_name, .. } => source_root.join(dir_name),
        }
    }
}

/// Installer for one package
pub trait PackageDescriptor: Send + Sync {
    /// Package name this descriptor installs
    fn name(&self) -> &str;

    /// Install the package described by `step.request`
    fn install(&self, step: &mut InstallStep<'_>) -> Result<InstalledLocation, DescriptorError>;

    /// Report an existing install, if there is a reliable way to tell
    fn probe(&self, _step: &InstallStep<'_>) -> Option<InstalledLocation> {
        None
    }

    /// Sources to fetch before `install` runs
    fn source(&self, _request: &PackageRequest) -> Option<SourceSpec> {
        None
    }
}

/// Descriptors by package name
#[derive(Default)]
pub struct DescriptorRegistry {
    descriptors: BTreeMap<String, Box<dyn PackageDescriptor>>,
}

impl DescriptorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under its own name, replacing any previous one
    pub fn register(&mut self, descriptor: Box<dyn PackageDescriptor>) {
        self.descriptors
            .insert(descriptor.name().to_string(), descriptor);
    }

    /// Builder-style [`DescriptorRegistry::register`]
    #[must_use]
    pub fn with(mut self, descriptor: impl PackageDescriptor + 'static) -> Self {
        self.register(Box::new(descriptor));
        self
    }

    /// Look up a descriptor by package name
    pub fn get(&self, name: &str) -> Option<&dyn PackageDescriptor> {
        self.descriptors.get(name).map(|d| &**d)
    }

    /// Whether a descriptor is registered for `name`
    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Registered package names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.descriptors.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for DescriptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorRegistry")
            .field("packages", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl PackageDescriptor for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn install(&self, step: &mut InstallStep<'_>) -> Result<InstalledLocation, DescriptorError> {
            Ok(InstalledLocation::new(self.0, "1.0", step.ctx.prefix_for(self.0, "1.0")))
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = DescriptorRegistry::new().with(Named("zlib")).with(Named("p4est"));
        assert!(registry.contains("zlib"));
        assert_eq!(registry.get("p4est").map(|d| d.name()), Some("p4est"));
        assert!(registry.get("petsc").is_none());
        assert_eq!(registry.names(), vec!["p4est", "zlib"]);
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = DescriptorRegistry::new().with(Named("zlib"));
        registry.register(Box::new(Named("zlib")));
        assert_eq!(registry.names().len(), 1);
    }

    #[test]
    fn test_default_capabilities_are_absent() {
        let descriptor = Named("zlib");
        assert!(descriptor.source(&PackageRequest::new("zlib")).is_none());
    }

    #[test]
    fn test_source_local_path() {
        let archive = SourceSpec::Archive {
            url: "https://zlib.net/fossils/zlib-1.3.1.tar.gz".to_string(),
            file_name: "zlib-1.3.1.tar.gz".to_string(),
            sha256: None,
        };
        assert_eq!(
            archive.local_path(Path::new("/src")),
            PathBuf::from("/src/zlib-1.3.1.tar.gz")
        );

        let git = SourceSpec::Git {
            url: "https://github.com/dealii/dealii.git".to_string(),
            tag: "v9.6.0".to_string(),
            dir_name: "dealii-9.6.0".to_string(),
        };
        assert_eq!(git.local_path(Path::new("/src")), PathBuf::from("/src/dealii-9.6.0"));
    }

    #[test]
    fn test_location_dirs() {
        let loc = InstalledLocation::new("zlib", "1.3.1", "/opt/zlib-1.3.1");
        assert_eq!(loc.lib_dir(), PathBuf::from("/opt/zlib-1.3.1/lib"));
        assert_eq!(loc.bin_dir(), PathBuf::from("/opt/zlib-1.3.1/bin"));
        assert_eq!(loc.to_string(), "zlib 1.3.1 (/opt/zlib-1.3.1)");
    }
}
