//! Error types for candi
//!
//! Domain-specific error types using thiserror, plus the mapping from an
//! error chain to the process exit status.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::descriptor::DescriptorError;

/// Process exit statuses
pub mod exit_code {
    /// Everything installed
    pub const SUCCESS: i32 = 0;
    /// Unclassified failure (I/O, unexpected state)
    pub const FAILURE: i32 = 1;
    /// Bad or unknown command-line argument
    pub const CLI: i32 = 2;
    /// Invalid configuration value
    pub const CONFIG: i32 = 3;
    /// External tool, package install or fetch failure
    pub const TOOL: i32 = 4;
    /// A requested package has no registered installer
    pub const MISSING_DESCRIPTOR: i32 = 5;
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Config file is not valid TOML or has unknown keys
    #[error("Failed to parse config file '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// A toggle holds something other than ON or OFF
    #[error("Config field '{field}' must be ON or OFF, got '{value}'")]
    InvalidToggle { field: String, value: String },

    /// A version string cannot be parsed
    #[error("Config field '{field}' has invalid version '{value}': {reason}")]
    InvalidVersion {
        field: String,
        value: String,
        reason: String,
    },

    /// A version is older than the supported baseline
    #[error("Config field '{field}' requests version {version}, but the minimum supported is {minimum}")]
    UnsupportedVersion {
        field: String,
        version: String,
        minimum: String,
    },

    /// A field holds a value outside its accepted set
    #[error("Config field '{field}' has invalid value '{value}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// A package entry is not a valid package request
    #[error("Invalid package request '{spec}': {reason}")]
    InvalidPackage { spec: String, reason: String },
}

/// Command-line errors not already reported by clap
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    /// Job count is not an integer
    #[error("invalid job count '{value}': expected a positive integer")]
    InvalidJobs { value: String },

    /// Job count is zero or negative
    #[error("job count must be a positive integer, got {value}")]
    NonPositiveJobs { value: String },
}

/// Dependency sequencing errors
#[derive(Error, Debug)]
pub enum SequencerError {
    /// No installer registered for a requested package
    #[error("No installer registered for package '{package}'")]
    MissingDescriptor { package: String },

    /// A package install failed; the run stopped here
    #[error("Installation of '{package}' failed: {source}")]
    PackageFailed {
        package: String,
        #[source]
        source: DescriptorError,
    },

    /// The requested compiler is neither present nor installable
    #[error("Compiler '{compiler}' is not available: {reason}")]
    CompilerUnavailable { compiler: String, reason: String },
}

impl SequencerError {
    /// Name of the package the run stopped at, if any
    pub fn package(&self) -> Option<&str> {
        match self {
            Self::MissingDescriptor { package } | Self::PackageFailed { package, .. } => {
                Some(package)
            }
            Self::CompilerUnavailable { .. } => None,
        }
    }
}

/// Download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Network error
    #[error("Network error downloading '{url}': {error}")]
    NetworkError { url: String, error: String },

    /// Checksum verification failed
    #[error("Checksum verification failed for '{file}'")]
    ChecksumFailed { file: String },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Max retries exceeded
    #[error("Download failed after {retries} retries: {url}")]
    MaxRetriesExceeded { url: String, retries: u32 },
}

/// Map an error chain to the exit status reported to the shell
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if cause.downcast_ref::<ConfigError>().is_some() {
            return exit_code::CONFIG;
        }
        if cause.downcast_ref::<CliError>().is_some() {
            return exit_code::CLI;
        }
        if let Some(err) = cause.downcast_ref::<SequencerError>() {
            return match err {
                SequencerError::MissingDescriptor { .. } => exit_code::MISSING_DESCRIPTOR,
                _ => exit_code::TOOL,
            };
        }
        if cause.downcast_ref::<crate::infra::process::ToolError>().is_some()
            || cause.downcast_ref::<crate::core::fetch::FetchError>().is_some()
            || cause.downcast_ref::<DownloadError>().is_some()
        {
            return exit_code::TOOL;
        }
    }
    exit_code::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_config_error_maps_to_config_code() {
        let err = anyhow::Error::from(ConfigError::InvalidToggle {
            field: "dealii.gsl".to_string(),
            value: "yes".to_string(),
        });
        assert_eq!(exit_code_for(&err), exit_code::CONFIG);
    }

    #[test]
    fn test_wrapped_missing_descriptor_keeps_its_code() {
        let result: Result<(), SequencerError> = Err(SequencerError::MissingDescriptor {
            package: "petsc".to_string(),
        });
        let err = result.context("install failed").unwrap_err();
        assert_eq!(exit_code_for(&err), exit_code::MISSING_DESCRIPTOR);
    }

    #[test]
    fn test_package_failure_maps_to_tool_code() {
        let err = anyhow::Error::from(SequencerError::PackageFailed {
            package: "p4est".to_string(),
            source: DescriptorError::Unsupported {
                package: "p4est".to_string(),
                reason: "test".to_string(),
            },
        });
        assert_eq!(exit_code_for(&err), exit_code::TOOL);
    }

    #[test]
    fn test_unclassified_error_maps_to_failure() {
        let err = anyhow::anyhow!("disk on fire");
        assert_eq!(exit_code_for(&err), exit_code::FAILURE);
    }

    #[test]
    fn test_sequencer_error_reports_package() {
        let err = SequencerError::MissingDescriptor {
            package: "petsc".to_string(),
        };
        assert_eq!(err.package(), Some("petsc"));
        assert!(err.to_string().contains("petsc"));
    }
}
