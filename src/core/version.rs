//! deal.II version handling
//!
//! deal.II tags releases as `vX.Y.Z` while users usually write `X.Y` or
//! `X.Y.Z` in the config. Everything is normalized to a full semver
//! [`Version`] before comparing against the supported baseline.

use semver::Version;

use crate::config::defaults::MIN_DEAL_II_VERSION;
use crate::error::ConfigError;

/// Parse `X.Y`, `X.Y.Z` or `vX.Y.Z` into a full semver version
///
/// `field` names the config entry in the error message.
pub fn parse_release(field: &str, value: &str) -> Result<Version, ConfigError> {
    let trimmed = value.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let normalized = match bare.matches('.').count() {
        1 => format!("{bare}.0"),
        _ => bare.to_string(),
    };

    Version::parse(&normalized).map_err(|e| ConfigError::InvalidVersion {
        field: field.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Check a parsed version against [`MIN_DEAL_II_VERSION`]
pub fn check_minimum(field: &str, version: &Version) -> Result<(), ConfigError> {
    let minimum = Version::parse(MIN_DEAL_II_VERSION).map_err(|e| ConfigError::InvalidVersion {
        field: field.to_string(),
        value: MIN_DEAL_II_VERSION.to_string(),
        reason: e.to_string(),
    })?;

    if version < &minimum {
        return Err(ConfigError::UnsupportedVersion {
            field: field.to_string(),
            version: version.to_string(),
            minimum: minimum.to_string(),
        });
    }
    Ok(())
}

/// Parse a deal.II version and enforce the supported baseline
pub fn parse_dealii_version(field: &str, value: &str) -> Result<Version, ConfigError> {
    let version = parse_release(field, value)?;
    check_minimum(field, &version)?;
    Ok(version)
}

/// Git tag deal.II uses for a release
pub fn dealii_tag(version: &Version) -> String {
    format!("v{version}")
}
