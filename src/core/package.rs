//! Package requests and compiler identities
//!
//! Both use the spack spec syntax users already know from the config file:
//! `name[@version][+variant|~variant]...` and `compiler@version`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// One package the user asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequest {
    /// Package name (e.g. "openmpi")
    pub name: String,
    /// Requested version, descriptor default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Variant flags in request order, each starting with `+` or `~`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,
}

impl PackageRequest {
    /// Request a package by name only
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            variants: Vec::new(),
        }
    }

    /// Pin a version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add a variant flag such as `+gsl`; duplicates are ignored
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        let variant = variant.into();
        if !self.variants.contains(&variant) {
            self.variants.push(variant);
        }
        self
    }

    /// Whether `+flag` was requested
    pub fn has_variant(&self, flag: &str) -> bool {
        self.variants.iter().any(|v| v == &format!("+{flag}"))
    }

    /// Parse `name[@version][+variant|~variant]...`
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPackage {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let spec_trimmed = spec.trim();
        let name_end = spec_trimmed
            .find(['@', '+', '~'])
            .unwrap_or(spec_trimmed.len());
        let name = &spec_trimmed[..name_end];
        if name.is_empty() {
            return Err(invalid("missing package name"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid("package names may only contain letters, digits, '-' and '_'"));
        }

        let mut request = Self::new(name.to_ascii_lowercase());
        let mut rest = &spec_trimmed[name_end..];

        if let Some(after_at) = rest.strip_prefix('@') {
            let version_end = after_at.find(['+', '~']).unwrap_or(after_at.len());
            let version = &after_at[..version_end];
            if version.is_empty() || version.contains('@') {
                return Err(invalid("malformed version after '@'"));
            }
            request.version = Some(version.to_string());
            rest = &after_at[version_end..];
        }

        while !rest.is_empty() {
            let sigil = &rest[..1];
            let body = &rest[1..];
            let end = body.find(['+', '~']).unwrap_or(body.len());
            let flag = &body[..end];
            if flag.is_empty() || flag.contains('@') {
                return Err(invalid("malformed variant"));
            }
            request = request.with_variant(format!("{sigil}{flag}"));
            rest = &body[end..];
        }

        Ok(request)
    }

    /// Spack spec string for this request
    pub fn spec(&self) -> String {
        let mut spec = self.name.clone();
        if let Some(version) = &self.version {
            spec.push('@');
            spec.push_str(version);
        }
        for variant in &self.variants {
            spec.push_str(variant);
        }
        spec
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec())
    }
}

/// Compiler family and version selecting every package's build variant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompilerSpec {
    /// Compiler family (gcc, clang, intel, oneapi, ...)
    pub kind: String,
    /// Compiler version
    pub version: String,
}

impl CompilerSpec {
    /// Create a compiler spec
    pub fn new(kind: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            version: version.into(),
        }
    }

    /// Executable names for C, C++ and Fortran
    pub fn executables(&self) -> (&'static str, &'static str, &'static str) {
        match self.kind.as_str() {
            "clang" | "llvm" => ("clang", "clang++", "gfortran"),
            "intel" => ("icc", "icpc", "ifort"),
            "oneapi" => ("icx", "icpx", "ifx"),
            _ => ("gcc", "g++", "gfortran"),
        }
    }
}

impl fmt::Display for CompilerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.version)
    }
}
