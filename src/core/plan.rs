//! Install plan construction
//!
//! The whole ordering rule: `cuda`, `kokkos` and `openmpi` go first, in that
//! order, when requested; everything else follows in request order. Every
//! name appears once.

use serde::Serialize;
use std::collections::HashSet;

use crate::config::defaults::PRIORITY_PACKAGES;
use crate::core::package::PackageRequest;

/// Ordered, de-duplicated list of packages to install
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InstallPlan {
    entries: Vec<PackageRequest>,
}

impl InstallPlan {
    /// Plan entries in install order
    pub fn entries(&self) -> &[PackageRequest] {
        &self.entries
    }

    /// Package names in install order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the plan installs nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `name`, if planned
    pub fn get(&self, name: &str) -> Option<&PackageRequest> {
        self.entries.iter().find(|e| e.name == name)
    }
}

impl<'a> IntoIterator for &'a InstallPlan {
    type Item = &'a PackageRequest;
    type IntoIter = std::slice::Iter<'a, PackageRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Build the install plan for `requested`
///
/// `cuda` is added when `cuda_enabled` is set. For a name requested more than
/// once, the first request (with its version and variants) is kept.
pub fn build_plan(requested: &[PackageRequest], cuda_enabled: bool) -> InstallPlan {
    let mut seen = HashSet::new();
    let mut unique: Vec<PackageRequest> = requested
        .iter()
        .filter(|req| seen.insert(req.name.clone()))
        .cloned()
        .collect();

    if cuda_enabled && seen.insert("cuda".to_string()) {
        unique.push(PackageRequest::new("cuda"));
    }

    let mut entries = Vec::with_capacity(unique.len());
    for priority in PRIORITY_PACKAGES {
        if let Some(pos) = unique.iter().position(|req| req.name == *priority) {
            entries.push(unique.remove(pos));
        }
    }
    entries.extend(unique);

    tracing::debug!(
        "Install plan: {}",
        entries
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    InstallPlan { entries }
}

/// [`build_plan`] over bare package names
pub fn build_plan_from_names<S: AsRef<str>>(requested: &[S], cuda_enabled: bool) -> InstallPlan {
    let requests: Vec<PackageRequest> = requested
        .iter()
        .map(|name| PackageRequest::new(name.as_ref()))
        .collect();
    build_plan(&requests, cuda_enabled)
}
