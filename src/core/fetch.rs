//! Source pre-fetch
//!
//! Downloads every archive and clones every git checkout a plan needs into
//! the source root before the first package builds. Archives download in
//! parallel; clones run on the blocking pool. Failures are collected, not
//! raised, so one run reports everything that is missing.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::defaults;
use crate::core::descriptor::{DescriptorRegistry, SourceSpec};
use crate::core::plan::InstallPlan;
use crate::infra::download::{verify_checksum, DownloadManager, DownloadRequest};
use crate::infra::git::GitOperations;

/// Errors that can occur during fetch
#[derive(Error, Debug)]
pub enum FetchError {
    /// Some sources could not be fetched
    #[error("Failed to fetch sources for: {}", names(.failed))]
    Incomplete { failed: Vec<(String, String)> },

    /// The source root could not be prepared
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },
}

fn names(failed: &[(String, String)]) -> String {
    failed
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Options for fetching sources
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Concurrent archive downloads
    pub parallel: usize,
    /// Fetch again even when the source is already on disk
    pub force: bool,
    /// Attempts per archive
    pub max_retries: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            parallel: defaults::DEFAULT_PARALLEL_DOWNLOADS,
            force: false,
            max_retries: defaults::MAX_DOWNLOAD_RETRIES,
        }
    }
}

/// A source fetched in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSource {
    pub name: String,
    pub path: PathBuf,
}

/// Result of fetching a plan's sources
#[derive(Debug, Default)]
pub struct FetchResult {
    /// Fetched in this run
    pub fetched: Vec<FetchedSource>,
    /// Already on disk
    pub skipped: Vec<String>,
    /// Package name and error message
    pub failed: Vec<(String, String)>,
}

impl FetchResult {
    /// Whether every source is now on disk
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn recorded failures into [`FetchError::Incomplete`]
    pub fn into_result(self) -> Result<Self, FetchError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(FetchError::Incomplete {
                failed: self.failed,
            })
        }
    }
}

/// Fetch the sources of every plan entry into `source_root`
///
/// Entries without a registered descriptor, or whose descriptor needs no
/// sources, are ignored.
pub async fn fetch_sources(
    plan: &InstallPlan,
    registry: &DescriptorRegistry,
    source_root: &Path,
    options: &FetchOptions,
) -> Result<FetchResult, FetchError> {
    tokio::fs::create_dir_all(source_root)
        .await
        .map_err(|e| FetchError::IoError {
            path: source_root.to_path_buf(),
            error: e.to_string(),
        })?;

    let mut result = FetchResult::default();
    let mut archives: Vec<(String, DownloadRequest)> = Vec::new();
    let mut checkouts: Vec<(String, SourceSpec)> = Vec::new();

    for request in plan {
        let Some(source) = registry
            .get(&request.name)
            .and_then(|descriptor| descriptor.source(request))
        else {
            continue;
        };

        let local = source.local_path(source_root);
        if !options.force && is_fetched(&source, &local) {
            tracing::debug!("{} sources already at {}", request.name, local.display());
            result.skipped.push(request.name.clone());
            continue;
        }

        match source {
            SourceSpec::Archive { url, sha256, .. } => archives.push((
                request.name.clone(),
                DownloadRequest {
                    url,
                    dest: local,
                    sha256,
                },
            )),
            git @ SourceSpec::Git { .. } => checkouts.push((request.name.clone(), git)),
        }
    }

    if !archives.is_empty() {
        tracing::info!("Downloading {} archives", archives.len());
        let manager = DownloadManager::with_config(options.max_retries, 1000);
        let (archive_names, requests): (Vec<String>, Vec<DownloadRequest>) =
            archives.into_iter().unzip();
        let outcomes = manager.download_parallel(requests, options.parallel).await;

        for (name, outcome) in archive_names.into_iter().zip(outcomes) {
            match outcome {
                Ok(download) => result.fetched.push(FetchedSource {
                    name,
                    path: download.path,
                }),
                Err(e) => {
                    tracing::error!("Fetching {name} failed: {e}");
                    result.failed.push((name, e.to_string()));
                }
            }
        }
    }

    let clones: Vec<_> = checkouts
        .into_iter()
        .filter_map(|(name, source)| match source {
            SourceSpec::Git {
                url,
                tag,
                dir_name,
            } => {
                let work_dir = source_root.to_path_buf();
                let handle = tokio::task::spawn_blocking(move || {
                    GitOperations::new(work_dir).clone_repo(&url, &tag, &dir_name)
                });
                Some((name, handle))
            }
            SourceSpec::Archive { .. } => None,
        })
        .collect();

    for (name, handle) in clones {
        match handle.await {
            Ok(Ok(clone)) => result.fetched.push(FetchedSource {
                name,
                path: clone.path,
            }),
            Ok(Err(e)) => {
                tracing::error!("Cloning {name} failed: {e}");
                result.failed.push((name, e.to_string()));
            }
            Err(e) => result.failed.push((name, e.to_string())),
        }
    }

    Ok(result)
}

/// Whether `local` already holds the source
///
/// An archive with a known checksum must match it; a mismatching file is
/// removed so it is fetched again.
fn is_fetched(source: &SourceSpec, local: &Path) -> bool {
    if !local.exists() {
        return false;
    }
    match source {
        SourceSpec::Archive {
            sha256: Some(expected),
            ..
        } => {
            if verify_checksum(local, expected).unwrap_or(false) {
                true
            } else {
                tracing::warn!("Checksum mismatch for {}, fetching again", local.display());
                let _ = std::fs::remove_file(local);
                false
            }
        }
        SourceSpec::Archive { sha256: None, .. } | SourceSpec::Git { .. } => true,
    }
}
