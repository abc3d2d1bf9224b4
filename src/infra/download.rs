//! Source archive downloads
//!
//! Streams release tarballs to disk while hashing them, retries with
//! exponential backoff, and verifies sha256 when the recipe knows it. Bytes
//! land in `<dest>.part` and are renamed to `dest` only once complete, so an
//! interrupted run never leaves a truncated archive under the final name.

use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;

use crate::config::defaults;
use crate::error::DownloadError;

/// One archive to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub dest: PathBuf,
    /// Expected sha256; unverified when absent
    pub sha256: Option<String>,
}

/// A finished download
#[derive(Debug)]
pub struct DownloadResult {
    pub path: PathBuf,
    pub size: u64,
    /// sha256 of what was written
    pub checksum: String,
}

/// Downloads files with retry and bounded parallelism
#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: reqwest::Client,
    max_retries: u32,
    /// First backoff delay; doubles per attempt up to 30s
    base_delay_ms: u64,
}

impl DownloadManager {
    pub fn new() -> Self {
        Self::with_config(defaults::MAX_DOWNLOAD_RETRIES, 1000)
    }

    /// Download manager with custom retry settings
    pub fn with_config(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(600))
                .connect_timeout(Duration::from_secs(30))
                .user_agent(concat!("candi/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            max_retries: max_retries.max(1),
            base_delay_ms,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Download `url` to `dest`, retrying transient failures
    ///
    /// The partial file is removed when every attempt fails.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<DownloadResult, DownloadError> {
        let mut last_error = None;
        let mut delay_ms = self.base_delay_ms;

        for attempt in 1..=self.max_retries {
            match self.download_once(url, dest).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!("Download attempt {attempt}/{} failed: {e}", self.max_retries);
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(30_000);
                    }
                }
            }
        }

        let _ = tokio::fs::remove_file(partial_path(dest)).await;

        Err(last_error.unwrap_or_else(|| DownloadError::MaxRetriesExceeded {
            url: url.to_string(),
            retries: self.max_retries,
        }))
    }

    async fn download_once(&self, url: &str, dest: &Path) -> Result<DownloadResult, DownloadError> {
        let network = |error: String| DownloadError::NetworkError {
            url: url.to_string(),
            error,
        };
        let io = |path: &Path, e: std::io::Error| DownloadError::IoError {
            path: path.to_path_buf(),
            error: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(network(format!("HTTP {}", response.status())));
        }
        let response_len = response.content_length();

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io(parent, e))?;
        }

        let partial = partial_path(dest);
        let mut file = File::create(&partial).await.map_err(|e| io(&partial, e))?;
        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| network(e.to_string()))?;
            file.write_all(&chunk).await.map_err(|e| io(&partial, e))?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
        }

        if let Some(expected) = response_len {
            if downloaded != expected {
                return Err(network(format!("expected {expected} bytes, got {downloaded}")));
            }
        }

        file.flush().await.map_err(|e| io(&partial, e))?;
        drop(file);
        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| io(dest, e))?;

        Ok(DownloadResult {
            path: dest.to_path_buf(),
            size: downloaded,
            checksum: hex::encode(hasher.finalize()),
        })
    }

    /// Download and, when `expected` is given, verify the sha256
    ///
    /// A mismatching file is deleted.
    pub async fn download_verified(
        &self,
        url: &str,
        dest: &Path,
        expected: Option<&str>,
    ) -> Result<DownloadResult, DownloadError> {
        let result = self.download(url, dest).await?;

        if let Some(expected) = expected {
            if !result.checksum.eq_ignore_ascii_case(expected) {
                let _ = tokio::fs::remove_file(dest).await;
                return Err(DownloadError::ChecksumFailed {
                    file: dest.display().to_string(),
                });
            }
        }

        Ok(result)
    }

    /// Download several archives, at most `max_parallel` at a time
    ///
    /// Results come back in request order.
    pub async fn download_parallel(
        &self,
        requests: Vec<DownloadRequest>,
        max_parallel: usize,
    ) -> Vec<Result<DownloadResult, DownloadError>> {
        let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));

        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let sem = semaphore.clone();
                let manager = self.clone();

                tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await.map_err(|e| DownloadError::NetworkError {
                        url: request.url.clone(),
                        error: e.to_string(),
                    })?;
                    manager
                        .download_verified(&request.url, &request.dest, request.sha256.as_deref())
                        .await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(DownloadError::NetworkError {
                    url: "unknown".to_string(),
                    error: e.to_string(),
                }),
            });
        }
        results
    }
}

impl Default for DownloadManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the bytes of `dest` are written until the download completes
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Whether the file at `path` has sha256 `expected`
pub fn verify_checksum(path: &Path, expected: &str) -> Result<bool, DownloadError> {
    let content = std::fs::read(path).map_err(|e| DownloadError::IoError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    Ok(compute_checksum(&content).eq_ignore_ascii_case(expected))
}

/// Hex sha256 of `data`
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
