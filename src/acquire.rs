//! Dataset acquisition.
//!
//! Guarantees a local copy of the RNC dataset by downloading the published
//! ZIP archive and extracting the first entry whose name ends with the
//! configured suffix (case-insensitive).
//!
//! # Workflow
//!
//! 1. Create a scratch [`TempDir`] next to the target file.
//! 2. `GET` the archive with a browser-like `User-Agent` (the DGII site
//!    rejects unidentified clients) and a fixed timeout. One attempt only.
//! 3. Extract the matching entry into the scratch directory.
//! 4. Rename it over the target path.
//!
//! The scratch directory is removed when the [`TempDir`] drops, on success
//! and on every error path.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::StatusCode;
use tempfile::TempDir;
use thiserror::Error;

use crate::config::SourceConfig;
use crate::context::Context;
use crate::store::IndexStore;

const ARCHIVE_FILE: &str = "dataset.zip";
const EXTRACTED_FILE: &str = "dataset.part";

/// Failure to obtain a local copy of the dataset.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("I/O error while storing the dataset: {0}")]
    Io(#[from] io::Error),
}

/// The archive downloaded but holds no usable dataset entry.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("archive has no entry ending in '{suffix}'")]
    MissingEntry { suffix: String },
    #[error("invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// What an acquisition call did to the local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    /// A file was already at the target path; nothing was downloaded.
    AlreadyPresent,
    /// No file existed; a fresh copy was written.
    Created,
    /// An existing file was overwritten with a fresh copy.
    Replaced,
}

/// Downloads and unpacks the dataset archive.
#[derive(Debug, Clone)]
pub struct Acquirer {
    client: reqwest::Client,
    url: String,
    entry_suffix: String,
}

impl Acquirer {
    /// Builds the HTTP client with the configured timeout and `User-Agent`.
    pub fn new(config: &SourceConfig) -> Result<Self, AcquisitionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| AcquisitionError::Download {
                url: config.url.clone(),
                source,
            })?;
        Ok(Self {
            client,
            url: config.url.clone(),
            entry_suffix: config.entry_suffix.to_lowercase(),
        })
    }

    /// Archive URL this acquirer downloads from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Downloads the dataset to `path` unless a file is already there.
    pub async fn ensure(&self, path: &Path) -> Result<Fetched, AcquisitionError> {
        if path.exists() {
            return Ok(Fetched::AlreadyPresent);
        }
        self.fetch_into(path).await?;
        Ok(Fetched::Created)
    }

    /// Downloads a fresh copy over `path` and reloads `store`.
    ///
    /// The store is reloaded when an older file was replaced, or when it
    /// already serves a snapshot. A failed reload is logged and does not
    /// fail the refresh; the previous snapshot stays published.
    pub async fn refresh(
        &self,
        path: &Path,
        store: Arc<IndexStore>,
    ) -> Result<Fetched, AcquisitionError> {
        let existed = path.exists();
        self.fetch_into(path).await?;
        let fetched = if existed {
            Fetched::Replaced
        } else {
            Fetched::Created
        };

        if existed || store.snapshot().is_some() {
            match tokio::task::spawn_blocking(move || store.reload()).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "dataset refreshed but index reload failed")
                }
                Err(err) => {
                    tracing::warn!(error = %err, "dataset refreshed but index reload panicked")
                }
            }
        }
        Ok(fetched)
    }

    async fn fetch_into(&self, path: &Path) -> Result<(), AcquisitionError> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;
        let scratch = tempfile::Builder::new()
            .prefix(".rncs-download-")
            .tempdir_in(&parent)?;

        tracing::info!(url = %self.url, "downloading dataset archive");
        let archive_path = scratch.path().join(ARCHIVE_FILE);
        let size = self.download(&archive_path).await?;

        let suffix = self.entry_suffix.clone();
        let target = path.to_path_buf();
        let (entry, bytes) =
            tokio::task::spawn_blocking(move || extract_and_place(scratch, &suffix, &target))
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;

        tracing::info!(
            archive_bytes = size,
            entry = %entry,
            bytes,
            path = %path.display(),
            "dataset extracted"
        );
        Ok(())
    }

    async fn download(&self, dest: &Path) -> Result<usize, AcquisitionError> {
        let download_err = |source| AcquisitionError::Download {
            url: self.url.clone(),
            source,
        };

        let resp = self.client.get(&self.url).send().await.map_err(download_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AcquisitionError::Status {
                url: self.url.clone(),
                status,
            });
        }
        let body = resp.bytes().await.map_err(download_err)?;
        tokio::fs::write(dest, &body).await?;
        Ok(body.len())
    }
}

/// CLI entry point for `rncs refresh`.
pub async fn run_refresh(ctx: &Context) -> anyhow::Result<()> {
    let store = ctx.store();
    let fetched = ctx
        .acquirer()
        .refresh(ctx.dataset_path(), store.clone())
        .await?;

    let current = store.snapshot();
    let snapshot = match current {
        Some(snapshot) => snapshot,
        None => tokio::task::spawn_blocking(move || store.ensure_built())
            .await?
            .map_err(|e| anyhow::anyhow!("dataset downloaded but index build failed: {}", e))?,
    };

    let action = match fetched {
        Fetched::Replaced => "replaced",
        Fetched::Created | Fetched::AlreadyPresent => "created",
    };
    println!("Dataset {} at {}", action, ctx.dataset_path().display());
    println!("records: {}", snapshot.len());
    Ok(())
}

/// Extracts the matching entry from the scratch archive and renames it over
/// `target`. Consumes `scratch` so it is removed before returning.
fn extract_and_place(
    scratch: TempDir,
    suffix: &str,
    target: &Path,
) -> Result<(String, u64), AcquisitionError> {
    let archive = File::open(scratch.path().join(ARCHIVE_FILE))?;
    let staged = scratch.path().join(EXTRACTED_FILE);
    let (entry, bytes) = extract_entry(archive, suffix, &staged)?;
    std::fs::rename(&staged, target)?;
    Ok((entry, bytes))
}

/// Copies the first non-directory entry ending in `suffix` to `dest`.
///
/// Archive problems are reported as [`AcquisitionError::Extraction`];
/// failing to write `dest` is [`AcquisitionError::Io`].
pub fn extract_entry<R: io::Read + io::Seek>(
    archive: R,
    suffix: &str,
    dest: &Path,
) -> Result<(String, u64), AcquisitionError> {
    let suffix = suffix.to_lowercase();
    let mut archive = zip::ZipArchive::new(archive).map_err(ExtractionError::from)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(ExtractionError::from)?;
        if entry.is_dir() || !entry.name().to_lowercase().ends_with(&suffix) {
            continue;
        }
        let name = entry.name().to_string();
        let mut out = File::create(dest)?;
        let bytes = io::copy(&mut entry, &mut out)?;
        return Ok((name, bytes));
    }
    Err(ExtractionError::MissingEntry { suffix }.into())
}
