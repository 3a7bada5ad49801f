//! Image downloader
//!
//! Fetches each image URL with a plain GET and writes the body to a file name
//! derived from the URL. Downloads run one at a time; the first failure aborts
//! the batch. Files already on disk are reused when they decode as images,
//! which makes a re-run after a partial failure pick up where it stopped.
//! Bodies land in a temporary file that is renamed into place once complete.

use sabueso_common::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::db::ImageRecord;

const USER_AGENT: &str = concat!("sabueso-tagger/", env!("CARGO_PKG_VERSION"));

/// Twitter media prefix stripped from image URLs
pub const DEFAULT_URL_PREFIX: &str = "http://pbs.twimg.com/media/";

/// One image handled by [`ImageFetcher::download`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedImage {
    /// Image record id
    pub id: i64,
    /// Image record parent id
    pub parent_id: i64,
    pub url: String,
    /// Local file the image was written to
    pub path: PathBuf,
    /// True when a readable file was on disk before this batch and no
    /// request was made
    pub skipped: bool,
}

/// Derive the local file name for an image URL
///
/// Removes every occurrence of `prefix`, deletes `:` and turns `/` into `-`.
/// Only collision-free for URLs under the known media prefix.
pub fn file_name_for(url: &str, prefix: &str) -> String {
    let stripped = if prefix.is_empty() {
        url.to_string()
    } else {
        url.replace(prefix, "")
    };
    stripped.replace(':', "").replace('/', "-")
}

/// Sequential HTTP image downloader
pub struct ImageFetcher {
    http_client: reqwest::Client,
    url_prefix: String,
}

impl ImageFetcher {
    pub fn new(url_prefix: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url_prefix: url_prefix.into(),
        })
    }

    pub fn file_name_for(&self, url: &str) -> String {
        file_name_for(url, &self.url_prefix)
    }

    /// Download every record's image into `save_dir`
    ///
    /// Results are in record order. On error, files written before the
    /// failing record remain on disk.
    pub async fn download(
        &self,
        records: &[ImageRecord],
        save_dir: &Path,
    ) -> Result<Vec<DownloadedImage>> {
        if records.is_empty() {
            tracing::info!(dir = %save_dir.display(), "No image records to download");
            return Ok(Vec::new());
        }

        tokio::fs::create_dir_all(save_dir).await.map_err(|e| {
            tracing::error!(dir = %save_dir.display(), error = %e, "Failed to create download directory");
            Error::download(save_dir.display().to_string(), e)
        })?;

        let mut downloaded = Vec::with_capacity(records.len());
        let mut written: HashSet<PathBuf> = HashSet::new();

        for record in records {
            let file_name = self.file_name_for(&record.url);
            if file_name.is_empty() {
                return Err(Error::download(&record.url, "URL yields an empty file name"));
            }
            let full_path = save_dir.join(&file_name);

            let skipped = if written.contains(&full_path) {
                tracing::debug!(url = %record.url, path = %full_path.display(), "File already written in this batch");
                false
            } else if self.is_reusable(&record.url, &full_path).await? {
                tracing::debug!(url = %record.url, path = %full_path.display(), "Already downloaded, skipping");
                true
            } else {
                tracing::info!(url = %record.url, path = %full_path.display(), "Downloading image");
                let body = self.fetch(&record.url).await?;
                write_file(save_dir, &full_path, &body).await.map_err(|e| {
                    tracing::error!(path = %full_path.display(), error = %e, "Failed to save image");
                    Error::download(&record.url, e)
                })?;
                written.insert(full_path.clone());
                false
            };

            downloaded.push(DownloadedImage {
                id: record.id,
                parent_id: record.parent_id,
                url: record.url.clone(),
                path: full_path,
                skipped,
            });
        }

        tracing::info!(
            total = downloaded.len(),
            skipped = downloaded.iter().filter(|d| d.skipped).count(),
            dir = %save_dir.display(),
            "Image download complete"
        );

        Ok(downloaded)
    }

    /// GET `url` and buffer the full body
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!(url, error = %e, "Image request failed");
            Error::download(url, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(url, status = status.as_u16(), "Image request returned error status");
            return Err(Error::download(url, format!("HTTP {}", status)));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(url, error = %e, "Failed to read image body");
            Error::download(url, e)
        })?;

        Ok(body.to_vec())
    }

    /// An existing file is reused only if it decodes as an image
    async fn is_reusable(&self, url: &str, path: &Path) -> Result<bool> {
        let exists = tokio::fs::try_exists(path).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to check for existing image");
            Error::download(url, e)
        })?;
        if !exists {
            return Ok(false);
        }

        let owned_path = path.to_path_buf();
        let readable = tokio::task::spawn_blocking(move || image::open(&owned_path).is_ok())
            .await
            .unwrap_or(false);
        if !readable {
            tracing::warn!(path = %path.display(), "Existing file is not a readable image, downloading again");
        }
        Ok(readable)
    }
}

/// Write into a temporary file next to `path`, then rename it into place
///
/// An interrupted write never leaves a partial file under the final name;
/// the temporary file is removed on every error path.
async fn write_file(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let (file, temp_path) = tempfile::Builder::new()
        .prefix(".sabueso-")
        .suffix(".part")
        .tempfile_in(dir)?
        .into_parts();

    let mut file = tokio::fs::File::from_std(file);
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);

    temp_path.persist(path).map_err(|e| e.error)?;
    Ok(())
}
