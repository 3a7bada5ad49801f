//! Upload mapping: per-entity state accumulated before label write-back
//!
//! Entries keep insertion order so that the image path list, the prediction
//! batch rows and the decoded labels all line up by index.

use sabueso_common::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::services::image_fetcher::DownloadedImage;

/// Per-entity record of the upload mapping
#[derive(Debug, Clone, PartialEq)]
pub struct UploadEntry {
    /// Local path of the downloaded image
    pub path: PathBuf,
    /// Parent id carried over from the image record
    pub parent_id: i64,
    /// Tweet ids accumulated by the join step
    pub tweet_ids: Vec<i64>,
    /// Top-N labels, empty until classification ran
    pub labels: Vec<String>,
}

impl UploadEntry {
    pub fn new(path: PathBuf, parent_id: i64) -> Self {
        Self {
            path,
            parent_id,
            tweet_ids: Vec::new(),
            labels: Vec::new(),
        }
    }
}

/// Insertion-ordered map from entity identifier to [`UploadEntry`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadMapping {
    keys: Vec<i64>,
    entries: Vec<UploadEntry>,
    index: HashMap<i64, usize>,
}

impl UploadMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// One entry per download, keyed by the image record id, in download order
    pub fn from_downloads(downloads: &[DownloadedImage]) -> Self {
        let mut mapping = Self::new();
        for image in downloads {
            mapping.insert(image.id, UploadEntry::new(image.path.clone(), image.parent_id));
        }
        mapping
    }

    /// Insert an entry; an existing key keeps its position and gets the new entry
    pub fn insert(&mut self, key: i64, entry: UploadEntry) {
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.index.insert(key, self.entries.len());
                self.keys.push(key);
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, key: i64) -> Option<&UploadEntry> {
        self.index.get(&key).map(|&pos| &self.entries[pos])
    }

    /// Mutable access that treats a missing key as a lookup failure
    pub fn entry_mut(&mut self, key: i64) -> Result<&mut UploadEntry> {
        match self.index.get(&key) {
            Some(&pos) => Ok(&mut self.entries[pos]),
            None => Err(Error::Lookup(key)),
        }
    }

    pub fn contains_key(&self, key: i64) -> bool {
        self.index.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &UploadEntry)> {
        self.keys.iter().copied().zip(self.entries.iter())
    }

    /// Image paths in mapping order (batch order for prediction)
    pub fn paths(&self) -> Vec<&Path> {
        self.entries.iter().map(|e| e.path.as_path()).collect()
    }

    /// Attach one label list per entry, in mapping order
    pub fn with_labels(mut self, labels: Vec<Vec<String>>) -> Result<Self> {
        if labels.len() != self.entries.len() {
            return Err(Error::InvalidInput(format!(
                "got {} label lists for {} upload entries",
                labels.len(),
                self.entries.len()
            )));
        }

        for (entry, image_labels) in self.entries.iter_mut().zip(labels) {
            entry.labels = image_labels;
        }
        Ok(self)
    }
}
