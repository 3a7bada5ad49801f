//! Run results printed by the CLI

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Labels for one downloaded image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedImage {
    /// Local path of the image file
    pub path: PathBuf,
    /// Top-N class names
    pub labels: Vec<String>,
}

/// Result of the classify-only run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Rows served by a file written in this run, including rows that share
    /// a file name with an earlier row of the same batch
    pub downloaded: usize,
    /// Rows reusing a readable image that was on disk before the run
    pub skipped: usize,
    /// Labels per image, in image table order
    pub images: Vec<ClassifiedImage>,
}

/// Result of the classify-and-write-back run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagReport {
    /// Rows served by a file written in this run, including rows that share
    /// a file name with an earlier row of the same batch
    pub downloaded: usize,
    /// Rows reusing a readable image that was on disk before the run
    pub skipped: usize,
    /// Tweet rows joined into the upload mapping
    pub tweets_joined: usize,
    /// Entities whose labels were written
    pub entries_written: usize,
    /// Database rows touched by the update statements
    pub rows_affected: u64,
    /// Whether the update transaction was committed
    pub committed: bool,
    /// Labels per image, in image table order
    pub images: Vec<ClassifiedImage>,
}
