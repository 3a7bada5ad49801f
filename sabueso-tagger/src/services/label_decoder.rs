//! Top-N label decoding
//!
//! Turns raw per-class scores into class names using the static class index
//! (`{"0": ["n01440764", "tench"], ...}`).
//!
//! Selection uses a partial select rather than a full sort; the selected
//! names are then ordered by descending score, ties going to the lower class
//! index. NaN scores rank above every number.

use ndarray::{ArrayView1, ArrayView2};
use sabueso_common::{Error, Result};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

/// One class index entry: WordNet-style code and human readable name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClassEntry(pub String, pub String);

impl ClassEntry {
    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn name(&self) -> &str {
        &self.1
    }
}

/// Model output index -> class, keyed by the stringified index
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ClassIndex(HashMap<String, ClassEntry>);

impl ClassIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to read class index");
            Error::Decode(format!("class index {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
            .map_err(|e| Error::Decode(format!("class index {}: {}", path.display(), e)))
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ClassEntry> {
        self.0.get(&index.to_string())
    }

    /// Human readable name for a model output index
    pub fn name(&self, index: usize) -> Result<&str> {
        self.get(index)
            .map(ClassEntry::name)
            .ok_or_else(|| Error::Decode(format!("class index has no entry for {}", index)))
    }
}

/// Indices of the `top` highest scores, highest first
pub fn top_indices(scores: ArrayView1<'_, f32>, top: usize) -> Vec<usize> {
    let n = scores.len();
    let top = top.min(n);
    if top == 0 {
        return Vec::new();
    }

    // Ascending rank: higher score first, then lower index wins a tie
    let rank = |a: &usize, b: &usize| -> Ordering {
        scores[*a].total_cmp(&scores[*b]).then(b.cmp(a))
    };

    // Partial selection: after this, the last `top` slots hold the largest ranks
    let mut indices: Vec<usize> = (0..n).collect();
    if top < n {
        indices.select_nth_unstable_by(n - top, rank);
    }

    let mut selected = indices.split_off(n - top);
    selected.sort_unstable_by(|a, b| rank(b, a));
    selected
}

/// One list of `top` class names per prediction row, in row order
pub fn decode(
    predictions: ArrayView2<'_, f32>,
    class_index: &ClassIndex,
    top: usize,
) -> Result<Vec<Vec<String>>> {
    let classes = predictions.ncols();
    if top > classes {
        return Err(Error::Decode(format!(
            "cannot take top {} of {} classes",
            top, classes
        )));
    }

    predictions
        .rows()
        .into_iter()
        .map(|row| {
            top_indices(row, top)
                .into_iter()
                .map(|i| class_index.name(i).map(str::to_string))
                .collect::<Result<Vec<String>>>()
        })
        .collect()
}

/// Read the class index file, then [`decode`]
pub fn decode_with_index_file(
    predictions: ArrayView2<'_, f32>,
    class_index_path: &Path,
    top: usize,
) -> Result<Vec<Vec<String>>> {
    let class_index = ClassIndex::load(class_index_path)?;
    decode(predictions, &class_index, top)
}
