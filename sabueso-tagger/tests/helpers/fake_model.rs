//! Deterministic stand-in for the pretrained model
//!
//! [`ColorPredictor`] scores the caffe-normalized batch by mean channel value,
//! so a solid red image and a solid blue image get different, predictable
//! top-3 labels:
//!
//! - red  -> `["red", "none", "blue"]`
//! - blue -> `["blue", "none", "green"]`

use anyhow::Result;
use ndarray::{Array2, Array4, Axis};
use sabueso_tagger::services::Predictor;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub const RED: [u8; 3] = [255, 0, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];

/// Class names in model output order
pub const CLASSES: [&str; 4] = ["red", "blue", "green", "none"];

/// Solid-color PNG
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Write a class index for [`CLASSES`] into `dir`
pub fn write_class_index(dir: &Path) -> Result<PathBuf> {
    let entries: Vec<String> = CLASSES
        .iter()
        .enumerate()
        .map(|(i, name)| format!("\"{}\": [\"c{:04}\", \"{}\"]", i, i, name))
        .collect();
    let path = dir.join("class_index.json");
    std::fs::write(&path, format!("{{{}}}", entries.join(", ")))?;
    Ok(path)
}

/// Scores `[mean R, mean B, mean G, 0]` per image on a BGR caffe batch
pub struct ColorPredictor;

impl Predictor for ColorPredictor {
    fn predict(&self, batch: &Array4<f32>) -> sabueso_common::Result<Array2<f32>> {
        let images = batch.shape()[0];
        let mut scores = Array2::<f32>::zeros((images, CLASSES.len()));

        for (k, image) in batch.axis_iter(Axis(0)).enumerate() {
            let channel_mean = |c: usize| image.index_axis(Axis(2), c).mean().unwrap_or(0.0);
            scores[[k, 0]] = channel_mean(2);
            scores[[k, 1]] = channel_mean(0);
            scores[[k, 2]] = channel_mean(1);
        }

        Ok(scores)
    }
}
