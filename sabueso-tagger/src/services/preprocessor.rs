//! Image batch preparation
//!
//! Loads saved images, hard-resizes them to the model input size (no aspect
//! ratio preservation) and stacks them into a `[K, H, W, 3]` batch with the
//! model's normalization applied.

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use sabueso_common::{Error, Normalization, Result};
use std::path::Path;

/// ImageNet channel means in BGR order, 0-255 scale
pub const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

/// ImageNet channel means in RGB order, 0-1 scale
pub const TORCH_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations in RGB order, 0-1 scale
pub const TORCH_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub const DEFAULT_HEIGHT: u32 = 224;
pub const DEFAULT_WIDTH: u32 = 224;

#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    height: u32,
    width: u32,
    normalization: Normalization,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_HEIGHT, DEFAULT_WIDTH, Normalization::Caffe)
    }
}

impl ImagePreprocessor {
    pub fn new(height: u32, width: u32, normalization: Normalization) -> Self {
        Self {
            height,
            width,
            normalization,
        }
    }

    /// Build the batch; row `n` of the result is `paths[n]`
    ///
    /// A missing or undecodable file fails the whole batch.
    pub fn prepare<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Array4<f32>> {
        let (h, w) = (self.height as usize, self.width as usize);
        let mut batch = Array4::<f32>::zeros((paths.len(), h, w, 3));

        for (n, path) in paths.iter().enumerate() {
            let image = self.load_resized(path.as_ref())?;
            for (x, y, pixel) in image.enumerate_pixels() {
                for c in 0..3 {
                    batch[[n, y as usize, x as usize, c]] = self.normalize(&pixel.0, c);
                }
            }
        }

        tracing::debug!(images = paths.len(), height = h, width = w, "Prepared image batch");
        Ok(batch)
    }

    fn load_resized(&self, path: &Path) -> Result<RgbImage> {
        let image = image::open(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to load image");
            Error::Decode(format!("{}: {}", path.display(), e))
        })?;

        Ok(image
            .resize_exact(self.width, self.height, FilterType::Nearest)
            .to_rgb8())
    }

    /// Value of output channel `c` for an RGB pixel
    fn normalize(&self, rgb: &[u8; 3], c: usize) -> f32 {
        match self.normalization {
            // Output channels are BGR
            Normalization::Caffe => rgb[2 - c] as f32 - CAFFE_MEAN_BGR[c],
            Normalization::Torch => (rgb[c] as f32 / 255.0 - TORCH_MEAN[c]) / TORCH_STD[c],
        }
    }
}

/// Prepare a ResNet50-style batch (`Caffe` normalization)
pub fn prepare<P: AsRef<Path>>(paths: &[P], height: u32, width: u32) -> Result<Array4<f32>> {
    ImagePreprocessor::new(height, width, Normalization::Caffe).prepare(paths)
}

/// `[K, H, W, C]` -> `[K, C, H, W]`
pub fn to_channels_first(batch: Array4<f32>) -> Array4<f32> {
    batch
        .permuted_axes([0, 3, 1, 2])
        .as_standard_layout()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn solid_png(dir: &TempDir, name: &str, w: u32, h: u32, rgb: [u8; 3]) -> PathBuf {
        let path = dir.path().join(name);
        RgbImage::from_pixel(w, h, Rgb(rgb)).save(&path).unwrap();
        path
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_batch_shape_for_mixed_sizes() {
        let dir = TempDir::new().unwrap();
        let paths = vec![
            solid_png(&dir, "wide.png", 640, 120, [0, 0, 0]),
            solid_png(&dir, "tall.png", 31, 500, [255, 255, 255]),
            solid_png(&dir, "tiny.png", 1, 1, [1, 2, 3]),
        ];

        let batch = prepare(&paths, 224, 224).unwrap();
        assert_eq!(batch.shape(), &[3, 224, 224, 3]);
    }

    #[test]
    fn test_caffe_normalization_flips_to_bgr_and_centers() {
        let dir = TempDir::new().unwrap();
        let path = solid_png(&dir, "px.png", 8, 8, [10, 20, 30]);

        let batch = prepare(&[path], 4, 4).unwrap();
        assert!(close(batch[[0, 0, 0, 0]], 30.0 - 103.939));
        assert!(close(batch[[0, 3, 3, 1]], 20.0 - 116.779));
        assert!(close(batch[[0, 2, 1, 2]], 10.0 - 123.68));
    }

    #[test]
    fn test_torch_normalization() {
        let dir = TempDir::new().unwrap();
        let path = solid_png(&dir, "px.png", 2, 2, [255, 0, 128]);

        let batch = ImagePreprocessor::new(2, 2, Normalization::Torch)
            .prepare(&[path])
            .unwrap();
        assert!(close(batch[[0, 0, 0, 0]], (1.0 - 0.485) / 0.229));
        assert!(close(batch[[0, 0, 0, 1]], (0.0 - 0.456) / 0.224));
        assert!(close(batch[[0, 1, 1, 2]], (128.0 / 255.0 - 0.406) / 0.225));
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let result = prepare(&[dir.path().join("absent.jpg")], 224, 224);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_non_image_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not_an_image.jpg");
        std::fs::write(&path, b"<html>404</html>").unwrap();

        let result = prepare(&[path], 224, 224);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_empty_batch() {
        let paths: Vec<PathBuf> = Vec::new();
        let batch = prepare(&paths, 224, 224).unwrap();
        assert_eq!(batch.shape(), &[0, 224, 224, 3]);
    }

    #[test]
    fn test_channels_first_layout() {
        let dir = TempDir::new().unwrap();
        let path = solid_png(&dir, "px.png", 3, 2, [10, 20, 30]);

        let nhwc = prepare(&[path], 2, 3).unwrap();
        let nchw = to_channels_first(nhwc.clone());
        assert_eq!(nchw.shape(), &[1, 3, 2, 3]);
        assert_eq!(nchw[[0, 2, 1, 0]], nhwc[[0, 1, 0, 2]]);
        assert!(nchw.is_standard_layout());
    }
}
