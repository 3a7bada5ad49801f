//! Model boundary
//!
//! The classifier itself is an external pretrained model. The pipeline only
//! needs a batch in and a `[K, C]` score matrix out.

use ndarray::{Array2, Array4};
use sabueso_common::{Error, Result};

/// Scores a preprocessed image batch
pub trait Predictor {
    /// `batch` is `[K, H, W, 3]`; the result has one row of class scores per image
    fn predict(&self, batch: &Array4<f32>) -> Result<Array2<f32>>;
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn predict(&self, batch: &Array4<f32>) -> Result<Array2<f32>> {
        (**self).predict(batch)
    }
}

/// Check that a prediction has one row per batch image
pub fn check_prediction_rows(batch: &Array4<f32>, predictions: &Array2<f32>) -> Result<()> {
    let expected = batch.shape()[0];
    let actual = predictions.nrows();
    if expected != actual {
        return Err(Error::Decode(format!(
            "model returned {} score rows for a batch of {} images",
            actual, expected
        )));
    }
    Ok(())
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxPredictor;

#[cfg(feature = "onnx")]
mod onnx {
    use super::{check_prediction_rows, Predictor};
    use crate::services::preprocessor::to_channels_first;
    use ndarray::{Array2, Array4, Ix2};
    use ort::tensor::{FromArray, InputTensor, OrtOwnedTensor};
    use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder};
    use sabueso_common::{Error, Result};
    use std::path::Path;
    use std::sync::Arc;

    /// ONNX Runtime session loaded once from a model file
    pub struct OnnxPredictor {
        session: Session,
        channels_first: bool,
    }

    fn model_error(e: impl std::fmt::Display) -> Error {
        Error::Decode(format!("model: {}", e))
    }

    impl OnnxPredictor {
        /// Load the model; `channels_first` feeds `[K, 3, H, W]` instead of `[K, H, W, 3]`
        pub fn from_file(model_path: &Path, channels_first: bool) -> Result<Self> {
            let environment = Arc::new(
                Environment::builder()
                    .with_name("sabueso-tagger")
                    .build()
                    .map_err(model_error)?,
            );

            let session = SessionBuilder::new(&environment)
                .map_err(model_error)?
                .with_optimization_level(GraphOptimizationLevel::Level1)
                .map_err(model_error)?
                .with_intra_threads(1)
                .map_err(model_error)?
                .with_model_from_file(model_path)
                .map_err(model_error)?;

            tracing::info!(model = %model_path.display(), "Model loaded");

            Ok(Self {
                session,
                channels_first,
            })
        }
    }

    impl Predictor for OnnxPredictor {
        fn predict(&self, batch: &Array4<f32>) -> Result<Array2<f32>> {
            let input = if self.channels_first {
                to_channels_first(batch.clone())
            } else {
                batch.clone()
            };

            let outputs = self
                .session
                .run([InputTensor::from_array(input.into_dyn())])
                .map_err(model_error)?;
            let first = outputs
                .first()
                .ok_or_else(|| Error::Decode("model produced no outputs".to_string()))?;
            let scores: OrtOwnedTensor<f32, _> = first.try_extract().map_err(model_error)?;

            let predictions = scores
                .view()
                .to_owned()
                .into_dimensionality::<Ix2>()
                .map_err(model_error)?;

            check_prediction_rows(batch, &predictions)?;
            Ok(predictions)
        }
    }
}
