//! Pipeline stages for sabueso-tagger

pub mod image_fetcher;
pub mod label_decoder;
pub mod label_join;
pub mod label_writer;
pub mod predictor;
pub mod preprocessor;

pub use image_fetcher::{DownloadedImage, ImageFetcher};
pub use label_decoder::ClassIndex;
pub use label_join::LabelJoinBuilder;
pub use predictor::Predictor;
pub use preprocessor::ImagePreprocessor;
