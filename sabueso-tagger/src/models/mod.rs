//! Data models for sabueso-tagger

pub mod reports;
pub mod upload_mapping;

pub use reports::{ClassificationReport, ClassifiedImage, TagReport};
pub use upload_mapping::{UploadEntry, UploadMapping};
