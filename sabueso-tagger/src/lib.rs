//! sabueso-tagger library interface
//!
//! Downloads the images referenced by the record store, classifies them with
//! a pretrained model and optionally writes the labels back.

pub mod db;
pub mod models;
pub mod services;
pub mod workflow;

pub use db::RecordStore;
pub use workflow::{Pipeline, PipelineConfig};
