//! Tagging workflow
//!
//! Sequential orchestration of the pipeline stages. Stages never overlap:
//! downloads are issued one at a time and each stage completes before the
//! next starts.

pub mod pipeline;

pub use pipeline::{Pipeline, PipelineConfig};
