//! Test Helper Utilities
//!
//! Shared fixtures for sabueso-tagger integration tests
#![allow(dead_code, unused_imports)]

pub mod db_utils;
pub mod fake_model;
pub mod image_server;

// Re-export commonly used items
pub use db_utils::{create_test_db, TestDb};
pub use fake_model::{png_bytes, write_class_index, ColorPredictor, BLUE, RED};
pub use image_server::{start_image_server, ImageServer};
