//! Common error types for sabueso
//!
//! One variant per failure class of the tagging pipeline. Every boundary
//! operation returns [`Result`] and the orchestrator decides whether to halt.

use thiserror::Error;

/// Common result type for sabueso operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the gateway, fetcher, join builder and decoder
#[derive(Error, Debug)]
pub enum Error {
    /// Record store unreachable, credentials rejected, or close failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single image fetch or write failed; the batch was aborted
    #[error("Download error for {url}: {reason}")]
    Download { url: String, reason: String },

    /// Join step referenced an identifier absent from the upload mapping
    #[error("Lookup error: no upload entry for identifier {0}")]
    Lookup(i64),

    /// An update statement failed; the remaining updates were not applied
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Class index, image file, row shape or model output could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Read query failure (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input (bad identifier, mismatched lengths)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Process exit code for this failure class
    ///
    /// 0 is reserved for success and 1 for failures outside the taxonomy.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Connection(_) => 2,
            Error::Download { .. } => 3,
            Error::Persistence(_) => 4,
            Error::Lookup(_) => 5,
            Error::Decode(_) => 6,
            Error::Config(_) => 7,
            _ => 1,
        }
    }

    /// Shorthand for a download failure
    pub fn download(url: impl Into<String>, reason: impl ToString) -> Self {
        Error::Download {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
