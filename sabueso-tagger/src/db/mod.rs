//! Record store access for sabueso-tagger
//!
//! One connection serves every read and write of a run. Rows are decoded into
//! the named structures of [`records`] immediately after each query.

pub mod records;

pub use records::{CleanRecord, ImageRecord, TweetRecord};

use crate::models::UploadMapping;
use crate::services::label_writer::format_labels;
use sabueso_common::{ConnectionParams, Error, Result};
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Connection};
use tracing::{debug, error, info, warn};

/// Outcome of one [`RecordStore::update_labels`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// Statement text executed once per entry (values are bound, not inlined)
    pub statement: String,
    /// Entries written
    pub entries: usize,
    /// Rows touched across all statements
    pub rows_affected: u64,
    /// Whether the transaction was committed (false = rolled back)
    pub committed: bool,
}

/// Record store gateway
///
/// Holds the connection parameters from construction and the live connection
/// between [`connect`](Self::connect) and [`close`](Self::close).
pub struct RecordStore {
    params: ConnectionParams,
    conn: Option<AnyConnection>,
}

impl RecordStore {
    pub fn new(params: ConnectionParams) -> Self {
        Self { params, conn: None }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Open the connection
    ///
    /// On failure nothing is left open and the caller is expected to abort.
    pub async fn connect(&mut self) -> Result<()> {
        sqlx::any::install_default_drivers();

        if self.conn.is_some() {
            debug!("Record store already connected");
            return Ok(());
        }

        let url = self.params.connection_url()?;
        match AnyConnection::connect(&url).await {
            Ok(conn) => {
                info!(backend = conn.backend_name(), "Connected to record store");
                self.conn = Some(conn);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize database connection");
                Err(Error::Connection(e.to_string()))
            }
        }
    }

    fn connection(&mut self) -> Result<&mut AnyConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::Connection("record store is not connected".to_string()))
    }

    /// `SELECT * FROM <table>`, rows in positional form
    pub async fn fetch_all(&mut self, table: &str) -> Result<Vec<AnyRow>> {
        validate_identifier(table)?;
        let sql = format!("SELECT * FROM {}", table);
        let conn = self.connection()?;

        let rows = sqlx::query(&sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| {
                error!(table, error = %e, "Failed to read table");
                Error::Database(e)
            })?;

        debug!(table, rows = rows.len(), "Fetched rows");
        Ok(rows)
    }

    pub async fn fetch_image_records(&mut self, table: &str) -> Result<Vec<ImageRecord>> {
        self.fetch_all(table)
            .await?
            .iter()
            .map(ImageRecord::from_row)
            .collect()
    }

    pub async fn fetch_clean_records(&mut self, table: &str) -> Result<Vec<CleanRecord>> {
        self.fetch_all(table)
            .await?
            .iter()
            .map(CleanRecord::from_row)
            .collect()
    }

    pub async fn fetch_tweet_records(&mut self, table: &str) -> Result<Vec<TweetRecord>> {
        self.fetch_all(table)
            .await?
            .iter()
            .map(TweetRecord::from_row)
            .collect()
    }

    /// Write each entry's labels to `column` of the rows whose
    /// `parent_tweet_id` equals the entry key
    ///
    /// All statements share one transaction. The first failing row aborts the
    /// call and rolls everything back. With `commit = false` the transaction is
    /// rolled back at the end and no COMMIT is ever sent.
    pub async fn update_labels(
        &mut self,
        table: &str,
        column: &str,
        mapping: &UploadMapping,
        commit: bool,
    ) -> Result<UpdateReport> {
        let statement = update_statement(table, column)?;
        let conn = self.connection()?;

        let mut tx = conn.begin().await.map_err(|e| {
            error!(error = %e, "Failed to open update transaction");
            Error::Persistence(e.to_string())
        })?;

        let mut rows_affected = 0u64;
        for (key, entry) in mapping.iter() {
            let value = format_labels(&entry.labels);
            let result = sqlx::query(&statement)
                .bind(value)
                .bind(key)
                .execute(&mut *tx)
                .await;

            match result {
                Ok(done) => {
                    if done.rows_affected() == 0 {
                        warn!(key, "Update matched no rows");
                    }
                    rows_affected += done.rows_affected();
                }
                Err(e) => {
                    error!(key, error = %e, "Failed to update labels");
                    // Dropping the transaction rolls back the rows already written
                    return Err(Error::Persistence(format!(
                        "update for entity {} failed: {}",
                        key, e
                    )));
                }
            }
        }

        if commit {
            tx.commit()
                .await
                .map_err(|e| Error::Persistence(format!("commit failed: {}", e)))?;
            info!(entries = mapping.len(), rows_affected, "Label updates committed");
        } else {
            tx.rollback()
                .await
                .map_err(|e| Error::Persistence(format!("rollback failed: {}", e)))?;
            info!(
                entries = mapping.len(),
                rows_affected, "Label updates rolled back (commit disabled)"
            );
        }

        Ok(UpdateReport {
            statement,
            entries: mapping.len(),
            rows_affected,
            committed: commit,
        })
    }

    /// Close the connection; a store that was never connected closes trivially
    pub async fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        match conn.close().await {
            Ok(()) => {
                info!("Record store connection closed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to close the connection");
                Err(Error::Connection(e.to_string()))
            }
        }
    }
}

/// Statement text used by [`RecordStore::update_labels`]
pub fn update_statement(table: &str, column: &str) -> Result<String> {
    validate_identifier(table)?;
    validate_identifier(column)?;
    Ok(format!(
        "UPDATE {} SET {} = $1 WHERE parent_tweet_id = $2",
        table, column
    ))
}

/// Accept plain (optionally schema-qualified) SQL identifiers only
///
/// Table and column names cannot be bound as parameters, so they are checked
/// before being placed in statement text.
pub fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid SQL identifier: {:?}", name)))
    }
}
