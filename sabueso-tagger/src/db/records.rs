//! Named row structures decoded right after `SELECT *`
//!
//! The tables are read without schema introspection, so column positions are
//! fixed by convention:
//! - image table: `[0]` id, `[1]` url, `[2]` parent id
//! - clean table: `[0]` id
//! - tweet table: `[0]` id, `[3]` grouping (parent tweet) id

use sabueso_common::{Error, Result};
use sqlx::any::AnyRow;
use sqlx::Row;

/// Row of the image URL table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: i64,
    pub url: String,
    pub parent_id: i64,
}

/// Row of the cleaned/derived table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRecord {
    pub id: i64,
}

/// Row of the tweet/source table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweetRecord {
    pub id: i64,
    /// Grouping id the tweet's labels accumulate under
    pub parent_id: i64,
}

const IMAGE_ID: usize = 0;
const IMAGE_URL: usize = 1;
const IMAGE_PARENT: usize = 2;
const CLEAN_ID: usize = 0;
const TWEET_ID: usize = 0;
const TWEET_PARENT: usize = 3;

impl ImageRecord {
    pub fn from_row(row: &AnyRow) -> Result<Self> {
        require_columns(row, IMAGE_PARENT + 1, "image")?;
        Ok(Self {
            id: column(row, IMAGE_ID, "image.id")?,
            url: column(row, IMAGE_URL, "image.url")?,
            parent_id: column(row, IMAGE_PARENT, "image.parent_id")?,
        })
    }
}

impl CleanRecord {
    pub fn from_row(row: &AnyRow) -> Result<Self> {
        require_columns(row, CLEAN_ID + 1, "clean")?;
        Ok(Self {
            id: column(row, CLEAN_ID, "clean.id")?,
        })
    }
}

impl TweetRecord {
    pub fn from_row(row: &AnyRow) -> Result<Self> {
        require_columns(row, TWEET_PARENT + 1, "tweet")?;
        Ok(Self {
            id: column(row, TWEET_ID, "tweet.id")?,
            parent_id: column(row, TWEET_PARENT, "tweet.parent_id")?,
        })
    }
}

fn require_columns(row: &AnyRow, needed: usize, table: &str) -> Result<()> {
    if row.len() < needed {
        return Err(Error::Decode(format!(
            "{} row has {} columns, expected at least {}",
            table,
            row.len(),
            needed
        )));
    }
    Ok(())
}

fn column<'r, T>(row: &'r AnyRow, index: usize, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Any> + sqlx::Type<sqlx::Any>,
{
    row.try_get::<T, _>(index)
        .map_err(|e| Error::Decode(format!("{} (column {}): {}", name, index, e)))
}
