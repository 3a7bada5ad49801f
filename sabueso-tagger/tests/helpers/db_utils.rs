//! Database Test Utilities
//!
//! Temporary SQLite record store with the image, clean and tweet tables

use anyhow::Result;
use sabueso_common::ConnectionParams;
use sqlx::SqlitePool;
use tempfile::TempDir;

const SCHEMA: &[&str] = &[
    "CREATE TABLE sabueso_img (id INTEGER PRIMARY KEY, url TEXT NOT NULL, parent_id INTEGER NOT NULL)",
    "CREATE TABLE sabueso_clean (id INTEGER PRIMARY KEY, parent_tweet_id INTEGER NOT NULL, labels TEXT)",
    "CREATE TABLE sabueso_tweet (id INTEGER PRIMARY KEY, body TEXT, author TEXT, parent_tweet_id INTEGER NOT NULL)",
];

/// Seeded database file; `temp_dir` must outlive the test
pub struct TestDb {
    pub temp_dir: TempDir,
    pub pool: SqlitePool,
    pub url: String,
}

/// Create temporary test database with the three tables
pub async fn create_test_db() -> Result<TestDb> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_sabueso.db");

    let url = format!("sqlite:{}?mode=rwc", db_path.display());
    let pool = SqlitePool::connect(&url).await?;

    for ddl in SCHEMA {
        sqlx::query(ddl).execute(&pool).await?;
    }

    Ok(TestDb {
        temp_dir,
        pool,
        url,
    })
}

impl TestDb {
    pub fn params(&self) -> ConnectionParams {
        ConnectionParams::from_url(self.url.clone())
    }

    pub async fn insert_image(&self, id: i64, url: &str, parent_id: i64) -> Result<()> {
        sqlx::query("INSERT INTO sabueso_img (id, url, parent_id) VALUES (?, ?, ?)")
            .bind(id)
            .bind(url)
            .bind(parent_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_clean(&self, id: i64, parent_tweet_id: i64) -> Result<()> {
        sqlx::query("INSERT INTO sabueso_clean (id, parent_tweet_id) VALUES (?, ?)")
            .bind(id)
            .bind(parent_tweet_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_tweet(&self, id: i64, parent_tweet_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO sabueso_tweet (id, body, author, parent_tweet_id) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(format!("tweet {}", id))
        .bind("tester")
        .bind(parent_tweet_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Label column of every clean row grouped under `parent_tweet_id`, by id
    pub async fn labels_for(&self, parent_tweet_id: i64) -> Result<Vec<Option<String>>> {
        let labels = sqlx::query_scalar::<_, Option<String>>(
            "SELECT labels FROM sabueso_clean WHERE parent_tweet_id = ? ORDER BY id",
        )
        .bind(parent_tweet_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(labels)
    }
}
