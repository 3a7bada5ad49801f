//! Pipeline Orchestrator
//!
//! Runs the tagging stages in order against one record store connection:
//!
//! - **classify**: fetch image rows → download → close → preprocess → predict → decode
//! - **tag**: fetch image rows → download → join tweets → preprocess → predict →
//!   decode → write labels back → close
//!
//! # Error Handling
//! The first failing stage halts the run. The connection is closed on every
//! exit path; a close failure is logged and never replaces the stage error.

use crate::db::RecordStore;
use crate::models::{ClassificationReport, ClassifiedImage, TagReport, UploadMapping};
use crate::services::label_decoder::decode_with_index_file;
use crate::services::predictor::check_prediction_rows;
use crate::services::{ImageFetcher, ImagePreprocessor, LabelJoinBuilder, Predictor};
use sabueso_common::{Normalization, Result, TomlConfig};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub image_table: String,
    pub clean_table: String,
    pub tweet_table: String,
    /// Column of `clean_table` receiving the labels
    pub label_column: String,
    pub download_dir: PathBuf,
    pub url_prefix: String,
    pub class_index_path: PathBuf,
    pub top_n: usize,
    pub image_height: u32,
    pub image_width: u32,
    pub normalization: Normalization,
    /// Commit label updates (false = roll back)
    pub commit: bool,
    pub http_timeout: Duration,
}

impl From<&TomlConfig> for PipelineConfig {
    fn from(config: &TomlConfig) -> Self {
        Self {
            image_table: config.image_table.clone(),
            clean_table: config.clean_table.clone(),
            tweet_table: config.tweet_table.clone(),
            label_column: config.label_column.clone(),
            download_dir: config.download_dir.clone(),
            url_prefix: config.url_prefix.clone(),
            class_index_path: config.class_index_path.clone(),
            top_n: config.top_n,
            image_height: config.image_height,
            image_width: config.image_width,
            normalization: config.normalization,
            commit: config.commit,
            http_timeout: Duration::from_secs(config.http_timeout_secs),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&TomlConfig::default())
    }
}

/// Tagging pipeline over an injected model
pub struct Pipeline<P: Predictor> {
    config: PipelineConfig,
    fetcher: ImageFetcher,
    preprocessor: ImagePreprocessor,
    join_builder: LabelJoinBuilder,
    predictor: P,
}

impl<P: Predictor> Pipeline<P> {
    pub fn new(config: PipelineConfig, predictor: P) -> Result<Self> {
        let fetcher = ImageFetcher::new(config.url_prefix.clone(), config.http_timeout)?;
        let preprocessor =
            ImagePreprocessor::new(config.image_height, config.image_width, config.normalization);

        Ok(Self {
            config,
            fetcher,
            preprocessor,
            join_builder: LabelJoinBuilder::new(),
            predictor,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Download and classify every image; nothing is written back
    ///
    /// The connection is released as soon as the downloads finish, before the
    /// model runs.
    pub async fn classify(&self, store: &mut RecordStore) -> Result<ClassificationReport> {
        store.connect().await?;
        let downloads = self.download_stage(store).await;
        close_quietly(store).await;
        let downloads = downloads?;

        let paths: Vec<&Path> = downloads.iter().map(|d| d.path.as_path()).collect();
        let labels = self.classify_paths(&paths)?;

        let skipped = downloads.iter().filter(|d| d.skipped).count();
        Ok(ClassificationReport {
            downloaded: downloads.len() - skipped,
            skipped,
            images: pair_labels(paths.iter().copied(), labels),
        })
    }

    /// Download, classify, join tweet rows and write the labels back
    pub async fn tag(&self, store: &mut RecordStore) -> Result<TagReport> {
        store.connect().await?;
        let report = self.tag_connected(store).await;
        close_quietly(store).await;
        report
    }

    async fn tag_connected(&self, store: &mut RecordStore) -> Result<TagReport> {
        let images = store.fetch_image_records(&self.config.image_table).await?;
        let downloads = self.fetcher.download(&images, &self.config.download_dir).await?;
        let skipped = downloads.iter().filter(|d| d.skipped).count();

        let mapping = UploadMapping::from_downloads(&downloads);
        let clean = store.fetch_clean_records(&self.config.clean_table).await?;
        let tweets = store.fetch_tweet_records(&self.config.tweet_table).await?;
        let mapping = self.join_builder.build(mapping, &clean, &images, &tweets)?;

        let labels = self.classify_paths(&mapping.paths())?;
        let mapping = mapping.with_labels(labels)?;

        let update = store
            .update_labels(
                &self.config.clean_table,
                &self.config.label_column,
                &mapping,
                self.config.commit,
            )
            .await?;

        let images = mapping
            .iter()
            .map(|(_, entry)| ClassifiedImage {
                path: entry.path.clone(),
                labels: entry.labels.clone(),
            })
            .collect();

        Ok(TagReport {
            downloaded: downloads.len() - skipped,
            skipped,
            tweets_joined: tweets.len(),
            entries_written: update.entries,
            rows_affected: update.rows_affected,
            committed: update.committed,
            images,
        })
    }

    async fn download_stage(
        &self,
        store: &mut RecordStore,
    ) -> Result<Vec<crate::services::DownloadedImage>> {
        let images = store.fetch_image_records(&self.config.image_table).await?;
        self.fetcher.download(&images, &self.config.download_dir).await
    }

    /// Preprocess, predict and decode; labels come back in `paths` order
    pub fn classify_paths(&self, paths: &[&Path]) -> Result<Vec<Vec<String>>> {
        if paths.is_empty() {
            info!("No images to classify");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let batch = self.preprocessor.prepare(paths)?;
        debug!(shape = ?batch.shape(), elapsed_ms = started.elapsed().as_millis() as u64, "Batch prepared");

        let predictions = self.predictor.predict(&batch)?;
        check_prediction_rows(&batch, &predictions)?;

        let labels = decode_with_index_file(
            predictions.view(),
            &self.config.class_index_path,
            self.config.top_n,
        )?;

        info!(
            images = labels.len(),
            top = self.config.top_n,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Images classified"
        );
        Ok(labels)
    }
}

async fn close_quietly(store: &mut RecordStore) {
    if let Err(e) = store.close().await {
        warn!(error = %e, "Continuing after failed connection close");
    }
}

fn pair_labels<'a>(
    paths: impl Iterator<Item = &'a Path>,
    labels: Vec<Vec<String>>,
) -> Vec<ClassifiedImage> {
    paths
        .zip(labels)
        .map(|(path, labels)| ClassifiedImage {
            path: path.to_path_buf(),
            labels,
        })
        .collect()
}
