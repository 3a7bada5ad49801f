//! In-memory join of tweet rows onto the upload mapping
//!
//! The mapping built from the image download is the left side of the join;
//! each tweet row is attached to the entry named by its grouping id. A tweet
//! pointing at an entity that was not downloaded is an error, never dropped.

use sabueso_common::Result;
use tracing::{debug, error, info};

use crate::db::{CleanRecord, ImageRecord, TweetRecord};
use crate::models::UploadMapping;

/// Builds the upload mapping consumed by the label write-back
#[derive(Debug, Default)]
pub struct LabelJoinBuilder;

impl LabelJoinBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Append every tweet id to the entry keyed by the tweet's grouping id
    ///
    /// `clean` and `images` are accepted for the record but do not filter or
    /// validate the mapping: only `tweets` drive the join.
    pub fn build(
        &self,
        mut mapping: UploadMapping,
        clean: &[CleanRecord],
        images: &[ImageRecord],
        tweets: &[TweetRecord],
    ) -> Result<UploadMapping> {
        debug!(
            entries = mapping.len(),
            clean = clean.len(),
            images = images.len(),
            tweets = tweets.len(),
            "Joining tweet rows onto upload mapping"
        );

        for tweet in tweets {
            let entry = mapping.entry_mut(tweet.parent_id).map_err(|e| {
                error!(tweet_id = tweet.id, parent_id = tweet.parent_id, "Tweet references an entity with no downloaded image");
                e
            })?;
            entry.tweet_ids.push(tweet.id);
        }

        info!(entries = mapping.len(), tweets = tweets.len(), "Upload mapping assembled");
        Ok(mapping)
    }
}
