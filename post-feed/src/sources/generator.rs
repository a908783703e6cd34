use crate::traits::FeedSource;
use crate::types::{FeedResponse, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::client::ProtocolClient;
use interfaces::defs::FeedViewPost;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Feed generator (custom/algorithmic feed) served by the native protocol
///
/// `reference_time` is captured when the session starts. The native protocol
/// pages generators with opaque cursors, so it is only reported in logs.
pub struct GeneratorSource {
    id: Uuid,
    client: Arc<dyn ProtocolClient>,
    pub feed: String,
    content_languages: Vec<String>,
    reference_time: DateTime<Utc>,
}

impl GeneratorSource {
    pub fn new(client: Arc<dyn ProtocolClient>, feed: String, content_languages: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client,
            feed,
            content_languages,
            reference_time: Utc::now(),
        }
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }
}

#[async_trait]
impl FeedSource for GeneratorSource {
    fn source_id(&self) -> String {
        format!("feedgen_{}", self.id)
    }

    fn source_name(&self) -> String {
        format!("Feed ({})", self.feed)
    }

    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<FeedResponse> {
        debug!(
            "Fetching generator {} (cursor: {:?}, session started {})",
            self.feed, cursor, self.reference_time
        );

        let output = self
            .client
            .get_feed(&self.feed, cursor, limit, &self.content_languages)
            .await?;

        if output.feed.is_empty() && output.cursor.is_some() {
            info!("Generator {} returned an empty page with a cursor", self.feed);
        }
        Ok(FeedResponse::new(output.feed, output.cursor).capped(limit))
    }

    async fn peek_latest(&self) -> Result<Option<FeedViewPost>> {
        let output = self
            .client
            .get_feed(&self.feed, None, 1, &self.content_languages)
            .await?;
        Ok(output.feed.into_iter().next())
    }
}
