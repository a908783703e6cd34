use crate::traits::FeedSource;
use crate::types::{FeedResponse, Result};
use async_trait::async_trait;
use interfaces::client::ProtocolClient;
use interfaces::defs::FeedViewPost;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Chronological timeline of followed accounts
pub struct FollowingSource {
    id: Uuid,
    client: Arc<dyn ProtocolClient>,
}

impl FollowingSource {
    pub fn new(client: Arc<dyn ProtocolClient>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client,
        }
    }
}

#[async_trait]
impl FeedSource for FollowingSource {
    fn source_id(&self) -> String {
        format!("following_{}", self.id)
    }

    fn source_name(&self) -> String {
        "Following".to_string()
    }

    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<FeedResponse> {
        debug!("Fetching timeline (cursor: {:?}, limit: {})", cursor, limit);

        let output = self.client.get_timeline(cursor, limit).await?;
        Ok(FeedResponse::new(output.feed, output.cursor).capped(limit))
    }

    async fn peek_latest(&self) -> Result<Option<FeedViewPost>> {
        let output = self.client.get_timeline(None, 1).await?;
        Ok(output.feed.into_iter().next())
    }
}
