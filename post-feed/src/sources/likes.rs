use crate::traits::FeedSource;
use crate::types::{FeedResponse, Result};
use async_trait::async_trait;
use interfaces::client::ProtocolClient;
use interfaces::defs::FeedViewPost;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Posts liked by an actor, most recent like first
pub struct LikesSource {
    id: Uuid,
    client: Arc<dyn ProtocolClient>,
    pub actor: String,
}

impl LikesSource {
    pub fn new(client: Arc<dyn ProtocolClient>, actor: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            client,
            actor,
        }
    }
}

#[async_trait]
impl FeedSource for LikesSource {
    fn source_id(&self) -> String {
        format!("likes_{}", self.id)
    }

    fn source_name(&self) -> String {
        format!("Likes ({})", self.actor)
    }

    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<FeedResponse> {
        debug!("Fetching likes of {} (cursor: {:?})", self.actor, cursor);

        let output = self.client.get_actor_likes(&self.actor, cursor, limit).await?;
        Ok(FeedResponse::new(output.feed, output.cursor).capped(limit))
    }

    async fn peek_latest(&self) -> Result<Option<FeedViewPost>> {
        let output = self.client.get_actor_likes(&self.actor, None, 1).await?;
        Ok(output.feed.into_iter().next())
    }
}
