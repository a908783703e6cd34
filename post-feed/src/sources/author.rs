use crate::traits::FeedSource;
use crate::types::{FeedResponse, Result};
use async_trait::async_trait;
use interfaces::client::{AuthorFilter, ProtocolClient};
use interfaces::defs::FeedViewPost;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Posts by a single actor. The reply filter is applied upstream.
pub struct AuthorSource {
    id: Uuid,
    client: Arc<dyn ProtocolClient>,
    pub actor: String,
    pub filter: AuthorFilter,
}

impl AuthorSource {
    pub fn new(client: Arc<dyn ProtocolClient>, actor: String, filter: AuthorFilter) -> Self {
        Self {
            id: Uuid::new_v4(),
            client,
            actor,
            filter,
        }
    }
}

#[async_trait]
impl FeedSource for AuthorSource {
    fn source_id(&self) -> String {
        format!("author_{}", self.id)
    }

    fn source_name(&self) -> String {
        format!("Author feed ({}, {})", self.actor, self.filter)
    }

    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<FeedResponse> {
        debug!("Fetching author feed for {} (cursor: {:?})", self.actor, cursor);

        let output = self
            .client
            .get_author_feed(&self.actor, self.filter, cursor, limit)
            .await?;
        Ok(FeedResponse::new(output.feed, output.cursor).capped(limit))
    }

    async fn peek_latest(&self) -> Result<Option<FeedViewPost>> {
        let output = self
            .client
            .get_author_feed(&self.actor, self.filter, None, 1)
            .await?;
        Ok(output.feed.into_iter().next())
    }
}
