use crate::traits::FeedSource;
use crate::types::{FeedResponse, Result};
use async_trait::async_trait;
use interfaces::client::ProtocolClient;
use interfaces::defs::FeedViewPost;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Posts from the members of a curated list
pub struct ListSource {
    id: Uuid,
    client: Arc<dyn ProtocolClient>,
    pub list: String,
}

impl ListSource {
    pub fn new(client: Arc<dyn ProtocolClient>, list: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            client,
            list,
        }
    }
}

#[async_trait]
impl FeedSource for ListSource {
    fn source_id(&self) -> String {
        format!("list_{}", self.id)
    }

    fn source_name(&self) -> String {
        format!("List ({})", self.list)
    }

    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<FeedResponse> {
        debug!("Fetching list feed {} (cursor: {:?})", self.list, cursor);

        let output = self.client.get_list_feed(&self.list, cursor, limit).await?;
        Ok(FeedResponse::new(output.feed, output.cursor).capped(limit))
    }

    async fn peek_latest(&self) -> Result<Option<FeedViewPost>> {
        let output = self.client.get_list_feed(&self.list, None, 1).await?;
        Ok(output.feed.into_iter().next())
    }
}
