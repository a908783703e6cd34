use crate::sources::{FollowingSource, GeneratorSource};
use crate::traits::FeedSource;
use crate::types::{FeedError, FeedResponse, Result};
use async_trait::async_trait;
use interfaces::client::ProtocolClient;
use interfaces::defs::{FeedViewPost, Reason};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const FOLLOWING_PREFIX: &str = "following";
const DISCOVER_PREFIX: &str = "discover";

enum HomeCursor<'a> {
    Following(&'a str),
    Discover(Option<&'a str>),
}

/// Home feed: the following timeline, continuing into the discover feed once
/// the timeline runs out.
pub struct HomeSource {
    id: Uuid,
    following: FollowingSource,
    discover: GeneratorSource,
}

impl HomeSource {
    pub fn new(
        client: Arc<dyn ProtocolClient>,
        discover_feed: &str,
        content_languages: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            following: FollowingSource::new(client.clone()),
            discover: GeneratorSource::new(client, discover_feed.to_string(), content_languages),
        }
    }

    fn parse_cursor<'a>(&self, cursor: &'a str) -> Result<HomeCursor<'a>> {
        match cursor.split_once('|') {
            Some((FOLLOWING_PREFIX, rest)) if !rest.is_empty() => Ok(HomeCursor::Following(rest)),
            Some((DISCOVER_PREFIX, "")) => Ok(HomeCursor::Discover(None)),
            Some((DISCOVER_PREFIX, rest)) => Ok(HomeCursor::Discover(Some(rest))),
            _ => Err(FeedError::InvalidCursor {
                source_name: self.source_name(),
                cursor: cursor.to_string(),
            }),
        }
    }

    async fn fetch_following(&self, cursor: Option<&str>, limit: usize) -> Result<FeedResponse> {
        let response = self.following.fetch(cursor, limit).await?;
        let cursor = match response.cursor {
            Some(next) => format!("{}|{}", FOLLOWING_PREFIX, next),
            None => {
                info!("Following timeline exhausted, continuing with {}", self.discover.feed);
                format!("{}|", DISCOVER_PREFIX)
            }
        };
        Ok(FeedResponse::new(response.feed, Some(cursor)))
    }

    async fn fetch_discover(&self, cursor: Option<&str>, limit: usize) -> Result<FeedResponse> {
        let response = self.discover.fetch(cursor, limit).await?;
        let tag = Reason::FeedSource {
            uri: self.discover.feed.clone(),
            display_name: "Discover".to_string(),
        };
        let feed = response
            .feed
            .into_iter()
            .map(|mut item| {
                if item.reason.is_none() {
                    item.reason = Some(tag.clone());
                }
                item
            })
            .collect();
        let cursor = response
            .cursor
            .map(|next| format!("{}|{}", DISCOVER_PREFIX, next));
        Ok(FeedResponse::new(feed, cursor))
    }
}

#[async_trait]
impl FeedSource for HomeSource {
    fn source_id(&self) -> String {
        format!("home_{}", self.id)
    }

    fn source_name(&self) -> String {
        "Home".to_string()
    }

    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<FeedResponse> {
        match cursor {
            None => self.fetch_following(None, limit).await,
            Some(cursor) => match self.parse_cursor(cursor)? {
                HomeCursor::Following(inner) => self.fetch_following(Some(inner), limit).await,
                HomeCursor::Discover(inner) => self.fetch_discover(inner, limit).await,
            },
        }
    }

    async fn peek_latest(&self) -> Result<Option<FeedViewPost>> {
        self.following.peek_latest().await
    }
}
