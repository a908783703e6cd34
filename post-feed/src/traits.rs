use crate::types::{FeedResponse, Result};
use async_trait::async_trait;
use interfaces::defs::FeedViewPost;

/// Trait for fetching pages of posts from one logical feed (timeline, author,
/// generator, list, merged feeds, ...).
///
/// One instance lives for exactly one pagination session. Cursors returned by
/// an instance are only meaningful to that same instance.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Unique identifier for this source instance
    fn source_id(&self) -> String;

    /// Human-readable name for this source
    fn source_name(&self) -> String;

    /// Fetch one page. `cursor = None` starts the session; a response with no
    /// cursor ends the stream. `limit` is an upper bound hint.
    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<FeedResponse>;

    /// Newest available item, without touching paging state.
    async fn peek_latest(&self) -> Result<Option<FeedViewPost>>;
}
