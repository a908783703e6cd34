use crate::defs::{FeedViewPost, GeneratorView, ListView};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("not authenticated")]
    NotAuthenticated,
}

/// One page of feed items as returned by the protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedOutput {
    #[serde(default)]
    pub feed: Vec<FeedViewPost>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopularFeedsOutput {
    #[serde(default)]
    pub feeds: Vec<GeneratorView>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Reply visibility filter for author feeds. Applied upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorFilter {
    PostsNoReplies,
    PostsWithReplies,
    PostsAndAuthorThreads,
    PostsWithMedia,
}

impl AuthorFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorFilter::PostsNoReplies => "posts_no_replies",
            AuthorFilter::PostsWithReplies => "posts_with_replies",
            AuthorFilter::PostsAndAuthorThreads => "posts_and_author_threads",
            AuthorFilter::PostsWithMedia => "posts_with_media",
        }
    }
}

impl fmt::Display for AuthorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "posts_no_replies" => Ok(AuthorFilter::PostsNoReplies),
            "posts_with_replies" => Ok(AuthorFilter::PostsWithReplies),
            "posts_and_author_threads" => Ok(AuthorFilter::PostsAndAuthorThreads),
            "posts_with_media" => Ok(AuthorFilter::PostsWithMedia),
            other => Err(format!("unknown author filter: {}", other)),
        }
    }
}

/// The protocol client the feed core consumes.
///
/// Implementations own authentication; the core only reads typed responses
/// and asks whether a session exists.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// DID of the signed-in account, `None` for logged-out use.
    fn session_did(&self) -> Option<String>;

    async fn get_timeline(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<FeedOutput, ClientError>;

    async fn get_author_feed(
        &self,
        actor: &str,
        filter: AuthorFilter,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<FeedOutput, ClientError>;

    async fn get_actor_likes(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<FeedOutput, ClientError>;

    /// Fetch a page of a feed generator. `accept_languages` is forwarded as
    /// the content-language hint.
    async fn get_feed(
        &self,
        feed: &str,
        cursor: Option<&str>,
        limit: usize,
        accept_languages: &[String],
    ) -> Result<FeedOutput, ClientError>;

    async fn get_list_feed(
        &self,
        list: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<FeedOutput, ClientError>;

    async fn get_feed_generator(&self, feed: &str) -> Result<GeneratorView, ClientError>;

    async fn get_list(&self, list: &str) -> Result<ListView, ClientError>;

    async fn get_popular_feed_generators(
        &self,
        query: Option<&str>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<PopularFeedsOutput, ClientError>;
}
