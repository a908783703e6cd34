use crate::sources::MergePolicy;
use interfaces::client::ClientError;
use interfaces::defs::FeedViewPost;
use serde::{Deserialize, Serialize};

pub use interfaces::defs::{PostView, Reason};

/// Default number of items requested per page.
pub const PAGE_SIZE: usize = 30;

/// Look-ahead stops once this many raw pages have been fetched.
pub const MAX_LOOK_AHEAD_PAGES: usize = 6;

/// Sources may overshoot the requested limit by at most this factor.
pub const MAX_LIMIT_MULTIPLE: usize = 2;

pub const DISCOVER_FEED_URI: &str =
    "at://did:plc:z72i7hdynmk6r22z27h6tvur/app.bsky.feed.generator/whats-hot";

/// Result of one `FeedSource::fetch` call.
#[derive(Debug, Clone, Default)]
pub struct FeedResponse {
    pub feed: Vec<FeedViewPost>,
    /// `None` signals end of stream.
    pub cursor: Option<String>,
}

impl FeedResponse {
    /// An empty cursor ends the stream like a missing one.
    pub fn new(feed: Vec<FeedViewPost>, cursor: Option<String>) -> Self {
        Self {
            feed,
            cursor: cursor.filter(|cursor| !cursor.is_empty()),
        }
    }

    /// Enforce the advisory limit contract on an upstream page.
    pub fn capped(mut self, limit: usize) -> Self {
        let max = limit.max(1) * MAX_LIMIT_MULTIPLE;
        if self.feed.len() > max {
            self.feed.truncate(max);
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub page_size: usize,
    pub max_look_ahead_pages: usize,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub service_url: String,
    pub opencast_url: String,
    pub discover_feed_uri: String,
    pub merge_policy: MergePolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            max_look_ahead_pages: MAX_LOOK_AHEAD_PAGES,
            user_agent: "post-feed/0.1".to_string(),
            timeout_seconds: 30,
            service_url: "https://public.api.bsky.app".to_string(),
            opencast_url: "https://opencast.stephancill.co.za".to_string(),
            discover_feed_uri: DISCOVER_FEED_URI.to_string(),
            merge_policy: MergePolicy::RoundRobin,
        }
    }
}

/// Per-session parameters that select how a descriptor is turned into a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedParams {
    #[serde(default)]
    pub disable_tuner: bool,
    #[serde(default)]
    pub merge_feed_enabled: bool,
    #[serde(default)]
    pub merge_feed_sources: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid feed descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid cursor for {source_name}: {cursor}")]
    InvalidCursor { source_name: String, cursor: String },

    #[error("Continuation token belongs to another session")]
    ForeignCursor,

    /// Every post on a logged-out page failed moderation.
    #[error("This feed has nothing suitable to show to logged-out viewers")]
    NothingSuitablePublic,

    #[error("Fetch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;
