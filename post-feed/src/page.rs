use crate::traits::FeedSource;
use crate::tuner::Tuner;
use chrono::{DateTime, Utc};
use interfaces::defs::{FeedViewPost, PostRecord, PostView, Reason};
use interfaces::moderation::ModerationDecision;
use std::fmt;
use std::sync::Arc;

/// Cursor plus the source instance that issued it.
#[derive(Clone)]
pub struct ContinuationToken {
    pub cursor: String,
    pub source: Arc<dyn FeedSource>,
}

impl ContinuationToken {
    pub fn new(cursor: String, source: Arc<dyn FeedSource>) -> Self {
        Self { cursor, source }
    }

    /// True when the token was issued by this exact source instance.
    pub fn is_bound_to(&self, source: &Arc<dyn FeedSource>) -> bool {
        self.source.source_id() == source.source_id()
    }
}

impl fmt::Debug for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuationToken")
            .field("cursor", &self.cursor)
            .field("source", &self.source.source_id())
            .finish()
    }
}

/// One page exactly as a source returned it.
pub struct RawPage {
    pub source: Arc<dyn FeedSource>,
    /// Cursor for the page after this one. `None` ends the stream.
    pub cursor: Option<String>,
    pub feed: Vec<FeedViewPost>,
    pub fetched_at: DateTime<Utc>,
}

impl RawPage {
    pub fn next_token(&self) -> Option<ContinuationToken> {
        self.cursor
            .as_ref()
            .map(|cursor| ContinuationToken::new(cursor.clone(), self.source.clone()))
    }
}

impl fmt::Debug for RawPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawPage")
            .field("source", &self.source.source_id())
            .field("cursor", &self.cursor)
            .field("items", &self.feed.len())
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSliceItem {
    /// `<slice key>-<index>`
    pub key: String,
    pub uri: String,
    pub post: PostView,
    pub record: PostRecord,
    pub reason: Option<Reason>,
    pub moderation: ModerationDecision,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSlice {
    pub key: String,
    pub root_uri: String,
    pub is_thread: bool,
    pub items: Vec<FeedSliceItem>,
}

/// A raw page after tuning and moderation.
pub struct FeedPage {
    pub source: Arc<dyn FeedSource>,
    pub cursor: Option<String>,
    pub fetched_at: DateTime<Utc>,
    /// Tuner state right after this page was tuned.
    pub tuner: Arc<Tuner>,
    pub slices: Vec<FeedSlice>,
}

impl FeedPage {
    pub fn item_count(&self) -> usize {
        self.slices.iter().map(|slice| slice.items.len()).sum()
    }
}

impl fmt::Debug for FeedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedPage")
            .field("source", &self.source.source_id())
            .field("cursor", &self.cursor)
            .field("slices", &self.slices)
            .finish()
    }
}

/// Output of one selection: processed pages plus the tuner snapshot after the
/// last of them.
#[derive(Debug, Clone)]
pub struct FeedData {
    pub pages: Vec<Arc<FeedPage>>,
    pub tuner: Arc<Tuner>,
}

impl FeedData {
    pub fn slice_count(&self) -> usize {
        self.pages.iter().map(|page| page.slices.len()).sum()
    }

    pub fn item_count(&self) -> usize {
        self.pages.iter().map(|page| page.item_count()).sum()
    }

    pub fn slices(&self) -> impl Iterator<Item = &FeedSlice> {
        self.pages.iter().flat_map(|page| page.slices.iter())
    }
}
