#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use interfaces::client::{
    AuthorFilter, ClientError, FeedOutput, PopularFeedsOutput, ProtocolClient,
};
use interfaces::defs::{
    FeedViewPost, GeneratorView, Label, ListView, PostView, ProfileView, ReplyRef, ReplyReference,
    ReplyTarget,
};
use parking_lot::Mutex;
use post_feed::{FeedError, FeedResponse, FeedSource, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tokio::sync::Semaphore;
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
}

pub fn profile(did: &str) -> ProfileView {
    ProfileView {
        did: did.to_string(),
        handle: format!("{}.test", did.trim_start_matches("did:plc:")),
        ..Default::default()
    }
}

/// A valid post by `author`, `minutes` after the base time.
pub fn post(id: &str, author: &str, minutes: i64) -> FeedViewPost {
    let indexed_at = base_time() + Duration::minutes(minutes);
    FeedViewPost {
        post: PostView {
            uri: format!("at://{}/app.bsky.feed.post/{}", author, id),
            cid: format!("cid-{}", id),
            author: profile(author),
            record: json!({
                "$type": "app.bsky.feed.post",
                "text": format!("post {}", id),
                "langs": ["en"],
                "createdAt": indexed_at.to_rfc3339(),
            }),
            embed: None,
            reply_count: 0,
            repost_count: 0,
            like_count: 0,
            indexed_at,
            labels: Vec::new(),
        },
        reply: None,
        reason: None,
    }
}

pub fn reply_to(id: &str, author: &str, minutes: i64, parent: &FeedViewPost) -> FeedViewPost {
    let mut item = post(id, author, minutes);
    let target = ReplyTarget::Reference(ReplyReference {
        uri: parent.post.uri.clone(),
        not_found: false,
        blocked: false,
    });
    item.reply = Some(ReplyRef {
        root: target.clone(),
        parent: target,
    });
    item
}

pub fn labeled(mut item: FeedViewPost, val: &str) -> FeedViewPost {
    item.post.labels.push(Label {
        src: "did:plc:labeler".to_string(),
        uri: item.post.uri.clone(),
        val: val.to_string(),
        ..Default::default()
    });
    item
}

/// `count` posts by distinct authors, ids prefixed with `prefix`.
pub fn posts(prefix: &str, count: usize) -> Vec<FeedViewPost> {
    (0..count)
        .map(|i| post(&format!("{}{}", prefix, i), &format!("did:plc:{}{}", prefix, i), i as i64))
        .collect()
}

/// A source that serves a fixed list of pages. Cursor `p<n>` points at page
/// `n`; the last page ends the stream.
pub struct ScriptedSource {
    id: Uuid,
    pages: Vec<Vec<FeedViewPost>>,
    peek: Mutex<Option<FeedViewPost>>,
    gate: Option<Arc<Semaphore>>,
    final_cursor: Option<String>,
    failures: AtomicUsize,
    peek_fails: AtomicBool,
    fetches: AtomicUsize,
    peeks: AtomicUsize,
    cursors: Mutex<Vec<Option<String>>>,
}

impl ScriptedSource {
    pub fn new(pages: Vec<Vec<FeedViewPost>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pages,
            peek: Mutex::new(None),
            gate: None,
            final_cursor: None,
            failures: AtomicUsize::new(0),
            peek_fails: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
            peeks: AtomicUsize::new(0),
            cursors: Mutex::new(Vec::new()),
        }
    }

    /// Every fetch waits for a permit on `gate`.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Cursor returned with the last page instead of none at all.
    pub fn with_final_cursor(mut self, cursor: &str) -> Self {
        self.final_cursor = Some(cursor.to_string());
        self
    }

    pub fn fail_peeks(&self) {
        self.peek_fails.store(true, Ordering::SeqCst);
    }

    pub fn with_peek(self, item: FeedViewPost) -> Self {
        *self.peek.lock() = Some(item);
        self
    }

    pub fn fail_next(&self, times: usize) {
        self.failures.store(times, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn peek_count(&self) -> usize {
        self.peeks.load(Ordering::SeqCst)
    }

    pub fn cursors(&self) -> Vec<Option<String>> {
        self.cursors.lock().clone()
    }

    fn page_index(&self, cursor: Option<&str>) -> Result<usize> {
        match cursor {
            None => Ok(0),
            Some(cursor) => cursor
                .strip_prefix('p')
                .and_then(|n| n.parse().ok())
                .filter(|n: &usize| *n < self.pages.len())
                .ok_or_else(|| FeedError::InvalidCursor {
                    source_name: self.source_name(),
                    cursor: cursor.to_string(),
                }),
        }
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    fn source_id(&self) -> String {
        format!("scripted_{}", self.id)
    }

    fn source_name(&self) -> String {
        "Scripted".to_string()
    }

    async fn fetch(&self, cursor: Option<&str>, _limit: usize) -> Result<FeedResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.cursors.lock().push(cursor.map(str::to_string));
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| FeedError::General(e.to_string()))?
                .forget();
        }
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(FeedError::General("scripted failure".to_string()));
        }

        let index = self.page_index(cursor)?;
        let next = if index + 1 < self.pages.len() {
            Some(format!("p{}", index + 1))
        } else {
            self.final_cursor.clone()
        };
        Ok(FeedResponse::new(self.pages[index].clone(), next))
    }

    async fn peek_latest(&self) -> Result<Option<FeedViewPost>> {
        self.peeks.fetch_add(1, Ordering::SeqCst);
        if self.peek_fails.load(Ordering::SeqCst) {
            return Err(FeedError::General("peek unavailable".to_string()));
        }
        Ok(self.peek.lock().clone())
    }
}

/// In-memory protocol client. Pages are keyed by cursor, `""` for the first.
#[derive(Default)]
pub struct FakeClient {
    pub did: Option<String>,
    pub timeline: HashMap<String, FeedOutput>,
    pub feeds: HashMap<String, FeedOutput>,
    pub lists: HashMap<String, FeedOutput>,
    pub generators: HashMap<String, GeneratorView>,
    pub list_views: HashMap<String, ListView>,
    pub popular: Vec<PopularFeedsOutput>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeClient {
    fn page(
        &self,
        pages: &HashMap<String, FeedOutput>,
        call: String,
        cursor: Option<&str>,
    ) -> std::result::Result<FeedOutput, ClientError> {
        self.calls.lock().push(call);
        pages
            .get(cursor.unwrap_or_default())
            .cloned()
            .ok_or_else(|| ClientError::Upstream {
                status: 400,
                message: format!("unknown cursor {:?}", cursor),
            })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

pub fn output(feed: Vec<FeedViewPost>, cursor: Option<&str>) -> FeedOutput {
    FeedOutput {
        feed,
        cursor: cursor.map(str::to_string),
    }
}

#[async_trait]
impl ProtocolClient for FakeClient {
    fn session_did(&self) -> Option<String> {
        self.did.clone()
    }

    async fn get_timeline(
        &self,
        cursor: Option<&str>,
        _limit: usize,
    ) -> std::result::Result<FeedOutput, ClientError> {
        self.page(&self.timeline, format!("timeline:{:?}", cursor), cursor)
    }

    async fn get_author_feed(
        &self,
        actor: &str,
        filter: AuthorFilter,
        cursor: Option<&str>,
        _limit: usize,
    ) -> std::result::Result<FeedOutput, ClientError> {
        self.page(
            &self.feeds,
            format!("author:{}:{}:{:?}", actor, filter, cursor),
            cursor,
        )
    }

    async fn get_actor_likes(
        &self,
        actor: &str,
        cursor: Option<&str>,
        _limit: usize,
    ) -> std::result::Result<FeedOutput, ClientError> {
        self.page(&self.feeds, format!("likes:{}:{:?}", actor, cursor), cursor)
    }

    async fn get_feed(
        &self,
        feed: &str,
        cursor: Option<&str>,
        _limit: usize,
        accept_languages: &[String],
    ) -> std::result::Result<FeedOutput, ClientError> {
        self.page(
            &self.feeds,
            format!("feed:{}:{:?}:{}", feed, cursor, accept_languages.join(",")),
            cursor,
        )
    }

    async fn get_list_feed(
        &self,
        list: &str,
        cursor: Option<&str>,
        _limit: usize,
    ) -> std::result::Result<FeedOutput, ClientError> {
        self.page(&self.lists, format!("list:{}:{:?}", list, cursor), cursor)
    }

    async fn get_feed_generator(
        &self,
        feed: &str,
    ) -> std::result::Result<GeneratorView, ClientError> {
        self.calls.lock().push(format!("generator:{}", feed));
        self.generators
            .get(feed)
            .cloned()
            .ok_or_else(|| ClientError::Upstream {
                status: 400,
                message: "Feed not found".to_string(),
            })
    }

    async fn get_list(&self, list: &str) -> std::result::Result<ListView, ClientError> {
        self.calls.lock().push(format!("getList:{}", list));
        self.list_views
            .get(list)
            .cloned()
            .ok_or_else(|| ClientError::Upstream {
                status: 400,
                message: "List not found".to_string(),
            })
    }

    async fn get_popular_feed_generators(
        &self,
        query: Option<&str>,
        cursor: Option<&str>,
        _limit: usize,
    ) -> std::result::Result<PopularFeedsOutput, ClientError> {
        self.calls
            .lock()
            .push(format!("popular:{:?}:{:?}", query, cursor));
        let index = match cursor {
            None => 0,
            Some(cursor) => cursor.parse().unwrap_or(usize::MAX),
        };
        self.popular
            .get(index)
            .cloned()
            .ok_or_else(|| ClientError::InvalidResponse("no such page".to_string()))
    }
}

pub fn generator_view(uri: &str, display_name: &str) -> GeneratorView {
    GeneratorView {
        uri: uri.to_string(),
        cid: "bafy-gen".to_string(),
        did: "did:web:feeds.test".to_string(),
        creator: profile("did:plc:creator"),
        display_name: display_name.to_string(),
        description: None,
        description_facets: Vec::new(),
        avatar: None,
        like_count: Some(3),
        viewer: None,
        indexed_at: base_time(),
    }
}

pub fn list_view(uri: &str, name: &str) -> ListView {
    ListView {
        uri: uri.to_string(),
        cid: "bafy-list".to_string(),
        creator: profile("did:plc:creator"),
        name: name.to_string(),
        purpose: "app.bsky.graph.defs#curatelist".to_string(),
        description: None,
        description_facets: Vec::new(),
        avatar: None,
        indexed_at: base_time(),
    }
}
