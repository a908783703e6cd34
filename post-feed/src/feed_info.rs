use crate::descriptor::OPENCAST_FEED_PREFIX;
use crate::types::Result;
use futures::future::join_all;
use interfaces::client::ProtocolClient;
use interfaces::defs::{Facet, GeneratorView, ListView};
use interfaces::preferences::Preferences;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

const FEED_COLLECTION: &str = "app.bsky.feed.generator";
const INVALID_HANDLE: &str = "handle.invalid";
const POPULAR_FEEDS_LIMIT: usize = 10;

const OPENCAST_CID: &str = "bafyreihkf7336jzjp6o3qqfmah34jltrcytonakhnq6giwh4k7m4hxsmli";
const OPENCAST_AVATAR: &str = "https://framerusercontent.com/images/fsuh5llPev2bZQEZq8cZtn9n1dc.jpg";
const OPENCAST_CREATOR_DID: &str = "did:plc:jfhpnnst6flqway4eaeqzj2a";
const OPENCAST_CREATOR_HANDLE: &str = "stephancill";
const OPENCAST_LIKE_COUNT: u32 = 4314;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSourceKind {
    Feed,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedRoute {
    pub href: String,
    pub name: String,
    pub params: BTreeMap<String, String>,
}

/// Display metadata for a feed generator or list tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSourceInfo {
    pub kind: FeedSourceKind,
    pub uri: String,
    pub cid: String,
    pub route: FeedRoute,
    pub avatar: Option<String>,
    pub display_name: String,
    pub description: String,
    pub description_facets: Vec<Facet>,
    pub creator_did: String,
    pub creator_handle: String,
    /// Feeds only.
    pub like_count: Option<u32>,
    pub like_uri: Option<String>,
}

impl FeedSourceInfo {
    /// The home tab, always listed first.
    pub fn following() -> Self {
        Self {
            kind: FeedSourceKind::Feed,
            uri: String::new(),
            cid: String::new(),
            route: FeedRoute {
                href: "/".to_string(),
                name: "Home".to_string(),
                params: BTreeMap::new(),
            },
            avatar: None,
            display_name: "Following".to_string(),
            description: String::new(),
            description_facets: Vec::new(),
            creator_did: String::new(),
            creator_handle: String::new(),
            like_count: Some(0),
            like_uri: None,
        }
    }

    pub fn is_following(&self) -> bool {
        self.uri.is_empty() && self.route.href == "/"
    }
}

/// Pinned tabs in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct PinnedFeeds {
    pub feeds: Vec<FeedSourceInfo>,
    pub has_pinned_custom: bool,
}

pub fn feed_type_from_uri(uri: &str) -> FeedSourceKind {
    if uri.contains(FEED_COLLECTION) {
        FeedSourceKind::Feed
    } else {
        FeedSourceKind::List
    }
}

fn route_for(uri: &str) -> FeedRoute {
    let rest = uri.strip_prefix("at://").unwrap_or(uri);
    let mut parts = rest.splitn(3, '/');
    let host = parts.next().unwrap_or_default();
    let collection = parts.next().unwrap_or_default();
    let rkey = parts.next().unwrap_or_default();

    let (segment, name) = if collection == FEED_COLLECTION {
        ("feed", "ProfileFeed")
    } else {
        ("lists", "ProfileList")
    };
    let params = BTreeMap::from([
        ("name".to_string(), host.to_string()),
        ("rkey".to_string(), rkey.to_string()),
    ]);

    FeedRoute {
        href: format!("/profile/{}/{}/{}", host, segment, rkey),
        name: name.to_string(),
        params,
    }
}

fn is_invisible(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}' | '\u{FEFF}'
        )
}

pub fn sanitize_display_name(name: &str) -> String {
    name.chars()
        .filter(|c| !is_invisible(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn sanitize_handle(handle: &str, prefix: &str) -> String {
    if handle == INVALID_HANDLE {
        "⚠Invalid Handle".to_string()
    } else {
        format!("{}{}", prefix, handle)
    }
}

fn display_name_or(name: &str, fallback: impl FnOnce() -> String) -> String {
    let sanitized = sanitize_display_name(name);
    if sanitized.is_empty() {
        fallback()
    } else {
        sanitized
    }
}

pub fn hydrate_feed_generator(view: &GeneratorView) -> FeedSourceInfo {
    FeedSourceInfo {
        kind: FeedSourceKind::Feed,
        uri: view.uri.clone(),
        cid: view.cid.clone(),
        route: route_for(&view.uri),
        avatar: view.avatar.clone(),
        display_name: display_name_or(&view.display_name, || {
            format!("Feed by {}", sanitize_handle(&view.creator.handle, "@"))
        }),
        description: view.description.clone().unwrap_or_default(),
        description_facets: view.description_facets.clone(),
        creator_did: view.creator.did.clone(),
        creator_handle: view.creator.handle.clone(),
        like_count: view.like_count,
        like_uri: view.viewer.as_ref().and_then(|viewer| viewer.like.clone()),
    }
}

pub fn hydrate_list(view: &ListView) -> FeedSourceInfo {
    FeedSourceInfo {
        kind: FeedSourceKind::List,
        uri: view.uri.clone(),
        cid: view.cid.clone(),
        route: route_for(&view.uri),
        avatar: view.avatar.clone(),
        display_name: display_name_or(&view.name, || {
            format!("User List by {}", sanitize_handle(&view.creator.handle, "@"))
        }),
        description: view.description.clone().unwrap_or_default(),
        description_facets: view.description_facets.clone(),
        creator_did: view.creator.did.clone(),
        creator_handle: view.creator.handle.clone(),
        like_count: None,
        like_uri: None,
    }
}

/// Built-in descriptor for Opencast feeds, which have no generator record.
fn opencast_feed_info(uri: &str) -> FeedSourceInfo {
    FeedSourceInfo {
        kind: FeedSourceKind::Feed,
        uri: uri.to_string(),
        cid: OPENCAST_CID.to_string(),
        route: route_for(uri),
        avatar: Some(OPENCAST_AVATAR.to_string()),
        display_name: "Opencast".to_string(),
        description: "Farcaster feed".to_string(),
        description_facets: Vec::new(),
        creator_did: OPENCAST_CREATOR_DID.to_string(),
        creator_handle: OPENCAST_CREATOR_HANDLE.to_string(),
        like_count: Some(OPENCAST_LIKE_COUNT),
        like_uri: None,
    }
}

pub async fn fetch_feed_source_info(
    client: &dyn ProtocolClient,
    uri: &str,
) -> Result<FeedSourceInfo> {
    if uri.starts_with(OPENCAST_FEED_PREFIX) {
        return Ok(opencast_feed_info(uri));
    }
    match feed_type_from_uri(uri) {
        FeedSourceKind::Feed => {
            let view = client.get_feed_generator(uri).await?;
            Ok(hydrate_feed_generator(&view))
        }
        FeedSourceKind::List => {
            let view = client.get_list(uri).await?;
            Ok(hydrate_list(&view))
        }
    }
}

/// Following first, then every pinned uri that resolves. Uris that fail to
/// resolve are left out.
pub async fn pinned_feed_infos(client: &dyn ProtocolClient, prefs: &Preferences) -> PinnedFeeds {
    let lookups = prefs
        .feeds
        .pinned
        .iter()
        .map(|uri| async move { (uri, fetch_feed_source_info(client, uri).await) });

    let mut feeds = vec![FeedSourceInfo::following()];
    for (uri, result) in join_all(lookups).await {
        match result {
            Ok(info) => feeds.push(info),
            Err(e) => info!("Failed to fetch pinned feed {}: {}", uri, e),
        }
    }

    let has_pinned_custom = feeds.iter().any(|feed| !feed.is_following());
    PinnedFeeds {
        feeds,
        has_pinned_custom,
    }
}

/// Cursor-driven walk through the popular feed generators.
pub struct PopularFeedsPager {
    client: Arc<dyn ProtocolClient>,
    cursor: Option<String>,
    started: bool,
}

impl PopularFeedsPager {
    pub fn new(client: Arc<dyn ProtocolClient>) -> Self {
        Self {
            client,
            cursor: None,
            started: false,
        }
    }

    pub fn has_next_page(&self) -> bool {
        !self.started || self.cursor.is_some()
    }

    pub async fn next_page(&mut self) -> Result<Vec<GeneratorView>> {
        if !self.has_next_page() {
            return Ok(Vec::new());
        }
        let output = self
            .client
            .get_popular_feed_generators(None, self.cursor.as_deref(), POPULAR_FEEDS_LIMIT)
            .await?;
        debug!(
            "Fetched {} popular feeds (next: {:?})",
            output.feeds.len(),
            output.cursor
        );
        self.started = true;
        self.cursor = output.cursor;
        Ok(output.feeds)
    }
}

pub async fn search_popular_feeds(
    client: &dyn ProtocolClient,
    query: &str,
) -> Result<Vec<GeneratorView>> {
    let output = client
        .get_popular_feed_generators(Some(query), None, POPULAR_FEEDS_LIMIT)
        .await?;
    Ok(output.feeds)
}
