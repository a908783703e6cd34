use crate::traits::FeedSource;
use crate::types::{FeedConfig, FeedError, FeedResponse, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use interfaces::defs::{
    AspectRatio, Embed, FeedViewPost, ImageView, PostView, ProfileView, ReplyRef, ReplyReference,
    ReplyTarget, ViewerState, POST_RECORD_TYPE,
};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

const POST_URI_PREFIX: &str = "at://farcaster/app.bsky.feed.post/";

/// Response envelope of the Opencast feed endpoint. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct CastFeedEnvelope {
    #[serde(default)]
    result: Option<CastFeedResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CastFeedResult {
    #[serde(default, alias = "tweets")]
    items: Option<Vec<Value>>,
    #[serde(default)]
    users: Option<HashMap<String, CastUser>>,
    #[serde(default)]
    next_page_cursor: Option<Value>,
}

/// Strings or numbers, read as a string. Anything else counts as absent.
fn loose_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Numbers or numeric strings. Anything else counts as absent.
fn loose_count<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u32>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cast {
    #[serde(default, deserialize_with = "loose_string")]
    id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    created_by: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    images: Option<Vec<CastImage>>,
    #[serde(default, deserialize_with = "loose_count")]
    user_replies: Option<u32>,
    #[serde(default)]
    user_retweets: Option<Vec<Value>>,
    #[serde(default)]
    user_likes: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "loose_string")]
    parent_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    root_parent_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CastImage {
    #[serde(default)]
    src: Option<String>,
    #[serde(default)]
    alt: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct CastUser {
    #[serde(default, deserialize_with = "loose_string")]
    id: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "photoURL")]
    photo_url: Option<String>,
}

struct CastFeedQuery<'a> {
    cursor: &'a str,
    limit: usize,
    skip: usize,
    full: bool,
}

struct CastFeedPage {
    posts: Vec<FeedViewPost>,
    next_offset: Option<String>,
}

/// Generator source backed by the Opencast (Farcaster) HTTP API instead of the
/// native protocol.
///
/// The backend pages by offset relative to a reference timestamp. The
/// reference is fixed when the source is created so that casts arriving during
/// the session do not shift the offsets.
pub struct OpencastSource {
    id: Uuid,
    pub feed: String,
    fid: String,
    endpoint: Url,
    client: Client,
    reference_cursor: String,
}

impl OpencastSource {
    pub fn new(feed: &str, config: &FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let endpoint = Url::parse(&config.opencast_url)?.join("api/feed")?;
        let fid = feed.rsplit('/').next().unwrap_or_default().to_string();

        Ok(Self {
            id: Uuid::new_v4(),
            feed: feed.to_string(),
            fid,
            endpoint,
            client,
            reference_cursor: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    /// Timestamp that anchors every page request of this session.
    pub fn reference_cursor(&self) -> &str {
        &self.reference_cursor
    }

    fn parse_offset(&self, cursor: Option<&str>) -> Result<usize> {
        match cursor {
            None => Ok(0),
            Some(cursor) => cursor.parse().map_err(|_| FeedError::InvalidCursor {
                source_name: self.source_name(),
                cursor: cursor.to_string(),
            }),
        }
    }

    async fn get_cast_feed(&self, query: CastFeedQuery<'_>) -> Result<CastFeedPage> {
        let limit = query.limit.max(1).to_string();
        let skip = query.skip.to_string();
        let full = if query.full { "true" } else { "false" };

        debug!(
            "Requesting Opencast feed {} (skip: {}, limit: {})",
            self.fid, skip, limit
        );

        let response = self
            .client
            .get(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .query(&[
                ("fid", self.fid.as_str()),
                ("limit", limit.as_str()),
                ("full", full),
                ("cursor", query.cursor),
                ("after", ""),
                ("skip", skip.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let envelope: CastFeedEnvelope = response.json().await?;
        let result = envelope.result.unwrap_or_default();
        let users = result.users.unwrap_or_default();
        let fallback_time = DateTime::parse_from_rfc3339(query.cursor)
            .map(|time| time.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let posts: Vec<FeedViewPost> = result
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Cast>(value) {
                Ok(cast) => Some(convert_cast_to_post(cast, &users, fallback_time)),
                Err(e) => {
                    warn!("Skipping unreadable cast in feed {}: {}", self.fid, e);
                    None
                }
            })
            .collect();

        let next_offset = result.next_page_cursor.and_then(|cursor| match cursor {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Ok(CastFeedPage { posts, next_offset })
    }
}

fn convert_cast_to_post(
    cast: Cast,
    users: &HashMap<String, CastUser>,
    fallback_time: DateTime<Utc>,
) -> FeedViewPost {
    let id = cast.id.unwrap_or_default();
    let created_by = cast.created_by.unwrap_or_default();
    let user = users.get(&created_by).cloned().unwrap_or_default();
    let created_at = cast
        .created_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|time| time.with_timezone(&Utc))
        .unwrap_or(fallback_time);

    let reply = cast.parent_id.as_ref().map(|parent| {
        let root = cast.root_parent_id.as_ref().unwrap_or(parent);
        ReplyRef {
            root: ReplyTarget::Reference(ReplyReference {
                uri: format!("{}{}", POST_URI_PREFIX, root),
                not_found: false,
                blocked: false,
            }),
            parent: ReplyTarget::Reference(ReplyReference {
                uri: format!("{}{}", POST_URI_PREFIX, parent),
                not_found: false,
                blocked: false,
            }),
        }
    });

    let mut record = json!({
        "$type": POST_RECORD_TYPE,
        "text": cast.text.unwrap_or_default(),
        "langs": ["en"],
        "facets": [],
        "createdAt": created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    });
    if let Some(reply) = &reply {
        record["reply"] = json!({
            "root": {"uri": reply.root.uri(), "cid": ""},
            "parent": {"uri": reply.parent.uri(), "cid": ""},
        });
    }

    let images: Vec<ImageView> = cast
        .images
        .unwrap_or_default()
        .into_iter()
        .map(|image| {
            let src = image.src.unwrap_or_default();
            ImageView {
                thumb: src.clone(),
                fullsize: src,
                alt: image.alt.unwrap_or_default(),
                aspect_ratio: Some(AspectRatio {
                    width: 1,
                    height: 1,
                }),
            }
        })
        .collect();
    let embed = (!images.is_empty()).then_some(Embed::Images { images });

    FeedViewPost {
        post: PostView {
            uri: format!("{}{}", POST_URI_PREFIX, id),
            cid: id,
            author: ProfileView {
                did: user.id.unwrap_or(created_by),
                handle: user.username.unwrap_or_default(),
                display_name: user.name,
                avatar: user.photo_url,
                viewer: ViewerState::default(),
                labels: Vec::new(),
            },
            record,
            embed,
            reply_count: cast.user_replies.unwrap_or(0),
            repost_count: cast.user_retweets.map(|v| v.len() as u32).unwrap_or(0),
            like_count: cast.user_likes.map(|v| v.len() as u32).unwrap_or(0),
            indexed_at: created_at,
            labels: Vec::new(),
        },
        reply,
        reason: None,
    }
}

#[async_trait]
impl FeedSource for OpencastSource {
    fn source_id(&self) -> String {
        format!("opencast_{}", self.id)
    }

    fn source_name(&self) -> String {
        format!("Opencast feed ({})", self.fid)
    }

    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<FeedResponse> {
        let skip = self.parse_offset(cursor)?;
        let page = self
            .get_cast_feed(CastFeedQuery {
                cursor: &self.reference_cursor,
                limit,
                skip,
                full: true,
            })
            .await?;

        info!(
            "Pulled {} casts from Opencast feed {} (skip: {})",
            page.posts.len(),
            self.fid,
            skip
        );

        let cursor = if page.posts.is_empty() {
            None
        } else {
            Some(
                page.next_offset
                    .unwrap_or_else(|| (skip + page.posts.len()).to_string()),
            )
        };
        Ok(FeedResponse::new(page.posts, cursor).capped(limit))
    }

    async fn peek_latest(&self) -> Result<Option<FeedViewPost>> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let page = self
            .get_cast_feed(CastFeedQuery {
                cursor: &now,
                limit: 1,
                skip: 0,
                full: false,
            })
            .await?;
        Ok(page.posts.into_iter().next())
    }
}
