use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const POST_RECORD_TYPE: &str = "app.bsky.feed.post";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub src: String,
    #[serde(default)]
    pub uri: String,
    pub val: String,
    #[serde(default)]
    pub neg: bool,
    #[serde(default)]
    pub cts: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerState {
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub blocked_by: bool,
    #[serde(default)]
    pub blocking: Option<String>,
    #[serde(default)]
    pub following: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub viewer: ViewerState,
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub thumb: String,
    pub fullsize: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalView {
    pub uri: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumb: Option<String>,
}

/// A post embedded inside another post (a quote).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedRecord {
    pub uri: String,
    pub cid: String,
    pub author: ProfileView,
    pub value: Value,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub indexed_at: DateTime<Utc>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEmbed {
    pub record: EmbeddedRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum Embed {
    #[serde(rename = "app.bsky.embed.images#view")]
    Images { images: Vec<ImageView> },
    #[serde(rename = "app.bsky.embed.external#view")]
    External { external: ExternalView },
    #[serde(rename = "app.bsky.embed.record#view")]
    Record { record: EmbeddedRecord },
    #[serde(rename = "app.bsky.embed.recordWithMedia#view")]
    RecordWithMedia { record: RecordEmbed, media: Box<Embed> },
    #[serde(other)]
    Unknown,
}

impl Embed {
    /// The quoted post, if this embed carries one.
    pub fn quoted_record(&self) -> Option<&EmbeddedRecord> {
        match self {
            Embed::Record { record } => Some(record),
            Embed::RecordWithMedia { record, .. } => Some(&record.record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author: ProfileView,
    /// Raw record body. Validated lazily with [`PostRecord::validate`].
    pub record: Value,
    #[serde(default)]
    pub embed: Option<Embed>,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub repost_count: u32,
    #[serde(default)]
    pub like_count: u32,
    pub indexed_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl PostView {
    pub fn quoted_record(&self) -> Option<&EmbeddedRecord> {
        self.embed.as_ref().and_then(Embed::quoted_record)
    }
}

impl From<&EmbeddedRecord> for PostView {
    fn from(record: &EmbeddedRecord) -> Self {
        Self {
            uri: record.uri.clone(),
            cid: record.cid.clone(),
            author: record.author.clone(),
            record: record.value.clone(),
            embed: record.embeds.first().cloned(),
            reply_count: 0,
            repost_count: 0,
            like_count: 0,
            indexed_at: record.indexed_at,
            labels: record.labels.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRecordRef {
    pub root: StrongRef,
    pub parent: StrongRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub index: ByteSlice,
    #[serde(default)]
    pub features: Vec<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("unexpected record type: {0}")]
    WrongType(String),

    #[error("malformed post record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Validated body of a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub text: String,
    #[serde(default)]
    pub langs: Vec<String>,
    #[serde(default)]
    pub facets: Vec<Facet>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reply: Option<ReplyRecordRef>,
}

impl PostRecord {
    /// Structural validation of a raw record value.
    pub fn validate(value: &Value) -> Result<PostRecord, RecordError> {
        let record: PostRecord = serde_json::from_value(value.clone())?;
        if record.record_type != POST_RECORD_TYPE {
            return Err(RecordError::WrongType(record.record_type));
        }
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyReference {
    pub uri: String,
    #[serde(default)]
    pub not_found: bool,
    #[serde(default)]
    pub blocked: bool,
}

/// Parent or root of a reply: either an inline view or a bare reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyTarget {
    Post(Box<PostView>),
    Reference(ReplyReference),
}

impl ReplyTarget {
    pub fn uri(&self) -> &str {
        match self {
            ReplyTarget::Post(post) => &post.uri,
            ReplyTarget::Reference(reference) => &reference.uri,
        }
    }

    pub fn as_post(&self) -> Option<&PostView> {
        match self {
            ReplyTarget::Post(post) => Some(post),
            ReplyTarget::Reference(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: ReplyTarget,
    pub parent: ReplyTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum Reason {
    #[serde(rename = "app.bsky.feed.defs#reasonRepost", rename_all = "camelCase")]
    Repost {
        by: ProfileView,
        indexed_at: DateTime<Utc>,
    },
    /// Set by merge sources to say which configured feed surfaced the item.
    #[serde(rename = "reasonFeedSource", rename_all = "camelCase")]
    FeedSource { uri: String, display_name: String },
    /// Reasons this model does not know, such as pins.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedViewPost {
    pub post: PostView,
    #[serde(default)]
    pub reply: Option<ReplyRef>,
    #[serde(default)]
    pub reason: Option<Reason>,
}

impl FeedViewPost {
    pub fn is_reply(&self) -> bool {
        self.reply.is_some()
    }

    pub fn is_repost(&self) -> bool {
        matches!(self.reason, Some(Reason::Repost { .. }))
    }

    pub fn reply_parent_uri(&self) -> Option<&str> {
        self.reply.as_ref().map(|reply| reply.parent.uri())
    }

    pub fn reply_root_uri(&self) -> Option<&str> {
        self.reply.as_ref().map(|reply| reply.root.uri())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratorViewerState {
    #[serde(default)]
    pub like: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorView {
    pub uri: String,
    pub cid: String,
    pub did: String,
    pub creator: ProfileView,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_facets: Vec<Facet>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub like_count: Option<u32>,
    #[serde(default)]
    pub viewer: Option<GeneratorViewerState>,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListView {
    pub uri: String,
    pub cid: String,
    pub creator: ProfileView,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_facets: Vec<Facet>,
    #[serde(default)]
    pub avatar: Option<String>,
    pub indexed_at: DateTime<Utc>,
}
