use crate::types::FeedError;
use interfaces::client::AuthorFilter;
use std::fmt;
use std::str::FromStr;

/// Feed uris with this prefix are served by the Opencast backend.
pub const OPENCAST_FEED_PREFIX: &str = "at://farcaster/";

/// Which feed a session paginates.
///
/// Textual form: `home`, `following`, `author|<actor>|<filter>`,
/// `feedgen|<uri>`, `likes|<actor>`, `list|<uri>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedDescriptor {
    Home,
    Following,
    Author { actor: String, filter: AuthorFilter },
    FeedGen { uri: String },
    Likes { actor: String },
    List { uri: String },
}

impl FeedDescriptor {
    pub fn is_opencast(&self) -> bool {
        matches!(self, FeedDescriptor::FeedGen { uri } if uri.starts_with(OPENCAST_FEED_PREFIX))
    }

    /// Timeline-like feeds that the home feed preferences apply to.
    pub fn is_timeline(&self) -> bool {
        matches!(self, FeedDescriptor::Home | FeedDescriptor::Following)
    }
}

impl fmt::Display for FeedDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedDescriptor::Home => write!(f, "home"),
            FeedDescriptor::Following => write!(f, "following"),
            FeedDescriptor::Author { actor, filter } => write!(f, "author|{}|{}", actor, filter),
            FeedDescriptor::FeedGen { uri } => write!(f, "feedgen|{}", uri),
            FeedDescriptor::Likes { actor } => write!(f, "likes|{}", actor),
            FeedDescriptor::List { uri } => write!(f, "list|{}", uri),
        }
    }
}

impl FromStr for FeedDescriptor {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FeedError::InvalidDescriptor(s.to_string());
        let parts: Vec<&str> = s.split('|').collect();

        match parts.as_slice() {
            ["home"] => Ok(FeedDescriptor::Home),
            ["following"] => Ok(FeedDescriptor::Following),
            ["author", actor, filter] if !actor.is_empty() => Ok(FeedDescriptor::Author {
                actor: actor.to_string(),
                filter: filter.parse().map_err(|_| invalid())?,
            }),
            ["feedgen", uri] if !uri.is_empty() => Ok(FeedDescriptor::FeedGen {
                uri: uri.to_string(),
            }),
            ["likes", actor] if !actor.is_empty() => Ok(FeedDescriptor::Likes {
                actor: actor.to_string(),
            }),
            ["list", uri] if !uri.is_empty() => Ok(FeedDescriptor::List {
                uri: uri.to_string(),
            }),
            _ => Err(invalid()),
        }
    }
}
