use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeFeedPreferences {
    #[serde(default)]
    pub hide_replies: bool,
    #[serde(default)]
    pub hide_reposts: bool,
    #[serde(default)]
    pub hide_quote_posts: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedPreferences {
    /// Feed generator and list uris, in tab order.
    #[serde(default)]
    pub pinned: Vec<String>,
    #[serde(default)]
    pub saved: Vec<String>,
}

/// Read-only view of the viewer's stored preferences.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub feeds: FeedPreferences,
    #[serde(default)]
    pub content_languages: Vec<String>,
    #[serde(default)]
    pub home_feed: HomeFeedPreferences,
    #[serde(default)]
    pub adult_content_enabled: bool,
    #[serde(default)]
    pub hidden_labels: Vec<String>,
}
