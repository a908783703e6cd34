use crate::defs::PostView;

/// Labels hidden from logged-out viewers regardless of other settings.
pub const LOGGED_OUT_HIDDEN_LABELS: &[&str] = &[
    "!no-unauthenticated",
    "porn",
    "sexual",
    "nudity",
    "graphic-media",
    "gore",
];

/// Viewer-specific inputs to a moderation decision.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModerationOpts {
    pub user_did: Option<String>,
    pub adult_content_enabled: bool,
    pub hidden_labels: Vec<String>,
}

impl ModerationOpts {
    /// Default options for a viewer without a session.
    pub fn logged_out() -> Self {
        Self {
            user_did: None,
            adult_content_enabled: false,
            hidden_labels: LOGGED_OUT_HIDDEN_LABELS
                .iter()
                .map(|label| label.to_string())
                .collect(),
        }
    }

    pub fn for_user(user_did: impl Into<String>, hidden_labels: Vec<String>) -> Self {
        Self {
            user_did: Some(user_did.into()),
            adult_content_enabled: false,
            hidden_labels,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModerationUi {
    pub filter: bool,
    pub blur: bool,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModerationDecision {
    pub content: ModerationUi,
}

impl ModerationDecision {
    pub fn allow() -> Self {
        Self::default()
    }

    pub fn filter(cause: impl Into<String>) -> Self {
        Self {
            content: ModerationUi {
                filter: true,
                blur: true,
                cause: Some(cause.into()),
            },
        }
    }
}

/// The moderation engine, consumed as a pure function.
pub trait Moderator: Send + Sync {
    fn moderate(&self, post: &PostView, opts: &ModerationOpts) -> ModerationDecision;
}
