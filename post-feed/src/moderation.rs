use crate::page::FeedSliceItem;
use crate::types::{FeedError, Result};
use interfaces::defs::{FeedViewPost, Label, PostView};
use interfaces::moderation::{ModerationDecision, ModerationOpts, Moderator};
use tracing::debug;

const ADULT_LABELS: &[&str] = &["porn", "sexual", "nudity"];

/// A slice is dropped as a whole when any of its items is filtered, unless
/// that item's author is the exempted one.
pub fn is_slice_filtered(items: &[FeedSliceItem], ignore_filter_for: Option<&str>) -> bool {
    items.iter().any(|item| {
        item.moderation.content.filter && Some(item.post.author.did.as_str()) != ignore_filter_for
    })
}

/// Logged-out sessions refuse pages where no post survives the default
/// logged-out moderation. An empty page passes.
pub fn assert_some_posts_pass_moderation(
    feed: &[FeedViewPost],
    moderator: &dyn Moderator,
) -> Result<()> {
    if feed.is_empty() {
        return Ok(());
    }

    let opts = ModerationOpts::logged_out();
    let any_visible = feed
        .iter()
        .any(|item| !moderator.moderate(&item.post, &opts).content.filter);

    if any_visible {
        Ok(())
    } else {
        debug!("All {} posts on the page failed logged-out moderation", feed.len());
        Err(FeedError::NothingSuitablePublic)
    }
}

/// Label and relationship based moderator.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelModerator;

impl LabelModerator {
    fn label_cause(label: &Label, opts: &ModerationOpts) -> Option<String> {
        if label.neg {
            return None;
        }
        let val = label.val.as_str();
        let filtered = val == "!hide"
            || (val == "!no-unauthenticated" && opts.user_did.is_none())
            || opts.hidden_labels.iter().any(|hidden| hidden == val)
            || (!opts.adult_content_enabled && ADULT_LABELS.contains(&val));
        filtered.then(|| format!("label:{}", val))
    }
}

impl Moderator for LabelModerator {
    fn moderate(&self, post: &PostView, opts: &ModerationOpts) -> ModerationDecision {
        let viewer = &post.author.viewer;
        if viewer.muted {
            return ModerationDecision::filter("muted");
        }
        if viewer.blocked_by || viewer.blocking.is_some() {
            return ModerationDecision::filter("blocked");
        }

        post.labels
            .iter()
            .chain(post.author.labels.iter())
            .find_map(|label| Self::label_cause(label, opts))
            .map(ModerationDecision::filter)
            .unwrap_or_else(ModerationDecision::allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use interfaces::defs::{PostRecord, ProfileView, ViewerState};
    use serde_json::json;

    fn post_with_labels(author: &str, labels: &[&str]) -> PostView {
        PostView {
            uri: format!("at://{}/app.bsky.feed.post/1", author),
            cid: "cid".to_string(),
            author: ProfileView {
                did: author.to_string(),
                handle: "someone.test".to_string(),
                ..Default::default()
            },
            record: json!({
                "$type": "app.bsky.feed.post",
                "text": "hi",
                "createdAt": "2024-01-10T11:45:00.000Z",
            }),
            embed: None,
            reply_count: 0,
            repost_count: 0,
            like_count: 0,
            indexed_at: Utc::now(),
            labels: labels
                .iter()
                .map(|val| Label {
                    src: "did:plc:labeler".to_string(),
                    val: val.to_string(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn slice_item(post: PostView, filter: bool) -> FeedSliceItem {
        FeedSliceItem {
            key: "slice-x-0-0".to_string(),
            uri: post.uri.clone(),
            record: PostRecord::validate(&post.record).unwrap(),
            post,
            reason: None,
            moderation: if filter {
                ModerationDecision::filter("test")
            } else {
                ModerationDecision::allow()
            },
        }
    }

    #[test]
    fn one_filtered_item_hides_the_slice() {
        let items = vec![
            slice_item(post_with_labels("did:plc:alice", &[]), false),
            slice_item(post_with_labels("did:plc:bob", &[]), true),
        ];
        assert!(is_slice_filtered(&items, None));
        assert!(is_slice_filtered(&items, Some("did:plc:alice")));
        assert!(!is_slice_filtered(&items, Some("did:plc:bob")));
        assert!(!is_slice_filtered(&items[..1], None));
    }

    #[test]
    fn label_moderator_respects_viewer_and_labels() {
        let moderator = LabelModerator;
        let logged_out = ModerationOpts::logged_out();
        let signed_in = ModerationOpts::for_user("did:plc:viewer", Vec::new());

        let plain = post_with_labels("did:plc:alice", &[]);
        assert!(!moderator.moderate(&plain, &logged_out).content.filter);

        let no_unauth = post_with_labels("did:plc:alice", &["!no-unauthenticated"]);
        assert!(moderator.moderate(&no_unauth, &logged_out).content.filter);
        assert!(!moderator.moderate(&no_unauth, &signed_in).content.filter);

        let adult = post_with_labels("did:plc:alice", &["porn"]);
        assert!(moderator.moderate(&adult, &signed_in).content.filter);
        let adult_ok = ModerationOpts {
            adult_content_enabled: true,
            ..signed_in.clone()
        };
        assert!(!moderator.moderate(&adult, &adult_ok).content.filter);

        let mut muted = plain.clone();
        muted.author.viewer = ViewerState {
            muted: true,
            ..Default::default()
        };
        assert_eq!(
            moderator.moderate(&muted, &signed_in).content.cause.as_deref(),
            Some("muted")
        );
    }

    #[test]
    fn negated_labels_are_ignored() {
        let mut post = post_with_labels("did:plc:alice", &["!hide"]);
        post.labels[0].neg = true;
        assert!(!LabelModerator
            .moderate(&post, &ModerationOpts::logged_out())
            .content
            .filter);
    }

    #[test]
    fn logged_out_pages_need_one_visible_post() {
        let hidden = FeedViewPost {
            post: post_with_labels("did:plc:alice", &["!no-unauthenticated"]),
            reply: None,
            reason: None,
        };
        let visible = FeedViewPost {
            post: post_with_labels("did:plc:bob", &[]),
            reply: None,
            reason: None,
        };

        assert!(assert_some_posts_pass_moderation(&[], &LabelModerator).is_ok());
        assert!(
            assert_some_posts_pass_moderation(&[hidden.clone(), visible], &LabelModerator).is_ok()
        );
        assert!(matches!(
            assert_some_posts_pass_moderation(&[hidden], &LabelModerator),
            Err(FeedError::NothingSuitablePublic)
        ));
    }
}
