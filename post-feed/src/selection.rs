use crate::moderation::is_slice_filtered;
use crate::page::{FeedData, FeedPage, FeedSlice, FeedSliceItem, RawPage};
use crate::tuner::{FeedViewPostsSlice, Tuner, TunerConfig};
use interfaces::defs::PostRecord;
use interfaces::moderation::{ModerationOpts, Moderator};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything besides the raw pages that a selection depends on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionInputs {
    pub tuner: TunerConfig,
    pub moderation: ModerationOpts,
    /// Author exempt from the moderation filter (e.g. the profile being
    /// viewed).
    pub ignore_filter_for: Option<String>,
}

struct LastRun {
    pages: Vec<Arc<RawPage>>,
    inputs: SelectionInputs,
    result: FeedData,
}

/// Memo of the previous selection for one session.
#[derive(Default)]
pub struct SelectionCache {
    last_run: Option<LastRun>,
}

impl SelectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processed pages for `pages` under `inputs`.
    ///
    /// Pages are reused from the previous run while they are the same `Arc`
    /// and the inputs are unchanged; the first mismatch and everything after
    /// it is tuned again, starting from the tuner state of the last reused
    /// page.
    pub fn select(
        &mut self,
        pages: &[Arc<RawPage>],
        inputs: &SelectionInputs,
        moderator: &dyn Moderator,
    ) -> FeedData {
        let reused = match &self.last_run {
            Some(last) if last.inputs == *inputs => pages
                .iter()
                .zip(&last.pages)
                .take_while(|(current, previous)| Arc::ptr_eq(current, previous))
                .count(),
            _ => 0,
        };

        let (mut processed, mut tuner) = match &self.last_run {
            Some(last) if reused > 0 => {
                if reused == pages.len() && reused == last.pages.len() {
                    debug!("Selection unchanged, reusing all {} pages", reused);
                    return last.result.clone();
                }
                let kept = last.result.pages[..reused].to_vec();
                let tuner = Tuner::clone(&kept[reused - 1].tuner);
                (kept, tuner)
            }
            _ => (Vec::with_capacity(pages.len()), inputs.tuner.build()),
        };

        debug!(
            "Selecting {} pages ({} reused, {} recomputed)",
            pages.len(),
            reused,
            pages.len() - reused
        );

        for raw in &pages[reused..] {
            processed.push(Arc::new(process_page(raw, &mut tuner, inputs, moderator)));
        }

        let result = FeedData {
            tuner: processed
                .last()
                .map(|page| page.tuner.clone())
                .unwrap_or_else(|| Arc::new(tuner)),
            pages: processed,
        };

        self.last_run = Some(LastRun {
            pages: pages.to_vec(),
            inputs: inputs.clone(),
            result: result.clone(),
        });
        result
    }
}

fn process_page(
    raw: &RawPage,
    tuner: &mut Tuner,
    inputs: &SelectionInputs,
    moderator: &dyn Moderator,
) -> FeedPage {
    let slices = tuner
        .tune(&raw.feed)
        .into_iter()
        .filter_map(|slice| build_slice(slice, inputs, moderator))
        .collect();

    FeedPage {
        source: raw.source.clone(),
        cursor: raw.cursor.clone(),
        fetched_at: raw.fetched_at,
        tuner: Arc::new(tuner.clone()),
        slices,
    }
}

fn build_slice(
    slice: FeedViewPostsSlice,
    inputs: &SelectionInputs,
    moderator: &dyn Moderator,
) -> Option<FeedSlice> {
    let is_thread = slice.is_thread();
    let root_uri = slice.root_uri().to_string();
    let key = slice.key;

    let items: Vec<FeedSliceItem> = slice
        .items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match PostRecord::validate(&item.post.record) {
            Ok(record) => Some(FeedSliceItem {
                key: format!("{}-{}", key, index),
                uri: item.post.uri.clone(),
                moderation: moderator.moderate(&item.post, &inputs.moderation),
                record,
                post: item.post,
                reason: item.reason,
            }),
            Err(e) => {
                warn!("Dropping post {} with invalid record: {}", item.post.uri, e);
                None
            }
        })
        .collect();

    if items.is_empty() || is_slice_filtered(&items, inputs.ignore_filter_for.as_deref()) {
        return None;
    }

    Some(FeedSlice {
        key,
        root_uri,
        is_thread,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::LabelModerator;
    use crate::traits::FeedSource;
    use crate::types::{FeedResponse, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use interfaces::defs::{FeedViewPost, PostView, ProfileView};
    use serde_json::json;

    struct StaticSource;

    #[async_trait]
    impl FeedSource for StaticSource {
        fn source_id(&self) -> String {
            "static".to_string()
        }

        fn source_name(&self) -> String {
            "Static".to_string()
        }

        async fn fetch(&self, _cursor: Option<&str>, _limit: usize) -> Result<FeedResponse> {
            Ok(FeedResponse::default())
        }

        async fn peek_latest(&self) -> Result<Option<FeedViewPost>> {
            Ok(None)
        }
    }

    fn item(id: &str, record: serde_json::Value) -> FeedViewPost {
        FeedViewPost {
            post: PostView {
                uri: format!("at://did:plc:{}/app.bsky.feed.post/{}", id, id),
                cid: id.to_string(),
                author: ProfileView {
                    did: format!("did:plc:{}", id),
                    handle: format!("{}.test", id),
                    ..Default::default()
                },
                record,
                embed: None,
                reply_count: 0,
                repost_count: 0,
                like_count: 0,
                indexed_at: Utc::now(),
                labels: Vec::new(),
            },
            reply: None,
            reason: None,
        }
    }

    fn valid(id: &str) -> FeedViewPost {
        item(
            id,
            json!({
                "$type": "app.bsky.feed.post",
                "text": id,
                "createdAt": "2024-01-10T11:45:00.000Z",
            }),
        )
    }

    fn raw(feed: Vec<FeedViewPost>) -> Arc<RawPage> {
        Arc::new(RawPage {
            source: Arc::new(StaticSource),
            cursor: Some("next".to_string()),
            feed,
            fetched_at: Utc::now(),
        })
    }

    #[test]
    fn invalid_records_are_dropped_with_their_empty_slices() {
        let page = raw(vec![
            valid("a"),
            item("b", json!({"$type": "app.bsky.feed.post"})),
            item("c", json!({"$type": "app.bsky.graph.follow", "text": "", "createdAt": "2024-01-10T11:45:00.000Z"})),
        ]);
        let mut cache = SelectionCache::new();
        let data = cache.select(&[page], &SelectionInputs::default(), &LabelModerator);

        assert_eq!(data.slice_count(), 1);
        let slice = &data.pages[0].slices[0];
        assert_eq!(slice.items[0].record.text, "a");
        assert_eq!(slice.items[0].key, format!("{}-0", slice.key));
    }

    #[test]
    fn unchanged_selection_returns_the_same_pages() {
        let pages = vec![raw(vec![valid("a")]), raw(vec![valid("b")])];
        let inputs = SelectionInputs::default();
        let mut cache = SelectionCache::new();

        let first = cache.select(&pages, &inputs, &LabelModerator);
        let second = cache.select(&pages, &inputs, &LabelModerator);

        assert!(first
            .pages
            .iter()
            .zip(&second.pages)
            .all(|(a, b)| Arc::ptr_eq(a, b)));
        assert!(Arc::ptr_eq(&first.tuner, &second.tuner));
    }

    #[test]
    fn appended_page_reuses_the_prefix() {
        let a = raw(vec![valid("a")]);
        let b = raw(vec![valid("b"), valid("a")]);
        let inputs = SelectionInputs::default();
        let mut cache = SelectionCache::new();

        let first = cache.select(&[a.clone()], &inputs, &LabelModerator);
        let second = cache.select(&[a, b], &inputs, &LabelModerator);

        assert!(Arc::ptr_eq(&first.pages[0], &second.pages[0]));
        // "a" was already emitted on the reused page.
        assert_eq!(second.pages[1].slices.len(), 1);
        assert_eq!(second.pages[1].slices[0].items[0].record.text, "b");
    }

    #[test]
    fn changed_inputs_recompute_every_page() {
        let pages = vec![raw(vec![valid("a")])];
        let mut cache = SelectionCache::new();

        let first = cache.select(&pages, &SelectionInputs::default(), &LabelModerator);
        let changed = SelectionInputs {
            ignore_filter_for: Some("did:plc:a".to_string()),
            ..Default::default()
        };
        let second = cache.select(&pages, &changed, &LabelModerator);

        assert!(!Arc::ptr_eq(&first.pages[0], &second.pages[0]));
        assert_eq!(first.pages[0].slices, second.pages[0].slices);
    }
}
