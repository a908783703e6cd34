use crate::page::FeedData;
use std::slice;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Active,
    Background,
    Inactive,
}

/// Whether the feed's source has something new at the top.
///
/// Only polls while the app is in the foreground. Uses a dry run of the
/// session tuner, so nothing about the session changes.
pub async fn poll_latest(data: &FeedData, app_state: AppState) -> bool {
    if app_state != AppState::Active {
        return false;
    }
    let Some(page) = data.pages.first() else {
        return false;
    };

    match page.source.peek_latest().await {
        Ok(Some(item)) => {
            let has_new = !data.tuner.tune_dry_run(slice::from_ref(&item)).is_empty();
            debug!(
                "Peeked {} on {}: new content {}",
                item.post.uri,
                page.source.source_name(),
                has_new
            );
            has_new
        }
        Ok(None) => false,
        Err(e) => {
            warn!("Polling {} failed: {}", page.source.source_name(), e);
            false
        }
    }
}
