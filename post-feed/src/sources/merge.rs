use crate::descriptor::FeedDescriptor;
use crate::sources::{create_source, SourceContext};
use crate::traits::FeedSource;
use crate::tuner::{rules_for, FeedTuner, TunerRule};
use crate::types::{FeedError, FeedParams, FeedResponse, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use interfaces::defs::{FeedViewPost, Reason};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

const CURSOR_PREFIX: &str = "merge|";
const LIST_COLLECTION: &str = "app.bsky.graph.list";

/// How buffered member items are interleaved into one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// One item from each member in turn.
    #[default]
    RoundRobin,
    /// Always the newest buffered head.
    Recency,
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergePolicy::RoundRobin => f.write_str("round-robin"),
            MergePolicy::Recency => f.write_str("recency"),
        }
    }
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "round-robin" => Ok(MergePolicy::RoundRobin),
            "recency" => Ok(MergePolicy::Recency),
            other => Err(format!("unknown merge policy: {}", other)),
        }
    }
}

/// One feed taking part in a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeMember {
    pub descriptor: FeedDescriptor,
    pub rules: Vec<TunerRule>,
    pub label: String,
}

struct MemberState {
    label: String,
    tag: Option<Reason>,
    source: Arc<dyn FeedSource>,
    tuner: FeedTuner,
    cursor: Option<String>,
    exhausted: bool,
    buffer: VecDeque<FeedViewPost>,
}

impl MemberState {
    fn absorb(&mut self, response: FeedResponse) {
        let items = self
            .tuner
            .tune(&response.feed)
            .into_iter()
            .flat_map(|slice| slice.items)
            .map(|mut item| {
                if item.reason.is_none() {
                    item.reason = self.tag.clone();
                }
                item
            });
        self.buffer.extend(items);
        self.exhausted = response.cursor.is_none();
        self.cursor = response.cursor;
        debug!(
            "Member {} buffered {} items (exhausted: {})",
            self.label,
            self.buffer.len(),
            self.exhausted
        );
    }
}

struct MergeState {
    members: Vec<MemberState>,
    page: u64,
}

impl MergeState {
    fn cursor(&self) -> String {
        format!("{}{}", CURSOR_PREFIX, self.page)
    }

    fn has_more(&self) -> bool {
        self.members
            .iter()
            .any(|member| !member.exhausted || !member.buffer.is_empty())
    }

    fn drain(&mut self, policy: MergePolicy, limit: usize) -> Vec<FeedViewPost> {
        let mut feed = Vec::with_capacity(limit);
        match policy {
            MergePolicy::RoundRobin => {
                while feed.len() < limit {
                    let before = feed.len();
                    for member in &mut self.members {
                        if feed.len() >= limit {
                            break;
                        }
                        if let Some(item) = member.buffer.pop_front() {
                            feed.push(item);
                        }
                    }
                    if feed.len() == before {
                        break;
                    }
                }
            }
            MergePolicy::Recency => {
                while feed.len() < limit {
                    let newest = self
                        .members
                        .iter_mut()
                        .filter(|member| !member.buffer.is_empty())
                        .max_by_key(|member| member.buffer.front().map(sort_time));
                    match newest.and_then(|member| member.buffer.pop_front()) {
                        Some(item) => feed.push(item),
                        None => break,
                    }
                }
            }
        }
        feed
    }
}

fn sort_time(item: &FeedViewPost) -> DateTime<Utc> {
    match &item.reason {
        Some(Reason::Repost { indexed_at, .. }) => *indexed_at,
        _ => item.post.indexed_at,
    }
}

/// Interleaves several feeds into one stream. The stream ends once every
/// member has ended and every buffer is drained.
pub struct MergeSource {
    id: Uuid,
    ctx: SourceContext,
    members: Vec<MergeMember>,
    policy: MergePolicy,
    state: Mutex<Option<MergeState>>,
}

impl MergeSource {
    pub fn new(ctx: SourceContext, members: Vec<MergeMember>, policy: MergePolicy) -> Self {
        Self {
            id: Uuid::new_v4(),
            ctx,
            members,
            policy,
            state: Mutex::new(None),
        }
    }

    /// Following timeline plus the configured extra feeds and lists.
    pub fn for_home(ctx: SourceContext, params: &FeedParams) -> Self {
        let mut members = vec![MergeMember {
            rules: rules_for(&FeedDescriptor::Following, &ctx.preferences),
            descriptor: FeedDescriptor::Following,
            label: "Following".to_string(),
        }];
        for uri in &params.merge_feed_sources {
            let descriptor = if uri.contains(LIST_COLLECTION) {
                FeedDescriptor::List { uri: uri.clone() }
            } else {
                FeedDescriptor::FeedGen { uri: uri.clone() }
            };
            members.push(MergeMember {
                rules: rules_for(&descriptor, &ctx.preferences),
                descriptor,
                label: uri.rsplit('/').next().unwrap_or(uri).to_string(),
            });
        }
        let policy = ctx.config.merge_policy;
        Self::new(ctx, members, policy)
    }

    pub fn members(&self) -> &[MergeMember] {
        &self.members
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    fn start(&self) -> Result<MergeState> {
        let members = self
            .members
            .iter()
            .map(|member| {
                let source = create_source(&member.descriptor, &FeedParams::default(), &self.ctx)?;
                let tag = match &member.descriptor {
                    FeedDescriptor::FeedGen { uri } | FeedDescriptor::List { uri } => {
                        Some(Reason::FeedSource {
                            uri: uri.clone(),
                            display_name: member.label.clone(),
                        })
                    }
                    _ => None,
                };
                Ok(MemberState {
                    label: member.label.clone(),
                    tag,
                    source,
                    tuner: FeedTuner::new(member.rules.clone()),
                    cursor: None,
                    exhausted: false,
                    buffer: VecDeque::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Starting merge of {} feeds ({})", members.len(), self.policy);
        Ok(MergeState { members, page: 0 })
    }

    fn invalid_cursor(&self, cursor: &str) -> FeedError {
        FeedError::InvalidCursor {
            source_name: self.source_name(),
            cursor: cursor.to_string(),
        }
    }
}

#[async_trait]
impl FeedSource for MergeSource {
    fn source_id(&self) -> String {
        format!("merge_{}", self.id)
    }

    fn source_name(&self) -> String {
        format!("Merged feed ({} members)", self.members.len())
    }

    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<FeedResponse> {
        let limit = limit.max(1);
        let mut guard = self.state.lock().await;
        if cursor.is_none() {
            *guard = Some(self.start()?);
        }
        let state = match guard.as_mut() {
            Some(state) if cursor.map_or(true, |c| c == state.cursor()) => state,
            _ => return Err(self.invalid_cursor(cursor.unwrap_or_default())),
        };

        let pending: Vec<usize> = state
            .members
            .iter()
            .enumerate()
            .filter(|(_, member)| !member.exhausted && member.buffer.len() < limit)
            .map(|(index, _)| index)
            .collect();
        let fetches: Vec<_> = pending
            .iter()
            .map(|&index| {
                let source = state.members[index].source.clone();
                let cursor = state.members[index].cursor.clone();
                async move { source.fetch(cursor.as_deref(), limit).await }
            })
            .collect();
        let results = join_all(fetches).await;

        let mut first_error = None;
        for (index, result) in pending.into_iter().zip(results) {
            let member = &mut state.members[index];
            match result {
                Ok(response) => member.absorb(response),
                Err(e) => {
                    warn!("Merge member {} failed: {}", member.label, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let feed = state.drain(self.policy, limit);
        state.page += 1;
        let next = state.has_more().then(|| state.cursor());
        debug!(
            "Merged page {} with {} items (more: {})",
            state.page,
            feed.len(),
            next.is_some()
        );
        Ok(FeedResponse::new(feed, next))
    }

    async fn peek_latest(&self) -> Result<Option<FeedViewPost>> {
        let started = self.state.lock().await.as_ref().map(|state| {
            state
                .members
                .iter()
                .map(|member| (member.label.clone(), member.source.clone()))
                .collect::<Vec<_>>()
        });
        let sources: Vec<(String, Arc<dyn FeedSource>)> = match started {
            Some(sources) => sources,
            None => self
                .start()?
                .members
                .into_iter()
                .map(|member| (member.label, member.source))
                .collect(),
        };

        let peeks = join_all(sources.iter().map(|(_, source)| source.peek_latest())).await;
        let newest = sources
            .iter()
            .zip(peeks)
            .filter_map(|((label, _), peek)| match peek {
                Ok(item) => item,
                Err(e) => {
                    warn!("Peek on merge member {} failed: {}", label, e);
                    None
                }
            })
            .max_by_key(sort_time);
        Ok(newest)
    }
}
