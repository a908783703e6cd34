use crate::descriptor::FeedDescriptor;
use interfaces::defs::{FeedViewPost, Reason};
use interfaces::preferences::Preferences;
use std::collections::HashSet;

/// Slice-level filters applied after grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunerRule {
    /// Drop slices whose root is a reply (reposted replies are kept).
    RemoveReplies,
    RemoveReposts,
    /// Drop slices where any item quotes another post.
    RemoveQuotePosts,
    /// Keep slices written in one of these languages. Untagged posts always
    /// match; when nothing matches the page is left untouched.
    PreferredLanguages(Vec<String>),
}

/// How a session wants its pages tuned. Compared by value by the selection
/// cache.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TunerConfig {
    pub disabled: bool,
    pub rules: Vec<TunerRule>,
}

impl TunerConfig {
    pub fn new(rules: Vec<TunerRule>) -> Self {
        Self {
            disabled: false,
            rules,
        }
    }

    pub fn disabled() -> Self {
        Self {
            disabled: true,
            rules: Vec::new(),
        }
    }

    /// Fresh tuner with empty dedup memory.
    pub fn build(&self) -> Tuner {
        if self.disabled {
            Tuner::Noop
        } else {
            Tuner::Feed(FeedTuner::new(self.rules.clone()))
        }
    }
}

/// Rule set for a feed, derived from the viewer's preferences.
pub fn rules_for(descriptor: &FeedDescriptor, prefs: &Preferences) -> Vec<TunerRule> {
    match descriptor {
        descriptor if descriptor.is_timeline() => {
            let mut rules = Vec::new();
            if prefs.home_feed.hide_replies {
                rules.push(TunerRule::RemoveReplies);
            }
            if prefs.home_feed.hide_reposts {
                rules.push(TunerRule::RemoveReposts);
            }
            if prefs.home_feed.hide_quote_posts {
                rules.push(TunerRule::RemoveQuotePosts);
            }
            rules
        }
        FeedDescriptor::FeedGen { .. } | FeedDescriptor::List { .. } => {
            if prefs.content_languages.is_empty() {
                Vec::new()
            } else {
                vec![TunerRule::PreferredLanguages(prefs.content_languages.clone())]
            }
        }
        _ => Vec::new(),
    }
}

/// Items of one reply thread, in page order, before validation and moderation.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedViewPostsSlice {
    pub key: String,
    pub items: Vec<FeedViewPost>,
}

impl FeedViewPostsSlice {
    fn new(item: FeedViewPost) -> Self {
        let indexed_at = match &item.reason {
            Some(Reason::Repost { indexed_at, .. }) => *indexed_at,
            _ => item.post.indexed_at,
        };
        Self {
            key: format!(
                "slice-{}-{}",
                item.post.uri,
                indexed_at.timestamp_millis()
            ),
            items: vec![item],
        }
    }

    pub fn root(&self) -> &FeedViewPost {
        &self.items[0]
    }

    pub fn root_uri(&self) -> &str {
        &self.root().post.uri
    }

    /// More than one item, all by the root's author.
    pub fn is_thread(&self) -> bool {
        let author = &self.root().post.author.did;
        self.items.len() > 1 && self.items.iter().all(|item| &item.post.author.did == author)
    }

    fn contains_uri(&self, uri: &str) -> bool {
        self.items.iter().any(|item| item.post.uri == uri)
    }

    /// A self-reply continuing this slice.
    fn accepts(&self, item: &FeedViewPost) -> bool {
        if item.is_repost() || item.post.author.did != self.root().post.author.did {
            return false;
        }
        item.reply_parent_uri()
            .into_iter()
            .chain(item.reply_root_uri())
            .any(|uri| self.contains_uri(uri))
    }

    fn quotes_post(&self) -> bool {
        self.items.iter().any(|item| item.post.quoted_record().is_some())
    }

    fn matches_languages(&self, preferred: &[String]) -> bool {
        self.items.iter().any(|item| {
            let langs = post_langs(item);
            langs.is_empty()
                || langs
                    .iter()
                    .any(|lang| preferred.iter().any(|p| primary_subtag(p) == primary_subtag(lang)))
        })
    }
}

fn post_langs(item: &FeedViewPost) -> Vec<String> {
    item.post
        .record
        .get("langs")
        .and_then(|langs| langs.as_array())
        .map(|langs| {
            langs
                .iter()
                .filter_map(|lang| lang.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn primary_subtag(lang: &str) -> String {
    lang.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Groups a raw page into thread slices, applies rules and suppresses slices
/// already emitted earlier in the session.
#[derive(Debug, Clone, Default)]
pub struct FeedTuner {
    rules: Vec<TunerRule>,
    seen_keys: HashSet<String>,
    seen_uris: HashSet<String>,
}

impl FeedTuner {
    pub fn new(rules: Vec<TunerRule>) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    pub fn rules(&self) -> &[TunerRule] {
        &self.rules
    }

    pub fn tune(&mut self, items: &[FeedViewPost]) -> Vec<FeedViewPostsSlice> {
        let slices = self.candidates(items);
        let mut emitted = Vec::with_capacity(slices.len());
        for slice in slices {
            if self.seen_keys.contains(&slice.key) || self.seen_uris.contains(slice.root_uri()) {
                continue;
            }
            self.seen_keys.insert(slice.key.clone());
            self.seen_uris.insert(slice.root_uri().to_string());
            emitted.push(slice);
        }
        emitted
    }

    /// Same output as [`FeedTuner::tune`] would give, without recording
    /// anything.
    pub fn tune_dry_run(&self, items: &[FeedViewPost]) -> Vec<FeedViewPostsSlice> {
        let mut local: HashSet<String> = HashSet::new();
        self.candidates(items)
            .into_iter()
            .filter(|slice| {
                !self.seen_keys.contains(&slice.key)
                    && !self.seen_uris.contains(slice.root_uri())
                    && local.insert(slice.key.clone())
                    && local.insert(slice.root_uri().to_string())
            })
            .collect()
    }

    fn candidates(&self, items: &[FeedViewPost]) -> Vec<FeedViewPostsSlice> {
        self.apply_rules(group(items))
    }

    fn apply_rules(&self, mut slices: Vec<FeedViewPostsSlice>) -> Vec<FeedViewPostsSlice> {
        for rule in &self.rules {
            slices = match rule {
                TunerRule::RemoveReplies => slices
                    .into_iter()
                    .filter(|slice| !slice.root().is_reply() || slice.root().is_repost())
                    .collect(),
                TunerRule::RemoveReposts => slices
                    .into_iter()
                    .filter(|slice| !slice.root().is_repost())
                    .collect(),
                TunerRule::RemoveQuotePosts => slices
                    .into_iter()
                    .filter(|slice| !slice.quotes_post())
                    .collect(),
                TunerRule::PreferredLanguages(preferred) => {
                    if preferred.is_empty()
                        || !slices.iter().any(|slice| slice.matches_languages(preferred))
                    {
                        slices
                    } else {
                        slices
                            .into_iter()
                            .filter(|slice| slice.matches_languages(preferred))
                            .collect()
                    }
                }
            };
        }
        slices
    }
}

fn group(items: &[FeedViewPost]) -> Vec<FeedViewPostsSlice> {
    let mut slices: Vec<FeedViewPostsSlice> = Vec::new();
    for item in items {
        match slices.iter_mut().find(|slice| slice.accepts(item)) {
            Some(slice) => slice.items.push(item.clone()),
            None => slices.push(FeedViewPostsSlice::new(item.clone())),
        }
    }
    slices
}

/// Session tuner. `Noop` turns every item into its own slice.
#[derive(Debug, Clone)]
pub enum Tuner {
    Feed(FeedTuner),
    Noop,
}

impl Tuner {
    pub fn tune(&mut self, items: &[FeedViewPost]) -> Vec<FeedViewPostsSlice> {
        match self {
            Tuner::Feed(tuner) => tuner.tune(items),
            Tuner::Noop => items.iter().cloned().map(FeedViewPostsSlice::new).collect(),
        }
    }

    pub fn tune_dry_run(&self, items: &[FeedViewPost]) -> Vec<FeedViewPostsSlice> {
        match self {
            Tuner::Feed(tuner) => tuner.tune_dry_run(items),
            Tuner::Noop => items.iter().cloned().map(FeedViewPostsSlice::new).collect(),
        }
    }
}
