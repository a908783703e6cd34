use anyhow::{Context, Result};
use clap::Parser;
use interfaces::client::ProtocolClient;
use interfaces::moderation::ModerationOpts;
use interfaces::preferences::Preferences;
use post_feed::sources::MergePolicy;
use post_feed::tuner::rules_for;
use post_feed::{
    FeedConfig, FeedDescriptor, FeedParams, FeedSession, FetchOutcome, HttpClient, LabelModerator,
    SelectionInputs, SourceContext, TunerConfig, DISCOVER_FEED_URI,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Page through a feed and print the tuned slices.
#[derive(Parser, Debug)]
#[command(name = "post-feed", version)]
struct Cli {
    /// Feed descriptor: home, following, author|<actor>|<filter>,
    /// feedgen|<uri>, likes|<actor> or list|<uri>. Defaults to the discover
    /// feed.
    #[arg(long)]
    feed: Option<String>,

    /// Number of pages to fetch.
    #[arg(long, default_value_t = 1)]
    pages: usize,

    #[arg(long, env = "POST_FEED_SERVICE", default_value = "https://public.api.bsky.app")]
    service: String,

    /// Base url of the Opencast backend.
    #[arg(long)]
    opencast: Option<String>,

    /// Extra feed or list uris merged into the home feed.
    #[arg(long = "merge-source")]
    merge_sources: Vec<String>,

    #[arg(long)]
    disable_tuner: bool,

    #[arg(long, default_value_t = MergePolicy::RoundRobin)]
    policy: MergePolicy,

    /// Preferences as JSON (pinned feeds, content languages, home feed
    /// settings).
    #[arg(long)]
    preferences: Option<PathBuf>,
}

fn load_preferences(path: Option<&PathBuf>) -> Result<Preferences> {
    let Some(path) = path else {
        return Ok(Preferences::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading preferences from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let preferences = load_preferences(cli.preferences.as_ref())?;

    let mut config = FeedConfig {
        service_url: cli.service,
        merge_policy: cli.policy,
        ..Default::default()
    };
    if let Some(url) = cli.opencast {
        config.opencast_url = url;
    }

    let descriptor: FeedDescriptor = match cli.feed {
        Some(feed) => feed.parse()?,
        None => FeedDescriptor::FeedGen {
            uri: DISCOVER_FEED_URI.to_string(),
        },
    };
    let params = FeedParams {
        disable_tuner: cli.disable_tuner,
        merge_feed_enabled: !cli.merge_sources.is_empty(),
        merge_feed_sources: cli.merge_sources,
    };

    let client: Arc<dyn ProtocolClient> = Arc::new(HttpClient::new(&config)?);
    let ctx = SourceContext::new(client, config, preferences.clone());
    let session = FeedSession::new(descriptor.clone(), &params, &ctx, Arc::new(LabelModerator))?;

    for page in 1..=cli.pages {
        match session.fetch_next_page().await {
            Ok(FetchOutcome::Fetched { items }) => info!("Page {}: {} items", page, items),
            Ok(FetchOutcome::AlreadyInFlight) => session.wait_until_settled().await,
            Ok(FetchOutcome::Exhausted) => {
                info!("Reached the end of {}", descriptor);
                break;
            }
            Err(e) => {
                error!("Stopping after page {}: {}", page - 1, e);
                break;
            }
        }
    }
    session.wait_until_settled().await;

    let tuner = if params.disable_tuner {
        TunerConfig::disabled()
    } else {
        TunerConfig::new(rules_for(&descriptor, &preferences))
    };
    let inputs = SelectionInputs {
        tuner,
        moderation: ModerationOpts::logged_out(),
        ignore_filter_for: None,
    };
    let data = session.select(&inputs);

    for slice in data.slices() {
        let marker = if slice.is_thread { "thread" } else { "post" };
        for (index, item) in slice.items.iter().enumerate() {
            let indent = if index == 0 { "" } else { "  " };
            println!(
                "{}[{}] @{}: {}",
                indent,
                marker,
                item.post.author.handle,
                item.record.text.replace('\n', " ")
            );
        }
    }

    info!(
        "Selected {} slices ({} posts) from {} pages",
        data.slice_count(),
        data.item_count(),
        data.pages.len()
    );
    Ok(())
}
