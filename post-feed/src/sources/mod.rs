pub mod author;
pub mod following;
pub mod generator;
pub mod home;
pub mod likes;
pub mod list;
pub mod merge;
pub mod opencast;

pub use author::AuthorSource;
pub use following::FollowingSource;
pub use generator::GeneratorSource;
pub use home::HomeSource;
pub use likes::LikesSource;
pub use list::ListSource;
pub use merge::{MergeMember, MergePolicy, MergeSource};
pub use opencast::OpencastSource;

use crate::descriptor::FeedDescriptor;
use crate::traits::FeedSource;
use crate::types::{FeedConfig, FeedParams, Result};
use interfaces::client::ProtocolClient;
use interfaces::preferences::Preferences;
use std::sync::Arc;
use tracing::debug;

/// Everything a source needs to talk to the outside world.
#[derive(Clone)]
pub struct SourceContext {
    pub client: Arc<dyn ProtocolClient>,
    pub config: FeedConfig,
    pub preferences: Preferences,
}

impl SourceContext {
    pub fn new(client: Arc<dyn ProtocolClient>, config: FeedConfig, preferences: Preferences) -> Self {
        Self {
            client,
            config,
            preferences,
        }
    }
}

/// Build the source for a descriptor. One call per pagination session.
pub fn create_source(
    descriptor: &FeedDescriptor,
    params: &FeedParams,
    ctx: &SourceContext,
) -> Result<Arc<dyn FeedSource>> {
    let client = ctx.client.clone();

    let source: Arc<dyn FeedSource> = match descriptor {
        FeedDescriptor::Home if params.merge_feed_enabled => {
            Arc::new(MergeSource::for_home(ctx.clone(), params))
        }
        FeedDescriptor::Home => Arc::new(HomeSource::new(
            client,
            &ctx.config.discover_feed_uri,
            ctx.preferences.content_languages.clone(),
        )),
        FeedDescriptor::Following => Arc::new(FollowingSource::new(client)),
        FeedDescriptor::Author { actor, filter } => {
            Arc::new(AuthorSource::new(client, actor.clone(), *filter))
        }
        FeedDescriptor::Likes { actor } => Arc::new(LikesSource::new(client, actor.clone())),
        FeedDescriptor::FeedGen { uri } if descriptor.is_opencast() => {
            Arc::new(OpencastSource::new(uri, &ctx.config)?)
        }
        FeedDescriptor::FeedGen { uri } => Arc::new(GeneratorSource::new(
            client,
            uri.clone(),
            ctx.preferences.content_languages.clone(),
        )),
        FeedDescriptor::List { uri } => Arc::new(ListSource::new(client, uri.clone())),
    };

    debug!("Created source {} for {}", source.source_id(), descriptor);
    Ok(source)
}
