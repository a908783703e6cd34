pub mod client;
pub mod descriptor;
pub mod feed_info;
pub mod lookup;
pub mod moderation;
pub mod page;
pub mod poller;
pub mod selection;
pub mod session;
pub mod sources;
pub mod traits;
pub mod tuner;
pub mod types;

pub use client::HttpClient;
pub use descriptor::FeedDescriptor;
pub use feed_info::{FeedSourceInfo, PinnedFeeds, PopularFeedsPager};
pub use moderation::LabelModerator;
pub use page::{ContinuationToken, FeedData, FeedPage, FeedSlice, FeedSliceItem, RawPage};
pub use poller::AppState;
pub use selection::{SelectionCache, SelectionInputs};
pub use session::{FeedSession, FetchOutcome, FetchStatus};
pub use sources::{create_source, SourceContext};
pub use traits::FeedSource;
pub use tuner::{Tuner, TunerConfig, TunerRule};
pub use types::*;
