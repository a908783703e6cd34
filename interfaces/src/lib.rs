pub mod client;
pub mod defs;
pub mod moderation;
pub mod preferences;

pub use client::{AuthorFilter, ClientError, FeedOutput, PopularFeedsOutput, ProtocolClient};
pub use moderation::{ModerationDecision, ModerationOpts, Moderator};
pub use preferences::Preferences;
