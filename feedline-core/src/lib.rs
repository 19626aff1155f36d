pub mod api;
pub mod app;
pub mod config;
pub mod crypto;
pub mod db;
mod error;
pub mod identity;
pub mod models;
pub mod timeline;

pub use api::{normalize_server_url, FeedApi, HttpFeedClient, MessageScope, ProfileLookup};
pub use app::{App, AppState};
pub use config::ClientConfig;
pub use crypto::{ProfileEnvelope, RawKeypair, SignedEnvelope};
pub use db::{Settings, SettingsStore};
pub use error::{FeedError, FeedResult};
pub use identity::IdentityResolver;
pub use models::{Followee, Profile, TimelineEntry};
pub use timeline::{Timeline, TimelineItem, TimelineMode};
