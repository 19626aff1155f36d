//! Feed server collaborator.
//!
//! The traits are the seam between the client logic and the wire; the
//! `reqwest` implementation lives in [`http`].

mod http;

pub use http::{normalize_server_url, HttpFeedClient};

use async_trait::async_trait;

use crate::crypto::{ProfileEnvelope, SignedEnvelope};
use crate::error::FeedResult;
use crate::models::{Profile, TimelineEntry};

/// Which messages a fetch covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageScope {
    /// Unscoped global feed
    All,
    /// Only messages written by these public keys
    Authors(Vec<String>),
}

/// Resolves a public key to its published profile
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn lookup_profile(&self, pubkey: &str) -> FeedResult<Profile>;
}

/// Message and profile endpoints of a feed server
#[async_trait]
pub trait FeedApi: Send + Sync {
    /// Messages in server order (newest first)
    async fn fetch_messages(&self, scope: &MessageScope) -> FeedResult<Vec<TimelineEntry>>;

    async fn post_message(&self, envelope: &SignedEnvelope) -> FeedResult<()>;

    async fn put_profile(&self, envelope: &ProfileEnvelope) -> FeedResult<()>;
}
