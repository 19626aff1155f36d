//! Timeline assembly.
//!
//! The server delivers messages newest first. The visible list is always
//! replaced as a whole and shown oldest first.

use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::api::{FeedApi, MessageScope};
use crate::error::{FeedError, FeedResult};
use crate::identity::IdentityResolver;
use crate::models::{Followee, Profile, TimelineEntry};

/// Which feed a reload covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimelineMode {
    /// Messages from followed identities only
    #[default]
    Home,
    /// Unscoped global feed
    Local,
}

impl FromStr for TimelineMode {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" | "htl" => Ok(TimelineMode::Home),
            "local" | "ltl" => Ok(TimelineMode::Local),
            other => Err(FeedError::Validation(format!(
                "unknown timeline mode: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for TimelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelineMode::Home => write!(f, "home"),
            TimelineMode::Local => write!(f, "local"),
        }
    }
}

/// Fetch scope for `mode`, or `None` when the answer is known to be empty
/// (home timeline with nobody followed).
pub fn scope_for(mode: TimelineMode, followees: &[Followee]) -> Option<MessageScope> {
    match mode {
        TimelineMode::Local => Some(MessageScope::All),
        TimelineMode::Home if followees.is_empty() => None,
        TimelineMode::Home => Some(MessageScope::Authors(
            followees.iter().map(|f| f.pubkey.clone()).collect(),
        )),
    }
}

/// Fetch messages for `scope` in server order
pub async fn fetch(api: &dyn FeedApi, scope: Option<&MessageScope>) -> FeedResult<Vec<TimelineEntry>> {
    match scope {
        Some(scope) => api.fetch_messages(scope).await,
        None => {
            debug!("Home timeline has no followees, skipping fetch");
            Ok(Vec::new())
        }
    }
}

/// The visible message list.
///
/// Reloads are numbered; a response is applied only if no newer reload has
/// landed first, so a slow stale response cannot overwrite fresher data.
#[derive(Debug, Default, Clone)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    issued: u64,
    applied: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for a reload about to start
    pub fn begin_reload(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Replace the list with `server_order` reversed into display order.
    /// Returns `false` if the response was stale and dropped.
    pub fn apply(&mut self, ticket: u64, server_order: Vec<TimelineEntry>) -> bool {
        if ticket <= self.applied {
            return false;
        }
        self.applied = ticket;

        self.entries.clear();
        self.entries.extend(server_order.into_iter().rev());
        true
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear the list and refuse every reload issued so far
    pub fn reset(&mut self) {
        self.entries.clear();
        self.applied = self.issued;
    }

    /// Distinct authors in display order
    pub fn authors(&self) -> Vec<String> {
        distinct_authors(&self.entries)
    }
}

fn distinct_authors(entries: &[TimelineEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|e| seen.insert(e.author.as_str()))
        .map(|e| e.author.clone())
        .collect()
}

/// A message ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineItem {
    pub entry: TimelineEntry,
    pub author: Option<Profile>,
    pub verified: bool,
}

/// Resolve every distinct author concurrently.
///
/// Authors that fail to resolve are left out; the message is still shown.
pub async fn resolve_authors(
    resolver: &IdentityResolver,
    entries: &[TimelineEntry],
) -> HashMap<String, Profile> {
    let authors = distinct_authors(entries);
    let results = join_all(authors.iter().map(|a| resolver.resolve(a))).await;

    authors
        .into_iter()
        .zip(results)
        .filter_map(|(author, result)| match result {
            Ok(profile) => Some((author, profile)),
            Err(e) => {
                warn!(author = %author, error = %e, "Could not resolve timeline author");
                None
            }
        })
        .collect()
}

/// Pair each entry with its author's profile and signature status
pub fn render(entries: &[TimelineEntry], profiles: &HashMap<String, Profile>) -> Vec<TimelineItem> {
    entries
        .iter()
        .map(|entry| TimelineItem {
            entry: entry.clone(),
            author: profiles.get(&entry.author).cloned(),
            verified: entry.verify(),
        })
        .collect()
}
