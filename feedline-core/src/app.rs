//! Application controller.
//!
//! `App` owns all client state and is the only thing that mutates it. Every
//! user action is a method here; each either succeeds or returns the error
//! that stopped it, with nothing retried behind the caller's back.

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::api::{normalize_server_url, FeedApi, HttpFeedClient, ProfileLookup};
use crate::config::ClientConfig;
use crate::crypto::{self, keys, ProfilePayload, RawKeypair, SignedEnvelope};
use crate::db::{Settings, SettingsStore};
use crate::error::{FeedError, FeedResult};
use crate::identity::IdentityResolver;
use crate::models::input::{FollowTarget, PostDraft, ProfileUpdate, ValidateExt};
use crate::models::{Followee, Profile, TimelineEntry};
use crate::timeline::{self, Timeline, TimelineItem, TimelineMode};

/// In-memory view of the client
#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Settings,
    pub timeline: Timeline,
    pub mode: TimelineMode,
}

/// Feed server connection plus the profile cache that belongs to it
#[derive(Clone)]
struct Remote {
    api: Arc<dyn FeedApi>,
    resolver: Arc<IdentityResolver>,
}

impl Remote {
    fn new<A>(api: Arc<A>) -> Self
    where
        A: FeedApi + ProfileLookup + 'static,
    {
        let lookup: Arc<dyn ProfileLookup> = api.clone();
        Self {
            api,
            resolver: Arc::new(IdentityResolver::new(lookup)),
        }
    }
}

pub struct App {
    config: ClientConfig,
    store: Mutex<SettingsStore>,
    state: Mutex<AppState>,
    remote: RwLock<Option<Remote>>,
    /// Held while a key pair is generated or replaced
    keygen: Mutex<()>,
}

impl App {
    /// Open the settings store under the configured data directory and
    /// connect to the configured (or previously stored) feed server.
    pub fn open(config: ClientConfig) -> FeedResult<Self> {
        config.validate()?;
        let store = SettingsStore::open(&config.settings_path())?;

        let settings = store.load()?;
        let server = config
            .server_url
            .clone()
            .unwrap_or_else(|| settings.server.clone());

        let remote = if server.trim().is_empty() {
            debug!("No feed server configured yet");
            None
        } else {
            Some(Remote::new(Arc::new(HttpFeedClient::new(&server, &config)?)))
        };

        Ok(Self::assemble(config, store, settings, remote))
    }

    /// Build an app around an existing store and feed implementation
    pub fn with_api<A>(config: ClientConfig, store: SettingsStore, api: Arc<A>) -> FeedResult<Self>
    where
        A: FeedApi + ProfileLookup + 'static,
    {
        let settings = store.load()?;
        Ok(Self::assemble(config, store, settings, Some(Remote::new(api))))
    }

    fn assemble(
        config: ClientConfig,
        store: SettingsStore,
        settings: Settings,
        remote: Option<Remote>,
    ) -> Self {
        Self {
            config,
            store: Mutex::new(store),
            state: Mutex::new(AppState {
                settings,
                timeline: Timeline::new(),
                mode: TimelineMode::default(),
            }),
            remote: RwLock::new(remote),
            keygen: Mutex::new(()),
        }
    }

    async fn remote(&self) -> FeedResult<Remote> {
        self.remote
            .read()
            .await
            .clone()
            .ok_or_else(|| FeedError::Config("no feed server configured".to_string()))
    }

    async fn require_keypair(&self) -> FeedResult<RawKeypair> {
        self.state
            .lock()
            .await
            .settings
            .keypair
            .clone()
            .ok_or(FeedError::NoKeypair)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Snapshot of the current state
    pub async fn state(&self) -> AppState {
        self.state.lock().await.clone()
    }

    pub async fn settings(&self) -> Settings {
        self.state.lock().await.settings.clone()
    }

    pub async fn followees(&self) -> Vec<Followee> {
        self.state.lock().await.settings.followees.clone()
    }

    // ============= Keys =============

    /// Return the stored key pair, generating one on first use
    pub async fn ensure_keypair(&self) -> FeedResult<RawKeypair> {
        let _keygen = self.keygen.lock().await;
        if let Some(existing) = self.state.lock().await.settings.keypair.clone() {
            return Ok(existing);
        }
        self.generate_locked().await
    }

    /// Generate and persist a fresh key pair, replacing any existing one
    pub async fn generate_keys(&self) -> FeedResult<RawKeypair> {
        let _keygen = self.keygen.lock().await;
        self.generate_locked().await
    }

    async fn generate_locked(&self) -> FeedResult<RawKeypair> {
        let keypair = keys::generate(self.config.key_bits).await?;
        let raw = keys::export_raw(&keypair)?;

        self.install_keypair(&raw).await?;
        info!(
            fingerprint = %keys::fingerprint(&raw.public),
            bits = self.config.key_bits,
            "Generated identity keypair"
        );
        Ok(raw)
    }

    /// Replace the key pair with user-supplied material.
    ///
    /// Both halves may be given armored or raw; they must belong together.
    pub async fn import_keys(&self, public: &str, private: &str) -> FeedResult<RawKeypair> {
        let raw = RawKeypair {
            public: keys::unarmor(public),
            private: keys::unarmor(private),
        };
        keys::import_raw(&raw)?;

        let _keygen = self.keygen.lock().await;
        self.install_keypair(&raw).await?;
        info!(fingerprint = %keys::fingerprint(&raw.public), "Imported identity keypair");
        Ok(raw)
    }

    async fn install_keypair(&self, raw: &RawKeypair) -> FeedResult<()> {
        let mut state = self.state.lock().await;
        self.store.lock().await.save_keypair(raw)?;
        state.settings.keypair = Some(raw.clone());
        Ok(())
    }

    // ============= Settings =============

    /// Point the client at a different feed server.
    ///
    /// The profile cache and the visible timeline belong to the old server
    /// and are dropped.
    pub async fn set_server(&self, server: &str) -> FeedResult<()> {
        let url = normalize_server_url(server)?;
        let client = HttpFeedClient::new(url.as_str(), &self.config)?;

        let mut state = self.state.lock().await;
        self.store.lock().await.set_server(url.as_str())?;
        state.settings.server = url.to_string();
        // Reloads still running against the old server must not land
        state.timeline.reset();

        *self.remote.write().await = Some(Remote::new(Arc::new(client)));
        info!(server = %url, "Feed server changed");
        Ok(())
    }

    // ============= Posting =============

    /// Sign `body` and post it
    pub async fn post(&self, body: &str) -> FeedResult<SignedEnvelope> {
        PostDraft {
            body: body.to_string(),
        }
        .validate_input()?;

        let keypair = self.require_keypair().await?;
        let remote = self.remote().await?;

        let envelope = crypto::seal_post(&keypair, body)?;
        remote.api.post_message(&envelope).await?;

        info!(author = %keys::fingerprint(&envelope.author), "Posted message");
        Ok(envelope)
    }

    /// Publish a signed profile document, then save the fields locally
    pub async fn update_profile(
        &self,
        username: &str,
        avatar: &str,
        description: &str,
    ) -> FeedResult<()> {
        let update = ProfileUpdate {
            username: username.to_string(),
            avatar: avatar.to_string(),
            description: description.to_string(),
        };
        update.validate_input()?;

        let keypair = self.require_keypair().await?;
        let remote = self.remote().await?;

        let envelope = crypto::seal_profile(
            &keypair,
            &ProfilePayload {
                username: update.username.clone(),
                avatar: update.avatar.clone(),
                description: update.description,
            },
        )?;
        remote.api.put_profile(&envelope).await?;
        remote.resolver.invalidate(&keypair.public);

        let mut state = self.state.lock().await;
        self.store
            .lock()
            .await
            .set_profile(&update.username, &update.avatar)?;
        state.settings.username = update.username;
        state.settings.avatar = update.avatar;

        info!(author = %keys::fingerprint(&keypair.public), "Published profile");
        Ok(())
    }

    // ============= Following =============

    /// Follow `pubkey`. Returns `false` if it was already followed.
    pub async fn follow(&self, pubkey: &str) -> FeedResult<bool> {
        let target = FollowTarget {
            pubkey: pubkey.trim().to_string(),
        };
        target.validate_input()?;

        if self.is_following(&target.pubkey).await {
            return Ok(false);
        }

        let remote = self.remote().await?;
        let profile = remote.resolver.resolve(&target.pubkey).await?;

        let mut state = self.state.lock().await;
        // Another follow of the same key may have finished while we resolved
        if state
            .settings
            .followees
            .iter()
            .any(|f| f.pubkey == target.pubkey)
        {
            return Ok(false);
        }

        let mut followees = state.settings.followees.clone();
        followees.push(Followee {
            pubkey: target.pubkey.clone(),
            ..Followee::from(profile)
        });
        self.store.lock().await.save_followees(&followees)?;
        state.settings.followees = followees;

        info!(pubkey = %keys::fingerprint(&target.pubkey), "Followed identity");
        Ok(true)
    }

    /// Stop following `pubkey`. Returns `false` if it was not followed.
    pub async fn unfollow(&self, pubkey: &str) -> FeedResult<bool> {
        let pubkey = pubkey.trim();
        let mut state = self.state.lock().await;

        let mut followees = state.settings.followees.clone();
        let before = followees.len();
        followees.retain(|f| f.pubkey != pubkey);
        if followees.len() == before {
            return Ok(false);
        }

        self.store.lock().await.save_followees(&followees)?;
        state.settings.followees = followees;

        info!(pubkey = %keys::fingerprint(pubkey), "Unfollowed identity");
        Ok(true)
    }

    pub async fn is_following(&self, pubkey: &str) -> bool {
        self.state
            .lock()
            .await
            .settings
            .followees
            .iter()
            .any(|f| f.pubkey == pubkey)
    }

    // ============= Timeline =============

    /// Reload the timeline for `mode` and return it in display order.
    ///
    /// If a newer reload lands first, this one's response is discarded and
    /// the newer list is returned.
    pub async fn reload(&self, mode: TimelineMode) -> FeedResult<Vec<TimelineEntry>> {
        let (ticket, scope) = {
            let mut state = self.state.lock().await;
            state.mode = mode;
            let scope = timeline::scope_for(mode, &state.settings.followees);
            (state.timeline.begin_reload(), scope)
        };

        let messages = match scope {
            Some(scope) => {
                let remote = self.remote().await?;
                timeline::fetch(remote.api.as_ref(), Some(&scope)).await?
            }
            None => Vec::new(),
        };

        let mut state = self.state.lock().await;
        if !state.timeline.apply(ticket, messages) {
            debug!(ticket, "Dropped stale timeline response");
        }
        debug!(mode = %mode, count = state.timeline.len(), "Timeline reloaded");
        Ok(state.timeline.entries().to_vec())
    }

    /// Current timeline with authors resolved and signatures checked
    pub async fn timeline(&self) -> FeedResult<Vec<TimelineItem>> {
        let entries = self.state.lock().await.timeline.entries().to_vec();
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let remote = self.remote().await?;
        let profiles = timeline::resolve_authors(&remote.resolver, &entries).await;
        Ok(timeline::render(&entries, &profiles))
    }

    /// Resolve a single identity through the shared profile cache
    pub async fn resolve(&self, pubkey: &str) -> FeedResult<Profile> {
        self.remote().await?.resolver.resolve(pubkey).await
    }
}
