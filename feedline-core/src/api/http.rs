use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{FeedApi, MessageScope, ProfileLookup};
use crate::config::ClientConfig;
use crate::crypto::{ProfileEnvelope, ProfilePayload, SignedEnvelope, PROFILE_SCHEMA};
use crate::error::{FeedError, FeedResult};
use crate::models::{Profile, TimelineEntry};

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    messages: Vec<TimelineEntry>,
}

#[derive(Debug, Deserialize)]
struct CharactersResponse {
    characters: Vec<CharacterRecord>,
}

#[derive(Debug, Deserialize)]
struct CharacterRecord {
    author: String,
    payload: String,
}

/// Parse a server address and make sure it ends with `/`, so that
/// endpoint names are appended instead of replacing the last segment.
pub fn normalize_server_url(raw: &str) -> FeedResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FeedError::Config("no feed server configured".to_string()));
    }

    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    let url = Url::parse(&with_slash)
        .map_err(|e| FeedError::Config(format!("invalid server address {}: {}", trimmed, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FeedError::Config(format!(
            "unsupported server scheme: {}",
            other
        ))),
    }
}

/// HTTP client for a feed server
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    base: Url,
    http: reqwest::Client,
}

impl HttpFeedClient {
    pub fn new(server: &str, config: &ClientConfig) -> FeedResult<Self> {
        let base = normalize_server_url(server)?;

        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| FeedError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { base, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> FeedResult<Url> {
        self.base
            .join(path)
            .map_err(|e| FeedError::Config(format!("invalid endpoint {}: {}", path, e)))
    }

    /// Decode a JSON body, treating any non-2xx status as a network error
    async fn read_json<T: DeserializeOwned>(response: Response) -> FeedResult<T> {
        let status = response.status();
        let url = response.url().clone();

        if !status.is_success() {
            return Err(FeedError::Network(format!("{} returned {}", url, status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FeedError::Network(format!("malformed response from {}: {}", url, e)))
    }

    /// Accept any 2xx acknowledgement; the body is only logged
    async fn read_ack(response: Response) -> FeedResult<()> {
        let status = response.status();
        let url = response.url().clone();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Network(format!(
                "{} returned {}: {}",
                url,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response.text().await?;
        let preview: String = body.chars().take(100).collect();
        debug!(url = %url, preview = %preview, "Server acknowledged");
        Ok(())
    }

    async fn fetch_profile(&self, pubkey: &str) -> FeedResult<Profile> {
        let url = self.endpoint("characters")?;
        debug!(pubkey = %pubkey, "Fetching profile");

        let response = self
            .http
            .get(url)
            .query(&[("author", pubkey), ("schema", PROFILE_SCHEMA)])
            .send()
            .await?;
        let data: CharactersResponse = Self::read_json(response).await?;

        let record = data
            .characters
            .into_iter()
            .next()
            .ok_or_else(|| FeedError::resolution(pubkey, "profile not found"))?;

        let payload: ProfilePayload = serde_json::from_str(&record.payload)
            .map_err(|e| FeedError::resolution(pubkey, format!("malformed profile: {}", e)))?;

        Ok(Profile {
            pubkey: record.author,
            username: payload.username,
            avatar: payload.avatar,
            description: payload.description,
        })
    }
}

#[async_trait]
impl ProfileLookup for HttpFeedClient {
    async fn lookup_profile(&self, pubkey: &str) -> FeedResult<Profile> {
        self.fetch_profile(pubkey).await.map_err(|e| match e {
            FeedError::Resolution { .. } => e,
            other => {
                warn!(pubkey = %pubkey, error = %other, "Profile lookup failed");
                FeedError::resolution(pubkey, other.to_string())
            }
        })
    }
}

#[async_trait]
impl FeedApi for HttpFeedClient {
    async fn fetch_messages(&self, scope: &MessageScope) -> FeedResult<Vec<TimelineEntry>> {
        let url = self.endpoint("messages")?;

        let request = match scope {
            MessageScope::All => self.http.get(url),
            MessageScope::Authors(authors) => self
                .http
                .get(url)
                .query(&[("users", authors.join(","))]),
        };

        let response = request.send().await?;
        let data: MessagesResponse = Self::read_json(response).await?;
        debug!(count = data.messages.len(), "Fetched messages");

        Ok(data.messages)
    }

    async fn post_message(&self, envelope: &SignedEnvelope) -> FeedResult<()> {
        let url = self.endpoint("messages")?;
        let response = self.http.post(url).json(envelope).send().await?;
        Self::read_ack(response).await
    }

    async fn put_profile(&self, envelope: &ProfileEnvelope) -> FeedResult<()> {
        let url = self.endpoint("characters")?;
        let response = self.http.put(url).json(envelope).send().await?;
        Self::read_ack(response).await
    }
}
