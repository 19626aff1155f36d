/// Configuration for the Feedline client
use crate::crypto::keys::{DEFAULT_KEY_BITS, MIN_KEY_BITS};
use crate::error::{FeedError, FeedResult};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_SERVER_URL: &str = "FEEDLINE_SERVER_URL";
pub const ENV_DATA_DIR: &str = "FEEDLINE_DATA_DIR";
pub const ENV_KEY_BITS: &str = "FEEDLINE_KEY_BITS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "FEEDLINE_HTTP_TIMEOUT_SECS";
pub const ENV_USER_AGENT: &str = "FEEDLINE_USER_AGENT";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const SETTINGS_FILE: &str = "settings.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Feed server override; when `None` the stored `ServerAddress` is used
    pub server_url: Option<String>,
    pub data_dir: PathBuf,
    /// RSA modulus size for newly generated keys
    pub key_bits: usize,
    /// Upper bound on every HTTP request
    pub http_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            data_dir: default_data_dir(),
            key_bits: DEFAULT_KEY_BITS,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: format!("feedline/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the environment, reading `.env` first if present
    pub fn from_env() -> FeedResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> FeedResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_SERVER_URL).filter(|s| !s.trim().is_empty()) {
            config.server_url = Some(url.trim().to_string());
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|s| !s.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(bits) = lookup(ENV_KEY_BITS) {
            config.key_bits = bits
                .trim()
                .parse()
                .map_err(|_| FeedError::Config(format!("{} must be an integer", ENV_KEY_BITS)))?;
        }
        if let Some(secs) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                FeedError::Config(format!("{} must be an integer", ENV_HTTP_TIMEOUT_SECS))
            })?;
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(agent) = lookup(ENV_USER_AGENT).filter(|s| !s.is_empty()) {
            config.user_agent = agent;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FeedResult<()> {
        if self.key_bits < MIN_KEY_BITS {
            return Err(FeedError::Config(format!(
                "key size {} is below the minimum of {} bits",
                self.key_bits, MIN_KEY_BITS
            )));
        }
        if self.http_timeout.is_zero() {
            return Err(FeedError::Config("HTTP timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("feedline")
}
