use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::crypto::RawKeypair;
use crate::error::{FeedError, FeedResult};
use crate::models::Followee;

/// Bumped whenever the layout of the settings table changes
pub const SCHEMA_VERSION: i32 = 1;

pub const KEY_SERVER: &str = "ServerAddress";
pub const KEY_PUBLIC_KEY: &str = "PublicKey";
pub const KEY_PRIVATE_KEY: &str = "PrivateKey";
pub const KEY_USERNAME: &str = "Username";
pub const KEY_AVATAR: &str = "AvatarURL";
pub const KEY_FOLLOW: &str = "Follow";

pub const DEFAULT_USERNAME: &str = "anonymous";

/// Everything the client persists between runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: String,
    pub keypair: Option<RawKeypair>,
    pub username: String,
    pub avatar: String,
    pub followees: Vec<Followee>,
}

/// Durable key-value store of primitive settings.
///
/// Values are stored as JSON text so each key keeps its type across runs.
/// Writes are last-writer-wins except the key pair, whose halves are
/// written in a single transaction.
pub struct SettingsStore {
    conn: Connection,
}

impl SettingsStore {
    pub fn open(path: &Path) -> FeedResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened settings store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> FeedResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> FeedResult<Self> {
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> FeedResult<()> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version > SCHEMA_VERSION {
            return Err(FeedError::Config(format!(
                "settings schema v{} is newer than supported v{}",
                version, SCHEMA_VERSION
            )));
        }

        if version < 1 {
            self.conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                ",
            )?;
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
            debug!(from = version, to = SCHEMA_VERSION, "Migrated settings schema");
        }

        Ok(())
    }

    pub fn schema_version(&self) -> FeedResult<i32> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> FeedResult<Option<T>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(conn: &Connection, key: &str, value: &T) -> FeedResult<()> {
        let json = serde_json::to_string(value)?;
        let now = chrono::Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
             value = ?2, updated_at = ?3",
            (key, json, now),
        )?;

        Ok(())
    }

    pub fn load(&self) -> FeedResult<Settings> {
        Ok(Settings {
            server: self.server()?,
            keypair: self.keypair()?,
            username: self
                .get(KEY_USERNAME)?
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            avatar: self.get(KEY_AVATAR)?.unwrap_or_default(),
            followees: self.followees()?,
        })
    }

    pub fn server(&self) -> FeedResult<String> {
        Ok(self.get(KEY_SERVER)?.unwrap_or_default())
    }

    pub fn set_server(&self, server: &str) -> FeedResult<()> {
        Self::put(&self.conn, KEY_SERVER, &server)
    }

    /// Stored key pair, or `None` unless both halves are present
    pub fn keypair(&self) -> FeedResult<Option<RawKeypair>> {
        let public: String = self.get(KEY_PUBLIC_KEY)?.unwrap_or_default();
        let private: String = self.get(KEY_PRIVATE_KEY)?.unwrap_or_default();

        if public.is_empty() || private.is_empty() {
            return Ok(None);
        }
        Ok(Some(RawKeypair { public, private }))
    }

    /// Replace both key halves atomically
    pub fn save_keypair(&mut self, keypair: &RawKeypair) -> FeedResult<()> {
        let tx = self.conn.transaction()?;
        Self::put(&tx, KEY_PUBLIC_KEY, &keypair.public)?;
        Self::put(&tx, KEY_PRIVATE_KEY, &keypair.private)?;
        tx.commit()?;
        Ok(())
    }

    pub fn set_profile(&self, username: &str, avatar: &str) -> FeedResult<()> {
        Self::put(&self.conn, KEY_USERNAME, &username)?;
        Self::put(&self.conn, KEY_AVATAR, &avatar)
    }

    pub fn followees(&self) -> FeedResult<Vec<Followee>> {
        Ok(self.get(KEY_FOLLOW)?.unwrap_or_default())
    }

    pub fn save_followees(&self, followees: &[Followee]) -> FeedResult<()> {
        Self::put(&self.conn, KEY_FOLLOW, &followees)
    }
}
