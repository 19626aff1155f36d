use serde::{Deserialize, Serialize};

/// Snapshot of an identity's published profile.
///
/// Replaced wholesale whenever it is fetched again.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Profile {
    pub pubkey: String,
    pub username: String,
    pub avatar: String,
    pub description: String,
}

/// Entry of the followee list, persisted under `Follow`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Followee {
    pub pubkey: String,
    pub username: String,
    pub avatar: String,
}

impl From<Profile> for Followee {
    fn from(profile: Profile) -> Self {
        Self {
            pubkey: profile.pubkey,
            username: profile.username,
            avatar: profile.avatar,
        }
    }
}
