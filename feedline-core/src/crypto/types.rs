use serde::{Deserialize, Serialize};
use std::fmt;

/// Armor-stripped key material as it is persisted and displayed.
///
/// `public` is base64 SPKI DER and doubles as the identity's stable id;
/// `private` is base64 PKCS#1 DER and never leaves the device.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawKeypair {
    pub public: String,
    pub private: String,
}

impl fmt::Debug for RawKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawKeypair")
            .field("public", &self.public)
            .field("private", &"<redacted>")
            .finish()
    }
}

/// Signed message as posted to `POST messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub author: String,
    pub payload: String,
    pub signature: String,
}

/// Signed profile document as sent to `PUT characters`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEnvelope {
    pub author: String,
    pub schema: String,
    pub payload: String,
    pub signature: String,
}
