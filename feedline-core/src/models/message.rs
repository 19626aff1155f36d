use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{self, PostPayload};

/// Message record as delivered by `GET messages`.
///
/// Unknown fields are ignored; `id` and `cdate` are optional so that
/// servers which omit them still decode.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
   #[serde(default)]
   pub id: Option<String>,
   pub author: String,
   pub payload: String,
   #[serde(default)]
   pub signature: String,
   #[serde(default)]
   pub cdate: Option<String>,
}

impl TimelineEntry {
   /// Post body decoded from the canonical payload, if it is a post
   pub fn body(&self) -> Option<String> {
      serde_json::from_str::<PostPayload>(&self.payload)
         .ok()
         .map(|p| p.body)
   }

   pub fn created_at(&self) -> Option<DateTime<Utc>> {
      self.cdate
         .as_deref()
         .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
         .map(|dt| dt.with_timezone(&Utc))
   }

   /// Whether the signature checks out against the author key.
   /// Unparseable author keys count as unverified.
   pub fn verify(&self) -> bool {
      crypto::verify(&self.author, self.payload.as_bytes(), &self.signature).unwrap_or(false)
   }
}
