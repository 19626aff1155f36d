use super::types::RawKeypair;
use crate::error::{FeedError, FeedResult};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::fmt;

pub const DEFAULT_KEY_BITS: usize = 2048;
/// Anything smaller is refused; 512-bit keys are trivially factorable.
pub const MIN_KEY_BITS: usize = 1024;

pub const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";
pub const PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";

const PEM_LINE_WIDTH: usize = 64;

/// Parsed RSA identity key pair
#[derive(Clone)]
pub struct Keypair {
   pub public_key: RsaPublicKey,
   pub private_key: RsaPrivateKey,
}

impl fmt::Debug for Keypair {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Keypair")
         .field("public_key", &self.public_key)
         .field("private_key", &"<redacted>")
         .finish()
   }
}

/// Generate a new RSA key pair on the blocking pool.
///
/// Generation takes from milliseconds to seconds depending on `bits`, so it
/// never runs on a runtime worker thread.
pub async fn generate(bits: usize) -> FeedResult<Keypair> {
   if bits < MIN_KEY_BITS {
      return Err(FeedError::KeyGeneration(format!(
         "{} bits is below the minimum of {}",
         bits, MIN_KEY_BITS
      )));
   }

   tokio::task::spawn_blocking(move || generate_blocking(bits))
      .await
      .map_err(|e| FeedError::KeyGeneration(format!("generation task failed: {}", e)))?
}

fn generate_blocking(bits: usize) -> FeedResult<Keypair> {
   let mut rng = rand::thread_rng();
   let private_key = RsaPrivateKey::new(&mut rng, bits)
      .map_err(|e| FeedError::KeyGeneration(e.to_string()))?;
   let public_key = RsaPublicKey::from(&private_key);

   Ok(Keypair {
      public_key,
      private_key,
   })
}

/// Export both halves as bare base64 (PEM armor and newlines removed)
pub fn export_raw(keypair: &Keypair) -> FeedResult<RawKeypair> {
   let public_pem = keypair
      .public_key
      .to_public_key_pem(LineEnding::LF)
      .map_err(|e| FeedError::KeyFormat(format!("cannot encode public key: {}", e)))?;
   let private_pem = keypair
      .private_key
      .to_pkcs1_pem(LineEnding::LF)
      .map_err(|e| FeedError::KeyFormat(format!("cannot encode private key: {}", e)))?;

   Ok(RawKeypair {
      public: unarmor(&public_pem),
      private: unarmor(&private_pem),
   })
}

/// Rebuild a key pair from its raw form and check both halves belong together
pub fn import_raw(raw: &RawKeypair) -> FeedResult<Keypair> {
   let private_key = import_private(&raw.private)?;
   let public_key = import_public(&raw.public)?;

   if RsaPublicKey::from(&private_key) != public_key {
      return Err(FeedError::KeyFormat(
         "public key does not match private key".to_string(),
      ));
   }

   Ok(Keypair {
      public_key,
      private_key,
   })
}

pub fn import_private(raw: &str) -> FeedResult<RsaPrivateKey> {
   RsaPrivateKey::from_pkcs1_pem(&armor(PRIVATE_KEY_LABEL, raw))
      .map_err(|e| FeedError::KeyFormat(format!("invalid private key: {}", e)))
}

pub fn import_public(raw: &str) -> FeedResult<RsaPublicKey> {
   RsaPublicKey::from_public_key_pem(&armor(PUBLIC_KEY_LABEL, raw))
      .map_err(|e| FeedError::KeyFormat(format!("invalid public key: {}", e)))
}

/// Wrap raw base64 in PEM armor with 64-column lines.
///
/// Inverse of [`unarmor`]: `unarmor(&armor(label, raw)) == raw` for any raw
/// string without whitespace.
pub fn armor(label: &str, raw: &str) -> String {
   let body: Vec<char> = raw.chars().filter(|c| !c.is_whitespace()).collect();

   let mut pem = format!("-----BEGIN {}-----\n", label);
   for line in body.chunks(PEM_LINE_WIDTH) {
      pem.extend(line);
      pem.push('\n');
   }
   pem.push_str(&format!("-----END {}-----\n", label));
   pem
}

/// Strip PEM header, footer and all whitespace, leaving the base64 body.
///
/// Input that carries no armor is returned with whitespace removed, so
/// already-raw keys pass through unchanged.
pub fn unarmor(pem: &str) -> String {
   let mut body = pem;

   if let Some(start) = body.find("-----BEGIN ") {
      let after = &body[start + "-----BEGIN ".len()..];
      if let Some(end) = after.find("-----") {
         body = &after[end + "-----".len()..];
      }
   }
   if let Some(end) = body.find("-----END ") {
      body = &body[..end];
   }

   body.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Short, stable identifier for a raw public key (first 8 bytes of its SHA-256)
pub fn fingerprint(public_raw: &str) -> String {
   let digest = Sha256::digest(public_raw.as_bytes());
   hex::encode(&digest[..8])
}
