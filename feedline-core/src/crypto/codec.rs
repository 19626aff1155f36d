//! Canonical payload encoding and RSA signatures.
//!
//! A payload is serialized to JSON with a fixed field order (the declaration
//! order of the payload struct), hashed with SHA-256 and signed with
//! RSASSA-PKCS1-v1_5. The signature covers the exact bytes of the JSON
//! string that travels in the envelope's `payload` field.

use super::keys;
use super::types::{ProfileEnvelope, RawKeypair, SignedEnvelope};
use crate::error::{FeedError, FeedResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Schema URI identifying profile documents on the server
pub const PROFILE_SCHEMA: &str =
    "https://raw.githubusercontent.com/totegamma/concurrent-schemas/master/characters/profile/v1.json";

/// Body of a timeline post. Serializes as `{"body":...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPayload {
    pub body: String,
}

/// Profile document. Field order is part of the signed format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePayload {
    pub username: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub description: String,
}

/// Serialize a payload into its canonical string form
pub fn canonicalize<T: Serialize>(payload: &T) -> FeedResult<String> {
    Ok(serde_json::to_string(payload)?)
}

/// Sign `payload` with a raw (armor-stripped) PKCS#1 private key.
/// Returns the base64 signature.
pub fn sign(private_raw: &str, payload: &[u8]) -> FeedResult<String> {
    let private_key = keys::import_private(private_raw)?;
    let signing_key = SigningKey::<Sha256>::new(private_key);

    let signature = signing_key
        .try_sign(payload)
        .map_err(|e| FeedError::KeyFormat(format!("signing failed: {}", e)))?;

    Ok(BASE64.encode(signature.to_bytes()))
}

/// Check a base64 signature over `payload` against a raw public key.
///
/// A malformed public key is an error; a malformed or non-matching
/// signature is simply `false`.
pub fn verify(public_raw: &str, payload: &[u8], signature_b64: &str) -> FeedResult<bool> {
    let public_key = keys::import_public(public_raw)?;

    let Ok(bytes) = BASE64.decode(signature_b64.trim()) else {
        return Ok(false);
    };
    let Ok(signature) = Signature::try_from(bytes.as_slice()) else {
        return Ok(false);
    };

    let verifying_key = VerifyingKey::<Sha256>::new(public_key);
    Ok(verifying_key.verify(payload, &signature).is_ok())
}

/// Build a signed post envelope for `body`
pub fn seal_post(keypair: &RawKeypair, body: &str) -> FeedResult<SignedEnvelope> {
    let payload = canonicalize(&PostPayload {
        body: body.to_string(),
    })?;
    let signature = sign(&keypair.private, payload.as_bytes())?;

    Ok(SignedEnvelope {
        author: keypair.public.clone(),
        payload,
        signature,
    })
}

/// Build a signed profile envelope tagged with [`PROFILE_SCHEMA`]
pub fn seal_profile(keypair: &RawKeypair, profile: &ProfilePayload) -> FeedResult<ProfileEnvelope> {
    let payload = canonicalize(profile)?;
    let signature = sign(&keypair.private, payload.as_bytes())?;

    Ok(ProfileEnvelope {
        author: keypair.public.clone(),
        schema: PROFILE_SCHEMA.to_string(),
        payload,
        signature,
    })
}

impl SignedEnvelope {
    /// Whether `signature` is valid for `payload` under `author`
    pub fn verify(&self) -> FeedResult<bool> {
        verify(&self.author, self.payload.as_bytes(), &self.signature)
    }
}

impl ProfileEnvelope {
    pub fn verify(&self) -> FeedResult<bool> {
        verify(&self.author, self.payload.as_bytes(), &self.signature)
    }
}
