pub mod codec;
pub mod keys;
mod types;

pub use codec::{
    canonicalize, seal_post, seal_profile, sign, verify, PostPayload, ProfilePayload,
    PROFILE_SCHEMA,
};
pub use keys::{armor, export_raw, fingerprint, generate, import_raw, unarmor, Keypair};
pub use types::{ProfileEnvelope, RawKeypair, SignedEnvelope};
