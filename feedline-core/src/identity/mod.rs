//! Identity resolution.
//!
//! Maps public keys to published profiles, memoizing results for the life
//! of the process and coalescing concurrent lookups of the same key.

pub mod resolver;

pub use resolver::IdentityResolver;
