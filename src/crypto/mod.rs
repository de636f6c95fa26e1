//! Cryptographic primitives for the ballot box

pub mod identity;

pub use identity::{DIGEST_HEX_LEN, IdentityDigest, IdentityHasher};
