//! # Cryptographic Primitives
//!
//! Thin, typed wrappers around ed25519-dalek and BLAKE3. Nothing clever
//! happens here, and nothing clever should.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, Hash};
pub use keys::{KeyError, Keypair, PublicKey, PublicKeyHash, Signature, SignatureWithPublicKey};
