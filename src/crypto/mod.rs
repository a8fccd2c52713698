//! Cryptographic primitives (C5): hashing, RSA/ECDSA sign and verify, and
//! loading of private key material for the crate's own optional
//! `ExternalSigner` convenience implementation.

pub mod keys;
pub mod primitives;

pub use primitives::{hash, sign_prehashed, verify_prehashed, verify_with_declared_algorithm};
