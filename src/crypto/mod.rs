//! Cryptographic primitives for TokenVault.
//!
//! This module provides:
//! - AES-256-GCM encryption with detached nonce and tag (`encryption`)
//! - scrypt / Argon2id password-based key derivation (`kdf`)
//! - Zero-on-drop DEK and KEK buffers (`keys`)

pub mod encryption;
pub mod kdf;
pub mod keys;

pub use encryption::{decrypt, encrypt, Sealed, NONCE_LEN, TAG_LEN};
pub use kdf::{
    derive_kek, generate_salt, Argon2Params, KdfAlgorithm, KdfParams, ScryptParams, SALT_LEN,
};
pub use keys::{Dek, Kek, KEY_LEN};
