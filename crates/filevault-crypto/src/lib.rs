//! # Filevault Crypto
//!
//! Client-side encryption for filevault uploads.
//!
//! This crate provides:
//! - **Ephemeral keys**: one fresh AES key per file, exported to base64
//! - **AES-GCM**: authenticated encryption with a random 96-bit IV per call
//! - **Portable payloads**: IV-prefixed ciphertext in a single buffer
//!
//! ## Security Model
//!
//! - Encryption happens before any byte leaves the client
//! - The encrypted payload carries no key material; the caller stores the key
//! - Decryption of a tampered payload is a hard error, never corrupted output
//!
//! ## Example
//!
//! ```rust
//! use filevault_crypto::{decrypt, encrypt, export_key, generate_key, import_key};
//!
//! let key = generate_key()?;
//! let payload = encrypt(b"Hello, World!", &key)?;
//!
//! let portable = export_key(&key);
//! let restored = import_key(&portable)?;
//! assert_eq!(decrypt(&payload, &restored)?, b"Hello, World!");
//! # Ok::<(), filevault_crypto::CryptoError>(())
//! ```

pub mod error;
pub mod keys;
pub mod symmetric;

pub use error::{CryptoError, Result};
pub use keys::{
    export_key, generate_key, import_key, CipherSuite, EncryptionKey, KeySize,
    ALGORITHM_AES_GCM, IV_SIZE, TAG_SIZE,
};
pub use symmetric::{
    decrypt, decrypt_bytes, encrypt, open, seal, seal_with_size, EncryptedPayload, Iv, SealedBlob,
};
