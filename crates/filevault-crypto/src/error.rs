//! Error types for the filevault-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The operating system could not supply secure randomness
    #[error("secure random source unavailable: {0}")]
    CryptoUnavailable(String),

    /// Exported key text could not be turned back into a key
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Ciphertext failed authentication
    #[error("authentication failed: ciphertext rejected")]
    AuthenticationFailed,

    /// Encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Algorithm, key length or IV length not supported
    #[error("unsupported cipher suite: {0}")]
    UnsupportedSuite(String),
}
