//! Ephemeral symmetric keys for file content encryption
//!
//! Every file gets a fresh key. The key is exported to base64 right after
//! generation so the caller can persist or transmit it separately from the
//! encrypted payload, which never carries key material itself.

use crate::{CryptoError, Result};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an IV in bytes (96 bits, the GCM recommendation)
pub const IV_SIZE: usize = 12;

/// Size of the GCM authentication tag appended to every ciphertext
pub const TAG_SIZE: usize = 16;

/// Name of the only supported algorithm family
pub const ALGORITHM_AES_GCM: &str = "AES-GCM";

/// AES key sizes accepted by the encryption module
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeySize {
    /// 128-bit key (AES-128-GCM)
    Aes128,
    /// 256-bit key (AES-256-GCM)
    #[default]
    Aes256,
}

impl KeySize {
    /// Parse a key length given in bits
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            128 => Ok(Self::Aes128),
            256 => Ok(Self::Aes256),
            other => Err(CryptoError::UnsupportedSuite(format!(
                "key length must be 128 or 256 bits, got {}",
                other
            ))),
        }
    }

    /// Key length in bits
    pub fn bits(&self) -> u32 {
        match self {
            Self::Aes128 => 128,
            Self::Aes256 => 256,
        }
    }

    /// Key length in bytes
    pub fn len(&self) -> usize {
        self.bits() as usize / 8
    }

    fn from_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(Self::Aes128),
            32 => Some(Self::Aes256),
            _ => None,
        }
    }
}

/// Algorithm parameters taken from configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherSuite {
    key_size: KeySize,
}

impl CipherSuite {
    /// Build a suite from the configured algorithm name, key length and IV length.
    ///
    /// Only AES-GCM with a 12-byte IV is supported; the key may be 128 or 256 bits.
    pub fn from_params(algorithm: &str, key_bits: u32, iv_len: usize) -> Result<Self> {
        if !algorithm.eq_ignore_ascii_case(ALGORITHM_AES_GCM) {
            return Err(CryptoError::UnsupportedSuite(format!(
                "algorithm '{}' is not supported, expected {}",
                algorithm, ALGORITHM_AES_GCM
            )));
        }
        if iv_len != IV_SIZE {
            return Err(CryptoError::UnsupportedSuite(format!(
                "IV must be {} bytes, got {}",
                IV_SIZE, iv_len
            )));
        }
        Ok(Self {
            key_size: KeySize::from_bits(key_bits)?,
        })
    }

    /// Suite with the given key size
    pub fn with_key_size(key_size: KeySize) -> Self {
        Self { key_size }
    }

    /// Key size used by this suite
    pub fn key_size(&self) -> KeySize {
        self.key_size
    }

    /// Algorithm identifier string
    pub fn algorithm_id(&self) -> &'static str {
        match self.key_size {
            KeySize::Aes128 => "AES-128-GCM",
            KeySize::Aes256 => "AES-256-GCM",
        }
    }

    /// Generate a fresh key for this suite
    pub fn generate_key(&self) -> Result<EncryptionKey> {
        EncryptionKey::generate_with_size(self.key_size)
    }
}

/// A symmetric key for one file
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: Vec<u8>,
}

impl EncryptionKey {
    /// Generate a new random 256-bit key
    pub fn generate() -> Result<Self> {
        Self::generate_with_size(KeySize::Aes256)
    }

    /// Generate a new random key of the given size
    pub fn generate_with_size(size: KeySize) -> Result<Self> {
        let mut bytes = vec![0u8; size.len()];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::CryptoUnavailable(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// Create a key from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if KeySize::from_len(bytes.len()).is_none() {
            return Err(CryptoError::InvalidKeyEncoding(format!(
                "key must be 16 or 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Export the key as standard base64
    pub fn export(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Import a key previously produced by [`EncryptionKey::export`]
    pub fn import(encoded: &str) -> Result<Self> {
        let mut bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of this key
    pub fn size(&self) -> KeySize {
        // from_bytes and generate only admit valid lengths
        KeySize::from_len(self.bytes.len()).unwrap_or_default()
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKey({} bits, [REDACTED])", self.size().bits())
    }
}

/// Generate a fresh 256-bit key
pub fn generate_key() -> Result<EncryptionKey> {
    EncryptionKey::generate()
}

/// Export a key to its portable base64 form
pub fn export_key(key: &EncryptionKey) -> String {
    key.export()
}

/// Import a key from its portable base64 form
pub fn import_key(encoded: &str) -> Result<EncryptionKey> {
    EncryptionKey::import(encoded)
}
