//! Authenticated encryption of file payloads with AES-GCM
//!
//! Each call to [`encrypt`] draws a fresh random IV, so the same plaintext
//! encrypted twice under one key yields different buffers. The serialized form
//! is the IV followed by the ciphertext (which already ends with the GCM tag).

use crate::{
    CryptoError, Result,
    keys::{EncryptionKey, KeySize, IV_SIZE, TAG_SIZE},
};
use aes_gcm::{
    Aes128Gcm, Aes256Gcm, KeyInit,
    aead::Aead as AeadTrait,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

/// An initialization vector for AES-GCM
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iv {
    bytes: [u8; IV_SIZE],
}

impl Iv {
    /// Generate a random IV from the OS entropy source
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; IV_SIZE];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::CryptoUnavailable(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; IV_SIZE]) -> Self {
        Self { bytes }
    }

    /// Get the IV bytes
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.bytes
    }
}

/// IV plus ciphertext produced by one encryption call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedPayload {
    iv: Iv,
    ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Smallest valid serialized payload: IV and tag around an empty message
    pub const MIN_LEN: usize = IV_SIZE + TAG_SIZE;

    /// The IV used for this payload
    pub fn iv(&self) -> &Iv {
        &self.iv
    }

    /// Ciphertext including the trailing authentication tag
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serialized length (IV + ciphertext)
    pub fn len(&self) -> usize {
        IV_SIZE + self.ciphertext.len()
    }

    /// Always false; a payload holds at least an IV and a tag
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Serialize as IV ‖ ciphertext
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(self.iv.as_bytes());
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse an IV-prefixed buffer.
    ///
    /// A buffer too short to hold an IV and a tag cannot be authenticated and
    /// is rejected with [`CryptoError::AuthenticationFailed`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_LEN {
            return Err(CryptoError::AuthenticationFailed);
        }
        let (iv, ciphertext) = data.split_at(IV_SIZE);
        let mut iv_bytes = [0u8; IV_SIZE];
        iv_bytes.copy_from_slice(iv);
        Ok(Self {
            iv: Iv::from_bytes(iv_bytes),
            ciphertext: ciphertext.to_vec(),
        })
    }
}

impl From<EncryptedPayload> for bytes::Bytes {
    fn from(payload: EncryptedPayload) -> Self {
        bytes::Bytes::from(payload.to_bytes())
    }
}

/// Encrypt `plaintext` under `key` with a fresh IV
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> Result<EncryptedPayload> {
    let iv = Iv::generate()?;
    encrypt_with_iv(plaintext, key, iv)
}

fn encrypt_with_iv(plaintext: &[u8], key: &EncryptionKey, iv: Iv) -> Result<EncryptedPayload> {
    let nonce = aes_gcm::Nonce::from_slice(iv.as_bytes());
    let ciphertext = match key.size() {
        KeySize::Aes128 => Aes128Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?
            .encrypt(nonce, plaintext),
        KeySize::Aes256 => Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?
            .encrypt(nonce, plaintext),
    }
    .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedPayload { iv, ciphertext })
}

/// Decrypt and authenticate a payload
pub fn decrypt(payload: &EncryptedPayload, key: &EncryptionKey) -> Result<Vec<u8>> {
    let nonce = aes_gcm::Nonce::from_slice(payload.iv.as_bytes());
    match key.size() {
        KeySize::Aes128 => Aes128Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| CryptoError::AuthenticationFailed)?
            .decrypt(nonce, payload.ciphertext.as_slice()),
        KeySize::Aes256 => Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| CryptoError::AuthenticationFailed)?
            .decrypt(nonce, payload.ciphertext.as_slice()),
    }
    .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Decrypt an IV-prefixed buffer
pub fn decrypt_bytes(data: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
    let payload = EncryptedPayload::from_bytes(data)?;
    decrypt(&payload, key)
}

/// A blob sealed under a freshly generated key
#[derive(Clone, Debug)]
pub struct SealedBlob {
    /// The encrypted payload
    pub payload: EncryptedPayload,
    /// The key, exported to base64
    pub key: String,
}

/// Generate a key, encrypt `data`, and export the key (convenience function)
pub fn seal(data: &[u8]) -> Result<SealedBlob> {
    seal_with_size(data, KeySize::default())
}

/// Like [`seal`] with an explicit key size
pub fn seal_with_size(data: &[u8], size: KeySize) -> Result<SealedBlob> {
    let key = EncryptionKey::generate_with_size(size)?;
    let payload = encrypt(data, &key)?;
    Ok(SealedBlob {
        payload,
        key: key.export(),
    })
}

/// Import `key` and decrypt an IV-prefixed buffer (convenience function)
pub fn open(data: &[u8], key: &str) -> Result<Vec<u8>> {
    let key = EncryptionKey::import(key)?;
    decrypt_bytes(data, &key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_aes_gcm_roundtrip() {
        let key = EncryptionKey::generate().unwrap();
        let plaintext = b"Hello, World!";

        let payload = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&payload, &key).unwrap();

        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_empty_roundtrip() {
        let key = EncryptionKey::generate().unwrap();
        let payload = encrypt(b"", &key).unwrap();
        assert_eq!(payload.len(), EncryptedPayload::MIN_LEN);
        assert!(decrypt_bytes(&payload.to_bytes(), &key).unwrap().is_empty());
    }

    #[test]
    fn test_aes128_roundtrip() {
        let key = EncryptionKey::generate_with_size(KeySize::Aes128).unwrap();
        let payload = encrypt(b"short key", &key).unwrap();
        assert_eq!(decrypt(&payload, &key).unwrap(), b"short key");
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = EncryptionKey::generate().unwrap();
        let a = encrypt(b"same message", &key).unwrap();
        let b = encrypt(b"same message", &key).unwrap();
        assert_ne!(a.iv(), b.iv());
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_serialized_layout() {
        let key = EncryptionKey::generate().unwrap();
        let payload = encrypt(b"abc", &key).unwrap();
        let bytes = payload.to_bytes();
        assert_eq!(bytes.len(), IV_SIZE + 3 + TAG_SIZE);
        assert_eq!(&bytes[..IV_SIZE], payload.iv().as_bytes());
        assert_eq!(EncryptedPayload::from_bytes(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = EncryptionKey::generate().unwrap();
        let other = EncryptionKey::generate().unwrap();
        let payload = encrypt(b"secret", &key).unwrap();
        assert!(matches!(
            decrypt(&payload, &other),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_truncated_payload_fails() {
        let key = EncryptionKey::generate().unwrap();
        let bytes = encrypt(b"secret", &key).unwrap().to_bytes();
        for len in [0, IV_SIZE, EncryptedPayload::MIN_LEN - 1, bytes.len() - 1] {
            assert!(matches!(
                decrypt_bytes(&bytes[..len], &key),
                Err(CryptoError::AuthenticationFailed)
            ));
        }
    }

    #[test]
    fn test_seal_and_open() {
        let sealed = seal(b"file contents").unwrap();
        let opened = open(&sealed.payload.to_bytes(), &sealed.key).unwrap();
        assert_eq!(opened, b"file contents");
    }

    #[test]
    fn test_open_with_bad_key_text() {
        let sealed = seal(b"file contents").unwrap();
        assert!(matches!(
            open(&sealed.payload.to_bytes(), "%%%"),
            Err(CryptoError::InvalidKeyEncoding(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let key = EncryptionKey::generate().unwrap();
            let bytes = encrypt(&data, &key).unwrap().to_bytes();
            prop_assert_eq!(decrypt_bytes(&bytes, &key).unwrap(), data);
        }

        #[test]
        fn prop_bit_flip_detected(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            position in any::<proptest::sample::Index>(),
            bit in 0u8..8,
        ) {
            let key = EncryptionKey::generate().unwrap();
            let mut bytes = encrypt(&data, &key).unwrap().to_bytes();
            let i = position.index(bytes.len());
            bytes[i] ^= 1 << bit;
            prop_assert!(matches!(
                decrypt_bytes(&bytes, &key),
                Err(CryptoError::AuthenticationFailed)
            ));
        }
    }
}
