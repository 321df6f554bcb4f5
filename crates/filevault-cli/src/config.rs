//! CLI configuration

use filevault_client::{
    ClientError, Config, Credentials, EncryptionSettings, UploadPolicy, DEFAULT_ALLOWED_TYPES,
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FILE_SIZE,
};
use filevault_crypto::{CipherSuite, ALGORITHM_AES_GCM, IV_SIZE};
use std::time::Duration;

/// Settings collected from flags and `FILEVAULT_*` environment variables
#[derive(Clone, Debug)]
pub struct ClientSettings {
    /// API base URL
    pub api_url: String,
    /// Bearer token for the backend
    pub access_token: Option<String>,
    /// Chunk size in bytes
    pub chunk_size: u64,
    /// Maximum file size in bytes
    pub max_file_size: u64,
    /// Allowed content types; empty means the built-in list
    pub allowed_types: Vec<String>,
    /// Encryption algorithm name
    pub encryption_algorithm: String,
    /// Key length in bits
    pub key_length: u32,
    /// IV length in bytes
    pub iv_length: usize,
    /// Request and chunk timeout (seconds)
    pub timeout_secs: u64,
    /// Verify chunk checksums returned by the backend
    pub verify_checksums: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".to_string(),
            access_token: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_types: Vec::new(),
            encryption_algorithm: ALGORITHM_AES_GCM.to_string(),
            key_length: 256,
            iv_length: IV_SIZE,
            timeout_secs: 30,
            verify_checksums: true,
        }
    }
}

impl ClientSettings {
    /// Upload limits
    pub fn policy(&self) -> UploadPolicy {
        let policy = UploadPolicy {
            verify_checksums: self.verify_checksums,
            ..Default::default()
        }
        .with_chunk_size(self.chunk_size)
        .with_max_file_size(self.max_file_size);

        let types: Vec<&str> = self
            .allowed_types
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if types.is_empty() {
            policy.with_allowed_types(DEFAULT_ALLOWED_TYPES.iter().copied())
        } else {
            policy.with_allowed_types(types)
        }
    }

    /// Encryption parameters
    pub fn encryption(&self) -> EncryptionSettings {
        EncryptionSettings {
            algorithm: self.encryption_algorithm.clone(),
            key_length_bits: self.key_length,
            iv_length: self.iv_length,
        }
    }

    /// Resolved cipher suite
    pub fn suite(&self) -> Result<CipherSuite, ClientError> {
        self.encryption().suite()
    }

    /// Validated client configuration
    pub fn to_config(&self) -> Result<Config, ClientError> {
        let config = Config::new(&self.api_url)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_upload_policy(self.policy())
            .with_encryption(self.encryption());
        config.validate()?;
        Ok(config)
    }

    /// Credentials for the transport
    pub fn credentials(&self) -> Credentials {
        match self.access_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Credentials::bearer(token),
            _ => Credentials::anonymous(),
        }
    }
}
