//! Client configuration

use crate::{ClientError, Result};
use filevault_crypto::CipherSuite;
use std::time::Duration;

/// Default chunk size (1 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Default maximum file size (100 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Content types accepted by the backend
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    // Documents
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    // Images
    "image/jpeg",
    "image/png",
    "image/gif",
    // Archives
    "application/zip",
    "application/x-rar-compressed",
    "application/x-7z-compressed",
];

/// Limits checked before an upload touches the network
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    /// Chunk size in bytes
    pub chunk_size: u64,
    /// Maximum total file size in bytes
    pub max_file_size: u64,
    /// Allowed content types
    pub allowed_types: Vec<String>,
    /// Compare acknowledged chunk checksums against the sent payload
    pub verify_checksums: bool,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|s| s.to_string()).collect(),
            verify_checksums: true,
        }
    }
}

impl UploadPolicy {
    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the maximum file size
    pub fn with_max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = max;
        self
    }

    /// Replace the allowed content types
    pub fn with_allowed_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Check whether a content type is on the allow-list
    pub fn allows_type(&self, content_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == content_type)
    }
}

/// Encryption parameters as configured
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptionSettings {
    /// Algorithm name
    pub algorithm: String,
    /// Key length in bits
    pub key_length_bits: u32,
    /// IV length in bytes
    pub iv_length: usize,
}

impl Default for EncryptionSettings {
    fn default() -> Self {
        Self {
            algorithm: filevault_crypto::ALGORITHM_AES_GCM.to_string(),
            key_length_bits: 256,
            iv_length: filevault_crypto::IV_SIZE,
        }
    }
}

impl EncryptionSettings {
    /// Resolve to a supported cipher suite
    pub fn suite(&self) -> Result<CipherSuite> {
        Ok(CipherSuite::from_params(
            &self.algorithm,
            self.key_length_bits,
            self.iv_length,
        )?)
    }
}

/// Client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// API base URL (e.g. `http://localhost:8000/api`)
    pub endpoint: String,
    /// Request timeout for the HTTP client
    pub timeout: Duration,
    /// Upper bound for one chunk transmission
    pub chunk_timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Upload limits
    pub upload: UploadPolicy,
    /// Encryption parameters
    pub encryption: EncryptionSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/api".to_string(),
            timeout: Duration::from_secs(30),
            chunk_timeout: Duration::from_secs(30),
            user_agent: format!("filevault-client/{}", env!("CARGO_PKG_VERSION")),
            upload: UploadPolicy::default(),
            encryption: EncryptionSettings::default(),
        }
    }
}

impl Config {
    /// Create a new config with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set timeout for both whole requests and single chunks
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.chunk_timeout = timeout;
        self
    }

    /// Set the upload policy
    pub fn with_upload_policy(mut self, policy: UploadPolicy) -> Self {
        self.upload = policy;
        self
    }

    /// Set the encryption parameters
    pub fn with_encryption(mut self, settings: EncryptionSettings) -> Self {
        self.encryption = settings;
        self
    }

    /// Check the configuration for values that can never work
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.endpoint)
            .map_err(|e| ClientError::Config(format!("invalid endpoint '{}': {}", self.endpoint, e)))?;
        if self.upload.chunk_size == 0 {
            return Err(ClientError::InvalidChunkSize(0));
        }
        if self.chunk_timeout.is_zero() {
            return Err(ClientError::Config("chunk timeout must be positive".to_string()));
        }
        self.encryption.suite()?;
        Ok(())
    }
}

/// Credentials handed to the transport explicitly
#[derive(Clone, Default)]
pub struct Credentials {
    access_token: Option<String>,
}

impl Credentials {
    /// No credentials
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Bearer token credentials
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
        }
    }

    /// The bearer token, if any
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.access_token {
            Some(_) => write!(f, "Credentials(Bearer [REDACTED])"),
            None => write!(f, "Credentials(anonymous)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.upload.chunk_size, 1_048_576);
        assert_eq!(config.upload.max_file_size, 104_857_600);
        assert_eq!(config.upload.allowed_types.len(), 14);
        assert!(config.upload.allows_type("application/pdf"));
        assert!(!config.upload.allows_type("application/x-msdownload"));
        assert_eq!(config.encryption.algorithm, "AES-GCM");
        assert_eq!(config.encryption.key_length_bits, 256);
        assert_eq!(config.encryption.iv_length, 12);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_endpoint = Config::new("not a url");
        assert!(matches!(bad_endpoint.validate(), Err(ClientError::Config(_))));

        let zero_chunk = Config::default().with_upload_policy(UploadPolicy::default().with_chunk_size(0));
        assert!(matches!(zero_chunk.validate(), Err(ClientError::InvalidChunkSize(0))));

        let bad_suite = Config::default().with_encryption(EncryptionSettings {
            key_length_bits: 512,
            ..Default::default()
        });
        assert!(matches!(bad_suite.validate(), Err(ClientError::Encryption(_))));
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let creds = Credentials::bearer("secret-token");
        assert_eq!(creds.access_token(), Some("secret-token"));
        assert!(!format!("{:?}", creds).contains("secret-token"));
    }
}
