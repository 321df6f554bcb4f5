//! REST transport for the upload endpoints

use crate::{
    ChunkDescriptor, ClientError, Config, Credentials, Result,
    types::{ChunkAck, FileRecord, InitializeUpload},
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

/// The three calls an upload makes against the backend
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Create an upload session and return the pending file record
    async fn initialize(&self, request: &InitializeUpload) -> Result<FileRecord>;

    /// Send one chunk tagged with its sequence number
    async fn send_chunk(&self, upload_id: &str, chunk: &ChunkDescriptor) -> Result<ChunkAck>;

    /// Ask the backend to assemble the chunks into the final file
    async fn complete(&self, upload_id: &str) -> Result<FileRecord>;
}

/// A downloaded file
#[derive(Clone, Debug)]
pub struct DownloadedFile {
    /// Name from `Content-Disposition`, or `download`
    pub filename: String,
    /// Content type reported by the backend
    pub content_type: Option<String>,
    /// File bytes
    pub data: Bytes,
}

/// [`UploadTransport`] over HTTP
pub struct HttpTransport {
    config: Config,
    credentials: Credentials,
    http: Client,
}

impl HttpTransport {
    /// Create a transport with the given configuration and credentials
    pub fn new(config: Config, credentials: Credentials) -> Result<Self> {
        config.validate()?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            config
                .user_agent
                .parse()
                .map_err(|_| ClientError::Config(format!("invalid user agent '{}'", config.user_agent)))?,
        );

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            config,
            credentials,
            http,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Download a file's content
    #[instrument(skip(self))]
    pub async fn download(&self, file_id: &str) -> Result<DownloadedFile> {
        let url = self.url(&["files", file_id, "download"])?;
        let response = self.send(self.http.get(url)).await?;

        let headers = response.headers();
        let filename = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition)
            .unwrap_or_else(|| "download".to_string());
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let data = response.bytes().await?;
        debug!(bytes = data.len(), %filename, "Downloaded file");

        Ok(DownloadedFile {
            filename,
            content_type,
            data,
        })
    }

    // ==================== Helper Methods ====================

    /// `{endpoint}/a/b/c/` with each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoint)
            .map_err(|e| ClientError::Config(format!("invalid endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Config("endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    async fn send(&self, mut req: RequestBuilder) -> Result<Response> {
        if let Some(token) = self.credentials.access_token() {
            req = req.bearer_auth(token);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.config.timeout)
            } else {
                ClientError::Http(e)
            }
        })?;

        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "Response received");
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::from_api_body(&text, status.as_u16()));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let response = self.send(req).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ClientError::InvalidResponse(format!("{}: {}", e, truncate(&text, 200))))
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    #[instrument(skip(self, request), fields(name = %request.name, size = request.size))]
    async fn initialize(&self, request: &InitializeUpload) -> Result<FileRecord> {
        let url = self.url(&["files", "upload", "initialize"])?;
        self.send_json(self.http.post(url).json(request)).await
    }

    #[instrument(skip(self, chunk), fields(sequence = chunk.sequence_number, bytes = chunk.len()))]
    async fn send_chunk(&self, upload_id: &str, chunk: &ChunkDescriptor) -> Result<ChunkAck> {
        let url = self.url(&["files", "upload", upload_id, "chunk"])?;
        let part = multipart::Part::bytes(chunk.payload.to_vec())
            .file_name("blob")
            .mime_str("application/octet-stream")?;
        let form = multipart::Form::new()
            .part("chunk", part)
            .text("chunk_number", chunk.sequence_number.to_string());

        self.send_json(self.http.post(url).multipart(form)).await
    }

    #[instrument(skip(self))]
    async fn complete(&self, upload_id: &str) -> Result<FileRecord> {
        let url = self.url(&["files", "upload", upload_id, "complete"])?;
        self.send_json(self.http.post(url)).await
    }
}

/// Extract the file name from a `Content-Disposition` header value
fn parse_content_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}
