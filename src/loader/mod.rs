//! Turning a scene's opaque image reference into decoded pixels.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credentials::CredentialPool;
use crate::error::{ReelError, ReelResult};

/// Where a scene image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    DataUri { media_type: String, bytes: Vec<u8> },
    Url(String),
}

impl ImageSource {
    /// Classify a reference string. Anything that is not a data URI or an
    /// http(s) URL is treated as a filesystem path.
    pub fn parse(reference: &str) -> ReelResult<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ReelError::precondition("Empty image reference"));
        }

        if let Some(rest) = reference.strip_prefix("data:") {
            return Self::parse_data_uri(rest);
        }

        let lower = reference.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(ImageSource::Url(reference.to_string()));
        }

        let path = reference.strip_prefix("file://").unwrap_or(reference);
        Ok(ImageSource::Path(PathBuf::from(path)))
    }

    fn parse_data_uri(rest: &str) -> ReelResult<Self> {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ReelError::precondition("Malformed data URI: missing ','"))?;

        let mut params = header.split(';');
        let media_type = params.next().filter(|m| !m.is_empty()).unwrap_or("text/plain").to_string();
        let is_base64 = params.any(|p| p.eq_ignore_ascii_case("base64"));

        let bytes = if is_base64 {
            // Tolerate whitespace from wrapped payloads
            let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            general_purpose::STANDARD
                .decode(compact)
                .map_err(|e| ReelError::precondition(format!("Invalid base64 in data URI: {}", e)))?
        } else {
            payload.as_bytes().to_vec()
        };

        Ok(ImageSource::DataUri { media_type, bytes })
    }

    /// Resolve a relative path against `base`; other sources are unchanged.
    pub fn resolved_against(self, base: &Path) -> Self {
        match self {
            ImageSource::Path(path) if path.is_relative() => ImageSource::Path(base.join(path)),
            other => other,
        }
    }
}

impl fmt::Display for ImageSource {
    /// Short form for logs; data URIs are never printed in full.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(path) => write!(f, "{}", path.display()),
            ImageSource::DataUri { media_type, bytes } => {
                write!(f, "data:{} ({} bytes)", media_type, bytes.len())
            }
            ImageSource::Url(url) => f.write_str(url),
        }
    }
}

/// Fetches and decodes scene images.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, source: &ImageSource) -> ReelResult<DynamicImage>;
}

/// Loads paths from disk, data URIs in place, and URLs over HTTP.
pub struct DefaultLoader {
    client: reqwest::Client,
    base_dir: Option<PathBuf>,
    credentials: Option<CredentialPool>,
}

impl DefaultLoader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_dir: None,
            credentials: None,
        }
    }

    /// HTTP requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> ReelResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_dir: None,
            credentials: None,
        })
    }

    /// Relative paths resolve against `dir` instead of the working directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Each HTTP request carries the next key from `pool` as a bearer token.
    pub fn with_credentials(mut self, pool: CredentialPool) -> Self {
        self.credentials = Some(pool);
        self
    }

    async fn fetch(&self, url: &str) -> ReelResult<Vec<u8>> {
        let mut request = self.client.get(url);
        if let Some(pool) = &self.credentials {
            request = request.bearer_auth(pool.next());
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

impl Default for DefaultLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageLoader for DefaultLoader {
    async fn load(&self, source: &ImageSource) -> ReelResult<DynamicImage> {
        let bytes = match source {
            ImageSource::Path(path) => {
                let path = match &self.base_dir {
                    Some(base) if path.is_relative() => base.join(path),
                    _ => path.clone(),
                };
                tokio::fs::read(&path).await?
            }
            ImageSource::DataUri { bytes, .. } => bytes.clone(),
            ImageSource::Url(url) => self.fetch(url).await?,
        };

        tracing::trace!(source = %source, bytes = bytes.len(), "decoding scene image");

        // Decoding is CPU-bound; keep it off the async worker
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| ReelError::Io(std::io::Error::other(e)))??;
        Ok(image)
    }
}
