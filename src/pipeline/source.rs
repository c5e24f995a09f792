//! Source resolution: turn a user-supplied path or URL into page HTML, and
//! image references into bytes.
//!
//! Product pages are fetched with a browser-like `User-Agent`; many shop
//! front-ends serve an empty shell or a captcha to obvious bots. Local HTML
//! files are accepted too (saved pages, fixtures), in which case relative
//! image references resolve against the file's directory.

use crate::error::ListingError;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Where relative links on a page resolve from.
#[derive(Debug, Clone, PartialEq)]
pub enum PageBase {
    Url(Url),
    Dir(PathBuf),
}

/// A fetched or loaded product page.
#[derive(Debug, Clone)]
pub struct SourcePage {
    /// The input as given (URL or path).
    pub origin: String,
    pub base: PageBase,
    pub html: String,
}

impl SourcePage {
    /// Resolve a link found on the page to an absolute URL or file path.
    ///
    /// `//host/x` becomes `https://host/x`; `data:` URIs and fragments are
    /// dropped.
    pub fn resolve_link(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') || raw.starts_with("data:") {
            return None;
        }
        if let Some(rest) = raw.strip_prefix("//") {
            return Some(format!("https://{rest}"));
        }
        if is_url(raw) {
            return Some(raw.to_string());
        }
        match &self.base {
            PageBase::Url(base) => base.join(raw).ok().map(|u| u.to_string()),
            PageBase::Dir(dir) => {
                let path = raw.strip_prefix("file://").unwrap_or(raw);
                let path = Path::new(path);
                let full = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    dir.join(path)
                };
                Some(full.to_string_lossy().into_owned())
            }
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Build the HTTP client used for pages and images.
pub fn http_client(user_agent: &str, timeout_secs: u64) -> Result<reqwest::Client, ListingError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ListingError::Internal(format!("HTTP client: {e}")))
}

/// Resolve the input to page HTML.
pub async fn resolve_source(
    input: &str,
    client: &reqwest::Client,
    timeout_secs: u64,
) -> Result<SourcePage, ListingError> {
    if is_url(input) {
        let url = Url::parse(input).map_err(|_| ListingError::InvalidInput {
            input: input.to_string(),
        })?;
        info!("Fetching product page: {}", url);
        let bytes = fetch_url(client, input, timeout_secs).await?;
        Ok(SourcePage {
            origin: input.to_string(),
            base: PageBase::Url(url),
            html: String::from_utf8_lossy(&bytes).into_owned(),
        })
    } else {
        let path = PathBuf::from(input);
        let bytes = read_local(&path)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        debug!("Loaded local page: {}", path.display());
        Ok(SourcePage {
            origin: input.to_string(),
            base: PageBase::Dir(dir),
            html: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// Read bytes from a URL or a local path.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    location: &str,
    timeout_secs: u64,
) -> Result<Vec<u8>, ListingError> {
    if is_url(location) {
        fetch_url(client, location, timeout_secs).await
    } else {
        let path = PathBuf::from(location);
        tokio::task::spawn_blocking(move || read_local(&path))
            .await
            .map_err(|e| ListingError::Internal(format!("read task panicked: {e}")))?
    }
}

/// Read a local file, mapping I/O failures to the matching error.
fn read_local(path: &Path) -> Result<Vec<u8>, ListingError> {
    if !path.exists() {
        return Err(ListingError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ListingError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ListingError::SourceNotFound {
            path: path.to_path_buf(),
        },
    })
}

async fn fetch_url(
    client: &reqwest::Client,
    url: &str,
    timeout_secs: u64,
) -> Result<Vec<u8>, ListingError> {
    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            ListingError::FetchTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ListingError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;
    if !response.status().is_success() {
        return Err(ListingError::FetchFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }
    let bytes = response.bytes().await.map_err(map_err)?;
    debug!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}
