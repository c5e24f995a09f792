//! Error types for the temu-lister library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ListingError`] — **Fatal**: the listing cannot proceed (source page
//!   unreachable, credentials missing, Temu rejected the request, no usable
//!   image left). Returned as `Err(ListingError)` from the workflow entry
//!   points.
//!
//! * [`ImageIssue`] — **Non-fatal**: a single image was dropped (download
//!   failed, too small, Chinese text detected) while the others carry on.
//!   Stored inside [`crate::output::ImageResult`] so callers can see exactly
//!   which source images were discarded and why.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the temu-lister library.
#[derive(Debug, Error)]
pub enum ListingError {
    // ── Source errors ─────────────────────────────────────────────────────
    /// Local source file was not found.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    SourceNotFound { path: PathBuf },

    /// Process does not have read permission on the source file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a readable path nor an HTTP(S) URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP fetch of the source page or an image failed.
    #[error("Failed to fetch '{url}': {reason}")]
    FetchFailed { url: String, reason: String },

    /// HTTP fetch exceeded the configured timeout.
    #[error("Fetch timed out after {secs}s for '{url}'\nIncrease --fetch-timeout.")]
    FetchTimeout { url: String, secs: u64 },

    /// The page was fetched but holds neither a title nor any image.
    #[error("No product data found on '{url}'\nCheck the page or pass custom selectors in the profile.")]
    NoProductData { url: String },

    /// Every image was rejected; Temu requires at least one.
    #[error("No usable images: {rejected}/{total} images were rejected.\nFirst issue: {first_issue}")]
    NoUsableImages {
        total: usize,
        rejected: usize,
        first_issue: String,
    },

    // ── Temu API errors ───────────────────────────────────────────────────
    /// A required credential is not set.
    #[error("Temu credential '{var}' is not set.\nExport {var} or pass it on the command line.")]
    MissingCredentials { var: String },

    /// Network-level failure talking to the Temu router.
    #[error("Transport error calling '{api_type}': {reason}")]
    Transport { api_type: String, reason: String },

    /// The router answered with a non-2xx HTTP status.
    #[error("HTTP {status} from '{api_type}': {body}")]
    HttpStatus {
        api_type: String,
        status: u16,
        body: String,
    },

    /// Temu returned `success: false`.
    #[error("Temu API '{api_type}' failed with code {code}: {message}")]
    Api {
        api_type: String,
        code: i64,
        message: String,
    },

    /// Temu returned something that does not match the expected shape.
    #[error("Unexpected response from '{api_type}': {detail}")]
    InvalidResponse { api_type: String, detail: String },

    // ── Workflow errors ───────────────────────────────────────────────────
    /// No category matched a segment of the configured category path.
    #[error("Category '{segment}' not found under parent {parent_id}.\nAvailable: {available}")]
    CategoryNotFound {
        segment: String,
        parent_id: u64,
        available: String,
    },

    /// The resolved category has children; Temu needs a leaf.
    #[error("Category {cat_id} ('{name}') is not a leaf category.\nExtend --category-path down to a leaf.")]
    CategoryNotLeaf { cat_id: u64, name: String },

    /// Neither `category_id` nor `category_path` was configured.
    #[error("No category configured.\nPass --category-id or --category-path.")]
    CategoryNotConfigured,

    /// A template property marked required could not be filled.
    #[error("Required property '{name}' has no value.\nAdd it to property_defaults in the listing profile.")]
    MissingRequiredProperty { name: String },

    /// Temu returned no spec id for a color or size value.
    #[error("No spec id for '{name}' under parent spec {parent_spec_id}")]
    SpecNotResolved { parent_spec_id: u64, name: String },

    /// Local or remote compliance checks reported problems.
    #[error("Compliance check failed:\n  - {}", issues.join("\n  - "))]
    ComplianceFailed { issues: Vec<String> },

    /// The vision LLM used for text detection is not configured.
    #[error("OCR provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The vision LLM used for text detection kept failing.
    #[error("Text detection failed: {detail}")]
    TextDetection { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the payload/output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ListingError {
    /// Whether a retry of the same call could plausibly succeed.
    ///
    /// `transient_codes` lists Temu error codes that signal overload or rate
    /// limiting for the current account.
    pub fn is_transient(&self, transient_codes: &[i64]) -> bool {
        match self {
            ListingError::Transport { .. } | ListingError::FetchTimeout { .. } => true,
            ListingError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            ListingError::Api { code, message, .. } => {
                transient_codes.contains(code) || looks_rate_limited(message)
            }
            _ => false,
        }
    }

    /// Error code carried by an API failure, if any.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            ListingError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn looks_rate_limited(message: &str) -> bool {
    let m = message.to_lowercase();
    ["too frequent", "rate limit", "system busy", "try again later", "限流", "频繁", "繁忙"]
        .iter()
        .any(|marker| m.contains(marker))
}

/// A non-fatal problem with a single source image.
///
/// Stored in [`crate::output::ImageResult`]. The listing continues as long as
/// at least one image survives.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ImageIssue {
    /// Image could not be downloaded or read.
    #[error("Image {index}: download failed: {detail}")]
    DownloadFailed { index: usize, detail: String },

    /// Bytes are not a decodable image.
    #[error("Image {index}: decode failed: {detail}")]
    DecodeFailed { index: usize, detail: String },

    /// Image is below the upscale floor.
    #[error("Image {index}: {width}x{height} is too small (minimum side {min})")]
    TooSmall {
        index: usize,
        width: u32,
        height: u32,
        min: u32,
    },

    /// Aspect ratio is not one Temu accepts and padding is disabled.
    #[error("Image {index}: aspect ratio {width}x{height} is not allowed")]
    BadAspectRatio {
        index: usize,
        width: u32,
        height: u32,
    },

    /// Re-encoded file is still above the size limit.
    #[error("Image {index}: {bytes} bytes exceeds the {limit} byte limit")]
    TooLarge {
        index: usize,
        bytes: usize,
        limit: usize,
    },

    /// OCR found Chinese text on the image.
    #[error("Image {index}: contains {han_chars} Chinese characters ({sample:?})")]
    ChineseText {
        index: usize,
        han_chars: usize,
        sample: String,
    },

    /// OCR failed and the pipeline is configured to fail closed.
    #[error("Image {index}: text detection failed: {detail}")]
    OcrFailed { index: usize, detail: String },
}

impl ImageIssue {
    /// Position of the affected image on the source page.
    pub fn index(&self) -> usize {
        match self {
            ImageIssue::DownloadFailed { index, .. }
            | ImageIssue::DecodeFailed { index, .. }
            | ImageIssue::TooSmall { index, .. }
            | ImageIssue::BadAspectRatio { index, .. }
            | ImageIssue::TooLarge { index, .. }
            | ImageIssue::ChineseText { index, .. }
            | ImageIssue::OcrFailed { index, .. } => *index,
        }
    }

    /// Whether the image was dropped by the text filter.
    pub fn is_text_rejection(&self) -> bool {
        matches!(self, ImageIssue::ChineseText { .. } | ImageIssue::OcrFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compliance_failed_lists_every_issue() {
        let e = ListingError::ComplianceFailed {
            issues: vec!["title too long".into(), "no sku".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("title too long"), "got: {msg}");
        assert!(msg.contains("no sku"), "got: {msg}");
    }

    #[test]
    fn http_5xx_and_429_are_transient() {
        let e = |status| ListingError::HttpStatus {
            api_type: "bg.goods.add".into(),
            status,
            body: String::new(),
        };
        assert!(e(503).is_transient(&[]));
        assert!(e(429).is_transient(&[]));
        assert!(!e(400).is_transient(&[]));
    }

    #[test]
    fn api_error_transient_by_code_or_message() {
        let busy = ListingError::Api {
            api_type: "bg.goods.cats.get".into(),
            code: 7_000_001,
            message: "whatever".into(),
        };
        assert!(busy.is_transient(&[7_000_001]));
        assert!(!busy.is_transient(&[]));

        let limited = ListingError::Api {
            api_type: "bg.goods.cats.get".into(),
            code: 1,
            message: "Request too frequent, try again later".into(),
        };
        assert!(limited.is_transient(&[]));
    }

    #[test]
    fn input_errors_are_not_transient() {
        let e = ListingError::MissingRequiredProperty {
            name: "Material".into(),
        };
        assert!(!e.is_transient(&[7_000_001]));
        assert_eq!(e.api_code(), None);
    }

    #[test]
    fn chinese_text_display() {
        let issue = ImageIssue::ChineseText {
            index: 2,
            han_chars: 4,
            sample: "包邮特价".into(),
        };
        let msg = issue.to_string();
        assert!(msg.contains("Image 2"));
        assert!(msg.contains("4 Chinese"));
    }
}
