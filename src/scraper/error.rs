//! Shared error type for classification, transport, and extraction.

use thiserror::Error;

/// Shared scraper error. Only classification variants abort a download; the
/// rest are reported per page and leave the affected slot empty.
#[derive(Debug, Error)]
pub enum ScraperError {
    // Classification
    #[error("No URL provided.")]
    MissingUrl,

    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Cannot download series from classic layout.")]
    ClassicSeriesConflict,

    #[error("Unknown format '{0}'. Use html, txt, or md.")]
    UnknownFormat(String),

    // Transport
    #[error("Looking up page {page} failed: request has no host or path.")]
    MalformedRequest { page: u32 },

    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Response from {url} is not text (content type {content_type}).")]
    NonTextBody { url: String, content_type: String },

    #[error("Failed to read response body: {source}")]
    BodyRead {
        #[source]
        source: reqwest::Error,
    },

    // Extraction
    #[error("Invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },
}

impl ScraperError {
    /// True for errors raised before any network call (bad URL, bad options).
    pub fn is_classification(&self) -> bool {
        matches!(
            self,
            ScraperError::MissingUrl
                | ScraperError::InvalidUrl { .. }
                | ScraperError::ClassicSeriesConflict
                | ScraperError::UnknownFormat(_)
        )
    }
}
