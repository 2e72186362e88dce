//! litscrape: download Literotica stories and series as HTML, plain text,
//! or Markdown.

pub mod cli;
pub mod config;
pub mod formats;
pub mod logging;
pub mod model;
pub mod scraper;

// Re-exports for CLI and consumers.
pub use formats::{render_document, OutputFormat, RenderOptions};
pub use scraper::{
    classify, download, download_document, validate_options, Classified, Document,
    DownloadOptions, EventSink, HttpFetcher, HttpFetcherBuilder, PageSource, ProgressEvent,
    ScraperError, SeriesDocument, StoryDocument,
};
