//! Retrieval pipeline: URL classification, page fetching, layout extraction,
//! canonical conversion, and story/series orchestration.

pub mod canonical;
mod client;
mod error;
pub mod events;
pub mod layout;
mod series;
mod story;
pub mod url;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{page_url, HttpFetcher, HttpFetcherBuilder, PageSource, USER_AGENTS};
pub use error::ScraperError;
pub use events::{EventSink, ProgressEvent};
pub use series::SeriesDocument;
pub use story::StoryDocument;
pub use url::{classify, Classified};

use crate::formats::{render_document, OutputFormat, RenderOptions};
use reqwest::Url;
use std::collections::BTreeMap;

/// What the caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    pub url: String,
    pub format: OutputFormat,
    pub classic: bool,
    pub series: bool,
    pub no_page_numbers: bool,
    pub no_paragraph_break: bool,
}

impl DownloadOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            page_indicator: !self.no_page_numbers,
            no_paragraph_break: self.no_paragraph_break,
        }
    }
}

/// Options checked against the URL, before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub classified: Classified,
    /// Classic layout, explicitly requested or implied by the host prefix.
    pub classic: bool,
}

fn invalid_url(input: &str) -> ScraperError {
    ScraperError::InvalidUrl {
        input: input.to_string(),
        reason: "not a Literotica story or series URL".to_string(),
    }
}

/// Classify the URL and reject conflicting options.
pub fn validate_options(options: &DownloadOptions) -> Result<ValidatedRequest, ScraperError> {
    if options.url.trim().is_empty() {
        return Err(ScraperError::MissingUrl);
    }
    let classified = classify(&options.url);
    if classified == Classified::Invalid {
        return Err(invalid_url(&options.url));
    }
    let classic = options.classic || classified.requests_classic();
    let series_requested = options.series || matches!(classified, Classified::Series(_));
    if classic && series_requested {
        return Err(ScraperError::ClassicSeriesConflict);
    }
    Ok(ValidatedRequest {
        classified,
        classic,
    })
}

/// A retrieved story, or a whole series.
#[derive(Debug, Clone)]
pub enum Document {
    Story(StoryDocument),
    Series(SeriesDocument),
}

impl Document {
    /// Total pages successfully retrieved across all stories.
    pub fn pages_completed(&self) -> u32 {
        match self {
            Document::Story(s) => s.pages_completed(),
            Document::Series(s) => s.stories().iter().map(|s| s.pages_completed()).sum(),
        }
    }
}

/// Resolve `href` against the host the story came from. Absolute links pass through.
fn absolute_url(href: &str, host: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    Url::parse(&format!("https://{}/", host))
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Retrieve the story (and, when asked, its series) or the series named by
/// `options.url`. Only option/URL problems are errors; fetch failures show
/// up as events and missing pages.
pub async fn download(
    options: &DownloadOptions,
    source: &dyn PageSource,
    events: &EventSink,
) -> Result<Document, ScraperError> {
    let validated = validate_options(options)?;

    let story_url = match validated.classified {
        Classified::Series(ref s) => {
            let series_url = format!("https://{}{}", s.host, s.path);
            let mut series = SeriesDocument::new(series_url, options.format);
            series.retrieve(source, events).await;
            return Ok(Document::Series(series));
        }
        Classified::Story(ref s) => s,
        Classified::Invalid => return Err(invalid_url(&options.url)),
    };

    let mut story = StoryDocument::new(options.url.trim(), options.format, validated.classic);
    story.resolve_request(&BTreeMap::new(), events);
    let series_url = story.retrieve(source, events).await;

    match series_url {
        Some(url) if options.series => {
            let url = absolute_url(&url, &story_url.host);
            let mut series = SeriesDocument::from_story(story, url);
            series.retrieve(source, events).await;
            Ok(Document::Series(series))
        }
        _ => Ok(Document::Story(story)),
    }
}

/// [download], then render the result as complete document text.
pub async fn download_document(
    options: &DownloadOptions,
    source: &dyn PageSource,
    events: &EventSink,
) -> Result<(Document, String), ScraperError> {
    let document = download(options, source, events).await?;
    let text = render_document(&document, options.format, options.render_options());
    Ok((document, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::{modern_page, series_index_page, ScriptedSource};

    #[test]
    fn missing_url_is_rejected() {
        assert!(matches!(
            validate_options(&DownloadOptions::new("  ")),
            Err(ScraperError::MissingUrl)
        ));
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            validate_options(&DownloadOptions::new("https://example.com/s/x")),
            Err(ScraperError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn classic_with_series_is_rejected() {
        let mut options = DownloadOptions::new("https://www.literotica.com/s/x");
        options.classic = true;
        options.series = true;
        assert!(matches!(
            validate_options(&options),
            Err(ScraperError::ClassicSeriesConflict)
        ));

        let mut implied = DownloadOptions::new("https://classic.literotica.com/s/x");
        implied.series = true;
        assert!(matches!(
            validate_options(&implied),
            Err(ScraperError::ClassicSeriesConflict)
        ));

        let mut series_url = DownloadOptions::new("https://www.literotica.com/series/se/1");
        series_url.classic = true;
        assert!(matches!(
            validate_options(&series_url),
            Err(ScraperError::ClassicSeriesConflict)
        ));
    }

    #[test]
    fn classic_prefix_implies_classic() -> Result<(), ScraperError> {
        let v = validate_options(&DownloadOptions::new("https://classic.literotica.com/s/x"))?;
        assert!(v.classic);
        let v = validate_options(&DownloadOptions::new("https://www.literotica.com/s/x"))?;
        assert!(!v.classic);
        Ok(())
    }

    #[test]
    fn absolute_url_resolves_relative_links() {
        assert_eq!(
            absolute_url("/series/se/9", "www.literotica.com"),
            "https://www.literotica.com/series/se/9"
        );
        assert_eq!(
            absolute_url("https://www.literotica.com/series/se/9", "german.literotica.com"),
            "https://www.literotica.com/series/se/9"
        );
    }

    #[tokio::test]
    async fn invalid_url_makes_no_request() {
        let source = ScriptedSource::new();
        let result = download(
            &DownloadOptions::new("nope"),
            &source,
            &EventSink::disabled(),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(source.requests(), 0);
    }

    #[tokio::test]
    async fn story_without_series_flag_stays_a_story() -> Result<(), ScraperError> {
        let source = ScriptedSource::new().page(
            "/s/s2",
            1,
            modern_page("Two", 1, Some("/series/se/434268")),
        );
        let doc = download(
            &DownloadOptions::new("https://www.literotica.com/s/s2"),
            &source,
            &EventSink::disabled(),
        )
        .await?;
        match doc {
            Document::Story(s) => {
                assert_eq!(s.pages()[0].as_deref(), Some("Two"));
                assert_eq!(s.series_url.as_deref(), Some("/series/se/434268"));
            }
            Document::Series(_) => panic!("series not requested"),
        }
        assert_eq!(source.requests(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn story_with_series_flag_follows_series() -> Result<(), ScraperError> {
        let source = ScriptedSource::new()
            .page("/s/s2", 1, modern_page("Two", 1, Some("/series/se/434268")))
            .page("/s/s1", 1, modern_page("One", 1, None))
            .page(
                "/series/se/434268",
                1,
                series_index_page(&["/s/s1", "/s/s2"]),
            );
        let mut options = DownloadOptions::new("https://www.literotica.com/s/s2");
        options.series = true;
        options.format = OutputFormat::Md;
        let doc = download(&options, &source, &EventSink::disabled()).await?;
        let series = match doc {
            Document::Series(s) => s,
            Document::Story(_) => panic!("series requested"),
        };
        assert_eq!(series.series_url, "https://www.literotica.com/series/se/434268");
        let bodies: Vec<_> = series
            .stories()
            .iter()
            .map(|s| s.pages()[0].clone().unwrap_or_default())
            .collect();
        assert_eq!(bodies, vec!["One", "Two"]);
        // The initiating story was fetched once, as the entry point.
        let fetched_s2 = source
            .log()
            .iter()
            .filter(|e| e.as_str() == "start:/s/s2:1")
            .count();
        assert_eq!(fetched_s2, 1);
        assert_eq!(Document::Series(series).pages_completed(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn rendered_document_has_all_pages() -> Result<(), ScraperError> {
        let source = ScriptedSource::new()
            .page("/s/tale", 1, modern_page("First", 2, None))
            .page("/s/tale", 2, modern_page("Second", 2, None));
        let mut options = DownloadOptions::new("https://www.literotica.com/s/tale");
        options.format = OutputFormat::Txt;
        options.no_page_numbers = true;
        let (_, text) = download_document(&options, &source, &EventSink::disabled()).await?;
        assert!(text.starts_with("Modern Title\n"));
        assert!(text.contains("First\n\nSecond"));
        assert!(!text.contains("Page 2:"));
        Ok(())
    }

    #[tokio::test]
    async fn failed_series_index_keeps_fetched_story() -> Result<(), ScraperError> {
        let source = ScriptedSource::new().page(
            "/s/s2",
            1,
            modern_page("Two", 1, Some("/series/se/434268")),
        );
        let mut options = DownloadOptions::new("https://www.literotica.com/s/s2");
        options.series = true;
        options.format = OutputFormat::Txt;
        let (document, text) =
            download_document(&options, &source, &EventSink::disabled()).await?;
        assert_eq!(document.pages_completed(), 1);
        assert!(text.starts_with("Modern Title\n"));
        assert!(text.contains("Two"));
        Ok(())
    }

    #[tokio::test]
    async fn series_url_downloads_series_directly() -> Result<(), ScraperError> {
        let source = ScriptedSource::new()
            .page("/series/se/42", 1, series_index_page(&["/s/a"]))
            .page("/s/a", 1, modern_page("A", 1, None));
        let doc = download(
            &DownloadOptions::new("literotica.com/series/se/42"),
            &source,
            &EventSink::disabled(),
        )
        .await?;
        match doc {
            Document::Series(s) => {
                assert_eq!(s.series_url, "https://literotica.com/series/se/42");
                assert_eq!(s.stories().len(), 1);
            }
            Document::Story(_) => panic!("expected a series"),
        }
        Ok(())
    }
}
