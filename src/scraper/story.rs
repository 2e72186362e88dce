//! One story: pagination state, metadata, and page slots, plus the
//! fetch-and-extract orchestration that fills them.

use crate::formats::OutputFormat;
use crate::model::{other_pages, prefer_existing, Metadata, StoryRequest};
use crate::scraper::client::{page_url, PageSource};
use crate::scraper::error::ScraperError;
use crate::scraper::events::{EventSink, ProgressEvent};
use crate::scraper::layout::{extract_page, layout_for, ExtractScope, Layout};
use crate::scraper::url::{classify, Classified};
use futures::future::join_all;
use std::collections::BTreeMap;

/// A story and the canonical text of each of its pages.
///
/// `pages` is allocated once `total_pages` is known (from page 1) and each
/// slot is written by exactly one fetch. A slot left `None` is a page that
/// could not be retrieved.
#[derive(Debug, Clone, Default)]
pub struct StoryDocument {
    pub classic: bool,
    pub format: OutputFormat,
    pub metadata: Metadata,
    pages: Vec<Option<String>>,
    total_pages: u32,
    pages_completed: u32,
    pub request: Option<StoryRequest>,
    pub belongs_to_series: bool,
    pub series_url: Option<String>,
    pub source_url: String,
}

impl StoryDocument {
    pub fn new(source_url: impl Into<String>, format: OutputFormat, classic: bool) -> Self {
        Self {
            source_url: source_url.into(),
            format,
            classic,
            ..Default::default()
        }
    }

    /// Story whose page text is already known. Retrieval will not fetch it again.
    pub fn with_pages(mut self, pages: Vec<Option<String>>) -> Self {
        self.total_pages = pages.len() as u32;
        self.pages_completed = pages.iter().filter(|p| p.is_some()).count() as u32;
        self.pages = pages;
        self
    }

    /// Caller-supplied metadata; extraction never overwrites these fields.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Caller-supplied page count. 0 means unknown, same as not supplying it.
    pub fn with_total_pages(mut self, total_pages: u32) -> Self {
        self.set_total_pages(total_pages);
        self
    }

    pub fn in_series(mut self, series_url: impl Into<String>) -> Self {
        self.belongs_to_series = true;
        let url = series_url.into();
        self.series_url = (!url.is_empty()).then_some(url);
        self
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn author(&self) -> &str {
        &self.metadata.author
    }

    pub fn author_url(&self) -> &str {
        &self.metadata.author_url
    }

    pub fn pages(&self) -> &[Option<String>] {
        &self.pages
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn pages_completed(&self) -> u32 {
        self.pages_completed
    }

    /// Fix the page count. Only the first non-zero value sticks; the slot
    /// vector is sized at that moment. Returns the effective count.
    pub fn set_total_pages(&mut self, count: u32) -> u32 {
        if self.total_pages == 0 && count > 0 {
            self.total_pages = count;
            if self.pages.is_empty() {
                self.pages = vec![None; count as usize];
            }
        }
        self.total_pages
    }

    /// Build `request` from `source_url`, inheriting `headers`. In classic
    /// mode the request is switched to the classic host and cookie.
    /// An unrecognized URL leaves `request` unset and reports it.
    pub fn resolve_request(&mut self, headers: &BTreeMap<String, String>, events: &EventSink) {
        let classified = classify(&self.source_url);
        let Some(request) = (match classified {
            Classified::Story(_) => classified.to_request(),
            _ => None,
        }) else {
            events.emit(ProgressEvent::InvalidStoryUrl {
                url: self.source_url.clone(),
            });
            return;
        };
        let request = request.with_headers(headers);
        self.request = Some(if self.classic {
            request.with_classic_layout()
        } else {
            request
        });
    }

    /// Fetch every page of the story and fill the page slots. A story that
    /// already holds page text is left alone.
    ///
    /// Page 1 is fetched first to learn the page count, then pages 2..N are
    /// fetched concurrently, each writing only its own slot. Failures are
    /// reported as events and leave the slot empty. Returns the series URL
    /// discovered on the last page, if any.
    pub async fn retrieve(
        &mut self,
        source: &dyn PageSource,
        events: &EventSink,
    ) -> Option<String> {
        if self.pages.iter().any(Option::is_some) {
            events.emit(ProgressEvent::StoryAlreadyRetrieved {
                url: self.source_url.clone(),
            });
            return self.series_url.clone();
        }
        events.emit(ProgressEvent::StoryStarted {
            url: self.source_url.clone(),
        });
        let request = match self.request.clone() {
            Some(r) if r.is_complete() => r,
            _ => {
                events.emit(ProgressEvent::PageFailed {
                    page: 1,
                    reason: ScraperError::MalformedRequest { page: 1 }.to_string(),
                });
                return None;
            }
        };
        let layout = layout_for(self.classic);

        if !self.retrieve_first_page(source, &request, layout, events).await {
            return None;
        }
        self.retrieve_other_pages(source, &request, layout, events).await;

        events.emit(ProgressEvent::StoryFinished {
            completed: self.pages_completed,
            total: self.total_pages,
        });
        if !self.belongs_to_series {
            if let Some(ref url) = self.series_url {
                events.emit(ProgressEvent::SeriesDiscovered { url: url.clone() });
            }
        }
        self.series_url.clone()
    }

    async fn retrieve_first_page(
        &mut self,
        source: &dyn PageSource,
        request: &StoryRequest,
        layout: &dyn Layout,
        events: &EventSink,
    ) -> bool {
        let markup = match fetch_markup(source, request, 1, events).await {
            Some(m) => m,
            None => return false,
        };
        // Page 1 is also the last page when the story has a single page, so
        // series discovery is decided after the count is known.
        let extracted = match extract_page(
            layout,
            &markup,
            ExtractScope {
                first_page: true,
                discover_series: !self.belongs_to_series,
            },
        ) {
            Ok(e) => e,
            Err(e) => {
                events.emit(ProgressEvent::PageFailed {
                    page: 1,
                    reason: e.to_string(),
                });
                return false;
            }
        };

        let total = self.set_total_pages(extracted.page_count.max(1));
        events.emit(ProgressEvent::TotalPages { total });
        if let Some(metadata) = extracted.metadata {
            self.metadata.merge_missing(metadata);
        }
        if total == 1 {
            self.merge_series_url(extracted.series_url);
        }
        if let Some(slot) = self.pages.first_mut() {
            *slot = Some(extracted.content);
            self.pages_completed += 1;
        }
        events.emit(ProgressEvent::PageCompleted { page: 1 });
        true
    }

    async fn retrieve_other_pages(
        &mut self,
        source: &dyn PageSource,
        request: &StoryRequest,
        layout: &dyn Layout,
        events: &EventSink,
    ) {
        let total = self.total_pages;
        let discover_series = !self.belongs_to_series;
        let slots = self.pages.iter_mut().skip(1);
        let tasks = slots.zip(other_pages(total)).map(|(slot, page)| async move {
            let markup = fetch_markup(source, request, page, events).await?;
            let scope = ExtractScope {
                first_page: false,
                discover_series: discover_series && page == total,
            };
            match extract_page(layout, &markup, scope) {
                Ok(extracted) => {
                    *slot = Some(extracted.content);
                    events.emit(ProgressEvent::PageCompleted { page });
                    Some(extracted.series_url)
                }
                Err(e) => {
                    events.emit(ProgressEvent::PageFailed {
                        page,
                        reason: e.to_string(),
                    });
                    None
                }
            }
        });
        let results = join_all(tasks).await;

        for series_url in results.into_iter().flatten() {
            self.pages_completed += 1;
            self.merge_series_url(series_url);
        }
    }

    fn merge_series_url(&mut self, discovered: Option<String>) {
        let current = self.series_url.clone().unwrap_or_default();
        let discovered = discovered.unwrap_or_default();
        let merged = prefer_existing(&current, &discovered);
        self.series_url = (!merged.is_empty()).then(|| merged.to_string());
    }
}

/// Fetch one page, reporting the request and any failure as events.
async fn fetch_markup(
    source: &dyn PageSource,
    request: &StoryRequest,
    page: u32,
    events: &EventSink,
) -> Option<String> {
    events.emit(ProgressEvent::RequestingPage {
        page,
        url: page_url(source.scheme(), request, page),
    });
    match source.fetch(request, page).await {
        Ok(markup) => Some(markup),
        Err(e) => {
            events.emit(ProgressEvent::PageFailed {
                page,
                reason: e.to_string(),
            });
            None
        }
    }
}
