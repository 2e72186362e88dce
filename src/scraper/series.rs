//! A series: the stories listed on a series index page, retrieved one after
//! another.

use crate::formats::OutputFormat;
use crate::model::{Metadata, StoryRequest};
use crate::scraper::client::{page_url, PageSource};
use crate::scraper::events::{EventSink, ProgressEvent};
use crate::scraper::layout::extract_series_index;
use crate::scraper::story::StoryDocument;
use crate::scraper::url::story_slug;
use reqwest::Url;

/// Ordered stories of one series plus the series' own metadata.
#[derive(Debug, Clone, Default)]
pub struct SeriesDocument {
    pub series_url: String,
    pub format: OutputFormat,
    pub metadata: Metadata,
    stories: Vec<StoryDocument>,
    initial: Option<StoryDocument>,
}

impl SeriesDocument {
    /// Series reached from an already retrieved story. That story is reused
    /// (not fetched again) where the index lists it.
    pub fn from_story(mut story: StoryDocument, series_url: impl Into<String>) -> Self {
        let series_url = series_url.into();
        let series_url = if series_url.is_empty() {
            story.series_url.clone().unwrap_or_default()
        } else {
            series_url
        };
        story.belongs_to_series = true;
        story.series_url = (!series_url.is_empty()).then(|| series_url.clone());
        Self {
            format: story.format,
            series_url,
            initial: Some(story),
            ..Default::default()
        }
    }

    /// Series requested directly by its index URL.
    pub fn new(series_url: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            series_url: series_url.into(),
            format,
            ..Default::default()
        }
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

    pub fn stories(&self) -> &[StoryDocument] {
        &self.stories
    }

    /// Slug of the first member story, used to name the output.
    pub fn first_story_slug(&self) -> Option<String> {
        self.stories.first().and_then(|s| story_slug(&s.source_url))
    }

    /// Series index request: host and path of the series URL, inheriting the
    /// initiating story's headers.
    fn build_request(&self) -> Option<StoryRequest> {
        let url = Url::parse(&self.series_url).ok()?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", url.host_str()?, port),
            None => url.host_str()?.to_string(),
        };
        let request = StoryRequest::new(host, url.path());
        Some(match self.initial.as_ref().and_then(|s| s.request.as_ref()) {
            Some(r) => request.with_headers(&r.headers),
            None => request,
        })
    }

    /// Fetch the index page, build the member stories, then retrieve them
    /// strictly in list order: story i+1 starts only after story i settled.
    ///
    /// A failed index fetch is reported as an event, never as an error. The
    /// initiating story, if any, is kept as a member either way.
    pub async fn retrieve(&mut self, source: &dyn PageSource, events: &EventSink) {
        let Some(request) = self.build_request().filter(|r| r.is_complete()) else {
            events.emit(ProgressEvent::SeriesFailed {
                reason: format!("no usable series URL ({:?})", self.series_url),
            });
            self.keep_initial();
            return;
        };
        events.emit(ProgressEvent::RequestingSeries {
            url: page_url(source.scheme(), &request, 1),
        });
        let index = source
            .fetch(&request, 1)
            .await
            .and_then(|markup| extract_series_index(&markup));
        let index = match index {
            Ok(i) => i,
            Err(e) => {
                events.emit(ProgressEvent::SeriesFailed {
                    reason: e.to_string(),
                });
                self.keep_initial();
                return;
            }
        };
        self.metadata.merge_missing(index.metadata);
        events.emit(ProgressEvent::SeriesStoriesFound {
            count: index.links.len(),
        });

        self.stories = self.build_stories(&index.links, &request, events);
        self.keep_initial();
        for story in self.stories.iter_mut() {
            story.retrieve(source, events).await;
        }
    }

    /// Append the initiating story when no index link claimed it.
    fn keep_initial(&mut self) {
        if let Some(initial) = self.initial.take() {
            self.stories.push(initial);
        }
    }

    /// One story per link. The first link whose request path matches the
    /// initiating story takes that story itself.
    fn build_stories(
        &mut self,
        links: &[String],
        request: &StoryRequest,
        events: &EventSink,
    ) -> Vec<StoryDocument> {
        let initial_path = self
            .initial
            .as_ref()
            .and_then(|s| s.request.as_ref())
            .map(|r| r.path.clone());
        links
            .iter()
            .map(|link| {
                let mut story = StoryDocument::new(link.as_str(), self.format, false)
                    .in_series(self.series_url.as_str());
                story.resolve_request(&request.headers, events);
                let story_path = story.request.as_ref().map(|r| r.path.as_str());
                if story_path.is_some() && story_path == initial_path.as_deref() {
                    if let Some(initial) = self.initial.take() {
                        return initial;
                    }
                }
                story
            })
            .collect()
    }
}
