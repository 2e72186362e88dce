//! Progress narration as an ordered stream of events.
//!
//! Retrieval never prints. It emits [ProgressEvent]s into an [EventSink];
//! the caller drains the paired receiver and decides what to show.

use std::fmt;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// One step of story or series retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    StoryStarted { url: String },
    StoryAlreadyRetrieved { url: String },
    RequestingPage { page: u32, url: String },
    TotalPages { total: u32 },
    PageCompleted { page: u32 },
    PageFailed { page: u32, reason: String },
    StoryFinished { completed: u32, total: u32 },
    SeriesDiscovered { url: String },
    RequestingSeries { url: String },
    SeriesStoriesFound { count: usize },
    SeriesFailed { reason: String },
    InvalidStoryUrl { url: String },
}

impl ProgressEvent {
    /// Failures are shown even when narration is off.
    pub fn is_forced(&self) -> bool {
        matches!(
            self,
            ProgressEvent::PageFailed { .. }
                | ProgressEvent::SeriesFailed { .. }
                | ProgressEvent::InvalidStoryUrl { .. }
        )
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::StoryStarted { url } => write!(f, "Getting story from {}", url),
            ProgressEvent::StoryAlreadyRetrieved { url } => {
                write!(f, "Story {} was already retrieved", url)
            }
            ProgressEvent::RequestingPage { page, url } => {
                write!(f, "Requesting page - {} - {}", page, url)
            }
            ProgressEvent::TotalPages { total } => write!(f, "This story has {} page(s)", total),
            ProgressEvent::PageCompleted { page } => write!(f, "Got page {}", page),
            ProgressEvent::PageFailed { page, reason } => {
                write!(f, "Page {} skipped: {}", page, reason)
            }
            ProgressEvent::StoryFinished { completed, total } => {
                write!(f, "Finished story: {} of {} page(s) retrieved", completed, total)
            }
            ProgressEvent::SeriesDiscovered { url } => {
                write!(f, "Story is part of a series: {}", url)
            }
            ProgressEvent::RequestingSeries { url } => {
                write!(f, "Requesting series page - {}", url)
            }
            ProgressEvent::SeriesStoriesFound { count } => {
                write!(f, "Series lists {} stories", count)
            }
            ProgressEvent::SeriesFailed { reason } => {
                write!(f, "Error getting the series: {}", reason)
            }
            ProgressEvent::InvalidStoryUrl { url } => write!(f, "The url {} is not valid.", url),
        }
    }
}

/// Sending half of the progress stream. A disabled sink drops every event
/// after mirroring it to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl EventSink {
    /// Sink plus the receiver the caller drains.
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ProgressEvent) {
        if event.is_forced() {
            tracing::warn!("{}", event);
        } else {
            tracing::debug!("{}", event);
        }
        if let Some(ref tx) = self.tx {
            // Receiver gone means nobody is listening any more.
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_delivers_in_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(ProgressEvent::TotalPages { total: 3 });
        sink.emit(ProgressEvent::PageCompleted { page: 1 });
        assert_eq!(rx.try_recv().ok(), Some(ProgressEvent::TotalPages { total: 3 }));
        assert_eq!(rx.try_recv().ok(), Some(ProgressEvent::PageCompleted { page: 1 }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disabled_sink_and_dropped_receiver_do_not_fail() {
        EventSink::disabled().emit(ProgressEvent::PageCompleted { page: 1 });
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(ProgressEvent::PageCompleted { page: 1 });
    }

    #[test]
    fn failures_are_forced() {
        assert!(ProgressEvent::PageFailed {
            page: 2,
            reason: "x".into()
        }
        .is_forced());
        assert!(!ProgressEvent::PageCompleted { page: 2 }.is_forced());
    }

    #[test]
    fn display_reads_like_narration() {
        let e = ProgressEvent::RequestingPage {
            page: 2,
            url: "https://www.literotica.com/s/x?page=2".into(),
        };
        assert_eq!(
            e.to_string(),
            "Requesting page - 2 - https://www.literotica.com/s/x?page=2"
        );
    }
}
