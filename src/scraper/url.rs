//! URL classification: story URL, series index URL, or neither.

use crate::model::StoryRequest;
use regex::Regex;
use std::sync::OnceLock;

const PREFIXES: &str =
    r"www\.|german\.|spanish\.|french\.|dutch\.|italian\.|romanian\.|portuguese\.|classic\.";

fn story_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"^(?:https?://)?({})?(?:i\.)?(literotica\.com)(/s(?:tories)?/(?:showstory\.php\?(?:url|id)=)?([a-z\-0-9]+))$",
            PREFIXES
        );
        Regex::new(&pattern).expect("story URL pattern is valid")
    })
}

fn series_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"^(?:https?://)?({})?(?:i\.)?(literotica\.com)(/series/se/([\-a-zA-Z0-9]+))$",
            PREFIXES
        );
        Regex::new(&pattern).expect("series URL pattern is valid")
    })
}

/// A recognized story URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryUrl {
    /// Host including any locale/classic prefix, e.g. `www.literotica.com`.
    pub host: String,
    /// Path including the optional `showstory.php?url=` form.
    pub path: String,
    pub slug: String,
}

/// A recognized series index URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesUrl {
    pub host: String,
    pub path: String,
    pub id: String,
}

/// Result of classifying user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Story(StoryUrl),
    Series(SeriesUrl),
    Invalid,
}

impl Classified {
    pub fn host(&self) -> Option<&str> {
        match self {
            Classified::Story(s) => Some(&s.host),
            Classified::Series(s) => Some(&s.host),
            Classified::Invalid => None,
        }
    }

    /// The host prefix names the classic layout (e.g. `classic.literotica.com`).
    pub fn requests_classic(&self) -> bool {
        self.host()
            .and_then(|h| h.strip_suffix("literotica.com"))
            .is_some_and(|prefix| prefix.contains("classic"))
    }

    /// Request descriptor for the classified URL, without any headers.
    pub fn to_request(&self) -> Option<StoryRequest> {
        match self {
            Classified::Story(s) => Some(StoryRequest::new(&s.host, &s.path)),
            Classified::Series(s) => Some(StoryRequest::new(&s.host, &s.path)),
            Classified::Invalid => None,
        }
    }
}

/// Classify a user-supplied URL. Surrounding whitespace is ignored.
pub fn classify(input: &str) -> Classified {
    let input = input.trim();
    if let Some(caps) = story_regex().captures(input) {
        let prefix = caps.get(1).map_or("", |m| m.as_str());
        return Classified::Story(StoryUrl {
            host: format!("{}{}", prefix, &caps[2]),
            path: caps[3].to_string(),
            slug: caps[4].to_string(),
        });
    }
    if let Some(caps) = series_regex().captures(input) {
        let prefix = caps.get(1).map_or("", |m| m.as_str());
        return Classified::Series(SeriesUrl {
            host: format!("{}{}", prefix, &caps[2]),
            path: caps[3].to_string(),
            id: caps[4].to_string(),
        });
    }
    Classified::Invalid
}

/// Slug of a story URL, or `None` for anything else.
pub fn story_slug(input: &str) -> Option<String> {
    match classify(input) {
        Classified::Story(s) => Some(s.slug),
        _ => None,
    }
}
