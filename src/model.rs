//! Request descriptors and metadata shared by story and series retrieval.

use std::collections::BTreeMap;

/// Host serving the classic (legacy) layout.
pub const CLASSIC_HOST: &str = "classic.literotica.com";
/// Cookie that switches the host to the classic layout.
pub const CLASSIC_COOKIE: &str = "enable_classic=1";

/// Where and how to request a story (or series index) page.
///
/// Built once from a classified URL; switching to the classic layout
/// produces a new request rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoryRequest {
    pub path: String,
    pub host: String,
    pub headers: BTreeMap<String, String>,
}

impl StoryRequest {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Same request with the given headers merged in (existing keys replaced).
    pub fn with_headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        for (k, v) in headers {
            self.headers.insert(k.clone(), v.clone());
        }
        self
    }

    /// Rewrite the host to the classic subdomain and add the enabling cookie.
    /// Applying it twice yields the same request.
    pub fn with_classic_layout(mut self) -> Self {
        self.host = classic_host(&self.host);
        let cookie = match self.headers.get("Cookie").map(|c| c.trim()) {
            None | Some("") => CLASSIC_COOKIE.to_string(),
            Some(c) if c.split(';').any(|part| part.trim() == CLASSIC_COOKIE) => c.to_string(),
            Some(c) => format!("{}; {}", CLASSIC_COOKIE, c),
        };
        self.headers.insert("Cookie".to_string(), cookie);
        self
    }

    /// True when both host and path are present.
    pub fn is_complete(&self) -> bool {
        !self.host.is_empty() && !self.path.is_empty()
    }
}

/// `www.literotica.com` and `literotica.com` become the classic host; locale
/// subdomains and an already-classic host are left alone.
fn classic_host(host: &str) -> String {
    let lower = host.to_ascii_lowercase();
    match lower.strip_prefix("www.").unwrap_or(&lower) {
        "literotica.com" => CLASSIC_HOST.to_string(),
        _ => host.to_string(),
    }
}

/// Title, author, and author URL as read from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub author_url: String,
}

impl Metadata {
    /// Merge `extracted` into `self`, keeping every field that is already set.
    pub fn merge_missing(&mut self, extracted: Metadata) {
        self.title = prefer_existing(&self.title, &extracted.title).to_string();
        self.author = prefer_existing(&self.author, &extracted.author).to_string();
        self.author_url = prefer_existing(&self.author_url, &extracted.author_url).to_string();
    }
}

/// First non-empty value wins: `current` unless it is empty.
pub fn prefer_existing<'a>(current: &'a str, extracted: &'a str) -> &'a str {
    if current.is_empty() {
        extracted
    } else {
        current
    }
}

/// Page numbers still to fetch once page 1 is known: `2..=total_pages`.
pub fn other_pages(total_pages: u32) -> Vec<u32> {
    (2..=total_pages).collect()
}
