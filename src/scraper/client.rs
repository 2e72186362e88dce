//! Page fetching. [PageSource] is the seam retrieval depends on;
//! [HttpFetcher] is the async HTTP implementation with a sticky User-Agent.

use crate::model::StoryRequest;
use crate::scraper::error::ScraperError;
use async_trait::async_trait;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// Browser User-Agents one of which is picked per run.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.2478.67",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
];

/// Something that can return the raw markup of one page of a request.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch page `page` (1-based) of `request`. Page 1 is the bare path.
    async fn fetch(&self, request: &StoryRequest, page: u32) -> Result<String, ScraperError>;

    /// Scheme the host is reached over, used when narrating requests.
    fn scheme(&self) -> &str {
        "https"
    }
}

/// URL for page `page` of `request`: bare path for page 1, `page=<n>` query otherwise.
pub fn page_url(scheme: &str, request: &StoryRequest, page: u32) -> String {
    let base = format!("{}://{}{}", scheme, request.host, request.path);
    if page <= 1 {
        base
    } else if request.path.contains('?') {
        format!("{}&page={}", base, page)
    } else {
        format!("{}?page={}", base, page)
    }
}

/// Pick one entry of `pool`. Returns `None` for an empty pool.
pub fn pick_user_agent(pool: &[String]) -> Option<String> {
    if pool.is_empty() {
        return None;
    }
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_usize(pool.len());
    let index = (hasher.finish() % pool.len() as u64) as usize;
    pool.get(index).cloned()
}

/// Async HTTP client. Every request carries the same User-Agent plus the
/// request's own headers (e.g. the classic-layout cookie).
#[derive(Debug)]
pub struct HttpFetcher {
    inner: reqwest::Client,
    scheme: String,
    user_agent: String,
}

impl HttpFetcher {
    /// Client with a User-Agent picked from [USER_AGENTS] and the default timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> HttpFetcherBuilder {
        HttpFetcherBuilder::default()
    }

    /// The User-Agent chosen for this run.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch(&self, request: &StoryRequest, page: u32) -> Result<String, ScraperError> {
        if !request.is_complete() {
            return Err(ScraperError::MalformedRequest { page });
        }
        let url = page_url(&self.scheme, request, page);
        let mut builder = self.inner.get(&url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.send().await.map_err(|e| ScraperError::Network {
            url: url.clone(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }
        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_text_content_type(content_type) {
                return Err(ScraperError::NonTextBody {
                    url,
                    content_type: content_type.to_string(),
                });
            }
        }
        response
            .text()
            .await
            .map_err(|e| ScraperError::BodyRead { source: e })
    }

    fn scheme(&self) -> &str {
        &self.scheme
    }
}

fn is_text_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/") || mime.ends_with("+xml") || mime.ends_with("/xml")
}

/// Builder for HttpFetcher with optional User-Agent, pool, timeout, and scheme.
#[derive(Debug)]
pub struct HttpFetcherBuilder {
    user_agent: Option<String>,
    user_agents: Vec<String>,
    timeout_secs: u64,
    scheme: String,
}

impl Default for HttpFetcherBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            user_agents: USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            scheme: "https".to_string(),
        }
    }
}

impl HttpFetcherBuilder {
    /// Pin the User-Agent instead of picking one from the pool.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Replace the pool the User-Agent is picked from. An empty pool keeps the built-in one.
    pub fn user_agents(mut self, pool: Vec<String>) -> Self {
        if !pool.is_empty() {
            self.user_agents = pool;
        }
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// URL scheme used to reach the host. Default `https`.
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn build(self) -> Result<HttpFetcher, reqwest::Error> {
        let user_agent = self
            .user_agent
            .or_else(|| pick_user_agent(&self.user_agents))
            .unwrap_or_else(|| USER_AGENTS[0].to_string());
        let inner = reqwest::Client::builder()
            .user_agent(user_agent.clone())
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(HttpFetcher {
            inner,
            scheme: self.scheme,
            user_agent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::mpsc;
    use std::thread;

    /// Serve `count` requests, answering each with `status`/`content_type`/body
    /// echoing the request URL, User-Agent and Cookie header.
    fn spawn_server(
        count: usize,
        status: u16,
        content_type: &'static str,
    ) -> (String, mpsc::Receiver<(String, String, String)>, thread::JoinHandle<()>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let host = server.server_addr().to_string();
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            for _ in 0..count {
                let request = match server.recv() {
                    Ok(r) => r,
                    Err(_) => break,
                };
                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv(name))
                        .map(|h| h.value.as_str().to_string())
                        .unwrap_or_default()
                };
                let seen = (request.url().to_string(), header("User-Agent"), header("Cookie"));
                let body = format!("<html><body>{}</body></html>", seen.0);
                let _ = tx.send(seen);
                let content_type =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
                        .expect("valid header");
                let _ = request.respond(
                    tiny_http::Response::from_string(body)
                        .with_status_code(status)
                        .with_header(content_type),
                );
            }
        });
        (host, rx, handle)
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::builder()
            .scheme("http")
            .user_agent("litscrape-test/1.0")
            .timeout_secs(5)
            .build()
            .expect("build client")
    }

    #[test]
    fn page_url_first_and_later_pages() {
        let r = StoryRequest::new("www.literotica.com", "/s/tale");
        assert_eq!(page_url("https", &r, 1), "https://www.literotica.com/s/tale");
        assert_eq!(
            page_url("https", &r, 3),
            "https://www.literotica.com/s/tale?page=3"
        );
        let legacy = StoryRequest::new("literotica.com", "/stories/showstory.php?url=tale");
        assert_eq!(
            page_url("https", &legacy, 2),
            "https://literotica.com/stories/showstory.php?url=tale&page=2"
        );
    }

    #[test]
    fn fetcher_reports_its_scheme() {
        assert_eq!(fetcher().scheme(), "http");
        let default = HttpFetcher::new().expect("build client");
        assert_eq!(default.scheme(), "https");
    }

    #[test]
    fn pick_user_agent_comes_from_pool() {
        let pool = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        for _ in 0..20 {
            let ua = pick_user_agent(&pool).expect("non-empty pool");
            assert!(pool.contains(&ua));
        }
        assert_eq!(pick_user_agent(&[]), None);
    }

    #[test]
    fn built_fetcher_keeps_one_user_agent() {
        let f = HttpFetcher::new().expect("build client");
        assert!(USER_AGENTS.contains(&f.user_agent()));
        let pinned = HttpFetcher::builder()
            .user_agents(vec!["only-one".into()])
            .build()
            .expect("build client");
        assert_eq!(pinned.user_agent(), "only-one");
    }

    #[test]
    fn text_content_types() {
        assert!(is_text_content_type("text/html; charset=utf-8"));
        assert!(is_text_content_type("application/xhtml+xml"));
        assert!(!is_text_content_type("image/png"));
        assert!(!is_text_content_type("application/octet-stream"));
    }

    #[tokio::test]
    async fn fetch_sends_page_query_user_agent_and_headers() {
        let (host, rx, handle) = spawn_server(2, 200, "text/html; charset=utf-8");
        let f = fetcher();
        let mut headers = BTreeMap::new();
        headers.insert("Cookie".to_string(), "enable_classic=1".to_string());
        let request = StoryRequest::new(host, "/s/tale").with_headers(&headers);

        let first = f.fetch(&request, 1).await.expect("page 1");
        assert!(first.contains("/s/tale"));
        let second = f.fetch(&request, 2).await.expect("page 2");
        assert!(second.contains("/s/tale?page=2"));

        let (url, ua, cookie) = rx.recv().expect("first request seen");
        assert_eq!(url, "/s/tale");
        assert_eq!(ua, "litscrape-test/1.0");
        assert_eq!(cookie, "enable_classic=1");
        let (url, ua, _) = rx.recv().expect("second request seen");
        assert_eq!(url, "/s/tale?page=2");
        assert_eq!(ua, "litscrape-test/1.0");
        handle.join().expect("server thread");
    }

    #[tokio::test]
    async fn fetch_reports_http_status() {
        let (host, _rx, handle) = spawn_server(1, 404, "text/html");
        let request = StoryRequest::new(host, "/s/missing");
        match fetcher().fetch(&request, 1).await {
            Err(ScraperError::HttpStatus { status, url }) => {
                assert_eq!(status, 404);
                assert!(url.ends_with("/s/missing"));
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
        handle.join().expect("server thread");
    }

    #[tokio::test]
    async fn fetch_rejects_non_text_body() {
        let (host, _rx, handle) = spawn_server(1, 200, "image/png");
        let request = StoryRequest::new(host, "/s/picture");
        assert!(matches!(
            fetcher().fetch(&request, 1).await,
            Err(ScraperError::NonTextBody { .. })
        ));
        handle.join().expect("server thread");
    }

    #[tokio::test]
    async fn fetch_rejects_incomplete_request() {
        let request = StoryRequest::new("", "/s/tale");
        assert!(matches!(
            fetcher().fetch(&request, 4).await,
            Err(ScraperError::MalformedRequest { page: 4 })
        ));
    }

    #[tokio::test]
    async fn fetch_reports_network_error() {
        // Bind then drop a listener so the port is very likely closed.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .map(|a| a.port())
            .expect("bind ephemeral port");
        let request = StoryRequest::new(format!("127.0.0.1:{port}"), "/s/tale");
        assert!(matches!(
            fetcher().fetch(&request, 1).await,
            Err(ScraperError::Network { .. })
        ));
    }
}
