//! Test helpers: page markup builders and a scripted [PageSource].

use crate::model::StoryRequest;
use crate::scraper::client::PageSource;
use crate::scraper::error::ScraperError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Barrier;

pub(crate) const HOST: &str = "www.literotica.com";

/// Modern-layout story page with `body` as its text and a pager up to `total_pages`.
pub(crate) fn modern_page(body: &str, total_pages: u32, series_url: Option<&str>) -> String {
    let pager = if total_pages > 1 {
        let anchors: String = (1..=total_pages)
            .map(|n| format!(r#"<a class="l_bJ" href="?page={n}">{n}</a>"#))
            .collect();
        format!(r#"<div class="l_bH">{anchors}</div>"#)
    } else {
        String::new()
    };
    let aside = series_url
        .map(|url| {
            format!(
                r#"<div class="page__aside page__aside--float"><div class="panel z_r z_R"><div class="z_S z_fh"><span>Previous</span></div><div class="z_S z_fh"><a class="z_t" href="{url}">Read more</a></div></div></div>"#
            )
        })
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html><html><head><title>t</title></head><body>
<div class="panel clearfix j_bl j_bv"><h1>Modern Title</h1></div>
<div class="clearfix panel y_eP y_eQ"><div class="y_eS"><a class="y_eU" href="https://www.literotica.com/authors/bob/works/stories">Bob</a></div></div>
<div class="panel article aa_eQ"><div class="aa_ht"><div><p>{body}</p><script>track()</script></div></div></div>
{pager}
{aside}
</body></html>"#
    )
}

/// Classic-layout story page with `body` as its text and `total_pages` pager options.
pub(crate) fn classic_page(body: &str, total_pages: u32) -> String {
    let options: String = (1..=total_pages)
        .map(|n| format!("<option value=\"{n}\">{n}</option>"))
        .collect();
    format!(
        r#"<!DOCTYPE html><html><body>
<div class="b-story-header"><h1>Classic Title</h1></div>
<div class="b-story-user-y"><a href="https://www.literotica.com/stories/memberpage.php?uid=1"><img src="a.png"/></a><a href="https://www.literotica.com/stories/memberpage.php?uid=1">Alice</a></div>
<div class="b-story-body-x"><div><p>{body}</p><p>A second paragraph.</p></div></div>
<div class="b-pager-pages"><form><select name="page">{options}</select></form></div>
</body></html>"#
    )
}

/// Series index page listing `paths` (each prefixed with the host).
pub(crate) fn series_index_page(paths: &[&str]) -> String {
    let items: String = paths
        .iter()
        .map(|p| format!(r#"<li><a class="br_rj" href=" https://{HOST}{p} ">{p}</a></li>"#))
        .collect();
    format!(
        r#"<!DOCTYPE html><html><body>
<div class="panel clearfix j_bl j_bv"><h1>Series Title</h1></div>
<div class="clearfix panel y_eP y_eQ"><div class="y_eS"><a class="y_eU" href="https://www.literotica.com/authors/bob/works/stories">Bob</a></div></div>
<div class="page__main page__main-wrapper clearfix"><div class="panel article aa_eQ"><ul>{items}</ul></div></div>
</body></html>"#
    )
}

/// Scripted page source. Unknown (path, page) pairs answer HTTP 404.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    pages: HashMap<(String, u32), String>,
    delays: HashMap<String, Duration>,
    fan_out_barrier: Option<Barrier>,
    scheme: Option<String>,
    log: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, path: &str, page: u32, markup: String) -> Self {
        self.pages.insert((path.to_string(), page), markup);
        self
    }

    /// Sleep this long before answering any page of `path`.
    pub(crate) fn delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_string(), delay);
        self
    }

    /// Requests for pages >= 2 wait until `n` of them are in flight.
    pub(crate) fn fan_out_barrier(mut self, n: usize) -> Self {
        self.fan_out_barrier = Some(Barrier::new(n));
        self
    }

    /// Scheme reported to callers instead of `https`.
    pub(crate) fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = Some(scheme.to_string());
        self
    }

    /// `start:<path>:<page>` / `end:<path>:<page>` entries in call order.
    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub(crate) fn requests(&self) -> usize {
        self.log().iter().filter(|e| e.starts_with("start:")).count()
    }

    fn record(&self, entry: String) {
        if let Ok(mut log) = self.log.lock() {
            log.push(entry);
        }
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch(&self, request: &StoryRequest, page: u32) -> Result<String, ScraperError> {
        if !request.is_complete() {
            return Err(ScraperError::MalformedRequest { page });
        }
        self.record(format!("start:{}:{}", request.path, page));
        if page >= 2 {
            if let Some(ref barrier) = self.fan_out_barrier {
                barrier.wait().await;
            }
        }
        if let Some(delay) = self.delays.get(&request.path) {
            tokio::time::sleep(*delay).await;
        }
        let result = self
            .pages
            .get(&(request.path.clone(), page))
            .cloned()
            .ok_or_else(|| ScraperError::HttpStatus {
                status: 404,
                url: format!("https://{}{}?page={}", request.host, request.path, page),
            });
        self.record(format!("end:{}:{}", request.path, page));
        result
    }

    fn scheme(&self) -> &str {
        self.scheme.as_deref().unwrap_or("https")
    }
}
