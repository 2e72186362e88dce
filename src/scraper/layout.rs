//! Layout-specific extraction. The host serves two markups: the classic
//! layout and the modern one. Each implements [Layout]; a story picks one
//! once via [layout_for].

use crate::model::Metadata;
use crate::scraper::canonical::canonicalize;
use crate::scraper::error::ScraperError;
use scraper::{ElementRef, Html, Selector};

/// Parse a CSS selector or return a parse error (avoids panics from Selector::parse).
pub(crate) fn parse_selector(sel: &str) -> Result<Selector, ScraperError> {
    Selector::parse(sel).map_err(|e| ScraperError::Selector {
        selector: sel.to_string(),
        message: e.to_string(),
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Concatenated text of every match, trimmed.
fn all_text(doc: &Html, sel: &str) -> Result<String, ScraperError> {
    let sel = parse_selector(sel)?;
    Ok(doc
        .select(&sel)
        .map(|e| e.text().collect::<String>())
        .collect::<String>()
        .trim()
        .to_string())
}

/// Concatenated outer markup of every match, trimmed.
fn all_html(doc: &Html, sel: &str) -> Result<String, ScraperError> {
    let sel = parse_selector(sel)?;
    Ok(doc
        .select(&sel)
        .map(|e| e.html())
        .collect::<String>()
        .trim()
        .to_string())
}

/// Author name and link from the first author anchor in the modern panels.
fn modern_author(doc: &Html) -> Result<(String, String), ScraperError> {
    let sel = parse_selector(".clearfix.panel.y_eP.y_eQ .y_eS > .y_eU")?;
    Ok(doc
        .select(&sel)
        .next()
        .map(|a| {
            (
                text_of(a),
                a.value().attr("href").unwrap_or("").trim().to_string(),
            )
        })
        .unwrap_or_default())
}

/// Extraction strategy for one page markup.
pub trait Layout: Send + Sync {
    /// Total page count as advertised by the first page. 0 when not found.
    fn count_pages(&self, doc: &Html) -> Result<u32, ScraperError>;

    /// Title, author, and author URL. Missing elements yield empty strings.
    fn extract_metadata(&self, doc: &Html) -> Result<Metadata, ScraperError>;

    /// Raw markup of the story text on this page.
    fn extract_page_content(&self, doc: &Html) -> Result<String, ScraperError>;

    /// "Read more in this series" link, if the layout has one.
    fn discover_series_url(&self, doc: &Html) -> Result<Option<String>, ScraperError>;
}

/// Legacy layout served from the classic subdomain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicLayout;

impl Layout for ClassicLayout {
    fn count_pages(&self, doc: &Html) -> Result<u32, ScraperError> {
        let sel = parse_selector(".b-pager-pages select option")?;
        Ok(doc.select(&sel).count() as u32)
    }

    fn extract_metadata(&self, doc: &Html) -> Result<Metadata, ScraperError> {
        let title = all_text(doc, ".b-story-header h1")?;
        let user_sel = parse_selector(".b-story-user-y")?;
        // Second child element of the user block is the author link.
        let author_el = doc
            .select(&user_sel)
            .next()
            .and_then(|block| block.children().filter_map(ElementRef::wrap).nth(1));
        let (author, author_url) = author_el
            .map(|a| {
                (
                    text_of(a),
                    a.value().attr("href").unwrap_or("").trim().to_string(),
                )
            })
            .unwrap_or_default();
        Ok(Metadata {
            title,
            author,
            author_url,
        })
    }

    fn extract_page_content(&self, doc: &Html) -> Result<String, ScraperError> {
        all_html(doc, ".b-story-body-x p")
    }

    fn discover_series_url(&self, _doc: &Html) -> Result<Option<String>, ScraperError> {
        Ok(None)
    }
}

/// Current layout of the main site.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModernLayout;

impl Layout for ModernLayout {
    fn count_pages(&self, doc: &Html) -> Result<u32, ScraperError> {
        let sel = parse_selector(".l_bH a.l_bJ")?;
        Ok(doc
            .select(&sel)
            .last()
            .and_then(|a| text_of(a).parse::<u32>().ok())
            .unwrap_or(1))
    }

    fn extract_metadata(&self, doc: &Html) -> Result<Metadata, ScraperError> {
        let title = all_text(doc, ".panel.clearfix.j_bl.j_bv h1")?;
        let (author, author_url) = modern_author(doc)?;
        Ok(Metadata {
            title,
            author,
            author_url,
        })
    }

    fn extract_page_content(&self, doc: &Html) -> Result<String, ScraperError> {
        all_html(doc, ".panel.article.aa_eQ .aa_ht > div")
    }

    fn discover_series_url(&self, doc: &Html) -> Result<Option<String>, ScraperError> {
        let panel_sel = parse_selector(".page__aside.page__aside--float .panel.z_r.z_R")?;
        let link_div_sel = parse_selector(".z_S.z_fh")?;
        let anchor_sel = parse_selector("a.z_t")?;
        Ok(doc
            .select(&panel_sel)
            .next()
            .and_then(|panel| panel.select(&link_div_sel).last())
            .and_then(|div| div.select(&anchor_sel).next())
            .and_then(|a| a.value().attr("href"))
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty()))
    }
}

static CLASSIC: ClassicLayout = ClassicLayout;
static MODERN: ModernLayout = ModernLayout;

/// Strategy for a story, chosen once from its layout flag.
pub fn layout_for(classic: bool) -> &'static dyn Layout {
    if classic {
        &CLASSIC
    } else {
        &MODERN
    }
}

/// What one story page yields once parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtract {
    /// Page count as read from this page (only meaningful for page 1).
    pub page_count: u32,
    /// Set for the first page only.
    pub metadata: Option<Metadata>,
    /// Canonical text of this page.
    pub content: String,
    /// Set when series discovery was requested and a link was found.
    pub series_url: Option<String>,
}

/// Which optional pieces to pull out of a page.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractScope {
    pub first_page: bool,
    pub discover_series: bool,
}

/// Parse a page's markup and extract what `scope` asks for.
/// The parsed document is dropped before returning.
pub fn extract_page(
    layout: &dyn Layout,
    markup: &str,
    scope: ExtractScope,
) -> Result<PageExtract, ScraperError> {
    let doc = Html::parse_document(markup);
    let page_count = if scope.first_page {
        layout.count_pages(&doc)?
    } else {
        0
    };
    let metadata = if scope.first_page {
        Some(layout.extract_metadata(&doc)?)
    } else {
        None
    };
    let content = canonicalize(&layout.extract_page_content(&doc)?);
    let series_url = if scope.discover_series {
        layout.discover_series_url(&doc)?
    } else {
        None
    };
    Ok(PageExtract {
        page_count,
        metadata,
        content,
        series_url,
    })
}

/// Series index page: series metadata plus member story links in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesIndex {
    pub metadata: Metadata,
    pub links: Vec<String>,
}

/// Parse a series index page (modern layout only).
pub fn extract_series_index(markup: &str) -> Result<SeriesIndex, ScraperError> {
    let doc = Html::parse_document(markup);
    let metadata = ModernLayout.extract_metadata(&doc)?;
    let link_sel =
        parse_selector(".page__main.page__main-wrapper.clearfix .panel.article.aa_eQ a.br_rj")?;
    let links = doc
        .select(&link_sel)
        .map(|a| a.value().attr("href").unwrap_or("").trim().to_string())
        .collect();
    Ok(SeriesIndex { metadata, links })
}
