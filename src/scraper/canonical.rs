//! Sanitize extracted fragments and convert them to and from canonical text
//! (the Markdown-like form every page is stored in).

use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::sync::OnceLock;

/// Elements removed together with their content.
const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "form", "template", "svg",
    "math", "frameset", "frame", "applet",
];

/// Void or unpaired elements removed wherever they appear.
const STRIPPED_VOID_TAGS: &[&str] = &[
    "link", "meta", "base", "input", "button", "textarea", "select",
];

const ZERO_WIDTH: &[char] = &[
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{200E}', '\u{200F}', '\u{FEFF}',
];

fn stripped_tag_regexes() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        let mut out = Vec::new();
        for tag in STRIPPED_TAGS {
            let pattern = format!(r"(?is)<{0}\b[^>]*>.*?</{0}\s*>|<{0}\b[^>]*/?>", tag);
            if let Ok(re) = Regex::new(&pattern) {
                out.push(re);
            }
        }
        for tag in STRIPPED_VOID_TAGS {
            let pattern = format!(r"(?is)</?{0}\b[^>]*>", tag);
            if let Ok(re) = Regex::new(&pattern) {
                out.push(re);
            }
        }
        out
    })
}

fn event_handler_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
            .expect("event handler pattern is valid")
    })
}

fn script_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\s+(href|src|action|formaction)\s*=\s*("\s*javascript:[^"]*"|'\s*javascript:[^']*'|javascript:[^\s>]+)"#)
            .expect("script URL pattern is valid")
    })
}

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"))
}

/// Remove active and embedded content: scripts, styles, frames, forms,
/// comments, inline event handlers, and `javascript:` URLs.
pub fn sanitize(markup: &str) -> String {
    let mut result = comment_regex().replace_all(markup, "").into_owned();
    for re in stripped_tag_regexes() {
        result = re.replace_all(&result, "").into_owned();
    }
    result = event_handler_regex().replace_all(&result, "").into_owned();
    result = script_url_regex().replace_all(&result, "").into_owned();
    result
}

/// Drop one leading zero-width or byte-order-mark character, if present.
pub fn strip_leading_zero_width(s: &str) -> &str {
    match s.chars().next() {
        Some(c) if ZERO_WIDTH.contains(&c) => &s[c.len_utf8()..],
        _ => s,
    }
}

/// Fragment markup to canonical text.
pub fn canonicalize(fragment: &str) -> String {
    let fragment = strip_leading_zero_width(fragment.trim_start());
    let clean = sanitize(fragment);
    html2md::parse_html(clean.trim()).trim().to_string()
}

/// Canonical text back to markup.
pub fn from_canonical(canonical: &str) -> String {
    let parser = Parser::new_ext(canonical, Options::empty());
    let mut out = String::with_capacity(canonical.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
