//! Output formats: assemble canonical pages into HTML, plain text, or
//! Markdown, and wrap the result in a per-format document.

use crate::scraper::canonical::from_canonical;
use crate::scraper::{Document, SeriesDocument, StoryDocument};
use regex::{Captures, Regex};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Output format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Html,
    Txt,
    Md,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Txt => "txt",
            OutputFormat::Md => "md",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = crate::ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(OutputFormat::Html),
            "txt" => Ok(OutputFormat::Txt),
            "md" => Ok(OutputFormat::Md),
            _ => Err(crate::ScraperError::UnknownFormat(s.to_string())),
        }
    }
}

/// Assembly switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Insert a "Page N:" label and dash rule before every page after the first.
    pub page_indicator: bool,
    /// HTML only: separate with plain paragraph boundaries instead of `<br />`.
    pub no_paragraph_break: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_indicator: true,
            no_paragraph_break: false,
        }
    }
}

const PAGE_RULE_WIDTH: usize = 10;

/// Separator placed between chunks.
pub fn separator(format: OutputFormat, options: RenderOptions) -> &'static str {
    match format {
        OutputFormat::Html if !options.no_paragraph_break => "<br />",
        _ => "\n",
    }
}

/// Dash rule as long as `title`, used under titles in text formats.
pub fn post_title(format: OutputFormat, title: &str) -> String {
    match format {
        OutputFormat::Html => String::new(),
        _ => "-".repeat(title.chars().count()),
    }
}

pub(crate) fn html_escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_page(format: OutputFormat, canonical: &str) -> String {
    match format {
        OutputFormat::Html => from_canonical(canonical),
        OutputFormat::Txt | OutputFormat::Md => canonical.to_string(),
    }
}

/// Render one story's pages. An empty slot renders as an empty chunk.
/// `within_series` prepends the story title as a heading.
pub fn render_story(
    story: &StoryDocument,
    format: OutputFormat,
    options: RenderOptions,
    within_series: bool,
) -> String {
    let sep = separator(format, options);
    let mut chunks: Vec<String> = Vec::new();
    for (i, page) in story.pages().iter().enumerate() {
        let rendered = render_page(format, page.as_deref().unwrap_or(""));
        if i > 0 {
            chunks.push(String::new());
            if options.page_indicator {
                chunks.push(format!("Page {}:", i + 1));
                chunks.push("-".repeat(PAGE_RULE_WIDTH));
                chunks.push(String::new());
            }
        }
        chunks.push(rendered);
    }
    let joined = chunks.join(sep);
    let content = if format == OutputFormat::Html && !options.no_paragraph_break {
        joined.replace(['\r', '\n'], sep)
    } else {
        joined
    };

    if !within_series {
        return content;
    }
    let header = match format {
        OutputFormat::Html => format!("<h2>{}</h2>", html_escape_attr(story.title())),
        OutputFormat::Md => format!("## {}", story.title()),
        OutputFormat::Txt => format!("{}\n{}", story.title(), post_title(format, story.title())),
    };
    [header, content].join(&format!("{sep}{sep}"))
}

/// Render every story of a series, in list order.
pub fn render_series(
    series: &SeriesDocument,
    format: OutputFormat,
    options: RenderOptions,
) -> String {
    let sep = separator(format, options);
    series
        .stories()
        .iter()
        .map(|story| render_story(story, format, options, true))
        .collect::<Vec<_>>()
        .join(&format!("{sep}{sep}"))
}

/// Assembled content of a story or series.
pub fn render_content(document: &Document, format: OutputFormat, options: RenderOptions) -> String {
    match document {
        Document::Story(story) => render_story(story, format, options, false),
        Document::Series(series) => render_series(series, format, options),
    }
}

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8"/>
  <title>%title%</title>
</head>
<body>
  <header>
    <h1>%title%</h1>
    <p class="author">By <a href="%authorurl%">%author%</a></p>
    <p class="source"><a href="%storyurl%">%storyurl%</a></p>
  </header>
  <article>
%content%
  </article>
</body>
</html>
"#;

const TXT_TEMPLATE: &str = "%title%
%posttitle%
By %author% (%authorurl%)
Source: %storyurl%

%content%
";

const MD_TEMPLATE: &str = "# %title%

By [%author%](%authorurl%)

Source: <%storyurl%>

%content%
";

fn template_for(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Html => HTML_TEMPLATE,
        OutputFormat::Txt => TXT_TEMPLATE,
        OutputFormat::Md => MD_TEMPLATE,
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"%(title|posttitle|author|authorurl|content|postcontent|storyurl)%")
            .expect("placeholder pattern is valid")
    })
}

/// Values substituted into a document template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFields {
    pub title: String,
    pub author: String,
    pub author_url: String,
    pub story_url: String,
    pub content: String,
}

/// Fill `template` in one pass so placeholder text inside values is left as is.
pub fn fill_template(template: &str, format: OutputFormat, fields: &DocumentFields) -> String {
    let escape = |s: &str| match format {
        OutputFormat::Html => html_escape_attr(s),
        _ => s.to_string(),
    };
    placeholder_regex()
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "title" => escape(&fields.title),
            "posttitle" | "postcontent" => post_title(format, &fields.title),
            "author" => escape(&fields.author),
            "authorurl" => escape(&fields.author_url),
            "storyurl" => escape(&fields.story_url),
            "content" => fields.content.clone(),
            _ => String::new(),
        })
        .into_owned()
}

/// Title, author, and URLs describing the whole document. A series falls
/// back to its first story for any field it could not read.
pub fn document_fields(document: &Document) -> DocumentFields {
    match document {
        Document::Story(story) => DocumentFields {
            title: story.title().to_string(),
            author: story.author().to_string(),
            author_url: story.author_url().to_string(),
            story_url: story.source_url.clone(),
            content: String::new(),
        },
        Document::Series(series) => {
            let first = series.stories().first();
            let pick = |own: &str, from_story: fn(&StoryDocument) -> &str| {
                if own.is_empty() {
                    first.map(from_story).unwrap_or("").to_string()
                } else {
                    own.to_string()
                }
            };
            DocumentFields {
                title: pick(series.title(), StoryDocument::title),
                author: pick(series.author(), StoryDocument::author),
                author_url: pick(series.author_url(), StoryDocument::author_url),
                story_url: series.series_url.clone(),
                content: String::new(),
            }
        }
    }
}

/// Complete output text: assembled content wrapped in the format's template.
pub fn render_document(
    document: &Document,
    format: OutputFormat,
    options: RenderOptions,
) -> String {
    let mut fields = document_fields(document);
    fields.content = render_content(document, format, options);
    fill_template(template_for(format), format, &fields)
}
