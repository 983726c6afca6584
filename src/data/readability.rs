//! Main-content extraction.
//!
//! The `readability` crate picks the dominant content block of a page and
//! renders it as text. When it fails or finds nothing, the text of
//! `<article>`, `<main>` or `<body>` is used instead, with scripts,
//! navigation and other chrome skipped.

use readability::extractor;
use scraper::{ElementRef, Html, Node};
use std::io::Cursor;
use tracing::debug;
use url::Url;

/// Subtrees that never hold article text.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form",
    "iframe", "svg", "button", "select", "template",
];

/// Elements rendered on their own line.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "td",
    "th", "article", "section", "main", "blockquote", "pre", "dt", "dd",
];

/// Extract the main readable text of an HTML document fetched from `url`.
///
/// Returns an empty string when the page has no text at all.
pub fn extract_main_text(html: &str, url: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    if let Ok(base) = Url::parse(url) {
        let mut reader = Cursor::new(html.as_bytes());
        match extractor::extract(&mut reader, &base) {
            Ok(product) => {
                let text = collapse_whitespace(&product.text);
                if !text.is_empty() {
                    return text;
                }
                debug!(url, "Readability found no content, using page text");
            }
            Err(e) => debug!(url, error = ?e, "Readability failed, using page text"),
        }
    }
    fallback_text(&Html::parse_document(html))
}

/// Text of `<article>`, `<main>` or `<body>`, whichever has any.
fn fallback_text(doc: &Html) -> String {
    for tag in ["article", "main", "body"] {
        let found = doc
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == tag);
        if let Some(el) = found {
            let text = render_text(el);
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// Plain-text rendering with one line per block and collapsed whitespace.
pub fn render_text(el: ElementRef<'_>) -> String {
    let mut buf = String::new();
    collect_text(el, &mut buf);
    collapse_whitespace(&buf)
}

fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(el: ElementRef<'_>, buf: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => buf.push_str(text),
            Node::Element(e) => {
                let name = e.name();
                if SKIP_TAGS.contains(&name) {
                    continue;
                }
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    buf.push('\n');
                }
                collect_text(child_el, buf);
                if block {
                    buf.push('\n');
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
