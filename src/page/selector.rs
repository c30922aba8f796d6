//! CSS selector evaluation for snapshots.
//!
//! A snapshot is mirrored into an HTML document in which every element carries
//! its arena index, and queries run through `scraper`. Matches are mapped back
//! to [`ElementId`]s by that index.

use scraper::{Html, Selector};
use std::fmt::Write as _;
use std::sync::Mutex;

use super::types::ElementId;
use crate::error::{Result, ScrapeError};

/// Attribute carrying the arena index of a mirrored element
pub const SNAPSHOT_ID_ATTR: &str = "data-snapshot-id";

/// Elements that never have an end tag in HTML
const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScrapeError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Parsed mirror of a snapshot, queried under a lock.
///
/// `scraper::Html` is `Send` but not `Sync`, so concurrent readers take turns.
/// Selection is synchronous and never held across an await.
pub struct SelectorIndex {
    document: Mutex<Html>,
}

impl SelectorIndex {
    pub fn from_markup(markup: &str) -> Self {
        Self {
            document: Mutex::new(Html::parse_document(markup)),
        }
    }

    /// Arena ids of every mirrored element matching `selector`, in mirror order
    pub fn select(&self, selector: &str) -> Result<Vec<ElementId>> {
        let parsed = parse_selector(selector)?;
        let document = self
            .document
            .lock()
            .map_err(|_| ScrapeError::Adapter("selector index lock poisoned".to_string()))?;
        Ok(document
            .select(&parsed)
            .filter_map(|el| el.value().attr(SNAPSHOT_ID_ATTR))
            .filter_map(|raw| raw.parse::<usize>().ok())
            .map(ElementId)
            .collect())
    }
}

/// Serializes snapshot elements into HTML for [`SelectorIndex`]
#[derive(Default)]
pub struct MarkupWriter {
    out: String,
}

impl MarkupWriter {
    pub fn open<'a>(
        &mut self,
        id: ElementId,
        tag: &str,
        attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let _ = write!(self.out, "<{} {}=\"{}\"", tag, SNAPSHOT_ID_ATTR, id.0);
        for (name, value) in attributes {
            if name == SNAPSHOT_ID_ATTR || !is_attribute_name(name) {
                continue;
            }
            let _ = write!(self.out, " {}=\"", name);
            escape_into(&mut self.out, value, true);
            self.out.push('"');
        }
        self.out.push('>');
    }

    pub fn text(&mut self, text: &str) {
        escape_into(&mut self.out, text, false);
    }

    pub fn close(&mut self, tag: &str) {
        if !VOID_TAGS.contains(&tag) {
            let _ = write!(self.out, "</{}>", tag);
        }
    }

    pub fn finish(self) -> String {
        self.out
    }
}

fn is_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '<' | '>' | '/' | '='))
}

fn escape_into(out: &mut String, raw: &str, in_attribute: bool) {
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Escape a class name or id for use as a CSS identifier (`CSS.escape`)
pub fn escape_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let chars: Vec<char> = name.chars().collect();
    if chars == ['-'] {
        return "\\-".to_string();
    }
    for (i, &c) in chars.iter().enumerate() {
        let leading_digit =
            c.is_ascii_digit() && (i == 0 || (i == 1 && chars[0] == '-'));
        match c {
            '\0' => out.push('\u{FFFD}'),
            c if c.is_ascii_control() || leading_digit => {
                let _ = write!(out, "\\{:x} ", c as u32);
            }
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(markup: &str) -> SelectorIndex {
        SelectorIndex::from_markup(markup)
    }

    #[test]
    fn test_escape_ident() {
        assert_eq!(escape_ident("card"), "card");
        assert_eq!(escape_ident("-card_2"), "-card_2");
        assert_eq!(escape_ident("md:flex"), "md\\:flex");
        assert_eq!(escape_ident("w-1/2"), "w-1\\/2");
        assert_eq!(escape_ident("2col"), "\\32 col");
        assert_eq!(escape_ident("-"), "\\-");
    }

    #[test]
    fn test_escaped_class_selects() {
        let idx = index(
            r#"<div data-snapshot-id="0" class="md:flex w-1/2"></div><div data-snapshot-id="1" class="md"></div>"#,
        );
        let selector = format!(".{}.{}", escape_ident("md:flex"), escape_ident("w-1/2"));
        assert_eq!(idx.select(&selector).unwrap(), vec![ElementId(0)]);
    }

    #[test]
    fn test_writer_escapes_and_skips_void_close() {
        let mut w = MarkupWriter::default();
        w.open(ElementId(3), "a", [("href", "/a?x=1&y=\"2\""), ("bad name", "x")]);
        w.text("1 < 2");
        w.open(ElementId(4), "img", [("src", "p.png")]);
        w.close("img");
        w.close("a");
        assert_eq!(
            w.finish(),
            r#"<a data-snapshot-id="3" href="/a?x=1&amp;y=&quot;2&quot;">1 &lt; 2<img data-snapshot-id="4" src="p.png"></a>"#
        );
    }

    #[test]
    fn test_invalid_selector_is_error() {
        let idx = index("<p data-snapshot-id=\"0\"></p>");
        let err = idx.select("div[").unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidSelector { .. }));
    }
}
