//! Byte-span helpers for editing XML text in place.
//!
//! quick-xml is only used as a tokenizer here: it tells us where elements
//! start and end, and every edit is a splice on the original text. Nothing
//! is ever re-serialized, so bytes outside the spliced ranges survive
//! untouched (comments, unknown attributes, whitespace, quoting style).

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::ops::Range;

/// Location of one element inside a document.
///
/// All offsets are absolute byte positions into the text that was scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElementSpan {
    /// Qualified element name as written (e.g. `row` or `x:row`)
    pub name: String,
    /// Position of the `<` opening the start tag
    pub start: usize,
    /// Position just past the `>` closing the start tag
    pub start_tag_end: usize,
    /// Position of the `<` opening the end tag; `None` for `<name/>`
    pub close_start: Option<usize>,
    /// Position just past the element
    pub end: usize,
}

impl ElementSpan {
    /// Whole element, start tag through end tag.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The start tag text, `<` through `>`.
    pub fn start_tag<'a>(&self, xml: &'a str) -> &'a str {
        &xml[self.start..self.start_tag_end]
    }

    /// Namespace prefix of the element name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Value of an attribute on the start tag.
    pub fn attribute<'a>(&self, xml: &'a str, name: &str) -> Option<&'a str> {
        attribute(self.start_tag(xml), name)
    }

    /// Attribute parsed as an unsigned integer.
    pub fn attribute_u32(&self, xml: &str, name: &str) -> Option<u32> {
        self.attribute(xml, name)
            .and_then(|v| v.trim().parse::<u32>().ok())
    }
}

fn matches_local(e: &BytesStart<'_>, local: &[u8]) -> bool {
    e.local_name().as_ref() == local
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Find the first element with the given local name, at any depth.
///
/// `base` is added to every reported offset so callers can scan a slice
/// of a larger document.
pub(crate) fn find_element_at(xml: &str, base: usize, local: &[u8]) -> Result<Option<ElementSpan>> {
    let mut reader = Reader::from_str(xml);
    let mut open: Option<(ElementSpan, usize)> = None;
    let mut depth = 0usize;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(ref e) => {
                if open.is_none() && matches_local(e, local) {
                    open = Some((
                        ElementSpan {
                            name: qualified_name(e),
                            start: base + before,
                            start_tag_end: base + after,
                            close_start: None,
                            end: base + after,
                        },
                        depth,
                    ));
                }
                depth += 1;
            }
            Event::Empty(ref e) => {
                if open.is_none() && matches_local(e, local) {
                    return Ok(Some(ElementSpan {
                        name: qualified_name(e),
                        start: base + before,
                        start_tag_end: base + after,
                        close_start: None,
                        end: base + after,
                    }));
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if let Some((mut span, open_depth)) = open.take() {
                    if depth == open_depth {
                        span.close_start = Some(base + before);
                        span.end = base + after;
                        log::trace!(
                            "located <{}> at {}..{}",
                            span.name,
                            span.start,
                            span.end
                        );
                        return Ok(Some(span));
                    }
                    open = Some((span, open_depth));
                }
            }
            Event::Eof => {
                return match open {
                    Some((span, _)) => Err(Error::XmlParse(format!(
                        "unterminated <{}> element",
                        span.name
                    ))),
                    None => Ok(None),
                };
            }
            _ => {}
        }
    }
}

/// Find the first element with the given local name, at any depth.
pub(crate) fn find_element(xml: &str, local: &[u8]) -> Result<Option<ElementSpan>> {
    find_element_at(xml, 0, local)
}

/// Direct children of `parent` with the given local name, in document order.
pub(crate) fn child_elements(xml: &str, parent: &ElementSpan, local: &[u8]) -> Result<Vec<ElementSpan>> {
    let Some(close) = parent.close_start else {
        return Ok(Vec::new());
    };

    let base = parent.start_tag_end;
    let mut reader = Reader::from_str(&xml[base..close]);
    let mut children = Vec::new();
    let mut open: Option<ElementSpan> = None;
    let mut depth = 0usize;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(ref e) => {
                if depth == 0 && matches_local(e, local) {
                    open = Some(ElementSpan {
                        name: qualified_name(e),
                        start: base + before,
                        start_tag_end: base + after,
                        close_start: None,
                        end: base + after,
                    });
                }
                depth += 1;
            }
            Event::Empty(ref e) => {
                if depth == 0 && matches_local(e, local) {
                    children.push(ElementSpan {
                        name: qualified_name(e),
                        start: base + before,
                        start_tag_end: base + after,
                        close_start: None,
                        end: base + after,
                    });
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(mut span) = open.take() {
                        span.close_start = Some(base + before);
                        span.end = base + after;
                        children.push(span);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(children)
}

/// Name/value byte ranges of every attribute in a start tag.
fn attribute_spans(tag: &str) -> Vec<(Range<usize>, Range<usize>)> {
    let bytes = tag.as_bytes();
    let mut spans = Vec::new();
    let mut pos = 1;

    // Skip the element name.
    while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>' && bytes[pos] != b'/' {
        pos += 1;
    }

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] == b'>' || bytes[pos] == b'/' {
            break;
        }

        let name_start = pos;
        while pos < bytes.len()
            && bytes[pos] != b'='
            && !bytes[pos].is_ascii_whitespace()
            && bytes[pos] != b'>'
            && bytes[pos] != b'/'
        {
            pos += 1;
        }
        let name_end = pos;

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] != b'=' {
            break;
        }
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() || (bytes[pos] != b'"' && bytes[pos] != b'\'') {
            break;
        }

        let quote = bytes[pos];
        pos += 1;
        let value_start = pos;
        while pos < bytes.len() && bytes[pos] != quote {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        spans.push((name_start..name_end, value_start..pos));
        pos += 1;
    }

    spans
}

/// Raw (still escaped) value of an attribute in a start tag.
pub(crate) fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    attribute_spans(tag)
        .into_iter()
        .find(|(n, _)| &tag[n.clone()] == name)
        .map(|(_, v)| &tag[v])
}

/// Position where a new attribute can be inserted: before `>` or `/>`,
/// ahead of any whitespace that precedes them.
fn attribute_insert_point(tag: &str) -> usize {
    let mut pos = tag.len().saturating_sub(1);
    if tag[..pos].ends_with('/') {
        pos -= 1;
    }
    while pos > 0 && tag.as_bytes()[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    pos
}

/// Return `tag` with `name` set to `value`, replacing it in place if present.
pub(crate) fn set_attribute(tag: &str, name: &str, value: &str) -> String {
    match attribute_spans(tag)
        .into_iter()
        .find(|(n, _)| &tag[n.clone()] == name)
    {
        Some((_, v)) => format!("{}{}{}", &tag[..v.start], value, &tag[v.end..]),
        None => {
            let at = attribute_insert_point(tag);
            format!("{} {}=\"{}\"{}", &tag[..at], name, value, &tag[at..])
        }
    }
}

/// Turn a self-closing tag (`<row r="5"/>`) into an opening tag (`<row r="5">`).
pub(crate) fn open_tag(tag: &str) -> String {
    let at = attribute_insert_point(tag);
    format!("{}>", &tag[..at])
}

/// Qualify a local name with an optional namespace prefix.
pub(crate) fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

/// Make sure `span` has a separate end tag, expanding `<name .../>` if needed.
///
/// Returns the byte delta applied to the document.
pub(crate) fn expand_empty(xml: &mut String, span: &mut ElementSpan) -> isize {
    if span.close_start.is_some() {
        return 0;
    }
    let open = open_tag(span.start_tag(xml));
    let close = format!("</{}>", span.name);
    let old_len = span.end - span.start;
    let replacement = format!("{}{}", open, close);
    xml.replace_range(span.range(), &replacement);

    span.start_tag_end = span.start + open.len();
    span.close_start = Some(span.start_tag_end);
    span.end = span.start + replacement.len();
    replacement.len() as isize - old_len as isize
}

/// Rewrite a count-style attribute on `span`'s start tag.
///
/// The declared value is incremented by `by`; when absent it is set to
/// `fallback`.
pub(crate) fn bump_count(xml: &mut String, span: &mut ElementSpan, attr: &str, by: u32, fallback: u32) {
    let tag = span.start_tag(xml);
    let value = attribute(tag, attr)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .map(|n| n.saturating_add(by))
        .unwrap_or(fallback);
    let new_tag = set_attribute(tag, attr, &value.to_string());
    let delta = new_tag.len() as isize - (span.start_tag_end - span.start) as isize;
    xml.replace_range(span.start..span.start_tag_end, &new_tag);

    span.start_tag_end = span.start + new_tag.len();
    if let Some(close) = span.close_start.as_mut() {
        *close = close.saturating_add_signed(delta);
    }
    span.end = span.end.saturating_add_signed(delta);
}

/// Insert `text` into the content of `span` at `at`.
///
/// `at` must lie between the end of the start tag and the start of the
/// end tag; the end tag moves right by the inserted length.
pub(crate) fn insert(xml: &mut String, span: &mut ElementSpan, at: usize, text: &str) {
    debug_assert!(at >= span.start_tag_end && Some(at) <= span.close_start);
    xml.insert_str(at, text);
    if let Some(close) = span.close_start.as_mut() {
        *close += text.len();
    }
    span.end += text.len();
}
