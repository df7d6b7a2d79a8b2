//! XLSX shared strings table (`xl/sharedStrings.xml`).

use crate::error::{Error, Result};
use crate::xml::{self, ElementSpan};

/// Append-only editor over the text of a shared strings part.
///
/// Entries are never looked up or deduplicated: every [`intern`] call adds
/// a new `<si>` and returns its index.
///
/// [`intern`]: SharedStringTable::intern
#[derive(Debug, Clone)]
pub struct SharedStringTable {
    xml: String,
    root: ElementSpan,
    len: usize,
}

impl SharedStringTable {
    /// Wrap shared strings XML content.
    pub fn new(xml: impl Into<String>) -> Result<Self> {
        let xml = xml.into();
        let root = xml::find_element(&xml, b"sst")?
            .ok_or_else(|| Error::malformed("sharedStrings", "no <sst> root element"))?;
        let len = xml::child_elements(&xml, &root, b"si")?.len();

        Ok(Self { xml, root, len })
    }

    /// Append `text` as a new entry and return its index.
    ///
    /// Both `count` and `uniqueCount` on the root are incremented.
    pub fn intern(&mut self, text: &str) -> Result<u32> {
        let index = u32::try_from(self.len)
            .map_err(|_| Error::malformed("sharedStrings", "too many entries"))?;

        xml::expand_empty(&mut self.xml, &mut self.root);

        let prefix = self.root.prefix();
        let si = xml::qualify(prefix, "si");
        let t = xml::qualify(prefix, "t");
        let space = if needs_space_preserve(text) {
            " xml:space=\"preserve\""
        } else {
            ""
        };
        let entry = format!(
            "<{si}><{t}{space}>{text}</{t}></{si}>",
            si = si,
            t = t,
            space = space,
            text = quick_xml::escape::escape(text)
        );

        let at = self
            .root
            .close_start
            .ok_or_else(|| Error::malformed("sharedStrings", "unterminated <sst> element"))?;
        xml::insert(&mut self.xml, &mut self.root, at, &entry);

        let total = index + 1;
        xml::bump_count(&mut self.xml, &mut self.root, "count", 1, total);
        xml::bump_count(&mut self.xml, &mut self.root, "uniqueCount", 1, total);
        self.len += 1;

        log::debug!("interned shared string #{} ({} bytes)", index, text.len());
        Ok(index)
    }

    /// Number of `<si>` entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Declared `count` header, if present.
    pub fn count(&self) -> Option<u32> {
        self.root.attribute_u32(&self.xml, "count")
    }

    /// Declared `uniqueCount` header, if present.
    pub fn unique_count(&self) -> Option<u32> {
        self.root.attribute_u32(&self.xml, "uniqueCount")
    }

    /// Current XML text.
    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Consume the table and return its XML text.
    pub fn into_inner(self) -> String {
        self.xml
    }
}

fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}
