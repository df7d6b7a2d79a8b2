//! XLSX style table (`xl/styles.xml`): solid fills and cell formats.

use crate::error::{Error, Result};
use crate::xml::{self, ElementSpan};

/// Editor over the text of a styles part.
#[derive(Debug, Clone)]
pub struct StyleTable {
    xml: String,
}

/// Normalize a fill color to 6 upper-case hex digits without `#`.
///
/// ```
/// use sheetpatch::xlsx::normalize_color;
///
/// assert_eq!(normalize_color("#ffff00").unwrap(), "FFFF00");
/// assert!(normalize_color("yellow").is_err());
/// ```
pub fn normalize_color(color: &str) -> Result<String> {
    let hex = color.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidColor(color.to_string()));
    }
    Ok(hex.to_ascii_uppercase())
}

impl StyleTable {
    /// Wrap styles XML content.
    pub fn new(xml: impl Into<String>) -> Result<Self> {
        let table = Self { xml: xml.into() };
        table.section(b"fills")?;
        table.section(b"cellXfs")?;
        Ok(table)
    }

    fn section(&self, local: &[u8]) -> Result<ElementSpan> {
        xml::find_element(&self.xml, local)?.ok_or_else(|| {
            Error::malformed(
                "styles",
                format!("no <{}> element", String::from_utf8_lossy(local)),
            )
        })
    }

    /// Resolve a cell format index that applies a solid fill of `color`.
    ///
    /// The fill record is shared by every format asking for the same color.
    /// A new `<xf>` is appended on every call.
    pub fn ensure_fill(&mut self, color: &str) -> Result<u32> {
        let hex = normalize_color(color)?;
        let fill_id = match self.find_solid_fill(&hex)? {
            Some(index) => {
                log::debug!("reusing fill #{} for {}", index, hex);
                index
            }
            None => self.append_fill(&hex)?,
        };
        self.append_format(fill_id)
    }

    /// Index of an existing solid fill whose foreground is `hex`.
    fn find_solid_fill(&self, hex: &str) -> Result<Option<u32>> {
        let fills = self.section(b"fills")?;
        for (index, fill) in xml::child_elements(&self.xml, &fills, b"fill")?
            .iter()
            .enumerate()
        {
            if self.is_solid_fill_of(fill, hex)? {
                return Ok(Some(index as u32));
            }
        }
        Ok(None)
    }

    fn is_solid_fill_of(&self, fill: &ElementSpan, hex: &str) -> Result<bool> {
        let body = &self.xml[fill.range()];
        let Some(pattern) = xml::find_element_at(body, 0, b"patternFill")? else {
            return Ok(false);
        };
        if pattern.attribute(body, "patternType") != Some("solid") {
            return Ok(false);
        }
        let Some(fg) = xml::find_element_at(&body[pattern.range()], 0, b"fgColor")? else {
            return Ok(false);
        };
        let fg_tag = fg.start_tag(&body[pattern.range()]);
        Ok(xml::attribute(fg_tag, "rgb").is_some_and(|rgb| rgb_matches(rgb, hex)))
    }

    fn append_fill(&mut self, hex: &str) -> Result<u32> {
        let mut fills = self.section(b"fills")?;
        let index = xml::child_elements(&self.xml, &fills, b"fill")?.len() as u32;

        xml::expand_empty(&mut self.xml, &mut fills);
        let prefix = fills.prefix();
        let record = format!(
            "<{fill}><{pf} patternType=\"solid\"><{fg} rgb=\"FF{hex}\"/><{bg} indexed=\"64\"/></{pf}></{fill}>",
            fill = xml::qualify(prefix, "fill"),
            pf = xml::qualify(prefix, "patternFill"),
            fg = xml::qualify(prefix, "fgColor"),
            bg = xml::qualify(prefix, "bgColor"),
            hex = hex,
        );
        let at = fills
            .close_start
            .ok_or_else(|| Error::malformed("styles", "unterminated <fills> element"))?;
        xml::insert(&mut self.xml, &mut fills, at, &record);
        xml::bump_count(&mut self.xml, &mut fills, "count", 1, index + 1);

        log::debug!("appended fill #{} for {}", index, hex);
        Ok(index)
    }

    fn append_format(&mut self, fill_id: u32) -> Result<u32> {
        let mut xfs = self.section(b"cellXfs")?;
        let index = xml::child_elements(&self.xml, &xfs, b"xf")?.len() as u32;

        xml::expand_empty(&mut self.xml, &mut xfs);
        let record = format!(
            "<{xf} numFmtId=\"0\" fontId=\"0\" fillId=\"{fill}\" borderId=\"0\" xfId=\"0\" applyFill=\"1\"/>",
            xf = xml::qualify(xfs.prefix(), "xf"),
            fill = fill_id,
        );
        let at = xfs
            .close_start
            .ok_or_else(|| Error::malformed("styles", "unterminated <cellXfs> element"))?;
        xml::insert(&mut self.xml, &mut xfs, at, &record);
        xml::bump_count(&mut self.xml, &mut xfs, "count", 1, index + 1);

        log::debug!("appended cell format #{} (fill #{})", index, fill_id);
        Ok(index)
    }

    /// Number of `<fill>` records.
    pub fn fill_count(&self) -> Result<usize> {
        let fills = self.section(b"fills")?;
        Ok(xml::child_elements(&self.xml, &fills, b"fill")?.len())
    }

    /// Number of `<xf>` records in `cellXfs`.
    pub fn format_count(&self) -> Result<usize> {
        let xfs = self.section(b"cellXfs")?;
        Ok(xml::child_elements(&self.xml, &xfs, b"xf")?.len())
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

/// Compare an `rgb` attribute (RGB or ARGB) against normalized `hex`.
fn rgb_matches(rgb: &str, hex: &str) -> bool {
    let rgb = rgb.trim();
    let rgb = match rgb.len() {
        8 => rgb.get(2..),
        6 => Some(rgb),
        _ => None,
    };
    rgb.is_some_and(|rgb| rgb.eq_ignore_ascii_case(hex))
}
