//! Row and cell upserts on worksheet XML (`xl/worksheets/sheetN.xml`).

use crate::address::{letters_to_column, CellAddress};
use crate::error::{Error, Result};
use crate::options::RowOrdering;
use crate::xml::{self, ElementSpan};

/// Writes shared-string cells into worksheet text.
///
/// Only the span of the affected row changes; every other byte of the
/// worksheet is carried over verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorksheetPatcher {
    ordering: RowOrdering,
}

/// A `<row>` child of `<sheetData>` with its effective row number.
struct RowSpan {
    number: u32,
    span: ElementSpan,
}

impl WorksheetPatcher {
    /// Create a patcher with the given insertion ordering.
    pub fn new(ordering: RowOrdering) -> Self {
        Self { ordering }
    }

    /// Insertion ordering used for new rows and cells.
    pub fn ordering(&self) -> RowOrdering {
        self.ordering
    }

    /// Check that `xml` has a `<sheetData>` element to patch into.
    pub fn validate(&self, xml: &str) -> Result<()> {
        locate_sheet_data(xml).map(|_| ())
    }

    /// Set `address` to the shared string `string_index`, optionally styled.
    ///
    /// An existing cell at `address` is replaced wholesale (formula, inline
    /// value and attributes included). A missing row or cell is created.
    pub fn upsert_cell(
        &self,
        xml: &str,
        address: &CellAddress,
        string_index: u32,
        style_index: Option<u32>,
    ) -> Result<String> {
        let mut sheet_data = locate_sheet_data(xml)?;
        let prefix = sheet_data.prefix().map(str::to_string);
        let cell = build_cell(prefix.as_deref(), address, string_index, style_index);

        if sheet_data.close_start.is_none() {
            let mut out = xml.to_string();
            xml::expand_empty(&mut out, &mut sheet_data);
            let row = build_row(prefix.as_deref(), address.row(), &cell);
            if let Some(at) = sheet_data.close_start {
                out.insert_str(at, &row);
            }
            log::debug!("created row {} in empty sheetData for {}", address.row(), address);
            return Ok(out);
        }

        let rows = row_spans(xml, &sheet_data)?;
        match rows.iter().find(|r| r.number == address.row()) {
            Some(row) => self.upsert_in_row(xml, &row.span, address, &cell),
            None => {
                let at = match self.ordering {
                    RowOrdering::Sorted => rows
                        .iter()
                        .find(|r| r.number > address.row())
                        .map(|r| r.span.start),
                    RowOrdering::Append => None,
                }
                .or(sheet_data.close_start)
                .ok_or_else(|| Error::malformed("worksheet", "unterminated <sheetData> element"))?;

                let row = build_row(prefix.as_deref(), address.row(), &cell);
                log::debug!("created row {} at offset {} for {}", address.row(), at, address);
                Ok(splice(xml, at..at, &row))
            }
        }
    }

    fn upsert_in_row(&self, xml: &str, row: &ElementSpan, address: &CellAddress, cell: &str) -> Result<String> {
        let target = address.to_string();
        let target_col = address.column_index();

        let mut cells = Vec::new();
        let mut prev_col = 0u32;
        for c in xml::child_elements(xml, row, b"c")? {
            let col = c
                .attribute(xml, "r")
                .map(column_of)
                .unwrap_or(prev_col.saturating_add(1));
            prev_col = col;
            cells.push((col, c));
        }

        let existing = cells.iter().find(|(col, c)| match c.attribute(xml, "r") {
            Some(r) => r == target,
            None => *col == target_col,
        });
        if let Some((_, c)) = existing {
            log::debug!("replacing cell {}", target);
            return Ok(splice(xml, c.range(), cell));
        }

        if row.close_start.is_none() {
            let open = xml::open_tag(row.start_tag(xml));
            let replacement = format!("{}{}</{}>", open, cell, row.name);
            log::debug!("expanded empty row {} for {}", address.row(), target);
            return Ok(splice(xml, row.range(), &replacement));
        }

        let at = match self.ordering {
            RowOrdering::Sorted => cells
                .iter()
                .find(|(col, _)| *col > target_col)
                .map(|(_, c)| c.start),
            RowOrdering::Append => None,
        }
        .or(row.close_start)
        .ok_or_else(|| Error::malformed("worksheet", "unterminated <row> element"))?;

        log::debug!("inserted cell {} at offset {}", target, at);
        Ok(splice(xml, at..at, cell))
    }
}

fn locate_sheet_data(xml: &str) -> Result<ElementSpan> {
    xml::find_element(xml, b"sheetData")?
        .ok_or_else(|| Error::malformed("worksheet", "no <sheetData> element"))
}

/// Rows under `sheet_data`, numbering rows without `r` as previous + 1.
fn row_spans(xml: &str, sheet_data: &ElementSpan) -> Result<Vec<RowSpan>> {
    let mut prev = 0u32;
    let rows = xml::child_elements(xml, sheet_data, b"row")?
        .into_iter()
        .map(|span| {
            let number = span.attribute_u32(xml, "r").unwrap_or(prev.saturating_add(1));
            prev = number;
            RowSpan { number, span }
        })
        .collect();
    Ok(rows)
}

/// Column number of a cell reference like `AB12`; 0 when unparseable.
fn column_of(reference: &str) -> u32 {
    let letters: String = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    letters_to_column(&letters).unwrap_or(0)
}

fn build_cell(prefix: Option<&str>, address: &CellAddress, string_index: u32, style_index: Option<u32>) -> String {
    let c = xml::qualify(prefix, "c");
    let v = xml::qualify(prefix, "v");
    let style = style_index
        .map(|s| format!(" s=\"{}\"", s))
        .unwrap_or_default();
    format!(
        "<{c} r=\"{addr}\"{style} t=\"s\"><{v}>{idx}</{v}></{c}>",
        c = c,
        v = v,
        addr = address,
        style = style,
        idx = string_index
    )
}

fn build_row(prefix: Option<&str>, number: u32, cell: &str) -> String {
    let row = xml::qualify(prefix, "row");
    format!("<{row} r=\"{n}\">{cell}</{row}>", row = row, n = number, cell = cell)
}

fn splice(xml: &str, range: std::ops::Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(xml.len() + replacement.len());
    out.push_str(&xml[..range.start]);
    out.push_str(replacement);
    out.push_str(&xml[range.end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:C5"/><sheetData><row r="1" spans="1:3"><c r="A1" t="s"><v>0</v></c><c r="B1" s="2"><v>42</v></c></row><row r="5" spans="1:3" ht="20" customHeight="1"><c r="A5"><v>1</v></c><c r="B5" s="4" t="str"><f>SUM(A1:A4)</f><v>10</v></c><c r="C5"><v>7</v></c></row></sheetData><mergeCells count="1"><mergeCell ref="A1:B1"/></mergeCells></worksheet>"#;

    const ROW1: &str = r#"<row r="1" spans="1:3"><c r="A1" t="s"><v>0</v></c><c r="B1" s="2"><v>42</v></c></row>"#;

    #[test]
    fn test_new_row_appended_at_end() {
        let patcher = WorksheetPatcher::default();
        let out = patcher.upsert_cell(SHEET, &addr("A3"), 7, None).unwrap();

        assert!(out.contains(r#"<c r="C5"><v>7</v></c></row><row r="3"><c r="A3" t="s"><v>7</v></c></row></sheetData>"#));
        assert!(out.contains(ROW1));
        // Everything except the insertion is byte-identical.
        let at = SHEET.find("</sheetData>").unwrap();
        assert_eq!(&out[..at], &SHEET[..at]);
        assert_eq!(&out[out.len() - (SHEET.len() - at)..], &SHEET[at..]);
    }

    #[test]
    fn test_new_row_sorted() {
        let patcher = WorksheetPatcher::new(RowOrdering::Sorted);
        let out = patcher.upsert_cell(SHEET, &addr("A3"), 7, Some(9)).unwrap();
        assert!(out.contains(r#"</row><row r="3"><c r="A3" s="9" t="s"><v>7</v></c></row><row r="5" spans"#));
    }

    #[test]
    fn test_existing_cell_fully_replaced() {
        let patcher = WorksheetPatcher::default();
        let out = patcher.upsert_cell(SHEET, &addr("B5"), 3, Some(6)).unwrap();

        assert!(out.contains(r#"<row r="5" spans="1:3" ht="20" customHeight="1"><c r="A5"><v>1</v></c><c r="B5" s="6" t="s"><v>3</v></c><c r="C5"><v>7</v></c></row>"#));
        assert!(!out.contains("SUM(A1:A4)"));
        assert!(!out.contains("t=\"str\""));
        assert!(out.contains(ROW1));
        assert_eq!(out.len(), SHEET.len() - r#"<c r="B5" s="4" t="str"><f>SUM(A1:A4)</f><v>10</v></c>"#.len() + r#"<c r="B5" s="6" t="s"><v>3</v></c>"#.len());
    }

    #[test]
    fn test_missing_cell_appended_to_row() {
        let patcher = WorksheetPatcher::default();
        let out = patcher.upsert_cell(SHEET, &addr("AA1"), 4, None).unwrap();
        assert!(out.contains(r#"<c r="B1" s="2"><v>42</v></c><c r="AA1" t="s"><v>4</v></c></row>"#));

        // Append mode does not sort: a lower column still lands at the end.
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="B1"><v>1</v></c></row></sheetData></worksheet>"#;
        let out = patcher.upsert_cell(sheet, &addr("A1"), 4, None).unwrap();
        assert!(out.contains(r#"<c r="B1"><v>1</v></c><c r="A1" t="s"><v>4</v></c></row>"#));
    }

    #[test]
    fn test_missing_cell_sorted_into_row() {
        let sheet = r#"<worksheet><sheetData><row r="2"><c r="A2"><v>1</v></c><c r="AA2"><v>2</v></c></row></sheetData></worksheet>"#;
        let patcher = WorksheetPatcher::new(RowOrdering::Sorted);
        let out = patcher.upsert_cell(sheet, &addr("Z2"), 0, None).unwrap();
        assert_eq!(
            out,
            r#"<worksheet><sheetData><row r="2"><c r="A2"><v>1</v></c><c r="Z2" t="s"><v>0</v></c><c r="AA2"><v>2</v></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn test_empty_sheet_data() {
        let patcher = WorksheetPatcher::default();
        let out = patcher
            .upsert_cell("<worksheet><sheetData/></worksheet>", &addr("A5"), 0, None)
            .unwrap();
        assert_eq!(
            out,
            r#"<worksheet><sheetData><row r="5"><c r="A5" t="s"><v>0</v></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn test_self_closing_row_and_cell() {
        let sheet = r#"<worksheet><sheetData><row r="4" ht="30"/><row r="5"><c r="A5" s="1"/></row></sheetData></worksheet>"#;
        let patcher = WorksheetPatcher::default();

        let out = patcher.upsert_cell(sheet, &addr("C4"), 2, None).unwrap();
        assert!(out.contains(r#"<row r="4" ht="30"><c r="C4" t="s"><v>2</v></c></row>"#));

        let out = patcher.upsert_cell(sheet, &addr("A5"), 2, Some(1)).unwrap();
        assert!(out.contains(r#"<row r="5"><c r="A5" s="1" t="s"><v>2</v></c></row>"#));
    }

    #[test]
    fn test_implicit_row_and_cell_numbers() {
        let sheet = r#"<worksheet><sheetData><row r="2"><c><v>1</v></c></row><row><c/><c><v>9</v></c></row></sheetData></worksheet>"#;
        let patcher = WorksheetPatcher::default();
        let out = patcher.upsert_cell(sheet, &addr("B3"), 5, None).unwrap();
        assert_eq!(
            out,
            r#"<worksheet><sheetData><row r="2"><c><v>1</v></c></row><row><c/><c r="B3" t="s"><v>5</v></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn test_prefixed_worksheet() {
        let sheet = r#"<x:worksheet xmlns:x="urn:m"><x:sheetData></x:sheetData></x:worksheet>"#;
        let out = WorksheetPatcher::default()
            .upsert_cell(sheet, &addr("B2"), 1, None)
            .unwrap();
        assert!(out.contains(r#"<x:row r="2"><x:c r="B2" t="s"><x:v>1</x:v></x:c></x:row></x:sheetData>"#));
    }

    #[test]
    fn test_missing_sheet_data() {
        let patcher = WorksheetPatcher::default();
        assert!(matches!(
            patcher.validate("<worksheet/>"),
            Err(Error::MalformedDocument { .. })
        ));
        assert!(matches!(
            patcher.upsert_cell("<worksheet></worksheet>", &addr("A1"), 0, None),
            Err(Error::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_row_number_match_is_numeric() {
        // r="15" must not be mistaken for row 5.
        let sheet = r#"<worksheet><sheetData><row r="15"><c r="A15"><v>1</v></c></row></sheetData></worksheet>"#;
        let out = WorksheetPatcher::default()
            .upsert_cell(sheet, &addr("A5"), 0, None)
            .unwrap();
        assert!(out.contains(r#"<row r="15"><c r="A15"><v>1</v></c></row><row r="5">"#));
    }

    #[test]
    fn test_implicit_row_after_max_row_number() {
        let sheet = r#"<worksheet><sheetData><row r="4294967295"/><row><c><v>1</v></c></row></sheetData></worksheet>"#;
        let out = WorksheetPatcher::default()
            .upsert_cell(sheet, &addr("A5"), 0, None)
            .unwrap();
        assert!(out.contains(r#"<row><c><v>1</v></c></row><row r="5"><c r="A5" t="s"><v>0</v></c></row></sheetData>"#));
    }
}
