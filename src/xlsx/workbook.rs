//! Sheet name to worksheet part resolution.
//!
//! Reads `xl/workbook.xml` and its relationships. This runs before a patch
//! session; sessions themselves never touch these parts.

use crate::error::{Error, Result};
use crate::package::{read_part_text, Package, PackageStore};
use std::collections::HashMap;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";

/// A sheet declared in the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    /// Tab name
    pub name: String,
    /// `sheetId` attribute
    pub sheet_id: String,
    /// Worksheet part path (e.g. `xl/worksheets/sheet2.xml`)
    pub part_path: String,
}

/// List the workbook's sheets in tab order.
pub fn list_sheets<S: PackageStore + ?Sized>(store: &S) -> Result<Vec<SheetInfo>> {
    let rels = parse_workbook_rels(store)?;
    let xml = read_part_text(store, WORKBOOK_PATH)?;

    let mut sheets = Vec::new();
    let mut reader = quick_xml::Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    let mut name = String::new();
                    let mut sheet_id = String::new();
                    let mut rel_id = String::new();

                    for attr in e.attributes().flatten() {
                        match attr.key.local_name().as_ref() {
                            b"name" => {
                                name = String::from_utf8_lossy(&attr.value).to_string();
                            }
                            b"sheetId" => {
                                sheet_id = String::from_utf8_lossy(&attr.value).to_string();
                            }
                            b"id" if attr.key.prefix().is_some() => {
                                rel_id = String::from_utf8_lossy(&attr.value).to_string();
                            }
                            _ => {}
                        }
                    }

                    if let Some(target) = rels.get(&rel_id) {
                        sheets.push(SheetInfo {
                            name: unescape_attr(&name),
                            sheet_id,
                            part_path: Package::resolve_path(WORKBOOK_PATH, target),
                        });
                    } else {
                        log::warn!("sheet {:?} has no worksheet relationship", name);
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// Worksheet part path for the sheet tab `name`.
pub fn resolve_sheet_path<S: PackageStore + ?Sized>(store: &S, name: &str) -> Result<String> {
    list_sheets(store)?
        .into_iter()
        .find(|s| s.name == name)
        .map(|s| s.part_path)
        .ok_or_else(|| Error::PartMissing(format!("worksheet for sheet '{}'", name)))
}

/// Relationship id -> target for the workbook part.
fn parse_workbook_rels<S: PackageStore + ?Sized>(store: &S) -> Result<HashMap<String, String>> {
    let xml = read_part_text(store, WORKBOOK_RELS_PATH)?;
    let mut rels = HashMap::new();

    let mut reader = quick_xml::Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut id = String::new();
                    let mut target = String::new();

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                            b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                            _ => {}
                        }
                    }

                    if !id.is_empty() && !target.is_empty() {
                        rels.insert(id, target);
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

fn unescape_attr(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn store() -> BTreeMap<String, Vec<u8>> {
        let mut store = BTreeMap::new();
        store.insert(
            WORKBOOK_PATH.to_string(),
            br#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Resumo" sheetId="1" r:id="rId1"/><sheet name="Plan2 &amp; Co" sheetId="2" r:id="rId2"/></sheets></workbook>"#
                .to_vec(),
        );
        store.insert(
            WORKBOOK_RELS_PATH.to_string(),
            br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet1.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#
                .to_vec(),
        );
        store
    }

    #[test]
    fn test_list_sheets() {
        let sheets = list_sheets(&store()).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name, "Resumo");
        assert_eq!(sheets[0].part_path, "xl/worksheets/sheet1.xml");
        assert_eq!(sheets[1].name, "Plan2 & Co");
        assert_eq!(sheets[1].sheet_id, "2");
        assert_eq!(sheets[1].part_path, "xl/worksheets/sheet2.xml");
    }

    #[test]
    fn test_resolve_sheet_path() {
        assert_eq!(
            resolve_sheet_path(&store(), "Plan2 & Co").unwrap(),
            "xl/worksheets/sheet2.xml"
        );
        assert!(matches!(
            resolve_sheet_path(&store(), "Nope"),
            Err(Error::PartMissing(_))
        ));
    }

    #[test]
    fn test_missing_workbook() {
        let empty: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        assert!(matches!(list_sheets(&empty), Err(Error::PartMissing(_))));
    }
}
