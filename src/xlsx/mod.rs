//! Spreadsheet part editors.
//!
//! Each editor owns the text of one part and applies minimal in-place
//! changes to it:
//!
//! - [`SharedStringTable`] for `xl/sharedStrings.xml`
//! - [`StyleTable`] for `xl/styles.xml`
//! - [`WorksheetPatcher`] for `xl/worksheets/sheetN.xml`
//!
//! # Example
//!
//! ```
//! use sheetpatch::xlsx::SharedStringTable;
//!
//! let mut sst = SharedStringTable::new(r#"<sst count="0" uniqueCount="0"></sst>"#)?;
//! assert_eq!(sst.intern("Total")?, 0);
//! assert_eq!(
//!     sst.as_str(),
//!     r#"<sst count="1" uniqueCount="1"><si><t>Total</t></si></sst>"#
//! );
//! # Ok::<(), sheetpatch::Error>(())
//! ```

mod shared_strings;
mod styles;
mod workbook;
mod worksheet;

pub use shared_strings::SharedStringTable;
pub use styles::{normalize_color, StyleTable};
pub use workbook::{list_sheets, resolve_sheet_path, SheetInfo};
pub use worksheet::WorksheetPatcher;
