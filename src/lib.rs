//! # sheetpatch
//!
//! Surgical cell edits on Excel (.xlsx) templates.
//!
//! This library writes text values, and optionally a solid background fill,
//! into cells of an existing workbook while leaving every byte it does not
//! need to change exactly as it was. Charts, formulas, validations and
//! custom XML in the template survive untouched.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sheetpatch::{Package, PatchEngine, PatchOptions};
//!
//! let mut package = Package::open("template.xlsx")?;
//!
//! let mut engine = PatchEngine::new(&mut package, PatchOptions::default());
//! engine.set_cell("A5", "Linha 5", None)?;
//! engine.set_cell("B5", "120", Some("#FFFF00"))?;
//! engine.flush()?;
//!
//! package.save("report.xlsx")?;
//! # Ok::<(), sheetpatch::Error>(())
//! ```
//!
//! ## Targeting a sheet by name
//!
//! ```no_run
//! use sheetpatch::{CellEdit, PatchOptions};
//!
//! let package = sheetpatch::Package::open("template.xlsx")?;
//! let path = sheetpatch::xlsx::resolve_sheet_path(&package, "Resumo")?;
//!
//! let edits = vec![CellEdit::new("C5", "Total").with_fill("#FF0000")];
//! sheetpatch::patch_file("template.xlsx", "report.xlsx", &PatchOptions::for_sheet(path), &edits)?;
//! # Ok::<(), sheetpatch::Error>(())
//! ```
//!
//! ## Features
//!
//! - `async`: Async package I/O with Tokio

pub mod address;
pub mod engine;
pub mod error;
pub mod options;
pub mod package;
pub mod xlsx;

mod xml;

// Re-exports
pub use address::CellAddress;
pub use engine::{CellEdit, PatchEngine};
pub use error::{Error, ErrorRecord, Result};
pub use options::{PatchOptions, RowOrdering};
pub use package::{Package, PackageStore};

use std::path::Path;

/// Apply `edits` to an in-memory .xlsx and return the patched archive.
///
/// # Example
///
/// ```no_run
/// use sheetpatch::{patch_bytes, CellEdit, PatchOptions};
///
/// let data = std::fs::read("template.xlsx")?;
/// let out = patch_bytes(data, &PatchOptions::default(), &[CellEdit::new("A1", "Hello")])?;
/// std::fs::write("report.xlsx", out)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn patch_bytes(data: Vec<u8>, options: &PatchOptions, edits: &[CellEdit]) -> Result<Vec<u8>> {
    let mut package = Package::from_bytes(data)?;
    apply(&mut package, options, edits)?;
    package.to_bytes()
}

/// Apply `edits` to the workbook at `input` and write the result to `output`.
///
/// `input` and `output` may be the same path; the archive is fully read
/// before anything is written.
pub fn patch_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &PatchOptions,
    edits: &[CellEdit],
) -> Result<()> {
    let mut package = Package::open(input)?;
    apply(&mut package, options, edits)?;
    package.save(output)
}

fn apply(package: &mut Package, options: &PatchOptions, edits: &[CellEdit]) -> Result<()> {
    let mut engine = PatchEngine::new(package, options.clone());
    let applied = engine.set_cells(edits)?;
    engine.flush()?;
    log::debug!("applied {} edits", applied);
    Ok(())
}
