//! Patch sessions: the public "set cell" entry point.
//!
//! A [`PatchEngine`] borrows a [`PackageStore`] for the length of one
//! session. Parts are loaded lazily, edited in memory, and written back
//! once by [`PatchEngine::flush`].

use crate::address::CellAddress;
use crate::error::{Error, Result};
use crate::options::PatchOptions;
use crate::package::{read_part_text, PackageStore};
use crate::xlsx::{normalize_color, SharedStringTable, StyleTable, WorksheetPatcher};
use serde::{Deserialize, Serialize};

/// One cell write, as accepted by [`PatchEngine::set_cells`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellEdit {
    /// Cell reference (e.g. `"A5"`)
    pub cell: String,
    /// Text stored in the shared strings table
    pub value: String,
    /// Optional solid fill color (`"#RRGGBB"` or `"RRGGBB"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
}

impl CellEdit {
    /// Create an unstyled edit.
    pub fn new(cell: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            cell: cell.into(),
            value: value.into(),
            fill: None,
        }
    }

    /// Attach a fill color.
    pub fn with_fill(mut self, color: impl Into<String>) -> Self {
        self.fill = Some(color.into());
        self
    }
}

/// Part text held by a session, with whether it needs writing back.
#[derive(Debug)]
struct Loaded<T> {
    value: T,
    dirty: bool,
}

impl<T> Loaded<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            dirty: false,
        }
    }
}

/// A patch session over one worksheet of a package.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use sheetpatch::{PackageStore, PatchEngine, PatchOptions};
///
/// let mut store: HashMap<String, Vec<u8>> = HashMap::new();
/// store.put("xl/worksheets/sheet1.xml", b"<worksheet><sheetData/></worksheet>".to_vec());
/// store.put("xl/sharedStrings.xml", b"<sst count=\"0\" uniqueCount=\"0\"></sst>".to_vec());
///
/// let mut engine = PatchEngine::new(&mut store, PatchOptions::default());
/// engine.set_cell("A5", "Linha 5", None)?;
/// engine.flush()?;
///
/// let sheet = String::from_utf8(store["xl/worksheets/sheet1.xml"].clone()).unwrap();
/// assert!(sheet.contains(r#"<c r="A5" t="s"><v>0</v></c>"#));
/// # Ok::<(), sheetpatch::Error>(())
/// ```
pub struct PatchEngine<'a, S: PackageStore + ?Sized> {
    store: &'a mut S,
    options: PatchOptions,
    patcher: WorksheetPatcher,
    worksheet: Option<Loaded<String>>,
    shared_strings: Option<Loaded<SharedStringTable>>,
    styles: Option<Loaded<StyleTable>>,
    closed: bool,
    aborted: bool,
}

impl<'a, S: PackageStore + ?Sized> PatchEngine<'a, S> {
    /// Start a session against `store`.
    pub fn new(store: &'a mut S, options: PatchOptions) -> Self {
        let patcher = WorksheetPatcher::new(options.ordering);
        Self {
            store,
            options,
            patcher,
            worksheet: None,
            shared_strings: None,
            styles: None,
            closed: false,
            aborted: false,
        }
    }

    /// Options this session was created with.
    pub fn options(&self) -> &PatchOptions {
        &self.options
    }

    /// Whether [`flush`](Self::flush) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether a fatal error ended the session before it was flushed.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Write `value` into `address`, optionally with a solid fill.
    ///
    /// The cell is fully overwritten: any formula, inline value or previous
    /// style on it is discarded.
    ///
    /// Bad addresses and colors are rejected without side effects. Any other
    /// error aborts the session: edits made so far are discarded and every
    /// later call returns [`Error::SessionClosed`].
    pub fn set_cell(&mut self, address: &str, value: &str, fill_color: Option<&str>) -> Result<()> {
        if self.closed || self.aborted {
            return Err(Error::SessionClosed);
        }

        let result = self.apply(address, value, fill_color);
        if let Err(ref e) = result {
            if !e.is_recoverable() {
                self.abort(e);
            }
        }
        result
    }

    fn apply(&mut self, address: &str, value: &str, fill_color: Option<&str>) -> Result<()> {
        let address = CellAddress::parse(address)?;
        if let Some(color) = fill_color {
            normalize_color(color)?;
        }

        // Load everything this call needs before mutating anything.
        self.load_worksheet()?;
        self.load_shared_strings()?;
        if fill_color.is_some() {
            self.load_styles()?;
        }

        let string_index = {
            let sst = self.shared_strings_mut()?;
            let index = sst.value.intern(value)?;
            sst.dirty = true;
            index
        };

        let style_index = match fill_color {
            Some(color) => {
                let styles = self.styles_mut()?;
                let index = styles.value.ensure_fill(color)?;
                styles.dirty = true;
                Some(index)
            }
            None => None,
        };

        let patcher = self.patcher;
        let sheet = self.worksheet_mut()?;
        sheet.value = patcher.upsert_cell(&sheet.value, &address, string_index, style_index)?;
        sheet.dirty = true;

        log::debug!(
            "set {} -> shared string #{}{}",
            address,
            string_index,
            style_index
                .map(|s| format!(", style #{}", s))
                .unwrap_or_default()
        );
        Ok(())
    }

    /// Apply a batch of edits in order, stopping at the first error.
    pub fn set_cells<'e, I>(&mut self, edits: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'e CellEdit>,
    {
        let mut applied = 0;
        for edit in edits {
            self.set_cell(&edit.cell, &edit.value, edit.fill.as_deref())?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Write every changed part back to the store and close the session.
    ///
    /// Nothing is written if the session was aborted.
    pub fn flush(&mut self) -> Result<()> {
        if self.closed || self.aborted {
            return Err(Error::SessionClosed);
        }
        self.closed = true;

        if let Some(sheet) = self.worksheet.take().filter(|p| p.dirty) {
            self.store
                .put(&self.options.worksheet_path, sheet.value.into_bytes());
            log::debug!("flushed {}", self.options.worksheet_path);
        }
        if let Some(sst) = self.shared_strings.take().filter(|p| p.dirty) {
            self.store.put(
                &self.options.shared_strings_path,
                sst.value.into_inner().into_bytes(),
            );
            log::debug!("flushed {}", self.options.shared_strings_path);
        }
        if let Some(styles) = self.styles.take().filter(|p| p.dirty) {
            self.store
                .put(&self.options.styles_path, styles.value.into_inner().into_bytes());
            log::debug!("flushed {}", self.options.styles_path);
        }

        Ok(())
    }

    fn abort(&mut self, err: &Error) {
        log::warn!("patch session aborted, discarding pending edits: {}", err);
        self.aborted = true;
        self.worksheet = None;
        self.shared_strings = None;
        self.styles = None;
    }

    fn load_worksheet(&mut self) -> Result<()> {
        if self.worksheet.is_none() {
            let xml = read_part_text(&*self.store, &self.options.worksheet_path)?;
            self.patcher.validate(&xml).map_err(|e| with_part(e, &self.options.worksheet_path))?;
            self.worksheet = Some(Loaded::new(xml));
        }
        Ok(())
    }

    fn load_shared_strings(&mut self) -> Result<()> {
        if self.shared_strings.is_none() {
            let xml = read_part_text(&*self.store, &self.options.shared_strings_path)?;
            let table = SharedStringTable::new(xml)
                .map_err(|e| with_part(e, &self.options.shared_strings_path))?;
            self.shared_strings = Some(Loaded::new(table));
        }
        Ok(())
    }

    fn load_styles(&mut self) -> Result<()> {
        if self.styles.is_none() {
            let xml = read_part_text(&*self.store, &self.options.styles_path)?;
            let table =
                StyleTable::new(xml).map_err(|e| with_part(e, &self.options.styles_path))?;
            self.styles = Some(Loaded::new(table));
        }
        Ok(())
    }

    fn worksheet_mut(&mut self) -> Result<&mut Loaded<String>> {
        self.worksheet
            .as_mut()
            .ok_or_else(|| Error::PartMissing(self.options.worksheet_path.clone()))
    }

    fn shared_strings_mut(&mut self) -> Result<&mut Loaded<SharedStringTable>> {
        self.shared_strings
            .as_mut()
            .ok_or_else(|| Error::PartMissing(self.options.shared_strings_path.clone()))
    }

    fn styles_mut(&mut self) -> Result<&mut Loaded<StyleTable>> {
        self.styles
            .as_mut()
            .ok_or_else(|| Error::PartMissing(self.options.styles_path.clone()))
    }
}

/// Replace the generic part label of a structural error with the real path.
fn with_part(err: Error, path: &str) -> Error {
    match err {
        Error::MalformedDocument { reason, .. } => Error::malformed(path, reason),
        other => other,
    }
}

impl<S: PackageStore + ?Sized> std::fmt::Debug for PatchEngine<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchEngine")
            .field("options", &self.options)
            .field("closed", &self.closed)
            .field("aborted", &self.aborted)
            .finish()
    }
}
