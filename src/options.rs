//! Patch session configuration.

/// Default worksheet part patched when none is configured.
pub const DEFAULT_WORKSHEET_PATH: &str = "xl/worksheets/sheet1.xml";

/// Default shared strings part.
pub const DEFAULT_SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";

/// Default styles part.
pub const DEFAULT_STYLES_PATH: &str = "xl/styles.xml";

/// Where newly created rows and cells are placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowOrdering {
    /// New rows go before `</sheetData>`, new cells before `</row>`
    #[default]
    Append,
    /// New rows and cells are inserted in row/column order
    Sorted,
}

/// Options for a patch session.
#[derive(Debug, Clone)]
pub struct PatchOptions {
    /// Worksheet part to patch
    pub worksheet_path: String,

    /// Shared strings part
    pub shared_strings_path: String,

    /// Styles part
    pub styles_path: String,

    /// Placement of new rows and cells
    pub ordering: RowOrdering,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            worksheet_path: DEFAULT_WORKSHEET_PATH.to_string(),
            shared_strings_path: DEFAULT_SHARED_STRINGS_PATH.to_string(),
            styles_path: DEFAULT_STYLES_PATH.to_string(),
            ordering: RowOrdering::Append,
        }
    }
}

impl PatchOptions {
    /// Create new patch options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options targeting the given worksheet part, defaults otherwise.
    pub fn for_sheet(path: impl Into<String>) -> Self {
        Self::new().with_worksheet(path)
    }

    /// Set the worksheet part path.
    pub fn with_worksheet(mut self, path: impl Into<String>) -> Self {
        self.worksheet_path = path.into();
        self
    }

    /// Set the shared strings part path.
    pub fn with_shared_strings(mut self, path: impl Into<String>) -> Self {
        self.shared_strings_path = path.into();
        self
    }

    /// Set the styles part path.
    pub fn with_styles(mut self, path: impl Into<String>) -> Self {
        self.styles_path = path.into();
        self
    }

    /// Set row and cell insertion ordering.
    pub fn with_ordering(mut self, ordering: RowOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Shorthand for `with_ordering(RowOrdering::Sorted)` when `sorted`.
    pub fn with_sorted(self, sorted: bool) -> Self {
        self.with_ordering(if sorted {
            RowOrdering::Sorted
        } else {
            RowOrdering::Append
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = PatchOptions::default();
        assert_eq!(opts.worksheet_path, "xl/worksheets/sheet1.xml");
        assert_eq!(opts.shared_strings_path, "xl/sharedStrings.xml");
        assert_eq!(opts.styles_path, "xl/styles.xml");
        assert_eq!(opts.ordering, RowOrdering::Append);
    }

    #[test]
    fn test_builder_pattern() {
        let opts = PatchOptions::for_sheet("xl/worksheets/sheet2.xml")
            .with_styles("xl/styles2.xml")
            .with_sorted(true);

        assert_eq!(opts.worksheet_path, "xl/worksheets/sheet2.xml");
        assert_eq!(opts.styles_path, "xl/styles2.xml");
        assert_eq!(opts.ordering, RowOrdering::Sorted);
        assert_eq!(opts.with_sorted(false).ordering, RowOrdering::Append);
    }
}
