//! A1-style cell references.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Highest row number a worksheet can hold.
pub const MAX_ROW: u32 = 1_048_576;

/// Highest 1-based column number a worksheet can hold (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;

/// A cell reference such as `A5` or `XFD1048576`.
///
/// The column is kept as the literal upper-case letters so that
/// formatting always reproduces the parsed text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellAddress {
    column: String,
    row: u32,
}

impl CellAddress {
    /// Build an address from its parts, validating both.
    pub fn new(column: impl Into<String>, row: u32) -> Result<Self> {
        let column = column.into();
        let addr = Self { column, row };
        addr.validate()?;
        Ok(addr)
    }

    /// Parse an address from A1 notation.
    ///
    /// # Examples
    /// ```
    /// use sheetpatch::CellAddress;
    ///
    /// let addr = CellAddress::parse("B5").unwrap();
    /// assert_eq!(addr.column(), "B");
    /// assert_eq!(addr.row(), 5);
    /// assert_eq!(addr.to_string(), "B5");
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let split = s
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(s.len());
        let (letters, digits) = s.split_at(split);

        if letters.is_empty() {
            return Err(Error::InvalidAddress(format!("no column letters in '{}'", s)));
        }
        if digits.is_empty() {
            return Err(Error::InvalidAddress(format!("no row number in '{}'", s)));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAddress(format!("invalid row number in '{}'", s)));
        }
        if digits.starts_with('0') {
            return Err(Error::InvalidAddress(format!(
                "row number must be a positive integer without leading zeros in '{}'",
                s
            )));
        }

        let row: u32 = digits
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("row number out of range in '{}'", s)))?;

        Self::new(letters, row)
    }

    fn validate(&self) -> Result<()> {
        if self.column.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }
        if let Some(c) = self.column.chars().find(|c| !c.is_ascii_uppercase()) {
            return Err(Error::InvalidAddress(format!(
                "invalid column letter '{}' in '{}'",
                c, self
            )));
        }
        if self.row == 0 || self.row > MAX_ROW {
            return Err(Error::InvalidAddress(format!(
                "row must be between 1 and {} in '{}'",
                MAX_ROW, self
            )));
        }
        match letters_to_column(&self.column) {
            Some(col) if col <= MAX_COLUMN => Ok(()),
            _ => Err(Error::InvalidAddress(format!(
                "column past XFD in '{}'",
                self
            ))),
        }
    }

    /// Column letters (e.g. `"AB"`).
    pub fn column(&self) -> &str {
        &self.column
    }

    /// 1-based row number.
    pub fn row(&self) -> u32 {
        self.row
    }

    /// 1-based column number (`A` = 1, `Z` = 26, `AA` = 27).
    pub fn column_index(&self) -> u32 {
        // Validated on construction, so the fold cannot overflow.
        letters_to_column(&self.column).unwrap_or(0)
    }

    /// Compare by column position, so that `Z` sorts before `AA`.
    pub fn cmp_column(&self, other: &Self) -> Ordering {
        self.column_index().cmp(&other.column_index())
    }
}

/// Convert column letters to a 1-based index. Returns `None` on overflow.
pub fn letters_to_column(letters: &str) -> Option<u32> {
    letters.bytes().try_fold(0u32, |acc, b| {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        acc.checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A') as u32 + 1)
    })
}

/// Convert a 1-based column index to letters (1 = A, 27 = AA).
pub fn column_to_letters(col: u32) -> String {
    let mut result = String::new();
    let mut n = col;

    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }

    result
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
