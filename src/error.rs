//! Error types for the sheetpatch library.

use serde::Serialize;
use std::io;
use thiserror::Error;

/// Result type alias for sheetpatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while patching a spreadsheet package.
#[derive(Error, Debug)]
pub enum Error {
    /// The cell reference is not a valid A1-style address.
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// A required part is absent from the package.
    #[error("Part missing from package: {0}")]
    PartMissing(String),

    /// Expected structural markers were not found in a part's text.
    #[error("Malformed document {part}: {reason}")]
    MalformedDocument {
        /// Part path (or element name when the path is not known)
        part: String,
        /// What could not be located
        reason: String,
    },

    /// An operation was attempted after the session was flushed.
    #[error("Patch session already flushed")]
    SessionClosed,

    /// The fill color is not a 6-digit hex value.
    #[error("Invalid fill color: {0}")]
    InvalidColor(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error reading or writing the ZIP archive.
    #[error("ZIP archive error: {0}")]
    ZipArchive(String),

    /// Error tokenizing XML content.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Part bytes could not be decoded as text.
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl Error {
    pub(crate) fn malformed(part: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedDocument {
            part: part.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable tag for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidAddress(_) => "INVALID_ADDRESS",
            Error::PartMissing(_) => "PART_MISSING",
            Error::MalformedDocument { .. } => "MALFORMED_DOCUMENT",
            Error::SessionClosed => "SESSION_CLOSED",
            Error::InvalidColor(_) => "INVALID_COLOR",
            Error::Io(_) => "IO_ERROR",
            Error::ZipArchive(_) => "ZIP_ERROR",
            Error::XmlParse(_) => "XML_PARSE_ERROR",
            Error::Encoding(_) => "ENCODING_ERROR",
        }
    }

    /// Whether the caller can fix its input and continue the same session.
    ///
    /// Bad addresses and colors are rejected before any part is touched.
    /// Everything else leaves the session (or the package) unusable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InvalidAddress(_) | Error::InvalidColor(_))
    }

    /// Map this error into its normalized record.
    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord {
            code: self.code(),
            message: self.to_string(),
            recoverable: self.is_recoverable(),
        }
    }
}

/// Normalized shape of an [`Error`], suitable for structured logs and JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// Stable tag, see [`Error::code`]
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
    /// See [`Error::is_recoverable`]
    pub recoverable: bool,
}

impl ErrorRecord {
    /// Render the record as a single-line JSON object.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"code\":\"{}\"}}", self.code))
    }
}

impl From<&Error> for ErrorRecord {
    fn from(err: &Error) -> Self {
        err.to_record()
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipArchive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::SessionClosed;
        assert_eq!(err.to_string(), "Patch session already flushed");

        let err = Error::PartMissing("xl/styles.xml".to_string());
        assert_eq!(err.to_string(), "Part missing from package: xl/styles.xml");

        let err = Error::malformed("xl/worksheets/sheet1.xml", "no <sheetData> element");
        assert_eq!(
            err.to_string(),
            "Malformed document xl/worksheets/sheet1.xml: no <sheetData> element"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.code(), "IO_ERROR");
    }

    #[test]
    fn test_error_record() {
        let record = Error::InvalidAddress("A0".to_string()).to_record();
        assert_eq!(record.code, "INVALID_ADDRESS");
        assert!(record.recoverable);
        assert_eq!(record.message, "Invalid cell address: A0");

        let record = ErrorRecord::from(&Error::SessionClosed);
        assert!(!record.recoverable);
        assert_eq!(
            record.to_json(),
            r#"{"code":"SESSION_CLOSED","message":"Patch session already flushed","recoverable":false}"#
        );
    }
}
