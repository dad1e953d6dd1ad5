//! Error types for the cross-reference engine.
//!
//! This module defines all error types that can occur while reading or
//! extending a PDF file's cross-reference structure.

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF processing.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference section (recoverable by scanning)
    #[error("Invalid cross-reference section: {0}")]
    InvalidXref(String),

    /// Document structure is broken beyond what recovery can repair
    #[error("Invalid PDF structure: {0}")]
    InvalidStructure(String),

    /// A byte range has not been supplied yet by the underlying source.
    ///
    /// Carries the half-open range `[begin, end)` the caller must supply
    /// before retrying. Every layer propagates this variant untouched so
    /// progressive consumers can resume the exact operation that stalled.
    #[error("Missing data in range [{begin}, {end})")]
    MissingData {
        /// First missing byte offset
        begin: usize,
        /// One past the last missing byte offset
        end: usize,
    },

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Password did not authenticate against the standard security handler
    #[error("Password authentication failed")]
    PasswordIncorrect,
}

impl Error {
    /// Whether this error is the missing-data signal from a progressive source.
    ///
    /// Recovery and repair paths must check this before treating a failure as
    /// corruption: missing bytes are a transport condition, not damage.
    pub fn is_missing_data(&self) -> bool {
        matches!(self, Error::MissingData { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error() {
        let err = Error::ParseError {
            offset: 1234,
            reason: "invalid token".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("invalid token"));
    }

    #[test]
    fn test_missing_data_range() {
        let err = Error::MissingData { begin: 100, end: 356 };
        assert!(err.is_missing_data());
        let msg = format!("{}", err);
        assert!(msg.contains("100"));
        assert!(msg.contains("356"));
    }

    #[test]
    fn test_invalid_object_type_error() {
        let err = Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: "Array".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Dictionary"));
        assert!(msg.contains("Array"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
