//! Error types for the minimizer.
//!
//! Every failure in the engine is reported through [`Error`]. Parsing problems
//! surface as [`Error::MalformedDocument`], broken references as
//! [`Error::DanglingReference`], encrypted input as
//! [`Error::UnsupportedFeature`] and a document without pages as
//! [`Error::EmptyDocument`].

use crate::object::ObjectRef;

/// Result type alias for minimizer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reading, copying or writing a PDF.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structural parse failure (unreadable xref, missing trailer, broken object stream, ...)
    #[error("Malformed document{}: {}", at_offset(.offset), .reason)]
    MalformedDocument {
        /// Byte offset in the input where the problem was found, when known
        offset: Option<usize>,
        /// Reason for the failure
        reason: String,
    },

    /// Reference that resolves to nothing in the owning document
    #[error("Dangling reference: {0}")]
    DanglingReference(ObjectRef),

    /// Feature the engine deliberately does not handle (encryption, exotic filters)
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Page tree contains zero pages
    #[error("Document contains no pages")]
    EmptyDocument,

    /// Stream decoding error (explicit decode requests only)
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn at_offset(offset: &Option<usize>) -> String {
    match offset {
        Some(o) => format!(" at byte {}", o),
        None => String::new(),
    }
}

impl Error {
    /// Create a malformed-document error without a known offset.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            offset: None,
            reason: reason.into(),
        }
    }

    /// Create a malformed-document error anchored at a byte offset.
    pub fn malformed_at(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            offset: Some(offset),
            reason: reason.into(),
        }
    }

    /// Whether the copier may replace the failing value with `null` and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DanglingReference(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_without_offset() {
        let err = Error::malformed("trailer missing /Root");
        assert_eq!(err.to_string(), "Malformed document: trailer missing /Root");
    }

    #[test]
    fn test_malformed_with_offset() {
        let err = Error::malformed_at(1234, "expected 'obj'");
        let msg = err.to_string();
        assert!(msg.contains("1234"));
        assert!(msg.contains("expected 'obj'"));
    }

    #[test]
    fn test_dangling_reference_display() {
        let err = Error::DanglingReference(ObjectRef::new(10, 0));
        assert!(err.to_string().contains("10 0 R"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::DanglingReference(ObjectRef::new(1, 0)).is_recoverable());
        assert!(!Error::EmptyDocument.is_recoverable());
        assert!(!Error::UnsupportedFeature("Encrypt".to_string()).is_recoverable());
        assert!(!Error::malformed("x").is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
