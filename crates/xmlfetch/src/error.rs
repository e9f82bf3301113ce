//! Error types for xmlfetch

use std::fmt;
use thiserror::Error;

/// Position in the fetched document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pos {
    pub offset: usize,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.offset, self.line, self.col)
    }
}

impl Pos {
    pub const fn new(offset: usize, line: u32, col: u32) -> Self {
        Self { offset, line, col }
    }
}

/// Span representing a range in the fetched document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub const fn at(pos: Pos) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub const fn empty() -> Self {
        Self {
            start: Pos::new(0, 0, 0),
            end: Pos::new(0, 0, 0),
        }
    }
}

/// Error kind for detailed categorization
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or I/O failure reported by the transport, with the HTTP status if one was received
    Transport { status: Option<u16> },
    /// Tokenizer rejected the document
    MalformedDocument,
    /// Event sequence the tree builder cannot accept (unbalanced tags, early termination)
    Structural,
    MaxDepthExceeded { max: usize },
    MaxSizeExceeded { max: usize },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { status: Some(status) } => {
                write!(f, "transport error (status {status})")
            }
            Self::Transport { status: None } => write!(f, "transport error"),
            Self::MalformedDocument => write!(f, "malformed document"),
            Self::Structural => write!(f, "structural error"),
            Self::MaxDepthExceeded { max } => write!(f, "max depth exceeded: {max}"),
            Self::MaxSizeExceeded { max } => write!(f, "max size exceeded: {max}"),
        }
    }
}

/// Main error type for xmlfetch
#[derive(Error, Clone, Debug, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    span: Span,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            span,
            message,
        }
    }

    pub fn with_message(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    /// Transport failure without an HTTP status
    pub fn transport(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::Transport { status: None }, Span::empty(), message)
    }

    /// Transport failure carrying the HTTP status line's code
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::with_message(
            ErrorKind::Transport {
                status: Some(status),
            },
            Span::empty(),
            message,
        )
    }

    pub fn malformed(pos: Pos, message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::MalformedDocument, Span::at(pos), message)
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::Structural, Span::empty(), message)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport { .. })
    }

    /// True for tokenizer failures, including exceeded limits
    pub fn is_malformed(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::MalformedDocument
                | ErrorKind::MaxDepthExceeded { .. }
                | ErrorKind::MaxSizeExceeded { .. }
        )
    }

    pub fn is_structural(&self) -> bool {
        matches!(self.kind, ErrorKind::Structural)
    }

    /// Create error at specific position
    pub fn at(kind: ErrorKind, offset: usize, line: u32, col: u32) -> Self {
        let pos = Pos::new(offset, line, col);
        Self::new(kind, Span::at(pos))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.span == Span::empty() {
            // transport and structural errors have no document position
            write!(f, "error: {}", self.message)
        } else {
            write!(f, "error at {}: {}", self.span.start, self.message)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err.to_string())
    }
}

/// Result type alias for xmlfetch
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_display() {
        let pos = Pos::new(42, 10, 5);
        assert_eq!(pos.to_string(), "42:10:5");
    }

    #[test]
    fn test_error_creation() {
        let err = Error::at(ErrorKind::MalformedDocument, 0, 1, 1);
        assert_eq!(err.kind(), &ErrorKind::MalformedDocument);
        assert!(err.is_malformed());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_error_display() {
        let err = Error::malformed(Pos::new(10, 2, 5), "unterminated element");
        let display = err.to_string();
        assert_eq!(display, "error at 10:2:5: unterminated element");
    }

    #[test]
    fn test_display_without_position() {
        assert_eq!(
            Error::transport("connection refused").to_string(),
            "error: connection refused"
        );
        assert_eq!(
            Error::structural("document ended inside <a>").to_string(),
            "error: document ended inside <a>"
        );
        assert_eq!(
            Error::http_status(404, "not found").to_string(),
            "error: not found"
        );
    }

    #[test]
    fn test_transport_status() {
        let err = Error::http_status(404, "not found");
        assert_eq!(err.kind(), &ErrorKind::Transport { status: Some(404) });
        assert!(err.is_transport());
        assert_eq!(
            ErrorKind::Transport { status: Some(404) }.to_string(),
            "transport error (status 404)"
        );
    }

    #[test]
    fn test_limits_classified_as_malformed() {
        let err = Error::at(ErrorKind::MaxDepthExceeded { max: 4 }, 0, 1, 1);
        assert!(err.is_malformed());
        assert!(!err.is_structural());
    }

    #[test]
    fn test_io_error_becomes_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: Error = io.into();
        assert!(err.is_transport());
        assert_eq!(err.message(), "refused");
    }
}
