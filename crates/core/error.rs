//! Error types for decoding, fetching and streaming containers.

use fgbstream_types::ColumnType;
use thiserror::Error;

/// Broad classes of failure, used to decide whether a session survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed container bytes. Fatal, never retried.
    Format,
    /// A range fetch failed. Reported per batch.
    Transport,
    /// An internal queue exceeded its hard cap. Fatal.
    Overflow,
    /// Misuse of a session or its configuration.
    Session,
}

#[derive(Error, Debug)]
pub enum FgbError {
    #[error("Invalid magic bytes: {0:02x?}")]
    InvalidMagic([u8; 3]),
    #[error("Invalid header size {size} (expected 8..={max} bytes)")]
    InvalidHeaderSize { size: u64, max: usize },
    #[error("Truncated buffer: needed {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Unknown column type tag {0}")]
    UnknownColumnType(u8),
    #[error("Unknown geometry type tag {0}")]
    UnknownGeometryType(u8),
    #[error("Column index {index} out of range ({count} columns)")]
    ColumnIndexOutOfRange { index: u16, count: usize },
    #[error("Column {column} holds {expected} values, got {found}")]
    ValueTypeMismatch {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },
    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
    #[error("Invalid JSON property value: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Geometry nesting exceeds depth {0}")]
    GeometryTooDeep(usize),
    #[error("Invalid index: {0}")]
    InvalidIndex(String),
    #[error("Range not satisfiable: offset {offset}, length {length}")]
    RangeNotSatisfiable { offset: u64, length: usize },
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Overflow: {0}")]
    Overflow(String),
    #[error("Session failed earlier and can no longer be queried")]
    SessionFailed,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FgbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FgbError::InvalidMagic(_)
            | FgbError::InvalidHeaderSize { .. }
            | FgbError::Truncated { .. }
            | FgbError::MissingField(_)
            | FgbError::UnknownColumnType(_)
            | FgbError::UnknownGeometryType(_)
            | FgbError::ColumnIndexOutOfRange { .. }
            | FgbError::ValueTypeMismatch { .. }
            | FgbError::InvalidUtf8(_)
            | FgbError::InvalidJson(_)
            | FgbError::InvalidGeometry(_)
            | FgbError::GeometryTooDeep(_)
            | FgbError::InvalidIndex(_) => ErrorKind::Format,
            FgbError::RangeNotSatisfiable { .. }
            | FgbError::TransportUnavailable(_)
            | FgbError::Io(_) => ErrorKind::Transport,
            FgbError::Overflow(_) => ErrorKind::Overflow,
            FgbError::SessionFailed | FgbError::InvalidConfig(_) => ErrorKind::Session,
        }
    }

    /// Fatal errors abort the whole session.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Format | ErrorKind::Overflow)
    }

    pub(crate) fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        FgbError::Truncated {
            offset,
            needed,
            available,
        }
    }
}

pub type Result<T> = std::result::Result<T, FgbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(FgbError::InvalidMagic(*b"abc").kind(), ErrorKind::Format);
        assert!(FgbError::MissingField("Column.name").is_fatal());
        assert!(FgbError::Overflow("queue".into()).is_fatal());

        let transport = FgbError::RangeNotSatisfiable {
            offset: 10,
            length: 4,
        };
        assert_eq!(transport.kind(), ErrorKind::Transport);
        assert!(!transport.is_fatal());
        assert!(!FgbError::SessionFailed.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = FgbError::truncated(12, 8, 4);
        assert_eq!(
            err.to_string(),
            "Truncated buffer: needed 8 bytes at offset 12, have 4"
        );
        assert_eq!(
            FgbError::InvalidMagic(*b"xyz").to_string(),
            "Invalid magic bytes: [78, 79, 7a]"
        );
    }
}
