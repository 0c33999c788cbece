use thiserror::Error;

/// Failures of buffer and decoration mutations.
///
/// Every variant is raised before anything is written, so a failed edit
/// leaves the text, the paragraph index and the decorations untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("invalid position {position} (text length {length})")]
    InvalidPosition { position: usize, length: usize },

    #[error("invalid range {start}..{end} (text length {length})")]
    InvalidRange {
        start: usize,
        end: usize,
        length: usize,
    },

    #[error("decoration conflict at {start}..{end}: {reason}")]
    DecorationConflict {
        start: usize,
        end: usize,
        reason: &'static str,
    },
}

pub type EditResult<T> = Result<T, EditError>;

/// Failures while reading, writing or validating a serialized document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document: {0}")]
    Malformed(String),
}
