//! Structural errors that abort an export.
//!
//! Bad reference lines, missing figures and malformed inline markers are
//! absorbed where they happen and never surface here.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// Style identifier that does not map to any known citation style.
    #[error("Unsupported citation style '{0}' (expected apa, harvard, ieee or none)")]
    UnknownCitationStyle(String),

    /// The export was requested without any chapters to assemble.
    #[error("No chapters available to assemble")]
    MissingChapters,
}

impl ExportError {
    pub fn unknown_style(style: impl Into<String>) -> Self {
        Self::UnknownCitationStyle(style.into())
    }
}
