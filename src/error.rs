//! Error types for the midi2xml library

use std::io;

/// Library error type for midi2xml operations
#[derive(Debug, thiserror::Error)]
pub enum Midi2XmlError {
    /// Parsing error when reading notation documents
    #[error("parsing error: {0}")]
    ParsingError(String),

    /// Configuration error or failed precondition
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// Parts of a piece disagree on their number of measures
    #[error("part {part} has {found} measures but the first part has {expected}")]
    InconsistentMeasures {
        part: String,
        expected: usize,
        found: usize,
    },

    /// Rendering a window to an interchange format failed
    #[error("render error: {0}")]
    RenderError(String),

    /// Performance token missing from the vocabulary
    #[error("unknown performance token {token:?} in {file}")]
    UnknownToken { token: String, file: String },
}

impl Midi2XmlError {
    /// Fatal errors terminate a batch, all others only skip the current item.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownToken { .. } | Self::ConfigError(_))
    }
}

impl From<io::Error> for Midi2XmlError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error.to_string())
    }
}
