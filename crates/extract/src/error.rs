use thiserror::Error;

/// Result type for extraction helpers
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors raised by extraction internals.
///
/// These never cross the `Extractor` trait boundary: per-file failures are
/// logged and reported as an empty chunk list so one bad file cannot abort a
/// corpus walk.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Failed to parse the source code
    #[error("Parse error in {file}: {reason}")]
    Parse { file: String, reason: String },

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ExtractError {
    /// Create a parse error
    pub fn parse(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            reason: reason.into(),
        }
    }
}
