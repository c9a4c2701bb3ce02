//! Error types for stream import

use rootstar_hyperscan_core::HyperscanError;
use thiserror::Error;

/// Errors raised while reading, selecting, or converting streams.
#[derive(Error, Debug)]
pub enum ImportError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or truncated container
    #[error("Invalid XDF at byte {offset}: {reason}")]
    Format {
        /// Byte offset where decoding failed
        offset: u64,
        /// What was wrong
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration, ambiguous selection, or lookup failure
    #[error(transparent)]
    Core(#[from] HyperscanError),
}

impl ImportError {
    /// Shorthand for a [`ImportError::Format`] error.
    pub fn format(offset: usize, reason: impl Into<String>) -> Self {
        Self::Format {
            offset: offset as u64,
            reason: reason.into(),
        }
    }

    /// Shorthand for a configuration error with stream context.
    pub fn configuration(context: &'static str, reason: impl Into<String>) -> Self {
        Self::Core(HyperscanError::configuration(context, reason))
    }
}

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message_names_offset() {
        let err = ImportError::format(12, "truncated chunk");
        assert_eq!(err.to_string(), "Invalid XDF at byte 12: truncated chunk");
    }

    #[test]
    fn test_core_errors_are_transparent() {
        let err: ImportError = HyperscanError::NotFound {
            what: "stream",
            query: "C-EEG".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "No stream matches 'C-EEG'");
    }
}
