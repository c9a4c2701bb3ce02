//! Error types for hyperscanning analysis
//!
//! Every failure in the core is raised before a matrix is materialized, so a
//! caller never receives a partially built structure with shifted indices.

use thiserror::Error;

/// Errors raised by layout, pairing, and connectivity construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HyperscanError {
    /// Malformed or inconsistent input shapes
    #[error("Configuration error in {context}: {reason}")]
    Configuration {
        /// Operation or input that was rejected
        context: &'static str,
        /// What was wrong, including expected vs actual where known
        reason: String,
    },

    /// A name lookup matched several candidates
    #[error("Ambiguous {what} query '{query}': matches {}", candidates.join(", "))]
    AmbiguousSelection {
        /// Kind of item being looked up (e.g. "stream", "channel")
        what: &'static str,
        /// The query as given by the caller
        query: String,
        /// Every candidate name that matched
        candidates: Vec<String>,
    },

    /// A lookup matched nothing
    #[error("No {what} matches '{query}'")]
    NotFound {
        /// Kind of item being looked up
        what: &'static str,
        /// The query as given by the caller
        query: String,
    },
}

impl HyperscanError {
    /// Shorthand for a [`HyperscanError::Configuration`] error.
    pub fn configuration(context: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            context,
            reason: reason.into(),
        }
    }

    /// Shorthand for a shape mismatch, formatted as expected vs actual.
    pub fn shape_mismatch(
        context: &'static str,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::configuration(context, format!("expected {expected}, got {actual}"))
    }
}

/// Result type for core operations
pub type HyperscanResult<T> = Result<T, HyperscanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = HyperscanError::AmbiguousSelection {
            what: "stream",
            query: "eeg".to_string(),
            candidates: vec!["A-EEG".to_string(), "B-EEG".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous stream query 'eeg': matches A-EEG, B-EEG"
        );
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = HyperscanError::shape_mismatch("channel connectivity", "3x3", "3x2");
        assert_eq!(
            err.to_string(),
            "Configuration error in channel connectivity: expected 3x3, got 3x2"
        );
    }
}
