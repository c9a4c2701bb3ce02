//! Name-based lookup shared by stream and channel selection
//!
//! Resolution is a two-step process: an exact match wins outright; otherwise
//! the query must be a case-insensitive substring of exactly one candidate.
//! Several candidates are an error, never a silent pick.

use crate::error::{HyperscanError, HyperscanResult};

/// Resolve `query` against `candidates`, returning the matching position.
///
/// `what` names the kind of item in error messages ("stream", "channel").
///
/// # Errors
///
/// - [`HyperscanError::AmbiguousSelection`] when the query is not an exact
///   match and is a substring of more than one candidate (or when several
///   candidates match exactly).
/// - [`HyperscanError::NotFound`] when nothing matches.
pub fn resolve_name<S: AsRef<str>>(
    candidates: &[S],
    query: &str,
    what: &'static str,
) -> HyperscanResult<usize> {
    let exact: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.as_ref() == query)
        .map(|(i, _)| i)
        .collect();

    match exact.as_slice() {
        [only] => return Ok(*only),
        [] => {}
        _ => return Err(ambiguous(candidates, &exact, query, what)),
    }

    let needle = query.to_lowercase();
    let partial: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.as_ref().to_lowercase().contains(&needle))
        .map(|(i, _)| i)
        .collect();

    match partial.as_slice() {
        [only] => Ok(*only),
        [] => Err(HyperscanError::NotFound {
            what,
            query: query.to_string(),
        }),
        _ => Err(ambiguous(candidates, &partial, query, what)),
    }
}

fn ambiguous<S: AsRef<str>>(
    candidates: &[S],
    matches: &[usize],
    query: &str,
    what: &'static str,
) -> HyperscanError {
    HyperscanError::AmbiguousSelection {
        what,
        query: query.to_string(),
        candidates: matches
            .iter()
            .map(|&i| candidates[i].as_ref().to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAMS: [&str; 3] = ["A-EEG", "B-EEG", "Markers"];

    #[test]
    fn test_exact_match() {
        assert_eq!(resolve_name(&STREAMS, "B-EEG", "stream"), Ok(1));
    }

    #[test]
    fn test_unique_substring_case_insensitive() {
        assert_eq!(resolve_name(&STREAMS, "marker", "stream"), Ok(2));
        assert_eq!(resolve_name(&STREAMS, "a-eeg", "stream"), Ok(0));
    }

    #[test]
    fn test_exact_beats_substring() {
        let names = ["EEG", "EEG-aux"];
        assert_eq!(resolve_name(&names, "EEG", "stream"), Ok(0));
    }

    #[test]
    fn test_ambiguous_substring() {
        let err = resolve_name(&STREAMS, "eeg", "stream").unwrap_err();
        assert_eq!(
            err,
            HyperscanError::AmbiguousSelection {
                what: "stream",
                query: "eeg".to_string(),
                candidates: vec!["A-EEG".to_string(), "B-EEG".to_string()],
            }
        );
    }

    #[test]
    fn test_duplicate_exact_names_are_ambiguous() {
        let names = ["EEG", "EEG"];
        assert!(matches!(
            resolve_name(&names, "EEG", "stream"),
            Err(HyperscanError::AmbiguousSelection { .. })
        ));
    }

    #[test]
    fn test_not_found() {
        assert!(matches!(
            resolve_name(&STREAMS, "fNIRS", "stream"),
            Err(HyperscanError::NotFound { what: "stream", .. })
        ));
    }
}
