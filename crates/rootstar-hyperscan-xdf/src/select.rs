//! Stream selection by index, name, or type

use std::fmt;
use std::str::FromStr;

use rootstar_hyperscan_core::{resolve_name, HyperscanError};
use serde::{Deserialize, Serialize};

use crate::error::ImportResult;
use crate::stream::StreamInfo;

/// How a caller names a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamQuery {
    /// Position in the file
    Index(usize),
    /// Exact name, or a unique case-insensitive substring of one
    Name(String),
}

impl FromStr for StreamQuery {
    type Err = std::convert::Infallible;

    /// All-digit strings are indices, anything else is a name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<usize>()
            .map_or_else(|_| Self::Name(s.to_string()), Self::Index))
    }
}

impl fmt::Display for StreamQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Resolve one query to a stream position.
///
/// # Errors
///
/// Returns [`HyperscanError::NotFound`] for an out-of-range index or an
/// unmatched name, and [`HyperscanError::AmbiguousSelection`] when a name
/// matches several streams.
pub fn resolve_stream<I: AsRef<StreamInfo>>(infos: &[I], query: &StreamQuery) -> ImportResult<usize> {
    match query {
        StreamQuery::Index(i) if *i < infos.len() => Ok(*i),
        StreamQuery::Index(i) => Err(HyperscanError::NotFound {
            what: "stream",
            query: format!("#{i} (file has {} streams)", infos.len()),
        }
        .into()),
        StreamQuery::Name(name) => {
            let names: Vec<&str> = infos.iter().map(|i| i.as_ref().name.as_str()).collect();
            Ok(resolve_name(&names, name, "stream")?)
        }
    }
}

/// Positions of every stream whose type matches `content_type`
/// case-insensitively.
///
/// # Errors
///
/// Returns [`HyperscanError::NotFound`] when no stream has that type.
pub fn find_by_type<I: AsRef<StreamInfo>>(infos: &[I], content_type: &str) -> ImportResult<Vec<usize>> {
    let found: Vec<usize> = infos
        .iter()
        .enumerate()
        .filter(|(_, info)| info.as_ref().content_type.eq_ignore_ascii_case(content_type))
        .map(|(i, _)| i)
        .collect();
    if found.is_empty() {
        return Err(HyperscanError::NotFound {
            what: "stream type",
            query: content_type.to_string(),
        }
        .into());
    }
    Ok(found)
}

impl AsRef<StreamInfo> for StreamInfo {
    fn as_ref(&self) -> &StreamInfo {
        self
    }
}
