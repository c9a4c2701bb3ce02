//! Inter-brain sensor pair enumeration
//!
//! A sensor pair couples one channel of subject A with one channel of
//! subject B. Both ends are stored as merged (block 0) indices, so the
//! subject-B end is offset by N. This is also how spectral-connectivity
//! routines expect their `indices` argument: two parallel index vectors over
//! the concatenated channel list (see [`SensorPairs::split_indices`]).
//!
//! # Example
//!
//! ```rust
//! use rootstar_hyperscan_core::layout::HyperLayout;
//! use rootstar_hyperscan_core::pairs::{PairSelection, SelfPairs, SensorPairs};
//!
//! let layout = HyperLayout::with_channel_count(8);
//! let pairs = SensorPairs::build(
//!     &layout,
//!     &PairSelection::Cartesian { self_pairs: SelfPairs::Include },
//! )?;
//! assert_eq!(pairs.len(), 64);
//! # Ok::<(), rootstar_hyperscan_core::HyperscanError>(())
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HyperscanError, HyperscanResult};
use crate::layout::{checked_side, global_index, locate, HyperLayout, Subject};

/// One (subject A channel, subject B channel) combination.
///
/// `row` is subject A's channel index; `column` is subject B's channel
/// index plus N. Ordering is row-major.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorPair {
    /// Merged index of the subject-A channel
    pub row: usize,
    /// Merged index of the subject-B channel (offset by N)
    pub column: usize,
}

impl SensorPair {
    /// Build a pair from subject-local channel indices.
    #[inline]
    #[must_use]
    pub const fn from_local(n_channels: usize, channel_a: usize, channel_b: usize) -> Self {
        Self {
            row: global_index(n_channels, Subject::A, channel_a, 0),
            column: global_index(n_channels, Subject::B, channel_b, 0),
        }
    }

    /// Subject-local `(channel_a, channel_b)` indices.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `row` is not a subject-A index or
    /// `column` is not a subject-B index of an N-channel layout.
    pub fn local(self, n_channels: usize) -> HyperscanResult<(usize, usize)> {
        let a = locate(n_channels, self.row);
        let b = locate(n_channels, self.column);
        match (a, b) {
            (Some(a), Some(b))
                if a.frequency == 0
                    && b.frequency == 0
                    && a.subject == Subject::A
                    && b.subject == Subject::B =>
            {
                Ok((a.channel, b.channel))
            }
            _ => Err(HyperscanError::configuration(
                "sensor pair",
                format!(
                    "pair ({}, {}) outside inter-brain quadrant: expected row < {n_channels} and {n_channels} <= column < {}",
                    self.row,
                    self.column,
                    n_channels.saturating_mul(2)
                ),
            )),
        }
    }

    /// Whether both ends refer to the same channel position on each head
    #[inline]
    #[must_use]
    pub const fn is_homologous(self, n_channels: usize) -> bool {
        self.row + n_channels == self.column
    }
}

/// Policy for homologous (i ↔ i) pairs in a Cartesian selection.
///
/// There is no default. Whether a channel is paired with its counterpart on
/// the other head is an analysis decision.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfPairs {
    /// Keep i ↔ i pairs (full N×N product)
    Include,
    /// Drop i ↔ i pairs (N² − N pairs)
    Exclude,
    /// Keep only i ↔ i pairs (N pairs)
    Only,
}

impl SelfPairs {
    #[inline]
    const fn keeps(self, channel_a: usize, channel_b: usize) -> bool {
        match self {
            Self::Include => true,
            Self::Exclude => channel_a != channel_b,
            Self::Only => channel_a == channel_b,
        }
    }
}

/// Which inter-brain combinations to enumerate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PairSelection {
    /// Every subject-A channel against every subject-B channel
    Cartesian {
        /// Homologous pair policy
        self_pairs: SelfPairs,
    },
    /// Explicit subject-local `(channel_a, channel_b)` pairs
    Subset {
        /// Local index pairs
        pairs: Vec<(usize, usize)>,
    },
    /// Explicit `(name_a, name_b)` pairs resolved against the layout
    Named {
        /// Channel name pairs
        pairs: Vec<(String, String)>,
    },
}

/// Deduplicated, row-major list of inter-brain sensor pairs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SensorPairsRepr")]
pub struct SensorPairs {
    n_channels: usize,
    pairs: Vec<SensorPair>,
}

#[derive(Deserialize)]
struct SensorPairsRepr {
    n_channels: usize,
    pairs: Vec<SensorPair>,
}

impl TryFrom<SensorPairsRepr> for SensorPairs {
    type Error = HyperscanError;

    fn try_from(repr: SensorPairsRepr) -> HyperscanResult<Self> {
        Self::from_pairs(repr.n_channels, repr.pairs)
    }
}

impl SensorPairs {
    /// Enumerate pairs over a layout.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for out-of-range subset indices, and
    /// selection errors for unresolved or ambiguous names.
    pub fn build(layout: &HyperLayout, selection: &PairSelection) -> HyperscanResult<Self> {
        let n = layout.n_channels();
        let pairs = match selection {
            PairSelection::Cartesian { self_pairs } => (0..n)
                .flat_map(|a| (0..n).map(move |b| (a, b)))
                .filter(|&(a, b)| self_pairs.keeps(a, b))
                .map(|(a, b)| SensorPair::from_local(n, a, b))
                .collect(),
            PairSelection::Subset { pairs } => pairs
                .iter()
                .map(|&(a, b)| {
                    if a >= n || b >= n {
                        return Err(HyperscanError::configuration(
                            "sensor pair subset",
                            format!("local pair ({a}, {b}) out of range for {n} channels per subject"),
                        ));
                    }
                    Ok(SensorPair::from_local(n, a, b))
                })
                .collect::<HyperscanResult<Vec<_>>>()?,
            PairSelection::Named { pairs } => pairs
                .iter()
                .map(|(name_a, name_b)| {
                    let a = layout.resolve_channel(Subject::A, name_a)?;
                    let b = layout.resolve_channel(Subject::B, name_b)?;
                    Ok(SensorPair::from_local(n, a, b))
                })
                .collect::<HyperscanResult<Vec<_>>>()?,
        };

        let built = Self::from_pairs(n, pairs)?;
        debug!(
            n_channels = n,
            n_pairs = built.len(),
            "Built inter-brain sensor pairs"
        );
        Ok(built)
    }

    /// Enumerate pairs over a merged channel list (A's channels then B's).
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the merged count is odd, plus any
    /// error from [`Self::build`].
    pub fn from_merged(merged: Vec<String>, selection: &PairSelection) -> HyperscanResult<Self> {
        let layout = HyperLayout::from_merged(merged)?;
        Self::build(&layout, selection)
    }

    /// Wrap already-built pairs, validating, sorting and deduplicating them.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when any pair lies outside the
    /// inter-brain quadrant of an N-channel layout, or `2N` overflows.
    pub fn from_pairs(n_channels: usize, mut pairs: Vec<SensorPair>) -> HyperscanResult<Self> {
        checked_side("sensor pairs", &[2, n_channels])?;
        for pair in &pairs {
            pair.local(n_channels)?;
        }
        pairs.sort_unstable();
        pairs.dedup();
        Ok(Self { n_channels, pairs })
    }

    /// Per-subject channel count the pairs were built for
    #[inline]
    #[must_use]
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Number of pairs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no pairs
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs in row-major order
    #[must_use]
    pub fn as_slice(&self) -> &[SensorPair] {
        &self.pairs
    }

    /// Iterate pairs in row-major order
    pub fn iter(&self) -> std::slice::Iter<'_, SensorPair> {
        self.pairs.iter()
    }

    /// Position of a pair in the list, if present
    #[must_use]
    pub fn position(&self, pair: SensorPair) -> Option<usize> {
        self.pairs.binary_search(&pair).ok()
    }

    /// Whether the list contains `pair`
    #[must_use]
    pub fn contains(&self, pair: SensorPair) -> bool {
        self.position(pair).is_some()
    }

    /// Pairs as subject-local `(channel_a, channel_b)` indices
    pub fn local_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n = self.n_channels;
        self.pairs.iter().map(move |p| (p.row, p.column - n))
    }

    /// Two parallel vectors `(rows, columns)` of merged indices.
    #[must_use]
    pub fn split_indices(&self) -> (Vec<usize>, Vec<usize>) {
        self.pairs.iter().map(|p| (p.row, p.column)).unzip()
    }
}

impl<'a> IntoIterator for &'a SensorPairs {
    type Item = &'a SensorPair;
    type IntoIter = std::slice::Iter<'a, SensorPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}
