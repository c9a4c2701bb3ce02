//! Meta-connectivity expansion across subjects and frequency bins
//!
//! The expander turns a single-subject channel connectivity matrix `C`
//! (N×N) and a list of inter-brain sensor pairs into:
//!
//! - the base matrix `B` (2N×2N): `C` on both intra-brain quadrants, the
//!   inter-brain links in the top-right quadrant, nothing bottom-left;
//! - the meta matrix `M` (2N·F × 2N·F): `B` repeated F times on the block
//!   diagonal, false everywhere else.
//!
//! ```text
//!            f = 0          f = 1
//!        ┌─────┬─────┬─────┬─────┐
//!        │  C  │ A→B │     │     │
//! f = 0  ├─────┼─────┤  0  │  0  │
//!        │  0  │  C  │     │     │
//!        ├─────┴─────┼─────┼─────┤
//!        │           │  C  │ A→B │
//! f = 1  │     0     ├─────┼─────┤
//!        │           │  0  │  C  │
//!        └───────────┴─────┴─────┘
//! ```
//!
//! Entries in different frequency blocks are never linked: synchrony at one
//! bin must not be aggregated with synchrony at another. Only `B` is stored;
//! `M` is addressed through [`crate::layout::global_index`] and materialized
//! on request with [`MetaConnectivity::to_dense`].

use ndarray::{s, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connectivity::ChannelConnectivity;
use crate::error::{HyperscanError, HyperscanResult};
use crate::frequency::FrequencyBins;
use crate::layout::{checked_side, global_index, locate, meta_dim, Subject};
use crate::pairs::{SensorPair, SensorPairs};

/// How the inter-brain quadrant of the base matrix is gated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Linked iff the pair is listed
    PairsOnly,
    /// Linked iff the channels are connected in `C`
    ConnectivityOnly,
    /// Linked iff the pair is listed and the channels are connected
    PairsAndConnectivity,
}

impl SelectionMode {
    #[inline]
    const fn links(self, listed: bool, connected: bool) -> bool {
        match self {
            Self::PairsOnly => listed,
            Self::ConnectivityOnly => connected,
            Self::PairsAndConnectivity => listed && connected,
        }
    }

    /// Name used in artifacts and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PairsOnly => "pairs_only",
            Self::ConnectivityOnly => "connectivity_only",
            Self::PairsAndConnectivity => "pairs_and_connectivity",
        }
    }
}

/// Block-diagonal two-subject, F-frequency connectivity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MetaConnectivityRepr")]
pub struct MetaConnectivity {
    n_channels: usize,
    n_freq: usize,
    mode: SelectionMode,
    base: Array2<bool>,
}

#[derive(Deserialize)]
struct MetaConnectivityRepr {
    n_channels: usize,
    n_freq: usize,
    mode: SelectionMode,
    base: Array2<bool>,
}

impl TryFrom<MetaConnectivityRepr> for MetaConnectivity {
    type Error = HyperscanError;

    fn try_from(repr: MetaConnectivityRepr) -> HyperscanResult<Self> {
        meta_dim(repr.n_channels, repr.n_freq)?;
        check_base(repr.base.view(), repr.n_channels)?;
        Ok(Self {
            n_channels: repr.n_channels,
            n_freq: repr.n_freq,
            mode: repr.mode,
            base: repr.base,
        })
    }
}

/// A base matrix is `2N × 2N` with an empty bottom-left quadrant.
fn check_base(base: ArrayView2<'_, bool>, n_channels: usize) -> HyperscanResult<()> {
    let block = checked_side("meta-connectivity", &[2, n_channels])?;
    if base.dim() != (block, block) {
        return Err(HyperscanError::shape_mismatch(
            "meta-connectivity",
            format!("{block}x{block} base for N={n_channels}"),
            format!("{}x{}", base.nrows(), base.ncols()),
        ));
    }
    if let Some(((i, j), _)) = base
        .slice(s![n_channels.., ..n_channels])
        .indexed_iter()
        .find(|(_, &linked)| linked)
    {
        return Err(HyperscanError::configuration(
            "meta-connectivity",
            format!("base links subject B channel {i} to subject A channel {j}"),
        ));
    }
    Ok(())
}

impl MetaConnectivity {
    /// Expand channel connectivity and sensor pairs across `n_freq` bins.
    ///
    /// Duplicate pairs are treated as one. N = 0 or `n_freq` = 0 produce an
    /// empty meta matrix.
    ///
    /// # Errors
    ///
    /// Returns a configuration error, before anything is allocated for the
    /// output, when a pair falls outside the inter-brain quadrant of the
    /// N-channel layout implied by `connectivity`, or when `2·N·F` does not
    /// fit in `usize`.
    pub fn expand(
        connectivity: &ChannelConnectivity,
        pairs: &[SensorPair],
        n_freq: usize,
        mode: SelectionMode,
    ) -> HyperscanResult<Self> {
        let n = connectivity.n_channels();
        meta_dim(n, n_freq)?;

        let mut listed = Array2::from_elem((n, n), false);
        for pair in pairs {
            let (a, b) = pair.local(n)?;
            listed[[a, b]] = true;
        }

        let mut base = Array2::from_elem((2 * n, 2 * n), false);
        let intra = connectivity.matrix();
        base.slice_mut(s![..n, ..n]).assign(&intra);
        base.slice_mut(s![n.., n..]).assign(&intra);
        for i in 0..n {
            for j in 0..n {
                let row = global_index(n, Subject::A, i, 0);
                let column = global_index(n, Subject::B, j, 0);
                base[[row, column]] = mode.links(listed[[i, j]], intra[[i, j]]);
            }
        }

        debug!(
            n_channels = n,
            n_freq,
            n_pairs = pairs.len(),
            mode = mode.as_str(),
            "Expanded meta-connectivity"
        );

        Ok(Self {
            n_channels: n,
            n_freq,
            mode,
            base,
        })
    }

    /// [`Self::expand`] over a built pair list, checking that it was built
    /// for the same channel count as `connectivity`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the channel counts differ.
    pub fn for_pairs(
        connectivity: &ChannelConnectivity,
        pairs: &SensorPairs,
        n_freq: usize,
        mode: SelectionMode,
    ) -> HyperscanResult<Self> {
        if pairs.n_channels() != connectivity.n_channels() {
            return Err(HyperscanError::shape_mismatch(
                "meta-connectivity",
                format!("pairs for {} channels per subject", connectivity.n_channels()),
                format!("pairs for {}", pairs.n_channels()),
            ));
        }
        Self::expand(connectivity, pairs.as_slice(), n_freq, mode)
    }

    /// [`Self::expand`] with the bin count taken from `frequencies`.
    ///
    /// # Errors
    ///
    /// See [`Self::expand`].
    pub fn expand_bins(
        connectivity: &ChannelConnectivity,
        pairs: &[SensorPair],
        frequencies: &FrequencyBins,
        mode: SelectionMode,
    ) -> HyperscanResult<Self> {
        Self::expand(connectivity, pairs, frequencies.len(), mode)
    }

    /// Rebuild from a dense meta matrix, checking its block structure.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the shape is not
    /// `2·N·F × 2·N·F`, when an entry outside the block diagonal is set, or
    /// when a block differs from block 0.
    pub fn from_dense(
        dense: ArrayView2<'_, bool>,
        n_channels: usize,
        n_freq: usize,
        mode: SelectionMode,
    ) -> HyperscanResult<Self> {
        let block = checked_side("meta-connectivity", &[2, n_channels])?;
        let dim = meta_dim(n_channels, n_freq)?;
        if dense.dim() != (dim, dim) {
            return Err(HyperscanError::shape_mismatch(
                "meta-connectivity",
                format!("{dim}x{dim} for N={n_channels}, F={n_freq}"),
                format!("{}x{}", dense.nrows(), dense.ncols()),
            ));
        }

        let base = if dim == 0 {
            Array2::from_elem((block, block), false)
        } else {
            dense.slice(s![..block, ..block]).to_owned()
        };
        check_base(base.view(), n_channels)?;

        for ((a, b), &linked) in dense.indexed_iter() {
            let (Some(la), Some(lb)) = (locate(n_channels, a), locate(n_channels, b)) else {
                continue;
            };
            if la.frequency != lb.frequency {
                if linked {
                    return Err(HyperscanError::configuration(
                        "meta-connectivity",
                        format!(
                            "entry ({a}, {b}) links frequency block {} to block {}",
                            la.frequency, lb.frequency
                        ),
                    ));
                }
            } else if linked != base[[a % block, b % block]] {
                return Err(HyperscanError::configuration(
                    "meta-connectivity",
                    format!(
                        "entry ({a}, {b}) in frequency block {} differs from block 0",
                        la.frequency
                    ),
                ));
            }
        }

        Ok(Self {
            n_channels,
            n_freq,
            mode,
            base,
        })
    }

    /// Same base matrix replicated over a different number of bins.
    pub(crate) fn with_n_freq(self, n_freq: usize) -> Self {
        Self { n_freq, ..self }
    }

    /// Per-subject channel count N
    #[inline]
    #[must_use]
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Number of frequency bins F
    #[inline]
    #[must_use]
    pub fn n_freq(&self) -> usize {
        self.n_freq
    }

    /// Selection mode used to gate the inter-brain quadrant
    #[inline]
    #[must_use]
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Side length of one frequency block (2N)
    #[inline]
    #[must_use]
    pub fn block_len(&self) -> usize {
        2 * self.n_channels
    }

    /// Side length of the meta matrix (2N·F)
    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.block_len() * self.n_freq
    }

    /// Whether the meta matrix has no entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dim() == 0
    }

    /// The un-replicated base matrix `B` (2N×2N)
    #[must_use]
    pub fn base(&self) -> ArrayView2<'_, bool> {
        self.base.view()
    }

    /// The block for frequency `f`, identical to [`Self::base`] for every
    /// valid bin.
    #[must_use]
    pub fn block(&self, f: usize) -> Option<ArrayView2<'_, bool>> {
        (f < self.n_freq).then(|| self.base.view())
    }

    /// Entry `M[a, b]` of the meta matrix (false outside its bounds).
    #[must_use]
    pub fn get(&self, a: usize, b: usize) -> bool {
        if a >= self.dim() || b >= self.dim() {
            return false;
        }
        match (locate(self.n_channels, a), locate(self.n_channels, b)) {
            (Some(la), Some(lb)) if la.frequency == lb.frequency => {
                let row = global_index(self.n_channels, la.subject, la.channel, 0);
                let column = global_index(self.n_channels, lb.subject, lb.channel, 0);
                self.base[[row, column]]
            }
            _ => false,
        }
    }

    /// Whether subject-A channel `i` and subject-B channel `j` are linked at
    /// frequency block `f`.
    #[must_use]
    pub fn inter_brain(&self, i: usize, j: usize, f: usize) -> bool {
        if i >= self.n_channels || j >= self.n_channels {
            return false;
        }
        self.get(
            global_index(self.n_channels, Subject::A, i, f),
            global_index(self.n_channels, Subject::B, j, f),
        )
    }

    /// Number of true entries in the meta matrix
    #[must_use]
    pub fn n_links(&self) -> usize {
        self.base.iter().filter(|&&v| v).count() * self.n_freq
    }

    /// Global `(row, column)` of every true entry, block by block.
    pub fn linked_indices(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let block = self.block_len();
        (0..self.n_freq).flat_map(move |f| {
            self.base
                .indexed_iter()
                .filter(|(_, &linked)| linked)
                .map(move |((i, j), _)| (f * block + i, f * block + j))
        })
    }

    /// Materialize the dense meta matrix `M`.
    #[must_use]
    pub fn to_dense(&self) -> Array2<bool> {
        let block = self.block_len();
        let dim = self.dim();
        let mut dense = Array2::from_elem((dim, dim), false);
        if dim == 0 {
            return dense;
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            dense
                .axis_chunks_iter_mut(Axis(0), block)
                .into_par_iter()
                .enumerate()
                .for_each(|(f, mut rows)| {
                    rows.slice_mut(s![.., f * block..(f + 1) * block])
                        .assign(&self.base);
                });
        }

        #[cfg(not(feature = "parallel"))]
        for (f, mut rows) in dense.axis_chunks_iter_mut(Axis(0), block).enumerate() {
            rows.slice_mut(s![.., f * block..(f + 1) * block])
                .assign(&self.base);
        }

        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::Diagonal;
    use crate::layout::HyperLayout;
    use crate::pairs::{PairSelection, SelfPairs};

    fn pair(n: usize, a: usize, b: usize) -> SensorPair {
        SensorPair::from_local(n, a, b)
    }

    fn chain(n: usize) -> ChannelConnectivity {
        let edges: Vec<(usize, usize)> = (1..n).map(|i| (i - 1, i)).collect();
        ChannelConnectivity::from_neighbors(n, &edges, Diagonal::Linked).unwrap()
    }

    #[test]
    fn test_three_channel_scenario() {
        // S = {(0, 3), (1, 4)}, F = 3
        let conn = ChannelConnectivity::identity(3);
        let pairs = [SensorPair { row: 0, column: 3 }, SensorPair { row: 1, column: 4 }];
        let meta = MetaConnectivity::expand(&conn, &pairs, 3, SelectionMode::PairsOnly).unwrap();
        let dense = meta.to_dense();
        assert_eq!(dense.dim(), (18, 18));

        for f in 0..3 {
            let o = f * 6;
            for i in 0..3 {
                for j in 0..3 {
                    let expected = (i == 0 && j == 0) || (i == 1 && j == 1);
                    assert_eq!(dense[[o + i, o + 3 + j]], expected, "f={f} i={i} j={j}");
                    assert!(!dense[[o + 3 + j, o + i]]);
                }
            }
        }
    }

    #[test]
    fn test_no_leakage_across_frequency_blocks() {
        let layout = HyperLayout::with_channel_count(4);
        let pairs =
            SensorPairs::build(&layout, &PairSelection::Cartesian { self_pairs: SelfPairs::Include })
                .unwrap();
        let conn = ChannelConnectivity::fully_connected(4, Diagonal::Linked);
        let meta =
            MetaConnectivity::expand(&conn, pairs.as_slice(), 5, SelectionMode::PairsOnly).unwrap();
        let dense = meta.to_dense();

        for ((a, b), &linked) in dense.indexed_iter() {
            if a / 8 != b / 8 {
                assert!(!linked, "leak at ({a}, {b})");
            }
        }
    }

    #[test]
    fn test_periodicity_matches_base() {
        let n = 4;
        let conn = chain(n);
        let pairs = [pair(n, 0, 1), pair(n, 2, 2), pair(n, 3, 0)];
        let meta =
            MetaConnectivity::expand(&conn, &pairs, 3, SelectionMode::PairsOnly).unwrap();
        let dense = meta.to_dense();
        let base = meta.base();

        for f in 0..3 {
            for i in 0..n {
                for j in 0..n {
                    assert_eq!(dense[[f * 2 * n + i, f * 2 * n + n + j]], base[[i, n + j]]);
                    assert_eq!(meta.inter_brain(i, j, f), base[[i, n + j]]);
                }
            }
        }
    }

    #[test]
    fn test_intra_quadrants_copy_connectivity() {
        let conn = chain(3);
        let meta = MetaConnectivity::expand(&conn, &[], 1, SelectionMode::PairsOnly).unwrap();
        let base = meta.base();
        assert_eq!(base.slice(s![..3, ..3]), conn.matrix());
        assert_eq!(base.slice(s![3.., 3..]), conn.matrix());
        assert!(base.slice(s![3.., ..3]).iter().all(|&v| !v));
        assert!(base.slice(s![..3, 3..]).iter().all(|&v| !v));
    }

    #[test]
    fn test_selection_modes() {
        let n = 3;
        let conn = chain(n); // 0-1, 1-2 plus diagonal
        let pairs = [pair(n, 0, 2), pair(n, 1, 1)];

        let only_pairs =
            MetaConnectivity::expand(&conn, &pairs, 1, SelectionMode::PairsOnly).unwrap();
        let only_conn =
            MetaConnectivity::expand(&conn, &pairs, 1, SelectionMode::ConnectivityOnly).unwrap();
        let both =
            MetaConnectivity::expand(&conn, &pairs, 1, SelectionMode::PairsAndConnectivity)
                .unwrap();

        assert!(only_pairs.inter_brain(0, 2, 0));
        assert!(!only_pairs.inter_brain(0, 1, 0));

        assert!(!only_conn.inter_brain(0, 2, 0));
        assert!(only_conn.inter_brain(0, 1, 0));

        assert!(!both.inter_brain(0, 2, 0));
        assert!(both.inter_brain(1, 1, 0));
        assert!(!both.inter_brain(0, 1, 0));
    }

    #[test]
    fn test_duplicate_pairs_are_a_set() {
        let conn = ChannelConnectivity::identity(2);
        let once = [pair(2, 0, 1)];
        let twice = [pair(2, 0, 1), pair(2, 0, 1)];
        let a = MetaConnectivity::expand(&conn, &once, 2, SelectionMode::PairsOnly).unwrap();
        let b = MetaConnectivity::expand(&conn, &twice, 2, SelectionMode::PairsOnly).unwrap();
        assert_eq!(a.to_dense(), b.to_dense());
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let conn = chain(5);
        let pairs: Vec<SensorPair> = (0..5).map(|i| pair(5, i, 4 - i)).collect();
        let first =
            MetaConnectivity::expand(&conn, &pairs, 4, SelectionMode::PairsOnly).unwrap();
        let second =
            MetaConnectivity::expand(&conn, &pairs, 4, SelectionMode::PairsOnly).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_dense(), second.to_dense());
    }

    #[test]
    fn test_empty_inputs() {
        let zero_channels = MetaConnectivity::expand(
            &ChannelConnectivity::identity(0),
            &[],
            3,
            SelectionMode::PairsOnly,
        )
        .unwrap();
        assert!(zero_channels.is_empty());
        assert_eq!(zero_channels.to_dense().dim(), (0, 0));

        let zero_freq =
            MetaConnectivity::expand(&chain(3), &[pair(3, 0, 0)], 0, SelectionMode::PairsOnly)
                .unwrap();
        assert!(zero_freq.is_empty());
        assert_eq!(zero_freq.to_dense().dim(), (0, 0));
        assert_eq!(zero_freq.linked_indices().count(), 0);
    }

    #[test]
    fn test_non_square_connectivity_fails_before_expansion() {
        let rows = vec![vec![true, false], vec![false, true], vec![false, false]];
        let result = ChannelConnectivity::from_rows(&rows)
            .and_then(|conn| MetaConnectivity::expand(&conn, &[], 2, SelectionMode::PairsOnly));
        assert!(matches!(result, Err(HyperscanError::Configuration { .. })));
    }

    #[test]
    fn test_pair_outside_layout_fails() {
        let conn = ChannelConnectivity::identity(2);
        let bad = [SensorPair { row: 0, column: 5 }];
        let err = MetaConnectivity::expand(&conn, &bad, 1, SelectionMode::PairsOnly).unwrap_err();
        assert!(matches!(err, HyperscanError::Configuration { .. }));
    }

    #[test]
    fn test_for_pairs_rejects_channel_count_mismatch() {
        let layout = HyperLayout::with_channel_count(4);
        let pairs =
            SensorPairs::build(&layout, &PairSelection::Cartesian { self_pairs: SelfPairs::Only })
                .unwrap();
        let err = MetaConnectivity::for_pairs(
            &ChannelConnectivity::identity(3),
            &pairs,
            2,
            SelectionMode::PairsOnly,
        )
        .unwrap_err();
        assert!(err.to_string().contains("got pairs for 4"));

        let ok = MetaConnectivity::for_pairs(
            &ChannelConnectivity::identity(4),
            &pairs,
            2,
            SelectionMode::PairsOnly,
        )
        .unwrap();
        assert!(ok.inter_brain(3, 3, 1));
    }

    #[test]
    fn test_get_matches_dense() {
        let conn = chain(3);
        let pairs = [pair(3, 2, 0)];
        let meta = MetaConnectivity::expand(&conn, &pairs, 2, SelectionMode::PairsOnly).unwrap();
        let dense = meta.to_dense();
        for ((a, b), &v) in dense.indexed_iter() {
            assert_eq!(meta.get(a, b), v);
        }
        assert!(!meta.get(12, 0));
    }

    #[test]
    fn test_linked_indices_and_count() {
        let conn = ChannelConnectivity::identity(2);
        let pairs = [pair(2, 0, 1)];
        let meta = MetaConnectivity::expand(&conn, &pairs, 2, SelectionMode::PairsOnly).unwrap();
        let links: Vec<(usize, usize)> = meta.linked_indices().collect();
        // per block: 4 diagonal entries + 1 inter-brain link
        assert_eq!(meta.n_links(), 10);
        assert_eq!(links.len(), 10);
        assert!(links.contains(&(0, 3)));
        assert!(links.contains(&(4, 7)));
    }

    #[test]
    fn test_from_dense_round_trip() {
        let conn = chain(3);
        let pairs = [pair(3, 0, 1), pair(3, 2, 2)];
        let meta = MetaConnectivity::expand(&conn, &pairs, 3, SelectionMode::PairsOnly).unwrap();
        let rebuilt =
            MetaConnectivity::from_dense(meta.to_dense().view(), 3, 3, SelectionMode::PairsOnly)
                .unwrap();
        assert_eq!(rebuilt, meta);
    }

    #[test]
    fn test_from_dense_rejects_leakage() {
        let conn = ChannelConnectivity::identity(1);
        let meta = MetaConnectivity::expand(&conn, &[], 2, SelectionMode::PairsOnly).unwrap();
        let mut dense = meta.to_dense();
        dense[[0, 2]] = true;
        let err = MetaConnectivity::from_dense(dense.view(), 1, 2, SelectionMode::PairsOnly)
            .unwrap_err();
        assert!(err.to_string().contains("links frequency block 0 to block 1"));
    }

    #[test]
    fn test_from_dense_rejects_non_periodic_block() {
        let conn = ChannelConnectivity::identity(1);
        let meta = MetaConnectivity::expand(&conn, &[], 2, SelectionMode::PairsOnly).unwrap();
        let mut dense = meta.to_dense();
        dense[[2, 3]] = true;
        let err = MetaConnectivity::from_dense(dense.view(), 1, 2, SelectionMode::PairsOnly)
            .unwrap_err();
        assert!(err.to_string().contains("differs from block 0"));
    }

    #[test]
    fn test_from_dense_rejects_b_to_a_links() {
        let mut dense = Array2::from_elem((4, 4), false);
        dense[[3, 0]] = true;
        let err = MetaConnectivity::from_dense(dense.view(), 2, 1, SelectionMode::PairsOnly)
            .unwrap_err();
        assert!(err.to_string().contains("subject B channel 1 to subject A channel 0"));
    }

    #[test]
    fn test_huge_bin_count_is_rejected() {
        let conn = ChannelConnectivity::identity(2);
        let err = MetaConnectivity::expand(&conn, &[], usize::MAX, SelectionMode::PairsOnly)
            .unwrap_err();
        assert!(err.to_string().contains("overflows usize"));
    }

    #[test]
    fn test_serde_round_trip() {
        let meta = MetaConnectivity::expand(&chain(3), &[pair(3, 0, 2)], 2, SelectionMode::PairsOnly)
            .unwrap();
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(serde_json::from_str::<MetaConnectivity>(&json).unwrap(), meta);
    }

    #[test]
    fn test_deserialize_checks_base_shape() {
        // base sized for N = 1 but labelled N = 2
        let bad = MetaConnectivity {
            n_channels: 2,
            n_freq: 1,
            mode: SelectionMode::PairsOnly,
            base: Array2::from_elem((3, 3), false),
        };
        let json = serde_json::to_string(&bad).unwrap();
        let err = serde_json::from_str::<MetaConnectivity>(&json).unwrap_err();
        assert!(err.to_string().contains("expected 4x4 base for N=2, got 3x3"));
    }

    #[test]
    fn test_deserialize_checks_sizes() {
        let bad = MetaConnectivity {
            n_channels: 1,
            n_freq: usize::MAX,
            mode: SelectionMode::PairsOnly,
            base: Array2::from_elem((2, 2), false),
        };
        let json = serde_json::to_string(&bad).unwrap();
        assert!(serde_json::from_str::<MetaConnectivity>(&json).is_err());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_dense_matches_get() {
        let conn = chain(4);
        let pairs: Vec<SensorPair> = (0..4).map(|i| pair(4, i, 3 - i)).collect();
        let meta =
            MetaConnectivity::expand(&conn, &pairs, 5, SelectionMode::PairsAndConnectivity)
                .unwrap();
        let dim = meta.dim();
        let expected = Array2::from_shape_fn((dim, dim), |(a, b)| meta.get(a, b));
        assert_eq!(meta.to_dense(), expected);
    }

    #[test]
    fn test_from_dense_rejects_wrong_shape() {
        let dense = Array2::from_elem((5, 5), false);
        assert!(
            MetaConnectivity::from_dense(dense.view(), 1, 2, SelectionMode::PairsOnly).is_err()
        );
    }
}
