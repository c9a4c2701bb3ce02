//! Adjacency between inter-brain sensor pairs
//!
//! Cluster statistics over pair-indexed synchrony values need to know which
//! pairs are neighbours. Two pairs `p = (a1, b1)` and `q = (a2, b2)` are
//! linked when both ends are connected, when one end is connected and the
//! other is shared, or when they are the same pair:
//!
//! ```text
//! (C[a1,a2] && C[b1,b2]) || (C[a1,a2] && b1 == b2)
//!     || (C[b1,b2] && a1 == a2) || (a1 == a2 && b1 == b2)
//! ```
//!
//! The P×P result is replicated once per frequency bin on the block
//! diagonal, with index `f·P + pair_position`.

use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connectivity::ChannelConnectivity;
use crate::error::{HyperscanError, HyperscanResult};
use crate::layout::checked_side;
use crate::pairs::SensorPairs;

/// Pair-level connectivity, block-diagonal across frequency bins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PairNeighborhoodRepr")]
pub struct PairNeighborhood {
    n_freq: usize,
    base: Array2<bool>,
}

#[derive(Deserialize)]
struct PairNeighborhoodRepr {
    n_freq: usize,
    base: Array2<bool>,
}

impl TryFrom<PairNeighborhoodRepr> for PairNeighborhood {
    type Error = HyperscanError;

    fn try_from(repr: PairNeighborhoodRepr) -> HyperscanResult<Self> {
        let (rows, cols) = repr.base.dim();
        if rows != cols {
            return Err(HyperscanError::shape_mismatch(
                "pair neighborhood",
                format!("square base ({rows}x{rows})"),
                format!("{rows}x{cols}"),
            ));
        }
        checked_side("pair neighborhood", &[rows, repr.n_freq])?;
        Ok(Self {
            n_freq: repr.n_freq,
            base: repr.base,
        })
    }
}

impl PairNeighborhood {
    /// Compute the neighbourhood of every pair in `pairs`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `pairs` was built for a different
    /// channel count than `connectivity`, or when `P·F` overflows.
    pub fn expand(
        connectivity: &ChannelConnectivity,
        pairs: &SensorPairs,
        n_freq: usize,
    ) -> HyperscanResult<Self> {
        let n = connectivity.n_channels();
        if pairs.n_channels() != n {
            return Err(HyperscanError::shape_mismatch(
                "pair neighborhood",
                format!("pairs for {n} channels per subject"),
                format!("pairs for {}", pairs.n_channels()),
            ));
        }

        checked_side("pair neighborhood", &[pairs.len(), n_freq])?;

        let local: Vec<(usize, usize)> = pairs.local_pairs().collect();
        let p = local.len();
        let base = Array2::from_shape_fn((p, p), |(u, v)| {
            let (a1, b1) = local[u];
            let (a2, b2) = local[v];
            let linked_a = connectivity.is_linked(a1, a2);
            let linked_b = connectivity.is_linked(b1, b2);
            (linked_a && linked_b)
                || (linked_a && b1 == b2)
                || (linked_b && a1 == a2)
                || (a1 == a2 && b1 == b2)
        });

        debug!(n_pairs = p, n_freq, "Expanded pair neighborhood");
        Ok(Self { n_freq, base })
    }

    /// Number of pairs P
    #[inline]
    #[must_use]
    pub fn n_pairs(&self) -> usize {
        self.base.nrows()
    }

    /// Number of frequency bins F
    #[inline]
    #[must_use]
    pub fn n_freq(&self) -> usize {
        self.n_freq
    }

    /// Side length of the replicated matrix (P·F)
    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.n_pairs() * self.n_freq
    }

    /// The P×P pair adjacency
    #[must_use]
    pub fn base(&self) -> ArrayView2<'_, bool> {
        self.base.view()
    }

    /// Entry of the replicated matrix (false outside its bounds).
    #[must_use]
    pub fn get(&self, u: usize, v: usize) -> bool {
        let p = self.n_pairs();
        if u >= self.dim() || v >= self.dim() || u / p != v / p {
            return false;
        }
        self.base[[u % p, v % p]]
    }

    /// Materialize the `P·F × P·F` block-diagonal matrix.
    #[must_use]
    pub fn to_dense(&self) -> Array2<bool> {
        let p = self.n_pairs();
        let dim = self.dim();
        let mut dense = Array2::from_elem((dim, dim), false);
        for f in 0..self.n_freq {
            dense
                .slice_mut(s![f * p..(f + 1) * p, f * p..(f + 1) * p])
                .assign(&self.base);
        }
        dense
    }
}
