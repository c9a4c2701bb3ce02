//! Single-subject channel connectivity (adjacency)
//!
//! An N×N symmetric boolean matrix saying which channels of one head are
//! "linked" for aggregation, typically spatial neighbours. Indices are
//! subject-local and line up with [`crate::pairs::SensorPair::local`].

use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HyperscanError, HyperscanResult};
use crate::layout::checked_side;

/// Whether a channel counts as linked to itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagonal {
    /// (i, i) is linked
    Linked,
    /// (i, i) is not linked
    Unlinked,
}

impl Diagonal {
    #[inline]
    const fn value(self) -> bool {
        matches!(self, Self::Linked)
    }
}

/// Electrode position on the scalp, in any consistent unit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElectrodePosition {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate (0.0 for planar layouts)
    pub z: f64,
}

impl ElectrodePosition {
    /// Planar position
    #[must_use]
    pub const fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Euclidean distance to another position
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Symmetric N×N channel adjacency for one subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Array2<bool>", into = "Array2<bool>")]
pub struct ChannelConnectivity {
    matrix: Array2<bool>,
}

impl TryFrom<Array2<bool>> for ChannelConnectivity {
    type Error = HyperscanError;

    fn try_from(matrix: Array2<bool>) -> HyperscanResult<Self> {
        Self::from_matrix(matrix)
    }
}

impl From<ChannelConnectivity> for Array2<bool> {
    fn from(connectivity: ChannelConnectivity) -> Self {
        connectivity.matrix
    }
}

impl ChannelConnectivity {
    /// Wrap an existing matrix.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the matrix is not square or not
    /// symmetric.
    pub fn from_matrix(matrix: Array2<bool>) -> HyperscanResult<Self> {
        let (rows, cols) = matrix.dim();
        if rows != cols {
            return Err(HyperscanError::shape_mismatch(
                "channel connectivity",
                format!("square matrix ({rows}x{rows})"),
                format!("{rows}x{cols}"),
            ));
        }
        for i in 0..rows {
            for j in (i + 1)..cols {
                if matrix[[i, j]] != matrix[[j, i]] {
                    return Err(HyperscanError::configuration(
                        "channel connectivity",
                        format!("matrix is not symmetric at ({i}, {j})"),
                    ));
                }
            }
        }
        Ok(Self { matrix })
    }

    /// Build from nested rows, rejecting ragged or non-square input.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when any row length differs from the
    /// number of rows, or the result is not symmetric.
    pub fn from_rows(rows: &[Vec<bool>]) -> HyperscanResult<Self> {
        let n = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(HyperscanError::shape_mismatch(
                "channel connectivity",
                format!("{n} columns in every row"),
                format!("{} columns in row {i}", row.len()),
            ));
        }
        let matrix = Array2::from_shape_fn((n, n), |(i, j)| rows[i][j]);
        Self::from_matrix(matrix)
    }

    /// Build from an undirected edge list.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an edge references a channel
    /// outside `[0, n_channels)`.
    pub fn from_neighbors(
        n_channels: usize,
        edges: &[(usize, usize)],
        diagonal: Diagonal,
    ) -> HyperscanResult<Self> {
        let mut matrix = Self::with_diagonal(n_channels, diagonal);
        for &(i, j) in edges {
            if i >= n_channels || j >= n_channels {
                return Err(HyperscanError::configuration(
                    "channel connectivity",
                    format!("edge ({i}, {j}) out of range for {n_channels} channels"),
                ));
            }
            matrix[[i, j]] = true;
            matrix[[j, i]] = true;
        }
        Ok(Self { matrix })
    }

    /// Link every pair of channels whose positions lie within `radius`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a negative or non-finite radius, or
    /// a non-finite position.
    pub fn from_positions(
        positions: &[ElectrodePosition],
        radius: f64,
        diagonal: Diagonal,
    ) -> HyperscanResult<Self> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(HyperscanError::configuration(
                "channel connectivity",
                format!("neighbour radius must be finite and non-negative, got {radius}"),
            ));
        }
        if let Some(i) = positions
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
        {
            return Err(HyperscanError::configuration(
                "channel connectivity",
                format!("electrode position {i} is not finite"),
            ));
        }

        let n = positions.len();
        let matrix = Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                diagonal.value()
            } else {
                positions[i].distance(&positions[j]) <= radius
            }
        });
        debug!(
            n_channels = n,
            radius,
            n_links = matrix.iter().filter(|&&v| v).count(),
            "Built geometric channel connectivity"
        );
        Ok(Self { matrix })
    }

    /// Every channel linked to every other.
    #[must_use]
    pub fn fully_connected(n_channels: usize, diagonal: Diagonal) -> Self {
        let matrix =
            Array2::from_shape_fn((n_channels, n_channels), |(i, j)| i != j || diagonal.value());
        Self { matrix }
    }

    /// Each channel linked only to itself.
    #[must_use]
    pub fn identity(n_channels: usize) -> Self {
        Self {
            matrix: Self::with_diagonal(n_channels, Diagonal::Linked),
        }
    }

    fn with_diagonal(n_channels: usize, diagonal: Diagonal) -> Array2<bool> {
        let mut matrix = Array2::from_elem((n_channels, n_channels), false);
        if diagonal.value() {
            matrix.diag_mut().fill(true);
        }
        matrix
    }

    /// Channel count N
    #[inline]
    #[must_use]
    pub fn n_channels(&self) -> usize {
        self.matrix.nrows()
    }

    /// Whether channels `i` and `j` are linked (false when out of range)
    #[inline]
    #[must_use]
    pub fn is_linked(&self, i: usize, j: usize) -> bool {
        self.matrix.get([i, j]).copied().unwrap_or(false)
    }

    /// Borrow the matrix
    #[must_use]
    pub fn matrix(&self) -> ArrayView2<'_, bool> {
        self.matrix.view()
    }

    /// Neighbours of channel `i`, excluding `i` itself
    ///
    /// # Panics
    ///
    /// Panics if `i >= N`.
    pub fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.matrix
            .row(i)
            .into_iter()
            .enumerate()
            .filter(move |&(j, &linked)| linked && j != i)
            .map(|(j, _)| j)
    }

    /// Kronecker expansion `I_F ⊗ C`: one copy of the matrix per frequency
    /// bin on the block diagonal, `(N·F) × (N·F)`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `N·F` overflows.
    pub fn expand_frequencies(&self, n_freq: usize) -> HyperscanResult<Array2<bool>> {
        let n = self.n_channels();
        let side = checked_side("channel connectivity", &[n, n_freq])?;
        let mut expanded = Array2::from_elem((side, side), false);
        for f in 0..n_freq {
            let range = f * n..(f + 1) * n;
            expanded
                .slice_mut(s![range.clone(), range])
                .assign(&self.matrix);
        }
        Ok(expanded)
    }
}
