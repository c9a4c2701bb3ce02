//! JSON persistence for meta-connectivity results
//!
//! The artifact stores the dense matrix row-major as 0/1 bytes next to the
//! metadata needed to interpret it: channel count, bins, subject names,
//! merged channel names and the selection mode.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::HyperscanError;
use crate::frequency::FrequencyBins;
use crate::layout::{checked_side, meta_dim, HyperLayout};
use crate::metaconn::{MetaConnectivity, SelectionMode};

// ============================================================================
// Errors
// ============================================================================

/// Errors from saving or loading an artifact.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inconsistent artifact contents
    #[error(transparent)]
    Core(#[from] HyperscanError),
}

/// Result type for artifact operations.
pub type ArtifactResult<T> = Result<T, ArtifactError>;

// ============================================================================
// Artifact
// ============================================================================

/// Which matrix the artifact holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixKind {
    /// The full `2N·F × 2N·F` meta matrix
    Meta,
    /// Only the `2N × 2N` base matrix
    Base,
}

/// Serializable meta-connectivity result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityArtifact {
    /// Stored matrix
    pub kind: MatrixKind,
    /// Per-subject channel count N
    pub n_channels: usize,
    /// Number of frequency bins F
    pub n_freq: usize,
    /// Bin values, when known
    pub frequencies: Option<FrequencyBins>,
    /// Subject names in merged order
    pub subjects: [String; 2],
    /// Merged channel names (A then B)
    pub channel_names: Vec<String>,
    /// Inter-brain selection mode
    pub mode: SelectionMode,
    /// `[rows, columns]` of `data`
    pub shape: [usize; 2],
    /// Row-major matrix entries, 0 or 1
    pub data: Vec<u8>,
}

impl ConnectivityArtifact {
    /// Capture a meta-connectivity result over `layout`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the layout channel count differs
    /// from the meta matrix's.
    pub fn new(
        meta: &MetaConnectivity,
        layout: &HyperLayout,
        kind: MatrixKind,
    ) -> Result<Self, HyperscanError> {
        if layout.n_channels() != meta.n_channels() {
            return Err(HyperscanError::shape_mismatch(
                "connectivity artifact",
                format!("layout with {} channels per subject", meta.n_channels()),
                format!("{} channels", layout.n_channels()),
            ));
        }

        let matrix = match kind {
            MatrixKind::Meta => meta.to_dense(),
            MatrixKind::Base => meta.base().to_owned(),
        };
        let (rows, columns) = matrix.dim();

        Ok(Self {
            kind,
            n_channels: meta.n_channels(),
            n_freq: meta.n_freq(),
            frequencies: None,
            subjects: ["A".to_string(), "B".to_string()],
            channel_names: layout.channels().map(|c| c.name.to_string()).collect(),
            mode: meta.mode(),
            shape: [rows, columns],
            data: matrix.iter().map(|&v| u8::from(v)).collect(),
        })
    }

    /// Attach the bin values.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the bin count is not F.
    pub fn with_frequencies(mut self, frequencies: FrequencyBins) -> Result<Self, HyperscanError> {
        if frequencies.len() != self.n_freq {
            return Err(HyperscanError::shape_mismatch(
                "connectivity artifact",
                format!("{} frequency bins", self.n_freq),
                frequencies.len(),
            ));
        }
        self.frequencies = Some(frequencies);
        Ok(self)
    }

    /// Name the two subjects (e.g. after their source streams).
    #[must_use]
    pub fn with_subjects(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.subjects = [a.into(), b.into()];
        self
    }

    /// Check that every field agrees with `n_channels` and `n_freq`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first inconsistent field.
    pub fn validate(&self) -> Result<(), HyperscanError> {
        let block = checked_side("connectivity artifact", &[2, self.n_channels])?;
        let dim = meta_dim(self.n_channels, self.n_freq)?;
        let side = match self.kind {
            MatrixKind::Meta => dim,
            MatrixKind::Base => block,
        };
        if self.shape != [side, side] {
            return Err(HyperscanError::shape_mismatch(
                "connectivity artifact",
                format!("shape [{side}, {side}] for N={}, F={}", self.n_channels, self.n_freq),
                format!("[{}, {}]", self.shape[0], self.shape[1]),
            ));
        }
        if self.data.len() != side * side {
            return Err(HyperscanError::shape_mismatch(
                "connectivity artifact",
                format!("{} data entries", side * side),
                self.data.len(),
            ));
        }
        if let Some(position) = self.data.iter().position(|&v| v > 1) {
            return Err(HyperscanError::configuration(
                "connectivity artifact",
                format!("data entry {position} is {}, expected 0 or 1", self.data[position]),
            ));
        }
        if self.channel_names.len() != block {
            return Err(HyperscanError::shape_mismatch(
                "connectivity artifact",
                format!("{block} channel names"),
                self.channel_names.len(),
            ));
        }
        if let Some(frequencies) = &self.frequencies {
            if frequencies.len() != self.n_freq {
                return Err(HyperscanError::shape_mismatch(
                    "connectivity artifact",
                    format!("{} frequency bins", self.n_freq),
                    frequencies.len(),
                ));
            }
        }
        Ok(())
    }

    /// Rebuild the meta-connectivity value.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the artifact is inconsistent or
    /// its matrix is not block-diagonal and periodic.
    pub fn to_meta(&self) -> Result<MetaConnectivity, HyperscanError> {
        self.validate()?;
        let side = self.shape[0];
        let dense = ndarray::Array2::from_shape_fn((side, side), |(i, j)| {
            self.data[i * side + j] == 1
        });
        match self.kind {
            MatrixKind::Meta => {
                MetaConnectivity::from_dense(dense.view(), self.n_channels, self.n_freq, self.mode)
            }
            MatrixKind::Base => {
                MetaConnectivity::from_dense(dense.view(), self.n_channels, 1, self.mode)
                    .map(|meta| meta.with_n_freq(self.n_freq))
            }
        }
    }

    /// Rebuild the channel layout.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an odd channel name count.
    pub fn layout(&self) -> Result<HyperLayout, HyperscanError> {
        HyperLayout::from_merged(self.channel_names.clone())
    }

    /// Write as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns IO or serialization errors.
    pub fn save(&self, path: impl AsRef<Path>) -> ArtifactResult<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        info!(
            path = %path.display(),
            shape = ?self.shape,
            "Saved connectivity artifact"
        );
        Ok(())
    }

    /// Read and validate an artifact.
    ///
    /// # Errors
    ///
    /// Returns IO, JSON, or validation errors.
    pub fn load(path: impl AsRef<Path>) -> ArtifactResult<Self> {
        let path = path.as_ref();
        let artifact: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        artifact.validate()?;
        debug!(path = %path.display(), shape = ?artifact.shape, "Loaded connectivity artifact");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{ChannelConnectivity, Diagonal};
    use crate::pairs::SensorPair;
    use tempfile::tempdir;

    fn sample() -> (MetaConnectivity, HyperLayout) {
        let conn = ChannelConnectivity::from_neighbors(3, &[(0, 1)], Diagonal::Linked).unwrap();
        let pairs = [SensorPair::from_local(3, 0, 0), SensorPair::from_local(3, 1, 2)];
        let meta = MetaConnectivity::expand(&conn, &pairs, 2, SelectionMode::PairsOnly).unwrap();
        (meta, HyperLayout::with_channel_count(3))
    }

    #[test]
    fn test_save_load_reconstructs_meta() {
        let (meta, layout) = sample();
        let artifact = ConnectivityArtifact::new(&meta, &layout, MatrixKind::Meta)
            .unwrap()
            .with_frequencies(FrequencyBins::new(vec![11.0, 12.0]).unwrap())
            .unwrap()
            .with_subjects("A-EEG", "B-EEG");

        let dir = tempdir().unwrap();
        let path = dir.path().join("metaconn.json");
        artifact.save(&path).unwrap();

        let loaded = ConnectivityArtifact::load(&path).unwrap();
        assert_eq!(loaded, artifact);
        assert_eq!(loaded.to_meta().unwrap(), meta);
        assert_eq!(loaded.layout().unwrap(), layout);
    }

    #[test]
    fn test_base_artifact_keeps_bin_count() {
        let (meta, layout) = sample();
        let artifact = ConnectivityArtifact::new(&meta, &layout, MatrixKind::Base).unwrap();
        assert_eq!(artifact.shape, [6, 6]);
        assert_eq!(artifact.to_meta().unwrap(), meta);
    }

    #[test]
    fn test_layout_mismatch() {
        let (meta, _) = sample();
        let layout = HyperLayout::with_channel_count(2);
        assert!(ConnectivityArtifact::new(&meta, &layout, MatrixKind::Meta).is_err());
    }

    #[test]
    fn test_wrong_frequency_count() {
        let (meta, layout) = sample();
        let artifact = ConnectivityArtifact::new(&meta, &layout, MatrixKind::Meta).unwrap();
        assert!(artifact
            .with_frequencies(FrequencyBins::new(vec![10.0]).unwrap())
            .is_err());
    }

    #[test]
    fn test_load_rejects_bad_shape() {
        let (meta, layout) = sample();
        let mut artifact = ConnectivityArtifact::new(&meta, &layout, MatrixKind::Meta).unwrap();
        artifact.shape = [6, 6];

        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let json = serde_json::to_string(&artifact).unwrap();
        std::fs::write(&path, json).unwrap();

        let err = ConnectivityArtifact::load(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::Core(HyperscanError::Configuration { .. })));
    }

    #[test]
    fn test_load_rejects_oversized_dimensions() {
        let (meta, layout) = sample();
        let dir = tempdir().unwrap();

        for kind in [MatrixKind::Meta, MatrixKind::Base] {
            let mut artifact = ConnectivityArtifact::new(&meta, &layout, kind).unwrap();
            artifact.n_channels = usize::MAX / 2;
            assert!(matches!(
                artifact.validate(),
                Err(HyperscanError::Configuration { .. })
            ));

            let path = dir.path().join("huge.json");
            std::fs::write(&path, serde_json::to_string(&artifact).unwrap()).unwrap();
            let err = ConnectivityArtifact::load(&path).unwrap_err();
            assert!(err.to_string().contains("overflows usize"));
        }
    }

    #[test]
    fn test_to_meta_rejects_leakage() {
        let (meta, layout) = sample();
        let mut artifact = ConnectivityArtifact::new(&meta, &layout, MatrixKind::Meta).unwrap();
        // row 0, column 6 crosses into frequency block 1
        artifact.data[6] = 1;
        assert!(artifact.to_meta().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = ConnectivityArtifact::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ArtifactError::Io(_)));
    }
}
