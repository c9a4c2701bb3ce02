//! TOML analysis configuration
//!
//! ```toml
//! [import]
//! content_type = "EEG"
//! streams = ["A-EEG", "B-EEG"]
//!
//! [pairs]
//! self_pairs = "include"
//!
//! [connectivity]
//! kind = "neighbors"
//! diagonal = "linked"
//! edges = [[0, 1], [1, 2]]
//!
//! [metaconn]
//! mode = "pairs_only"
//! frequencies = [11.0, 12.0, 13.0]
//! output = "metaconn.json"
//! ```
//!
//! Analysis choices without a meaningful default (self-pair policy,
//! selection mode, diagonal) stay unset until the file or a flag names them.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rootstar_hyperscan_core::{
    ChannelConnectivity, Diagonal, ElectrodePosition, FrequencyBins, MatrixKind, SelectionMode,
    SelfPairs,
};
use rootstar_hyperscan_xdf::ImportOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub import: ImportOptions,

    #[serde(default)]
    pub pairs: PairsConfig,

    #[serde(default)]
    pub connectivity: ConnectivityConfig,

    #[serde(default)]
    pub metaconn: MetaconnConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairsConfig {
    /// Homologous pair policy.
    pub self_pairs: Option<SelfPairs>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityKind {
    /// Each channel linked only to itself.
    #[default]
    Identity,
    /// Every channel linked to every other.
    FullyConnected,
    /// Explicit edge list.
    Neighbors,
    /// Electrodes within `radius` of each other.
    Positions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default)]
    pub kind: ConnectivityKind,

    pub diagonal: Option<Diagonal>,

    #[serde(default)]
    pub edges: Vec<(usize, usize)>,

    #[serde(default)]
    pub positions: Vec<ElectrodePosition>,

    pub radius: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaconnConfig {
    /// Inter-brain selection mode.
    pub mode: Option<SelectionMode>,

    /// Frequencies of interest (Hz).
    #[serde(default = "default_frequencies")]
    pub frequencies: Vec<f64>,

    /// Artifact path.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Store only the base matrix.
    #[serde(default)]
    pub base_only: bool,
}

// ── defaults ──

fn default_frequencies() -> Vec<f64> {
    vec![8.0, 9.0, 10.0, 11.0, 12.0]
}
fn default_output() -> PathBuf {
    PathBuf::from("metaconn.json")
}

impl Default for MetaconnConfig {
    fn default() -> Self {
        Self {
            mode: None,
            frequencies: default_frequencies(),
            output: default_output(),
            base_only: false,
        }
    }
}

impl AnalysisConfig {
    /// Load config from a path given on the command line.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("config file not found: {}", path.display());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: AnalysisConfig =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(cfg)
    }
}

impl PairsConfig {
    pub fn require_self_pairs(&self) -> Result<SelfPairs> {
        self.self_pairs
            .context("self-pair policy not set: pass --self-pairs or set pairs.self_pairs")
    }
}

impl ConnectivityConfig {
    /// Build the channel adjacency for `n_channels` per subject.
    pub fn build(&self, n_channels: usize) -> Result<ChannelConnectivity> {
        let conn = match self.kind {
            ConnectivityKind::Identity => ChannelConnectivity::identity(n_channels),
            ConnectivityKind::FullyConnected => {
                ChannelConnectivity::fully_connected(n_channels, self.require_diagonal()?)
            }
            ConnectivityKind::Neighbors => {
                ChannelConnectivity::from_neighbors(n_channels, &self.edges, self.require_diagonal()?)?
            }
            ConnectivityKind::Positions => {
                if self.positions.len() != n_channels {
                    bail!(
                        "connectivity.positions has {} entries, expected {n_channels}",
                        self.positions.len()
                    );
                }
                let radius = self
                    .radius
                    .context("connectivity.radius is required for kind = \"positions\"")?;
                ChannelConnectivity::from_positions(&self.positions, radius, self.require_diagonal()?)?
            }
        };
        Ok(conn)
    }

    fn require_diagonal(&self) -> Result<Diagonal> {
        self.diagonal
            .context("connectivity.diagonal must be \"linked\" or \"unlinked\" for this kind")
    }
}

impl MetaconnConfig {
    pub fn require_mode(&self) -> Result<SelectionMode> {
        self.mode
            .context("selection mode not set: pass --mode or set metaconn.mode")
    }

    pub fn bins(&self) -> Result<FrequencyBins> {
        Ok(FrequencyBins::new(self.frequencies.clone())?)
    }

    pub fn matrix_kind(&self) -> MatrixKind {
        if self.base_only {
            MatrixKind::Base
        } else {
            MatrixKind::Meta
        }
    }
}
