//! Rootstar Hyperscan Core - inter-brain connectivity structures
//!
//! This crate maps two simultaneously recorded EEG subjects into a single
//! merged sensor space and builds the boolean structures used to aggregate
//! inter-brain synchrony: sensor pairs, channel adjacency, and the
//! frequency-expanded meta-connectivity matrix.
//!
//! # Modules
//!
//! - [`layout`]: Merged two-subject layout and the global index mapping
//! - [`pairs`]: Inter-brain sensor pair enumeration
//! - [`connectivity`]: Single-subject channel adjacency
//! - [`metaconn`]: Block-diagonal meta-connectivity expansion
//! - [`neighborhood`]: Adjacency between sensor pairs
//! - [`frequency`]: Validated frequency bins
//! - [`artifact`]: JSON persistence of results
//! - [`select`]: Exact-then-substring name resolution
//! - [`error`]: Error types
//!
//! # Features
//!
//! - `parallel`: Materialize dense meta matrices with rayon
//!
//! # Example
//!
//! ```rust
//! use rootstar_hyperscan_core::{
//!     ChannelConnectivity, HyperLayout, MetaConnectivity, PairSelection, SelectionMode,
//!     SelfPairs, SensorPairs,
//! };
//!
//! let layout = HyperLayout::with_channel_count(3);
//! let pairs = SensorPairs::build(
//!     &layout,
//!     &PairSelection::Cartesian { self_pairs: SelfPairs::Only },
//! )?;
//! let conn = ChannelConnectivity::identity(3);
//!
//! let meta = MetaConnectivity::for_pairs(&conn, &pairs, 2, SelectionMode::PairsOnly)?;
//! assert_eq!(meta.dim(), 12);
//! assert!(meta.inter_brain(1, 1, 1));
//! assert!(!meta.inter_brain(1, 2, 1));
//! # Ok::<(), rootstar_hyperscan_core::HyperscanError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod artifact;
pub mod connectivity;
pub mod error;
pub mod frequency;
pub mod layout;
pub mod metaconn;
pub mod neighborhood;
pub mod pairs;
pub mod select;

pub use artifact::{ArtifactError, ConnectivityArtifact, MatrixKind};
pub use connectivity::{ChannelConnectivity, Diagonal, ElectrodePosition};
pub use error::{HyperscanError, HyperscanResult};
pub use frequency::FrequencyBins;
pub use layout::{global_index, locate, meta_dim, HyperLayout, Location, Subject};
pub use metaconn::{MetaConnectivity, SelectionMode};
pub use neighborhood::PairNeighborhood;
pub use pairs::{PairSelection, SelfPairs, SensorPair, SensorPairs};
pub use select::resolve_name;
