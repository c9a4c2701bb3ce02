//! Rootstar Hyperscan XDF - multi-stream recording import
//!
//! Reads XDF containers, selects the streams that belong to each subject,
//! and converts them into channels × samples recordings in volts, ready to
//! be merged into a two-subject layout.
//!
//! # Modules
//!
//! - [`xdf`]: Container reader and writer
//! - [`stream`]: Stream header metadata
//! - [`select`]: Stream selection by index, name, or type
//! - [`scale`]: Unit detection and rescaling
//! - [`recording`]: Per-subject recordings and orientation
//! - [`import`]: Conversion pipeline and dyad merge
//! - [`error`]: Error types

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod import;
pub mod recording;
pub mod scale;
pub mod select;
pub mod stream;
pub mod xdf;

pub use error::{ImportError, ImportResult};
pub use import::{Dyad, ImportOptions, XdfImport};
pub use recording::{Orientation, SubjectRecording};
pub use scale::{ScaleClass, ScaleThresholds};
pub use select::{find_by_type, resolve_stream, StreamQuery};
pub use stream::{ChannelFormat, StreamInfo, StreamType};
pub use xdf::{XdfFile, XdfStream, XdfWriter};
