//! Merged two-subject sensor layout and the global index mapping
//!
//! A hyperscanning recording concatenates the sensor spaces of two subjects:
//! subject A's channels occupy `[0, N)` and subject B's occupy `[N, 2N)`.
//! Frequency-expanded structures repeat that merged space once per bin, so a
//! (subject, channel, frequency) tuple lands at
//!
//! ```text
//! global = frequency * 2N + offset(subject) + channel
//! ```
//!
//! [`global_index`] is the only place this arithmetic lives. The pair
//! builder, both expanders, and artifact reconstruction go through it (or
//! through [`HyperLayout::locate`] for the inverse).

use serde::{Deserialize, Serialize};

use crate::error::{HyperscanError, HyperscanResult};
use crate::select::resolve_name;

/// One of the two simultaneously recorded participants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subject {
    /// First subject, channels start at offset 0
    A,
    /// Second subject, channels start at offset N
    B,
}

impl Subject {
    /// Both subjects in merged order
    pub const BOTH: [Self; 2] = [Self::A, Self::B];

    /// Offset of this subject's first channel within one merged block
    #[inline]
    #[must_use]
    pub const fn offset(self, n_channels: usize) -> usize {
        match self {
            Self::A => 0,
            Self::B => n_channels,
        }
    }

    /// Short label used in logs and artifacts
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// Map a (subject, channel, frequency) tuple to its flat index.
///
/// `n_channels` is the per-subject channel count N. The caller is responsible
/// for `channel < n_channels`; [`HyperLayout::try_global_index`] is the
/// checked variant.
#[inline]
#[must_use]
pub const fn global_index(
    n_channels: usize,
    subject: Subject,
    channel: usize,
    frequency: usize,
) -> usize {
    frequency * 2 * n_channels + subject.offset(n_channels) + channel
}

/// Side length `2·N·F` of a frequency-expanded matrix.
///
/// # Errors
///
/// Returns a configuration error when the side, or the entry count of the
/// square matrix, does not fit in `usize`.
pub fn meta_dim(n_channels: usize, n_freq: usize) -> HyperscanResult<usize> {
    checked_side("meta-connectivity", &[2, n_channels, n_freq])
}

/// Product of `factors`, rejected unless `side × side` is addressable.
pub(crate) fn checked_side(context: &'static str, factors: &[usize]) -> HyperscanResult<usize> {
    if factors.contains(&0) {
        return Ok(0);
    }
    let side = factors
        .iter()
        .try_fold(1_usize, |acc, &factor| acc.checked_mul(factor))
        .filter(|side| side.checked_mul(*side).is_some());
    side.ok_or_else(|| {
        let product: Vec<String> = factors.iter().map(ToString::to_string).collect();
        HyperscanError::configuration(
            context,
            format!("matrix side {} overflows usize", product.join(" x ")),
        )
    })
}

/// Decomposed position of a flat index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    /// Owning subject
    pub subject: Subject,
    /// Subject-local channel index
    pub channel: usize,
    /// Frequency bin index
    pub frequency: usize,
}

/// A named channel of one subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel<'a> {
    /// Owning subject
    pub subject: Subject,
    /// Subject-local index
    pub index: usize,
    /// Channel label
    pub name: &'a str,
}

/// Default label for the `index`-th channel (`EEG_001`, `EEG_002`, ...).
#[must_use]
pub fn default_channel_name(index: usize) -> String {
    format!("EEG_{:03}", index + 1)
}

/// Sensor space of two subjects with the same channel count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HyperLayoutRepr")]
pub struct HyperLayout {
    channels_a: Vec<String>,
    channels_b: Vec<String>,
}

#[derive(Deserialize)]
struct HyperLayoutRepr {
    channels_a: Vec<String>,
    channels_b: Vec<String>,
}

impl TryFrom<HyperLayoutRepr> for HyperLayout {
    type Error = HyperscanError;

    fn try_from(repr: HyperLayoutRepr) -> HyperscanResult<Self> {
        Self::from_subjects(repr.channels_a, repr.channels_b)
    }
}

impl HyperLayout {
    /// Build a layout from each subject's channel names.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the subjects have different
    /// channel counts.
    pub fn from_subjects(channels_a: Vec<String>, channels_b: Vec<String>) -> HyperscanResult<Self> {
        if channels_a.len() != channels_b.len() {
            return Err(HyperscanError::configuration(
                "hyper layout",
                format!(
                    "subject channel counts differ: A has {}, B has {}",
                    channels_a.len(),
                    channels_b.len()
                ),
            ));
        }
        Ok(Self {
            channels_a,
            channels_b,
        })
    }

    /// Split a merged channel list (A's channels followed by B's) in half.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the merged count is odd.
    pub fn from_merged(mut merged: Vec<String>) -> HyperscanResult<Self> {
        if merged.len() % 2 != 0 {
            return Err(HyperscanError::configuration(
                "hyper layout",
                format!(
                    "merged sensor count {} cannot be split evenly between two subjects",
                    merged.len()
                ),
            ));
        }
        let channels_b = merged.split_off(merged.len() / 2);
        Ok(Self {
            channels_a: merged,
            channels_b,
        })
    }

    /// Layout with `n_channels` default-named channels per subject.
    #[must_use]
    pub fn with_channel_count(n_channels: usize) -> Self {
        let names: Vec<String> = (0..n_channels).map(default_channel_name).collect();
        Self {
            channels_a: names.clone(),
            channels_b: names,
        }
    }

    /// Per-subject channel count N
    #[inline]
    #[must_use]
    pub fn n_channels(&self) -> usize {
        self.channels_a.len()
    }

    /// Size of one merged block (2N)
    #[inline]
    #[must_use]
    pub fn block_len(&self) -> usize {
        2 * self.n_channels()
    }

    /// Whether the layout has no channels
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels_a.is_empty()
    }

    /// Channel names of one subject
    #[must_use]
    pub fn channel_names(&self, subject: Subject) -> &[String] {
        match subject {
            Subject::A => &self.channels_a,
            Subject::B => &self.channels_b,
        }
    }

    /// Channel name at a subject-local index
    #[must_use]
    pub fn channel_name(&self, subject: Subject, channel: usize) -> Option<&str> {
        self.channel_names(subject).get(channel).map(String::as_str)
    }

    /// Every channel in merged order (A then B)
    pub fn channels(&self) -> impl Iterator<Item = Channel<'_>> {
        Subject::BOTH.into_iter().flat_map(move |subject| {
            self.channel_names(subject)
                .iter()
                .enumerate()
                .map(move |(index, name)| Channel {
                    subject,
                    index,
                    name: name.as_str(),
                })
        })
    }

    /// Flat index of a (subject, channel, frequency) tuple.
    #[inline]
    #[must_use]
    pub fn global_index(&self, subject: Subject, channel: usize, frequency: usize) -> usize {
        global_index(self.n_channels(), subject, channel, frequency)
    }

    /// Checked [`Self::global_index`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `channel` is outside the subject.
    pub fn try_global_index(
        &self,
        subject: Subject,
        channel: usize,
        frequency: usize,
    ) -> HyperscanResult<usize> {
        if channel >= self.n_channels() {
            return Err(HyperscanError::configuration(
                "global index",
                format!(
                    "channel {channel} out of range for subject {} with {} channels",
                    subject.label(),
                    self.n_channels()
                ),
            ));
        }
        Ok(self.global_index(subject, channel, frequency))
    }

    /// Inverse of [`Self::global_index`]. Returns `None` for an empty layout.
    #[must_use]
    pub fn locate(&self, index: usize) -> Option<Location> {
        locate(self.n_channels(), index)
    }

    /// Resolve a channel name of one subject (exact, then unique substring).
    ///
    /// # Errors
    ///
    /// Returns [`HyperscanError::AmbiguousSelection`] or
    /// [`HyperscanError::NotFound`].
    pub fn resolve_channel(&self, subject: Subject, query: &str) -> HyperscanResult<usize> {
        resolve_name(self.channel_names(subject), query, "channel")
    }
}

/// Inverse of [`global_index`] for a per-subject channel count.
///
/// `None` when the layout is empty or `2N` overflows.
#[must_use]
pub fn locate(n_channels: usize, index: usize) -> Option<Location> {
    if n_channels == 0 {
        return None;
    }
    let block = n_channels.checked_mul(2)?;
    let frequency = index / block;
    let within = index % block;
    let (subject, channel) = if within < n_channels {
        (Subject::A, within)
    } else {
        (Subject::B, within - n_channels)
    };
    Some(Location {
        subject,
        channel,
        frequency,
    })
}
