//! Per-subject time series leaving the import boundary
//!
//! A [`SubjectRecording`] is always channels × samples, whatever layout the
//! container stored it in.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::{s, Array2};
use rootstar_hyperscan_core::layout::default_channel_name;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ImportError, ImportResult};
use crate::scale::ScaleClass;

/// Axis layout of a 2-D time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Rows are channels
    ChannelsBySamples,
    /// Rows are samples
    SamplesByChannels,
}

impl Orientation {
    /// Detect the layout of a `rows × columns` array.
    ///
    /// A declared channel count that matches exactly one axis decides.
    /// Otherwise no recording is assumed to have more channels than
    /// samples, so the longer axis is time.
    #[must_use]
    pub fn detect(rows: usize, columns: usize, declared_channels: Option<usize>) -> Self {
        match declared_channels {
            Some(n) if n == columns && n != rows => return Self::SamplesByChannels,
            Some(n) if n == rows && n != columns => return Self::ChannelsBySamples,
            _ => {}
        }
        if rows > columns {
            Self::SamplesByChannels
        } else {
            Self::ChannelsBySamples
        }
    }
}

/// Return `data` as channels × samples.
#[must_use]
pub fn to_channels_by_samples(data: Array2<f64>, declared_channels: Option<usize>) -> Array2<f64> {
    match Orientation::detect(data.nrows(), data.ncols(), declared_channels) {
        Orientation::ChannelsBySamples => data,
        Orientation::SamplesByChannels => data.reversed_axes().as_standard_layout().into_owned(),
    }
}

/// One subject's converted stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecording {
    /// Recording name (stream name, suffixed when duplicated)
    pub name: String,
    /// Position of the source stream in the file
    pub stream_index: usize,
    /// Sample rate (Hz)
    pub sfreq: f64,
    /// Channel names, one per row of `data`
    pub channel_names: Vec<String>,
    /// Channels × samples
    pub data: Array2<f64>,
    /// Unit decision taken at import
    pub scale: ScaleClass,
}

impl SubjectRecording {
    /// Wrap channels × samples data with default channel names.
    #[must_use]
    pub fn new(name: impl Into<String>, stream_index: usize, sfreq: f64, data: Array2<f64>) -> Self {
        Self {
            name: name.into(),
            stream_index,
            sfreq,
            channel_names: (0..data.nrows()).map(default_channel_name).collect(),
            data,
            scale: ScaleClass::AlreadyVolts,
        }
    }

    /// Number of channels
    #[must_use]
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Duration in seconds, 0 for an irregular rate
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f64 {
        if self.sfreq > 0.0 {
            self.n_samples() as f64 / self.sfreq
        } else {
            0.0
        }
    }

    /// Replace the channel names.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the label count differs from the
    /// channel count.
    pub fn rename_channels(&mut self, labels: Vec<String>) -> ImportResult<()> {
        if labels.len() != self.n_channels() {
            return Err(ImportError::configuration(
                "channel rename",
                format!(
                    "stream '{}': expected {} labels, got {}",
                    self.name,
                    self.n_channels(),
                    labels.len()
                ),
            ));
        }
        self.channel_names = labels;
        Ok(())
    }

    /// Keep samples `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the bounds are reversed or past
    /// the last sample.
    pub fn crop(&mut self, start: usize, end: usize) -> ImportResult<()> {
        if start > end || end > self.n_samples() {
            return Err(ImportError::configuration(
                "crop bounds",
                format!(
                    "stream '{}': bounds [{start}, {end}) outside 0..{}",
                    self.name,
                    self.n_samples()
                ),
            ));
        }
        self.data = self.data.slice(s![.., start..end]).to_owned();
        debug!(name = %self.name, start, end, "Cropped recording");
        Ok(())
    }

    /// Write to `<dir>/<name>.json`, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns IO or serialization errors.
    pub fn save_json(&self, dir: impl AsRef<Path>) -> ImportResult<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", self.name));
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        info!(name = %self.name, path = %path.display(), "Saved recording");
        Ok(path)
    }

    /// Read a recording written by [`Self::save_json`].
    ///
    /// # Errors
    ///
    /// Returns IO or serialization errors, or a configuration error when
    /// the channel names do not match the data.
    pub fn load_json(path: impl AsRef<Path>) -> ImportResult<Self> {
        let recording: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        if recording.channel_names.len() != recording.n_channels() {
            return Err(ImportError::configuration(
                "saved recording",
                format!(
                    "'{}' has {} channel names for {} channels",
                    recording.name,
                    recording.channel_names.len(),
                    recording.n_channels()
                ),
            ));
        }
        Ok(recording)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    #[test]
    fn test_detect_by_shape() {
        assert_eq!(Orientation::detect(1000, 8, None), Orientation::SamplesByChannels);
        assert_eq!(Orientation::detect(8, 1000, None), Orientation::ChannelsBySamples);
    }

    #[test]
    fn test_declared_count_wins() {
        // fewer samples than channels, but the header says 8 channels
        assert_eq!(Orientation::detect(8, 4, Some(8)), Orientation::ChannelsBySamples);
        assert_eq!(Orientation::detect(4, 8, Some(8)), Orientation::SamplesByChannels);
        // ambiguous square shape falls back to the shape rule
        assert_eq!(Orientation::detect(8, 8, Some(8)), Orientation::ChannelsBySamples);
    }

    #[test]
    fn test_transpose() {
        let samples_by_channels = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let data = to_channels_by_samples(samples_by_channels, None);
        assert_eq!(data, array![[1.0, 3.0, 5.0], [2.0, 4.0, 6.0]]);
        assert!(data.is_standard_layout());
    }

    #[test]
    fn test_default_names_and_rename() {
        let mut rec = SubjectRecording::new("A-EEG", 0, 256.0, Array2::zeros((2, 512)));
        assert_eq!(rec.channel_names, ["EEG_001", "EEG_002"]);
        assert_eq!(rec.duration(), 2.0);

        rec.rename_channels(vec!["Fp1".into(), "Fp2".into()]).unwrap();
        assert_eq!(rec.channel_names, ["Fp1", "Fp2"]);
    }

    #[test]
    fn test_rename_mismatch() {
        let mut rec = SubjectRecording::new("A-EEG", 0, 256.0, Array2::zeros((2, 4)));
        let err = rec.rename_channels(vec!["Fp1".into()]).unwrap_err();
        assert!(err.to_string().contains("expected 2 labels, got 1"));
    }

    #[test]
    fn test_crop() {
        let mut rec = SubjectRecording::new("S", 0, 1.0, array![[0.0, 1.0, 2.0, 3.0]]);
        rec.crop(1, 3).unwrap();
        assert_eq!(rec.data, array![[1.0, 2.0]]);
        assert!(rec.crop(0, 5).is_err());
        assert!(rec.crop(2, 1).is_err());
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = tempdir().unwrap();
        let rec = SubjectRecording::new("B-EEG", 1, 128.0, array![[1.0, 2.0], [3.0, 4.0]]);
        let path = rec.save_json(dir.path().join("out")).unwrap();
        assert!(path.ends_with("B-EEG.json"));
        assert_eq!(SubjectRecording::load_json(&path).unwrap(), rec);
    }
}
