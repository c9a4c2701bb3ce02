//! XDF to per-subject recording conversion
//!
//! ```text
//! XdfFile ──select──► stream indices ──convert──► SubjectRecording* ──► Dyad
//!                                      orient, scale, rename, crop     HyperLayout
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rootstar_hyperscan_core::{HyperLayout, HyperscanError, PairSelection, SensorPairs};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ImportError, ImportResult};
use crate::recording::{to_channels_by_samples, SubjectRecording};
use crate::scale::{apply, classify, ScaleClass, ScaleThresholds};
use crate::select::{find_by_type, resolve_stream, StreamQuery};
use crate::stream::StreamInfo;
use crate::xdf::{XdfFile, XdfStream};

/// Which streams to convert and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Content type used by `convert_all`
    pub content_type: String,
    /// Explicit streams; when empty, `convert_all` decides
    pub streams: Vec<StreamQuery>,
    /// Convert every numeric stream of `content_type`
    pub convert_all: bool,
    /// Sample rate override (Hz)
    pub sfreq: Option<f64>,
    /// Keep samples `[start, end)` only
    pub bounds: Option<(usize, usize)>,
    /// Write each recording as JSON here
    pub save_dir: Option<PathBuf>,
    /// Unit detection thresholds
    pub scale: ScaleThresholds,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            content_type: "EEG".to_string(),
            streams: Vec::new(),
            convert_all: false,
            sfreq: None,
            bounds: None,
            save_dir: None,
            scale: ScaleThresholds::default(),
        }
    }
}

impl ImportOptions {
    /// Select streams by query.
    #[must_use]
    pub fn with_streams(mut self, streams: Vec<StreamQuery>) -> Self {
        self.streams = streams;
        self
    }

    /// Convert every stream of the content type.
    #[must_use]
    pub fn convert_all(mut self) -> Self {
        self.convert_all = true;
        self
    }
}

/// An opened XDF file ready for conversion.
#[derive(Debug, Clone)]
pub struct XdfImport {
    file: XdfFile,
    source: Option<PathBuf>,
}

impl XdfImport {
    /// Read a file from disk.
    ///
    /// # Errors
    ///
    /// Returns IO or format errors.
    pub fn open(path: impl AsRef<Path>) -> ImportResult<Self> {
        let path = path.as_ref();
        Ok(Self {
            file: XdfFile::read(path)?,
            source: Some(path.to_path_buf()),
        })
    }

    /// Wrap an already parsed file.
    #[must_use]
    pub fn from_file(file: XdfFile) -> Self {
        Self { file, source: None }
    }

    /// Path the file was read from
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// All streams in file order
    #[must_use]
    pub fn streams(&self) -> &[XdfStream] {
        &self.file.streams
    }

    /// Metadata of every stream
    #[must_use]
    pub fn infos(&self) -> Vec<&StreamInfo> {
        self.file.stream_infos()
    }

    /// Resolve the options to stream positions, in selection order.
    ///
    /// # Errors
    ///
    /// Returns selection errors for unmatched or ambiguous queries, a
    /// configuration error when nothing is selected, and a configuration
    /// error when an explicitly chosen stream is not numeric.
    pub fn select(&self, options: &ImportOptions) -> ImportResult<Vec<usize>> {
        let infos = self.infos();

        if !options.streams.is_empty() {
            let mut selected = Vec::with_capacity(options.streams.len());
            for query in &options.streams {
                let index = resolve_stream(&infos, query)?;
                if !infos[index].channel_format.is_numeric() {
                    return Err(ImportError::configuration(
                        "stream selection",
                        format!(
                            "stream '{}' (#{index}) has {} values and cannot be converted",
                            infos[index].name,
                            infos[index].channel_format.as_str()
                        ),
                    ));
                }
                if !selected.contains(&index) {
                    selected.push(index);
                }
            }
            return Ok(selected);
        }

        if options.convert_all {
            let mut selected = find_by_type(&infos, &options.content_type)?;
            selected.retain(|&i| {
                let numeric = infos[i].channel_format.is_numeric();
                if !numeric {
                    warn!(stream = %infos[i].name, index = i, "Skipping non-numeric stream");
                }
                numeric
            });
            return Ok(selected);
        }

        let candidates: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        Err(ImportError::configuration(
            "stream selection",
            format!(
                "no stream selected among [{}]; name the streams or convert all {} streams",
                candidates.join(", "),
                options.content_type
            ),
        ))
    }

    /// Convert the selected streams into recordings.
    ///
    /// # Errors
    ///
    /// Returns selection errors, configuration errors for label or bounds
    /// mismatches, and IO errors when saving.
    pub fn convert(&self, options: &ImportOptions) -> ImportResult<Vec<SubjectRecording>> {
        let selected = self.select(options)?;
        let names = recording_names(&self.file.streams, &selected);

        let recordings = selected
            .iter()
            .zip(names)
            .map(|(&index, name)| self.convert_stream(index, name, options))
            .collect::<ImportResult<Vec<_>>>()?;

        info!(n_recordings = recordings.len(), "Converted streams");
        Ok(recordings)
    }

    /// Convert one stream under a given recording name.
    ///
    /// # Errors
    ///
    /// See [`Self::convert`].
    pub fn convert_stream(
        &self,
        index: usize,
        name: String,
        options: &ImportOptions,
    ) -> ImportResult<SubjectRecording> {
        let stream = self.file.streams.get(index).ok_or_else(|| {
            ImportError::configuration(
                "stream conversion",
                format!("stream index {index} out of range for {} streams", self.file.streams.len()),
            )
        })?;
        let info = &stream.info;

        let mut data =
            to_channels_by_samples(stream.time_series.clone(), Some(info.channel_count));
        let scale = classify(data.view(), &options.scale);
        match scale {
            ScaleClass::NeedsRescale { std, peak_to_peak } => info!(
                stream = %info.name,
                std,
                peak_to_peak,
                factor = options.scale.scale_factor,
                "Rescaling to volts"
            ),
            ScaleClass::NonFinite => {
                warn!(stream = %info.name, "Non-finite values present, scale left unchanged");
            }
            ScaleClass::AlreadyVolts => {}
        }
        apply(&mut data, scale, &options.scale);

        let sfreq = options.sfreq.unwrap_or(info.nominal_srate);
        let mut recording = SubjectRecording::new(name, index, sfreq, data);
        recording.scale = scale;
        if !info.channel_labels.is_empty() {
            recording.rename_channels(info.channel_labels.clone())?;
        }
        if let Some((start, end)) = options.bounds {
            recording.crop(start, end)?;
        }
        if let Some(dir) = &options.save_dir {
            recording.save_json(dir)?;
        }

        info!(
            stream = %recording.name,
            index,
            channels = recording.n_channels(),
            samples = recording.n_samples(),
            sfreq,
            "Converted stream"
        );
        Ok(recording)
    }
}

/// Stream names, suffixed with `-StreamIndex-{i}` when any name repeats.
fn recording_names(streams: &[XdfStream], selected: &[usize]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for &i in selected {
        *counts.entry(streams[i].info.name.as_str()).or_default() += 1;
    }
    let duplicated = counts.values().any(|&c| c > 1);
    if duplicated {
        warn!("Several selected streams share a name, adding stream indices as suffixes");
    }

    selected
        .iter()
        .map(|&i| {
            let name = &streams[i].info.name;
            if duplicated {
                format!("{name}-StreamIndex-{i}")
            } else {
                name.clone()
            }
        })
        .collect()
}

/// Two subjects recorded together.
#[derive(Debug, Clone, PartialEq)]
pub struct Dyad {
    a: SubjectRecording,
    b: SubjectRecording,
    layout: HyperLayout,
}

impl Dyad {
    /// Pair two recordings as subjects A and B.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the channel counts differ.
    pub fn new(a: SubjectRecording, b: SubjectRecording) -> ImportResult<Self> {
        let layout = HyperLayout::from_subjects(a.channel_names.clone(), b.channel_names.clone())
            .map_err(|e| match e {
                HyperscanError::Configuration { reason, .. } => {
                    ImportError::configuration(
                        "dyad",
                        format!("'{}' and '{}': {reason}", a.name, b.name),
                    )
                }
                other => other.into(),
            })?;
        if (a.sfreq - b.sfreq).abs() > f64::EPSILON {
            warn!(a = a.sfreq, b = b.sfreq, "Dyad subjects have different sample rates");
        }
        Ok(Self { a, b, layout })
    }

    /// Subject A's recording
    #[must_use]
    pub fn a(&self) -> &SubjectRecording {
        &self.a
    }

    /// Subject B's recording
    #[must_use]
    pub fn b(&self) -> &SubjectRecording {
        &self.b
    }

    /// Merged layout (A's channels then B's)
    #[must_use]
    pub fn layout(&self) -> &HyperLayout {
        &self.layout
    }

    /// Enumerate inter-brain sensor pairs over the merged layout.
    ///
    /// # Errors
    ///
    /// See [`SensorPairs::build`].
    pub fn sensor_pairs(&self, selection: &PairSelection) -> ImportResult<SensorPairs> {
        Ok(SensorPairs::build(&self.layout, selection)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{ChannelFormat, StreamType};
    use crate::xdf::XdfWriter;
    use ndarray::Array2;
    use rootstar_hyperscan_core::SelfPairs;

    fn write_file(streams: &[(StreamInfo, Array2<f64>)]) -> XdfFile {
        let mut writer = XdfWriter::new(Vec::new()).unwrap();
        for (info, _) in streams {
            writer.write_stream_header(info).unwrap();
        }
        for (info, data) in streams {
            if info.channel_format.is_numeric() {
                let timestamps: Vec<f64> = (0..data.nrows()).map(|i| i as f64).collect();
                writer.write_samples(info, &timestamps, data.view()).unwrap();
            }
        }
        XdfFile::parse(&writer.finish().unwrap()).unwrap()
    }

    fn eeg(id: u32, name: &str, channels: usize, samples: usize, amplitude: f64) -> (StreamInfo, Array2<f64>) {
        let info = StreamInfo::new(id, name, StreamType::Eeg, channels, 100.0)
            .with_format(ChannelFormat::Double64);
        let data = Array2::from_shape_fn((samples, channels), |(t, c)| {
            amplitude * if (t + c) % 2 == 0 { 1.0 } else { -1.0 }
        });
        (info, data)
    }

    fn markers(id: u32) -> (StreamInfo, Array2<f64>) {
        let info = StreamInfo::new(id, "Markers", StreamType::Markers, 1, 0.0)
            .with_format(ChannelFormat::String);
        (info, Array2::zeros((0, 1)))
    }

    #[test]
    fn test_convert_named_streams() {
        let import = XdfImport::from_file(write_file(&[
            eeg(1, "A-EEG", 2, 20, 50.0),
            eeg(2, "B-EEG", 2, 20, 50.0),
        ]));
        let options = ImportOptions::default().with_streams(vec![
            StreamQuery::Name("b-eeg".into()),
            StreamQuery::Index(0),
        ]);
        let recordings = import.convert(&options).unwrap();
        assert_eq!(recordings.len(), 2);
        assert_eq!(recordings[0].name, "B-EEG");
        assert_eq!(recordings[1].name, "A-EEG");
        assert_eq!(recordings[0].data.dim(), (2, 20));
        assert_eq!(recordings[0].channel_names, ["EEG_001", "EEG_002"]);
        assert!(matches!(recordings[0].scale, ScaleClass::NeedsRescale { .. }));
        assert!((recordings[0].data[[0, 0]] - 50.0e-5).abs() < 1e-12);
    }

    #[test]
    fn test_convert_all_skips_markers() {
        let import = XdfImport::from_file(write_file(&[
            eeg(1, "A-EEG", 2, 10, 1e-6),
            markers(2),
            eeg(3, "B-EEG", 2, 10, 1e-6),
        ]));
        let selected = import.select(&ImportOptions::default().convert_all()).unwrap();
        assert_eq!(selected, [0, 2]);

        let recordings = import.convert(&ImportOptions::default().convert_all()).unwrap();
        assert_eq!(recordings[1].scale, ScaleClass::AlreadyVolts);
    }

    #[test]
    fn test_nothing_selected() {
        let import = XdfImport::from_file(write_file(&[eeg(1, "A-EEG", 2, 10, 1.0)]));
        let err = import.select(&ImportOptions::default()).unwrap_err();
        assert!(err.to_string().contains("no stream selected"));
    }

    #[test]
    fn test_explicit_marker_stream_rejected() {
        let import = XdfImport::from_file(write_file(&[eeg(1, "A-EEG", 2, 10, 1.0), markers(2)]));
        let options = ImportOptions::default().with_streams(vec![StreamQuery::Name("Markers".into())]);
        assert!(import.select(&options).is_err());
    }

    #[test]
    fn test_ambiguous_query() {
        let import = XdfImport::from_file(write_file(&[
            eeg(1, "A-EEG", 2, 10, 1.0),
            eeg(2, "B-EEG", 2, 10, 1.0),
        ]));
        let options = ImportOptions::default().with_streams(vec![StreamQuery::Name("eeg".into())]);
        assert!(matches!(
            import.convert(&options),
            Err(ImportError::Core(HyperscanError::AmbiguousSelection { .. }))
        ));
    }

    #[test]
    fn test_duplicate_names_get_suffix() {
        let import = XdfImport::from_file(write_file(&[
            eeg(1, "EEG", 2, 10, 1e-6),
            eeg(2, "EEG", 2, 10, 1e-6),
        ]));
        let recordings = import.convert(&ImportOptions::default().convert_all()).unwrap();
        assert_eq!(recordings[0].name, "EEG-StreamIndex-0");
        assert_eq!(recordings[1].name, "EEG-StreamIndex-1");
    }

    #[test]
    fn test_labels_sfreq_and_bounds() {
        let (info, data) = eeg(1, "A-EEG", 2, 10, 1e-6);
        let info = info.with_channel_labels(&["Cz", "Pz"]);
        let import = XdfImport::from_file(write_file(&[(info, data)]));
        let options = ImportOptions {
            sfreq: Some(250.0),
            bounds: Some((2, 6)),
            ..ImportOptions::default().convert_all()
        };
        let rec = &import.convert(&options).unwrap()[0];
        assert_eq!(rec.channel_names, ["Cz", "Pz"]);
        assert_eq!(rec.sfreq, 250.0);
        assert_eq!(rec.n_samples(), 4);

        let bad = ImportOptions {
            bounds: Some((0, 11)),
            ..ImportOptions::default().convert_all()
        };
        assert!(import.convert(&bad).is_err());
    }

    #[test]
    fn test_label_count_mismatch() {
        let (mut info, data) = eeg(1, "A-EEG", 2, 10, 1e-6);
        info.channel_labels = vec!["Cz".into(), "Pz".into(), "Oz".into()];
        let import = XdfImport::from_file(write_file(&[(info, data)]));
        let err = import.convert(&ImportOptions::default().convert_all()).unwrap_err();
        assert!(err.to_string().contains("expected 2 labels, got 3"));
    }

    #[test]
    fn test_dyad_channel_mismatch() {
        let a = SubjectRecording::new("A", 0, 100.0, Array2::zeros((3, 10)));
        let b = SubjectRecording::new("B", 1, 100.0, Array2::zeros((2, 10)));
        let err = Dyad::new(a, b).unwrap_err();
        assert!(err.to_string().contains("'A' and 'B'"));
    }

    #[test]
    fn test_dyad_pairs() {
        let a = SubjectRecording::new("A", 0, 100.0, Array2::zeros((3, 10)));
        let b = SubjectRecording::new("B", 1, 100.0, Array2::zeros((3, 10)));
        let dyad = Dyad::new(a, b).unwrap();
        let pairs = dyad
            .sensor_pairs(&PairSelection::Cartesian { self_pairs: SelfPairs::Exclude })
            .unwrap();
        assert_eq!(pairs.len(), 6);
        assert_eq!(dyad.layout().n_channels(), 3);
    }
}
