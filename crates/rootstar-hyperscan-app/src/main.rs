//! Rootstar Hyperscan Application
//!
//! Command-line entry point for two-subject EEG connectivity preparation:
//! inspect and convert XDF recordings, enumerate inter-brain sensor pairs,
//! and compute meta-connectivity artifacts.
//!
//! # Usage
//!
//! ```bash
//! # Write a synthetic two-subject recording
//! rootstar-hyperscan demo dyad.xdf
//!
//! # List streams
//! rootstar-hyperscan streams dyad.xdf
//!
//! # Sensor pairs for a dyad
//! rootstar-hyperscan pairs dyad.xdf --stream A-EEG --stream B-EEG --self-pairs include
//!
//! # Meta-connectivity artifact
//! rootstar-hyperscan metaconn --xdf dyad.xdf --stream A-EEG --stream B-EEG \
//!     --self-pairs include --mode pairs-only --freqs 11,12,13 --output metaconn.json
//! ```

mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use ndarray::Array2;
use rootstar_hyperscan_core::{
    ConnectivityArtifact, HyperLayout, MetaConnectivity, PairSelection, SelectionMode, SelfPairs,
    SensorPairs, Subject,
};
use rootstar_hyperscan_xdf::{
    ChannelFormat, Dyad, ImportOptions, StreamInfo, StreamQuery, StreamType, XdfFile, XdfImport,
    XdfWriter,
};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::AnalysisConfig;

/// Rootstar Hyperscan Application
#[derive(Parser, Debug)]
#[command(name = "rootstar-hyperscan")]
#[command(author, version, about = "Hyperscanning EEG connectivity tool", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the streams of an XDF file
    Streams {
        /// XDF file
        file: PathBuf,
    },

    /// Convert streams into per-subject recordings
    Import {
        /// XDF file
        file: PathBuf,

        /// Stream index or name (repeatable)
        #[arg(short, long = "stream")]
        streams: Vec<StreamQuery>,

        /// Convert every stream of --type
        #[arg(long)]
        all: bool,

        /// Stream type used with --all
        #[arg(long = "type", default_value = "EEG")]
        content_type: String,

        /// Sample rate override (Hz)
        #[arg(long)]
        sfreq: Option<f64>,

        /// Write each recording as JSON into this directory
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Enumerate inter-brain sensor pairs for a dyad
    Pairs {
        /// XDF file
        file: PathBuf,

        /// Subject A and subject B streams, in that order
        #[arg(short, long = "stream", num_args = 1, required = true)]
        streams: Vec<StreamQuery>,

        /// Homologous pair policy
        #[arg(long, value_enum)]
        self_pairs: SelfPairsArg,

        /// Print every pair
        #[arg(long)]
        list: bool,
    },

    /// Compute meta-connectivity and write the JSON artifact
    Metaconn {
        /// TOML analysis configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// XDF file providing the dyad
        #[arg(long, requires = "streams", conflicts_with = "channels")]
        xdf: Option<PathBuf>,

        /// Subject A and subject B streams
        #[arg(short, long = "stream")]
        streams: Vec<StreamQuery>,

        /// Channels per subject, without a recording
        #[arg(long)]
        channels: Option<usize>,

        /// Comma-separated frequencies (Hz)
        #[arg(long, value_delimiter = ',')]
        freqs: Option<Vec<f64>>,

        /// Inter-brain selection mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Homologous pair policy
        #[arg(long, value_enum)]
        self_pairs: Option<SelfPairsArg>,

        /// Artifact path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a synthetic two-subject XDF recording
    Demo {
        /// Output file
        file: PathBuf,

        /// Channels per subject
        #[arg(long, default_value = "8")]
        channels: usize,

        /// Samples per subject
        #[arg(long, default_value = "512")]
        samples: usize,

        /// Sample rate (Hz)
        #[arg(long, default_value = "256")]
        sfreq: f64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SelfPairsArg {
    Include,
    Exclude,
    Only,
}

impl From<SelfPairsArg> for SelfPairs {
    fn from(arg: SelfPairsArg) -> Self {
        match arg {
            SelfPairsArg::Include => Self::Include,
            SelfPairsArg::Exclude => Self::Exclude,
            SelfPairsArg::Only => Self::Only,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    PairsOnly,
    ConnectivityOnly,
    PairsAndConnectivity,
}

impl From<ModeArg> for SelectionMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::PairsOnly => Self::PairsOnly,
            ModeArg::ConnectivityOnly => Self::ConnectivityOnly,
            ModeArg::PairsAndConnectivity => Self::PairsAndConnectivity,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Rootstar Hyperscan v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Streams { file } => list_streams(&file)?,
        Commands::Import {
            file,
            streams,
            all,
            content_type,
            sfreq,
            save,
        } => {
            let options = ImportOptions {
                content_type,
                streams,
                convert_all: all,
                sfreq,
                save_dir: save,
                ..ImportOptions::default()
            };
            import_streams(&file, &options)?;
        }
        Commands::Pairs {
            file,
            streams,
            self_pairs,
            list,
        } => build_pairs(&file, streams, self_pairs.into(), list)?,
        Commands::Metaconn {
            config,
            xdf,
            streams,
            channels,
            freqs,
            mode,
            self_pairs,
            output,
        } => {
            let mut cfg = match &config {
                Some(path) => AnalysisConfig::load_from(path)?,
                None => AnalysisConfig::default(),
            };
            if let Some(freqs) = freqs {
                cfg.metaconn.frequencies = freqs;
            }
            if let Some(mode) = mode {
                cfg.metaconn.mode = Some(mode.into());
            }
            if let Some(self_pairs) = self_pairs {
                cfg.pairs.self_pairs = Some(self_pairs.into());
            }
            if let Some(output) = output {
                cfg.metaconn.output = output;
            }
            if !streams.is_empty() {
                cfg.import.streams = streams;
            }
            compute_metaconn(&cfg, xdf.as_deref(), channels)?;
        }
        Commands::Demo {
            file,
            channels,
            samples,
            sfreq,
        } => write_demo(&file, channels, samples, sfreq)?,
    }

    Ok(())
}

/// Print one line per stream
fn list_streams(path: &Path) -> anyhow::Result<()> {
    let file = XdfFile::read(path).with_context(|| format!("reading {}", path.display()))?;
    println!("{:>5}  {:<24} {:<10} {:>10} {:>8} {:>10}", "index", "name", "type", "srate", "channels", "samples");
    for (i, stream) in file.streams.iter().enumerate() {
        let info = &stream.info;
        println!(
            "{i:>5}  {:<24} {:<10} {:>10} {:>8} {:>10}",
            info.name,
            info.content_type,
            info.nominal_srate,
            info.channel_count,
            stream.n_samples()
        );
    }
    Ok(())
}

/// Convert streams and report their shapes
fn import_streams(path: &Path, options: &ImportOptions) -> anyhow::Result<()> {
    let import = XdfImport::open(path).with_context(|| format!("reading {}", path.display()))?;
    let recordings = import.convert(options)?;
    for rec in &recordings {
        println!(
            "{}: {} channels x {} samples @ {} Hz ({:?})",
            rec.name,
            rec.n_channels(),
            rec.n_samples(),
            rec.sfreq,
            rec.scale
        );
    }
    Ok(())
}

/// Load the two streams of a dyad
fn load_dyad(path: &Path, base: &ImportOptions, streams: Vec<StreamQuery>) -> anyhow::Result<Dyad> {
    if streams.len() != 2 {
        bail!("a dyad needs exactly two streams, got {}", streams.len());
    }
    let import = XdfImport::open(path).with_context(|| format!("reading {}", path.display()))?;
    let options = ImportOptions {
        streams,
        convert_all: false,
        ..base.clone()
    };
    let mut recordings = import.convert(&options)?;
    let (Some(b), Some(a)) = (recordings.pop(), recordings.pop()) else {
        bail!("expected two recordings for the dyad");
    };
    Ok(Dyad::new(a, b)?)
}

fn build_pairs(
    path: &Path,
    streams: Vec<StreamQuery>,
    self_pairs: SelfPairs,
    list: bool,
) -> anyhow::Result<()> {
    let dyad = load_dyad(path, &ImportOptions::default(), streams)?;
    let pairs = dyad.sensor_pairs(&PairSelection::Cartesian { self_pairs })?;
    println!(
        "{} x {}: {} sensor pairs",
        dyad.a().name,
        dyad.b().name,
        pairs.len()
    );
    if list {
        let layout = dyad.layout();
        for (a, b) in pairs.local_pairs() {
            println!(
                "{} <-> {}",
                layout.channel_name(Subject::A, a).unwrap_or("?"),
                layout.channel_name(Subject::B, b).unwrap_or("?")
            );
        }
    }
    Ok(())
}

fn compute_metaconn(
    cfg: &AnalysisConfig,
    xdf: Option<&Path>,
    channels: Option<usize>,
) -> anyhow::Result<()> {
    let self_pairs = cfg.pairs.require_self_pairs()?;
    let mode = cfg.metaconn.require_mode()?;
    let bins = cfg.metaconn.bins()?;

    let (layout, subjects) = match (xdf, channels) {
        (Some(path), _) => {
            let dyad = load_dyad(path, &cfg.import, cfg.import.streams.clone())?;
            let subjects = [dyad.a().name.clone(), dyad.b().name.clone()];
            (dyad.layout().clone(), subjects)
        }
        (None, Some(n)) => (
            HyperLayout::with_channel_count(n),
            ["A".to_string(), "B".to_string()],
        ),
        (None, None) => bail!("pass --xdf with two --stream values, or --channels"),
    };

    let pairs = SensorPairs::build(&layout, &PairSelection::Cartesian { self_pairs })?;
    let conn = cfg.connectivity.build(layout.n_channels())?;
    let meta = MetaConnectivity::for_pairs(&conn, &pairs, bins.len(), mode)?;
    if meta.is_empty() {
        warn!("Meta-connectivity is empty (no channels or no frequency bins)");
    }
    info!(
        n_channels = meta.n_channels(),
        n_freq = meta.n_freq(),
        n_pairs = pairs.len(),
        n_links = meta.n_links(),
        "Computed meta-connectivity"
    );

    let [a, b] = subjects;
    let artifact = ConnectivityArtifact::new(&meta, &layout, cfg.metaconn.matrix_kind())?
        .with_frequencies(bins)?
        .with_subjects(a, b);
    artifact
        .save(&cfg.metaconn.output)
        .with_context(|| format!("writing {}", cfg.metaconn.output.display()))?;

    println!(
        "{}x{} meta-connectivity ({} links) written to {}",
        meta.dim(),
        meta.dim(),
        meta.n_links(),
        cfg.metaconn.output.display()
    );
    Ok(())
}

/// Synthetic dyad: alpha-band sinusoids in microvolts plus a marker stream
fn write_demo(path: &Path, channels: usize, samples: usize, sfreq: f64) -> anyhow::Result<()> {
    use std::f64::consts::PI;

    if sfreq <= 0.0 {
        bail!("sample rate must be positive, got {sfreq}");
    }

    let labels: Vec<String> = (0..channels).map(|i| format!("Ch{}", i + 1)).collect();
    let subjects = [
        StreamInfo::new(1, "A-EEG", StreamType::Eeg, channels, sfreq).with_channel_labels(&labels),
        StreamInfo::new(2, "B-EEG", StreamType::Eeg, channels, sfreq).with_channel_labels(&labels),
    ];
    let markers = StreamInfo::new(3, "Markers", StreamType::Markers, 1, 0.0)
        .with_format(ChannelFormat::String);

    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = XdfWriter::new(std::io::BufWriter::new(file))?;
    for info in &subjects {
        writer.write_stream_header(info)?;
    }
    writer.write_stream_header(&markers)?;

    #[allow(clippy::cast_precision_loss)]
    let timestamps: Vec<f64> = (0..samples).map(|i| i as f64 / sfreq).collect();
    for (s, info) in subjects.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let data = Array2::from_shape_fn((samples, channels), |(t, c)| {
            let time = timestamps[t];
            let phase = (s * channels + c) as f64 * 0.3;
            let signal = (2.0 * PI * 10.0 * time + phase).sin();
            let noise = ((t * 7 + c * 13) as f64 * 0.123).sin() * 0.1; // Pseudo-noise
            (signal + noise) * 50.0 // ~50 µV
        });
        writer.write_samples(info, &timestamps, data.view())?;
    }
    writer.write_markers(&markers, &[0.0], &["start"])?;
    for info in &subjects {
        writer.write_stream_footer(info.stream_id, samples)?;
    }
    writer.finish()?;

    info!(path = %path.display(), channels, samples, sfreq, "Wrote demo recording");
    println!("wrote {}", path.display());
    Ok(())
}
