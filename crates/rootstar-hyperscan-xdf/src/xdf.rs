//! XDF container reader and writer
//!
//! # Format
//!
//! ```text
//! "XDF:" chunk*
//!
//! chunk   = num_length_bytes:u8 (1|4|8)  length:uN  tag:u16  content[length - 2]
//!
//! tag 1   FileHeader    xml
//! tag 2   StreamHeader  stream_id:u32 xml
//! tag 3   Samples       stream_id:u32 count:varlen sample*
//! tag 4   ClockOffset   stream_id:u32 collection_time:f64 offset:f64
//! tag 5   Boundary      16 bytes
//! tag 6   StreamFooter  stream_id:u32 xml
//!
//! sample  = ts_bytes:u8 (0|8) [timestamp:f64] value[channel_count]
//! varlen  = num_bytes:u8 (1|4|8) value:uN
//! ```
//!
//! All integers are little-endian. String values are `varlen` byte lengths
//! followed by UTF-8 bytes. A sample without a timestamp follows the previous
//! one by `1 / nominal_srate`.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use ndarray::{Array2, ArrayView2};
use tracing::{debug, info, warn};

use crate::error::{ImportError, ImportResult};
use crate::stream::{extract_tag, ChannelFormat, StreamInfo};

/// File magic
pub const XDF_MAGIC: &[u8; 4] = b"XDF:";

/// Boundary chunk marker
pub const BOUNDARY_UUID: [u8; 16] = [
    0x43, 0xA5, 0x46, 0xDC, 0xCB, 0xF5, 0x41, 0x0F, 0xB3, 0x0E, 0xD5, 0x46, 0x73, 0x83, 0xCB,
    0xE4,
];

/// Chunk tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ChunkTag {
    /// File header
    FileHeader = 1,
    /// Stream header
    StreamHeader = 2,
    /// Samples
    Samples = 3,
    /// Clock offset measurement
    ClockOffset = 4,
    /// Boundary marker
    Boundary = 5,
    /// Stream footer
    StreamFooter = 6,
}

impl ChunkTag {
    fn from_u16(tag: u16) -> Option<Self> {
        match tag {
            1 => Some(Self::FileHeader),
            2 => Some(Self::StreamHeader),
            3 => Some(Self::Samples),
            4 => Some(Self::ClockOffset),
            5 => Some(Self::Boundary),
            6 => Some(Self::StreamFooter),
            _ => None,
        }
    }
}

/// One clock offset measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockOffset {
    /// Time the offset was measured (stream clock)
    pub collection_time: f64,
    /// Offset to the recorder clock
    pub offset: f64,
}

/// A decoded stream.
///
/// Numeric streams fill `time_series` as samples × channels, the layout they
/// are stored in. String streams keep their values in `markers` and leave
/// `time_series` with zero rows.
#[derive(Debug, Clone, PartialEq)]
pub struct XdfStream {
    /// Header metadata
    pub info: StreamInfo,
    /// Samples × channels values
    pub time_series: Array2<f64>,
    /// One timestamp per sample
    pub timestamps: Vec<f64>,
    /// Per-sample string values of a string stream
    pub markers: Vec<Vec<String>>,
    /// Clock offset measurements
    pub clock_offsets: Vec<ClockOffset>,
    /// Raw footer XML, when present
    pub footer: Option<String>,
}

impl XdfStream {
    /// Number of samples
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether values decode to numbers
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.info.channel_format.is_numeric()
    }

    /// First sample count recorded in the footer, if any
    #[must_use]
    pub fn footer_sample_count(&self) -> Option<usize> {
        self.footer
            .as_deref()
            .and_then(|xml| extract_tag(xml, "sample_count"))
            .and_then(|s| s.parse().ok())
    }
}

/// A parsed XDF file.
#[derive(Debug, Clone, PartialEq)]
pub struct XdfFile {
    /// File header XML
    pub header: String,
    /// Streams in header order
    pub streams: Vec<XdfStream>,
}

impl XdfFile {
    /// Read and parse a file.
    ///
    /// # Errors
    ///
    /// Returns IO errors, or a format error naming the failing byte offset.
    pub fn read(path: impl AsRef<Path>) -> ImportResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let file = Self::parse(&bytes)?;
        info!(
            path = %path.display(),
            n_streams = file.streams.len(),
            "Loaded XDF file"
        );
        Ok(file)
    }

    /// Parse an in-memory XDF image.
    ///
    /// # Errors
    ///
    /// Returns a format error naming the failing byte offset.
    pub fn parse(bytes: &[u8]) -> ImportResult<Self> {
        let mut cursor = Cursor::new(bytes);
        if cursor.take(4)? != XDF_MAGIC {
            return Err(ImportError::format(0, "missing XDF: magic"));
        }

        let mut header = String::new();
        let mut builders: Vec<StreamBuilder> = Vec::new();
        let mut by_id: HashMap<u32, usize> = HashMap::new();

        while !cursor.is_empty() {
            let chunk_start = cursor.pos;
            let length = cursor.varlen()?;
            if length < 2 {
                return Err(ImportError::format(
                    chunk_start,
                    format!("chunk length {length} is shorter than its tag"),
                ));
            }
            let tag = cursor.u16()?;
            let content_start = cursor.pos;
            let content = cursor.take(length - 2)?;
            let mut chunk = Cursor::at(content, content_start);

            match ChunkTag::from_u16(tag) {
                Some(ChunkTag::FileHeader) => header = chunk.utf8_rest()?,
                Some(ChunkTag::StreamHeader) => {
                    let stream_id = chunk.u32()?;
                    let xml = chunk.utf8_rest()?;
                    let info = StreamInfo::from_xml(stream_id, &xml).ok_or_else(|| {
                        ImportError::format(
                            content_start,
                            format!("stream {stream_id} header lacks name, channel_count or channel_format"),
                        )
                    })?;
                    if by_id.insert(stream_id, builders.len()).is_some() {
                        return Err(ImportError::format(
                            chunk_start,
                            format!("duplicate header for stream {stream_id}"),
                        ));
                    }
                    debug!(stream_id, name = %info.name, "Read stream header");
                    builders.push(StreamBuilder::new(info));
                }
                Some(ChunkTag::Samples) => {
                    let stream_id = chunk.u32()?;
                    let builder = lookup(&mut builders, &by_id, stream_id, chunk_start)?;
                    builder.read_samples(&mut chunk)?;
                }
                Some(ChunkTag::ClockOffset) => {
                    let stream_id = chunk.u32()?;
                    let collection_time = chunk.f64()?;
                    let offset = chunk.f64()?;
                    lookup(&mut builders, &by_id, stream_id, chunk_start)?
                        .clock_offsets
                        .push(ClockOffset {
                            collection_time,
                            offset,
                        });
                }
                Some(ChunkTag::StreamFooter) => {
                    let stream_id = chunk.u32()?;
                    let xml = chunk.utf8_rest()?;
                    lookup(&mut builders, &by_id, stream_id, chunk_start)?.footer = Some(xml);
                }
                Some(ChunkTag::Boundary) => {}
                None => warn!(tag, offset = chunk_start, "Skipping unknown XDF chunk"),
            }
        }

        let streams = builders
            .into_iter()
            .map(StreamBuilder::finish)
            .collect::<ImportResult<Vec<_>>>()?;
        Ok(Self { header, streams })
    }

    /// Metadata of every stream
    #[must_use]
    pub fn stream_infos(&self) -> Vec<&StreamInfo> {
        self.streams.iter().map(|s| &s.info).collect()
    }

    /// Stream names in file order
    #[must_use]
    pub fn stream_names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.info.name.as_str()).collect()
    }
}

fn lookup<'a>(
    builders: &'a mut [StreamBuilder],
    by_id: &HashMap<u32, usize>,
    stream_id: u32,
    offset: usize,
) -> ImportResult<&'a mut StreamBuilder> {
    by_id
        .get(&stream_id)
        .and_then(|&i| builders.get_mut(i))
        .ok_or_else(|| {
            ImportError::format(offset, format!("chunk for stream {stream_id} before its header"))
        })
}

struct StreamBuilder {
    info: StreamInfo,
    values: Vec<f64>,
    timestamps: Vec<f64>,
    markers: Vec<Vec<String>>,
    clock_offsets: Vec<ClockOffset>,
    footer: Option<String>,
}

impl StreamBuilder {
    fn new(info: StreamInfo) -> Self {
        Self {
            info,
            values: Vec::new(),
            timestamps: Vec::new(),
            markers: Vec::new(),
            clock_offsets: Vec::new(),
            footer: None,
        }
    }

    fn read_samples(&mut self, chunk: &mut Cursor<'_>) -> ImportResult<()> {
        let count = chunk.varlen()?;
        let step = if self.info.nominal_srate > 0.0 {
            1.0 / self.info.nominal_srate
        } else {
            0.0
        };

        for _ in 0..count {
            let ts_start = chunk.pos;
            let timestamp = match chunk.u8()? {
                0 => self.timestamps.last().map_or(0.0, |last| last + step),
                8 => chunk.f64()?,
                other => {
                    return Err(ImportError::format(
                        ts_start,
                        format!("timestamp size must be 0 or 8, got {other}"),
                    ))
                }
            };
            self.timestamps.push(timestamp);

            if self.info.channel_format == ChannelFormat::String {
                let row = (0..self.info.channel_count)
                    .map(|_| {
                        let len = chunk.varlen()?;
                        let start = chunk.pos;
                        String::from_utf8(chunk.take(len)?.to_vec())
                            .map_err(|_| ImportError::format(start, "string value is not UTF-8"))
                    })
                    .collect::<ImportResult<Vec<_>>>()?;
                self.markers.push(row);
            } else {
                for _ in 0..self.info.channel_count {
                    self.values.push(chunk.value(self.info.channel_format)?);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> ImportResult<XdfStream> {
        let n_samples = self.timestamps.len();
        let rows = if self.info.channel_format.is_numeric() {
            n_samples
        } else {
            0
        };
        let time_series = Array2::from_shape_vec((rows, self.info.channel_count), self.values)
            .map_err(|e| {
                ImportError::configuration("xdf stream", format!("stream '{}': {e}", self.info.name))
            })?;
        Ok(XdfStream {
            info: self.info,
            time_series,
            timestamps: self.timestamps,
            markers: self.markers,
            clock_offsets: self.clock_offsets,
            footer: self.footer,
        })
    }
}

// ============================================================================
// Byte cursor
// ============================================================================

struct Cursor<'a> {
    data: &'a [u8],
    /// Position within `data`
    local: usize,
    /// Absolute file offset of `data[0]`
    base: usize,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    fn at(data: &'a [u8], base: usize) -> Self {
        Self {
            data,
            local: 0,
            base,
            pos: base,
        }
    }

    fn is_empty(&self) -> bool {
        self.local >= self.data.len()
    }

    fn take(&mut self, len: usize) -> ImportResult<&'a [u8]> {
        let end = self
            .local
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                ImportError::format(
                    self.pos,
                    format!(
                        "truncated: needed {len} bytes, {} left",
                        self.data.len() - self.local
                    ),
                )
            })?;
        let bytes = &self.data[self.local..end];
        self.local = end;
        self.pos = self.base + end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> ImportResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> ImportResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> ImportResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> ImportResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> ImportResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> ImportResult<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn varlen(&mut self) -> ImportResult<usize> {
        let start = self.pos;
        let value = match self.u8()? {
            1 => u64::from(self.u8()?),
            4 => u64::from(self.u32()?),
            8 => self.u64()?,
            other => {
                return Err(ImportError::format(
                    start,
                    format!("length prefix size must be 1, 4 or 8, got {other}"),
                ))
            }
        };
        usize::try_from(value)
            .map_err(|_| ImportError::format(start, format!("length {value} does not fit in memory")))
    }

    #[allow(clippy::cast_precision_loss)]
    fn value(&mut self, format: ChannelFormat) -> ImportResult<f64> {
        Ok(match format {
            ChannelFormat::Float32 => f64::from(f32::from_le_bytes(self.array()?)),
            ChannelFormat::Double64 => self.f64()?,
            ChannelFormat::Int8 => f64::from(i8::from_le_bytes(self.array()?)),
            ChannelFormat::Int16 => f64::from(i16::from_le_bytes(self.array()?)),
            ChannelFormat::Int32 => f64::from(i32::from_le_bytes(self.array()?)),
            ChannelFormat::Int64 => i64::from_le_bytes(self.array()?) as f64,
            ChannelFormat::String => {
                return Err(ImportError::format(self.pos, "string value in numeric decode"))
            }
        })
    }

    fn utf8_rest(&mut self) -> ImportResult<String> {
        let start = self.pos;
        let rest = self.take(self.data.len() - self.local)?;
        String::from_utf8(rest.to_vec())
            .map_err(|_| ImportError::format(start, "XML text is not UTF-8"))
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Streaming XDF writer.
///
/// ```rust
/// use ndarray::array;
/// use rootstar_hyperscan_xdf::stream::{StreamInfo, StreamType};
/// use rootstar_hyperscan_xdf::xdf::{XdfFile, XdfWriter};
///
/// let info = StreamInfo::new(1, "A-EEG", StreamType::Eeg, 2, 256.0);
/// let mut writer = XdfWriter::new(Vec::new())?;
/// writer.write_stream_header(&info)?;
/// writer.write_samples(&info, &[0.0, 1.0 / 256.0], array![[1.0, 2.0], [3.0, 4.0]].view())?;
/// let bytes = writer.finish()?;
///
/// let file = XdfFile::parse(&bytes)?;
/// assert_eq!(file.streams[0].time_series, array![[1.0, 2.0], [3.0, 4.0]]);
/// # Ok::<(), rootstar_hyperscan_xdf::ImportError>(())
/// ```
pub struct XdfWriter<W: Write> {
    inner: W,
}

impl<W: Write> XdfWriter<W> {
    /// Write the magic and file header.
    ///
    /// # Errors
    ///
    /// Returns IO errors from the underlying writer.
    pub fn new(mut inner: W) -> ImportResult<Self> {
        inner.write_all(XDF_MAGIC)?;
        let mut writer = Self { inner };
        writer.write_chunk(
            ChunkTag::FileHeader,
            b"<?xml version=\"1.0\"?><info><version>1.0</version></info>",
        )?;
        Ok(writer)
    }

    /// Write a stream header chunk.
    ///
    /// # Errors
    ///
    /// Returns IO errors from the underlying writer.
    pub fn write_stream_header(&mut self, info: &StreamInfo) -> ImportResult<()> {
        let mut content = info.stream_id.to_le_bytes().to_vec();
        content.extend_from_slice(info.to_xml().as_bytes());
        self.write_chunk(ChunkTag::StreamHeader, &content)
    }

    /// Write numeric samples (rows are samples) with explicit timestamps.
    ///
    /// `float32` streams store the nearest `f32`. Integer streams only
    /// accept whole values inside the range of their format.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the stream is not numeric, the
    /// shapes disagree, or a value does not fit an integer format, and IO
    /// errors from the underlying writer. Nothing is written on error.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_samples(
        &mut self,
        info: &StreamInfo,
        timestamps: &[f64],
        samples: ArrayView2<'_, f64>,
    ) -> ImportResult<()> {
        if !info.channel_format.is_numeric() {
            return Err(ImportError::configuration(
                "xdf writer",
                format!("stream '{}' has string format", info.name),
            ));
        }
        if samples.dim() != (timestamps.len(), info.channel_count) {
            return Err(ImportError::configuration(
                "xdf writer",
                format!(
                    "expected {}x{} samples for stream '{}', got {}x{}",
                    timestamps.len(),
                    info.channel_count,
                    info.name,
                    samples.nrows(),
                    samples.ncols()
                ),
            ));
        }

        let mut content = info.stream_id.to_le_bytes().to_vec();
        push_varlen(&mut content, timestamps.len());
        for (t, (row, &timestamp)) in samples.rows().into_iter().zip(timestamps).enumerate() {
            content.push(8);
            content.extend_from_slice(&timestamp.to_le_bytes());
            for (c, &value) in row.iter().enumerate() {
                let format = info.channel_format;
                let whole = || {
                    exact_integer(value, format).ok_or_else(|| {
                        ImportError::configuration(
                            "xdf writer",
                            format!(
                                "stream '{}': sample {t}, channel {c}: {value} is not a valid {} value",
                                info.name,
                                format.as_str()
                            ),
                        )
                    })
                };
                match format {
                    ChannelFormat::Float32 => content.extend_from_slice(&(value as f32).to_le_bytes()),
                    ChannelFormat::Double64 => content.extend_from_slice(&value.to_le_bytes()),
                    ChannelFormat::Int8 => content.extend_from_slice(&(whole()? as i8).to_le_bytes()),
                    ChannelFormat::Int16 => content.extend_from_slice(&(whole()? as i16).to_le_bytes()),
                    ChannelFormat::Int32 => content.extend_from_slice(&(whole()? as i32).to_le_bytes()),
                    ChannelFormat::Int64 => content.extend_from_slice(&whole()?.to_le_bytes()),
                    ChannelFormat::String => {}
                }
            }
        }
        self.write_chunk(ChunkTag::Samples, &content)
    }

    /// Write single-channel string samples.
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless the stream is a one-channel
    /// string stream, and IO errors from the underlying writer.
    pub fn write_markers(
        &mut self,
        info: &StreamInfo,
        timestamps: &[f64],
        markers: &[&str],
    ) -> ImportResult<()> {
        if info.channel_format != ChannelFormat::String || info.channel_count != 1 {
            return Err(ImportError::configuration(
                "xdf writer",
                format!("stream '{}' is not a single-channel string stream", info.name),
            ));
        }
        if timestamps.len() != markers.len() {
            return Err(ImportError::configuration(
                "xdf writer",
                format!(
                    "expected {} markers, got {}",
                    timestamps.len(),
                    markers.len()
                ),
            ));
        }

        let mut content = info.stream_id.to_le_bytes().to_vec();
        push_varlen(&mut content, markers.len());
        for (marker, &timestamp) in markers.iter().zip(timestamps) {
            content.push(8);
            content.extend_from_slice(&timestamp.to_le_bytes());
            push_varlen(&mut content, marker.len());
            content.extend_from_slice(marker.as_bytes());
        }
        self.write_chunk(ChunkTag::Samples, &content)
    }

    /// Write a clock offset measurement.
    ///
    /// # Errors
    ///
    /// Returns IO errors from the underlying writer.
    pub fn write_clock_offset(&mut self, stream_id: u32, offset: ClockOffset) -> ImportResult<()> {
        let mut content = stream_id.to_le_bytes().to_vec();
        content.extend_from_slice(&offset.collection_time.to_le_bytes());
        content.extend_from_slice(&offset.offset.to_le_bytes());
        self.write_chunk(ChunkTag::ClockOffset, &content)
    }

    /// Write a boundary chunk.
    ///
    /// # Errors
    ///
    /// Returns IO errors from the underlying writer.
    pub fn write_boundary(&mut self) -> ImportResult<()> {
        self.write_chunk(ChunkTag::Boundary, &BOUNDARY_UUID)
    }

    /// Write a stream footer with the sample count.
    ///
    /// # Errors
    ///
    /// Returns IO errors from the underlying writer.
    pub fn write_stream_footer(&mut self, stream_id: u32, sample_count: usize) -> ImportResult<()> {
        let xml = format!(
            "<?xml version=\"1.0\"?><info><sample_count>{sample_count}</sample_count></info>"
        );
        let mut content = stream_id.to_le_bytes().to_vec();
        content.extend_from_slice(xml.as_bytes());
        self.write_chunk(ChunkTag::StreamFooter, &content)
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns IO errors from flushing.
    pub fn finish(mut self) -> ImportResult<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_chunk(&mut self, tag: ChunkTag, content: &[u8]) -> ImportResult<()> {
        let mut prefix = Vec::with_capacity(11);
        push_varlen(&mut prefix, content.len() + 2);
        prefix.extend_from_slice(&(tag as u16).to_le_bytes());
        self.inner.write_all(&prefix)?;
        self.inner.write_all(content)?;
        Ok(())
    }
}

/// `value` as an integer, when `format` stores it without loss.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn exact_integer(value: f64, format: ChannelFormat) -> Option<i64> {
    let bits = match format {
        ChannelFormat::Int8 => 8,
        ChannelFormat::Int16 => 16,
        ChannelFormat::Int32 => 32,
        ChannelFormat::Int64 => 64,
        _ => return None,
    };
    // [-2^(bits-1), 2^(bits-1)), exact in f64 for every width
    let bound = 2f64.powi(bits - 1);
    (value.fract() == 0.0 && value >= -bound && value < bound).then_some(value as i64)
}

#[allow(clippy::cast_possible_truncation)]
fn push_varlen(out: &mut Vec<u8>, value: usize) {
    if let Ok(small) = u8::try_from(value) {
        out.push(1);
        out.push(small);
    } else if let Ok(medium) = u32::try_from(value) {
        out.push(4);
        out.extend_from_slice(&medium.to_le_bytes());
    } else {
        out.push(8);
        out.extend_from_slice(&(value as u64).to_le_bytes());
    }
}
