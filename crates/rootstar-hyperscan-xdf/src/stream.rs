//! Stream metadata carried in XDF stream headers
//!
//! Headers are small LSL-style XML documents. Only the fields the import
//! path needs are read, with plain tag lookups rather than a full XML
//! parser:
//!
//! ```text
//! <info>
//!   <name>A-EEG</name>
//!   <type>EEG</type>
//!   <channel_count>8</channel_count>
//!   <nominal_srate>256</nominal_srate>
//!   <channel_format>float32</channel_format>
//!   <source_id>...</source_id>
//!   <desc><channels><channel><label>Fp1</label>...</channel>...</channels></desc>
//! </info>
//! ```

use serde::{Deserialize, Serialize};

/// Content type written into generated stream headers.
///
/// Headers read from files keep their type string verbatim in
/// [`StreamInfo::content_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    /// Electroencephalography
    Eeg,
    /// Markers/events
    Markers,
    /// Anything else
    Data,
}

impl StreamType {
    /// Type string as written in stream headers
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eeg => "EEG",
            Self::Markers => "Markers",
            Self::Data => "Data",
        }
    }
}

/// Per-value storage format of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelFormat {
    /// 32-bit float
    Float32,
    /// 64-bit float
    Double64,
    /// 8-bit integer
    Int8,
    /// 16-bit integer
    Int16,
    /// 32-bit integer
    Int32,
    /// 64-bit integer
    Int64,
    /// Variable-length string (markers)
    String,
}

impl ChannelFormat {
    /// Format name as written in stream headers
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Double64 => "double64",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::String => "string",
        }
    }

    /// Parse a header format name
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "float32" => Some(Self::Float32),
            "double64" => Some(Self::Double64),
            "int8" => Some(Self::Int8),
            "int16" => Some(Self::Int16),
            "int32" => Some(Self::Int32),
            "int64" => Some(Self::Int64),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    /// Bytes per value, `None` for strings
    #[must_use]
    pub fn bytes_per_value(&self) -> Option<usize> {
        match self {
            Self::Float32 | Self::Int32 => Some(4),
            Self::Double64 | Self::Int64 => Some(8),
            Self::Int16 => Some(2),
            Self::Int8 => Some(1),
            Self::String => None,
        }
    }

    /// Whether values decode to numbers
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.bytes_per_value().is_some()
    }
}

/// Stream metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Stream id within the file
    pub stream_id: u32,
    /// Stream name (e.g., "A-EEG")
    pub name: String,
    /// Raw content type string from the header
    pub content_type: String,
    /// Number of channels
    pub channel_count: usize,
    /// Nominal sample rate (Hz), 0 for irregular
    pub nominal_srate: f64,
    /// Channel data format
    pub channel_format: ChannelFormat,
    /// Unique source ID
    pub source_id: String,
    /// Channel labels from `desc/channels`, empty when absent
    pub channel_labels: Vec<String>,
}

impl StreamInfo {
    /// Create new stream info
    #[must_use]
    pub fn new(
        stream_id: u32,
        name: &str,
        stream_type: StreamType,
        channel_count: usize,
        nominal_srate: f64,
    ) -> Self {
        Self {
            stream_id,
            name: name.to_string(),
            content_type: stream_type.as_str().to_string(),
            channel_count,
            nominal_srate,
            channel_format: ChannelFormat::Float32,
            source_id: format!("rootstar-{name}-{stream_id}"),
            channel_labels: Vec::new(),
        }
    }

    /// Set channel labels
    #[must_use]
    pub fn with_channel_labels<S: AsRef<str>>(mut self, labels: &[S]) -> Self {
        self.channel_labels = labels.iter().map(|l| l.as_ref().to_string()).collect();
        self
    }

    /// Set channel format
    #[must_use]
    pub fn with_format(mut self, format: ChannelFormat) -> Self {
        self.channel_format = format;
        self
    }

    /// Generate the XML stream header
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\"?>\n");
        xml.push_str("<info>\n");
        push_tag(&mut xml, 1, "name", &self.name);
        push_tag(&mut xml, 1, "type", &self.content_type);
        push_tag(&mut xml, 1, "channel_count", &self.channel_count.to_string());
        push_tag(&mut xml, 1, "nominal_srate", &self.nominal_srate.to_string());
        push_tag(&mut xml, 1, "channel_format", self.channel_format.as_str());
        push_tag(&mut xml, 1, "source_id", &self.source_id);

        xml.push_str("  <desc>\n");
        if !self.channel_labels.is_empty() {
            xml.push_str("    <channels>\n");
            for label in &self.channel_labels {
                xml.push_str("      <channel>\n");
                push_tag(&mut xml, 4, "label", label);
                push_tag(&mut xml, 4, "type", &self.content_type);
                xml.push_str("      </channel>\n");
            }
            xml.push_str("    </channels>\n");
        }
        xml.push_str("  </desc>\n");
        xml.push_str("</info>\n");
        xml
    }

    /// Parse an XML stream header.
    ///
    /// Returns `None` when a required field (name, channel count, format)
    /// is missing or malformed. A missing type or sample rate falls back to
    /// an empty type and 0 Hz.
    #[must_use]
    pub fn from_xml(stream_id: u32, xml: &str) -> Option<Self> {
        let (header, desc) = match xml.find("<desc") {
            Some(i) => (&xml[..i], &xml[i..]),
            None => (xml, ""),
        };

        let name = extract_tag(header, "name")?;
        let channel_count = extract_tag(header, "channel_count")?.trim().parse().ok()?;
        let channel_format = ChannelFormat::parse(&extract_tag(header, "channel_format")?)?;
        let content_type = extract_tag(header, "type").unwrap_or_default();
        let nominal_srate = extract_tag(header, "nominal_srate")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0);
        let source_id = extract_tag(header, "source_id").unwrap_or_default();

        Some(Self {
            stream_id,
            name,
            content_type,
            channel_count,
            nominal_srate,
            channel_format,
            source_id,
            channel_labels: extract_channel_labels(desc),
        })
    }
}

fn push_tag(xml: &mut String, depth: usize, tag: &str, value: &str) {
    for _ in 0..depth {
        xml.push_str("  ");
    }
    xml.push('<');
    xml.push_str(tag);
    xml.push('>');
    xml.push_str(&escape_xml(value));
    xml.push_str("</");
    xml.push_str(tag);
    xml.push_str(">\n");
}

/// Text of the first `<tag>...</tag>` element, unescaped.
pub(crate) fn extract_tag(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(unescape_xml(xml[start..end].trim()))
}

fn extract_channel_labels(desc: &str) -> Vec<String> {
    let Some(channels) = extract_block(desc, "channels") else {
        return Vec::new();
    };
    let mut labels = Vec::new();
    let mut rest = channels;
    while let Some(start) = rest.find("<channel>") {
        let body = &rest[start + "<channel>".len()..];
        let Some(end) = body.find("</channel>") else {
            break;
        };
        labels.push(extract_tag(&body[..end], "label").unwrap_or_default());
        rest = &body[end + "</channel>".len()..];
    }
    labels
}

fn extract_block<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
