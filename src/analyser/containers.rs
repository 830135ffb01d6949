use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, Serializer};

/// Terminal label of a frame whose layers ran out before any payload layer.
pub const NO_PAYLOAD_LABEL: &str = "NoPayload";
/// Terminal label of a frame that reached the generic payload layer.
pub const PAYLOAD_LABEL: &str = "data";
/// Capture label used when no device label is supplied.
pub const NO_LABEL: &str = "NoLabel";

/// IPv4 header fields, options excluded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ipv4Fields {
    pub version: Option<u8>,
    pub ihl: Option<u8>,
    pub tos: Option<u8>,
    pub len: Option<u16>,
    pub id: Option<u16>,
    pub flags: Option<u8>,
    pub frag: Option<u16>,
    pub ttl: Option<u8>,
    pub proto: Option<u8>,
    pub chksum: Option<u16>,
    pub src: Option<String>,
    pub dst: Option<String>,
}

/// TCP header fields, options excluded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TcpFields {
    pub sport: Option<String>,
    pub dport: Option<String>,
    pub seq: Option<u32>,
    pub ack: Option<u32>,
    pub dataofs: Option<u8>,
    pub reserved: Option<u8>,
    pub flags: Option<u16>,
    pub window: Option<u16>,
    pub chksum: Option<u16>,
    pub urgptr: Option<u16>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UdpFields {
    pub sport: Option<String>,
    pub dport: Option<String>,
    pub len: Option<u16>,
    pub chksum: Option<u16>,
}

/// One protocol level of a frame, as far as the decoder understands it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedLayer {
    Ipv4(Ipv4Fields),
    Tcp(TcpFields),
    Udp(UdpFields),
    /// Generic payload; only its byte length is kept.
    Payload { len: u16 },
    /// First layer outside the recognized set, by protocol name.
    Other(String),
}

/// One flat, fixed-width row per captured frame.
///
/// Column order and names match [`crate::analyser::record::COLUMNS`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PacketRecord {
    pub timestamp: DateTime<Utc>,
    pub layer: String,

    pub ip_version: Option<u8>,
    pub ip_ihl: Option<u8>,
    pub ip_tos: Option<u8>,
    pub ip_len: Option<u16>,
    pub ip_id: Option<u16>,
    pub ip_flags: Option<u8>,
    pub ip_frag: Option<u16>,
    pub ip_ttl: Option<u8>,
    pub ip_proto: Option<u8>,
    pub ip_chksum: Option<u16>,
    pub ip_src: Option<String>,
    pub ip_dst: Option<String>,

    pub tcp_sport: Option<String>,
    pub tcp_dport: Option<String>,
    pub tcp_seq: Option<u32>,
    pub tcp_ack: Option<u32>,
    pub tcp_dataofs: Option<u8>,
    pub tcp_reserved: Option<u8>,
    pub tcp_flags: Option<u16>,
    pub tcp_window: Option<u16>,
    pub tcp_chksum: Option<u16>,
    pub tcp_urgptr: Option<u16>,

    pub udp_sport: Option<String>,
    pub udp_dport: Option<String>,
    pub udp_len: Option<u16>,
    pub udp_chksum: Option<u16>,

    pub payload_len: Option<u16>,
}

impl PacketRecord {
    /// Payload bytes as seen by burst segmentation; frames without a payload layer count as 0.
    pub fn payload_size(&self) -> u64 {
        self.payload_len.map(u64::from).unwrap_or(0)
    }
}

/// Burst statistics attached to a single row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BurstStats {
    pub burst_id: u32,
    pub burst_length: u32,
    pub burst_avg_size: f64,
}

impl BurstStats {
    /// The shared "no burst" bucket.
    pub const NONE: BurstStats = BurstStats {
        burst_id: 0,
        burst_length: 0,
        burst_avg_size: 0.0,
    };
}

/// A packet record enriched with its temporal and burst features.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureRow {
    #[serde(flatten)]
    pub record: PacketRecord,
    #[serde(serialize_with = "serialize_seconds")]
    pub inter_arrival: Option<TimeDelta>,
    #[serde(flatten)]
    pub burst: BurstStats,
}

/// The final table for one capture.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureFrame {
    pub label: String,
    pub size_threshold: u64,
    pub group_count: usize,
    pub rows: Vec<FeatureRow>,
}

impl FeatureFrame {
    /// Number of distinct non-zero burst ids.
    pub fn burst_count(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.burst.burst_id)
            .max()
            .unwrap_or(0) as usize
    }
}

/// Inter-arrival times are written as fractional seconds.
fn serialize_seconds<S: Serializer>(delta: &Option<TimeDelta>, serializer: S) -> Result<S::Ok, S::Error> {
    match delta {
        Some(delta) => serializer.serialize_some(&delta_seconds(*delta)),
        None => serializer.serialize_none(),
    }
}

fn delta_seconds(delta: TimeDelta) -> f64 {
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

pub fn delta_millis(delta: TimeDelta) -> f64 {
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000.0,
        None => delta.num_milliseconds() as f64,
    }
}
