//! Flattens decoded layers into fixed-width [PacketRecord] rows.
use std::fmt;

use chrono::{DateTime, Utc};

use super::containers::{DecodedLayer, PacketRecord, NO_PAYLOAD_LABEL, PAYLOAD_LABEL};
use super::decoder::{decode_layers, RawFrame};
use super::error::Result;
use ColumnKind::{Category, Timestamp, UInt};

/// Value domain of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Timestamp,
    /// Categorical string (labels, addresses, ports)
    Category,
    /// Nullable unsigned integer of the given protocol bit-width
    UInt(u32),
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Timestamp => write!(f, "datetime"),
            Category => write!(f, "category"),
            UInt(bits) => write!(f, "uint{bits}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

/// Every column a [PacketRecord] carries, in output order. Option fields of
/// IPv4 and TCP are deliberately absent.
pub const COLUMNS: [Column; 29] = [
    col("timestamp", Timestamp),
    col("layer", Category),
    col("ip_version", UInt(4)),
    col("ip_ihl", UInt(4)),
    col("ip_tos", UInt(8)),
    col("ip_len", UInt(16)),
    col("ip_id", UInt(16)),
    col("ip_flags", UInt(3)),
    col("ip_frag", UInt(13)),
    col("ip_ttl", UInt(8)),
    col("ip_proto", UInt(8)),
    col("ip_chksum", UInt(16)),
    col("ip_src", Category),
    col("ip_dst", Category),
    col("tcp_sport", Category),
    col("tcp_dport", Category),
    col("tcp_seq", UInt(32)),
    col("tcp_ack", UInt(32)),
    col("tcp_dataofs", UInt(4)),
    col("tcp_reserved", UInt(3)),
    col("tcp_flags", UInt(9)),
    col("tcp_window", UInt(16)),
    col("tcp_chksum", UInt(16)),
    col("tcp_urgptr", UInt(16)),
    col("udp_sport", Category),
    col("udp_dport", Category),
    col("udp_len", UInt(16)),
    col("udp_chksum", UInt(16)),
    col("payload_len", UInt(16)),
];

/// Builds one record from an already decoded layer stack.
pub fn build_record(timestamp: DateTime<Utc>, layers: Vec<DecodedLayer>) -> PacketRecord {
    let mut record = PacketRecord {
        timestamp,
        layer: NO_PAYLOAD_LABEL.to_string(),
        ..Default::default()
    };

    for layer in layers {
        match layer {
            DecodedLayer::Ipv4(ip) => {
                record.ip_version = ip.version;
                record.ip_ihl = ip.ihl;
                record.ip_tos = ip.tos;
                record.ip_len = ip.len;
                record.ip_id = ip.id;
                record.ip_flags = ip.flags;
                record.ip_frag = ip.frag;
                record.ip_ttl = ip.ttl;
                record.ip_proto = ip.proto;
                record.ip_chksum = ip.chksum;
                record.ip_src = ip.src;
                record.ip_dst = ip.dst;
            }
            DecodedLayer::Tcp(tcp) => {
                record.tcp_sport = tcp.sport;
                record.tcp_dport = tcp.dport;
                record.tcp_seq = tcp.seq;
                record.tcp_ack = tcp.ack;
                record.tcp_dataofs = tcp.dataofs;
                record.tcp_reserved = tcp.reserved;
                record.tcp_flags = tcp.flags;
                record.tcp_window = tcp.window;
                record.tcp_chksum = tcp.chksum;
                record.tcp_urgptr = tcp.urgptr;
            }
            DecodedLayer::Udp(udp) => {
                record.udp_sport = udp.sport;
                record.udp_dport = udp.dport;
                record.udp_len = udp.len;
                record.udp_chksum = udp.chksum;
            }
            DecodedLayer::Payload { len } => {
                record.payload_len = Some(len);
                record.layer = PAYLOAD_LABEL.to_string();
            }
            DecodedLayer::Other(name) => record.layer = name,
        }
    }

    record
}

/// Decodes every frame into a record, preserving capture order.
///
/// Frames without a usable timestamp are skipped with a warning.
pub fn build_records<F: RawFrame>(frames: &[F]) -> Result<Vec<PacketRecord>> {
    log::info!("Building records for {} frames.", frames.len());
    let mut records = Vec::with_capacity(frames.len());

    for (index, frame) in frames.iter().enumerate() {
        let Some(timestamp) = frame.timestamp_micros().and_then(DateTime::from_timestamp_micros) else {
            log::warn!("Frame {index} has no usable timestamp, skipping");
            continue;
        };
        let layers = decode_layers(frame.layers())?;
        records.push(build_record(timestamp, layers));
    }

    Ok(records)
}
