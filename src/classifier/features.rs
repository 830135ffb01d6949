//! Null filling and feature selection for the classifier.
use serde::Serialize;

use crate::analyser::containers::{delta_millis, FeatureRow, NO_PAYLOAD_LABEL};

/// Placeholder for missing categorical columns.
pub const MISSING_CATEGORY: &str = "0";

/// Names of the columns fed to the classifier, in vector order.
pub const FEATURE_NAMES: [&str; 4] = ["payload_len", "inter_arrival_ms", "burst_length", "burst_avg_size"];

/// A feature row with every null replaced by its column default.
///
/// Numeric columns default to 0, categorical ones to [MISSING_CATEGORY], the
/// terminal label to [NO_PAYLOAD_LABEL] and the inter-arrival time to zero.
/// Ports are coerced to integers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilledRecord {
    pub layer: String,
    pub ip_version: u8,
    pub ip_ihl: u8,
    pub ip_tos: u8,
    pub ip_len: u16,
    pub ip_id: u16,
    pub ip_flags: u8,
    pub ip_frag: u16,
    pub ip_ttl: u8,
    pub ip_proto: u8,
    pub ip_chksum: u16,
    pub ip_src: String,
    pub ip_dst: String,
    pub tcp_sport: u32,
    pub tcp_dport: u32,
    pub tcp_seq: u32,
    pub tcp_ack: u32,
    pub tcp_dataofs: u8,
    pub tcp_reserved: u8,
    pub tcp_flags: u16,
    pub tcp_window: u16,
    pub tcp_chksum: u16,
    pub tcp_urgptr: u16,
    pub udp_sport: u32,
    pub udp_dport: u32,
    pub udp_len: u16,
    pub udp_chksum: u16,
    pub payload_len: u16,
    pub inter_arrival_ms: f64,
    pub burst_id: u32,
    pub burst_length: u32,
    pub burst_avg_size: f64,
}

fn port(value: &Option<String>) -> u32 {
    value
        .as_deref()
        .and_then(|port| port.trim().parse().ok())
        .unwrap_or(0)
}

fn category(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| MISSING_CATEGORY.to_string())
}

impl From<&FeatureRow> for FilledRecord {
    fn from(row: &FeatureRow) -> Self {
        let record = &row.record;
        Self {
            layer: if record.layer.is_empty() {
                NO_PAYLOAD_LABEL.to_string()
            } else {
                record.layer.clone()
            },
            ip_version: record.ip_version.unwrap_or(0),
            ip_ihl: record.ip_ihl.unwrap_or(0),
            ip_tos: record.ip_tos.unwrap_or(0),
            ip_len: record.ip_len.unwrap_or(0),
            ip_id: record.ip_id.unwrap_or(0),
            ip_flags: record.ip_flags.unwrap_or(0),
            ip_frag: record.ip_frag.unwrap_or(0),
            ip_ttl: record.ip_ttl.unwrap_or(0),
            ip_proto: record.ip_proto.unwrap_or(0),
            ip_chksum: record.ip_chksum.unwrap_or(0),
            ip_src: category(&record.ip_src),
            ip_dst: category(&record.ip_dst),
            tcp_sport: port(&record.tcp_sport),
            tcp_dport: port(&record.tcp_dport),
            tcp_seq: record.tcp_seq.unwrap_or(0),
            tcp_ack: record.tcp_ack.unwrap_or(0),
            tcp_dataofs: record.tcp_dataofs.unwrap_or(0),
            tcp_reserved: record.tcp_reserved.unwrap_or(0),
            tcp_flags: record.tcp_flags.unwrap_or(0),
            tcp_window: record.tcp_window.unwrap_or(0),
            tcp_chksum: record.tcp_chksum.unwrap_or(0),
            tcp_urgptr: record.tcp_urgptr.unwrap_or(0),
            udp_sport: port(&record.udp_sport),
            udp_dport: port(&record.udp_dport),
            udp_len: record.udp_len.unwrap_or(0),
            udp_chksum: record.udp_chksum.unwrap_or(0),
            payload_len: record.payload_len.unwrap_or(0),
            inter_arrival_ms: row.inter_arrival.map(delta_millis).unwrap_or(0.0),
            burst_id: row.burst.burst_id,
            burst_length: row.burst.burst_length,
            burst_avg_size: row.burst.burst_avg_size,
        }
    }
}

/// The reduced numeric view the classifier consumes, ordered as [FEATURE_NAMES].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureVector(pub [f64; 4]);

impl From<&FilledRecord> for FeatureVector {
    fn from(filled: &FilledRecord) -> Self {
        FeatureVector([
            f64::from(filled.payload_len),
            filled.inter_arrival_ms,
            f64::from(filled.burst_length),
            filled.burst_avg_size,
        ])
    }
}

impl From<&FeatureRow> for FeatureVector {
    fn from(row: &FeatureRow) -> Self {
        FeatureVector::from(&FilledRecord::from(row))
    }
}
