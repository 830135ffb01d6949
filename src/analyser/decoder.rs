//! Unwraps a captured frame's layer chain into typed [DecodedLayer]s.
//!
//! Layers come from tshark (through rtshark) as a protocol name plus a map of
//! field names to display strings. This is the only place those names are
//! interpreted; everything past the decoder works on [DecodedLayer].
use super::containers::{DecodedLayer, Ipv4Fields, TcpFields, UdpFields};
use super::error::{AnalysisError, Result};

/// A single protocol layer as exposed by the frame-parsing collaborator.
pub trait ProtocolLayer {
    fn name(&self) -> &str;
    fn field(&self, key: &str) -> Option<&str>;
}

/// One captured frame: a timestamp and its layers from the outermost inward.
pub trait RawFrame {
    type Layer: ProtocolLayer;

    fn timestamp_micros(&self) -> Option<i64>;
    fn layers<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Self::Layer> + 'a>;
}

impl ProtocolLayer for rtshark::Layer {
    fn name(&self) -> &str {
        rtshark::Layer::name(self)
    }

    fn field(&self, key: &str) -> Option<&str> {
        self.metadata(key).map(|metadata| metadata.value())
    }
}

impl RawFrame for rtshark::Packet {
    type Layer = rtshark::Layer;

    fn timestamp_micros(&self) -> Option<i64> {
        rtshark::Packet::timestamp_micros(self)
    }

    fn layers<'a>(&'a self) -> Box<dyn Iterator<Item = &'a rtshark::Layer> + 'a> {
        Box::new(self.iter())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LayerKind {
    Capture,
    Ipv4,
    Tcp,
    Udp,
    Payload,
    Other,
}

fn classify(name: &str) -> LayerKind {
    match name {
        "frame" => LayerKind::Capture,
        "ip" => LayerKind::Ipv4,
        "tcp" => LayerKind::Tcp,
        "udp" => LayerKind::Udp,
        "data" => LayerKind::Payload,
        _ => LayerKind::Other,
    }
}

/// Decodes the layers of one frame.
///
/// The capture pseudo-layer and the link layer are skipped. Decoding then runs
/// through IPv4, TCP/UDP and payload, and stops at the payload layer or at the
/// first layer it does not recognize, which is kept as [DecodedLayer::Other].
/// A recognized layer appearing out of place (a second IPv4 header, a
/// transport without a network layer) is treated the same way.
///
/// Only a field overflowing its column width fails the frame.
pub fn decode_layers<'a, L, I>(layers: I) -> Result<Vec<DecodedLayer>>
where
    L: ProtocolLayer + 'a,
    I: IntoIterator<Item = &'a L>,
{
    let mut decoded = Vec::with_capacity(4);
    let mut seen_network = false;
    let mut seen_transport = false;

    let chain = layers
        .into_iter()
        .skip_while(|layer| classify(layer.name()) == LayerKind::Capture)
        .skip(1);

    for layer in chain {
        match classify(layer.name()) {
            LayerKind::Ipv4 if !seen_network => {
                decoded.push(DecodedLayer::Ipv4(decode_ipv4(layer)?));
                seen_network = true;
            }
            LayerKind::Tcp if seen_network && !seen_transport => {
                decoded.push(DecodedLayer::Tcp(decode_tcp(layer)?));
                seen_transport = true;
            }
            LayerKind::Udp if seen_network && !seen_transport => {
                decoded.push(DecodedLayer::Udp(decode_udp(layer)?));
                seen_transport = true;
            }
            LayerKind::Payload => {
                decoded.push(DecodedLayer::Payload {
                    len: payload_len(layer)?,
                });
                break;
            }
            _ => {
                decoded.push(DecodedLayer::Other(layer.name().to_string()));
                break;
            }
        }
    }

    Ok(decoded)
}

fn decode_ipv4<L: ProtocolLayer>(layer: &L) -> Result<Ipv4Fields> {
    Ok(Ipv4Fields {
        version: bounded("ip_version", number(layer, "ip.version"), 4)?,
        // tshark reports header lengths in bytes
        ihl: bounded("ip_ihl", number(layer, "ip.hdr_len").map(|b| b / 4), 4)?,
        tos: bounded("ip_tos", number(layer, "ip.dsfield"), 8)?,
        len: bounded("ip_len", number(layer, "ip.len"), 16)?,
        id: bounded("ip_id", number(layer, "ip.id"), 16)?,
        flags: bounded("ip_flags", number(layer, "ip.flags").map(ip_flag_bits), 3)?,
        // and fragment offsets in bytes rather than 8-byte units
        frag: bounded("ip_frag", number(layer, "ip.frag_offset").map(|b| b / 8), 13)?,
        ttl: bounded("ip_ttl", number(layer, "ip.ttl"), 8)?,
        proto: bounded("ip_proto", number(layer, "ip.proto"), 8)?,
        chksum: bounded("ip_chksum", number(layer, "ip.checksum"), 16)?,
        src: text(layer, "ip.src"),
        dst: text(layer, "ip.dst"),
    })
}

fn decode_tcp<L: ProtocolLayer>(layer: &L) -> Result<TcpFields> {
    // 12-bit word: 3 reserved bits, then NS CWR ECE URG ACK PSH RST SYN FIN
    let flag_word: Option<u16> = bounded("tcp_flags", number(layer, "tcp.flags"), 12)?;

    Ok(TcpFields {
        sport: text(layer, "tcp.srcport"),
        dport: text(layer, "tcp.dstport"),
        seq: bounded("tcp_seq", first_number(layer, &["tcp.seq_raw", "tcp.seq"]), 32)?,
        ack: bounded("tcp_ack", first_number(layer, &["tcp.ack_raw", "tcp.ack"]), 32)?,
        dataofs: bounded("tcp_dataofs", number(layer, "tcp.hdr_len").map(|b| b / 4), 4)?,
        reserved: flag_word.map(|word| ((word >> 9) & 0x7) as u8),
        flags: flag_word.map(|word| word & 0x1ff),
        window: bounded("tcp_window", number(layer, "tcp.window_size_value"), 16)?,
        chksum: bounded("tcp_chksum", number(layer, "tcp.checksum"), 16)?,
        urgptr: bounded("tcp_urgptr", number(layer, "tcp.urgent_pointer"), 16)?,
    })
}

fn decode_udp<L: ProtocolLayer>(layer: &L) -> Result<UdpFields> {
    Ok(UdpFields {
        sport: text(layer, "udp.srcport"),
        dport: text(layer, "udp.dstport"),
        len: bounded("udp_len", number(layer, "udp.length"), 16)?,
        chksum: bounded("udp_chksum", number(layer, "udp.checksum"), 16)?,
    })
}

/// Payload length in bytes. Falls back to counting the hex dump when tshark
/// omits `data.len`.
fn payload_len<L: ProtocolLayer>(layer: &L) -> Result<u16> {
    let len = number(layer, "data.len").or_else(|| {
        layer
            .field("data.data")
            .map(|hex| (hex.chars().filter(|c| c.is_ascii_hexdigit()).count() / 2) as u64)
    });
    Ok(bounded("payload_len", len, 16)?.unwrap_or(0))
}

/// Newer tshark versions report the flags byte (`0x40` for DF), older ones the 3-bit value.
fn ip_flag_bits(value: u64) -> u64 {
    if value > 0x7 {
        value >> 5
    } else {
        value
    }
}

fn text<L: ProtocolLayer>(layer: &L, key: &str) -> Option<String> {
    layer
        .field(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn number<L: ProtocolLayer>(layer: &L, key: &str) -> Option<u64> {
    let value = layer.field(key)?;
    match parse_uint(value) {
        Some(parsed) => Some(parsed),
        None => {
            log::warn!("Unparseable {key} value {value:?}, leaving column empty");
            None
        }
    }
}

fn first_number<L: ProtocolLayer>(layer: &L, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| number(layer, key))
}

/// Parses decimal or `0x`-prefixed hexadecimal text.
pub fn parse_uint(value: &str) -> Option<u64> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Narrows a value to a column of `bits` width, failing instead of truncating.
fn bounded<T: TryFrom<u64>>(field: &'static str, value: Option<u64>, bits: u32) -> Result<Option<T>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let overflow = AnalysisError::FieldOverflow { field, value, bits };
    if bits < 64 && value >> bits != 0 {
        return Err(overflow);
    }
    T::try_from(value).map(Some).map_err(|_| overflow)
}
