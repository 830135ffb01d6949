//! Capture loading through tshark.
use std::path::Path;

use rtshark::{Packet, RTShark, RTSharkBuilder};

use super::error::{AnalysisError, Result};

/// Checks that the capture exists and is non-empty before tshark sees it.
pub fn check_input(filepath: &str) -> Result<()> {
    let path = Path::new(filepath);
    if !path.is_file() {
        return Err(AnalysisError::MissingInput(filepath.to_string()));
    }
    if path.metadata()?.len() == 0 {
        return Err(AnalysisError::EmptyInput(filepath.to_string()));
    }
    Ok(())
}

/// Reads every packet tshark yields, in capture order.
pub fn get_packets(rtshark: &mut RTShark) -> Result<Vec<Packet>> {
    log::info!("Collecting packets.");
    let mut packets = Vec::new();

    while let Some(packet) = rtshark
        .read()
        .map_err(|e| AnalysisError::Tshark(format!("failed parsing tshark output: {e}")))?
    {
        packets.push(packet);
    }

    log::debug!("tshark yielded {} packets", packets.len());
    Ok(packets)
}

/// Loads a PCAP/PCAPNG file via rtshark.
///
/// An optional display filter narrows the frames read, e.g.
/// `eth.addr == 34:3e:a4:4d:70:b2` to keep a single device's traffic.
pub fn load_file(filepath: &str, filter: Option<&str>) -> Result<Vec<Packet>> {
    log::info!("Loading capture file.");
    check_input(filepath)?;

    let mut builder = RTSharkBuilder::builder().input_path(filepath);
    if let Some(filter) = filter {
        log::info!("Applying display filter {filter:?}");
        builder = builder.display_filter(filter);
    }

    let mut rtshark = match builder.spawn() {
        Err(err) => {
            log::error!("Error spawning tshark: {err}");
            return Err(AnalysisError::Tshark(err.to_string()));
        }
        Ok(rtshark) => {
            log::info!("Reading from {}", filepath);
            rtshark
        }
    };

    let packets = get_packets(&mut rtshark);
    rtshark.kill();

    packets
}
