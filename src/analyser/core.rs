use super::burst::{self, BurstParams};
use super::containers::{FeatureFrame, FeatureRow, PacketRecord};
use super::decoder::RawFrame;
use super::error::{AnalysisError, Result};
use super::record::build_records;
use super::temporal;
use super::utils;

/// Runs the whole extraction pipeline on one capture file.
pub fn analyse(capture_file: &str, filter: Option<&str>, label: &str, params: &BurstParams) -> Result<FeatureFrame> {
    log::info!("Starting analysis.");

    let packets = utils::load_file(capture_file, filter)?;
    let records = decode_capture(capture_file, &packets)?;
    drop(packets);

    Ok(assemble(records, label, params))
}

/// Builds the records of a capture, failing when no frame yields one.
pub fn decode_capture<F: RawFrame>(capture_file: &str, frames: &[F]) -> Result<Vec<PacketRecord>> {
    let records = build_records(frames)?;
    if records.is_empty() {
        return Err(AnalysisError::NoFrames(capture_file.to_string()));
    }
    Ok(records)
}

/// Enriches records with inter-arrival and burst features and attaches the capture label.
///
/// Rows come out grouped by destination address, each group in time order.
pub fn assemble(mut records: Vec<PacketRecord>, label: &str, params: &BurstParams) -> FeatureFrame {
    let groups = temporal::partition(&records);
    let (bursts, size_threshold) = burst::segment(&records, &groups, params);

    let mut rows = Vec::with_capacity(records.len());
    for group in &groups {
        for (&index, &inter_arrival) in group.members.iter().zip(&group.inter_arrival) {
            rows.push(FeatureRow {
                record: std::mem::take(&mut records[index]),
                inter_arrival,
                burst: bursts[index],
            });
        }
    }

    FeatureFrame {
        label: label.to_string(),
        size_threshold,
        group_count: groups.len(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyser::containers::BurstStats;
    use crate::analyser::decoder::fixtures::*;
    use chrono::TimeDelta;

    fn capture() -> Vec<TestFrame> {
        let to_cam = |micros, len| frame(micros, vec![ipv4("10.0.0.2", "10.0.0.9"), tcp("51000", "443"), data(len)]);
        let from_cam = |micros| frame(micros, vec![ipv4("10.0.0.9", "10.0.0.2"), tcp("443", "51000")]);
        vec![
            to_cam(0, 1200),
            from_cam(10_000),
            to_cam(20_000, 1200),
            to_cam(40_000, 40),
            frame(45_000, vec![TestLayer::new("arp", &[])]),
            to_cam(60_000, 1200),
            from_cam(900_000),
        ]
    }

    #[test]
    fn assembles_every_frame_once() {
        let records = build_records(&capture()).unwrap();
        let frame = assemble(records, "Reolink Argus PT", &BurstParams::default());

        assert_eq!(frame.rows.len(), 7);
        assert_eq!(frame.group_count, 3);
        assert_eq!(frame.label, "Reolink Argus PT");

        // address-less group first, then 10.0.0.2, then 10.0.0.9
        assert_eq!(frame.rows[0].record.layer, "arp");
        assert_eq!(frame.rows[0].inter_arrival, None);
        assert_eq!(frame.rows[1].record.ip_dst.as_deref(), Some("10.0.0.2"));
        assert_eq!(frame.rows[2].inter_arrival, Some(TimeDelta::milliseconds(890)));
        assert_eq!(frame.rows[3].record.timestamp.timestamp_micros(), 0);
    }

    #[test]
    fn bursts_follow_destination_traffic() {
        let records = build_records(&capture()).unwrap();
        let frame = assemble(records, "NoLabel", &BurstParams::default());

        // payloads 1200, 1200, 40, 1200 plus three empty frames: mean 520, threshold 572
        assert_eq!(frame.size_threshold, 572);
        let camera: Vec<&FeatureRow> = frame.rows.iter().filter(|r| r.record.ip_dst.as_deref() == Some("10.0.0.9")).collect();
        for row in &camera {
            assert_eq!(row.burst.burst_id, 1);
            assert_eq!(row.burst.burst_length, 3);
            assert_eq!(row.burst.burst_avg_size, 910.0);
        }
        assert_eq!(frame.burst_count(), 1);

        let replies: Vec<BurstStats> = frame.rows[1..3].iter().map(|r| r.burst).collect();
        assert_eq!(replies, vec![BurstStats::NONE, BurstStats::NONE]);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let first = assemble(build_records(&capture()).unwrap(), "NoLabel", &BurstParams::default());
        let second = assemble(build_records(&capture()).unwrap(), "NoLabel", &BurstParams::default());
        assert_eq!(first, second);
    }

    #[test]
    fn capture_without_timed_frames_is_rejected() {
        let frames: Vec<TestFrame> = capture()
            .into_iter()
            .map(|mut frame| {
                frame.micros = None;
                frame
            })
            .collect();

        let err = decode_capture("empty.pcap", &frames).unwrap_err();
        assert!(matches!(err, AnalysisError::NoFrames(ref file) if file == "empty.pcap"));
        assert_eq!(decode_capture("camera.pcap", &capture()).unwrap().len(), 7);
    }
}
