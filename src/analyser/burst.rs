//! Burst segmentation over time-sorted address groups.
//!
//! A burst is a run of packets towards one destination in which every
//! "large" packet follows the previous anchor within the time gap threshold.
//! Small packets between two anchors ride along when the anchors are close
//! enough, and become singletons otherwise. Singletons carry no burst.
use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};

use super::containers::{BurstStats, PacketRecord};
use super::temporal::AddressGroup;

pub const DEFAULT_GAP_MS: i64 = 300;
pub const DEFAULT_SIZE_FACTOR: f64 = 1.1;

/// Segmentation parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BurstParams {
    /// Anchors further apart than this never share a burst.
    pub gap: TimeDelta,
    /// Multiplier on the capture-wide mean payload size giving the size threshold.
    pub size_factor: f64,
}

impl Default for BurstParams {
    fn default() -> Self {
        Self {
            gap: TimeDelta::milliseconds(DEFAULT_GAP_MS),
            size_factor: DEFAULT_SIZE_FACTOR,
        }
    }
}

/// Time and payload size of one packet within a group.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BurstPoint {
    pub time: DateTime<Utc>,
    pub size: u64,
}

/// Minimum payload size for a packet to anchor a burst, computed over the whole capture.
pub fn size_threshold(records: &[PacketRecord], factor: f64) -> u64 {
    if records.is_empty() {
        return 0;
    }
    let total: u64 = records.iter().map(PacketRecord::payload_size).sum();
    let mean = total as f64 / records.len() as f64;
    (mean * factor) as u64
}

/// Assigns raw burst ids to a time-sorted group.
///
/// Ids start at 1. A record the walk never reaches keeps id 0; this is always
/// the case for the final record when the last step did not merge, and for
/// groups shorter than two records.
pub fn assign_burst_ids(points: &[BurstPoint], gap: TimeDelta, threshold: u64) -> Vec<u32> {
    let len = points.len();
    let mut ids = vec![0u32; len];
    if len < 2 {
        return ids;
    }

    let mut burst = 1u32;
    let mut i = 0;
    while i < len - 1 {
        let mut j = i + 1;
        while j < len - 1 && points[j].size < threshold {
            j += 1;
        }

        if points[j].time - points[i].time < gap {
            ids[i..=j].fill(burst);
        } else {
            ids[i] = burst;
            burst += 1;
            // Skipped small packets outside the window each stand alone
            for id in &mut ids[i + 1..j] {
                *id = burst;
                burst += 1;
            }
        }
        i = j;
    }

    ids
}

/// Per-record burst statistics for one group, before global re-coding.
///
/// Id 0 and bursts of a single record collapse into [BurstStats::NONE].
pub fn summarize(points: &[BurstPoint], ids: &[u32]) -> Vec<BurstStats> {
    let mut totals: BTreeMap<u32, (u32, u64)> = BTreeMap::new();
    for (point, &id) in points.iter().zip(ids) {
        let entry = totals.entry(id).or_default();
        entry.0 += 1;
        entry.1 += point.size;
    }

    ids.iter()
        .map(|&id| match totals.get(&id) {
            Some(&(count, total)) if id != 0 && count > 1 => BurstStats {
                burst_id: id,
                burst_length: count - 1,
                burst_avg_size: round2(total as f64 / count as f64),
            },
            _ => BurstStats::NONE,
        })
        .collect()
}

/// Segments every group and re-codes burst ids densely across the capture.
///
/// Returns one [BurstStats] per record, indexed like `records`. Non-zero ids
/// are numbered 1..=K in (group order, raw id) order, so identical input
/// always yields identical codes.
pub fn segment(records: &[PacketRecord], groups: &[AddressGroup], params: &BurstParams) -> (Vec<BurstStats>, u64) {
    let threshold = size_threshold(records, params.size_factor);
    log::info!("Burst size threshold is {threshold} bytes, gap {} ms.", params.gap.num_milliseconds());

    let mut stats = vec![BurstStats::NONE; records.len()];
    let mut next_code = 1u32;

    for group in groups {
        let points: Vec<BurstPoint> = group
            .members
            .iter()
            .map(|&index| BurstPoint {
                time: records[index].timestamp,
                size: records[index].payload_size(),
            })
            .collect();
        let ids = assign_burst_ids(&points, params.gap, threshold);
        let summary = summarize(&points, &ids);

        let mut codes: BTreeMap<u32, u32> = BTreeMap::new();
        for burst in summary.iter().filter(|burst| burst.burst_id != 0) {
            codes.entry(burst.burst_id).or_insert(0);
        }
        for code in codes.values_mut() {
            *code = next_code;
            next_code += 1;
        }

        for (&index, mut burst) in group.members.iter().zip(summary) {
            if let Some(&code) = codes.get(&burst.burst_id) {
                burst.burst_id = code;
            }
            stats[index] = burst;
        }
    }

    log::info!("Found {} bursts.", next_code - 1);
    (stats, threshold)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyser::temporal::partition;

    fn points(sizes: &[u64], seconds: &[f64]) -> Vec<BurstPoint> {
        sizes
            .iter()
            .zip(seconds)
            .map(|(&size, &secs)| BurstPoint {
                time: DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64).unwrap(),
                size,
            })
            .collect()
    }

    fn record(micros: i64, dst: &str, payload: Option<u16>) -> PacketRecord {
        PacketRecord {
            timestamp: DateTime::from_timestamp_micros(micros).unwrap(),
            ip_dst: Some(dst.to_string()),
            payload_len: payload,
            ..Default::default()
        }
    }

    fn gap() -> TimeDelta {
        TimeDelta::milliseconds(300)
    }

    #[test]
    fn small_packets_inside_window_join_the_burst() {
        let points = points(&[10, 10, 500, 10, 500], &[0.0, 0.05, 0.06, 0.4, 0.41]);
        let ids = assign_burst_ids(&points, gap(), 300);
        assert_eq!(ids, vec![1, 1, 1, 2, 0]);

        let stats = summarize(&points, &ids);
        for burst in &stats[..3] {
            assert_eq!(burst.burst_id, 1);
            assert_eq!(burst.burst_length, 2);
            assert_eq!(burst.burst_avg_size, 173.33);
        }
        // The late small packet is a singleton and the trailing packet is never visited
        assert_eq!(stats[3], BurstStats::NONE);
        assert_eq!(stats[4], BurstStats::NONE);
    }

    #[test]
    fn merges_chain_while_anchors_stay_close() {
        let points = points(&[500, 500, 500, 500], &[0.0, 0.1, 0.2, 0.3]);
        let ids = assign_burst_ids(&points, gap(), 300);
        assert_eq!(ids, vec![1, 1, 1, 1]);
        assert_eq!(summarize(&points, &ids)[0].burst_length, 3);
    }

    #[test]
    fn skipped_small_packets_get_their_own_ids() {
        let points = points(&[500, 10, 10, 500, 500], &[0.0, 1.0, 2.0, 3.0, 3.1]);
        let ids = assign_burst_ids(&points, gap(), 300);
        assert_eq!(ids, vec![1, 2, 3, 4, 4]);

        let stats = summarize(&points, &ids);
        assert_eq!(stats[..3], [BurstStats::NONE; 3]);
        assert_eq!(stats[3].burst_length, 1);
        assert_eq!(stats[4].burst_avg_size, 500.0);
    }

    #[test]
    fn degenerate_groups_have_no_bursts() {
        assert!(assign_burst_ids(&[], gap(), 10).is_empty());
        let single = points(&[900], &[0.0]);
        assert_eq!(assign_burst_ids(&single, gap(), 10), vec![0]);
        assert_eq!(summarize(&single, &[0]), vec![BurstStats::NONE]);
    }

    #[test]
    fn average_covers_exactly_the_burst_members() {
        let points = points(&[100, 7, 401, 2000], &[0.0, 0.01, 0.02, 5.0]);
        let ids = assign_burst_ids(&points, gap(), 300);
        let stats = summarize(&points, &ids);
        assert_eq!(ids, vec![1, 1, 1, 0]);
        assert_eq!(stats[0].burst_avg_size, 169.33);
        assert_eq!(stats[3], BurstStats::NONE);
    }

    #[test]
    fn threshold_is_truncated_scaled_mean() {
        let records = vec![
            record(0, "10.0.0.1", Some(100)),
            record(1, "10.0.0.1", Some(201)),
            record(2, "10.0.0.1", None),
        ];
        // mean 100.33 * 1.1 = 110.37
        assert_eq!(size_threshold(&records, DEFAULT_SIZE_FACTOR), 110);
        assert_eq!(size_threshold(&[], DEFAULT_SIZE_FACTOR), 0);
    }

    #[test]
    fn codes_are_dense_and_stable_across_groups() {
        let records = vec![
            record(0, "10.0.0.2", Some(900)),
            record(0, "10.0.0.1", Some(900)),
            record(100_000, "10.0.0.2", Some(900)),
            record(100_000, "10.0.0.1", Some(900)),
            record(150_000, "10.0.0.1", Some(10)),
            record(9_000_000, "10.0.0.1", Some(900)),
            record(9_100_000, "10.0.0.1", Some(900)),
            record(9_150_000, "10.0.0.1", Some(10)),
        ];
        let groups = partition(&records);
        let (first, threshold) = segment(&records, &groups, &BurstParams::default());
        let (second, _) = segment(&records, &groups, &BurstParams::default());

        assert_eq!(first, second);
        assert_eq!(threshold, 745);
        let ids: Vec<u32> = first.iter().map(|b| b.burst_id).collect();
        // 10.0.0.1 sorts first and holds two bursts plus one singleton; 10.0.0.2 holds the third
        assert_eq!(ids, vec![3, 1, 3, 1, 0, 2, 2, 2]);
    }
}
