use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ansi_term::Colour;
use serde::Serialize;

use crate::analyser::containers::{delta_millis, FeatureFrame, FeatureRow};
use crate::analyser::record::COLUMNS;
use crate::classifier::Identification;

/// Number of rows shown in the terminal preview.
const PREVIEW_ROWS: usize = 10;

#[derive(Serialize)]
struct LabeledRow<'a> {
    #[serde(flatten)]
    row: &'a FeatureRow,
    label: &'a str,
}

#[derive(Serialize)]
struct FrameDocument<'a> {
    label: &'a str,
    size_threshold: u64,
    rows: Vec<LabeledRow<'a>>,
}

pub fn print_results(frame: &FeatureFrame) {
    println!("\n\u{250F}\u{2501}\u{2501}\u{2501}\u{2501} Results");
    print_core(frame);
    print_schema(frame);
    print_layers(frame);
    print_preview(frame);
}

pub fn print_core(frame: &FeatureFrame) {
    println!("\u{2503}");
    println!("\u{2503} Label            : {}", Colour::Red.paint(&frame.label));
    println!("\u{2503} Rows             : {}", Colour::Fixed(226).paint(frame.rows.len().to_string()));
    println!("\u{2503} Address groups   : {}", Colour::Fixed(226).paint(frame.group_count.to_string()));
    println!("\u{2503} Bursts           : {}", Colour::Fixed(226).paint(frame.burst_count().to_string()));
    println!("\u{2503} Size threshold   : {} bytes", Colour::Fixed(226).paint(frame.size_threshold.to_string()));
    println!("\u{2503} ");
}

/// Column types and non-null counts of the record columns.
pub fn print_schema(frame: &FeatureFrame) {
    let mut non_null = [0usize; COLUMNS.len()];
    for row in &frame.rows {
        let Ok(serde_json::Value::Object(values)) = serde_json::to_value(&row.record) else {
            continue;
        };
        for (count, column) in non_null.iter_mut().zip(COLUMNS.iter()) {
            if values.get(column.name).is_some_and(|value| !value.is_null()) {
                *count += 1;
            }
        }
    }

    println!("\u{2503} Columns");
    for (column, count) in COLUMNS.iter().zip(non_null) {
        println!(
            "\u{2503}   {:<18} {:<10} {} non-null",
            column.name,
            column.kind.to_string(),
            Colour::Fixed(226).paint(count.to_string())
        );
    }
    println!("\u{2503} ");
}

/// Histogram of terminal-layer labels.
pub fn print_layers(frame: &FeatureFrame) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for row in &frame.rows {
        *counts.entry(row.record.layer.as_str()).or_default() += 1;
    }

    println!("\u{2503} Terminal layers");
    for (layer, count) in counts {
        println!("\u{2503}   {:<18} {}", layer, Colour::Fixed(226).paint(count.to_string()));
    }
    println!("\u{2503} ");
}

pub fn print_preview(frame: &FeatureFrame) {
    println!(
        "\u{2503} {}",
        Colour::Fixed(245).paint(format!(
            "{:<28} {:<16} {:<16} {:>7} {:>10} {:>6} {:>6} {:>9}",
            "timestamp", "src", "dst", "payload", "iat (ms)", "burst", "length", "avg size"
        ))
    );
    for row in frame.rows.iter().take(PREVIEW_ROWS) {
        let record = &row.record;
        println!(
            "\u{2503} {:<28} {:<16} {:<16} {:>7} {:>10} {:>6} {:>6} {:>9.2}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            record.ip_src.as_deref().unwrap_or("-"),
            record.ip_dst.as_deref().unwrap_or("-"),
            record.payload_len.map(|len| len.to_string()).unwrap_or_else(|| "-".to_string()),
            row.inter_arrival
                .map(|delta| format!("{:.3}", delta_millis(delta)))
                .unwrap_or_else(|| "-".to_string()),
            row.burst.burst_id,
            row.burst.burst_length,
            row.burst.burst_avg_size,
        );
    }
    if frame.rows.len() > PREVIEW_ROWS {
        println!("\u{2503} ... {} more rows", frame.rows.len() - PREVIEW_ROWS);
    }
    println!("\u{2517}");
}

pub fn print_identification(identification: &Identification) {
    println!("\n\u{250F}\u{2501}\u{2501}\u{2501}\u{2501} Identification");
    println!("\u{2503}");
    for (class, probability) in &identification.mean_probabilities {
        println!("\u{2503} {:<36} {:>6.2}%", class, probability * 100.0);
    }
    println!("\u{2503}");
    println!(
        "\u{2503} Identified as {} with a confidence of {}",
        Colour::Red.paint(&identification.label),
        Colour::Fixed(226).paint(format!("{:.2}%", identification.confidence * 100.0))
    );
    println!("\u{2517}");
}

/// Serializes the frame as one JSON document, the capture label repeated on every row.
pub fn data_as_json(frame: &FeatureFrame) -> serde_json::Result<String> {
    let document = FrameDocument {
        label: &frame.label,
        size_threshold: frame.size_threshold,
        rows: frame
            .rows
            .iter()
            .map(|row| LabeledRow { row, label: &frame.label })
            .collect(),
    };
    serde_json::to_string_pretty(&document)
}

/// Writes `data` to `path` through a sibling temporary file, so a failed
/// write never leaves a partial artifact behind.
pub fn data_to_file(data: String, path: &Path) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");

    if let Err(err) = fs::write(&tmp, data).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyser::burst::BurstParams;
    use crate::analyser::containers::PacketRecord;
    use crate::analyser::core::assemble;
    use chrono::DateTime;

    fn frame() -> FeatureFrame {
        let records = (0..3)
            .map(|i| PacketRecord {
                timestamp: DateTime::from_timestamp_micros(i * 100_000).unwrap(),
                layer: "data".to_string(),
                ip_dst: Some("10.0.0.9".to_string()),
                payload_len: Some(900),
                ..Default::default()
            })
            .collect();
        assemble(records, "Spotlight Cam", &BurstParams::default())
    }

    #[test]
    fn json_rows_carry_full_schema_and_label() {
        let json = data_as_json(&frame()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let rows = value["rows"].as_array().unwrap();

        assert_eq!(rows.len(), 3);
        let first = rows[0].as_object().unwrap();
        for column in COLUMNS.iter() {
            assert!(first.contains_key(column.name), "missing column {}", column.name);
        }
        for extra in ["inter_arrival", "burst_id", "burst_length", "burst_avg_size", "label"] {
            assert!(first.contains_key(extra), "missing column {extra}");
        }
        assert_eq!(first["label"], "Spotlight Cam");
        assert!(first["inter_arrival"].is_null());
        assert_eq!(rows[1]["inter_arrival"], 0.1);
        assert_eq!(rows[2]["burst_length"], 2);
    }

    #[test]
    fn file_is_replaced_atomically() {
        let path = std::env::temp_dir().join(format!("devprint-out-{}.json", std::process::id()));
        data_to_file("{}".to_string(), &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".part");
        assert!(!Path::new(&tmp).exists());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn failed_rename_leaves_no_partial_file() {
        let dir = std::env::temp_dir().join(format!("devprint-dir-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("keep"), "").unwrap();

        assert!(data_to_file("{\"rows\":[]}".to_string(), &dir).is_err());
        let mut tmp = dir.as_os_str().to_owned();
        tmp.push(".part");
        assert!(!Path::new(&tmp).exists());
        assert!(dir.is_dir());
        fs::remove_dir_all(&dir).unwrap();
    }
}
