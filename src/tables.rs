//! Static/loadable lookup tables: predefined cell-barcode allowlists and
//! the artifact k-mer sets the aggregation filter consults. A full
//! Illumina adapter table is impractical to bake in here, so this keeps
//! a small built-in seed set and lets users supply their own via
//! `--artifacts_file` (noted in DESIGN.md).

use std::collections::HashSet;
use std::io::BufRead;

use crate::codec::encode_sequence;
use crate::config::Technology;
use crate::error::ConfigError;

/// A handful of common Illumina adapter 12-mers, kept as a built-in
/// floor when `--apply_filter_illumina_adapters` is set without a
/// user-supplied artifacts file.
const ILLUMINA_ADAPTER_12MERS: &[&[u8]] = &[
    b"AGATCGGAAGAG", // TruSeq adapter prefix
    b"CTGTCTCTTATA", // Nextera transposase adapter
];

pub fn illumina_12mers() -> HashSet<u64> {
    ILLUMINA_ADAPTER_12MERS
        .iter()
        .filter_map(|s| encode_sequence(s, 12))
        .collect()
}

/// Reads a predefined barcode file into packed words. The `10x` variant
/// is one barcode per line; the `visium` variant is a CSV row
/// `<ACGT-barcode>-<suffix>,<int in_tissue>,...` and only rows with
/// `in_tissue == 1` contribute their barcode, per spec.md section 6.
pub fn load_predefined_barcodes(
    path: &str,
    barcode_len: u32,
    technology: Technology,
) -> Result<HashSet<u64>, ConfigError> {
    let file = std::fs::File::open(path)
        .map_err(|_| ConfigError::InputListUnreadable(path.to_string()))?;
    let reader = std::io::BufReader::new(file);
    let mut set = HashSet::new();
    for line in reader.lines() {
        let line = line.map_err(|_| ConfigError::InputListUnreadable(path.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let barcode = match technology {
            Technology::TenX => Some(trimmed),
            Technology::Visium => visium_barcode_if_in_tissue(trimmed),
        };
        if let Some(barcode) = barcode {
            if let Some(word) = encode_sequence(barcode.as_bytes(), barcode_len) {
                set.insert(word);
            }
        }
    }
    Ok(set)
}

/// Parses one visium CSV row `<ACGT-barcode>-<suffix>,<in_tissue>,...`
/// and returns the bare barcode only when `in_tissue == 1`.
fn visium_barcode_if_in_tissue(row: &str) -> Option<&str> {
    let mut fields = row.split(',');
    let barcode_suffix = fields.next()?;
    let in_tissue = fields.next()?;
    if in_tissue.trim() != "1" {
        return None;
    }
    let barcode = barcode_suffix.split('-').next()?;
    if barcode.is_empty() {
        None
    } else {
        Some(barcode)
    }
}

/// Reads a file of artifact sequences, one per line, grouping by length
/// the way `ArtifactsFilter::Add(k, set)` does per-k.
pub fn load_artifacts(path: &str) -> Result<Vec<(u32, HashSet<u64>)>, ConfigError> {
    let file = std::fs::File::open(path)
        .map_err(|_| ConfigError::InputListUnreadable(path.to_string()))?;
    let reader = std::io::BufReader::new(file);
    let mut by_len: std::collections::HashMap<u32, HashSet<u64>> = std::collections::HashMap::new();
    for line in reader.lines() {
        let line = line.map_err(|_| ConfigError::InputListUnreadable(path.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let len = trimmed.len() as u32;
        if let Some(word) = encode_sequence(trimmed.as_bytes(), len) {
            by_len.entry(len).or_default().insert(word);
        }
    }
    Ok(by_len.into_iter().collect())
}
