//! Per-thread barcode/UMI extraction and accumulation.

use std::collections::HashMap;

use crate::codec::encode_sequence;
use crate::read_id::{encode_global_read_id, GlobalReadId};

/// Outcome of extracting a barcode/UMI pair from one first-mate record.
pub enum Extracted {
    Ok { barcode: u64, umi: u64 },
    /// Length outside `[barcode_len+umi_len, barcode_len+umi_len+soft_limit]`.
    WrongLength,
    /// An ambiguous base fell inside the barcode or UMI window.
    Ambiguous,
}

/// Extracts the barcode (first `barcode_len` bases) and UMI (next
/// `umi_len` bases) from a first-mate sequence.
pub fn extract_barcode_umi(sequence: &[u8], barcode_len: u32, umi_len: u32, soft_limit: u32) -> Extracted {
    let l = sequence.len() as u32;
    let min_len = barcode_len + umi_len;
    let max_len = min_len + soft_limit;
    if l < min_len || l > max_len {
        return Extracted::WrongLength;
    }
    let barcode = match encode_sequence(sequence, barcode_len) {
        Some(w) => w,
        None => return Extracted::Ambiguous,
    };
    let umi = match encode_sequence(&sequence[barcode_len as usize..], umi_len) {
        Some(w) => w,
        None => return Extracted::Ambiguous,
    };
    Extracted::Ok { barcode, umi }
}

/// One worker's local view: `barcode -> [(umi, global_read_id), ...]`,
/// insertion-ordered per the per-barcode UMI list shape used throughout this pipeline.
#[derive(Default)]
pub struct BarcodeDict {
    map: HashMap<u64, Vec<(u64, GlobalReadId)>>,
}

const MAX_LOAD_FACTOR: f64 = 0.8;

impl BarcodeDict {
    pub fn new() -> Self {
        BarcodeDict { map: HashMap::new() }
    }

    /// Records one read under `barcode`, growing the map's bucket count
    /// ahead of time so the load factor stays under the 0.8 cap.
    pub fn record(&mut self, barcode: u64, umi: u64, file_index: u32, read_index: u64) {
        if self.map.len() as f64 >= self.map.capacity() as f64 * MAX_LOAD_FACTOR {
            self.map.reserve(self.map.capacity().max(16));
        }
        self.map
            .entry(barcode)
            .or_default()
            .push((umi, encode_global_read_id(file_index, read_index)));
    }

    pub fn get(&self, barcode: u64) -> Option<&[(u64, GlobalReadId)]> {
        self.map.get(&barcode).map(|v| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &Vec<(u64, GlobalReadId)>)> {
        self.map.iter()
    }

    pub fn len_of(&self, barcode: u64) -> usize {
        self.map.get(&barcode).map_or(0, |v| v.len())
    }
}

/// Sums list lengths for `barcode` across every worker's dictionary
/// (the `merge_cbc_dict`/`gather_cbc_stats` step of).
pub fn gather_stats(dicts: &[BarcodeDict]) -> HashMap<u64, u64> {
    let mut stats: HashMap<u64, u64> = HashMap::new();
    for dict in dicts {
        for (&barcode, reads) in dict.iter() {
            *stats.entry(barcode).or_insert(0) += reads.len() as u64;
        }
    }
    stats
}
