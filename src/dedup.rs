//! UMI deduplication: a k-way merge by UMI across per-thread lists, with
//! the survivor of each UMI group chosen by a barcode-seeded Mersenne
//! Twister.

use std::collections::HashMap;

use crate::mt19937_64::pick_index;
use crate::read_id::GlobalReadId;

/// Merges `lists` (one per worker thread, already containing only the
/// entries for one barcode) by UMI and keeps one `global_read_id` per
/// distinct UMI, seeded deterministically by `barcode`.
///
/// `lists` entries should already route corrected reads to their
/// trusted barcode before being passed in here.
pub fn dedup_barcode(barcode: u64, lists: &[Vec<(u64, GlobalReadId)>]) -> Vec<GlobalReadId> {
    let mut merged: Vec<(u64, GlobalReadId)> = lists.iter().flatten().cloned().collect();
    // Sort on the full (umi, global_read_id) pair, not just umi: which
    // thread's entries precede which within a tied UMI group depends on
    // HashMap iteration order upstream (engine.rs's correction-candidate
    // merge), so breaking ties by read id alone keeps `pick_index`'s
    // positional choice reproducible across runs on the same input.
    merged.sort_by_key(|&(umi, id)| (umi, id));

    let mut survivors = Vec::new();
    let mut i = 0;
    while i < merged.len() {
        let umi = merged[i].0;
        let mut j = i;
        while j < merged.len() && merged[j].0 == umi {
            j += 1;
        }
        let group = &merged[i..j];
        let chosen = pick_index(barcode, group.len());
        survivors.push(group[chosen].1);
        i = j;
    }
    survivors
}

/// Reranks barcodes by survivor count descending and drops trailing
/// barcodes under `cbc_filtering_thr`.
pub fn rerank_and_filter(
    survivors: HashMap<u64, Vec<GlobalReadId>>,
    cbc_filtering_thr: u64,
) -> Vec<(u64, Vec<GlobalReadId>)> {
    let mut ranked: Vec<(u64, Vec<GlobalReadId>)> = survivors.into_iter().collect();
    ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));
    if cbc_filtering_thr > 0 {
        ranked.retain(|(_, reads)| reads.len() as u64 >= cbc_filtering_thr);
    }
    ranked
}
