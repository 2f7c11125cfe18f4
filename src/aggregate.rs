//! Per-barcode aggregation and filtering: sort, run-length collapse with
//! inline poly/artifact filtering, then a second pass dropping whole
//! leaders under the rare-leader threshold.

use std::collections::HashMap;

use crate::codec::{decode_sequence, encode_sequence};

pub struct ArtifactFilter {
    by_len: Vec<(u32, std::collections::HashSet<u64>)>,
}

impl ArtifactFilter {
    pub fn new(by_len: Vec<(u32, std::collections::HashSet<u64>)>) -> Self {
        ArtifactFilter { by_len }
    }

    pub fn empty() -> Self {
        ArtifactFilter { by_len: Vec::new() }
    }

    /// True if `word` (a `len`-base leader) contains any artifact
    /// k-mer from its per-k hash set as a contiguous subsequence.
    pub fn contains_artifact(&self, word: u64, len: u32) -> bool {
        if self.by_len.is_empty() {
            return false;
        }
        let bases = decode_sequence(word, len);
        for (k, set) in &self.by_len {
            let k = *k;
            if k == 0 || k > len {
                continue;
            }
            for window in bases.windows(k as usize) {
                if let Some(w) = encode_sequence(window, k) {
                    if set.contains(&w) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// True if `word` (a `len`-base leader) contains a run of `poly_len`
/// identical bases. `poly_len == 0` disables the filter.
pub fn is_poly_acgt(word: u64, len: u32, poly_len: u32) -> bool {
    if poly_len == 0 || poly_len > len {
        return false;
    }
    let bases = decode_sequence(word, len);
    if bases.is_empty() {
        return false;
    }
    let mut run = 1u32;
    if run >= poly_len {
        return true;
    }
    for i in 1..bases.len() {
        run = if bases[i] == bases[i - 1] { run + 1 } else { 1 };
        if run >= poly_len {
            return true;
        }
    }
    false
}

fn should_drop(leader: u64, leader_len: u32, poly_len: u32, artifacts: &ArtifactFilter) -> bool {
    is_poly_acgt(leader, leader_len, poly_len) || artifacts.contains_artifact(leader, leader_len)
}

/// Sorts, run-length collapses and poly/artifact-filters a flat list of
/// single-mode leaders for one barcode.
pub fn aggregate_single(
    mut leaders: Vec<u64>,
    leader_len: u32,
    poly_len: u32,
    artifacts: &ArtifactFilter,
    rare_leader_thr: u64,
) -> Vec<(u64, u64)> {
    leaders.sort_unstable();

    let mut counts: Vec<(u64, u64)> = Vec::new();
    for leader in leaders {
        if let Some(last) = counts.last_mut() {
            if last.0 == leader {
                last.1 += 1;
                continue;
            }
            if should_drop(last.0, leader_len, poly_len, artifacts) {
                counts.pop();
            }
        }
        counts.push((leader, 1));
    }
    if let Some(&(leader, _)) = counts.last() {
        if should_drop(leader, leader_len, poly_len, artifacts) {
            counts.pop();
        }
    }

    filter_rare_leaders(counts, rare_leader_thr, |&(leader, _)| leader)
}

/// Same as [`aggregate_single`] but for pair-mode `(leader, follower)`
/// tuples; the poly/artifact/rare-leader predicates apply to the leader
/// half only.
pub fn aggregate_pairs(
    mut pairs: Vec<(u64, u64)>,
    leader_len: u32,
    poly_len: u32,
    artifacts: &ArtifactFilter,
    rare_leader_thr: u64,
) -> Vec<(u64, u64, u64)> {
    pairs.sort_unstable();

    let mut counts: Vec<(u64, u64, u64)> = Vec::new();
    for (leader, follower) in pairs {
        if let Some(last) = counts.last_mut() {
            if last.0 == leader && last.1 == follower {
                last.2 += 1;
                continue;
            }
            if should_drop(last.0, leader_len, poly_len, artifacts) {
                counts.pop();
            }
        }
        counts.push((leader, follower, 1));
    }
    if let Some(&(leader, _, _)) = counts.last() {
        if should_drop(leader, leader_len, poly_len, artifacts) {
            counts.pop();
        }
    }

    filter_rare_leaders(counts, rare_leader_thr, |&(leader, _, _)| leader)
}

/// Drops every group whose leader's total count is `<= rare_leader_thr`.
/// `rare_leader_thr == 0` disables the filter entirely.
fn filter_rare_leaders<T: Copy>(items: Vec<T>, rare_leader_thr: u64, leader_of: impl Fn(&T) -> u64) -> Vec<T>
where
    T: HasCount,
{
    if rare_leader_thr == 0 {
        return items;
    }
    let mut totals: HashMap<u64, u64> = HashMap::new();
    for item in &items {
        *totals.entry(leader_of(item)).or_insert(0) += item.count();
    }
    items
        .into_iter()
        .filter(|item| totals[&leader_of(item)] > rare_leader_thr)
        .collect()
}

trait HasCount {
    fn count(&self) -> u64;
}
impl HasCount for (u64, u64) {
    fn count(&self) -> u64 {
        self.1
    }
}
impl HasCount for (u64, u64, u64) {
    fn count(&self) -> u64 {
        self.2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_sequence;

    #[test]
    fn collapses_duplicate_leaders_into_counts() {
        let a = encode_sequence(b"ACGT", 4).unwrap();
        let b = encode_sequence(b"TTTT", 4).unwrap();
        let leaders = vec![a, a, b, a];
        let counts = aggregate_single(leaders, 4, 0, &ArtifactFilter::empty(), 0);
        let map: HashMap<u64, u64> = counts.into_iter().collect();
        assert_eq!(map[&a], 3);
        assert_eq!(map[&b], 1);
    }

    #[test]
    fn poly_acgt_leader_is_dropped() {
        let polya = encode_sequence(b"AAAAAA", 6).unwrap();
        let normal = encode_sequence(b"ACGTAC", 6).unwrap();
        let leaders = vec![polya, normal];
        let counts = aggregate_single(leaders, 6, 4, &ArtifactFilter::empty(), 0);
        let present: Vec<u64> = counts.into_iter().map(|(l, _)| l).collect();
        assert!(!present.contains(&polya));
        assert!(present.contains(&normal));
    }

    #[test]
    fn artifact_leader_is_dropped() {
        // contains the 12-mer "AGATCGGAAGAG" as a prefix
        let adapter_leader = encode_sequence(b"AGATCGGAAGAGAC", 14).unwrap();
        let normal = encode_sequence(b"TTTTACGTACGTAC", 14).unwrap();
        let set = crate::tables::illumina_12mers();
        let filter = ArtifactFilter::new(vec![(12, set)]);
        let leaders = vec![adapter_leader, normal];
        let counts = aggregate_single(leaders, 14, 0, &filter, 0);
        let present: Vec<u64> = counts.into_iter().map(|(l, _)| l).collect();
        assert!(!present.contains(&adapter_leader));
        assert!(present.contains(&normal));
    }

    #[test]
    fn rare_leader_threshold_drops_low_count_leaders() {
        let a = encode_sequence(b"ACGT", 4).unwrap();
        let b = encode_sequence(b"TTTT", 4).unwrap();
        let leaders = vec![a, a, a, b];
        let counts = aggregate_single(leaders, 4, 0, &ArtifactFilter::empty(), 2);
        let map: HashMap<u64, u64> = counts.into_iter().collect();
        assert!(map.contains_key(&a));
        assert!(!map.contains_key(&b));
    }
}
