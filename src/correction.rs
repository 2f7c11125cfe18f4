//! Barcode correction: every trusted barcode's 1-substitution
//! neighbourhood is indexed once, then each untrusted candidate is
//! corrected only if it maps to exactly one trusted neighbour.

use std::collections::{HashMap, HashSet};

use crate::codec::substitution_neighbors;

/// Builds `candidate -> trusted` for every barcode in `candidates` that
/// has exactly one trusted 1-substitution neighbour.
pub fn build_correction_map(
    trusted: &HashSet<u64>,
    candidates: &HashSet<u64>,
    barcode_len: u32,
) -> HashMap<u64, u64> {
    // neighbour -> set of trusted barcodes it could have come from.
    let mut neighbour_sources: HashMap<u64, HashSet<u64>> = HashMap::new();
    for &t in trusted {
        for n in substitution_neighbors(t, barcode_len) {
            neighbour_sources.entry(n).or_default().insert(t);
        }
    }

    let mut corrections = HashMap::new();
    for &u in candidates {
        if trusted.contains(&u) {
            continue;
        }
        if let Some(sources) = neighbour_sources.get(&u) {
            if sources.len() == 1 {
                corrections.insert(u, *sources.iter().next().unwrap());
            }
        }
    }
    corrections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_sequence;

    #[test]
    fn corrects_unique_single_substitution() {
        let t = encode_sequence(b"ACGTACGT", 8).unwrap();
        let u = encode_sequence(b"ACGTACGA", 8).unwrap(); // last base differs
        let trusted = HashSet::from([t]);
        let candidates = HashSet::from([u]);
        let map = build_correction_map(&trusted, &candidates, 8);
        assert_eq!(map.get(&u), Some(&t));
    }

    #[test]
    fn ambiguous_candidate_is_not_corrected() {
        let t1 = encode_sequence(b"AAAAAAAA", 8).unwrap();
        let t2 = encode_sequence(b"AAAAAAAT", 8).unwrap();
        // differs from t1 at the last base, and from t2 at... itself is t2's neighbour too
        let u = encode_sequence(b"AAAAAAAC", 8).unwrap();
        let trusted = HashSet::from([t1, t2]);
        let candidates = HashSet::from([u]);
        let map = build_correction_map(&trusted, &candidates, 8);
        assert!(map.get(&u).is_none());
    }

    #[test]
    fn distant_candidate_is_missed() {
        let t = encode_sequence(b"AAAAAAAA", 8).unwrap();
        let u = encode_sequence(b"TTTTTTTT", 8).unwrap();
        let trusted = HashSet::from([t]);
        let candidates = HashSet::from([u]);
        let map = build_correction_map(&trusted, &candidates, 8);
        assert!(map.is_empty());
    }
}
