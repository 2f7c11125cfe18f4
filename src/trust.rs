//! Trust selection: rank/threshold/allowlist/elbow modes over barcode
//! read counts, the elbow being a farthest-point-from-chord search over
//! the cumulative-count curve.

use std::collections::{HashMap, HashSet};

/// A barcode ranked by total read count, descending, ties broken by
/// barcode value.
pub fn rank_barcodes(stats: &HashMap<u64, u64>) -> Vec<(u64, u64)> {
    let mut ranked: Vec<(u64, u64)> = stats.iter().map(|(&b, &c)| (b, c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

pub enum TrustMode {
    Allowlist(HashSet<u64>),
    Threshold(u64),
    Elbow,
}

/// Picks the trusted subset out of `ranked` (already sorted by
/// `rank_barcodes`) per three selection modes.
pub fn select_trusted(ranked: &[(u64, u64)], mode: &TrustMode) -> HashSet<u64> {
    match mode {
        TrustMode::Allowlist(allow) => ranked
            .iter()
            .map(|&(b, _)| b)
            .filter(|b| allow.contains(b))
            .collect(),
        TrustMode::Threshold(thr) => ranked
            .iter()
            .take_while(|&&(_, count)| count >= *thr)
            .map(|&(b, _)| b)
            .collect(),
        TrustMode::Elbow => {
            let k = find_elbow(ranked);
            ranked[..k].iter().map(|&(b, _)| b).collect()
        }
    }
}

/// Farthest-point-from-chord elbow over the cumulative-count curve,
/// iteratively refined by truncating to `3k` points.
pub fn find_elbow(ranked: &[(u64, u64)]) -> usize {
    if ranked.is_empty() {
        return 0;
    }
    let cumulative: Vec<u64> = ranked
        .iter()
        .scan(0u64, |acc, &(_, c)| {
            *acc += c;
            Some(*acc)
        })
        .collect();

    let mut n = cumulative.len();
    let mut k = farthest_point(&cumulative[..n]);

    for _ in 0..100 {
        let next_n = (3 * (k + 1)).min(cumulative.len());
        if next_n == n {
            break;
        }
        n = next_n;
        let new_k = farthest_point(&cumulative[..n]);
        if new_k == k {
            break;
        }
        k = new_k;
    }
    k + 1
}

/// Index of the point farthest from the chord connecting the first and
/// last points of `(rank, cumulative_count)`, via the triangle-area
/// maximization describes.
fn farthest_point(cumulative: &[u64]) -> usize {
    if cumulative.len() < 2 {
        return 0;
    }
    let (x0, y0) = (0.0f64, cumulative[0] as f64);
    let (x1, y1) = ((cumulative.len() - 1) as f64, *cumulative.last().unwrap() as f64);

    let mut best_idx = 0;
    let mut best_area = -1.0f64;
    for (i, &y) in cumulative.iter().enumerate() {
        let (x, y) = (i as f64, y as f64);
        // Twice the triangle area via the cross product; constant
        // denominator (chord length) is irrelevant to the argmax.
        let area = ((x1 - x0) * (y - y0) - (x - x0) * (y1 - y0)).abs();
        if area > best_area {
            best_area = area;
            best_idx = i;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(pairs: &[(u64, u64)]) -> HashMap<u64, u64> {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn rank_sorts_by_count_desc_then_barcode_asc() {
        let s = stats(&[(1, 5), (2, 10), (3, 5)]);
        let ranked = rank_barcodes(&s);
        assert_eq!(ranked, vec![(2, 10), (1, 5), (3, 5)]);
    }

    #[test]
    fn threshold_mode_cuts_at_value() {
        let ranked = vec![(1, 100), (2, 50), (3, 10), (4, 1)];
        let trusted = select_trusted(&ranked, &TrustMode::Threshold(20));
        assert_eq!(trusted, HashSet::from([1, 2]));
    }

    #[test]
    fn allowlist_mode_intersects() {
        let ranked = vec![(1, 100), (2, 50), (3, 10)];
        let allow = HashSet::from([2u64, 5u64]);
        let trusted = select_trusted(&ranked, &TrustMode::Allowlist(allow));
        assert_eq!(trusted, HashSet::from([2]));
    }

    #[test]
    fn elbow_cut_on_synthetic_rank_count_distribution() {
        let counts = [1000u64, 900, 800, 700, 50, 40, 30, 20, 10];
        let ranked: Vec<(u64, u64)> = counts.iter().enumerate().map(|(i, &c)| (i as u64, c)).collect();
        assert_eq!(find_elbow(&ranked), 4);
    }

    #[test]
    fn allowlist_yields_exactly_the_allowed_barcodes_regardless_of_rank() {
        let ranked: Vec<(u64, u64)> = (1u64..=7).map(|b| (b, 8 - b)).collect();
        let allow = HashSet::from([2u64, 5u64]);
        let trusted = select_trusted(&ranked, &TrustMode::Allowlist(allow));
        assert_eq!(trusted, HashSet::from([2u64, 5u64]));
    }

    #[test]
    fn elbow_picks_the_knee_in_a_bimodal_curve() {
        // 5 "cell" barcodes with high counts, then a long ambient tail.
        let mut ranked = vec![];
        for i in 0..5u64 {
            ranked.push((i, 1000));
        }
        for i in 5..105u64 {
            ranked.push((i, 2));
        }
        let k = find_elbow(&ranked);
        assert!(k >= 3 && k <= 10, "k={k} should land near the 5-barcode knee");
    }
}
