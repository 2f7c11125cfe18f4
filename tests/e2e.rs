//! Black-box end-to-end scenarios (S1-S4 of the spec's testable
//! properties section): feed small fastq fixtures through `Engine::run`
//! exactly as the CLI would, then decode the written shard back by
//! inverting the header + delta-encoding scheme `src/output.rs` writes.
//!
//! S5 (elbow cut) and S6 (predefined allowlist) are exercised directly
//! against `trust::find_elbow`/`trust::select_trusted` in
//! `src/trust.rs`'s own unit tests; they need no file I/O to verify.

use std::path::Path;

use bkc::config::{
    Configuration, CountingMode, ExportFilteredInput, InputFormat, LibraryFiles, OutputFormat,
    Technology,
};
use bkc::engine::Engine;
use bkc::output::RecordLayout;

fn write_fastq(dir: &Path, name: &str, records: &[(&str, &str)]) -> String {
    let path = dir.join(name);
    let mut contents = String::new();
    for (i, (header, seq)) in records.iter().enumerate() {
        contents.push_str(&format!("@{header}{i}\n{seq}\n+\n{}\n", "I".repeat(seq.len())));
    }
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

fn base_config(dir: &Path, cbc_path: String, read_path: String) -> Configuration {
    Configuration {
        technology: Technology::TenX,
        input_format: InputFormat::Fastq,
        output_format: OutputFormat::Bkc,
        mode: CountingMode::Single,
        cbc_len: 16,
        umi_len: 12,
        leader_len: 4,
        follower_len: 0,
        gap_len: 0,
        soft_cbc_umi_len_limit: 0,
        poly_acgt_len: 0,
        rare_leader_thr: 0,
        max_count: 1 << 20,
        n_splits: 1,
        zstd_level: 3,
        cbc_filtering_thr: 0,
        sample_id: 7,
        canonical: false,
        apply_filter_illumina_adapters: false,
        apply_cbc_correction: false,
        allow_strange_cbc_umi_reads: false,
        predefined_cbc_path: None,
        artifacts_path: None,
        filtered_input_dir: None,
        cbc_log_path: None,
        export_filtered_input: ExportFilteredInput::None,
        verbosity: 0,
        n_threads: 1,
        libraries: vec![LibraryFiles {
            cbc_umi_file: cbc_path,
            read_file: read_path,
        }],
        out_file_name: dir.join("results.bkc").to_str().unwrap().to_string(),
    }
}

/// Reads a big-endian unsigned integer of `n` bytes starting at `*off`,
/// advancing `*off` past it.
fn read_be(buf: &[u8], off: &mut usize, n: usize) -> u64 {
    let mut v = 0u64;
    for _ in 0..n {
        v = (v << 8) | buf[*off] as u64;
        *off += 1;
    }
    v
}

/// Inverts `src/output.rs`'s header + shared-prefix delta encoding,
/// returning every `(sample_id, barcode, leader, follower, count)` tuple
/// a shard holds, in on-disk order.
fn decode_shard(path: &Path, layout: &RecordLayout) -> Vec<(u64, u64, u64, u64, u64)> {
    let file = std::fs::File::open(path).unwrap();
    let data = zstd::decode_all(file).unwrap();

    let header_len = 7 + 9; // magic+version+ordering, then the 9-byte widths/lens block
    let body = &data[header_len..];
    let rec_len = layout.sample_id_bytes as usize
        + layout.barcode_bytes as usize
        + layout.leader_bytes as usize
        + layout.follower_bytes as usize
        + layout.counter_bytes as usize;

    let mut out = Vec::new();
    let mut prev: Vec<u8> = Vec::new();
    let mut pos = 0usize;
    while pos < body.len() {
        let p = body[pos] as usize;
        pos += 1;
        let new_len = rec_len - p;
        let mut rec = prev[..p].to_vec();
        rec.extend_from_slice(&body[pos..pos + new_len]);
        pos += new_len;

        let mut off = 0usize;
        let sample_id = read_be(&rec, &mut off, layout.sample_id_bytes as usize);
        let barcode = read_be(&rec, &mut off, layout.barcode_bytes as usize);
        let leader = read_be(&rec, &mut off, layout.leader_bytes as usize);
        let follower = read_be(&rec, &mut off, layout.follower_bytes as usize);
        let count = read_be(&rec, &mut off, layout.counter_bytes as usize);
        out.push((sample_id, barcode, leader, follower, count));
        prev = rec;
    }
    out
}

fn run_and_decode(cfg: &Configuration) -> Vec<(u64, u64, u64, u64, u64)> {
    Engine::new(cfg).run().expect("engine run failed");
    let layout = RecordLayout::from_config(cfg);
    let shard_path = format!("{}.shard000", cfg.out_file_name);
    decode_shard(Path::new(&shard_path), &layout)
}

/// S1: one read pair, single mode, 11 leader emissions over a 14-base
/// second mate collapse into 4 distinct leaders whose counts sum to 11
/// (the per-barcode aggregator run-length-collapses identical leaders;
/// see the "count sum conservation" testable property).
#[test]
fn s1_smoke_single_mode() {
    let dir = tempfile::tempdir().unwrap();
    let cbc = write_fastq(
        dir.path(),
        "cbc.fastq",
        &[("r", "AAAACCCCGGGGTTTTGGGGCCCCAAAA")],
    );
    let reads = write_fastq(dir.path(), "reads.fastq", &[("r", "ACGTACGTACGTAC")]);
    let cfg = base_config(dir.path(), cbc, reads);

    let records = run_and_decode(&cfg);

    let expected_barcode = bkc::codec::encode_sequence(b"AAAACCCCGGGGTTTT", 16).unwrap();
    assert!(records.iter().all(|&(sample, bc, _, follower, _)| sample == 7 && bc == expected_barcode && follower == 0));

    let total: u64 = records.iter().map(|&(.., count)| count).sum();
    assert_eq!(total, 11, "count sum conservation: 11 emissions total");

    let mut by_leader: Vec<(Vec<u8>, u64)> = records
        .iter()
        .map(|&(_, _, leader, _, count)| (bkc::codec::decode_sequence(leader, 4), count))
        .collect();
    by_leader.sort();
    assert_eq!(
        by_leader,
        vec![
            (b"ACGT".to_vec(), 3),
            (b"CGTA".to_vec(), 3),
            (b"GTAC".to_vec(), 3),
            (b"TACG".to_vec(), 2),
        ]
    );
}

/// S2: two first-mate records share barcode and UMI; UMI dedup must keep
/// exactly one survivor, so the output reflects exactly one second-mate
/// read's worth of leaders (16 - 4 + 1 = 13), never a mix of both.
#[test]
fn s2_umi_dedup_keeps_one_survivor() {
    let dir = tempfile::tempdir().unwrap();
    let barcode_umi = "ACGTACGTACGTACGTAAAAAAAAAAAA"; // 16-base barcode + 12-base UMI, repeated
    let cbc = write_fastq(
        dir.path(),
        "cbc.fastq",
        &[("r", barcode_umi), ("r", barcode_umi)],
    );
    let read_a = "TTTTGGGGCCCCAAAA";
    let read_b = "CCCCGGGGTTTTAAAA";
    let reads = write_fastq(dir.path(), "reads.fastq", &[("r", read_a), ("r", read_b)]);
    let cfg = base_config(dir.path(), cbc, reads);

    let records = run_and_decode(&cfg);

    let total: u64 = records.iter().map(|&(.., count)| count).sum();
    assert_eq!(total, 13, "exactly one read's worth of leaders survives dedup");

    let leaders: std::collections::HashSet<Vec<u8>> = records
        .iter()
        .map(|&(_, _, leader, _, _)| bkc::codec::decode_sequence(leader, 4))
        .collect();

    let leaders_of = |read: &str| -> std::collections::HashSet<Vec<u8>> {
        let bytes = read.as_bytes();
        (0..=bytes.len() - 4).map(|i| bytes[i..i + 4].to_vec()).collect()
    };
    let from_a = leaders_of(read_a);
    let from_b = leaders_of(read_b);
    assert!(
        leaders == from_a || leaders == from_b,
        "survivor's leaders must come from exactly one of the two reads, not a mix"
    );
}

/// S3: pair mode with no gap; 16-base second mate yields 9 simultaneous
/// (leader, follower) window positions, all distinct so each keeps count 1.
#[test]
fn s3_pair_mode_with_gap() {
    let dir = tempfile::tempdir().unwrap();
    let cbc = write_fastq(
        dir.path(),
        "cbc.fastq",
        &[("r", "AAAACCCCGGGGTTTTGGGGCCCCAAAA")],
    );
    let reads = write_fastq(dir.path(), "reads.fastq", &[("r", "AAAACCCCGGGGTTTT")]);
    let mut cfg = base_config(dir.path(), cbc, reads);
    cfg.mode = CountingMode::Pair;
    cfg.leader_len = 4;
    cfg.follower_len = 4;
    cfg.gap_len = 0;

    let records = run_and_decode(&cfg);
    assert_eq!(records.len(), 9, "16 - (4+0+4) + 1 = 9 simultaneous windows");
    assert!(records.iter().all(|&(.., count)| count == 1));

    let pairs: Vec<(Vec<u8>, Vec<u8>)> = records
        .iter()
        .map(|&(_, _, leader, follower, _)| {
            (
                bkc::codec::decode_sequence(leader, 4),
                bkc::codec::decode_sequence(follower, 4),
            )
        })
        .collect();
    assert!(pairs.contains(&(b"AAAA".to_vec(), b"CCCC".to_vec())));
    assert!(pairs.contains(&(b"AAAC".to_vec(), b"CCCG".to_vec())));
}

/// S4: a run of 4 identical bases triggers the polyACGT filter, so the
/// leader "AAAA" is dropped from the output entirely, even though it
/// would otherwise survive (rare_leader_thr is 0, i.e. disabled).
#[test]
fn s4_poly_acgt_filter_drops_homopolymer_leader() {
    let dir = tempfile::tempdir().unwrap();
    let cbc = write_fastq(
        dir.path(),
        "cbc.fastq",
        &[("r", "AAAACCCCGGGGTTTTGGGGCCCCAAAA")],
    );
    let reads = write_fastq(dir.path(), "reads.fastq", &[("r", "AAAACGTACGT")]);
    let mut cfg = base_config(dir.path(), cbc, reads);
    cfg.poly_acgt_len = 4;

    let records = run_and_decode(&cfg);
    let leaders: std::collections::HashSet<Vec<u8>> = records
        .iter()
        .map(|&(_, _, leader, _, _)| bkc::codec::decode_sequence(leader, 4))
        .collect();

    assert!(!leaders.contains(&b"AAAA".to_vec()), "homopolymer leader must be filtered");
    assert!(leaders.contains(&b"ACGT".to_vec()));
}
