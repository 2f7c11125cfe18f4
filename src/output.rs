//! Output writer: fixed-width header, shared-prefix delta encoding per
//! record, leader-hash sharding via `murmur.rs`. Each shard is a `zstd`
//! stream guarded by its own mutex so workers only serialize during the
//! append call.

use std::fs::File;
use std::io::Write;
use std::sync::Mutex;

use crate::config::{Configuration, OutputFormat};
use crate::error::BkcFileError;
use crate::murmur::murmur64;

/// Byte widths and symbol lengths baked into the shard header, computed
/// once from the run's `Configuration`.
#[derive(Debug, Clone, Copy)]
pub struct RecordLayout {
    pub sample_id_bytes: u8,
    pub barcode_bytes: u8,
    pub leader_bytes: u8,
    pub follower_bytes: u8,
    pub counter_bytes: u8,
    pub barcode_len: u8,
    pub leader_len: u8,
    pub follower_len: u8,
    pub gap_len: u8,
}

impl RecordLayout {
    pub fn from_config(cfg: &Configuration) -> Self {
        RecordLayout {
            sample_id_bytes: cfg.sample_id_bytes(),
            barcode_bytes: cfg.barcode_bytes(),
            leader_bytes: cfg.leader_bytes(),
            follower_bytes: cfg.follower_bytes(),
            counter_bytes: cfg.counter_bytes(),
            barcode_len: cfg.cbc_len as u8,
            leader_len: cfg.leader_len as u8,
            follower_len: cfg.follower_len as u8,
            gap_len: cfg.gap_len as u8,
        }
    }

    fn record_len(&self) -> usize {
        self.sample_id_bytes as usize
            + self.barcode_bytes as usize
            + self.leader_bytes as usize
            + self.follower_bytes as usize
            + self.counter_bytes as usize
    }
}

/// Appends `x`'s `n_bytes` least-significant bytes to `out`, most
/// significant byte first, at its configured byte width.
fn append_int_msb(out: &mut Vec<u8>, x: u64, n_bytes: u8) {
    for i in (0..n_bytes).rev() {
        out.push(((x >> (8 * i as u32)) & 0xff) as u8);
    }
}

/// Packs one output record's fields in fixed order.
pub fn pack_record(layout: &RecordLayout, sample_id: u64, barcode: u64, leader: u64, follower: u64, count: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(layout.record_len());
    append_int_msb(&mut out, sample_id, layout.sample_id_bytes);
    append_int_msb(&mut out, barcode, layout.barcode_bytes);
    append_int_msb(&mut out, leader, layout.leader_bytes);
    append_int_msb(&mut out, follower, layout.follower_bytes);
    append_int_msb(&mut out, count, layout.counter_bytes);
    out
}

/// Shared-prefix delta encoding against the shard's previous record.
fn encode_shared_prefix(prev: &[u8], curr: &[u8]) -> Vec<u8> {
    let len = prev.len().min(curr.len());
    let shared = prev[..len].iter().zip(&curr[..len]).take_while(|(a, b)| a == b).count();
    let mut out = Vec::with_capacity(1 + curr.len() - shared);
    out.push(shared as u8);
    out.extend_from_slice(&curr[shared..]);
    out
}

struct ShardState {
    encoder: zstd::Encoder<'static, File>,
    prev_record: Vec<u8>,
}

/// Per-shard mutex-guarded zstd streams; `murmur64(leader) % n_shards`
/// picks the shard.
pub struct OutputWriter {
    shards: Vec<Mutex<ShardState>>,
    layout: RecordLayout,
}

impl OutputWriter {
    /// Creates (or truncates) `n_shards` shard files named
    /// `<out_file_name>.shard<NN>`, each carrying the configured header.
    pub fn create(out_file_name: &str, layout: RecordLayout, n_shards: u32, zstd_level: i32, format: OutputFormat) -> Result<Self, BkcFileError> {
        let mut shards = Vec::with_capacity(n_shards as usize);
        for i in 0..n_shards {
            let path = format!("{out_file_name}.shard{i:03}");
            let file = File::create(&path).map_err(|_| BkcFileError::ShardOpenFailed(path.clone()))?;
            let mut encoder = zstd::Encoder::new(file, zstd_level)?;
            write_header(&mut encoder, &layout, format)?;
            shards.push(Mutex::new(ShardState {
                encoder,
                prev_record: Vec::new(),
            }));
        }
        Ok(OutputWriter { shards, layout })
    }

    pub fn write_record(&self, sample_id: u64, barcode: u64, leader: u64, follower: u64, count: u64) -> Result<(), BkcFileError> {
        let shard_idx = (murmur64(leader) % self.shards.len() as u64) as usize;
        let packed = pack_record(&self.layout, sample_id, barcode, leader, follower, count);

        let mut shard = self.shards[shard_idx].lock().expect("shard mutex poisoned");
        let delta = encode_shared_prefix(&shard.prev_record, &packed);
        shard.encoder.write_all(&delta)?;
        shard.prev_record = packed;
        Ok(())
    }

    /// Finalizes every shard's zstd stream and flushes it to disk.
    pub fn finish(self) -> Result<(), BkcFileError> {
        for shard in self.shards {
            let state = shard.into_inner().expect("shard mutex poisoned");
            state.encoder.finish()?;
        }
        Ok(())
    }
}

fn write_header<W: Write>(w: &mut W, layout: &RecordLayout, format: OutputFormat) -> Result<(), BkcFileError> {
    if format == OutputFormat::Bkc {
        w.write_all(&[b'B', b'K', b'C', 1, 1, 0])?;
        w.write_all(&[0u8])?; // default ordering
    }
    let fields = [
        layout.sample_id_bytes,
        layout.barcode_bytes,
        layout.leader_bytes,
        layout.follower_bytes,
        layout.counter_bytes,
        layout.barcode_len,
        layout.leader_len,
        layout.follower_len,
        layout.gap_len,
    ];
    w.write_all(&fields)?;
    Ok(())
}
