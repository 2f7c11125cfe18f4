//! Phase orchestration: a single `Engine` value owns every phase's
//! buffers and drives the state machine `Idle -> BarcodePass -> Trust ->
//! Correct? -> Dedup -> Relabel -> ReadPass -> Enumerate -> Write ->
//! Done`; thread pools receive borrowed views of that state rather than
//! reaching for global mutable state.
//!
//! Each I/O pass runs a reader pool capped at
//! `max(1, min(n_threads/2, n_files))` (spec.md section 5): files are
//! claimed from a shared file-list queue, and each claimed file is read
//! through its own reader thread paired 1:1 with the claiming thread
//! acting as its worker, communicating through a `chunk_pool::BlockQueue`.
//! The CPU-bound dedup/enumerate phase partitions trusted barcodes
//! across a fixed worker pool using `thread::scope`.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use log::{debug, info, warn};

use crate::aggregate::{aggregate_pairs, aggregate_single, ArtifactFilter};
use crate::barcode_dict::{extract_barcode_umi, gather_stats, BarcodeDict, Extracted};
use crate::block_reader::BlockReader;
use crate::chunk_pool::{BlockQueue, BlockQueueReceiver};
use crate::config::{Configuration, CountingMode, LibraryFiles};
use crate::correction::build_correction_map;
use crate::dedup::{dedup_barcode, rerank_and_filter};
use crate::enumerate::{enumerate_leaders, enumerate_pairs};
use crate::error::Result;
use crate::filtered_export::{open_exporter, ExportableRecord};
use crate::output::{OutputWriter, RecordLayout};
use crate::read_id::{file_index_of, read_index_of, GlobalReadId};
use crate::read_store::{ReadArena, ReadHandle};
use crate::record_parser::RecordParser;
use crate::relabel::{relabel, FileSelection};
use crate::tables::{illumina_12mers, load_artifacts, load_predefined_barcodes};
use crate::trust::{rank_barcodes, select_trusted, TrustMode};

const BLOCK_SIZE: usize = 1 << 20;
const QUEUE_DEPTH: usize = 3;

/// Phase-to-phase wall-clock deltas, printed at `info` once the run
/// completes.
struct Timings {
    marks: Vec<(&'static str, Instant)>,
}

impl Timings {
    fn new() -> Self {
        Timings {
            marks: vec![("start", Instant::now())],
        }
    }

    fn mark(&mut self, label: &'static str) {
        self.marks.push((label, Instant::now()));
    }

    fn report(&self) {
        for pair in self.marks.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            debug!("phase {}: {:?}", to.0, to.1.duration_since(from.1));
        }
        if let (Some(first), Some(last)) = (self.marks.first(), self.marks.last()) {
            info!("total runtime: {:?}", last.1.duration_since(first.1));
        }
    }
}

pub struct Engine<'a> {
    cfg: &'a Configuration,
}

impl<'a> Engine<'a> {
    pub fn new(cfg: &'a Configuration) -> Self {
        Engine { cfg }
    }

    pub fn run(&self) -> Result<()> {
        self.cfg.validate()?;
        let mut timings = Timings::new();

        info!("phase: BarcodePass");
        let (dicts, file_read_counts) = self.barcode_pass()?;
        for (i, dict) in dicts.iter().enumerate() {
            debug!("library {i}: {} distinct barcodes seen", dict.iter().count());
        }
        timings.mark("BarcodePass");

        info!("phase: Trust");
        let stats = gather_stats(&dicts);
        let ranked = rank_barcodes(&stats);
        let trust_mode = self.trust_mode()?;
        let trusted = select_trusted(&ranked, &trust_mode);
        info!("{} barcodes trusted out of {}", trusted.len(), ranked.len());
        if let Some(path) = &self.cfg.cbc_log_path {
            self.write_cbc_log(path, &ranked, &trusted)?;
        }
        timings.mark("Trust");

        let corrections = if self.cfg.apply_cbc_correction {
            info!("phase: Correct");
            let candidates: HashSet<u64> = ranked
                .iter()
                .map(|&(b, _)| b)
                .filter(|b| !trusted.contains(b))
                .collect();
            build_correction_map(&trusted, &candidates, self.cfg.cbc_len)
        } else {
            HashMap::new()
        };
        if !corrections.is_empty() {
            info!("{} untrusted barcodes corrected to a trusted neighbour", corrections.len());
        }
        timings.mark("Correct");

        info!("phase: Dedup");
        let survivors = self.dedup_phase(&dicts, &trusted, &corrections);
        let ranked_survivors = rerank_and_filter(survivors, self.cfg.cbc_filtering_thr);
        let mut survivors: HashMap<u64, Vec<GlobalReadId>> = ranked_survivors.into_iter().collect();
        info!("{} barcodes survive cbc_filtering_thr", survivors.len());
        timings.mark("Dedup");

        info!("phase: Relabel");
        let selections = relabel(&file_read_counts, &mut survivors);
        timings.mark("Relabel");

        if self.cfg.export_filtered_input.exports_first() {
            info!("phase: export filtered first-mate reads");
            self.export_first_mate(&selections)?;
        }

        if matches!(self.cfg.mode, CountingMode::Filter) {
            info!("phase: ReadPass (filter mode exports only)");
            if self.cfg.export_filtered_input.exports_second() {
                self.read_pass(&selections)?;
            }
            timings.mark("ReadPass");
            timings.report();
            info!("phase: Done (filter mode)");
            return Ok(());
        }

        info!("phase: ReadPass");
        let (arenas, dense_handles) = self.read_pass(&selections)?;
        timings.mark("ReadPass");

        info!("phase: Enumerate + Write");
        let layout = RecordLayout::from_config(self.cfg);
        let writer = OutputWriter::create(
            &self.cfg.out_file_name,
            layout,
            self.cfg.n_splits,
            self.cfg.zstd_level,
            self.cfg.output_format,
        )?;
        self.enumerate_and_write(&survivors, &arenas, &dense_handles, &writer)?;
        writer.finish()?;
        timings.mark("Write");
        timings.report();

        info!("phase: Done");
        Ok(())
    }

    fn trust_mode(&self) -> Result<TrustMode> {
        if let Some(path) = &self.cfg.predefined_cbc_path {
            let set = load_predefined_barcodes(path, self.cfg.cbc_len, self.cfg.technology)?;
            return Ok(TrustMode::Allowlist(set));
        }
        Ok(TrustMode::Elbow)
    }

    /// Writes the human-readable trusted-barcode listing `--cbc-log`
    /// requests: decoded barcode, count, running cumulative sum, and
    /// whether it was selected as trusted (mirroring the
    /// `list_cbc_dict` behavior).
    fn write_cbc_log(&self, path: &str, ranked: &[(u64, u64)], trusted: &HashSet<u64>) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        let mut cumulative = 0u64;
        for &(barcode, count) in ranked {
            cumulative += count;
            let decoded = String::from_utf8_lossy(&crate::codec::decode_sequence(barcode, self.cfg.cbc_len)).into_owned();
            writeln!(
                file,
                "{decoded}\t{count}\t{cumulative}\t{}",
                if trusted.contains(&barcode) { "trusted" } else { "" }
            )?;
        }
        Ok(())
    }

    fn artifact_filter(&self) -> Result<ArtifactFilter> {
        let mut by_len = Vec::new();
        if self.cfg.apply_filter_illumina_adapters {
            by_len.push((12, illumina_12mers()));
        }
        if let Some(path) = &self.cfg.artifacts_path {
            by_len.extend(load_artifacts(path)?);
        }
        Ok(ArtifactFilter::new(by_len))
    }

    /// Runs a reader pool capped at `max(1, min(n_threads/2, n_files))`
    /// (spec.md section 5): files are claimed from a shared queue rather
    /// than assigned one-per-thread, so library count and thread budget
    /// are decoupled. Each claiming thread pairs with its own spawned
    /// reader thread through a `BlockQueue`, exactly as a single
    /// reader/worker pair would, and runs `process` against the blocks
    /// that reader produces. `path_of` picks which file on `LibraryFiles`
    /// this pass reads. Results are returned in file-index order; the
    /// first error from either a reader or `process` aborts the pool and
    /// is returned here instead of panicking inside the scope.
    fn run_reader_pool<T: Send>(
        &self,
        path_of: impl Fn(&LibraryFiles) -> String + Sync,
        process: impl Fn(usize, BlockQueueReceiver) -> Result<T> + Sync,
    ) -> Result<Vec<T>> {
        let cfg = self.cfg;
        let n_files = cfg.libraries.len();
        let n_reader_workers = (cfg.n_threads / 2).max(1).min(n_files.max(1));

        let (file_tx, file_rx) = crossbeam_channel::bounded::<usize>(n_files.max(1));
        for i in 0..n_files {
            file_tx.send(i).expect("file-list queue sized to hold every file");
        }
        drop(file_tx);

        let results: Mutex<Vec<(usize, T)>> = Mutex::new(Vec::new());
        let error: Mutex<Option<anyhow::Error>> = Mutex::new(None);

        thread::scope(|scope| {
            for _ in 0..n_reader_workers {
                let file_rx = file_rx.clone();
                let results = &results;
                let error = &error;
                let path_of = &path_of;
                let process = &process;
                scope.spawn(move || {
                    while let Ok(file_index) = file_rx.recv() {
                        let lib = &cfg.libraries[file_index];
                        let path = path_of(lib);
                        let format = cfg.input_format;

                        let queue = BlockQueue::new(QUEUE_DEPTH);
                        let tx = queue.sender();
                        let rx = queue.receiver();

                        let reader_handle = thread::Builder::new()
                            .name(format!("bkc-reader-{file_index}"))
                            .spawn(move || -> Result<()> {
                                let mut reader = BlockReader::open(&path, format, BLOCK_SIZE)?;
                                let mut buf = Vec::new();
                                while reader.next_block(&mut buf)? {
                                    tx.push(std::mem::take(&mut buf));
                                }
                                Ok(())
                            })
                            .expect("failed to spawn reader thread");

                        let outcome = process(file_index, rx);
                        let reader_result = reader_handle.join().unwrap_or_else(|_| {
                            Err(anyhow::anyhow!("reader thread for library {file_index} panicked"))
                        });

                        match (reader_result, outcome) {
                            (Err(e), _) | (Ok(()), Err(e)) => {
                                *error.lock().expect("error mutex poisoned") = Some(e);
                                return;
                            }
                            (Ok(()), Ok(value)) => {
                                results.lock().expect("results mutex poisoned").push((file_index, value));
                            }
                        }
                    }
                });
            }
        });

        if let Some(e) = error.into_inner().expect("error mutex poisoned") {
            return Err(e);
        }

        let mut collected = results.into_inner().expect("results mutex poisoned");
        collected.sort_by_key(|(i, _)| *i);
        Ok(collected.into_iter().map(|(_, v)| v).collect())
    }

    /// First pass over every library's barcode/UMI file, building one
    /// `BarcodeDict` per library via the shared reader pool.
    fn barcode_pass(&self) -> Result<(Vec<BarcodeDict>, Vec<usize>)> {
        let cfg = self.cfg;
        let results = self.run_reader_pool(
            |lib| lib.cbc_umi_file.clone(),
            |file_index, rx| -> Result<(BarcodeDict, usize)> {
                let mut dict = BarcodeDict::new();
                let mut read_index: u64 = 0;
                while let Some(block) = rx.pop() {
                    for record in RecordParser::new(&block, cfg.input_format) {
                        match extract_barcode_umi(
                            record.sequence,
                            cfg.cbc_len,
                            cfg.umi_len,
                            cfg.soft_cbc_umi_len_limit,
                        ) {
                            Extracted::Ok { barcode, umi } => {
                                dict.record(barcode, umi, file_index as u32, read_index);
                            }
                            Extracted::WrongLength => {
                                if !cfg.allow_strange_cbc_umi_reads {
                                    warn!("record length outside configured bounds, library {file_index}");
                                }
                            }
                            Extracted::Ambiguous => {}
                        }
                        read_index += 1;
                    }
                }
                Ok((dict, read_index as usize))
            },
        )?;

        let mut dicts = Vec::with_capacity(results.len());
        let mut counts = Vec::with_capacity(results.len());
        for (dict, count) in results {
            dicts.push(dict);
            counts.push(count);
        }
        Ok((dicts, counts))
    }

    /// Merges corrected candidates into their trusted target and
    /// deduplicates by UMI, partitioned by barcode across a fixed worker
    /// pool.
    fn dedup_phase(
        &self,
        dicts: &[BarcodeDict],
        trusted: &HashSet<u64>,
        corrections: &HashMap<u64, u64>,
    ) -> HashMap<u64, Vec<GlobalReadId>> {
        let mut trusted_list: Vec<u64> = trusted.iter().cloned().collect();
        trusted_list.sort_unstable();

        // candidate -> barcode it corrects to, inverted once so each
        // trusted barcode's worker can pull in its corrected candidates.
        let mut sources_by_target: HashMap<u64, Vec<u64>> = HashMap::new();
        for (&candidate, &target) in corrections {
            sources_by_target.entry(target).or_default().push(candidate);
        }

        let results: Mutex<HashMap<u64, Vec<GlobalReadId>>> = Mutex::new(HashMap::new());
        let n_workers = self.cfg.n_threads.max(1).min(trusted_list.len().max(1));
        let chunk_size = div_ceil(trusted_list.len(), n_workers).max(1);

        thread::scope(|scope| {
            for chunk in trusted_list.chunks(chunk_size) {
                let results = &results;
                let sources_by_target = &sources_by_target;
                scope.spawn(move || {
                    for &barcode in chunk {
                        let lists: Vec<Vec<(u64, GlobalReadId)>> = dicts
                            .iter()
                            .map(|dict| {
                                let mut entries: Vec<(u64, GlobalReadId)> =
                                    dict.get(barcode).map(|s| s.to_vec()).unwrap_or_default();
                                if let Some(sources) = sources_by_target.get(&barcode) {
                                    for &candidate in sources {
                                        if let Some(more) = dict.get(candidate) {
                                            entries.extend_from_slice(more);
                                        }
                                    }
                                }
                                entries
                            })
                            .collect();
                        let survivors = dedup_barcode(barcode, &lists);
                        results.lock().expect("results mutex poisoned").insert(barcode, survivors);
                    }
                });
            }
        });

        results.into_inner().expect("results mutex poisoned")
    }

    /// Second pass over every library's biological-read file, keeping
    /// only reads relabelling selected, and optionally re-emitting
    /// selected records through the filtered exporter. Runs through the
    /// same shared reader pool as `barcode_pass`.
    fn read_pass(&self, selections: &[FileSelection]) -> Result<(Vec<ReadArena>, Vec<Vec<ReadHandle>>)> {
        let cfg = self.cfg;
        let results = self.run_reader_pool(
            |lib| lib.read_file.clone(),
            |file_index, rx| -> Result<(ReadArena, Vec<ReadHandle>)> {
                let sel = &selections[file_index];
                let mut arena = ReadArena::new();
                let mut handles: Vec<ReadHandle> = Vec::with_capacity(sel.survivor_count());

                let mut exporter = if cfg.export_filtered_input.exports_second() {
                    cfg.filtered_input_dir
                        .as_deref()
                        .map(|dir| open_exporter(dir, &format!("lib{file_index}"), cfg.input_format))
                        .transpose()?
                } else {
                    None
                };

                let mut original_index = 0usize;
                while let Some(block) = rx.pop() {
                    for record in RecordParser::new(&block, cfg.input_format) {
                        if original_index < sel.selected.len() && sel.selected[original_index] {
                            let handle = arena.push(record.sequence);
                            let dense = sel.dense_index[original_index] as usize;
                            if dense >= handles.len() {
                                handles.resize(dense + 1, ReadHandle { offset: 0, len: 0 });
                            }
                            handles[dense] = handle;
                            if let Some(exp) = exporter.as_mut() {
                                exp.export(&ExportableRecord {
                                    header: record.header,
                                    sequence: record.sequence,
                                    quality: record.quality,
                                })?;
                            }
                        }
                        original_index += 1;
                    }
                }
                if let Some(exp) = exporter {
                    exp.finish()?;
                }

                Ok((arena, handles))
            },
        )?;

        let mut arenas = Vec::with_capacity(results.len());
        let mut dense_handles = Vec::with_capacity(results.len());
        for (arena, handles) in results {
            arenas.push(arena);
            dense_handles.push(handles);
        }
        Ok((arenas, dense_handles))
    }

    /// C14 on the first-mate side: a lightweight reread of every
    /// library's `cbc_umi_file`, re-emitting records `selections` marked
    /// as surviving dedup. Independent of `read_pass`/C10 — it does not
    /// load or store any bases, only re-streams the original records.
    fn export_first_mate(&self, selections: &[FileSelection]) -> Result<()> {
        let Some(dir) = self.cfg.filtered_input_dir.as_deref() else {
            return Ok(());
        };
        for (file_index, lib) in self.cfg.libraries.iter().enumerate() {
            let sel = &selections[file_index];
            let mut exporter = open_exporter(dir, &format!("lib{file_index}.mate1"), self.cfg.input_format)?;

            let mut reader = BlockReader::open(&lib.cbc_umi_file, self.cfg.input_format, BLOCK_SIZE)?;
            let mut buf = Vec::new();
            let mut original_index = 0usize;
            while reader.next_block(&mut buf)? {
                for record in RecordParser::new(&buf, self.cfg.input_format) {
                    if original_index < sel.selected.len() && sel.selected[original_index] {
                        exporter.export(&ExportableRecord {
                            header: record.header,
                            sequence: record.sequence,
                            quality: record.quality,
                        })?;
                    }
                    original_index += 1;
                }
            }
            exporter.finish()?;
        }
        Ok(())
    }

    /// Enumeration, aggregation and output, partitioned by barcode
    /// across a fixed worker pool; every worker writes directly through
    /// the mutex-guarded shard writer.
    fn enumerate_and_write(
        &self,
        survivors: &HashMap<u64, Vec<GlobalReadId>>,
        arenas: &[ReadArena],
        dense_handles: &[Vec<ReadHandle>],
        writer: &OutputWriter,
    ) -> Result<()> {
        let artifacts = self.artifact_filter()?;
        let mut barcodes: Vec<u64> = survivors.keys().cloned().collect();
        barcodes.sort_unstable();

        let n_workers = self.cfg.n_threads.max(1).min(barcodes.len().max(1));
        let chunk_size = div_ceil(barcodes.len(), n_workers).max(1);

        let error: Mutex<Option<anyhow::Error>> = Mutex::new(None);

        thread::scope(|scope| {
            for chunk in barcodes.chunks(chunk_size) {
                let artifacts = &artifacts;
                let error = &error;
                scope.spawn(move || {
                    for &barcode in chunk {
                        let reads = &survivors[&barcode];
                        let result: Result<()> = (|| {
                            match self.cfg.mode {
                                CountingMode::Single => {
                                    let mut leaders = Vec::new();
                                    for &id in reads {
                                        let f = file_index_of(id) as usize;
                                        let r = read_index_of(id) as usize;
                                        let handle = dense_handles[f][r];
                                        let bases = arenas[f].get(handle);
                                        leaders.extend(enumerate_leaders(&bases, self.cfg.leader_len, self.cfg.canonical));
                                    }
                                    let counts = aggregate_single(
                                        leaders,
                                        self.cfg.leader_len,
                                        self.cfg.poly_acgt_len,
                                        artifacts,
                                        self.cfg.rare_leader_thr,
                                    );
                                    for (leader, count) in counts {
                                        writer.write_record(
                                            self.cfg.sample_id,
                                            barcode,
                                            leader,
                                            0,
                                            count.min(self.cfg.max_count),
                                        )?;
                                    }
                                }
                                CountingMode::Pair => {
                                    let mut pairs = Vec::new();
                                    for &id in reads {
                                        let f = file_index_of(id) as usize;
                                        let r = read_index_of(id) as usize;
                                        let handle = dense_handles[f][r];
                                        let bases = arenas[f].get(handle);
                                        pairs.extend(enumerate_pairs(
                                            &bases,
                                            self.cfg.leader_len,
                                            self.cfg.gap_len,
                                            self.cfg.follower_len,
                                        ));
                                    }
                                    let counts = aggregate_pairs(
                                        pairs,
                                        self.cfg.leader_len,
                                        self.cfg.poly_acgt_len,
                                        artifacts,
                                        self.cfg.rare_leader_thr,
                                    );
                                    for (leader, follower, count) in counts {
                                        writer.write_record(
                                            self.cfg.sample_id,
                                            barcode,
                                            leader,
                                            follower,
                                            count.min(self.cfg.max_count),
                                        )?;
                                    }
                                }
                                CountingMode::Filter => unreachable!("filter mode returns before this phase"),
                            }
                            Ok(())
                        })();
                        if let Err(e) = result {
                            *error.lock().expect("error mutex poisoned") = Some(e);
                            return;
                        }
                    }
                });
            }
        });

        if let Some(e) = error.into_inner().expect("error mutex poisoned") {
            return Err(e);
        }
        Ok(())
    }
}

fn div_ceil(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}
