//! Command-line driver, built with a `clap::Parser` derive. Builds the
//! `Configuration` the core asks any driver to supply; the core itself
//! never parses argv.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{
    Configuration, CountingMode, ExportFilteredInput, InputFormat, LibraryFiles, OutputFormat,
    Technology,
};
use crate::error::ConfigError;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Text file of `<cbc_umi_file>,<read_file>` pairs, one library per line.
    #[arg(long)]
    pub input_list: PathBuf,

    /// Output file path (per-shard suffixes are appended).
    #[arg(long)]
    pub out: PathBuf,

    #[arg(long, value_enum, default_value = "ten-x")]
    pub technology: TechnologyArg,

    #[arg(long, value_enum, default_value = "fastq")]
    pub input_format: InputFormatArg,

    #[arg(long, value_enum, default_value = "bkc")]
    pub output_format: OutputFormatArg,

    #[arg(long, value_enum, default_value = "single")]
    pub mode: CountingModeArg,

    #[arg(long, default_value_t = 16)]
    pub cbc_len: u32,
    #[arg(long, default_value_t = 12)]
    pub umi_len: u32,
    #[arg(long, default_value_t = 27)]
    pub leader_len: u32,
    #[arg(long, default_value_t = 0)]
    pub follower_len: u32,
    #[arg(long, default_value_t = 0)]
    pub gap_len: u32,
    #[arg(long, default_value_t = 0)]
    pub soft_cbc_umi_len_limit: u32,
    #[arg(long, default_value_t = 0)]
    pub poly_acgt_len: u32,

    #[arg(long, default_value_t = 5)]
    pub rare_leader_thr: u64,
    #[arg(long, default_value_t = 65535)]
    pub max_count: u64,
    #[arg(long, default_value_t = 1)]
    pub n_splits: u32,
    #[arg(long, default_value_t = 6)]
    pub zstd_level: i32,
    #[arg(long, default_value_t = 0)]
    pub cbc_filtering_thr: u64,
    #[arg(long, default_value_t = 0)]
    pub sample_id: u64,

    #[arg(long, default_value_t = false)]
    pub canonical: bool,
    #[arg(long, default_value_t = false)]
    pub apply_filter_illumina_adapters: bool,
    #[arg(long, default_value_t = false)]
    pub apply_cbc_correction: bool,
    #[arg(long, default_value_t = false)]
    pub allow_strange_cbc_umi_reads: bool,

    #[arg(long)]
    pub predefined_cbc: Option<PathBuf>,
    #[arg(long)]
    pub artifacts: Option<PathBuf>,
    #[arg(long)]
    pub filtered_input_dir: Option<PathBuf>,
    #[arg(long)]
    pub cbc_log: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "none")]
    pub export_filtered_input: ExportFilteredInputArg,

    /// 0 = info, 1 = debug, 2 = trace.
    #[arg(long, default_value_t = 0)]
    pub verbosity: u32,

    #[arg(long, default_value_t = 8)]
    pub n_threads: usize,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum TechnologyArg {
    TenX,
    Visium,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum InputFormatArg {
    Fastq,
    Fasta,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum OutputFormatArg {
    Bkc,
    Splash,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum CountingModeArg {
    Single,
    Pair,
    Filter,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum ExportFilteredInputArg {
    None,
    First,
    Second,
    Both,
}

/// Parses the input-list file into library pairs.
fn read_input_list(path: &PathBuf) -> Result<Vec<LibraryFiles>, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::InputListUnreadable(path.display().to_string()))?;
    let mut libraries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, ',');
        let cbc_umi_file = parts
            .next()
            .ok_or_else(|| ConfigError::InputListUnreadable(path.display().to_string()))?
            .to_string();
        let read_file = parts
            .next()
            .ok_or_else(|| ConfigError::InputListUnreadable(path.display().to_string()))?
            .to_string();
        libraries.push(LibraryFiles {
            cbc_umi_file,
            read_file,
        });
    }
    Ok(libraries)
}

impl Cli {
    pub fn into_configuration(self) -> Result<Configuration, ConfigError> {
        let libraries = read_input_list(&self.input_list)?;

        Ok(Configuration {
            technology: match self.technology {
                TechnologyArg::TenX => Technology::TenX,
                TechnologyArg::Visium => Technology::Visium,
            },
            input_format: match self.input_format {
                InputFormatArg::Fastq => InputFormat::Fastq,
                InputFormatArg::Fasta => InputFormat::Fasta,
            },
            output_format: match self.output_format {
                OutputFormatArg::Bkc => OutputFormat::Bkc,
                OutputFormatArg::Splash => OutputFormat::Splash,
            },
            mode: match self.mode {
                CountingModeArg::Single => CountingMode::Single,
                CountingModeArg::Pair => CountingMode::Pair,
                CountingModeArg::Filter => CountingMode::Filter,
            },
            cbc_len: self.cbc_len,
            umi_len: self.umi_len,
            leader_len: self.leader_len,
            follower_len: self.follower_len,
            gap_len: self.gap_len,
            soft_cbc_umi_len_limit: self.soft_cbc_umi_len_limit,
            poly_acgt_len: self.poly_acgt_len,
            rare_leader_thr: self.rare_leader_thr,
            max_count: self.max_count,
            n_splits: self.n_splits,
            zstd_level: self.zstd_level,
            cbc_filtering_thr: self.cbc_filtering_thr,
            sample_id: self.sample_id,
            canonical: self.canonical,
            apply_filter_illumina_adapters: self.apply_filter_illumina_adapters,
            apply_cbc_correction: self.apply_cbc_correction,
            allow_strange_cbc_umi_reads: self.allow_strange_cbc_umi_reads,
            predefined_cbc_path: self.predefined_cbc.map(|p| p.display().to_string()),
            artifacts_path: self.artifacts.map(|p| p.display().to_string()),
            filtered_input_dir: self.filtered_input_dir.map(|p| p.display().to_string()),
            cbc_log_path: self.cbc_log.map(|p| p.display().to_string()),
            export_filtered_input: match self.export_filtered_input {
                ExportFilteredInputArg::None => ExportFilteredInput::None,
                ExportFilteredInputArg::First => ExportFilteredInput::First,
                ExportFilteredInputArg::Second => ExportFilteredInput::Second,
                ExportFilteredInputArg::Both => ExportFilteredInput::Both,
            },
            verbosity: self.verbosity,
            n_threads: self.n_threads,
            libraries,
            out_file_name: self.out.display().to_string(),
        })
    }
}
