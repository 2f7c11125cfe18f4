//! The `Configuration` value the core asks any driver to supply.
//! Populated here by `src/cli.rs`; validated field-by-field against
//! documented bounds rather than deferring to downstream panics.

use crate::codec::MAX_ENCODED_LEN;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Technology {
    TenX,
    Visium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountingMode {
    Single,
    Pair,
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Fastq,
    Fasta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Bkc,
    Splash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFilteredInput {
    None,
    First,
    Second,
    Both,
}

impl ExportFilteredInput {
    pub fn exports_first(self) -> bool {
        matches!(self, ExportFilteredInput::First | ExportFilteredInput::Both)
    }
    pub fn exports_second(self) -> bool {
        matches!(self, ExportFilteredInput::Second | ExportFilteredInput::Both)
    }
}

/// One `<cbc_umi_file>,<read_file>` pair from the input list.
#[derive(Debug, Clone)]
pub struct LibraryFiles {
    pub cbc_umi_file: String,
    pub read_file: String,
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub technology: Technology,
    pub input_format: InputFormat,
    pub output_format: OutputFormat,
    pub mode: CountingMode,

    pub cbc_len: u32,
    pub umi_len: u32,
    pub leader_len: u32,
    pub follower_len: u32,
    pub gap_len: u32,
    pub soft_cbc_umi_len_limit: u32,
    pub poly_acgt_len: u32,

    pub rare_leader_thr: u64,
    pub max_count: u64,
    pub n_splits: u32,
    pub zstd_level: i32,
    pub cbc_filtering_thr: u64,
    pub sample_id: u64,

    pub canonical: bool,
    pub apply_filter_illumina_adapters: bool,
    pub apply_cbc_correction: bool,
    pub allow_strange_cbc_umi_reads: bool,

    pub predefined_cbc_path: Option<String>,
    pub artifacts_path: Option<String>,
    pub filtered_input_dir: Option<String>,
    pub cbc_log_path: Option<String>,

    pub export_filtered_input: ExportFilteredInput,
    pub verbosity: u32,
    pub n_threads: usize,

    pub libraries: Vec<LibraryFiles>,
    pub out_file_name: String,
}

impl Configuration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("cbc_len", self.cbc_len as u64, 10, 16)?;
        check_range("umi_len", self.umi_len as u64, 8, 16)?;
        check_range("leader_len", self.leader_len as u64, 1, 31)?;
        check_range("follower_len", self.follower_len as u64, 0, 31)?;
        check_range("no_splits", self.n_splits as u64, 1, 256)?;
        check_range("zstd_level", self.zstd_level as u64, 0, 22)?;
        check_range("poly_ACGT_len", self.poly_acgt_len as u64, 0, 31)?;
        check_range("verbosity", self.verbosity as u64, 0, 2)?;

        if self.cbc_len + self.umi_len > MAX_ENCODED_LEN {
            return Err(ConfigError::EncodedWidthTooLarge {
                len: self.cbc_len + self.umi_len,
            });
        }
        if self.leader_len > MAX_ENCODED_LEN || self.follower_len > MAX_ENCODED_LEN {
            return Err(ConfigError::EncodedWidthTooLarge {
                len: self.leader_len.max(self.follower_len),
            });
        }
        if self.libraries.is_empty() {
            return Err(ConfigError::InputListUnreadable(
                "no library files supplied".to_string(),
            ));
        }
        Ok(())
    }

    /// Minimum number of bytes needed to hold a value up to `max` (the
    /// `no_bytes` helper in `common/utils.h`).
    pub fn bytes_for_max(max: u64) -> u8 {
        if max < 256 {
            1
        } else if max < 256 * 256 {
            2
        } else if max < 256 * 256 * 256 {
            3
        } else if max < (1u64 << 32) {
            4
        } else if max < (1u64 << 40) {
            5
        } else if max < (1u64 << 48) {
            6
        } else if max < (1u64 << 56) {
            7
        } else {
            8
        }
    }

    pub fn sample_id_bytes(&self) -> u8 {
        Self::bytes_for_max(self.sample_id)
    }
    pub fn barcode_bytes(&self) -> u8 {
        ((self.cbc_len + 3) / 4) as u8
    }
    pub fn leader_bytes(&self) -> u8 {
        ((self.leader_len + 3) / 4) as u8
    }
    pub fn follower_bytes(&self) -> u8 {
        ((self.follower_len + 3) / 4) as u8
    }
    pub fn counter_bytes(&self) -> u8 {
        Self::bytes_for_max(self.max_count)
    }
}

fn check_range(name: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Configuration {
        Configuration {
            technology: Technology::TenX,
            input_format: InputFormat::Fastq,
            output_format: OutputFormat::Bkc,
            mode: CountingMode::Single,
            cbc_len: 16,
            umi_len: 12,
            leader_len: 27,
            follower_len: 0,
            gap_len: 0,
            soft_cbc_umi_len_limit: 0,
            poly_acgt_len: 0,
            rare_leader_thr: 0,
            max_count: 65535,
            n_splits: 1,
            zstd_level: 6,
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
                cbc_umi_file: "a".into(),
                read_file: "b".into(),
            }],
            out_file_name: "./results.bkc".into(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn out_of_range_cbc_len_rejected() {
        let mut c = base_config();
        c.cbc_len = 4;
        assert!(c.validate().is_err());
    }

    #[test]
    fn byte_widths_minimal() {
        assert_eq!(Configuration::bytes_for_max(200), 1);
        assert_eq!(Configuration::bytes_for_max(65535), 2);
        assert_eq!(Configuration::bytes_for_max(16_000_000), 3);
    }
}
