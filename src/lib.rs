//! Barcoded k-mer counting engine: trusted-barcode selection, UMI
//! deduplication, leader/pair enumeration and compressed count output.
//! `src/main.rs` is a thin CLI shell around this library; every module
//! below corresponds to one stage of the pipeline.

pub mod aggregate;
pub mod barcode_dict;
pub mod block_reader;
pub mod chunk_pool;
pub mod cli;
pub mod codec;
pub mod config;
pub mod correction;
pub mod dedup;
pub mod engine;
pub mod enumerate;
pub mod error;
pub mod filtered_export;
pub mod log;
pub mod mt19937_64;
pub mod murmur;
pub mod output;
pub mod read_id;
pub mod read_store;
pub mod record_parser;
pub mod relabel;
pub mod tables;
pub mod trust;
