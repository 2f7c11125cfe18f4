//! Error kinds for the counting engine, one enum per concern (config,
//! I/O, record parsing, output). CLI-level plumbing uses `anyhow`;
//! everything below this crate's public API surfaces one of these.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parameter `{name}` value {value} is out of range {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("unknown {what}: `{value}`")]
    UnknownEnumValue { what: &'static str, value: String },
    #[error("leader/follower/barcode/umi length {len} exceeds the maximum encodable width of 32 bases")]
    EncodedWidthTooLarge { len: u32 },
    #[error("input list file `{0}` could not be read")]
    InputListUnreadable(String),
}

#[derive(Debug, Error)]
pub enum IoOpenError {
    #[error("could not open input file `{0}`")]
    CannotOpen(String),
    #[error("could not create output file `{0}`")]
    CannotCreate(String),
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("short read: a single record in `{file}` exceeds the block capacity of {capacity} bytes")]
    ShortRead { file: String, capacity: usize },
    #[error("I/O error reading `{file}`: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum BkcFileError {
    #[error("bad bkc magic/version header in `{0}`")]
    BadHeader(String),
    #[error("could not open shard file `{0}` for writing")]
    ShardOpenFailed(String),
    #[error("I/O error on shard file: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;
