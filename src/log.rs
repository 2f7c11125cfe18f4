//! Logging setup, built on `env_logger::Builder::from_env`, driven by a
//! `verbosity` level (0..=2) instead of a boolean debug flag.

use env_logger::{Builder, Env};

pub fn init(verbosity: u32) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    Builder::from_env(Env::default().default_filter_or(level)).init();
}
