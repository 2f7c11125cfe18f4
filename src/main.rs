use clap::Parser;
use log::error;
use std::process;

use bkc::cli::Cli;
use bkc::engine::Engine;

fn main() {
    let cli = Cli::parse();
    let verbosity = cli.verbosity;
    bkc::log::init(verbosity);

    let cfg = match cli.into_configuration() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("invalid configuration: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = Engine::new(&cfg).run() {
        error!("run failed: {e}");
        process::exit(1);
    }
}
