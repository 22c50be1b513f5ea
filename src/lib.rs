pub mod archive;
pub mod cli;
mod commands;
pub mod config;
pub mod coupa;
pub mod csv_ingest;
pub mod downloader;
pub mod error;
pub mod report;
pub mod sanitize;
pub mod session;
pub mod types;

use clap::Parser;
use tracing_subscriber::{filter::LevelFilter, fmt};

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn init_tracing(level: LevelFilter) {
    let subscriber = fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

pub fn run() {
    // .env values must be in the environment before clap reads its `env` fallbacks.
    config::load_env();
    let cli = cli::Cli::parse();
    init_tracing(log_level(cli.verbose));

    if let Err(err) = commands::dispatch(cli.command) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
