//! candi CLI - deal.II dependency installer
//!
//! Entry point for the candi command-line application.

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use candi::cli::output::{display_error, OutputConfig};
use candi::cli::Cli;
use candi::core::config::Config;
use candi::error::{exit_code, exit_code_for};

#[tokio::main]
async fn main() {
    // The config is validated before the arguments, so a bad config wins.
    let config = match std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|cwd| Config::load_from(&Config::locate(&cwd)).map_err(anyhow::Error::from))
    {
        Ok(config) => config,
        Err(e) => {
            display_error(&e);
            std::process::exit(exit_code_for(&e));
        }
    };

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_code::CLI
            } else {
                exit_code::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose);
    OutputConfig::new(cli.quiet, cli.json, cli.verbose).apply_global();
    tracing::info!("candi {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = cli.run(config).await {
        display_error(&e);
        std::process::exit(exit_code_for(&e));
    }
}

/// WARN by default, `-v` for info, `-vv` for debug; `RUST_LOG` wins
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}
