//! Command-line interface module
//!
//! Argument parsing and output formatting. The work itself lives in
//! [`crate::core`].

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::OnceLock;

use commands::Commands;

use crate::core::config::Config;
use crate::core::context::{BuildOptions, InstallContext};
use crate::error::CliError;
use crate::infra::dirs::CandiDirs;

/// candi - compile and install deal.II and its dependencies
///
/// Reads `candi.toml` (or `$CANDI_CONFIG`) and installs the configured
/// packages from source or through spack.
#[derive(Parser, Debug)]
#[command(name = "candi")]
#[command(author, version, about, long_about = None)]
#[command(long_version = long_version())]
#[command(propagate_version = true)]
pub struct Cli {
    /// Install prefix [default: ~/dealii-candi]
    #[arg(short, long, global = true, value_name = "PATH")]
    pub prefix: Option<PathBuf>,

    /// Parallel build jobs [default: number of CPUs]
    #[arg(
        short,
        long,
        global = true,
        value_name = "N",
        value_parser = parse_jobs,
        allow_negative_numbers = true
    )]
    pub jobs: Option<usize>,

    /// Use the default compiler instead of the one in candi.toml
    #[arg(long, global = true)]
    pub default_compiler: bool,

    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Everything a command needs: the validated config plus command-line overrides
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub config: Config,
    /// Install prefix, `~` already expanded
    pub prefix: PathBuf,
    pub jobs: usize,
}

impl RunSettings {
    /// Install context for this run
    ///
    /// When an explicit compiler is configured the context is marked as such;
    /// host executables are filled in by the install command after detection.
    pub fn context(&self) -> InstallContext {
        let ctx = InstallContext::new(&self.prefix, self.jobs, self.config.compiler.clone())
            .with_options(BuildOptions::from(&self.config));
        if self.config.use_default_compiler {
            ctx
        } else {
            ctx.with_explicit_compiler(None)
        }
    }
}

impl Cli {
    /// Merge command-line overrides into `config`
    pub fn settings(&self, mut config: Config) -> RunSettings {
        let dirs = CandiDirs::new();
        if self.default_compiler {
            config.use_default_compiler = true;
        }
        RunSettings {
            config,
            prefix: self
                .prefix
                .as_deref()
                .map_or_else(|| dirs.default_prefix(), |p| dirs.expand(p)),
            jobs: self.jobs.unwrap_or_else(num_cpus::get),
        }
    }

    /// Execute the selected command; no command means `install`
    pub async fn run(self, config: Config) -> Result<()> {
        let settings = self.settings(config);
        tracing::debug!(
            "prefix={} jobs={} spack={}",
            settings.prefix.display(),
            settings.jobs,
            settings.config.use_spack
        );
        self.command.unwrap_or_default().run(&settings).await
    }
}

/// Parse `--jobs`: a positive integer
pub fn parse_jobs(value: &str) -> Result<usize, CliError> {
    let parsed: i64 = value.trim().parse().map_err(|_| CliError::InvalidJobs {
        value: value.to_string(),
    })?;
    if parsed <= 0 {
        return Err(CliError::NonPositiveJobs {
            value: value.to_string(),
        });
    }
    usize::try_from(parsed).map_err(|_| CliError::InvalidJobs {
        value: value.to_string(),
    })
}

fn long_version() -> &'static str {
    static LONG_VERSION: OnceLock<String> = OnceLock::new();
    LONG_VERSION.get_or_init(|| {
        format!(
            "{} ({} {}, {})",
            env!("CARGO_PKG_VERSION"),
            option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
            option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"),
            option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown"),
        )
    })
}
