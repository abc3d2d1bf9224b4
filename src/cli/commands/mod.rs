//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod doctor;
pub mod fetch;
pub mod install;
pub mod plan;

use anyhow::Result;
use clap::Subcommand;

use crate::cli::RunSettings;

/// Available CLI commands
#[derive(Subcommand, Debug, Default, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Fetch sources and install every configured package (default)
    #[default]
    Install,

    /// Show the ordered install plan without running anything
    Plan,

    /// Download package sources only
    Fetch {
        /// Fetch again even if sources are already on disk
        #[arg(short, long)]
        force: bool,
    },

    /// Check that the tools an install needs are available
    Doctor,
}

impl Commands {
    /// Execute the command
    pub async fn run(self, settings: &RunSettings) -> Result<()> {
        match self {
            Self::Install => install::execute(settings).await,
            Self::Plan => plan::execute(settings),
            Self::Fetch { force } => fetch::execute(settings, force).await,
            Self::Doctor => doctor::execute(settings),
        }
    }
}
