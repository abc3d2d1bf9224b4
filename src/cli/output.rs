//! Output formatting and progress indicators
//!
//! Human-readable messages go through the helpers here so `--quiet` and
//! `--json` apply everywhere. Errors always reach stderr.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

static QUIET: AtomicBool = AtomicBool::new(false);
static JSON: AtomicBool = AtomicBool::new(false);
static VERBOSITY: AtomicU8 = AtomicU8::new(0);

/// Output switches from the global command-line flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub quiet: bool,
    pub json: bool,
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Make these switches visible to every output helper
    pub fn apply_global(self) {
        QUIET.store(self.quiet, Ordering::Relaxed);
        JSON.store(self.json, Ordering::Relaxed);
        VERBOSITY.store(self.verbose, Ordering::Relaxed);
    }
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

pub fn is_json() -> bool {
    JSON.load(Ordering::Relaxed)
}

pub fn is_verbose() -> bool {
    VERBOSITY.load(Ordering::Relaxed) > 0
}

fn chatty() -> bool {
    !is_quiet() && !is_json()
}

pub fn print_info(message: &str) {
    if chatty() {
        println!("{} {message}", status::INFO);
    }
}

pub fn print_success(message: &str) {
    if chatty() {
        println!("{} {message}", status::SUCCESS);
    }
}

pub fn print_warning(message: &str) {
    if !is_quiet() {
        eprintln!("{} {message}", status::WARNING);
    }
}

/// Indented follow-up line
pub fn print_detail(message: &str) {
    if chatty() {
        println!("    {message}");
    }
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("    caused by: {cause}");
    }
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Spinner for operations with unknown duration; hidden when not chatty
pub fn create_spinner(message: &str) -> ProgressBar {
    if !chatty() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Progress bar over the packages of a plan; hidden when not chatty
pub fn create_build_bar(total: u64) -> ProgressBar {
    if !chatty() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} packages ({msg})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb
}

/// Status message prefixes
pub mod status {
    pub const SUCCESS: &str = "✓";
    pub const ERROR: &str = "✗";
    pub const WARNING: &str = "⚠";
    pub const INFO: &str = "ℹ";
    /// Already installed, nothing done
    pub const SKIPPED: &str = "•";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_config_new() {
        let config = OutputConfig::new(true, false, 2);
        assert!(config.quiet);
        assert!(!config.json);
        assert_eq!(config.verbose, 2);
    }

    #[test]
    fn test_hidden_bars_when_quiet() {
        OutputConfig::new(true, false, 0).apply_global();
        assert!(create_build_bar(3).is_hidden());
        assert!(create_spinner("fetching").is_hidden());
        OutputConfig::default().apply_global();
    }
}
