//! Common test utilities and helpers
//!
//! Shared by the integration tests: a scratch directory that doubles as
//! `$HOME`, and a runner for the candi binary pointed at it.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Scratch project for one test
///
/// `candi.toml` lives at the root; the directory is also used as `$HOME`
/// so the default prefix never escapes it.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Write `candi.toml`
    pub fn write_config(&self, content: &str) {
        self.create_file("candi.toml", content);
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Run candi with `args` inside the project, reading `./candi.toml`
    pub fn candi(&self, args: &[&str]) -> Output {
        self.command()
            .env_remove("CANDI_CONFIG")
            .args(args)
            .output()
            .expect("Failed to execute candi")
    }

    /// Run candi with `$CANDI_CONFIG` set to `config`
    pub fn candi_with_config(&self, config: &Path, args: &[&str]) -> Output {
        self.command()
            .env("CANDI_CONFIG", config)
            .args(args)
            .output()
            .expect("Failed to execute candi")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_candi"));
        command
            .current_dir(self.path())
            .env("HOME", self.path())
            .env_remove("RUST_LOG");
        command
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Config selecting a small source plan
pub const SMALL_CONFIG: &str = r#"
packages = ["zlib", "openmpi", "dealii"]

[dealii]
version = "9.6.0"
gsl = "ON"
"#;

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
