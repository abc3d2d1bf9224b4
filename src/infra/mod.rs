//! Infrastructure layer
//!
//! Handles all I/O with the host: downloads, git checkouts, external
//! processes and executable lookup.

pub mod dirs;
pub mod download;
pub mod git;
pub mod process;
pub mod toolchain;
