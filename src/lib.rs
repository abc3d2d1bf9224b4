//! candi - compile and install deal.II and its dependencies
//!
//! Installs deal.II plus the libraries PRISMS-PF and PRISMS-Plasticity need,
//! either by building each package from source or by delegating to spack.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Config, install planning, package descriptors and sequencing
//! - [`infra`] - Infrastructure layer (network, git, processes, host discovery)
//! - [`config`] - Constants and default URLs
//! - [`error`] - Error types and exit codes

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
