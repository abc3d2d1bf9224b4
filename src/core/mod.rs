//! Core install logic
//!
//! Everything that decides *what* to install and in which order lives here.
//! Talking to the host (processes, network, git) goes through
//! [`crate::infra`].
//!
//! # Submodules
//!
//! - [`config`] - `candi.toml` parsing and validation
//! - [`package`] - Package requests and compiler specs
//! - [`version`] - deal.II version parsing and the supported baseline
//! - [`plan`] - Install ordering
//! - [`context`] - Run-wide context and per-package step state
//! - [`descriptor`] - The package installer contract and registry
//! - [`recipes`] - From-source build recipes
//! - [`spack`] - Spack-backed installs and compiler bootstrap
//! - [`sequencer`] - Runs a plan through the descriptors
//! - [`fetch`] - Source pre-fetch
//! - [`doctor`] - Host readiness checks

pub mod config;
pub mod context;
pub mod descriptor;
pub mod doctor;
pub mod fetch;
pub mod package;
pub mod plan;
pub mod recipes;
pub mod sequencer;
pub mod spack;
pub mod version;
