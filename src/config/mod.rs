//! Configuration constants
//!
//! - [`defaults`] - Default values and fixed policies
//! - [`urls`] - Upstream source locations

pub mod defaults;
pub mod urls;
