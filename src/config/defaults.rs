//! Default configuration values

/// Config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "candi.toml";

/// Environment variable pointing at an alternative config file
pub const ENV_CONFIG_PATH: &str = "CANDI_CONFIG";

/// Install prefix directory name, created under the home directory
pub const DEFAULT_PREFIX_DIR: &str = "dealii-candi";

/// Oldest deal.II release this tool can bootstrap
pub const MIN_DEAL_II_VERSION: &str = "9.6.0";

/// deal.II release installed when the config does not name one
pub const DEFAULT_DEAL_II_VERSION: &str = "9.6.0";

/// Packages installed when the config does not list any
pub const DEFAULT_PACKAGES: &[&str] = &["zlib", "openblas", "p4est", "kokkos", "openmpi", "dealii"];

/// Packages that must be installed before everything else, in this order
pub const PRIORITY_PACKAGES: &[&str] = &["cuda", "kokkos", "openmpi"];

/// Default compiler family for non-default toolchains
pub const DEFAULT_COMPILER_TYPE: &str = "gcc";

/// Default compiler version for non-default toolchains
pub const DEFAULT_COMPILER_VERSION: &str = "13.2.0";

/// Maximum number of download retry attempts
pub const MAX_DOWNLOAD_RETRIES: u32 = 3;

/// Default number of parallel downloads
pub const DEFAULT_PARALLEL_DOWNLOADS: usize = 4;

/// Stamp file written into an install prefix once a source build completes
pub const INSTALL_STAMP: &str = ".candi-installed";

/// Lines of a failed tool's log shown in the error message
pub const LOG_TAIL_LINES: usize = 20;
