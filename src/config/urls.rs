//! Source locations for packages built from source

/// zlib release tarballs
pub const ZLIB_DOWNLOAD: &str = "https://zlib.net/fossils";

/// OpenBLAS release tarballs
pub const OPENBLAS_DOWNLOAD: &str = "https://github.com/OpenMathLib/OpenBLAS/releases/download";

/// p4est release tarballs
pub const P4EST_DOWNLOAD: &str = "https://p4est.github.io/release";

/// Kokkos tagged source archives
pub const KOKKOS_DOWNLOAD: &str = "https://github.com/kokkos/kokkos/archive/refs/tags";

/// Open MPI release tarballs
pub const OPENMPI_DOWNLOAD: &str = "https://download.open-mpi.org/release/open-mpi";

/// GNU Scientific Library release tarballs
pub const GSL_DOWNLOAD: &str = "https://ftp.gnu.org/gnu/gsl";

/// SUNDIALS release tarballs
pub const SUNDIALS_DOWNLOAD: &str = "https://github.com/LLNL/sundials/releases/download";

/// Caliper git repository
pub const CALIPER_GIT: &str = "https://github.com/LLNL/Caliper.git";

/// deal.II git repository
pub const DEAL_II_GIT: &str = "https://github.com/dealii/dealii.git";
