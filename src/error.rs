//! Error type shared by all modules
use thiserror::Error;

/// Result type of this crate
pub type Result<T> = std::result::Result<T, NavierError>;

/// Errors raised while setting up or running a simulation
#[derive(Error, Debug)]
pub enum NavierError {
    /// Reading or writing a file failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Mesh file could not be parsed
    #[error("mesh format error, line {line}: {message}")]
    MeshFormat {
        /// Line number in the mesh file (1-based)
        line: usize,
        /// What went wrong
        message: String,
    },

    /// Preconditioner selector outside of 0..=3
    #[error("invalid preconditioner type {0}, expected 0 (Yosida), 1 (SIMPLE), 2 (aYosida) or 3 (aSIMPLE)")]
    InvalidPreconditioner(u32),

    /// Lagrange degree without an implemented element
    #[error("unsupported polynomial degree {0}, only 1 and 2 are implemented")]
    UnsupportedDegree(usize),

    /// Parameter out of its admissible range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Two matrices must share one sparsity pattern for this operation
    #[error("sparsity pattern mismatch")]
    PatternMismatch,

    /// A value was added to an entry the sparsity pattern does not store
    #[error("entry ({row}, {col}) outside of sparsity pattern")]
    OutsidePattern {
        /// Row index
        row: usize,
        /// Column index
        col: usize,
    },

    /// Offsets and indices do not form a valid compressed sparse layout
    #[error("invalid sparse format: {0}")]
    SparseFormat(String),

    /// Configuration file could not be parsed
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Snapshot file could not be read or written
    #[cfg(feature = "hdf5")]
    #[error("hdf5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}
