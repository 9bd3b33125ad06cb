//! # Collection of linear algebra routines
//!
//! Sparse matrices with block access, the Krylov solver and the
//! preconditioners used for the saddle point systems of the
//! Navier--Stokes discretization.
#![allow(clippy::module_name_repetitions)]
use ndarray::Array1;

/// Linear map x -> y, implemented by matrices and preconditioners alike.
#[enum_dispatch]
pub trait LinearOperator {
    /// dst = Op(src)
    ///
    /// `dst` has to be allocated with the right size, its content is
    /// overwritten.
    fn vmult(&self, dst: &mut Array1<f64>, src: &Array1<f64>);
}

// The trait has to be seen by enum_dispatch before the
// preconditioner enum is.
pub mod block;
pub mod gmres;
pub mod ilu;
pub mod preconditioner;
pub mod sparse;
pub use block::BlockPartition;
pub use gmres::{gmres, SolveStats, SolverControl};
pub use ilu::{Ilu0, Jacobi};
pub use preconditioner::{Preconditioner, PreconditionerKind, SaddlePointBlocks};
pub use sparse::{pattern_from_cells, pattern_from_rows, SparseMatrix, SparsityPattern};

/// Identity map, i.e. no preconditioning
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl LinearOperator for Identity {
    fn vmult(&self, dst: &mut Array1<f64>, src: &Array1<f64>) {
        dst.assign(src);
    }
}

impl LinearOperator for SparseMatrix {
    fn vmult(&self, dst: &mut Array1<f64>, src: &Array1<f64>) {
        self.vmult_into(dst, src);
    }
}
