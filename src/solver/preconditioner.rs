//! # Block preconditioners for the saddle point system
//!
//! The system
//! ```text
//! | F    B01 | | u |   | f |
//! | B10  0   | | p | = | g |
//! ```
//! is preconditioned by the approximate block factorization
//! ```text
//! P = | F    0 | | I  H B01 |
//!     | B10  S | | 0  I     |
//! ```
//! with a Schur complement approximation `S = -B10 D^{-1} B01`.
//!
//! | Variant  | D         | H         | inner solves        |
//! |----------|-----------|-----------|---------------------|
//! | Yosida   | diag(M)   | F^{-1}    | GMRES + ILU(0)      |
//! | SIMPLE   | diag(F)   | diag(F)^{-1} | GMRES + ILU(0)   |
//! | aYosida  | diag(M)   | F^{-1}    | one ILU(0) sweep    |
//! | aSIMPLE  | diag(F)   | diag(F)^{-1} | one ILU(0) sweep |
//!
//! `M` is the velocity mass matrix.
use super::{gmres, BlockPartition, Ilu0, Jacobi, LinearOperator, SolverControl, SparseMatrix};
use crate::error::NavierError;
use ndarray::{s, Array1};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Relative residual reduction of inner Krylov solves
const INNER_REDUCTION: f64 = 1e-2;
/// Iteration budget of inner Krylov solves
const INNER_MAX_ITER: usize = 1000;

/// Sub-blocks of the system matrix, copied out once per preconditioner build
#[derive(Debug, Clone)]
pub struct SaddlePointBlocks {
    /// Velocity-velocity block F
    pub f: SparseMatrix,
    /// Velocity-pressure block B01
    pub b01: SparseMatrix,
    /// Pressure-velocity block B10
    pub b10: SparseMatrix,
    /// Block sizes
    pub partition: BlockPartition,
}

impl SaddlePointBlocks {
    /// Extract the blocks of `system`
    pub fn from_system(system: &SparseMatrix, partition: BlockPartition) -> Self {
        let (u, p) = (partition.range(0), partition.range(1));
        Self {
            f: system.block(u.clone(), u.clone()),
            b01: system.block(u.clone(), p.clone()),
            b10: system.block(p, u),
            partition,
        }
    }

    /// `-B10 diag(d)^{-1} B01`
    fn schur_approximation(&self, d: &Array1<f64>) -> SparseMatrix {
        let inv = Jacobi::from_diagonal(d).inverse_diagonal().mapv(|v| -v);
        SparseMatrix::triple_product(&self.b10, &inv, &self.b01)
    }
}

/// Approximate inverse of a block
#[derive(Debug, Clone)]
pub enum InnerSolver {
    /// GMRES preconditioned with ILU(0), to a fixed relative reduction
    Krylov {
        /// Operator to invert
        matrix: SparseMatrix,
        /// Its incomplete factorization
        ilu: Ilu0,
    },
    /// A single ILU(0) application
    Approximate(Ilu0),
}

impl InnerSolver {
    /// Inner Krylov solver
    pub fn krylov(matrix: SparseMatrix) -> Self {
        let ilu = Ilu0::new(&matrix);
        Self::Krylov { matrix, ilu }
    }

    /// Inner ILU(0) sweep
    pub fn approximate(matrix: &SparseMatrix) -> Self {
        Self::Approximate(Ilu0::new(matrix))
    }
}

impl LinearOperator for InnerSolver {
    fn vmult(&self, dst: &mut Array1<f64>, src: &Array1<f64>) {
        match self {
            Self::Krylov { matrix, ilu } => {
                let tolerance = INNER_REDUCTION * src.dot(src).sqrt();
                let control = SolverControl::new(INNER_MAX_ITER, tolerance);
                dst.fill(0.);
                gmres(matrix, dst, src, ilu, &control);
            }
            Self::Approximate(ilu) => ilu.vmult(dst, src),
        }
    }
}

/// Operator H in the upper factor
#[derive(Debug, Clone)]
pub enum UpperCorrection {
    /// H = approximate F^{-1}, the velocity solver
    VelocitySolve,
    /// H = diag(F)^{-1}
    Diagonal(Jacobi),
}

/// Approximate block LU factorization, shared by all variants
#[derive(Debug, Clone)]
pub struct SchurFactorization {
    blocks: SaddlePointBlocks,
    velocity: InnerSolver,
    schur: InnerSolver,
    upper: UpperCorrection,
}

impl SchurFactorization {
    fn new(blocks: SaddlePointBlocks, d: &Array1<f64>, upper: UpperCorrection, exact: bool) -> Self {
        let schur_matrix = blocks.schur_approximation(d);
        let (velocity, schur) = if exact {
            (
                InnerSolver::krylov(blocks.f.clone()),
                InnerSolver::krylov(schur_matrix),
            )
        } else {
            (
                InnerSolver::approximate(&blocks.f),
                InnerSolver::approximate(&schur_matrix),
            )
        };
        Self {
            blocks,
            velocity,
            schur,
            upper,
        }
    }

    /// Block sizes
    pub fn partition(&self) -> BlockPartition {
        self.blocks.partition
    }
}

impl LinearOperator for SchurFactorization {
    fn vmult(&self, dst: &mut Array1<f64>, src: &Array1<f64>) {
        let part = self.blocks.partition;
        let r_u = part.velocity(src).to_owned();
        let r_p = part.pressure(src).to_owned();

        // lower factor
        let mut y_u = Array1::zeros(part.n_u);
        self.velocity.vmult(&mut y_u, &r_u);
        let t_p = &r_p - &self.blocks.b10.dot(&y_u);
        let mut x_p = Array1::zeros(part.n_p);
        self.schur.vmult(&mut x_p, &t_p);

        // upper factor
        let b_p = self.blocks.b01.dot(&x_p);
        let mut h_p = Array1::zeros(part.n_u);
        match &self.upper {
            UpperCorrection::VelocitySolve => self.velocity.vmult(&mut h_p, &b_p),
            UpperCorrection::Diagonal(jacobi) => jacobi.vmult(&mut h_p, &b_p),
        }
        dst.slice_mut(s![..part.n_u]).assign(&(&y_u - &h_p));
        dst.slice_mut(s![part.n_u..]).assign(&x_p);
    }
}

/// Yosida: Schur complement from the lumped velocity mass, exact inner solves
#[derive(Debug, Clone)]
pub struct Yosida(SchurFactorization);

impl Yosida {
    /// Build from the system blocks and the diagonal of the velocity mass
    pub fn new(blocks: SaddlePointBlocks, mass_diagonal: &Array1<f64>) -> Self {
        Self(SchurFactorization::new(
            blocks,
            mass_diagonal,
            UpperCorrection::VelocitySolve,
            true,
        ))
    }
}

/// SIMPLE: Schur complement from diag(F), exact inner solves
#[derive(Debug, Clone)]
pub struct Simple(SchurFactorization);

impl Simple {
    /// Build from the system blocks
    pub fn new(blocks: SaddlePointBlocks) -> Self {
        let d = blocks.f.diagonal();
        let upper = UpperCorrection::Diagonal(Jacobi::from_diagonal(&d));
        Self(SchurFactorization::new(blocks, &d, upper, true))
    }
}

/// Yosida with every inner solve replaced by one ILU(0) sweep
#[derive(Debug, Clone)]
pub struct AYosida(SchurFactorization);

impl AYosida {
    /// Build from the system blocks and the diagonal of the velocity mass
    pub fn new(blocks: SaddlePointBlocks, mass_diagonal: &Array1<f64>) -> Self {
        Self(SchurFactorization::new(
            blocks,
            mass_diagonal,
            UpperCorrection::VelocitySolve,
            false,
        ))
    }
}

/// SIMPLE with every inner solve replaced by one ILU(0) sweep
#[derive(Debug, Clone)]
pub struct ASimple(SchurFactorization);

impl ASimple {
    /// Build from the system blocks
    pub fn new(blocks: SaddlePointBlocks) -> Self {
        let d = blocks.f.diagonal();
        let upper = UpperCorrection::Diagonal(Jacobi::from_diagonal(&d));
        Self(SchurFactorization::new(blocks, &d, upper, false))
    }
}

macro_rules! impl_linear_operator {
    ($($variant:ident),*) => {
        $(
            impl LinearOperator for $variant {
                fn vmult(&self, dst: &mut Array1<f64>, src: &Array1<f64>) {
                    self.0.vmult(dst, src);
                }
            }
        )*
    };
}

impl_linear_operator!(Yosida, Simple, AYosida, ASimple);

/// Block preconditioner, one of the four variants
#[enum_dispatch(LinearOperator)]
#[derive(Debug, Clone)]
pub enum Preconditioner {
    /// Yosida
    Yosida,
    /// SIMPLE
    Simple,
    /// aYosida
    AYosida,
    /// aSIMPLE
    ASimple,
}

/// Preconditioner selector, `0..=3` in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PreconditionerKind {
    /// 0
    Yosida,
    /// 1
    Simple,
    /// 2
    AYosida,
    /// 3
    ASimple,
}

impl TryFrom<u32> for PreconditionerKind {
    type Error = NavierError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Yosida),
            1 => Ok(Self::Simple),
            2 => Ok(Self::AYosida),
            3 => Ok(Self::ASimple),
            _ => Err(NavierError::InvalidPreconditioner(value)),
        }
    }
}

impl From<PreconditionerKind> for u32 {
    fn from(kind: PreconditionerKind) -> u32 {
        match kind {
            PreconditionerKind::Yosida => 0,
            PreconditionerKind::Simple => 1,
            PreconditionerKind::AYosida => 2,
            PreconditionerKind::ASimple => 3,
        }
    }
}

impl std::fmt::Display for PreconditionerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Yosida => "Yosida",
            Self::Simple => "SIMPLE",
            Self::AYosida => "aYosida",
            Self::ASimple => "aSIMPLE",
        };
        write!(f, "{}", name)
    }
}

impl PreconditionerKind {
    /// Construct the selected preconditioner.
    ///
    /// `mass_diagonal` is the diagonal of the velocity mass matrix, only
    /// used by the Yosida variants.
    pub fn build(self, blocks: SaddlePointBlocks, mass_diagonal: &Array1<f64>) -> Preconditioner {
        match self {
            Self::Yosida => Yosida::new(blocks, mass_diagonal).into(),
            Self::Simple => Simple::new(blocks).into(),
            Self::AYosida => AYosida::new(blocks, mass_diagonal).into(),
            Self::ASimple => ASimple::new(blocks).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{pattern_from_rows, SolveStats};
    use std::collections::BTreeSet;

    /// Small 1D Stokes-like saddle point system with n_u = 2 n_p
    fn saddle_point(n_p: usize) -> (SparseMatrix, BlockPartition, Array1<f64>) {
        let n_u = 2 * n_p;
        let part = BlockPartition::new(n_u, n_p);
        let n = part.size();
        let mut rows = vec![BTreeSet::new(); n];
        let mut entries = Vec::new();
        for i in 0..n_u {
            entries.push((i, i, 4.));
            if i + 1 < n_u {
                entries.push((i, i + 1, -1.3));
                entries.push((i + 1, i, -0.7));
            }
        }
        for q in 0..n_p {
            let (a, b) = (2 * q, 2 * q + 1);
            // discrete divergence and (negative) gradient
            entries.push((n_u + q, a, 1.));
            entries.push((n_u + q, b, -1.));
            entries.push((a, n_u + q, -1.));
            entries.push((b, n_u + q, 1.));
        }
        for &(i, j, _) in &entries {
            rows[i].insert(j);
        }
        let mut mat = SparseMatrix::new(&pattern_from_rows(n, &rows).unwrap());
        for (i, j, v) in entries {
            mat.add_entry(i, j, v).unwrap();
        }
        let mass = Array1::from_elem(n_u, 0.5);
        (mat, part, mass)
    }

    fn solve_with(kind: PreconditionerKind) -> SolveStats {
        let (mat, part, mass) = saddle_point(8);
        let prec = kind.build(SaddlePointBlocks::from_system(&mat, part), &mass);
        let b = Array1::from_shape_fn(part.size(), |i| 1. + (i % 3) as f64);
        let mut x = part.zeros();
        let stats = gmres(&mat, &mut x, &b, &prec, &SolverControl::new(500, 1e-10));
        let res = &b - &mat.dot(&x);
        assert!(res.dot(&res).sqrt() <= 1e-10);
        stats
    }

    #[test]
    fn test_all_variants_converge() {
        for code in 0..4 {
            let kind = PreconditionerKind::try_from(code).unwrap();
            let stats = solve_with(kind);
            assert!(stats.converged, "{} did not converge", kind);
        }
    }

    #[test]
    fn test_schur_approximation_sign() {
        let (mat, part, mass) = saddle_point(3);
        let blocks = SaddlePointBlocks::from_system(&mat, part);
        let s = blocks.schur_approximation(&mass);
        // -B10 diag(M)^{-1} B01 = B B^T / 0.5 for this system
        for q in 0..3 {
            assert!((s.el(q, q) - 4.).abs() < 1e-14);
        }
    }

    #[test]
    fn test_kind_from_config() {
        let kind: PreconditionerKind = serde_json::from_str("2").unwrap();
        assert_eq!(kind, PreconditionerKind::AYosida);
        assert_eq!(serde_json::to_string(&PreconditionerKind::ASimple).unwrap(), "3");
        assert!(serde_json::from_str::<PreconditionerKind>("4").is_err());
        assert!(matches!(
            PreconditionerKind::try_from(7),
            Err(NavierError::InvalidPreconditioner(7))
        ));
    }
}
