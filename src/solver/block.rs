//! Velocity / pressure block structure of vectors and matrices
use ndarray::{s, Array1, ArrayView1};
use std::ops::Range;

/// Sizes of the two blocks. Block 0 (velocity) always comes first,
/// block 1 (pressure) second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPartition {
    /// Number of velocity dofs
    pub n_u: usize,
    /// Number of pressure dofs
    pub n_p: usize,
}

impl BlockPartition {
    /// New partition
    pub fn new(n_u: usize, n_p: usize) -> Self {
        Self { n_u, n_p }
    }

    /// Total number of dofs
    pub fn size(&self) -> usize {
        self.n_u + self.n_p
    }

    /// Global index range of block `b`
    ///
    /// # Panics
    /// If `b > 1`
    pub fn range(&self, b: usize) -> Range<usize> {
        match b {
            0 => 0..self.n_u,
            1 => self.n_u..self.n_u + self.n_p,
            _ => panic!("block {} does not exist, only 0 and 1", b),
        }
    }

    /// Block that contains global index `i`
    pub fn block_of(&self, i: usize) -> usize {
        usize::from(i >= self.n_u)
    }

    /// Velocity part of a block vector
    pub fn velocity<'a>(&self, v: &'a Array1<f64>) -> ArrayView1<'a, f64> {
        v.slice(s![..self.n_u])
    }

    /// Pressure part of a block vector
    pub fn pressure<'a>(&self, v: &'a Array1<f64>) -> ArrayView1<'a, f64> {
        v.slice(s![self.n_u..])
    }

    /// Zero block vector
    pub fn zeros(&self) -> Array1<f64> {
        Array1::zeros(self.size())
    }
}
