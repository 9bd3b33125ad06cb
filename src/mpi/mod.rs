//! MPI Routines
//!
//! Every collective used by the solver goes through [`Comm`]. Without the
//! `mpi` feature only [`SerialComm`] is available and every run is a
//! single-rank run.
use ndarray::Array1;

#[cfg(feature = "mpi")]
mod world;
#[cfg(feature = "mpi")]
pub use world::{initialize, MpiComm, Universe};

/// Collective operations needed by assembly and post-processing.
///
/// All methods are collective: every rank has to call them in the same
/// order, even ranks that own no cells.
pub trait Comm {
    /// Rank of this process
    fn rank(&self) -> usize;

    /// Number of processes
    fn size(&self) -> usize;

    /// Sum `values` element-wise over all ranks, result on every rank
    fn sum_in_place(&self, values: &mut [f64]);

    /// Maximum of `value` over all ranks, valid on rank 0 only
    fn max_to_root(&self, value: f64) -> f64;

    /// Block until all ranks arrived
    fn barrier(&self);

    /// Sum a scalar over all ranks
    fn sum(&self, value: f64) -> f64 {
        let mut buf = [value];
        self.sum_in_place(&mut buf);
        buf[0]
    }

    /// Sum a replicated vector over all ranks
    fn sum_array(&self, values: &mut Array1<f64>) {
        match values.as_slice_mut() {
            Some(slice) => self.sum_in_place(slice),
            None => {
                let mut buf = values.to_vec();
                self.sum_in_place(&mut buf);
                values.assign(&Array1::from(buf));
            }
        }
    }

    /// True on the coordinating rank
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Single process, all collectives are the identity
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Comm for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn sum_in_place(&self, _values: &mut [f64]) {}

    fn max_to_root(&self, value: f64) -> f64 {
        value
    }

    fn barrier(&self) {}
}

/// Claims to be rank `rank` of `size`, but never communicates.
///
/// Lets a single process run the rank-local part of an algorithm for each
/// partition in turn; the caller performs the reduction by hand.
#[derive(Debug, Clone, Copy)]
pub struct DetachedComm {
    rank: usize,
    size: usize,
}

impl DetachedComm {
    /// Pretend to be `rank` out of `size`
    ///
    /// # Panics
    /// If `rank >= size`
    pub fn new(rank: usize, size: usize) -> Self {
        assert!(rank < size, "rank {} out of range for size {}", rank, size);
        Self { rank, size }
    }
}

impl Comm for DetachedComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn sum_in_place(&self, _values: &mut [f64]) {}

    fn max_to_root(&self, value: f64) -> f64 {
        value
    }

    fn barrier(&self) {}
}
