//! Compressed sparse row matrices
//!
//! Storage is a [`nalgebra_sparse::CsrMatrix`]. All ranks hold the full
//! pattern and the full value array. A rank only adds the contributions of
//! the cells it owns, [`SparseMatrix::compress`] then sums the value arrays
//! over all ranks, after which every rank holds the assembled matrix.
use crate::error::{NavierError, Result};
use crate::mpi::Comm;
use nalgebra_sparse::{CsrMatrix, SparseEntryMut};
use ndarray::{Array1, Array2};
use std::collections::BTreeSet;
use std::ops::Range;

pub use nalgebra_sparse::pattern::SparsityPattern;

/// Pattern from explicit row sets
///
/// # Errors
/// A column index is not smaller than `n_cols`
pub fn pattern_from_rows(n_cols: usize, rows: &[BTreeSet<usize>]) -> Result<SparsityPattern> {
    let mut offsets = Vec::with_capacity(rows.len() + 1);
    let mut indices = Vec::with_capacity(rows.iter().map(BTreeSet::len).sum());
    offsets.push(0);
    for row in rows {
        indices.extend(row.iter().copied());
        offsets.push(indices.len());
    }
    SparsityPattern::try_from_offsets_and_indices(rows.len(), n_cols, offsets, indices)
        .map_err(|e| NavierError::SparseFormat(e.to_string()))
}

/// Square pattern coupling all dofs of a cell with each other.
///
/// `couple(i, j)` decides whether global row `i` and column `j` may be
/// coupled at all; it masks e.g. pressure-pressure entries.
///
/// # Errors
/// A dof index is not smaller than `n`
pub fn pattern_from_cells<'a, I, F>(n: usize, cells: I, couple: F) -> Result<SparsityPattern>
where
    I: IntoIterator<Item = &'a [usize]>,
    F: Fn(usize, usize) -> bool,
{
    let mut rows = vec![BTreeSet::new(); n];
    for dofs in cells {
        for &i in dofs {
            let row = rows.get_mut(i).ok_or_else(|| {
                NavierError::SparseFormat(format!("row {} outside of {} rows", i, n))
            })?;
            row.extend(dofs.iter().copied().filter(|&j| couple(i, j)));
        }
    }
    pattern_from_rows(n, &rows)
}

/// Sparse matrix, values stored in CSR order
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    csr: CsrMatrix<f64>,
}

impl From<CsrMatrix<f64>> for SparseMatrix {
    fn from(csr: CsrMatrix<f64>) -> Self {
        Self { csr }
    }
}

impl SparseMatrix {
    /// Zero matrix on `pattern`
    pub fn new(pattern: &SparsityPattern) -> Self {
        let values = vec![0.; pattern.nnz()];
        Self::from_parts(pattern.clone(), values)
    }

    /// Matrix from a pattern and its values in pattern order
    ///
    /// # Panics
    /// Number of values differs from the number of stored entries
    pub fn from_parts(pattern: SparsityPattern, values: Vec<f64>) -> Self {
        match CsrMatrix::try_from_pattern_and_values(pattern, values) {
            Ok(csr) => Self { csr },
            Err(e) => panic!("values do not fit the pattern: {}", e),
        }
    }

    /// Underlying CSR storage
    pub fn as_csr(&self) -> &CsrMatrix<f64> {
        &self.csr
    }

    /// Underlying pattern
    pub fn pattern(&self) -> &SparsityPattern {
        self.csr.pattern()
    }

    /// Stored values in pattern order
    pub fn values(&self) -> &[f64] {
        self.csr.values()
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.csr.nrows()
    }

    /// Number of columns
    pub fn n_cols(&self) -> usize {
        self.csr.ncols()
    }

    /// Set all stored values to zero, keeping the pattern
    pub fn set_zero(&mut self) {
        self.csr.values_mut().iter_mut().for_each(|v| *v = 0.);
    }

    /// Scatter-add a dense cell matrix with `dofs` as row and column indices.
    ///
    /// Zero entries are skipped, so masked couplings never need to be in
    /// the pattern.
    ///
    /// # Errors
    /// A nonzero entry is not part of the pattern
    pub fn add_cell(&mut self, dofs: &[usize], local: &Array2<f64>) -> Result<()> {
        for (a, &i) in dofs.iter().enumerate() {
            for (b, &j) in dofs.iter().enumerate() {
                let v = local[[a, b]];
                if v != 0. {
                    self.add_entry(i, j, v)?;
                }
            }
        }
        Ok(())
    }

    /// Add `value` to entry (i, j)
    ///
    /// # Errors
    /// (i, j) is not part of the pattern
    pub fn add_entry(&mut self, i: usize, j: usize, value: f64) -> Result<()> {
        match self.csr.get_entry_mut(i, j) {
            Some(SparseEntryMut::NonZero(v)) => {
                *v += value;
                Ok(())
            }
            _ => Err(NavierError::OutsidePattern { row: i, col: j }),
        }
    }

    /// Sum the rank-local contributions over all ranks.
    ///
    /// Collective, must be called on every rank.
    pub fn compress<C: Comm>(&mut self, comm: &C) {
        comm.sum_in_place(self.csr.values_mut());
    }

    /// `self += factor * other`
    ///
    /// # Errors
    /// Matrices do not share the same pattern
    pub fn add(&mut self, factor: f64, other: &SparseMatrix) -> Result<()> {
        if !self.same_pattern(other) {
            return Err(NavierError::PatternMismatch);
        }
        for (v, o) in self.csr.values_mut().iter_mut().zip(other.values()) {
            *v += factor * o;
        }
        Ok(())
    }

    /// `self *= factor`
    pub fn scale(&mut self, factor: f64) {
        self.csr.values_mut().iter_mut().for_each(|v| *v *= factor);
    }

    /// True if both matrices store the same entries
    pub fn same_pattern(&self, other: &SparseMatrix) -> bool {
        self.pattern() == other.pattern()
    }

    /// dst = self * src
    pub fn vmult_into(&self, dst: &mut Array1<f64>, src: &Array1<f64>) {
        for (d, row) in dst.iter_mut().zip(self.csr.row_iter()) {
            *d = row
                .col_indices()
                .iter()
                .zip(row.values())
                .map(|(&j, v)| v * src[j])
                .sum();
        }
    }

    /// Return self * src
    pub fn dot(&self, src: &Array1<f64>) -> Array1<f64> {
        let mut dst = Array1::zeros(self.n_rows());
        self.vmult_into(&mut dst, src);
        dst
    }

    /// Entry (i, j), zero if not stored
    pub fn el(&self, i: usize, j: usize) -> f64 {
        self.csr.get_entry(i, j).map_or(0., |e| e.into_value())
    }

    /// Diagonal entry of row `i`, zero if not stored
    pub fn diag_element(&self, i: usize) -> f64 {
        self.el(i, i)
    }

    /// Main diagonal
    pub fn diagonal(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.n_rows().min(self.n_cols()), |i| self.diag_element(i))
    }

    /// Storage range of row `i`
    pub fn row_range(&self, i: usize) -> Range<usize> {
        let offsets = self.csr.row_offsets();
        offsets[i]..offsets[i + 1]
    }

    /// Column indices and values of row `i`
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let range = self.row_range(i);
        (&self.csr.col_indices()[range.clone()], &self.csr.values()[range])
    }

    /// Column indices and mutable values of row `i`
    pub fn row_mut(&mut self, i: usize) -> (&[usize], &mut [f64]) {
        let (offsets, cols, values) = self.csr.csr_data_mut();
        let range = offsets[i]..offsets[i + 1];
        (&cols[range.clone()], &mut values[range])
    }

    /// Zero all off-diagonal entries of row `i` and set its diagonal
    ///
    /// # Panics
    /// If the diagonal is not part of the pattern
    pub fn clear_row(&mut self, i: usize, diagonal: f64) {
        let (cols, values) = self.row_mut(i);
        let k = match cols.binary_search(&i) {
            Ok(k) => k,
            Err(_) => panic!("row {} has no diagonal entry", i),
        };
        values.iter_mut().for_each(|v| *v = 0.);
        values[k] = diagonal;
    }

    /// Copy of the sub-block `rows` x `cols`, with local indices
    pub fn block(&self, rows: Range<usize>, cols: Range<usize>) -> SparseMatrix {
        let n_rows = rows.len();
        let mut offsets = vec![0];
        let mut indices = Vec::new();
        let mut values = Vec::new();
        for i in rows {
            let (c, v) = self.row(i);
            for (&j, &vj) in c.iter().zip(v) {
                if cols.contains(&j) {
                    indices.push(j - cols.start);
                    values.push(vj);
                }
            }
            offsets.push(indices.len());
        }
        match CsrMatrix::try_from_csr_data(n_rows, cols.len(), offsets, indices, values) {
            Ok(csr) => Self { csr },
            Err(e) => panic!("block of a valid matrix is valid: {}", e),
        }
    }

    /// `A * diag(d) * B`, with the diagonal always stored if the result is
    /// square
    ///
    /// # Panics
    /// Dimensions of `a`, `d` and `b` do not fit together
    pub fn triple_product(a: &SparseMatrix, d: &Array1<f64>, b: &SparseMatrix) -> SparseMatrix {
        assert_eq!(a.n_cols(), d.len(), "A and d do not fit together");
        assert_eq!(d.len(), b.n_rows(), "d and B do not fit together");
        let mut scaled = b.csr.clone();
        for (mut row, dk) in scaled.row_iter_mut().zip(d.iter()) {
            row.values_mut().iter_mut().for_each(|v| *v *= dk);
        }
        let product = &a.csr * &scaled;
        let n = product.nrows();
        if n != product.ncols() {
            return Self { csr: product };
        }
        // structural zero diagonal, the sum keeps the union of both patterns
        let diagonal = SparseMatrix::from_parts(
            SparsityPattern::try_from_offsets_and_indices(n, n, (0..=n).collect(), (0..n).collect())
                .unwrap_or_else(|e| panic!("diagonal pattern is valid: {}", e)),
            vec![0.; n],
        );
        Self {
            csr: &product + &diagonal.csr,
        }
    }

    /// Dense copy, for debugging and small problems
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.n_rows(), self.n_cols()));
        for (i, j, v) in self.csr.triplet_iter() {
            dense[[i, j]] = *v;
        }
        dense
    }
}
