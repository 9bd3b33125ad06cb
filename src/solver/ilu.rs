//! Incomplete LU factorization and Jacobi preconditioning
use super::{LinearOperator, SparseMatrix};
use ndarray::Array1;

/// Pivots with smaller magnitude are replaced by one
const PIVOT_THRESHOLD: f64 = 1e-300;

/// ILU(0): LU factorization restricted to the pattern of the matrix.
///
/// L has unit diagonal and is stored below the diagonal, U on and above.
/// Zero (or missing) pivots are replaced by one, which keeps the
/// factorization usable on matrices with structurally empty diagonal rows.
#[derive(Debug, Clone)]
pub struct Ilu0 {
    lu: SparseMatrix,
    pivots: Vec<f64>,
}

impl Ilu0 {
    /// Factorize a square matrix
    ///
    /// # Panics
    /// If the matrix is not square
    pub fn new(matrix: &SparseMatrix) -> Self {
        assert_eq!(matrix.n_rows(), matrix.n_cols(), "ILU needs a square matrix");
        let n = matrix.n_rows();
        let csr = matrix.as_csr();
        let (offsets, cols) = (csr.row_offsets(), csr.col_indices());
        let mut values = csr.values().to_vec();
        let mut pivots = vec![1.; n];
        // position of column j within the current row, usize::MAX if absent
        let mut marker = vec![usize::MAX; n];

        for i in 0..n {
            let row_i = offsets[i]..offsets[i + 1];
            for p in row_i.clone() {
                marker[cols[p]] = p;
            }
            for p in row_i.clone() {
                let k = cols[p];
                if k >= i {
                    break;
                }
                let lik = values[p] / pivots[k];
                values[p] = lik;
                for q in offsets[k]..offsets[k + 1] {
                    let j = cols[q];
                    if j > k && marker[j] != usize::MAX {
                        let ukj = values[q];
                        values[marker[j]] -= lik * ukj;
                    }
                }
            }
            let diag = if marker[i] == usize::MAX {
                0.
            } else {
                values[marker[i]]
            };
            pivots[i] = if diag.abs() < PIVOT_THRESHOLD { 1. } else { diag };
            for p in row_i {
                marker[cols[p]] = usize::MAX;
            }
        }
        let lu = SparseMatrix::from_parts(csr.pattern().clone(), values);
        Self { lu, pivots }
    }

    /// Solve L U x = r
    pub fn solve(&self, dst: &mut Array1<f64>, src: &Array1<f64>) {
        let n = self.pivots.len();
        for i in 0..n {
            let (cols, values) = self.lu.row(i);
            let mut s = src[i];
            for (&j, v) in cols.iter().zip(values) {
                if j >= i {
                    break;
                }
                s -= v * dst[j];
            }
            dst[i] = s;
        }
        for i in (0..n).rev() {
            let (cols, values) = self.lu.row(i);
            let mut s = dst[i];
            for (&j, v) in cols.iter().zip(values) {
                if j > i {
                    s -= v * dst[j];
                }
            }
            dst[i] = s / self.pivots[i];
        }
    }
}

impl LinearOperator for Ilu0 {
    fn vmult(&self, dst: &mut Array1<f64>, src: &Array1<f64>) {
        self.solve(dst, src);
    }
}

/// Diagonal scaling, zero diagonal entries are treated as one
#[derive(Debug, Clone)]
pub struct Jacobi {
    inv_diag: Array1<f64>,
}

impl Jacobi {
    /// From the diagonal of `matrix`
    pub fn new(matrix: &SparseMatrix) -> Self {
        Self::from_diagonal(&matrix.diagonal())
    }

    /// From an explicit diagonal
    pub fn from_diagonal(diag: &Array1<f64>) -> Self {
        let inv_diag = diag.mapv(|d| if d.abs() < PIVOT_THRESHOLD { 1. } else { 1. / d });
        Self { inv_diag }
    }

    /// Inverse diagonal
    pub fn inverse_diagonal(&self) -> &Array1<f64> {
        &self.inv_diag
    }
}

impl LinearOperator for Jacobi {
    fn vmult(&self, dst: &mut Array1<f64>, src: &Array1<f64>) {
        dst.assign(&(&self.inv_diag * src));
    }
}
