//! Restarted, flexible GMRES
//!
//! Right preconditioned, so the residual monitored by the iteration is the
//! true residual of the unpreconditioned system. The preconditioner may
//! change from one iteration to the next (flexible variant), which allows
//! inner Krylov solves inside the block preconditioners.
use super::LinearOperator;
use ndarray::Array1;

/// Stopping criteria
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverControl {
    /// Maximum number of iterations
    pub max_iter: usize,
    /// Absolute tolerance on the l2 norm of the residual
    pub tolerance: f64,
    /// Krylov subspace dimension before restart
    pub restart: usize,
}

impl SolverControl {
    /// New control with default restart length
    pub fn new(max_iter: usize, tolerance: f64) -> Self {
        Self {
            max_iter,
            tolerance,
            restart: 50,
        }
    }
}

impl Default for SolverControl {
    fn default() -> Self {
        Self::new(100_000, 1e-4)
    }
}

/// Outcome of a solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveStats {
    /// Number of iterations performed
    pub iterations: usize,
    /// Final residual norm
    pub residual: f64,
    /// Residual dropped below the tolerance
    pub converged: bool,
}

fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Givens rotation (c, s) that zeroes `b` in (a, b)
fn givens(a: f64, b: f64) -> (f64, f64) {
    if b == 0. {
        (1., 0.)
    } else {
        let r = a.hypot(b);
        (a / r, b / r)
    }
}

/// Solve `a x = b` starting from the content of `x`.
///
/// Non-convergence is not an error, check [`SolveStats::converged`].
pub fn gmres<A, P>(a: &A, x: &mut Array1<f64>, b: &Array1<f64>, prec: &P, control: &SolverControl) -> SolveStats
where
    A: LinearOperator + ?Sized,
    P: LinearOperator + ?Sized,
{
    let n = b.len();
    let m = control.restart.max(1);
    let mut iterations = 0;

    let mut r = Array1::zeros(n);
    a.vmult(&mut r, x);
    r = b - &r;
    let mut beta = norm(&r);

    while beta > control.tolerance && iterations < control.max_iter {
        let mut v: Vec<Array1<f64>> = Vec::with_capacity(m + 1);
        let mut z: Vec<Array1<f64>> = Vec::with_capacity(m);
        // Hessenberg matrix, column major, rotated in place
        let mut h: Vec<Vec<f64>> = Vec::with_capacity(m);
        let mut cs: Vec<(f64, f64)> = Vec::with_capacity(m);
        let mut g = vec![0.; m + 1];
        g[0] = beta;
        v.push(&r / beta);

        let mut k = 0;
        while k < m && iterations < control.max_iter {
            let mut zk = Array1::zeros(n);
            prec.vmult(&mut zk, &v[k]);
            let mut w = Array1::zeros(n);
            a.vmult(&mut w, &zk);
            z.push(zk);

            // modified Gram-Schmidt
            let mut col = vec![0.; k + 2];
            for (i, vi) in v.iter().enumerate() {
                col[i] = w.dot(vi);
                w.scaled_add(-col[i], vi);
            }
            let hk1 = norm(&w);
            col[k + 1] = hk1;

            for (i, &(c, s)) in cs.iter().enumerate() {
                let (hi, hj) = (col[i], col[i + 1]);
                col[i] = c * hi + s * hj;
                col[i + 1] = -s * hi + c * hj;
            }
            let (c, s) = givens(col[k], col[k + 1]);
            col[k] = c * col[k] + s * col[k + 1];
            col[k + 1] = 0.;
            g[k + 1] = -s * g[k];
            g[k] *= c;
            cs.push((c, s));

            // lucky breakdown, the Krylov space is invariant
            let breakdown = hk1 == 0.;
            if !breakdown {
                v.push(w / hk1);
            }
            h.push(col);
            iterations += 1;
            k += 1;
            if g[k].abs() <= control.tolerance || breakdown {
                break;
            }
        }

        // back substitution for the k x k triangular system
        let mut y = vec![0.; k];
        for i in (0..k).rev() {
            let mut s = g[i];
            for j in i + 1..k {
                s -= h[j][i] * y[j];
            }
            y[i] = if h[i][i] == 0. { 0. } else { s / h[i][i] };
        }
        for (yi, zi) in y.iter().zip(&z) {
            x.scaled_add(*yi, zi);
        }

        a.vmult(&mut r, x);
        r = b - &r;
        beta = norm(&r);
    }

    SolveStats {
        iterations,
        residual: beta,
        converged: beta <= control.tolerance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::sparse::tests::tridiagonal;
    use crate::solver::{Identity, Jacobi};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_gmres_solves_nonsymmetric_system() {
        let n = 30;
        let mat = tridiagonal(n);
        let exact = Array1::from_shape_fn(n, |i| (i as f64 * 0.3).sin());
        let b = mat.dot(&exact);
        let mut x = Array1::zeros(n);
        let control = SolverControl::new(1000, 1e-10);
        let stats = gmres(&mat, &mut x, &b, &Identity, &control);
        assert!(stats.converged);
        assert!(stats.residual <= 1e-10);
        for (a, b) in x.iter().zip(&exact) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_gmres_with_restart_and_preconditioner() {
        let n = 40;
        let mat = tridiagonal(n);
        let b = Array1::ones(n);
        let mut x = Array1::zeros(n);
        let control = SolverControl {
            max_iter: 2000,
            tolerance: 1e-9,
            restart: 5,
        };
        let stats = gmres(&mat, &mut x, &b, &Jacobi::new(&mat), &control);
        assert!(stats.converged);
        let res = &b - &mat.dot(&x);
        assert!(res.dot(&res).sqrt() <= 1e-9);
    }

    #[test]
    fn test_gmres_zero_rhs_returns_immediately() {
        let mat = tridiagonal(4);
        let mut x = Array1::zeros(4);
        let stats = gmres(&mat, &mut x, &Array1::zeros(4), &Identity, &SolverControl::default());
        assert_eq!(stats.iterations, 0);
        assert!(stats.converged);
    }

    #[test]
    fn test_gmres_reports_non_convergence() {
        let mat = tridiagonal(50);
        let mut x = Array1::zeros(50);
        let control = SolverControl {
            max_iter: 3,
            tolerance: 1e-14,
            restart: 50,
        };
        let stats = gmres(&mat, &mut x, &Array1::ones(50), &Identity, &control);
        assert_eq!(stats.iterations, 3);
        assert!(!stats.converged);
    }
}
