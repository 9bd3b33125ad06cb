//! Quadrature rules on the reference simplices
//!
//! Simplex rules are Gauss-Legendre tensor rules pulled back with the
//! Duffy (collapsed coordinate) transform. With `n` points per direction a
//! rule integrates polynomials up to degree `2n - 3` exactly.
use nalgebra::{Point2, Point3};
use std::f64::consts::PI;

/// Gauss-Legendre points and weights on [0, 1]
///
/// # Panics
/// If `n` is zero
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    assert!(n > 0, "Gauss rule needs at least one point");
    let mut points = vec![0.; n];
    let mut weights = vec![0.; n];
    for i in 0..n {
        // Chebyshev-like initial guess, refined by Newton iteration
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = 1.;
        for _ in 0..100 {
            let (p, d) = legendre(n, x);
            dp = d;
            let dx = p / d;
            x -= dx;
            if dx.abs() < 1e-15 {
                let (_, d) = legendre(n, x);
                dp = d;
                break;
            }
        }
        points[n - 1 - i] = 0.5 * (x + 1.);
        weights[n - 1 - i] = 1. / ((1. - x * x) * dp * dp);
    }
    (points, weights)
}

/// Legendre polynomial of degree n and its derivative at x
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let (mut p0, mut p1) = (1., x);
    if n == 0 {
        return (1., 0.);
    }
    for k in 2..=n {
        let k = k as f64;
        let p2 = ((2. * k - 1.) * x * p1 - (k - 1.) * p0) / k;
        p0 = p1;
        p1 = p2;
    }
    let d = n as f64 * (x * p1 - p0) / (x * x - 1.);
    (p1, d)
}

/// Quadrature on the reference tetrahedron (0,0,0), (1,0,0), (0,1,0), (0,0,1)
#[derive(Debug, Clone)]
pub struct Quadrature {
    /// Reference points
    pub points: Vec<Point3<f64>>,
    /// Weights, summing up to 1/6
    pub weights: Vec<f64>,
}

impl Quadrature {
    /// Collapsed Gauss rule with `n` points per direction
    pub fn gauss_simplex(n: usize) -> Self {
        let (x, w) = gauss_legendre(n);
        let mut points = Vec::with_capacity(n * n * n);
        let mut weights = Vec::with_capacity(n * n * n);
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let (u, v, s) = (x[i], x[j], x[k]);
                    points.push(Point3::new(
                        u,
                        (1. - u) * v,
                        (1. - u) * (1. - v) * s,
                    ));
                    weights.push(w[i] * w[j] * w[k] * (1. - u).powi(2) * (1. - v));
                }
            }
        }
        Self { points, weights }
    }

    /// Number of points
    pub fn size(&self) -> usize {
        self.points.len()
    }
}

/// Quadrature on the reference triangle (0,0), (1,0), (0,1)
#[derive(Debug, Clone)]
pub struct FaceQuadrature {
    /// Reference points
    pub points: Vec<Point2<f64>>,
    /// Weights, summing up to 1/2
    pub weights: Vec<f64>,
}

impl FaceQuadrature {
    /// Collapsed Gauss rule with `n` points per direction
    pub fn gauss_simplex(n: usize) -> Self {
        let (x, w) = gauss_legendre(n);
        let mut points = Vec::with_capacity(n * n);
        let mut weights = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                let (u, v) = (x[i], x[j]);
                points.push(Point2::new(u, (1. - u) * v));
                weights.push(w[i] * w[j] * (1. - u));
            }
        }
        Self { points, weights }
    }

    /// Number of points
    pub fn size(&self) -> usize {
        self.points.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn factorial(n: u32) -> f64 {
        (1..=n).map(f64::from).product()
    }

    #[test]
    fn test_gauss_legendre() {
        let (x, w) = gauss_legendre(3);
        assert_abs_diff_eq!(x[1], 0.5, epsilon = 1e-14);
        assert_abs_diff_eq!(x[0], 0.5 - 0.5 * (0.6f64).sqrt(), epsilon = 1e-14);
        assert_abs_diff_eq!(w[0], 5. / 18., epsilon = 1e-14);
        assert_abs_diff_eq!(w[1], 8. / 18., epsilon = 1e-14);
        // x^7 with 4 points
        let (x, w) = gauss_legendre(4);
        let integral: f64 = x.iter().zip(&w).map(|(x, w)| w * x.powi(7)).sum();
        assert_abs_diff_eq!(integral, 1. / 8., epsilon = 1e-14);
    }

    #[test]
    fn test_tetrahedron_monomials() {
        // int x^a y^b z^c = a! b! c! / (a + b + c + 3)!
        let quad = Quadrature::gauss_simplex(4);
        for (a, b, c) in [(0, 0, 0), (1, 0, 0), (2, 2, 1), (0, 3, 2), (1, 1, 3)] {
            let integral: f64 = quad
                .points
                .iter()
                .zip(&quad.weights)
                .map(|(p, w)| w * p.x.powi(a) * p.y.powi(b) * p.z.powi(c))
                .sum();
            #[allow(clippy::cast_sign_loss)]
            let exact = factorial(a as u32) * factorial(b as u32) * factorial(c as u32)
                / factorial((a + b + c + 3) as u32);
            assert_abs_diff_eq!(integral, exact, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_triangle_monomials() {
        // int x^a y^b = a! b! / (a + b + 2)!
        let quad = FaceQuadrature::gauss_simplex(3);
        for (a, b) in [(0, 0), (2, 1), (0, 3)] {
            let integral: f64 = quad
                .points
                .iter()
                .zip(&quad.weights)
                .map(|(p, w)| w * p.x.powi(a) * p.y.powi(b))
                .sum();
            #[allow(clippy::cast_sign_loss)]
            let exact = factorial(a as u32) * factorial(b as u32) / factorial((a + b + 2) as u32);
            assert_abs_diff_eq!(integral, exact, epsilon = 1e-14);
        }
    }
}
