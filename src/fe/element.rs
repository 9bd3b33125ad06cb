//! Lagrange elements on the reference tetrahedron
use crate::error::{NavierError, Result};
use crate::mesh::LOCAL_EDGES;
use nalgebra::{Point3, Vector3};

/// Gradients of the barycentric coordinates on the reference cell
const BARY_GRADS: [[f64; 3]; 4] = [
    [-1., -1., -1.],
    [1., 0., 0.],
    [0., 1., 0.],
    [0., 0., 1.],
];

/// Continuous Lagrange element of degree 1 or 2.
///
/// Shape functions are ordered vertices first, then edges in
/// [`LOCAL_EDGES`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LagrangeTet {
    degree: usize,
}

fn barycentric(p: &Point3<f64>) -> [f64; 4] {
    [1. - p.x - p.y - p.z, p.x, p.y, p.z]
}

fn bary_grad(i: usize) -> Vector3<f64> {
    Vector3::from(BARY_GRADS[i])
}

impl LagrangeTet {
    /// Element of given degree
    ///
    /// # Errors
    /// Degree other than 1 or 2
    pub fn new(degree: usize) -> Result<Self> {
        match degree {
            1 | 2 => Ok(Self { degree }),
            _ => Err(NavierError::UnsupportedDegree(degree)),
        }
    }

    /// Polynomial degree
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of shape functions per cell
    pub fn n_dofs(&self) -> usize {
        if self.degree == 1 {
            4
        } else {
            10
        }
    }

    /// Shape function values at reference point `p`
    pub fn values(&self, p: &Point3<f64>) -> Vec<f64> {
        let l = barycentric(p);
        if self.degree == 1 {
            return l.to_vec();
        }
        let mut v: Vec<f64> = l.iter().map(|li| li * (2. * li - 1.)).collect();
        v.extend(LOCAL_EDGES.iter().map(|[a, b]| 4. * l[*a] * l[*b]));
        v
    }

    /// Shape function gradients (reference coordinates) at `p`
    pub fn gradients(&self, p: &Point3<f64>) -> Vec<Vector3<f64>> {
        if self.degree == 1 {
            return (0..4).map(bary_grad).collect();
        }
        let l = barycentric(p);
        let mut g: Vec<Vector3<f64>> = (0..4)
            .map(|i| bary_grad(i) * (4. * l[i] - 1.))
            .collect();
        g.extend(
            LOCAL_EDGES
                .iter()
                .map(|[a, b]| (bary_grad(*b) * l[*a] + bary_grad(*a) * l[*b]) * 4.),
        );
        g
    }

    /// Nodes of the shape functions on the reference cell
    pub fn support_points(&self) -> Vec<Point3<f64>> {
        let vertices = [
            Point3::new(0., 0., 0.),
            Point3::new(1., 0., 0.),
            Point3::new(0., 1., 0.),
            Point3::new(0., 0., 1.),
        ];
        let mut points = vertices.to_vec();
        if self.degree == 2 {
            points.extend(
                LOCAL_EDGES
                    .iter()
                    .map(|[a, b]| nalgebra::center(&vertices[*a], &vertices[*b])),
            );
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_nodal_basis() {
        for degree in 1..=2 {
            let fe = LagrangeTet::new(degree).unwrap();
            for (i, p) in fe.support_points().iter().enumerate() {
                let v = fe.values(p);
                for (j, vj) in v.iter().enumerate() {
                    let expected = if i == j { 1. } else { 0. };
                    assert_abs_diff_eq!(*vj, expected, epsilon = 1e-14);
                }
            }
        }
    }

    #[test]
    fn test_partition_of_unity() {
        let p = Point3::new(0.2, 0.1, 0.3);
        for degree in 1..=2 {
            let fe = LagrangeTet::new(degree).unwrap();
            assert_abs_diff_eq!(fe.values(&p).iter().sum::<f64>(), 1., epsilon = 1e-14);
            let g: Vector3<f64> = fe.gradients(&p).iter().sum();
            assert_abs_diff_eq!(g.norm(), 0., epsilon = 1e-14);
        }
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let fe = LagrangeTet::new(2).unwrap();
        let p = Point3::new(0.15, 0.25, 0.35);
        let h = 1e-6;
        let g = fe.gradients(&p);
        for d in 0..3 {
            let mut pp = p;
            let mut pm = p;
            pp[d] += h;
            pm[d] -= h;
            let (vp, vm) = (fe.values(&pp), fe.values(&pm));
            for i in 0..fe.n_dofs() {
                assert_abs_diff_eq!((vp[i] - vm[i]) / (2. * h), g[i][d], epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn test_unsupported_degree() {
        assert!(LagrangeTet::new(3).is_err());
    }
}
