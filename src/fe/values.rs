//! Shape functions and fields on physical cells and faces
//!
//! [`FeValues`] and [`FaceValues`] are set up once with the elements and a
//! quadrature rule, and re-initialized for every cell (or cell face).
//! Shape function indices follow the element ordering: velocity node `a`
//! and pressure node `m`, see [`crate::fe::dof`] for the cell dof layout.
use super::{FaceQuadrature, LagrangeTet, Quadrature};
use crate::mesh::{jacobian, Mesh, LOCAL_FACES};
use nalgebra::{Matrix3, Point3, Vector3};
use ndarray::Array1;

/// Reference coordinates of the tetrahedron vertices
const REFERENCE_VERTICES: [[f64; 3]; 4] = [
    [0., 0., 0.],
    [1., 0., 0.],
    [0., 1., 0.],
    [0., 0., 1.],
];

/// Shape data at quadrature points, with field evaluation on top
pub trait ShapeData {
    /// Number of quadrature points
    fn n_quadrature_points(&self) -> usize;

    /// Number of scalar velocity shape functions
    fn n_velocity_nodes(&self) -> usize;

    /// Number of pressure shape functions
    fn n_pressure_nodes(&self) -> usize;

    /// Value of scalar velocity shape function `a` at point `q`
    fn velocity_shape(&self, a: usize, q: usize) -> f64;

    /// Physical gradient of scalar velocity shape function `a` at point `q`
    fn velocity_shape_grad(&self, a: usize, q: usize) -> &Vector3<f64>;

    /// Value of pressure shape function `m` at point `q`
    fn pressure_shape(&self, m: usize, q: usize) -> f64;

    /// Quadrature weight times Jacobian determinant
    fn jxw(&self, q: usize) -> f64;

    /// Physical quadrature point
    fn point(&self, q: usize) -> &Point3<f64>;

    /// Velocity at all quadrature points. `dofs` are the cell dofs.
    fn velocity_values(&self, dofs: &[usize], global: &Array1<f64>) -> Vec<Vector3<f64>> {
        let nv = self.n_velocity_nodes();
        (0..self.n_quadrature_points())
            .map(|q| {
                let mut u = Vector3::zeros();
                for a in 0..nv {
                    let phi = self.velocity_shape(a, q);
                    for c in 0..3 {
                        u[c] += global[dofs[c * nv + a]] * phi;
                    }
                }
                u
            })
            .collect()
    }

    /// Velocity gradients `G[(i, j)] = d u_i / d x_j` at all quadrature points
    fn velocity_gradients(&self, dofs: &[usize], global: &Array1<f64>) -> Vec<Matrix3<f64>> {
        let nv = self.n_velocity_nodes();
        (0..self.n_quadrature_points())
            .map(|q| {
                let mut g = Matrix3::zeros();
                for a in 0..nv {
                    let grad = self.velocity_shape_grad(a, q);
                    for c in 0..3 {
                        let coef = global[dofs[c * nv + a]];
                        for j in 0..3 {
                            g[(c, j)] += coef * grad[j];
                        }
                    }
                }
                g
            })
            .collect()
    }

    /// Velocity divergence at all quadrature points
    fn velocity_divergences(&self, dofs: &[usize], global: &Array1<f64>) -> Vec<f64> {
        self.velocity_gradients(dofs, global)
            .iter()
            .map(|g| g.trace())
            .collect()
    }

    /// Pressure at all quadrature points
    fn pressure_values(&self, dofs: &[usize], global: &Array1<f64>) -> Vec<f64> {
        let offset = 3 * self.n_velocity_nodes();
        (0..self.n_quadrature_points())
            .map(|q| {
                (0..self.n_pressure_nodes())
                    .map(|m| global[dofs[offset + m]] * self.pressure_shape(m, q))
                    .sum()
            })
            .collect()
    }
}

/// Map reference gradients with the inverse transposed Jacobian
fn physical_gradients(ref_grads: &[Vec<Vector3<f64>>], inv_t: &Matrix3<f64>) -> Vec<Vec<Vector3<f64>>> {
    ref_grads
        .iter()
        .map(|g| g.iter().map(|gi| inv_t * gi).collect())
        .collect()
}

/// Jacobian, its inverse transpose and determinant of cell `c`
fn cell_map(mesh: &Mesh, c: usize) -> (Matrix3<f64>, Matrix3<f64>, f64) {
    let jac = jacobian(mesh.vertices(), mesh.cell(c));
    // cells are validated on mesh construction
    let inv = jac.try_inverse().unwrap_or_else(Matrix3::zeros);
    (jac, inv.transpose(), jac.determinant())
}

/// Values on a cell
#[derive(Debug, Clone)]
pub struct FeValues {
    quadrature: Quadrature,
    ref_values_u: Vec<Vec<f64>>,
    ref_grads_u: Vec<Vec<Vector3<f64>>>,
    values_p: Vec<Vec<f64>>,
    n_u: usize,
    n_p: usize,
    jxw: Vec<f64>,
    points: Vec<Point3<f64>>,
    grads_u: Vec<Vec<Vector3<f64>>>,
}

impl FeValues {
    /// Precompute reference data
    pub fn new(fe_u: &LagrangeTet, fe_p: &LagrangeTet, quadrature: Quadrature) -> Self {
        let ref_values_u = quadrature.points.iter().map(|p| fe_u.values(p)).collect();
        let ref_grads_u: Vec<Vec<Vector3<f64>>> =
            quadrature.points.iter().map(|p| fe_u.gradients(p)).collect();
        let values_p = quadrature.points.iter().map(|p| fe_p.values(p)).collect();
        let nq = quadrature.size();
        Self {
            ref_values_u,
            grads_u: ref_grads_u.clone(),
            ref_grads_u,
            values_p,
            n_u: fe_u.n_dofs(),
            n_p: fe_p.n_dofs(),
            jxw: vec![0.; nq],
            points: vec![Point3::origin(); nq],
            quadrature,
        }
    }

    /// Move to cell `c`
    pub fn reinit(&mut self, mesh: &Mesh, c: usize) {
        let (jac, inv_t, det) = cell_map(mesh, c);
        let x0 = mesh.vertices()[mesh.cell(c)[0]];
        for (q, (p, w)) in self
            .quadrature
            .points
            .iter()
            .zip(&self.quadrature.weights)
            .enumerate()
        {
            self.jxw[q] = w * det;
            self.points[q] = x0 + jac * p.coords;
        }
        self.grads_u = physical_gradients(&self.ref_grads_u, &inv_t);
    }

    /// Number of cell dofs
    pub fn dofs_per_cell(&self) -> usize {
        3 * self.n_u + self.n_p
    }
}

impl ShapeData for FeValues {
    fn n_quadrature_points(&self) -> usize {
        self.quadrature.size()
    }

    fn n_velocity_nodes(&self) -> usize {
        self.n_u
    }

    fn n_pressure_nodes(&self) -> usize {
        self.n_p
    }

    fn velocity_shape(&self, a: usize, q: usize) -> f64 {
        self.ref_values_u[q][a]
    }

    fn velocity_shape_grad(&self, a: usize, q: usize) -> &Vector3<f64> {
        &self.grads_u[q][a]
    }

    fn pressure_shape(&self, m: usize, q: usize) -> f64 {
        self.values_p[q][m]
    }

    fn jxw(&self, q: usize) -> f64 {
        self.jxw[q]
    }

    fn point(&self, q: usize) -> &Point3<f64> {
        &self.points[q]
    }
}

/// Values on one face of a cell
#[derive(Debug, Clone)]
pub struct FaceValues {
    fe_u: LagrangeTet,
    fe_p: LagrangeTet,
    quadrature: FaceQuadrature,
    values_u: Vec<Vec<f64>>,
    grads_u: Vec<Vec<Vector3<f64>>>,
    values_p: Vec<Vec<f64>>,
    jxw: Vec<f64>,
    points: Vec<Point3<f64>>,
    normal: Vector3<f64>,
}

impl FaceValues {
    /// Set up for the given elements and face rule
    pub fn new(fe_u: &LagrangeTet, fe_p: &LagrangeTet, quadrature: FaceQuadrature) -> Self {
        let nq = quadrature.size();
        Self {
            fe_u: *fe_u,
            fe_p: *fe_p,
            quadrature,
            values_u: Vec::new(),
            grads_u: Vec::new(),
            values_p: Vec::new(),
            jxw: vec![0.; nq],
            points: vec![Point3::origin(); nq],
            normal: Vector3::zeros(),
        }
    }

    /// Move to local face `f` (opposite vertex `f`) of cell `c`
    pub fn reinit(&mut self, mesh: &Mesh, c: usize, f: usize) {
        let (_, inv_t, _) = cell_map(mesh, c);
        let cell = mesh.cell(c);
        let local = LOCAL_FACES[f];
        let x: Vec<Point3<f64>> = local.iter().map(|&i| mesh.vertices()[cell[i]]).collect();
        let r: Vec<Vector3<f64>> = local
            .iter()
            .map(|&i| Vector3::from(REFERENCE_VERTICES[i]))
            .collect();
        let (e1, e2) = (x[1] - x[0], x[2] - x[0]);
        let cross = e1.cross(&e2);
        let area2 = cross.norm();
        let mut normal = cross / area2;
        if normal.dot(&(mesh.vertices()[cell[f]] - x[0])) > 0. {
            normal = -normal;
        }
        self.normal = normal;

        self.values_u.clear();
        self.values_p.clear();
        let mut ref_grads = Vec::with_capacity(self.quadrature.size());
        for (q, (s, w)) in self
            .quadrature
            .points
            .iter()
            .zip(&self.quadrature.weights)
            .enumerate()
        {
            let ref_point = Point3::from(r[0] + (r[1] - r[0]) * s.x + (r[2] - r[0]) * s.y);
            self.points[q] = x[0] + e1 * s.x + e2 * s.y;
            self.jxw[q] = w * area2;
            self.values_u.push(self.fe_u.values(&ref_point));
            self.values_p.push(self.fe_p.values(&ref_point));
            ref_grads.push(self.fe_u.gradients(&ref_point));
        }
        self.grads_u = physical_gradients(&ref_grads, &inv_t);
    }

    /// Outward unit normal of the current face
    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }
}

impl ShapeData for FaceValues {
    fn n_quadrature_points(&self) -> usize {
        self.quadrature.size()
    }

    fn n_velocity_nodes(&self) -> usize {
        self.fe_u.n_dofs()
    }

    fn n_pressure_nodes(&self) -> usize {
        self.fe_p.n_dofs()
    }

    fn velocity_shape(&self, a: usize, q: usize) -> f64 {
        self.values_u[q][a]
    }

    fn velocity_shape_grad(&self, a: usize, q: usize) -> &Vector3<f64> {
        &self.grads_u[q][a]
    }

    fn pressure_shape(&self, m: usize, q: usize) -> f64 {
        self.values_p[q][m]
    }

    fn jxw(&self, q: usize) -> f64 {
        self.jxw[q]
    }

    fn point(&self, q: usize) -> &Point3<f64> {
        &self.points[q]
    }
}

/// Reference coordinates of physical point `x` in cell `c`, `None` if the
/// point lies outside the cell (with relative tolerance `tol`).
pub fn reference_point(mesh: &Mesh, c: usize, x: &Point3<f64>, tol: f64) -> Option<Point3<f64>> {
    let jac = jacobian(mesh.vertices(), mesh.cell(c));
    let inv = jac.try_inverse()?;
    let p = Point3::from(inv * (x - mesh.vertices()[mesh.cell(c)[0]]));
    let inside = p.x >= -tol && p.y >= -tol && p.z >= -tol && p.x + p.y + p.z <= 1. + tol;
    inside.then(|| p)
}
