//! Collection of boundary conditions
//!
//! Dirichlet data is interpolated at the support points of the velocity
//! nodes on tagged boundary faces, and then eliminated from the assembled
//! system row by row. Pressure is never constrained.
use super::params::InletParams;
use crate::fe::DofHandler;
use crate::mesh::{BoundaryId, Mesh, LOCAL_EDGES};
use crate::solver::SparseMatrix;
use nalgebra::{Point3, Vector3};
use ndarray::Array1;
use std::collections::{BTreeMap, HashSet};
use std::f64::consts::PI;

/// Constrained dof -> prescribed value
pub type BoundaryValues = BTreeMap<usize, f64>;

/// Time dependent vector valued function in space
pub trait VectorFunction {
    /// Value at point `p` and time `t`
    fn value(&self, p: &Point3<f64>, t: f64) -> Vector3<f64>;
}

impl<F> VectorFunction for F
where
    F: Fn(&Point3<f64>, f64) -> Vector3<f64>,
{
    fn value(&self, p: &Point3<f64>, t: f64) -> Vector3<f64> {
        self(p, t)
    }
}

/// Zero everywhere
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroFunction;

impl VectorFunction for ZeroFunction {
    fn value(&self, _p: &Point3<f64>, _t: f64) -> Vector3<f64> {
        Vector3::zeros()
    }
}

/// Inflow of the 3D-2 benchmark
///
/// `u_x = 16 Um y z (H - y) (H - z) / H^4 * sin(pi t / 8)`, other components zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InletVelocity {
    params: InletParams,
}

impl InletVelocity {
    /// Profile with given peak velocity, height and ramp period
    pub fn new(params: InletParams) -> Self {
        Self { params }
    }

    fn ramp(&self, t: f64) -> f64 {
        (PI * t / self.params.period).sin()
    }

    /// Mean velocity `4 U(0, H/2, H/2, t) / 9`
    pub fn mean_velocity(&self, t: f64) -> f64 {
        4. * self.params.um * self.ramp(t) / 9.
    }
}

impl VectorFunction for InletVelocity {
    fn value(&self, p: &Point3<f64>, t: f64) -> Vector3<f64> {
        let h = self.params.height;
        let ux = 16. * self.params.um * p.y * p.z * (h - p.y) * (h - p.z) / h.powi(4) * self.ramp(t);
        Vector3::new(ux, 0., 0.)
    }
}

/// Velocity prescribed on all faces with one of `ids`
pub struct DirichletCondition {
    /// Boundary ids
    pub ids: Vec<BoundaryId>,
    /// Prescribed velocity
    pub function: Box<dyn VectorFunction>,
}

impl DirichletCondition {
    /// Prescribe `function` on `ids`
    pub fn new<F: VectorFunction + 'static>(ids: Vec<BoundaryId>, function: F) -> Self {
        Self {
            ids,
            function: Box::new(function),
        }
    }
}

/// Velocity nodes on all faces with one of the given ids
pub fn boundary_velocity_nodes(mesh: &Mesh, dofs: &DofHandler, ids: &[BoundaryId]) -> Vec<usize> {
    let mut nodes = HashSet::new();
    let nv = dofs.fe_velocity().n_dofs();
    for c in 0..mesh.n_cells() {
        for f in 0..4 {
            if !mesh.face_boundary_id(c, f).map_or(false, |id| ids.contains(&id)) {
                continue;
            }
            let cell_nodes = dofs.cell_velocity_nodes(c);
            // vertices of the face, then edges not touching vertex f
            nodes.extend((0..4).filter(|&v| v != f).map(|v| cell_nodes[v]));
            if nv == 10 {
                nodes.extend(
                    LOCAL_EDGES
                        .iter()
                        .enumerate()
                        .filter(|(_, e)| !e.contains(&f))
                        .map(|(e, _)| cell_nodes[4 + e]),
                );
            }
        }
    }
    let mut nodes: Vec<usize> = nodes.into_iter().collect();
    nodes.sort_unstable();
    nodes
}

/// Interpolate `function` at time `t` on all velocity dofs of faces with
/// the given ids, overwriting earlier entries of `values`.
pub fn interpolate_boundary_values<F: VectorFunction + ?Sized>(
    mesh: &Mesh,
    dofs: &DofHandler,
    ids: &[BoundaryId],
    function: &F,
    t: f64,
    values: &mut BoundaryValues,
) {
    for node in boundary_velocity_nodes(mesh, dofs, ids) {
        let u = function.value(dofs.velocity_support_point(node), t);
        for comp in 0..3 {
            values.insert(dofs.velocity_dof(comp, node), u[comp]);
        }
    }
}

/// Eliminate Dirichlet values from the system.
///
/// Constrained rows are cleared except for their diagonal, which is kept
/// (or replaced by the mean nonzero diagonal if it vanished); the right
/// hand side becomes `diag * value` and the solution is set to `value`.
/// With `eliminate_columns`, the constrained columns of all other rows are
/// moved to the right hand side as well, which preserves symmetry.
pub fn apply_boundary_values(
    values: &BoundaryValues,
    matrix: &mut SparseMatrix,
    solution: &mut Array1<f64>,
    rhs: &mut Array1<f64>,
    eliminate_columns: bool,
) {
    if values.is_empty() {
        return;
    }
    let diag = matrix.diagonal();
    let nonzero: Vec<f64> = diag.iter().filter(|d| **d != 0.).map(|d| d.abs()).collect();
    let average = if nonzero.is_empty() {
        1.
    } else {
        nonzero.iter().sum::<f64>() / nonzero.len() as f64
    };

    if eliminate_columns {
        for i in 0..matrix.n_rows() {
            if values.contains_key(&i) {
                continue;
            }
            let (cols, row) = matrix.row_mut(i);
            for (j, a) in cols.iter().zip(row.iter_mut()) {
                if let Some(v) = values.get(j) {
                    rhs[i] -= *a * v;
                    *a = 0.;
                }
            }
        }
    }

    for (&i, &v) in values {
        let d = if diag[i] == 0. { average } else { diag[i] };
        matrix.clear_row(i, d);
        rhs[i] = d * v;
        solution[i] = v;
    }
}
