//! Assembly of the block system
//!
//! Cell integrals are accumulated in dense cell matrices, using the local
//! layout of [`crate::fe::dof`]: velocity component `c` of node `a` sits at
//! `c * nv + a`, pressure node `m` at `3 * nv + m`. The vector valued
//! velocity shape functions are `phi_a e_c`, so all velocity-velocity
//! terms are block diagonal in the components.
//!
//! Each rank integrates its owned cells, [`SparseMatrix::compress`] sums
//! the contributions afterwards.
use super::boundary_conditions::{apply_boundary_values, interpolate_boundary_values, BoundaryValues};
use super::navier::NavierStokes3D;
use crate::error::Result;
use crate::fe::{FaceValues, ShapeData};
use crate::mpi::Comm;
use crate::solver::SparseMatrix;
use log::info;
use nalgebra::Vector3;
use ndarray::{Array1, Array2};

/// What [`NavierStokes3D::assemble`] rebuilds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyMode {
    /// Every operator from scratch
    FullAssembly,
    /// Convection and right hand side only, mass, stiffness and coupling
    /// are reused
    IncrementalStep,
    /// As [`AssemblyMode::IncrementalStep`], and the mass matrix gains the
    /// second BDF2 contribution `0.5/dt`
    IncrementalStepWithMassRestart,
}

/// Discrete velocities entering one assembly
struct StepFields {
    /// Linearization point of the convection
    convective: Array1<f64>,
    /// Time derivative history, already weighted, divided by dt on the rhs
    history: Array1<f64>,
    /// `2 u^n - u^{n-1}`, used by the backflow term
    extrapolated: Array1<f64>,
}

/// Dense cell contributions
struct CellMatrices {
    mass: Array2<f64>,
    stiffness: Array2<f64>,
    convection: Array2<f64>,
    coupling: Array2<f64>,
    pressure_mass: Array2<f64>,
    rhs: Array1<f64>,
}

impl CellMatrices {
    fn new(n: usize) -> Self {
        Self {
            mass: Array2::zeros((n, n)),
            stiffness: Array2::zeros((n, n)),
            convection: Array2::zeros((n, n)),
            coupling: Array2::zeros((n, n)),
            pressure_mass: Array2::zeros((n, n)),
            rhs: Array1::zeros(n),
        }
    }

    fn set_zero(&mut self) {
        for m in &mut [
            &mut self.mass,
            &mut self.stiffness,
            &mut self.convection,
            &mut self.coupling,
            &mut self.pressure_mass,
        ] {
            m.fill(0.);
        }
        self.rhs.fill(0.);
    }
}

/// `weight(q) phi_a phi_b` on every velocity component
fn add_weighted_mass<S: ShapeData>(fe: &S, weights: &[f64], local: &mut Array2<f64>) {
    let nv = fe.n_velocity_nodes();
    for q in 0..fe.n_quadrature_points() {
        let w = weights[q] * fe.jxw(q);
        if w == 0. {
            continue;
        }
        for a in 0..nv {
            let phi_a = fe.velocity_shape(a, q) * w;
            for b in 0..nv {
                let v = phi_a * fe.velocity_shape(b, q);
                for c in 0..3 {
                    local[[c * nv + a, c * nv + b]] += v;
                }
            }
        }
    }
}

/// `nu grad phi_a . grad phi_b`
fn add_stiffness<S: ShapeData>(fe: &S, nu: f64, local: &mut Array2<f64>) {
    let nv = fe.n_velocity_nodes();
    for q in 0..fe.n_quadrature_points() {
        let w = nu * fe.jxw(q);
        for a in 0..nv {
            let grad_a = fe.velocity_shape_grad(a, q);
            for b in 0..nv {
                let v = w * grad_a.dot(fe.velocity_shape_grad(b, q));
                for c in 0..3 {
                    local[[c * nv + a, c * nv + b]] += v;
                }
            }
        }
    }
}

/// `(u . grad phi_b) phi_a + 0.5 div(u) phi_a phi_b`
fn add_convection<S: ShapeData>(fe: &S, u: &[Vector3<f64>], div: &[f64], local: &mut Array2<f64>) {
    let nv = fe.n_velocity_nodes();
    for q in 0..fe.n_quadrature_points() {
        let w = fe.jxw(q);
        for a in 0..nv {
            let phi_a = fe.velocity_shape(a, q) * w;
            for b in 0..nv {
                let v = phi_a * u[q].dot(fe.velocity_shape_grad(b, q));
                for c in 0..3 {
                    local[[c * nv + a, c * nv + b]] += v;
                }
            }
        }
    }
    // skew-symmetric correction
    let temam: Vec<f64> = div.iter().map(|d| 0.5 * d).collect();
    add_weighted_mass(fe, &temam, local);
}

/// `-psi_m div(v)` in the momentum and `psi_m div(u)` in the continuity rows
fn add_coupling<S: ShapeData>(fe: &S, local: &mut Array2<f64>) {
    let nv = fe.n_velocity_nodes();
    let offset = 3 * nv;
    for q in 0..fe.n_quadrature_points() {
        let w = fe.jxw(q);
        for m in 0..fe.n_pressure_nodes() {
            let psi = fe.pressure_shape(m, q) * w;
            for a in 0..nv {
                let grad = fe.velocity_shape_grad(a, q);
                for c in 0..3 {
                    let v = psi * grad[c];
                    local[[c * nv + a, offset + m]] -= v;
                    local[[offset + m, c * nv + a]] += v;
                }
            }
        }
    }
}

/// `factor psi_m psi_n`
fn add_pressure_mass<S: ShapeData>(fe: &S, factor: f64, local: &mut Array2<f64>) {
    let offset = 3 * fe.n_velocity_nodes();
    let np = fe.n_pressure_nodes();
    for q in 0..fe.n_quadrature_points() {
        let w = factor * fe.jxw(q);
        for m in 0..np {
            let psi_m = fe.pressure_shape(m, q) * w;
            for n in 0..np {
                local[[offset + m, offset + n]] += psi_m * fe.pressure_shape(n, q);
            }
        }
    }
}

/// `factor g . phi_a e_c` for values `g` at the quadrature points
fn add_load<S: ShapeData>(fe: &S, g: &[Vector3<f64>], factor: f64, rhs: &mut Array1<f64>) {
    let nv = fe.n_velocity_nodes();
    for q in 0..fe.n_quadrature_points() {
        let w = factor * fe.jxw(q);
        for a in 0..nv {
            let phi_a = fe.velocity_shape(a, q) * w;
            for c in 0..3 {
                rhs[c * nv + a] += g[q][c] * phi_a;
            }
        }
    }
}

impl<C: Comm> NavierStokes3D<C> {
    /// Assemble the linear system of the current time step and eliminate
    /// the Dirichlet values.
    ///
    /// # Errors
    /// Operators do not share one sparsity pattern
    pub fn assemble(&mut self, mode: AssemblyMode) -> Result<()> {
        info!("Assembling the system ({:?})", mode);
        let fields = self.step_fields();
        match mode {
            AssemblyMode::FullAssembly => self.assemble_full(&fields)?,
            AssemblyMode::IncrementalStep => self.assemble_incremental(&fields, false)?,
            AssemblyMode::IncrementalStepWithMassRestart => {
                self.assemble_incremental(&fields, true)?;
            }
        }
        self.apply_dirichlet();
        Ok(())
    }

    fn step_fields(&self) -> StepFields {
        let (u, u_old) = (&self.solution, &self.previous_solution);
        let extrapolated = u * 2. - u_old;
        if self.bdf2_active() {
            StepFields {
                convective: extrapolated.clone(),
                history: u * 2. - u_old * 0.5,
                extrapolated,
            }
        } else {
            StepFields {
                convective: u.clone(),
                history: u.clone(),
                extrapolated,
            }
        }
    }

    /// Rebuild all operators, `system = M + K + C + B`.
    ///
    /// With BDF2 history available the mass already carries `1.5/dt`.
    fn assemble_full(&mut self, fields: &StepFields) -> Result<()> {
        let (nu, dt) = (self.params.nu, self.params.deltat);
        for m in &mut [
            &mut self.mass,
            &mut self.stiffness,
            &mut self.convection,
            &mut self.coupling,
            &mut self.pressure_mass,
        ] {
            m.set_zero();
        }
        self.rhs.fill(0.);

        let mut fe = self.cell_values();
        let mut face = self.face_values();
        let mut local = CellMatrices::new(fe.dofs_per_cell());
        let mass_factor = if self.bdf2_active() { 1.5 / dt } else { 1. / dt };
        let mass_weights = vec![mass_factor; fe.n_quadrature_points()];
        let cells: Vec<usize> = self.dofs.locally_owned_cells().collect();
        for c in cells {
            fe.reinit(&self.mesh, c);
            local.set_zero();
            let dofs = self.dofs.cell_dofs(c);
            let u = fe.velocity_values(&dofs, &fields.convective);
            let div = fe.velocity_divergences(&dofs, &fields.convective);
            let history = fe.velocity_values(&dofs, &fields.history);

            add_stiffness(&fe, nu, &mut local.stiffness);
            add_weighted_mass(&fe, &mass_weights, &mut local.mass);
            add_convection(&fe, &u, &div, &mut local.convection);
            add_coupling(&fe, &mut local.coupling);
            add_pressure_mass(&fe, 1. / nu, &mut local.pressure_mass);
            add_load(&fe, &history, 1. / dt, &mut local.rhs);
            self.add_forcing(&fe, &mut local.rhs);
            self.add_boundary_terms(&mut face, c, &dofs, fields, &mut local);

            self.mass.add_cell(&dofs, &local.mass)?;
            self.stiffness.add_cell(&dofs, &local.stiffness)?;
            self.convection.add_cell(&dofs, &local.convection)?;
            self.coupling.add_cell(&dofs, &local.coupling)?;
            self.pressure_mass.add_cell(&dofs, &local.pressure_mass)?;
            self.scatter_rhs(&dofs, &local.rhs);
        }

        for m in &mut [
            &mut self.mass,
            &mut self.stiffness,
            &mut self.convection,
            &mut self.coupling,
            &mut self.pressure_mass,
        ] {
            m.compress(&self.comm);
        }
        self.comm.sum_array(&mut self.rhs);
        self.operators_assembled = true;
        self.compose_system()
    }

    /// Rebuild convection and rhs, reusing the other operators
    fn assemble_incremental(&mut self, fields: &StepFields, mass_restart: bool) -> Result<()> {
        let dt = self.params.deltat;
        // eliminated columns cannot be restored by subtraction
        let recompose = self.params.symmetric_elimination;
        if !recompose {
            self.system.add(-1., &self.convection)?;
            if mass_restart {
                self.system.add(-1., &self.mass)?;
            }
        }
        if mass_restart {
            info!("Reinitialize mass matrix for BDF2");
        }
        self.convection.set_zero();
        self.rhs.fill(0.);

        let mut fe = self.cell_values();
        let mut face = self.face_values();
        let mut local = CellMatrices::new(fe.dofs_per_cell());
        // the mass is replicated, so its increment is reduced on its own
        let mut mass_increment = if mass_restart {
            Some(SparseMatrix::new(self.mass.pattern()))
        } else {
            None
        };
        let restart_weights = vec![0.5 / dt; fe.n_quadrature_points()];
        let cells: Vec<usize> = self.dofs.locally_owned_cells().collect();
        for c in cells {
            fe.reinit(&self.mesh, c);
            local.set_zero();
            let dofs = self.dofs.cell_dofs(c);
            let u = fe.velocity_values(&dofs, &fields.convective);
            let div = fe.velocity_divergences(&dofs, &fields.convective);
            let history = fe.velocity_values(&dofs, &fields.history);

            add_convection(&fe, &u, &div, &mut local.convection);
            add_load(&fe, &history, 1. / dt, &mut local.rhs);
            self.add_forcing(&fe, &mut local.rhs);
            self.add_boundary_terms(&mut face, c, &dofs, fields, &mut local);
            if let Some(increment) = mass_increment.as_mut() {
                add_weighted_mass(&fe, &restart_weights, &mut local.mass);
                increment.add_cell(&dofs, &local.mass)?;
            }

            self.convection.add_cell(&dofs, &local.convection)?;
            self.scatter_rhs(&dofs, &local.rhs);
        }

        self.convection.compress(&self.comm);
        self.comm.sum_array(&mut self.rhs);
        if let Some(mut increment) = mass_increment {
            increment.compress(&self.comm);
            self.mass.add(1., &increment)?;
        }

        if recompose {
            self.compose_system()
        } else {
            if mass_restart {
                self.system.add(1., &self.mass)?;
            }
            self.system.add(1., &self.convection)
        }
    }

    /// `system = B + M + K + C`
    fn compose_system(&mut self) -> Result<()> {
        self.system = self.coupling.clone();
        self.system.add(1., &self.mass)?;
        self.system.add(1., &self.stiffness)?;
        self.system.add(1., &self.convection)
    }

    fn scatter_rhs(&mut self, dofs: &[usize], local: &Array1<f64>) {
        for (&i, v) in dofs.iter().zip(local.iter()) {
            self.rhs[i] += v;
        }
    }

    fn add_forcing<S: ShapeData>(&self, fe: &S, rhs: &mut Array1<f64>) {
        let f: Vec<Vector3<f64>> = (0..fe.n_quadrature_points())
            .map(|q| self.forcing.value(fe.point(q), self.time))
            .collect();
        if f.iter().any(|v| *v != Vector3::zeros()) {
            add_load(fe, &f, 1., rhs);
        }
    }

    /// Neumann traction and backflow stabilization, each behind its toggle
    fn add_boundary_terms(
        &self,
        face: &mut FaceValues,
        c: usize,
        dofs: &[usize],
        fields: &StepFields,
        local: &mut CellMatrices,
    ) {
        if !(self.params.neumann || self.params.backflow) || !self.mesh.at_boundary(c) {
            return;
        }
        for f in 0..4 {
            let id = match self.mesh.face_boundary_id(c, f) {
                Some(id) => id,
                None => continue,
            };
            let neumann = self.params.neumann && self.params.neumann_ids.contains(&id);
            let backflow = self.params.backflow && self.params.outflow_ids.contains(&id);
            if !(neumann || backflow) {
                continue;
            }
            face.reinit(&self.mesh, c, f);
            if neumann {
                let h: Vec<Vector3<f64>> = (0..face.n_quadrature_points())
                    .map(|q| self.neumann_data.value(face.point(q), self.time))
                    .collect();
                add_load(&*face, &h, 1., &mut local.rhs);
            }
            if backflow {
                // active where the extrapolated flux points inwards
                let normal = *face.normal();
                let weights: Vec<f64> = face
                    .velocity_values(dofs, &fields.extrapolated)
                    .iter()
                    .map(|u| -1.5 * u.dot(&normal).min(0.))
                    .collect();
                add_weighted_mass(&*face, &weights, &mut local.convection);
            }
        }
    }

    /// Dirichlet values at the current time
    pub fn boundary_values(&self) -> BoundaryValues {
        let mut values = BoundaryValues::new();
        for condition in &self.dirichlet {
            interpolate_boundary_values(
                &self.mesh,
                &self.dofs,
                &condition.ids,
                condition.function.as_ref(),
                self.time,
                &mut values,
            );
        }
        values
    }

    fn apply_dirichlet(&mut self) {
        let values = self.boundary_values();
        apply_boundary_values(
            &values,
            &mut self.system,
            &mut self.solution_owned,
            &mut self.rhs,
            self.params.symmetric_elimination,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generator::channel;
    use crate::mpi::{DetachedComm, SerialComm};
    use crate::navier_stokes::navier::tests::small_params;
    use crate::navier_stokes::{Params, TimeScheme};
    use crate::Integrate;
    use approx::assert_abs_diff_eq;
    use nalgebra::Point3;

    fn swirl(p: &Point3<f64>, _t: f64) -> Vector3<f64> {
        Vector3::new(p.y * (1. - p.y), p.z * p.x, 0.3 * p.x * p.y)
    }

    fn setup(params: Params) -> NavierStokes3D<SerialComm> {
        let mesh = channel([2, 1, 1], [2., 1., 1.]).unwrap();
        let mut navier = NavierStokes3D::new(mesh, params, SerialComm).unwrap();
        navier.set_initial_condition(&swirl);
        navier
    }

    /// Largest deviation of `system` from `M + K + C + B` on rows without
    /// Dirichlet value
    fn composition_defect<C: Comm>(navier: &NavierStokes3D<C>) -> f64 {
        let values = navier.boundary_values();
        let mut sum = navier.coupling.clone();
        for m in &[&navier.mass, &navier.stiffness, &navier.convection] {
            sum.add(1., m).unwrap();
        }
        let mut defect: f64 = 0.;
        for i in (0..navier.system.n_rows()).filter(|i| !values.contains_key(i)) {
            let (_, a) = navier.system.row(i);
            let (_, b) = sum.row(i);
            for (x, y) in a.iter().zip(b) {
                defect = defect.max((x - y).abs());
            }
        }
        defect
    }

    #[test]
    fn test_full_assembly_composes_system() {
        let mut navier = setup(small_params());
        navier.assemble(AssemblyMode::FullAssembly).unwrap();
        assert!(composition_defect(&navier) < 1e-13);
        // mass integrates to volume / dt per component
        let total: f64 = navier.mass.values().iter().sum();
        assert_abs_diff_eq!(total, 3. * 2. / 0.1, epsilon = 1e-10);
        // stiffness annihilates constants
        let ones = Array1::ones(navier.dof_handler().n_dofs());
        let k1 = navier.stiffness.dot(&ones);
        assert!(k1.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_pressure_mass() {
        let mut navier = setup(small_params());
        navier.assemble(AssemblyMode::FullAssembly).unwrap();
        let total: f64 = navier.pressure_mass.values().iter().sum();
        assert_abs_diff_eq!(total, 2. / 0.1, epsilon = 1e-10);
        let n_u = navier.dof_handler().partition().n_u;
        for i in 0..n_u {
            assert!(navier.pressure_mass.pattern().lane(i).is_empty());
        }
    }

    #[test]
    fn test_coupling_is_skew() {
        let mut navier = setup(small_params());
        navier.assemble(AssemblyMode::FullAssembly).unwrap();
        let b = navier.coupling.to_dense();
        let defect = (&b + &b.t()).iter().fold(0_f64, |m, v| m.max(v.abs()));
        assert!(defect < 1e-14);
        // divergence of a constant field vanishes
        let mut u = Array1::zeros(b.nrows());
        let part = navier.dof_handler().partition();
        for i in 0..part.n_u / 3 {
            u[i] = 1.;
        }
        let div = navier.coupling.dot(&u);
        assert!(div.iter().all(|v| v.abs() < 1e-13));
    }

    #[test]
    fn test_incremental_step_reuses_operators() {
        let mut navier = setup(small_params());
        navier.assemble(AssemblyMode::FullAssembly).unwrap();
        let mass = navier.mass.clone();
        let stiffness = navier.stiffness.clone();
        let first_convection = navier.convection.clone();

        // new linearization point
        let u = navier.interpolate(&|p: &Point3<f64>, _t: f64| Vector3::new(1. + p.z, -p.x, p.y), |_| 0., 0.);
        navier.set_solution(u);
        navier.time_step = 2;
        navier.assemble(AssemblyMode::IncrementalStep).unwrap();

        assert_eq!(navier.mass.values(), mass.values());
        assert_eq!(navier.stiffness.values(), stiffness.values());
        assert_ne!(navier.convection.values(), first_convection.values());
        // nothing of the first convection is left in the system
        assert!(composition_defect(&navier) < 1e-12);
    }

    #[test]
    fn test_mass_restart() {
        let mut params = small_params();
        params.time_scheme = TimeScheme::Bdf2;
        let mut navier = setup(params);
        navier.time_step = 1;
        navier.assemble(AssemblyMode::FullAssembly).unwrap();
        let mass = navier.mass.clone();
        navier.time_step = 2;
        navier.assemble(AssemblyMode::IncrementalStepWithMassRestart).unwrap();
        for (a, b) in navier.mass.values().iter().zip(mass.values()) {
            assert_abs_diff_eq!(*a, 1.5 * b, epsilon = 1e-12);
        }
        assert!(composition_defect(&navier) < 1e-12);
        navier.time_step = 3;
        navier.assemble(AssemblyMode::IncrementalStep).unwrap();
        assert!(composition_defect(&navier) < 1e-12);
    }

    #[test]
    fn test_restart_rebuilds_operators() {
        // freshly built solver continued from a stored state
        let mut navier = setup(small_params());
        let u = navier.solution().clone();
        navier.set_solution(u);
        navier.time = 0.2;
        navier.time_step = 2;
        navier.update().unwrap();
        assert_eq!(navier.time_step, 3);
        assert!(composition_defect(&navier) < 1e-12);
        let total: f64 = navier.mass.values().iter().sum();
        assert_abs_diff_eq!(total, 3. * 2. / 0.1, epsilon = 1e-10);
        assert!(navier.stiffness.values().iter().any(|v| *v != 0.));
        assert!(navier.coupling.values().iter().any(|v| *v != 0.));
    }

    #[test]
    fn test_bdf2_restart_carries_full_mass() {
        let mut params = small_params();
        params.time_scheme = TimeScheme::Bdf2;
        let mut navier = setup(params);
        navier.time = 0.2;
        navier.time_step = 2;
        navier.update().unwrap();
        assert!(composition_defect(&navier) < 1e-12);
        let total: f64 = navier.mass.values().iter().sum();
        assert_abs_diff_eq!(total, 1.5 * 3. * 2. / 0.1, epsilon = 1e-9);
        // the next step only swaps the convection
        let mass = navier.mass.clone();
        navier.time_step = 4;
        let mode = navier.assembly_mode();
        assert_eq!(mode, AssemblyMode::IncrementalStep);
        navier.assemble(mode).unwrap();
        assert_eq!(navier.mass.values(), mass.values());
        assert!(composition_defect(&navier) < 1e-12);
    }

    #[test]
    fn test_symmetric_elimination_recomposes() {
        let mut params = small_params();
        params.symmetric_elimination = true;
        let mut navier = setup(params);
        navier.assemble(AssemblyMode::FullAssembly).unwrap();
        navier.time_step = 2;
        navier.assemble(AssemblyMode::IncrementalStep).unwrap();
        let values = navier.boundary_values();
        for (&i, _) in values.iter().take(20) {
            for j in 0..navier.system.n_rows() {
                if j != i {
                    assert_eq!(navier.system.el(j, i), 0.);
                }
            }
        }
    }

    #[test]
    fn test_dirichlet_rows() {
        let mut navier = setup(small_params());
        navier.time = 2.;
        navier.assemble(AssemblyMode::FullAssembly).unwrap();
        let values = navier.boundary_values();
        assert!(!values.is_empty());
        for (&i, &v) in &values {
            let (cols, row) = navier.system.row(i);
            for (j, a) in cols.iter().zip(row) {
                if *j != i {
                    assert_eq!(*a, 0.);
                }
            }
            assert_abs_diff_eq!(navier.rhs[i], navier.system.el(i, i) * v, epsilon = 1e-14);
            assert_eq!(navier.solution_owned[i], v);
        }
    }

    #[test]
    fn test_forcing_and_neumann_enter_rhs() {
        let constant = |_: &Point3<f64>, _: f64| Vector3::new(1., 0., 0.);
        let mut params = small_params();
        params.neumann = true;
        params.wall_ids = vec![];
        params.inlet_id = 99;
        let mesh = channel([2, 1, 1], [2., 1., 1.]).unwrap();
        let mut navier = NavierStokes3D::new(mesh, params, SerialComm)
            .unwrap()
            .with_forcing(constant)
            .with_neumann_data(constant);
        navier.assemble(AssemblyMode::FullAssembly).unwrap();
        let part = navier.dof_handler().partition();
        let n = part.n_u / 3;
        // partition of unity: sum of the x rows = volume + outflow area
        let fx: f64 = navier.rhs.iter().take(n).sum();
        assert_abs_diff_eq!(fx, 2. + 1., epsilon = 1e-12);
        let fy: f64 = navier.rhs.iter().skip(n).take(n).sum();
        assert_abs_diff_eq!(fy, 0., epsilon = 1e-14);
    }

    #[test]
    fn test_backflow_only_on_inflow() {
        let mut params = small_params();
        params.backflow = true;
        let backflow = |ux: f64| {
            let mesh = channel([2, 1, 1], [2., 1., 1.]).unwrap();
            let mut navier = NavierStokes3D::new(mesh, params.clone(), SerialComm).unwrap();
            navier.set_initial_condition(&move |_: &Point3<f64>, _: f64| Vector3::new(ux, 0., 0.));
            navier.assemble(AssemblyMode::FullAssembly).unwrap();
            let reference = {
                let mesh = channel([2, 1, 1], [2., 1., 1.]).unwrap();
                let mut p = params.clone();
                p.backflow = false;
                let mut navier = NavierStokes3D::new(mesh, p, SerialComm).unwrap();
                navier.set_initial_condition(&move |_: &Point3<f64>, _: f64| Vector3::new(ux, 0., 0.));
                navier.assemble(AssemblyMode::FullAssembly).unwrap();
                navier.convection
            };
            let mut diff = navier.convection.clone();
            diff.add(-1., &reference).unwrap();
            diff.values().iter().sum::<f64>()
        };
        // outflow through x = L: no contribution
        assert_abs_diff_eq!(backflow(1.), 0., epsilon = 1e-14);
        // reversed flow: 1.5 |u.n| per component over the unit face
        assert_abs_diff_eq!(backflow(-1.), 3. * 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_partition_invariance_of_operators() {
        let mut serial = setup(small_params());
        serial.assemble(AssemblyMode::FullAssembly).unwrap();

        let n_parts = 3;
        let mut summed: Option<(SparseMatrix, SparseMatrix, Array1<f64>)> = None;
        for rank in 0..n_parts {
            let mesh = channel([2, 1, 1], [2., 1., 1.]).unwrap();
            let mut navier =
                NavierStokes3D::new(mesh, small_params(), DetachedComm::new(rank, n_parts)).unwrap();
            navier.set_initial_condition(&swirl);
            navier.assemble(AssemblyMode::FullAssembly).unwrap();
            summed = Some(match summed {
                None => (navier.stiffness, navier.convection, navier.pressure_mass.diagonal()),
                Some((mut k, mut c, p)) => {
                    k.add(1., &navier.stiffness).unwrap();
                    c.add(1., &navier.convection).unwrap();
                    (k, c, p + navier.pressure_mass.diagonal())
                }
            });
        }
        let (k, c, p) = summed.unwrap();
        for (a, b) in k.values().iter().zip(serial.stiffness.values()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-13);
        }
        for (a, b) in c.values().iter().zip(serial.convection.values()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-13);
        }
        for (a, b) in p.iter().zip(serial.pressure_mass.diagonal().iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-13);
        }
    }
}
