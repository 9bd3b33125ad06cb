//! Some useful post-processing functions
use super::boundary_conditions::VectorFunction;
use super::navier::NavierStokes3D;
use crate::fe::{reference_point, ShapeData};
use crate::mpi::Comm;
use log::info;
use nalgebra::{Point3, Vector3};

/// Tolerance (in reference coordinates) of the point location
const POINT_TOLERANCE: f64 = 1e-10;

/// Forces on the obstacle and their coefficients
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Forces {
    /// Force in x direction
    pub drag: f64,
    /// Force in y direction, sign as in the 3D-2 benchmark
    pub lift: f64,
    /// Drag coefficient
    pub c_d: f64,
    /// Lift coefficient
    pub c_l: f64,
}

impl<C: Comm> NavierStokes3D<C> {
    /// Integrate drag and lift over the faces with `params.obstacle_id`
    /// and normalize them with `rho U^2 D H / 2`, `U` the mean inflow
    /// velocity at the current time.
    ///
    /// Collective, the result is identical on all ranks.
    pub fn compute_forces(&self) -> Forces {
        let (rho, nu) = (self.params.rho, self.params.nu);
        let mut face = self.face_values();
        let (mut drag, mut lift) = (0., 0.);
        for c in self.dofs.locally_owned_cells() {
            if !self.mesh.at_boundary(c) {
                continue;
            }
            for f in 0..4 {
                if self.mesh.face_boundary_id(c, f) != Some(self.params.obstacle_id) {
                    continue;
                }
                face.reinit(&self.mesh, c, f);
                let dofs = self.dofs.cell_dofs(c);
                let gradients = face.velocity_gradients(&dofs, &self.solution);
                let pressure = face.pressure_values(&dofs, &self.solution);

                // normal pointing into the obstacle
                let n = -face.normal();
                let (nx, ny) = (n.x, n.y);
                let tangent = Vector3::new(ny, -nx, 0.);
                let norm_square = tangent.norm_squared();
                let tangent = if norm_square > 0. {
                    tangent / norm_square
                } else {
                    Vector3::zeros()
                };
                for q in 0..face.n_quadrature_points() {
                    let shear = rho * nu * n.dot(&(gradients[q] * tangent));
                    drag += (shear * ny - pressure[q] * nx) * face.jxw(q);
                    lift -= (shear * nx + pressure[q] * ny) * face.jxw(q);
                }
            }
        }
        let drag = self.comm.sum(drag);
        let lift = self.comm.sum(lift);

        let mean = self.inlet.mean_velocity(self.time);
        let scale = rho * mean * mean * self.params.reference_length * self.params.reference_height;
        let (c_d, c_l) = if scale.abs() > f64::EPSILON {
            (2. * drag / scale, 2. * lift / scale)
        } else {
            (0., 0.)
        };
        info!("Drag: {:.6e}, Lift: {:.6e}", drag, lift);
        info!("Coeff: {:.6e}, Coeff: {:.6e}", c_d, c_l);
        Forces { drag, lift, c_d, c_l }
    }

    /// Velocity and pressure at `x`, if a locally owned cell contains it
    pub fn point_value(&self, x: &Point3<f64>) -> Option<(Vector3<f64>, f64)> {
        let (c, xi) = self
            .dofs
            .locally_owned_cells()
            .find_map(|c| reference_point(&self.mesh, c, x, POINT_TOLERANCE).map(|xi| (c, xi)))?;
        let values_u = self.dofs.fe_velocity().values(&xi);
        let values_p = self.dofs.fe_pressure().values(&xi);
        let mut u = Vector3::zeros();
        for (phi, &node) in values_u.iter().zip(self.dofs.cell_velocity_nodes(c)) {
            for comp in 0..3 {
                u[comp] += phi * self.solution[self.dofs.velocity_dof(comp, node)];
            }
        }
        let p: f64 = values_p
            .iter()
            .zip(self.dofs.cell_pressure_nodes(c))
            .map(|(psi, &node)| psi * self.solution[self.dofs.pressure_dof(node)])
            .sum();
        Some((u, p))
    }

    /// Pressure at `x` reduced to rank 0; `-inf` marks ranks that do not
    /// own the point, and 0 is returned if no rank does.
    fn pressure_at(&self, x: &Point3<f64>) -> f64 {
        let local = self.point_value(x).map_or(f64::NEG_INFINITY, |(_, p)| p);
        let global = self.comm.max_to_root(local);
        if global == f64::NEG_INFINITY {
            0.
        } else {
            global
        }
    }

    /// Pressure difference between the two pressure points.
    ///
    /// Collective, `Some` on rank 0 only.
    pub fn compute_pressure_difference(&self) -> Option<f64> {
        let [a, b] = self.params.pressure_points;
        let pa = self.pressure_at(&Point3::from(a));
        let pb = self.pressure_at(&Point3::from(b));
        self.comm.barrier();
        if self.comm.is_root() {
            let dp = pa - pb;
            info!("Pressure difference: {:.6e}", dp);
            Some(dp)
        } else {
            None
        }
    }

    /// L2 norm of the velocity error against `exact` at the current time
    ///
    /// Collective, the result is identical on all ranks.
    pub fn velocity_l2_error<F: VectorFunction + ?Sized>(&self, exact: &F) -> f64 {
        let mut fe = self.cell_values();
        let mut error = 0.;
        for c in self.dofs.locally_owned_cells() {
            fe.reinit(&self.mesh, c);
            let dofs = self.dofs.cell_dofs(c);
            let u = fe.velocity_values(&dofs, &self.solution);
            for (q, uq) in u.iter().enumerate() {
                let diff = uq - exact.value(fe.point(q), self.time);
                error += diff.norm_squared() * fe.jxw(q);
            }
        }
        self.comm.sum(error).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generator::channel;
    use crate::mpi::{DetachedComm, SerialComm};
    use crate::navier_stokes::navier::tests::small_params;
    use crate::navier_stokes::{AssemblyMode, DirichletCondition, Params};
    use crate::solver::PreconditionerKind;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn linear_pressure(p: &Point3<f64>) -> f64 {
        1. + 2. * p.x - p.y + 0.5 * p.z
    }

    #[test]
    fn test_point_value() {
        let mesh = channel([2, 1, 1], [2., 1., 1.]).unwrap();
        let mut navier = NavierStokes3D::new(mesh, small_params(), SerialComm).unwrap();
        let velocity = |p: &Point3<f64>, _: f64| Vector3::new(p.x * p.y, p.z * p.z, 1.);
        let v = navier.interpolate(&velocity, linear_pressure, 0.);
        navier.set_solution(v);
        let x = Point3::new(0.7, 0.3, 0.55);
        let (u, p) = navier.point_value(&x).unwrap();
        assert_abs_diff_eq!(p, linear_pressure(&x), epsilon = 1e-12);
        assert_abs_diff_eq!(u, velocity(&x, 0.), epsilon = 1e-12);
        assert!(navier.point_value(&Point3::new(3., 0.5, 0.5)).is_none());
    }

    #[test]
    fn test_forces_vanish_at_rest_under_constant_pressure() {
        let mesh = channel([2, 1, 1], [2., 1., 1.]).unwrap();
        let mut navier = NavierStokes3D::new(mesh, small_params(), SerialComm).unwrap();
        navier.time = 4.;
        let v = navier.interpolate(&|_: &Point3<f64>, _: f64| Vector3::zeros(), |_| 3., 0.);
        navier.set_solution(v);
        let forces = navier.compute_forces();
        // opposite walls cancel
        assert_abs_diff_eq!(forces.drag, 0., epsilon = 1e-12);
        assert_abs_diff_eq!(forces.lift, 0., epsilon = 1e-12);
        assert_abs_diff_eq!(forces.c_d, 0., epsilon = 1e-10);
        assert_abs_diff_eq!(forces.c_l, 0., epsilon = 1e-10);
    }

    #[test]
    fn test_coefficients_vanish_without_inflow() {
        let mesh = channel([1, 1, 1], [1., 1., 1.]).unwrap();
        let navier = NavierStokes3D::new(mesh, small_params(), SerialComm).unwrap();
        // sin(0) = 0, no mean velocity yet
        let forces = navier.compute_forces();
        assert_eq!(forces.c_d, 0.);
        assert_eq!(forces.c_l, 0.);
    }

    fn set_linear_pressure<C: Comm>(navier: &mut NavierStokes3D<C>) {
        let v = navier.interpolate(&|_: &Point3<f64>, _: f64| Vector3::zeros(), linear_pressure, 0.);
        navier.set_solution(v);
    }

    #[test]
    fn test_pressure_difference_is_partition_invariant() {
        let mut params = small_params();
        params.pressure_points = [[0.3, 0.4, 0.45], [1.7, 0.6, 0.2]];
        let mesh = channel([4, 2, 2], [2., 1., 1.]).unwrap();
        let mut serial = NavierStokes3D::new(mesh, params.clone(), SerialComm).unwrap();
        set_linear_pressure(&mut serial);
        let expected = serial.compute_pressure_difference().unwrap();
        let [a, b] = params.pressure_points;
        assert_abs_diff_eq!(
            expected,
            linear_pressure(&Point3::from(a)) - linear_pressure(&Point3::from(b)),
            epsilon = 1e-12
        );

        // emulate the max reduction over the partitions by hand
        let n_parts = 4;
        let (mut pa, mut pb) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        let mut owners = (Vec::new(), Vec::new());
        for rank in 0..n_parts {
            let mesh = channel([4, 2, 2], [2., 1., 1.]).unwrap();
            let mut navier =
                NavierStokes3D::new(mesh, params.clone(), DetachedComm::new(rank, n_parts)).unwrap();
            set_linear_pressure(&mut navier);
            if let Some((_, p)) = navier.point_value(&Point3::from(a)) {
                pa = pa.max(p);
                owners.0.push(rank);
            }
            if let Some((_, p)) = navier.point_value(&Point3::from(b)) {
                pb = pb.max(p);
                owners.1.push(rank);
            }
            // only the root reports
            assert_eq!(navier.compute_pressure_difference().is_some(), rank == 0);
        }
        assert_ne!(owners.0, owners.1);
        assert_abs_diff_eq!(pa - pb, expected, epsilon = 1e-12);
    }

    fn exact_velocity(p: &Point3<f64>, _t: f64) -> Vector3<f64> {
        Vector3::new((PI * p.y).sin(), (PI * p.z).sin(), (PI * p.x).sin())
    }

    fn exact_pressure(p: &Point3<f64>) -> f64 {
        (PI * p.x).cos()
    }

    /// Velocity error of one full assembly solve, started from the
    /// interpolated solution, for a steady manufactured flow
    fn manufactured_error(n: usize) -> f64 {
        let nu = 1.;
        let params = Params {
            nu,
            deltat: 1e6,
            t_final: 1e6,
            tolerance: 1e-10,
            max_iter: 10_000,
            gmres_restart: 200,
            preconditioner: PreconditionerKind::Simple,
            neumann: true,
            neumann_ids: vec![1],
            ..Params::default()
        };
        let forcing = move |p: &Point3<f64>, t: f64| {
            let (x, y, z) = (PI * p.x, PI * p.y, PI * p.z);
            let convection = Vector3::new(PI * z.sin() * y.cos(), PI * x.sin() * z.cos(), PI * y.sin() * x.cos());
            let pressure_gradient = Vector3::new(-PI * x.sin(), 0., 0.);
            convection + exact_velocity(p, t) * nu * PI * PI + pressure_gradient
        };
        // nu du/dn - p n on x = 2
        let traction = move |p: &Point3<f64>, _: f64| {
            Vector3::new(-exact_pressure(p), 0., nu * PI * (PI * p.x).cos())
        };
        let mesh = channel([2 * n, n, n], [2., 1., 1.]).unwrap();
        let mut navier = NavierStokes3D::new(mesh, params, SerialComm)
            .unwrap()
            .with_dirichlet(vec![DirichletCondition::new(vec![0, 2], exact_velocity)])
            .with_forcing(forcing)
            .with_neumann_data(traction);
        navier.set_initial_condition(&exact_velocity);
        navier.assemble(AssemblyMode::FullAssembly).unwrap();
        let stats = navier.solve_time_step();
        assert!(stats.converged);
        navier.velocity_l2_error(&exact_velocity)
    }

    #[test]
    fn test_manufactured_solution_converges() {
        let coarse = manufactured_error(2);
        let fine = manufactured_error(4);
        assert!(fine < coarse);
        assert!(coarse / fine > 3.5, "rate {}", coarse / fine);
    }
}
