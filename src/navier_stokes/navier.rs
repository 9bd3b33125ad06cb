//! # Direct numerical simulation
//! Solver for the 3-dimensional unsteady incompressible Navier-Stokes
//! equations with Taylor-Hood elements.
//!
//! The convective velocity is taken from previous steps, so every time
//! step leaves one linear saddle point system
//! ```text
//! | M + K + C(u)  B01 | | u |   | f |
//! |     B10        0  | | p | = | 0 |
//! ```
//! which is solved with GMRES and one of the block preconditioners of
//! [`crate::solver::preconditioner`].
//!
//! # Example
//! Flow around the cylinder of the 3D-2 benchmark
//! ```ignore
//! use rustfem::mesh::gmsh::read_msh;
//! use rustfem::mpi::SerialComm;
//! use rustfem::navier_stokes::{NavierStokes3D, Params};
//!
//! fn main() {
//!     let mesh = read_msh("mesh/cylinder.msh").unwrap();
//!     let params = Params::default();
//!     let mut navier = NavierStokes3D::new(mesh, params, SerialComm).unwrap();
//!     navier.output_dir = Some("output".into());
//!     navier.run().unwrap();
//! }
//! ```
use super::assembly::AssemblyMode;
use super::boundary_conditions::{DirichletCondition, InletVelocity, VectorFunction, ZeroFunction};
use super::params::{Params, TimeScheme};
use crate::error::Result;
use crate::fe::{DofHandler, FaceQuadrature, FaceValues, FeValues, LagrangeTet, Quadrature};
use crate::mesh::partition::partition_cells;
use crate::mesh::Mesh;
use crate::mpi::Comm;
use crate::solver::{gmres, SaddlePointBlocks, SolveStats, SparseMatrix};
use crate::{integrate, Integrate};
use log::{info, warn};
use nalgebra::Point3;
use ndarray::{s, Array1};
use std::path::PathBuf;
use std::time::Instant;

/// Wall clock times of the linear solver in seconds, one entry per step
#[derive(Debug, Clone, Default)]
pub struct Timings {
    /// Construction of the preconditioner
    pub preconditioner: Vec<f64>,
    /// GMRES solve
    pub solve: Vec<f64>,
}

impl Timings {
    fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            0.
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }

    /// Mean preconditioner construction time
    pub fn mean_preconditioner(&self) -> f64 {
        Self::mean(&self.preconditioner)
    }

    /// Mean solve time
    pub fn mean_solve(&self) -> f64 {
        Self::mean(&self.solve)
    }
}

/// Solve 3-dimensional Navier-Stokes equations
pub struct NavierStokes3D<C: Comm> {
    /// Tetrahedral mesh, identical on all ranks
    pub(crate) mesh: Mesh,
    /// Numbering and ownership of the dofs
    pub(crate) dofs: DofHandler,
    /// Parameters of the run
    pub(crate) params: Params,
    /// Communicator
    pub(crate) comm: C,
    /// Velocity mass matrix, scaled with the time derivative coefficient
    pub(crate) mass: SparseMatrix,
    /// Viscous term
    pub(crate) stiffness: SparseMatrix,
    /// Linearized convection with skew-symmetric correction
    pub(crate) convection: SparseMatrix,
    /// Pressure gradient and divergence blocks
    pub(crate) coupling: SparseMatrix,
    /// Matrix of the linear system
    pub(crate) system: SparseMatrix,
    /// Pressure mass, scaled by 1/nu
    pub(crate) pressure_mass: SparseMatrix,
    /// Right hand side of the linear system
    pub(crate) rhs: Array1<f64>,
    /// Solution read by assembly and post-processing
    pub(crate) solution: Array1<f64>,
    /// Solution written by the linear solver
    pub(crate) solution_owned: Array1<f64>,
    /// Solution of the previous time step
    pub(crate) previous_solution: Array1<f64>,
    /// Mass, stiffness and coupling hold the current discretization
    pub(crate) operators_assembled: bool,
    /// Inflow profile, also defines the mean velocity of the coefficients
    pub(crate) inlet: InletVelocity,
    /// Velocity boundary conditions, later entries win on shared nodes
    pub(crate) dirichlet: Vec<DirichletCondition>,
    /// Volume force
    pub(crate) forcing: Box<dyn VectorFunction>,
    /// Traction on the Neumann boundaries
    pub(crate) neumann_data: Box<dyn VectorFunction>,
    /// Time
    pub time: f64,
    /// Number of time steps taken
    pub time_step: usize,
    /// Solver timings
    pub timings: Timings,
    /// Maximum drag coefficient after the warm-up time
    pub c_d_max: f64,
    /// Minimum lift coefficient after the warm-up time
    pub c_l_min: f64,
    /// Pressure difference between the pressure points, set in the last step
    pub pressure_difference: Option<f64>,
    /// Outcome of the last linear solve
    pub last_solve: Option<SolveStats>,
    /// Folder for visualization and force history, no output if `None`
    pub output_dir: Option<PathBuf>,
}

impl<C: Comm> NavierStokes3D<C> {
    /// Distribute `mesh` over the ranks of `comm` and set up all
    /// operators. The solution starts at rest.
    ///
    /// Dirichlet conditions default to the inlet profile on
    /// `params.inlet_id` and no-slip on `params.wall_ids`.
    ///
    /// # Errors
    /// Invalid parameters or unsupported element degrees
    pub fn new(mesh: Mesh, params: Params, comm: C) -> Result<Self> {
        params.validate()?;
        let fe_u = LagrangeTet::new(params.degree_velocity)?;
        let fe_p = LagrangeTet::new(params.degree_pressure)?;
        let owner = partition_cells(&mesh, comm.size());
        let dofs = DofHandler::new(&mesh, fe_u, fe_p, owner, comm.rank())?;

        // pressure-pressure coupling only lives in the pressure mass
        let system_pattern = dofs.sparsity_pattern(|bi, bj| !(bi == 1 && bj == 1))?;
        let pressure_pattern = dofs.sparsity_pattern(|bi, bj| bi == 1 && bj == 1)?;

        let partition = dofs.partition();
        info!(
            "Number of DoFs: velocity = {}, pressure = {}, total = {}",
            partition.n_u,
            partition.n_p,
            partition.size()
        );
        info!(
            "Locally owned: {} cells, {} dofs on rank {} of {}",
            dofs.locally_owned_cells().count(),
            dofs.locally_owned_dofs().n_elements(),
            comm.rank(),
            comm.size()
        );

        let inlet = InletVelocity::new(params.inlet);
        let dirichlet = vec![
            DirichletCondition::new(vec![params.inlet_id], inlet),
            DirichletCondition::new(params.wall_ids.clone(), ZeroFunction),
        ];
        let zeros = partition.zeros();
        Ok(Self {
            mesh,
            mass: SparseMatrix::new(&system_pattern),
            stiffness: SparseMatrix::new(&system_pattern),
            convection: SparseMatrix::new(&system_pattern),
            coupling: SparseMatrix::new(&system_pattern),
            system: SparseMatrix::new(&system_pattern),
            pressure_mass: SparseMatrix::new(&pressure_pattern),
            rhs: zeros.clone(),
            solution: zeros.clone(),
            solution_owned: zeros.clone(),
            previous_solution: zeros,
            operators_assembled: false,
            dofs,
            params,
            comm,
            inlet,
            dirichlet,
            forcing: Box::new(ZeroFunction),
            neumann_data: Box::new(ZeroFunction),
            time: 0.,
            time_step: 0,
            timings: Timings::default(),
            c_d_max: f64::NEG_INFINITY,
            c_l_min: f64::INFINITY,
            pressure_difference: None,
            last_solve: None,
            output_dir: None,
        })
    }

    /// Replace all velocity boundary conditions
    pub fn with_dirichlet(mut self, conditions: Vec<DirichletCondition>) -> Self {
        self.dirichlet = conditions;
        self
    }

    /// Set the volume force
    pub fn with_forcing<F: VectorFunction + 'static>(mut self, forcing: F) -> Self {
        self.forcing = Box::new(forcing);
        self
    }

    /// Set the traction used on `params.neumann_ids`
    pub fn with_neumann_data<F: VectorFunction + 'static>(mut self, data: F) -> Self {
        self.neumann_data = Box::new(data);
        self
    }

    /// Mesh
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Dof handler
    pub fn dof_handler(&self) -> &DofHandler {
        &self.dofs
    }

    /// Parameters
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Communicator
    pub fn comm(&self) -> &C {
        &self.comm
    }

    /// Current solution, velocity block followed by pressure block
    pub fn solution(&self) -> &Array1<f64> {
        &self.solution
    }

    /// Matrix of the linear system, after boundary conditions
    pub fn system_matrix(&self) -> &SparseMatrix {
        &self.system
    }

    /// Right hand side of the linear system, after boundary conditions
    pub fn rhs(&self) -> &Array1<f64> {
        &self.rhs
    }

    /// Velocity mass matrix
    pub fn mass_matrix(&self) -> &SparseMatrix {
        &self.mass
    }

    /// Stiffness matrix
    pub fn stiffness_matrix(&self) -> &SparseMatrix {
        &self.stiffness
    }

    /// Convection matrix of the last assembly
    pub fn convection_matrix(&self) -> &SparseMatrix {
        &self.convection
    }

    /// Pressure coupling blocks
    pub fn coupling_matrix(&self) -> &SparseMatrix {
        &self.coupling
    }

    /// Pressure mass matrix
    pub fn pressure_mass_matrix(&self) -> &SparseMatrix {
        &self.pressure_mass
    }

    /// Values and gradients on cells
    pub(crate) fn cell_values(&self) -> FeValues {
        FeValues::new(
            self.dofs.fe_velocity(),
            self.dofs.fe_pressure(),
            Quadrature::gauss_simplex(self.params.degree_velocity + 2),
        )
    }

    /// Values and gradients on cell faces
    pub(crate) fn face_values(&self) -> FaceValues {
        FaceValues::new(
            self.dofs.fe_velocity(),
            self.dofs.fe_pressure(),
            FaceQuadrature::gauss_simplex(self.params.degree_velocity + 2),
        )
    }

    /// Interpolate `velocity` and `pressure` at the support points
    pub fn interpolate<F, P>(&self, velocity: &F, pressure: P, t: f64) -> Array1<f64>
    where
        F: VectorFunction + ?Sized,
        P: Fn(&Point3<f64>) -> f64,
    {
        let mut v = self.dofs.partition().zeros();
        for node in 0..self.dofs.n_velocity_nodes() {
            let u = velocity.value(self.dofs.velocity_support_point(node), t);
            for comp in 0..3 {
                v[self.dofs.velocity_dof(comp, node)] = u[comp];
            }
        }
        for node in 0..self.dofs.n_pressure_nodes() {
            v[self.dofs.pressure_dof(node)] = pressure(self.dofs.pressure_support_point(node));
        }
        v
    }

    /// Replace the solution, e.g. to restart
    ///
    /// # Panics
    /// `solution` does not have one entry per dof
    pub fn set_solution(&mut self, solution: Array1<f64>) {
        assert_eq!(solution.len(), self.dofs.n_dofs(), "solution size mismatch");
        self.solution_owned.assign(&solution);
        self.previous_solution.assign(&solution);
        self.solution = solution;
    }

    /// Initial velocity, pressure zero
    pub fn set_initial_condition<F: VectorFunction + ?Sized>(&mut self, u0: &F) {
        info!("Applying the initial condition");
        let v = self.interpolate(u0, |_| 0., self.time);
        self.set_solution(v);
    }

    /// Assembly mode of the current step.
    ///
    /// Operators are rebuilt from scratch until a full assembly has run,
    /// e.g. after restarting from a snapshot.
    pub fn assembly_mode(&self) -> AssemblyMode {
        if !self.operators_assembled {
            return AssemblyMode::FullAssembly;
        }
        match (self.time_step, self.params.time_scheme) {
            (0, _) | (1, _) => AssemblyMode::FullAssembly,
            (2, TimeScheme::Bdf2) => AssemblyMode::IncrementalStepWithMassRestart,
            _ => AssemblyMode::IncrementalStep,
        }
    }

    /// Second order history is available from the second step on
    pub(crate) fn bdf2_active(&self) -> bool {
        self.params.time_scheme == TimeScheme::Bdf2 && self.time_step >= 2
    }

    /// No further step follows the current one
    pub(crate) fn is_final_step(&self) -> bool {
        !(self.time < self.params.t_final - 0.5 * self.params.deltat)
    }

    /// Build the preconditioner and solve the assembled system.
    ///
    /// The previous solution is replaced by the current one first.
    pub fn solve_time_step(&mut self) -> SolveStats {
        self.previous_solution.assign(&self.solution);
        let partition = self.dofs.partition();

        let timer = Instant::now();
        let blocks = SaddlePointBlocks::from_system(&self.system, partition);
        let mass_diagonal = self.mass.diagonal().slice(s![..partition.n_u]).to_owned();
        let preconditioner = self.params.preconditioner.build(blocks, &mass_diagonal);
        let elapsed = timer.elapsed().as_secs_f64();
        info!(
            "Time taken to initialize {} preconditioner: {:.4} seconds",
            self.params.preconditioner, elapsed
        );
        self.timings.preconditioner.push(elapsed);

        let timer = Instant::now();
        let stats = gmres(
            &self.system,
            &mut self.solution_owned,
            &self.rhs,
            &preconditioner,
            &self.params.solver_control(),
        );
        let elapsed = timer.elapsed().as_secs_f64();
        info!("Time taken to solve Navier Stokes problem: {:.4} seconds", elapsed);
        self.timings.solve.push(elapsed);

        if stats.converged {
            info!("Result: {} GMRES iterations", stats.iterations);
        } else {
            warn!(
                "GMRES did not converge in {} iterations, residual {:.3e}",
                stats.iterations, stats.residual
            );
        }
        self.solution.assign(&self.solution_owned);
        self.last_solve = Some(stats);
        stats
    }

    /// Maximum drag and minimum lift coefficient, `None` before any step
    /// passed the warm-up time
    pub fn force_extrema(&self) -> Option<(f64, f64)> {
        if self.c_d_max.is_finite() && self.c_l_min.is_finite() {
            Some((self.c_d_max, self.c_l_min))
        } else {
            None
        }
    }

    /// Integrate up to `t_final`, writing output every `output_interval`
    /// steps, and report the force extrema.
    ///
    /// # Errors
    /// Assembly failed
    pub fn run(&mut self) -> Result<usize> {
        let (t_final, interval) = (self.params.t_final, self.params.output_interval);
        let steps = integrate(self, t_final, Some(interval))?;
        match self.force_extrema() {
            Some((c_d_max, c_l_min)) => {
                info!("Drag Coefficient Max ----->   {:.6e}", c_d_max);
                info!("Lift Coefficient Min ----->   {:.6e}", c_l_min);
            }
            None => info!(
                "No forces recorded, t = {} never passed the warm-up time {}",
                self.time, self.params.force_warmup
            ),
        }
        info!(
            "Mean time preconditioner: {:.4} s, mean time solve: {:.4} s",
            self.timings.mean_preconditioner(),
            self.timings.mean_solve()
        );
        Ok(steps)
    }
}

impl<C: Comm> Integrate for NavierStokes3D<C> {
    /// Update 1 timestep
    fn update(&mut self) -> Result<()> {
        self.time += self.params.deltat;
        self.time_step += 1;
        info!("n = {:>5}, t = {:>8.4}", self.time_step, self.time);

        self.assemble(self.assembly_mode())?;
        self.solve_time_step();

        if self.is_final_step() {
            self.pressure_difference = self.compute_pressure_difference();
            if let Some(dp) = self.pressure_difference {
                self.write_pressure_difference_unwrap(dp);
            }
        }
        // the flow starts at rest, skip the initial transient
        if self.time > self.params.force_warmup {
            let forces = self.compute_forces();
            self.c_d_max = self.c_d_max.max(forces.c_d);
            self.c_l_min = self.c_l_min.min(forces.c_l);
            self.write_forces_unwrap(&forces);
        }
        Ok(())
    }

    fn get_time(&self) -> f64 {
        self.time
    }

    fn get_dt(&self) -> f64 {
        self.params.deltat
    }

    fn callback(&mut self) {
        self.write_output_unwrap();
    }

    fn exit(&mut self) -> bool {
        // Break if solution is nan
        self.solution.iter().any(|v| v.is_nan())
    }
}
