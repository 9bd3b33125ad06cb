//! Simulation parameters
//!
//! Read from a json file, every missing field falls back to the value of
//! the 3D-2 unsteady cylinder benchmark.
use crate::error::{NavierError, Result};
use crate::mesh::BoundaryId;
use crate::solver::{PreconditionerKind, SolverControl};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Time discretization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeScheme {
    /// First order, mass 1/dt in every step
    BackwardEuler,
    /// Second order BDF, started with one backward Euler step
    Bdf2,
}

/// Parabolic inflow profile with a sine ramp in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InletParams {
    /// Peak velocity at the channel center
    pub um: f64,
    /// Channel height (and width)
    pub height: f64,
    /// Ramp `sin(pi t / period)`
    pub period: f64,
}

impl Default for InletParams {
    fn default() -> Self {
        Self {
            um: 2.25,
            height: 0.41,
            period: 8.,
        }
    }
}

/// All parameters of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Polynomial degree of the velocity space
    pub degree_velocity: usize,
    /// Polynomial degree of the pressure space
    pub degree_pressure: usize,
    /// Kinematic viscosity
    pub nu: f64,
    /// Density
    pub rho: f64,
    /// Time step size
    pub deltat: f64,
    /// Final time
    pub t_final: f64,
    /// Block preconditioner, 0 (Yosida) to 3 (aSIMPLE)
    pub preconditioner: PreconditionerKind,
    /// Time discretization
    pub time_scheme: TimeScheme,
    /// Write visualization output every n steps
    pub output_interval: usize,
    /// Forces enter the extrema only after this time
    pub force_warmup: f64,
    /// Absolute residual tolerance of the outer GMRES
    pub tolerance: f64,
    /// Iteration budget of the outer GMRES
    pub max_iter: usize,
    /// Restart length of the outer GMRES
    pub gmres_restart: usize,
    /// Inflow profile
    pub inlet: InletParams,
    /// Boundary id of the inlet
    pub inlet_id: BoundaryId,
    /// Boundary ids with no-slip condition
    pub wall_ids: Vec<BoundaryId>,
    /// Boundary id on which forces are integrated
    pub obstacle_id: BoundaryId,
    /// Reference length (obstacle diameter) of the force coefficients
    pub reference_length: f64,
    /// Reference height of the force coefficients
    pub reference_height: f64,
    /// Points of the pressure difference
    pub pressure_points: [[f64; 3]; 2],
    /// Add the Neumann datum on `neumann_ids` to the right hand side
    pub neumann: bool,
    /// Boundary ids with Neumann datum
    pub neumann_ids: Vec<BoundaryId>,
    /// Backflow stabilization on `outflow_ids`
    pub backflow: bool,
    /// Open boundaries
    pub outflow_ids: Vec<BoundaryId>,
    /// Eliminate Dirichlet columns into the right hand side too
    pub symmetric_elimination: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            degree_velocity: 2,
            degree_pressure: 1,
            nu: 1e-3,
            rho: 1.,
            deltat: 0.01,
            t_final: 8.,
            preconditioner: PreconditionerKind::Yosida,
            time_scheme: TimeScheme::BackwardEuler,
            output_interval: 20,
            force_warmup: 0.1,
            tolerance: 1e-4,
            max_iter: 100_000,
            gmres_restart: 50,
            inlet: InletParams::default(),
            inlet_id: 0,
            wall_ids: vec![2, 3],
            obstacle_id: 3,
            reference_length: 0.1,
            reference_height: 0.41,
            pressure_points: [[0.45, 0.2, 0.205], [0.55, 0.2, 0.205]],
            neumann: false,
            neumann_ids: vec![1],
            backflow: false,
            outflow_ids: vec![1],
            symmetric_elimination: false,
        }
    }
}

impl Params {
    /// Read parameters from json file
    ///
    /// # Errors
    /// File not readable, malformed json (including an invalid
    /// preconditioner selector) or invalid values
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&content)?;
        params.validate()?;
        Ok(params)
    }

    /// Check ranges of all values
    ///
    /// # Errors
    /// First parameter found outside of its admissible range
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("nu", self.nu),
            ("rho", self.rho),
            ("deltat", self.deltat),
            ("tolerance", self.tolerance),
            ("reference_length", self.reference_length),
            ("reference_height", self.reference_height),
        ];
        for (name, value) in positive {
            if !(value > 0.) {
                return Err(NavierError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        for degree in [self.degree_velocity, self.degree_pressure] {
            if !(1..=2).contains(&degree) {
                return Err(NavierError::UnsupportedDegree(degree));
            }
        }
        if self.output_interval == 0 {
            return Err(NavierError::InvalidParameter(
                "output_interval must be at least 1".to_owned(),
            ));
        }
        if self.t_final < 0. {
            return Err(NavierError::InvalidParameter(format!(
                "t_final must not be negative, got {}",
                self.t_final
            )));
        }
        Ok(())
    }

    /// Stopping criteria of the outer solver
    pub fn solver_control(&self) -> SolverControl {
        SolverControl {
            max_iter: self.max_iter,
            tolerance: self.tolerance,
            restart: self.gmres_restart,
        }
    }
}
