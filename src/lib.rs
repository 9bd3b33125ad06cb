//! # `rustfem`: Finite element solver for the Navier-Stokes equations
//!
//! # Dependencies
//! - cargo >= v1.62
//! - `hdf5` (sudo apt-get install -y libhdf5-dev), only with feature `hdf5`
//!
//! The mpi version requires the feature `mpi` and additionally
//!
//! - mpi installation
//! - libclang
//!
//! # Details
//!
//! Solves the unsteady incompressible Navier-Stokes equations in 3D on
//! tetrahedral meshes with Taylor-Hood elements (P2 velocity, P1
//! pressure). The time discretization is semi-implicit: convection is
//! linearized around the previous velocity and stabilized in the
//! skew-symmetric form of Temam, so every time step solves one linear
//! saddle point system.
//!
//! The saddle point system is solved with flexible GMRES and one of four
//! block preconditioners, see [`solver::preconditioner`]:
//! - `Yosida` (0)
//! - `SIMPLE` (1)
//! - `aYosida` (2)
//! - `aSIMPLE` (3)
//!
//! Every rank holds the full mesh, assembles its own cells and takes part
//! in the reductions of [`mpi::Comm`].
//!
//! ## Implemented solver
//!
//! - `3-D flow around a cylinder (benchmark 3D-2)`,
//! see [`navier_stokes::navier`]
//!
//! # Example
//! Run the benchmark ( Run with `cargo mpirun --np 2 --features mpi --bin rustfem -- --mesh cylinder.msh` )
//! ```ignore
//! use rustfem::integrate;
//! use rustfem::mesh::gmsh::read_msh;
//! use rustfem::mpi::SerialComm;
//! use rustfem::navier_stokes::{NavierStokes3D, Params};
//!
//! fn main() {
//!     let mesh = read_msh("cylinder.msh").unwrap();
//!     let mut params = Params::default();
//!     params.deltat = 0.01;
//!     let mut navier = NavierStokes3D::new(mesh, params, SerialComm).unwrap();
//!     navier.output_dir = Some("data".into());
//!     integrate(&mut navier, 8., Some(20)).unwrap();
//! }
//! ```
//!
//! ## Postprocess the output
//!
//! Open the `pvtu` files of the output folder in paraview. Forces are
//! appended to `forces.csv`, the final pressure difference to `info.txt`.
//!
//! ## Documentation
//!
//! Download and run:
//!
//! `cargo doc --open`
#![warn(missing_docs)]
#![allow(clippy::unnecessary_cast)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#[macro_use]
extern crate enum_dispatch;
pub mod error;
pub mod fe;
pub mod io;
pub mod mesh;
pub mod mpi;
pub mod navier_stokes;
pub mod solver;
use log::info;

const MAX_TIMESTEP: usize = 10_000_000;

/// Integrate trait, step forward in time, and write results
pub trait Integrate {
    /// Update solution
    ///
    /// # Errors
    /// The time step could not be set up
    fn update(&mut self) -> error::Result<()>;
    /// Receive current time
    fn get_time(&self) -> f64;
    /// Get timestep
    fn get_dt(&self) -> f64;
    /// Callback function (can be used for i/o)
    fn callback(&mut self);
    /// Additional break criteria
    fn exit(&mut self) -> bool;
}

/// Integrate pde, that implements the Integrate trait.
///
/// Specify `save_interval` to call the callback at the start and after
/// every `save_interval` steps.
///
/// Steps are taken while `time < max_time - dt / 2`.
///
/// Stop Criteria:
/// 1. Timestep limit
/// 2. Time limit
/// 3. [`Integrate::exit`]
///
/// Returns the number of steps taken.
///
/// # Errors
/// First failed update
pub fn integrate<T: Integrate>(pde: &mut T, max_time: f64, save_interval: Option<usize>) -> error::Result<usize> {
    let mut timestep: usize = 0;
    if save_interval.is_some() {
        pde.callback();
    }
    while pde.get_time() < max_time - pde.get_dt() / 2. {
        // Update
        pde.update()?;
        timestep += 1;

        // Save
        if let Some(n) = save_interval {
            if n > 0 && timestep % n == 0 {
                pde.callback();
            }
        }

        // Break
        if timestep >= MAX_TIMESTEP {
            info!("timestep limit reached: {:?}", timestep);
            break;
        }
        if pde.exit() {
            info!("break criteria triggered");
            break;
        }
    }
    info!("time limit reached: {:?}", pde.get_time());
    Ok(timestep)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        time: f64,
        dt: f64,
        times: Vec<f64>,
        callbacks: usize,
        nan_after: Option<usize>,
    }

    impl Counter {
        fn new(dt: f64) -> Self {
            Self {
                time: 0.,
                dt,
                times: Vec::new(),
                callbacks: 0,
                nan_after: None,
            }
        }
    }

    impl Integrate for Counter {
        fn update(&mut self) -> error::Result<()> {
            self.time += self.dt;
            self.times.push(self.time);
            Ok(())
        }

        fn get_time(&self) -> f64 {
            self.time
        }

        fn get_dt(&self) -> f64 {
            self.dt
        }

        fn callback(&mut self) {
            self.callbacks += 1;
        }

        fn exit(&mut self) -> bool {
            self.nan_after.map_or(false, |n| self.times.len() >= n)
        }
    }

    #[test]
    fn test_half_step_termination() {
        let mut pde = Counter::new(0.3);
        let steps = integrate(&mut pde, 1.0, None).unwrap();
        assert_eq!(steps, 3);
        assert_eq!(pde.times.len(), 3);
        assert!((pde.time - 0.9).abs() < 1e-12);
        assert_eq!(pde.callbacks, 0);
    }

    #[test]
    fn test_floating_point_accumulation() {
        // 0.01 is not representable, still exactly 2 steps
        let mut pde = Counter::new(0.01);
        assert_eq!(integrate(&mut pde, 0.02, None).unwrap(), 2);
        let mut pde = Counter::new(0.1);
        assert_eq!(integrate(&mut pde, 1.0, None).unwrap(), 10);
    }

    #[test]
    fn test_callback_interval() {
        let mut pde = Counter::new(0.1);
        let steps = integrate(&mut pde, 1.0, Some(4)).unwrap();
        assert_eq!(steps, 10);
        // start, step 4, step 8
        assert_eq!(pde.callbacks, 3);
    }

    #[test]
    fn test_exit_criteria() {
        let mut pde = Counter::new(0.1);
        pde.nan_after = Some(2);
        assert_eq!(integrate(&mut pde, 1.0, None).unwrap(), 2);
    }
}
