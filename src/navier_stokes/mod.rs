//! Navier--Stokes solver on tetrahedral meshes (mpi supported)
pub mod assembly;
pub mod boundary_conditions;
pub mod functions;
pub mod navier;
pub mod navier_io;
pub mod params;
pub use assembly::AssemblyMode;
pub use boundary_conditions::{DirichletCondition, InletVelocity, VectorFunction, ZeroFunction};
pub use functions::Forces;
pub use navier::{NavierStokes3D, Timings};
pub use params::{InletParams, Params, TimeScheme};
