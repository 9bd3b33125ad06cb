//! Collection of io routines
//!
//! Visualization output is written as `vtu` pieces with a `pvtu` record,
//! snapshots for restarts are `hdf5` files (feature `hdf5`).
#[cfg(feature = "hdf5")]
pub mod read_write_hdf5;
pub mod vtu;
pub use vtu::{write_pvtu, DataArray, UnstructuredGrid};
