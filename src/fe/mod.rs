//! # Finite element building blocks
//!
//! Quadrature rules, Lagrange elements on tetrahedra, their values on
//! physical cells and faces, and the numbering of the degrees of freedom
//! of the mixed velocity/pressure space.
pub mod dof;
pub mod element;
pub mod quadrature;
pub mod values;
pub use dof::{DofHandler, IndexSet};
pub use element::LagrangeTet;
pub use quadrature::{FaceQuadrature, Quadrature};
pub use values::{reference_point, FaceValues, FeValues, ShapeData};
