//! The `field_core` crate synthesizes smooth N-direction fields on triangle
//! meshes.
//!
//! Key components:
//! - **Mesh**: half-edge topology built from an indexed triangle list, plus its intrinsic metric.
//! - **Connection**: per-half-edge transport between vertex frames, adjusted to realize prescribed singularities.
//! - **Field**: energy assembly and the free, curvature-aligned and fixed-boundary solves.
//! - **Calibration**: bisection on the alignment weight against a target feature value.
//! - **IO**: OBJ meshes in, OBJ field files out.

pub mod calibration;
pub mod connection;
pub mod error;
pub mod field;
pub mod io;
pub mod mesh;
pub mod singularity;
pub mod solvers;
pub mod traits;

#[cfg(test)]
mod fixtures;

pub use calibration::{calibrate, Calibration, CalibrationSettings, SearchState};
pub use connection::Connection;
pub use error::{FieldError, MeshError};
pub use field::{FieldSolution, FieldSynthesizer, SolveMode, SolveSettings};
pub use mesh::{FaceId, Mesh, MeshGeometry, VertexId};
pub use singularity::SingularitySet;
pub use traits::FeatureProbe;
