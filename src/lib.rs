//! The `fe_streamlines` crate traces streamlines and streamribbons of vector
//! fields defined over finite element meshes.
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod num;
pub mod tracing;
pub mod verbosity;

#[cfg(any(test, feature = "for-testing"))]
pub mod testing;
