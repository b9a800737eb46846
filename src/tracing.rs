//! Tracing streamlines of vector fields defined on finite element meshes.

pub mod batch;
pub mod crossing;
pub mod frame;
pub mod linear;
pub mod particle;
pub mod ribbon;
pub mod stepping;
pub mod streamline;

use self::{
    ribbon::{StreamSurface, StreamSurfaceShape},
    stepping::SteppingSense,
    streamline::{ColorPolicy, Streamline, StreamlineTracer},
};
use crate::{
    error::{FieldRole, TracingError},
    geometry::Point3,
    mesh::{Field, FieldValues, Mesh, Xi},
};
use nalgebra::DMatrix;

/// Floating-point precision to use for tracing.
#[allow(non_camel_case_types)]
pub type ftr = f64;

/// The fields a streamline is traced through.
pub struct StreamFields<'a, E> {
    /// World coordinate field, with 2 or 3 components.
    pub coordinate: &'a dyn Field<E>,
    /// Stream vector field. The first components give the direction to
    /// trace along; 6 and 9 component fields also carry the lateral ribbon
    /// direction and the ribbon normal.
    pub vector: &'a dyn Field<E>,
}

impl<'a, E> Clone for StreamFields<'a, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, E> Copy for StreamFields<'a, E> {}

impl<'a, E: Copy> StreamFields<'a, E> {
    pub fn new(coordinate: &'a dyn Field<E>, vector: &'a dyn Field<E>) -> Self {
        Self { coordinate, vector }
    }

    /// Evaluates the world coordinates at the given element location.
    pub fn evaluate_coordinates(&self, element: E, xi: &Xi) -> Result<Point3<ftr>, TracingError> {
        let values = self
            .coordinate
            .evaluate(element, xi, false)
            .map_err(TracingError::field(FieldRole::Coordinate))?;
        Ok(Point3::from_slice(&values.values))
    }

    /// Evaluates the world coordinates and their derivatives with respect to
    /// xi at the given element location.
    pub fn evaluate_coordinates_with_jacobian(
        &self,
        element: E,
        xi: &Xi,
    ) -> Result<(Point3<ftr>, DMatrix<ftr>), TracingError> {
        let FieldValues {
            values,
            derivatives,
        } = self
            .coordinate
            .evaluate(element, xi, true)
            .map_err(TracingError::field(FieldRole::Coordinate))?;
        let jacobian = derivatives.ok_or(TracingError::MissingCoordinateDerivatives)?;
        Ok((Point3::from_slice(&values), jacobian))
    }

    /// Evaluates the stream vector field at the given element location.
    pub fn evaluate_vector(
        &self,
        element: E,
        xi: &Xi,
        with_derivatives: bool,
    ) -> Result<FieldValues, TracingError> {
        self.vector
            .evaluate(element, xi, with_derivatives)
            .map_err(TracingError::field(FieldRole::Vector))
    }
}

/// Traces a streamline from the given element location, using the default
/// tracer configuration.
///
/// # Parameters
///
/// - `mesh`: Mesh to trace through.
/// - `element`: Top-level element to start in.
/// - `xi`: Local coordinates of the start position within `element`.
/// - `fields`: Coordinate and stream vector fields.
/// - `color`: What scalar to record along the streamline.
/// - `sense`: Whether to trace along or against the stream vectors.
/// - `length`: Arc length to trace.
///
/// # Returns
///
/// A `Result` which is either:
///
/// - `Ok`: Contains the traced `Streamline`, whose status tells why tracing
/// stopped.
/// - `Err`: Contains a `TracingError` if the inputs were invalid or tracing
/// failed.
pub fn trace_streamline<M: Mesh>(
    mesh: &M,
    element: M::Element,
    xi: &Xi,
    fields: StreamFields<M::Element>,
    color: ColorPolicy<M::Element>,
    sense: SteppingSense,
    length: ftr,
) -> Result<Streamline<M::Element>, TracingError> {
    StreamlineTracer::default().trace(mesh, element, xi, fields, color, sense, length)
}

/// Traces a streamline as for `trace_streamline` and extrudes it into a
/// stream surface with the given cross-section.
///
/// The surface is built from the oriented frame transported along the
/// streamline, with `width` measured along the lateral direction and
/// `thickness` along the ribbon normal.
#[allow(clippy::too_many_arguments)]
pub fn trace_streamribbon<M: Mesh>(
    mesh: &M,
    element: M::Element,
    xi: &Xi,
    fields: StreamFields<M::Element>,
    color: ColorPolicy<M::Element>,
    sense: SteppingSense,
    length: ftr,
    shape: StreamSurfaceShape,
    width: ftr,
    thickness: ftr,
) -> Result<StreamSurface, TracingError> {
    let streamline = trace_streamline(mesh, element, xi, fields, color, sense, length)?;
    Ok(StreamSurface::extrude(&streamline, shape, width, thickness))
}
