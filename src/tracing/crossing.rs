//! Moving a streamline across element faces.

use super::{ftr, StreamFields};
use crate::{
    error::TracingError,
    geometry::Point3,
    mesh::{Mesh, Xi},
};

/// Result of attempting to continue a streamline across an element face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CrossingOutcome<E> {
    /// The streamline continues in the adjacent element.
    Crossed {
        element: E,
        xi: Xi,
        /// The face coordinate permutation that matched.
        permutation: usize,
    },
    /// There is no element across the face.
    MeshBoundary,
    /// None of the face coordinate permutations gave coordinates matching
    /// the point on the face.
    CoordinateMismatch,
    /// The matching adjacent element has no shape.
    MissingShape { element: E },
}

impl<E> CrossingOutcome<E> {
    /// Whether the streamline can continue.
    pub fn crossed(&self) -> bool {
        matches!(self, Self::Crossed { .. })
    }
}

/// Finds the element across the given face and the local coordinates within
/// it of the point the streamline reached on the face.
///
/// Each face coordinate permutation reported by the mesh is tried in order.
/// A permutation is accepted when the world coordinates of the candidate
/// location match `face_point` to within `coordinate_tolerance`, relative to
/// `length_scale`.
///
/// # Parameters
///
/// - `mesh`: Mesh being traced through.
/// - `fields`: Fields being traced through (only coordinates are evaluated).
/// - `element`: Element the streamline is leaving.
/// - `xi`: Local coordinates of the streamline head on the face.
/// - `face`: Face of `element` to cross.
/// - `face_point`: World coordinates of the streamline head.
/// - `length_scale`: Characteristic size of `element`.
/// - `coordinate_tolerance`: Relative tolerance for matching coordinates.
///
/// # Returns
///
/// A `Result` which is either:
///
/// - `Ok`: Contains a `CrossingOutcome`. Only `Crossed` moves the streamline;
/// the other outcomes leave it at the original element location.
/// - `Err`: Contains a `TracingError` if the coordinates could not be evaluated.
#[allow(clippy::too_many_arguments)]
pub fn cross_face<M: Mesh>(
    mesh: &M,
    fields: &StreamFields<M::Element>,
    element: M::Element,
    xi: &Xi,
    face: usize,
    face_point: &Point3<ftr>,
    length_scale: ftr,
    coordinate_tolerance: ftr,
) -> Result<CrossingOutcome<M::Element>, TracingError> {
    let permutation_count = mesh.permutation_count(element, xi, face).max(1);

    for permutation in 0..permutation_count {
        let adjacent = match mesh.adjacent_element(element, xi, face, permutation) {
            Some(adjacent) => adjacent,
            None if permutation == 0 => return Ok(CrossingOutcome::MeshBoundary),
            None => continue,
        };

        let point = fields.evaluate_coordinates(adjacent.element, &adjacent.xi)?;
        let error = point.distance_to(face_point) / length_scale;

        if error <= coordinate_tolerance {
            return Ok(if mesh.shape(adjacent.element).is_some() {
                CrossingOutcome::Crossed {
                    element: adjacent.element,
                    xi: adjacent.xi,
                    permutation,
                }
            } else {
                CrossingOutcome::MissingShape {
                    element: adjacent.element,
                }
            });
        }
        log::trace!(
            "Permutation {} across face {} of {:?} is off by {:e}",
            permutation,
            face,
            element,
            error
        );
    }
    Ok(CrossingOutcome::CoordinateMismatch)
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::{
        geometry::Point3,
        testing::{AnalyticField, BlockCoordinates, BlockMesh},
    };

    const TOLERANCE: ftr = 1e-2;

    fn constant(_element: usize, _point: &Point3<ftr>) -> Vec<ftr> {
        vec![1.0, 0.0, 0.0]
    }

    #[test]
    fn crossing_into_neighbour_keeps_position() {
        let mesh = BlockMesh::new(3, 2);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 3, constant);
        let fields = StreamFields::new(&coordinates, &vectors);

        let xi = Xi::new([1.0, 0.2, 0.7]);
        let point = mesh.position(0, &xi);
        let outcome = cross_face(&mesh, &fields, 0, &xi, 1, &point, 1.0, TOLERANCE).unwrap();
        assert_eq!(
            outcome,
            CrossingOutcome::Crossed {
                element: 1,
                xi: Xi::new([0.0, 0.2, 0.7]),
                permutation: 0
            }
        );
    }

    #[test]
    fn mismatching_permutations_are_skipped() {
        let mesh = BlockMesh::new(3, 2).with_scrambled_faces(2);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 3, constant);
        let fields = StreamFields::new(&coordinates, &vectors);

        let xi = Xi::new([1.0, 0.2, 0.7]);
        let point = mesh.position(0, &xi);
        let first = cross_face(&mesh, &fields, 0, &xi, 1, &point, 1.0, TOLERANCE).unwrap();
        let second = cross_face(&mesh, &fields, 0, &xi, 1, &point, 1.0, TOLERANCE).unwrap();
        assert!(matches!(first, CrossingOutcome::Crossed { permutation: 2, .. }));
        assert_eq!(first, second);
    }

    #[test]
    fn first_matching_permutation_wins() {
        let mesh = BlockMesh::new(3, 2).with_scrambled_faces(2);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 3, constant);
        let fields = StreamFields::new(&coordinates, &vectors);

        // Flipping the face coordinates leaves the face centre in place
        let xi = Xi::new([1.0, 0.5, 0.5]);
        let point = mesh.position(0, &xi);
        let outcome = cross_face(&mesh, &fields, 0, &xi, 1, &point, 1.0, TOLERANCE).unwrap();
        assert!(matches!(outcome, CrossingOutcome::Crossed { permutation: 0, .. }));
    }

    #[test]
    fn outer_face_is_mesh_boundary() {
        let mesh = BlockMesh::new(3, 2);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 3, constant);
        let fields = StreamFields::new(&coordinates, &vectors);

        let xi = Xi::new([1.0, 0.5, 0.5]);
        let point = mesh.position(1, &xi);
        let outcome = cross_face(&mesh, &fields, 1, &xi, 1, &point, 1.0, TOLERANCE).unwrap();
        assert_eq!(outcome, CrossingOutcome::MeshBoundary);
        assert!(!outcome.crossed());
    }

    #[test]
    fn unmatched_coordinates_are_reported() {
        let mesh = BlockMesh::new(3, 2).with_scrambled_faces(1);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 3, constant);
        let fields = StreamFields::new(&coordinates, &vectors);

        let xi = Xi::new([1.0, 0.2, 0.7]);
        let elsewhere = Point3::new(5.0, 5.0, 5.0);
        let outcome = cross_face(&mesh, &fields, 0, &xi, 1, &elsewhere, 1.0, TOLERANCE).unwrap();
        assert_eq!(outcome, CrossingOutcome::CoordinateMismatch);
    }

    #[test]
    fn shapeless_neighbour_is_reported() {
        let mesh = BlockMesh::new(3, 2).with_shapeless_element(1);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 3, constant);
        let fields = StreamFields::new(&coordinates, &vectors);

        let xi = Xi::new([1.0, 0.5, 0.5]);
        let point = mesh.position(0, &xi);
        let outcome = cross_face(&mesh, &fields, 0, &xi, 1, &point, 1.0, TOLERANCE).unwrap();
        assert_eq!(outcome, CrossingOutcome::MissingShape { element: 1 });
    }
}
