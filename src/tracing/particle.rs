//! Interactively movable points and flow particles.
//!
//! A streampoint is a location in the mesh whose world coordinates are kept
//! in a slot owned by the caller. Moving a streampoint converts a world space
//! translation into local coordinate increments, walking into adjacent
//! elements as faces are crossed.

use super::{ftr, linear};
use crate::{
    error::{FieldRole, TracingError},
    geometry::{
        Dim3::{X, Y, Z},
        Point3, Vec3,
    },
    mesh::{ElementShape, Field, Mesh, Xi},
};
use rand::Rng;
use std::fmt;

/// A location that can be moved around in the mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Streampoint<E> {
    pub element: E,
    pub xi: Xi,
}

/// A set of flow particles with their current world positions.
#[derive(Clone, Debug)]
pub struct Particles<E> {
    streampoints: Vec<Streampoint<E>>,
    positions: Vec<Point3<ftr>>,
}

/// Largest number of elements a single translation may walk through.
const MAX_ELEMENT_CHANGES: usize = 256;

/// Half width of the random local coordinate perturbation used when the
/// coordinate Jacobian is singular.
const SINGULAR_PERTURBATION: ftr = 1e-3;

const SINGULAR_TOLERANCE: ftr = 1e-12;

impl<E> Streampoint<E> {
    pub fn new(element: E, xi: Xi) -> Self {
        Self { element, xi }
    }
}

impl<E: Copy> Particles<E> {
    pub fn streampoints(&self) -> &[Streampoint<E>] {
        &self.streampoints
    }

    pub fn positions(&self) -> &[Point3<ftr>] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.streampoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streampoints.is_empty()
    }

    /// Moves every particle by the given world space translation.
    pub fn translate_all<M, R>(
        &mut self,
        mesh: &M,
        coordinate: &dyn Field<E>,
        translation: &Vec3<ftr>,
        rng: &mut R,
    ) -> Result<(), TracingError>
    where
        M: Mesh<Element = E>,
        R: Rng,
    {
        for (streampoint, position) in self.streampoints.iter_mut().zip(&mut self.positions) {
            update_streampoint(mesh, coordinate, streampoint, Some(translation), rng, position)?;
        }
        Ok(())
    }
}

/// Updates a streampoint and writes its world coordinates into the given
/// slot.
///
/// # Parameters
///
/// - `mesh`: Mesh the streampoint lives in.
/// - `coordinate`: World coordinate field, with at most 3 components.
/// - `streampoint`: Streampoint to update. Must be in a 3D element.
/// - `translation`: World space translation to apply, if any. The conversion
///   to local coordinates is linear, so it is only accurate for small
///   translations. Where the coordinate Jacobian is singular the streampoint is
///   instead perturbed randomly by up to 0.001 in each local coordinate.
/// - `rng`: Random number generator for the perturbation.
/// - `slot`: Where to write the world coordinates of the updated streampoint.
///
/// # Returns
///
/// A `Result` which is either:
///
/// - `Ok`: The streampoint and slot were updated.
/// - `Err`: Contains a `TracingError` if the inputs were invalid or the
/// coordinates could not be evaluated. The streampoint is then left unchanged.
pub fn update_streampoint<M, R>(
    mesh: &M,
    coordinate: &dyn Field<M::Element>,
    streampoint: &mut Streampoint<M::Element>,
    translation: Option<&Vec3<ftr>>,
    rng: &mut R,
    slot: &mut Point3<ftr>,
) -> Result<(), TracingError>
where
    M: Mesh,
    R: Rng,
{
    let dimension = mesh.dimension(streampoint.element);
    if dimension != 3 {
        return Err(TracingError::UnsupportedElementDimension(dimension));
    }
    let components = coordinate.number_of_components();
    if components > 3 {
        return Err(TracingError::IncompatibleComponents {
            coordinate: components,
            vector: 3,
            element_dimension: dimension,
        });
    }

    let moved = match translation {
        Some(translation) => translate(mesh, coordinate, streampoint, translation, rng)?,
        None => *streampoint,
    };
    *slot = evaluate_position(coordinate, &moved)?;
    *streampoint = moved;
    Ok(())
}

/// Creates a particle at the given local coordinates in every 3D element
/// accepted by the filter.
pub fn seed_particles<M, I, P>(
    mesh: &M,
    elements: I,
    mut filter: P,
    xi: &Xi,
    coordinate: &dyn Field<M::Element>,
) -> Result<Particles<M::Element>, TracingError>
where
    M: Mesh,
    I: IntoIterator<Item = M::Element>,
    P: FnMut(M::Element) -> bool,
{
    let mut streampoints = Vec::new();
    let mut positions = Vec::new();
    for element in elements {
        if mesh.dimension(element) != 3 || !filter(element) {
            continue;
        }
        let streampoint = Streampoint::new(element, *xi);
        positions.push(evaluate_position(coordinate, &streampoint)?);
        streampoints.push(streampoint);
    }
    log::debug!("Seeded {} particles", streampoints.len());
    Ok(Particles {
        streampoints,
        positions,
    })
}

fn translate<M: Mesh, R: Rng>(
    mesh: &M,
    coordinate: &dyn Field<M::Element>,
    streampoint: &Streampoint<M::Element>,
    translation: &Vec3<ftr>,
    rng: &mut R,
) -> Result<Streampoint<M::Element>, TracingError> {
    let mut element = streampoint.element;
    let mut xi = streampoint.xi;
    let mut remaining = *translation;

    for _ in 0..MAX_ELEMENT_CHANGES {
        let shape = mesh.shape(element).ok_or(TracingError::MissingShape)?;
        let delta_xi = compute_delta_xi(coordinate, element, &xi, &remaining, rng)?;
        let increment = shape.increment_xi(&xi, &delta_xi);
        xi = increment.xi;

        let face = match increment.face {
            Some(face) if increment.fraction < 1.0 => face,
            _ => break,
        };
        remaining = remaining * (1.0 - increment.fraction);
        match mesh.adjacent_element(element, &xi, face, 0) {
            Some(adjacent) => {
                element = adjacent.element;
                xi = adjacent.xi;
            }
            None => break,
        }
    }
    Ok(Streampoint::new(element, xi))
}

fn compute_delta_xi<E: Copy + fmt::Debug, R: Rng>(
    coordinate: &dyn Field<E>,
    element: E,
    xi: &Xi,
    translation: &Vec3<ftr>,
    rng: &mut R,
) -> Result<Xi, TracingError> {
    let values = coordinate
        .evaluate(element, xi, true)
        .map_err(TracingError::field(FieldRole::Coordinate))?;
    let jacobian = values
        .derivatives
        .ok_or(TracingError::MissingCoordinateDerivatives)?;
    let vector = [translation[X], translation[Y], translation[Z]];

    match linear::compute_xi_increment(&vector, &jacobian, SINGULAR_TOLERANCE) {
        Err(TracingError::SingularJacobian) => {
            log::debug!("Singular coordinate Jacobian in {:?}, perturbing streampoint", element);
            Ok(Xi::new([
                rng.random_range(-SINGULAR_PERTURBATION..=SINGULAR_PERTURBATION),
                rng.random_range(-SINGULAR_PERTURBATION..=SINGULAR_PERTURBATION),
                rng.random_range(-SINGULAR_PERTURBATION..=SINGULAR_PERTURBATION),
            ]))
        }
        result => result,
    }
}

fn evaluate_position<E: Copy>(
    coordinate: &dyn Field<E>,
    streampoint: &Streampoint<E>,
) -> Result<Point3<ftr>, TracingError> {
    let values = coordinate
        .evaluate(streampoint.element, &streampoint.xi, false)
        .map_err(TracingError::field(FieldRole::Coordinate))?;
    Ok(Point3::from_slice(&values.values))
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::testing::{BlockCoordinates, BlockMesh};
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn translation_walks_into_neighbouring_elements() {
        let mesh = BlockMesh::new(3, 3);
        let coordinates = BlockCoordinates::new(&mesh);
        let mut rng = StdRng::seed_from_u64(7);

        let mut streampoint = Streampoint::new(0, Xi::new([0.5, 0.5, 0.5]));
        let mut slot = Point3::origin();
        update_streampoint(
            &mesh,
            &coordinates,
            &mut streampoint,
            Some(&Vec3::new(1.2, 0.1, 0.0)),
            &mut rng,
            &mut slot,
        )
        .unwrap();

        assert_eq!(streampoint.element, 1);
        assert_abs_diff_eq!(slot, Point3::new(1.7, 0.6, 0.5), epsilon = 1e-12);
        assert_abs_diff_eq!(streampoint.xi[0], 0.7, epsilon = 1e-12);
    }

    #[test]
    fn translation_stops_at_mesh_boundary() {
        let mesh = BlockMesh::new(3, 2);
        let coordinates = BlockCoordinates::new(&mesh);
        let mut rng = StdRng::seed_from_u64(7);

        let mut streampoint = Streampoint::new(0, Xi::new([0.5, 0.5, 0.5]));
        let mut slot = Point3::origin();
        update_streampoint(
            &mesh,
            &coordinates,
            &mut streampoint,
            Some(&Vec3::new(5.0, 0.0, 0.0)),
            &mut rng,
            &mut slot,
        )
        .unwrap();

        assert_eq!(streampoint.element, 1);
        assert_eq!(streampoint.xi[0], 1.0);
        assert_abs_diff_eq!(slot[X], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn singular_jacobian_perturbs_randomly() {
        // Elements flattened in y have a singular Jacobian
        let mesh = BlockMesh::new(3, 1).with_element_size(Vec3::new(1.0, 0.0, 1.0));
        let coordinates = BlockCoordinates::new(&mesh);
        let mut rng = StdRng::seed_from_u64(42);

        let start = Xi::new([0.5, 0.5, 0.5]);
        let mut streampoint = Streampoint::new(0, start);
        let mut slot = Point3::new(9.0, 9.0, 9.0);
        update_streampoint(
            &mesh,
            &coordinates,
            &mut streampoint,
            Some(&Vec3::new(0.1, 0.0, 0.0)),
            &mut rng,
            &mut slot,
        )
        .unwrap();

        assert_eq!(streampoint.element, 0);
        for idx in 0..3 {
            assert!((streampoint.xi[idx] - start[idx]).abs() <= SINGULAR_PERTURBATION);
        }
        assert_ne!(streampoint.xi, start);
        assert_eq!(slot[Y], 0.0);
        assert_abs_diff_eq!(slot[X], streampoint.xi[0], epsilon = 1e-12);
    }

    #[test]
    fn update_without_translation_only_evaluates() {
        let mesh = BlockMesh::new(3, 1);
        let coordinates = BlockCoordinates::new(&mesh);
        let mut rng = StdRng::seed_from_u64(0);

        let mut streampoint = Streampoint::new(0, Xi::new([0.25, 0.5, 0.75]));
        let mut slot = Point3::origin();
        update_streampoint(&mesh, &coordinates, &mut streampoint, None, &mut rng, &mut slot)
            .unwrap();
        assert_eq!(streampoint.xi, Xi::new([0.25, 0.5, 0.75]));
        assert_abs_diff_eq!(slot, Point3::new(0.25, 0.5, 0.75));
    }

    #[test]
    fn streampoints_require_3d_elements() {
        let mesh = BlockMesh::new(2, 1);
        let coordinates = BlockCoordinates::new(&mesh);
        let mut rng = StdRng::seed_from_u64(0);

        let mut streampoint = Streampoint::new(0, Xi::zero());
        let mut slot = Point3::origin();
        assert!(matches!(
            update_streampoint(&mesh, &coordinates, &mut streampoint, None, &mut rng, &mut slot),
            Err(TracingError::UnsupportedElementDimension(2))
        ));
    }

    #[test]
    fn particles_are_seeded_in_accepted_elements() {
        let mesh = BlockMesh::new(3, 4);
        let coordinates = BlockCoordinates::new(&mesh);
        let mut rng = StdRng::seed_from_u64(3);

        let mut particles = seed_particles(
            &mesh,
            mesh.elements(),
            |element| element % 2 == 1,
            &Xi::new([0.5, 0.5, 0.5]),
            &coordinates,
        )
        .unwrap();
        assert_eq!(particles.len(), 2);
        assert_eq!(particles.streampoints()[0].element, 1);
        assert_abs_diff_eq!(particles.positions()[1], Point3::new(3.5, 0.5, 0.5));

        particles
            .translate_all(&mesh, &coordinates, &Vec3::new(0.0, 0.25, 0.0), &mut rng)
            .unwrap();
        assert_abs_diff_eq!(particles.positions()[0], Point3::new(1.5, 0.75, 0.5), epsilon = 1e-12);
        assert_abs_diff_eq!(particles.positions()[1], Point3::new(3.5, 0.75, 0.5), epsilon = 1e-12);
    }
}
