//! Simple meshes and analytic fields for exercising the tracer.

use crate::{
    error::FieldError,
    geometry::{
        Dim3::{self, X, Y, Z},
        Point3, Vec3,
    },
    mesh::{cube::CubeShape, AdjacentElement, ElementShape, Field, FieldValues, Mesh, Xi},
    tracing::ftr,
};
use nalgebra::DMatrix;
use std::ops::Range;

/// A row of equally sized line, square or cube elements stacked along the
/// x-axis.
///
/// Element `i` spans `[origin_x + i*size_x, origin_x + (i + 1)*size_x]` in x
/// and `[origin, origin + size]` in the other dimensions. Neighbouring
/// elements share the faces normal to x; all other faces lie on the mesh
/// boundary.
#[derive(Clone, Debug)]
pub struct BlockMesh {
    dimension: usize,
    shape: CubeShape,
    number_of_elements: usize,
    origin: Point3<ftr>,
    element_size: Vec3<ftr>,
    scrambled_permutations: usize,
    shapeless_elements: Vec<usize>,
    lower_level_elements: Vec<usize>,
}

impl BlockMesh {
    /// Creates a new row of unit sized elements of the given dimension
    /// starting at the origin.
    pub fn new(dimension: usize, number_of_elements: usize) -> Self {
        Self {
            dimension,
            shape: CubeShape::new(dimension),
            number_of_elements,
            origin: Point3::origin(),
            element_size: Vec3::new(1.0, 1.0, 1.0),
            scrambled_permutations: 0,
            shapeless_elements: Vec::new(),
            lower_level_elements: Vec::new(),
        }
    }

    /// Moves the lower corner of the first element to the given point.
    pub fn with_origin(mut self, origin: Point3<ftr>) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the extent of each element along each axis.
    pub fn with_element_size(mut self, element_size: Vec3<ftr>) -> Self {
        self.element_size = element_size;
        self
    }

    /// Makes the shared faces ambiguous: the given number of face coordinate
    /// permutations (flipping the coordinates tangential to the face) are
    /// reported before the one that actually matches.
    pub fn with_scrambled_faces(mut self, wrong_permutations: usize) -> Self {
        self.scrambled_permutations = wrong_permutations;
        self
    }

    /// Makes the given element lack a shape.
    pub fn with_shapeless_element(mut self, element: usize) -> Self {
        self.shapeless_elements.push(element);
        self
    }

    /// Marks the given element as not being a top-level element.
    pub fn with_lower_level_element(mut self, element: usize) -> Self {
        self.lower_level_elements.push(element);
        self
    }

    pub fn number_of_elements(&self) -> usize {
        self.number_of_elements
    }

    pub fn elements(&self) -> Range<usize> {
        0..self.number_of_elements
    }

    pub fn element_size(&self) -> &Vec3<ftr> {
        &self.element_size
    }

    /// Computes the world position of the given element location.
    pub fn position(&self, element: usize, xi: &Xi) -> Point3<ftr> {
        let size = &self.element_size;
        let xi = xi.truncated(self.dimension);
        Point3::new(
            self.origin[X] + (element as ftr + xi[0]) * size[X],
            self.origin[Y] + xi[1] * size[Y],
            self.origin[Z] + xi[2] * size[Z],
        )
    }

    /// Computes the derivatives of the first `components` world coordinates
    /// with respect to xi.
    pub fn jacobian(&self, components: usize) -> DMatrix<ftr> {
        let sizes = [
            self.element_size[X],
            self.element_size[Y],
            self.element_size[Z],
        ];
        DMatrix::from_fn(components, self.dimension, |row, col| {
            if row == col {
                sizes[row]
            } else {
                0.0
            }
        })
    }

    /// Finds the element and local coordinates of the given world position.
    pub fn locate(&self, point: &Point3<ftr>) -> Option<(usize, Xi)> {
        let relative = point - &self.origin;
        let scaled = [
            relative[X] / self.element_size[X],
            relative[Y] / self.element_size[Y],
            relative[Z] / self.element_size[Z],
        ];
        if scaled[0] < 0.0 || scaled[0] > self.number_of_elements as ftr {
            return None;
        }
        let element = (scaled[0].floor() as usize).min(self.number_of_elements - 1);
        let xi =
            Xi::from_slice(&[scaled[0] - element as ftr, scaled[1], scaled[2]][..self.dimension]);
        if xi.is_in_unit_domain(self.dimension) {
            Some((element, xi))
        } else {
            None
        }
    }

    fn neighbour(&self, element: usize, face: usize) -> Option<usize> {
        if CubeShape::face_axis(face) != 0 {
            return None;
        }
        if CubeShape::face_is_upper(face) {
            Some(element + 1).filter(|&neighbour| neighbour < self.number_of_elements)
        } else {
            element.checked_sub(1)
        }
    }
}

impl Mesh for BlockMesh {
    type Element = usize;
    type Shape = CubeShape;

    fn dimension(&self, _element: usize) -> usize {
        self.dimension
    }

    fn is_top_level(&self, element: usize) -> bool {
        !self.lower_level_elements.contains(&element)
    }

    fn shape(&self, element: usize) -> Option<&CubeShape> {
        if element < self.number_of_elements && !self.shapeless_elements.contains(&element) {
            Some(&self.shape)
        } else {
            None
        }
    }

    fn adjacent_element(
        &self,
        element: usize,
        xi: &Xi,
        face: usize,
        permutation: usize,
    ) -> Option<AdjacentElement<usize>> {
        if permutation > self.scrambled_permutations {
            return None;
        }
        let neighbour = self.neighbour(element, face)?;
        let upper = CubeShape::face_is_upper(face);

        let mut new_xi = *xi;
        new_xi[0] = if upper { 0.0 } else { 1.0 };
        if permutation < self.scrambled_permutations {
            for component in 1..self.shape.dimension() {
                new_xi[component] = 1.0 - new_xi[component];
            }
        }
        Some(AdjacentElement {
            element: neighbour,
            xi: new_xi,
            face: CubeShape::face(0, !upper),
        })
    }

    fn permutation_count(&self, element: usize, _xi: &Xi, face: usize) -> usize {
        if self.neighbour(element, face).is_some() {
            self.scrambled_permutations + 1
        } else {
            0
        }
    }
}

/// The world coordinate field of a `BlockMesh`.
#[derive(Clone, Debug)]
pub struct BlockCoordinates<'a> {
    mesh: &'a BlockMesh,
    components: usize,
}

impl<'a> BlockCoordinates<'a> {
    /// Creates the coordinate field with one component per element
    /// dimension.
    pub fn new(mesh: &'a BlockMesh) -> Self {
        Self {
            mesh,
            components: mesh.dimension,
        }
    }

    /// Creates the coordinate field with the given number of components,
    /// placing e.g. a 2D mesh in the xy-plane of 3D space.
    pub fn with_components(mesh: &'a BlockMesh, components: usize) -> Self {
        Self { mesh, components }
    }
}

impl<'a> Field<usize> for BlockCoordinates<'a> {
    fn number_of_components(&self) -> usize {
        self.components
    }

    fn evaluate(
        &self,
        element: usize,
        xi: &Xi,
        with_derivatives: bool,
    ) -> Result<FieldValues, FieldError> {
        if element >= self.mesh.number_of_elements {
            return Err(FieldError::new(format!("No element {}", element)));
        }
        let position = self.mesh.position(element, xi);
        let values = [position[X], position[Y], position[Z]][..self.components].to_vec();
        Ok(if with_derivatives {
            FieldValues::with_derivatives(values, self.mesh.jacobian(self.components))
        } else {
            FieldValues::new(values)
        })
    }
}

/// A field given by a function of element and world position.
///
/// Derivatives with respect to xi are computed by central differences in
/// world space, chained with the mesh Jacobian.
pub struct AnalyticField<'a, C> {
    mesh: &'a BlockMesh,
    components: usize,
    function: C,
    provides_derivatives: bool,
}

impl<'a, C> AnalyticField<'a, C>
where
    C: Fn(usize, &Point3<ftr>) -> Vec<ftr> + Sync,
{
    const DIFFERENCE_STEP: ftr = 1e-6;

    pub fn new(mesh: &'a BlockMesh, components: usize, function: C) -> Self {
        Self {
            mesh,
            components,
            function,
            provides_derivatives: true,
        }
    }

    /// Makes the field unable to provide derivatives.
    pub fn without_derivatives(mut self) -> Self {
        self.provides_derivatives = false;
        self
    }

    fn derivatives(&self, element: usize, position: &Point3<ftr>) -> DMatrix<ftr> {
        let jacobian = self.mesh.jacobian(3);
        let mut dv_dx = DMatrix::zeros(self.components, 3);
        for dim in Dim3::slice() {
            let offset = Vec3::unit(dim) * Self::DIFFERENCE_STEP;
            let forward = (self.function)(element, &(position + &offset));
            let backward = (self.function)(element, &(*position - offset));
            for (row, (f, b)) in forward.iter().zip(&backward).enumerate().take(self.components) {
                dv_dx[(row, dim.num())] = (f - b) / (2.0 * Self::DIFFERENCE_STEP);
            }
        }
        dv_dx * jacobian
    }
}

impl<'a, C> Field<usize> for AnalyticField<'a, C>
where
    C: Fn(usize, &Point3<ftr>) -> Vec<ftr> + Sync,
{
    fn number_of_components(&self) -> usize {
        self.components
    }

    fn evaluate(
        &self,
        element: usize,
        xi: &Xi,
        with_derivatives: bool,
    ) -> Result<FieldValues, FieldError> {
        if element >= self.mesh.number_of_elements {
            return Err(FieldError::new(format!("No element {}", element)));
        }
        let position = self.mesh.position(element, xi);
        let mut values = (self.function)(element, &position);
        values.resize(self.components, 0.0);
        Ok(if with_derivatives && self.provides_derivatives {
            FieldValues::with_derivatives(values, self.derivatives(element, &position))
        } else {
            FieldValues::new(values)
        })
    }
}

/// A field whose evaluation always fails.
#[derive(Clone, Debug)]
pub struct FailingField {
    components: usize,
}

impl FailingField {
    pub fn new(components: usize) -> Self {
        Self { components }
    }
}

impl Field<usize> for FailingField {
    fn number_of_components(&self) -> usize {
        self.components
    }

    fn evaluate(
        &self,
        element: usize,
        _xi: &Xi,
        _with_derivatives: bool,
    ) -> Result<FieldValues, FieldError> {
        Err(FieldError::new(format!("Cannot evaluate in element {}", element)))
    }
}

/// A field failing in a single element and evaluating like the wrapped
/// field everywhere else.
#[derive(Clone, Debug)]
pub struct FailingInElement<F> {
    field: F,
    failing_element: usize,
}

impl<F> FailingInElement<F> {
    pub fn new(field: F, failing_element: usize) -> Self {
        Self {
            field,
            failing_element,
        }
    }
}

impl<F: Field<usize>> Field<usize> for FailingInElement<F> {
    fn number_of_components(&self) -> usize {
        self.field.number_of_components()
    }

    fn evaluate(
        &self,
        element: usize,
        xi: &Xi,
        with_derivatives: bool,
    ) -> Result<FieldValues, FieldError> {
        if element == self.failing_element {
            Err(FieldError::new(format!("Cannot evaluate in element {}", element)))
        } else {
            self.field.evaluate(element, xi, with_derivatives)
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn neighbouring_elements_share_faces() {
        let mesh = BlockMesh::new(3, 2).with_element_size(Vec3::new(2.0, 1.0, 0.5));
        let xi = Xi::new([1.0, 0.25, 0.75]);
        let adjacent = mesh.adjacent_element(0, &xi, 1, 0).unwrap();
        assert_eq!(adjacent.element, 1);
        assert_eq!(adjacent.face, 0);
        assert_abs_diff_eq!(mesh.position(0, &xi), mesh.position(1, &adjacent.xi));
        assert!(mesh.adjacent_element(1, &adjacent.xi, 1, 0).is_none());
        assert!(mesh.adjacent_element(0, &xi, 3, 0).is_none());
    }

    #[test]
    fn located_positions_map_back() {
        let mesh = BlockMesh::new(2, 3).with_origin(Point3::new(-1.0, 2.0, 0.0));
        let point = Point3::new(0.5, 2.25, 0.0);
        let (element, xi) = mesh.locate(&point).unwrap();
        assert_eq!(element, 1);
        assert_abs_diff_eq!(mesh.position(element, &xi), point, epsilon = 1e-14);
    }

    #[test]
    fn analytic_derivatives_follow_chain_rule() {
        let mesh = BlockMesh::new(3, 1).with_element_size(Vec3::new(2.0, 2.0, 2.0));
        let field = AnalyticField::new(&mesh, 3, |_, p: &Point3<ftr>| {
            vec![p[Y], 0.0, 0.0]
        });
        let values = field.evaluate(0, &Xi::new([0.5, 0.5, 0.5]), true).unwrap();
        let derivatives = values.derivatives.unwrap();
        assert_abs_diff_eq!(derivatives[(0, 1)], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(derivatives[(0, 0)], 0.0, epsilon = 1e-6);
    }
}
