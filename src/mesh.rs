//! The interface between the tracer and the finite element mesh and fields
//! it traces through.
//!
//! The mesh, its elements and the fields defined over it are owned by the
//! caller. The tracer only holds shared references to them for the duration
//! of a trace and never modifies them.

pub mod cube;

use crate::{error::FieldError, tracing::ftr};
use nalgebra::DMatrix;
use std::{
    fmt,
    ops::{Add, Index, IndexMut, Mul, Sub},
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Largest topological dimension of an element.
pub const MAX_ELEMENT_DIMENSION: usize = 3;

/// Local (xi) coordinates within an element.
///
/// Components beyond the dimension of the element they belong to are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Xi([ftr; MAX_ELEMENT_DIMENSION]);

impl Xi {
    /// Creates new local coordinates from all three components.
    pub fn new(xi: [ftr; MAX_ELEMENT_DIMENSION]) -> Self {
        Self(xi)
    }

    /// Creates new local coordinates from the given components, padding
    /// missing ones with zero.
    pub fn from_slice(values: &[ftr]) -> Self {
        let mut xi = Self::zero();
        for (component, &value) in xi.0.iter_mut().zip(values) {
            *component = value;
        }
        xi
    }

    /// Creates local coordinates with all components equal to zero.
    pub fn zero() -> Self {
        Self([0.0; MAX_ELEMENT_DIMENSION])
    }

    /// Returns the components as a slice.
    pub fn as_slice(&self) -> &[ftr] {
        &self.0
    }

    /// Computes the Euclidean norm over all components.
    pub fn norm(&self) -> ftr {
        self.0.iter().map(|component| component * component).sum::<ftr>().sqrt()
    }

    /// Whether the first `dimension` components all lie in [0, 1].
    pub fn is_in_unit_domain(&self, dimension: usize) -> bool {
        self.0[..dimension.min(MAX_ELEMENT_DIMENSION)]
            .iter()
            .all(|component| (0.0..=1.0).contains(component))
    }

    /// Returns a copy where all components from `dimension` on are zero.
    pub fn truncated(&self, dimension: usize) -> Self {
        let mut xi = *self;
        for component in xi.0.iter_mut().skip(dimension) {
            *component = 0.0;
        }
        xi
    }
}

impl Index<usize> for Xi {
    type Output = ftr;
    fn index(&self, idx: usize) -> &Self::Output {
        &self.0[idx]
    }
}

impl IndexMut<usize> for Xi {
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.0[idx]
    }
}

impl Add for Xi {
    type Output = Self;
    fn add(self, other: Self) -> Self::Output {
        Self([
            self.0[0] + other.0[0],
            self.0[1] + other.0[1],
            self.0[2] + other.0[2],
        ])
    }
}

impl Sub for Xi {
    type Output = Self;
    fn sub(self, other: Self) -> Self::Output {
        Self([
            self.0[0] - other.0[0],
            self.0[1] - other.0[1],
            self.0[2] - other.0[2],
        ])
    }
}

impl Mul<ftr> for Xi {
    type Output = Self;
    fn mul(self, factor: ftr) -> Self::Output {
        Self([self.0[0] * factor, self.0[1] * factor, self.0[2] * factor])
    }
}

impl fmt::Display for Xi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.0[0], self.0[1], self.0[2])
    }
}

/// Result of incrementing local coordinates within an element shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XiIncrement {
    /// The incremented coordinates, limited to the boundary of the shape.
    pub xi: Xi,
    /// Fraction of the increment that could be taken before a face was hit
    /// (1 if no face was hit).
    pub fraction: ftr,
    /// Face the increment was limited by, if any.
    pub face: Option<usize>,
    /// Local coordinates of the limited position on the face.
    pub face_xi: Xi,
}

impl XiIncrement {
    /// Whether the increment was stopped by a face.
    pub fn hit_face(&self) -> bool {
        self.face.is_some()
    }
}

/// Shape of an element, defining its local coordinate domain and faces.
pub trait ElementShape {
    /// Topological dimension of the shape.
    fn dimension(&self) -> usize;

    /// Adds the increment to the local coordinates.
    ///
    /// If this would take the coordinates out of the shape the increment is
    /// limited to the first face it crosses.
    fn increment_xi(&self, xi: &Xi, increment: &Xi) -> XiIncrement;
}

/// An element adjacent to another across one of its faces, together with
/// the local coordinates of the shared point within it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdjacentElement<E> {
    pub element: E,
    pub xi: Xi,
    /// Face of the new element through which it was entered.
    pub face: usize,
}

/// Topological access to a finite element mesh.
pub trait Mesh {
    /// Handle identifying an element.
    type Element: Copy + Eq + fmt::Debug + Send + Sync;
    /// Shape type of the elements.
    type Shape: ElementShape;

    /// Returns the topological dimension of the element.
    fn dimension(&self, element: Self::Element) -> usize;

    /// Whether the element is a top-level element (rather than a face or line
    /// of another element).
    fn is_top_level(&self, element: Self::Element) -> bool;

    /// Returns the shape of the element, if it has one.
    fn shape(&self, element: Self::Element) -> Option<&Self::Shape>;

    /// Finds the element across the given face of `element` at the boundary
    /// location `xi`, using the given permutation of the face coordinates.
    ///
    /// Returns `None` if there is no element across the face.
    fn adjacent_element(
        &self,
        element: Self::Element,
        xi: &Xi,
        face: usize,
        permutation: usize,
    ) -> Option<AdjacentElement<Self::Element>>;

    /// Returns the number of valid face coordinate permutations when
    /// changing from `element` across `face` at `xi`.
    fn permutation_count(&self, element: Self::Element, xi: &Xi, face: usize) -> usize;
}

/// Values of a field at a location, optionally with their derivatives.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldValues {
    /// Field components.
    pub values: Vec<ftr>,
    /// Derivatives of the components with respect to xi, as a
    /// (number of components) x (element dimension) matrix.
    pub derivatives: Option<DMatrix<ftr>>,
}

impl FieldValues {
    /// Creates field values without derivatives.
    pub fn new(values: Vec<ftr>) -> Self {
        Self {
            values,
            derivatives: None,
        }
    }

    /// Creates field values with derivatives.
    pub fn with_derivatives(values: Vec<ftr>, derivatives: DMatrix<ftr>) -> Self {
        Self {
            values,
            derivatives: Some(derivatives),
        }
    }
}

/// A field defined over the elements of a mesh.
///
/// Evaluations must be free of side effects visible to the tracer, so that
/// several streamlines can be traced through the same field concurrently.
pub trait Field<E>: Sync {
    /// Number of scalar components of the field.
    fn number_of_components(&self) -> usize;

    /// Evaluates the field at the given element location.
    ///
    /// When `with_derivatives` is true the evaluator should supply the
    /// derivatives with respect to xi. An evaluator that cannot compute them
    /// returns the values with `derivatives` set to `None` instead of failing.
    fn evaluate(
        &self,
        element: E,
        xi: &Xi,
        with_derivatives: bool,
    ) -> Result<FieldValues, FieldError>;
}
