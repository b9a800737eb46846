//! Errors produced while tracing streamlines.

use crate::{mesh::Xi, tracing::ftr};
use std::{collections::TryReserveError, fmt};
use thiserror::Error;

/// Which of the fields taking part in a trace an evaluation failed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRole {
    Coordinate,
    Vector,
    Color,
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Coordinate => "coordinate",
                Self::Vector => "stream vector",
                Self::Color => "color data",
            }
        )
    }
}

/// Failure reported by a field evaluator.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{message}")]
pub struct FieldError {
    message: String,
}

impl FieldError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure aborting the trace of a single streamline.
///
/// Running into the mesh boundary, getting trapped or failing to match
/// coordinates across a face are not errors; they are reported through
/// `StreamlineStatus` on an otherwise valid streamline.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("Starting element is not a top-level element")]
    NotTopLevel,
    #[error("Element dimension {0} is not supported (must be 2 or 3)")]
    UnsupportedElementDimension(usize),
    #[error("Local coordinates {0:?} are outside [0, 1]")]
    XiOutOfRange(Xi),
    #[error("Streamline length must be larger than zero (got {0})")]
    NonPositiveLength(ftr),
    #[error(
        "Incompatible number of components: {coordinate} coordinate and {vector} stream vector \
         components on a {element_dimension}D element"
    )]
    IncompatibleComponents {
        coordinate: usize,
        vector: usize,
        element_dimension: usize,
    },
    #[error("Color data field must have a single component (has {0})")]
    InvalidColorField(usize),
    #[error("Starting element has no shape")]
    MissingStartShape,
    #[error("Element has no shape")]
    MissingShape,
    #[error(
        "Cannot convert a {vector_dimension}-component vector to xi on a \
         {element_dimension}D element (underdetermined system)"
    )]
    UnderdeterminedSystem {
        vector_dimension: usize,
        element_dimension: usize,
    },
    #[error("Jacobian is singular")]
    SingularJacobian,
    #[error("Could not evaluate {role} field: {source}")]
    FieldEvaluationFailed {
        role: FieldRole,
        #[source]
        source: FieldError,
    },
    #[error("Coordinate field derivatives are unavailable")]
    MissingCoordinateDerivatives,
    #[error("Could not allocate space for {requested} streamline samples")]
    AllocationFailed {
        requested: usize,
        #[source]
        source: TryReserveError,
    },
}

impl TracingError {
    /// Wraps a field evaluation failure for the field with the given role.
    pub fn field(role: FieldRole) -> impl FnOnce(FieldError) -> Self {
        move |source| Self::FieldEvaluationFailed { role, source }
    }

    /// Whether the error stems from validating the trace inputs, which
    /// happens before any field evaluation.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::NotTopLevel
                | Self::UnsupportedElementDimension(_)
                | Self::XiOutOfRange(_)
                | Self::NonPositiveLength(_)
                | Self::IncompatibleComponents { .. }
                | Self::InvalidColorField(_)
                | Self::MissingStartShape
        )
    }
}
