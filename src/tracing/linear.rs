//! Conversion of world space displacements into local element coordinates.

use super::ftr;
use crate::{error::TracingError, mesh::Xi, num};
use nalgebra::{DMatrix, DVector};

/// Computes the local coordinate increment `delta_xi` satisfying
/// `jacobian * delta_xi = vector`.
///
/// # Parameters
///
/// - `vector`: World space vector. Only the first `m` components are used,
/// where `m` is the number of rows in the Jacobian.
/// - `jacobian`: Derivatives of the world coordinates with respect to xi, as
/// an `m` x `d` matrix where `d` is the element dimension.
/// - `singular_tolerance`: Smallest magnitude a pivot of the LU decomposition
/// may have before the system is considered singular.
///
/// # Returns
///
/// A `Result` which is either:
///
/// - `Ok`: Contains the increment, with components beyond `d` set to zero.
/// - `Err`: Contains `TracingError::UnderdeterminedSystem` if `m < d` or
/// `TracingError::SingularJacobian` if the system could not be solved.
///
/// When `m > d` the system is solved in the least squares sense through the
/// normal equations.
pub fn compute_xi_increment(
    vector: &[ftr],
    jacobian: &DMatrix<ftr>,
    singular_tolerance: ftr,
) -> Result<Xi, TracingError> {
    let vector_dimension = jacobian.nrows();
    let element_dimension = jacobian.ncols();

    if vector_dimension < element_dimension || vector.len() < vector_dimension {
        return Err(TracingError::UnderdeterminedSystem {
            vector_dimension: vector_dimension.min(vector.len()),
            element_dimension,
        });
    }

    let rhs = DVector::from_column_slice(&vector[..vector_dimension]);

    let (matrix, rhs) = if vector_dimension == element_dimension {
        (jacobian.clone(), rhs)
    } else {
        let transposed = jacobian.transpose();
        (&transposed * jacobian, &transposed * rhs)
    };

    let lu = matrix.lu();
    let u = lu.u();
    for idx in 0..element_dimension {
        num::nonvanishing(u[(idx, idx)], singular_tolerance)
            .ok_or(TracingError::SingularJacobian)?;
    }
    let solution = lu.solve(&rhs).ok_or(TracingError::SingularJacobian)?;

    Ok(Xi::from_slice(solution.as_slice()))
}

/// Computes the characteristic length of an element at the point where the
/// Jacobian was evaluated, as the root of the squared Jacobian entries summed
/// and averaged over the element dimensions.
pub fn compute_length_scale(jacobian: &DMatrix<ftr>) -> ftr {
    let element_dimension = jacobian.ncols().max(1);
    (jacobian.iter().map(|entry| entry * entry).sum::<ftr>() / element_dimension as ftr).sqrt()
}
