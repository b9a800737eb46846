//! Line, square and cube element shapes.

use super::{ElementShape, Xi, XiIncrement, MAX_ELEMENT_DIMENSION};
use crate::tracing::ftr;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Shape of an element whose local coordinates span the unit interval,
/// square or cube.
///
/// Face `2k` is the face where `xi[k] = 0` and face `2k + 1` the face where
/// `xi[k] = 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct CubeShape {
    dimension: usize,
}

impl CubeShape {
    /// Creates a new unit cube shape of the given dimension.
    ///
    /// # Panics
    ///
    /// If the dimension is zero or larger than the maximum element dimension.
    pub fn new(dimension: usize) -> Self {
        assert!(
            (1..=MAX_ELEMENT_DIMENSION).contains(&dimension),
            "Shape dimension must be between 1 and {}",
            MAX_ELEMENT_DIMENSION
        );
        Self { dimension }
    }

    /// Returns the face on the given side of the given axis.
    pub fn face(axis: usize, upper: bool) -> usize {
        2 * axis + usize::from(upper)
    }

    /// Returns the axis normal to the given face.
    pub fn face_axis(face: usize) -> usize {
        face / 2
    }

    /// Whether the given face lies at `xi = 1` along its axis.
    pub fn face_is_upper(face: usize) -> bool {
        face % 2 == 1
    }
}

impl ElementShape for CubeShape {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn increment_xi(&self, xi: &Xi, increment: &Xi) -> XiIncrement {
        let mut limit: Option<(ftr, usize)> = None;

        for axis in 0..self.dimension {
            let start = xi[axis];
            let step = increment[axis];
            let end = start + step;

            let candidate = if end < 0.0 {
                Some(((start / -step).max(0.0), Self::face(axis, false)))
            } else if end > 1.0 {
                Some((((1.0 - start) / step).max(0.0), Self::face(axis, true)))
            } else {
                None
            };

            if let Some((fraction, face)) = candidate {
                if limit.map_or(true, |(smallest, _)| fraction < smallest) {
                    limit = Some((fraction, face));
                }
            }
        }

        match limit {
            None => {
                let new_xi = (*xi + *increment).truncated(self.dimension);
                XiIncrement {
                    xi: new_xi,
                    fraction: 1.0,
                    face: None,
                    face_xi: Xi::zero(),
                }
            }
            Some((fraction, face)) => {
                let axis = Self::face_axis(face);
                let mut new_xi = (*xi + *increment * fraction).truncated(self.dimension);
                for component in 0..self.dimension {
                    new_xi[component] = new_xi[component].clamp(0.0, 1.0);
                }
                new_xi[axis] = if Self::face_is_upper(face) { 1.0 } else { 0.0 };

                let remaining: Vec<ftr> = (0..self.dimension)
                    .filter(|&component| component != axis)
                    .map(|component| new_xi[component])
                    .collect();

                XiIncrement {
                    xi: new_xi,
                    fraction,
                    face: Some(face),
                    face_xi: Xi::from_slice(&remaining),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn interior_increment_is_taken_in_full() {
        let shape = CubeShape::new(3);
        let result = shape.increment_xi(&Xi::new([0.5, 0.5, 0.5]), &Xi::new([0.1, -0.2, 0.3]));
        assert!(!result.hit_face());
        assert_eq!(result.fraction, 1.0);
        assert_abs_diff_eq!(result.xi[0], 0.6, epsilon = 1e-15);
        assert_abs_diff_eq!(result.xi[1], 0.3, epsilon = 1e-15);
        assert_abs_diff_eq!(result.xi[2], 0.8, epsilon = 1e-15);
    }

    #[test]
    fn increment_is_clipped_to_first_face() {
        let shape = CubeShape::new(2);
        let result = shape.increment_xi(&Xi::new([0.8, 0.5, 0.0]), &Xi::new([0.4, 0.1, 0.0]));
        assert_eq!(result.face, Some(1));
        assert_abs_diff_eq!(result.fraction, 0.5, epsilon = 1e-12);
        assert_eq!(result.xi[0], 1.0);
        assert_abs_diff_eq!(result.xi[1], 0.55, epsilon = 1e-12);
        assert_abs_diff_eq!(result.face_xi[0], 0.55, epsilon = 1e-12);
    }

    #[test]
    fn closest_face_wins_when_several_are_crossed() {
        let shape = CubeShape::new(2);
        let result = shape.increment_xi(&Xi::new([0.5, 0.1, 0.0]), &Xi::new([1.0, -1.0, 0.0]));
        assert_eq!(result.face, Some(CubeShape::face(1, false)));
        assert_abs_diff_eq!(result.fraction, 0.1, epsilon = 1e-12);
        assert_eq!(result.xi[1], 0.0);
    }

    #[test]
    fn moving_outwards_from_boundary_gives_zero_fraction() {
        let shape = CubeShape::new(3);
        let result = shape.increment_xi(&Xi::new([1.0, 0.5, 0.5]), &Xi::new([0.1, 0.0, 0.0]));
        assert_eq!(result.face, Some(1));
        assert_eq!(result.fraction, 0.0);
        assert_eq!(result.xi, Xi::new([1.0, 0.5, 0.5]));
    }

    #[test]
    fn reaching_boundary_exactly_is_inside() {
        let shape = CubeShape::new(2);
        let result = shape.increment_xi(&Xi::new([0.5, 0.5, 0.0]), &Xi::new([0.5, 0.0, 0.0]));
        assert!(!result.hit_face());
        assert_eq!(result.xi[0], 1.0);
    }
}
