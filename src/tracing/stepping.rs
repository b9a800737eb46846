//! Adaptive stepping along streamlines in local element coordinates.

use super::{ftr, linear, StreamFields};
use crate::{
    error::TracingError,
    geometry::Point3,
    mesh::{ElementShape, Mesh, Xi},
};
use nalgebra::DMatrix;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Stepping along the streamline in the same direction as the field or opposite.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum SteppingSense {
    Same,
    Opposite,
}

impl SteppingSense {
    /// Returns 1 for `Same` and -1 for `Opposite`.
    pub fn sign(self) -> ftr {
        match self {
            Self::Same => 1.0,
            Self::Opposite => -1.0,
        }
    }

    /// Orients the given value according to the sense.
    pub fn orient(self, value: ftr) -> ftr {
        match self {
            Self::Same => value,
            Self::Opposite => -value,
        }
    }
}

/// A stepper result which is either OK (with an arbitrary value) or stopped (with a cause).
#[derive(Clone, Debug)]
pub enum StepperResult<T> {
    Ok(T),
    Stopped(StoppingCause),
}

/// Reason for terminating stepping.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StoppingCause {
    /// The stream vector has no component within the element.
    Stalled,
    /// No acceptable step was found within the allowed number of attempts.
    TooManyAttempts,
    /// The coordinate Jacobian is singular somewhere along the step.
    SingularJacobian,
}

/// Lets a tracing callback communicate whether tracing should
/// continue or terminate.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StepperInstruction {
    Continue,
    Terminate,
}

/// Configuration parameters for the adaptive stepper.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct StepperConfig {
    /// Largest accepted discrepancy between the coarse and refined step
    /// end points in local coordinates.
    pub xi_tolerance: ftr,
    /// Largest accepted deviation of the refined step midpoint from the
    /// straight line between its end points, relative to the element size.
    pub coordinate_tolerance: ftr,
    /// Magnitude of the local coordinate displacement of the first step,
    /// converted to an arc length through the local coordinate speed.
    pub initial_xi_step: ftr,
    /// Local coordinate displacement below which a step is accepted
    /// regardless of its local coordinate error.
    pub negligible_xi_step: ftr,
    /// Fraction added to a step clipped at a face so that the refined step
    /// still reaches the face.
    pub boundary_overshoot: ftr,
    /// The step size is doubled when the local coordinate error is below
    /// this fraction of the tolerance.
    pub growth_threshold: ftr,
    /// Maximum number of step attempts before terminating.
    pub max_step_attempts: u32,
    /// Smallest pivot magnitude accepted when solving for local coordinate
    /// increments.
    pub singular_tolerance: ftr,
}

/// Mutable state of a streamline being traced.
#[derive(Clone, Debug, PartialEq)]
pub struct IntegrationState<E> {
    /// Element currently containing the streamline head.
    pub element: E,
    /// Local coordinates of the streamline head.
    pub xi: Xi,
    /// World arc length of the step to attempt next, or zero if no step
    /// has been taken yet.
    pub step_size: ftr,
    /// Accumulated world arc length.
    pub arc_length: ftr,
}

/// Summary of an accepted step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepReport {
    /// World arc length of the step that was taken.
    pub accepted_step_size: ftr,
    /// Step size that will be attempted next.
    pub next_step_size: ftr,
    /// Face of the current element the step ended on, if any.
    pub face: Option<usize>,
    /// Number of attempts needed to find an acceptable step.
    pub attempts: u32,
    /// Local coordinate error estimate of the accepted step.
    pub xi_error: ftr,
    /// Relative world coordinate error estimate of the accepted step.
    pub coordinate_error: ftr,
    /// World coordinates at the end of the step.
    pub end_point: Point3<ftr>,
    /// Characteristic size of the element at the start of the step.
    pub length_scale: ftr,
}

/// Stepper using the improved Euler (Heun) method with step doubling for
/// error estimation.
#[derive(Clone, Debug)]
pub struct HeunStepper {
    config: StepperConfig,
}

struct XiVelocity {
    point: Point3<ftr>,
    jacobian: DMatrix<ftr>,
    delta_xi: Xi,
}

impl StepperConfig {
    pub const DEFAULT_XI_TOLERANCE: ftr = 1e-4;
    pub const DEFAULT_COORDINATE_TOLERANCE: ftr = 1e-2;
    pub const DEFAULT_INITIAL_XI_STEP: ftr = 1e-2;
    pub const DEFAULT_NEGLIGIBLE_XI_STEP: ftr = 1e-3;
    pub const DEFAULT_BOUNDARY_OVERSHOOT: ftr = 1e-3;
    pub const DEFAULT_GROWTH_THRESHOLD: ftr = 0.1;
    pub const DEFAULT_MAX_STEP_ATTEMPTS: u32 = 64;
    pub const DEFAULT_SINGULAR_TOLERANCE: ftr = 1e-12;

    /// Panics if any of the parameters are out of range.
    pub fn validate(&self) {
        assert!(
            self.xi_tolerance > 0.0,
            "Local coordinate tolerance must be larger than zero."
        );
        assert!(
            self.coordinate_tolerance > 0.0,
            "Coordinate tolerance must be larger than zero."
        );
        assert!(
            self.initial_xi_step > 0.0 && self.initial_xi_step <= 1.0,
            "Initial local coordinate step must be in the range (0, 1]."
        );
        assert!(
            self.negligible_xi_step >= 0.0,
            "Negligible local coordinate step must be larger than or equal to zero."
        );
        assert!(
            self.boundary_overshoot >= 0.0,
            "Boundary overshoot must be larger than or equal to zero."
        );
        assert!(
            self.growth_threshold > 0.0 && self.growth_threshold <= 1.0,
            "Growth threshold must be in the range (0, 1]."
        );
        assert!(
            self.max_step_attempts > 0,
            "Maximum number of step attempts must be larger than zero."
        );
        assert!(
            self.singular_tolerance >= 0.0,
            "Singular tolerance must be larger than or equal to zero."
        );
    }
}

impl Default for StepperConfig {
    fn default() -> Self {
        StepperConfig {
            xi_tolerance: Self::DEFAULT_XI_TOLERANCE,
            coordinate_tolerance: Self::DEFAULT_COORDINATE_TOLERANCE,
            initial_xi_step: Self::DEFAULT_INITIAL_XI_STEP,
            negligible_xi_step: Self::DEFAULT_NEGLIGIBLE_XI_STEP,
            boundary_overshoot: Self::DEFAULT_BOUNDARY_OVERSHOOT,
            growth_threshold: Self::DEFAULT_GROWTH_THRESHOLD,
            max_step_attempts: Self::DEFAULT_MAX_STEP_ATTEMPTS,
            singular_tolerance: Self::DEFAULT_SINGULAR_TOLERANCE,
        }
    }
}

impl<E> IntegrationState<E> {
    /// Creates a new state at the given location, before any step.
    pub fn new(element: E, xi: Xi) -> Self {
        Self {
            element,
            xi,
            step_size: 0.0,
            arc_length: 0.0,
        }
    }
}

impl HeunStepper {
    /// Creates a new stepper with the given configuration.
    pub fn new(config: StepperConfig) -> Self {
        config.validate();
        Self { config }
    }

    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    /// Performs one adaptive step from the current state.
    ///
    /// A coarse step is compared against two half steps, and the step size
    /// is halved until the discrepancy is within tolerance. Steps are clipped
    /// at the faces of the current element; a step ending on a face is
    /// reported through `StepReport::face` with the state left on that face.
    /// Step sizes are world arc lengths, since the stream vectors are
    /// normalized before being converted to local coordinates.
    ///
    /// A singular coordinate Jacobian stops stepping with
    /// `StoppingCause::SingularJacobian` and leaves the state untouched.
    ///
    /// # Parameters
    ///
    /// - `mesh`: Mesh being traced through.
    /// - `fields`: Coordinate and stream vector fields.
    /// - `state`: State to advance.
    /// - `sense`: Whether to step along or against the stream vectors.
    /// - `max_step_size`: Largest step size to take (the remaining arc length).
    ///
    /// # Returns
    ///
    /// A `Result` which is either:
    ///
    /// - `Ok`: Contains a `StepperResult<StepReport>`, which is either the
    /// report of the accepted step or the cause of stopping.
    /// - `Err`: Contains the `TracingError` that prevented the step.
    pub fn step<M: Mesh>(
        &self,
        mesh: &M,
        fields: &StreamFields<M::Element>,
        state: &mut IntegrationState<M::Element>,
        sense: SteppingSense,
        max_step_size: ftr,
    ) -> Result<StepperResult<StepReport>, TracingError> {
        match self.try_step(mesh, fields, state, sense, max_step_size) {
            Err(TracingError::SingularJacobian) => {
                Ok(StepperResult::Stopped(StoppingCause::SingularJacobian))
            }
            result => result,
        }
    }

    fn try_step<M: Mesh>(
        &self,
        mesh: &M,
        fields: &StreamFields<M::Element>,
        state: &mut IntegrationState<M::Element>,
        sense: SteppingSense,
        max_step_size: ftr,
    ) -> Result<StepperResult<StepReport>, TracingError> {
        let config = &self.config;
        let element = state.element;
        let xi = state.xi;

        let shape = mesh.shape(element).ok_or(TracingError::MissingShape)?;
        let dimension = shape.dimension();

        let start = self.compute_xi_velocity(fields, element, &xi, sense)?;
        let length_scale = linear::compute_length_scale(&start.jacobian);

        let xi_speed = start.delta_xi.norm();
        if xi_speed == 0.0 {
            return Ok(StepperResult::Stopped(StoppingCause::Stalled));
        }

        let mut step_size = if state.step_size > 0.0 {
            state.step_size
        } else {
            config.initial_xi_step / xi_speed
        };
        if max_step_size > 0.0 {
            step_size = step_size.min(max_step_size);
        }

        // Full step, used as the reference for the error estimate
        let predictor = shape.increment_xi(&xi, &(start.delta_xi * step_size));
        let predicted = self.compute_xi_velocity(fields, element, &predictor.xi, sense)?;
        let coarse = shape.increment_xi(
            &xi,
            &((start.delta_xi + predicted.delta_xi) * (0.5 * step_size)),
        );
        let mut coarse_xi = coarse.xi;

        if coarse.hit_face() {
            if coarse.fraction <= 0.0 && !stays_on_boundary(&coarse.xi, &xi, dimension) {
                let end_point = fields.evaluate_coordinates(element, &coarse.xi)?;
                state.xi = coarse.xi;
                return Ok(StepperResult::Ok(StepReport {
                    accepted_step_size: 0.0,
                    next_step_size: state.step_size,
                    face: coarse.face,
                    attempts: 0,
                    xi_error: 0.0,
                    coordinate_error: 0.0,
                    end_point,
                    length_scale,
                }));
            }
            // Shorten the step so that it just reaches the face, plus a bit
            // to make the refined step reach it too
            step_size *= coarse.fraction + config.boundary_overshoot;
        }

        let mut attempts = 0;
        loop {
            if attempts >= config.max_step_attempts {
                return Ok(StepperResult::Stopped(StoppingCause::TooManyAttempts));
            }
            attempts += 1;

            let half_predictor =
                shape.increment_xi(&xi, &(start.delta_xi * (0.5 * step_size)));
            let half = self.compute_xi_velocity(fields, element, &half_predictor.xi, sense)?;
            let first_half = shape.increment_xi(
                &xi,
                &((start.delta_xi + half.delta_xi) * (0.25 * step_size)),
            );

            let mut mid_xi = first_half.xi;
            let mut face = first_half.face;

            // Starting on a face and heading out through it with the half step
            // while the full step moved inwards: continue from the full step
            if face.is_some() && !coarse.hit_face() && stays_on_boundary(&mid_xi, &xi, dimension)
            {
                face = None;
                mid_xi = coarse_xi;
            }

            let (end_xi, mid_point, end_point, end_fraction) = if face.is_none() {
                let mid = self.compute_xi_velocity(fields, element, &mid_xi, sense)?;
                let second_predictor =
                    shape.increment_xi(&mid_xi, &(mid.delta_xi * (0.5 * step_size)));
                let second =
                    self.compute_xi_velocity(fields, element, &second_predictor.xi, sense)?;
                let second_half = shape.increment_xi(
                    &mid_xi,
                    &((mid.delta_xi + second.delta_xi) * (0.25 * step_size)),
                );
                face = second_half.face;
                if second_half.hit_face() {
                    step_size *= 0.5 * (1.0 + second_half.fraction);
                }
                let end_point = fields.evaluate_coordinates(element, &second_half.xi)?;
                (second_half.xi, mid.point, end_point, second_half.fraction)
            } else {
                step_size *= 0.5 * first_half.fraction;
                let halfway = xi + (mid_xi - xi) * 0.5;
                let mid_point = fields.evaluate_coordinates(element, &halfway)?;
                let end_point = fields.evaluate_coordinates(element, &mid_xi)?;
                (mid_xi, mid_point, end_point, 1.0)
            };

            // Deviation of the midpoint from where it would lie if the
            // streamline were straight over the step
            let expected_mid_point = (start.point.to_vec3() * end_fraction + end_point.to_vec3())
                / (1.0 + end_fraction);
            let coordinate_error =
                (mid_point.to_vec3() - expected_mid_point).length() / length_scale;

            let mut xi_error = (end_xi - coarse_xi).norm();
            if step_size * half.delta_xi.norm() < config.negligible_xi_step {
                xi_error = 0.0;
            }

            if xi_error > config.xi_tolerance || coordinate_error > config.coordinate_tolerance {
                log::trace!(
                    "Rejected step of size {} (xi error {:e}, coordinate error {:e})",
                    step_size,
                    xi_error,
                    coordinate_error
                );
                step_size *= 0.5;
                coarse_xi = mid_xi;
                continue;
            }

            state.xi = end_xi;
            state.arc_length += step_size;
            let accepted_step_size = step_size;

            if face.is_none() {
                if xi_error < config.xi_tolerance * config.growth_threshold {
                    step_size *= 2.0;
                }
                state.step_size = step_size;
            }

            return Ok(StepperResult::Ok(StepReport {
                accepted_step_size,
                next_step_size: state.step_size,
                face,
                attempts,
                xi_error,
                coordinate_error,
                end_point,
                length_scale,
            }));
        }
    }

    fn compute_xi_velocity<E: Copy>(
        &self,
        fields: &StreamFields<E>,
        element: E,
        xi: &Xi,
        sense: SteppingSense,
    ) -> Result<XiVelocity, TracingError> {
        let (point, jacobian) = fields.evaluate_coordinates_with_jacobian(element, xi)?;
        let mut vector = fields.evaluate_vector(element, xi, false)?.values;
        vector.truncate(jacobian.nrows());
        let magnitude = vector.iter().map(|component| component * component).sum::<ftr>().sqrt();
        let scale = if magnitude > 0.0 {
            sense.sign() / magnitude
        } else {
            sense.sign()
        };
        for component in vector.iter_mut() {
            *component *= scale;
        }
        let delta_xi =
            linear::compute_xi_increment(&vector, &jacobian, self.config.singular_tolerance)?;
        Ok(XiVelocity {
            point,
            jacobian,
            delta_xi,
        })
    }
}

impl Default for HeunStepper {
    fn default() -> Self {
        Self::new(StepperConfig::default())
    }
}

/// Whether `candidate` remained at a face coordinate of `start` (a local
/// coordinate equal to 0 or 1) without moving off it.
fn stays_on_boundary(candidate: &Xi, start: &Xi, dimension: usize) -> bool {
    (0..dimension)
        .any(|idx| candidate[idx] == start[idx] && (start[idx] == 0.0 || start[idx] == 1.0))
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::{
        geometry::{
            Dim3::{X, Y, Z},
            Point3, Vec3,
        },
        testing::{AnalyticField, BlockCoordinates, BlockMesh},
    };
    use approx::assert_abs_diff_eq;

    fn uniform_x(_element: usize, _point: &Point3<ftr>) -> Vec<ftr> {
        vec![1.0, 0.0, 0.0]
    }

    fn rotation(_element: usize, p: &Point3<ftr>) -> Vec<ftr> {
        vec![-(p[Y] - 0.5), p[X] - 0.5]
    }

    fn accepted(result: Result<StepperResult<StepReport>, TracingError>) -> StepReport {
        match result.unwrap() {
            StepperResult::Ok(report) => report,
            StepperResult::Stopped(cause) => panic!("Stopped: {:?}", cause),
        }
    }

    #[test]
    fn first_step_has_initial_xi_magnitude_and_then_doubles() {
        let mesh = BlockMesh::new(3, 1);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 3, uniform_x);
        let fields = StreamFields::new(&coordinates, &vectors);
        let stepper = HeunStepper::default();

        let mut state = IntegrationState::new(0, Xi::new([0.5, 0.5, 0.5]));
        let report = accepted(stepper.step(&mesh, &fields, &mut state, SteppingSense::Same, 1.0));
        assert_abs_diff_eq!(report.accepted_step_size, 0.01, epsilon = 1e-14);
        assert_abs_diff_eq!(report.next_step_size, 0.02, epsilon = 1e-14);
        assert_eq!(report.face, None);
        assert_eq!(report.attempts, 1);
        assert_abs_diff_eq!(state.xi[0], 0.51, epsilon = 1e-14);
        assert_abs_diff_eq!(state.arc_length, 0.01, epsilon = 1e-14);
        assert_abs_diff_eq!(report.end_point[X], 0.51, epsilon = 1e-14);
    }

    #[test]
    fn opposite_sense_steps_backwards() {
        let mesh = BlockMesh::new(3, 1);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 3, uniform_x);
        let fields = StreamFields::new(&coordinates, &vectors);
        let stepper = HeunStepper::default();

        let mut state = IntegrationState::new(0, Xi::new([0.5, 0.5, 0.5]));
        stepper
            .step(&mesh, &fields, &mut state, SteppingSense::Opposite, 1.0)
            .unwrap();
        assert_abs_diff_eq!(state.xi[0], 0.49, epsilon = 1e-14);
        assert!(state.arc_length > 0.0);
    }

    #[test]
    fn step_is_clamped_to_max_step_size() {
        let mesh = BlockMesh::new(3, 1);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 3, uniform_x);
        let fields = StreamFields::new(&coordinates, &vectors);
        let stepper = HeunStepper::default();

        let mut state = IntegrationState::new(0, Xi::new([0.2, 0.5, 0.5]));
        state.step_size = 0.5;
        stepper
            .step(&mesh, &fields, &mut state, SteppingSense::Same, 0.05)
            .unwrap();
        assert_abs_diff_eq!(state.arc_length, 0.05, epsilon = 1e-14);
        assert_abs_diff_eq!(state.xi[0], 0.25, epsilon = 1e-14);
    }

    #[test]
    fn step_reaching_face_stops_on_it() {
        let mesh = BlockMesh::new(3, 1);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 3, uniform_x);
        let fields = StreamFields::new(&coordinates, &vectors);
        let stepper = HeunStepper::default();

        let mut state = IntegrationState::new(0, Xi::new([0.9, 0.5, 0.5]));
        state.step_size = 0.3;
        let report = accepted(stepper.step(&mesh, &fields, &mut state, SteppingSense::Same, 10.0));
        assert_eq!(report.face, Some(1));
        assert_eq!(state.xi[0], 1.0);
        assert_abs_diff_eq!(state.arc_length, 0.1, epsilon = 1e-9);
        // Step size is kept when stopping at a face
        assert_eq!(state.step_size, 0.3);
    }

    #[test]
    fn curved_field_rejects_too_large_steps() {
        let mesh = BlockMesh::new(2, 1);
        let coordinates = BlockCoordinates::new(&mesh);
        // Rotation about (0.5, 0.5)
        let vectors = AnalyticField::new(&mesh, 2, |_, p: &Point3<ftr>| {
            let r = Vec3::new(p[X] - 0.5, p[Y] - 0.5, 0.0);
            vec![-r[Y], r[X]]
        });
        let fields = StreamFields::new(&coordinates, &vectors);
        let stepper = HeunStepper::default();

        let mut state = IntegrationState::new(0, Xi::new([0.8, 0.5, 0.0]));
        state.step_size = 0.6;
        let report = accepted(stepper.step(&mesh, &fields, &mut state, SteppingSense::Same, 10.0));
        assert!(report.attempts > 1);
        assert!(report.accepted_step_size < 0.6);
        assert!(report.xi_error <= StepperConfig::DEFAULT_XI_TOLERANCE);
        // Stays on the circle of radius 0.3 within the error tolerance
        let radius = ((state.xi[0] - 0.5).powi(2) + (state.xi[1] - 0.5).powi(2)).sqrt();
        assert_abs_diff_eq!(radius, 0.3, epsilon = 1e-3);
    }

    #[test]
    fn step_size_is_world_arc_length() {
        let mesh = BlockMesh::new(3, 1);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 3, |_, _: &Point3<ftr>| vec![3.0, 4.0, 0.0]);
        let fields = StreamFields::new(&coordinates, &vectors);
        let stepper = HeunStepper::default();

        let mut state = IntegrationState::new(0, Xi::new([0.2, 0.2, 0.5]));
        state.step_size = 0.1;
        let report = accepted(stepper.step(&mesh, &fields, &mut state, SteppingSense::Same, 1.0));
        assert_eq!(report.face, None);
        assert_abs_diff_eq!(report.accepted_step_size, 0.1, epsilon = 1e-14);
        assert_abs_diff_eq!(state.xi[0], 0.26, epsilon = 1e-14);
        assert_abs_diff_eq!(state.xi[1], 0.28, epsilon = 1e-14);
    }

    #[test]
    fn rejected_steps_are_halved_exactly() {
        let mesh = BlockMesh::new(2, 1);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 2, rotation);
        let fields = StreamFields::new(&coordinates, &vectors);
        let stepper = HeunStepper::default();

        // Circle of radius 0.2 stays clear of the element faces
        let mut state = IntegrationState::new(0, Xi::new([0.7, 0.5, 0.0]));
        state.step_size = 0.4;
        let report = accepted(stepper.step(&mesh, &fields, &mut state, SteppingSense::Same, 10.0));
        assert!(report.attempts > 1);
        assert_eq!(report.face, None);
        assert_abs_diff_eq!(
            report.accepted_step_size,
            0.4 * 0.5_f64.powi(report.attempts as i32 - 1),
            epsilon = 1e-14
        );
        assert_abs_diff_eq!(state.arc_length, report.accepted_step_size, epsilon = 1e-14);
    }

    #[test]
    fn collapsed_element_stops_stepping() {
        let mesh = BlockMesh::new(3, 1);
        // All points with x = 1 map to the same line
        let coordinates = AnalyticField::new(&mesh, 3, |_, p: &Point3<ftr>| {
            vec![p[X], p[Y] * (1.0 - p[X]), p[Z]]
        });
        let vectors = AnalyticField::new(&mesh, 3, uniform_x);
        let fields = StreamFields::new(&coordinates, &vectors);
        let stepper = HeunStepper::default();

        let start = Xi::new([1.0, 0.5, 0.5]);
        let mut state = IntegrationState::new(0, start);
        assert!(matches!(
            stepper.step(&mesh, &fields, &mut state, SteppingSense::Opposite, 1.0),
            Ok(StepperResult::Stopped(StoppingCause::SingularJacobian))
        ));
        assert_eq!(state, IntegrationState::new(0, start));
    }

    #[test]
    fn vector_without_element_component_stalls() {
        let mesh = BlockMesh::new(2, 1);
        let coordinates = BlockCoordinates::with_components(&mesh, 3);
        let vectors = AnalyticField::new(&mesh, 3, |_, _: &Point3<ftr>| vec![0.0, 0.0, 1.0]);
        let fields = StreamFields::new(&coordinates, &vectors);
        let stepper = HeunStepper::default();

        let mut state = IntegrationState::new(0, Xi::new([0.5, 0.5, 0.0]));
        assert!(matches!(
            stepper.step(&mesh, &fields, &mut state, SteppingSense::Same, 1.0),
            Ok(StepperResult::Stopped(StoppingCause::Stalled))
        ));
    }

    #[test]
    fn too_few_attempts_stops_stepping() {
        let mesh = BlockMesh::new(2, 1);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 2, rotation);
        let fields = StreamFields::new(&coordinates, &vectors);
        let stepper = HeunStepper::new(StepperConfig {
            max_step_attempts: 1,
            ..StepperConfig::default()
        });

        let mut state = IntegrationState::new(0, Xi::new([0.8, 0.5, 0.0]));
        state.step_size = 2.0;
        assert!(matches!(
            stepper.step(&mesh, &fields, &mut state, SteppingSense::Same, 10.0),
            Ok(StepperResult::Stopped(StoppingCause::TooManyAttempts))
        ));
    }

    #[test]
    #[should_panic]
    fn invalid_config_is_rejected() {
        HeunStepper::new(StepperConfig {
            xi_tolerance: 0.0,
            ..StepperConfig::default()
        });
    }
}
