//! Assembling streamlines from adaptive steps through the mesh.

use super::{
    crossing::{cross_face, CrossingOutcome},
    frame::{FrameMode, FrameSample, FrameTransport},
    ftr,
    stepping::{
        HeunStepper, IntegrationState, StepperConfig, StepperInstruction, StepperResult,
        SteppingSense, StoppingCause,
    },
    StreamFields,
};
use crate::{
    error::{FieldRole, TracingError},
    geometry::{Point3, Vec3},
    mesh::{Field, Mesh, Xi},
};
use std::fmt;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Configuration parameters for streamline tracing.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct StreamlineTracerConfig {
    /// Configuration of the adaptive stepper.
    pub stepper: StepperConfig,
    /// Stream vector magnitude below which the streamline is considered to
    /// have reached a stagnation point.
    pub stagnation_threshold: ftr,
    /// Number of samples to allocate space for up front.
    pub initial_capacity: usize,
    /// The requested length counts as reached when the remaining length is
    /// below this fraction of it.
    pub length_tolerance: ftr,
}

/// What to record as the scalar value of each streamline sample.
pub enum ColorPolicy<'a, E> {
    /// Record no scalar values.
    NoData,
    /// Record the magnitude of the stream vector.
    Magnitude,
    /// Record the arc length travelled, negative when tracing against the
    /// stream vectors.
    ArcLength,
    /// Record the value of the given single component field.
    Field(&'a dyn Field<E>),
}

/// Reason a streamline ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum StreamlineStatus {
    /// The requested arc length was traced.
    ReachedLength,
    /// The stream vector vanished.
    Stagnation,
    /// The streamline left the mesh.
    MeshBoundaryReached,
    /// No element across a face matched the position on the face.
    CoordinateMismatch,
    /// The element across a face has no shape.
    MissingShape,
    /// The streamline stopped progressing, oscillating between elements or
    /// sticking to a face.
    Trapped,
    /// No acceptable step could be found.
    TooManyAttempts,
    /// The coordinate Jacobian became singular, as in a collapsed element.
    SingularJacobian,
    /// The tracing callback requested termination.
    StoppedByCallback,
}

/// A single sample along a streamline.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamlineSample<E> {
    pub element: E,
    pub xi: Xi,
    pub point: Point3<ftr>,
    /// Stream vector, oriented along the tracing direction.
    pub vector: Vec3<ftr>,
    /// Ribbon normal.
    pub normal: Vec3<ftr>,
    pub scalar: Option<ftr>,
    pub arc_length: ftr,
}

/// A traced streamline.
///
/// The points, vectors, normals, arc lengths and (if present) scalar values
/// all have one entry per sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Streamline<E> {
    points: Vec<Point3<ftr>>,
    vectors: Vec<Vec3<ftr>>,
    normals: Vec<Vec3<ftr>>,
    arc_lengths: Vec<ftr>,
    scalars: Option<Vec<ftr>>,
    status: StreamlineStatus,
    end_element: E,
    end_xi: Xi,
}

/// Traces streamlines with a given configuration.
#[derive(Clone, Debug)]
pub struct StreamlineTracer {
    config: StreamlineTracerConfig,
    stepper: HeunStepper,
}

/// Output buffers growing by doubling their capacity.
#[derive(Clone, Debug)]
struct SampleBuffers {
    points: Vec<Point3<ftr>>,
    vectors: Vec<Vec3<ftr>>,
    normals: Vec<Vec3<ftr>>,
    arc_lengths: Vec<ftr>,
    scalars: Option<Vec<ftr>>,
}

/// Detects streamlines that stop progressing.
#[derive(Clone, Debug)]
struct OscillationGuard<E> {
    history: [Option<(E, ftr)>; 2],
    stalled_iterations: u32,
}

impl StreamlineTracerConfig {
    pub const DEFAULT_STAGNATION_THRESHOLD: ftr = 1e-30;
    pub const DEFAULT_INITIAL_CAPACITY: usize = 100;
    pub const DEFAULT_LENGTH_TOLERANCE: ftr = 1e-12;

    /// Panics if any of the parameters are out of range.
    pub fn validate(&self) {
        self.stepper.validate();
        assert!(
            self.stagnation_threshold >= 0.0,
            "Stagnation threshold must be larger than or equal to zero."
        );
        assert!(
            self.initial_capacity > 0,
            "Initial capacity must be larger than zero."
        );
        assert!(
            self.length_tolerance >= 0.0 && self.length_tolerance < 1.0,
            "Length tolerance must be in the range [0, 1)."
        );
    }
}

impl Default for StreamlineTracerConfig {
    fn default() -> Self {
        StreamlineTracerConfig {
            stepper: StepperConfig::default(),
            stagnation_threshold: Self::DEFAULT_STAGNATION_THRESHOLD,
            initial_capacity: Self::DEFAULT_INITIAL_CAPACITY,
            length_tolerance: Self::DEFAULT_LENGTH_TOLERANCE,
        }
    }
}

impl<'a, E> Clone for ColorPolicy<'a, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, E> Copy for ColorPolicy<'a, E> {}

impl<'a, E> ColorPolicy<'a, E> {
    /// Whether samples get a scalar value.
    pub fn has_data(&self) -> bool {
        !matches!(self, Self::NoData)
    }
}

impl StreamlineStatus {
    /// Whether the streamline ended because tracing could not continue
    /// properly, rather than by reaching the length, the mesh boundary or a
    /// stagnation point or by request.
    pub fn is_abnormal(&self) -> bool {
        matches!(
            self,
            Self::CoordinateMismatch
                | Self::MissingShape
                | Self::Trapped
                | Self::TooManyAttempts
                | Self::SingularJacobian
        )
    }
}

impl fmt::Display for StreamlineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::ReachedLength => "reached requested length",
                Self::Stagnation => "reached stagnation point",
                Self::MeshBoundaryReached => "reached mesh boundary",
                Self::CoordinateMismatch => "no matching coordinates across face",
                Self::MissingShape => "entered element without shape",
                Self::Trapped => "trapped",
                Self::TooManyAttempts => "too many step attempts",
                Self::SingularJacobian => "singular coordinate Jacobian",
                Self::StoppedByCallback => "stopped by callback",
            }
        )
    }
}

impl<E: Copy> Streamline<E> {
    pub fn points(&self) -> &[Point3<ftr>] {
        &self.points
    }

    pub fn vectors(&self) -> &[Vec3<ftr>] {
        &self.vectors
    }

    pub fn normals(&self) -> &[Vec3<ftr>] {
        &self.normals
    }

    pub fn arc_lengths(&self) -> &[ftr] {
        &self.arc_lengths
    }

    pub fn scalars(&self) -> Option<&[ftr]> {
        self.scalars.as_deref()
    }

    pub fn status(&self) -> StreamlineStatus {
        self.status
    }

    /// Element containing the head of the streamline when tracing ended.
    pub fn end_element(&self) -> E {
        self.end_element
    }

    /// Local coordinates of the head of the streamline when tracing ended.
    pub fn end_xi(&self) -> &Xi {
        &self.end_xi
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total arc length of the streamline.
    pub fn arc_length(&self) -> ftr {
        self.arc_lengths.last().copied().unwrap_or(0.0)
    }

    pub fn last_point(&self) -> Option<&Point3<ftr>> {
        self.points.last()
    }

    pub fn reached_requested_length(&self) -> bool {
        self.status == StreamlineStatus::ReachedLength
    }

    pub fn terminated_early(&self) -> bool {
        !self.reached_requested_length()
    }
}

impl StreamlineTracer {
    /// Creates a new tracer with the given configuration.
    pub fn new(config: StreamlineTracerConfig) -> Self {
        config.validate();
        let stepper = HeunStepper::new(config.stepper.clone());
        Self { config, stepper }
    }

    pub fn config(&self) -> &StreamlineTracerConfig {
        &self.config
    }

    /// Traces a streamline from the given element location.
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
    /// - `Ok`: Contains the traced `Streamline`.
    /// - `Err`: Contains a `TracingError` if the inputs were invalid or tracing
    /// failed. No partial streamline is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn trace<M: Mesh>(
        &self,
        mesh: &M,
        element: M::Element,
        xi: &Xi,
        fields: StreamFields<M::Element>,
        color: ColorPolicy<M::Element>,
        sense: SteppingSense,
        length: ftr,
    ) -> Result<Streamline<M::Element>, TracingError> {
        self.trace_with_callback(mesh, element, xi, fields, color, sense, length, |_| {
            StepperInstruction::Continue
        })
    }

    /// Traces a streamline as for `trace`, calling the given callback with
    /// every recorded sample.
    ///
    /// Tracing stops with `StreamlineStatus::StoppedByCallback` if the
    /// callback returns `StepperInstruction::Terminate`.
    #[allow(clippy::too_many_arguments)]
    pub fn trace_with_callback<M, C>(
        &self,
        mesh: &M,
        element: M::Element,
        xi: &Xi,
        fields: StreamFields<M::Element>,
        color: ColorPolicy<M::Element>,
        sense: SteppingSense,
        length: ftr,
        mut callback: C,
    ) -> Result<Streamline<M::Element>, TracingError>
    where
        M: Mesh,
        C: FnMut(&StreamlineSample<M::Element>) -> StepperInstruction,
    {
        let (frame_mode, xi) = validate_inputs(mesh, element, xi, &fields, &color, length)?;

        let mut transport = FrameTransport::new(frame_mode, sense);
        let mut buffers =
            SampleBuffers::with_capacity(self.config.initial_capacity, color.has_data())?;
        let mut state = IntegrationState::new(element, xi);
        let mut guard = OscillationGuard::new();
        let length_tolerance = length * self.config.length_tolerance;

        let mut terminal_status = None;

        let status = loop {
            let (sample, stagnated) = self.sample(&fields, &color, &mut transport, sense, &state)?;
            buffers.push(&sample)?;
            let instruction = callback(&sample);

            if length - state.arc_length <= length_tolerance {
                break StreamlineStatus::ReachedLength;
            }
            if let Some(status) = terminal_status {
                break status;
            }
            if stagnated {
                break StreamlineStatus::Stagnation;
            }
            if instruction == StepperInstruction::Terminate {
                break StreamlineStatus::StoppedByCallback;
            }

            let remaining_length = length - state.arc_length;
            let report = match self
                .stepper
                .step(mesh, &fields, &mut state, sense, remaining_length)?
            {
                StepperResult::Ok(report) => report,
                StepperResult::Stopped(StoppingCause::Stalled) => {
                    break StreamlineStatus::Stagnation
                }
                StepperResult::Stopped(StoppingCause::TooManyAttempts) => {
                    break StreamlineStatus::TooManyAttempts
                }
                StepperResult::Stopped(StoppingCause::SingularJacobian) => {
                    break StreamlineStatus::SingularJacobian
                }
            };

            if let Some(face) = report.face {
                match cross_face(
                    mesh,
                    &fields,
                    state.element,
                    &state.xi,
                    face,
                    &report.end_point,
                    report.length_scale,
                    self.config.stepper.coordinate_tolerance,
                )? {
                    CrossingOutcome::Crossed { element, xi, .. } => {
                        state.element = element;
                        state.xi = xi;
                    }
                    CrossingOutcome::MeshBoundary => {
                        terminal_status = Some(StreamlineStatus::MeshBoundaryReached)
                    }
                    CrossingOutcome::CoordinateMismatch => {
                        terminal_status = Some(StreamlineStatus::CoordinateMismatch)
                    }
                    CrossingOutcome::MissingShape { element } => {
                        log::debug!("Element {:?} across face {} has no shape", element, face);
                        terminal_status = Some(StreamlineStatus::MissingShape)
                    }
                }
            }

            if terminal_status.is_none() && guard.is_trapped(state.element, state.arc_length) {
                break StreamlineStatus::Trapped;
            }
        };

        log_termination(status, &state, buffers.len());

        let SampleBuffers {
            points,
            vectors,
            normals,
            arc_lengths,
            scalars,
        } = buffers.finish();

        Ok(Streamline {
            points,
            vectors,
            normals,
            arc_lengths,
            scalars,
            status,
            end_element: state.element,
            end_xi: state.xi,
        })
    }

    fn sample<E: Copy>(
        &self,
        fields: &StreamFields<E>,
        color: &ColorPolicy<E>,
        transport: &mut FrameTransport,
        sense: SteppingSense,
        state: &IntegrationState<E>,
    ) -> Result<(StreamlineSample<E>, bool), TracingError> {
        let (element, xi) = (state.element, state.xi);

        let (point, coordinate_jacobian) = if transport.mode().requires_coordinate_jacobian() {
            let (point, jacobian) = fields.evaluate_coordinates_with_jacobian(element, &xi)?;
            (point, Some(jacobian))
        } else {
            (fields.evaluate_coordinates(element, &xi)?, None)
        };

        let vector_values =
            fields.evaluate_vector(element, &xi, transport.requires_vector_derivatives())?;
        if transport.requires_vector_derivatives() && vector_values.derivatives.is_none() {
            transport.disable_curl_integration();
        }

        let vector = Vec3::from_slice(&vector_values.values) * sense.sign();
        let stagnated = vector.length() < self.config.stagnation_threshold;

        let frame = if stagnated {
            transport.hold(&vector)
        } else {
            transport.advance(&FrameSample {
                vector,
                values: &vector_values.values,
                point,
                arc_length: state.arc_length,
                coordinate_jacobian: coordinate_jacobian.as_ref(),
                vector_derivatives: vector_values.derivatives.as_ref(),
            })
        };

        let scalar = match color {
            ColorPolicy::NoData => None,
            ColorPolicy::Magnitude => Some(vector.length()),
            ColorPolicy::ArcLength => Some(sense.orient(state.arc_length)),
            ColorPolicy::Field(field) => {
                let values = field
                    .evaluate(element, &xi, false)
                    .map_err(TracingError::field(FieldRole::Color))?;
                Some(values.values.first().copied().unwrap_or(0.0))
            }
        };

        Ok((
            StreamlineSample {
                element,
                xi,
                point,
                vector,
                normal: frame.normal,
                scalar,
                arc_length: state.arc_length,
            },
            stagnated,
        ))
    }
}

impl Default for StreamlineTracer {
    fn default() -> Self {
        Self::new(StreamlineTracerConfig::default())
    }
}

/// Checks the trace inputs, returning the frame mode to use and the start
/// coordinates limited to the element dimension.
fn validate_inputs<M: Mesh>(
    mesh: &M,
    element: M::Element,
    xi: &Xi,
    fields: &StreamFields<M::Element>,
    color: &ColorPolicy<M::Element>,
    length: ftr,
) -> Result<(FrameMode, Xi), TracingError> {
    if !mesh.is_top_level(element) {
        return Err(TracingError::NotTopLevel);
    }
    let dimension = mesh.dimension(element);
    if !(2..=3).contains(&dimension) {
        return Err(TracingError::UnsupportedElementDimension(dimension));
    }
    if !xi.is_in_unit_domain(dimension) {
        return Err(TracingError::XiOutOfRange(*xi));
    }
    if !(length > 0.0) {
        return Err(TracingError::NonPositiveLength(length));
    }
    if mesh.shape(element).is_none() {
        return Err(TracingError::MissingStartShape);
    }
    let frame_mode = FrameMode::determine(
        dimension,
        fields.coordinate.number_of_components(),
        fields.vector.number_of_components(),
    )?;
    if let ColorPolicy::Field(field) = color {
        let components = field.number_of_components();
        if components != 1 {
            return Err(TracingError::InvalidColorField(components));
        }
    }
    Ok((frame_mode, xi.truncated(dimension)))
}

fn log_termination<E: fmt::Debug>(
    status: StreamlineStatus,
    state: &IntegrationState<E>,
    number_of_samples: usize,
) {
    if status.is_abnormal() {
        log::warn!(
            "Streamline terminated early in element {:?} at xi {} after length {}: {}",
            state.element,
            state.xi,
            state.arc_length,
            status
        );
    } else {
        log::debug!(
            "Streamline {} after length {} ({} samples)",
            status,
            state.arc_length,
            number_of_samples
        );
    }
}

impl SampleBuffers {
    fn with_capacity(capacity: usize, with_scalars: bool) -> Result<Self, TracingError> {
        let mut buffers = Self {
            points: Vec::new(),
            vectors: Vec::new(),
            normals: Vec::new(),
            arc_lengths: Vec::new(),
            scalars: if with_scalars { Some(Vec::new()) } else { None },
        };
        buffers.reserve(capacity)?;
        Ok(buffers)
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    fn capacity(&self) -> usize {
        self.points.capacity()
    }

    fn push<E>(&mut self, sample: &StreamlineSample<E>) -> Result<(), TracingError> {
        if self.len() == self.capacity() {
            self.reserve(self.capacity().max(1))?;
        }
        self.points.push(sample.point);
        self.vectors.push(sample.vector);
        self.normals.push(sample.normal);
        self.arc_lengths.push(sample.arc_length);
        if let Some(scalars) = self.scalars.as_mut() {
            scalars.push(sample.scalar.unwrap_or(0.0));
        }
        Ok(())
    }

    fn reserve(&mut self, additional: usize) -> Result<(), TracingError> {
        let requested = self.len() + additional;
        let err = |source| TracingError::AllocationFailed { requested, source };
        self.points.try_reserve_exact(additional).map_err(err)?;
        self.vectors.try_reserve_exact(additional).map_err(err)?;
        self.normals.try_reserve_exact(additional).map_err(err)?;
        self.arc_lengths.try_reserve_exact(additional).map_err(err)?;
        if let Some(scalars) = self.scalars.as_mut() {
            scalars.try_reserve_exact(additional).map_err(err)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Self {
        self.points.shrink_to_fit();
        self.vectors.shrink_to_fit();
        self.normals.shrink_to_fit();
        self.arc_lengths.shrink_to_fit();
        if let Some(scalars) = self.scalars.as_mut() {
            scalars.shrink_to_fit();
        }
        self
    }
}

impl<E: Copy + PartialEq> OscillationGuard<E> {
    /// Number of consecutive iterations without progress after which a
    /// streamline is considered trapped.
    const MAX_STALLED_ITERATIONS: u32 = 3;

    fn new() -> Self {
        Self {
            history: [None, None],
            stalled_iterations: 0,
        }
    }

    /// Records the state after an iteration and checks whether the
    /// streamline is trapped.
    fn is_trapped(&mut self, element: E, arc_length: ftr) -> bool {
        let [older, newer] = self.history;
        self.history = [newer, Some((element, arc_length))];

        let progressed = newer.map_or(true, |(_, previous_length)| arc_length > previous_length);
        if progressed {
            self.stalled_iterations = 0;
            return false;
        }
        self.stalled_iterations += 1;

        let flipped_back = matches!(
            (older, newer),
            (Some((older_element, _)), Some((newer_element, _)))
                if older_element == element && newer_element != element
        );
        flipped_back || self.stalled_iterations >= Self::MAX_STALLED_ITERATIONS
    }
}
