//! Transport of the ribbon orientation frame along streamlines.

use super::{ftr, stepping::SteppingSense};
use crate::{
    error::TracingError,
    geometry::{Dim3::Z, Point3, Vec3},
};
use nalgebra::DMatrix;

/// How the orientation frame is obtained from the fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameMode {
    /// 2D elements in 2D space. The ribbon normal points out of the plane.
    Planar,
    /// 2D elements in 3D space. The ribbon normal is the element surface
    /// normal.
    SurfaceTangent,
    /// 3D elements with direction-only stream vectors. The frame is rotated
    /// by the curl of the field integrated along the streamline.
    CurlTransport,
    /// Stream vector components 4-6 give the lateral direction.
    GivenLateral,
    /// Stream vector components 4-6 give the lateral direction and
    /// components 7-9 the ribbon normal.
    GivenLateralAndNormal,
}

/// Orientation of a streamline at a sample point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    /// Unit direction across the ribbon.
    pub lateral: Vec3<ftr>,
    /// Unit normal of the ribbon sheet.
    pub normal: Vec3<ftr>,
}

/// Input to the frame transport at a sample point.
#[derive(Clone, Copy, Debug)]
pub struct FrameSample<'a> {
    /// Stream vector oriented by the stepping sense.
    pub vector: Vec3<ftr>,
    /// All stream vector field components, as evaluated.
    pub values: &'a [ftr],
    /// World position of the sample.
    pub point: Point3<ftr>,
    /// Arc length at the sample.
    pub arc_length: ftr,
    /// Derivatives of the world coordinates with respect to xi.
    pub coordinate_jacobian: Option<&'a DMatrix<ftr>>,
    /// Derivatives of the stream vector field with respect to xi.
    pub vector_derivatives: Option<&'a DMatrix<ftr>>,
}

#[derive(Clone, Copy, Debug)]
struct TransportedFrame {
    frame: Frame,
    point: Point3<ftr>,
    arc_length: ftr,
    curl_component: ftr,
}

/// Keeps track of the orientation frame along a streamline.
#[derive(Clone, Debug)]
pub struct FrameTransport {
    mode: FrameMode,
    sense: SteppingSense,
    integrate_curl: bool,
    previous: Option<TransportedFrame>,
    total_rotation: ftr,
}

impl FrameMode {
    /// Determines the frame mode for the given element dimension and field
    /// component counts.
    pub fn determine(
        element_dimension: usize,
        coordinate_components: usize,
        vector_components: usize,
    ) -> Result<Self, TracingError> {
        match (element_dimension, coordinate_components, vector_components) {
            (2, 2, 2) => Ok(Self::Planar),
            (2, 3, 3) => Ok(Self::SurfaceTangent),
            (3, 3, 3) => Ok(Self::CurlTransport),
            (3, 3, 6) => Ok(Self::GivenLateral),
            (3, 3, 9) => Ok(Self::GivenLateralAndNormal),
            _ => Err(TracingError::IncompatibleComponents {
                coordinate: coordinate_components,
                vector: vector_components,
                element_dimension,
            }),
        }
    }

    /// Whether frames require the coordinate Jacobian.
    pub fn requires_coordinate_jacobian(&self) -> bool {
        matches!(self, Self::SurfaceTangent | Self::CurlTransport)
    }
}

impl FrameTransport {
    pub fn new(mode: FrameMode, sense: SteppingSense) -> Self {
        Self {
            mode,
            sense,
            integrate_curl: mode == FrameMode::CurlTransport,
            previous: None,
            total_rotation: 0.0,
        }
    }

    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    /// Whether the next sample should include derivatives of the stream
    /// vector field.
    pub fn requires_vector_derivatives(&self) -> bool {
        self.integrate_curl
    }

    /// Stops integrating the curl for the rest of the streamline.
    pub fn disable_curl_integration(&mut self) {
        if self.integrate_curl {
            log::warn!(
                "Stream vector field derivatives are unavailable, \
                 continuing without integrating the curl"
            );
            self.integrate_curl = false;
        }
    }

    /// Total angle the frame has been rotated by the curl so far.
    pub fn total_rotation(&self) -> ftr {
        self.total_rotation
    }

    /// Computes the frame at the given sample and makes it the reference for
    /// the next one.
    pub fn advance(&mut self, sample: &FrameSample) -> Frame {
        let vector = &sample.vector;
        let frame = match self.mode {
            FrameMode::Planar => {
                let normal = Vec3::unit(Z);
                Frame {
                    lateral: vector.cross(&normal).normalized(),
                    normal,
                }
            }
            FrameMode::SurfaceTangent => {
                let normal = sample
                    .coordinate_jacobian
                    .and_then(surface_normal)
                    .unwrap_or_else(|| Vec3::unit(Z));
                Frame {
                    lateral: vector.cross(&normal).normalized(),
                    normal,
                }
            }
            FrameMode::CurlTransport => return self.advance_with_curl(sample),
            FrameMode::GivenLateral => {
                let lateral = self.oriented_components(sample.values, 3);
                Frame {
                    lateral,
                    normal: vector.cross(&lateral).normalized(),
                }
            }
            FrameMode::GivenLateralAndNormal => Frame {
                lateral: self.oriented_components(sample.values, 3),
                normal: Vec3::from_slice(sample.values.get(6..9).unwrap_or(&[])),
            },
        };
        self.previous = Some(TransportedFrame {
            frame,
            point: sample.point,
            arc_length: sample.arc_length,
            curl_component: 0.0,
        });
        frame
    }

    /// Returns the frame to use at a sample where the stream vector vanishes,
    /// without affecting the transport.
    pub fn hold(&self, vector: &Vec3<ftr>) -> Frame {
        match self.previous {
            Some(previous) => previous.frame,
            None => Frame {
                lateral: Vec3::zero(),
                normal: match self.mode {
                    FrameMode::Planar => Vec3::unit(Z),
                    _ => Vec3::unit(vector.smallest_dimension()),
                },
            },
        }
    }

    fn advance_with_curl(&mut self, sample: &FrameSample) -> Frame {
        let vector = &sample.vector;

        let curl_component = if self.integrate_curl {
            match (sample.coordinate_jacobian, sample.vector_derivatives) {
                (Some(jacobian), Some(derivatives)) => {
                    compute_curl_component(jacobian, derivatives, vector)
                }
                _ => 0.0,
            }
        } else {
            0.0
        };

        let (angle, normal_guess) = match &self.previous {
            None => (0.0, Vec3::unit(vector.smallest_dimension())),
            Some(previous) => {
                let angle = self.sense.orient(
                    0.5 * (previous.curl_component + curl_component)
                        * (sample.arc_length - previous.arc_length),
                );
                let displacement = sample.point - previous.point;
                let mut normal = displacement.cross(&previous.frame.lateral);
                if normal.is_zero() {
                    normal = vector.cross(&previous.frame.lateral);
                }
                (angle, normal)
            }
        };

        let lateral = normal_guess.cross(vector).normalized();
        let normal = vector.cross(&lateral).normalized();

        let (sin_angle, cos_angle) = angle.sin_cos();
        let frame = Frame {
            lateral: lateral * cos_angle + normal * sin_angle,
            normal: normal * cos_angle - lateral * sin_angle,
        };

        self.total_rotation += angle;
        self.previous = Some(TransportedFrame {
            frame,
            point: sample.point,
            arc_length: sample.arc_length,
            curl_component,
        });
        frame
    }

    fn oriented_components(&self, values: &[ftr], offset: usize) -> Vec3<ftr> {
        let components = values.get(offset..offset + 3).unwrap_or(&[]);
        Vec3::from_slice(components) * self.sense.sign()
    }
}

/// Computes the component of the curl of the stream vector field along the
/// given stream vector.
///
/// Returns zero if the coordinate Jacobian is not an invertible 3x3 matrix.
pub fn compute_curl_component(
    coordinate_jacobian: &DMatrix<ftr>,
    vector_derivatives: &DMatrix<ftr>,
    vector: &Vec3<ftr>,
) -> ftr {
    if coordinate_jacobian.shape() != (3, 3)
        || vector_derivatives.nrows() < 3
        || vector_derivatives.ncols() != 3
    {
        return 0.0;
    }
    let dxi_dx = match coordinate_jacobian.clone().try_inverse() {
        Some(inverse) => inverse,
        None => return 0.0,
    };
    let dv_dx = vector_derivatives.rows(0, 3) * dxi_dx;
    let curl = Vec3::new(
        dv_dx[(2, 1)] - dv_dx[(1, 2)],
        dv_dx[(0, 2)] - dv_dx[(2, 0)],
        dv_dx[(1, 0)] - dv_dx[(0, 1)],
    );
    let magnitude = vector.length();
    if magnitude > 0.0 {
        curl.dot(vector) / magnitude
    } else {
        0.0
    }
}

fn surface_normal(jacobian: &DMatrix<ftr>) -> Option<Vec3<ftr>> {
    if jacobian.nrows() < 3 || jacobian.ncols() < 2 {
        return None;
    }
    let first = Vec3::new(jacobian[(0, 0)], jacobian[(1, 0)], jacobian[(2, 0)]);
    let second = Vec3::new(jacobian[(0, 1)], jacobian[(1, 1)], jacobian[(2, 1)]);
    Some(first.cross(&second).normalized())
}
