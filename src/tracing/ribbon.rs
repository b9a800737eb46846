//! Extrusion of streamlines into stream surfaces.

use super::{ftr, streamline::Streamline};
use crate::geometry::{Dim3::X, Point3, Vec3};
use std::f64::consts::PI;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Cross-section swept along a streamline to form a stream surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum StreamSurfaceShape {
    /// A flat band across the lateral direction.
    Ribbon,
    /// An elliptical tube, with the given number of divisions around it.
    CircleExtrusion { divisions: usize },
    /// A rectangular tube with flat sides.
    SquareExtrusion,
}

/// Triangulated surface swept out along a streamline.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamSurface {
    positions: Vec<Point3<ftr>>,
    normals: Vec<Vec3<ftr>>,
    data: Option<Vec<ftr>>,
    triangles: Vec<[usize; 3]>,
}

impl StreamSurfaceShape {
    /// Number of surface vertices created for each streamline sample.
    pub fn vertices_per_sample(&self) -> usize {
        match self {
            Self::Ribbon => 2,
            Self::CircleExtrusion { divisions } => (*divisions).max(2) + 1,
            Self::SquareExtrusion => 8,
        }
    }

    /// Pairs of vertices within a cross-section that are connected into a
    /// quad strip along the streamline.
    fn strip_edges(&self) -> Vec<(usize, usize)> {
        match self {
            Self::Ribbon => vec![(0, 1)],
            Self::CircleExtrusion { .. } => (0..self.vertices_per_sample() - 1)
                .map(|idx| (idx, idx + 1))
                .collect(),
            Self::SquareExtrusion => (0..4).map(|side| (2 * side, 2 * side + 1)).collect(),
        }
    }
}

impl StreamSurface {
    /// Sweeps the given cross-section shape along the streamline.
    ///
    /// The cross-section spans `width` along the lateral direction (the ribbon
    /// normal crossed with the stream direction) and `thickness` along the
    /// ribbon normal. Scalar values of the streamline, if any, are copied to
    /// every vertex of the corresponding cross-section.
    pub fn extrude<E: Copy>(
        streamline: &Streamline<E>,
        shape: StreamSurfaceShape,
        width: ftr,
        thickness: ftr,
    ) -> Self {
        let vertices_per_sample = shape.vertices_per_sample();
        let number_of_vertices = vertices_per_sample * streamline.len();

        let mut positions = Vec::with_capacity(number_of_vertices);
        let mut normals = Vec::with_capacity(number_of_vertices);

        for ((point, vector), normal) in streamline
            .points()
            .iter()
            .zip(streamline.vectors())
            .zip(streamline.normals())
        {
            let magnitude = vector.length();
            let direction = if magnitude > 0.0 {
                *vector / magnitude
            } else {
                Vec3::unit(X)
            };
            let cross = normal.cross(&direction);
            let half_width = cross * (0.5 * width);
            let half_thickness = *normal * (0.5 * thickness);

            match shape {
                StreamSurfaceShape::Ribbon => {
                    positions.push(point + &half_width);
                    positions.push(*point - half_width);
                    normals.push(*normal);
                    normals.push(*normal);
                }
                StreamSurfaceShape::CircleExtrusion { .. } => {
                    let divisions = (vertices_per_sample - 1) as ftr;
                    for idx in 0..vertices_per_sample {
                        let (sin_angle, cos_angle) = (2.0 * PI * idx as ftr / divisions).sin_cos();
                        positions.push(
                            point + &(half_width * sin_angle + half_thickness * cos_angle),
                        );
                        // Outward normal of the ellipse
                        normals.push(
                            (cross * (sin_angle * thickness) + *normal * (cos_angle * width))
                                .normalized(),
                        );
                    }
                }
                StreamSurfaceShape::SquareExtrusion => {
                    let corners = [
                        (half_width + half_thickness, *normal),
                        (half_thickness - half_width, *normal),
                        (half_thickness - half_width, -cross),
                        (-half_width - half_thickness, -cross),
                        (-half_width - half_thickness, -*normal),
                        (half_width - half_thickness, -*normal),
                        (half_width - half_thickness, cross),
                        (half_width + half_thickness, cross),
                    ];
                    for (offset, side_normal) in corners {
                        positions.push(point + &offset);
                        normals.push(side_normal);
                    }
                }
            }
        }

        let data = streamline.scalars().map(|scalars| {
            scalars
                .iter()
                .flat_map(|&scalar| std::iter::repeat(scalar).take(vertices_per_sample))
                .collect()
        });

        let strip_edges = shape.strip_edges();
        let mut triangles =
            Vec::with_capacity(2 * strip_edges.len() * streamline.len().saturating_sub(1));
        for sample in 1..streamline.len() {
            let previous = (sample - 1) * vertices_per_sample;
            let current = sample * vertices_per_sample;
            for &(first, second) in &strip_edges {
                triangles.push([previous + first, previous + second, current + first]);
                triangles.push([previous + second, current + second, current + first]);
            }
        }

        Self {
            positions,
            normals,
            data,
            triangles,
        }
    }

    pub fn positions(&self) -> &[Point3<ftr>] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3<ftr>] {
        &self.normals
    }

    /// Scalar value at each vertex, if the streamline had any.
    pub fn data(&self) -> Option<&[ftr]> {
        self.data.as_deref()
    }

    /// Vertex indices of each triangle.
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn number_of_vertices(&self) -> usize {
        self.positions.len()
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::{
        geometry::Dim3::{Y, Z},
        mesh::Xi,
        testing::{AnalyticField, BlockCoordinates, BlockMesh},
        tracing::{
            stepping::SteppingSense,
            streamline::{ColorPolicy, StreamlineTracer},
            StreamFields,
        },
    };
    use approx::assert_abs_diff_eq;

    /// Traces along x through a 3D block with the lateral direction given
    /// along y.
    fn straight_streamline(color: bool) -> Streamline<usize> {
        let mesh = BlockMesh::new(3, 1);
        let coordinates = BlockCoordinates::new(&mesh);
        let vectors = AnalyticField::new(&mesh, 6, |_, _: &Point3<ftr>| {
            vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        });
        let fields = StreamFields::new(&coordinates, &vectors);
        let color = if color {
            ColorPolicy::ArcLength
        } else {
            ColorPolicy::NoData
        };
        StreamlineTracer::default()
            .trace(&mesh, 0, &Xi::new([0.2, 0.5, 0.5]), fields, color, SteppingSense::Same, 0.5)
            .unwrap()
    }

    #[test]
    fn ribbon_spans_width_across_streamline() {
        let streamline = straight_streamline(true);
        let surface = StreamSurface::extrude(&streamline, StreamSurfaceShape::Ribbon, 0.2, 0.0);

        assert_eq!(surface.number_of_vertices(), 2 * streamline.len());
        assert_eq!(surface.triangles().len(), 2 * (streamline.len() - 1));
        assert_eq!(surface.data().unwrap().len(), surface.number_of_vertices());

        // Normal is +z, so the lateral offset is along z x x = +y
        let first = surface.positions()[0];
        let second = surface.positions()[1];
        assert_abs_diff_eq!(first[Y], 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(second[Y], 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(first[Z], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(surface.normals()[0], Vec3::unit(Z));
    }

    #[test]
    fn circle_extrusion_closes_seam() {
        let streamline = straight_streamline(false);
        let surface = StreamSurface::extrude(
            &streamline,
            StreamSurfaceShape::CircleExtrusion { divisions: 8 },
            0.2,
            0.1,
        );

        assert_eq!(surface.number_of_vertices(), 9 * streamline.len());
        assert_eq!(surface.triangles().len(), 2 * 8 * (streamline.len() - 1));
        assert!(surface.data().is_none());
        assert_abs_diff_eq!(surface.positions()[0], surface.positions()[8], epsilon = 1e-12);

        let centre = streamline.points()[0];
        for (position, normal) in surface.positions()[..9].iter().zip(&surface.normals()[..9]) {
            let offset = position - &centre;
            // On the ellipse with semi-axes 0.1 (y) and 0.05 (z)
            assert_abs_diff_eq!(
                (offset[Y] / 0.1).powi(2) + (offset[Z] / 0.05).powi(2),
                1.0,
                epsilon = 1e-12
            );
            assert_abs_diff_eq!(normal.length(), 1.0, epsilon = 1e-12);
            assert!(normal.dot(&offset) > 0.0);
        }
    }

    #[test]
    fn square_extrusion_has_flat_sides() {
        let streamline = straight_streamline(false);
        let surface =
            StreamSurface::extrude(&streamline, StreamSurfaceShape::SquareExtrusion, 0.2, 0.1);

        assert_eq!(surface.number_of_vertices(), 8 * streamline.len());
        assert_eq!(surface.triangles().len(), 8 * (streamline.len() - 1));

        let centre = streamline.points()[0];
        let positions = &surface.positions()[..8];
        let normals = &surface.normals()[..8];
        for side in 0..4 {
            let normal = normals[2 * side];
            assert_eq!(normal, normals[2 * side + 1]);
            let first = positions[2 * side] - centre;
            let second = positions[2 * side + 1] - centre;
            assert_abs_diff_eq!(first.dot(&normal), second.dot(&normal), epsilon = 1e-12);
            assert!(first.dot(&normal) > 0.0);
        }
    }

    #[test]
    fn triangles_index_existing_vertices() {
        let streamline = straight_streamline(false);
        for shape in [
            StreamSurfaceShape::Ribbon,
            StreamSurfaceShape::CircleExtrusion { divisions: 5 },
            StreamSurfaceShape::SquareExtrusion,
        ] {
            let surface = StreamSurface::extrude(&streamline, shape, 1.0, 1.0);
            assert!(surface
                .triangles()
                .iter()
                .flatten()
                .all(|&idx| idx < surface.number_of_vertices()));
        }
    }
}
