use fe_streamlines::{
    geometry::Point3,
    mesh::Xi,
    testing::{AnalyticField, BlockCoordinates, BlockMesh},
    tracing::{
        ftr,
        stepping::SteppingSense,
        streamline::{ColorPolicy, Streamline, StreamlineTracer},
        StreamFields,
    },
};

/// Traces a streamline through a block mesh with its own coordinates and the
/// given analytic stream vector field.
pub fn trace_block<C>(
    mesh: &BlockMesh,
    vectors: &AnalyticField<C>,
    element: usize,
    xi: Xi,
    sense: SteppingSense,
    length: ftr,
) -> Streamline<usize>
where
    C: Fn(usize, &Point3<ftr>) -> Vec<ftr> + Sync,
{
    let coordinates = BlockCoordinates::new(mesh);
    let fields = StreamFields::new(&coordinates, vectors);
    StreamlineTracer::default()
        .trace(mesh, element, &xi, fields, ColorPolicy::ArcLength, sense, length)
        .unwrap_or_else(|err| panic!("Tracing failed: {}", err))
}

pub fn assert_points_close(a: &Point3<ftr>, b: &Point3<ftr>, tolerance: ftr) {
    let distance = a.distance_to(b);
    assert!(
        distance <= tolerance,
        "Points {} and {} are {} apart (tolerance {})",
        a,
        b,
        distance,
        tolerance
    );
}

pub fn uniform_x(_element: usize, _point: &Point3<ftr>) -> Vec<ftr> {
    vec![1.0, 0.0, 0.0]
}
