//! Tracing many streamlines in parallel.

use super::{
    ftr,
    stepping::{StepperInstruction, SteppingSense},
    streamline::{ColorPolicy, Streamline, StreamlineTracer},
    StreamFields,
};
use crate::{error::TracingError, mesh::Mesh, mesh::Xi, verbosity::Verbosity};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Traces a streamline from each of the given seed locations in parallel.
///
/// # Parameters
///
/// - `tracer`: Tracer to use for every streamline.
/// - `mesh`: Mesh to trace through.
/// - `seeds`: Start element and local coordinates of each streamline.
/// - `fields`: Coordinate and stream vector fields.
/// - `color`: What scalar to record along the streamlines.
/// - `sense`: Whether to trace along or against the stream vectors.
/// - `length`: Arc length to trace for each streamline.
/// - `verbosity`: Whether and how to report progress.
/// - `cancel`: Optional flag which, once set, stops every ongoing trace at
///   its next sample with `StreamlineStatus::StoppedByCallback`.
///
/// # Returns
///
/// The result of tracing from each seed, in the order of the seeds. A failed
/// trace does not affect the others.
#[allow(clippy::too_many_arguments)]
pub fn trace_streamlines<M>(
    tracer: &StreamlineTracer,
    mesh: &M,
    seeds: &[(M::Element, Xi)],
    fields: StreamFields<M::Element>,
    color: ColorPolicy<M::Element>,
    sense: SteppingSense,
    length: ftr,
    verbosity: &Verbosity,
    cancel: Option<&AtomicBool>,
) -> Vec<Result<Streamline<M::Element>, TracingError>>
where
    M: Mesh + Sync,
{
    if verbosity.print_messages() {
        println!("Tracing {} streamlines", seeds.len());
    }

    let results: Vec<_> = seeds
        .par_iter()
        .progress_with(verbosity.create_progress_bar(seeds.len()))
        .map(|(element, xi)| {
            tracer.trace_with_callback(mesh, *element, xi, fields, color, sense, length, |_| {
                match cancel {
                    Some(flag) if flag.load(Ordering::Relaxed) => StepperInstruction::Terminate,
                    _ => StepperInstruction::Continue,
                }
            })
        })
        .collect();

    if verbosity.print_messages() {
        let failed = results.iter().filter(|result| result.is_err()).count();
        let early = results
            .iter()
            .filter(|result| matches!(result, Ok(streamline) if streamline.terminated_early()))
            .count();
        println!(
            "Traced {} streamlines ({} ended before the requested length, {} failed)",
            results.len() - failed,
            early,
            failed
        );
    }
    results
}
