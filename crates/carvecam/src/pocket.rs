use crate::geometry::clearance::ClearanceIndex;
use crate::geometry::offset::PolygonOffsetter;
use crate::geometry::subdivide;
use crate::profile::{ring_to_subpath, MAX_SEGMENT_LENGTH};
use crate::types::{BoundaryPath, MachineOptions, OperationKind, PathPoint, SubPath, Tool};
use tracing::{debug, warn};

/// Hard cap on the total number of pocket rings. The stepover fallback
/// (retry at half, then quarter stepover) has no inherent termination
/// guarantee on pathological geometry, so the loop is bounded explicitly.
pub const MAX_POCKET_RINGS: usize = 10_000;

/// Generate concentric spiral-in pocket rings for one closed boundary.
///
/// The first ring is the boundary offset inward by the tool radius; each
/// further ring offsets the previous result inward by the stepover distance
/// (`2 * radius * stepover_percent / 100`). When a step produces no ring the
/// generator retries at half and quarter stepover before abandoning that
/// branch; a fully degenerate first offset returns an empty list, which the
/// caller treats as "nothing to cut".
pub fn generate_pocket_subpaths(
    boundary: &BoundaryPath,
    tool: &Tool,
    clearance: &ClearanceIndex,
    offsetter: &dyn PolygonOffsetter,
    options: &MachineOptions,
) -> Vec<SubPath> {
    let fine = subdivide(&boundary.points, MAX_SEGMENT_LENGTH);
    if fine.len() < 3 {
        return Vec::new();
    }

    let stepover = 2.0 * tool.radius() * tool.stepover_percent / 100.0;
    if stepover <= f64::EPSILON {
        return Vec::new();
    }

    // Outermost ring first: the finishing contour along the boundary.
    let mut pending: Vec<Vec<PathPoint>> = offsetter.offset(&fine, tool.radius(), false);
    if pending.is_empty() {
        debug!("pocket boundary collapsed at the first offset");
        return Vec::new();
    }

    let mut rings: Vec<Vec<PathPoint>> = Vec::new();
    while let Some(ring) = pending.pop() {
        if rings.len() >= MAX_POCKET_RINGS {
            warn!(cap = MAX_POCKET_RINGS, "pocket ring cap reached, stopping");
            break;
        }
        let mut next = offsetter.offset(&ring, stepover, false);
        if next.is_empty() {
            next = offsetter.offset(&ring, stepover / 2.0, false);
            if next.is_empty() {
                next = offsetter.offset(&ring, stepover / 4.0, false);
            }
            if !next.is_empty() {
                debug!("pocket stepover fallback produced rings");
            }
        }
        rings.push(ring);
        pending.extend(next);
    }

    rings
        .into_iter()
        .filter_map(|ring| ring_to_subpath(ring, tool, OperationKind::Pocket, clearance, options))
        .collect()
}
