use crate::geometry::clearance::ClearanceIndex;
use crate::geometry::offset::PolygonOffsetter;
use crate::geometry::{close_ring, is_counter_clockwise, subdivide};
use crate::types::{BoundaryPath, CutDirection, MachineOptions, OperationKind, PathPoint, SubPath, Tool};
use tracing::debug;

/// Boundary segments are split to this length before offsetting so the
/// offset curve has enough resolution around corners.
pub const MAX_SEGMENT_LENGTH: f64 = 2.0;

/// Generate the sub paths for one profile-family operation (Inside, Outside,
/// Center or Drill) on one boundary.
///
/// Center applies the tool radius per point instead of displacing the curve;
/// Drill bypasses geometry entirely and places a single point at the
/// boundary's centroid. An empty result means the offset collapsed, which is
/// "nothing to cut" rather than an error.
pub fn generate_profile_subpaths(
    boundary: &BoundaryPath,
    tool: &Tool,
    operation: OperationKind,
    clearance: &ClearanceIndex,
    offsetter: &dyn PolygonOffsetter,
    options: &MachineOptions,
) -> Vec<SubPath> {
    if operation == OperationKind::Drill {
        return drill_subpath(boundary, tool);
    }

    let fine = subdivide(&boundary.points, MAX_SEGMENT_LENGTH);
    if fine.len() < 3 {
        return Vec::new();
    }

    let rings: Vec<Vec<PathPoint>> = match operation {
        OperationKind::Inside => offsetter.offset(&fine, tool.radius(), false),
        OperationKind::Outside => offsetter.offset(&fine, tool.radius(), true),
        OperationKind::Center => {
            let mut ring: Vec<PathPoint> = fine
                .iter()
                .map(|p| PathPoint::with_radius(p.x, p.y, tool.radius()))
                .collect();
            if boundary.closed {
                close_ring(&mut ring);
            }
            vec![ring]
        }
        _ => Vec::new(),
    };

    if rings.is_empty() {
        debug!(op = %operation, "offset collapsed, nothing to cut");
        return Vec::new();
    }

    let mut sub_paths = Vec::new();
    for ring in rings {
        let Some(sub) = ring_to_subpath(ring, tool, operation, clearance, options) else {
            continue;
        };
        sub_paths.push(sub);
    }
    sub_paths
}

fn drill_subpath(boundary: &BoundaryPath, tool: &Tool) -> Vec<SubPath> {
    let pts = &boundary.points;
    if pts.is_empty() {
        return Vec::new();
    }
    // Centroid of the boundary points; for a drilled circle that is its
    // center. The closing duplicate is skipped to keep the average unbiased.
    let n = if boundary.closed && pts.len() > 1 {
        pts.len() - 1
    } else {
        pts.len()
    };
    let cx = pts[..n].iter().map(|p| p.x).sum::<f64>() / n as f64;
    let cy = pts[..n].iter().map(|p| p.y).sum::<f64>() / n as f64;
    let point = PathPoint::with_radius(cx, cy, tool.radius());
    vec![SubPath {
        center_path: vec![point],
        cut_path: vec![point, point],
    }]
}

/// Clearance-filter a ring, close it, and apply the winding correction.
pub(crate) fn ring_to_subpath(
    ring: Vec<PathPoint>,
    tool: &Tool,
    operation: OperationKind,
    clearance: &ClearanceIndex,
    options: &MachineOptions,
) -> Option<SubPath> {
    let effective_radius = (tool.radius() - options.tolerance).max(0.0);
    let mut kept: Vec<PathPoint> = ring
        .iter()
        .filter(|p| clearance.fits(p, effective_radius))
        .copied()
        .collect();

    if kept.len() < 2 {
        debug!(op = %operation, "ring fully rejected by clearance check");
        return None;
    }

    // The filter can drop the closing duplicate; restore it when the whole
    // ring survived.
    if kept.len() == ring.len() || kept.len() + 1 == ring.len() {
        close_ring(&mut kept);
    }

    apply_winding(&mut kept, operation, tool.direction);

    Some(SubPath {
        center_path: ring,
        cut_path: kept,
    })
}

/// Climb vs conventional is defined against material-side engagement, not
/// raw polygon winding: an inside profile on a counter-clockwise ring cuts
/// climb when traversed clockwise, so Inside reverses for Climb and
/// Outside/Pocket reverse for Conventional.
pub(crate) fn apply_winding(ring: &mut Vec<PathPoint>, operation: OperationKind, direction: CutDirection) {
    if ring.len() < 3 {
        return;
    }
    if !is_counter_clockwise(ring) {
        ring.reverse();
    }
    let reverse = match operation {
        OperationKind::Inside => direction == CutDirection::Climb,
        OperationKind::Outside | OperationKind::Pocket => direction == CutDirection::Conventional,
        _ => false,
    };
    if reverse {
        ring.reverse();
    }
}
