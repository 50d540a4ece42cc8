use crate::error::CamError;
use crate::types::{BoundaryPath, OperationKind, PathPoint, SubPath, Tool};
use std::collections::HashMap;
use tracing::warn;

/// Inscribed-radius threshold below which medial segments are discarded.
pub const MEDIAL_THRESHOLD: f64 = 0.1;
/// Filtering angle for spurious corner branches.
pub const MEDIAL_FILTER_ANGLE: f64 = 3.0 * std::f64::consts::PI / 4.0;

/// One edge of the medial-axis segment graph: a centerline segment with the
/// maximal inscribed radius at each end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MedialSegment {
    pub p0: PathPoint,
    pub p1: PathPoint,
    pub r0: f64,
    pub r1: f64,
}

/// Medial-axis computation capability.
///
/// Preconditions: `outer` is a closed ring, `holes` are closed rings fully
/// inside it. Postcondition: an UNORDERED set of centerline segments with
/// per-end inscribed radii; segments whose radius falls below `threshold`
/// are filtered, as are corner branches sharper than `filtering_angle`.
/// The planner, not the computer, is responsible for ordering.
pub trait MedialAxisComputer {
    fn compute(
        &self,
        outer: &[PathPoint],
        holes: &[Vec<PathPoint>],
        threshold: f64,
        filtering_angle: f64,
    ) -> Vec<MedialSegment>;
}

/// A boundary with the other selected boundaries it contains.
#[derive(Debug, Clone)]
pub struct CarveRegion {
    pub outer: Vec<PathPoint>,
    pub holes: Vec<Vec<PathPoint>>,
}

/// Split a selection into regions: a boundary is a hole of another when its
/// points lie inside that boundary. VCarveOut skips hole subtraction and
/// carves each selected ring independently.
pub fn classify_regions(boundaries: &[BoundaryPath], operation: OperationKind) -> Vec<CarveRegion> {
    use crate::geometry::point_in_polygon;

    if operation == OperationKind::VCarveOut {
        return boundaries
            .iter()
            .filter(|b| b.points.len() >= 3)
            .map(|b| CarveRegion {
                outer: b.points.clone(),
                holes: Vec::new(),
            })
            .collect();
    }

    let n = boundaries.len();
    let mut hole_of: Vec<Option<usize>> = vec![None; n];
    for i in 0..n {
        let probe = match boundaries[i].points.first() {
            Some(p) => *p,
            None => continue,
        };
        for j in 0..n {
            if i == j || boundaries[j].points.len() < 3 {
                continue;
            }
            if point_in_polygon(probe.x, probe.y, &boundaries[j].points) {
                hole_of[i] = Some(j);
                break;
            }
        }
    }

    let mut regions = Vec::new();
    for i in 0..n {
        if hole_of[i].is_some() || boundaries[i].points.len() < 3 {
            continue;
        }
        let holes = (0..n)
            .filter(|&k| hole_of[k] == Some(i))
            .map(|k| boundaries[k].points.clone())
            .collect();
        regions.push(CarveRegion {
            outer: boundaries[i].points.clone(),
            holes,
        });
    }
    regions
}

/// Plan the V-carve sub paths for one region.
///
/// The computer returns an unordered edge set; this function extracts a
/// connected walk visiting every edge once, restarting at the nearest
/// unvisited edge only when stuck. Every restart costs one tool lift and
/// starts a new sub path. Point radii are clamped to the V-bit's maximum
/// half-width at full depth, with interpolated transition points inserted
/// where a segment crosses the clamp boundary so depth stays continuous.
pub fn plan_vcarve_region(
    region: &CarveRegion,
    tool: &Tool,
    computer: &dyn MedialAxisComputer,
) -> Result<Vec<SubPath>, CamError> {
    let segments = computer.compute(
        &region.outer,
        &region.holes,
        MEDIAL_THRESHOLD,
        MEDIAL_FILTER_ANGLE,
    );
    if segments.is_empty() {
        return Err(CamError::MedialAxisFailure {
            reason: "medial axis computer returned an empty segment graph".to_string(),
        });
    }

    let walks = extract_walks(&segments);
    if walks.is_empty() {
        return Err(CamError::MedialAxisFailure {
            reason: "segment graph produced no traversable walk".to_string(),
        });
    }

    let r_max = tool.vbit_max_radius();
    let sub_paths = walks
        .into_iter()
        .filter(|walk| walk.len() >= 2)
        .map(|walk| {
            let cut = clamp_radii(&walk, r_max);
            SubPath {
                center_path: walk,
                cut_path: cut,
            }
        })
        .collect();
    Ok(sub_paths)
}

const NODE_QUANTUM: f64 = 1e-3;

fn node_key(p: &PathPoint) -> (i64, i64) {
    (
        (p.x / NODE_QUANTUM).round() as i64,
        (p.y / NODE_QUANTUM).round() as i64,
    )
}

/// Extract edge-covering trails from the unordered segment set. Greedy
/// Hierholzer-style: each trail starts at an odd-degree node when one
/// remains (an Euler trail endpoint), preferring the node nearest the
/// previous trail's end, and extends until no unused incident edge is left.
fn extract_walks(segments: &[MedialSegment]) -> Vec<Vec<PathPoint>> {
    #[derive(Clone, Copy)]
    struct HalfEdge {
        to: usize,
        seg: usize,
        forward: bool,
    }

    fn intern(
        nodes: &mut Vec<PathPoint>,
        radii: &mut Vec<f64>,
        index: &mut HashMap<(i64, i64), usize>,
        p: &PathPoint,
        r: f64,
    ) -> usize {
        let key = node_key(p);
        if let Some(&id) = index.get(&key) {
            return id;
        }
        nodes.push(*p);
        radii.push(r);
        index.insert(key, nodes.len() - 1);
        nodes.len() - 1
    }

    let mut nodes: Vec<PathPoint> = Vec::new();
    let mut radii: Vec<f64> = Vec::new();
    let mut index: HashMap<(i64, i64), usize> = HashMap::new();
    let mut endpoints: Vec<(usize, usize)> = Vec::with_capacity(segments.len());
    for seg in segments {
        let a = intern(&mut nodes, &mut radii, &mut index, &seg.p0, seg.r0);
        let b = intern(&mut nodes, &mut radii, &mut index, &seg.p1, seg.r1);
        endpoints.push((a, b));
    }

    let mut adjacency: Vec<Vec<HalfEdge>> = vec![Vec::new(); nodes.len()];
    for (si, &(a, b)) in endpoints.iter().enumerate() {
        if a == b {
            continue;
        }
        adjacency[a].push(HalfEdge {
            to: b,
            seg: si,
            forward: true,
        });
        adjacency[b].push(HalfEdge {
            to: a,
            seg: si,
            forward: false,
        });
    }

    let mut used = vec![false; segments.len()];
    let mut remaining: usize = adjacency.iter().map(|a| a.len()).sum::<usize>() / 2;
    let degree_left = |adjacency: &Vec<Vec<HalfEdge>>, used: &Vec<bool>, n: usize| -> usize {
        adjacency[n].iter().filter(|e| !used[e.seg]).count()
    };

    let mut walks: Vec<Vec<PathPoint>> = Vec::new();
    let mut cursor: Option<PathPoint> = None;

    while remaining > 0 {
        // Prefer an odd-degree node (trail endpoint); otherwise any node
        // with unused edges. Among candidates pick the one nearest to where
        // the tool currently is, to keep the connecting rapid short.
        let mut start: Option<usize> = None;
        let mut best = f64::MAX;
        for n in 0..nodes.len() {
            let deg = degree_left(&adjacency, &used, n);
            if deg == 0 {
                continue;
            }
            let odd = deg % 2 == 1;
            let dist = cursor.map_or(0.0, |c| c.distance_to(&nodes[n]));
            // Odd nodes win over even; ties broken by distance.
            let score = if odd { dist } else { dist + 1e9 };
            if start.is_none() || score < best {
                start = Some(n);
                best = score;
            }
        }
        let Some(mut at) = start else { break };

        let mut walk = vec![PathPoint::with_radius(nodes[at].x, nodes[at].y, radii[at])];
        loop {
            let next = adjacency[at].iter().copied().find(|e| !used[e.seg]);
            let Some(edge) = next else { break };
            used[edge.seg] = true;
            remaining -= 1;
            let seg = &segments[edge.seg];
            let (p, r) = if edge.forward {
                (seg.p1, seg.r1)
            } else {
                (seg.p0, seg.r0)
            };
            walk.push(PathPoint::with_radius(p.x, p.y, r));
            at = edge.to;
        }
        cursor = walk.last().copied();
        walks.push(walk);
    }
    walks
}

/// Clamp per-point radii to `r_max`, inserting an interpolated point at each
/// crossing of the clamp boundary.
fn clamp_radii(walk: &[PathPoint], r_max: f64) -> Vec<PathPoint> {
    let mut out: Vec<PathPoint> = Vec::with_capacity(walk.len());
    for (i, p) in walk.iter().enumerate() {
        let r = p.r.unwrap_or(0.0);
        if i > 0 {
            let prev = &walk[i - 1];
            let pr = prev.r.unwrap_or(0.0);
            let crosses = (pr < r_max && r > r_max) || (pr > r_max && r < r_max);
            if crosses && (r - pr).abs() > f64::EPSILON {
                let t = (r_max - pr) / (r - pr);
                out.push(PathPoint::with_radius(
                    prev.x + t * (p.x - prev.x),
                    prev.y + t * (p.y - prev.y),
                    r_max,
                ));
            }
        }
        out.push(PathPoint::with_radius(p.x, p.y, r.min(r_max)));
    }
    out
}

/// A canned computer for hosts and tests that already have a segment graph.
pub struct FixedMedialAxis(pub Vec<MedialSegment>);

impl MedialAxisComputer for FixedMedialAxis {
    fn compute(
        &self,
        _outer: &[PathPoint],
        _holes: &[Vec<PathPoint>],
        _threshold: f64,
        _filtering_angle: f64,
    ) -> Vec<MedialSegment> {
        self.0.clone()
    }
}

/// Plan every region of a V-carve selection; a failed region is logged and
/// skipped so other boundaries still proceed. Errors only when no region
/// succeeds.
pub fn plan_vcarve(
    boundaries: &[BoundaryPath],
    tool: &Tool,
    operation: OperationKind,
    computer: &dyn MedialAxisComputer,
) -> Result<Vec<SubPath>, CamError> {
    let regions = classify_regions(boundaries, operation);
    if regions.is_empty() {
        return Err(CamError::NoPathSelected {
            operation: "V-Carve".to_string(),
        });
    }

    let mut sub_paths = Vec::new();
    let mut last_err = None;
    for region in &regions {
        match plan_vcarve_region(region, tool, computer) {
            Ok(mut subs) => sub_paths.append(&mut subs),
            Err(err) => {
                warn!(%err, "v-carve region failed, continuing with others");
                last_err = Some(err);
            }
        }
    }
    if sub_paths.is_empty() {
        return Err(last_err.unwrap_or(CamError::MedialAxisFailure {
            reason: "no region produced a toolpath".to_string(),
        }));
    }
    Ok(sub_paths)
}
