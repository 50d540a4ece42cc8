use crate::geometry::{dedup_points, point_in_polygon, subdivide, Bounds};
use crate::types::PathPoint;
use crate::vcarve::{MedialAxisComputer, MedialSegment};
use geo::algorithm::euclidean_distance::EuclideanDistance;
use geo::{LineString, Point};
use std::collections::HashSet;

/// Bundled medial-axis implementation.
///
/// Walks the (subdivided) boundary and, for each sample, pushes a circle
/// center along the inward normal until the circle is maximally inscribed
/// (binary search on the center's distance to the boundary). Consecutive
/// samples give centerline segments; branches meeting at sharp corners are
/// filtered by the contact-angle criterion. Accuracy is bounded by the
/// sample spacing; a Voronoi-backed computer can be substituted through the
/// `MedialAxisComputer` trait without touching the planner.
#[derive(Debug, Clone, Copy)]
pub struct SampledMedialAxis {
    /// Boundary sample spacing in world units.
    pub spacing: f64,
}

impl Default for SampledMedialAxis {
    fn default() -> Self {
        Self { spacing: 1.0 }
    }
}

struct RegionShape {
    outer: Vec<PathPoint>,
    holes: Vec<Vec<PathPoint>>,
    rings: Vec<LineString<f64>>,
}

impl RegionShape {
    fn new(outer: &[PathPoint], holes: &[Vec<PathPoint>]) -> Self {
        let to_line = |pts: &[PathPoint]| -> LineString<f64> {
            let mut xy: Vec<(f64, f64)> = pts.iter().map(|p| (p.x, p.y)).collect();
            if let (Some(first), Some(last)) = (xy.first().copied(), xy.last().copied()) {
                if first != last {
                    xy.push(first);
                }
            }
            xy.into()
        };
        let mut rings = vec![to_line(outer)];
        rings.extend(holes.iter().map(|h| to_line(h)));
        Self {
            outer: outer.to_vec(),
            holes: holes.to_vec(),
            rings,
        }
    }

    fn boundary_distance(&self, x: f64, y: f64) -> f64 {
        let p = Point::new(x, y);
        self.rings
            .iter()
            .map(|ring| p.euclidean_distance(ring))
            .fold(f64::MAX, f64::min)
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        point_in_polygon(x, y, &self.outer)
            && !self.holes.iter().any(|h| point_in_polygon(x, y, h))
    }
}

/// A boundary sample together with its maximal inscribed circle.
struct MedialSample {
    contact: PathPoint,
    center: PathPoint,
    radius: f64,
}

impl MedialAxisComputer for SampledMedialAxis {
    fn compute(
        &self,
        outer: &[PathPoint],
        holes: &[Vec<PathPoint>],
        threshold: f64,
        filtering_angle: f64,
    ) -> Vec<MedialSegment> {
        let outer = dedup_points(outer);
        if outer.len() < 3 {
            return Vec::new();
        }
        let shape = RegionShape::new(&outer, holes);
        let max_reach = match Bounds::of_points(&outer) {
            Some(b) => b.width().max(b.height()),
            None => return Vec::new(),
        };

        let mut segments = Vec::new();
        let mut seen: HashSet<((i64, i64), (i64, i64))> = HashSet::new();

        let mut all_rings: Vec<Vec<PathPoint>> = vec![outer.clone()];
        all_rings.extend(holes.iter().cloned());

        for ring in &all_rings {
            let samples = self.ring_samples(ring, &shape, max_reach);
            for pair in samples.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if a.radius < threshold || b.radius < threshold {
                    continue;
                }
                if !contact_angle_ok(a, b, filtering_angle) {
                    continue;
                }
                let key = ordered_key(&a.center, &b.center);
                if key.0 == key.1 || !seen.insert(key) {
                    continue;
                }
                segments.push(MedialSegment {
                    p0: a.center,
                    p1: b.center,
                    r0: a.radius,
                    r1: b.radius,
                });
            }
        }
        segments
    }
}

impl SampledMedialAxis {
    fn ring_samples(
        &self,
        ring: &[PathPoint],
        shape: &RegionShape,
        max_reach: f64,
    ) -> Vec<MedialSample> {
        let mut closed = dedup_points(ring);
        if closed.len() < 3 {
            return Vec::new();
        }
        if closed.first() != closed.last() {
            let first = closed[0];
            closed.push(first);
        }
        let fine = subdivide(&closed, self.spacing);
        let n = fine.len() - 1; // last duplicates first

        let mut samples = Vec::with_capacity(n);
        for i in 0..n {
            let prev = fine[(i + n - 1) % n];
            let here = fine[i];
            let next = fine[(i + 1) % n];
            let Some(normal) = inward_normal(&prev, &here, &next, shape) else {
                continue;
            };
            if let Some((center, radius)) = inscribe(&here, normal, shape, max_reach) {
                samples.push(MedialSample {
                    contact: here,
                    center,
                    radius,
                });
            }
        }
        samples
    }
}

/// Unit normal at `here` pointing into the material, or None when the local
/// tangent is degenerate or neither side is inside the region.
fn inward_normal(
    prev: &PathPoint,
    here: &PathPoint,
    next: &PathPoint,
    shape: &RegionShape,
) -> Option<(f64, f64)> {
    let tx = next.x - prev.x;
    let ty = next.y - prev.y;
    let len = (tx * tx + ty * ty).sqrt();
    if len < f64::EPSILON {
        return None;
    }
    let (nx, ny) = (-ty / len, tx / len);
    let probe = 1e-3;
    if shape.contains(here.x + nx * probe, here.y + ny * probe) {
        Some((nx, ny))
    } else if shape.contains(here.x - nx * probe, here.y - ny * probe) {
        Some((-nx, -ny))
    } else {
        None
    }
}

/// Push a circle center from `contact` along `normal` to the maximal
/// inscribed position: the largest `t` where the circle of radius `t`
/// centered at `contact + t*normal` still only touches the boundary.
fn inscribe(
    contact: &PathPoint,
    normal: (f64, f64),
    shape: &RegionShape,
    max_reach: f64,
) -> Option<(PathPoint, f64)> {
    const TOL: f64 = 1e-4;
    let fits = |t: f64| -> bool {
        let cx = contact.x + normal.0 * t;
        let cy = contact.y + normal.1 * t;
        shape.boundary_distance(cx, cy) >= t - TOL
    };

    if !fits(TOL) {
        return None;
    }
    let mut lo = TOL;
    let mut hi = max_reach;
    if fits(hi) {
        lo = hi;
    } else {
        for _ in 0..48 {
            let mid = (lo + hi) / 2.0;
            if fits(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
    }
    let cx = contact.x + normal.0 * lo;
    let cy = contact.y + normal.1 * lo;
    let radius = shape.boundary_distance(cx, cy);
    Some((PathPoint::new(cx, cy), radius))
}

/// Reject a candidate segment when the contact directions at its two
/// endpoints swing by more than the filtering angle; that happens when two
/// unrelated medial branches meet at a corner.
fn contact_angle_ok(a: &MedialSample, b: &MedialSample, filtering_angle: f64) -> bool {
    let da = (a.contact.x - a.center.x, a.contact.y - a.center.y);
    let db = (b.contact.x - b.center.x, b.contact.y - b.center.y);
    let la = (da.0 * da.0 + da.1 * da.1).sqrt();
    let lb = (db.0 * db.0 + db.1 * db.1).sqrt();
    if la < f64::EPSILON || lb < f64::EPSILON {
        return false;
    }
    let cos = ((da.0 * db.0 + da.1 * db.1) / (la * lb)).clamp(-1.0, 1.0);
    cos.acos() <= filtering_angle
}

const KEY_QUANTUM: f64 = 1e-3;

fn ordered_key(a: &PathPoint, b: &PathPoint) -> ((i64, i64), (i64, i64)) {
    let ka = (
        (a.x / KEY_QUANTUM).round() as i64,
        (a.y / KEY_QUANTUM).round() as i64,
    );
    let kb = (
        (b.x / KEY_QUANTUM).round() as i64,
        (b.y / KEY_QUANTUM).round() as i64,
    );
    if ka <= kb {
        (ka, kb)
    } else {
        (kb, ka)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point_to_path_distance;
    use crate::vcarve::{MEDIAL_FILTER_ANGLE, MEDIAL_THRESHOLD};

    fn rect(w: f64, h: f64) -> Vec<PathPoint> {
        vec![
            PathPoint::new(0.0, 0.0),
            PathPoint::new(w, 0.0),
            PathPoint::new(w, h),
            PathPoint::new(0.0, h),
            PathPoint::new(0.0, 0.0),
        ]
    }

    #[test]
    fn test_rectangle_spine_radius() {
        let segments = SampledMedialAxis::default().compute(
            &rect(40.0, 10.0),
            &[],
            MEDIAL_THRESHOLD,
            MEDIAL_FILTER_ANGLE,
        );
        assert!(!segments.is_empty(), "rectangle must yield a skeleton");
        // The long spine of a 40x10 rectangle runs at y=5 with radius 5.
        let spine: Vec<_> = segments
            .iter()
            .filter(|s| s.r0 > 4.5 && s.r1 > 4.5)
            .collect();
        assert!(!spine.is_empty(), "expected near-max-radius spine segments");
        for s in spine {
            assert!((s.p0.y - 5.0).abs() < 0.5, "spine point off-center: {:?}", s.p0);
            assert!(s.r0 <= 5.0 + 0.1 && s.r1 <= 5.0 + 0.1, "radius exceeds half-height");
        }
    }

    #[test]
    fn test_radii_never_exceed_inscribed_bound() {
        let segments = SampledMedialAxis::default().compute(
            &rect(30.0, 30.0),
            &[],
            MEDIAL_THRESHOLD,
            MEDIAL_FILTER_ANGLE,
        );
        for s in &segments {
            assert!(s.r0 <= 15.0 + 0.1);
            assert!(s.r1 <= 15.0 + 0.1);
        }
    }

    #[test]
    fn test_hole_limits_radius() {
        let outer = rect(40.0, 40.0);
        let hole = vec![
            PathPoint::new(15.0, 15.0),
            PathPoint::new(25.0, 15.0),
            PathPoint::new(25.0, 25.0),
            PathPoint::new(15.0, 25.0),
            PathPoint::new(15.0, 15.0),
        ];
        let segments = SampledMedialAxis::default().compute(
            &outer,
            &[hole.clone()],
            MEDIAL_THRESHOLD,
            MEDIAL_FILTER_ANGLE,
        );
        assert!(!segments.is_empty());
        // Every inscribed radius is bounded by the true distance to the
        // nearest boundary, the hole included. A fixed bound would be wrong:
        // circles near the outer corners legitimately beat the width of the
        // straight band between hole and wall.
        for s in &segments {
            for (p, r) in [(&s.p0, s.r0), (&s.p1, s.r1)] {
                let limit = point_to_path_distance(p.x, p.y, &outer)
                    .min(point_to_path_distance(p.x, p.y, &hole));
                assert!(
                    r <= limit + 0.2,
                    "radius {r} at ({}, {}) exceeds boundary distance {limit}",
                    p.x,
                    p.y
                );
            }
        }
        // The straight band between hole and wall is 15mm wide, so the
        // skeleton must carry radii well below the hole-free 20mm center.
        assert!(
            segments.iter().all(|s| s.r0 <= 15.0 && s.r1 <= 15.0),
            "some radius ignores the hole entirely"
        );
    }

    #[test]
    fn test_degenerate_input_yields_nothing() {
        let segments = SampledMedialAxis::default().compute(
            &[PathPoint::new(0.0, 0.0), PathPoint::new(1.0, 0.0)],
            &[],
            MEDIAL_THRESHOLD,
            MEDIAL_FILTER_ANGLE,
        );
        assert!(segments.is_empty());
    }
}
