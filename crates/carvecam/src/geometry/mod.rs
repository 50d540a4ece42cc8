pub mod clearance;
pub mod offset;

use crate::types::PathPoint;

/// Axis-aligned bounding box used for clearance prefiltering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn of_points(points: &[PathPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut b = Bounds {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in &points[1..] {
            b.min_x = b.min_x.min(p.x);
            b.min_y = b.min_y.min(p.y);
            b.max_x = b.max_x.max(p.x);
            b.max_y = b.max_y.max(p.y);
        }
        Some(b)
    }

    pub fn expanded(&self, margin: f64) -> Self {
        Bounds {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Twice the signed area of a ring; positive for counter-clockwise winding.
pub fn signed_area(points: &[PathPoint]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = &points[i];
        let b = &points[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

pub fn is_counter_clockwise(points: &[PathPoint]) -> bool {
    signed_area(points) > 0.0
}

/// Ray-cast point-in-polygon test.
pub fn point_in_polygon(x: f64, y: f64, polygon: &[PathPoint]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (polygon[i].x, polygon[i].y);
        let (xj, yj) = (polygon[j].x, polygon[j].y);
        let intersect = ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi);
        if intersect {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Minimum distance from a point to the segment (a, b).
pub fn point_to_segment_distance(px: f64, py: f64, a: &PathPoint, b: &PathPoint) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq <= f64::EPSILON {
        return ((px - a.x).powi(2) + (py - a.y).powi(2)).sqrt();
    }
    let t = (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    let cx = a.x + t * dx;
    let cy = a.y + t * dy;
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

/// Minimum distance from a point to an open polyline.
pub fn point_to_path_distance(px: f64, py: f64, path: &[PathPoint]) -> f64 {
    let mut best = f64::MAX;
    for w in path.windows(2) {
        best = best.min(point_to_segment_distance(px, py, &w[0], &w[1]));
    }
    if path.len() == 1 {
        best = ((px - path[0].x).powi(2) + (py - path[0].y).powi(2)).sqrt();
    }
    best
}

/// Subdivide a path so no segment exceeds `max_len`. The offset engine needs
/// this resolution to track tight corners.
pub fn subdivide(points: &[PathPoint], max_len: f64) -> Vec<PathPoint> {
    let mut out = Vec::with_capacity(points.len());
    if points.is_empty() {
        return out;
    }
    out.push(points[0]);
    for w in points.windows(2) {
        let (a, b) = (&w[0], &w[1]);
        let len = a.distance_to(b);
        if len > max_len {
            let steps = (len / max_len).ceil() as usize;
            for s in 1..steps {
                let t = s as f64 / steps as f64;
                out.push(PathPoint {
                    x: a.x + t * (b.x - a.x),
                    y: a.y + t * (b.y - a.y),
                    r: a.r,
                });
            }
        }
        out.push(*b);
    }
    out
}

/// Ensure the ring's last point duplicates its first.
pub fn close_ring(points: &mut Vec<PathPoint>) {
    if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
        if (first.x - last.x).abs() > f64::EPSILON || (first.y - last.y).abs() > f64::EPSILON {
            points.push(first);
        }
    }
}

/// Drop consecutive duplicate points (zero-length segments).
pub fn dedup_points(points: &[PathPoint]) -> Vec<PathPoint> {
    let mut out: Vec<PathPoint> = Vec::with_capacity(points.len());
    for p in points {
        if let Some(prev) = out.last() {
            if (prev.x - p.x).abs() < 1e-9 && (prev.y - p.y).abs() < 1e-9 {
                continue;
            }
        }
        out.push(*p);
    }
    out
}

/// Cumulative arc length at each point of a path; index 0 is 0.0.
pub fn cumulative_lengths(path: &[PathPoint]) -> Vec<f64> {
    let mut out = Vec::with_capacity(path.len());
    let mut acc = 0.0;
    out.push(0.0);
    for w in path.windows(2) {
        acc += w[0].distance_to(&w[1]);
        out.push(acc);
    }
    out
}

/// A location on a path: segment index plus fraction along that segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathLocation {
    pub segment: usize,
    pub t: f64,
}

impl PathLocation {
    pub fn position(&self, path: &[PathPoint]) -> PathPoint {
        let a = &path[self.segment];
        let b = &path[(self.segment + 1).min(path.len() - 1)];
        PathPoint {
            x: a.x + self.t * (b.x - a.x),
            y: a.y + self.t * (b.y - a.y),
            r: a.r,
        }
    }
}

/// Walk `distance` of arc length from `from` along the path, forward or
/// backward, crossing segment boundaries. Closed paths wrap around; open
/// paths clamp at their ends.
pub fn walk_path(
    path: &[PathPoint],
    from: PathLocation,
    distance: f64,
    forward: bool,
    closed: bool,
) -> PathLocation {
    let nseg = path.len().saturating_sub(1);
    if nseg == 0 {
        return from;
    }
    let seg_len = |i: usize| path[i].distance_to(&path[i + 1]);

    let mut seg = from.segment.min(nseg - 1);
    let mut remaining = distance;
    let mut t = from.t;

    if forward {
        loop {
            let len = seg_len(seg);
            let available = (1.0 - t) * len;
            if remaining <= available || len <= f64::EPSILON {
                if len > f64::EPSILON {
                    t += remaining / len;
                }
                return PathLocation { segment: seg, t };
            }
            remaining -= available;
            if seg + 1 >= nseg {
                if closed {
                    seg = 0;
                } else {
                    return PathLocation {
                        segment: nseg - 1,
                        t: 1.0,
                    };
                }
            } else {
                seg += 1;
            }
            t = 0.0;
        }
    } else {
        loop {
            let len = seg_len(seg);
            let available = t * len;
            if remaining <= available || len <= f64::EPSILON {
                if len > f64::EPSILON {
                    t -= remaining / len;
                }
                return PathLocation { segment: seg, t };
            }
            remaining -= available;
            if seg == 0 {
                if closed {
                    seg = nseg - 1;
                } else {
                    return PathLocation { segment: 0, t: 0.0 };
                }
            } else {
                seg -= 1;
            }
            t = 1.0;
        }
    }
}
