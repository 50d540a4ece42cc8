use crate::geometry::{close_ring, dedup_points};
use crate::types::PathPoint;
use clipper2::{inflate, EndType, JoinType, Path, PathType, Polygon, Polygons, Vertex};

const ARC_TOLERANCE: f64 = 0.025;
const MITER_LIMIT: f64 = 2.0;

/// Polygon offsetting capability.
///
/// Postconditions: every returned ring is closed (last point duplicates the
/// first) and free of zero-length segments. A degenerate input (radius at or
/// beyond the local feature size) may return zero or several disjoint rings;
/// an empty result means "nothing to cut", never an error.
pub trait PolygonOffsetter {
    fn offset(&self, boundary: &[PathPoint], radius: f64, outward: bool) -> Vec<Vec<PathPoint>>;
}

/// Default offsetter backed by clipper2 with miter joins.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClipperOffsetter;

impl PolygonOffsetter for ClipperOffsetter {
    fn offset(&self, boundary: &[PathPoint], radius: f64, outward: bool) -> Vec<Vec<PathPoint>> {
        let clean = dedup_points(boundary);
        if clean.len() < 3 {
            return Vec::new();
        }

        let delta = if outward { radius } else { -radius };
        let vertices: Vec<Vertex> = clean.iter().map(|p| Vertex::new(p.x, p.y)).collect();
        let path = Path::new(vertices, true);
        let polygon = Polygon::new(vec![path], PathType::Subject);
        let subject = Polygons::new(vec![polygon]);

        let result = inflate(
            subject,
            delta,
            JoinType::Miter,
            EndType::ClosedPolygon,
            MITER_LIMIT,
            ARC_TOLERANCE,
        );

        let mut rings = Vec::new();
        for polygon in result.polygons() {
            for path in polygon.paths() {
                let points: Vec<PathPoint> = path
                    .vertices()
                    .iter()
                    .map(|v| PathPoint::new(v.x(), v.y()))
                    .collect();
                let mut ring = dedup_points(&points);
                if ring.len() < 3 {
                    continue;
                }
                close_ring(&mut ring);
                rings.push(ring);
            }
        }
        rings
    }
}
