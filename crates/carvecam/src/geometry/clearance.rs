use crate::geometry::Bounds;
use crate::types::{BoundaryPath, PathPoint};
use geo::algorithm::euclidean_distance::EuclideanDistance;
use geo::{LineString, Point};

/// Prepared view of the document's boundaries for repeated clearance
/// queries: each path carries its bounding box and a prebuilt line string.
pub struct ClearanceIndex {
    paths: Vec<(Bounds, LineString<f64>)>,
}

impl ClearanceIndex {
    /// Build an index over every path except the one being offset (a tool
    /// following its own boundary always "touches" it).
    pub fn build(all_paths: &[BoundaryPath], exclude: Option<usize>) -> Self {
        let mut paths = Vec::new();
        for (i, path) in all_paths.iter().enumerate() {
            if Some(i) == exclude || path.points.len() < 2 {
                continue;
            }
            if let Some(bounds) = Bounds::of_points(&path.points) {
                let line: LineString<f64> =
                    path.points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>().into();
                paths.push((bounds, line));
            }
        }
        Self { paths }
    }

    /// True iff a tool circle centered at `point` with `radius` stays clear
    /// of every indexed boundary. Paths are prefiltered by bounding box
    /// against the query box expanded by `radius * 2.0`; without the
    /// prefilter many-path documents are unusably slow.
    pub fn fits(&self, point: &PathPoint, radius: f64) -> bool {
        let query = Bounds {
            min_x: point.x,
            min_y: point.y,
            max_x: point.x,
            max_y: point.y,
        }
        .expanded(radius * 2.0);
        let center = Point::new(point.x, point.y);

        for (bounds, line) in &self.paths {
            if !bounds.intersects(&query) {
                continue;
            }
            if center.euclidean_distance(line) < radius {
                return false;
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundaryPath;

    fn square_at(x: f64, y: f64, size: f64) -> BoundaryPath {
        BoundaryPath::from_xy(
            &[
                (x, y),
                (x + size, y),
                (x + size, y + size),
                (x, y + size),
                (x, y),
            ],
            true,
        )
    }

    #[test]
    fn test_fits_away_from_boundaries() {
        let paths = vec![square_at(0.0, 0.0, 10.0)];
        let index = ClearanceIndex::build(&paths, None);
        assert!(index.fits(&PathPoint::new(50.0, 50.0), 3.0));
    }

    #[test]
    fn test_does_not_fit_when_crossing() {
        let paths = vec![square_at(0.0, 0.0, 10.0)];
        let index = ClearanceIndex::build(&paths, None);
        // Center 1mm from the right edge, radius 3: the circle crosses.
        assert!(!index.fits(&PathPoint::new(11.0, 5.0), 3.0));
    }

    #[test]
    fn test_excluded_path_is_ignored() {
        let paths = vec![square_at(0.0, 0.0, 10.0)];
        let index = ClearanceIndex::build(&paths, Some(0));
        assert!(index.fits(&PathPoint::new(10.0, 5.0), 3.0));
    }

    #[test]
    fn test_prefilter_skips_distant_paths() {
        let mut paths = vec![square_at(0.0, 0.0, 10.0)];
        for i in 0..100 {
            paths.push(square_at(1000.0 + i as f64 * 20.0, 1000.0, 10.0));
        }
        let index = ClearanceIndex::build(&paths, None);
        assert!(!index.fits(&PathPoint::new(9.0, 5.0), 3.0));
        assert!(index.fits(&PathPoint::new(500.0, 500.0), 3.0));
    }
}
