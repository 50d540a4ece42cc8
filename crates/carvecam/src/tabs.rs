use crate::geometry::{cumulative_lengths, walk_path, PathLocation};
use crate::types::{PathPoint, Tab};

/// Tab length along the tangent, mm, used when a tab does not carry its own.
pub const DEFAULT_TAB_LENGTH: f64 = 6.0;

/// Marker kind spliced into a cut path around a tab zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabMarkerKind {
    /// Raise Z to clear the tab before reaching it.
    Lift,
    /// Return Z to the pass depth after clearing it.
    Lower,
}

/// A marker at a position along the cut path, ordered by arc length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TabMarker {
    pub location: PathLocation,
    pub arc: f64,
    pub kind: TabMarkerKind,
}

/// A cut-path point with an optional marker spliced in front of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugmentedPoint {
    pub point: PathPoint,
    pub marker: Option<TabMarkerKind>,
}

/// Z level to hold over a tab: zero lift when the pass is shallower than the
/// material the tab reserves, otherwise exactly the tab surface, never the
/// safe/rapid height.
pub fn tab_clearance_z(pass_depth: f64, workpiece_thickness: f64, tab_height: f64) -> Option<f64> {
    let reserve = workpiece_thickness - tab_height;
    if pass_depth <= reserve {
        None
    } else {
        Some(-reserve)
    }
}

/// The oriented box a tab protects: tab length along the tangent, width
/// `4 * tool_radius` across it.
struct TabZone {
    x: f64,
    y: f64,
    half_len: f64,
    half_width: f64,
    ux: f64,
    uy: f64,
}

impl TabZone {
    fn new(tab: &Tab, tool_radius: f64, default_tab_length: f64) -> Self {
        let length = if tab.length > 0.0 {
            tab.length
        } else {
            default_tab_length
        };
        Self {
            x: tab.x,
            y: tab.y,
            half_len: length / 2.0,
            half_width: 2.0 * tool_radius,
            ux: tab.angle.cos(),
            uy: tab.angle.sin(),
        }
    }

    /// Box-local (tangent, normal) coordinates of a point.
    fn local(&self, p: &PathPoint) -> (f64, f64) {
        let dx = p.x - self.x;
        let dy = p.y - self.y;
        (dx * self.ux + dy * self.uy, dx * -self.uy + dy * self.ux)
    }

    fn contains(&self, p: &PathPoint) -> bool {
        let (u, v) = self.local(p);
        u.abs() <= self.half_len && v.abs() <= self.half_width
    }

    /// Fractional positions where segment (a, b) crosses the box boundary.
    /// Both plane pairs are checked: a path whose tangent disagrees with the
    /// tab angle enters through a side plane, not an end plane.
    fn crossings(&self, a: &PathPoint, b: &PathPoint) -> Vec<f64> {
        let (au, av) = self.local(a);
        let (bu, bv) = self.local(b);
        let mut out = Vec::new();
        plane_hits(au, bu, self.half_len, av, bv, self.half_width, &mut out);
        plane_hits(av, bv, self.half_width, au, bu, self.half_len, &mut out);
        out
    }
}

/// Crossings of one pair of parallel planes at `±limit`, kept when the other
/// box-local coordinate stays inside `±other_limit`.
fn plane_hits(
    sa: f64,
    sb: f64,
    limit: f64,
    oa: f64,
    ob: f64,
    other_limit: f64,
    out: &mut Vec<f64>,
) {
    let denom = sb - sa;
    if denom.abs() < f64::EPSILON {
        return;
    }
    for plane in [-limit, limit] {
        let t = (plane - sa) / denom;
        if !(0.0..=1.0).contains(&t) {
            continue;
        }
        let other = oa + t * (ob - oa);
        if other.abs() <= other_limit {
            out.push(t);
        }
    }
}

/// True when the path's first point already sits inside one of the tab
/// boxes. Such a pass must begin held at the tab clearance level: there is
/// no enter crossing ahead of the start to lift at.
pub fn start_in_tab_zone(
    cut_path: &[PathPoint],
    tabs: &[Tab],
    tool_radius: f64,
    default_tab_length: f64,
) -> bool {
    let Some(first) = cut_path.first() else {
        return false;
    };
    tabs.iter()
        .any(|tab| TabZone::new(tab, tool_radius, default_tab_length).contains(first))
}

/// Compute lift/lower markers for every crossing of the path into a tab's
/// oriented box (length along the tab tangent, width `4 * tool_radius`).
///
/// Lift markers are walked backward and lower markers forward by
/// `tool_radius` of arc length so the tool is already up when it arrives at
/// the tab. A segment wholly inside a zone contributes no marker: the lifted
/// state persists across it, and emitting anyway would double the markers.
pub fn compute_tab_markers(
    cut_path: &[PathPoint],
    tabs: &[Tab],
    tool_radius: f64,
    default_tab_length: f64,
) -> Vec<TabMarker> {
    if cut_path.len() < 2 || tabs.is_empty() {
        return Vec::new();
    }
    let closed = cut_path.first() == cut_path.last();
    let lengths = cumulative_lengths(cut_path);

    let mut markers = Vec::new();
    for tab in tabs {
        let zone = TabZone::new(tab, tool_radius, default_tab_length);

        for seg in 0..cut_path.len() - 1 {
            let a = &cut_path[seg];
            let b = &cut_path[seg + 1];
            if zone.contains(a) && zone.contains(b) {
                // Fully contained: the lifted state persists.
                continue;
            }

            let mut crossings = zone.crossings(a, b);
            if crossings.is_empty() {
                continue;
            }
            crossings.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));

            for t in crossings {
                // Probing just past the crossing decides enter vs exit in a
                // winding-independent way; clockwise and counter-clockwise
                // traversals land on opposite end planes but classify the
                // same.
                let probe = walk_point(a, b, (t + 1e-6).min(1.0));
                let entering = zone.contains(&probe);
                let from = PathLocation { segment: seg, t };
                let (kind, forward) = if entering {
                    (TabMarkerKind::Lift, false)
                } else {
                    (TabMarkerKind::Lower, true)
                };
                let location = walk_path(cut_path, from, tool_radius, forward, closed);
                let arc = location_arc(&lengths, cut_path, &location);
                markers.push(TabMarker {
                    location,
                    arc,
                    kind,
                });
            }
        }
    }

    markers.sort_by(|a, b| a.arc.partial_cmp(&b.arc).unwrap_or(std::cmp::Ordering::Equal));
    markers
}

fn walk_point(a: &PathPoint, b: &PathPoint, t: f64) -> PathPoint {
    PathPoint {
        x: a.x + t * (b.x - a.x),
        y: a.y + t * (b.y - a.y),
        r: a.r,
    }
}

fn location_arc(lengths: &[f64], path: &[PathPoint], loc: &PathLocation) -> f64 {
    let seg_len = path[loc.segment].distance_to(&path[loc.segment + 1]);
    lengths[loc.segment] + loc.t * seg_len
}

/// Splice markers into the point sequence, producing the augmented path the
/// synthesizer walks. Marker points are interpolated positions; each carries
/// its kind, plain points carry none.
pub fn splice_markers(cut_path: &[PathPoint], markers: &[TabMarker]) -> Vec<AugmentedPoint> {
    let lengths = cumulative_lengths(cut_path);
    let mut out: Vec<AugmentedPoint> = Vec::with_capacity(cut_path.len() + markers.len());
    let mut next_marker = 0usize;

    for (i, p) in cut_path.iter().enumerate() {
        let arc_here = lengths[i];
        while next_marker < markers.len() && markers[next_marker].arc <= arc_here + 1e-9 {
            let m = &markers[next_marker];
            out.push(AugmentedPoint {
                point: m.location.position(cut_path),
                marker: Some(m.kind),
            });
            next_marker += 1;
        }
        out.push(AugmentedPoint {
            point: *p,
            marker: None,
        });
    }
    while next_marker < markers.len() {
        let m = &markers[next_marker];
        out.push(AugmentedPoint {
            point: m.location.position(cut_path),
            marker: Some(m.kind),
        });
        next_marker += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_path() -> Vec<PathPoint> {
        (0..=10)
            .map(|i| PathPoint::new(i as f64 * 10.0, 0.0))
            .collect()
    }

    fn tab_at(x: f64, length: f64) -> Tab {
        Tab {
            x,
            y: 0.0,
            angle: 0.0,
            path_distance: x,
            length,
            height: 3.0,
        }
    }

    #[test]
    fn test_single_tab_yields_lift_then_lower() {
        let path = straight_path();
        let markers = compute_tab_markers(&path, &[tab_at(50.0, 8.0)], 3.0, 6.0);
        assert_eq!(markers.len(), 2, "one tab crossing produces two markers");
        assert_eq!(markers[0].kind, TabMarkerKind::Lift);
        assert_eq!(markers[1].kind, TabMarkerKind::Lower);
        // Tab zone spans x in [46, 54]; lift backs off by the tool radius.
        let lift = markers[0].location.position(&path);
        let lower = markers[1].location.position(&path);
        assert!((lift.x - 43.0).abs() < 1e-6, "lift at {}", lift.x);
        assert!((lower.x - 57.0).abs() < 1e-6, "lower at {}", lower.x);
    }

    #[test]
    fn test_tab_clearance_levels() {
        // Pass shallower than the reserved material: no lift needed.
        assert_eq!(tab_clearance_z(5.0, 12.0, 3.0), None);
        // Deeper pass: hold exactly at the tab surface.
        assert_eq!(tab_clearance_z(11.0, 12.0, 3.0), Some(-9.0));
    }

    #[test]
    fn test_no_tabs_no_markers() {
        let path = straight_path();
        assert!(compute_tab_markers(&path, &[], 3.0, 6.0).is_empty());
    }

    #[test]
    fn test_fully_contained_segment_adds_no_marker() {
        // A long tab swallowing a short middle segment must still produce
        // exactly one lift/lower pair, not one per segment.
        let path = vec![
            PathPoint::new(0.0, 0.0),
            PathPoint::new(48.0, 0.0),
            PathPoint::new(52.0, 0.0),
            PathPoint::new(100.0, 0.0),
        ];
        let markers = compute_tab_markers(&path, &[tab_at(50.0, 20.0)], 3.0, 6.0);
        assert_eq!(markers.len(), 2, "got {markers:?}");
        assert_eq!(markers[0].kind, TabMarkerKind::Lift);
        assert_eq!(markers[1].kind, TabMarkerKind::Lower);
    }

    #[test]
    fn test_closed_square_tab_on_far_edge() {
        let path = vec![
            PathPoint::new(0.0, 0.0),
            PathPoint::new(100.0, 0.0),
            PathPoint::new(100.0, 100.0),
            PathPoint::new(0.0, 100.0),
            PathPoint::new(0.0, 0.0),
        ];
        let tab = Tab {
            x: 100.0,
            y: 50.0,
            angle: std::f64::consts::FRAC_PI_2,
            path_distance: 150.0,
            length: 10.0,
            height: 3.0,
        };
        let markers = compute_tab_markers(&path, &[tab], 3.0, 6.0);
        assert_eq!(markers.len(), 2);
        let lift = markers[0].location.position(&path);
        assert!((lift.y - 42.0).abs() < 1e-6, "lift backed off along the edge");
    }

    #[test]
    fn test_crossing_through_zone_side_is_detected() {
        // A vertical segment drops into the zone through its long side; the
        // tab tangent runs along x, so no end plane is ever crossed.
        let path = vec![
            PathPoint::new(50.0, 20.0),
            PathPoint::new(50.0, 0.0),
        ];
        let markers = compute_tab_markers(&path, &[tab_at(50.0, 8.0)], 3.0, 6.0);
        assert_eq!(markers.len(), 1, "got {markers:?}");
        assert_eq!(markers[0].kind, TabMarkerKind::Lift);
        // Zone reaches y = 6 (twice the tool radius); lift backs off to 9.
        let lift = markers[0].location.position(&path);
        assert!((lift.y - 9.0).abs() < 1e-6, "lift at y = {}", lift.y);
    }

    #[test]
    fn test_start_in_tab_zone() {
        let path = straight_path();
        assert!(start_in_tab_zone(&path, &[tab_at(2.0, 8.0)], 3.0, 6.0));
        assert!(!start_in_tab_zone(&path, &[tab_at(50.0, 8.0)], 3.0, 6.0));
        assert!(!start_in_tab_zone(&path, &[], 3.0, 6.0));
    }

    #[test]
    fn test_splice_preserves_point_count() {
        let path = straight_path();
        let markers = compute_tab_markers(&path, &[tab_at(50.0, 8.0)], 3.0, 6.0);
        let augmented = splice_markers(&path, &markers);
        assert_eq!(augmented.len(), path.len() + markers.len());
        let spliced: Vec<_> = augmented.iter().filter(|p| p.marker.is_some()).collect();
        assert_eq!(spliced.len(), 2);
    }
}
