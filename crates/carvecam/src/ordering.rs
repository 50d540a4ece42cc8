use crate::types::{OperationKind, PathPoint, Toolpath};

/// Reorder toolpaths to minimize non-cutting travel.
///
/// Stable sort by operation priority (drill, V-carve, pocket, then
/// profiles), so dependent operations keep their user-defined relative
/// order. Within the drill group only, a nearest-neighbour pass considers
/// both endpoints of each candidate; a path is reversed only when it is a
/// straight two-point segment — anything curved or closed keeps its winding,
/// which encodes the climb/conventional direction.
pub fn order_toolpaths(paths: Vec<Toolpath>) -> Vec<Toolpath> {
    let mut paths = paths;
    paths.sort_by_key(|p| p.operation.priority());

    let drill_end = paths
        .iter()
        .position(|p| p.operation != OperationKind::Drill)
        .unwrap_or(paths.len());
    if drill_end > 1 {
        let drills = paths.drain(..drill_end).collect::<Vec<_>>();
        let ordered = nearest_neighbour(drills);
        for (i, tp) in ordered.into_iter().enumerate() {
            paths.insert(i, tp);
        }
    }
    paths
}

fn start_point(tp: &Toolpath) -> Option<PathPoint> {
    tp.sub_paths.first()?.cut_path.first().copied()
}

fn end_point(tp: &Toolpath) -> Option<PathPoint> {
    tp.sub_paths.last()?.cut_path.last().copied()
}

fn is_reversible(tp: &Toolpath) -> bool {
    tp.sub_paths.len() == 1 && tp.sub_paths[0].cut_path.len() == 2 && {
        let cp = &tp.sub_paths[0].cut_path;
        cp[0] != cp[1]
    }
}

fn nearest_neighbour(mut pool: Vec<Toolpath>) -> Vec<Toolpath> {
    let mut ordered: Vec<Toolpath> = Vec::with_capacity(pool.len());
    let mut cursor: Option<PathPoint> = None;

    while !pool.is_empty() {
        let mut best_index = 0;
        let mut best_reversed = false;
        let mut best_dist = f64::MAX;
        for (i, tp) in pool.iter().enumerate() {
            let Some(start) = start_point(tp) else { continue };
            let dist = cursor.map_or(0.0, |c| c.distance_to(&start));
            if dist < best_dist {
                best_index = i;
                best_reversed = false;
                best_dist = dist;
            }
            if is_reversible(tp) {
                if let Some(end) = end_point(tp) {
                    let dist = cursor.map_or(f64::MAX, |c| c.distance_to(&end));
                    if dist < best_dist {
                        best_index = i;
                        best_reversed = true;
                        best_dist = dist;
                    }
                }
            }
        }

        let mut chosen = pool.remove(best_index);
        if best_reversed {
            for sp in &mut chosen.sub_paths {
                sp.cut_path.reverse();
                sp.center_path.reverse();
            }
        }
        cursor = end_point(&chosen).or(cursor);
        ordered.push(chosen);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BitKind, CutDirection, SubPath, Tool};

    fn tool() -> Tool {
        Tool {
            name: "drill".to_string(),
            diameter: 3.0,
            angle_degrees: 0.0,
            bit: BitKind::Drill,
            feed_xy: 500.0,
            feed_z: 200.0,
            depth: 10.0,
            pass_depth: 3.0,
            stepover_percent: 40.0,
            direction: CutDirection::Conventional,
            rpm: 18000.0,
            flutes: 2,
        }
    }

    fn point_path(op: OperationKind, x: f64, y: f64) -> Toolpath {
        let p = PathPoint::new(x, y);
        Toolpath::new(
            op,
            tool(),
            vec![SubPath {
                center_path: vec![p],
                cut_path: vec![p, p],
            }],
        )
    }

    #[test]
    fn test_priority_groups() {
        let paths = vec![
            point_path(OperationKind::Outside, 0.0, 0.0),
            point_path(OperationKind::Drill, 1.0, 0.0),
            point_path(OperationKind::Pocket, 2.0, 0.0),
            point_path(OperationKind::VCarveIn, 3.0, 0.0),
        ];
        let ordered = order_toolpaths(paths);
        let ops: Vec<_> = ordered.iter().map(|p| p.operation).collect();
        assert_eq!(
            ops,
            vec![
                OperationKind::Drill,
                OperationKind::VCarveIn,
                OperationKind::Pocket,
                OperationKind::Outside
            ]
        );
    }

    #[test]
    fn test_drill_nearest_neighbour() {
        let paths = vec![
            point_path(OperationKind::Drill, 0.0, 0.0),
            point_path(OperationKind::Drill, 100.0, 0.0),
            point_path(OperationKind::Drill, 1.0, 0.0),
        ];
        let ordered = order_toolpaths(paths);
        let xs: Vec<f64> = ordered
            .iter()
            .map(|p| p.sub_paths[0].cut_path[0].x)
            .collect();
        assert_eq!(xs, vec![0.0, 1.0, 100.0], "greedy hop order");
    }

    #[test]
    fn test_straight_segment_may_reverse() {
        let mut line = point_path(OperationKind::Drill, 0.0, 0.0);
        line.sub_paths[0].cut_path = vec![PathPoint::new(50.0, 0.0), PathPoint::new(10.0, 0.0)];
        line.sub_paths[0].center_path = line.sub_paths[0].cut_path.clone();
        let first = point_path(OperationKind::Drill, 9.0, 0.0);
        let ordered = order_toolpaths(vec![first, line]);
        // After drilling at x=9 the line should be entered at its near end.
        assert_eq!(ordered[1].sub_paths[0].cut_path[0].x, 10.0);
    }

    #[test]
    fn test_closed_ring_keeps_winding() {
        let mut ring = point_path(OperationKind::Drill, 0.0, 0.0);
        ring.sub_paths[0].cut_path = vec![
            PathPoint::new(10.0, 0.0),
            PathPoint::new(20.0, 0.0),
            PathPoint::new(20.0, 10.0),
            PathPoint::new(10.0, 0.0),
        ];
        assert!(!is_reversible(&ring), "closed rings must not be reversed");
    }
}
