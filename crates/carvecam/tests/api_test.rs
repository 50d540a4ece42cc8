use carvecam::*;

fn end_mill() -> Tool {
    Tool {
        name: "6mm End Mill".to_string(),
        diameter: 6.0,
        angle_degrees: 0.0,
        bit: BitKind::EndMill,
        feed_xy: 1000.0,
        feed_z: 300.0,
        depth: 6.0,
        pass_depth: 3.0,
        stepover_percent: 40.0,
        direction: CutDirection::Conventional,
        rpm: 18000.0,
        flutes: 2,
    }
}

fn square_40() -> BoundaryPath {
    BoundaryPath::from_xy(
        &[
            (0.0, 0.0),
            (40.0, 0.0),
            (40.0, 40.0),
            (0.0, 40.0),
            (0.0, 0.0),
        ],
        true,
    )
}

#[test]
fn test_no_tool_selected() {
    let all = vec![square_40()];
    let options = MachineOptions::default();
    let ctx = GenerationContext {
        boundaries: &all,
        all_paths: &all,
        tool: None,
        options: &options,
    };
    let err = generate_toolpath(&ctx, OperationKind::Outside).expect_err("No tool must fail");
    assert!(matches!(err, CamError::NoToolSelected));
}

#[test]
fn test_no_path_selected_names_the_operation() {
    let all: Vec<BoundaryPath> = Vec::new();
    let tool = end_mill();
    let options = MachineOptions::default();
    let ctx = GenerationContext {
        boundaries: &all,
        all_paths: &all,
        tool: Some(&tool),
        options: &options,
    };
    let err = generate_toolpath(&ctx, OperationKind::Pocket).expect_err("Empty selection");
    let msg = err.to_string();
    assert!(
        msg.contains("Pocket"),
        "Error should name the operation: {msg}"
    );
}

#[test]
fn test_drill_operation_requires_drill_bit() {
    let all = vec![square_40()];
    let tool = end_mill();
    let options = MachineOptions::default();
    let ctx = GenerationContext {
        boundaries: &all,
        all_paths: &all,
        tool: Some(&tool),
        options: &options,
    };
    let err = generate_toolpath(&ctx, OperationKind::Drill).expect_err("End mill cannot drill");
    assert!(matches!(
        err,
        CamError::IncompatibleTool {
            required: BitKind::Drill,
            actual: BitKind::EndMill
        }
    ));
}

#[test]
fn test_drill_bit_cannot_profile() {
    let all = vec![square_40()];
    let mut tool = end_mill();
    tool.bit = BitKind::Drill;
    let options = MachineOptions::default();
    let ctx = GenerationContext {
        boundaries: &all,
        all_paths: &all,
        tool: Some(&tool),
        options: &options,
    };
    let err = generate_toolpath(&ctx, OperationKind::Outside).expect_err("Drill cannot profile");
    assert!(matches!(err, CamError::IncompatibleTool { .. }));
}

#[test]
fn test_toolpath_serde_round_trip() {
    let all = vec![square_40()];
    let tool = end_mill();
    let options = MachineOptions::default();
    let ctx = GenerationContext {
        boundaries: &all,
        all_paths: &all,
        tool: Some(&tool),
        options: &options,
    };
    let tp = generate_toolpath(&ctx, OperationKind::Outside).expect("generation succeeds");

    let json = serde_json::to_string(&tp).expect("serialize");
    let back: Toolpath = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.id, tp.id, "Identity survives persistence");
    assert_eq!(back.operation, tp.operation);
    assert_eq!(back.sub_paths.len(), tp.sub_paths.len());
    assert_eq!(
        back.sub_paths[0].cut_path, tp.sub_paths[0].cut_path,
        "Geometry survives persistence"
    );
}

#[test]
fn test_total_cut_length_of_a_square_ring() {
    let ring = vec![
        PathPoint::new(0.0, 0.0),
        PathPoint::new(10.0, 0.0),
        PathPoint::new(10.0, 10.0),
        PathPoint::new(0.0, 10.0),
        PathPoint::new(0.0, 0.0),
    ];
    let tp = Toolpath::new(
        OperationKind::Outside,
        end_mill(),
        vec![SubPath {
            center_path: ring.clone(),
            cut_path: ring,
        }],
    );
    assert!((tp.total_cut_length() - 40.0).abs() < 1e-9);
}

#[test]
fn test_invisible_toolpaths_are_not_exported() {
    let all = vec![square_40()];
    let tool = end_mill();
    let options = MachineOptions::default();
    let ctx = GenerationContext {
        boundaries: &all,
        all_paths: &all,
        tool: Some(&tool),
        options: &options,
    };
    let mut tp = generate_toolpath(&ctx, OperationKind::Outside).expect("generation succeeds");
    tp.visible = false;

    let gcode = synthesize_gcode(&[tp], &[], &PostProcessorProfile::grbl(), &options)
        .expect("synthesis succeeds");
    assert!(
        !gcode.contains("G1 X"),
        "Hidden toolpaths must not emit cuts:\n{gcode}"
    );
}

#[test]
fn test_ordering_groups_operations() {
    let tool = end_mill();
    let mk = |op: OperationKind| {
        let p = PathPoint::new(0.0, 0.0);
        Toolpath::new(
            op,
            tool.clone(),
            vec![SubPath {
                center_path: vec![p],
                cut_path: vec![p, p],
            }],
        )
    };
    let ordered = order_toolpaths(vec![
        mk(OperationKind::Outside),
        mk(OperationKind::Pocket),
        mk(OperationKind::Drill),
    ]);
    let ops: Vec<OperationKind> = ordered.iter().map(|t| t.operation).collect();
    assert_eq!(
        ops,
        vec![
            OperationKind::Drill,
            OperationKind::Pocket,
            OperationKind::Outside
        ]
    );
}
