use anyhow::Result;
use carvecam::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let operation = args.get(1).map(|s| s.as_str()).unwrap_or("profile");

    let result = match operation {
        "profile" => demo_profile(),
        "pocket" => demo_pocket(),
        "vcarve" => demo_vcarve(),
        "roundtrip" => demo_roundtrip(),
        _ => {
            println!("Usage: carvecam [profile|pocket|vcarve|roundtrip]");
            println!("  profile    - Outside profile on a 40x40 square (default)");
            println!("  pocket     - Spiral-in pocket on a 60x40 rectangle");
            println!("  vcarve     - V-carve a 40x10 slot with a 90 degree bit");
            println!("  roundtrip  - Synthesize G-code, parse it back, compare");
            Ok(())
        }
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

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

fn rectangle(w: f64, h: f64) -> BoundaryPath {
    BoundaryPath::from_xy(
        &[(0.0, 0.0), (w, 0.0), (w, h), (0.0, h), (0.0, 0.0)],
        true,
    )
}

fn generate(
    boundary: BoundaryPath,
    tool: &Tool,
    options: &MachineOptions,
    operation: OperationKind,
) -> Result<Toolpath> {
    let all = vec![boundary];
    let ctx = GenerationContext {
        boundaries: &all,
        all_paths: &all,
        tool: Some(tool),
        options,
    };
    Ok(generate_toolpath(&ctx, operation)?)
}

fn print_gcode(toolpath: Toolpath, options: &MachineOptions) -> Result<()> {
    println!("Generated {} sub path(s)", toolpath.sub_paths.len());
    println!("Total cut length: {:.1}mm", toolpath.total_cut_length());
    let gcode = synthesize_gcode(&[toolpath], &[], &PostProcessorProfile::grbl(), options)?;
    println!("\nG-code:\n");
    print!("{gcode}");
    Ok(())
}

fn demo_profile() -> Result<()> {
    println!("carvecam - Outside profile\n==========================\n");

    let options = MachineOptions::default();
    let tool = end_mill();
    let tp = generate(rectangle(40.0, 40.0), &tool, &options, OperationKind::Outside)?;
    print_gcode(tp, &options)
}

fn demo_pocket() -> Result<()> {
    println!("carvecam - Pocket\n=================\n");

    let options = MachineOptions::default();
    let tool = end_mill();
    let tp = generate(rectangle(60.0, 40.0), &tool, &options, OperationKind::Pocket)?;
    print_gcode(tp, &options)
}

fn demo_vcarve() -> Result<()> {
    println!("carvecam - V-carve\n==================\n");

    let options = MachineOptions::default();
    let tool = Tool {
        name: "90deg V-Bit".to_string(),
        diameter: 12.0,
        angle_degrees: 90.0,
        bit: BitKind::VBit,
        feed_xy: 800.0,
        feed_z: 250.0,
        depth: 6.0,
        pass_depth: 6.0,
        stepover_percent: 40.0,
        direction: CutDirection::Conventional,
        rpm: 18000.0,
        flutes: 2,
    };
    let tp = generate(rectangle(40.0, 10.0), &tool, &options, OperationKind::VCarveIn)?;
    print_gcode(tp, &options)
}

fn demo_roundtrip() -> Result<()> {
    println!("carvecam - Round trip\n=====================\n");

    let options = MachineOptions::default();
    let tool = end_mill();
    let profile = PostProcessorProfile::grbl();
    let tp = generate(rectangle(40.0, 40.0), &tool, &options, OperationKind::Outside)?;
    let gcode = synthesize_gcode(&[tp], &[], &profile, &options)?;
    let parsed = parse_gcode(&gcode, &profile);
    let moves = parsed
        .movements
        .iter()
        .filter(|m| m.kind != MoveKind::NonMovement)
        .count();
    println!("Synthesized {} lines", gcode.lines().count());
    println!(
        "Parsed back {} movements, {} tool(s)",
        moves,
        parsed.tools.len()
    );
    Ok(())
}
