pub mod error;
pub mod feeds;
pub mod gcode_parser;
pub mod geometry;
pub mod medial_axis;
pub mod ordering;
pub mod pocket;
pub mod postprocessor;
pub mod profile;
pub mod tabs;
pub mod types;
pub mod vcarve;

pub use error::CamError;
pub use gcode_parser::parse_gcode;
pub use geometry::clearance::ClearanceIndex;
pub use geometry::offset::{ClipperOffsetter, PolygonOffsetter};
pub use medial_axis::SampledMedialAxis;
pub use ordering::order_toolpaths;
pub use pocket::generate_pocket_subpaths;
pub use postprocessor::{synthesize_gcode, GcodeUnits, PostProcessorProfile};
pub use profile::generate_profile_subpaths;
pub use types::*;
pub use vcarve::{plan_vcarve, MedialAxisComputer, MedialSegment};

use tracing::info;

/// Run one operation over the context's selected boundaries and return the
/// resulting toolpath.
///
/// Empty offsets are "nothing to cut", not errors: the toolpath may come
/// back with no sub paths. V-carve planning uses the bundled sampled
/// medial-axis computer; hosts with their own skeleton code drive
/// [`vcarve::plan_vcarve`] directly.
pub fn generate_toolpath(
    ctx: &GenerationContext<'_>,
    operation: OperationKind,
) -> Result<Toolpath, CamError> {
    let tool = ctx.tool.ok_or(CamError::NoToolSelected)?;
    check_tool(tool, operation)?;
    if ctx.boundaries.is_empty() {
        return Err(CamError::NoPathSelected {
            operation: operation.to_string(),
        });
    }

    let sub_paths = if operation.is_vcarve() {
        plan_vcarve(
            ctx.boundaries,
            tool,
            operation,
            &SampledMedialAxis::default(),
        )?
    } else {
        let offsetter = ClipperOffsetter;
        let mut subs = Vec::new();
        for boundary in ctx.boundaries {
            // The boundary being cut must not count against its own
            // clearance, so its entry is excluded from the index.
            let exclude = ctx.all_paths.iter().position(|p| p == boundary);
            let clearance = ClearanceIndex::build(ctx.all_paths, exclude);
            let generated = match operation {
                OperationKind::Pocket => {
                    generate_pocket_subpaths(boundary, tool, &clearance, &offsetter, ctx.options)
                }
                _ => generate_profile_subpaths(
                    boundary,
                    tool,
                    operation,
                    &clearance,
                    &offsetter,
                    ctx.options,
                ),
            };
            subs.extend(generated);
        }
        subs
    };

    info!(
        op = %operation,
        sub_paths = sub_paths.len(),
        "toolpath generated"
    );
    Ok(Toolpath::new(operation, tool.clone(), sub_paths))
}

fn check_tool(tool: &Tool, operation: OperationKind) -> Result<(), CamError> {
    match operation {
        OperationKind::Drill if tool.bit != BitKind::Drill => Err(CamError::IncompatibleTool {
            required: BitKind::Drill,
            actual: tool.bit,
        }),
        op if op.is_vcarve() && tool.bit != BitKind::VBit => Err(CamError::IncompatibleTool {
            required: BitKind::VBit,
            actual: tool.bit,
        }),
        op if !op.is_vcarve() && op != OperationKind::Drill && tool.bit == BitKind::Drill => {
            Err(CamError::IncompatibleTool {
                required: BitKind::EndMill,
                actual: tool.bit,
            })
        }
        _ => Ok(()),
    }
}
