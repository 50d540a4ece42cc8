use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Unique identifier for a generated toolpath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolpathId(Ulid);

impl ToolpathId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for ToolpathId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ToolpathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single 2-D path point, optionally carrying a per-point tool radius
/// (Center profiles and V-carve paths use it to derive cutting depth).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<f64>,
}

impl PathPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, r: None }
    }

    pub fn with_radius(x: f64, y: f64, r: f64) -> Self {
        Self { x, y, r: Some(r) }
    }

    pub fn distance_to(&self, other: &PathPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An ordered boundary curve in world units, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryPath {
    pub points: Vec<PathPoint>,
    /// Closed means the last point equals the first.
    pub closed: bool,
}

impl BoundaryPath {
    pub fn new(points: Vec<PathPoint>, closed: bool) -> Self {
        Self { points, closed }
    }

    pub fn from_xy(points: &[(f64, f64)], closed: bool) -> Self {
        Self {
            points: points.iter().map(|&(x, y)| PathPoint::new(x, y)).collect(),
            closed,
        }
    }
}

/// Geometric kind of cutting bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitKind {
    EndMill,
    VBit,
    Drill,
    BallNose,
}

impl fmt::Display for BitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BitKind::EndMill => "EndMill",
            BitKind::VBit => "VBit",
            BitKind::Drill => "Drill",
            BitKind::BallNose => "BallNose",
        };
        write!(f, "{s}")
    }
}

/// Cutting direction relative to material engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutDirection {
    Climb,
    Conventional,
}

/// A tool descriptor. Toolpaths own a snapshot copy so later edits to the
/// tool table do not retroactively change already-generated paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub diameter: f64,
    /// Included angle in degrees; meaningful only for VBit/BallNose.
    pub angle_degrees: f64,
    pub bit: BitKind,
    pub feed_xy: f64,
    pub feed_z: f64,
    /// Final target depth of the cut.
    pub depth: f64,
    /// Maximum Z advance per pass.
    pub pass_depth: f64,
    /// Percentage of the diameter to step over when pocketing, e.g. 40.0.
    pub stepover_percent: f64,
    pub direction: CutDirection,
    pub rpm: f64,
    pub flutes: u32,
}

impl Tool {
    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }

    /// Largest groove half-width a V-bit reaches at its full configured depth.
    pub fn vbit_max_radius(&self) -> f64 {
        let half = (self.angle_degrees.to_radians() / 2.0).tan();
        self.depth * half
    }

    /// Depth a V-bit must plunge to cut a groove of the given half-width.
    pub fn vbit_depth_for_radius(&self, r: f64) -> f64 {
        let half = (self.angle_degrees.to_radians() / 2.0).tan();
        if half <= f64::EPSILON {
            self.depth
        } else {
            r / half
        }
    }
}

/// The CAM operation applied to a boundary selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Drill,
    Inside,
    Outside,
    Center,
    Pocket,
    VCarveIn,
    VCarveOut,
}

impl OperationKind {
    pub fn is_vcarve(&self) -> bool {
        matches!(self, OperationKind::VCarveIn | OperationKind::VCarveOut)
    }

    /// Ordering priority for the path optimizer: drills first, profiles last.
    pub fn priority(&self) -> u8 {
        match self {
            OperationKind::Drill => 1,
            OperationKind::VCarveIn | OperationKind::VCarveOut => 2,
            OperationKind::Pocket => 3,
            _ => 4,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Drill => "Drill",
            OperationKind::Inside => "Inside",
            OperationKind::Outside => "Outside",
            OperationKind::Center => "Center",
            OperationKind::Pocket => "Pocket",
            OperationKind::VCarveIn => "VCarveIn",
            OperationKind::VCarveOut => "VCarveOut",
        };
        write!(f, "{s}")
    }
}

/// One continuous tool-center path within a toolpath.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubPath {
    /// Raw offset/medial points before clearance filtering and lightening.
    pub center_path: Vec<PathPoint>,
    /// The simplified path actually written to G-code.
    pub cut_path: Vec<PathPoint>,
}

/// Result of one operation on one boundary selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toolpath {
    pub id: ToolpathId,
    pub operation: OperationKind,
    /// Snapshot of the tool used when this path was generated.
    pub tool: Tool,
    pub visible: bool,
    pub sub_paths: Vec<SubPath>,
}

impl Toolpath {
    pub fn new(operation: OperationKind, tool: Tool, sub_paths: Vec<SubPath>) -> Self {
        Self {
            id: ToolpathId::new(),
            operation,
            tool,
            visible: true,
            sub_paths,
        }
    }

    /// Total cutting length across all sub paths, for host display.
    pub fn total_cut_length(&self) -> f64 {
        self.sub_paths
            .iter()
            .map(|sp| {
                sp.cut_path
                    .windows(2)
                    .map(|w| w[0].distance_to(&w[1]))
                    .sum::<f64>()
            })
            .sum()
    }
}

/// A holding tab placed by the external tab editor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tab {
    pub x: f64,
    pub y: f64,
    /// Path tangent direction at the tab, radians.
    pub angle: f64,
    /// Cumulative arc length from the path start to the tab center.
    pub path_distance: f64,
    /// Length of the uncut bridge along the path, mm.
    pub length: f64,
    /// Material height the tab preserves, mm.
    pub height: f64,
}

/// Stock material species, used by the feed-rate model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WoodSpecies {
    Softwood,
    Hardwood,
    Plywood,
    Mdf,
    Acrylic,
}

impl WoodSpecies {
    /// Base chip load in mm per tooth for a 6 mm end mill.
    pub fn base_chip_load(&self) -> f64 {
        match self {
            WoodSpecies::Softwood => 0.028,
            WoodSpecies::Hardwood => 0.020,
            WoodSpecies::Plywood => 0.025,
            WoodSpecies::Mdf => 0.033,
            WoodSpecies::Acrylic => 0.012,
        }
    }

    pub fn feed_multiplier(&self) -> f64 {
        match self {
            WoodSpecies::Softwood => 1.0,
            WoodSpecies::Hardwood => 0.8,
            WoodSpecies::Plywood => 0.9,
            WoodSpecies::Mdf => 1.1,
            WoodSpecies::Acrylic => 0.6,
        }
    }
}

/// Global machining options, passed as an immutable snapshot into every
/// core call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineOptions {
    /// Offset simplification epsilon in world units.
    pub tolerance: f64,
    /// Rapid traverse height above the stock, mm.
    pub safe_height: f64,
    pub z_backlash: f64,
    pub workpiece_thickness: f64,
    pub wood_species: WoodSpecies,
    pub auto_feed_rate: bool,
    pub min_feed_rate: f64,
    pub max_feed_rate: f64,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            safe_height: 5.0,
            z_backlash: 0.0,
            workpiece_thickness: 12.0,
            wood_species: WoodSpecies::Softwood,
            auto_feed_rate: false,
            min_feed_rate: 100.0,
            max_feed_rate: 3000.0,
        }
    }
}

/// Immutable per-call snapshot of everything a generation call needs.
/// Replaces the ambient tool/option tables of a typical host application.
#[derive(Debug)]
pub struct GenerationContext<'a> {
    /// Boundaries the operation applies to.
    pub boundaries: &'a [BoundaryPath],
    /// Every boundary in the document, used for clearance checking.
    pub all_paths: &'a [BoundaryPath],
    pub tool: Option<&'a Tool>,
    pub options: &'a MachineOptions,
}

/// Kind of a single parsed G-code movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveKind {
    NonMovement,
    Rapid,
    Cut,
}

/// One movement per G-code source line. The index of a movement in the
/// parsed list equals its zero-based line number; the simulator's
/// line-highlighting relies on this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub feed_rate: f64,
    /// Index into the parsed tool table; -1 when no tool is active.
    pub tool_index: i32,
    pub kind: MoveKind,
}

impl Movement {
    /// The shared value every unrecognized line maps to. Kept as one named
    /// constant rather than a per-line construction.
    pub const NON_MOVEMENT: Movement = Movement {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        feed_rate: 0.0,
        tool_index: -1,
        kind: MoveKind::NonMovement,
    };
}

/// Tool metadata recovered from a `Tool: ID=..` comment, shared across
/// movements by index rather than copied per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcodeToolInfo {
    pub id: i32,
    pub bit_type: String,
    pub diameter: f64,
    pub angle_degrees: f64,
    pub pass_depth: Option<f64>,
}

/// Parser output: movements index-aligned with source lines plus the
/// deduplicated tool table they reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedGcode {
    pub movements: Vec<Movement>,
    pub tools: Vec<GcodeToolInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end_mill() -> Tool {
        Tool {
            name: "6mm End Mill".to_string(),
            diameter: 6.0,
            angle_degrees: 0.0,
            bit: BitKind::EndMill,
            feed_xy: 1000.0,
            feed_z: 300.0,
            depth: 6.0,
            pass_depth: 2.0,
            stepover_percent: 40.0,
            direction: CutDirection::Conventional,
            rpm: 18000.0,
            flutes: 2,
        }
    }

    #[test]
    fn test_tool_radius() {
        assert_eq!(end_mill().radius(), 3.0);
    }

    #[test]
    fn test_vbit_depth_radius_mapping() {
        let mut tool = end_mill();
        tool.bit = BitKind::VBit;
        tool.angle_degrees = 90.0;
        tool.depth = 5.0;
        // A 90 degree bit cuts a half-width equal to its depth.
        assert!((tool.vbit_max_radius() - 5.0).abs() < 1e-9);
        assert!((tool.vbit_depth_for_radius(2.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_operation_priority_order() {
        assert!(OperationKind::Drill.priority() < OperationKind::VCarveIn.priority());
        assert!(OperationKind::VCarveOut.priority() < OperationKind::Pocket.priority());
        assert!(OperationKind::Pocket.priority() < OperationKind::Outside.priority());
    }

    #[test]
    fn test_toolpath_snapshot_is_independent() {
        let mut tool = end_mill();
        let tp = Toolpath::new(OperationKind::Outside, tool.clone(), vec![]);
        tool.diameter = 3.175;
        assert_eq!(tp.tool.diameter, 6.0, "snapshot must not track later edits");
    }

    #[test]
    fn test_movement_sentinel() {
        let m = Movement::NON_MOVEMENT;
        assert_eq!(m.kind, MoveKind::NonMovement);
        assert_eq!(m.tool_index, -1);
    }

    #[test]
    fn test_serialization_round_trip() {
        let tp = Toolpath::new(
            OperationKind::Pocket,
            end_mill(),
            vec![SubPath {
                center_path: vec![PathPoint::new(0.0, 0.0)],
                cut_path: vec![PathPoint::new(0.0, 0.0), PathPoint::new(1.0, 0.0)],
            }],
        );
        let json = serde_json::to_string(&tp).expect("serialize");
        let back: Toolpath = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.id, tp.id);
        assert_eq!(back.sub_paths.len(), 1);
    }
}
