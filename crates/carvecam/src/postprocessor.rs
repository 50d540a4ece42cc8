//! G-code synthesis through a parsed post-processor template.
//!
//! Template strings are interpreted, not string-substituted: each template
//! is tokenized once into `TemplateWord`s, and the position of each axis
//! placeholder in the template decides which logical axis (X, then Y, then
//! Z) it carries. That makes axis-swapped and `-`-inverted dialects a pure
//! profile concern, and lets the parser reuse the exact same representation.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CamError;
use crate::feeds;
use crate::ordering::order_toolpaths;
use crate::tabs::{self, TabMarkerKind, DEFAULT_TAB_LENGTH};
use crate::types::{MachineOptions, OperationKind, Tab, Tool, Toolpath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GcodeUnits {
    Mm,
    Inches,
}

impl GcodeUnits {
    /// Multiplier from internal millimetres to emitted units.
    pub fn scale(&self) -> f64 {
        match self {
            GcodeUnits::Mm => 1.0,
            GcodeUnits::Inches => 1.0 / 25.4,
        }
    }

    pub fn decimals(&self) -> usize {
        match self {
            GcodeUnits::Mm => 2,
            GcodeUnits::Inches => 4,
        }
    }
}

/// One token of a movement template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateWord {
    Literal(String),
    /// An axis placeholder. `slot` is the placeholder's left-to-right index
    /// in the template and selects the logical axis (0 = X, 1 = Y, 2 = Z);
    /// `letter` is what gets printed. A template like `G1 Y X Z F` therefore
    /// swaps the first two axes.
    Axis {
        letter: char,
        slot: usize,
        inverted: bool,
    },
    Feed,
    Spindle,
}

/// A tokenized template plus the command word the parser keys on.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveTemplate {
    pub words: Vec<TemplateWord>,
    pub command: Option<String>,
}

/// Values available for one emitted line; `None` drops the whole word.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveValues {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub feed: Option<f64>,
    pub spindle: Option<f64>,
}

pub fn parse_template(template: &str) -> MoveTemplate {
    let mut words = Vec::new();
    let mut slot = 0usize;
    for raw in template.split_whitespace() {
        let (inverted, body) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        match body {
            "X" | "Y" | "Z" => {
                words.push(TemplateWord::Axis {
                    letter: body.chars().next().unwrap_or('X'),
                    slot,
                    inverted,
                });
                slot += 1;
            }
            "F" => words.push(TemplateWord::Feed),
            "S" => words.push(TemplateWord::Spindle),
            _ => words.push(TemplateWord::Literal(raw.to_string())),
        }
    }
    let command = words.iter().find_map(|w| match w {
        TemplateWord::Literal(s) => Some(s.clone()),
        _ => None,
    });
    MoveTemplate { words, command }
}

impl MoveTemplate {
    /// A usable movement template names a command and at least one axis.
    pub fn is_movement(&self) -> bool {
        self.command.is_some()
            && self
                .words
                .iter()
                .any(|w| matches!(w, TemplateWord::Axis { .. }))
    }

    /// Render one line. Absent values vanish along with their word; runs of
    /// whitespace collapse to single spaces.
    pub fn emit(&self, values: &MoveValues, units: GcodeUnits) -> String {
        let scale = units.scale();
        let decimals = units.decimals();
        let mut pieces: Vec<String> = Vec::with_capacity(self.words.len());
        for word in &self.words {
            match word {
                TemplateWord::Literal(s) => pieces.push(s.clone()),
                TemplateWord::Axis {
                    letter,
                    slot,
                    inverted,
                } => {
                    let value = match slot {
                        0 => values.x,
                        1 => values.y,
                        _ => values.z,
                    };
                    if let Some(v) = value {
                        let v = if *inverted { -v } else { v } * scale;
                        pieces.push(format!("{letter}{v:.decimals$}"));
                    }
                }
                TemplateWord::Feed => {
                    if let Some(f) = values.feed {
                        pieces.push(format!("F{:.0}", f * scale));
                    }
                }
                TemplateWord::Spindle => {
                    if let Some(s) = values.spindle {
                        pieces.push(format!("S{s:.0}"));
                    }
                }
            }
        }
        pieces.join(" ")
    }
}

/// Controller dialect description. Immutable for the duration of one
/// synthesis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessorProfile {
    pub rapid_template: String,
    pub cut_template: String,
    pub start_gcode: String,
    pub end_gcode: String,
    pub tool_change_gcode: String,
    pub spindle_on_gcode: String,
    pub spindle_off_gcode: String,
    pub comment_char: char,
    pub units: GcodeUnits,
}

impl PostProcessorProfile {
    /// GRBL-style metric profile.
    pub fn grbl() -> Self {
        Self {
            rapid_template: "G0 X Y Z".to_string(),
            cut_template: "G1 X Y Z F".to_string(),
            start_gcode: "G21\nG90\nG17".to_string(),
            end_gcode: "M2".to_string(),
            tool_change_gcode: "M0".to_string(),
            spindle_on_gcode: "M3 S".to_string(),
            spindle_off_gcode: "M5".to_string(),
            comment_char: ';',
            units: GcodeUnits::Mm,
        }
    }

    /// GRBL dialect with the Y axis mirrored, as used by machines whose
    /// table origin is at the far edge.
    pub fn grbl_inverted_y() -> Self {
        Self {
            rapid_template: "G0 X -Y Z".to_string(),
            cut_template: "G1 X -Y Z F".to_string(),
            ..Self::grbl()
        }
    }

    pub fn grbl_inches() -> Self {
        Self {
            start_gcode: "G20\nG90\nG17".to_string(),
            units: GcodeUnits::Inches,
            ..Self::grbl()
        }
    }

    /// Parse and validate the rapid and cut templates.
    pub fn movement_templates(&self) -> Result<(MoveTemplate, MoveTemplate), CamError> {
        let rapid = parse_template(&self.rapid_template);
        let cut = parse_template(&self.cut_template);
        if !rapid.is_movement() {
            return Err(CamError::TemplateParseError {
                template: self.rapid_template.clone(),
            });
        }
        if !cut.is_movement() {
            return Err(CamError::TemplateParseError {
                template: self.cut_template.clone(),
            });
        }
        Ok((rapid, cut))
    }
}

impl Default for PostProcessorProfile {
    fn default() -> Self {
        Self::grbl()
    }
}

/// Assemble the full G-code program for an ordered set of toolpaths.
///
/// Invisible toolpaths are skipped. A profile whose templates carry no
/// recognizable movement command is replaced wholesale by the built-in GRBL
/// profile; synthesis proceeds rather than failing the export.
pub fn synthesize_gcode(
    toolpaths: &[Toolpath],
    tabs: &[Tab],
    profile: &PostProcessorProfile,
    options: &MachineOptions,
) -> Result<String, CamError> {
    let active = match profile.movement_templates() {
        Ok(_) => profile.clone(),
        Err(err) => {
            warn!(error = %err, "post-processor profile unusable, using built-in default");
            PostProcessorProfile::default()
        }
    };
    let (rapid, cut) = active.movement_templates()?;

    let ordered = order_toolpaths(
        toolpaths
            .iter()
            .filter(|tp| tp.visible && !tp.sub_paths.is_empty())
            .cloned()
            .collect(),
    );

    let mut synth = Synthesizer {
        rapid,
        cut,
        spindle_on: parse_template(&active.spindle_on_gcode),
        profile: &active,
        options,
        tabs,
        lines: Vec::new(),
        current_z: options.safe_height,
        tool_table: Vec::new(),
    };

    synth.push_block(&active.start_gcode.clone());
    synth.rapid_move(None, None, Some(options.safe_height));

    let mut previous_tool: Option<Tool> = None;
    for tp in &ordered {
        if previous_tool.as_ref() != Some(&tp.tool) {
            if previous_tool.is_some() {
                synth.push_block(&active.spindle_off_gcode.clone());
                synth.push_block(&active.tool_change_gcode.clone());
            }
            synth.emit_tool_comment(&tp.tool);
            synth.emit_spindle_on(tp.tool.rpm);
            previous_tool = Some(tp.tool.clone());
        }
        synth.emit_toolpath(tp);
    }

    if previous_tool.is_some() {
        synth.push_block(&active.spindle_off_gcode.clone());
    }
    synth.rapid_move(None, None, Some(options.safe_height));
    synth.push_block(&active.end_gcode.clone());

    let mut out = synth.lines.join("\n");
    out.push('\n');
    Ok(out)
}

struct Synthesizer<'a> {
    rapid: MoveTemplate,
    cut: MoveTemplate,
    spindle_on: MoveTemplate,
    profile: &'a PostProcessorProfile,
    options: &'a MachineOptions,
    tabs: &'a [Tab],
    lines: Vec<String>,
    current_z: f64,
    tool_table: Vec<Tool>,
}

impl Synthesizer<'_> {
    fn push_block(&mut self, block: &str) {
        for line in block.lines() {
            let line = line.trim();
            if !line.is_empty() {
                self.lines.push(line.to_string());
            }
        }
    }

    fn comment(&mut self, text: &str) {
        let line = if self.profile.comment_char == '(' {
            format!("({text})")
        } else {
            format!("{} {}", self.profile.comment_char, text)
        };
        self.lines.push(line);
    }

    fn rapid_move(&mut self, x: Option<f64>, y: Option<f64>, z: Option<f64>) {
        let values = MoveValues {
            x,
            y,
            z,
            ..MoveValues::default()
        };
        let line = self.rapid.emit(&values, self.profile.units);
        self.lines.push(line);
        if let Some(z) = z {
            self.current_z = z;
        }
    }

    fn cut_move(&mut self, x: Option<f64>, y: Option<f64>, z: Option<f64>, feed: f64) {
        let values = MoveValues {
            x,
            y,
            z,
            feed: Some(feed),
            spindle: None,
        };
        let line = self.cut.emit(&values, self.profile.units);
        self.lines.push(line);
        if let Some(z) = z {
            self.current_z = z;
        }
    }

    /// Feed down to `z`. With Z backlash configured the approach stops short
    /// by the backlash amount under rapid, then feeds the remainder, so the
    /// final approach always loads the screw from the same side.
    fn plunge(&mut self, z: f64, feed_z: f64) {
        let backlash = self.options.z_backlash;
        if backlash > 0.0 && self.current_z > z + backlash {
            self.rapid_move(None, None, Some(z + backlash));
        }
        self.cut_move(None, None, Some(z), feed_z);
    }

    fn retract(&mut self) {
        self.rapid_move(None, None, Some(self.options.safe_height));
    }

    fn emit_spindle_on(&mut self, rpm: f64) {
        let values = MoveValues {
            spindle: Some(rpm),
            ..MoveValues::default()
        };
        let line = self.spindle_on.emit(&values, self.profile.units);
        if !line.is_empty() {
            self.lines.push(line);
        }
    }

    /// Machine-readable tool marker, also consumed by the parser.
    fn emit_tool_comment(&mut self, tool: &Tool) {
        let id = match self.tool_table.iter().position(|t| t == tool) {
            Some(i) => i + 1,
            None => {
                self.tool_table.push(tool.clone());
                self.tool_table.len()
            }
        };
        let mut text = format!(
            "Tool: ID={} Type={} Diameter={:.2} Angle={:.2}",
            id, tool.bit, tool.diameter, tool.angle_degrees
        );
        if tool.pass_depth > 0.0 {
            text.push_str(&format!(" StepDown={:.2}", tool.pass_depth));
        }
        self.comment(&text);
    }

    fn emit_toolpath(&mut self, tp: &Toolpath) {
        let feed_xy = feeds::feed_xy(&tp.tool, tp.operation, self.options);
        let feed_z = feeds::feed_z(&tp.tool, tp.operation, self.options);
        self.comment(&format!("{} - {}", tp.operation, tp.tool.name));
        match tp.operation {
            OperationKind::Drill => self.emit_drill(tp, feed_z),
            op if op.is_vcarve() => self.emit_vcarve(tp, feed_xy, feed_z),
            OperationKind::Pocket => self.emit_pocket(tp, feed_xy, feed_z),
            _ => self.emit_profile(tp, feed_xy, feed_z),
        }
        self.retract();
    }

    fn emit_drill(&mut self, tp: &Toolpath, feed_z: f64) {
        for sp in &tp.sub_paths {
            let Some(p) = sp.cut_path.first() else { continue };
            self.retract();
            self.rapid_move(Some(p.x), Some(p.y), None);
            for depth in pass_depths(&tp.tool) {
                self.plunge(-depth, feed_z);
                // Full retract between pecks clears the chips.
                self.retract();
            }
        }
    }

    fn emit_vcarve(&mut self, tp: &Toolpath, feed_xy: f64, feed_z: f64) {
        for sp in &tp.sub_paths {
            let Some(first) = sp.cut_path.first() else { continue };
            self.retract();
            self.rapid_move(Some(first.x), Some(first.y), None);
            let z0 = -self.vbit_z(&tp.tool, first.r);
            self.plunge(z0, feed_z);
            for p in sp.cut_path.iter().skip(1) {
                let z = -self.vbit_z(&tp.tool, p.r);
                self.cut_move(Some(p.x), Some(p.y), Some(z), feed_xy);
            }
        }
    }

    fn vbit_z(&self, tool: &Tool, r: Option<f64>) -> f64 {
        let depth = tool.vbit_depth_for_radius(r.unwrap_or(0.0));
        depth.min(tool.depth)
    }

    fn emit_pocket(&mut self, tp: &Toolpath, feed_xy: f64, feed_z: f64) {
        for (n, depth) in pass_depths(&tp.tool).into_iter().enumerate() {
            self.comment(&format!("pass {}", n + 1));
            let z = -depth;
            // Infill rings innermost-out, finishing contour last.
            let finishing = &tp.sub_paths[0];
            for sp in tp.sub_paths[1..].iter().rev().chain([finishing]) {
                let Some(first) = sp.cut_path.first() else { continue };
                self.retract();
                self.rapid_move(Some(first.x), Some(first.y), None);
                self.plunge(z, feed_z);
                for p in sp.cut_path.iter().skip(1) {
                    self.cut_move(Some(p.x), Some(p.y), None, feed_xy);
                }
            }
        }
    }

    fn emit_profile(&mut self, tp: &Toolpath, feed_xy: f64, feed_z: f64) {
        let max_tab_height = self
            .tabs
            .iter()
            .map(|t| t.height)
            .fold(f64::NEG_INFINITY, f64::max);
        for (n, depth) in pass_depths(&tp.tool).into_iter().enumerate() {
            self.comment(&format!("pass {}", n + 1));
            let z = -depth;
            let clearance = if self.tabs.is_empty() {
                None
            } else {
                tabs::tab_clearance_z(depth, self.options.workpiece_thickness, max_tab_height)
            };
            for sp in &tp.sub_paths {
                let Some(first) = sp.cut_path.first() else { continue };
                self.retract();
                self.rapid_move(Some(first.x), Some(first.y), None);
                match clearance {
                    Some(cz) if cz > z => {
                        let markers = tabs::compute_tab_markers(
                            &sp.cut_path,
                            self.tabs,
                            tp.tool.radius(),
                            DEFAULT_TAB_LENGTH,
                        );
                        let augmented = tabs::splice_markers(&sp.cut_path, &markers);
                        // A path starting inside a tab box has no enter
                        // crossing ahead of it; the pass begins held at the
                        // tab surface and the first Lower brings it down.
                        let lifted = tabs::start_in_tab_zone(
                            &sp.cut_path,
                            self.tabs,
                            tp.tool.radius(),
                            DEFAULT_TAB_LENGTH,
                        );
                        self.plunge(if lifted { cz } else { z }, feed_z);
                        // Skip only the first geometry point (the approach
                        // moves already stand on it); a marker spliced ahead
                        // of it must still be emitted.
                        let mut past_first_point = false;
                        for ap in &augmented {
                            if ap.marker.is_none() && !past_first_point {
                                past_first_point = true;
                                continue;
                            }
                            match ap.marker {
                                Some(TabMarkerKind::Lift) => {
                                    self.cut_move(Some(ap.point.x), Some(ap.point.y), None, feed_xy);
                                    self.cut_move(None, None, Some(cz), feed_z);
                                }
                                Some(TabMarkerKind::Lower) => {
                                    self.cut_move(Some(ap.point.x), Some(ap.point.y), None, feed_xy);
                                    self.plunge(z, feed_z);
                                }
                                None => {
                                    self.cut_move(
                                        Some(ap.point.x),
                                        Some(ap.point.y),
                                        None,
                                        feed_xy,
                                    );
                                }
                            }
                        }
                    }
                    _ => {
                        self.plunge(z, feed_z);
                        for p in sp.cut_path.iter().skip(1) {
                            self.cut_move(Some(p.x), Some(p.y), None, feed_xy);
                        }
                    }
                }
            }
        }
    }
}

/// Cumulative Z depths for each step-down pass, always ending at the full
/// configured depth.
fn pass_depths(tool: &Tool) -> Vec<f64> {
    if tool.pass_depth <= 0.0 || tool.pass_depth >= tool.depth {
        return vec![tool.depth];
    }
    let mut out = Vec::new();
    let mut d = tool.pass_depth;
    while d < tool.depth - 1e-9 {
        out.push(d);
        d += tool.pass_depth;
    }
    out.push(tool.depth);
    out
}
