use crate::types::{BitKind, MachineOptions, OperationKind, Tool, WoodSpecies};

/// Reference diameter the species chip-load table is calibrated for, mm.
const REFERENCE_DIAMETER: f64 = 6.0;
/// Plunge feed as a fraction of the lateral feed.
const PLUNGE_RATIO: f64 = 0.3;
/// Plunge feeds are clamped to this fraction of the configured max.
const MAX_PLUNGE_FRACTION: f64 = 0.5;

/// Chip load in mm per tooth for this tool in this material: the species
/// base value scaled by `sqrt(diameter / 6mm)` and de-rated for fragile bit
/// geometries.
pub fn chip_load(species: WoodSpecies, diameter: f64, bit: BitKind) -> f64 {
    let scale = (diameter.max(0.1) / REFERENCE_DIAMETER).sqrt();
    let fragility = match bit {
        BitKind::VBit => 0.6,
        BitKind::Drill => 0.5,
        _ => 1.0,
    };
    species.base_chip_load() * scale * fragility
}

/// Lateral feed rate in mm/min. Automatic mode derives it from spindle rpm,
/// flute count and chip load, de-rated by depth of cut and radial
/// engagement, then clamped to the configured window. Manual mode returns
/// the tool's stored feed verbatim.
pub fn feed_xy(tool: &Tool, operation: OperationKind, options: &MachineOptions) -> f64 {
    if !options.auto_feed_rate {
        return tool.feed_xy;
    }

    let base = tool.rpm * tool.flutes as f64 * chip_load(options.wood_species, tool.diameter, tool.bit);

    // Deeper passes load the flutes harder; down to half feed at a pass one
    // diameter deep.
    let depth_ratio = if tool.diameter > f64::EPSILON {
        (tool.pass_depth / tool.diameter).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let depth_factor = 1.0 - 0.5 * depth_ratio;

    // Radial engagement: a profile cut buries the full diameter, pocketing
    // only the stepover fraction.
    let engagement = match operation {
        OperationKind::Pocket => (tool.stepover_percent / 100.0).clamp(0.0, 1.0),
        _ => 1.0,
    };
    let engagement_factor = 1.0 - 0.5 * engagement;

    let feed = base * depth_factor * engagement_factor * options.wood_species.feed_multiplier();
    feed.clamp(options.min_feed_rate, options.max_feed_rate)
}

/// Plunge feed rate in mm/min. Automatic mode derives it from the lateral
/// feed and keeps it at or below it; manual mode returns the tool's stored
/// plunge feed verbatim.
pub fn feed_z(tool: &Tool, operation: OperationKind, options: &MachineOptions) -> f64 {
    if !options.auto_feed_rate {
        return tool.feed_z;
    }

    let xy = feed_xy(tool, operation, options);
    let mut feed = PLUNGE_RATIO * xy;

    // Deep plunges evacuate chips poorly.
    if tool.pass_depth > 0.5 * tool.diameter {
        feed *= 0.7;
    }
    feed *= match tool.bit {
        BitKind::Drill => 0.8,
        BitKind::VBit => 0.75,
        _ => 1.0,
    };

    feed.min(MAX_PLUNGE_FRACTION * options.max_feed_rate).min(xy)
}
