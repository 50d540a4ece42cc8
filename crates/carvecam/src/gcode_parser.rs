//! Inverse of the synthesizer: G-code text back into movements.
//!
//! Command words are matched against the profile's parsed rapid/cut
//! templates, so an axis-swapped or inverted profile decodes exactly what it
//! encoded. One `Movement` per source line, index-aligned; every line that
//! is not a recognized movement contributes the shared non-movement
//! sentinel, which keeps blank lines, comments and setup codes from
//! shifting the playback cursor.

use tracing::debug;

use crate::postprocessor::{MoveTemplate, PostProcessorProfile, TemplateWord};
use crate::types::{GcodeToolInfo, MoveKind, Movement, ParsedGcode};

pub fn parse_gcode(text: &str, profile: &PostProcessorProfile) -> ParsedGcode {
    let templates = profile
        .movement_templates()
        .or_else(|_| PostProcessorProfile::default().movement_templates());
    let (rapid, cut) = match templates {
        Ok(t) => t,
        Err(_) => {
            return ParsedGcode {
                movements: text.lines().map(|_| Movement::NON_MOVEMENT).collect(),
                tools: Vec::new(),
            }
        }
    };
    let scale = profile.units.scale();

    let mut movements = Vec::new();
    let mut tools: Vec<GcodeToolInfo> = Vec::new();
    let mut state = Movement::NON_MOVEMENT;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            movements.push(Movement::NON_MOVEMENT);
            continue;
        }
        if is_comment(line, profile.comment_char) {
            if let Some(info) = parse_tool_comment(line) {
                let index = match tools.iter().position(|t| *t == info) {
                    Some(i) => i,
                    None => {
                        tools.push(info);
                        tools.len() - 1
                    }
                };
                state.tool_index = index as i32;
            }
            movements.push(Movement::NON_MOVEMENT);
            continue;
        }

        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("");
        let template = if rapid.command.as_deref() == Some(command) {
            Some((&rapid, MoveKind::Rapid))
        } else if cut.command.as_deref() == Some(command) {
            Some((&cut, MoveKind::Cut))
        } else {
            None
        };
        let Some((template, kind)) = template else {
            debug!(line, "unrecognized command word, treated as non-movement");
            movements.push(Movement::NON_MOVEMENT);
            continue;
        };

        for word in words {
            apply_word(word, template, scale, &mut state);
        }
        state.kind = kind;
        movements.push(state);
    }

    ParsedGcode { movements, tools }
}

fn is_comment(line: &str, comment_char: char) -> bool {
    line.starts_with('(') || line.starts_with(';') || line.starts_with(comment_char)
}

/// Decode one `X10.00`-style word into the modal state, undoing the
/// profile's axis mapping, inversion and unit scaling.
fn apply_word(word: &str, template: &MoveTemplate, scale: f64, state: &mut Movement) {
    let Some(letter) = word.chars().next() else {
        return;
    };
    let Ok(value) = word[letter.len_utf8()..].parse::<f64>() else {
        return;
    };
    if letter == 'F' {
        state.feed_rate = value / scale;
        return;
    }
    for tw in &template.words {
        if let TemplateWord::Axis {
            letter: tl,
            slot,
            inverted,
        } = tw
        {
            if *tl == letter {
                let logical = if *inverted { -value } else { value } / scale;
                match slot {
                    0 => state.x = logical,
                    1 => state.y = logical,
                    _ => state.z = logical,
                }
                return;
            }
        }
    }
}

/// Recognize the machine-readable tool marker the synthesizer writes:
/// `Tool: ID=<int> Type=<str> Diameter=<float> Angle=<float> [StepDown=<float>]`.
fn parse_tool_comment(line: &str) -> Option<GcodeToolInfo> {
    let start = line.find("Tool:")?;
    let body = line[start + "Tool:".len()..].trim_end_matches(')');

    let mut id = None;
    let mut bit_type = None;
    let mut diameter = None;
    let mut angle = None;
    let mut pass_depth = None;
    for token in body.split_whitespace() {
        let (key, value) = token.split_once('=')?;
        match key {
            "ID" => id = value.parse::<i32>().ok(),
            "Type" => bit_type = Some(value.to_string()),
            "Diameter" => diameter = value.parse::<f64>().ok(),
            "Angle" => angle = value.parse::<f64>().ok(),
            "StepDown" => pass_depth = value.parse::<f64>().ok(),
            _ => {}
        }
    }
    Some(GcodeToolInfo {
        id: id?,
        bit_type: bit_type?,
        diameter: diameter?,
        angle_degrees: angle?,
        pass_depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_cut_lines_with_modal_state() {
        let gcode = "G1 X10 Y0 F500\nG1 X10 Y10 F500\n";
        let parsed = parse_gcode(gcode, &PostProcessorProfile::grbl());
        assert_eq!(parsed.movements.len(), 2);
        let a = parsed.movements[0];
        let b = parsed.movements[1];
        assert_eq!(a.kind, MoveKind::Cut);
        assert_eq!((a.x, a.y, a.z), (10.0, 0.0, 0.0));
        assert_eq!((b.x, b.y, b.z), (10.0, 10.0, 0.0));
        assert_eq!(a.feed_rate, 500.0, "feed is modal");
        assert_eq!(b.feed_rate, 500.0);
    }

    #[test]
    fn test_index_alignment_across_comments_and_blanks() {
        let gcode = "G21\n\n; a comment\nG0 X1 Y2\n";
        let parsed = parse_gcode(gcode, &PostProcessorProfile::grbl());
        assert_eq!(parsed.movements.len(), 4, "one movement per source line");
        assert_eq!(parsed.movements[0], Movement::NON_MOVEMENT);
        assert_eq!(parsed.movements[1], Movement::NON_MOVEMENT);
        assert_eq!(parsed.movements[2], Movement::NON_MOVEMENT);
        assert_eq!(parsed.movements[3].kind, MoveKind::Rapid);
        assert_eq!(parsed.movements[3].x, 1.0);
    }

    #[test]
    fn test_tool_comment_registers_and_dedupes() {
        let gcode = "; Tool: ID=1 Type=EndMill Diameter=6.00 Angle=0.00 StepDown=3.00\n\
                     G1 X1 Y1 F500\n\
                     ; Tool: ID=1 Type=EndMill Diameter=6.00 Angle=0.00 StepDown=3.00\n\
                     G1 X2 Y2 F500\n";
        let parsed = parse_gcode(gcode, &PostProcessorProfile::grbl());
        assert_eq!(parsed.tools.len(), 1, "identical markers deduplicate");
        assert_eq!(parsed.tools[0].diameter, 6.0);
        assert_eq!(parsed.tools[0].pass_depth, Some(3.0));
        assert_eq!(parsed.movements[1].tool_index, 0);
        assert_eq!(parsed.movements[3].tool_index, 0);
    }

    #[test]
    fn test_inverted_axis_decodes_back() {
        let gcode = "G1 X5.00 Y-7.00 F500\n";
        let parsed = parse_gcode(gcode, &PostProcessorProfile::grbl_inverted_y());
        assert_eq!(parsed.movements[0].x, 5.0);
        assert_eq!(parsed.movements[0].y, 7.0, "inversion undone on parse");
    }

    #[test]
    fn test_inches_scale_back_to_mm() {
        let gcode = "G0 X1.0000 Y0.5000\n";
        let parsed = parse_gcode(gcode, &PostProcessorProfile::grbl_inches());
        assert!((parsed.movements[0].x - 25.4).abs() < 1e-9);
        assert!((parsed.movements[0].y - 12.7).abs() < 1e-9);
    }

    #[test]
    fn test_unrecognized_lines_share_the_sentinel() {
        let gcode = "M3 S18000\nG4 P1\n";
        let parsed = parse_gcode(gcode, &PostProcessorProfile::grbl());
        assert!(parsed
            .movements
            .iter()
            .all(|m| m.kind == MoveKind::NonMovement));
    }
}
