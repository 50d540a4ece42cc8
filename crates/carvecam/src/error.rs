use crate::types::BitKind;
use thiserror::Error;

/// Failures the core reports to its caller. Degenerate offsets are not
/// listed: an offset or pocket step that produces zero rings is recoverable
/// and the generators simply stop adding rings.
#[derive(Debug, Error)]
pub enum CamError {
    #[error("no tool selected for this operation")]
    NoToolSelected,

    #[error("operation requires a {required} bit, current tool is a {actual}")]
    IncompatibleTool { required: BitKind, actual: BitKind },

    #[error("select a path to {operation}")]
    NoPathSelected { operation: String },

    #[error("medial axis computation failed: {reason}")]
    MedialAxisFailure { reason: String },

    #[error("post-processor template has no recognizable movement command: {template}")]
    TemplateParseError { template: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_user_facing() {
        let err = CamError::NoPathSelected {
            operation: "Profile".to_string(),
        };
        assert_eq!(err.to_string(), "select a path to Profile");

        let err = CamError::IncompatibleTool {
            required: BitKind::VBit,
            actual: BitKind::EndMill,
        };
        assert!(err.to_string().contains("VBit"));
        assert!(err.to_string().contains("EndMill"));
    }
}
