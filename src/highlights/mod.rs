pub mod parser;
pub mod planner;

use serde::{Deserialize, Serialize};

pub use parser::{parse_highlights, ParseError};
pub use planner::{plan_cuts, CutRange, PlanError};

/// A model-suggested highlight span, straight out of the response parser.
///
/// `end > start` is NOT guaranteed here; the model produces these and the
/// planner is responsible for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightCandidate {
    pub title: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub rationale: String,
}
