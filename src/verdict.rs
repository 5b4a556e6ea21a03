use crate::{
    console::{Console, Level},
    probe::{ProbeOutcome, DEVICE_PRESENCE, FIRST_SECTOR},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline step that takes over after this one.
pub const STEP_PHYSICAL_REPAIR: u8 = 4;
pub const STEP_IMAGING: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Readable,
    Partial,
    Unreadable,
}

impl MediaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaStatus::Readable => "READABLE",
            MediaStatus::Partial => "PARTIAL",
            MediaStatus::Unreadable => "UNREADABLE",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            MediaStatus::Readable => 0,
            MediaStatus::Partial => 1,
            MediaStatus::Unreadable => 2,
        }
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: MediaStatus,
    pub recommendation: String,
    pub recommended_tool: Option<String>,
    pub next_step: Option<u8>,
}

impl Verdict {
    fn physical_repair(recommendation: &str) -> Self {
        Self {
            status: MediaStatus::Unreadable,
            recommendation: recommendation.to_string(),
            recommended_tool: None,
            next_step: Some(STEP_PHYSICAL_REPAIR),
        }
    }

    fn imaging(status: MediaStatus, recommendation: &str, tool: &str) -> Self {
        Self {
            status,
            recommendation: recommendation.to_string(),
            recommended_tool: Some(tool.to_string()),
            next_step: Some(STEP_IMAGING),
        }
    }
}

fn failed(outcomes: &[ProbeOutcome], probe_id: u8) -> bool {
    outcomes
        .iter()
        .find(|o| o.probe_id == probe_id)
        .is_some_and(|o| !o.succeeded)
}

/// Maps the recorded probe outcomes to a verdict. Pure: same input, same
/// output.
///
/// Critical probes are looked up by id rather than position. "All" and "any"
/// range over whatever probes actually ran; an empty list counts as all
/// failed.
pub fn determine_final_status(outcomes: &[ProbeOutcome]) -> Verdict {
    if failed(outcomes, DEVICE_PRESENCE) {
        return Verdict::physical_repair("device not detected by OS, proceed to physical repair");
    }
    if failed(outcomes, FIRST_SECTOR) {
        return Verdict::physical_repair("cannot read first sector, proceed to physical repair");
    }
    if !outcomes.is_empty() && outcomes.iter().all(|o| o.succeeded) {
        return Verdict::imaging(
            MediaStatus::Readable,
            "media fully readable, proceed to imaging with a direct block copy",
            "dc3dd",
        );
    }
    if outcomes.iter().any(|o| o.succeeded) {
        return Verdict::imaging(
            MediaStatus::Partial,
            "media partially readable, bad sectors detected; proceed to imaging with a fault-tolerant/rescue copy tool",
            "ddrescue",
        );
    }
    // Unreachable while probes 1 and 2 always run first.
    Verdict::physical_repair("all tests failed, proceed to physical repair")
}

/// Prints the final summary block.
pub fn announce(console: &dyn Console, verdict: &Verdict) {
    let level = match verdict.status {
        MediaStatus::Readable => Level::Ok,
        MediaStatus::Partial => Level::Warning,
        MediaStatus::Unreadable => Level::Error,
    };
    console.print(&format!("\n{}", "=".repeat(70)), Level::Title);
    console.print(&format!("Result: {}", verdict.status), level);
    console.print(&format!("Recommendation: {}", verdict.recommendation), level);
    if let Some(tool) = &verdict.recommended_tool {
        console.print(&format!("Recommended tool: {tool}"), Level::Info);
    }
    match verdict.next_step {
        Some(step) => console.print(&format!("Next step: {step}"), Level::Info),
        None => console.print("Next step: none", Level::Info),
    }
    console.print(&"=".repeat(70), Level::Title);
}
