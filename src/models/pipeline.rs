use serde::Deserialize;

/// Board columns in pipeline order. Positions matter: stepping moves a trip
/// one slot left or right, and unknown statuses fall back to the first slot.
pub const STAGES: [&str; 6] = [
    "Pending Verification",
    "TX Approved",
    "TA In Progress",
    "TA Completed",
    "Bundling In Progress",
    "Bundle Completed",
];

pub fn first_stage() -> &'static str {
    STAGES[0]
}

pub fn stage_index(name: &str) -> Option<usize> {
    STAGES.iter().position(|stage| *stage == name)
}

/// Resolves any status string to a real column name. Names that are not one
/// of the canonical stages land on the first stage.
pub fn canonical_stage(name: &str) -> &'static str {
    STAGES[stage_index(name).unwrap_or(0)]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepDirection {
    Prev,
    Next,
}

/// One step along the pipeline, clamped at both ends.
pub fn step_index(current: usize, direction: StepDirection) -> usize {
    match direction {
        StepDirection::Prev => current.saturating_sub(1),
        StepDirection::Next => (current + 1).min(STAGES.len() - 1),
    }
}

pub fn stepped_stage(current: &str, direction: StepDirection) -> &'static str {
    let index = stage_index(current).unwrap_or(0);
    STAGES[step_index(index, direction)]
}
