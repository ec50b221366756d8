use crate::models::Classification;

/// Classification bands of a task, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub excellent_s: f64,
    pub slow_s: f64,
}

/// Classifies a rolling average against the task thresholds.
///
/// Both boundaries are inclusive and the Excellent check runs first, so a
/// task with equal thresholds never yields Normal at that value.
pub fn classify(mean_s: f64, thresholds: &Thresholds) -> Classification {
    if mean_s <= thresholds.excellent_s {
        Classification::Excellent
    } else if mean_s >= thresholds.slow_s {
        Classification::Slow
    } else {
        Classification::Normal
    }
}
