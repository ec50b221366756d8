//! Directory and catalog reference data.
//!
//! Operators and tasks are provisioned outside the engine; the tracker only
//! reads them to validate events and to pick classification thresholds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::recorder::Thresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(i64);

impl OperatorId {
    /// Identifiers are positive integers; anything else is rejected before
    /// it reaches the engine.
    pub fn new(raw: i64) -> Result<Self> {
        if raw <= 0 {
            return Err(TrackerError::InvalidInput(format!(
                "operator id must be positive, got {raw}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    pub fn new(raw: i64) -> Result<Self> {
        if raw <= 0 {
            return Err(TrackerError::InvalidInput(format!(
                "task id must be positive, got {raw}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub id: OperatorId,
    pub name: String,
    pub production_line: String,
    pub station: String,
    pub active: bool,
    /// Task of the single active assignment, if any.
    pub task_id: Option<TaskId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub standard_time_s: f64,
    pub excellent_threshold_s: f64,
    pub slow_threshold_s: f64,
}

impl Task {
    /// Checks the catalog invariants. Equal thresholds are accepted and
    /// simply leave the Normal band empty.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("standard time", self.standard_time_s),
            ("excellent threshold", self.excellent_threshold_s),
            ("slow threshold", self.slow_threshold_s),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackerError::InvalidInput(format!(
                    "task {}: {field} must be a positive number of seconds, got {value}",
                    self.id
                )));
            }
        }
        if self.excellent_threshold_s > self.slow_threshold_s {
            return Err(TrackerError::InvalidInput(format!(
                "task {}: excellent threshold {} exceeds slow threshold {}",
                self.id, self.excellent_threshold_s, self.slow_threshold_s
            )));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            excellent_s: self.excellent_threshold_s,
            slow_s: self.slow_threshold_s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(standard: f64, excellent: f64, slow: f64) -> Task {
        Task {
            id: TaskId::new(1).unwrap(),
            name: "Side seam".into(),
            standard_time_s: standard,
            excellent_threshold_s: excellent,
            slow_threshold_s: slow,
        }
    }

    #[test]
    fn test_operator_id_rejects_non_positive() {
        assert!(matches!(OperatorId::new(0), Err(TrackerError::InvalidInput(_))));
        assert!(matches!(OperatorId::new(-3), Err(TrackerError::InvalidInput(_))));
        assert_eq!(OperatorId::new(3582).unwrap().get(), 3582);
    }

    #[test]
    fn test_task_validation() {
        assert!(task(13.0, 11.5, 16.0).validate().is_ok());
        // Collapsed Normal band is allowed.
        assert!(task(13.0, 14.0, 14.0).validate().is_ok());
        assert!(matches!(
            task(13.0, 16.0, 11.5).validate(),
            Err(TrackerError::InvalidInput(_))
        ));
        assert!(matches!(
            task(0.0, 11.5, 16.0).validate(),
            Err(TrackerError::InvalidInput(_))
        ));
        assert!(matches!(
            task(13.0, f64::NAN, 16.0).validate(),
            Err(TrackerError::InvalidInput(_))
        ));
    }
}
