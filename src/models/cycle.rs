use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{OperatorId, TaskId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Classification {
    Excellent,
    Normal,
    Slow,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Excellent => "Excellent",
            Classification::Normal => "Normal",
            Classification::Slow => "Slow",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "Excellent" => Ok(Classification::Excellent),
            "Normal" => Ok(Classification::Normal),
            "Slow" => Ok(Classification::Slow),
            other => Err(anyhow!("unknown classification '{other}'")),
        }
    }
}

/// Immutable completion fact. Never updated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleRecord {
    pub id: i64,
    pub operator_id: OperatorId,
    pub task_id: TaskId,
    pub recorded_at: DateTime<Utc>,
    pub work_date: NaiveDate,
    /// Absent for the first completion of the working day.
    pub elapsed_s: Option<f64>,
    pub rolling_average_s: Option<f64>,
    pub classification: Classification,
}

/// A cycle record that has been computed but not yet stored.
#[derive(Debug, Clone)]
pub struct NewCycleRecord {
    pub operator_id: OperatorId,
    pub task_id: TaskId,
    pub recorded_at: DateTime<Utc>,
    pub work_date: NaiveDate,
    pub elapsed_s: Option<f64>,
    pub rolling_average_s: Option<f64>,
    pub classification: Classification,
}

/// Result of registering a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleOutcome {
    pub record_id: i64,
    pub elapsed_s: Option<f64>,
    pub rolling_average_s: Option<f64>,
    pub classification: Classification,
    pub cycles_today: u64,
}
