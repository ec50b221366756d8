use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::OperatorId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseRecord {
    pub id: i64,
    pub operator_id: OperatorId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole seconds, set when the pause is closed.
    pub duration_s: Option<i64>,
    pub reason: Option<String>,
    pub finalized: bool,
    pub work_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseOutcome {
    pub pause_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_s: Option<i64>,
}
