use serde::{Deserialize, Serialize};

use crate::models::{Classification, OperatorId};

/// Live productivity view of one operator for the current working day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub operator_id: OperatorId,
    pub name: String,
    pub task_name: String,
    pub standard_time_s: f64,
    /// Every completion today, including the first one without elapsed time.
    pub cycles_today: u64,
    pub excellent_cycles: u64,
    pub normal_cycles: u64,
    pub slow_cycles: u64,
    pub daily_average_s: Option<f64>,
    pub last_five_average_s: Option<f64>,
    pub current_classification: Option<Classification>,
    pub paused: bool,
    pub current_pause_s: Option<i64>,
    pub pauses_today: u64,
    pub pause_total_s: i64,
    /// `standard / daily average * 100`; absent until a timed cycle exists.
    pub efficiency_percent: Option<f64>,
}

/// One line of the floor dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardRow {
    pub operator_id: OperatorId,
    pub name: String,
    pub production_line: String,
    pub station: String,
    pub cycles_today: u64,
    pub daily_average_s: Option<f64>,
    pub current_classification: Option<Classification>,
    pub paused: bool,
    pub efficiency_percent: Option<f64>,
}
