mod types;

pub use types::{DashboardRow, MetricsSnapshot};

use chrono::{DateTime, Utc};

use crate::models::{Classification, CycleRecord, Operator, PauseRecord, Task};

/// Values owned by the in-memory operator state, or their stored fallbacks.
#[derive(Debug, Clone, Default)]
pub struct LiveView {
    pub rolling_average_s: Option<f64>,
    pub open_pause_started_at: Option<DateTime<Utc>>,
}

/// Counts and averages over one operator's day, independent of any task.
struct DayTally {
    cycles_today: u64,
    excellent_cycles: u64,
    normal_cycles: u64,
    slow_cycles: u64,
    daily_average_s: Option<f64>,
    current_classification: Option<Classification>,
    current_pause_s: Option<i64>,
    pauses_today: u64,
    pause_total_s: i64,
}

fn tally_day(
    cycles: &[CycleRecord],
    pauses: &[PauseRecord],
    live: &LiveView,
    now: DateTime<Utc>,
) -> DayTally {
    let mut excellent_cycles = 0;
    let mut normal_cycles = 0;
    let mut slow_cycles = 0;
    for record in cycles {
        match record.classification {
            Classification::Excellent => excellent_cycles += 1,
            Classification::Normal => normal_cycles += 1,
            Classification::Slow => slow_cycles += 1,
        }
    }

    DayTally {
        cycles_today: cycles.len() as u64,
        excellent_cycles,
        normal_cycles,
        slow_cycles,
        daily_average_s: mean(cycles.iter().filter_map(|c| c.elapsed_s)),
        current_classification: cycles.last().map(|c| c.classification),
        current_pause_s: live
            .open_pause_started_at
            .map(|started_at| (now - started_at).num_seconds().max(0)),
        pauses_today: pauses.len() as u64,
        pause_total_s: pauses
            .iter()
            .filter(|p| p.finalized)
            .filter_map(|p| p.duration_s)
            .sum(),
    }
}

/// Builds the snapshot from today's records. Pure; performs no I/O.
pub fn summarize_day(
    operator: &Operator,
    task: &Task,
    cycles: &[CycleRecord],
    pauses: &[PauseRecord],
    live: &LiveView,
    now: DateTime<Utc>,
) -> MetricsSnapshot {
    let tally = tally_day(cycles, pauses, live, now);
    let efficiency_percent = tally
        .daily_average_s
        .and_then(|avg| efficiency(task.standard_time_s, avg));

    MetricsSnapshot {
        operator_id: operator.id,
        name: operator.name.clone(),
        task_name: task.name.clone(),
        standard_time_s: task.standard_time_s,
        cycles_today: tally.cycles_today,
        excellent_cycles: tally.excellent_cycles,
        normal_cycles: tally.normal_cycles,
        slow_cycles: tally.slow_cycles,
        daily_average_s: tally.daily_average_s,
        last_five_average_s: live.rolling_average_s,
        current_classification: tally.current_classification,
        paused: tally.current_pause_s.is_some(),
        current_pause_s: tally.current_pause_s,
        pauses_today: tally.pauses_today,
        pause_total_s: tally.pause_total_s,
        efficiency_percent,
    }
}

/// Dashboard line for an operator. Without an assigned task there is no
/// standard time, so efficiency stays absent.
pub fn dashboard_row(
    operator: &Operator,
    task: Option<&Task>,
    cycles: &[CycleRecord],
    pauses: &[PauseRecord],
    live: &LiveView,
    now: DateTime<Utc>,
) -> DashboardRow {
    let tally = tally_day(cycles, pauses, live, now);
    let efficiency_percent = match (task, tally.daily_average_s) {
        (Some(task), Some(avg)) => efficiency(task.standard_time_s, avg),
        _ => None,
    };

    DashboardRow {
        operator_id: operator.id,
        name: operator.name.clone(),
        production_line: operator.production_line.clone(),
        station: operator.station.clone(),
        cycles_today: tally.cycles_today,
        daily_average_s: tally.daily_average_s,
        current_classification: tally.current_classification,
        paused: tally.current_pause_s.is_some(),
        efficiency_percent,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// A zero daily average (every cycle instantaneous) has no meaningful ratio.
fn efficiency(standard_time_s: f64, daily_average_s: f64) -> Option<f64> {
    if daily_average_s > 0.0 {
        Some(standard_time_s / daily_average_s * 100.0)
    } else {
        None
    }
}
