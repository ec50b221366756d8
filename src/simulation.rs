//! Synthetic shift driver.
//!
//! Seeds a small roster with known performance profiles and replays a shift
//! against the tracker on a [`ManualClock`], so a full day runs in
//! milliseconds and the resulting classifications can be eyeballed.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use crate::{
    clock::{Clock, ManualClock},
    db::Database,
    error::Result,
    metrics::{DashboardRow, MetricsSnapshot},
    models::{Operator, OperatorId, Task, TaskId},
    settings::SimulationSettings,
    tracker::ProductionTracker,
};

const PAUSE_REASONS: [&str; 4] = ["Restroom", "No materials", "Machine fault", "Supervisor call"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Profile {
    Excellent,
    Normal,
    Slow,
}

impl Profile {
    pub fn cycle_secs(self) -> RangeInclusive<f64> {
        match self {
            Profile::Excellent => 10.0..=11.5,
            Profile::Normal => 12.0..=15.0,
            Profile::Slow => 16.0..=20.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedOperator {
    pub operator: Operator,
    pub profile: Profile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftReport {
    pub cycles_registered: u64,
    pub pauses_taken: u64,
    pub snapshots: Vec<MetricsSnapshot>,
    pub dashboard: Vec<DashboardRow>,
}

/// Single task (standard 13.0s, thresholds 11.5s / 16.0s) and one operator
/// per profile.
pub fn default_roster() -> Result<(Task, Vec<SimulatedOperator>)> {
    let task = Task {
        id: TaskId::new(1)?,
        name: "Side seam".into(),
        standard_time_s: 13.0,
        excellent_threshold_s: 11.5,
        slow_threshold_s: 16.0,
    };

    let people = [
        (3582, "Ana Torres", "S1", Profile::Excellent),
        (3583, "Luis Paredes", "S2", Profile::Normal),
        (3584, "Marta Quispe", "S3", Profile::Slow),
    ];
    let mut roster = Vec::with_capacity(people.len());
    for (id, name, station, profile) in people {
        roster.push(SimulatedOperator {
            operator: Operator {
                id: OperatorId::new(id)?,
                name: name.into(),
                production_line: "Line A".into(),
                station: station.into(),
                active: true,
                task_id: Some(task.id),
            },
            profile,
        });
    }
    Ok((task, roster))
}

/// Writes the task, the operators and their assignments.
pub async fn provision(
    db: &Database,
    task: &Task,
    roster: &[SimulatedOperator],
    assigned_at: DateTime<Utc>,
) -> Result<()> {
    db.upsert_task(task).await?;
    for member in roster {
        db.upsert_operator(&member.operator).await?;
        db.assign_task(member.operator.id, task.id, assigned_at).await?;
    }
    Ok(())
}

pub async fn simulate_shift(
    tracker: &ProductionTracker,
    clock: &ManualClock,
    roster: &[SimulatedOperator],
    settings: &SimulationSettings,
) -> Result<ShiftReport> {
    let mut rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let pause_probability = settings.pause_probability.clamp(0.0, 1.0);
    let pause_secs = settings.pause_secs_min.min(settings.pause_secs_max)
        ..=settings.pause_secs_max.max(settings.pause_secs_min);

    let mut cycles_registered = 0;
    let mut pauses_taken = 0;

    for member in roster {
        let id = member.operator.id;
        info!(
            "Simulating {} ({:?}) from {}",
            member.operator.name,
            member.profile,
            clock.now()
        );

        // Opening press starts the reference clock.
        tracker.register_cycle(id).await?;
        cycles_registered += 1;

        for _ in 0..settings.cycles_per_operator {
            clock.advance_secs_f64(rng.gen_range(member.profile.cycle_secs()));
            tracker.register_cycle(id).await?;
            cycles_registered += 1;

            if rng.gen_bool(pause_probability) {
                let reason = PAUSE_REASONS[rng.gen_range(0..PAUSE_REASONS.len())];
                tracker.start_pause(id, Some(reason)).await?;
                clock.advance_secs_f64(rng.gen_range(pause_secs.clone()));
                tracker.end_pause(id).await?;
                pauses_taken += 1;
            }
        }
    }

    let mut snapshots = Vec::with_capacity(roster.len());
    for member in roster {
        snapshots.push(tracker.get_snapshot(member.operator.id).await?);
    }
    let dashboard = tracker.dashboard().await?;

    Ok(ShiftReport {
        cycles_registered,
        pauses_taken,
        snapshots,
        dashboard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Classification;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_profiles_land_in_their_bands() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("sim.sqlite3")).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::starting_at(start));
        let tracker = ProductionTracker::new(db.clone(), clock.clone());

        let (task, roster) = default_roster().unwrap();
        provision(&db, &task, &roster, start).await.unwrap();

        let settings = SimulationSettings {
            cycles_per_operator: 8,
            pause_probability: 0.0,
            seed: Some(42),
            ..SimulationSettings::default()
        };
        let report = simulate_shift(&tracker, &clock, &roster, &settings)
            .await
            .unwrap();

        assert_eq!(report.cycles_registered, 27);
        assert_eq!(report.pauses_taken, 0);
        assert_eq!(report.dashboard.len(), 3);

        let labels: Vec<_> = report
            .snapshots
            .iter()
            .map(|s| s.current_classification)
            .collect();
        // Slow profile is 16s or more per cycle, so its mean is always Slow;
        // Excellent stays at or below 11.5s.
        assert_eq!(labels[0], Some(Classification::Excellent));
        assert_eq!(labels[2], Some(Classification::Slow));
        for snapshot in &report.snapshots {
            assert_eq!(snapshot.cycles_today, 9);
            assert!(snapshot.efficiency_percent.is_some());
        }
    }
}
