pub mod clock;
pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod recorder;
pub mod settings;
pub mod simulation;
pub mod tracker;
mod utils;

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::Database;
pub use error::{Result, TrackerError};
pub use metrics::{DashboardRow, MetricsSnapshot};
pub use models::{Classification, CycleOutcome, Operator, OperatorId, PauseOutcome, Task, TaskId};
pub use settings::Settings;
pub use tracker::{ProductionTracker, WorkStatus};

/// Runs the shift simulator against the configured database and prints the
/// resulting snapshots and dashboard as JSON.
pub async fn run() -> anyhow::Result<()> {
    let settings = Settings::load()?;

    // RUST_LOG still wins over the configured default level.
    let default_level = if settings.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    log::info!("linepace starting up...");

    let database = Database::new(settings.database_path.clone())?;
    let clock = Arc::new(ManualClock::starting_at(Utc::now()));
    let tracker = ProductionTracker::new(database.clone(), clock.clone());

    let cancel_token = CancellationToken::new();
    let sweeper = tracker.spawn_idle_sweeper(
        StdDuration::from_secs(settings.sweep_interval_secs.max(1)),
        Duration::seconds(settings.idle_eviction_secs as i64),
        cancel_token.clone(),
    );

    let (task, roster) = simulation::default_roster()?;
    simulation::provision(&database, &task, &roster, clock.now()).await?;
    let report = simulation::simulate_shift(&tracker, &clock, &roster, &settings.simulation).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    cancel_token.cancel();
    if let Err(err) = sweeper.await {
        log::error!("Idle sweeper task failed: {err}");
    }

    log::info!(
        "Simulated {} cycles and {} pauses into {}",
        report.cycles_registered,
        report.pauses_taken,
        database.path().display()
    );
    Ok(())
}
