use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration as StdDuration,
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use linepace_lib::{
    Clock, Database, ManualClock, Operator, OperatorId, ProductionTracker, Task, TaskId,
};
use tempfile::TempDir;

/// Moves forward one second on every read, so each transition sees a
/// distinct instant no matter how callers interleave.
struct TickingClock {
    start: DateTime<Utc>,
    ticks: AtomicI64,
}

impl Clock for TickingClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.start + Duration::seconds(tick)
    }
}

fn shift_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
}

fn op(id: i64) -> OperatorId {
    OperatorId::new(id).unwrap()
}

async fn seeded_db(operators: &[i64]) -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("floor.sqlite3")).unwrap();
    let task = Task {
        id: TaskId::new(1).unwrap(),
        name: "Side seam".into(),
        standard_time_s: 13.0,
        excellent_threshold_s: 11.5,
        slow_threshold_s: 16.0,
    };
    db.upsert_task(&task).await.unwrap();
    for &id in operators {
        db.upsert_operator(&Operator {
            id: op(id),
            name: format!("Operator {id}"),
            production_line: "Line A".into(),
            station: format!("S{id}"),
            active: true,
            task_id: None,
        })
        .await
        .unwrap();
        db.assign_task(op(id), task.id, shift_start()).await.unwrap();
    }
    (dir, db)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cycles_for_one_operator_serialize() {
    let (_dir, db) = seeded_db(&[7]).await;
    let clock = Arc::new(TickingClock {
        start: shift_start(),
        ticks: AtomicI64::new(0),
    });
    let tracker = ProductionTracker::new(db.clone(), clock.clone());

    const CALLS: usize = 40;
    let mut handles = Vec::with_capacity(CALLS);
    for _ in 0..CALLS {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(
            async move { tracker.register_cycle(op(7)).await },
        ));
    }
    let mut counts = Vec::with_capacity(CALLS);
    for handle in handles {
        counts.push(handle.await.unwrap().unwrap().cycles_today);
    }
    counts.sort_unstable();
    assert_eq!(counts, (1..=CALLS as u64).collect::<Vec<_>>());

    let records = db.cycles_for_day(op(7), clock.today()).await.unwrap();
    assert_eq!(records.len(), CALLS);
    for pair in records.windows(2) {
        assert!(pair[0].recorded_at < pair[1].recorded_at);
    }
    assert_eq!(records.iter().filter(|r| r.elapsed_s.is_none()).count(), 1);

    let elapsed: Vec<f64> = records.iter().filter_map(|r| r.elapsed_s).collect();
    let tail = &elapsed[elapsed.len() - 5..];
    let expected = tail.iter().sum::<f64>() / 5.0;
    let snapshot = tracker.get_snapshot(op(7)).await.unwrap();
    let last_five = snapshot.last_five_average_s.unwrap();
    assert!((last_five - expected).abs() < 1e-9);
    assert_eq!(snapshot.cycles_today, CALLS as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_operators_progress_independently() {
    let ids: Vec<i64> = (1..=6).collect();
    let (_dir, db) = seeded_db(&ids).await;
    let clock = Arc::new(ManualClock::starting_at(shift_start()));
    let tracker = ProductionTracker::new(db.clone(), clock.clone());

    let mut handles = Vec::new();
    for &id in &ids {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            for round in 0..10 {
                tracker.register_cycle(op(id)).await?;
                if round == 4 {
                    tracker.start_pause(op(id), Some("Restroom")).await?;
                    tracker.end_pause(op(id)).await?;
                }
            }
            tracker.get_snapshot(op(id)).await
        }));
    }

    let all = async {
        let mut snapshots = Vec::new();
        for handle in handles {
            snapshots.push(handle.await.unwrap().unwrap());
        }
        snapshots
    };
    let snapshots = tokio::time::timeout(StdDuration::from_secs(30), all)
        .await
        .expect("operators should not block each other");

    for snapshot in snapshots {
        assert_eq!(snapshot.cycles_today, 10);
        assert_eq!(snapshot.pauses_today, 1);
        assert!(!snapshot.paused);
    }
    assert_eq!(tracker.live_cells(), ids.len());
}

#[tokio::test]
async fn test_dropped_caller_does_not_abort_transition() {
    let (_dir, db) = seeded_db(&[7]).await;
    let clock = Arc::new(ManualClock::starting_at(shift_start()));
    let tracker = ProductionTracker::new(db.clone(), clock.clone());

    // The caller gives up immediately; the transition still lands.
    let _ = tokio::time::timeout(StdDuration::ZERO, tracker.start_pause(op(7), None)).await;

    let mut open = None;
    for _ in 0..100 {
        open = db.open_pause(op(7)).await.unwrap();
        if open.is_some() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    assert!(open.is_some());

    // The cell agrees with the store once the in-flight transition commits.
    clock.advance(Duration::seconds(30));
    let ended = tracker.end_pause(op(7)).await.unwrap();
    assert_eq!(ended.duration_s, Some(30));
    assert!(db.open_pause(op(7)).await.unwrap().is_none());
}
