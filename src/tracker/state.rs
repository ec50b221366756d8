use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::models::{Classification, CycleRecord, PauseRecord};
use crate::recorder::{classify, RollingWindow, Thresholds};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum WorkStatus {
    #[default]
    Working,
    Paused,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPause {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPause {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_s: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleStep {
    pub elapsed_s: Option<f64>,
    pub rolling_average_s: Option<f64>,
    pub classification: Classification,
    pub cycles_today: u64,
}

/// Everything the engine keeps in memory for one operator's working day.
#[derive(Debug, Clone, Default)]
pub struct OperatorState {
    pub work_date: NaiveDate,
    pub window: RollingWindow,
    /// Previous cycle end or the end of the last closed pause, whichever is
    /// later. `None` until the first event of the day.
    pub last_reference: Option<DateTime<Utc>>,
    pub cycles_today: u64,
    pub last_classification: Option<Classification>,
    pub open_pause: Option<OpenPause>,
    pub last_activity: DateTime<Utc>,
}

impl OperatorState {
    pub fn new(work_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            work_date,
            last_activity: now,
            ..Self::default()
        }
    }

    /// Rebuilds the state from the day's cycle records (oldest first), the
    /// last pause closed during the day and the open pause, if any.
    ///
    /// `last_closed_pause` may have started on an earlier day; only its end
    /// matters here.
    pub fn hydrate(
        work_date: NaiveDate,
        cycles: &[CycleRecord],
        last_closed_pause: Option<&PauseRecord>,
        open_pause: Option<&PauseRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let window = RollingWindow::from_recent(cycles.iter().filter_map(|c| c.elapsed_s));

        let last_cycle_at = cycles.last().map(|c| c.recorded_at);
        let last_pause_end = last_closed_pause
            .filter(|p| p.finalized)
            .and_then(|p| p.ended_at);
        let last_reference = match (last_cycle_at, last_pause_end) {
            (Some(cycle), Some(pause)) => Some(cycle.max(pause)),
            (cycle, pause) => cycle.or(pause),
        };

        Self {
            work_date,
            window,
            last_reference,
            cycles_today: cycles.len() as u64,
            last_classification: cycles.last().map(|c| c.classification),
            open_pause: open_pause.map(|p| OpenPause {
                id: p.id,
                started_at: p.started_at,
                reason: p.reason.clone(),
            }),
            last_activity: now,
        }
    }

    pub fn status(&self) -> WorkStatus {
        if self.open_pause.is_some() {
            WorkStatus::Paused
        } else {
            WorkStatus::Working
        }
    }

    pub fn rolling_average(&self) -> Option<f64> {
        self.window.mean()
    }

    pub fn ensure_working(&self) -> Result<()> {
        match &self.open_pause {
            Some(pause) => Err(TrackerError::InvalidState(format!(
                "pause {} has been open since {}",
                pause.id, pause.started_at
            ))),
            None => Ok(()),
        }
    }

    /// Applies a completion at `now`. Fails while a pause is open.
    pub fn complete_cycle(&mut self, now: DateTime<Utc>, thresholds: &Thresholds) -> Result<CycleStep> {
        self.ensure_working()?;

        let elapsed_s = self.last_reference.map(|reference| {
            let millis = (now - reference).num_milliseconds().max(0);
            millis as f64 / 1000.0
        });

        if let Some(elapsed) = elapsed_s {
            self.window.push(elapsed);
        }

        let rolling_average_s = match elapsed_s {
            Some(_) => self.window.mean(),
            None => None,
        };
        let classification = rolling_average_s
            .map(|mean| classify(mean, thresholds))
            .unwrap_or(Classification::Normal);

        self.last_reference = Some(now);
        self.cycles_today += 1;
        self.last_classification = Some(classification);
        self.last_activity = now;

        Ok(CycleStep {
            elapsed_s,
            rolling_average_s,
            classification,
            cycles_today: self.cycles_today,
        })
    }

    pub fn begin_pause(&mut self, pause: OpenPause, now: DateTime<Utc>) -> Result<()> {
        self.ensure_working()?;
        self.open_pause = Some(pause);
        self.last_activity = now;
        Ok(())
    }

    /// Closes the open pause at `now`; its end becomes the next cycle's
    /// reference instant.
    pub fn finish_pause(&mut self, now: DateTime<Utc>) -> Result<ClosedPause> {
        let pause = self
            .open_pause
            .take()
            .ok_or_else(|| TrackerError::InvalidState("no pause is open".into()))?;

        let duration_s = (now - pause.started_at).num_seconds().max(0);
        self.last_reference = Some(now);
        self.last_activity = now;

        Ok(ClosedPause {
            id: pause.id,
            started_at: pause.started_at,
            ended_at: now,
            duration_s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OperatorId, TaskId};
    use chrono::{Duration, TimeZone};

    const THRESHOLDS: Thresholds = Thresholds {
        excellent_s: 11.5,
        slow_s: 16.0,
    };

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn cycle(id: i64, secs: i64, elapsed: Option<f64>) -> CycleRecord {
        CycleRecord {
            id,
            operator_id: OperatorId::new(7).unwrap(),
            task_id: TaskId::new(1).unwrap(),
            recorded_at: at(secs),
            work_date: date(),
            elapsed_s: elapsed,
            rolling_average_s: elapsed,
            classification: Classification::Normal,
        }
    }

    #[test]
    fn test_first_cycle_has_no_elapsed_but_counts() {
        let mut state = OperatorState::new(date(), at(0));
        let step = state.complete_cycle(at(0), &THRESHOLDS).unwrap();
        assert_eq!(step.elapsed_s, None);
        assert_eq!(step.rolling_average_s, None);
        assert_eq!(step.classification, Classification::Normal);
        assert_eq!(step.cycles_today, 1);
        assert!(state.window.is_empty());
    }

    #[test]
    fn test_classification_uses_rolling_mean() {
        let mut state = OperatorState::new(date(), at(0));
        state.complete_cycle(at(0), &THRESHOLDS).unwrap();
        state.complete_cycle(at(10), &THRESHOLDS).unwrap();
        // Single slow cycle pulls the mean to 15.0: still Normal.
        let step = state.complete_cycle(at(30), &THRESHOLDS).unwrap();
        assert_eq!(step.elapsed_s, Some(20.0));
        assert_eq!(step.rolling_average_s, Some(15.0));
        assert_eq!(step.classification, Classification::Normal);
        assert_eq!(step.cycles_today, 3);
    }

    #[test]
    fn test_cycle_rejected_while_paused_leaves_state() {
        let mut state = OperatorState::new(date(), at(0));
        state.complete_cycle(at(0), &THRESHOLDS).unwrap();
        state
            .begin_pause(
                OpenPause {
                    id: 1,
                    started_at: at(5),
                    reason: None,
                },
                at(5),
            )
            .unwrap();

        let before = state.clone();
        let err = state.complete_cycle(at(20), &THRESHOLDS).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidState(_)));
        assert_eq!(state.cycles_today, before.cycles_today);
        assert_eq!(state.window, before.window);
        assert_eq!(state.status(), WorkStatus::Paused);
    }

    #[test]
    fn test_pause_end_becomes_reference() {
        let mut state = OperatorState::new(date(), at(0));
        state.complete_cycle(at(0), &THRESHOLDS).unwrap();
        state
            .begin_pause(
                OpenPause {
                    id: 1,
                    started_at: at(10),
                    reason: Some("Restroom".into()),
                },
                at(10),
            )
            .unwrap();
        let closed = state.finish_pause(at(610)).unwrap();
        assert_eq!(closed.duration_s, 600);
        assert_eq!(state.status(), WorkStatus::Working);

        let step = state.complete_cycle(at(622), &THRESHOLDS).unwrap();
        assert_eq!(step.elapsed_s, Some(12.0));
    }

    #[test]
    fn test_double_pause_and_end_without_pause() {
        let mut state = OperatorState::new(date(), at(0));
        assert!(matches!(
            state.finish_pause(at(1)),
            Err(TrackerError::InvalidState(_))
        ));

        let pause = OpenPause {
            id: 3,
            started_at: at(1),
            reason: None,
        };
        state.begin_pause(pause.clone(), at(1)).unwrap();
        assert!(matches!(
            state.begin_pause(pause, at(2)),
            Err(TrackerError::InvalidState(_))
        ));
    }

    #[test]
    fn test_pause_duration_floors_and_never_negative() {
        let mut state = OperatorState::new(date(), at(0));
        state
            .begin_pause(
                OpenPause {
                    id: 1,
                    started_at: at(100),
                    reason: None,
                },
                at(100),
            )
            .unwrap();
        let closed = state
            .finish_pause(at(100) + Duration::milliseconds(59_900))
            .unwrap();
        assert_eq!(closed.duration_s, 59);

        state
            .begin_pause(
                OpenPause {
                    id: 2,
                    started_at: at(300),
                    reason: None,
                },
                at(300),
            )
            .unwrap();
        assert_eq!(state.finish_pause(at(200)).unwrap().duration_s, 0);
    }

    #[test]
    fn test_hydrate_rebuilds_window_and_reference() {
        let cycles: Vec<CycleRecord> = std::iter::once(cycle(1, 0, None))
            .chain((1..=7).map(|i| cycle(i + 1, i * 12, Some(10.0 + i as f64))))
            .collect();
        let pause = PauseRecord {
            id: 1,
            operator_id: OperatorId::new(7).unwrap(),
            started_at: at(90),
            ended_at: Some(at(120)),
            duration_s: Some(30),
            reason: None,
            finalized: true,
            work_date: date(),
        };

        let state = OperatorState::hydrate(date(), &cycles, Some(&pause), None, at(130));
        assert_eq!(state.cycles_today, 8);
        assert_eq!(
            state.window.iter().collect::<Vec<_>>(),
            vec![13.0, 14.0, 15.0, 16.0, 17.0]
        );
        assert_eq!(state.rolling_average(), Some(15.0));
        // Pause ended after the last cycle (84s), so it is the reference.
        assert_eq!(state.last_reference, Some(at(120)));
        assert_eq!(state.status(), WorkStatus::Working);
    }

    #[test]
    fn test_hydrate_keeps_end_of_pause_started_yesterday() {
        let pause = PauseRecord {
            id: 4,
            operator_id: OperatorId::new(7).unwrap(),
            started_at: at(-1200),
            ended_at: Some(at(600)),
            duration_s: Some(1800),
            reason: None,
            finalized: true,
            work_date: date().pred_opt().unwrap(),
        };

        let mut state = OperatorState::hydrate(date(), &[], Some(&pause), None, at(605));
        assert_eq!(state.cycles_today, 0);
        assert_eq!(state.last_reference, Some(at(600)));

        let step = state.complete_cycle(at(612), &THRESHOLDS).unwrap();
        assert_eq!(step.elapsed_s, Some(12.0));
    }
}
