use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, PoisonError, RwLock},
    time::Duration as StdDuration,
};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::info;
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    db::Database,
    error::{Result, TrackerError},
    metrics::{dashboard_row, summarize_day, DashboardRow, LiveView, MetricsSnapshot},
    models::{
        cycle::NewCycleRecord, CycleOutcome, CycleRecord, Operator, OperatorId, PauseOutcome,
        PauseRecord, Task,
    },
};
use crate::{op_debug, op_error, op_info, op_warn};

use super::state::{OpenPause, OperatorState, WorkStatus};

const ENABLE_LOGS: bool = true;

const MAX_REASON_CHARS: usize = 120;

/// Per-operator cell. `retired` is set when the cell leaves the table so a
/// caller that was queued on the old lock retries against the new cell.
#[derive(Default)]
struct CellSlot {
    state: OperatorState,
    hydrated_for: Option<NaiveDate>,
    retired: bool,
}

type OperatorCell = Mutex<CellSlot>;

struct DayRecords {
    now: DateTime<Utc>,
    cycles: Vec<CycleRecord>,
    pauses: Vec<PauseRecord>,
    live: LiveView,
}

struct TrackerInner {
    db: Database,
    clock: Arc<dyn Clock>,
    cells: RwLock<HashMap<OperatorId, Arc<OperatorCell>>>,
}

/// Entry point of the productivity engine.
///
/// Mutations for one operator are serialized on that operator's cell;
/// different operators never share a lock beyond the brief table lookup.
/// Each mutation runs in its own spawned task that owns the cell guard, so
/// dropping the caller's future cannot interrupt a half-applied transition.
#[derive(Clone)]
pub struct ProductionTracker {
    inner: Arc<TrackerInner>,
}

impl ProductionTracker {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                db,
                clock,
                cells: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub async fn register_cycle(&self, operator_id: OperatorId) -> Result<CycleOutcome> {
        let inner = Arc::clone(&self.inner);
        run_transition(async move { inner.register_cycle(operator_id).await }).await
    }

    pub async fn start_pause(
        &self,
        operator_id: OperatorId,
        reason: Option<&str>,
    ) -> Result<PauseOutcome> {
        let reason = normalize_reason(reason)?;
        let inner = Arc::clone(&self.inner);
        run_transition(async move { inner.start_pause(operator_id, reason).await }).await
    }

    pub async fn end_pause(&self, operator_id: OperatorId) -> Result<PauseOutcome> {
        let inner = Arc::clone(&self.inner);
        run_transition(async move { inner.end_pause(operator_id).await }).await
    }

    /// Read-only view of an operator's day. Never creates or mutates a cell.
    pub async fn get_snapshot(&self, operator_id: OperatorId) -> Result<MetricsSnapshot> {
        let operator = self.inner.find_operator(operator_id).await?;
        let task = self.inner.assigned_task(&operator).await?;
        self.inner.snapshot_for(&operator, &task).await
    }

    /// One row per active operator, ordered by name. Operators without a
    /// task assignment are listed with their stored activity and no
    /// efficiency.
    pub async fn dashboard(&self) -> Result<Vec<DashboardRow>> {
        let operators = self.inner.db.list_active_operators().await?;
        let mut rows = Vec::with_capacity(operators.len());
        for operator in operators {
            let task = match operator.task_id {
                Some(_) => Some(self.inner.assigned_task(&operator).await?),
                None => None,
            };
            let day = self.inner.load_day(operator.id).await?;
            rows.push(dashboard_row(
                &operator,
                task.as_ref(),
                &day.cycles,
                &day.pauses,
                &day.live,
                day.now,
            ));
        }
        Ok(rows)
    }

    pub async fn active_operators(&self) -> Result<Vec<Operator>> {
        Ok(self.inner.db.list_active_operators().await?)
    }

    /// Pause state of a live cell; `None` when the operator has no cell.
    pub async fn status(&self, operator_id: OperatorId) -> Option<WorkStatus> {
        let cell = self.inner.existing_cell(operator_id)?;
        let slot = cell.lock().await;
        if slot.retired || slot.hydrated_for.is_none() {
            return None;
        }
        Some(slot.state.status())
    }

    pub fn live_cells(&self) -> usize {
        self.inner
            .cells
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drops cells idle for at least `max_idle`. Cells with a transition in
    /// flight are skipped. Returns how many were dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = self.inner.clock.now();
        let mut cells = self
            .inner
            .cells
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = cells.len();

        cells.retain(|_, cell| match cell.try_lock() {
            Ok(mut slot) => {
                let idle = slot.hydrated_for.is_none() || now - slot.state.last_activity >= max_idle;
                if idle {
                    slot.retired = true;
                }
                !idle
            }
            Err(_) => true,
        });

        before - cells.len()
    }

    /// Drops one operator's cell; the next event rebuilds it from the store.
    pub async fn reset_operator(&self, operator_id: OperatorId) -> bool {
        let Some(cell) = self.inner.existing_cell(operator_id) else {
            return false;
        };
        let mut slot = cell.lock().await;
        slot.retired = true;

        let mut cells = self
            .inner
            .cells
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if cells
            .get(&operator_id)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            cells.remove(&operator_id);
        }
        true
    }

    pub fn spawn_idle_sweeper(
        &self,
        every: StdDuration,
        max_idle: Duration,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = tracker.evict_idle(max_idle);
                        if evicted > 0 {
                            info!("Evicted {evicted} idle operator cells");
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        info!("Idle sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }
}

async fn run_transition<T, F>(transition: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(transition)
        .await
        .map_err(|err| TrackerError::Aborted(err.to_string()))?
}

fn normalize_reason(reason: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = reason.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    if raw.chars().count() > MAX_REASON_CHARS {
        return Err(TrackerError::InvalidInput(format!(
            "pause reason exceeds {MAX_REASON_CHARS} characters"
        )));
    }
    Ok(Some(raw.to_string()))
}

impl TrackerInner {
    async fn register_cycle(&self, operator_id: OperatorId) -> Result<CycleOutcome> {
        let operator = self.find_active_operator(operator_id).await?;
        let task = self.assigned_task(&operator).await?;

        let mut slot = self.lock_cell(operator_id).await?;
        let now = self.clock.now();

        let mut next = slot.state.clone();
        let step = next
            .complete_cycle(now, &task.thresholds())
            .inspect_err(|err| op_warn!(operator_id, "cycle rejected: {err}"))?;

        let record = NewCycleRecord {
            operator_id,
            task_id: task.id,
            recorded_at: now,
            work_date: next.work_date,
            elapsed_s: step.elapsed_s,
            rolling_average_s: step.rolling_average_s,
            classification: step.classification,
        };
        let record_id = self
            .db
            .insert_cycle(&record)
            .await
            .inspect_err(|err| op_error!(operator_id, "failed to store cycle: {err:#}"))?;

        slot.state = next;

        match step.elapsed_s {
            Some(elapsed) => op_info!(
                operator_id,
                "cycle {} in {:.1}s, last-5 {:.1}s, {}",
                step.cycles_today,
                elapsed,
                step.rolling_average_s.unwrap_or(elapsed),
                step.classification.as_str()
            ),
            None => op_info!(operator_id, "first cycle of the day registered"),
        }

        Ok(CycleOutcome {
            record_id,
            elapsed_s: step.elapsed_s,
            rolling_average_s: step.rolling_average_s,
            classification: step.classification,
            cycles_today: step.cycles_today,
        })
    }

    async fn start_pause(
        &self,
        operator_id: OperatorId,
        reason: Option<String>,
    ) -> Result<PauseOutcome> {
        self.find_active_operator(operator_id).await?;

        let mut slot = self.lock_cell(operator_id).await?;
        let now = self.clock.now();

        slot.state
            .ensure_working()
            .inspect_err(|err| op_warn!(operator_id, "pause start rejected: {err}"))?;

        let pause_id = self
            .db
            .insert_pause(operator_id, now, reason.clone(), slot.state.work_date)
            .await
            .inspect_err(|err| op_error!(operator_id, "failed to store pause: {err:#}"))?;

        slot.state.begin_pause(
            OpenPause {
                id: pause_id,
                started_at: now,
                reason: reason.clone(),
            },
            now,
        )?;

        op_info!(
            operator_id,
            "pause {pause_id} started ({})",
            reason.as_deref().unwrap_or("no reason")
        );

        Ok(PauseOutcome {
            pause_id,
            started_at: now,
            ended_at: None,
            duration_s: None,
        })
    }

    async fn end_pause(&self, operator_id: OperatorId) -> Result<PauseOutcome> {
        self.find_operator(operator_id).await?;

        let mut slot = self.lock_cell(operator_id).await?;
        let now = self.clock.now();

        let mut next = slot.state.clone();
        let closed = next
            .finish_pause(now)
            .inspect_err(|err| op_warn!(operator_id, "pause end rejected: {err}"))?;

        self.db
            .finalize_pause(closed.id, closed.ended_at, closed.duration_s)
            .await
            .inspect_err(|err| op_error!(operator_id, "failed to close pause: {err:#}"))?;

        slot.state = next;

        op_info!(
            operator_id,
            "pause {} ended after {}s ({}min)",
            closed.id,
            closed.duration_s,
            closed.duration_s / 60
        );

        Ok(PauseOutcome {
            pause_id: closed.id,
            started_at: closed.started_at,
            ended_at: Some(closed.ended_at),
            duration_s: Some(closed.duration_s),
        })
    }

    async fn snapshot_for(&self, operator: &Operator, task: &Task) -> Result<MetricsSnapshot> {
        let day = self.load_day(operator.id).await?;
        Ok(summarize_day(
            operator,
            task,
            &day.cycles,
            &day.pauses,
            &day.live,
            day.now,
        ))
    }

    /// Today's stored records plus the live cell's view, falling back to the
    /// store when the operator has no current cell.
    async fn load_day(&self, operator_id: OperatorId) -> Result<DayRecords> {
        let now = self.clock.now();
        let today = self.clock.work_date(now);

        let cycles = self.db.cycles_for_day(operator_id, today).await?;
        let pauses = self.db.pauses_for_day(operator_id, today).await?;

        let live = match self.live_view(operator_id, today).await {
            Some(live) => live,
            None => {
                let open = self.db.open_pause(operator_id).await?;
                LiveView {
                    rolling_average_s: cycles
                        .iter()
                        .rev()
                        .find(|c| c.elapsed_s.is_some())
                        .and_then(|c| c.rolling_average_s),
                    open_pause_started_at: open.map(|p| p.started_at),
                }
            }
        };

        Ok(DayRecords {
            now,
            cycles,
            pauses,
            live,
        })
    }

    async fn live_view(&self, operator_id: OperatorId, today: NaiveDate) -> Option<LiveView> {
        let cell = self.existing_cell(operator_id)?;
        let slot = cell.lock().await;
        if slot.retired || slot.hydrated_for != Some(today) {
            return None;
        }
        Some(LiveView {
            rolling_average_s: slot.state.rolling_average(),
            open_pause_started_at: slot.state.open_pause.as_ref().map(|p| p.started_at),
        })
    }

    async fn find_operator(&self, operator_id: OperatorId) -> Result<Operator> {
        self.db
            .get_operator(operator_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("operator {operator_id}")))
    }

    async fn find_active_operator(&self, operator_id: OperatorId) -> Result<Operator> {
        let operator = self.find_operator(operator_id).await?;
        if !operator.active {
            return Err(TrackerError::Inactive(format!(
                "operator {operator_id} is deactivated"
            )));
        }
        Ok(operator)
    }

    async fn assigned_task(&self, operator: &Operator) -> Result<Task> {
        let task_id = operator.task_id.ok_or_else(|| {
            TrackerError::Inactive(format!(
                "operator {} has no active task assignment",
                operator.id
            ))
        })?;
        self.db
            .get_task(task_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("task {task_id}")))
    }

    fn existing_cell(&self, operator_id: OperatorId) -> Option<Arc<OperatorCell>> {
        self.cells
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&operator_id)
            .cloned()
    }

    fn cell(&self, operator_id: OperatorId) -> Arc<OperatorCell> {
        if let Some(cell) = self.existing_cell(operator_id) {
            return cell;
        }
        let mut cells = self.cells.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cells.entry(operator_id).or_default())
    }

    /// Locks the operator's cell, (re)hydrating it from today's records when
    /// it is new or belongs to an earlier day.
    async fn lock_cell(&self, operator_id: OperatorId) -> Result<OwnedMutexGuard<CellSlot>> {
        loop {
            let cell = self.cell(operator_id);
            let mut slot = cell.lock_owned().await;
            if slot.retired {
                continue;
            }

            let now = self.clock.now();
            let today = self.clock.work_date(now);
            if slot.hydrated_for != Some(today) {
                slot.state = self.hydrate(operator_id, today).await?;
                slot.hydrated_for = Some(today);
            }
            return Ok(slot);
        }
    }

    async fn hydrate(&self, operator_id: OperatorId, today: NaiveDate) -> Result<OperatorState> {
        let cycles = self.db.cycles_for_day(operator_id, today).await?;
        let open = self.db.open_pause(operator_id).await?;
        // A pause begun before midnight still sets today's reference when it
        // closed today.
        let closed = self
            .db
            .latest_closed_pause(operator_id)
            .await?
            .filter(|p| p.ended_at.map(|end| self.clock.work_date(end)) == Some(today));

        let state = OperatorState::hydrate(
            today,
            &cycles,
            closed.as_ref(),
            open.as_ref(),
            self.clock.now(),
        );
        op_debug!(
            operator_id,
            "state loaded: {} cycles today, {:?}",
            state.cycles_today,
            state.status()
        );
        Ok(state)
    }
}
