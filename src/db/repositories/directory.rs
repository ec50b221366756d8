//! Operator directory and task catalog.
//!
//! The engine only reads these tables. The write helpers exist for
//! provisioning (tests, the shift simulator, admin tooling).

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, operator_id, task_id},
};
use crate::models::{Operator, OperatorId, Task, TaskId};

const OPERATOR_COLUMNS: &str = "o.id AS id, o.name AS name, o.production_line AS production_line, o.station AS station, o.active AS active, ot.task_id AS task_id";

fn row_to_operator(row: &Row) -> Result<Operator> {
    let assigned: Option<i64> = row.get("task_id")?;
    Ok(Operator {
        id: operator_id(row.get("id")?)?,
        name: row.get("name")?,
        production_line: row.get("production_line")?,
        station: row.get("station")?,
        active: row.get::<_, i64>("active")? != 0,
        task_id: assigned.map(task_id).transpose()?,
    })
}

fn row_to_task(row: &Row) -> Result<Task> {
    Ok(Task {
        id: task_id(row.get("id")?)?,
        name: row.get("name")?,
        standard_time_s: row.get("standard_time_s")?,
        excellent_threshold_s: row.get("excellent_threshold_s")?,
        slow_threshold_s: row.get("slow_threshold_s")?,
    })
}

impl Database {
    pub async fn get_operator(&self, id: OperatorId) -> Result<Option<Operator>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {OPERATOR_COLUMNS}
                 FROM operators o
                 LEFT JOIN operator_tasks ot ON ot.operator_id = o.id AND ot.active = 1
                 WHERE o.id = ?1"
            ))?;

            let mut rows = stmt.query(params![id.get()])?;
            let operator = match rows.next()? {
                Some(row) => Some(row_to_operator(row)?),
                None => None,
            };
            Ok(operator)
        })
        .await
    }

    pub async fn list_active_operators(&self) -> Result<Vec<Operator>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {OPERATOR_COLUMNS}
                 FROM operators o
                 LEFT JOIN operator_tasks ot ON ot.operator_id = o.id AND ot.active = 1
                 WHERE o.active = 1
                 ORDER BY o.name, o.id"
            ))?;

            let mut rows = stmt.query([])?;
            let mut operators = Vec::new();
            while let Some(row) = rows.next()? {
                operators.push(row_to_operator(row)?);
            }
            Ok(operators)
        })
        .await
    }

    pub async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        self.execute(move |conn| {
            let task = conn
                .query_row(
                    "SELECT id, name, standard_time_s, excellent_threshold_s, slow_threshold_s
                     FROM tasks
                     WHERE id = ?1",
                    params![id.get()],
                    |row| Ok(row_to_task(row)),
                )
                .optional()?
                .transpose()?;
            Ok(task)
        })
        .await
    }

    /// Inserts or updates an operator's identity fields. The assignment is
    /// managed separately through [`Database::assign_task`].
    pub async fn upsert_operator(&self, operator: &Operator) -> Result<()> {
        let record = operator.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO operators (id, name, production_line, station, active)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     production_line = excluded.production_line,
                     station = excluded.station,
                     active = excluded.active",
                params![
                    record.id.get(),
                    record.name,
                    record.production_line,
                    record.station,
                    record.active as i64,
                ],
            )
            .with_context(|| format!("failed to upsert operator {}", record.id))?;
            Ok(())
        })
        .await
    }

    /// Rejects invalid thresholds before touching the store; the error
    /// downcasts to [`crate::error::TrackerError::InvalidInput`].
    pub async fn upsert_task(&self, task: &Task) -> Result<()> {
        task.validate()?;
        let record = task.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, name, standard_time_s, excellent_threshold_s, slow_threshold_s)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     standard_time_s = excluded.standard_time_s,
                     excellent_threshold_s = excluded.excellent_threshold_s,
                     slow_threshold_s = excluded.slow_threshold_s",
                params![
                    record.id.get(),
                    record.name,
                    record.standard_time_s,
                    record.excellent_threshold_s,
                    record.slow_threshold_s,
                ],
            )
            .with_context(|| format!("failed to upsert task {}", record.id))?;
            Ok(())
        })
        .await
    }

    /// Makes `task_id` the operator's only active assignment.
    pub async fn assign_task(
        &self,
        operator_id: OperatorId,
        task_id: TaskId,
        assigned_at: DateTime<Utc>,
    ) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "UPDATE operator_tasks SET active = 0 WHERE operator_id = ?1 AND active = 1",
                params![operator_id.get()],
            )?;
            tx.execute(
                "INSERT INTO operator_tasks (operator_id, task_id, active, assigned_at)
                 VALUES (?1, ?2, 1, ?3)",
                params![operator_id.get(), task_id.get(), format_datetime(&assigned_at)],
            )
            .with_context(|| format!("failed to assign task {task_id} to operator {operator_id}"))?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn end_assignment(&self, operator_id: OperatorId) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "UPDATE operator_tasks SET active = 0 WHERE operator_id = ?1 AND active = 1",
                params![operator_id.get()],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn set_operator_active(&self, operator_id: OperatorId, active: bool) -> Result<()> {
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE operators SET active = ?1 WHERE id = ?2",
                params![active as i64, operator_id.get()],
            )?;

            if rows_affected == 0 {
                return Err(anyhow!("operator {operator_id} not found"));
            }
            Ok(())
        })
        .await
    }
}
