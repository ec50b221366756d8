use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_date, format_datetime, operator_id, parse_date, parse_datetime, parse_optional_datetime},
};
use crate::models::{OperatorId, PauseRecord};

const PAUSE_COLUMNS: &str =
    "id, operator_id, started_at, ended_at, duration_s, reason, finalized, work_date";

fn row_to_pause(row: &Row) -> Result<PauseRecord> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let work_date: String = row.get("work_date")?;

    Ok(PauseRecord {
        id: row.get("id")?,
        operator_id: operator_id(row.get("operator_id")?)?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        duration_s: row.get("duration_s")?,
        reason: row.get("reason")?,
        finalized: row.get::<_, i64>("finalized")? != 0,
        work_date: parse_date(&work_date, "work_date")?,
    })
}

impl Database {
    /// Opens a pause and returns its id. The store rejects a second open
    /// pause for the same operator.
    pub async fn insert_pause(
        &self,
        operator_id: OperatorId,
        started_at: DateTime<Utc>,
        reason: Option<String>,
        work_date: NaiveDate,
    ) -> Result<i64> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO pause_records (operator_id, started_at, reason, finalized, work_date)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![
                    operator_id.get(),
                    format_datetime(&started_at),
                    reason,
                    format_date(work_date),
                ],
            )
            .with_context(|| format!("failed to insert pause for operator {operator_id}"))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn finalize_pause(
        &self,
        pause_id: i64,
        ended_at: DateTime<Utc>,
        duration_s: i64,
    ) -> Result<()> {
        self.execute(move |conn| {
            let rows_affected = conn
                .execute(
                    "UPDATE pause_records
                     SET ended_at = ?1,
                         duration_s = ?2,
                         finalized = 1
                     WHERE id = ?3 AND finalized = 0",
                    params![format_datetime(&ended_at), duration_s, pause_id],
                )
                .with_context(|| "failed to finalize pause record")?;

            if rows_affected == 0 {
                return Err(anyhow!("pause {pause_id} is not open"));
            }
            Ok(())
        })
        .await
    }

    pub async fn open_pause(&self, operator_id: OperatorId) -> Result<Option<PauseRecord>> {
        self.execute(move |conn| {
            let pause = conn
                .query_row(
                    &format!(
                        "SELECT {PAUSE_COLUMNS}
                         FROM pause_records
                         WHERE operator_id = ?1 AND finalized = 0
                         ORDER BY id DESC
                         LIMIT 1"
                    ),
                    params![operator_id.get()],
                    |row| Ok(row_to_pause(row)),
                )
                .optional()?
                .transpose()?;
            Ok(pause)
        })
        .await
    }

    /// The finalized pause that ended last, whatever day it started on.
    pub async fn latest_closed_pause(&self, operator_id: OperatorId) -> Result<Option<PauseRecord>> {
        self.execute(move |conn| {
            let pause = conn
                .query_row(
                    &format!(
                        "SELECT {PAUSE_COLUMNS}
                         FROM pause_records
                         WHERE operator_id = ?1 AND finalized = 1
                         ORDER BY ended_at DESC, id DESC
                         LIMIT 1"
                    ),
                    params![operator_id.get()],
                    |row| Ok(row_to_pause(row)),
                )
                .optional()?
                .transpose()?;
            Ok(pause)
        })
        .await
    }

    /// Pauses that started on `work_date`, oldest first.
    pub async fn pauses_for_day(
        &self,
        operator_id: OperatorId,
        work_date: NaiveDate,
    ) -> Result<Vec<PauseRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PAUSE_COLUMNS}
                 FROM pause_records
                 WHERE operator_id = ?1 AND work_date = ?2
                 ORDER BY id ASC"
            ))?;

            let mut rows = stmt.query(params![operator_id.get(), format_date(work_date)])?;
            let mut pauses = Vec::new();
            while let Some(row) = rows.next()? {
                pauses.push(row_to_pause(row)?);
            }
            Ok(pauses)
        })
        .await
    }
}
