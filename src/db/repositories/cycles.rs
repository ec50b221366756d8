use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_date, format_datetime, operator_id, parse_classification, parse_date,
        parse_datetime, task_id,
    },
};
use crate::models::{cycle::NewCycleRecord, CycleRecord, OperatorId};

fn row_to_cycle(row: &Row) -> Result<CycleRecord> {
    let recorded_at: String = row.get("recorded_at")?;
    let work_date: String = row.get("work_date")?;
    let classification: String = row.get("classification")?;

    Ok(CycleRecord {
        id: row.get("id")?,
        operator_id: operator_id(row.get("operator_id")?)?,
        task_id: task_id(row.get("task_id")?)?,
        recorded_at: parse_datetime(&recorded_at, "recorded_at")?,
        work_date: parse_date(&work_date, "work_date")?,
        elapsed_s: row.get("elapsed_s")?,
        rolling_average_s: row.get("rolling_average_s")?,
        classification: parse_classification(&classification)?,
    })
}

impl Database {
    /// Appends a cycle record and returns its id.
    pub async fn insert_cycle(&self, record: &NewCycleRecord) -> Result<i64> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO cycle_records (operator_id, task_id, recorded_at, work_date, elapsed_s, rolling_average_s, classification)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.operator_id.get(),
                    record.task_id.get(),
                    format_datetime(&record.recorded_at),
                    format_date(record.work_date),
                    record.elapsed_s,
                    record.rolling_average_s,
                    record.classification.as_str(),
                ],
            )
            .with_context(|| format!("failed to insert cycle for operator {}", record.operator_id))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// All of an operator's cycle records for `work_date`, oldest first.
    pub async fn cycles_for_day(
        &self,
        operator_id: OperatorId,
        work_date: NaiveDate,
    ) -> Result<Vec<CycleRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, operator_id, task_id, recorded_at, work_date, elapsed_s, rolling_average_s, classification
                 FROM cycle_records
                 WHERE operator_id = ?1 AND work_date = ?2
                 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query(params![operator_id.get(), format_date(work_date)])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_cycle(row)?);
            }
            Ok(records)
        })
        .await
    }
}
