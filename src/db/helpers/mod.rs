use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::models::{Classification, OperatorId, TaskId};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fixed-width RFC 3339 so stored timestamps also sort lexically.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn format_date(value: NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).with_context(|| format!("failed to parse {field}"))
}

pub fn parse_classification(value: &str) -> Result<Classification> {
    Classification::parse(value).context("failed to parse classification")
}

pub fn operator_id(value: i64) -> Result<OperatorId> {
    OperatorId::new(value).map_err(|err| anyhow::anyhow!("stored operator_id is invalid: {err}"))
}

pub fn task_id(value: i64) -> Result<TaskId> {
    TaskId::new(value).map_err(|err| anyhow::anyhow!("stored task_id is invalid: {err}"))
}
