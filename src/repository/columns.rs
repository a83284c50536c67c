// ==========================================
// 采购阶段跟踪系统 - 列编解码辅助
// ==========================================
// 日期/时间统一以 TEXT 存储 (db::DATE_FORMAT / db::DATETIME_FORMAT)
// ==========================================

use crate::db::{DATETIME_FORMAT, DATE_FORMAT};
use crate::repository::error::conversion_error;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Result as SqliteResult, Row};

pub(crate) fn fmt_datetime(ts: &NaiveDateTime) -> String {
    ts.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub(crate) fn get_datetime(row: &Row, idx: usize) -> SqliteResult<NaiveDateTime> {
    let s: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

pub(crate) fn get_opt_datetime(row: &Row, idx: usize) -> SqliteResult<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(s) => NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

pub(crate) fn get_opt_date(row: &Row, idx: usize) -> SqliteResult<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(s) => NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// 读取阶段列
pub(crate) fn get_stage(row: &Row, idx: usize) -> SqliteResult<crate::domain::stage::Stage> {
    let s: String = row.get(idx)?;
    crate::domain::stage::Stage::from_str(&s)
        .ok_or_else(|| conversion_error(idx, format!("未知阶段: {}", s)))
}
