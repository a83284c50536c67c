use super::core::ActionLogRepository;
use crate::db::DATETIME_FORMAT;
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Result as SqliteResult, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT action_id, record_id, action_type, action_ts, actor,
           payload_json, detail
    FROM action_log
"#;

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!("{} WHERE action_id = ?", SELECT_COLUMNS))?;

        match stmt.query_row(params![action_id], |row| self.map_row(row)) {
            Ok(log) => Ok(Some(log)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询指定跟踪记录的审计轨迹 (时间正序)
    pub fn find_by_record_id(&self, record_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE record_id = ? ORDER BY action_ts ASC, rowid ASC",
            SELECT_COLUMNS
        ))?;

        let logs = stmt
            .query_map(params![record_id], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询指定时间范围的操作日志
    pub fn find_by_time_range(
        &self,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE action_ts BETWEEN ? AND ? ORDER BY action_ts DESC",
            SELECT_COLUMNS
        ))?;

        let logs = stmt
            .query_map(
                params![
                    start_time.format(DATETIME_FORMAT).to_string(),
                    end_time.format(DATETIME_FORMAT).to_string(),
                ],
                |row| self.map_row(row),
            )?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询最近的操作日志
    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY action_ts DESC, rowid DESC LIMIT ?",
            SELECT_COLUMNS
        ))?;

        let logs = stmt
            .query_map(params![limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 统计指定操作人的操作总数
    pub fn count_by_actor(&self, actor: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;

        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE actor = ?",
            params![actor],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 将数据库行映射为 ActionLog 实体
    fn map_row(&self, row: &Row) -> SqliteResult<ActionLog> {
        let action_ts_str: String = row.get(3)?;
        let action_ts = NaiveDateTime::parse_from_str(&action_ts_str, DATETIME_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;

        let payload_json_str: Option<String> = row.get(5)?;
        let payload_json = payload_json_str.and_then(|s| serde_json::from_str(&s).ok());

        Ok(ActionLog {
            action_id: row.get(0)?,
            record_id: row.get(1)?,
            action_type: row.get(2)?,
            action_ts,
            actor: row.get(4)?,
            payload_json,
            detail: row.get(6)?,
        })
    }
}
