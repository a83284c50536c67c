// ==========================================
// 采购阶段跟踪系统 - 时间线模板数据仓储
// ==========================================
// 表: timeline_template (每 SKU 一行) + timeline_template_offset (每个偏移一行)
// 说明: 历史数据可能以旧字段名保存偏移, 读取时统一归一化
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::domain::timeline::TimelineTemplate;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::columns::{fmt_datetime, get_opt_datetime};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// TimelineTemplateRepository - 时间线模板仓储
// ==========================================
pub struct TimelineTemplateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TimelineTemplateRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或覆盖模板 (偏移整体替换)
    pub fn upsert(&self, template: &TimelineTemplate, audit: Option<&ActionLog>) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO timeline_template (sku, total_days, updated_by, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(sku) DO UPDATE SET
                total_days = excluded.total_days,
                updated_by = excluded.updated_by,
                updated_at = excluded.updated_at
            "#,
            params![
                template.sku,
                template.total_days,
                template.updated_by,
                template.updated_at.as_ref().map(fmt_datetime),
            ],
        )?;

        tx.execute(
            "DELETE FROM timeline_template_offset WHERE sku = ?",
            params![template.sku],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO timeline_template_offset (sku, offset_key, days) VALUES (?, ?, ?)",
            )?;
            for (key, days) in &template.offsets {
                stmt.execute(params![template.sku, key.field_name(), days])?;
            }
        }

        if let Some(log) = audit {
            ActionLogRepository::insert_with_conn(&tx, log)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 按 SKU 查询模板
    pub fn find_by_sku(&self, sku: &str) -> RepositoryResult<Option<TimelineTemplate>> {
        let conn = self.get_conn()?;

        let header = conn.query_row(
            "SELECT sku, updated_by, updated_at FROM timeline_template WHERE sku = ?",
            params![sku],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?, get_opt_datetime(row, 2)?)),
        );

        let (sku, updated_by, updated_at) = match header {
            Ok(h) => h,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let raw = Self::load_raw_offsets(&conn, &sku)?;
        let (mut template, unknown) = TimelineTemplate::from_raw_offsets(sku, &raw);
        if !unknown.is_empty() {
            warn!(sku = %template.sku, unknown = ?unknown, "模板包含无法识别的偏移字段, 已忽略");
        }
        template.updated_by = updated_by;
        template.updated_at = updated_at;

        Ok(Some(template))
    }

    /// 查询全部模板 (按 SKU 排序)
    pub fn list_all(&self) -> RepositoryResult<Vec<TimelineTemplate>> {
        let skus: Vec<String> = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare("SELECT sku FROM timeline_template ORDER BY sku")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };

        let mut templates = Vec::with_capacity(skus.len());
        for sku in skus {
            if let Some(t) = self.find_by_sku(&sku)? {
                templates.push(t);
            }
        }
        Ok(templates)
    }

    /// 删除模板
    ///
    /// # 返回
    /// - `Ok(true)`: 已删除
    /// - `Ok(false)`: 模板不存在
    pub fn delete(&self, sku: &str, audit: Option<&ActionLog>) -> RepositoryResult<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM timeline_template_offset WHERE sku = ?", params![sku])?;
        let rows = tx.execute("DELETE FROM timeline_template WHERE sku = ?", params![sku])?;
        if rows > 0 {
            if let Some(log) = audit {
                ActionLogRepository::insert_with_conn(&tx, log)?;
            }
        }

        tx.commit()?;
        Ok(rows > 0)
    }

    fn load_raw_offsets(conn: &Connection, sku: &str) -> RepositoryResult<HashMap<String, Option<i32>>> {
        let mut stmt = conn.prepare(
            "SELECT offset_key, days FROM timeline_template_offset WHERE sku = ?",
        )?;
        let raw = stmt
            .query_map(params![sku], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<i32>>(1)?)))?
            .collect::<SqliteResult<HashMap<_, _>>>()?;
        Ok(raw)
    }
}
