use crate::domain::action_log::ActionLog;
use crate::domain::tracking::TrackingRecord;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::columns::{fmt_date, fmt_datetime};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// TrackingRecordRepository - 跟踪记录仓储
// ==========================================
pub struct TrackingRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TrackingRecordRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入新记录 (含全部阶段行), 可附带审计日志
    ///
    /// # 错误
    /// - `UniqueConstraintViolation`: 同一报价行已有记录
    pub fn insert(&self, record: &TrackingRecord, audit: Option<&ActionLog>) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO tracking_record (
                record_id, quotation_id, line_id, project_id, sku, description,
                quantity, origin_country, transport_mode, purchase_type, incoterm,
                supplier_name, unit_price, total_price, discount_price,
                criticality_score, criticality_level, delay_days, general_status,
                approved, approved_at, approved_by, approval_notes,
                rejected, rejected_at, rejected_by, rejection_reason,
                revision, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30
            )
            "#,
            params![
                record.record_id,
                record.quotation_id,
                record.line_id,
                record.project_id,
                record.sku,
                record.description,
                record.quantity,
                record.origin_country,
                record.transport_mode,
                record.variant.to_db_str(),
                record.incoterm.map(|i| i.to_db_str()),
                record.supplier_name,
                record.unit_price,
                record.total_price,
                record.discount_price,
                record.criticality_score,
                record.criticality_level.to_db_str(),
                record.delay_days,
                record.general_status.to_db_str(),
                record.approved,
                record.approved_at.as_ref().map(fmt_datetime),
                record.approved_by,
                record.approval_notes,
                record.rejected,
                record.rejected_at.as_ref().map(fmt_datetime),
                record.rejected_by,
                record.rejection_reason,
                record.revision,
                fmt_datetime(&record.created_at),
                fmt_datetime(&record.updated_at),
            ],
        )?;

        Self::write_stages(&tx, record)?;
        if let Some(log) = audit {
            ActionLogRepository::insert_with_conn(&tx, log)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 更新记录 (带乐观锁检查), 可附带审计日志
    ///
    /// # 返回
    /// - `Ok(new_revision)`
    ///
    /// # 错误
    /// - `OptimisticLockFailure`: revision 不匹配 (其他用户已更新)
    /// - `NotFound`: record_id 不存在
    pub fn update(&self, record: &TrackingRecord, audit: Option<&ActionLog>) -> RepositoryResult<i32> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let rows_affected = tx.execute(
            r#"
            UPDATE tracking_record
            SET project_id = ?1, description = ?2, quantity = ?3,
                origin_country = ?4, transport_mode = ?5, incoterm = ?6,
                supplier_name = ?7, unit_price = ?8, total_price = ?9, discount_price = ?10,
                criticality_score = ?11, criticality_level = ?12, delay_days = ?13,
                general_status = ?14,
                approved = ?15, approved_at = ?16, approved_by = ?17, approval_notes = ?18,
                rejected = ?19, rejected_at = ?20, rejected_by = ?21, rejection_reason = ?22,
                updated_at = ?23, revision = revision + 1
            WHERE record_id = ?24 AND revision = ?25
            "#,
            params![
                record.project_id,
                record.description,
                record.quantity,
                record.origin_country,
                record.transport_mode,
                record.incoterm.map(|i| i.to_db_str()),
                record.supplier_name,
                record.unit_price,
                record.total_price,
                record.discount_price,
                record.criticality_score,
                record.criticality_level.to_db_str(),
                record.delay_days,
                record.general_status.to_db_str(),
                record.approved,
                record.approved_at.as_ref().map(fmt_datetime),
                record.approved_by,
                record.approval_notes,
                record.rejected,
                record.rejected_at.as_ref().map(fmt_datetime),
                record.rejected_by,
                record.rejection_reason,
                fmt_datetime(&record.updated_at),
                record.record_id,
                record.revision,
            ],
        )?;

        if rows_affected == 0 {
            // 判断是记录不存在还是 revision 冲突
            let actual: Result<i32, _> = tx.query_row(
                "SELECT revision FROM tracking_record WHERE record_id = ?",
                params![record.record_id],
                |row| row.get(0),
            );
            return match actual {
                Ok(actual) => Err(RepositoryError::OptimisticLockFailure {
                    record_id: record.record_id.clone(),
                    expected: record.revision,
                    actual,
                }),
                Err(_) => Err(RepositoryError::NotFound {
                    entity: "TrackingRecord".to_string(),
                    id: record.record_id.clone(),
                }),
            };
        }

        Self::write_stages(&tx, record)?;
        if let Some(log) = audit {
            ActionLogRepository::insert_with_conn(&tx, log)?;
        }

        tx.commit()?;
        Ok(record.revision + 1)
    }

    fn write_stages(conn: &Connection, record: &TrackingRecord) -> RepositoryResult<()> {
        let mut stmt = conn.prepare(
            r#"
            INSERT OR REPLACE INTO tracking_stage (
                record_id, stage, completed, actual_date, deadline, evidence_ref
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )?;

        for (stage, state) in &record.stages {
            stmt.execute(params![
                record.record_id,
                stage.to_db_str(),
                state.completed,
                state.actual_date.as_ref().map(fmt_datetime),
                state.deadline.as_ref().map(fmt_date),
                state.evidence_ref,
            ])?;
        }
        Ok(())
    }
}
