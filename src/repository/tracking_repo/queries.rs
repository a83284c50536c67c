use super::core::TrackingRecordRepository;
use crate::domain::stage::applicable_stages;
use crate::domain::tracking::{StageState, TrackingRecord};
use crate::domain::types::{CriticalityLevel, GeneralStatus, Incoterm, PurchaseVariant};
use crate::repository::columns::{get_datetime, get_opt_date, get_opt_datetime, get_stage};
use crate::repository::error::{conversion_error, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row, ToSql};
use std::collections::BTreeMap;

const SELECT_RECORD: &str = r#"
    SELECT record_id, quotation_id, line_id, project_id, sku, description,
           quantity, origin_country, transport_mode, purchase_type, incoterm,
           supplier_name, unit_price, total_price, discount_price,
           criticality_score, criticality_level, delay_days, general_status,
           approved, approved_at, approved_by, approval_notes,
           rejected, rejected_at, rejected_by, rejection_reason,
           revision, created_at, updated_at
    FROM tracking_record r
"#;

/// 未收货条件 (终点阶段为 RECEIVED)
const NOT_RECEIVED: &str = r#"
    NOT EXISTS (
        SELECT 1 FROM tracking_stage s
        WHERE s.record_id = r.record_id AND s.stage = 'RECEIVED' AND s.completed = 1
    )
"#;

impl TrackingRecordRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 record_id 查询
    pub fn find_by_id(&self, record_id: &str) -> RepositoryResult<Option<TrackingRecord>> {
        let conn = self.get_conn()?;
        let mut records = Self::query_records(
            &conn,
            &format!("{} WHERE r.record_id = ?", SELECT_RECORD),
            params![record_id],
        )?;
        Ok(records.pop())
    }

    /// 按报价行查询 (每个报价行至多一条记录)
    pub fn find_by_line_id(&self, line_id: &str) -> RepositoryResult<Option<TrackingRecord>> {
        let conn = self.get_conn()?;
        let mut records = Self::query_records(
            &conn,
            &format!("{} WHERE r.line_id = ?", SELECT_RECORD),
            params![line_id],
        )?;
        Ok(records.pop())
    }

    /// 查询报价单下的全部记录
    pub fn list_by_quotation(&self, quotation_id: &str) -> RepositoryResult<Vec<TrackingRecord>> {
        let conn = self.get_conn()?;
        Self::query_records(
            &conn,
            &format!("{} WHERE r.quotation_id = ? ORDER BY r.created_at, r.record_id", SELECT_RECORD),
            params![quotation_id],
        )
    }

    /// 查询活跃记录 (未驳回且未收货)
    pub fn list_active(&self) -> RepositoryResult<Vec<TrackingRecord>> {
        let conn = self.get_conn()?;
        Self::query_records(
            &conn,
            &format!(
                "{} WHERE r.rejected = 0 AND {} ORDER BY r.created_at, r.record_id",
                SELECT_RECORD, NOT_RECEIVED
            ),
            params![],
        )
    }

    /// 统计使用某 SKU 的活跃记录数
    pub fn count_active_by_sku(&self, sku: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM tracking_record r WHERE r.sku = ? AND r.rejected = 0 AND {}",
                NOT_RECEIVED
            ),
            params![sku],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 报价单下各记录的审批状态
    pub fn approvals_by_quotation(&self, quotation_id: &str) -> RepositoryResult<Vec<bool>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT approved FROM tracking_record WHERE quotation_id = ? ORDER BY record_id",
        )?;
        let approvals = stmt
            .query_map(params![quotation_id], |row| row.get::<_, bool>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(approvals)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn query_records(
        conn: &Connection,
        sql: &str,
        args: &[&dyn ToSql],
    ) -> RepositoryResult<Vec<TrackingRecord>> {
        let mut stmt = conn.prepare(sql)?;
        let mut records = stmt
            .query_map(args, Self::map_record_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        for record in &mut records {
            Self::load_stages(conn, record)?;
        }
        Ok(records)
    }

    fn load_stages(conn: &Connection, record: &mut TrackingRecord) -> RepositoryResult<()> {
        let mut stmt = conn.prepare(
            r#"
            SELECT stage, completed, actual_date, deadline, evidence_ref
            FROM tracking_stage
            WHERE record_id = ?
            "#,
        )?;

        let rows = stmt
            .query_map(params![record.record_id], |row| {
                Ok((
                    get_stage(row, 0)?,
                    StageState {
                        completed: row.get(1)?,
                        actual_date: get_opt_datetime(row, 2)?,
                        deadline: get_opt_date(row, 3)?,
                        evidence_ref: row.get(4)?,
                    },
                ))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        // 只保留适用阶段, 缺失的阶段补空白状态
        let mut stages: BTreeMap<_, _> = applicable_stages(record.variant)
            .iter()
            .map(|s| (*s, StageState::default()))
            .collect();
        for (stage, state) in rows {
            if let Some(slot) = stages.get_mut(&stage) {
                *slot = state;
            }
        }
        record.stages = stages;
        Ok(())
    }

    /// 将数据库行映射为 TrackingRecord (阶段另行加载)
    fn map_record_row(row: &Row) -> SqliteResult<TrackingRecord> {
        let variant_str: String = row.get(9)?;
        let variant = PurchaseVariant::from_str(&variant_str)
            .ok_or_else(|| conversion_error(9, format!("未知采购类型: {}", variant_str)))?;
        let incoterm = row
            .get::<_, Option<String>>(10)?
            .and_then(|s| Incoterm::from_str(&s));

        Ok(TrackingRecord {
            record_id: row.get(0)?,
            quotation_id: row.get(1)?,
            line_id: row.get(2)?,
            project_id: row.get(3)?,
            sku: row.get(4)?,
            description: row.get(5)?,
            quantity: row.get(6)?,
            origin_country: row.get(7)?,
            transport_mode: row.get(8)?,
            variant,
            stages: BTreeMap::new(),
            incoterm,
            supplier_name: row.get(11)?,
            unit_price: row.get(12)?,
            total_price: row.get(13)?,
            discount_price: row.get(14)?,
            criticality_score: row.get(15)?,
            criticality_level: CriticalityLevel::from_str(&row.get::<_, String>(16)?),
            delay_days: row.get(17)?,
            general_status: GeneralStatus::from_str(&row.get::<_, String>(18)?),
            approved: row.get(19)?,
            approved_at: get_opt_datetime(row, 20)?,
            approved_by: row.get(21)?,
            approval_notes: row.get(22)?,
            rejected: row.get(23)?,
            rejected_at: get_opt_datetime(row, 24)?,
            rejected_by: row.get(25)?,
            rejection_reason: row.get(26)?,
            revision: row.get(27)?,
            created_at: get_datetime(row, 28)?,
            updated_at: get_datetime(row, 29)?,
        })
    }
}
