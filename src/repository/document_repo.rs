// ==========================================
// 采购阶段跟踪系统 - 文档数据仓储
// ==========================================
// 表: required_document / attached_document / not_applicable_justification
// 红线: 附件只增不删, 不适用说明按 (记录, 阶段) 覆盖
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::domain::document::{AttachedDocument, NotApplicableJustification, RequiredDocument};
use crate::domain::stage::Stage;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::columns::{fmt_datetime, get_datetime, get_stage};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// DocumentRepository - 文档仓储
// ==========================================
pub struct DocumentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 必备文档配置
    // ==========================================

    /// 新增或更新必备文档配置
    pub fn upsert_required(&self, doc: &RequiredDocument) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO required_document (
                document_id, stage, name, description, mandatory, display_order, active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(document_id) DO UPDATE SET
                stage = excluded.stage,
                name = excluded.name,
                description = excluded.description,
                mandatory = excluded.mandatory,
                display_order = excluded.display_order,
                active = excluded.active
            "#,
            params![
                doc.document_id,
                doc.stage.to_db_str(),
                doc.name,
                doc.description,
                doc.mandatory,
                doc.display_order,
                doc.active,
            ],
        )?;
        Ok(())
    }

    /// 查询阶段的必备文档配置 (含停用项, 由调用方过滤)
    pub fn list_required_for_stage(&self, stage: Stage) -> RepositoryResult<Vec<RequiredDocument>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT document_id, stage, name, description, mandatory, display_order, active
            FROM required_document
            WHERE stage = ?
            ORDER BY display_order, document_id
            "#,
        )?;
        let docs = stmt
            .query_map(params![stage.to_db_str()], Self::map_required_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(docs)
    }

    /// 查询全部必备文档配置
    pub fn list_required(&self) -> RepositoryResult<Vec<RequiredDocument>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT document_id, stage, name, description, mandatory, display_order, active
            FROM required_document
            ORDER BY stage, display_order, document_id
            "#,
        )?;
        let docs = stmt
            .query_map([], Self::map_required_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(docs)
    }

    /// 停用必备文档 (历史附件仍保留引用)
    pub fn deactivate_required(&self, document_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE required_document SET active = 0 WHERE document_id = ?",
            params![document_id],
        )?;
        Ok(rows > 0)
    }

    // ==========================================
    // 附件
    // ==========================================

    /// 新增附件 (或不适用标记)
    pub fn insert_attachment(
        &self,
        attachment: &AttachedDocument,
        audit: Option<&ActionLog>,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO attached_document (
                attachment_id, record_id, stage, required_document_id, file_name,
                storage_ref, mime_type, size_bytes, not_applicable, uploaded_by, uploaded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                attachment.attachment_id,
                attachment.record_id,
                attachment.stage.to_db_str(),
                attachment.required_document_id,
                attachment.file_name,
                attachment.storage_ref,
                attachment.mime_type,
                attachment.size_bytes,
                attachment.not_applicable,
                attachment.uploaded_by,
                fmt_datetime(&attachment.uploaded_at),
            ],
        )?;
        if let Some(log) = audit {
            ActionLogRepository::insert_with_conn(&tx, log)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 查询记录某阶段的附件
    pub fn list_attachments(&self, record_id: &str, stage: Stage) -> RepositoryResult<Vec<AttachedDocument>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT attachment_id, record_id, stage, required_document_id, file_name,
                   storage_ref, mime_type, size_bytes, not_applicable, uploaded_by, uploaded_at
            FROM attached_document
            WHERE record_id = ? AND stage = ?
            ORDER BY uploaded_at, attachment_id
            "#,
        )?;
        let docs = stmt
            .query_map(params![record_id, stage.to_db_str()], Self::map_attachment_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(docs)
    }

    // ==========================================
    // 不适用说明
    // ==========================================

    /// 写入不适用说明 (同一记录同一阶段覆盖)
    pub fn upsert_justification(
        &self,
        justification: &NotApplicableJustification,
        audit: Option<&ActionLog>,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO not_applicable_justification (
                record_id, stage, justification, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(record_id, stage) DO UPDATE SET
                justification = excluded.justification,
                created_by = excluded.created_by,
                created_at = excluded.created_at
            "#,
            params![
                justification.record_id,
                justification.stage.to_db_str(),
                justification.justification,
                justification.created_by,
                fmt_datetime(&justification.created_at),
            ],
        )?;
        if let Some(log) = audit {
            ActionLogRepository::insert_with_conn(&tx, log)?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn find_justification(
        &self,
        record_id: &str,
        stage: Stage,
    ) -> RepositoryResult<Option<NotApplicableJustification>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            r#"
            SELECT record_id, stage, justification, created_by, created_at
            FROM not_applicable_justification
            WHERE record_id = ? AND stage = ?
            "#,
            params![record_id, stage.to_db_str()],
            |row| {
                Ok(NotApplicableJustification {
                    record_id: row.get(0)?,
                    stage: get_stage(row, 1)?,
                    justification: row.get(2)?,
                    created_by: row.get(3)?,
                    created_at: get_datetime(row, 4)?,
                })
            },
        );

        match result {
            Ok(j) => Ok(Some(j)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_required_row(row: &Row) -> SqliteResult<RequiredDocument> {
        Ok(RequiredDocument {
            document_id: row.get(0)?,
            stage: get_stage(row, 1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            mandatory: row.get(4)?,
            display_order: row.get(5)?,
            active: row.get(6)?,
        })
    }

    fn map_attachment_row(row: &Row) -> SqliteResult<AttachedDocument> {
        Ok(AttachedDocument {
            attachment_id: row.get(0)?,
            record_id: row.get(1)?,
            stage: get_stage(row, 2)?,
            required_document_id: row.get(3)?,
            file_name: row.get(4)?,
            storage_ref: row.get(5)?,
            mime_type: row.get(6)?,
            size_bytes: row.get(7)?,
            not_applicable: row.get(8)?,
            uploaded_by: row.get(9)?,
            uploaded_at: get_datetime(row, 10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn setup() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO tracking_record (record_id, quotation_id, line_id, sku, purchase_type, created_at, updated_at)
            VALUES ('R1', 'Q1', 'L1', 'SKU-1', 'NACIONAL', '2025-01-01 00:00:00', '2025-01-01 00:00:00');
            "#,
        )
        .unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_required_documents_by_stage() {
        let repo = DocumentRepository::new(setup());
        for (id, stage, order) in [("D2", Stage::Purchased, 2), ("D1", Stage::Purchased, 1), ("D3", Stage::Paid, 1)] {
            repo.upsert_required(&RequiredDocument {
                document_id: id.to_string(),
                stage,
                name: format!("Doc {}", id),
                description: None,
                mandatory: true,
                display_order: order,
                active: true,
            })
            .unwrap();
        }

        let purchased = repo.list_required_for_stage(Stage::Purchased).unwrap();
        let ids: Vec<&str> = purchased.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(ids, vec!["D1", "D2"]);

        assert!(repo.deactivate_required("D1").unwrap());
        let purchased = repo.list_required_for_stage(Stage::Purchased).unwrap();
        assert!(!purchased[0].active);
        assert_eq!(repo.list_required().unwrap().len(), 3);
    }

    #[test]
    fn test_attachments_and_justification() {
        let repo = DocumentRepository::new(setup());
        repo.insert_attachment(
            &AttachedDocument {
                attachment_id: "A1".into(),
                record_id: "R1".into(),
                stage: Stage::Purchased,
                required_document_id: Some("D1".into()),
                file_name: Some("oc.pdf".into()),
                storage_ref: Some("s3://docs/oc.pdf".into()),
                mime_type: Some("application/pdf".into()),
                size_bytes: Some(2048),
                not_applicable: false,
                uploaded_by: "ana".into(),
                uploaded_at: ts(),
            },
            None,
        )
        .unwrap();

        assert_eq!(repo.list_attachments("R1", Stage::Purchased).unwrap().len(), 1);
        assert!(repo.list_attachments("R1", Stage::Paid).unwrap().is_empty());

        let mut j = NotApplicableJustification {
            record_id: "R1".into(),
            stage: Stage::Purchased,
            justification: "primera".into(),
            created_by: "ana".into(),
            created_at: ts(),
        };
        repo.upsert_justification(&j, None).unwrap();
        j.justification = "segunda versión".into();
        repo.upsert_justification(&j, None).unwrap();

        let stored = repo.find_justification("R1", Stage::Purchased).unwrap().unwrap();
        assert_eq!(stored.justification, "segunda versión");
        assert!(repo.find_justification("R1", Stage::Paid).unwrap().is_none());
    }
}
