// ==========================================
// 采购阶段跟踪系统 - 文档 API
// ==========================================
// 职责: 必备文档配置、附件上传登记、不适用标记与说明、阶段文档检查
// 说明: 文件本体由外部存储负责, 这里只登记引用
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::error::{ApiError, ApiResult};
use crate::db::now_local;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::document::{
    AttachedDocument, DocumentGateResult, NotApplicableJustification, RequiredDocument,
};
use crate::domain::stage::{is_applicable, Stage};
use crate::domain::tracking::TrackingRecord;
use crate::domain::types::Caller;
use crate::engine::authorization::{authorize, TrackingOperation};
use crate::engine::document_gate::DocumentGate;
use crate::repository::document_repo::DocumentRepository;
use crate::repository::tracking_repo::TrackingRecordRepository;

/// 附件登记请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachmentUpload {
    pub required_document_id: Option<String>,
    pub file_name: String,
    pub storage_ref: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
}

/// 加载闸门输入并评估 (TrackingApi 推进前复用)
pub(crate) fn evaluate_gate(
    repo: &DocumentRepository,
    record_id: &str,
    stage: Stage,
) -> ApiResult<DocumentGateResult> {
    let required = repo.list_required_for_stage(stage)?;
    let attachments = repo.list_attachments(record_id, stage)?;
    let justification = repo.find_justification(record_id, stage)?;

    let result = DocumentGate::new().evaluate(stage, &required, &attachments, justification.as_ref());
    debug!(
        record_id = %record_id,
        stage = %stage,
        complete = result.complete,
        missing = ?result.missing,
        "阶段文档检查"
    );
    Ok(result)
}

// ==========================================
// DocumentApi - 文档 API
// ==========================================
pub struct DocumentApi {
    document_repo: Arc<DocumentRepository>,
    tracking_repo: Arc<TrackingRecordRepository>,
}

impl DocumentApi {
    pub fn new(
        document_repo: Arc<DocumentRepository>,
        tracking_repo: Arc<TrackingRecordRepository>,
    ) -> Self {
        Self {
            document_repo,
            tracking_repo,
        }
    }

    fn check(operation: TrackingOperation, caller: &Caller) -> ApiResult<()> {
        authorize(operation, caller).map_err(ApiError::Forbidden)
    }

    fn load_record(&self, record_id: &str, stage: Stage) -> ApiResult<TrackingRecord> {
        let record = self
            .tracking_repo
            .find_by_id(record_id)?
            .ok_or_else(|| ApiError::NotFound(format!("跟踪记录(id={})不存在", record_id)))?;
        if !is_applicable(record.variant, stage) {
            return Err(ApiError::bad_request(format!(
                "阶段 {} 不适用于 {} 采购",
                stage, record.variant
            )));
        }
        Ok(record)
    }

    // ==========================================
    // 必备文档配置 (主管)
    // ==========================================

    /// 新增或更新必备文档配置
    ///
    /// document_id 为空时自动生成
    pub fn upsert_required_document(
        &self,
        caller: &Caller,
        mut doc: RequiredDocument,
    ) -> ApiResult<RequiredDocument> {
        Self::check(TrackingOperation::ManageRequiredDocuments, caller)?;

        if doc.name.trim().is_empty() {
            return Err(ApiError::bad_request("文档名称不能为空"));
        }
        if doc.document_id.trim().is_empty() {
            doc.document_id = uuid::Uuid::new_v4().to_string();
        }
        doc.name = doc.name.trim().to_string();

        self.document_repo.upsert_required(&doc)?;
        info!(document_id = %doc.document_id, stage = %doc.stage, actor = %caller.identity, "必备文档配置已保存");
        Ok(doc)
    }

    /// 停用必备文档
    pub fn deactivate_required_document(&self, caller: &Caller, document_id: &str) -> ApiResult<()> {
        Self::check(TrackingOperation::ManageRequiredDocuments, caller)?;

        if !self.document_repo.deactivate_required(document_id)? {
            return Err(ApiError::NotFound(format!("必备文档(id={})不存在", document_id)));
        }
        info!(document_id = %document_id, actor = %caller.identity, "必备文档已停用");
        Ok(())
    }

    /// 查询必备文档配置
    pub fn list_required_documents(&self, stage: Option<Stage>) -> ApiResult<Vec<RequiredDocument>> {
        Ok(match stage {
            Some(stage) => self.document_repo.list_required_for_stage(stage)?,
            None => self.document_repo.list_required()?,
        })
    }

    // ==========================================
    // 附件 / 不适用
    // ==========================================

    /// 登记附件
    pub fn attach_document(
        &self,
        caller: &Caller,
        record_id: &str,
        stage: Stage,
        upload: AttachmentUpload,
    ) -> ApiResult<AttachedDocument> {
        Self::check(TrackingOperation::AttachDocument, caller)?;
        self.load_record(record_id, stage)?;

        if upload.file_name.trim().is_empty() {
            return Err(ApiError::bad_request("文件名不能为空"));
        }

        let attachment = AttachedDocument {
            attachment_id: uuid::Uuid::new_v4().to_string(),
            record_id: record_id.to_string(),
            stage,
            required_document_id: upload.required_document_id,
            file_name: Some(upload.file_name),
            storage_ref: upload.storage_ref,
            mime_type: upload.mime_type,
            size_bytes: upload.size_bytes,
            not_applicable: false,
            uploaded_by: caller.identity.clone(),
            uploaded_at: now_local(),
        };
        self.insert_attachment(caller, &attachment)?;
        Ok(attachment)
    }

    /// 将必备文档标记为不适用 (仍需填写阶段说明才能通过闸门)
    pub fn mark_not_applicable(
        &self,
        caller: &Caller,
        record_id: &str,
        stage: Stage,
        required_document_id: &str,
    ) -> ApiResult<AttachedDocument> {
        Self::check(TrackingOperation::AttachDocument, caller)?;
        self.load_record(record_id, stage)?;

        let attachment = AttachedDocument {
            attachment_id: uuid::Uuid::new_v4().to_string(),
            record_id: record_id.to_string(),
            stage,
            required_document_id: Some(required_document_id.to_string()),
            file_name: None,
            storage_ref: None,
            mime_type: None,
            size_bytes: None,
            not_applicable: true,
            uploaded_by: caller.identity.clone(),
            uploaded_at: now_local(),
        };
        self.insert_attachment(caller, &attachment)?;
        Ok(attachment)
    }

    fn insert_attachment(&self, caller: &Caller, attachment: &AttachedDocument) -> ApiResult<()> {
        let audit = ActionLog::new(
            Some(attachment.record_id.clone()),
            ActionType::DocumentAttach,
            &caller.identity,
            attachment.uploaded_at,
        )
        .with_payload(&serde_json::json!({
            "stage": attachment.stage,
            "required_document_id": attachment.required_document_id,
            "file_name": attachment.file_name,
            "not_applicable": attachment.not_applicable,
        }));

        self.document_repo.insert_attachment(attachment, Some(&audit))?;
        info!(
            record_id = %attachment.record_id,
            stage = %attachment.stage,
            not_applicable = attachment.not_applicable,
            actor = %caller.identity,
            "附件已登记"
        );
        Ok(())
    }

    /// 保存阶段不适用说明 (同一记录同一阶段覆盖)
    pub fn save_justification(
        &self,
        caller: &Caller,
        record_id: &str,
        stage: Stage,
        text: &str,
    ) -> ApiResult<NotApplicableJustification> {
        Self::check(TrackingOperation::AttachDocument, caller)?;
        self.load_record(record_id, stage)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::bad_request("不适用说明不能为空"));
        }

        let justification = NotApplicableJustification {
            record_id: record_id.to_string(),
            stage,
            justification: text.to_string(),
            created_by: caller.identity.clone(),
            created_at: now_local(),
        };
        let audit = ActionLog::new(
            Some(record_id.to_string()),
            ActionType::Justification,
            &caller.identity,
            justification.created_at,
        )
        .with_detail(text);

        self.document_repo
            .upsert_justification(&justification, Some(&audit))?;
        Ok(justification)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 记录某阶段是否已上传 (或标记不适用) 指定必备文档
    pub fn has_attachment(&self, record_id: &str, stage: Stage, required_document_id: &str) -> ApiResult<bool> {
        let attachments = self.document_repo.list_attachments(record_id, stage)?;
        Ok(attachments
            .iter()
            .any(|a| a.required_document_id.as_deref() == Some(required_document_id)))
    }

    /// 记录某阶段是否已有非空的不适用说明
    pub fn has_justification(&self, record_id: &str, stage: Stage) -> ApiResult<bool> {
        Ok(self
            .document_repo
            .find_justification(record_id, stage)?
            .map(|j| !j.is_blank())
            .unwrap_or(false))
    }

    /// 检查阶段文档完整性 (与推进时使用的闸门一致)
    pub fn check_stage_documents(&self, record_id: &str, stage: Stage) -> ApiResult<DocumentGateResult> {
        self.load_record(record_id, stage)?;
        evaluate_gate(&self.document_repo, record_id, stage)
    }
}
