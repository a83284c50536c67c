// ==========================================
// 采购阶段跟踪系统 - 文档领域模型
// ==========================================
// RequiredDocument: 全局配置, 按阶段定义必备文档
// AttachedDocument: 记录 + 阶段的附件, 或"不适用"标记
// NotApplicableJustification: 记录 + 阶段唯一的不适用说明
// ==========================================

use crate::domain::stage::Stage;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 必备文档配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredDocument {
    pub document_id: String,
    pub stage: Stage,
    pub name: String,
    pub description: Option<String>,
    pub mandatory: bool,
    pub display_order: i32,
    pub active: bool,
}

/// 已上传附件 (或不适用标记)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedDocument {
    pub attachment_id: String,
    pub record_id: String,
    pub stage: Stage,
    pub required_document_id: Option<String>,
    pub file_name: Option<String>,
    pub storage_ref: Option<String>, // 外部存储位置, 本模块不解析
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub not_applicable: bool,
    pub uploaded_by: String,
    pub uploaded_at: NaiveDateTime,
}

/// 不适用说明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotApplicableJustification {
    pub record_id: String,
    pub stage: Stage,
    pub justification: String,
    pub created_by: String,
    pub created_at: NaiveDateTime,
}

impl NotApplicableJustification {
    pub fn is_blank(&self) -> bool {
        self.justification.trim().is_empty()
    }
}

/// 文档闸门检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentGateResult {
    pub stage: Stage,
    pub complete: bool,
    pub missing: Vec<String>,
}
