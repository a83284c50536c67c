// ==========================================
// 采购阶段跟踪系统 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录
// 用途: 审计追踪 (阶段推进 / 审批 / 驳回 / 日期修改 / 同步)
// 对齐: action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub record_id: Option<String>, // 关联跟踪记录 (模板/配置类操作可为None)
    pub action_type: String,
    pub action_ts: NaiveDateTime,
    pub actor: String,

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>,

    pub detail: Option<String>,
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateRecord,
    Advance,
    SetStage,
    Approve,
    Reject,
    UpdateDeadline,
    UpdateActualDate,
    Reconcile,
    BulkSync,
    TemplateUpsert,
    TemplateDelete,
    DocumentAttach,
    Justification,
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateRecord => "CreateRecord",
            ActionType::Advance => "Advance",
            ActionType::SetStage => "SetStage",
            ActionType::Approve => "Approve",
            ActionType::Reject => "Reject",
            ActionType::UpdateDeadline => "UpdateDeadline",
            ActionType::UpdateActualDate => "UpdateActualDate",
            ActionType::Reconcile => "Reconcile",
            ActionType::BulkSync => "BulkSync",
            ActionType::TemplateUpsert => "TemplateUpsert",
            ActionType::TemplateDelete => "TemplateDelete",
            ActionType::DocumentAttach => "DocumentAttach",
            ActionType::Justification => "Justification",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CreateRecord" => Some(ActionType::CreateRecord),
            "Advance" => Some(ActionType::Advance),
            "SetStage" => Some(ActionType::SetStage),
            "Approve" => Some(ActionType::Approve),
            "Reject" => Some(ActionType::Reject),
            "UpdateDeadline" => Some(ActionType::UpdateDeadline),
            "UpdateActualDate" => Some(ActionType::UpdateActualDate),
            "Reconcile" => Some(ActionType::Reconcile),
            "BulkSync" => Some(ActionType::BulkSync),
            "TemplateUpsert" => Some(ActionType::TemplateUpsert),
            "TemplateDelete" => Some(ActionType::TemplateDelete),
            "DocumentAttach" => Some(ActionType::DocumentAttach),
            "Justification" => Some(ActionType::Justification),
            _ => None,
        }
    }
}

// ==========================================
// ActionLog 辅助方法
// ==========================================
impl ActionLog {
    /// 创建新的操作日志
    ///
    /// # 参数
    /// - `record_id`: 关联跟踪记录ID (可选)
    /// - `action_type`: 操作类型
    /// - `actor`: 操作人
    /// - `action_ts`: 操作时间
    pub fn new(
        record_id: Option<String>,
        action_type: ActionType,
        actor: &str,
        action_ts: NaiveDateTime,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            record_id,
            action_type: action_type.as_str().to_string(),
            action_ts,
            actor: actor.to_string(),
            payload_json: None,
            detail: None,
        }
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
