// ==========================================
// 采购阶段跟踪系统 - 权限策略
// ==========================================
// 职责: 统一判定 (操作, 调用方) 是否允许
// 说明: 所有写操作只经此一处校验
// ==========================================

use crate::domain::types::Caller;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 受控操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingOperation {
    Advance,
    SetStage,
    Reject,
    Approve,
    UpdateDeadline,
    UpdateActualDate,
    BulkSync,
    ManageTemplate,
    ManageRequiredDocuments,
    AttachDocument,
    Reconcile,
}

impl fmt::Display for TrackingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackingOperation::Advance => "ADVANCE",
            TrackingOperation::SetStage => "SET_STAGE",
            TrackingOperation::Reject => "REJECT",
            TrackingOperation::Approve => "APPROVE",
            TrackingOperation::UpdateDeadline => "UPDATE_DEADLINE",
            TrackingOperation::UpdateActualDate => "UPDATE_ACTUAL_DATE",
            TrackingOperation::BulkSync => "BULK_SYNC",
            TrackingOperation::ManageTemplate => "MANAGE_TEMPLATE",
            TrackingOperation::ManageRequiredDocuments => "MANAGE_REQUIRED_DOCUMENTS",
            TrackingOperation::AttachDocument => "ATTACH_DOCUMENT",
            TrackingOperation::Reconcile => "RECONCILE",
        };
        write!(f, "{}", s)
    }
}

impl TrackingOperation {
    /// 是否需要主管/管理员权限
    pub fn requires_privilege(&self) -> bool {
        !matches!(
            self,
            TrackingOperation::AttachDocument | TrackingOperation::Reconcile
        )
    }
}

/// 判定结果: Err 携带拒绝原因
pub fn authorize(operation: TrackingOperation, caller: &Caller) -> Result<(), String> {
    if operation.requires_privilege() && !caller.is_supervisor_or_admin() {
        return Err(format!(
            "用户 {} 无权执行 {} (需要 SUPERVISOR/ADMIN)",
            caller.identity, operation
        ));
    }
    Ok(())
}
