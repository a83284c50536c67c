// ==========================================
// 采购阶段跟踪系统 - 文档闸门引擎
// ==========================================
// 职责: 判定某阶段的必备文档是否齐全
// 规则:
// - 只检查启用且必备的文档; 没有配置 → 直接通过
// - 必备文档满足条件: 存在对应附件, 或存在"不适用"标记
// - 任一必备文档被标记不适用 → 必须存在非空的不适用说明,
//   否则在 missing 中追加一项 "需要不适用说明"
// 红线: 只读, 幂等
// ==========================================

use crate::domain::document::{
    AttachedDocument, DocumentGateResult, NotApplicableJustification, RequiredDocument,
};
use crate::domain::stage::Stage;

/// 缺少不适用说明时追加到 missing 的条目
pub const JUSTIFICATION_REQUIRED: &str = "Justificación de no aplica requerida";

// ==========================================
// DocumentGate - 文档闸门
// ==========================================
pub struct DocumentGate {
    // 无状态引擎, 数据由调用方加载
}

impl Default for DocumentGate {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentGate {
    pub fn new() -> Self {
        Self {}
    }

    /// 检查阶段文档完整性
    ///
    /// # 参数
    /// - `stage`: 被检查的阶段
    /// - `required`: 必备文档配置 (可包含其他阶段/非必备/停用项, 内部过滤)
    /// - `attachments`: 该记录的附件
    /// - `justification`: 该记录该阶段的不适用说明
    pub fn evaluate(
        &self,
        stage: Stage,
        required: &[RequiredDocument],
        attachments: &[AttachedDocument],
        justification: Option<&NotApplicableJustification>,
    ) -> DocumentGateResult {
        let mut mandatory: Vec<&RequiredDocument> = required
            .iter()
            .filter(|d| d.stage == stage && d.mandatory && d.active)
            .collect();
        mandatory.sort_by_key(|d| d.display_order);

        if mandatory.is_empty() {
            return DocumentGateResult {
                stage,
                complete: true,
                missing: Vec::new(),
            };
        }

        let mut missing = Vec::new();
        let mut any_not_applicable = false;

        for doc in mandatory {
            let matches: Vec<&AttachedDocument> = attachments
                .iter()
                .filter(|a| {
                    a.stage == stage && a.required_document_id.as_deref() == Some(doc.document_id.as_str())
                })
                .collect();

            if matches.is_empty() {
                missing.push(doc.name.clone());
                continue;
            }

            if matches.iter().any(|a| a.not_applicable) {
                any_not_applicable = true;
            }
        }

        if any_not_applicable {
            let justified = justification
                .map(|j| j.stage == stage && !j.is_blank())
                .unwrap_or(false);
            if !justified {
                missing.push(JUSTIFICATION_REQUIRED.to_string());
            }
        }

        DocumentGateResult {
            stage,
            complete: missing.is_empty(),
            missing,
        }
    }
}
