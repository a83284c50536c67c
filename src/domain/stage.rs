// ==========================================
// 采购阶段跟踪系统 - 阶段目录 (Stage Catalog)
// ==========================================
// 职责: 阶段顺序、显示名称、字段名映射的唯一事实来源
// 红线: 其他模块不得自行维护阶段顺序
// ==========================================
// NACIONAL (6):       QUOTED → DISCOUNTED → PURCHASE_APPROVAL → PURCHASED → PAID → RECEIVED
// INTERNACIONAL (13): QUOTED → DISCOUNTED → PURCHASE_APPROVAL → PURCHASED → PAID
//                     → DRAWINGS_APPROVAL → FIRST_FOLLOW_UP → FOB → FREIGHT_QUOTE
//                     → BILL_OF_LADING → SECOND_FOLLOW_UP → CUSTOMS → RECEIVED
// ==========================================

use crate::domain::types::PurchaseVariant;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Stage - 采购阶段
// ==========================================
// 派生 Ord 的顺序即国际流程顺序; 国内流程是其子序列, 顺序一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Quoted,           // 已报价
    Discounted,       // 已议价
    PurchaseApproval, // 采购审批
    Purchased,        // 已下单
    Paid,             // 已付款
    DrawingsApproval, // 图纸审批
    FirstFollowUp,    // 第一次跟进
    Fob,              // 到达 FOB
    FreightQuote,     // 国际运费询价
    BillOfLading,     // 提单
    SecondFollowUp,   // 第二次跟进
    Customs,          // CIF / 清关
    Received,         // 已收货
}

const NACIONAL_STAGES: [Stage; 6] = [
    Stage::Quoted,
    Stage::Discounted,
    Stage::PurchaseApproval,
    Stage::Purchased,
    Stage::Paid,
    Stage::Received,
];

const INTERNACIONAL_STAGES: [Stage; 13] = [
    Stage::Quoted,
    Stage::Discounted,
    Stage::PurchaseApproval,
    Stage::Purchased,
    Stage::Paid,
    Stage::DrawingsApproval,
    Stage::FirstFollowUp,
    Stage::Fob,
    Stage::FreightQuote,
    Stage::BillOfLading,
    Stage::SecondFollowUp,
    Stage::Customs,
    Stage::Received,
];

/// 证据字段哨兵值: 不适用 (详见该阶段的不适用说明)
pub const NOT_APPLICABLE_EVIDENCE: &str = "N/A";

/// CIF 条款自动完成运费询价时写入的证据标记
pub const CIF_AUTO_EVIDENCE: &str = "AUTO:CIF";

/// 每个阶段在记录上的四个字段名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageFieldNames {
    pub completed_field: &'static str,
    pub actual_date_field: &'static str,
    pub deadline_field: &'static str,
    pub evidence_field: &'static str,
}

/// 适用阶段列表 (按流程顺序)
pub fn applicable_stages(variant: PurchaseVariant) -> &'static [Stage] {
    match variant {
        PurchaseVariant::Nacional => &NACIONAL_STAGES,
        PurchaseVariant::Internacional => &INTERNACIONAL_STAGES,
    }
}

/// 阶段是否适用于该采购类型
pub fn is_applicable(variant: PurchaseVariant, stage: Stage) -> bool {
    applicable_stages(variant).contains(&stage)
}

/// 同一采购类型下的紧后阶段
pub fn next_stage(variant: PurchaseVariant, stage: Stage) -> Option<Stage> {
    let stages = applicable_stages(variant);
    stages
        .iter()
        .position(|s| *s == stage)
        .and_then(|idx| stages.get(idx + 1))
        .copied()
}

/// 同一采购类型下的紧前阶段
pub fn previous_stage(variant: PurchaseVariant, stage: Stage) -> Option<Stage> {
    let stages = applicable_stages(variant);
    match stages.iter().position(|s| *s == stage) {
        Some(idx) if idx > 0 => Some(stages[idx - 1]),
        _ => None,
    }
}

/// 字段名映射
pub fn field_names_for(stage: Stage) -> StageFieldNames {
    let (completed_field, actual_date_field, deadline_field, evidence_field) = match stage {
        Stage::Quoted => ("quoted", "quoted_date", "quoted_deadline", "quoted_evidence"),
        Stage::Discounted => (
            "discounted",
            "discounted_date",
            "discounted_deadline",
            "discounted_evidence",
        ),
        Stage::PurchaseApproval => (
            "purchase_approval",
            "purchase_approval_date",
            "purchase_approval_deadline",
            "purchase_approval_evidence",
        ),
        Stage::Purchased => (
            "purchased",
            "purchased_date",
            "purchased_deadline",
            "purchased_evidence",
        ),
        Stage::Paid => ("paid", "paid_date", "paid_deadline", "paid_evidence"),
        Stage::DrawingsApproval => (
            "drawings_approval",
            "drawings_approval_date",
            "drawings_approval_deadline",
            "drawings_approval_evidence",
        ),
        Stage::FirstFollowUp => (
            "first_follow_up",
            "first_follow_up_date",
            "first_follow_up_deadline",
            "first_follow_up_evidence",
        ),
        Stage::Fob => ("in_fob", "in_fob_date", "in_fob_deadline", "in_fob_evidence"),
        Stage::FreightQuote => (
            "freight_quote",
            "freight_quote_date",
            "freight_quote_deadline",
            "freight_quote_evidence",
        ),
        Stage::BillOfLading => (
            "bill_of_lading",
            "bill_of_lading_date",
            "bill_of_lading_deadline",
            "bill_of_lading_evidence",
        ),
        Stage::SecondFollowUp => (
            "second_follow_up",
            "second_follow_up_date",
            "second_follow_up_deadline",
            "second_follow_up_evidence",
        ),
        Stage::Customs => (
            "in_customs",
            "in_customs_date",
            "in_customs_deadline",
            "in_customs_evidence",
        ),
        Stage::Received => (
            "received",
            "received_date",
            "received_deadline",
            "received_evidence",
        ),
    };

    StageFieldNames {
        completed_field,
        actual_date_field,
        deadline_field,
        evidence_field,
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Stage {
    /// 全部阶段 (国际流程顺序)
    pub fn all() -> &'static [Stage] {
        &INTERNACIONAL_STAGES
    }

    /// 显示名称
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Quoted => "Cotizado",
            Stage::Discounted => "Con descuento",
            Stage::PurchaseApproval => "Aprobación de compra",
            Stage::Purchased => "Comprado",
            Stage::Paid => "Pagado",
            Stage::DrawingsApproval => "Aprobación de planos",
            Stage::FirstFollowUp => "Primer seguimiento",
            Stage::Fob => "En FOB",
            Stage::FreightQuote => "Cotización flete internacional",
            Stage::BillOfLading => "Conocimiento de embarque",
            Stage::SecondFollowUp => "Segundo seguimiento",
            Stage::Customs => "En CIF / Aduana",
            Stage::Received => "Recibido",
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Stage::Quoted => "QUOTED",
            Stage::Discounted => "DISCOUNTED",
            Stage::PurchaseApproval => "PURCHASE_APPROVAL",
            Stage::Purchased => "PURCHASED",
            Stage::Paid => "PAID",
            Stage::DrawingsApproval => "DRAWINGS_APPROVAL",
            Stage::FirstFollowUp => "FIRST_FOLLOW_UP",
            Stage::Fob => "FOB",
            Stage::FreightQuote => "FREIGHT_QUOTE",
            Stage::BillOfLading => "BILL_OF_LADING",
            Stage::SecondFollowUp => "SECOND_FOLLOW_UP",
            Stage::Customs => "CUSTOMS",
            Stage::Received => "RECEIVED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase();
        Stage::all()
            .iter()
            .find(|stage| stage.to_db_str() == normalized)
            .copied()
    }
}
