// ==========================================
// 采购阶段跟踪系统 - 时间线模板领域模型
// ==========================================
// 职责: 每个 SKU 一份, 定义相邻阶段之间的天数偏移
// 说明: 部分偏移存在新旧两个字段名 (旧名来自历史数据),
//       加载时统一归一化, 新名优先
// ==========================================

use crate::domain::stage::Stage;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 单个阶段间隔允许的最大天数
pub const MAX_OFFSET_DAYS: i32 = 3650;

// ==========================================
// TransitionKey - 阶段转换标识
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKey {
    QuotedToDiscounted,
    DiscountedToPurchaseApproval,
    PurchaseApprovalToPurchased,
    PurchasedToPaid,
    PaidToReceived, // 仅国内流程
    PaidToDrawingsApproval,
    DrawingsApprovalToFirstFollowUp,
    FirstFollowUpToFob,
    FobToFreightQuote,
    FreightQuoteToBillOfLading,
    BillOfLadingToSecondFollowUp,
    SecondFollowUpToCustoms,
    CustomsToReceived,
}

const ALL_TRANSITIONS: [TransitionKey; 13] = [
    TransitionKey::QuotedToDiscounted,
    TransitionKey::DiscountedToPurchaseApproval,
    TransitionKey::PurchaseApprovalToPurchased,
    TransitionKey::PurchasedToPaid,
    TransitionKey::PaidToReceived,
    TransitionKey::PaidToDrawingsApproval,
    TransitionKey::DrawingsApprovalToFirstFollowUp,
    TransitionKey::FirstFollowUpToFob,
    TransitionKey::FobToFreightQuote,
    TransitionKey::FreightQuoteToBillOfLading,
    TransitionKey::BillOfLadingToSecondFollowUp,
    TransitionKey::SecondFollowUpToCustoms,
    TransitionKey::CustomsToReceived,
];

impl TransitionKey {
    pub fn all() -> &'static [TransitionKey] {
        &ALL_TRANSITIONS
    }

    /// (起点阶段, 终点阶段)
    pub fn endpoints(&self) -> (Stage, Stage) {
        match self {
            TransitionKey::QuotedToDiscounted => (Stage::Quoted, Stage::Discounted),
            TransitionKey::DiscountedToPurchaseApproval => {
                (Stage::Discounted, Stage::PurchaseApproval)
            }
            TransitionKey::PurchaseApprovalToPurchased => {
                (Stage::PurchaseApproval, Stage::Purchased)
            }
            TransitionKey::PurchasedToPaid => (Stage::Purchased, Stage::Paid),
            TransitionKey::PaidToReceived => (Stage::Paid, Stage::Received),
            TransitionKey::PaidToDrawingsApproval => (Stage::Paid, Stage::DrawingsApproval),
            TransitionKey::DrawingsApprovalToFirstFollowUp => {
                (Stage::DrawingsApproval, Stage::FirstFollowUp)
            }
            TransitionKey::FirstFollowUpToFob => (Stage::FirstFollowUp, Stage::Fob),
            TransitionKey::FobToFreightQuote => (Stage::Fob, Stage::FreightQuote),
            TransitionKey::FreightQuoteToBillOfLading => (Stage::FreightQuote, Stage::BillOfLading),
            TransitionKey::BillOfLadingToSecondFollowUp => {
                (Stage::BillOfLading, Stage::SecondFollowUp)
            }
            TransitionKey::SecondFollowUpToCustoms => (Stage::SecondFollowUp, Stage::Customs),
            TransitionKey::CustomsToReceived => (Stage::Customs, Stage::Received),
        }
    }

    /// 查找相邻阶段对应的转换
    pub fn between(from: Stage, to: Stage) -> Option<TransitionKey> {
        ALL_TRANSITIONS
            .iter()
            .find(|k| k.endpoints() == (from, to))
            .copied()
    }

    /// 当前字段名
    pub fn field_name(&self) -> &'static str {
        match self {
            TransitionKey::QuotedToDiscounted => "quoted_to_discounted",
            TransitionKey::DiscountedToPurchaseApproval => "discounted_to_purchase_approval",
            TransitionKey::PurchaseApprovalToPurchased => "purchase_approval_to_purchased",
            TransitionKey::PurchasedToPaid => "purchased_to_paid",
            TransitionKey::PaidToReceived => "paid_to_received",
            TransitionKey::PaidToDrawingsApproval => "paid_to_drawings_approval",
            TransitionKey::DrawingsApprovalToFirstFollowUp => "drawings_approval_to_first_follow_up",
            TransitionKey::FirstFollowUpToFob => "first_follow_up_to_fob",
            TransitionKey::FobToFreightQuote => "fob_to_freight_quote",
            TransitionKey::FreightQuoteToBillOfLading => "freight_quote_to_bill_of_lading",
            TransitionKey::BillOfLadingToSecondFollowUp => "bill_of_lading_to_second_follow_up",
            TransitionKey::SecondFollowUpToCustoms => "second_follow_up_to_customs",
            TransitionKey::CustomsToReceived => "customs_to_received",
        }
    }

    /// 历史字段名 (旧数据使用)
    pub fn legacy_field_name(&self) -> Option<&'static str> {
        match self {
            TransitionKey::QuotedToDiscounted => Some("quote_to_discount"),
            TransitionKey::DiscountedToPurchaseApproval => Some("discount_to_approval"),
            TransitionKey::PurchaseApprovalToPurchased => Some("approval_to_purchase"),
            TransitionKey::PurchasedToPaid => Some("purchase_to_payment"),
            TransitionKey::PaidToReceived => Some("payment_to_delivery"),
            TransitionKey::FobToFreightQuote => Some("fob_to_quote"),
            TransitionKey::CustomsToReceived => Some("cif_to_received"),
            _ => None,
        }
    }

    /// 按字段名解析, 返回 (转换, 是否为历史字段名)
    pub fn from_field_name(name: &str) -> Option<(TransitionKey, bool)> {
        let name = name.trim();
        ALL_TRANSITIONS.iter().find_map(|k| {
            if k.field_name() == name {
                Some((*k, false))
            } else if k.legacy_field_name() == Some(name) {
                Some((*k, true))
            } else {
                None
            }
        })
    }
}

// ==========================================
// TimelineTemplate - 时间线模板
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineTemplate {
    pub sku: String,
    pub offsets: BTreeMap<TransitionKey, i32>, // 已归一化的偏移天数
    pub total_days: i32,                      // 缓存: 全部偏移之和
    pub updated_by: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

impl TimelineTemplate {
    /// 由归一化偏移创建模板, 同时计算总天数
    pub fn new(sku: impl Into<String>, offsets: BTreeMap<TransitionKey, i32>) -> Self {
        let total_days = Self::sum_offsets(&offsets);
        Self {
            sku: sku.into(),
            offsets,
            total_days,
            updated_by: None,
            updated_at: None,
        }
    }

    /// 由原始字段 (可能混有新旧字段名) 创建模板
    ///
    /// # 规则
    /// - 新字段名始终优先于历史字段名
    /// - 空值 (None) 视为未配置
    /// - 无法识别的字段名忽略, 并返回给调用方用于告警
    pub fn from_raw_offsets(
        sku: impl Into<String>,
        raw: &HashMap<String, Option<i32>>,
    ) -> (Self, Vec<String>) {
        let mut current: BTreeMap<TransitionKey, i32> = BTreeMap::new();
        let mut legacy: BTreeMap<TransitionKey, i32> = BTreeMap::new();
        let mut unknown = Vec::new();

        for (name, value) in raw {
            match TransitionKey::from_field_name(name) {
                Some((key, is_legacy)) => {
                    if let Some(days) = value {
                        if is_legacy {
                            legacy.insert(key, *days);
                        } else {
                            current.insert(key, *days);
                        }
                    }
                }
                None => unknown.push(name.clone()),
            }
        }

        for (key, days) in legacy {
            current.entry(key).or_insert(days);
        }
        unknown.sort();

        (Self::new(sku, current), unknown)
    }

    pub fn offset(&self, key: TransitionKey) -> Option<i32> {
        self.offsets.get(&key).copied()
    }

    /// 重新计算缓存总天数
    pub fn recompute_total(&mut self) {
        self.total_days = Self::sum_offsets(&self.offsets);
    }

    // 饱和求和, 超出 i32 范围时取边界值
    fn sum_offsets(offsets: &BTreeMap<TransitionKey, i32>) -> i32 {
        offsets.values().fold(0i32, |acc, days| acc.saturating_add(*days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between() {
        assert_eq!(
            TransitionKey::between(Stage::Paid, Stage::Received),
            Some(TransitionKey::PaidToReceived)
        );
        assert_eq!(TransitionKey::between(Stage::Quoted, Stage::Paid), None);
    }

    #[test]
    fn test_current_name_wins_over_legacy() {
        let mut raw = HashMap::new();
        raw.insert("quote_to_discount".to_string(), Some(9));
        raw.insert("quoted_to_discounted".to_string(), Some(2));
        raw.insert("approval_to_purchase".to_string(), Some(4));
        raw.insert("purchased_to_paid".to_string(), None);
        raw.insert("mystery_field".to_string(), Some(1));

        let (template, unknown) = TimelineTemplate::from_raw_offsets("SKU-9", &raw);

        assert_eq!(template.offset(TransitionKey::QuotedToDiscounted), Some(2));
        assert_eq!(template.offset(TransitionKey::PurchaseApprovalToPurchased), Some(4));
        assert_eq!(template.offset(TransitionKey::PurchasedToPaid), None);
        assert_eq!(template.total_days, 6);
        assert_eq!(unknown, vec!["mystery_field".to_string()]);
    }

    #[test]
    fn test_total_days_saturates() {
        let mut t = TimelineTemplate::new(
            "SKU-BIG",
            [
                (TransitionKey::QuotedToDiscounted, 2_000_000_000),
                (TransitionKey::DiscountedToPurchaseApproval, 2_000_000_000),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(t.total_days, i32::MAX);

        t.offsets.insert(TransitionKey::QuotedToDiscounted, 5);
        t.recompute_total();
        assert_eq!(t.total_days, 2_000_000_005);
    }
}
