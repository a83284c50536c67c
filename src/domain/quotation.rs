// ==========================================
// 采购阶段跟踪系统 - 报价来源领域模型
// ==========================================
// 报价单/报价行由外部模块维护, 本系统只读取来源行
// 并回写报价单的汇总审批标志
// ==========================================

use crate::domain::types::PurchaseVariant;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 报价来源行 (跟踪记录的种子数据)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginatingLine {
    pub line_id: String,
    pub quotation_id: String,
    pub project_id: Option<String>,
    pub sku: String,
    pub description: String,
    pub quantity: f64,
    pub origin_country: Option<String>,
    pub transport_mode: Option<String>,
    pub variant: PurchaseVariant,   // 取自上级报价单
    pub quote_date: Option<NaiveDate>, // 截止日期锚点
    pub selected_price: Option<PriceInfo>,
}

/// 已选报价 (供应商 + 价格 + 折扣)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    pub supplier_name: String,
    pub unit_price: f64,
    pub total_price: f64,
    pub discount_price: Option<f64>,
}

impl PriceInfo {
    pub fn has_discount(&self) -> bool {
        self.discount_price.is_some()
    }
}

/// 报价单汇总审批标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuotationApprovalFlags {
    pub all_items_approved: bool,
    pub partially_approved: bool,
}

impl QuotationApprovalFlags {
    /// 由各行审批状态汇总
    ///
    /// - 全部已批 (且至少一行) → all_items_approved
    /// - 部分已批 → partially_approved
    pub fn from_approvals(approvals: &[bool]) -> Self {
        let approved = approvals.iter().filter(|a| **a).count();
        let all = !approvals.is_empty() && approved == approvals.len();
        Self {
            all_items_approved: all,
            partially_approved: approved > 0 && !all,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_flags() {
        assert_eq!(
            QuotationApprovalFlags::from_approvals(&[]),
            QuotationApprovalFlags::default()
        );
        let all = QuotationApprovalFlags::from_approvals(&[true, true]);
        assert!(all.all_items_approved && !all.partially_approved);
        let partial = QuotationApprovalFlags::from_approvals(&[true, false]);
        assert!(!partial.all_items_approved && partial.partially_approved);
        let none = QuotationApprovalFlags::from_approvals(&[false, false]);
        assert!(!none.all_items_approved && !none.partially_approved);
    }
}
