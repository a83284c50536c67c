// ==========================================
// 采购阶段跟踪系统 - 截止日期计算引擎
// ==========================================
// 输入: 锚点日期 (报价日期) + 时间线模板 + 采购类型
// 输出: 每个适用阶段的截止日期
// 规则:
// - 第一个阶段截止日期 = 锚点日期
// - 相邻阶段配置了偏移 → 游标前移并记为终点阶段截止日期
// - 未配置偏移 → 终点阶段截止日期为空, 游标不动
// - 日期超出可表示范围 → 返回 DeadlineOverflow, 不写入任何阶段
// ==========================================

use crate::domain::stage::{applicable_stages, Stage};
use crate::domain::timeline::{TimelineTemplate, TransitionKey};
use crate::domain::tracking::TrackingRecord;
use crate::domain::types::PurchaseVariant;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// 截止日期溢出 (累计偏移超出日期可表示范围)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("截止日期超出可表示范围: sku={sku}, stage={stage}")]
pub struct DeadlineOverflow {
    pub sku: String,
    pub stage: Stage,
}

// ==========================================
// DeadlineCalculator - 截止日期计算器
// ==========================================
pub struct DeadlineCalculator {
    // 无状态引擎
}

impl Default for DeadlineCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadlineCalculator {
    pub fn new() -> Self {
        Self {}
    }

    /// 计算各阶段截止日期
    ///
    /// # 返回
    /// 阶段 → 截止日期 (None 表示未配置)
    ///
    /// # 错误
    /// 累计日期溢出时返回 `DeadlineOverflow`
    pub fn compute_deadlines(
        &self,
        anchor: NaiveDate,
        template: &TimelineTemplate,
        variant: PurchaseVariant,
    ) -> Result<BTreeMap<Stage, Option<NaiveDate>>, DeadlineOverflow> {
        let stages = applicable_stages(variant);
        let mut deadlines = BTreeMap::new();
        let mut cursor = anchor;

        deadlines.insert(stages[0], Some(anchor));

        for pair in stages.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let offset = TransitionKey::between(from, to).and_then(|k| template.offset(k));

            match offset {
                Some(days) => {
                    cursor = Duration::try_days(i64::from(days))
                        .and_then(|delta| cursor.checked_add_signed(delta))
                        .ok_or_else(|| {
                            warn!(sku = %template.sku, stage = %to, days, "截止日期溢出");
                            DeadlineOverflow {
                                sku: template.sku.clone(),
                                stage: to,
                            }
                        })?;
                    deadlines.insert(to, Some(cursor));
                }
                None => {
                    deadlines.insert(to, None);
                }
            }
        }

        debug!(
            sku = %template.sku,
            variant = %variant,
            anchor = %anchor,
            "截止日期计算完成"
        );

        Ok(deadlines)
    }

    /// 将截止日期写入记录 (仅写未完成阶段)
    ///
    /// 已完成阶段的截止日期不可修改; 计算失败时记录保持不变
    pub fn apply_to_record(
        &self,
        record: &mut TrackingRecord,
        anchor: NaiveDate,
        template: &TimelineTemplate,
    ) -> Result<usize, DeadlineOverflow> {
        let deadlines = self.compute_deadlines(anchor, template, record.variant)?;
        let mut updated = 0;

        for (stage, deadline) in deadlines {
            if let Some(state) = record.stage_mut(stage) {
                if !state.completed || state.deadline.is_none() {
                    state.deadline = deadline;
                    updated += 1;
                }
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn template(pairs: &[(TransitionKey, i32)]) -> TimelineTemplate {
        TimelineTemplate::new("SKU-1", pairs.iter().copied().collect())
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_cumulative_deadlines() {
        let calc = DeadlineCalculator::new();
        let t = template(&[
            (TransitionKey::QuotedToDiscounted, 2),
            (TransitionKey::DiscountedToPurchaseApproval, 2),
            (TransitionKey::PurchaseApprovalToPurchased, 1),
        ]);
        let anchor = d(2025, 6, 2);

        let result = calc.compute_deadlines(anchor, &t, PurchaseVariant::Nacional).unwrap();

        assert_eq!(result[&Stage::Quoted], Some(anchor));
        assert_eq!(result[&Stage::Discounted], Some(d(2025, 6, 4)));
        assert_eq!(result[&Stage::PurchaseApproval], Some(d(2025, 6, 6)));
        assert_eq!(result[&Stage::Purchased], Some(d(2025, 6, 7)));
        assert_eq!(result[&Stage::Paid], None);
        assert_eq!(result[&Stage::Received], None);
        assert_eq!(result.len(), 6);
    }

    #[test]
    fn test_gap_does_not_move_cursor() {
        let calc = DeadlineCalculator::new();
        let t = template(&[
            (TransitionKey::QuotedToDiscounted, 3),
            (TransitionKey::PurchasedToPaid, 10),
            (TransitionKey::PaidToReceived, 5),
            (TransitionKey::CustomsToReceived, 100), // 国内流程不使用
        ]);
        let anchor = d(2025, 1, 1);

        let result = calc.compute_deadlines(anchor, &t, PurchaseVariant::Nacional).unwrap();

        assert_eq!(result[&Stage::Discounted], Some(d(2025, 1, 4)));
        assert_eq!(result[&Stage::PurchaseApproval], None);
        assert_eq!(result[&Stage::Purchased], None);
        assert_eq!(result[&Stage::Paid], Some(d(2025, 1, 14)));
        assert_eq!(result[&Stage::Received], Some(d(2025, 1, 19)));
        // 总天数包含未参与计算的偏移
        assert_eq!(t.total_days, 118);
    }

    #[test]
    fn test_internacional_walk_uses_own_transitions() {
        let calc = DeadlineCalculator::new();
        let t = template(&[
            (TransitionKey::PurchasedToPaid, 1),
            (TransitionKey::PaidToReceived, 50), // 国际流程不使用
            (TransitionKey::PaidToDrawingsApproval, 2),
            (TransitionKey::CustomsToReceived, 4),
        ]);
        let anchor = d(2025, 3, 1);

        let result = calc.compute_deadlines(anchor, &t, PurchaseVariant::Internacional).unwrap();

        assert_eq!(result.len(), 13);
        assert_eq!(result[&Stage::Paid], Some(d(2025, 3, 2)));
        assert_eq!(result[&Stage::DrawingsApproval], Some(d(2025, 3, 4)));
        assert_eq!(result[&Stage::Received], Some(d(2025, 3, 8)));
    }

    #[test]
    fn test_apply_keeps_completed_deadlines() {
        let calc = DeadlineCalculator::new();
        let t = template(&[(TransitionKey::QuotedToDiscounted, 2)]);
        let now: NaiveDateTime = d(2025, 3, 1).and_hms_opt(8, 0, 0).unwrap();
        let mut record = TrackingRecord::new(
            "R".into(),
            "Q".into(),
            "L".into(),
            "SKU-1".into(),
            PurchaseVariant::Nacional,
            now,
        );
        record.complete_stage(Stage::Quoted, now, None);
        record.stage_mut(Stage::Quoted).unwrap().deadline = Some(d(2025, 2, 20));

        calc.apply_to_record(&mut record, d(2025, 3, 1), &t).unwrap();

        assert_eq!(record.stage(Stage::Quoted).unwrap().deadline, Some(d(2025, 2, 20)));
        assert_eq!(record.stage(Stage::Discounted).unwrap().deadline, Some(d(2025, 3, 3)));
    }

    #[test]
    fn test_overflowing_offset_is_rejected() {
        let calc = DeadlineCalculator::new();
        let t = template(&[
            (TransitionKey::QuotedToDiscounted, 2),
            (TransitionKey::DiscountedToPurchaseApproval, 1_000_000_000),
        ]);
        let now: NaiveDateTime = d(2025, 6, 2).and_hms_opt(10, 0, 0).unwrap();
        let mut record = TrackingRecord::new(
            "R".into(),
            "Q".into(),
            "L".into(),
            "SKU-1".into(),
            PurchaseVariant::Nacional,
            now,
        );

        let err = calc
            .compute_deadlines(d(2025, 6, 2), &t, PurchaseVariant::Nacional)
            .unwrap_err();
        assert_eq!(err.stage, Stage::PurchaseApproval);
        assert_eq!(err.sku, "SKU-1");

        assert!(calc.apply_to_record(&mut record, d(2025, 6, 2), &t).is_err());
        assert_eq!(record.stage(Stage::Discounted).unwrap().deadline, None, "溢出时不写入部分结果");
    }
}
