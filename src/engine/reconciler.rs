// ==========================================
// 采购阶段跟踪系统 - 报价同步引擎
// ==========================================
// 职责: 报价行选定价格 → 创建/刷新跟踪记录
// 规则:
// - 记录不存在 → 以报价行为种子创建, 报价阶段立即完成
// - 记录尚未采购 → 刷新价格/供应商, 并按折扣价刷新折扣阶段
//   (采购审批已完成时只补完折扣阶段, 不撤销)
// - 记录已采购或更后 → 只刷新价格/供应商, 不动任何阶段
// ==========================================

use crate::domain::quotation::{OriginatingLine, PriceInfo};
use crate::domain::stage::Stage;
use crate::domain::timeline::TimelineTemplate;
use crate::domain::tracking::TrackingRecord;
use crate::engine::criticality::CriticalityEngine;
use crate::engine::deadline::{DeadlineCalculator, DeadlineOverflow};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// 同步动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcileAction {
    /// 新建记录
    Created,
    /// 刷新价格与折扣阶段
    Refreshed,
    /// 仅刷新价格 (记录已越过折扣阶段)
    PriceOnly,
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileAction::Created => write!(f, "CREATED"),
            ReconcileAction::Refreshed => write!(f, "REFRESHED"),
            ReconcileAction::PriceOnly => write!(f, "PRICE_ONLY"),
        }
    }
}

// ==========================================
// SyncReconciler - 报价同步器
// ==========================================
pub struct SyncReconciler {
    deadline: DeadlineCalculator,
    criticality: CriticalityEngine,
}

impl Default for SyncReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncReconciler {
    pub fn new() -> Self {
        Self {
            deadline: DeadlineCalculator::new(),
            criticality: CriticalityEngine::new(),
        }
    }

    /// 以报价行为种子创建空白记录 (不完成任何阶段)
    pub fn blank_record(&self, line: &OriginatingLine, now: NaiveDateTime) -> TrackingRecord {
        let mut record = TrackingRecord::new(
            Uuid::new_v4().to_string(),
            line.quotation_id.clone(),
            line.line_id.clone(),
            line.sku.clone(),
            line.variant,
            now,
        );
        record.project_id = line.project_id.clone();
        record.description = line.description.clone();
        record.quantity = line.quantity;
        record.origin_country = line.origin_country.clone();
        record.transport_mode = line.transport_mode.clone();
        record
    }

    /// 创建新记录: 报价阶段完成, 按模板计算截止日期
    ///
    /// # 参数
    /// - `template`: SKU 对应的时间线模板, 没有则所有截止日期为空
    pub fn seed_record(
        &self,
        line: &OriginatingLine,
        price: Option<&PriceInfo>,
        template: Option<&TimelineTemplate>,
        now: NaiveDateTime,
    ) -> Result<TrackingRecord, DeadlineOverflow> {
        let mut record = self.blank_record(line, now);
        record.complete_stage(Stage::Quoted, now, None);

        if let Some(price) = price {
            Self::apply_price(&mut record, price);
            if price.has_discount() {
                record.complete_stage(Stage::Discounted, now, None);
            }
        }

        if let Some(template) = template {
            let anchor = line.quote_date.unwrap_or_else(|| now.date());
            self.deadline.apply_to_record(&mut record, anchor, template)?;
        }

        self.criticality.apply(&mut record, now);
        Ok(record)
    }

    /// 同步单条报价行
    ///
    /// # 返回
    /// (同步后的记录, 执行的动作)
    pub fn reconcile(
        &self,
        existing: Option<TrackingRecord>,
        line: &OriginatingLine,
        price: &PriceInfo,
        template: Option<&TimelineTemplate>,
        now: NaiveDateTime,
    ) -> Result<(TrackingRecord, ReconcileAction), DeadlineOverflow> {
        let mut record = match existing {
            None => {
                let record = self.seed_record(line, Some(price), template, now)?;
                debug!(line_id = %line.line_id, "报价行首次同步, 新建跟踪记录");
                return Ok((record, ReconcileAction::Created));
            }
            Some(r) => r,
        };

        Self::apply_price(&mut record, price);

        if record.has_progressed_past(Stage::PurchaseApproval) {
            debug!(record_id = %record.record_id, "记录已进入采购阶段, 仅刷新价格");
            return Ok((record, ReconcileAction::PriceOnly));
        }

        if !record.is_completed(Stage::Quoted) {
            record.complete_stage(Stage::Quoted, now, None);
        }

        if price.has_discount() {
            record.complete_stage(Stage::Discounted, now, None);
        } else if record.is_completed(Stage::PurchaseApproval) {
            debug!(record_id = %record.record_id, "采购审批已完成, 保留折扣阶段");
        } else if let Some(state) = record.stage_mut(Stage::Discounted) {
            state.completed = false;
            state.actual_date = None;
            state.evidence_ref = None;
        }

        self.criticality.apply(&mut record, now);
        Ok((record, ReconcileAction::Refreshed))
    }

    fn apply_price(record: &mut TrackingRecord, price: &PriceInfo) {
        record.supplier_name = Some(price.supplier_name.clone());
        record.unit_price = Some(price.unit_price);
        record.total_price = Some(price.total_price);
        record.discount_price = price.discount_price;
    }
}
