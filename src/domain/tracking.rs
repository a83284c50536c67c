// ==========================================
// 采购阶段跟踪系统 - 跟踪记录领域模型
// ==========================================
// 红线: 记录永不物理删除 (采购审计轨迹)
// 不变量:
// - 当前阶段 = 按目录顺序最后一个 completed=true 的阶段, 无则为第一个阶段
// - actual_date 只在 completed=true 时存在
// - deadline 只在 completed=false 时可修改
// ==========================================

use crate::domain::stage::{applicable_stages, Stage, NOT_APPLICABLE_EVIDENCE};
use crate::domain::types::{CriticalityLevel, GeneralStatus, Incoterm, PurchaseVariant};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// StageState - 单阶段状态
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageState {
    pub completed: bool,
    pub actual_date: Option<NaiveDateTime>,
    pub deadline: Option<NaiveDate>,
    pub evidence_ref: Option<String>,
}

impl StageState {
    pub fn has_evidence(&self) -> bool {
        self.evidence_ref
            .as_deref()
            .map(|e| !e.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn is_not_applicable(&self) -> bool {
        self.evidence_ref.as_deref() == Some(NOT_APPLICABLE_EVIDENCE)
    }
}

// ==========================================
// Evidence - 推进时提交的证据
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Evidence {
    /// 证据引用 (文件编号/链接)
    Reference(String),
    /// 不适用
    NotApplicable,
}

impl Evidence {
    /// 转换为记录上存储的证据字段值
    pub fn to_evidence_ref(&self) -> String {
        match self {
            Evidence::Reference(r) => r.clone(),
            Evidence::NotApplicable => NOT_APPLICABLE_EVIDENCE.to_string(),
        }
    }
}

// ==========================================
// TrackingRecord - 产品跟踪记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRecord {
    // ===== 标识 =====
    pub record_id: String,
    pub quotation_id: String,
    pub line_id: String,
    pub project_id: Option<String>,

    // ===== 分类 =====
    pub sku: String,
    pub description: String,
    pub quantity: f64,
    pub origin_country: Option<String>,
    pub transport_mode: Option<String>,
    pub variant: PurchaseVariant,

    // ===== 各阶段状态 (仅包含适用阶段) =====
    pub stages: BTreeMap<Stage, StageState>,

    // ===== 交货条款 (FOB 阶段记录) =====
    pub incoterm: Option<Incoterm>,

    // ===== 价格信息 (由同步器刷新) =====
    pub supplier_name: Option<String>,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub discount_price: Option<f64>,

    // ===== 派生字段 =====
    pub criticality_score: i32,
    pub criticality_level: CriticalityLevel,
    pub delay_days: i64,
    pub general_status: GeneralStatus,

    // ===== 审批 / 驳回 =====
    pub approved: bool,
    pub approved_at: Option<NaiveDateTime>,
    pub approved_by: Option<String>,
    pub approval_notes: Option<String>,
    pub rejected: bool,
    pub rejected_at: Option<NaiveDateTime>,
    pub rejected_by: Option<String>,
    pub rejection_reason: Option<String>,

    // ===== 元数据 =====
    pub revision: i32, // 乐观锁版本号
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TrackingRecord {
    /// 创建空白记录 (所有适用阶段均未完成)
    pub fn new(
        record_id: String,
        quotation_id: String,
        line_id: String,
        sku: String,
        variant: PurchaseVariant,
        now: NaiveDateTime,
    ) -> Self {
        let stages = applicable_stages(variant)
            .iter()
            .map(|s| (*s, StageState::default()))
            .collect();

        Self {
            record_id,
            quotation_id,
            line_id,
            project_id: None,
            sku,
            description: String::new(),
            quantity: 0.0,
            origin_country: None,
            transport_mode: None,
            variant,
            stages,
            incoterm: None,
            supplier_name: None,
            unit_price: None,
            total_price: None,
            discount_price: None,
            criticality_score: 3,
            criticality_level: CriticalityLevel::Low,
            delay_days: 0,
            general_status: GeneralStatus::OnTrack,
            approved: false,
            approved_at: None,
            approved_by: None,
            approval_notes: None,
            rejected: false,
            rejected_at: None,
            rejected_by: None,
            rejection_reason: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageState> {
        self.stages.get(&stage)
    }

    pub fn stage_mut(&mut self, stage: Stage) -> Option<&mut StageState> {
        self.stages.get_mut(&stage)
    }

    pub fn is_completed(&self, stage: Stage) -> bool {
        self.stage(stage).map(|s| s.completed).unwrap_or(false)
    }

    /// 当前阶段
    pub fn current_stage(&self) -> Stage {
        let stages = applicable_stages(self.variant);
        stages
            .iter()
            .rev()
            .find(|s| self.is_completed(**s))
            .copied()
            .unwrap_or(stages[0])
    }

    /// 是否已完成终点阶段 (已收货)
    pub fn is_finished(&self) -> bool {
        applicable_stages(self.variant)
            .last()
            .map(|s| self.is_completed(*s))
            .unwrap_or(false)
    }

    /// 是否有任何晚于 `stage` 的阶段已完成
    pub fn has_progressed_past(&self, stage: Stage) -> bool {
        self.stages
            .iter()
            .any(|(s, state)| *s > stage && state.completed)
    }

    /// 活跃记录: 未驳回且未收货
    pub fn is_active(&self) -> bool {
        !self.rejected && !self.is_finished()
    }

    /// 标记阶段完成 (阶段不适用时返回 false)
    pub fn complete_stage(
        &mut self,
        stage: Stage,
        at: NaiveDateTime,
        evidence_ref: Option<String>,
    ) -> bool {
        match self.stage_mut(stage) {
            Some(state) => {
                state.completed = true;
                state.actual_date = Some(at);
                if evidence_ref.is_some() {
                    state.evidence_ref = evidence_ref;
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, d)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn record(variant: PurchaseVariant) -> TrackingRecord {
        TrackingRecord::new(
            "R1".to_string(),
            "Q1".to_string(),
            "L1".to_string(),
            "SKU-1".to_string(),
            variant,
            ts(1),
        )
    }

    #[test]
    fn test_new_record_has_only_applicable_stages() {
        let r = record(PurchaseVariant::Nacional);
        assert_eq!(r.stages.len(), 6);
        assert!(r.stage(Stage::Fob).is_none());
        assert_eq!(r.current_stage(), Stage::Quoted);
    }

    #[test]
    fn test_current_stage_is_last_completed() {
        let mut r = record(PurchaseVariant::Internacional);
        r.complete_stage(Stage::Quoted, ts(1), None);
        r.complete_stage(Stage::Discounted, ts(2), None);
        assert_eq!(r.current_stage(), Stage::Discounted);
        assert!(r.has_progressed_past(Stage::Quoted));
        assert!(!r.has_progressed_past(Stage::Discounted));
    }

    #[test]
    fn test_not_applicable_evidence() {
        let mut r = record(PurchaseVariant::Nacional);
        assert!(!r.complete_stage(Stage::Customs, ts(3), None));
        r.complete_stage(
            Stage::Quoted,
            ts(1),
            Some(Evidence::NotApplicable.to_evidence_ref()),
        );
        let state = r.stage(Stage::Quoted).unwrap();
        assert!(state.is_not_applicable());
        assert!(state.has_evidence());
        assert!(r.is_active());
    }
}
