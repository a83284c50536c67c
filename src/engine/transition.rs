// ==========================================
// 采购阶段跟踪系统 - 阶段转换引擎
// ==========================================
// 职责: 阶段状态机 (推进 / 跳转 / 驳回 / 审批 / 人工改期)
// 输入: 跟踪记录 + 调用方 + 文档闸门结果 + 当前时间
// 输出: 修改后的记录 (由调用方在同一事务内持久化)
// 红线:
// - 所有写操作先过权限策略
// - 所有校验在修改之前完成, 失败时记录保持原样
// - 引擎不拼 SQL
// ==========================================

use crate::domain::document::DocumentGateResult;
use crate::domain::stage::{
    applicable_stages, is_applicable, next_stage, Stage, CIF_AUTO_EVIDENCE,
};
use crate::domain::tracking::{Evidence, TrackingRecord};
use crate::domain::types::{Caller, Incoterm, PurchaseVariant};
use crate::engine::authorization::{authorize, TrackingOperation};
use crate::engine::criticality::{CriticalityAssessment, CriticalityEngine};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// 驳回原因最小长度 (默认值, 可由配置覆盖)
pub const DEFAULT_REJECTION_REASON_MIN_LEN: usize = 10;

// ==========================================
// TransitionError - 转换错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("无权操作: {0}")]
    Forbidden(String),

    #[error("状态无效: {0}")]
    InvalidState(String),

    #[error("请求无效: {message}")]
    BadRequest { message: String, missing: Vec<String> },
}

impl TransitionError {
    fn bad_request(message: impl Into<String>) -> Self {
        TransitionError::BadRequest {
            message: message.into(),
            missing: Vec::new(),
        }
    }
}

pub type TransitionResult<T> = Result<T, TransitionError>;

/// 推进请求
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceRequest {
    pub evidence: Option<Evidence>,
    /// 仅在进入 FOB 阶段时生效
    pub incoterm: Option<Incoterm>,
}

/// 转换结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: Stage,
    pub to: Stage,
    pub auto_completed: Vec<Stage>, // 本次顺带补完的阶段 (当前阶段未完成 / CIF 运费报价)
    pub assessment: CriticalityAssessment,
}

// ==========================================
// StageTransitionEngine - 阶段转换引擎
// ==========================================
pub struct StageTransitionEngine {
    criticality: CriticalityEngine,
    cif_auto_complete: bool,
    rejection_reason_min_len: usize,
}

impl Default for StageTransitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTransitionEngine {
    pub fn new() -> Self {
        Self {
            criticality: CriticalityEngine::new(),
            cif_auto_complete: true,
            rejection_reason_min_len: DEFAULT_REJECTION_REASON_MIN_LEN,
        }
    }

    /// 由配置构造
    pub fn with_settings(cif_auto_complete: bool, rejection_reason_min_len: usize) -> Self {
        Self {
            criticality: CriticalityEngine::new(),
            cif_auto_complete,
            rejection_reason_min_len,
        }
    }

    fn check(operation: TrackingOperation, caller: &Caller) -> TransitionResult<()> {
        authorize(operation, caller).map_err(TransitionError::Forbidden)
    }

    // ==========================================
    // 推进: 当前阶段 → 紧后阶段
    // ==========================================

    /// 推进到下一个适用阶段
    ///
    /// 当前阶段尚未完成 (如驳回后重建的空白记录) 时先补完当前阶段
    ///
    /// # 参数
    /// - `gate`: 当前阶段的文档闸门结果
    ///
    /// # 错误
    /// - Forbidden: 非主管/管理员
    /// - InvalidState: 已处于最终阶段
    /// - BadRequest: 当前阶段文档不完整 (missing 列出缺失项)
    #[instrument(skip(self, record, caller, gate, request), fields(record_id = %record.record_id))]
    pub fn advance(
        &self,
        record: &mut TrackingRecord,
        caller: &Caller,
        gate: &DocumentGateResult,
        request: &AdvanceRequest,
        now: NaiveDateTime,
    ) -> TransitionResult<TransitionOutcome> {
        Self::check(TrackingOperation::Advance, caller)?;

        let current = record.current_stage();
        let next = next_stage(record.variant, current).ok_or_else(|| {
            TransitionError::InvalidState(format!(
                "记录已处于最终阶段 {}, 无法继续推进",
                current.label()
            ))
        })?;

        if gate.stage != current {
            return Err(TransitionError::InvalidState(format!(
                "文档检查阶段 {} 与当前阶段 {} 不一致",
                gate.stage, current
            )));
        }
        if !gate.complete {
            return Err(TransitionError::BadRequest {
                message: format!("阶段 {} 的必备文档不完整", current.label()),
                missing: gate.missing.clone(),
            });
        }

        let mut auto_completed = Vec::new();
        if !record.is_completed(current) {
            record.complete_stage(current, now, None);
            auto_completed.push(current);
        }

        record.complete_stage(next, now, request.evidence.as_ref().map(Evidence::to_evidence_ref));

        match (next, request.incoterm) {
            (Stage::Fob, Some(incoterm)) => {
                record.incoterm = Some(incoterm);
                if incoterm == Incoterm::Cif
                    && self.cif_auto_complete
                    && record.variant == PurchaseVariant::Internacional
                    && !record.is_completed(Stage::FreightQuote)
                {
                    record.complete_stage(
                        Stage::FreightQuote,
                        now,
                        Some(CIF_AUTO_EVIDENCE.to_string()),
                    );
                    auto_completed.push(Stage::FreightQuote);
                }
            }
            (_, Some(incoterm)) => {
                debug!(stage = %next, incoterm = %incoterm, "非 FOB 阶段, 忽略交货条款");
            }
            _ => {}
        }

        let assessment = self.assess_stage(record, next, now);

        Ok(TransitionOutcome {
            from: current,
            to: next,
            auto_completed,
            assessment,
        })
    }

    // ==========================================
    // 跳转: 主管修正数据的显式通道, 不检查文档闸门
    // ==========================================

    /// 直接设置阶段
    ///
    /// 中间未完成的阶段一并标记完成 (实际日期 = now, 无证据),
    /// 保持"当前阶段之前全部完成"的不变量。
    /// 目标阶段已完成时保留原实际日期, 只更新证据。
    #[instrument(skip(self, record, caller, evidence), fields(record_id = %record.record_id))]
    pub fn set_stage(
        &self,
        record: &mut TrackingRecord,
        caller: &Caller,
        target: Stage,
        evidence: Option<&Evidence>,
        now: NaiveDateTime,
    ) -> TransitionResult<TransitionOutcome> {
        Self::check(TrackingOperation::SetStage, caller)?;

        if !is_applicable(record.variant, target) {
            return Err(TransitionError::bad_request(format!(
                "阶段 {} 不适用于 {} 采购",
                target, record.variant
            )));
        }

        let from = record.current_stage();
        let mut auto_completed = Vec::new();

        for stage in applicable_stages(record.variant) {
            if *stage >= target {
                break;
            }
            if !record.is_completed(*stage) {
                record.complete_stage(*stage, now, None);
                auto_completed.push(*stage);
            }
        }

        let evidence_ref = evidence.map(Evidence::to_evidence_ref);
        if record.is_completed(target) {
            if let Some(state) = record.stage_mut(target) {
                if evidence_ref.is_some() {
                    state.evidence_ref = evidence_ref;
                }
            }
        } else {
            record.complete_stage(target, now, evidence_ref);
        }

        let assessment = self.assess_stage(record, target, now);

        Ok(TransitionOutcome {
            from,
            to: target,
            auto_completed,
            assessment,
        })
    }

    // ==========================================
    // 审批 / 驳回
    // ==========================================

    /// 驳回 (不清除已有阶段进度)
    pub fn reject(
        &self,
        record: &mut TrackingRecord,
        caller: &Caller,
        reason: &str,
        now: NaiveDateTime,
    ) -> TransitionResult<()> {
        Self::check(TrackingOperation::Reject, caller)?;

        let reason = reason.trim();
        if reason.chars().count() < self.rejection_reason_min_len {
            return Err(TransitionError::bad_request(format!(
                "驳回原因至少需要 {} 个字符",
                self.rejection_reason_min_len
            )));
        }

        record.rejected = true;
        record.rejected_at = Some(now);
        record.rejected_by = Some(caller.identity.clone());
        record.rejection_reason = Some(reason.to_string());
        record.approved = false;
        record.approved_at = None;
        Ok(())
    }

    /// 审批签字 (与阶段位置无关)
    pub fn approve(
        &self,
        record: &mut TrackingRecord,
        caller: &Caller,
        approved: bool,
        notes: Option<&str>,
        now: NaiveDateTime,
    ) -> TransitionResult<()> {
        Self::check(TrackingOperation::Approve, caller)?;

        record.approved = approved;
        record.approved_at = if approved { Some(now) } else { None };
        record.approved_by = Some(caller.identity.clone());
        record.approval_notes = notes
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if approved {
            record.rejected = false;
        }
        Ok(())
    }

    // ==========================================
    // 人工改期
    // ==========================================

    /// 修改截止日期
    ///
    /// # 规则
    /// - 阶段未完成
    /// - 新日期 ≥ 当前截止日期 (只能延后)
    /// - 新日期 ≤ 紧后阶段截止日期 (若已设置)
    pub fn update_deadline(
        &self,
        record: &mut TrackingRecord,
        caller: &Caller,
        stage: Stage,
        new_deadline: NaiveDate,
    ) -> TransitionResult<()> {
        Self::check(TrackingOperation::UpdateDeadline, caller)?;

        let variant = record.variant;
        let next_deadline = next_stage(variant, stage)
            .and_then(|n| record.stage(n))
            .and_then(|s| s.deadline);

        let state = record.stage_mut(stage).ok_or_else(|| {
            TransitionError::bad_request(format!("阶段 {} 不适用于 {} 采购", stage, variant))
        })?;

        if state.completed {
            return Err(TransitionError::bad_request(format!(
                "阶段 {} 已完成, 截止日期不可修改",
                stage.label()
            )));
        }
        if let Some(current) = state.deadline {
            if new_deadline < current {
                return Err(TransitionError::bad_request(format!(
                    "新截止日期 {} 早于当前截止日期 {} (只能延后)",
                    new_deadline, current
                )));
            }
        }
        if let Some(upper) = next_deadline {
            if new_deadline > upper {
                return Err(TransitionError::bad_request(format!(
                    "新截止日期 {} 晚于下一阶段截止日期 {}",
                    new_deadline, upper
                )));
            }
        }

        state.deadline = Some(new_deadline);
        Ok(())
    }

    /// 修正实际完成日期
    ///
    /// # 规则
    /// - 阶段必须已完成 (未完成阶段没有实际日期)
    /// - 不晚于当前时间
    /// - 不早于前一个已完成阶段的实际日期, 不晚于后一个已完成阶段的实际日期
    pub fn update_actual_date(
        &self,
        record: &mut TrackingRecord,
        caller: &Caller,
        stage: Stage,
        new_date: NaiveDateTime,
        now: NaiveDateTime,
    ) -> TransitionResult<()> {
        Self::check(TrackingOperation::UpdateActualDate, caller)?;

        if !is_applicable(record.variant, stage) {
            return Err(TransitionError::bad_request(format!(
                "阶段 {} 不适用于 {} 采购",
                stage, record.variant
            )));
        }
        if !record.is_completed(stage) {
            return Err(TransitionError::InvalidState(format!(
                "阶段 {} 尚未完成, 没有可修正的实际日期",
                stage.label()
            )));
        }
        if new_date > now {
            return Err(TransitionError::bad_request(format!(
                "实际日期 {} 不能晚于当前时间",
                new_date
            )));
        }

        let stages = applicable_stages(record.variant);
        let lower = stages
            .iter()
            .filter(|s| **s < stage)
            .rev()
            .find_map(|s| record.stage(*s).and_then(|st| st.actual_date));
        let upper = stages
            .iter()
            .filter(|s| **s > stage)
            .find_map(|s| record.stage(*s).and_then(|st| st.actual_date));

        if let Some(lower) = lower {
            if new_date < lower {
                return Err(TransitionError::bad_request(format!(
                    "实际日期 {} 早于前一阶段实际日期 {}",
                    new_date, lower
                )));
            }
        }
        if let Some(upper) = upper {
            if new_date > upper {
                return Err(TransitionError::bad_request(format!(
                    "实际日期 {} 晚于后一阶段实际日期 {}",
                    new_date, upper
                )));
            }
        }

        if let Some(state) = record.stage_mut(stage) {
            state.actual_date = Some(new_date);
        }
        Ok(())
    }

    /// 以指定阶段截止日期评估并写回派生字段
    fn assess_stage(
        &self,
        record: &mut TrackingRecord,
        stage: Stage,
        now: NaiveDateTime,
    ) -> CriticalityAssessment {
        let deadline = record.stage(stage).and_then(|s| s.deadline);
        let assessment = self.criticality.evaluate(deadline, now);
        record.delay_days = assessment.delay_days;
        record.criticality_score = assessment.score;
        record.criticality_level = assessment.level;
        record.general_status = assessment.general_status;
        assessment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{CallerRole, CriticalityLevel};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 10)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    fn supervisor() -> Caller {
        Caller::new("ana", CallerRole::Supervisor)
    }

    fn passed(stage: Stage) -> DocumentGateResult {
        DocumentGateResult {
            stage,
            complete: true,
            missing: vec![],
        }
    }

    fn record_at(variant: PurchaseVariant, last_completed: Stage) -> TrackingRecord {
        let start = NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut r = TrackingRecord::new(
            "R1".into(),
            "Q1".into(),
            "L1".into(),
            "SKU-1".into(),
            variant,
            start,
        );
        for stage in applicable_stages(variant) {
            r.complete_stage(*stage, start, None);
            if *stage == last_completed {
                break;
            }
        }
        r
    }

    #[test]
    fn test_advance_requires_privilege() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Nacional, Stage::Discounted);
        let user = Caller::new("luis", CallerRole::User);

        let err = engine
            .advance(&mut r, &user, &passed(Stage::Discounted), &AdvanceRequest::default(), now())
            .unwrap_err();

        assert!(matches!(err, TransitionError::Forbidden(_)));
        assert!(!r.is_completed(Stage::PurchaseApproval));
    }

    #[test]
    fn test_advance_moves_to_next_stage() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Nacional, Stage::Discounted);

        let outcome = engine
            .advance(&mut r, &supervisor(), &passed(Stage::Discounted), &AdvanceRequest::default(), now())
            .unwrap();

        assert_eq!(outcome.from, Stage::Discounted);
        assert_eq!(outcome.to, Stage::PurchaseApproval);
        assert_eq!(r.current_stage(), Stage::PurchaseApproval);
        assert_eq!(r.stage(Stage::PurchaseApproval).unwrap().actual_date, Some(now()));
    }

    #[test]
    fn test_advance_blank_record_completes_current_first() {
        let engine = StageTransitionEngine::new();
        let mut r = TrackingRecord::new(
            "R2".into(),
            "Q1".into(),
            "L2".into(),
            "SKU-1".into(),
            PurchaseVariant::Nacional,
            now(),
        );

        let outcome = engine
            .advance(&mut r, &supervisor(), &passed(Stage::Quoted), &AdvanceRequest::default(), now())
            .unwrap();

        assert_eq!(outcome.from, Stage::Quoted);
        assert_eq!(outcome.to, Stage::Discounted);
        assert_eq!(outcome.auto_completed, vec![Stage::Quoted]);
        assert!(r.is_completed(Stage::Quoted), "当前阶段先补完");
        assert_eq!(r.stage(Stage::Quoted).unwrap().actual_date, Some(now()));
        assert!(r.is_completed(Stage::Discounted));
        assert_eq!(r.current_stage(), Stage::Discounted);
    }

    #[test]
    fn test_advance_blocked_by_gate() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Nacional, Stage::Purchased);
        let gate = DocumentGateResult {
            stage: Stage::Purchased,
            complete: false,
            missing: vec!["Orden de compra".to_string()],
        };

        let err = engine
            .advance(&mut r, &supervisor(), &gate, &AdvanceRequest::default(), now())
            .unwrap_err();

        match err {
            TransitionError::BadRequest { missing, .. } => {
                assert_eq!(missing, vec!["Orden de compra".to_string()]);
            }
            other => panic!("Expected BadRequest, got {:?}", other),
        }
        assert_eq!(r.current_stage(), Stage::Purchased);
    }

    #[test]
    fn test_advance_at_terminal_stage_is_invalid() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Nacional, Stage::Received);
        let err = engine
            .advance(&mut r, &supervisor(), &passed(Stage::Received), &AdvanceRequest::default(), now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidState(_)));
    }

    #[test]
    fn test_cif_auto_completes_freight_quote() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Internacional, Stage::FirstFollowUp);
        let request = AdvanceRequest {
            evidence: Some(Evidence::Reference("BL-001".into())),
            incoterm: Some(Incoterm::Cif),
        };

        let outcome = engine
            .advance(&mut r, &supervisor(), &passed(Stage::FirstFollowUp), &request, now())
            .unwrap();

        assert_eq!(outcome.to, Stage::Fob);
        assert_eq!(outcome.auto_completed, vec![Stage::FreightQuote]);
        assert_eq!(r.incoterm, Some(Incoterm::Cif));
        let freight = r.stage(Stage::FreightQuote).unwrap();
        assert!(freight.completed);
        assert_eq!(freight.evidence_ref.as_deref(), Some(CIF_AUTO_EVIDENCE));
        assert_eq!(freight.actual_date, Some(now()));
    }

    #[test]
    fn test_fob_incoterm_does_not_auto_complete() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Internacional, Stage::FirstFollowUp);
        let request = AdvanceRequest {
            evidence: None,
            incoterm: Some(Incoterm::Fob),
        };

        let outcome = engine
            .advance(&mut r, &supervisor(), &passed(Stage::FirstFollowUp), &request, now())
            .unwrap();

        assert!(outcome.auto_completed.is_empty());
        assert!(!r.is_completed(Stage::FreightQuote));
        assert_eq!(r.current_stage(), Stage::Fob);
    }

    #[test]
    fn test_nacional_ignores_cif() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Nacional, Stage::Paid);
        let request = AdvanceRequest {
            evidence: None,
            incoterm: Some(Incoterm::Cif),
        };

        let outcome = engine
            .advance(&mut r, &supervisor(), &passed(Stage::Paid), &request, now())
            .unwrap();

        assert_eq!(outcome.to, Stage::Received);
        assert!(outcome.auto_completed.is_empty());
        assert_eq!(r.incoterm, None);
        assert!(r.stage(Stage::FreightQuote).is_none());
    }

    #[test]
    fn test_advance_recomputes_criticality_from_entered_stage() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Nacional, Stage::Discounted);
        r.stage_mut(Stage::PurchaseApproval).unwrap().deadline =
            NaiveDate::from_ymd_opt(2025, 4, 5);

        let outcome = engine
            .advance(&mut r, &supervisor(), &passed(Stage::Discounted), &AdvanceRequest::default(), now())
            .unwrap();

        assert_eq!(outcome.assessment.delay_days, 5);
        assert_eq!(r.delay_days, 5);
        assert_eq!(r.criticality_score, 7);
        assert_eq!(r.criticality_level, CriticalityLevel::High);
    }

    #[test]
    fn test_set_stage_jumps_and_backfills() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Nacional, Stage::Quoted);

        let outcome = engine
            .set_stage(&mut r, &supervisor(), Stage::Received, None, now())
            .unwrap();

        assert_eq!(r.current_stage(), Stage::Received);
        assert_eq!(
            outcome.auto_completed,
            vec![Stage::Discounted, Stage::PurchaseApproval, Stage::Purchased, Stage::Paid]
        );
        assert!(applicable_stages(r.variant).iter().all(|s| r.is_completed(*s)));
    }

    #[test]
    fn test_set_stage_rejects_inapplicable_stage() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Nacional, Stage::Quoted);

        let err = engine
            .set_stage(&mut r, &supervisor(), Stage::Customs, None, now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::BadRequest { .. }));

        let user = Caller::new("luis", CallerRole::User);
        let err = engine
            .set_stage(&mut r, &user, Stage::Paid, None, now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Forbidden(_)));
    }

    #[test]
    fn test_reject_requires_reason_length() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Nacional, Stage::Purchased);
        r.approved = true;

        assert!(matches!(
            engine.reject(&mut r, &supervisor(), "  corto  ", now()),
            Err(TransitionError::BadRequest { .. })
        ));
        assert!(!r.rejected);

        engine
            .reject(&mut r, &supervisor(), "Proveedor no cumple la norma", now())
            .unwrap();
        assert!(r.rejected);
        assert!(!r.approved);
        assert_eq!(r.rejected_by.as_deref(), Some("ana"));
        // 进度保留
        assert_eq!(r.current_stage(), Stage::Purchased);
    }

    #[test]
    fn test_approve_clears_rejection() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Nacional, Stage::Quoted);
        r.rejected = true;

        engine
            .approve(&mut r, &supervisor(), true, Some("  ok  "), now())
            .unwrap();

        assert!(r.approved);
        assert!(!r.rejected);
        assert_eq!(r.approved_at, Some(now()));
        assert_eq!(r.approval_notes.as_deref(), Some("ok"));
    }

    #[test]
    fn test_update_deadline_bounds() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Nacional, Stage::Discounted);
        let d = |day| NaiveDate::from_ymd_opt(2025, 4, day).unwrap();
        r.stage_mut(Stage::Discounted).unwrap().deadline = Some(d(3));
        r.stage_mut(Stage::PurchaseApproval).unwrap().deadline = Some(d(10));
        r.stage_mut(Stage::Purchased).unwrap().deadline = Some(d(15));

        // 已完成阶段不可改
        assert!(engine
            .update_deadline(&mut r, &supervisor(), Stage::Discounted, d(5))
            .is_err());
        // 不能提前
        assert!(engine
            .update_deadline(&mut r, &supervisor(), Stage::PurchaseApproval, d(9))
            .is_err());
        // 不能超过下一阶段
        assert!(engine
            .update_deadline(&mut r, &supervisor(), Stage::PurchaseApproval, d(16))
            .is_err());

        engine
            .update_deadline(&mut r, &supervisor(), Stage::PurchaseApproval, d(15))
            .unwrap();
        assert_eq!(r.stage(Stage::PurchaseApproval).unwrap().deadline, Some(d(15)));
    }

    #[test]
    fn test_update_actual_date_ordering() {
        let engine = StageTransitionEngine::new();
        let mut r = record_at(PurchaseVariant::Nacional, Stage::Discounted);
        let t = |day, h| {
            NaiveDate::from_ymd_opt(2025, 4, day)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        r.stage_mut(Stage::Quoted).unwrap().actual_date = Some(t(2, 9));
        r.stage_mut(Stage::Discounted).unwrap().actual_date = Some(t(4, 9));

        assert!(matches!(
            engine.update_actual_date(&mut r, &supervisor(), Stage::Purchased, t(5, 9), now()),
            Err(TransitionError::InvalidState(_))
        ));
        assert!(engine
            .update_actual_date(&mut r, &supervisor(), Stage::Discounted, t(1, 9), now())
            .is_err());
        assert!(engine
            .update_actual_date(&mut r, &supervisor(), Stage::Discounted, t(20, 9), now())
            .is_err());

        engine
            .update_actual_date(&mut r, &supervisor(), Stage::Discounted, t(3, 12), now())
            .unwrap();
        assert_eq!(r.stage(Stage::Discounted).unwrap().actual_date, Some(t(3, 12)));
    }
}
