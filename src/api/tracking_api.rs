// ==========================================
// 采购阶段跟踪系统 - 跟踪 API
// ==========================================
// 职责: 跟踪记录的创建、推进、跳转、审批、驳回、改期、同步与查询
// 流程: 鉴权 → 读取 → 引擎校验并修改 → 单事务写入 (记录 + 阶段 + 审计)
// 红线:
// - 所有写操作先过权限策略
// - 报价单汇总标志在提交后尽力重算, 失败只记日志
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::api::document_api::evaluate_gate;
use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::{ConfigManager, TrackingConfig};
use crate::db::now_local;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::quotation::{OriginatingLine, PriceInfo, QuotationApprovalFlags};
use crate::domain::stage::{applicable_stages, Stage};
use crate::domain::tracking::{Evidence, TrackingRecord};
use crate::domain::types::{Caller, CriticalityLevel, GeneralStatus, PurchaseVariant};
use crate::engine::authorization::{authorize, TrackingOperation};
use crate::engine::criticality::CriticalityEngine;
use crate::engine::reconciler::{ReconcileAction, SyncReconciler};
use crate::engine::transition::{AdvanceRequest, StageTransitionEngine};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::document_repo::DocumentRepository;
use crate::repository::error::RepositoryError;
use crate::repository::quotation_repo::QuotationRepository;
use crate::repository::timeline_repo::TimelineTemplateRepository;
use crate::repository::tracking_repo::TrackingRecordRepository;

// ==========================================
// 查询结果
// ==========================================

/// 时间线条目 (每个适用阶段一条, 按流程顺序)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub stage: Stage,
    pub label: String,
    pub completed: bool,
    pub actual_date: Option<NaiveDateTime>,
    pub deadline: Option<NaiveDate>,
    /// 已完成阶段以实际日期计, 未完成阶段以当前时间计
    pub delay_days: i64,
    pub has_evidence: bool,
    pub is_current: bool,
}

/// 风险清单条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtRiskSummary {
    pub record_id: String,
    pub quotation_id: String,
    pub line_id: String,
    pub sku: String,
    pub description: String,
    pub variant: PurchaseVariant,
    pub current_stage: Stage,
    pub current_stage_label: String,
    pub deadline: Option<NaiveDate>,
    pub delay_days: i64,
    pub criticality_score: i32,
    pub criticality_level: CriticalityLevel,
    pub general_status: GeneralStatus,
    pub supplier_name: Option<String>,
}

/// 批量同步结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSyncSummary {
    pub scanned: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

// ==========================================
// TrackingApi - 跟踪 API
// ==========================================
pub struct TrackingApi {
    tracking_repo: Arc<TrackingRecordRepository>,
    document_repo: Arc<DocumentRepository>,
    template_repo: Arc<TimelineTemplateRepository>,
    quotation_repo: Arc<QuotationRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
    criticality: CriticalityEngine,
    reconciler: SyncReconciler,
}

impl TrackingApi {
    /// 创建新的 TrackingApi 实例
    pub fn new(
        tracking_repo: Arc<TrackingRecordRepository>,
        document_repo: Arc<DocumentRepository>,
        template_repo: Arc<TimelineTemplateRepository>,
        quotation_repo: Arc<QuotationRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            tracking_repo,
            document_repo,
            template_repo,
            quotation_repo,
            action_log_repo,
            config_manager,
            criticality: CriticalityEngine::new(),
            reconciler: SyncReconciler::new(),
        }
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn check(operation: TrackingOperation, caller: &Caller) -> ApiResult<()> {
        authorize(operation, caller).map_err(ApiError::Forbidden)
    }

    fn config(&self) -> ApiResult<TrackingConfig> {
        Ok(self.config_manager.load_tracking_config()?)
    }

    fn transition_engine(&self) -> ApiResult<StageTransitionEngine> {
        let config = self.config()?;
        Ok(StageTransitionEngine::with_settings(
            config.cif_auto_complete,
            config.rejection_reason_min_len,
        ))
    }

    fn load(&self, record_id: &str) -> ApiResult<TrackingRecord> {
        self.tracking_repo
            .find_by_id(record_id)?
            .ok_or_else(|| ApiError::NotFound(format!("跟踪记录(id={})不存在", record_id)))
    }

    fn load_line(&self, line_id: &str) -> ApiResult<OriginatingLine> {
        self.quotation_repo
            .find_line(line_id)?
            .ok_or_else(|| ApiError::NotFound(format!("报价行(id={})不存在", line_id)))
    }

    /// 写回已存在的记录 (乐观锁) 并同步 revision
    fn save(&self, record: &mut TrackingRecord, audit: &ActionLog) -> ApiResult<()> {
        record.updated_at = audit.action_ts;
        record.revision = self.tracking_repo.update(record, Some(audit))?;
        Ok(())
    }

    /// 提交后重算报价单汇总审批标志 (失败只记日志)
    fn refresh_quotation_flags(&self, quotation_id: &str) {
        let result = self
            .tracking_repo
            .approvals_by_quotation(quotation_id)
            .and_then(|approvals| {
                let flags = QuotationApprovalFlags::from_approvals(&approvals);
                self.quotation_repo
                    .update_approval_flags(quotation_id, flags)
                    .map(|_| flags)
            });

        match result {
            Ok(flags) => debug!(
                quotation_id = %quotation_id,
                all_items_approved = flags.all_items_approved,
                partially_approved = flags.partially_approved,
                "报价单汇总标志已更新"
            ),
            Err(e) => warn!(quotation_id = %quotation_id, error = %e, "报价单汇总标志更新失败"),
        }
    }

    // ==========================================
    // 创建
    // ==========================================

    /// 按报价行获取记录, 不存在则创建
    ///
    /// 新记录: 报价阶段立即完成; 有折扣价时折扣阶段一并完成; 截止日期来自 SKU 模板
    #[instrument(skip(self, caller), fields(actor = %caller.identity))]
    pub fn create_or_get_record(&self, caller: &Caller, line_id: &str) -> ApiResult<TrackingRecord> {
        if let Some(existing) = self.tracking_repo.find_by_line_id(line_id)? {
            return Ok(existing);
        }

        let line = self.load_line(line_id)?;
        let template = self.template_repo.find_by_sku(&line.sku)?;
        if template.is_none() {
            debug!(sku = %line.sku, "SKU 没有时间线模板, 截止日期留空");
        }

        let now = now_local();
        let record = self
            .reconciler
            .seed_record(&line, line.selected_price.as_ref(), template.as_ref(), now)?;
        let audit = ActionLog::new(
            Some(record.record_id.clone()),
            ActionType::CreateRecord,
            &caller.identity,
            now,
        )
        .with_payload(&serde_json::json!({
            "line_id": line.line_id,
            "quotation_id": line.quotation_id,
            "sku": line.sku,
            "variant": line.variant,
        }));

        match self.tracking_repo.insert(&record, Some(&audit)) {
            Ok(()) => {
                info!(record_id = %record.record_id, line_id = %line_id, "跟踪记录已创建");
                Ok(record)
            }
            // 并发创建: 以已提交的记录为准
            Err(RepositoryError::UniqueConstraintViolation(_)) => self
                .tracking_repo
                .find_by_line_id(line_id)?
                .ok_or_else(|| ApiError::NotFound(format!("报价行(id={})的跟踪记录不存在", line_id))),
            Err(e) => Err(e.into()),
        }
    }

    // ==========================================
    // 阶段转换
    // ==========================================

    /// 推进到下一阶段
    ///
    /// # 错误
    /// - Forbidden: 非主管/管理员
    /// - NotFound: 记录不存在
    /// - InvalidState: 已处于最终阶段
    /// - BadRequest: 当前阶段必备文档不完整 (missing 列出缺失项)
    /// - OptimisticLockFailure: 记录已被并发修改
    #[instrument(skip(self, caller, request), fields(actor = %caller.identity))]
    pub fn advance(
        &self,
        caller: &Caller,
        record_id: &str,
        request: AdvanceRequest,
    ) -> ApiResult<TrackingRecord> {
        Self::check(TrackingOperation::Advance, caller)?;

        let mut record = self.load(record_id)?;
        let gate = evaluate_gate(&self.document_repo, record_id, record.current_stage())?;
        let now = now_local();

        let outcome = self
            .transition_engine()?
            .advance(&mut record, caller, &gate, &request, now)?;

        let audit = ActionLog::new(Some(record_id.to_string()), ActionType::Advance, &caller.identity, now)
            .with_payload(&serde_json::json!({
                "from": outcome.from,
                "to": outcome.to,
                "auto_completed": outcome.auto_completed,
                "evidence": request.evidence,
                "incoterm": request.incoterm,
                "delay_days": outcome.assessment.delay_days,
            }));
        self.save(&mut record, &audit)?;

        info!(
            record_id = %record_id,
            from = %outcome.from,
            to = %outcome.to,
            auto_completed = ?outcome.auto_completed,
            criticality = %record.criticality_level,
            "阶段已推进"
        );
        Ok(record)
    }

    /// 直接设置阶段 (不检查文档闸门)
    #[instrument(skip(self, caller, evidence), fields(actor = %caller.identity))]
    pub fn set_stage(
        &self,
        caller: &Caller,
        record_id: &str,
        stage: Stage,
        evidence: Option<Evidence>,
    ) -> ApiResult<TrackingRecord> {
        Self::check(TrackingOperation::SetStage, caller)?;

        let mut record = self.load(record_id)?;
        let now = now_local();

        let outcome = self
            .transition_engine()?
            .set_stage(&mut record, caller, stage, evidence.as_ref(), now)?;

        let audit = ActionLog::new(Some(record_id.to_string()), ActionType::SetStage, &caller.identity, now)
            .with_payload(&serde_json::json!({
                "from": outcome.from,
                "to": outcome.to,
                "backfilled": outcome.auto_completed,
                "evidence": evidence,
            }));
        self.save(&mut record, &audit)?;

        info!(record_id = %record_id, from = %outcome.from, to = %stage, "阶段已手动设置");
        Ok(record)
    }

    // ==========================================
    // 审批 / 驳回
    // ==========================================

    /// 驳回记录 (保留阶段进度)
    #[instrument(skip(self, caller, reason), fields(actor = %caller.identity))]
    pub fn reject(&self, caller: &Caller, record_id: &str, reason: &str) -> ApiResult<TrackingRecord> {
        Self::check(TrackingOperation::Reject, caller)?;

        let mut record = self.load(record_id)?;
        let now = now_local();
        self.transition_engine()?.reject(&mut record, caller, reason, now)?;

        let audit = ActionLog::new(Some(record_id.to_string()), ActionType::Reject, &caller.identity, now)
            .with_detail(reason.trim());
        self.save(&mut record, &audit)?;

        info!(record_id = %record_id, "记录已驳回");
        self.refresh_quotation_flags(&record.quotation_id);
        Ok(record)
    }

    /// 按报价行驳回; 报价行尚无记录时先创建最小记录
    #[instrument(skip(self, caller, reason), fields(actor = %caller.identity))]
    pub fn reject_line(&self, caller: &Caller, line_id: &str, reason: &str) -> ApiResult<TrackingRecord> {
        Self::check(TrackingOperation::Reject, caller)?;

        if let Some(existing) = self.tracking_repo.find_by_line_id(line_id)? {
            return self.reject(caller, &existing.record_id, reason);
        }

        let line = self.load_line(line_id)?;
        let now = now_local();
        let mut record = self.reconciler.blank_record(&line, now);
        self.transition_engine()?.reject(&mut record, caller, reason, now)?;

        let audit = ActionLog::new(
            Some(record.record_id.clone()),
            ActionType::Reject,
            &caller.identity,
            now,
        )
        .with_payload(&serde_json::json!({ "line_id": line_id, "created": true }))
        .with_detail(reason.trim());
        self.tracking_repo.insert(&record, Some(&audit))?;

        info!(record_id = %record.record_id, line_id = %line_id, "报价行已驳回 (新建最小记录)");
        self.refresh_quotation_flags(&record.quotation_id);
        Ok(record)
    }

    /// 审批签字
    #[instrument(skip(self, caller, notes), fields(actor = %caller.identity))]
    pub fn approve(
        &self,
        caller: &Caller,
        record_id: &str,
        approved: bool,
        notes: Option<&str>,
    ) -> ApiResult<TrackingRecord> {
        Self::check(TrackingOperation::Approve, caller)?;

        let mut record = self.load(record_id)?;
        let now = now_local();
        self.transition_engine()?
            .approve(&mut record, caller, approved, notes, now)?;

        let audit = ActionLog::new(Some(record_id.to_string()), ActionType::Approve, &caller.identity, now)
            .with_payload(&serde_json::json!({ "approved": approved, "notes": record.approval_notes }));
        self.save(&mut record, &audit)?;

        info!(record_id = %record_id, approved = approved, "审批状态已更新");
        self.refresh_quotation_flags(&record.quotation_id);
        Ok(record)
    }

    // ==========================================
    // 人工改期
    // ==========================================

    /// 修改未完成阶段的截止日期 (只能延后, 不超过下一阶段截止日期)
    #[instrument(skip(self, caller), fields(actor = %caller.identity))]
    pub fn update_deadline(
        &self,
        caller: &Caller,
        record_id: &str,
        stage: Stage,
        new_deadline: NaiveDate,
    ) -> ApiResult<TrackingRecord> {
        Self::check(TrackingOperation::UpdateDeadline, caller)?;

        let mut record = self.load(record_id)?;
        let previous = record.stage(stage).and_then(|s| s.deadline);
        self.transition_engine()?
            .update_deadline(&mut record, caller, stage, new_deadline)?;

        let now = now_local();
        let audit = ActionLog::new(
            Some(record_id.to_string()),
            ActionType::UpdateDeadline,
            &caller.identity,
            now,
        )
        .with_payload(&serde_json::json!({
            "stage": stage,
            "previous": previous,
            "deadline": new_deadline,
        }));
        self.save(&mut record, &audit)?;

        info!(record_id = %record_id, stage = %stage, deadline = %new_deadline, "截止日期已修改");
        Ok(record)
    }

    /// 修正已完成阶段的实际日期
    #[instrument(skip(self, caller), fields(actor = %caller.identity))]
    pub fn update_actual_date(
        &self,
        caller: &Caller,
        record_id: &str,
        stage: Stage,
        new_date: NaiveDateTime,
    ) -> ApiResult<TrackingRecord> {
        Self::check(TrackingOperation::UpdateActualDate, caller)?;

        let mut record = self.load(record_id)?;
        let previous = record.stage(stage).and_then(|s| s.actual_date);
        let now = now_local();
        self.transition_engine()?
            .update_actual_date(&mut record, caller, stage, new_date, now)?;

        let audit = ActionLog::new(
            Some(record_id.to_string()),
            ActionType::UpdateActualDate,
            &caller.identity,
            now,
        )
        .with_payload(&serde_json::json!({
            "stage": stage,
            "previous": previous,
            "actual_date": new_date,
        }));
        self.save(&mut record, &audit)?;

        info!(record_id = %record_id, stage = %stage, actual_date = %new_date, "实际日期已修正");
        Ok(record)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_record(&self, record_id: &str) -> ApiResult<TrackingRecord> {
        self.load(record_id)
    }

    /// 记录时间线 (按流程顺序)
    pub fn get_timeline(&self, record_id: &str) -> ApiResult<Vec<TimelineEntry>> {
        let record = self.load(record_id)?;
        let current = record.current_stage();
        let now = now_local();

        let entries = applicable_stages(record.variant)
            .iter()
            .map(|stage| {
                let state = record.stage(*stage).cloned().unwrap_or_default();
                let reference = match (state.completed, state.actual_date) {
                    (true, Some(actual)) => actual,
                    _ => now,
                };
                let delay_days = self.criticality.evaluate(state.deadline, reference).delay_days;
                TimelineEntry {
                    stage: *stage,
                    label: stage.label().to_string(),
                    completed: state.completed,
                    actual_date: state.actual_date,
                    deadline: state.deadline,
                    delay_days,
                    has_evidence: state.has_evidence(),
                    is_current: *stage == current,
                }
            })
            .collect();

        Ok(entries)
    }

    /// 风险清单: HIGH 或已延期的活跃记录, 延期天数降序, 再按评分降序
    ///
    /// 关键度按当前时间重新评估, 不依赖上次写入的派生字段
    pub fn list_at_risk(&self) -> ApiResult<Vec<AtRiskSummary>> {
        let limit = self.config()?.at_risk_limit;
        let now = now_local();

        let mut summaries: Vec<AtRiskSummary> = self
            .tracking_repo
            .list_active()?
            .into_iter()
            .filter_map(|record| {
                let assessment = self.criticality.evaluate_record(&record, now);
                if !assessment.is_at_risk() {
                    return None;
                }
                let current = record.current_stage();
                Some(AtRiskSummary {
                    deadline: record.stage(current).and_then(|s| s.deadline),
                    record_id: record.record_id,
                    quotation_id: record.quotation_id,
                    line_id: record.line_id,
                    sku: record.sku,
                    description: record.description,
                    variant: record.variant,
                    current_stage: current,
                    current_stage_label: current.label().to_string(),
                    delay_days: assessment.delay_days,
                    criticality_score: assessment.score,
                    criticality_level: assessment.level,
                    general_status: assessment.general_status,
                    supplier_name: record.supplier_name,
                })
            })
            .collect();

        summaries.sort_by(|a, b| {
            b.delay_days
                .cmp(&a.delay_days)
                .then(b.criticality_score.cmp(&a.criticality_score))
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        summaries.truncate(limit);

        debug!(count = summaries.len(), "风险清单已生成");
        Ok(summaries)
    }

    // ==========================================
    // 报价同步
    // ==========================================

    /// 报价行价格/折扣变更后同步跟踪记录
    #[instrument(skip(self, caller, price), fields(actor = %caller.identity))]
    pub fn reconcile(&self, caller: &Caller, line_id: &str, price: PriceInfo) -> ApiResult<TrackingRecord> {
        Self::check(TrackingOperation::Reconcile, caller)?;

        let line = self.load_line(line_id)?;
        let existing = self.tracking_repo.find_by_line_id(line_id)?;
        let template = match existing {
            None => self.template_repo.find_by_sku(&line.sku)?,
            Some(_) => None,
        };
        let now = now_local();

        let (mut record, action) =
            self.reconciler
                .reconcile(existing, &line, &price, template.as_ref(), now)?;

        let audit = ActionLog::new(
            Some(record.record_id.clone()),
            ActionType::Reconcile,
            &caller.identity,
            now,
        )
        .with_payload(&serde_json::json!({
            "line_id": line_id,
            "action": action,
            "price": price,
        }));

        match action {
            ReconcileAction::Created => {
                record.updated_at = now;
                self.tracking_repo.insert(&record, Some(&audit))?;
            }
            ReconcileAction::Refreshed | ReconcileAction::PriceOnly => {
                self.save(&mut record, &audit)?;
            }
        }

        info!(record_id = %record.record_id, line_id = %line_id, action = %action, "报价同步完成");
        Ok(record)
    }

    /// 为已批准报价单中已选定价格、但尚无跟踪记录的报价行补建记录
    #[instrument(skip(self, caller), fields(actor = %caller.identity))]
    pub fn sync_approved_quotations(&self, caller: &Caller) -> ApiResult<BulkSyncSummary> {
        Self::check(TrackingOperation::BulkSync, caller)?;

        let lines = self.quotation_repo.list_selected_lines_of_approved()?;
        let mut summary = BulkSyncSummary {
            scanned: lines.len(),
            ..Default::default()
        };

        for line in &lines {
            if self.tracking_repo.find_by_line_id(&line.line_id)?.is_some() {
                summary.skipped += 1;
                continue;
            }

            let template = self.template_repo.find_by_sku(&line.sku)?;
            let now = now_local();
            let record = match self.reconciler.seed_record(
                line,
                line.selected_price.as_ref(),
                template.as_ref(),
                now,
            ) {
                Ok(record) => record,
                Err(e) => {
                    warn!(line_id = %line.line_id, error = %e, "批量同步: 截止日期计算失败");
                    summary.failed += 1;
                    continue;
                }
            };
            let audit = ActionLog::new(
                Some(record.record_id.clone()),
                ActionType::CreateRecord,
                &caller.identity,
                now,
            )
            .with_payload(&serde_json::json!({
                "line_id": line.line_id,
                "quotation_id": line.quotation_id,
                "source": ActionType::BulkSync.as_str(),
            }));

            match self.tracking_repo.insert(&record, Some(&audit)) {
                Ok(()) => summary.created += 1,
                Err(e) => {
                    warn!(line_id = %line.line_id, error = %e, "批量同步: 记录创建失败");
                    summary.failed += 1;
                }
            }
        }

        let audit = ActionLog::new(None, ActionType::BulkSync, &caller.identity, now_local())
            .with_payload(&summary);
        if let Err(e) = self.action_log_repo.insert(&audit) {
            warn!(error = %e, "批量同步审计日志写入失败");
        }

        info!(
            scanned = summary.scanned,
            created = summary.created,
            skipped = summary.skipped,
            failed = summary.failed,
            "批量同步完成"
        );
        Ok(summary)
    }
}
