// ==========================================
// 采购阶段跟踪系统 - 时间线模板 API
// ==========================================
// 职责: 按 SKU 维护阶段间隔天数模板, 预览截止日期
// 红线: 被活跃记录引用的模板不可删除
// ==========================================

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::stage::Stage;
use crate::db::now_local;
use crate::domain::timeline::{TimelineTemplate, TransitionKey, MAX_OFFSET_DAYS};
use crate::domain::types::{Caller, PurchaseVariant};
use crate::engine::authorization::{authorize, TrackingOperation};
use crate::engine::deadline::DeadlineCalculator;
use crate::repository::timeline_repo::TimelineTemplateRepository;
use crate::repository::tracking_repo::TrackingRecordRepository;

// ==========================================
// TimelineTemplateApi - 时间线模板 API
// ==========================================
pub struct TimelineTemplateApi {
    template_repo: Arc<TimelineTemplateRepository>,
    tracking_repo: Arc<TrackingRecordRepository>,
    deadline_calculator: DeadlineCalculator,
}

impl TimelineTemplateApi {
    pub fn new(
        template_repo: Arc<TimelineTemplateRepository>,
        tracking_repo: Arc<TrackingRecordRepository>,
    ) -> Self {
        Self {
            template_repo,
            tracking_repo,
            deadline_calculator: DeadlineCalculator::new(),
        }
    }

    /// 新增或覆盖模板
    ///
    /// # 参数
    /// - `offsets`: 阶段间隔 → 天数 (0..=MAX_OFFSET_DAYS)
    ///
    /// # 返回
    /// 保存后的模板 (总天数已重新计算)
    pub fn upsert_template(
        &self,
        caller: &Caller,
        sku: &str,
        offsets: BTreeMap<TransitionKey, i32>,
    ) -> ApiResult<TimelineTemplate> {
        authorize(TrackingOperation::ManageTemplate, caller).map_err(ApiError::Forbidden)?;

        let sku = sku.trim();
        if sku.is_empty() {
            return Err(ApiError::bad_request("SKU不能为空"));
        }
        let negative: Vec<String> = offsets
            .iter()
            .filter(|(_, days)| **days < 0)
            .map(|(key, days)| format!("{}={}", key.field_name(), days))
            .collect();
        if !negative.is_empty() {
            return Err(ApiError::bad_request(format!(
                "间隔天数不能为负: {}",
                negative.join(", ")
            )));
        }
        let oversized: Vec<String> = offsets
            .iter()
            .filter(|(_, days)| **days > MAX_OFFSET_DAYS)
            .map(|(key, days)| format!("{}={}", key.field_name(), days))
            .collect();
        if !oversized.is_empty() {
            return Err(ApiError::bad_request(format!(
                "间隔天数不能超过 {} 天: {}",
                MAX_OFFSET_DAYS,
                oversized.join(", ")
            )));
        }

        let now = now_local();
        let mut template = TimelineTemplate::new(sku, offsets);
        template.updated_by = Some(caller.identity.clone());
        template.updated_at = Some(now);

        let audit = ActionLog::new(None, ActionType::TemplateUpsert, &caller.identity, now)
            .with_payload(&template)
            .with_detail(format!("sku={}", sku));
        self.template_repo.upsert(&template, Some(&audit))?;

        info!(sku = %sku, total_days = template.total_days, actor = %caller.identity, "时间线模板已保存");
        Ok(template)
    }

    /// 以字段名形式提交的模板 (兼容历史字段名)
    ///
    /// 新字段名优先; 空值视为未配置; 无法识别的字段名 → BadRequest
    pub fn upsert_template_fields(
        &self,
        caller: &Caller,
        sku: &str,
        fields: &HashMap<String, Option<i32>>,
    ) -> ApiResult<TimelineTemplate> {
        let (normalized, unknown) = TimelineTemplate::from_raw_offsets(sku, fields);
        if !unknown.is_empty() {
            warn!(sku = %sku, unknown = ?unknown, "模板字段无法识别");
            return Err(ApiError::bad_request(format!(
                "无法识别的模板字段: {}",
                unknown.join(", ")
            )));
        }
        self.upsert_template(caller, sku, normalized.offsets)
    }

    /// 查询模板
    pub fn get_template(&self, sku: &str) -> ApiResult<TimelineTemplate> {
        self.template_repo
            .find_by_sku(sku)?
            .ok_or_else(|| ApiError::NotFound(format!("时间线模板(sku={})不存在", sku)))
    }

    pub fn list_templates(&self) -> ApiResult<Vec<TimelineTemplate>> {
        Ok(self.template_repo.list_all()?)
    }

    /// 删除模板
    ///
    /// # 错误
    /// - NotFound: 模板不存在
    /// - BadRequest: 仍有活跃记录 (未驳回且未收货) 使用该 SKU
    pub fn delete_template(&self, caller: &Caller, sku: &str) -> ApiResult<()> {
        authorize(TrackingOperation::ManageTemplate, caller).map_err(ApiError::Forbidden)?;

        if self.template_repo.find_by_sku(sku)?.is_none() {
            return Err(ApiError::NotFound(format!("时间线模板(sku={})不存在", sku)));
        }

        let active = self.tracking_repo.count_active_by_sku(sku)?;
        if active > 0 {
            return Err(ApiError::bad_request(format!(
                "SKU {} 仍被 {} 条活跃记录使用, 不能删除模板",
                sku, active
            )));
        }

        let now = now_local();
        let audit = ActionLog::new(None, ActionType::TemplateDelete, &caller.identity, now)
            .with_detail(format!("sku={}", sku));
        self.template_repo.delete(sku, Some(&audit))?;

        info!(sku = %sku, actor = %caller.identity, "时间线模板已删除");
        Ok(())
    }

    /// 预览截止日期
    pub fn preview_deadlines(
        &self,
        sku: &str,
        anchor: NaiveDate,
        variant: PurchaseVariant,
    ) -> ApiResult<BTreeMap<Stage, Option<NaiveDate>>> {
        let template = self.get_template(sku)?;
        Ok(self
            .deadline_calculator
            .compute_deadlines(anchor, &template, variant)?)
    }
}
