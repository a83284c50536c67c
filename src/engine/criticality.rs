// ==========================================
// 采购阶段跟踪系统 - 关键度评估引擎
// ==========================================
// 职责: (截止日期, 参考时间) → 延期天数 / 评分 / 等级 / 状态
// 规则:
//   延期 0 天    → 3  / LOW    / ON_TRACK
//   延期 1-3 天  → 5  / MEDIUM / WARNING
//   延期 4-7 天  → 7  / HIGH   / DANGER
//   延期 >7 天   → 10 / HIGH   / DANGER
// 红线: 纯函数, 不读写数据库
// ==========================================

use crate::domain::tracking::TrackingRecord;
use crate::domain::types::{CriticalityLevel, GeneralStatus};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 评估结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalityAssessment {
    pub delay_days: i64,
    pub score: i32,
    pub level: CriticalityLevel,
    pub general_status: GeneralStatus,
}

impl CriticalityAssessment {
    /// 是否属于风险项 (HIGH 或已延期)
    pub fn is_at_risk(&self) -> bool {
        self.level == CriticalityLevel::High || self.delay_days > 0
    }
}

// ==========================================
// CriticalityEngine - 关键度评估引擎
// ==========================================
pub struct CriticalityEngine {
    // 无状态引擎
}

impl Default for CriticalityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CriticalityEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// 评估单个截止日期
    ///
    /// 截止日期视为当天零点, 因此延期天数 = 参考日期 - 截止日期 (整天), 不足 0 取 0
    pub fn evaluate(
        &self,
        deadline: Option<NaiveDate>,
        reference: NaiveDateTime,
    ) -> CriticalityAssessment {
        let delay_days = match deadline {
            Some(d) => (reference.date() - d).num_days().max(0),
            None => 0,
        };

        let (score, level, general_status) = match delay_days {
            0 => (3, CriticalityLevel::Low, GeneralStatus::OnTrack),
            1..=3 => (5, CriticalityLevel::Medium, GeneralStatus::Warning),
            4..=7 => (7, CriticalityLevel::High, GeneralStatus::Danger),
            _ => (10, CriticalityLevel::High, GeneralStatus::Danger),
        };

        CriticalityAssessment {
            delay_days,
            score,
            level,
            general_status,
        }
    }

    /// 按当前阶段截止日期评估记录
    pub fn evaluate_record(
        &self,
        record: &TrackingRecord,
        reference: NaiveDateTime,
    ) -> CriticalityAssessment {
        let deadline = record
            .stage(record.current_stage())
            .and_then(|s| s.deadline);
        self.evaluate(deadline, reference)
    }

    /// 评估并写回记录的派生字段
    pub fn apply(&self, record: &mut TrackingRecord, reference: NaiveDateTime) -> CriticalityAssessment {
        let assessment = self.evaluate_record(record, reference);
        record.delay_days = assessment.delay_days;
        record.criticality_score = assessment.score;
        record.criticality_level = assessment.level;
        record.general_status = assessment.general_status;
        assessment
    }
}
