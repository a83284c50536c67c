// ==========================================
// 采购阶段跟踪系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、阶段目录
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod document;
pub mod quotation;
pub mod stage;
pub mod timeline;
pub mod tracking;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use document::{AttachedDocument, DocumentGateResult, NotApplicableJustification, RequiredDocument};
pub use quotation::{OriginatingLine, PriceInfo, QuotationApprovalFlags};
pub use stage::{
    applicable_stages, field_names_for, is_applicable, next_stage, previous_stage, Stage,
    StageFieldNames, CIF_AUTO_EVIDENCE, NOT_APPLICABLE_EVIDENCE,
};
pub use timeline::{TimelineTemplate, TransitionKey};
pub use tracking::{Evidence, StageState, TrackingRecord};
pub use types::{Caller, CallerRole, CriticalityLevel, GeneralStatus, Incoterm, PurchaseVariant};
