// ==========================================
// 采购阶段跟踪系统 - API 层
// ==========================================
// 职责: 对外业务接口 (鉴权 → 引擎 → 仓储), 供宿主应用调用
// ==========================================

pub mod error;
pub mod document_api;
pub mod timeline_api;
pub mod tracking_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use document_api::{AttachmentUpload, DocumentApi};
pub use timeline_api::TimelineTemplateApi;
pub use tracking_api::{AtRiskSummary, BulkSyncSummary, TimelineEntry, TrackingApi};
