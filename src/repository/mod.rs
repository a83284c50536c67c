// ==========================================
// 采购阶段跟踪系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
mod columns;
pub mod document_repo;
pub mod error;
pub mod quotation_repo;
pub mod timeline_repo;
pub mod tracking_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use document_repo::DocumentRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use quotation_repo::QuotationRepository;
pub use timeline_repo::TimelineTemplateRepository;
pub use tracking_repo::TrackingRecordRepository;
