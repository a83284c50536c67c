// ==========================================
// 采购阶段跟踪系统 - 核心库
// ==========================================
// 职责: 报价行选定后到收货为止的阶段跟踪
// 技术栈: Rust + SQLite
// 系统定位: 由宿主应用调用, 人工推进, 系统校验并记录
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::stage::Stage;
pub use domain::tracking::{Evidence, StageState, TrackingRecord};
pub use domain::types::{
    Caller, CallerRole, CriticalityLevel, GeneralStatus, Incoterm, PurchaseVariant,
};

// 领域实体
pub use domain::{ActionLog, ActionType};

// API
pub use api::{ApiError, ApiResult, DocumentApi, TimelineTemplateApi, TrackingApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "采购阶段跟踪系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
