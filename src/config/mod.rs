// ==========================================
// 采购阶段跟踪系统 - 配置层
// ==========================================
// 职责: 跟踪规则配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, TrackingConfig, DEFAULT_AT_RISK_LIMIT};
