// ==========================================
// 采购阶段跟踪系统 - 操作日志数据仓储
// ==========================================
// 红线: 所有写入必须记录
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
