// ==========================================
// 采购阶段跟踪系统 - 跟踪记录数据仓储
// ==========================================
// 表: tracking_record (主表) + tracking_stage (每阶段一行)
// 红线:
// - 记录不做物理删除
// - 写记录与写审计日志在同一事务内完成
// - 更新带 revision 乐观锁
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::TrackingRecordRepository;
