// ==========================================
// 采购阶段跟踪系统 - 主入口
// ==========================================
// 职责: 打开数据库, 可选补建已批准报价的跟踪记录, 输出风险清单
// 用法: procurement-tracker [--sync]
// ==========================================

use anyhow::Context;
use procurement_tracker::app::{get_default_db_path, AppState};
use procurement_tracker::domain::{Caller, CallerRole};

fn main() -> anyhow::Result<()> {
    procurement_tracker::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", procurement_tracker::APP_NAME);
    tracing::info!("系统版本: {}", procurement_tracker::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let app_state = AppState::new(db_path)
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    if std::env::args().any(|arg| arg == "--sync") {
        let system = Caller::new("system", CallerRole::Admin);
        let summary = app_state
            .tracking_api
            .sync_approved_quotations(&system)
            .context("批量同步失败")?;
        tracing::info!(
            created = summary.created,
            skipped = summary.skipped,
            failed = summary.failed,
            "已批准报价同步完成"
        );
    }

    let at_risk = app_state
        .tracking_api
        .list_at_risk()
        .context("风险清单查询失败")?;

    tracing::info!("风险记录: {} 条", at_risk.len());
    for item in &at_risk {
        tracing::info!(
            record_id = %item.record_id,
            sku = %item.sku,
            stage = %item.current_stage_label,
            delay_days = item.delay_days,
            level = %item.criticality_level,
            "风险记录"
        );
    }

    Ok(())
}
