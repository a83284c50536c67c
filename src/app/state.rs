// ==========================================
// 采购阶段跟踪系统 - 应用状态
// ==========================================
// 职责: 打开共享连接、建表, 组装仓储与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{DocumentApi, TimelineTemplateApi, TrackingApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection, read_schema_version};
use crate::repository::{
    ActionLogRepository, DocumentRepository, QuotationRepository, TimelineTemplateRepository,
    TrackingRecordRepository,
};

/// 应用状态
///
/// 所有仓储共享同一个连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    pub tracking_api: Arc<TrackingApi>,
    pub document_api: Arc<DocumentApi>,
    pub timeline_api: Arc<TimelineTemplateApi>,

    pub config_manager: Arc<ConfigManager>,
    pub action_log_repo: Arc<ActionLogRepository>,
    pub quotation_repo: Arc<QuotationRepository>,
}

impl AppState {
    /// 按数据库路径创建应用状态 (文件不存在时新建)
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        Self::from_connection(db_path, conn)
    }

    /// 基于已打开的连接创建 (测试使用内存库/临时文件)
    pub fn from_connection(db_path: String, conn: Connection) -> Result<Self, String> {
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        match read_schema_version(&conn) {
            Ok(version) => tracing::debug!(schema_version = ?version, "数据库结构版本"),
            Err(e) => tracing::warn!("schema_version 读取失败(将继续启动): {}", e),
        }
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 仓储层
        // ==========================================
        let tracking_repo = Arc::new(TrackingRecordRepository::new(conn.clone()));
        let document_repo = Arc::new(DocumentRepository::new(conn.clone()));
        let template_repo = Arc::new(TimelineTemplateRepository::new(conn.clone()));
        let quotation_repo = Arc::new(QuotationRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法初始化ConfigManager: {}", e))?,
        );

        // ==========================================
        // API 层
        // ==========================================
        let tracking_api = Arc::new(TrackingApi::new(
            tracking_repo.clone(),
            document_repo.clone(),
            template_repo.clone(),
            quotation_repo.clone(),
            action_log_repo.clone(),
            config_manager.clone(),
        ));
        let document_api = Arc::new(DocumentApi::new(document_repo, tracking_repo.clone()));
        let timeline_api = Arc::new(TimelineTemplateApi::new(template_repo, tracking_repo));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            tracking_api,
            document_api,
            timeline_api,
            config_manager,
            action_log_repo,
            quotation_repo,
        })
    }

    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// 优先取环境变量 PROCUREMENT_TRACKER_DB_PATH, 否则使用用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("PROCUREMENT_TRACKER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./procurement_tracker.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("procurement-tracker");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("procurement_tracker.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_from_in_memory_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::from_connection(":memory:".to_string(), conn).unwrap();

        assert_eq!(state.get_db_path(), ":memory:");
        assert!(state.tracking_api.list_at_risk().unwrap().is_empty());
        assert!(state.timeline_api.list_templates().unwrap().is_empty());
    }
}
