// ==========================================
// 采购阶段跟踪系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::engine::transition::DEFAULT_REJECTION_REASON_MIN_LEN;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 风险清单默认上限
pub const DEFAULT_AT_RISK_LIMIT: usize = 500;

// ==========================================
// TrackingConfig - 跟踪规则配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub rejection_reason_min_len: usize,
    pub cif_auto_complete: bool,
    pub at_risk_limit: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            rejection_reason_min_len: DEFAULT_REJECTION_REASON_MIN_LEN,
            cif_auto_complete: true,
            at_risk_limit: DEFAULT_AT_RISK_LIMIT,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 跟踪规则配置 =====

    /// 驳回原因最小长度 (默认 10)
    pub fn get_rejection_reason_min_len(&self) -> Result<usize, Box<dyn Error>> {
        let default = DEFAULT_REJECTION_REASON_MIN_LEN.to_string();
        let value = self.get_config_or_default(config_keys::REJECTION_REASON_MIN_LEN, &default)?;
        Ok(value.trim().parse::<usize>().unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::REJECTION_REASON_MIN_LEN,
                raw_value = %value,
                "配置格式错误，使用默认值"
            );
            DEFAULT_REJECTION_REASON_MIN_LEN
        }))
    }

    /// 进入 FOB 且交货条款为 CIF 时是否自动完成国际运费报价阶段 (默认 true)
    pub fn get_cif_auto_complete(&self) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::CIF_AUTO_COMPLETE, "true")?;
        Ok(!matches!(
            value.trim().to_lowercase().as_str(),
            "false" | "0" | "no" | "off"
        ))
    }

    /// 风险清单上限 (默认 500)
    pub fn get_at_risk_limit(&self) -> Result<usize, Box<dyn Error>> {
        let default = DEFAULT_AT_RISK_LIMIT.to_string();
        let value = self.get_config_or_default(config_keys::AT_RISK_LIMIT, &default)?;
        Ok(value.trim().parse::<usize>().unwrap_or(DEFAULT_AT_RISK_LIMIT))
    }

    /// 一次读取全部跟踪规则配置
    pub fn load_tracking_config(&self) -> Result<TrackingConfig, Box<dyn Error>> {
        Ok(TrackingConfig {
            rejection_reason_min_len: self.get_rejection_reason_min_len()?,
            cif_auto_complete: self.get_cif_auto_complete()?,
            at_risk_limit: self.get_at_risk_limit()?,
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 驳回
    pub const REJECTION_REASON_MIN_LEN: &str = "tracking/rejection_reason_min_len";

    // 交货条款
    pub const CIF_AUTO_COMPLETE: &str = "tracking/cif_auto_complete";

    // 风险清单
    pub const AT_RISK_LIMIT: &str = "tracking/at_risk_limit";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = manager().load_tracking_config().unwrap();
        assert_eq!(config, TrackingConfig::default());
        assert_eq!(config.rejection_reason_min_len, 10);
        assert!(config.cif_auto_complete);
        assert_eq!(config.at_risk_limit, 500);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let manager = manager();
        manager
            .set_global_config_value(config_keys::REJECTION_REASON_MIN_LEN, "20")
            .unwrap();
        manager
            .set_global_config_value(config_keys::CIF_AUTO_COMPLETE, "false")
            .unwrap();
        manager
            .set_global_config_value(config_keys::AT_RISK_LIMIT, "muchos")
            .unwrap();

        let config = manager.load_tracking_config().unwrap();
        assert_eq!(config.rejection_reason_min_len, 20);
        assert!(!config.cif_auto_complete);
        assert_eq!(config.at_risk_limit, DEFAULT_AT_RISK_LIMIT);

        let snapshot: HashMap<String, String> =
            serde_json::from_str(&manager.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.len(), 3);
    }
}
