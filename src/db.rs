// ==========================================
// 采购阶段跟踪系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout, 减少并发写入时的偶发 busy 错误
// - 提供幂等建表 (init_schema)
// ==========================================

use chrono::{NaiveDateTime, SubsecRound};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 日期 / 时间存储格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 当前本地时间 (截断到秒, 与 DATETIME_FORMAT 精度一致)
pub fn now_local() -> NaiveDateTime {
    chrono::Local::now().naive_local().trunc_subsecs(0)
}

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表 (幂等)
///
/// 报价单/报价行表由外部报价模块写入, 这里建表只为独立部署和测试
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT,
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS quotation (
            quotation_id TEXT PRIMARY KEY,
            project_id TEXT,
            purchase_type TEXT NOT NULL,
            quote_date TEXT,
            approved INTEGER NOT NULL DEFAULT 0,
            all_items_approved INTEGER NOT NULL DEFAULT 0,
            partially_approved INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS quotation_line (
            line_id TEXT PRIMARY KEY,
            quotation_id TEXT NOT NULL REFERENCES quotation(quotation_id),
            sku TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            quantity REAL NOT NULL DEFAULT 0,
            origin_country TEXT,
            transport_mode TEXT,
            supplier_name TEXT,
            unit_price REAL,
            total_price REAL,
            discount_price REAL,
            price_selected INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS tracking_record (
            record_id TEXT PRIMARY KEY,
            quotation_id TEXT NOT NULL,
            line_id TEXT NOT NULL UNIQUE,
            project_id TEXT,
            sku TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            quantity REAL NOT NULL DEFAULT 0,
            origin_country TEXT,
            transport_mode TEXT,
            purchase_type TEXT NOT NULL,
            incoterm TEXT,
            supplier_name TEXT,
            unit_price REAL,
            total_price REAL,
            discount_price REAL,
            criticality_score INTEGER NOT NULL DEFAULT 3,
            criticality_level TEXT NOT NULL DEFAULT 'LOW',
            delay_days INTEGER NOT NULL DEFAULT 0,
            general_status TEXT NOT NULL DEFAULT 'ON_TRACK',
            approved INTEGER NOT NULL DEFAULT 0,
            approved_at TEXT,
            approved_by TEXT,
            approval_notes TEXT,
            rejected INTEGER NOT NULL DEFAULT 0,
            rejected_at TEXT,
            rejected_by TEXT,
            rejection_reason TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tracking_record_quotation ON tracking_record(quotation_id);
        CREATE INDEX IF NOT EXISTS idx_tracking_record_sku ON tracking_record(sku);

        CREATE TABLE IF NOT EXISTS tracking_stage (
            record_id TEXT NOT NULL REFERENCES tracking_record(record_id),
            stage TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            actual_date TEXT,
            deadline TEXT,
            evidence_ref TEXT,
            PRIMARY KEY (record_id, stage)
        );

        CREATE TABLE IF NOT EXISTS timeline_template (
            sku TEXT PRIMARY KEY,
            total_days INTEGER NOT NULL DEFAULT 0,
            updated_by TEXT,
            updated_at TEXT
        );

        CREATE TABLE IF NOT EXISTS timeline_template_offset (
            sku TEXT NOT NULL REFERENCES timeline_template(sku) ON DELETE CASCADE,
            offset_key TEXT NOT NULL,
            days INTEGER,
            PRIMARY KEY (sku, offset_key)
        );

        CREATE TABLE IF NOT EXISTS required_document (
            document_id TEXT PRIMARY KEY,
            stage TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            mandatory INTEGER NOT NULL DEFAULT 1,
            display_order INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS attached_document (
            attachment_id TEXT PRIMARY KEY,
            record_id TEXT NOT NULL REFERENCES tracking_record(record_id),
            stage TEXT NOT NULL,
            required_document_id TEXT,
            file_name TEXT,
            storage_ref TEXT,
            mime_type TEXT,
            size_bytes INTEGER,
            not_applicable INTEGER NOT NULL DEFAULT 0,
            uploaded_by TEXT NOT NULL,
            uploaded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_attached_document_record ON attached_document(record_id, stage);

        CREATE TABLE IF NOT EXISTS not_applicable_justification (
            record_id TEXT NOT NULL REFERENCES tracking_record(record_id),
            stage TEXT NOT NULL,
            justification TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (record_id, stage)
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            record_id TEXT,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_record ON action_log(record_id, action_ts);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
