// ==========================================
// WareWise 仓库异常检测 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 幂等建表（CREATE TABLE IF NOT EXISTS）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

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

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id    TEXT PRIMARY KEY,
    scope_type  TEXT NOT NULL,
    scope_key   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id    TEXT NOT NULL,
    key         TEXT NOT NULL,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS warehouse_template (
    template_id              TEXT PRIMARY KEY,
    name                     TEXT NOT NULL,
    warehouse_id             TEXT,
    num_aisles               INTEGER NOT NULL CHECK (num_aisles >= 1),
    racks_per_aisle          INTEGER NOT NULL CHECK (racks_per_aisle >= 1),
    positions_per_rack       INTEGER NOT NULL CHECK (positions_per_rack >= 1),
    levels_per_position      INTEGER NOT NULL CHECK (levels_per_position >= 1),
    level_names              TEXT NOT NULL,
    default_pallet_capacity  INTEGER NOT NULL DEFAULT 1,
    receiving_areas_json     TEXT NOT NULL DEFAULT '[]',
    staging_areas_json       TEXT NOT NULL DEFAULT '[]',
    dock_areas_json          TEXT NOT NULL DEFAULT '[]',
    location_format_json     TEXT,
    is_active                INTEGER NOT NULL DEFAULT 1,
    created_at               TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_template_warehouse
    ON warehouse_template (warehouse_id, is_active);

CREATE TABLE IF NOT EXISTS location (
    location_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    code             TEXT NOT NULL,
    warehouse_id     TEXT NOT NULL,
    location_type    TEXT NOT NULL,
    capacity         INTEGER NOT NULL DEFAULT 1,
    zone             TEXT NOT NULL DEFAULT 'GENERAL',
    aisle_number     INTEGER,
    rack_number      INTEGER,
    position_number  INTEGER,
    level            TEXT,
    is_active        INTEGER NOT NULL DEFAULT 1,
    updated_at       TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (code, warehouse_id)
);

CREATE TABLE IF NOT EXISTS rule_category (
    category_id   TEXT PRIMARY KEY,
    display_name  TEXT NOT NULL,
    priority      INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS rule (
    rule_id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT NOT NULL UNIQUE,
    category_id      TEXT NOT NULL REFERENCES rule_category (category_id),
    rule_type        TEXT NOT NULL,
    priority         TEXT NOT NULL,
    description      TEXT,
    conditions_json  TEXT NOT NULL DEFAULT '{}',
    parameters_json  TEXT NOT NULL DEFAULT '{}',
    is_active        INTEGER NOT NULL DEFAULT 1,
    is_default       INTEGER NOT NULL DEFAULT 0,
    updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS rule_performance (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    rule_id             INTEGER NOT NULL REFERENCES rule (rule_id) ON DELETE CASCADE,
    analysis_id         TEXT NOT NULL,
    anomalies_detected  INTEGER NOT NULL,
    execution_time_ms   INTEGER NOT NULL,
    success             INTEGER NOT NULL,
    error_message       TEXT,
    recorded_at         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rule_performance_rule
    ON rule_performance (rule_id, recorded_at);
"#;

/// 幂等建表并写入 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    if let Some(v) = read_schema_version(conn)? {
        if v > CURRENT_SCHEMA_VERSION {
            tracing::warn!(
                db_version = v,
                expected = CURRENT_SCHEMA_VERSION,
                "数据库 schema 版本高于当前程序"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('config_scope','config_kv','warehouse_template','location','rule_category','rule','rule_performance')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 7);
    }
}
