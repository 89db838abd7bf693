// ==========================================
// WareWise 仓库异常检测 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (scope_id + key → value)
// 作用域: global / warehouse/{warehouse_id}（仓库级优先，缺失回落 global）
// ==========================================

use crate::config::analysis_config_trait::AnalysisConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

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
    /// - db_path: 数据库文件路径（需已执行 ensure_schema）
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

    /// 读取指定作用域的配置值
    fn get_scoped_value(
        &self,
        scope: &ConfigScope,
        key: &str,
    ) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![scope.scope_id(), key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_scoped_value(&ConfigScope::Global, key)
    }

    /// 读取仓库级配置（缺失时回落 global）
    pub fn get_warehouse_config_value(
        &self,
        warehouse_id: &str,
        key: &str,
    ) -> Result<Option<String>, Box<dyn Error>> {
        let scope = ConfigScope::Warehouse {
            warehouse_id: warehouse_id.trim().to_uppercase(),
        };
        match self.get_scoped_value(&scope, key)? {
            Some(v) => Ok(Some(v)),
            None => self.get_global_config_value(key),
        }
    }

    /// 写入配置（UPSERT）
    pub fn set_config_value(
        &self,
        scope: &ConfigScope,
        key: &str,
        value: &str,
    ) -> Result<(), Box<dyn Error>> {
        let key = key.trim();
        if key.is_empty() {
            return Err("配置键不能为空".into());
        }

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_scope (scope_id, scope_type, scope_key) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id) DO NOTHING",
            params![scope.scope_id(), scope.scope_type(), scope.scope_key()],
        )?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![scope.scope_id(), key, value],
        )?;

        tracing::info!(scope = %scope.scope_id(), key, value, "配置已更新");
        Ok(())
    }

    /// 读取并解析 global 配置；缺失或无法解析时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy,
    {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(config_key = key, raw_value = %raw, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }

    /// 0~1 比例配置（越界时返回默认值）
    fn get_ratio_or_default(&self, key: &str, default: f64) -> Result<f64, Box<dyn Error>> {
        let value = self.get_parsed_or_default(key, default)?;
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            tracing::warn!(config_key = key, value, "配置值超出 [0, 1]，使用默认值");
            Ok(default)
        }
    }

    /// 获取 global 配置快照（JSON）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复 global 配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    pub fn restore_config_from_snapshot(
        &self,
        snapshot_json: &str,
    ) -> Result<usize, Box<dyn Error>> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;
        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value, updated_at)
                 VALUES ('global', ?1, ?2, datetime('now'))
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
                params![key, value],
            )?;
        }
        tx.commit()?;

        Ok(count)
    }
}

// ==========================================
// AnalysisConfigReader Trait 实现
// ==========================================
#[async_trait]
impl AnalysisConfigReader for ConfigManager {
    async fn get_template_cache_ttl_secs(&self) -> Result<u64, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::TEMPLATE_CACHE_TTL_SECS, 300)
    }

    async fn get_pattern_cache_ttl_secs(&self) -> Result<u64, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::PATTERN_CACHE_TTL_SECS, 300)
    }

    async fn get_default_stagnant_hours(&self) -> Result<f64, Box<dyn Error>> {
        let hours = self.get_parsed_or_default(config_keys::DEFAULT_STAGNANT_HOURS, 10.0)?;
        if hours > 0.0 {
            Ok(hours)
        } else {
            Ok(10.0)
        }
    }

    async fn get_column_match_threshold(&self) -> Result<f64, Box<dyn Error>> {
        self.get_ratio_or_default(config_keys::COLUMN_MATCH_THRESHOLD, 0.7)
    }

    async fn get_classifier_min_confidence(&self) -> Result<f64, Box<dyn Error>> {
        self.get_ratio_or_default(config_keys::CLASSIFIER_MIN_CONFIDENCE, 0.5)
    }

    async fn get_monitor_buffer_size(&self) -> Result<usize, Box<dyn Error>> {
        let size = self.get_parsed_or_default(config_keys::MONITOR_BUFFER_SIZE, 1000usize)?;
        Ok(size.max(1))
    }

    async fn get_monitor_retention_hours(&self) -> Result<u64, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::MONITOR_RETENTION_HOURS, 24)
    }
}

// ==========================================
// ConfigScope - 配置作用域
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigScope {
    Global,                            // 全局
    Warehouse { warehouse_id: String }, // 仓库
}

impl ConfigScope {
    pub fn scope_id(&self) -> String {
        match self {
            ConfigScope::Global => "global".to_string(),
            ConfigScope::Warehouse { warehouse_id } => format!("warehouse/{}", warehouse_id),
        }
    }

    fn scope_type(&self) -> &'static str {
        match self {
            ConfigScope::Global => "GLOBAL",
            ConfigScope::Warehouse { .. } => "WAREHOUSE",
        }
    }

    fn scope_key(&self) -> &str {
        match self {
            ConfigScope::Global => "global",
            ConfigScope::Warehouse { warehouse_id } => warehouse_id,
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 缓存
    pub const TEMPLATE_CACHE_TTL_SECS: &str = "template_cache_ttl_secs";
    pub const PATTERN_CACHE_TTL_SECS: &str = "pattern_cache_ttl_secs";

    // 规则默认值
    pub const DEFAULT_STAGNANT_HOURS: &str = "default_stagnant_hours";

    // 导入与分类
    pub const COLUMN_MATCH_THRESHOLD: &str = "column_match_threshold";
    pub const CLASSIFIER_MIN_CONFIDENCE: &str = "classifier_min_confidence";

    // 监控
    pub const MONITOR_BUFFER_SIZE: &str = "monitor_buffer_size";
    pub const MONITOR_RETENTION_HOURS: &str = "monitor_retention_hours";
}
