// ==========================================
// WareWise 仓库异常检测 - 规则仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 表: rule_category / rule / rule_performance
// ==========================================

use crate::domain::rule::{default_categories, default_rules, Rule, RuleCategory, RulePerformance};
use crate::domain::types::{Priority, RuleType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    rule_id, name, category_id, rule_type, priority, description,
    conditions_json, parameters_json, is_active, is_default
"#;

/// 行映射中间结构（JSON 列在锁外解析）
struct RuleRow {
    rule_id: i64,
    name: String,
    category_id: String,
    rule_type: String,
    priority: String,
    description: Option<String>,
    conditions_json: String,
    parameters_json: String,
    is_active: bool,
    is_default: bool,
}

// ==========================================
// RuleRepository - 规则仓储
// ==========================================
pub struct RuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RuleRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 规则分类 =====

    pub fn upsert_category(&self, category: &RuleCategory) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO rule_category (category_id, display_name, priority) VALUES (?1, ?2, ?3)
             ON CONFLICT(category_id) DO UPDATE SET display_name = excluded.display_name,
                                                    priority = excluded.priority",
            params![category.category_id, category.display_name, category.priority],
        )?;
        Ok(())
    }

    pub fn list_categories(&self) -> RepositoryResult<Vec<RuleCategory>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT category_id, display_name, priority FROM rule_category ORDER BY priority, category_id",
        )?;
        let categories = stmt
            .query_map([], |row| {
                Ok(RuleCategory {
                    category_id: row.get(0)?,
                    display_name: row.get(1)?,
                    priority: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    // ===== 规则 =====

    /// 新增规则，返回 rule_id
    pub fn create(&self, rule: &Rule) -> RepositoryResult<i64> {
        let conditions = serde_json::to_string(&rule.conditions)?;
        let parameters = serde_json::to_string(&rule.parameters)?;

        let conn = self.get_conn()?;
        insert_rule(&conn, rule, &conditions, &parameters)?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(&self, rule_id: i64) -> RepositoryResult<Option<Rule>> {
        let row = {
            let conn = self.get_conn()?;
            let sql = format!("SELECT {} FROM rule WHERE rule_id = ?1", SELECT_COLUMNS);
            let row = conn.query_row(&sql, params![rule_id], map_rule_row).optional()?;
            row
        };
        row.map(decode_rule).transpose()
    }

    /// 全部规则（含停用）
    pub fn list_all(&self) -> RepositoryResult<Vec<Rule>> {
        self.list_where("1 = 1")
    }

    /// 启用规则
    pub fn list_active(&self) -> RepositoryResult<Vec<Rule>> {
        self.list_where("is_active = 1")
    }

    fn list_where(&self, predicate: &str) -> RepositoryResult<Vec<Rule>> {
        let rows = {
            let conn = self.get_conn()?;
            let sql = format!(
                "SELECT {} FROM rule WHERE {} ORDER BY rule_id",
                SELECT_COLUMNS, predicate
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_rule_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        rows.into_iter().map(decode_rule).collect()
    }

    pub fn set_active(&self, rule_id: i64, is_active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE rule SET is_active = ?1, updated_at = datetime('now') WHERE rule_id = ?2",
            params![is_active, rule_id],
        )?;
        ensure_found(affected, rule_id)
    }

    pub fn update_conditions(&self, rule_id: i64, conditions: &Value) -> RepositoryResult<()> {
        let json = serde_json::to_string(conditions)?;
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE rule SET conditions_json = ?1, updated_at = datetime('now') WHERE rule_id = ?2",
            params![json, rule_id],
        )?;
        ensure_found(affected, rule_id)
    }

    /// 写入内置分类与默认规则（按名称幂等）
    ///
    /// # 返回
    /// - Ok(usize): 新写入的规则数
    pub fn seed_default_rules(&self) -> RepositoryResult<usize> {
        let rules = default_rules();
        let mut encoded = Vec::with_capacity(rules.len());
        for rule in &rules {
            encoded.push((
                serde_json::to_string(&rule.conditions)?,
                serde_json::to_string(&rule.parameters)?,
            ));
        }

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        for category in default_categories() {
            tx.execute(
                "INSERT OR IGNORE INTO rule_category (category_id, display_name, priority) VALUES (?1, ?2, ?3)",
                params![category.category_id, category.display_name, category.priority],
            )?;
        }

        let mut inserted = 0;
        for (rule, (conditions, parameters)) in rules.iter().zip(encoded.iter()) {
            let exists: bool = tx
                .query_row("SELECT 1 FROM rule WHERE name = ?1", params![rule.name], |_| Ok(true))
                .optional()?
                .unwrap_or(false);
            if exists {
                continue;
            }
            insert_rule(&tx, rule, conditions, parameters)?;
            inserted += 1;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::info!(inserted, "默认规则初始化完成");
        Ok(inserted)
    }

    // ===== 规则执行统计 =====

    pub fn record_performance(&self, perf: &RulePerformance) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO rule_performance (
                rule_id, analysis_id, anomalies_detected, execution_time_ms,
                success, error_message, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                perf.rule_id,
                perf.analysis_id,
                perf.anomalies_detected as i64,
                perf.execution_time_ms as i64,
                perf.success,
                perf.error_message,
                perf.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 规则执行历史（新 → 旧）
    pub fn list_performance(
        &self,
        rule_id: i64,
        limit: usize,
    ) -> RepositoryResult<Vec<RulePerformance>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT rule_id, analysis_id, anomalies_detected, execution_time_ms,
                   success, error_message, recorded_at
            FROM rule_performance
            WHERE rule_id = ?1
            ORDER BY recorded_at DESC, id DESC
            LIMIT ?2
            "#,
        )?;
        let records = stmt
            .query_map(params![rule_id, limit as i64], |row| {
                let recorded_at: String = row.get(6)?;
                Ok(RulePerformance {
                    rule_id: row.get(0)?,
                    analysis_id: row.get(1)?,
                    anomalies_detected: row.get::<_, i64>(2)?.max(0) as usize,
                    execution_time_ms: row.get::<_, i64>(3)?.max(0) as u64,
                    success: row.get(4)?,
                    error_message: row.get(5)?,
                    recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn insert_rule(
    conn: &Connection,
    rule: &Rule,
    conditions: &str,
    parameters: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO rule (
            name, category_id, rule_type, priority, description,
            conditions_json, parameters_json, is_active, is_default
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            rule.name,
            rule.category_id,
            rule.rule_type.as_str(),
            rule.priority.as_str(),
            rule.description,
            conditions,
            parameters,
            rule.is_active,
            rule.is_default,
        ],
    )
}

fn ensure_found(affected: usize, rule_id: i64) -> RepositoryResult<()> {
    if affected == 0 {
        return Err(RepositoryError::NotFound {
            entity: "Rule".to_string(),
            id: rule_id.to_string(),
        });
    }
    Ok(())
}

fn map_rule_row(row: &Row<'_>) -> rusqlite::Result<RuleRow> {
    Ok(RuleRow {
        rule_id: row.get(0)?,
        name: row.get(1)?,
        category_id: row.get(2)?,
        rule_type: row.get(3)?,
        priority: row.get(4)?,
        description: row.get(5)?,
        conditions_json: row.get(6)?,
        parameters_json: row.get(7)?,
        is_active: row.get(8)?,
        is_default: row.get(9)?,
    })
}

fn decode_rule(row: RuleRow) -> RepositoryResult<Rule> {
    let rule_type =
        RuleType::from_str(&row.rule_type).ok_or_else(|| RepositoryError::FieldValueError {
            field: "rule_type".to_string(),
            message: format!("未知规则类型: {}", row.rule_type),
        })?;
    Ok(Rule {
        rule_id: row.rule_id,
        name: row.name,
        category_id: row.category_id,
        rule_type,
        priority: Priority::from_str(&row.priority),
        description: row.description,
        conditions: serde_json::from_str(&row.conditions_json)?,
        parameters: serde_json::from_str(&row.parameters_json)?,
        is_active: row.is_active,
        is_default: row.is_default,
    })
}
