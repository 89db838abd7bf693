// ==========================================
// WareWise 仓库异常检测 - 仓库模板仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 存储: 特殊区域与编码格式以 JSON 列保存
// ==========================================

use crate::domain::warehouse::{LocationFormatConfig, SpecialArea, WarehouseTemplate};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::template_resolver::TemplateStore;
use crate::monitoring::log_database_error;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    template_id, name, warehouse_id,
    num_aisles, racks_per_aisle, positions_per_rack, levels_per_position,
    level_names, default_pallet_capacity,
    receiving_areas_json, staging_areas_json, dock_areas_json, location_format_json,
    is_active, created_at
"#;

/// 行映射中间结构（JSON 列在锁外解析）
struct TemplateRow {
    template: WarehouseTemplate,
    receiving_json: String,
    staging_json: String,
    dock_json: String,
    format_json: Option<String>,
}

// ==========================================
// TemplateRepository - 仓库模板仓储
// ==========================================
pub struct TemplateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TemplateRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建模板
    pub fn create(&self, template: &WarehouseTemplate) -> RepositoryResult<()> {
        let receiving = serde_json::to_string(&template.receiving_areas)?;
        let staging = serde_json::to_string(&template.staging_areas)?;
        let dock = serde_json::to_string(&template.dock_areas)?;
        let format = template
            .location_format
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO warehouse_template (
                template_id, name, warehouse_id,
                num_aisles, racks_per_aisle, positions_per_rack, levels_per_position,
                level_names, default_pallet_capacity,
                receiving_areas_json, staging_areas_json, dock_areas_json, location_format_json,
                is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                template.template_id,
                template.name,
                template.warehouse_id.as_ref().map(|w| w.trim().to_uppercase()),
                template.num_aisles,
                template.racks_per_aisle,
                template.positions_per_rack,
                template.levels_per_position,
                template.level_names,
                template.default_pallet_capacity,
                receiving,
                staging,
                dock,
                format,
                template.is_active,
                template.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 按主键查询
    pub fn find_by_id(&self, template_id: &str) -> RepositoryResult<Option<WarehouseTemplate>> {
        let row = {
            let conn = self.get_conn()?;
            let sql = format!(
                "SELECT {} FROM warehouse_template WHERE template_id = ?1",
                SELECT_COLUMNS
            );
            let row = conn
                .query_row(&sql, params![template_id], map_template_row)
                .optional()?;
            row
        };
        row.map(decode_template).transpose()
    }

    /// 查询仓库当前启用的模板（多个时取最新创建）
    pub fn find_active_for_warehouse(
        &self,
        warehouse_id: &str,
    ) -> RepositoryResult<Option<WarehouseTemplate>> {
        let row = {
            let conn = self.get_conn()?;
            let sql = format!(
                "SELECT {} FROM warehouse_template
                 WHERE warehouse_id = ?1 AND is_active = 1
                 ORDER BY created_at DESC LIMIT 1",
                SELECT_COLUMNS
            );
            let row = conn
                .query_row(&sql, params![warehouse_id.trim().to_uppercase()], map_template_row)
                .optional()?;
            row
        };
        row.map(decode_template).transpose()
    }

    /// 全部启用模板
    pub fn list_active(&self) -> RepositoryResult<Vec<WarehouseTemplate>> {
        let rows = {
            let conn = self.get_conn()?;
            let sql = format!(
                "SELECT {} FROM warehouse_template WHERE is_active = 1 ORDER BY template_id",
                SELECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_template_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        rows.into_iter().map(decode_template).collect()
    }

    /// 将模板绑定到仓库（同仓库其他模板停用）
    pub fn assign_to_warehouse(
        &self,
        template_id: &str,
        warehouse_id: &str,
    ) -> RepositoryResult<()> {
        let warehouse_id = warehouse_id.trim().to_uppercase();
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM warehouse_template WHERE template_id = ?1",
                params![template_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(RepositoryError::NotFound {
                entity: "WarehouseTemplate".to_string(),
                id: template_id.to_string(),
            });
        }

        tx.execute(
            "UPDATE warehouse_template SET is_active = 0 WHERE warehouse_id = ?1 AND template_id <> ?2",
            params![warehouse_id, template_id],
        )?;
        tx.execute(
            "UPDATE warehouse_template SET warehouse_id = ?1, is_active = 1 WHERE template_id = ?2",
            params![warehouse_id, template_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// 停用模板
    pub fn deactivate(&self, template_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE warehouse_template SET is_active = 0 WHERE template_id = ?1",
            params![template_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "WarehouseTemplate".to_string(),
                id: template_id.to_string(),
            });
        }
        Ok(())
    }
}

// ==========================================
// TemplateStore 实现（模板解析链的数据库层）
// ==========================================
impl TemplateStore for TemplateRepository {
    fn find_active_for_warehouse(
        &self,
        warehouse_id: &str,
    ) -> EngineResult<Option<WarehouseTemplate>> {
        TemplateRepository::find_active_for_warehouse(self, warehouse_id).map_err(|e| {
            log_database_error("template_repo.find_active_for_warehouse", &e);
            EngineError::TemplateStoreError(e.to_string())
        })
    }
}

fn map_template_row(row: &Row<'_>) -> rusqlite::Result<TemplateRow> {
    let created_at: String = row.get(14)?;
    let template = WarehouseTemplate {
        template_id: row.get(0)?,
        name: row.get(1)?,
        warehouse_id: row.get(2)?,
        num_aisles: row.get(3)?,
        racks_per_aisle: row.get(4)?,
        positions_per_rack: row.get(5)?,
        levels_per_position: row.get(6)?,
        level_names: row.get(7)?,
        default_pallet_capacity: row.get(8)?,
        receiving_areas: Vec::new(),
        staging_areas: Vec::new(),
        dock_areas: Vec::new(),
        location_format: None,
        is_active: row.get(13)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    };
    Ok(TemplateRow {
        template,
        receiving_json: row.get(9)?,
        staging_json: row.get(10)?,
        dock_json: row.get(11)?,
        format_json: row.get(12)?,
    })
}

fn decode_template(row: TemplateRow) -> RepositoryResult<WarehouseTemplate> {
    let mut template = row.template;
    template.receiving_areas = serde_json::from_str::<Vec<SpecialArea>>(&row.receiving_json)?;
    template.staging_areas = serde_json::from_str::<Vec<SpecialArea>>(&row.staging_json)?;
    template.dock_areas = serde_json::from_str::<Vec<SpecialArea>>(&row.dock_json)?;
    template.location_format = row
        .format_json
        .as_deref()
        .map(serde_json::from_str::<LocationFormatConfig>)
        .transpose()?;
    Ok(template)
}
