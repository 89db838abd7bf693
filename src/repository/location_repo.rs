// ==========================================
// WareWise 仓库异常检测 - 登记库位仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 唯一约束: (code, warehouse_id)，编码与仓库 ID 统一大写存储
// 软删除: is_active = 0
// ==========================================

use crate::domain::location::Location;
use crate::domain::types::LocationType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const UPSERT_SQL: &str = r#"
    INSERT INTO location (
        code, warehouse_id, location_type, capacity, zone,
        aisle_number, rack_number, position_number, level, is_active, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, datetime('now'))
    ON CONFLICT(code, warehouse_id) DO UPDATE SET
        location_type = excluded.location_type,
        capacity = excluded.capacity,
        zone = excluded.zone,
        aisle_number = excluded.aisle_number,
        rack_number = excluded.rack_number,
        position_number = excluded.position_number,
        level = excluded.level,
        is_active = excluded.is_active,
        updated_at = datetime('now')
"#;

const SELECT_COLUMNS: &str = r#"
    code, warehouse_id, location_type, capacity, zone,
    aisle_number, rack_number, position_number, level, is_active
"#;

// ==========================================
// LocationRepository - 登记库位仓储
// ==========================================
pub struct LocationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LocationRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或更新库位
    pub fn upsert(&self, location: &Location) -> RepositoryResult<()> {
        validate(location)?;
        let conn = self.get_conn()?;
        execute_upsert(&conn, location)?;
        Ok(())
    }

    /// 批量新增或更新（单事务）
    ///
    /// # 返回
    /// - Ok(usize): 写入条数
    pub fn bulk_upsert(&self, locations: &[Location]) -> RepositoryResult<usize> {
        for location in locations {
            validate(location)?;
        }

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        for location in locations {
            execute_upsert(&tx, location)?;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::info!(count = locations.len(), "库位批量写入完成");
        Ok(locations.len())
    }

    /// 按编码查询（含已停用）
    pub fn find_by_code(
        &self,
        warehouse_id: &str,
        code: &str,
    ) -> RepositoryResult<Option<Location>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM location WHERE warehouse_id = ?1 AND code = ?2",
            SELECT_COLUMNS
        );
        let location = conn
            .query_row(
                &sql,
                params![normalize_key(warehouse_id), normalize_key(code)],
                map_location_row,
            )
            .optional()?;
        Ok(location)
    }

    /// 仓库的启用库位
    pub fn list_by_warehouse(&self, warehouse_id: &str) -> RepositoryResult<Vec<Location>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM location WHERE warehouse_id = ?1 AND is_active = 1 ORDER BY code",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let locations = stmt
            .query_map(params![normalize_key(warehouse_id)], map_location_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(locations)
    }

    /// 软删除
    pub fn deactivate(&self, warehouse_id: &str, code: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE location SET is_active = 0, updated_at = datetime('now')
             WHERE warehouse_id = ?1 AND code = ?2",
            params![normalize_key(warehouse_id), normalize_key(code)],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Location".to_string(),
                id: format!("{}/{}", warehouse_id, code),
            });
        }
        Ok(())
    }
}

fn normalize_key(value: &str) -> String {
    value.trim().to_uppercase()
}

fn validate(location: &Location) -> RepositoryResult<()> {
    if location.code.trim().is_empty() {
        return Err(RepositoryError::FieldValueError {
            field: "code".to_string(),
            message: "库位编码不能为空".to_string(),
        });
    }
    if location.warehouse_id.trim().is_empty() {
        return Err(RepositoryError::FieldValueError {
            field: "warehouse_id".to_string(),
            message: "仓库 ID 不能为空".to_string(),
        });
    }
    if location.capacity == 0 {
        return Err(RepositoryError::FieldValueError {
            field: "capacity".to_string(),
            message: "容量必须 >= 1".to_string(),
        });
    }
    Ok(())
}

fn execute_upsert(conn: &Connection, location: &Location) -> rusqlite::Result<usize> {
    conn.execute(
        UPSERT_SQL,
        params![
            normalize_key(&location.code),
            normalize_key(&location.warehouse_id),
            location.location_type.as_str(),
            location.capacity,
            location.zone.trim().to_uppercase(),
            location.aisle_number,
            location.rack_number,
            location.position_number,
            location.level,
            location.is_active,
        ],
    )
}

fn map_location_row(row: &Row<'_>) -> rusqlite::Result<Location> {
    Ok(Location {
        code: row.get(0)?,
        warehouse_id: row.get(1)?,
        location_type: LocationType::from_str(&row.get::<_, String>(2)?),
        capacity: row.get(3)?,
        zone: row.get(4)?,
        aisle_number: row.get(5)?,
        rack_number: row.get(6)?,
        position_number: row.get(7)?,
        level: row.get(8)?,
        is_active: row.get(9)?,
    })
}
