// ==========================================
// WareWise 仓库异常检测 - 登记库位 API
// ==========================================
// 职责: 登记库位维护（覆盖模板推算的类型/容量/温区）
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::location::Location;
use crate::repository::location_repo::LocationRepository;

pub struct LocationApi {
    location_repo: Arc<LocationRepository>,
}

impl LocationApi {
    pub fn new(location_repo: Arc<LocationRepository>) -> Self {
        Self { location_repo }
    }

    pub fn upsert_location(&self, location: &Location) -> ApiResult<()> {
        self.location_repo.upsert(location)?;
        tracing::info!(
            warehouse_id = %location.warehouse_id,
            code = %location.code,
            location_type = %location.location_type,
            "库位已登记"
        );
        Ok(())
    }

    /// 批量登记（单事务，任一条校验失败整体不写入）
    pub fn import_locations(&self, locations: &[Location]) -> ApiResult<usize> {
        if locations.is_empty() {
            return Err(ApiError::InvalidInput("库位列表为空".to_string()));
        }
        Ok(self.location_repo.bulk_upsert(locations)?)
    }

    pub fn get_location(&self, warehouse_id: &str, code: &str) -> ApiResult<Location> {
        self.location_repo
            .find_by_code(warehouse_id, code)?
            .ok_or_else(|| ApiError::NotFound(format!("库位 {}/{} 不存在", warehouse_id, code)))
    }

    /// 仓库的启用库位
    pub fn list_locations(&self, warehouse_id: &str) -> ApiResult<Vec<Location>> {
        if warehouse_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("仓库 ID 不能为空".to_string()));
        }
        Ok(self.location_repo.list_by_warehouse(warehouse_id)?)
    }

    pub fn deactivate_location(&self, warehouse_id: &str, code: &str) -> ApiResult<()> {
        self.location_repo.deactivate(warehouse_id, code)?;
        tracing::info!(warehouse_id, code, "库位已停用");
        Ok(())
    }
}
