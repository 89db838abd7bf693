// ==========================================
// WareWise 仓库异常检测 - 库位实体
// ==========================================
// 唯一约束: (code, warehouse_id)
// 软删除: is_active = false
// ==========================================

use crate::domain::types::LocationType;
use serde::{Deserialize, Serialize};

// ==========================================
// Location - 登记库位
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub code: String,
    pub warehouse_id: String,
    pub location_type: LocationType,
    pub capacity: u32,
    pub zone: String,

    // 层级坐标（可选）
    pub aisle_number: Option<u32>,
    pub rack_number: Option<u32>,
    pub position_number: Option<u32>,
    pub level: Option<String>,

    pub is_active: bool,
}

impl Location {
    pub fn new(code: &str, warehouse_id: &str, location_type: LocationType, capacity: u32) -> Self {
        Self {
            code: code.to_string(),
            warehouse_id: warehouse_id.to_string(),
            location_type,
            capacity,
            zone: crate::domain::warehouse::DEFAULT_ZONE.to_string(),
            aisle_number: None,
            rack_number: None,
            position_number: None,
            level: None,
            is_active: true,
        }
    }
}

// ==========================================
// VirtualLocation - 由模板推算出的库位属性
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualLocation {
    pub code: String,
    pub location_type: LocationType,
    pub capacity: u32,
    pub zone: String,
    pub aisle: Option<u32>,
    pub rack: Option<u32>,
    pub position: Option<u32>,
    pub level: Option<char>,
}

// ==========================================
// LocationValidation - 库位校验结果
// ==========================================
// 无效时 reason 必须说明违反的边界
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationValidation {
    pub code: String,
    pub is_valid: bool,
    pub reason: String,
}

impl LocationValidation {
    pub fn valid(code: &str, reason: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            is_valid: true,
            reason: reason.into(),
        }
    }

    pub fn invalid(code: &str, reason: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            is_valid: false,
            reason: reason.into(),
        }
    }
}
