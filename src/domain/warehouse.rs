// ==========================================
// WareWise 仓库异常检测 - 仓库模板实体
// ==========================================
// 职责: 仓库结构参数 (通道 × 货架 × 储位 × 层) + 特殊区域定义
// 存储: warehouse_template 表 (特殊区域以 JSON 存储)
// ==========================================

use crate::domain::types::{LocationFormatKind, LocationType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 默认温区
pub const DEFAULT_ZONE: &str = "GENERAL";

// ==========================================
// SpecialArea - 特殊区域 (收货/暂存/月台)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialArea {
    pub code: String,
    pub area_type: LocationType,
    pub capacity: u32,
    #[serde(default = "default_zone")]
    pub zone: String,
}

fn default_zone() -> String {
    DEFAULT_ZONE.to_string()
}

impl SpecialArea {
    pub fn new(code: &str, area_type: LocationType, capacity: u32) -> Self {
        Self {
            code: code.to_string(),
            area_type,
            capacity,
            zone: DEFAULT_ZONE.to_string(),
        }
    }

    pub fn with_zone(mut self, zone: &str) -> Self {
        self.zone = zone.to_uppercase();
        self
    }
}

// ==========================================
// LocationFormatConfig - 库位编码格式 (由格式探测生成)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFormatConfig {
    pub kind: LocationFormatKind,
    /// 正则源码（锚定）
    pub pattern: String,
    pub examples: Vec<String>,
    pub confidence: f64,
}

// ==========================================
// WarehouseTemplate - 仓库结构模板
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseTemplate {
    pub template_id: String,
    pub name: String,
    /// 绑定的仓库（未绑定时为 None）
    pub warehouse_id: Option<String>,

    // ===== 结构参数 =====
    pub num_aisles: u32,
    pub racks_per_aisle: u32,
    pub positions_per_rack: u32,
    pub levels_per_position: u32,
    /// 层名，每个字符一层（如 "ABCD"）
    pub level_names: String,
    pub default_pallet_capacity: u32,

    // ===== 特殊区域 =====
    pub receiving_areas: Vec<SpecialArea>,
    pub staging_areas: Vec<SpecialArea>,
    pub dock_areas: Vec<SpecialArea>,

    pub location_format: Option<LocationFormatConfig>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl WarehouseTemplate {
    /// 创建空特殊区域的模板
    pub fn new(
        template_id: &str,
        name: &str,
        num_aisles: u32,
        racks_per_aisle: u32,
        positions_per_rack: u32,
        levels_per_position: u32,
    ) -> Self {
        Self {
            template_id: template_id.to_string(),
            name: name.to_string(),
            warehouse_id: None,
            num_aisles,
            racks_per_aisle,
            positions_per_rack,
            levels_per_position,
            level_names: "ABCDEFGHIJKLMNOPQRSTUVWXYZ"
                .chars()
                .take(levels_per_position as usize)
                .collect(),
            default_pallet_capacity: 1,
            receiving_areas: Vec::new(),
            staging_areas: Vec::new(),
            dock_areas: Vec::new(),
            location_format: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// 结构约束校验
    ///
    /// # 规则
    /// - 所有结构参数 >= 1
    /// - level_names 长度 >= levels_per_position
    /// - default_pallet_capacity >= 1
    /// - 特殊区域编码非空
    ///
    /// # 返回
    /// - Ok(()): 通过
    /// - Err(Vec<String>): 违反项说明
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.template_id.trim().is_empty() {
            errors.push("template_id 不能为空".to_string());
        }
        for (field, value) in [
            ("num_aisles", self.num_aisles),
            ("racks_per_aisle", self.racks_per_aisle),
            ("positions_per_rack", self.positions_per_rack),
            ("levels_per_position", self.levels_per_position),
            ("default_pallet_capacity", self.default_pallet_capacity),
        ] {
            if value == 0 {
                errors.push(format!("{} 必须 >= 1", field));
            }
        }
        if (self.level_names.chars().count() as u32) < self.levels_per_position {
            errors.push(format!(
                "level_names '{}' 不足 {} 层",
                self.level_names, self.levels_per_position
            ));
        }
        for area in self.special_areas() {
            if area.code.trim().is_empty() {
                errors.push(format!("{} 区域编码为空", area.area_type));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// 所有特殊区域（收货 → 暂存 → 月台）
    pub fn special_areas(&self) -> impl Iterator<Item = &SpecialArea> {
        self.receiving_areas
            .iter()
            .chain(self.staging_areas.iter())
            .chain(self.dock_areas.iter())
    }

    /// 有效层名（截取到 levels_per_position）
    pub fn active_levels(&self) -> Vec<char> {
        self.level_names
            .chars()
            .map(|c| c.to_ascii_uppercase())
            .take(self.levels_per_position as usize)
            .collect()
    }

    /// 货架存储位总数
    pub fn total_storage_locations(&self) -> u64 {
        (self.num_aisles as u64)
            .saturating_mul(self.racks_per_aisle as u64)
            .saturating_mul(self.positions_per_rack as u64)
            .saturating_mul(self.levels_per_position as u64)
    }

    /// 总容量（存储位容量 + 特殊区域容量）
    pub fn total_capacity(&self) -> u64 {
        let special: u64 = self.special_areas().map(|a| a.capacity as u64).sum();
        self.total_storage_locations()
            .saturating_mul(self.default_pallet_capacity as u64)
            .saturating_add(special)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_capacity() {
        let mut t = WarehouseTemplate::new("T1", "test", 2, 2, 10, 4);
        t.receiving_areas.push(SpecialArea::new("RECV-01", LocationType::Receiving, 10));
        assert_eq!(t.total_storage_locations(), 160);
        assert_eq!(t.total_capacity(), 170);
        assert_eq!(t.active_levels(), vec!['A', 'B', 'C', 'D']);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_template_validate_rejects_zero_dimensions() {
        let mut t = WarehouseTemplate::new("T1", "test", 0, 2, 10, 4);
        t.level_names = "AB".to_string();
        let errors = t.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("num_aisles")));
        assert!(errors.iter().any(|e| e.contains("level_names")));
    }
}
