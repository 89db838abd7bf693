// ==========================================
// WareWise 仓库异常检测 - 虚拟库位引擎
// ==========================================
// 职责: 基于仓库模板参数，以闭式区间校验代替库位查表
// 红线: 无数据库访问；所有无效判定必须输出 reason
// ==========================================

use crate::domain::location::{LocationValidation, VirtualLocation};
use crate::domain::types::LocationType;
use crate::domain::warehouse::{SpecialArea, WarehouseTemplate, DEFAULT_ZONE};
use crate::engine::location_code::{self, LevelRef, ParsedLocationCode};
use serde::Serialize;
use std::collections::HashMap;

/// 通道过渡区默认容量
pub const AISLE_DEFAULT_CAPACITY: u32 = 10;

// ==========================================
// TemplateSummary - 模板容量汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub template_id: String,
    pub storage_locations: u64,
    pub receiving_areas: usize,
    pub staging_areas: usize,
    pub dock_areas: usize,
    pub total_capacity: u64,
}

// ==========================================
// VirtualLocationEngine
// ==========================================
pub struct VirtualLocationEngine {
    template: WarehouseTemplate,
    levels: Vec<char>,
    /// special_key → 区域
    special_index: HashMap<String, SpecialArea>,
}

impl VirtualLocationEngine {
    pub fn new(template: WarehouseTemplate) -> Self {
        let levels = template.active_levels();
        let special_index = template
            .special_areas()
            .map(|area| (location_code::special_key(&area.code), area.clone()))
            .collect();

        tracing::debug!(
            template_id = %template.template_id,
            aisles = template.num_aisles,
            racks = template.racks_per_aisle,
            positions = template.positions_per_rack,
            levels = template.levels_per_position,
            "虚拟库位引擎已构建"
        );

        Self {
            template,
            levels,
            special_index,
        }
    }

    pub fn template(&self) -> &WarehouseTemplate {
        &self.template
    }

    /// 校验库位编码
    ///
    /// # 规则
    /// 1. 空编码 → 无效
    /// 2. 模板特殊区域（按 special_key 比较）→ 有效
    /// 3. AISLE-NN → 1 <= NN <= num_aisles
    /// 4. 层级/显式编码 → 通道、货架、储位、层逐项区间校验
    /// 5. 连续储位编码 → 1 <= position <= 通道×货架×储位，层有效
    /// 6. 其他 → 无效（无法识别的格式）
    pub fn validate_location(&self, code: &str) -> LocationValidation {
        let normalized = location_code::normalize(code);
        if normalized.is_empty() {
            return LocationValidation::invalid(code, "empty location code");
        }

        if let Some(area) = self.special_index.get(&location_code::special_key(&normalized)) {
            return LocationValidation::valid(
                code,
                format!("special area {} ({})", area.code, area.area_type),
            );
        }

        if let Some(aisle) = location_code::aisle_number(&normalized) {
            return if aisle >= 1 && aisle <= self.template.num_aisles {
                LocationValidation::valid(code, format!("aisle {} transitional area", aisle))
            } else {
                LocationValidation::invalid(
                    code,
                    format!(
                        "aisle {} exceeds template maximum {}",
                        aisle, self.template.num_aisles
                    ),
                )
            };
        }

        match location_code::parse(&normalized) {
            Some(parsed) => match self.check_bounds(&parsed) {
                Ok(()) => {
                    LocationValidation::valid(code, format!("{} storage location", parsed.kind))
                }
                Err(reason) => LocationValidation::invalid(code, reason),
            },
            None => LocationValidation::invalid(
                code,
                format!("unrecognized location format '{}'", normalized),
            ),
        }
    }

    pub fn is_valid(&self, code: &str) -> bool {
        self.validate_location(code).is_valid
    }

    /// 推算库位属性（无效库位返回 None）
    pub fn get_location_properties(&self, code: &str) -> Option<VirtualLocation> {
        let normalized = location_code::normalize(code);
        if normalized.is_empty() {
            return None;
        }

        if let Some(area) = self.special_index.get(&location_code::special_key(&normalized)) {
            return Some(VirtualLocation {
                code: normalized,
                location_type: area.area_type,
                capacity: area.capacity,
                zone: area.zone.clone(),
                aisle: None,
                rack: None,
                position: None,
                level: None,
            });
        }

        if let Some(aisle) = location_code::aisle_number(&normalized) {
            if aisle < 1 || aisle > self.template.num_aisles {
                return None;
            }
            return Some(VirtualLocation {
                code: normalized,
                location_type: LocationType::Aisle,
                capacity: AISLE_DEFAULT_CAPACITY,
                zone: DEFAULT_ZONE.to_string(),
                aisle: Some(aisle),
                rack: None,
                position: None,
                level: None,
            });
        }

        let parsed = location_code::parse(&normalized)?;
        self.check_bounds(&parsed).ok()?;
        let level = self.level_letter(parsed.level)?;
        let (aisle, rack, position) = self.coordinates(&parsed);

        Some(VirtualLocation {
            code: normalized,
            location_type: LocationType::Storage,
            capacity: self.template.default_pallet_capacity,
            zone: DEFAULT_ZONE.to_string(),
            aisle: Some(aisle),
            rack: Some(rack),
            position: Some(position),
            level: Some(level),
        })
    }

    /// 库位容量（无效库位返回 None）
    pub fn capacity_of(&self, code: &str) -> Option<u32> {
        self.get_location_properties(code).map(|p| p.capacity)
    }

    /// 全部特殊区域编码
    pub fn all_special_codes(&self) -> Vec<String> {
        self.template.special_areas().map(|a| a.code.clone()).collect()
    }

    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            template_id: self.template.template_id.clone(),
            storage_locations: self.template.total_storage_locations(),
            receiving_areas: self.template.receiving_areas.len(),
            staging_areas: self.template.staging_areas.len(),
            dock_areas: self.template.dock_areas.len(),
            total_capacity: self.template.total_capacity(),
        }
    }

    // ===== 内部: 区间校验 =====

    fn check_bounds(&self, parsed: &ParsedLocationCode) -> Result<(), String> {
        let t = &self.template;

        if let Some(aisle) = parsed.aisle {
            if aisle < 1 || aisle > t.num_aisles {
                return Err(format!("aisle {} exceeds template maximum {}", aisle, t.num_aisles));
            }
        }
        if let Some(rack) = parsed.rack {
            if rack < 1 || rack > t.racks_per_aisle {
                return Err(format!("rack {} exceeds template maximum {}", rack, t.racks_per_aisle));
            }
        }

        // 连续储位号上限可能超出 u32
        let max_position: u64 = match parsed.aisle {
            Some(_) => t.positions_per_rack as u64,
            None => t.num_aisles as u64 * t.racks_per_aisle as u64 * t.positions_per_rack as u64,
        };
        if parsed.position < 1 || parsed.position as u64 > max_position {
            return Err(format!(
                "position {} exceeds template maximum {}",
                parsed.position, max_position
            ));
        }

        if self.level_letter(parsed.level).is_none() {
            let shown = match parsed.level {
                LevelRef::Letter(c) => c.to_string(),
                LevelRef::Number(n) => n.to_string(),
            };
            return Err(format!(
                "level {} not in template levels {}",
                shown,
                self.levels.iter().collect::<String>()
            ));
        }

        Ok(())
    }

    fn level_letter(&self, level: LevelRef) -> Option<char> {
        match level {
            LevelRef::Letter(c) => self.levels.contains(&c).then_some(c),
            LevelRef::Number(n) if n >= 1 => self.levels.get(n as usize - 1).copied(),
            LevelRef::Number(_) => None,
        }
    }

    /// 坐标换算（连续储位号 → 通道/货架/货架内储位）
    fn coordinates(&self, parsed: &ParsedLocationCode) -> (u32, u32, u32) {
        match (parsed.aisle, parsed.rack) {
            (Some(aisle), Some(rack)) => (aisle, rack, parsed.position),
            _ => {
                let racks = self.template.racks_per_aisle as u64;
                let positions = self.template.positions_per_rack as u64;
                let idx = parsed.position as u64 - 1;
                // 各分量不超过对应的 u32 模板参数
                let aisle = idx / (racks * positions) + 1;
                let rack = (idx / positions) % racks + 1;
                let position = idx % positions + 1;
                (aisle as u32, rack as u32, position as u32)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_template() -> WarehouseTemplate {
        let mut t = WarehouseTemplate::new("T-TEST", "test", 10, 2, 50, 4);
        t.receiving_areas
            .push(SpecialArea::new("RECV-01", LocationType::Receiving, 10));
        t.staging_areas
            .push(SpecialArea::new("STAGE-01", LocationType::Staging, 5));
        t.dock_areas
            .push(SpecialArea::new("DOCK-01", LocationType::Dock, 2).with_zone("ambient"));
        t
    }

    #[test]
    fn test_large_template_position_level_does_not_overflow() {
        let template = WarehouseTemplate::new("BIG", "big", 2000, 2000, 2000, 4);
        assert!(template.validate().is_ok());
        let engine = VirtualLocationEngine::new(template);

        assert!(engine.is_valid("0001A"));
        let props = engine.get_location_properties("9999D").unwrap();
        assert_eq!(props.aisle, Some(1));
        assert_eq!(props.rack, Some(5));
        assert_eq!(props.position, Some(1999));
        assert!(engine.summary().total_capacity > 0);
    }

    #[test]
    fn test_validate_hierarchical_in_bounds() {
        let engine = VirtualLocationEngine::new(create_test_template());
        assert!(engine.is_valid("01-01-001A"));
        assert!(engine.is_valid("10-02-050D"));
    }

    #[test]
    fn test_validate_aisle_out_of_bounds_has_reason() {
        let engine = VirtualLocationEngine::new(create_test_template());
        let result = engine.validate_location("11-01-001A");
        assert!(!result.is_valid);
        assert_eq!(result.reason, "aisle 11 exceeds template maximum 10");
    }

    #[test]
    fn test_validate_level_and_position_bounds() {
        let engine = VirtualLocationEngine::new(create_test_template());
        let level = engine.validate_location("01-01-001E");
        assert!(!level.is_valid);
        assert!(level.reason.contains("level E"));

        let position = engine.validate_location("01-01-051A");
        assert!(!position.is_valid);
        assert!(position.reason.contains("position 51"));
    }

    #[test]
    fn test_validate_explicit_numeric_level() {
        let engine = VirtualLocationEngine::new(create_test_template());
        assert!(engine.is_valid("A01-R02-P015-L4"));
        assert!(!engine.is_valid("A01-R02-P015-L5"));
    }

    #[test]
    fn test_special_area_equivalence() {
        let engine = VirtualLocationEngine::new(create_test_template());
        assert!(engine.is_valid("RECV01"));
        assert!(engine.is_valid("recv-01"));
        let props = engine.get_location_properties("RECV01").unwrap();
        assert_eq!(props.location_type, LocationType::Receiving);
        assert_eq!(props.capacity, 10);
        assert!(!engine.is_valid("RECV-02"));
    }

    #[test]
    fn test_aisle_transitional_area() {
        let engine = VirtualLocationEngine::new(create_test_template());
        let props = engine.get_location_properties("AISLE-03").unwrap();
        assert_eq!(props.location_type, LocationType::Aisle);
        assert_eq!(props.capacity, AISLE_DEFAULT_CAPACITY);
        assert!(!engine.is_valid("AISLE-11"));
    }

    #[test]
    fn test_position_level_decomposition() {
        let engine = VirtualLocationEngine::new(create_test_template());
        // 每通道 2×50=100 个储位；151 → 第 2 通道，第 2 货架，第 1 储位
        let props = engine.get_location_properties("151B").unwrap();
        assert_eq!(props.aisle, Some(2));
        assert_eq!(props.rack, Some(2));
        assert_eq!(props.position, Some(1));
        assert_eq!(props.level, Some('B'));
        // 上限 10×2×50 = 1000
        assert!(engine.is_valid("1000A"));
        assert!(!engine.is_valid("1001A"));
    }

    #[test]
    fn test_empty_and_unknown_codes() {
        let engine = VirtualLocationEngine::new(create_test_template());
        assert_eq!(engine.validate_location("  ").reason, "empty location code");
        assert!(engine
            .validate_location("XYZ")
            .reason
            .contains("unrecognized location format"));
    }

    #[test]
    fn test_summary_and_zone() {
        let engine = VirtualLocationEngine::new(create_test_template());
        let summary = engine.summary();
        assert_eq!(summary.storage_locations, 4000);
        assert_eq!(summary.total_capacity, 4017);
        assert_eq!(engine.get_location_properties("DOCK-01").unwrap().zone, "AMBIENT");
    }
}
