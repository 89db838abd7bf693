// ==========================================
// WareWise 仓库异常检测 - 领域类型定义
// ==========================================
// 职责: 库位类型、规则类型、优先级等枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 库位类型 (Location Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    Receiving, // 收货区
    Staging,   // 暂存区
    Dock,      // 月台
    Storage,   // 货架存储位
    Aisle,     // 通道(过渡区)
    Overflow,  // 溢出区
    Unknown,   // 无法识别
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Receiving => "RECEIVING",
            LocationType::Staging => "STAGING",
            LocationType::Dock => "DOCK",
            LocationType::Storage => "STORAGE",
            LocationType::Aisle => "AISLE",
            LocationType::Overflow => "OVERFLOW",
            LocationType::Unknown => "UNKNOWN",
        }
    }

    /// 宽松解析（兼容 TRANSITIONAL / FINAL 等历史写法）
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "RECEIVING" | "RECV" => LocationType::Receiving,
            "STAGING" | "STAGE" => LocationType::Staging,
            "DOCK" => LocationType::Dock,
            "STORAGE" | "FINAL" => LocationType::Storage,
            "AISLE" | "TRANSITIONAL" => LocationType::Aisle,
            "OVERFLOW" => LocationType::Overflow,
            _ => LocationType::Unknown,
        }
    }

    /// 是否为特殊区域（非货架存储位）
    pub fn is_special(&self) -> bool {
        matches!(
            self,
            LocationType::Receiving | LocationType::Staging | LocationType::Dock
        )
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 异常优先级 (Priority)
// ==========================================
// 顺序: Low < Medium < High < VeryHigh
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::VeryHigh => "VERY_HIGH",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().replace(' ', "_").as_str() {
            "LOW" => Priority::Low,
            "HIGH" => Priority::High,
            "VERY_HIGH" => Priority::VeryHigh,
            _ => Priority::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 规则类型 (Rule Type)
// ==========================================
// 每种类型对应 engine::evaluators 中的一个评估器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    StagnantPallets,          // 收货区滞留
    UncoordinatedLots,        // 批次未完成上架
    Overcapacity,             // 库位超容
    InvalidLocation,          // 非法库位
    LocationSpecificStagnant, // 指定库位滞留
    TemperatureZoneMismatch,  // 温区不符
    DataIntegrity,            // 数据完整性
    LocationMappingError,     // 库位类型映射错误
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::StagnantPallets => "STAGNANT_PALLETS",
            RuleType::UncoordinatedLots => "UNCOORDINATED_LOTS",
            RuleType::Overcapacity => "OVERCAPACITY",
            RuleType::InvalidLocation => "INVALID_LOCATION",
            RuleType::LocationSpecificStagnant => "LOCATION_SPECIFIC_STAGNANT",
            RuleType::TemperatureZoneMismatch => "TEMPERATURE_ZONE_MISMATCH",
            RuleType::DataIntegrity => "DATA_INTEGRITY",
            RuleType::LocationMappingError => "LOCATION_MAPPING_ERROR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "STAGNANT_PALLETS" => Some(RuleType::StagnantPallets),
            "UNCOORDINATED_LOTS" => Some(RuleType::UncoordinatedLots),
            "OVERCAPACITY" => Some(RuleType::Overcapacity),
            "INVALID_LOCATION" => Some(RuleType::InvalidLocation),
            "LOCATION_SPECIFIC_STAGNANT" => Some(RuleType::LocationSpecificStagnant),
            "TEMPERATURE_ZONE_MISMATCH" => Some(RuleType::TemperatureZoneMismatch),
            "DATA_INTEGRITY" => Some(RuleType::DataIntegrity),
            "LOCATION_MAPPING_ERROR" => Some(RuleType::LocationMappingError),
            _ => None,
        }
    }

    /// 异常类型展示名
    pub fn anomaly_label(&self) -> &'static str {
        match self {
            RuleType::StagnantPallets => "Stagnant Pallet",
            RuleType::UncoordinatedLots => "Lot Straggler",
            RuleType::Overcapacity => "Overcapacity",
            RuleType::InvalidLocation => "Invalid Location",
            RuleType::LocationSpecificStagnant => "Location Specific Stagnant",
            RuleType::TemperatureZoneMismatch => "Temperature Zone Mismatch",
            RuleType::DataIntegrity => "Data Integrity",
            RuleType::LocationMappingError => "Location Mapping Error",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 分类方法 (Classification Method)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationMethod {
    VirtualTemplate,  // 虚拟模板推算
    LocationRegistry, // 库位登记表
    PatternMatch,     // 正则模式
    Behavioral,       // 行为特征
    Fallback,         // 兜底
}

impl fmt::Display for ClassificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationMethod::VirtualTemplate => write!(f, "VIRTUAL_TEMPLATE"),
            ClassificationMethod::LocationRegistry => write!(f, "LOCATION_REGISTRY"),
            ClassificationMethod::PatternMatch => write!(f, "PATTERN_MATCH"),
            ClassificationMethod::Behavioral => write!(f, "BEHAVIORAL"),
            ClassificationMethod::Fallback => write!(f, "FALLBACK"),
        }
    }
}

// ==========================================
// 库位编码格式 (Location Format Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationFormatKind {
    Hierarchical,  // 02-06-011B
    Explicit,      // A01-R02-P015-L3
    PositionLevel, // 011B
    Special,       // RECV-01 / STAGE-01 等
}

impl fmt::Display for LocationFormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationFormatKind::Hierarchical => write!(f, "HIERARCHICAL"),
            LocationFormatKind::Explicit => write!(f, "EXPLICIT"),
            LocationFormatKind::PositionLevel => write!(f, "POSITION_LEVEL"),
            LocationFormatKind::Special => write!(f, "SPECIAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_type_legacy_names() {
        assert_eq!(LocationType::from_str("transitional"), LocationType::Aisle);
        assert_eq!(LocationType::from_str("FINAL"), LocationType::Storage);
        assert_eq!(LocationType::from_str("???"), LocationType::Unknown);
    }

    #[test]
    fn test_priority_order() {
        assert!(Priority::VeryHigh > Priority::High);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::from_str("Very High"), Priority::VeryHigh);
    }

    #[test]
    fn test_rule_type_round_trip_names() {
        let t = RuleType::from_str("overcapacity").unwrap();
        assert_eq!(t, RuleType::Overcapacity);
        assert_eq!(t.to_string(), "OVERCAPACITY");
        assert!(RuleType::from_str("NOPE").is_none());
    }
}
