// ==========================================
// WareWise 仓库异常检测 - 规则与异常实体
// ==========================================
// 职责: 可配置异常规则 (JSON conditions/parameters)、规则分类、
//       规则执行统计、异常输出
// ==========================================

use crate::domain::types::{Priority, RuleType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ==========================================
// RuleCategory - 规则分类
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCategory {
    pub category_id: String, // FLOW_TIME / SPACE / PRODUCT
    pub display_name: String,
    pub priority: i32,
}

/// 内置分类
pub fn default_categories() -> Vec<RuleCategory> {
    vec![
        RuleCategory {
            category_id: "FLOW_TIME".to_string(),
            display_name: "Flow & Time Rules".to_string(),
            priority: 1,
        },
        RuleCategory {
            category_id: "SPACE".to_string(),
            display_name: "Space Management Rules".to_string(),
            priority: 2,
        },
        RuleCategory {
            category_id: "PRODUCT".to_string(),
            display_name: "Product Compatibility Rules".to_string(),
            priority: 3,
        },
    ]
}

// ==========================================
// Rule - 异常规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: i64,
    pub name: String,
    pub category_id: String,
    pub rule_type: RuleType,
    pub priority: Priority,
    pub description: Option<String>,
    /// 规则条件（JSON 对象）
    pub conditions: Value,
    /// 扩展参数（JSON 对象）
    pub parameters: Value,
    pub is_active: bool,
    pub is_default: bool,
}

impl Rule {
    pub fn new(
        rule_id: i64,
        name: &str,
        rule_type: RuleType,
        priority: Priority,
        conditions: Value,
    ) -> Self {
        Self {
            rule_id,
            name: name.to_string(),
            category_id: default_category_for(rule_type).to_string(),
            rule_type,
            priority,
            description: None,
            conditions,
            parameters: json!({}),
            is_active: true,
            is_default: false,
        }
    }
}

/// 规则类型 → 默认分类
pub fn default_category_for(rule_type: RuleType) -> &'static str {
    match rule_type {
        RuleType::StagnantPallets
        | RuleType::UncoordinatedLots
        | RuleType::LocationSpecificStagnant => "FLOW_TIME",
        RuleType::Overcapacity
        | RuleType::InvalidLocation
        | RuleType::DataIntegrity
        | RuleType::LocationMappingError => "SPACE",
        RuleType::TemperatureZoneMismatch => "PRODUCT",
    }
}

/// 内置默认规则（rule_id 为 0，落库时由数据库分配）
pub fn default_rules() -> Vec<Rule> {
    let mut rules = vec![
        Rule::new(
            0,
            "Forgotten Pallets Alert",
            RuleType::StagnantPallets,
            Priority::VeryHigh,
            json!({"location_types": ["RECEIVING"], "time_threshold_hours": 10}),
        ),
        Rule::new(
            0,
            "Incomplete Lots Alert",
            RuleType::UncoordinatedLots,
            Priority::VeryHigh,
            json!({"completion_threshold": 0.8, "location_types": ["RECEIVING"]}),
        ),
        Rule::new(
            0,
            "Overcapacity Alert",
            RuleType::Overcapacity,
            Priority::High,
            json!({}),
        ),
        Rule::new(
            0,
            "Invalid Locations Alert",
            RuleType::InvalidLocation,
            Priority::High,
            json!({}),
        ),
        Rule::new(
            0,
            "AISLE Stuck Pallets",
            RuleType::LocationSpecificStagnant,
            Priority::High,
            json!({"location_pattern": "AISLE*", "time_threshold_hours": 4}),
        ),
        Rule::new(
            0,
            "Cold Chain Violations",
            RuleType::TemperatureZoneMismatch,
            Priority::VeryHigh,
            json!({
                "product_patterns": ["*FROZEN*", "*REFRIGERATED*"],
                "prohibited_zones": ["AMBIENT", "GENERAL"],
                "time_threshold_minutes": 30
            }),
        ),
        Rule::new(
            0,
            "Scanner Error Detection",
            RuleType::DataIntegrity,
            Priority::Medium,
            json!({"check_duplicate_scans": true, "check_impossible_locations": true, "check_missing_fields": true}),
        ),
        Rule::new(
            0,
            "Location Type Mismatches",
            RuleType::LocationMappingError,
            Priority::Medium,
            json!({"min_confidence": 0.7}),
        ),
    ];
    for rule in rules.iter_mut() {
        rule.is_default = true;
    }
    rules
}

// ==========================================
// RulePerformance - 规则执行统计
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePerformance {
    pub rule_id: i64,
    pub analysis_id: String,
    pub anomalies_detected: usize,
    pub execution_time_ms: u64,
    pub success: bool,
    pub error_message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

// ==========================================
// Anomaly - 异常记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub pallet_id: String,
    pub location: String,
    pub anomaly_type: String,
    pub priority: Priority,
    pub rule_id: i64,
    pub rule_name: String,
    pub rule_type: RuleType,
    /// 判定原因（可解释性）
    pub details: String,
    pub detected_at: DateTime<Utc>,
}

impl Anomaly {
    /// 由规则与库存记录构造异常
    pub fn from_rule(rule: &Rule, pallet_id: &str, location: &str, details: String) -> Self {
        Self {
            pallet_id: pallet_id.to_string(),
            location: location.to_string(),
            anomaly_type: rule.rule_type.anomaly_label().to_string(),
            priority: rule.priority,
            rule_id: rule.rule_id,
            rule_name: rule.name.clone(),
            rule_type: rule.rule_type,
            details,
            detected_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_cover_every_rule_type() {
        let rules = default_rules();
        assert_eq!(rules.len(), 8);
        for rule_type in [
            RuleType::StagnantPallets,
            RuleType::UncoordinatedLots,
            RuleType::Overcapacity,
            RuleType::InvalidLocation,
            RuleType::LocationSpecificStagnant,
            RuleType::TemperatureZoneMismatch,
            RuleType::DataIntegrity,
            RuleType::LocationMappingError,
        ] {
            assert!(rules.iter().any(|r| r.rule_type == rule_type));
        }
        assert!(rules.iter().all(|r| r.is_default && r.conditions.is_object()));
    }
}
