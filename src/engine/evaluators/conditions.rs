// ==========================================
// WareWise 仓库异常检测 - 规则条件读取
// ==========================================
// 职责: 从 Rule.conditions (JSON) 读取带默认值的条件项
// 规则: 缺失 → 默认值；存在但类型错误 → InvalidRuleConditions
// ==========================================

use crate::domain::rule::Rule;
use crate::domain::types::LocationType;
use crate::engine::error::{EngineError, EngineResult};
use serde_json::{Map, Value};

pub struct RuleConditions<'a> {
    rule: &'a Rule,
    map: Option<&'a Map<String, Value>>,
}

impl<'a> RuleConditions<'a> {
    pub fn new(rule: &'a Rule) -> EngineResult<Self> {
        match &rule.conditions {
            Value::Object(map) => Ok(Self { rule, map: Some(map) }),
            Value::Null => Ok(Self { rule, map: None }),
            other => Err(EngineError::InvalidRuleConditions {
                rule_name: rule.name.clone(),
                message: format!("conditions 必须是 JSON 对象，实际: {}", other),
            }),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.and_then(|m| m.get(key)).filter(|v| !v.is_null())
    }

    fn type_error(&self, key: &str, expected: &str, actual: &Value) -> EngineError {
        EngineError::InvalidRuleConditions {
            rule_name: self.rule.name.clone(),
            message: format!("{} 应为 {}，实际: {}", key, expected, actual),
        }
    }

    pub fn f64_or(&self, key: &str, default: f64) -> EngineResult<f64> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| self.type_error(key, "数值", v)),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> EngineResult<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| self.type_error(key, "布尔值", v)),
        }
    }

    pub fn str_or(&self, key: &str, default: &str) -> EngineResult<String> {
        match self.get(key) {
            None => Ok(default.to_string()),
            Some(v) => v
                .as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| self.type_error(key, "字符串", v)),
        }
    }

    /// 字符串列表（允许单个字符串）
    pub fn str_list_or(&self, key: &str, default: &[&str]) -> EngineResult<Vec<String>> {
        match self.get(key) {
            None => Ok(default.iter().map(|s| s.to_string()).collect()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(|s| s.to_string())
                        .ok_or_else(|| self.type_error(key, "字符串数组", item))
                })
                .collect(),
            Some(v) => Err(self.type_error(key, "字符串数组", v)),
        }
    }

    /// 库位类型列表（未知类型名视为条件错误）
    pub fn location_types_or(
        &self,
        key: &str,
        default: &[&str],
    ) -> EngineResult<Vec<LocationType>> {
        self.str_list_or(key, default)?
            .iter()
            .map(|name| match LocationType::from_str(name) {
                LocationType::Unknown => Err(EngineError::InvalidRuleConditions {
                    rule_name: self.rule.name.clone(),
                    message: format!("{} 包含未知库位类型: {}", key, name),
                }),
                t => Ok(t),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Priority, RuleType};
    use serde_json::json;

    fn rule(conditions: Value) -> Rule {
        Rule::new(1, "test", RuleType::StagnantPallets, Priority::High, conditions)
    }

    #[test]
    fn test_defaults_when_missing() {
        let r = rule(json!({}));
        let c = RuleConditions::new(&r).unwrap();
        assert_eq!(c.f64_or("time_threshold_hours", 10.0).unwrap(), 10.0);
        assert!(c.bool_or("flag", true).unwrap());
        assert_eq!(
            c.location_types_or("location_types", &["RECEIVING"]).unwrap(),
            vec![LocationType::Receiving]
        );
    }

    #[test]
    fn test_type_errors() {
        let r = rule(json!({"time_threshold_hours": "ten", "location_types": ["NOWHERE"]}));
        let c = RuleConditions::new(&r).unwrap();
        assert!(c.f64_or("time_threshold_hours", 10.0).is_err());
        assert!(c.location_types_or("location_types", &[]).is_err());
    }

    #[test]
    fn test_non_object_conditions() {
        let r = rule(json!([1, 2]));
        assert!(RuleConditions::new(&r).is_err());
        let r = rule(Value::Null);
        assert!(RuleConditions::new(&r).is_ok());
    }

    #[test]
    fn test_single_string_as_list() {
        let r = rule(json!({"location_types": "staging"}));
        let c = RuleConditions::new(&r).unwrap();
        assert_eq!(
            c.location_types_or("location_types", &[]).unwrap(),
            vec![LocationType::Staging]
        );
    }
}
