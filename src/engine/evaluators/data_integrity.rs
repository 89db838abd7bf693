// ==========================================
// WareWise 仓库异常检测 - 数据完整性评估器
// ==========================================
// DATA_INTEGRITY: 重复扫描、不可能的库位字符串、必填字段缺失
// ==========================================

use crate::domain::inventory::InventoryRecord;
use crate::domain::rule::{Anomaly, Rule};
use crate::domain::types::RuleType;
use crate::engine::error::EngineResult;
use crate::engine::evaluators::conditions::RuleConditions;
use crate::engine::evaluators::context::EvaluationContext;
use crate::engine::evaluators::RuleEvaluator;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// 库位字符串最大长度
pub const MAX_LOCATION_LENGTH: usize = 30;

static LOCATION_CHARSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9\-_ ]+$").expect("静态正则"));

pub struct DataIntegrityEvaluator;

impl DataIntegrityEvaluator {
    /// 库位字符串是否物理上不可能（超长或含非法字符）
    pub fn is_impossible_location(location: &str) -> Option<String> {
        let trimmed = location.trim();
        if trimmed.chars().count() > MAX_LOCATION_LENGTH {
            return Some(format!(
                "location string longer than {} characters",
                MAX_LOCATION_LENGTH
            ));
        }
        if !LOCATION_CHARSET_RE.is_match(&trimmed.to_uppercase()) {
            return Some(format!("location '{}' contains invalid characters", trimmed));
        }
        None
    }
}

impl RuleEvaluator for DataIntegrityEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::DataIntegrity
    }

    /// # 条件
    /// - check_duplicate_scans: 默认 true（首次出现之后的重复记录）
    /// - check_impossible_locations: 默认 true
    /// - check_missing_fields: 默认 true
    ///
    /// 同一记录命中多项时合并为一条异常
    fn evaluate(
        &self,
        rule: &Rule,
        inventory: &[InventoryRecord],
        _ctx: &EvaluationContext,
    ) -> EngineResult<Vec<Anomaly>> {
        let conditions = RuleConditions::new(rule)?;
        let check_duplicates = conditions.bool_or("check_duplicate_scans", true)?;
        let check_impossible = conditions.bool_or("check_impossible_locations", true)?;
        let check_missing = conditions.bool_or("check_missing_fields", true)?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut anomalies = Vec::new();

        for record in inventory {
            let pallet = record.pallet_id.trim();
            let location = record.location.trim();
            let mut issues: Vec<String> = Vec::new();

            if check_missing {
                if pallet.is_empty() {
                    issues.push("missing pallet id".to_string());
                }
                if location.is_empty() {
                    issues.push("missing location".to_string());
                }
            }

            if check_duplicates && !pallet.is_empty() && !seen.insert(pallet.to_uppercase()) {
                issues.push(format!("duplicate scan of pallet {}", pallet));
            }

            if check_impossible && !location.is_empty() {
                if let Some(reason) = Self::is_impossible_location(location) {
                    issues.push(reason);
                }
            }

            if !issues.is_empty() {
                anomalies.push(Anomaly::from_rule(
                    rule,
                    &record.pallet_id,
                    &record.location,
                    issues.join("; "),
                ));
            }
        }
        Ok(anomalies)
    }
}
