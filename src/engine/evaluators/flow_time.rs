// ==========================================
// WareWise 仓库异常检测 - 流转/时效类评估器
// ==========================================
// STAGNANT_PALLETS           指定类型库位停留超时
// UNCOORDINATED_LOTS         批次大部分已上架，剩余托盘滞留
// LOCATION_SPECIFIC_STAGNANT 通配符库位停留超时
// ==========================================

use crate::domain::inventory::InventoryRecord;
use crate::domain::rule::{Anomaly, Rule};
use crate::domain::types::{LocationType, RuleType};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::evaluators::conditions::RuleConditions;
use crate::engine::evaluators::context::EvaluationContext;
use crate::engine::evaluators::RuleEvaluator;
use crate::engine::location_code;
use std::collections::BTreeMap;

// ==========================================
// StagnantPalletsEvaluator
// ==========================================
pub struct StagnantPalletsEvaluator;

impl RuleEvaluator for StagnantPalletsEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::StagnantPallets
    }

    /// # 条件
    /// - location_types: 默认 ["RECEIVING"]
    /// - time_threshold_hours: 默认 10
    ///
    /// # 规则
    /// 库位归类属于 location_types 且停留时长 > 阈值 → 异常
    fn evaluate(
        &self,
        rule: &Rule,
        inventory: &[InventoryRecord],
        ctx: &EvaluationContext,
    ) -> EngineResult<Vec<Anomaly>> {
        let conditions = RuleConditions::new(rule)?;
        let types = conditions.location_types_or("location_types", &["RECEIVING"])?;
        let threshold = conditions.f64_or("time_threshold_hours", 10.0)?;

        let mut anomalies = Vec::new();
        for record in inventory {
            if record.location.trim().is_empty() {
                continue;
            }
            let location_type = ctx.location_type_of(&record.location);
            if !types.contains(&location_type) {
                continue;
            }
            let age = record.age_hours(ctx.now);
            if age > threshold {
                anomalies.push(Anomaly::from_rule(
                    rule,
                    &record.pallet_id,
                    &record.location,
                    format!(
                        "pallet in {} for {:.1}h (threshold {:.1}h)",
                        location_type, age, threshold
                    ),
                ));
            }
        }
        Ok(anomalies)
    }
}

// ==========================================
// UncoordinatedLotsEvaluator
// ==========================================
pub struct UncoordinatedLotsEvaluator;

impl RuleEvaluator for UncoordinatedLotsEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::UncoordinatedLots
    }

    /// # 条件
    /// - completion_threshold: 默认 0.8（取值 0~1）
    /// - location_types: 滞留判定类型，默认 ["RECEIVING"]
    ///
    /// # 规则
    /// 按 receipt_number 分组；已在 STORAGE 的占比 >= 阈值时，
    /// 仍处于 location_types 的托盘为滞留托盘
    fn evaluate(
        &self,
        rule: &Rule,
        inventory: &[InventoryRecord],
        ctx: &EvaluationContext,
    ) -> EngineResult<Vec<Anomaly>> {
        let conditions = RuleConditions::new(rule)?;
        let threshold = conditions.f64_or("completion_threshold", 0.8)?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(EngineError::InvalidRuleConditions {
                rule_name: rule.name.clone(),
                message: format!("completion_threshold 超出 [0, 1]: {}", threshold),
            });
        }
        let straggler_types = conditions.location_types_or("location_types", &["RECEIVING"])?;

        // BTreeMap 保证输出顺序稳定
        let mut lots: BTreeMap<String, Vec<(&InventoryRecord, LocationType)>> = BTreeMap::new();
        for record in inventory {
            let receipt = match record.receipt_number.as_deref().map(str::trim) {
                Some(r) if !r.is_empty() => r.to_string(),
                _ => continue,
            };
            let location_type = ctx.location_type_of(&record.location);
            lots.entry(receipt).or_default().push((record, location_type));
        }

        let mut anomalies = Vec::new();
        for (receipt, members) in &lots {
            let total = members.len();
            let stored = members
                .iter()
                .filter(|(_, t)| *t == LocationType::Storage)
                .count();
            let completion = stored as f64 / total as f64;
            if completion < threshold {
                continue;
            }

            for (record, location_type) in members {
                if straggler_types.contains(location_type) {
                    anomalies.push(Anomaly::from_rule(
                        rule,
                        &record.pallet_id,
                        &record.location,
                        format!(
                            "lot {}: {}/{} pallets stored ({:.0}%), pallet still in {}",
                            receipt,
                            stored,
                            total,
                            completion * 100.0,
                            location_type
                        ),
                    ));
                }
            }
        }
        Ok(anomalies)
    }
}

// ==========================================
// LocationSpecificStagnantEvaluator
// ==========================================
pub struct LocationSpecificStagnantEvaluator;

impl RuleEvaluator for LocationSpecificStagnantEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::LocationSpecificStagnant
    }

    /// # 条件
    /// - location_pattern: 通配符，默认 "AISLE*"
    /// - time_threshold_hours: 默认 4
    fn evaluate(
        &self,
        rule: &Rule,
        inventory: &[InventoryRecord],
        ctx: &EvaluationContext,
    ) -> EngineResult<Vec<Anomaly>> {
        let conditions = RuleConditions::new(rule)?;
        let pattern = conditions.str_or("location_pattern", "AISLE*")?;
        let threshold = conditions.f64_or("time_threshold_hours", 4.0)?;
        let re = ctx.compile_pattern(&pattern)?;

        let mut anomalies = Vec::new();
        for record in inventory {
            let normalized = location_code::normalize(&record.location);
            if normalized.is_empty() || !re.is_match(&normalized) {
                continue;
            }
            let age = record.age_hours(ctx.now);
            if age > threshold {
                anomalies.push(Anomaly::from_rule(
                    rule,
                    &record.pallet_id,
                    &record.location,
                    format!(
                        "pallet at {} (pattern {}) for {:.1}h (threshold {:.1}h)",
                        normalized, pattern, age, threshold
                    ),
                ));
            }
        }
        Ok(anomalies)
    }
}
