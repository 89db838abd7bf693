// ==========================================
// WareWise 仓库异常检测 - 空间类评估器
// ==========================================
// OVERCAPACITY           库位托盘数超过容量
// INVALID_LOCATION       库位不在模板内且未登记
// LOCATION_MAPPING_ERROR 操作员填写的库位类型与分类结果不符
// ==========================================

use crate::domain::inventory::InventoryRecord;
use crate::domain::rule::{Anomaly, Rule};
use crate::domain::types::{LocationType, RuleType};
use crate::engine::error::EngineResult;
use crate::engine::evaluators::conditions::RuleConditions;
use crate::engine::evaluators::context::EvaluationContext;
use crate::engine::evaluators::RuleEvaluator;
use crate::engine::location_code;
use std::collections::BTreeMap;

// ==========================================
// OvercapacityEvaluator
// ==========================================
pub struct OvercapacityEvaluator;

impl RuleEvaluator for OvercapacityEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::Overcapacity
    }

    /// # 条件
    /// - exclude_types: 不参与判定的库位类型（可选）
    ///
    /// # 规则
    /// 按标准化库位计数；计数 > 容量时，该库位全部托盘标记异常
    /// 容量口径: 登记库位 → 虚拟模板 → 1
    fn evaluate(
        &self,
        rule: &Rule,
        inventory: &[InventoryRecord],
        ctx: &EvaluationContext,
    ) -> EngineResult<Vec<Anomaly>> {
        let conditions = RuleConditions::new(rule)?;
        let excluded = conditions.location_types_or("exclude_types", &[])?;

        let mut by_location: BTreeMap<String, Vec<&InventoryRecord>> = BTreeMap::new();
        for record in inventory {
            let key = location_code::normalize(&record.location);
            if !key.is_empty() {
                by_location.entry(key).or_default().push(record);
            }
        }

        let mut anomalies = Vec::new();
        for (code, records) in &by_location {
            if !excluded.is_empty() && excluded.contains(&ctx.location_type_of(code)) {
                continue;
            }
            let capacity = ctx.capacity_of(code);
            let count = records.len();
            if count as u64 <= capacity as u64 {
                continue;
            }
            for record in records {
                anomalies.push(Anomaly::from_rule(
                    rule,
                    &record.pallet_id,
                    &record.location,
                    format!("location {} holds {} pallets (capacity {})", code, count, capacity),
                ));
            }
        }
        Ok(anomalies)
    }
}

// ==========================================
// InvalidLocationEvaluator
// ==========================================
pub struct InvalidLocationEvaluator;

impl RuleEvaluator for InvalidLocationEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::InvalidLocation
    }

    /// 空库位不在此规则判定（由 DATA_INTEGRITY 负责）
    fn evaluate(
        &self,
        rule: &Rule,
        inventory: &[InventoryRecord],
        ctx: &EvaluationContext,
    ) -> EngineResult<Vec<Anomaly>> {
        RuleConditions::new(rule)?;

        let mut anomalies = Vec::new();
        for record in inventory {
            if record.location.trim().is_empty() || ctx.is_valid_location(&record.location) {
                continue;
            }
            let validation = ctx.virtual_engine.validate_location(&record.location);
            anomalies.push(Anomaly::from_rule(
                rule,
                &record.pallet_id,
                &record.location,
                format!("invalid location: {}", validation.reason),
            ));
        }
        Ok(anomalies)
    }
}

// ==========================================
// LocationMappingErrorEvaluator
// ==========================================
pub struct LocationMappingErrorEvaluator;

impl RuleEvaluator for LocationMappingErrorEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::LocationMappingError
    }

    /// # 条件
    /// - min_confidence: 分类置信度下限，默认 0.7
    ///
    /// # 规则
    /// 记录带有可识别的 location_type，且分类置信度 >= 下限、类型不一致 → 异常
    fn evaluate(
        &self,
        rule: &Rule,
        inventory: &[InventoryRecord],
        ctx: &EvaluationContext,
    ) -> EngineResult<Vec<Anomaly>> {
        let conditions = RuleConditions::new(rule)?;
        let min_confidence = conditions.f64_or("min_confidence", 0.7)?;

        let mut anomalies = Vec::new();
        for record in inventory {
            let declared = match record.location_type.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => LocationType::from_str(s),
                _ => continue,
            };
            // 无法识别的自由文本类型不参与比对
            if declared == LocationType::Unknown {
                continue;
            }
            let classification = ctx.classify(&record.location);
            if classification.location_type == LocationType::Unknown
                || classification.confidence < min_confidence
            {
                continue;
            }
            if declared != classification.location_type {
                anomalies.push(Anomaly::from_rule(
                    rule,
                    &record.pallet_id,
                    &record.location,
                    format!(
                        "declared type {} but location classifies as {} ({}, confidence {:.2})",
                        declared,
                        classification.location_type,
                        classification.method,
                        classification.confidence
                    ),
                ));
            }
        }
        Ok(anomalies)
    }
}
