// ==========================================
// WareWise 仓库异常检测 - 产品兼容类评估器
// ==========================================
// TEMPERATURE_ZONE_MISMATCH 温控产品放在禁止温区超时
// ==========================================

use crate::domain::inventory::InventoryRecord;
use crate::domain::rule::{Anomaly, Rule};
use crate::domain::types::RuleType;
use crate::engine::error::EngineResult;
use crate::engine::evaluators::conditions::RuleConditions;
use crate::engine::evaluators::context::EvaluationContext;
use crate::engine::evaluators::RuleEvaluator;
use regex::Regex;

pub struct TemperatureZoneMismatchEvaluator;

impl RuleEvaluator for TemperatureZoneMismatchEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::TemperatureZoneMismatch
    }

    /// # 条件
    /// - product_patterns: 描述通配符，默认 ["*FROZEN*", "*REFRIGERATED*"]
    /// - prohibited_zones: 默认 ["AMBIENT", "GENERAL"]
    /// - time_threshold_minutes: 默认 30
    fn evaluate(
        &self,
        rule: &Rule,
        inventory: &[InventoryRecord],
        ctx: &EvaluationContext,
    ) -> EngineResult<Vec<Anomaly>> {
        let conditions = RuleConditions::new(rule)?;
        let product_patterns =
            conditions.str_list_or("product_patterns", &["*FROZEN*", "*REFRIGERATED*"])?;
        let prohibited: Vec<String> = conditions
            .str_list_or("prohibited_zones", &["AMBIENT", "GENERAL"])?
            .iter()
            .map(|z| z.trim().to_uppercase())
            .collect();
        let threshold_minutes = conditions.f64_or("time_threshold_minutes", 30.0)?;

        let matchers: Vec<Regex> = product_patterns
            .iter()
            .map(|p| ctx.compile_pattern(p))
            .collect::<EngineResult<_>>()?;

        let mut anomalies = Vec::new();
        for record in inventory {
            let description = match record.description.as_deref() {
                Some(d) if !d.trim().is_empty() => d,
                _ => continue,
            };
            if !matchers.iter().any(|re| re.is_match(description)) {
                continue;
            }
            if record.location.trim().is_empty() {
                continue;
            }

            let zone = ctx.zone_of(&record.location);
            if !prohibited.contains(&zone) {
                continue;
            }
            let minutes = record.age_hours(ctx.now) * 60.0;
            if minutes > threshold_minutes {
                anomalies.push(Anomaly::from_rule(
                    rule,
                    &record.pallet_id,
                    &record.location,
                    format!(
                        "temperature-sensitive product '{}' in zone {} for {:.0} min (threshold {:.0} min)",
                        description.trim(),
                        zone,
                        minutes,
                        threshold_minutes
                    ),
                ));
            }
        }
        Ok(anomalies)
    }
}
