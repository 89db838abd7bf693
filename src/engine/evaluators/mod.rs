// ==========================================
// WareWise 仓库异常检测 - 规则评估器
// ==========================================
// 职责: 每种 RuleType 一个评估器，输出异常及判定原因
// 红线: 评估器不访问数据库，只读 EvaluationContext
// ==========================================

pub mod conditions;
pub mod context;
pub mod data_integrity;
pub mod flow_time;
pub mod product;
pub mod space;

use crate::domain::inventory::InventoryRecord;
use crate::domain::rule::{Anomaly, Rule};
use crate::domain::types::RuleType;
use crate::engine::error::EngineResult;
use std::sync::Arc;

pub use conditions::RuleConditions;
pub use context::EvaluationContext;
pub use data_integrity::DataIntegrityEvaluator;
pub use flow_time::{
    LocationSpecificStagnantEvaluator, StagnantPalletsEvaluator, UncoordinatedLotsEvaluator,
};
pub use product::TemperatureZoneMismatchEvaluator;
pub use space::{InvalidLocationEvaluator, LocationMappingErrorEvaluator, OvercapacityEvaluator};

// ==========================================
// RuleEvaluator Trait
// ==========================================
pub trait RuleEvaluator: Send + Sync {
    /// 负责的规则类型
    fn rule_type(&self) -> RuleType;

    /// 评估单条规则
    ///
    /// # 返回
    /// - Ok(Vec<Anomaly>): 命中的异常（可为空）
    /// - Err: 条件非法等，由规则引擎按规则隔离
    fn evaluate(
        &self,
        rule: &Rule,
        inventory: &[InventoryRecord],
        ctx: &EvaluationContext,
    ) -> EngineResult<Vec<Anomaly>>;
}

/// 内置评估器（覆盖全部 RuleType）
pub fn default_evaluators() -> Vec<Arc<dyn RuleEvaluator>> {
    vec![
        Arc::new(StagnantPalletsEvaluator),
        Arc::new(UncoordinatedLotsEvaluator),
        Arc::new(OvercapacityEvaluator),
        Arc::new(InvalidLocationEvaluator),
        Arc::new(LocationSpecificStagnantEvaluator),
        Arc::new(TemperatureZoneMismatchEvaluator),
        Arc::new(DataIntegrityEvaluator),
        Arc::new(LocationMappingErrorEvaluator),
    ]
}

// ==========================================
// 测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::location::Location;
    use crate::domain::types::{LocationType, Priority};
    use crate::engine::pattern_resolver::RulePatterns;
    use crate::engine::template_resolver::test_template;
    use crate::engine::virtual_location::VirtualLocationEngine;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use serde_json::{json, Value};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn record(pallet: &str, location: &str, hours_ago: i64) -> InventoryRecord {
        InventoryRecord::new(pallet, location, now() - Duration::hours(hours_ago))
    }

    fn context(known: Vec<Location>, inventory: &[InventoryRecord]) -> EvaluationContext {
        let template = test_template();
        let patterns = RulePatterns::from_template("USER_TESTF", &template).unwrap();
        let mut ctx = EvaluationContext::new(
            "USER_TESTF",
            now(),
            Arc::new(VirtualLocationEngine::new(template)),
            Arc::new(patterns),
            known,
            0.5,
        );
        ctx.prepare(inventory);
        ctx
    }

    fn run(
        evaluator: &dyn RuleEvaluator,
        conditions: Value,
        inventory: &[InventoryRecord],
        known: Vec<Location>,
    ) -> Vec<Anomaly> {
        let rule = Rule::new(1, "test rule", evaluator.rule_type(), Priority::High, conditions);
        let ctx = context(known, inventory);
        evaluator.evaluate(&rule, inventory, &ctx).unwrap()
    }

    fn flagged(anomalies: &[Anomaly]) -> Vec<String> {
        let mut ids: Vec<String> = anomalies.iter().map(|a| a.pallet_id.clone()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_default_evaluators_cover_all_rule_types() {
        let evaluators = default_evaluators();
        assert_eq!(evaluators.len(), 8);
        for rule in crate::domain::rule::default_rules() {
            assert!(evaluators.iter().any(|e| e.rule_type() == rule.rule_type));
        }
    }

    #[test]
    fn test_stagnant_pallets() {
        let inventory = vec![
            record("P1", "RECV-01", 12),
            record("P2", "RECV-01", 2),
            record("P3", "01-01-001A", 20),
        ];
        let anomalies = run(&StagnantPalletsEvaluator, json!({}), &inventory, vec![]);
        assert_eq!(flagged(&anomalies), vec!["P1"]);
        assert!(anomalies[0].details.contains("RECEIVING"));
    }

    #[test]
    fn test_stagnant_pallets_custom_threshold() {
        let inventory = vec![record("P1", "STAGE-01", 3)];
        let anomalies = run(
            &StagnantPalletsEvaluator,
            json!({"location_types": ["STAGING"], "time_threshold_hours": 2}),
            &inventory,
            vec![],
        );
        assert_eq!(flagged(&anomalies), vec!["P1"]);
    }

    #[test]
    fn test_uncoordinated_lots() {
        let inventory = vec![
            record("L1-1", "01-01-001A", 5).with_receipt("R1"),
            record("L1-2", "01-01-002A", 5).with_receipt("R1"),
            record("L1-3", "01-01-003A", 5).with_receipt("R1"),
            record("L1-4", "01-01-004A", 5).with_receipt("R1"),
            record("L1-5", "RECV-01", 5).with_receipt("R1"),
            record("L2-1", "01-01-005A", 5).with_receipt("R2"),
            record("L2-2", "RECV-01", 5).with_receipt("R2"),
            record("L2-3", "RECV-01", 5).with_receipt("R2"),
        ];
        let anomalies = run(&UncoordinatedLotsEvaluator, json!({}), &inventory, vec![]);
        assert_eq!(flagged(&anomalies), vec!["L1-5"]);
        assert!(anomalies[0].details.contains("4/5"));
    }

    #[test]
    fn test_uncoordinated_lots_rejects_bad_threshold() {
        let rule = Rule::new(
            1,
            "bad",
            RuleType::UncoordinatedLots,
            Priority::Medium,
            json!({"completion_threshold": 1.5}),
        );
        let ctx = context(vec![], &[]);
        assert!(UncoordinatedLotsEvaluator.evaluate(&rule, &[], &ctx).is_err());
    }

    #[test]
    fn test_overcapacity_flags_every_pallet_in_full_location() {
        let inventory = vec![
            record("A", "01-01-001A", 1),
            record("B", "01-01-001a", 1),
            record("C", "DOCK-01", 1),
            record("D", "DOCK-01", 1),
            record("E", "01-01-002A", 1),
            record("F", "01-01-002A", 1),
        ];
        // 01-01-002A 登记容量 3
        let known = vec![Location::new("01-01-002A", "USER_TESTF", LocationType::Storage, 3)];
        let anomalies = run(&OvercapacityEvaluator, json!({}), &inventory, known);
        assert_eq!(flagged(&anomalies), vec!["A", "B"]);
        assert!(anomalies[0].details.contains("capacity 1"));
    }

    #[test]
    fn test_invalid_location() {
        let inventory = vec![
            record("P1", "04-01-001A", 1),
            record("P2", "01-01-001A", 1),
            record("P3", "ZZZ-9", 1),
            record("P4", "GARBAGE", 1),
            record("P5", "", 1),
        ];
        let known = vec![Location::new("ZZZ-9", "USER_TESTF", LocationType::Overflow, 5)];
        let anomalies = run(&InvalidLocationEvaluator, json!({}), &inventory, known);
        assert_eq!(flagged(&anomalies), vec!["P1", "P4"]);
        let p1 = anomalies.iter().find(|a| a.pallet_id == "P1").unwrap();
        assert!(p1.details.contains("exceeds template maximum 3"));
    }

    #[test]
    fn test_location_specific_stagnant() {
        let inventory = vec![
            record("P1", "AISLE-01", 5),
            record("P2", "aisle-02", 1),
            record("P3", "RECV-01", 9),
        ];
        let anomalies = run(&LocationSpecificStagnantEvaluator, json!({}), &inventory, vec![]);
        assert_eq!(flagged(&anomalies), vec!["P1"]);
    }

    #[test]
    fn test_temperature_zone_mismatch() {
        let mut freezer = Location::new("FRZ-01", "USER_TESTF", LocationType::Storage, 10);
        freezer.zone = "FREEZER".to_string();
        let inventory = vec![
            record("P1", "01-01-001A", 2).with_description("Frozen Peas 2kg"),
            record("P2", "FRZ-01", 2).with_description("FROZEN PIZZA"),
            record("P3", "01-01-002A", 2).with_description("Fresh bread"),
            record("P4", "01-01-003A", 0).with_description("Refrigerated milk"),
        ];
        let anomalies =
            run(&TemperatureZoneMismatchEvaluator, json!({}), &inventory, vec![freezer]);
        assert_eq!(flagged(&anomalies), vec!["P1"]);
        assert!(anomalies[0].details.contains("GENERAL"));
    }

    #[test]
    fn test_data_integrity() {
        let inventory = vec![
            record("P1", "01-01-001A", 1),
            record("P1", "01-01-002A", 1),
            record("P2", "01-01-003A!!", 1),
            record("", "01-01-004A", 1),
            record("P3", "X".repeat(31).as_str(), 1),
        ];
        let anomalies = run(&DataIntegrityEvaluator, json!({}), &inventory, vec![]);
        assert_eq!(anomalies.len(), 4);
        assert!(anomalies[0].details.contains("duplicate scan"));
        assert_eq!(anomalies[0].location, "01-01-002A");
        assert!(anomalies[1].details.contains("invalid characters"));
        assert!(anomalies[2].details.contains("missing pallet id"));
        assert!(anomalies[3].details.contains("longer than 30"));
    }

    #[test]
    fn test_data_integrity_checks_can_be_disabled() {
        let inventory = vec![record("P1", "01-01-001A", 1), record("P1", "01-01-002A", 1)];
        let anomalies = run(
            &DataIntegrityEvaluator,
            json!({"check_duplicate_scans": false}),
            &inventory,
            vec![],
        );
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_location_mapping_error() {
        let mut wrong = record("P1", "RECV-01", 1);
        wrong.location_type = Some("STORAGE".to_string());
        let mut right = record("P2", "RECV-01", 1);
        right.location_type = Some("receiving".to_string());
        let undeclared = record("P3", "RECV-01", 1);

        let inventory = vec![wrong, right, undeclared];
        let anomalies = run(&LocationMappingErrorEvaluator, json!({}), &inventory, vec![]);
        assert_eq!(flagged(&anomalies), vec!["P1"]);
        assert!(anomalies[0].details.contains("RECEIVING"));
    }

    #[test]
    fn test_location_mapping_error_ignores_unrecognized_declared_type() {
        let mut rack = record("P1", "01-01-001A", 1);
        rack.location_type = Some("RACK".to_string());
        let mut frozen = record("P2", "01-01-002A", 1);
        frozen.location_type = Some("FROZEN".to_string());
        let mut wrong = record("P3", "01-01-003A", 1);
        wrong.location_type = Some("DOCK".to_string());

        let inventory = vec![rack, frozen, wrong];
        let anomalies = run(&LocationMappingErrorEvaluator, json!({}), &inventory, vec![]);
        assert_eq!(flagged(&anomalies), vec!["P3"]);
    }
}
