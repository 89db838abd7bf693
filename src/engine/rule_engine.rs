// ==========================================
// WareWise 仓库异常检测 - 规则引擎
// ==========================================
// 职责: 按优先级调度规则到对应评估器，汇总异常与执行统计
// 红线: 单条规则失败不得中断整批评估
// ==========================================

use crate::domain::inventory::InventoryRecord;
use crate::domain::rule::{Anomaly, Rule};
use crate::domain::types::RuleType;
use crate::engine::error::EngineError;
use crate::engine::evaluators::{default_evaluators, EvaluationContext, RuleEvaluator};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// RuleResult - 单条规则执行结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: i64,
    pub rule_name: String,
    pub rule_type: RuleType,
    pub success: bool,
    pub anomaly_count: usize,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

// ==========================================
// AnomalySummary - 异常汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub total_anomalies: usize,
    /// 被标记的不同托盘数
    pub flagged_pallets: usize,
    pub by_priority: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub rules_evaluated: usize,
    pub rules_failed: usize,
}

// ==========================================
// EvaluationReport - 一次评估的完整输出
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub analysis_id: String,
    pub warehouse_id: String,
    pub anomalies: Vec<Anomaly>,
    pub rule_results: Vec<RuleResult>,
    pub summary: AnomalySummary,
}

impl EvaluationReport {
    pub fn failed_rules(&self) -> impl Iterator<Item = &RuleResult> {
        self.rule_results.iter().filter(|r| !r.success)
    }
}

// ==========================================
// RuleEngine
// ==========================================
pub struct RuleEngine {
    evaluators: HashMap<RuleType, Arc<dyn RuleEvaluator>>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    /// 注册全部内置评估器
    pub fn new() -> Self {
        let mut engine = Self::empty();
        for evaluator in default_evaluators() {
            engine.register(evaluator);
        }
        engine
    }

    /// 无评估器（测试或自定义注册用）
    pub fn empty() -> Self {
        Self {
            evaluators: HashMap::new(),
        }
    }

    /// 注册评估器（同类型覆盖）
    pub fn register(&mut self, evaluator: Arc<dyn RuleEvaluator>) {
        self.evaluators.insert(evaluator.rule_type(), evaluator);
    }

    pub fn has_evaluator(&self, rule_type: RuleType) -> bool {
        self.evaluators.contains_key(&rule_type)
    }

    /// 评估全部启用规则
    ///
    /// # 规则
    /// - 仅评估 is_active 规则
    /// - 顺序: 优先级降序，同优先级按 rule_id 升序
    /// - 评估器缺失或报错 → 记录失败的 RuleResult，继续下一条
    #[instrument(skip(self, rules, inventory, ctx), fields(
        warehouse_id = %ctx.warehouse_id,
        rules = rules.len(),
        records = inventory.len()
    ))]
    pub fn evaluate_all(
        &self,
        rules: &[Rule],
        inventory: &[InventoryRecord],
        ctx: &EvaluationContext,
    ) -> EvaluationReport {
        let analysis_id = Uuid::new_v4().to_string();

        let mut active: Vec<&Rule> = rules.iter().filter(|r| r.is_active).collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.rule_id.cmp(&b.rule_id)));

        let mut anomalies = Vec::new();
        let mut rule_results = Vec::with_capacity(active.len());

        for rule in active {
            let started = Instant::now();
            let outcome = match self.evaluators.get(&rule.rule_type) {
                Some(evaluator) => evaluator.evaluate(rule, inventory, ctx),
                None => Err(EngineError::EvaluatorNotFound(rule.rule_type.to_string())),
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(found) => {
                    debug!(
                        rule_id = rule.rule_id,
                        rule = %rule.name,
                        anomalies = found.len(),
                        elapsed_ms,
                        "规则评估完成"
                    );
                    rule_results.push(RuleResult {
                        rule_id: rule.rule_id,
                        rule_name: rule.name.clone(),
                        rule_type: rule.rule_type,
                        success: true,
                        anomaly_count: found.len(),
                        elapsed_ms,
                        error: None,
                    });
                    anomalies.extend(found);
                }
                Err(e) => {
                    warn!(rule_id = rule.rule_id, rule = %rule.name, error = %e, "规则评估失败，已跳过");
                    rule_results.push(RuleResult {
                        rule_id: rule.rule_id,
                        rule_name: rule.name.clone(),
                        rule_type: rule.rule_type,
                        success: false,
                        anomaly_count: 0,
                        elapsed_ms,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let summary = summarize(&anomalies, &rule_results);
        info!(
            analysis_id = %analysis_id,
            anomalies = summary.total_anomalies,
            flagged_pallets = summary.flagged_pallets,
            rules_failed = summary.rules_failed,
            "规则引擎评估完成"
        );

        EvaluationReport {
            analysis_id,
            warehouse_id: ctx.warehouse_id.clone(),
            anomalies,
            rule_results,
            summary,
        }
    }
}

fn summarize(anomalies: &[Anomaly], rule_results: &[RuleResult]) -> AnomalySummary {
    let mut summary = AnomalySummary {
        total_anomalies: anomalies.len(),
        rules_evaluated: rule_results.len(),
        rules_failed: rule_results.iter().filter(|r| !r.success).count(),
        ..Default::default()
    };

    let mut pallets: HashSet<&str> = HashSet::new();
    for anomaly in anomalies {
        *summary
            .by_priority
            .entry(anomaly.priority.as_str().to_string())
            .or_insert(0) += 1;
        *summary.by_type.entry(anomaly.anomaly_type.clone()).or_insert(0) += 1;
        pallets.insert(anomaly.pallet_id.as_str());
    }
    summary.flagged_pallets = pallets.len();
    summary
}

// ==========================================
// 测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::default_rules;
    use crate::domain::types::Priority;
    use crate::engine::error::EngineResult;
    use crate::engine::pattern_resolver::RulePatterns;
    use crate::engine::template_resolver::test_template;
    use crate::engine::virtual_location::VirtualLocationEngine;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use serde_json::json;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn context(inventory: &[InventoryRecord]) -> EvaluationContext {
        let template = test_template();
        let patterns = RulePatterns::from_template("USER_TESTF", &template).unwrap();
        let mut ctx = EvaluationContext::new(
            "USER_TESTF",
            now(),
            Arc::new(VirtualLocationEngine::new(template)),
            Arc::new(patterns),
            vec![],
            0.5,
        );
        ctx.prepare(inventory);
        ctx
    }

    fn sample_inventory() -> Vec<InventoryRecord> {
        vec![
            InventoryRecord::new("P1", "RECV-01", now() - Duration::hours(15)),
            InventoryRecord::new("P2", "01-01-001A", now() - Duration::hours(1)),
            InventoryRecord::new("P3", "01-01-001A", now() - Duration::hours(1)),
            InventoryRecord::new("P4", "09-01-001A", now() - Duration::hours(1)),
        ]
    }

    struct FailingEvaluator;

    impl RuleEvaluator for FailingEvaluator {
        fn rule_type(&self) -> RuleType {
            RuleType::InvalidLocation
        }

        fn evaluate(
            &self,
            _rule: &Rule,
            _inventory: &[InventoryRecord],
            _ctx: &EvaluationContext,
        ) -> EngineResult<Vec<Anomaly>> {
            Err(EngineError::InternalError("boom".to_string()))
        }
    }

    #[test]
    fn test_default_rules_produce_anomalies() {
        let inventory = sample_inventory();
        let ctx = context(&inventory);
        let report = RuleEngine::new().evaluate_all(&default_rules(), &inventory, &ctx);

        assert_eq!(report.rule_results.len(), 8);
        assert!(report.rule_results.iter().all(|r| r.success));
        assert!(Uuid::parse_str(&report.analysis_id).is_ok());

        let stagnant: Vec<_> = report
            .anomalies
            .iter()
            .filter(|a| a.rule_type == RuleType::StagnantPallets)
            .collect();
        assert_eq!(stagnant.len(), 1);
        assert_eq!(stagnant[0].pallet_id, "P1");

        let over: Vec<_> = report
            .anomalies
            .iter()
            .filter(|a| a.rule_type == RuleType::Overcapacity)
            .collect();
        assert_eq!(over.len(), 2);

        assert!(report
            .anomalies
            .iter()
            .any(|a| a.rule_type == RuleType::InvalidLocation && a.pallet_id == "P4"));
        assert_eq!(report.summary.flagged_pallets, 4);
        assert_eq!(report.summary.total_anomalies, report.anomalies.len());
    }

    #[test]
    fn test_failing_rule_is_isolated() {
        let inventory = sample_inventory();
        let ctx = context(&inventory);
        let mut engine = RuleEngine::new();
        engine.register(Arc::new(FailingEvaluator));

        let report = engine.evaluate_all(&default_rules(), &inventory, &ctx);
        let failed: Vec<_> = report.failed_rules().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].rule_type, RuleType::InvalidLocation);
        assert!(failed[0].error.as_deref().unwrap_or_default().contains("boom"));

        assert!(report
            .anomalies
            .iter()
            .any(|a| a.rule_type == RuleType::StagnantPallets));
        assert_eq!(report.summary.rules_failed, 1);
    }

    #[test]
    fn test_missing_evaluator_and_bad_conditions_recorded() {
        let inventory = sample_inventory();
        let ctx = context(&inventory);
        let rules = vec![
            Rule::new(1, "stagnant", RuleType::StagnantPallets, Priority::High, json!({})),
            Rule::new(
                2,
                "broken",
                RuleType::StagnantPallets,
                Priority::Medium,
                json!({"time_threshold_hours": "soon"}),
            ),
        ];

        let report = RuleEngine::empty().evaluate_all(&rules, &inventory, &ctx);
        assert_eq!(report.summary.rules_failed, 2);

        let report = RuleEngine::new().evaluate_all(&rules, &inventory, &ctx);
        assert_eq!(report.summary.rules_failed, 1);
        assert_eq!(report.rule_results[0].rule_id, 1);
        assert!(report.rule_results[1]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("time_threshold_hours"));
    }

    #[test]
    fn test_inactive_rules_skipped_and_priority_order() {
        let inventory = sample_inventory();
        let ctx = context(&inventory);
        let low = Rule::new(1, "low", RuleType::DataIntegrity, Priority::Low, json!({}));
        let high = Rule::new(2, "high", RuleType::Overcapacity, Priority::VeryHigh, json!({}));
        let mut off = Rule::new(3, "off", RuleType::InvalidLocation, Priority::VeryHigh, json!({}));
        off.is_active = false;

        let report = RuleEngine::new().evaluate_all(&[low, high, off], &inventory, &ctx);
        let order: Vec<i64> = report.rule_results.iter().map(|r| r.rule_id).collect();
        assert_eq!(order, vec![2, 1]);
    }
}
