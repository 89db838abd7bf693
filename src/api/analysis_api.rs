// ==========================================
// WareWise 仓库异常检测 - 异常分析 API
// ==========================================
// 职责: 模板解析 → 上下文构建 → 规则评估 → 执行统计落库
// 红线: 单条规则失败只记录，不中断分析
// ==========================================

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::inventory::InventoryRecord;
use crate::domain::rule::{default_rules, Anomaly, Rule, RulePerformance};
use crate::domain::types::RuleType;
use crate::engine::evaluators::EvaluationContext;
use crate::engine::location_classifier::DEFAULT_MIN_CONFIDENCE;
use crate::engine::pattern_resolver::RulePatternResolver;
use crate::engine::rule_engine::{AnomalySummary, EvaluationReport, RuleEngine, RuleResult};
use crate::engine::template_resolver::{TemplateSource, WarehouseTemplateResolver};
use crate::engine::virtual_location::VirtualLocationEngine;
use crate::importer::column_matcher::{ColumnMapping, ColumnMatcher};
use crate::importer::error::ImportError;
use crate::importer::inventory_mapper::{DqViolation, InventoryMapper};
use crate::monitoring::{log_database_error, OperationGuard, RequestMonitor};
use crate::repository::location_repo::LocationRepository;
use crate::repository::rule_repo::RuleRepository;

// ==========================================
// AnalysisSettings - 分析参数（来自配置层）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSettings {
    pub classifier_min_confidence: f64,
    pub column_match_threshold: f64,
    /// 未配置 time_threshold_hours 的滞留规则使用此值
    pub default_stagnant_hours: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            classifier_min_confidence: DEFAULT_MIN_CONFIDENCE,
            column_match_threshold: 0.7,
            default_stagnant_hours: 10.0,
        }
    }
}

// ==========================================
// AnalysisReport - 分析报告
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub analysis_id: String,
    pub warehouse_id: String,
    pub template_id: String,
    pub template_source: TemplateSource,
    pub total_records: usize,
    pub anomalies: Vec<Anomaly>,
    pub rule_results: Vec<RuleResult>,
    pub summary: AnomalySummary,
    /// 仅 analyze_rows 填充
    pub column_mapping: Option<ColumnMapping>,
    pub dq_violations: Vec<DqViolation>,
    pub generated_at: NaiveDateTime,
}

// ==========================================
// AnalysisApi
// ==========================================
pub struct AnalysisApi {
    rule_repo: Arc<RuleRepository>,
    location_repo: Arc<LocationRepository>,
    template_resolver: Arc<WarehouseTemplateResolver>,
    pattern_resolver: Arc<RulePatternResolver>,
    engine: Arc<RuleEngine>,
    monitor: Arc<RequestMonitor>,
    settings: AnalysisSettings,
}

impl AnalysisApi {
    pub fn new(
        rule_repo: Arc<RuleRepository>,
        location_repo: Arc<LocationRepository>,
        template_resolver: Arc<WarehouseTemplateResolver>,
        pattern_resolver: Arc<RulePatternResolver>,
        engine: Arc<RuleEngine>,
        monitor: Arc<RequestMonitor>,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            rule_repo,
            location_repo,
            template_resolver,
            pattern_resolver,
            engine,
            monitor,
            settings,
        }
    }

    pub fn settings(&self) -> AnalysisSettings {
        self.settings
    }

    /// 对已映射的库存记录执行异常分析（以当前 UTC 时间为基准）
    pub fn run_analysis(
        &self,
        warehouse_id: &str,
        inventory: &[InventoryRecord],
    ) -> ApiResult<AnalysisReport> {
        self.run_analysis_at(warehouse_id, inventory, Utc::now().naive_utc())
    }

    /// 指定基准时间执行异常分析
    ///
    /// # 返回
    /// - Ok(AnalysisReport): 含失败规则的 RuleResult
    /// - Err(ApiError): 输入无效或基础数据不可用
    pub fn run_analysis_at(
        &self,
        warehouse_id: &str,
        inventory: &[InventoryRecord],
        now: NaiveDateTime,
    ) -> ApiResult<AnalysisReport> {
        let mut guard = OperationGuard::new(&self.monitor, "run_analysis", Some(warehouse_id));
        let result = self.analyze(warehouse_id, inventory, now);
        if let Err(e) = &result {
            guard.fail(e.to_string());
        }
        result
    }

    /// 源数据行 → 列匹配 → 映射 → 分析
    ///
    /// 表头取所有行键的并集；DQ 违规随报告返回
    pub fn analyze_rows(
        &self,
        warehouse_id: &str,
        rows: &[HashMap<String, String>],
    ) -> ApiResult<AnalysisReport> {
        self.analyze_rows_at(warehouse_id, rows, Utc::now().naive_utc())
    }

    pub fn analyze_rows_at(
        &self,
        warehouse_id: &str,
        rows: &[HashMap<String, String>],
        now: NaiveDateTime,
    ) -> ApiResult<AnalysisReport> {
        let mut guard = OperationGuard::new(&self.monitor, "analyze_rows", Some(warehouse_id));
        let result = self.map_and_analyze(warehouse_id, rows, now);
        if let Err(e) = &result {
            guard.fail(e.to_string());
        }
        result
    }

    fn map_and_analyze(
        &self,
        warehouse_id: &str,
        rows: &[HashMap<String, String>],
        now: NaiveDateTime,
    ) -> ApiResult<AnalysisReport> {
        if rows.is_empty() {
            return Err(ImportError::EmptyInventory.into());
        }

        let headers: Vec<String> = rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mapping =
            ColumnMatcher::new(self.settings.column_match_threshold).match_columns(&headers);
        let mapped = InventoryMapper::map_rows(rows, &mapping)?;
        if !mapping.unmatched_headers.is_empty() {
            tracing::debug!(headers = ?mapping.unmatched_headers, "未匹配的源表头");
        }

        let mut report = self.analyze(warehouse_id, &mapped.records, now)?;
        report.column_mapping = Some(mapping);
        report.dq_violations = mapped.violations;
        Ok(report)
    }

    fn analyze(
        &self,
        warehouse_id: &str,
        inventory: &[InventoryRecord],
        now: NaiveDateTime,
    ) -> ApiResult<AnalysisReport> {
        let warehouse_key = warehouse_id.trim().to_uppercase();
        if warehouse_key.is_empty() {
            return Err(ApiError::InvalidInput("仓库 ID 不能为空".to_string()));
        }
        if inventory.is_empty() {
            return Err(ImportError::EmptyInventory.into());
        }

        // 1. 模板与规则模式
        let resolved = self.template_resolver.resolve(&warehouse_key)?;
        let virtual_engine =
            Arc::new(VirtualLocationEngine::new(resolved.template.as_ref().clone()));
        let patterns = self.pattern_resolver.resolve_patterns(&warehouse_key)?;

        // 2. 登记库位（覆盖模板推算的类型/容量）
        let locations = self.location_repo.list_by_warehouse(&warehouse_key)?;

        let mut ctx = EvaluationContext::new(
            &warehouse_key,
            now,
            virtual_engine,
            patterns,
            locations,
            self.settings.classifier_min_confidence,
        )
        .with_pattern_resolver(self.pattern_resolver.clone());
        ctx.prepare(inventory);

        // 3. 规则
        let mut rules = self.rule_repo.list_active()?;
        if rules.is_empty() {
            tracing::warn!(warehouse_id = %warehouse_key, "未配置启用规则，使用内置默认规则");
            rules = default_rules();
        }
        apply_default_thresholds(&mut rules, self.settings.default_stagnant_hours);

        // 4. 评估
        let evaluation = self.engine.evaluate_all(&rules, inventory, &ctx);
        self.record_performance(&evaluation);

        Ok(AnalysisReport {
            analysis_id: evaluation.analysis_id,
            warehouse_id: warehouse_key,
            template_id: resolved.template.template_id.clone(),
            template_source: resolved.source,
            total_records: inventory.len(),
            anomalies: evaluation.anomalies,
            rule_results: evaluation.rule_results,
            summary: evaluation.summary,
            column_mapping: None,
            dq_violations: Vec::new(),
            generated_at: now,
        })
    }

    /// 规则执行统计落库（失败只记录日志）
    fn record_performance(&self, evaluation: &EvaluationReport) {
        let recorded_at = Utc::now();
        for result in &evaluation.rule_results {
            // 内置默认规则未落库，无 rule_id
            if result.rule_id <= 0 {
                continue;
            }
            let perf = RulePerformance {
                rule_id: result.rule_id,
                analysis_id: evaluation.analysis_id.clone(),
                anomalies_detected: result.anomaly_count,
                execution_time_ms: result.elapsed_ms,
                success: result.success,
                error_message: result.error.clone(),
                recorded_at,
            };
            if let Err(e) = self.rule_repo.record_performance(&perf) {
                log_database_error("rule_repo.record_performance", &e);
            }
        }
    }
}

/// 滞留类规则缺省阈值
fn apply_default_thresholds(rules: &mut [Rule], default_stagnant_hours: f64) {
    for rule in rules.iter_mut() {
        if rule.rule_type != RuleType::StagnantPallets {
            continue;
        }
        if let Value::Object(map) = &mut rule.conditions {
            map.entry("time_threshold_hours")
                .or_insert_with(|| Value::from(default_stagnant_hours));
        }
    }
}
