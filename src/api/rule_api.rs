// ==========================================
// WareWise 仓库异常检测 - 规则管理 API
// ==========================================
// 职责: 规则查询、新增、启停、条件修改、默认规则初始化、执行统计查询
// ==========================================

use serde_json::Value;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::rule::{Rule, RuleCategory, RulePerformance};
use crate::engine::evaluators::conditions::RuleConditions;
use crate::engine::rule_engine::RuleEngine;
use crate::repository::rule_repo::RuleRepository;

/// 执行统计默认返回条数
const DEFAULT_PERFORMANCE_LIMIT: usize = 50;

pub struct RuleApi {
    rule_repo: Arc<RuleRepository>,
    engine: Arc<RuleEngine>,
}

impl RuleApi {
    pub fn new(rule_repo: Arc<RuleRepository>, engine: Arc<RuleEngine>) -> Self {
        Self { rule_repo, engine }
    }

    /// 查询规则
    ///
    /// # 参数
    /// - active_only: true 时仅返回启用规则
    pub fn list_rules(&self, active_only: bool) -> ApiResult<Vec<Rule>> {
        let rules = if active_only {
            self.rule_repo.list_active()?
        } else {
            self.rule_repo.list_all()?
        };
        Ok(rules)
    }

    pub fn get_rule(&self, rule_id: i64) -> ApiResult<Rule> {
        self.rule_repo
            .find_by_id(rule_id)?
            .ok_or_else(|| ApiError::NotFound(format!("规则 {} 不存在", rule_id)))
    }

    pub fn list_categories(&self) -> ApiResult<Vec<RuleCategory>> {
        Ok(self.rule_repo.list_categories()?)
    }

    /// 新增规则，返回 rule_id
    ///
    /// # 校验
    /// - 名称非空
    /// - conditions 为 JSON 对象
    /// - 规则类型已注册评估器
    pub fn create_rule(&self, rule: &Rule) -> ApiResult<i64> {
        if rule.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("规则名称不能为空".to_string()));
        }
        RuleConditions::new(rule)?;
        if !self.engine.has_evaluator(rule.rule_type) {
            return Err(ApiError::RuleConfigurationError(format!(
                "规则类型 {} 无对应评估器",
                rule.rule_type
            )));
        }

        let rule_id = self.rule_repo.create(rule)?;
        tracing::info!(rule_id, rule = %rule.name, rule_type = %rule.rule_type, "规则已创建");
        Ok(rule_id)
    }

    pub fn set_rule_active(&self, rule_id: i64, is_active: bool) -> ApiResult<()> {
        self.rule_repo.set_active(rule_id, is_active)?;
        tracing::info!(rule_id, is_active, "规则启停状态已更新");
        Ok(())
    }

    /// 修改规则条件（必须为 JSON 对象）
    pub fn update_rule_conditions(&self, rule_id: i64, conditions: Value) -> ApiResult<()> {
        if !conditions.is_object() {
            return Err(ApiError::InvalidInput("规则条件必须为 JSON 对象".to_string()));
        }

        let mut rule = self.get_rule(rule_id)?;
        rule.conditions = conditions;
        RuleConditions::new(&rule)?;

        self.rule_repo.update_conditions(rule_id, &rule.conditions)?;
        tracing::info!(rule_id, "规则条件已更新");
        Ok(())
    }

    /// 初始化内置分类与默认规则（幂等）
    pub fn seed_defaults(&self) -> ApiResult<usize> {
        Ok(self.rule_repo.seed_default_rules()?)
    }

    /// 规则执行历史
    pub fn rule_performance(
        &self,
        rule_id: i64,
        limit: Option<usize>,
    ) -> ApiResult<Vec<RulePerformance>> {
        let limit = limit.unwrap_or(DEFAULT_PERFORMANCE_LIMIT).max(1);
        Ok(self.rule_repo.list_performance(rule_id, limit)?)
    }
}
