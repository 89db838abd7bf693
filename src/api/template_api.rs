// ==========================================
// WareWise 仓库异常检测 - 仓库模板 API
// ==========================================
// 职责: 模板创建/绑定、模板解析、库位校验、编码格式探测
// 红线: 模板变更后必须失效解析缓存
// ==========================================

use serde::Serialize;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::location::LocationValidation;
use crate::domain::warehouse::WarehouseTemplate;
use crate::engine::format_detector::{FormatDetection, LocationFormatDetector};
use crate::engine::location_code;
use crate::engine::pattern_resolver::RulePatternResolver;
use crate::engine::template_resolver::{TemplateSource, WarehouseTemplateResolver};
use crate::engine::virtual_location::{TemplateSummary, VirtualLocationEngine};
use crate::monitoring::{OperationGuard, RequestMonitor};
use crate::repository::location_repo::LocationRepository;
use crate::repository::template_repo::TemplateRepository;

// ==========================================
// ResolvedTemplateInfo - 模板解析结果（前端展示用）
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedTemplateInfo {
    pub warehouse_id: String,
    pub source: TemplateSource,
    pub template: WarehouseTemplate,
    pub summary: TemplateSummary,
}

// ==========================================
// TemplateApi
// ==========================================
pub struct TemplateApi {
    template_repo: Arc<TemplateRepository>,
    location_repo: Arc<LocationRepository>,
    template_resolver: Arc<WarehouseTemplateResolver>,
    pattern_resolver: Arc<RulePatternResolver>,
    monitor: Arc<RequestMonitor>,
}

impl TemplateApi {
    pub fn new(
        template_repo: Arc<TemplateRepository>,
        location_repo: Arc<LocationRepository>,
        template_resolver: Arc<WarehouseTemplateResolver>,
        pattern_resolver: Arc<RulePatternResolver>,
        monitor: Arc<RequestMonitor>,
    ) -> Self {
        Self {
            template_repo,
            location_repo,
            template_resolver,
            pattern_resolver,
            monitor,
        }
    }

    /// 创建模板
    ///
    /// # 返回
    /// - Err(InvalidTemplate): 结构参数违反不变量
    /// - Err(BusinessRuleViolation): template_id 重复
    pub fn create_template(&self, template: &WarehouseTemplate) -> ApiResult<()> {
        if template.template_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("模板 ID 不能为空".to_string()));
        }
        if let Err(errors) = template.validate() {
            return Err(ApiError::InvalidTemplate(format!(
                "template_id={}: {}",
                template.template_id,
                errors.join("; ")
            )));
        }

        let mut guard = OperationGuard::new(
            &self.monitor,
            "create_template",
            template.warehouse_id.as_deref(),
        );
        if let Err(e) = self.template_repo.create(template) {
            guard.fail(e.to_string());
            return Err(e.into());
        }

        // 已绑定仓库的启用模板立即生效
        if let (Some(warehouse_id), true) = (template.warehouse_id.as_deref(), template.is_active) {
            self.pattern_resolver.invalidate(warehouse_id);
        }

        tracing::info!(template_id = %template.template_id, "仓库模板已创建");
        Ok(())
    }

    pub fn get_template(&self, template_id: &str) -> ApiResult<WarehouseTemplate> {
        self.template_repo
            .find_by_id(template_id)?
            .ok_or_else(|| ApiError::NotFound(format!("模板 {} 不存在", template_id)))
    }

    pub fn list_templates(&self) -> ApiResult<Vec<WarehouseTemplate>> {
        Ok(self.template_repo.list_active()?)
    }

    /// 将模板应用到仓库（同仓库其他模板停用）
    pub fn apply_template(&self, template_id: &str, warehouse_id: &str) -> ApiResult<()> {
        if warehouse_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("仓库 ID 不能为空".to_string()));
        }

        let mut guard = OperationGuard::new(&self.monitor, "apply_template", Some(warehouse_id));
        if let Err(e) = self.template_repo.assign_to_warehouse(template_id, warehouse_id) {
            guard.fail(e.to_string());
            return Err(e.into());
        }
        self.pattern_resolver.invalidate(warehouse_id);

        tracing::info!(template_id, warehouse_id, "模板已应用到仓库");
        Ok(())
    }

    /// 解析仓库当前模板
    pub fn resolve_template(&self, warehouse_id: &str) -> ApiResult<ResolvedTemplateInfo> {
        let resolved = self.template_resolver.resolve(warehouse_id)?;
        let template = resolved.template.as_ref().clone();
        let summary = VirtualLocationEngine::new(template.clone()).summary();
        Ok(ResolvedTemplateInfo {
            warehouse_id: warehouse_id.trim().to_uppercase(),
            source: resolved.source,
            template,
            summary,
        })
    }

    /// 校验库位编码
    ///
    /// 模板判定无效时，已登记的启用库位仍视为有效
    pub fn validate_location(
        &self,
        warehouse_id: &str,
        code: &str,
    ) -> ApiResult<LocationValidation> {
        let resolved = self.template_resolver.resolve(warehouse_id)?;
        let engine = VirtualLocationEngine::new(resolved.template.as_ref().clone());
        let validation = engine.validate_location(code);
        if validation.is_valid || code.trim().is_empty() {
            return Ok(validation);
        }

        // 与规则评估一致: 双方均按 location_code::normalize 比较
        let key = location_code::normalize(code);
        let registered = self
            .location_repo
            .list_by_warehouse(warehouse_id)?
            .into_iter()
            .find(|l| l.is_active && location_code::normalize(&l.code) == key);
        match registered {
            Some(location) => Ok(LocationValidation::valid(
                code,
                format!("registered {} location", location.location_type),
            )),
            None => Ok(validation),
        }
    }

    /// 探测样本编码格式
    pub fn detect_format(&self, samples: &[String]) -> ApiResult<FormatDetection> {
        Ok(LocationFormatDetector::detect(samples)?)
    }

    /// 由样本生成模板草案（不落库）
    pub fn suggest_template(
        &self,
        template_id: &str,
        name: &str,
        samples: &[String],
    ) -> ApiResult<WarehouseTemplate> {
        let detection = LocationFormatDetector::detect(samples)?;
        Ok(LocationFormatDetector::suggest_template(template_id, name, &detection))
    }
}
