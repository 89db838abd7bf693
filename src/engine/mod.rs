// ==========================================
// WareWise 仓库异常检测 - 引擎层
// ==========================================
// 职责: 库位编码解析、虚拟模板校验、库位分类、模板/模式解析、规则评估
// 红线: Engine 不拼 SQL，所有异常必须输出 details
// ==========================================

pub mod cache;
pub mod error;
pub mod evaluators;
pub mod format_detector;
pub mod location_classifier;
pub mod location_code;
pub mod pattern_resolver;
pub mod rule_engine;
pub mod template_resolver;
pub mod virtual_location;

// 重导出核心引擎
pub use cache::{CacheStats, TtlCache};
pub use error::{EngineError, EngineResult};
pub use evaluators::{default_evaluators, EvaluationContext, RuleEvaluator};
pub use format_detector::{FormatDetection, LocationFormatDetector};
pub use location_classifier::{BehaviorProfile, EnhancedLocationClassifier, LocationClassification};
pub use pattern_resolver::{RulePatternResolver, RulePatterns};
pub use rule_engine::{AnomalySummary, EvaluationReport, RuleEngine, RuleResult};
pub use template_resolver::{
    ResolvedTemplate, TemplateSource, TemplateStore, WarehouseTemplateResolver,
};
pub use virtual_location::{TemplateSummary, VirtualLocationEngine};
