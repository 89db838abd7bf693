// ==========================================
// WareWise 仓库异常检测 - API 层
// ==========================================
// 职责: 进程内业务接口，供 CLI 与集成方调用
// ==========================================

pub mod analysis_api;
pub mod error;
pub mod location_api;
pub mod rule_api;
pub mod template_api;

// 重导出核心类型
pub use analysis_api::{AnalysisApi, AnalysisReport, AnalysisSettings};
pub use error::{ApiError, ApiResult};
pub use location_api::LocationApi;
pub use rule_api::RuleApi;
pub use template_api::{ResolvedTemplateInfo, TemplateApi};
