// ==========================================
// WareWise 仓库异常检测 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 库存快照异常检测（模板化库位校验 + 可配置规则引擎）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 库位解析与规则评估
pub mod engine;

// 导入层 - 表头匹配与库存映射
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 运行监控
pub mod monitoring;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ClassificationMethod, LocationFormatKind, LocationType, Priority, RuleType};

// 领域实体
pub use domain::{Anomaly, InventoryRecord, Location, Rule, WarehouseTemplate};

// 引擎
pub use engine::{
    EnhancedLocationClassifier, LocationFormatDetector, RuleEngine, RulePatternResolver,
    VirtualLocationEngine, WarehouseTemplateResolver,
};

// API
pub use api::{AnalysisApi, AnalysisReport, LocationApi, RuleApi, TemplateApi};

// 应用状态
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "WareWise";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "WareWise");
    }
}
