// ==========================================
// WareWise 仓库异常检测 - 配置层
// ==========================================
// 职责: 系统配置管理，支持仓库级覆写
// 存储: config_kv 表
// ==========================================

pub mod analysis_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use analysis_config_trait::AnalysisConfigReader;
pub use config_manager::{config_keys, ConfigManager, ConfigScope};
