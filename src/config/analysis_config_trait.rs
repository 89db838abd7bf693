// ==========================================
// WareWise 仓库异常检测 - 分析配置读取 Trait
// ==========================================
// 职责: 定义分析流程所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// AnalysisConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
// 约定: 配置缺失或无法解析时返回默认值，不返回错误
#[async_trait]
pub trait AnalysisConfigReader: Send + Sync {
    // ===== 缓存配置 =====

    /// 模板解析缓存 TTL（秒）
    ///
    /// # 默认值
    /// - 300
    async fn get_template_cache_ttl_secs(&self) -> Result<u64, Box<dyn Error>>;

    /// 规则模式缓存 TTL（秒）
    ///
    /// # 默认值
    /// - 300
    async fn get_pattern_cache_ttl_secs(&self) -> Result<u64, Box<dyn Error>>;

    // ===== 规则默认值 =====

    /// 滞留规则默认阈值（小时），规则条件未指定时使用
    ///
    /// # 默认值
    /// - 10.0
    async fn get_default_stagnant_hours(&self) -> Result<f64, Box<dyn Error>>;

    // ===== 导入与分类 =====

    /// 列名匹配阈值（0~1）
    ///
    /// # 默认值
    /// - 0.7
    async fn get_column_match_threshold(&self) -> Result<f64, Box<dyn Error>>;

    /// 库位分类最小置信度（0~1）
    ///
    /// # 默认值
    /// - 0.5
    async fn get_classifier_min_confidence(&self) -> Result<f64, Box<dyn Error>>;

    // ===== 监控 =====

    /// 监控环形缓冲容量
    ///
    /// # 默认值
    /// - 1000
    async fn get_monitor_buffer_size(&self) -> Result<usize, Box<dyn Error>>;

    /// 监控记录保留时长（小时）
    ///
    /// # 默认值
    /// - 24
    async fn get_monitor_retention_hours(&self) -> Result<u64, Box<dyn Error>>;
}
