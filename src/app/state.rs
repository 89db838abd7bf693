// ==========================================
// WareWise 仓库异常检测 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和 API 实例
// 连接: 单一 Arc<Mutex<Connection>> 由全部仓储共享
// ==========================================

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{AnalysisApi, AnalysisSettings, LocationApi, RuleApi, TemplateApi};
use crate::config::{AnalysisConfigReader, ConfigManager};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::engine::pattern_resolver::RulePatternResolver;
use crate::engine::rule_engine::RuleEngine;
use crate::engine::template_resolver::{TemplateStore, WarehouseTemplateResolver};
use crate::monitoring::{install_slow_sql_logging, PrunerHandle, RequestMonitor};
use crate::repository::{LocationRepository, RuleRepository, TemplateRepository};

/// 监控缓冲清理间隔
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// 应用状态
///
/// 包含所有 API 实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 异常分析 API
    pub analysis_api: Arc<AnalysisApi>,

    /// 仓库模板 API
    pub template_api: Arc<TemplateApi>,

    /// 规则管理 API
    pub rule_api: Arc<RuleApi>,

    /// 登记库位 API
    pub location_api: Arc<LocationApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作监控缓冲
    pub monitor: Arc<RequestMonitor>,

    /// 模板解析器（缓存统计查询用）
    pub template_resolver: Arc<WarehouseTemplateResolver>,

    /// 后台清理线程（随 AppState 释放而停止）
    pruner: Option<PrunerHandle>,
}

impl AppState {
    /// 创建新的 AppState 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并建表
    /// 2. 从配置层读取缓存 TTL、分类阈值、监控参数
    /// 3. 初始化 Repository / Engine / API
    /// 4. 启动监控缓冲清理线程
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let mut conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        install_slow_sql_logging(&mut conn);
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置层
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let loaded = load_runtime_config(config_manager.as_ref())
            .await
            .map_err(|e| format!("读取配置失败: {}", e))?;

        // ==========================================
        // Repository 层
        // ==========================================
        let template_repo = Arc::new(TemplateRepository::from_connection(conn.clone()));
        let location_repo = Arc::new(LocationRepository::from_connection(conn.clone()));
        let rule_repo = Arc::new(RuleRepository::from_connection(conn.clone()));

        // ==========================================
        // Engine 层
        // ==========================================
        let store: Arc<dyn TemplateStore> = template_repo.clone();
        let template_resolver = Arc::new(WarehouseTemplateResolver::new(
            Some(store),
            Duration::from_secs(loaded.template_cache_ttl_secs),
        ));
        let pattern_resolver = Arc::new(RulePatternResolver::new(
            template_resolver.clone(),
            Duration::from_secs(loaded.pattern_cache_ttl_secs),
        ));
        let engine = Arc::new(RuleEngine::new());

        // ==========================================
        // 监控
        // ==========================================
        let monitor = Arc::new(RequestMonitor::new(loaded.monitor_buffer_size));
        let retention = Duration::from_secs(loaded.monitor_retention_hours * 3600);
        let pruner = match monitor.start_pruner(PRUNE_INTERVAL, retention) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("监控清理线程启动失败(将继续启动): {}", e);
                None
            }
        };

        // ==========================================
        // API 层
        // ==========================================
        let analysis_api = Arc::new(AnalysisApi::new(
            rule_repo.clone(),
            location_repo.clone(),
            template_resolver.clone(),
            pattern_resolver.clone(),
            engine.clone(),
            monitor.clone(),
            loaded.settings,
        ));
        let template_api = Arc::new(TemplateApi::new(
            template_repo,
            location_repo.clone(),
            template_resolver.clone(),
            pattern_resolver,
            monitor.clone(),
        ));
        let rule_api = Arc::new(RuleApi::new(rule_repo, engine));
        let location_api = Arc::new(LocationApi::new(location_repo));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            analysis_api,
            template_api,
            rule_api,
            location_api,
            config_manager,
            monitor,
            template_resolver,
            pruner,
        })
    }

    /// 停止后台清理线程
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.pruner.take() {
            handle.stop();
        }
    }
}

/// 运行期配置快照
struct RuntimeConfig {
    template_cache_ttl_secs: u64,
    pattern_cache_ttl_secs: u64,
    monitor_buffer_size: usize,
    monitor_retention_hours: u64,
    settings: AnalysisSettings,
}

async fn load_runtime_config(
    reader: &dyn AnalysisConfigReader,
) -> Result<RuntimeConfig, Box<dyn std::error::Error>> {
    let settings = AnalysisSettings {
        classifier_min_confidence: reader.get_classifier_min_confidence().await?,
        column_match_threshold: reader.get_column_match_threshold().await?,
        default_stagnant_hours: reader.get_default_stagnant_hours().await?,
    };
    Ok(RuntimeConfig {
        template_cache_ttl_secs: reader.get_template_cache_ttl_secs().await?,
        pattern_cache_ttl_secs: reader.get_pattern_cache_ttl_secs().await?,
        monitor_buffer_size: reader.get_monitor_buffer_size().await?,
        monitor_retention_hours: reader.get_monitor_retention_hours().await?,
        settings,
    })
}

/// 获取默认数据库路径
///
/// 位于用户数据目录下的 warewise/warewise.db；目录不可用时退回当前目录
pub fn get_default_db_path() -> String {
    match dirs::data_local_dir() {
        Some(dir) => {
            let app_dir = dir.join("warewise");
            if let Err(e) = std::fs::create_dir_all(&app_dir) {
                tracing::warn!("无法创建数据目录 {}: {}", app_dir.display(), e);
                return "warewise.db".to_string();
            }
            app_dir.join("warewise.db").to_string_lossy().to_string()
        }
        None => "warewise.db".to_string(),
    }
}
