// ==========================================
// WareWise 仓库异常检测 - 仓库模板解析器
// ==========================================
// 职责: 仓库 ID → 结构模板
// 解析链: 缓存 → 数据库 → 静态注册表 → 子串模式匹配 → 兜底模板
// ==========================================

use crate::domain::types::LocationType;
use crate::domain::warehouse::{SpecialArea, WarehouseTemplate};
use crate::engine::cache::{CacheStats, TtlCache};
use crate::engine::error::{EngineError, EngineResult};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 默认缓存 TTL（秒）
pub const DEFAULT_TEMPLATE_CACHE_TTL_SECS: u64 = 300;

// ==========================================
// TemplateStore - 模板持久化接口
// ==========================================
// 实现者: repository::TemplateRepository
pub trait TemplateStore: Send + Sync {
    /// 查询仓库当前生效的模板
    fn find_active_for_warehouse(&self, warehouse_id: &str)
        -> EngineResult<Option<WarehouseTemplate>>;
}

// ==========================================
// TemplateSource - 解析来源
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateSource {
    Cache,
    Database,
    StaticRegistry,
    PatternMatch,
    Fallback,
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateSource::Cache => write!(f, "CACHE"),
            TemplateSource::Database => write!(f, "DATABASE"),
            TemplateSource::StaticRegistry => write!(f, "STATIC_REGISTRY"),
            TemplateSource::PatternMatch => write!(f, "PATTERN_MATCH"),
            TemplateSource::Fallback => write!(f, "FALLBACK"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    pub template: Arc<WarehouseTemplate>,
    pub source: TemplateSource,
}

// ==========================================
// WarehouseTemplateResolver
// ==========================================
pub struct WarehouseTemplateResolver {
    store: Option<Arc<dyn TemplateStore>>,
    cache: TtlCache<String, Arc<WarehouseTemplate>>,
}

impl WarehouseTemplateResolver {
    pub fn new(store: Option<Arc<dyn TemplateStore>>, ttl: Duration) -> Self {
        Self {
            store,
            cache: TtlCache::new(ttl),
        }
    }

    /// 无数据库的解析器（仅静态注册表 / 模式匹配 / 兜底）
    pub fn without_store() -> Self {
        Self::new(None, Duration::from_secs(DEFAULT_TEMPLATE_CACHE_TTL_SECS))
    }

    /// 解析仓库模板
    ///
    /// # 说明
    /// - 数据库访问失败只记录告警，继续走后续解析链
    /// - 步骤 2~5 的结果写入缓存
    pub fn resolve(&self, warehouse_id: &str) -> EngineResult<ResolvedTemplate> {
        let key = warehouse_id.trim().to_uppercase();
        if key.is_empty() {
            return Err(EngineError::InvalidInput("warehouse_id 不能为空".to_string()));
        }

        // 1. 缓存
        if let Some(template) = self.cache.get(&key) {
            tracing::debug!(warehouse_id = %key, "模板缓存命中");
            return Ok(ResolvedTemplate {
                template,
                source: TemplateSource::Cache,
            });
        }

        let (template, source) = self.resolve_uncached(warehouse_id.trim(), &key);
        let template = Arc::new(template);
        self.cache.insert(key.clone(), template.clone());

        tracing::info!(
            warehouse_id = %key,
            template_id = %template.template_id,
            source = %source,
            "仓库模板解析完成"
        );

        Ok(ResolvedTemplate { template, source })
    }

    fn resolve_uncached(&self, raw_id: &str, key: &str) -> (WarehouseTemplate, TemplateSource) {
        // 2. 数据库
        if let Some(store) = &self.store {
            match store.find_active_for_warehouse(raw_id) {
                Ok(Some(template)) => return (template, TemplateSource::Database),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(warehouse_id = %raw_id, error = %e, "模板数据库查询失败，继续解析链");
                }
            }
        }

        // 3. 静态注册表
        if let Some(template) = static_template(key) {
            return (template, TemplateSource::StaticRegistry);
        }

        // 4. 子串模式匹配
        if let Some(template) = pattern_template(key) {
            return (template, TemplateSource::PatternMatch);
        }

        // 5. 兜底
        (default_template(), TemplateSource::Fallback)
    }

    /// 使单个仓库的缓存失效
    pub fn invalidate(&self, warehouse_id: &str) -> bool {
        self.cache.invalidate(&warehouse_id.trim().to_uppercase())
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

// ==========================================
// 内置模板
// ==========================================

/// 静态注册表（精确匹配仓库 ID）
pub fn static_template(warehouse_key: &str) -> Option<WarehouseTemplate> {
    match warehouse_key {
        "DEFAULT" => Some(default_template()),
        "PRODUCTION" => Some(production_template()),
        "USER_TESTF" => Some(test_template()),
        _ => None,
    }
}

/// 子串模式匹配（大小写不敏感，按顺序首个命中）
pub fn pattern_template(warehouse_key: &str) -> Option<WarehouseTemplate> {
    let key = warehouse_key.to_uppercase();
    if key.contains("TEST") {
        Some(test_template())
    } else if key.contains("PROD") {
        Some(production_template())
    } else if key.contains("SMALL") || key.contains("MINI") {
        Some(compact_template())
    } else {
        None
    }
}

/// 兜底模板: 4 通道 × 2 货架 × 50 储位 × 4 层
pub fn default_template() -> WarehouseTemplate {
    let mut t = WarehouseTemplate::new("BUILTIN-DEFAULT", "Default Warehouse", 4, 2, 50, 4);
    t.receiving_areas = vec![
        SpecialArea::new("RECV-01", LocationType::Receiving, 10),
        SpecialArea::new("RECV-02", LocationType::Receiving, 10),
    ];
    t.staging_areas = vec![SpecialArea::new("STAGE-01", LocationType::Staging, 5)];
    t.dock_areas = vec![SpecialArea::new("DOCK-01", LocationType::Dock, 2)];
    t
}

pub fn production_template() -> WarehouseTemplate {
    let mut t = WarehouseTemplate::new("BUILTIN-PRODUCTION", "Production Warehouse", 10, 2, 50, 4);
    t.receiving_areas = vec![
        SpecialArea::new("RECV-01", LocationType::Receiving, 20),
        SpecialArea::new("RECV-02", LocationType::Receiving, 20),
        SpecialArea::new("RECV-03", LocationType::Receiving, 20),
    ];
    t.staging_areas = vec![
        SpecialArea::new("STAGE-01", LocationType::Staging, 10),
        SpecialArea::new("STAGE-02", LocationType::Staging, 10),
    ];
    t.dock_areas = vec![
        SpecialArea::new("DOCK-01", LocationType::Dock, 4),
        SpecialArea::new("DOCK-02", LocationType::Dock, 4),
        SpecialArea::new("COLD-01", LocationType::Dock, 4).with_zone("FREEZER"),
    ];
    t
}

pub fn test_template() -> WarehouseTemplate {
    let mut t = WarehouseTemplate::new("BUILTIN-TEST", "Test Warehouse", 3, 2, 20, 4);
    t.receiving_areas = vec![SpecialArea::new("RECV-01", LocationType::Receiving, 10)];
    t.staging_areas = vec![SpecialArea::new("STAGE-01", LocationType::Staging, 5)];
    t.dock_areas = vec![SpecialArea::new("DOCK-01", LocationType::Dock, 2)];
    t
}

pub fn compact_template() -> WarehouseTemplate {
    let mut t = WarehouseTemplate::new("BUILTIN-COMPACT", "Compact Warehouse", 2, 1, 20, 3);
    t.receiving_areas = vec![SpecialArea::new("RECV-01", LocationType::Receiving, 5)];
    t.staging_areas = vec![SpecialArea::new("STAGE-01", LocationType::Staging, 3)];
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        calls: AtomicUsize,
        template: Option<WarehouseTemplate>,
        fail: bool,
    }

    impl TemplateStore for CountingStore {
        fn find_active_for_warehouse(
            &self,
            _warehouse_id: &str,
        ) -> EngineResult<Option<WarehouseTemplate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EngineError::TemplateStoreError("db down".to_string()));
            }
            Ok(self.template.clone())
        }
    }

    fn store(template: Option<WarehouseTemplate>, fail: bool) -> Arc<CountingStore> {
        Arc::new(CountingStore {
            calls: AtomicUsize::new(0),
            template,
            fail,
        })
    }

    #[test]
    fn test_database_beats_static() {
        let db_template = WarehouseTemplate::new("DB-T", "db", 7, 1, 10, 2);
        let store = store(Some(db_template), false);
        let resolver = WarehouseTemplateResolver::new(Some(store.clone()), Duration::from_secs(60));

        let resolved = resolver.resolve("PRODUCTION").unwrap();
        assert_eq!(resolved.source, TemplateSource::Database);
        assert_eq!(resolved.template.template_id, "DB-T");
    }

    #[test]
    fn test_chain_order_without_database_row() {
        let resolver =
            WarehouseTemplateResolver::new(Some(store(None, false)), Duration::from_secs(60));

        assert_eq!(resolver.resolve("DEFAULT").unwrap().source, TemplateSource::StaticRegistry);
        assert_eq!(resolver.resolve("wh_test_02").unwrap().source, TemplateSource::PatternMatch);
        let fallback = resolver.resolve("WAREHOUSE-77").unwrap();
        assert_eq!(fallback.source, TemplateSource::Fallback);
        assert_eq!(fallback.template.template_id, "BUILTIN-DEFAULT");
    }

    #[test]
    fn test_cache_hit_and_invalidate() {
        let store = store(None, false);
        let resolver = WarehouseTemplateResolver::new(Some(store.clone()), Duration::from_secs(60));

        assert_eq!(resolver.resolve("WH-1").unwrap().source, TemplateSource::Fallback);
        assert_eq!(resolver.resolve("wh-1").unwrap().source, TemplateSource::Cache);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        assert!(resolver.invalidate("WH-1"));
        resolver.resolve("WH-1").unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cache_stats().hits, 1);
    }

    #[test]
    fn test_store_error_continues_chain() {
        let resolver =
            WarehouseTemplateResolver::new(Some(store(None, true)), Duration::from_secs(60));
        let resolved = resolver.resolve("PROD-EAST").unwrap();
        assert_eq!(resolved.source, TemplateSource::PatternMatch);
        assert_eq!(resolved.template.template_id, "BUILTIN-PRODUCTION");
    }

    #[test]
    fn test_blank_warehouse_id() {
        let resolver = WarehouseTemplateResolver::without_store();
        assert!(matches!(resolver.resolve("  "), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_builtin_templates_are_valid() {
        for t in [default_template(), production_template(), test_template(), compact_template()] {
            assert!(t.validate().is_ok(), "{} invalid", t.template_id);
        }
    }
}
