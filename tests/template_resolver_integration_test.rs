// ==========================================
// 模板解析链集成测试
// ==========================================
// 测试目标: 数据库 > 静态注册表 > 模式匹配 > 兜底；缓存与失效
// ==========================================


use std::sync::Arc;
use std::time::Duration;
use warewise::engine::pattern_resolver::RulePatternResolver;
use warewise::engine::template_resolver::{TemplateSource, TemplateStore, WarehouseTemplateResolver};
use warewise::engine::VirtualLocationEngine;
use warewise::domain::LocationType;
use warewise::repository::TemplateRepository;
use test_helpers::{create_test_db, open_shared_connection, small_template};

fn resolver_with_db(db_path: &str) -> (Arc<TemplateRepository>, Arc<WarehouseTemplateResolver>) {
    let repo = Arc::new(TemplateRepository::from_connection(
        open_shared_connection(db_path).unwrap(),
    ));
    let store: Arc<dyn TemplateStore> = repo.clone();
    let resolver = Arc::new(WarehouseTemplateResolver::new(
        Some(store),
        Duration::from_secs(300),
    ));
    (repo, resolver)
}

#[test]
fn test_database_template_beats_static_registry() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (repo, resolver) = resolver_with_db(&db_path);

    // "DEFAULT" 在静态注册表中存在，数据库绑定优先
    repo.create(&small_template("TPL-DB")).unwrap();
    repo.assign_to_warehouse("TPL-DB", "DEFAULT").unwrap();

    let resolved = resolver.resolve("default").unwrap();
    assert_eq!(resolved.source, TemplateSource::Database);
    assert_eq!(resolved.template.template_id, "TPL-DB");
}

#[test]
fn test_chain_falls_through_static_pattern_and_fallback() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (_repo, resolver) = resolver_with_db(&db_path);

    let r = resolver.resolve("PRODUCTION").unwrap();
    assert_eq!(r.source, TemplateSource::StaticRegistry);
    assert_eq!(r.template.template_id, "BUILTIN-PRODUCTION");

    let r = resolver.resolve("wh_test_east").unwrap();
    assert_eq!(r.source, TemplateSource::PatternMatch);
    assert_eq!(r.template.template_id, "BUILTIN-TEST");

    let r = resolver.resolve("mini-store-7").unwrap();
    assert_eq!(r.source, TemplateSource::PatternMatch);
    assert_eq!(r.template.template_id, "BUILTIN-COMPACT");

    let r = resolver.resolve("WH-UNKNOWN").unwrap();
    assert_eq!(r.source, TemplateSource::Fallback);
    assert_eq!(r.template.template_id, "BUILTIN-DEFAULT");

    assert!(resolver.resolve("   ").is_err());
}

#[test]
fn test_second_resolution_is_cache_hit_until_invalidated() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (repo, resolver) = resolver_with_db(&db_path);

    let first = resolver.resolve("WH01").unwrap();
    assert_eq!(first.source, TemplateSource::Fallback);
    let second = resolver.resolve("wh01").unwrap();
    assert_eq!(second.source, TemplateSource::Cache);
    assert_eq!(resolver.cache_stats().hits, 1);

    // 绑定新模板后未失效缓存 → 仍是旧模板
    repo.create(&small_template("TPL-WH01")).unwrap();
    repo.assign_to_warehouse("TPL-WH01", "WH01").unwrap();
    assert_eq!(resolver.resolve("WH01").unwrap().template.template_id, "BUILTIN-DEFAULT");

    assert!(resolver.invalidate("WH01"));
    let refreshed = resolver.resolve("WH01").unwrap();
    assert_eq!(refreshed.source, TemplateSource::Database);
    assert_eq!(refreshed.template.template_id, "TPL-WH01");
}

#[test]
fn test_pattern_resolver_follows_database_template() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (repo, resolver) = resolver_with_db(&db_path);

    let mut template = small_template("TPL-WH05");
    template.receiving_areas.push(warewise::domain::SpecialArea::new(
        "INBOUND-7",
        LocationType::Receiving,
        6,
    ));
    repo.create(&template).unwrap();
    repo.assign_to_warehouse("TPL-WH05", "WH05").unwrap();

    let patterns = RulePatternResolver::new(resolver.clone(), Duration::from_secs(300));
    let resolved = patterns.resolve_patterns("WH05").unwrap();
    assert!(resolved.matches(LocationType::Receiving, "INBOUND-7"));
    assert!(resolved.matches(LocationType::Receiving, "RECV01"));

    let resolved_template = resolver.resolve("WH05").unwrap();
    let engine = VirtualLocationEngine::new(resolved_template.template.as_ref().clone());
    assert!(engine.validate_location("02-02-010B").is_valid);
    let rejected = engine.validate_location("03-01-001A");
    assert!(!rejected.is_valid);
    assert!(rejected.reason.contains("aisle 3"));
}
