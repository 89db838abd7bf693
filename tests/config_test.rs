// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: 验证配置读取、默认值回退、作用域覆写与快照
// ==========================================


use warewise::config::{config_keys, AnalysisConfigReader, ConfigManager, ConfigScope};
use test_helpers::{create_test_db, insert_test_config};

#[tokio::test]
async fn test_defaults_when_config_table_is_empty() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    assert_eq!(config_manager.get_template_cache_ttl_secs().await.unwrap(), 300);
    assert_eq!(config_manager.get_pattern_cache_ttl_secs().await.unwrap(), 300);
    assert_eq!(config_manager.get_default_stagnant_hours().await.unwrap(), 10.0);
    assert_eq!(config_manager.get_column_match_threshold().await.unwrap(), 0.7);
    assert_eq!(config_manager.get_classifier_min_confidence().await.unwrap(), 0.5);
    assert_eq!(config_manager.get_monitor_buffer_size().await.unwrap(), 1000);
    assert_eq!(config_manager.get_monitor_retention_hours().await.unwrap(), 24);
}

#[tokio::test]
async fn test_configured_values_are_read() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    insert_test_config(
        &conn,
        &[
            (config_keys::TEMPLATE_CACHE_TTL_SECS, "60"),
            (config_keys::DEFAULT_STAGNANT_HOURS, "6.5"),
            (config_keys::COLUMN_MATCH_THRESHOLD, "0.8"),
            (config_keys::MONITOR_BUFFER_SIZE, "50"),
        ],
    )
    .unwrap();

    let config_manager = ConfigManager::new(&db_path).unwrap();
    assert_eq!(config_manager.get_template_cache_ttl_secs().await.unwrap(), 60);
    assert_eq!(config_manager.get_default_stagnant_hours().await.unwrap(), 6.5);
    assert_eq!(config_manager.get_column_match_threshold().await.unwrap(), 0.8);
    assert_eq!(config_manager.get_monitor_buffer_size().await.unwrap(), 50);
}

#[tokio::test]
async fn test_unparseable_or_out_of_range_values_fall_back() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    insert_test_config(
        &conn,
        &[
            (config_keys::PATTERN_CACHE_TTL_SECS, "soon"),
            (config_keys::CLASSIFIER_MIN_CONFIDENCE, "1.5"),
            (config_keys::DEFAULT_STAGNANT_HOURS, "-3"),
            (config_keys::MONITOR_BUFFER_SIZE, "0"),
        ],
    )
    .unwrap();

    let config_manager = ConfigManager::new(&db_path).unwrap();
    assert_eq!(config_manager.get_pattern_cache_ttl_secs().await.unwrap(), 300);
    assert_eq!(config_manager.get_classifier_min_confidence().await.unwrap(), 0.5);
    assert_eq!(config_manager.get_default_stagnant_hours().await.unwrap(), 10.0);
    assert_eq!(config_manager.get_monitor_buffer_size().await.unwrap(), 1);
}

#[test]
fn test_warehouse_scope_overrides_global() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).unwrap();

    config_manager
        .set_config_value(&ConfigScope::Global, config_keys::DEFAULT_STAGNANT_HOURS, "12")
        .unwrap();
    config_manager
        .set_config_value(
            &ConfigScope::Warehouse {
                warehouse_id: "WH01".to_string(),
            },
            config_keys::DEFAULT_STAGNANT_HOURS,
            "4",
        )
        .unwrap();

    assert_eq!(
        config_manager
            .get_warehouse_config_value("wh01", config_keys::DEFAULT_STAGNANT_HOURS)
            .unwrap()
            .as_deref(),
        Some("4")
    );
    assert_eq!(
        config_manager
            .get_warehouse_config_value("WH02", config_keys::DEFAULT_STAGNANT_HOURS)
            .unwrap()
            .as_deref(),
        Some("12")
    );
}

#[test]
fn test_snapshot_restore_roundtrip() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).unwrap();
    config_manager
        .set_config_value(&ConfigScope::Global, config_keys::MONITOR_RETENTION_HOURS, "48")
        .unwrap();

    let snapshot = config_manager.get_config_snapshot().unwrap();
    config_manager
        .set_config_value(&ConfigScope::Global, config_keys::MONITOR_RETENTION_HOURS, "1")
        .unwrap();

    let restored = config_manager.restore_config_from_snapshot(&snapshot).unwrap();
    assert_eq!(restored, 1);
    assert_eq!(
        config_manager
            .get_global_config_value(config_keys::MONITOR_RETENTION_HOURS)
            .unwrap()
            .as_deref(),
        Some("48")
    );
}
