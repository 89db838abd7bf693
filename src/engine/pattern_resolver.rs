// ==========================================
// WareWise 仓库异常检测 - 规则模式解析器
// ==========================================
// 职责: 由仓库模板生成各库位类型的正则集合，供规则条件匹配
// 缓存: 仓库级 TTL 缓存 + 通配符模式编译缓存
// ==========================================

use crate::domain::types::{LocationFormatKind, LocationType};
use crate::domain::warehouse::WarehouseTemplate;
use crate::engine::cache::TtlCache;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::location_code;
use crate::engine::template_resolver::WarehouseTemplateResolver;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// ==========================================
// RulePatterns - 单仓库的库位类型正则集合
// ==========================================
#[derive(Debug, Clone)]
pub struct RulePatterns {
    pub warehouse_id: String,
    pub template_id: String,
    by_type: HashMap<LocationType, Vec<Regex>>,
}

impl RulePatterns {
    /// 由模板构建（不经过缓存）
    pub fn from_template(warehouse_id: &str, template: &WarehouseTemplate) -> EngineResult<Self> {
        let mut by_type: HashMap<LocationType, Vec<Regex>> = HashMap::new();

        // 特殊区域: 模板编码 + 通用前缀
        for (location_type, generic) in [
            (LocationType::Receiving, "^RECV"),
            (LocationType::Staging, "^STAGE"),
            (LocationType::Dock, "^DOCK"),
        ] {
            let areas = match location_type {
                LocationType::Receiving => &template.receiving_areas,
                LocationType::Staging => &template.staging_areas,
                _ => &template.dock_areas,
            };
            let mut sources: Vec<String> =
                areas.iter().map(|a| special_code_pattern(&a.code)).collect();
            sources.push(generic.to_string());
            by_type.insert(location_type, compile_all(&sources)?);
        }

        // 存储位: 探测到的格式优先
        let storage_sources: Vec<String> = match &template.location_format {
            Some(format) if format.kind != LocationFormatKind::Special => {
                vec![format.pattern.clone()]
            }
            _ => vec![
                location_code::HIERARCHICAL_RE.as_str().to_string(),
                location_code::EXPLICIT_RE.as_str().to_string(),
                location_code::POSITION_LEVEL_RE.as_str().to_string(),
            ],
        };
        by_type.insert(LocationType::Storage, compile_all(&storage_sources)?);

        by_type.insert(
            LocationType::Aisle,
            compile_all(&[r"^AISLE[-_]?\d+$".to_string()])?,
        );
        by_type.insert(
            LocationType::Overflow,
            compile_all(&["OVERFLOW".to_string(), "^OVF".to_string()])?,
        );

        Ok(Self {
            warehouse_id: warehouse_id.to_string(),
            template_id: template.template_id.clone(),
            by_type,
        })
    }

    pub fn patterns_for(&self, location_type: LocationType) -> &[Regex] {
        self.by_type
            .get(&location_type)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// 编码是否属于指定库位类型（内部先标准化）
    pub fn matches(&self, location_type: LocationType, code: &str) -> bool {
        let normalized = location_code::normalize(code);
        if normalized.is_empty() {
            return false;
        }
        self.patterns_for(location_type)
            .iter()
            .any(|re| re.is_match(&normalized))
    }

    /// 按固定顺序返回第一个匹配的库位类型
    pub fn match_type(&self, code: &str) -> Option<LocationType> {
        [
            LocationType::Receiving,
            LocationType::Staging,
            LocationType::Dock,
            LocationType::Aisle,
            LocationType::Overflow,
            LocationType::Storage,
        ]
        .into_iter()
        .find(|t| self.matches(*t, code))
    }
}

fn compile_all(sources: &[String]) -> EngineResult<Vec<Regex>> {
    sources
        .iter()
        .map(|src| {
            Regex::new(src).map_err(|e| EngineError::PatternCompileError {
                pattern: src.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// 特殊区域编码 → 锚定正则（字母/数字边界允许可选分隔符）
///
/// RECV-01 → ^RECV[-_]?01$
pub fn special_code_pattern(code: &str) -> String {
    let key = location_code::special_key(code);
    let mut pattern = String::from("^");
    let mut prev: Option<char> = None;
    for c in key.chars() {
        if let Some(p) = prev {
            if p.is_ascii_alphabetic() != c.is_ascii_alphabetic() {
                pattern.push_str("[-_]?");
            }
        }
        pattern.push_str(&regex::escape(&c.to_string()));
        prev = Some(c);
    }
    pattern.push('$');
    pattern
}

/// 通配符模式 → 锚定、大小写不敏感的正则源码
///
/// `*` 匹配任意串，`?` 匹配单字符，其余字符按字面匹配
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::from("(?i)^");
    for c in pattern.trim().chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

// ==========================================
// RulePatternResolver
// ==========================================
pub struct RulePatternResolver {
    template_resolver: Arc<WarehouseTemplateResolver>,
    cache: TtlCache<String, Arc<RulePatterns>>,
    wildcard_cache: TtlCache<String, Regex>,
}

impl RulePatternResolver {
    pub fn new(template_resolver: Arc<WarehouseTemplateResolver>, ttl: Duration) -> Self {
        Self {
            template_resolver,
            cache: TtlCache::new(ttl),
            wildcard_cache: TtlCache::new(ttl),
        }
    }

    /// 解析仓库的规则模式集合（TTL 缓存）
    pub fn resolve_patterns(&self, warehouse_id: &str) -> EngineResult<Arc<RulePatterns>> {
        let key = warehouse_id.trim().to_uppercase();
        if let Some(patterns) = self.cache.get(&key) {
            return Ok(patterns);
        }

        let resolved = self.template_resolver.resolve(warehouse_id)?;
        let patterns = Arc::new(RulePatterns::from_template(&key, &resolved.template)?);
        self.cache.insert(key.clone(), patterns.clone());

        tracing::debug!(
            warehouse_id = %key,
            template_id = %patterns.template_id,
            "规则模式已生成"
        );
        Ok(patterns)
    }

    /// 编译规则中的通配符库位模式（按模式文本缓存）
    pub fn compile_location_pattern(&self, pattern: &str) -> EngineResult<Regex> {
        let key = pattern.trim().to_string();
        if key.is_empty() {
            return Err(EngineError::InvalidInput("库位模式不能为空".to_string()));
        }
        if let Some(re) = self.wildcard_cache.get(&key) {
            return Ok(re);
        }

        let source = wildcard_to_regex(&key);
        let re = Regex::new(&source).map_err(|e| EngineError::PatternCompileError {
            pattern: key.clone(),
            message: e.to_string(),
        })?;
        self.wildcard_cache.insert(key, re.clone());
        Ok(re)
    }

    /// 模板变更后调用（同时清理模板解析缓存）
    pub fn invalidate(&self, warehouse_id: &str) {
        self.cache.invalidate(&warehouse_id.trim().to_uppercase());
        self.template_resolver.invalidate(warehouse_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::template_resolver::default_template;

    #[test]
    fn test_special_code_pattern() {
        assert_eq!(special_code_pattern("RECV-01"), "^RECV[-_]?01$");
        let re = Regex::new(&special_code_pattern("RECV-01")).unwrap();
        assert!(re.is_match("RECV01"));
        assert!(re.is_match("RECV_01"));
        assert!(!re.is_match("RECV-011"));
    }

    #[test]
    fn test_wildcard_to_regex() {
        let re = Regex::new(&wildcard_to_regex("AISLE*")).unwrap();
        assert!(re.is_match("aisle-01"));
        assert!(!re.is_match("X-AISLE"));

        let re = Regex::new(&wildcard_to_regex("RECV-??")).unwrap();
        assert!(re.is_match("RECV-01"));
        assert!(!re.is_match("RECV-001"));

        let re = Regex::new(&wildcard_to_regex("*FROZEN*")).unwrap();
        assert!(re.is_match("Frozen Peas 2kg"));
    }

    #[test]
    fn test_patterns_from_template() {
        let patterns = RulePatterns::from_template("WH1", &default_template()).unwrap();
        assert!(patterns.matches(LocationType::Receiving, "recv-02"));
        assert!(patterns.matches(LocationType::Receiving, "RECV-99")); // 通用前缀
        assert!(patterns.matches(LocationType::Staging, "STAGE01"));
        assert!(patterns.matches(LocationType::Storage, "01-01-001A"));
        assert!(patterns.matches(LocationType::Aisle, "AISLE-04"));
        assert!(!patterns.matches(LocationType::Storage, "RECV-01"));
        assert_eq!(patterns.match_type("DOCK-01"), Some(LocationType::Dock));
        assert_eq!(patterns.match_type("???"), None);
    }

    #[test]
    fn test_resolver_caches_patterns() {
        let resolver = RulePatternResolver::new(
            Arc::new(WarehouseTemplateResolver::without_store()),
            Duration::from_secs(60),
        );
        let a = resolver.resolve_patterns("WH1").unwrap();
        let b = resolver.resolve_patterns("wh1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        resolver.invalidate("WH1");
        let c = resolver.resolve_patterns("WH1").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_compile_location_pattern_rejects_blank() {
        let resolver = RulePatternResolver::new(
            Arc::new(WarehouseTemplateResolver::without_store()),
            Duration::from_secs(60),
        );
        assert!(resolver.compile_location_pattern(" ").is_err());
        assert!(resolver.compile_location_pattern("AISLE*").unwrap().is_match("AISLE-01"));
    }
}
