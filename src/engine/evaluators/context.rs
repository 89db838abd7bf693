// ==========================================
// WareWise 仓库异常检测 - 规则评估上下文
// ==========================================
// 职责: 汇集一次分析所需的模板、模式、分类器与登记库位
// 红线: 评估期间只读
// ==========================================

use crate::domain::inventory::InventoryRecord;
use crate::domain::location::Location;
use crate::domain::types::LocationType;
use crate::domain::warehouse::DEFAULT_ZONE;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::location_classifier::{EnhancedLocationClassifier, LocationClassification};
use crate::engine::location_code;
use crate::engine::pattern_resolver::{wildcard_to_regex, RulePatternResolver, RulePatterns};
use crate::engine::virtual_location::VirtualLocationEngine;
use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct EvaluationContext {
    pub warehouse_id: String,
    pub now: NaiveDateTime,
    pub virtual_engine: Arc<VirtualLocationEngine>,
    pub patterns: Arc<RulePatterns>,
    pub classifier: Arc<EnhancedLocationClassifier>,
    /// 标准化编码 → 登记库位（仅 is_active）
    known_locations: HashMap<String, Location>,
    /// 标准化编码 → 预计算分类
    classifications: HashMap<String, LocationClassification>,
    pattern_resolver: Option<Arc<RulePatternResolver>>,
}

impl EvaluationContext {
    pub fn new(
        warehouse_id: &str,
        now: NaiveDateTime,
        virtual_engine: Arc<VirtualLocationEngine>,
        patterns: Arc<RulePatterns>,
        known_locations: Vec<Location>,
        min_confidence: f64,
    ) -> Self {
        let active: Vec<Location> = known_locations.into_iter().filter(|l| l.is_active).collect();
        let classifier = EnhancedLocationClassifier::new()
            .with_virtual_engine(virtual_engine.clone())
            .with_known_locations(&active)
            .with_min_confidence(min_confidence);

        Self {
            warehouse_id: warehouse_id.to_string(),
            now,
            virtual_engine,
            patterns,
            classifier: Arc::new(classifier),
            known_locations: active
                .into_iter()
                .map(|l| (location_code::normalize(&l.code), l))
                .collect(),
            classifications: HashMap::new(),
            pattern_resolver: None,
        }
    }

    pub fn with_pattern_resolver(mut self, resolver: Arc<RulePatternResolver>) -> Self {
        self.pattern_resolver = Some(resolver);
        self
    }

    /// 预计算本批库存涉及库位的分类（含行为层）
    pub fn prepare(&mut self, inventory: &[InventoryRecord]) {
        self.classifications = self.classifier.classify_batch(inventory, self.now);
    }

    /// 库位分类（预计算优先）
    pub fn classify(&self, code: &str) -> LocationClassification {
        let key = location_code::normalize(code);
        match self.classifications.get(&key) {
            Some(c) => c.clone(),
            None => self.classifier.classify(&key),
        }
    }

    /// 库位类型：分类结果为 Unknown 时退回规则模式匹配
    pub fn location_type_of(&self, code: &str) -> LocationType {
        let classified = self.classify(code).location_type;
        if classified != LocationType::Unknown {
            return classified;
        }
        self.patterns.match_type(code).unwrap_or(LocationType::Unknown)
    }

    pub fn known_location(&self, code: &str) -> Option<&Location> {
        self.known_locations.get(&location_code::normalize(code))
    }

    /// 库位容量：登记库位 → 虚拟模板 → 1
    pub fn capacity_of(&self, code: &str) -> u32 {
        if let Some(loc) = self.known_location(code) {
            return loc.capacity;
        }
        self.virtual_engine.capacity_of(code).unwrap_or(1)
    }

    /// 库位温区：登记库位 → 虚拟模板 → GENERAL
    pub fn zone_of(&self, code: &str) -> String {
        if let Some(loc) = self.known_location(code) {
            return loc.zone.to_uppercase();
        }
        self.virtual_engine
            .get_location_properties(code)
            .map(|p| p.zone.to_uppercase())
            .unwrap_or_else(|| DEFAULT_ZONE.to_string())
    }

    /// 库位是否有效（模板可推算或已登记）
    pub fn is_valid_location(&self, code: &str) -> bool {
        self.known_location(code).is_some() || self.virtual_engine.is_valid(code)
    }

    /// 编译通配符模式（有解析器时走缓存）
    pub fn compile_pattern(&self, pattern: &str) -> EngineResult<Regex> {
        match &self.pattern_resolver {
            Some(resolver) => resolver.compile_location_pattern(pattern),
            None => {
                let source = wildcard_to_regex(pattern);
                Regex::new(&source).map_err(|e| EngineError::PatternCompileError {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}
