// ==========================================
// WareWise 仓库异常检测 - 增强库位分类器
// ==========================================
// 职责: 将库位编码归类为 LocationType，并给出置信度与依据
// 分层: 虚拟模板 → 库位登记表 → 正则模式 → 行为特征 → 兜底
// 红线: 所有分类结果必须输出 evidence
// ==========================================

use crate::domain::inventory::InventoryRecord;
use crate::domain::location::Location;
use crate::domain::types::{ClassificationMethod, LocationType};
use crate::engine::location_code;
use crate::engine::virtual_location::VirtualLocationEngine;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 默认最小置信度
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

const VIRTUAL_CONFIDENCE: f64 = 0.95;
const REGISTRY_CONFIDENCE: f64 = 0.9;
const PATTERN_BASE_CONFIDENCE: f64 = 0.85;
const AGREEMENT_BOOST: f64 = 0.1;

// ==========================================
// 正则模式表 (类型, 模式, 权重)
// ==========================================
static PATTERN_TABLE: Lazy<Vec<(LocationType, Regex, f64)>> = Lazy::new(|| {
    let raw: Vec<(LocationType, &str, f64)> = vec![
        (LocationType::Receiving, r"^RECV", 1.0),
        (LocationType::Receiving, r"RECEIV", 0.9),
        (LocationType::Receiving, r"^RCV", 0.8),
        (LocationType::Receiving, r"INBOUND", 0.7),
        (LocationType::Staging, r"^STAGE", 1.0),
        (LocationType::Staging, r"STAGING", 0.9),
        (LocationType::Staging, r"^STG", 0.8),
        (LocationType::Staging, r"OUTBOUND", 0.7),
        (LocationType::Staging, r"^SHIP", 0.6),
        (LocationType::Dock, r"^DOCK", 1.0),
        (LocationType::Dock, r"^DK-?\d", 0.8),
        (LocationType::Aisle, r"^AISLE", 1.0),
        (LocationType::Aisle, r"TRANSIT", 0.7),
        (LocationType::Overflow, r"OVERFLOW", 1.0),
        (LocationType::Overflow, r"^OVF", 0.8),
        (LocationType::Storage, location_code::HIERARCHICAL_RE.as_str(), 1.0),
        (LocationType::Storage, location_code::EXPLICIT_RE.as_str(), 1.0),
        (LocationType::Storage, location_code::POSITION_LEVEL_RE.as_str(), 0.9),
    ];
    raw.into_iter()
        .map(|(t, src, w)| (t, Regex::new(src).unwrap(), w))
        .collect()
});

// ==========================================
// LocationClassification - 分类结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationClassification {
    pub location_code: String,
    pub location_type: LocationType,
    pub confidence: f64,
    pub method: ClassificationMethod,
    pub evidence: Vec<String>,
}

impl LocationClassification {
    fn new(
        code: &str,
        location_type: LocationType,
        confidence: f64,
        method: ClassificationMethod,
        evidence: String,
    ) -> Self {
        Self {
            location_code: code.to_string(),
            location_type,
            confidence,
            method,
            evidence: vec![evidence],
        }
    }
}

/// 单库位的行为画像
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BehaviorProfile {
    pub pallet_count: usize,
    /// 品类多样性 = 不同描述数 / 托盘数
    pub diversity_ratio: f64,
    pub mean_dwell_hours: f64,
}

// ==========================================
// EnhancedLocationClassifier
// ==========================================
pub struct EnhancedLocationClassifier {
    virtual_engine: Option<Arc<VirtualLocationEngine>>,
    /// 标准化编码 → 登记库位类型
    registry: HashMap<String, LocationType>,
    min_confidence: f64,
}

impl Default for EnhancedLocationClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EnhancedLocationClassifier {
    pub fn new() -> Self {
        Self {
            virtual_engine: None,
            registry: HashMap::new(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_virtual_engine(mut self, engine: Arc<VirtualLocationEngine>) -> Self {
        self.virtual_engine = Some(engine);
        self
    }

    /// 注册登记库位（仅 is_active 的库位生效）
    pub fn with_known_locations(mut self, locations: &[Location]) -> Self {
        for loc in locations.iter().filter(|l| l.is_active) {
            self.registry
                .insert(location_code::normalize(&loc.code), loc.location_type);
        }
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    /// 单库位分类（不含行为层）
    pub fn classify(&self, code: &str) -> LocationClassification {
        self.classify_with_behavior(code, None)
    }

    /// 单库位分类（可选行为画像）
    ///
    /// # 规则
    /// - 各层按顺序尝试，首个置信度 >= min_confidence 的结果胜出
    /// - 模式层与行为层一致时置信度 +0.1（上限 1.0）
    /// - 都未达标 → Unknown / FALLBACK
    pub fn classify_with_behavior(
        &self,
        code: &str,
        behavior: Option<&BehaviorProfile>,
    ) -> LocationClassification {
        let normalized = location_code::normalize(code);
        if normalized.is_empty() {
            return LocationClassification::new(
                code,
                LocationType::Unknown,
                0.0,
                ClassificationMethod::Fallback,
                "empty location code".to_string(),
            );
        }

        // 1. 虚拟模板层
        if let Some(engine) = &self.virtual_engine {
            if let Some(props) = engine.get_location_properties(&normalized) {
                let result = LocationClassification::new(
                    code,
                    props.location_type,
                    VIRTUAL_CONFIDENCE,
                    ClassificationMethod::VirtualTemplate,
                    format!("template {} defines {}", engine.template().template_id, props.code),
                );
                if result.confidence >= self.min_confidence {
                    return result;
                }
            }
        }

        // 2. 登记表层
        if let Some(location_type) = self.registry.get(&normalized) {
            let result = LocationClassification::new(
                code,
                *location_type,
                REGISTRY_CONFIDENCE,
                ClassificationMethod::LocationRegistry,
                format!("registered location {}", normalized),
            );
            if result.confidence >= self.min_confidence {
                return result;
            }
        }

        // 3. 模式层 + 4. 行为层
        let pattern = Self::classify_by_pattern(&normalized);
        let behavioral = behavior.and_then(Self::classify_by_behavior);

        if let Some(mut result) = pattern.map(|(t, c, ev)| {
            LocationClassification::new(code, t, c, ClassificationMethod::PatternMatch, ev)
        }) {
            if let Some((bt, _, bev)) = &behavioral {
                if *bt == result.location_type {
                    result.confidence = (result.confidence + AGREEMENT_BOOST).min(1.0);
                    result.evidence.push(format!("behavior agrees: {}", bev));
                }
            }
            if result.confidence >= self.min_confidence {
                return result;
            }
        }

        if let Some((t, c, ev)) = behavioral {
            if c >= self.min_confidence {
                return LocationClassification::new(
                    code,
                    t,
                    c,
                    ClassificationMethod::Behavioral,
                    ev,
                );
            }
        }

        // 5. 兜底
        LocationClassification::new(
            code,
            LocationType::Unknown,
            0.0,
            ClassificationMethod::Fallback,
            format!("no layer classified {}", normalized),
        )
    }

    /// 正则模式层：取权重最高的命中
    pub fn classify_by_pattern(normalized: &str) -> Option<(LocationType, f64, String)> {
        PATTERN_TABLE
            .iter()
            .filter(|(_, re, _)| re.is_match(normalized))
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(t, re, w)| {
                (
                    *t,
                    PATTERN_BASE_CONFIDENCE * w,
                    format!("pattern '{}' matched (weight {:.2})", re.as_str(), w),
                )
            })
    }

    /// 行为特征层
    ///
    /// # 规则
    /// - 托盘数 >= 3，多样性 >= 0.7，平均停留 < 12h → RECEIVING (0.6)
    /// - 托盘数 >= 3，多样性 >= 0.7，12h <= 停留 < 48h → STAGING (0.5)
    /// - 多样性 <= 0.3，停留 >= 72h → STORAGE (0.5)
    pub fn classify_by_behavior(profile: &BehaviorProfile) -> Option<(LocationType, f64, String)> {
        let ev = format!(
            "pallets={}, diversity={:.2}, dwell={:.1}h",
            profile.pallet_count, profile.diversity_ratio, profile.mean_dwell_hours
        );
        if profile.pallet_count >= 3 && profile.diversity_ratio >= 0.7 {
            if profile.mean_dwell_hours < 12.0 {
                return Some((LocationType::Receiving, 0.6, ev));
            }
            if profile.mean_dwell_hours < 48.0 {
                return Some((LocationType::Staging, 0.5, ev));
            }
        }
        if profile.diversity_ratio <= 0.3 && profile.mean_dwell_hours >= 72.0 {
            return Some((LocationType::Storage, 0.5, ev));
        }
        None
    }

    /// 由库存记录计算各库位的行为画像（按标准化编码分组）
    pub fn build_profiles(
        inventory: &[InventoryRecord],
        now: NaiveDateTime,
    ) -> HashMap<String, BehaviorProfile> {
        let mut grouped: HashMap<String, Vec<&InventoryRecord>> = HashMap::new();
        for record in inventory {
            let key = location_code::normalize(&record.location);
            if !key.is_empty() {
                grouped.entry(key).or_default().push(record);
            }
        }

        grouped
            .into_iter()
            .map(|(code, records)| {
                let count = records.len();
                let distinct: HashSet<String> = records
                    .iter()
                    .filter_map(|r| r.description.as_ref())
                    .map(|d| d.trim().to_uppercase())
                    .collect();
                let dwell: f64 =
                    records.iter().map(|r| r.age_hours(now)).sum::<f64>() / count as f64;
                (
                    code,
                    BehaviorProfile {
                        pallet_count: count,
                        diversity_ratio: distinct.len() as f64 / count as f64,
                        mean_dwell_hours: dwell,
                    },
                )
            })
            .collect()
    }

    /// 批量分类：每个不同的标准化库位只分类一次
    pub fn classify_batch(
        &self,
        inventory: &[InventoryRecord],
        now: NaiveDateTime,
    ) -> HashMap<String, LocationClassification> {
        let profiles = Self::build_profiles(inventory, now);
        let mut results = HashMap::with_capacity(profiles.len());
        for (code, profile) in &profiles {
            results.insert(code.clone(), self.classify_with_behavior(code, Some(profile)));
        }
        tracing::debug!(locations = results.len(), "库位批量分类完成");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::template_resolver::default_template;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_virtual_layer_wins() {
        let engine = Arc::new(VirtualLocationEngine::new(default_template()));
        let classifier = EnhancedLocationClassifier::new().with_virtual_engine(engine);
        let result = classifier.classify("RECV01");
        assert_eq!(result.location_type, LocationType::Receiving);
        assert_eq!(result.method, ClassificationMethod::VirtualTemplate);
        assert!((result.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_registry_layer() {
        let locations = vec![Location::new("COLD-07", "WH1", LocationType::Storage, 4)];
        let classifier = EnhancedLocationClassifier::new().with_known_locations(&locations);
        let result = classifier.classify("cold-07");
        assert_eq!(result.location_type, LocationType::Storage);
        assert_eq!(result.method, ClassificationMethod::LocationRegistry);
    }

    #[test]
    fn test_pattern_layer() {
        let classifier = EnhancedLocationClassifier::new();
        let result = classifier.classify("RECEIVING-DOOR-3");
        assert_eq!(result.location_type, LocationType::Receiving);
        assert_eq!(result.method, ClassificationMethod::PatternMatch);

        let storage = classifier.classify("99-99-999Z");
        assert_eq!(storage.location_type, LocationType::Storage);
    }

    #[test]
    fn test_behavior_boosts_agreeing_pattern() {
        let classifier = EnhancedLocationClassifier::new();
        let profile = BehaviorProfile {
            pallet_count: 5,
            diversity_ratio: 1.0,
            mean_dwell_hours: 3.0,
        };
        let result = classifier.classify_with_behavior("RCV-2", Some(&profile));
        // 0.85 × 0.8 + 0.1
        assert!((result.confidence - 0.78).abs() < 1e-9);
        assert_eq!(result.evidence.len(), 2);
    }

    #[test]
    fn test_behavior_layer_alone() {
        let classifier = EnhancedLocationClassifier::new();
        let profile = BehaviorProfile {
            pallet_count: 4,
            diversity_ratio: 0.75,
            mean_dwell_hours: 2.0,
        };
        let result = classifier.classify_with_behavior("ZONE-X", Some(&profile));
        assert_eq!(result.location_type, LocationType::Receiving);
        assert_eq!(result.method, ClassificationMethod::Behavioral);
    }

    #[test]
    fn test_fallback_unknown() {
        let classifier = EnhancedLocationClassifier::new();
        let result = classifier.classify("ZONE-X");
        assert_eq!(result.location_type, LocationType::Unknown);
        assert_eq!(result.method, ClassificationMethod::Fallback);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_classify_batch_profiles() {
        let base = now();
        let inventory: Vec<InventoryRecord> = (0..4)
            .map(|i| {
                InventoryRecord::new(&format!("P{}", i), "zone-x", base - Duration::hours(2))
                    .with_description(&format!("SKU-{}", i))
            })
            .collect();

        let classifier = EnhancedLocationClassifier::new();
        let results = classifier.classify_batch(&inventory, base);
        assert_eq!(results.len(), 1);
        let r = results.get("ZONE-X").unwrap();
        assert_eq!(r.location_type, LocationType::Receiving);
    }
}
