// ==========================================
// WareWise 仓库异常检测 - 库位格式探测
// ==========================================
// 职责: 根据样本库位编码推断编码格式，并生成模板草案
// 红线: 纯函数，无 I/O
// ==========================================

use crate::domain::types::{LocationFormatKind, LocationType};
use crate::domain::warehouse::{LocationFormatConfig, SpecialArea, WarehouseTemplate};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::location_code::{self, LevelRef, SPECIAL_LIKE_RE};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// 每种格式记录的样例数上限
const MAX_EXAMPLES: usize = 5;

// ==========================================
// FormatDetection - 探测结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatDetection {
    pub format: LocationFormatConfig,
    /// 每种格式的命中数
    pub matches_by_kind: HashMap<LocationFormatKind, usize>,
    pub sample_count: usize,
    /// 观测到的最大坐标（用于模板草案）
    pub max_aisle: Option<u32>,
    pub max_rack: Option<u32>,
    pub max_position: Option<u32>,
    pub observed_levels: Vec<char>,
    /// 观测到的特殊区域编码（标准化后去重）
    pub special_codes: Vec<String>,
}

pub struct LocationFormatDetector;

impl LocationFormatDetector {
    /// 探测样本的库位编码格式
    ///
    /// # 规则
    /// - 空白样本忽略；全部为空 → InvalidInput
    /// - 命中数最多的格式胜出，平票按 HIERARCHICAL > EXPLICIT > POSITION_LEVEL > SPECIAL
    /// - confidence = 命中数 / 非空样本数
    pub fn detect(samples: &[String]) -> EngineResult<FormatDetection> {
        let normalized: Vec<String> = samples
            .iter()
            .map(|s| location_code::normalize(s))
            .filter(|s| !s.is_empty())
            .collect();

        if normalized.is_empty() {
            return Err(EngineError::InvalidInput(
                "格式探测需要至少一个非空库位样本".to_string(),
            ));
        }

        let mut matches_by_kind: HashMap<LocationFormatKind, usize> = HashMap::new();
        let mut examples: HashMap<LocationFormatKind, Vec<String>> = HashMap::new();
        let mut max_aisle = None;
        let mut max_rack = None;
        let mut max_position = None;
        let mut levels = BTreeSet::new();
        let mut special_codes = BTreeSet::new();

        for code in &normalized {
            let kind = match location_code::parse(code) {
                Some(parsed) => {
                    max_aisle = max_opt(max_aisle, parsed.aisle);
                    max_rack = max_opt(max_rack, parsed.rack);
                    max_position = max_opt(max_position, Some(parsed.position));
                    match parsed.level {
                        LevelRef::Letter(c) => {
                            levels.insert(c);
                        }
                        LevelRef::Number(n) if (1..=26).contains(&n) => {
                            levels.insert((b'A' + (n as u8 - 1)) as char);
                        }
                        LevelRef::Number(_) => {}
                    }
                    parsed.kind
                }
                None if SPECIAL_LIKE_RE.is_match(code) => {
                    special_codes.insert(code.clone());
                    LocationFormatKind::Special
                }
                None => continue,
            };

            *matches_by_kind.entry(kind).or_insert(0) += 1;
            let bucket = examples.entry(kind).or_default();
            if bucket.len() < MAX_EXAMPLES && !bucket.contains(code) {
                bucket.push(code.clone());
            }
        }

        let winner = [
            LocationFormatKind::Hierarchical,
            LocationFormatKind::Explicit,
            LocationFormatKind::PositionLevel,
            LocationFormatKind::Special,
        ]
        .into_iter()
        .fold(None, |best: Option<(LocationFormatKind, usize)>, kind| {
            let count = matches_by_kind.get(&kind).copied().unwrap_or(0);
            match best {
                Some((_, best_count)) if best_count >= count => best,
                _ if count > 0 => Some((kind, count)),
                _ => best,
            }
        });

        let (kind, count) = winner.ok_or_else(|| {
            EngineError::InvalidInput("样本中没有可识别的库位编码格式".to_string())
        })?;

        let confidence = count as f64 / normalized.len() as f64;
        tracing::info!(
            kind = %kind,
            matched = count,
            samples = normalized.len(),
            confidence,
            "库位格式探测完成"
        );

        Ok(FormatDetection {
            format: LocationFormatConfig {
                kind,
                pattern: pattern_for(kind).to_string(),
                examples: examples.remove(&kind).unwrap_or_default(),
                confidence,
            },
            matches_by_kind,
            sample_count: normalized.len(),
            max_aisle,
            max_rack,
            max_position,
            observed_levels: levels.into_iter().collect(),
            special_codes: special_codes.into_iter().collect(),
        })
    }

    /// 根据探测结果生成模板草案
    ///
    /// # 说明
    /// - 结构参数取观测最大值（POSITION_LEVEL 格式视为 1 通道 × 1 货架）
    /// - 层数取观测到的最大层字母
    /// - 特殊区域按编码前缀归类（RECV/STAGE/DOCK），容量默认 10/5/2
    pub fn suggest_template(
        template_id: &str,
        name: &str,
        detection: &FormatDetection,
    ) -> WarehouseTemplate {
        let (aisles, racks, positions) = match detection.format.kind {
            LocationFormatKind::PositionLevel => (1, 1, detection.max_position.unwrap_or(1)),
            _ => (
                detection.max_aisle.unwrap_or(1),
                detection.max_rack.unwrap_or(1),
                detection.max_position.unwrap_or(1),
            ),
        };
        let levels = detection
            .observed_levels
            .iter()
            .max()
            .map(|c| (*c as u32) - ('A' as u32) + 1)
            .unwrap_or(1);

        let mut template =
            WarehouseTemplate::new(template_id, name, aisles, racks, positions.max(1), levels);
        template.location_format = Some(detection.format.clone());

        for code in &detection.special_codes {
            let area = if code.starts_with("RECV") || code.starts_with("RCV") {
                SpecialArea::new(code, LocationType::Receiving, 10)
            } else if code.starts_with("STAGE") || code.starts_with("STG") {
                SpecialArea::new(code, LocationType::Staging, 5)
            } else if code.starts_with("DOCK") {
                SpecialArea::new(code, LocationType::Dock, 2)
            } else {
                continue;
            };
            match area.area_type {
                LocationType::Receiving => template.receiving_areas.push(area),
                LocationType::Staging => template.staging_areas.push(area),
                _ => template.dock_areas.push(area),
            }
        }

        template
    }
}

fn max_opt(current: Option<u32>, candidate: Option<u32>) -> Option<u32> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (None, b) => b,
        (a, None) => a,
    }
}

/// 格式对应的正则源码
pub fn pattern_for(kind: LocationFormatKind) -> &'static str {
    match kind {
        LocationFormatKind::Hierarchical => location_code::HIERARCHICAL_RE.as_str(),
        LocationFormatKind::Explicit => location_code::EXPLICIT_RE.as_str(),
        LocationFormatKind::PositionLevel => location_code::POSITION_LEVEL_RE.as_str(),
        LocationFormatKind::Special => SPECIAL_LIKE_RE.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_hierarchical_majority() {
        let detection = LocationFormatDetector::detect(&samples(&[
            "01-01-001A",
            "02-03-015C",
            "RECV-01",
            "04-02-040B",
        ]))
        .unwrap();

        assert_eq!(detection.format.kind, LocationFormatKind::Hierarchical);
        assert!((detection.format.confidence - 0.75).abs() < 1e-9);
        assert_eq!(detection.max_aisle, Some(4));
        assert_eq!(detection.max_rack, Some(3));
        assert_eq!(detection.max_position, Some(40));
        assert_eq!(detection.observed_levels, vec!['A', 'B', 'C']);
        assert_eq!(detection.special_codes, vec!["RECV-01".to_string()]);
    }

    #[test]
    fn test_detect_tie_prefers_hierarchical() {
        let detection =
            LocationFormatDetector::detect(&samples(&["01-01-001A", "011B"])).unwrap();
        assert_eq!(detection.format.kind, LocationFormatKind::Hierarchical);
    }

    #[test]
    fn test_detect_empty_input() {
        let result = LocationFormatDetector::detect(&samples(&["", "   "]));
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_suggest_template_from_detection() {
        let detection = LocationFormatDetector::detect(&samples(&[
            "01-02-010A",
            "03-01-005D",
            "RECV-01",
            "STAGE-01",
            "DOCK-02",
        ]))
        .unwrap();
        let template = LocationFormatDetector::suggest_template("T-NEW", "new", &detection);

        assert_eq!(template.num_aisles, 3);
        assert_eq!(template.racks_per_aisle, 2);
        assert_eq!(template.positions_per_rack, 10);
        assert_eq!(template.levels_per_position, 4);
        assert_eq!(template.receiving_areas.len(), 1);
        assert_eq!(template.staging_areas.len(), 1);
        assert_eq!(template.dock_areas.len(), 1);
        assert!(template.validate().is_ok());
    }
}
