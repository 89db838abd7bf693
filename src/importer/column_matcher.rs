// ==========================================
// WareWise 仓库异常检测 - 列名智能匹配
// ==========================================
// 职责: 源表头 → 标准列 (pallet_id/location/creation_date/...)
// 评分: 别名精确 1.0 > 别名包含 0.85 > 编辑距离相似度
// 分配: 按分数降序贪心，一对一
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// 默认匹配阈值
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.7;

const CONTAINMENT_SCORE: f64 = 0.85;
const MIN_CONTAINMENT_LEN: usize = 3;
/// 表头被别名包含时，表头长度至少占别名的比例
const MIN_HEADER_COVERAGE: f64 = 0.67;

// ==========================================
// 标准列定义
// ==========================================
pub const PALLET_ID: &str = "pallet_id";
pub const LOCATION: &str = "location";
pub const CREATION_DATE: &str = "creation_date";
pub const RECEIPT_NUMBER: &str = "receipt_number";
pub const DESCRIPTION: &str = "description";
pub const LOCATION_TYPE: &str = "location_type";

pub const REQUIRED_COLUMNS: [&str; 3] = [PALLET_ID, LOCATION, CREATION_DATE];

/// (标准列, 别名列表)；别名为归一化形式
const TARGET_ALIASES: &[(&str, &[&str])] = &[
    (
        PALLET_ID,
        &["palletid", "pallet", "palletno", "palletnumber", "lpn", "licenseplate", "sscc", "tagid"],
    ),
    (
        LOCATION,
        &["location", "currentlocation", "loc", "locationcode", "bin", "slot", "binlocation"],
    ),
    (
        CREATION_DATE,
        &[
            "creationdate",
            "createddate",
            "created",
            "createdat",
            "date",
            "receiveddate",
            "timestamp",
            "datetime",
        ],
    ),
    (
        RECEIPT_NUMBER,
        &["receiptnumber", "receipt", "receiptno", "lot", "lotnumber", "batch", "po", "ponumber"],
    ),
    (
        DESCRIPTION,
        &["description", "productdescription", "product", "item", "itemdescription", "sku", "desc"],
    ),
    (
        LOCATION_TYPE,
        &["locationtype", "loctype", "areatype", "zone type", "zonetype"],
    ),
];

// ==========================================
// ColumnMapping - 匹配结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// 标准列 → 源表头
    pub mapping: BTreeMap<String, String>,
    /// 标准列 → 匹配分数
    pub confidence: BTreeMap<String, f64>,
    pub unmatched_required: Vec<String>,
    pub unmatched_headers: Vec<String>,
}

impl ColumnMapping {
    /// 必需列是否全部匹配
    pub fn is_complete(&self) -> bool {
        self.unmatched_required.is_empty()
    }

    pub fn source_for(&self, target: &str) -> Option<&str> {
        self.mapping.get(target).map(String::as_str)
    }
}

// ==========================================
// ColumnMatcher
// ==========================================
pub struct ColumnMatcher {
    threshold: f64,
}

impl Default for ColumnMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl ColumnMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 匹配源表头
    pub fn match_columns(&self, headers: &[String]) -> ColumnMapping {
        let mut candidates: Vec<(f64, usize, &str)> = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            for (target, aliases) in TARGET_ALIASES {
                let score = Self::score(header, aliases);
                if score >= self.threshold {
                    candidates.push((score, idx, target));
                }
            }
        }

        // 分数降序；同分按表头顺序、标准列顺序稳定
        candidates.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
                .then(target_rank(a.2).cmp(&target_rank(b.2)))
        });

        let mut result = ColumnMapping::default();
        let mut used_headers: HashSet<usize> = HashSet::new();
        for (score, idx, target) in candidates {
            if used_headers.contains(&idx) || result.mapping.contains_key(target) {
                continue;
            }
            used_headers.insert(idx);
            result.mapping.insert(target.to_string(), headers[idx].clone());
            result.confidence.insert(target.to_string(), score);
        }

        result.unmatched_required = REQUIRED_COLUMNS
            .iter()
            .filter(|t| !result.mapping.contains_key(**t))
            .map(|t| t.to_string())
            .collect();
        result.unmatched_headers = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| !used_headers.contains(idx))
            .map(|(_, h)| h.clone())
            .collect();

        tracing::debug!(
            matched = result.mapping.len(),
            unmatched_required = ?result.unmatched_required,
            "列名匹配完成"
        );
        result
    }

    /// 单表头对单标准列的最高分
    fn score(header: &str, aliases: &[&str]) -> f64 {
        let normalized = normalize_header(header);
        if normalized.is_empty() {
            return 0.0;
        }

        let mut best: f64 = 0.0;
        for alias in aliases {
            let alias = normalize_header(alias);
            if alias.is_empty() {
                continue;
            }
            if alias == normalized {
                return 1.0;
            }
            if Self::contains_alias(&normalized, &alias) {
                best = best.max(CONTAINMENT_SCORE);
                continue;
            }
            best = best.max(similarity(&normalized, &alias));
        }
        best
    }

    /// 包含关系判定（两侧均已归一化）
    ///
    /// 别名包含于表头: 别名长度 >= 3
    /// 表头包含于别名: 表头长度 >= 3 且覆盖别名的大部分，
    /// 避免 "ID"、"Type" 这类泛化表头命中 palletid、locationtype
    fn contains_alias(header: &str, alias: &str) -> bool {
        if header.len() < MIN_CONTAINMENT_LEN || alias.len() < MIN_CONTAINMENT_LEN {
            return false;
        }
        if header.contains(alias) {
            return true;
        }
        alias.contains(header) && header.len() as f64 / alias.len() as f64 >= MIN_HEADER_COVERAGE
    }
}

fn target_rank(target: &str) -> usize {
    TARGET_ALIASES
        .iter()
        .position(|(t, _)| *t == target)
        .unwrap_or(usize::MAX)
}

/// 表头归一化: 小写，仅保留 [a-z0-9]
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// 归一化编辑距离相似度: 1 - dist / max_len
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}
