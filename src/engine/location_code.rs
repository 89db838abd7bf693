// ==========================================
// WareWise 仓库异常检测 - 库位编码解析
// ==========================================
// 职责: 库位编码标准化、结构化解析、特殊区域比较键
// 红线: 纯函数，无状态，无 I/O
// ==========================================
// 支持格式:
// - HIERARCHICAL   02-06-011B        (通道-货架-储位+层)
// - EXPLICIT       A01-R02-P015-L3   (数字层，从 1 开始)
// - POSITION_LEVEL 011B              (全仓连续储位号+层)
// ==========================================

use crate::domain::types::LocationFormatKind;
use once_cell::sync::Lazy;
use regex::Regex;

pub static HIERARCHICAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3})-(\d{1,3})-(\d{1,4})([A-Z])$").unwrap());

pub static EXPLICIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^A(\d{1,3})-R(\d{1,3})-P(\d{1,4})-L(\d{1,2})$").unwrap());

pub static POSITION_LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,4})([A-Z])$").unwrap());

/// 特殊区域形态: 字母前缀 + 可选分隔符 + 数字
pub static SPECIAL_LIKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]+[-_]?\d+[A-Z]?$").unwrap());

pub static AISLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^AISLE[-_]?(\d{1,3})$").unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// ==========================================
// ParsedLocationCode - 结构化库位坐标
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedLocationCode {
    pub kind: LocationFormatKind,
    /// POSITION_LEVEL 格式无通道/货架信息
    pub aisle: Option<u32>,
    pub rack: Option<u32>,
    pub position: u32,
    /// EXPLICIT 格式的数字层已换算为字母（1 → 'A'）
    pub level: LevelRef,
}

/// 层引用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelRef {
    Letter(char),
    Number(u32),
}

/// 标准化库位编码
///
/// # 规则
/// 1. 去首尾空白，转大写，内部空白压缩为单个空格
/// 2. 若编码本身不可识别，而去掉 `<前缀>_` 后可识别，则剥离仓库前缀
///    (WH01_RECV-01 → RECV-01, USER_TESTF_02-01-001A → 02-01-001A)
pub fn normalize(code: &str) -> String {
    let upper = WHITESPACE_RE
        .replace_all(code.trim(), " ")
        .to_uppercase();

    if upper.is_empty() || is_recognizable(&upper) {
        return upper;
    }

    for (idx, ch) in upper.char_indices() {
        if ch != '_' {
            continue;
        }
        let remainder = &upper[idx + 1..];
        if !remainder.is_empty() && is_recognizable(remainder) {
            return remainder.to_string();
        }
    }

    upper
}

fn is_recognizable(code: &str) -> bool {
    parse_normalized(code).is_some() || SPECIAL_LIKE_RE.is_match(code)
}

/// 解析库位编码（内部先标准化）
pub fn parse(code: &str) -> Option<ParsedLocationCode> {
    parse_normalized(&normalize(code))
}

fn parse_normalized(code: &str) -> Option<ParsedLocationCode> {
    if let Some(caps) = HIERARCHICAL_RE.captures(code) {
        return Some(ParsedLocationCode {
            kind: LocationFormatKind::Hierarchical,
            aisle: caps[1].parse().ok(),
            rack: caps[2].parse().ok(),
            position: caps[3].parse().ok()?,
            level: LevelRef::Letter(caps[4].chars().next()?),
        });
    }

    if let Some(caps) = EXPLICIT_RE.captures(code) {
        return Some(ParsedLocationCode {
            kind: LocationFormatKind::Explicit,
            aisle: caps[1].parse().ok(),
            rack: caps[2].parse().ok(),
            position: caps[3].parse().ok()?,
            level: LevelRef::Number(caps[4].parse().ok()?),
        });
    }

    if let Some(caps) = POSITION_LEVEL_RE.captures(code) {
        return Some(ParsedLocationCode {
            kind: LocationFormatKind::PositionLevel,
            aisle: None,
            rack: None,
            position: caps[1].parse().ok()?,
            level: LevelRef::Letter(caps[2].chars().next()?),
        });
    }

    None
}

/// 特殊区域比较键（去掉 `-` 与 `_`）：RECV01 ≡ RECV-01 ≡ RECV_01
pub fn special_key(code: &str) -> String {
    normalize(code)
        .chars()
        .filter(|c| *c != '-' && *c != '_' && *c != ' ')
        .collect()
}

/// 通道编号（AISLE-03 → 3）
pub fn aisle_number(code: &str) -> Option<u32> {
    AISLE_RE
        .captures(&normalize(code))
        .and_then(|caps| caps[1].parse().ok())
}

/// 生成标准层级编码
pub fn canonical_hierarchical(aisle: u32, rack: u32, position: u32, level: char) -> String {
    format!("{:02}-{:02}-{:03}{}", aisle, rack, position, level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trim_upper() {
        assert_eq!(normalize("  recv-01 "), "RECV-01");
        assert_eq!(normalize("stage   area"), "STAGE AREA");
    }

    #[test]
    fn test_normalize_strip_warehouse_prefix() {
        assert_eq!(normalize("WH01_RECV-01"), "RECV-01");
        assert_eq!(normalize("USER_TESTF_02-01-001A"), "02-01-001A");
        // 自身可识别时不剥离
        assert_eq!(normalize("AISLE_01"), "AISLE_01");
        assert_eq!(normalize("RECV_01"), "RECV_01");
    }

    #[test]
    fn test_parse_hierarchical() {
        let parsed = parse("02-06-011B").unwrap();
        assert_eq!(parsed.kind, LocationFormatKind::Hierarchical);
        assert_eq!(parsed.aisle, Some(2));
        assert_eq!(parsed.rack, Some(6));
        assert_eq!(parsed.position, 11);
        assert_eq!(parsed.level, LevelRef::Letter('B'));
    }

    #[test]
    fn test_parse_explicit_and_position_level() {
        let explicit = parse("a01-r02-p015-l3").unwrap();
        assert_eq!(explicit.kind, LocationFormatKind::Explicit);
        assert_eq!(explicit.level, LevelRef::Number(3));

        let pl = parse("325B").unwrap();
        assert_eq!(pl.kind, LocationFormatKind::PositionLevel);
        assert_eq!(pl.position, 325);
        assert!(pl.aisle.is_none());
    }

    #[test]
    fn test_parse_rejects_special_and_garbage() {
        assert!(parse("RECV-01").is_none());
        assert!(parse("").is_none());
        assert!(parse("02-06-011").is_none());
    }

    #[test]
    fn test_special_key_equivalence() {
        assert_eq!(special_key("RECV01"), special_key("recv-01"));
        assert_eq!(special_key("WH01_STAGE-01"), "STAGE01");
    }

    #[test]
    fn test_canonical_and_aisle_number() {
        assert_eq!(canonical_hierarchical(2, 6, 11, 'B'), "02-06-011B");
        assert_eq!(aisle_number("aisle-03"), Some(3));
        assert_eq!(aisle_number("AISLE03"), Some(3));
        assert_eq!(aisle_number("RECV-01"), None);
    }
}
