// ==========================================
// WareWise 仓库异常检测 - JSON 行读取
// ==========================================
// 输入: JSON 数组，每个元素为 { 表头: 值 } 对象
// 输出: 表头 → 字符串值（供 ColumnMatcher / InventoryMapper 使用）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// 从文件读取库存行
pub fn read_json_rows(path: &Path) -> ImportResult<Vec<HashMap<String, String>>> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    parse_json_rows(&content)
}

/// 解析 JSON 文本为库存行
///
/// # 规则
/// - 顶层必须为数组，元素必须为对象
/// - 字符串原样保留；数字/布尔转文本；null 视为空串
/// - 嵌套对象/数组按 JSON 文本保留
pub fn parse_json_rows(content: &str) -> ImportResult<Vec<HashMap<String, String>>> {
    let value: Value = serde_json::from_str(content)?;
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(ImportError::JsonParseError(format!(
                "顶层应为数组，实际为 {}",
                json_kind(&other)
            )))
        }
    };

    let mut rows = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let object = match item {
            Value::Object(map) => map,
            other => {
                return Err(ImportError::FieldMappingError {
                    row: idx + 1,
                    message: format!("行应为对象，实际为 {}", json_kind(&other)),
                })
            }
        };
        let row = object
            .into_iter()
            .map(|(key, value)| (key, value_to_text(value)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
