// ==========================================
// WareWise 仓库异常检测 - 库存行映射器
// ==========================================
// 职责: 源行 (表头 → 值) + ColumnMapping → InventoryRecord
// 数据质量: 日期无法解析 → 跳过该行；托盘/库位为空 → 保留（交给 DATA_INTEGRITY 规则）
// ==========================================

use crate::domain::inventory::InventoryRecord;
use crate::importer::column_matcher::{
    ColumnMapping, CREATION_DATE, DESCRIPTION, LOCATION, LOCATION_TYPE, PALLET_ID,
    RECEIPT_NUMBER,
};
use crate::importer::error::{ImportError, ImportResult};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 支持的日期时间格式（按顺序尝试）
pub const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];
/// 仅日期格式（时间取 00:00:00）
pub const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

// ==========================================
// DqViolation - 数据质量违规记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqViolation {
    pub row_number: usize,         // 源数据行号（从 1 开始）
    pub pallet_id: Option<String>, // 托盘号（如果可解析）
    pub level: DqLevel,            // 违规级别
    pub field: String,             // 违规字段
    pub message: String,           // 违规描述
}

// ==========================================
// DqLevel - 数据质量级别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DqLevel {
    Error,   // 错误（该行跳过）
    Warning, // 警告（保留该行）
}

// ==========================================
// MappedInventory - 映射结果
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappedInventory {
    pub records: Vec<InventoryRecord>,
    pub violations: Vec<DqViolation>,
    pub total_rows: usize,
    pub skipped_rows: usize,
}

pub struct InventoryMapper;

impl InventoryMapper {
    /// 按列映射转换源行
    ///
    /// # 返回
    /// - Err(MissingColumns): 映射缺少必需列
    /// - Ok(MappedInventory): 记录与行级违规
    pub fn map_rows(
        rows: &[HashMap<String, String>],
        mapping: &ColumnMapping,
    ) -> ImportResult<MappedInventory> {
        if !mapping.is_complete() {
            return Err(ImportError::MissingColumns(mapping.unmatched_required.clone()));
        }

        let mut result = MappedInventory {
            total_rows: rows.len(),
            ..Default::default()
        };

        for (idx, row) in rows.iter().enumerate() {
            let row_number = idx + 1;
            let get = |target: &str| -> Option<String> {
                mapping
                    .source_for(target)
                    .and_then(|header| row.get(header))
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            };

            let pallet_id = get(PALLET_ID);
            let location = get(LOCATION);

            let creation_date = match get(CREATION_DATE) {
                None => {
                    result.violations.push(DqViolation {
                        row_number,
                        pallet_id: pallet_id.clone(),
                        level: DqLevel::Error,
                        field: CREATION_DATE.to_string(),
                        message: "creation_date 缺失".to_string(),
                    });
                    result.skipped_rows += 1;
                    continue;
                }
                Some(raw) => match parse_datetime(&raw) {
                    Ok(dt) => dt,
                    Err(e) => {
                        result.violations.push(DqViolation {
                            row_number,
                            pallet_id: pallet_id.clone(),
                            level: DqLevel::Error,
                            field: CREATION_DATE.to_string(),
                            message: e.to_string(),
                        });
                        result.skipped_rows += 1;
                        continue;
                    }
                },
            };

            if pallet_id.is_none() {
                result.violations.push(DqViolation {
                    row_number,
                    pallet_id: None,
                    level: DqLevel::Warning,
                    field: PALLET_ID.to_string(),
                    message: "pallet_id 为空".to_string(),
                });
            }
            if location.is_none() {
                result.violations.push(DqViolation {
                    row_number,
                    pallet_id: pallet_id.clone(),
                    level: DqLevel::Warning,
                    field: LOCATION.to_string(),
                    message: "location 为空".to_string(),
                });
            }

            let mut record = InventoryRecord::new(
                pallet_id.as_deref().unwrap_or_default(),
                location.as_deref().unwrap_or_default(),
                creation_date,
            );
            record.receipt_number = get(RECEIPT_NUMBER);
            record.description = get(DESCRIPTION);
            record.location_type = get(LOCATION_TYPE);
            record.row_number = row_number;
            result.records.push(record);
        }

        tracing::info!(
            total_rows = result.total_rows,
            mapped = result.records.len(),
            skipped = result.skipped_rows,
            violations = result.violations.len(),
            "库存行映射完成"
        );
        Ok(result)
    }
}

/// 解析日期时间（多格式）
pub fn parse_datetime(value: &str) -> ImportResult<NaiveDateTime> {
    let value = value.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(dt);
            }
        }
    }
    Err(ImportError::DateFormatError {
        row: 0,
        field: CREATION_DATE.to_string(),
        value: value.to_string(),
    })
}
