// ==========================================
// WareWise 仓库异常检测 - 库存记录
// ==========================================
// 说明: 临时数据，不落库；由导入层映射后交给规则引擎
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub pallet_id: String,
    pub location: String,
    pub creation_date: NaiveDateTime,
    #[serde(default)]
    pub receipt_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// 操作员提供的库位类型列（可选）
    #[serde(default)]
    pub location_type: Option<String>,
    /// 源数据行号（用于报告定位）
    #[serde(default)]
    pub row_number: usize,
}

impl InventoryRecord {
    pub fn new(pallet_id: &str, location: &str, creation_date: NaiveDateTime) -> Self {
        Self {
            pallet_id: pallet_id.to_string(),
            location: location.to_string(),
            creation_date,
            receipt_number: None,
            description: None,
            location_type: None,
            row_number: 0,
        }
    }

    pub fn with_receipt(mut self, receipt_number: &str) -> Self {
        self.receipt_number = Some(receipt_number.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// 停留时长（小时）
    pub fn age_hours(&self, now: NaiveDateTime) -> f64 {
        (now - self.creation_date).num_minutes() as f64 / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_age_hours() {
        let created = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let now = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(20, 30, 0)
            .unwrap();
        let record = InventoryRecord::new("P1", "RECV-01", created);
        assert!((record.age_hours(now) - 12.5).abs() < 1e-9);
    }
}
