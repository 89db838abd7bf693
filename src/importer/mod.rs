// ==========================================
// WareWise 仓库异常检测 - 导入层
// ==========================================
// 职责: 源数据表头匹配、库存行映射、数据质量记录
// 输入: 已解析的行 (表头 → 值)，或 JSON 数组文件
// ==========================================

// 模块声明
pub mod column_matcher;
pub mod error;
pub mod inventory_mapper;
pub mod json_rows;

// 重导出核心类型
pub use column_matcher::{ColumnMapping, ColumnMatcher};
pub use error::{ImportError, ImportResult};
pub use inventory_mapper::{DqLevel, DqViolation, InventoryMapper, MappedInventory};
pub use json_rows::{parse_json_rows, read_json_rows};
