// ==========================================
// WareWise 仓库异常检测 - 领域层
// ==========================================
// 职责: 仓库模板、库位、库存记录、规则与异常
// ==========================================

pub mod inventory;
pub mod location;
pub mod rule;
pub mod types;
pub mod warehouse;

pub use inventory::InventoryRecord;
pub use location::{Location, LocationValidation, VirtualLocation};
pub use rule::{Anomaly, Rule, RuleCategory, RulePerformance};
pub use types::{ClassificationMethod, LocationFormatKind, LocationType, Priority, RuleType};
pub use warehouse::{LocationFormatConfig, SpecialArea, WarehouseTemplate};
