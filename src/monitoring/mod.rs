// ==========================================
// WareWise 仓库异常检测 - 运行监控
// ==========================================
// 职责: 操作耗时/结果环形缓冲、数据库错误计数、慢 SQL 日志
// ==========================================

pub mod db_errors;
pub mod request_monitor;
pub mod slow_sql;

pub use db_errors::{database_error_count, log_database_error};
pub use request_monitor::{
    MonitorStats, OperationGuard, PrunerHandle, RequestLogEntry, RequestMonitor,
    DEFAULT_BUFFER_SIZE,
};
pub use slow_sql::{install_slow_sql_logging, slow_sql_count};
