// ==========================================
// WareWise 仓库异常检测 - 数据库错误日志
// ==========================================

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

static DATABASE_ERROR_COUNT: AtomicU64 = AtomicU64::new(0);

/// 记录数据库错误（target: db_error）并计数
pub fn log_database_error(operation: &str, err: &dyn Display) {
    let total = DATABASE_ERROR_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::error!(
        target: "db_error",
        operation,
        error = %err,
        total,
        "database error"
    );
}

/// 进程启动以来的数据库错误数
pub fn database_error_count() -> u64 {
    DATABASE_ERROR_COUNT.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_increments() {
        let before = database_error_count();
        log_database_error("test_op", &"disk I/O error");
        assert!(database_error_count() > before);
    }
}
