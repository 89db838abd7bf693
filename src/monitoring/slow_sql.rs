// ==========================================
// WareWise 仓库异常检测 - 慢 SQL 日志
// ==========================================
// 开关:
// - WAREWISE_SLOW_SQL_MS=50 配置阈值（毫秒，0 关闭）
// - 未配置时 Debug 50ms，Release 200ms
// ==========================================

use rusqlite::Connection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);
static SLOW_SQL_COUNT: AtomicU64 = AtomicU64::new(0);

const MAX_LOGGED_SQL_LEN: usize = 420;

fn truncate_sql(sql: &str, max_len: usize) -> String {
    let s = sql.trim().replace('\n', " ");
    if s.chars().count() <= max_len {
        return s;
    }
    let cut: String = s.chars().take(max_len).collect();
    format!("{}…", cut)
}

/// 安装慢 SQL profile 回调
pub fn install_slow_sql_logging(conn: &mut Connection) {
    let threshold = std::env::var("WAREWISE_SLOW_SQL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
    SLOW_SQL_THRESHOLD_MS.store(threshold, Ordering::Relaxed);

    if threshold == 0 {
        conn.profile(None);
        return;
    }
    conn.profile(Some(sql_profile_callback));
}

fn sql_profile_callback(sql: &str, duration: Duration) {
    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    if threshold == 0 || ms < threshold {
        return;
    }
    SLOW_SQL_COUNT.fetch_add(1, Ordering::Relaxed);
    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %truncate_sql(sql, MAX_LOGGED_SQL_LEN),
        "slow sql"
    );
}

/// 进程启动以来的慢 SQL 数
pub fn slow_sql_count() -> u64 {
    SLOW_SQL_COUNT.load(Ordering::Relaxed)
}
