// ==========================================
// WareWise 仓库异常检测 - 请求监控
// ==========================================
// 职责: 有界内存环形缓冲记录每次操作的耗时与结果
// 约束: 锁不可重入，持锁期间不调用其他加锁方法
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// 默认缓冲容量
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

// ==========================================
// RequestLogEntry - 单条操作记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub operation: String,
    pub warehouse_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

// ==========================================
// MonitorStats - 统计快照
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub total: usize,
    pub errors: usize,
    pub error_rate: f64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
    pub per_operation: BTreeMap<String, usize>,
}

// ==========================================
// RequestMonitor
// ==========================================
pub struct RequestMonitor {
    capacity: usize,
    entries: Mutex<VecDeque<RequestLogEntry>>,
}

impl Default for RequestMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl RequestMonitor {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RequestLogEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 记录一条操作（满时淘汰最旧记录）
    pub fn record(&self, entry: RequestLogEntry) {
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 最近 n 条（新 → 旧）
    pub fn recent(&self, n: usize) -> Vec<RequestLogEntry> {
        self.lock().iter().rev().take(n).cloned().collect()
    }

    pub fn stats(&self) -> MonitorStats {
        let entries = self.lock();
        let total = entries.len();
        if total == 0 {
            return MonitorStats::default();
        }

        let mut stats = MonitorStats {
            total,
            ..Default::default()
        };
        let mut duration_sum: u64 = 0;
        for entry in entries.iter() {
            if !entry.success {
                stats.errors += 1;
            }
            duration_sum = duration_sum.saturating_add(entry.duration_ms);
            stats.max_duration_ms = stats.max_duration_ms.max(entry.duration_ms);
            *stats.per_operation.entry(entry.operation.clone()).or_insert(0) += 1;
        }
        stats.error_rate = stats.errors as f64 / total as f64;
        stats.avg_duration_ms = duration_sum as f64 / total as f64;
        stats
    }

    /// 清理早于 max_age 的记录，返回清理条数
    pub fn prune_older_than(&self, max_age: Duration) -> usize {
        let max_age = match chrono::Duration::from_std(max_age) {
            Ok(d) => d,
            Err(_) => return 0,
        };
        let cutoff = Utc::now() - max_age;

        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| e.started_at >= cutoff);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// 启动后台清理线程
    pub fn start_pruner(
        self: &Arc<Self>,
        interval: Duration,
        retention: Duration,
    ) -> std::io::Result<PrunerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let monitor = Arc::clone(self);
        let stop_flag = Arc::clone(&stop);
        // 短步长轮询停止标志，保证 stop() 及时返回
        let tick = interval.min(Duration::from_millis(100)).max(Duration::from_millis(1));

        let handle = std::thread::Builder::new()
            .name("warewise-monitor-pruner".to_string())
            .spawn(move || {
                let mut last_prune = Instant::now();
                while !stop_flag.load(Ordering::Relaxed) {
                    std::thread::sleep(tick);
                    if last_prune.elapsed() < interval {
                        continue;
                    }
                    last_prune = Instant::now();
                    let removed = monitor.prune_older_than(retention);
                    if removed > 0 {
                        tracing::debug!(target: "perf", removed, "监控记录已清理");
                    }
                }
            })?;

        Ok(PrunerHandle {
            stop,
            handle: Some(handle),
        })
    }
}

// ==========================================
// PrunerHandle - 后台清理线程句柄
// ==========================================
pub struct PrunerHandle {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PrunerHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("监控清理线程异常退出");
            }
        }
    }
}

impl Drop for PrunerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ==========================================
// OperationGuard - 操作计时 Guard
// ==========================================
/// drop 时记录一条监控记录并输出 perf 日志
///
/// ```ignore
/// let mut guard = OperationGuard::new(&monitor, "run_analysis", Some("WH01"));
/// if let Err(e) = do_work() {
///     guard.fail(e.to_string());
/// }
/// ```
pub struct OperationGuard<'a> {
    monitor: &'a RequestMonitor,
    operation: String,
    warehouse_id: Option<String>,
    started_at: DateTime<Utc>,
    start: Instant,
    error: Option<String>,
}

impl<'a> OperationGuard<'a> {
    pub fn new(monitor: &'a RequestMonitor, operation: &str, warehouse_id: Option<&str>) -> Self {
        Self {
            monitor,
            operation: operation.to_string(),
            warehouse_id: warehouse_id.map(|s| s.to_string()),
            started_at: Utc::now(),
            start: Instant::now(),
            error: None,
        }
    }

    /// 标记失败
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_millis() as u64;
        let success = self.error.is_none();

        tracing::info!(
            target: "perf",
            op = %self.operation,
            warehouse_id = ?self.warehouse_id,
            elapsed_ms = duration_ms,
            success,
            "done"
        );

        self.monitor.record(RequestLogEntry {
            operation: std::mem::take(&mut self.operation),
            warehouse_id: self.warehouse_id.take(),
            started_at: self.started_at,
            duration_ms,
            success,
            error: self.error.take(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(op: &str, success: bool, duration_ms: u64) -> RequestLogEntry {
        RequestLogEntry {
            operation: op.to_string(),
            warehouse_id: None,
            started_at: Utc::now(),
            duration_ms,
            success,
            error: if success { None } else { Some("failed".to_string()) },
        }
    }

    #[test]
    fn test_buffer_never_exceeds_capacity() {
        let monitor = RequestMonitor::new(3);
        for i in 0..10 {
            monitor.record(entry(&format!("op{}", i), true, i));
        }
        assert_eq!(monitor.len(), 3);
        let recent = monitor.recent(10);
        assert_eq!(recent[0].operation, "op9");
        assert_eq!(recent[2].operation, "op7");
    }

    #[test]
    fn test_stats() {
        let monitor = RequestMonitor::default();
        monitor.record(entry("analyze", true, 10));
        monitor.record(entry("analyze", false, 30));
        monitor.record(entry("validate", true, 20));

        let stats = monitor.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.errors, 1);
        assert!((stats.error_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((stats.avg_duration_ms - 20.0).abs() < 1e-9);
        assert_eq!(stats.max_duration_ms, 30);
        assert_eq!(stats.per_operation["analyze"], 2);
    }

    #[test]
    fn test_prune_older_than() {
        let monitor = RequestMonitor::default();
        let mut old = entry("old", true, 1);
        old.started_at = Utc::now() - chrono::Duration::hours(48);
        monitor.record(old);
        monitor.record(entry("fresh", true, 1));

        let removed = monitor.prune_older_than(Duration::from_secs(24 * 3600));
        assert_eq!(removed, 1);
        assert_eq!(monitor.recent(1)[0].operation, "fresh");
    }

    #[test]
    fn test_operation_guard_records_on_drop() {
        let monitor = RequestMonitor::default();
        {
            let _guard = OperationGuard::new(&monitor, "ok_op", Some("WH01"));
        }
        {
            let mut guard = OperationGuard::new(&monitor, "bad_op", None);
            guard.fail("boom");
        }

        let recent = monitor.recent(2);
        assert_eq!(recent[0].operation, "bad_op");
        assert!(!recent[0].success);
        assert_eq!(recent[0].error.as_deref(), Some("boom"));
        assert_eq!(recent[1].warehouse_id.as_deref(), Some("WH01"));
        assert!(recent[1].success);
    }

    #[test]
    fn test_pruner_thread_stops() {
        let monitor = Arc::new(RequestMonitor::default());
        let mut old = entry("old", true, 1);
        old.started_at = Utc::now() - chrono::Duration::hours(2);
        monitor.record(old);

        let handle = monitor
            .start_pruner(Duration::from_millis(5), Duration::from_secs(60))
            .unwrap();
        assert!(handle.is_running());
        let deadline = Instant::now() + Duration::from_secs(5);
        while !monitor.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        handle.stop();
        assert!(monitor.is_empty());
    }
}
