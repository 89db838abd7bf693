// ==========================================
// WareWise 仓库异常检测 - TTL 缓存
// ==========================================
// 职责: 模板解析 / 规则模式解析共用的进程内 TTL 缓存
// 并发: Mutex 保护；持锁期间不调用外部代码
// ==========================================

use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// 缓存统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct CacheInner<K, V> {
    entries: HashMap<K, (V, Instant)>,
    hits: u64,
    misses: u64,
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    inner: Mutex<CacheInner<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 读取未过期的条目；过期条目在读取时移除
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let lookup = inner
            .entries
            .get(key)
            .map(|(value, inserted_at)| (value.clone(), inserted_at.elapsed() < self.ttl));

        match lookup {
            Some((value, true)) => {
                inner.hits += 1;
                Some(value)
            }
            Some((_, false)) => {
                inner.entries.remove(key);
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.entries.insert(key, (value, Instant::now()));
    }

    pub fn invalidate(&self, key: &K) -> bool {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_and_miss() {
        let cache: TtlCache<String, i32> = TtlCache::new(Duration::from_secs(60));
        assert_eq!(cache.get(&"a".to_string()), None);
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_cache_expiry() {
        let cache: TtlCache<&'static str, i32> = TtlCache::new(Duration::from_millis(0));
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_cache_invalidate() {
        let cache: TtlCache<&'static str, i32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        assert!(cache.invalidate(&"a"));
        assert!(!cache.invalidate(&"a"));
        assert_eq!(cache.get(&"a"), None);
    }
}
