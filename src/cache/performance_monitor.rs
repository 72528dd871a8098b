use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 检索缓存性能监控器
#[derive(Clone)]
pub struct CachePerformanceMonitor {
    metrics: Arc<CacheMetrics>,
}

/// 缓存指标
#[derive(Default)]
pub struct CacheMetrics {
    /// 内存命中次数
    pub memory_hits: AtomicUsize,
    /// 磁盘命中次数
    pub disk_hits: AtomicUsize,
    /// 缓存未命中次数（即外部检索调用次数）
    pub cache_misses: AtomicUsize,
    /// 缓存写入次数
    pub cache_writes: AtomicUsize,
    /// 缓存错误次数
    pub cache_errors: AtomicUsize,
    /// 检索失败次数，失败结果不写入缓存
    pub fetch_failures: AtomicUsize,
}

/// 缓存性能报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePerformanceReport {
    /// 缓存命中率
    pub hit_rate: f64,
    /// 总查询次数
    pub total_operations: usize,
    pub memory_hits: usize,
    pub disk_hits: usize,
    pub cache_misses: usize,
    pub cache_writes: usize,
    pub cache_errors: usize,
    pub fetch_failures: usize,
}

impl CachePerformanceReport {
    pub fn cache_hits(&self) -> usize {
        self.memory_hits + self.disk_hits
    }
}

impl CachePerformanceMonitor {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(CacheMetrics::default()),
        }
    }

    /// 记录内存命中
    pub fn record_memory_hit(&self, query: &str) {
        self.metrics.memory_hits.fetch_add(1, Ordering::Relaxed);
        tracing::info!("   💰 检索缓存命中 - {}", preview(query));
    }

    /// 记录磁盘命中
    pub fn record_disk_hit(&self, query: &str) {
        self.metrics.disk_hits.fetch_add(1, Ordering::Relaxed);
        tracing::info!("   💰 磁盘缓存命中 - {}", preview(query));
    }

    /// 记录缓存未命中
    pub fn record_cache_miss(&self, query: &str) {
        self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("   ⌛ 缓存未命中 - 需要调用检索服务: {}", preview(query));
    }

    /// 记录缓存写入
    pub fn record_cache_write(&self) {
        self.metrics.cache_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录缓存错误
    pub fn record_cache_error(&self, error: &str) {
        self.metrics.cache_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("   ❌ 缓存错误: {}", error);
    }

    pub fn record_fetch_failure(&self) {
        self.metrics.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 生成性能报告
    pub fn generate_report(&self) -> CachePerformanceReport {
        let memory_hits = self.metrics.memory_hits.load(Ordering::Relaxed);
        let disk_hits = self.metrics.disk_hits.load(Ordering::Relaxed);
        let misses = self.metrics.cache_misses.load(Ordering::Relaxed);
        let total_operations = memory_hits + disk_hits + misses;

        let hit_rate = if total_operations > 0 {
            (memory_hits + disk_hits) as f64 / total_operations as f64
        } else {
            0.0
        };

        CachePerformanceReport {
            hit_rate,
            total_operations,
            memory_hits,
            disk_hits,
            cache_misses: misses,
            cache_writes: self.metrics.cache_writes.load(Ordering::Relaxed),
            cache_errors: self.metrics.cache_errors.load(Ordering::Relaxed),
            fetch_failures: self.metrics.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for CachePerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn preview(query: &str) -> String {
    query.chars().take(50).collect()
}
