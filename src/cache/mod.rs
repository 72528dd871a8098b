use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;

use crate::config::CacheConfig;
use crate::search::{ProviderError, SearchProvider, WebHit};

pub mod performance_monitor;
pub use performance_monitor::{CachePerformanceMonitor, CachePerformanceReport};

/// 检索查询缓存
///
/// 进程内共享，由调用方显式创建并注入编排器。内存层无淘汰；
/// 可选的磁盘层在多次运行之间复用结果，按 `expire_hours` 过期。
pub struct QueryCache {
    entries: RwLock<HashMap<String, Vec<WebHit>>>,
    disk: Option<CacheConfig>,
    performance_monitor: CachePerformanceMonitor,
}

/// 磁盘缓存条目
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: u64,
    /// 归一化查询的MD5哈希值
    pub query_hash: String,
    /// 原始查询，便于排查
    pub query: String,
}

/// 一次缓存查询的结果
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub hits: Vec<WebHit>,
    pub from_cache: bool,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl QueryCache {
    /// 仅内存层
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            disk: None,
            performance_monitor: CachePerformanceMonitor::new(),
        }
    }

    /// 按配置决定是否启用磁盘层
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            disk: config.enabled.then(|| config.clone()),
            ..Self::new()
        }
    }

    /// 生成查询的缓存键：小写、去首尾空白后取MD5
    pub fn hash_query(query: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(query.trim().to_lowercase().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// 获取缓存文件路径
    fn get_cache_path(config: &CacheConfig, hash: &str) -> PathBuf {
        config.cache_dir.join("search").join(format!("{}.json", hash))
    }

    /// 检查缓存是否过期
    fn is_expired(config: &CacheConfig, timestamp: u64) -> bool {
        let expire_seconds = config.expire_hours * 3600;
        now_secs().saturating_sub(timestamp) > expire_seconds
    }

    fn get_memory(&self, hash: &str) -> Option<Vec<WebHit>> {
        match self.entries.read() {
            Ok(entries) => entries.get(hash).cloned(),
            Err(poisoned) => poisoned.into_inner().get(hash).cloned(),
        }
    }

    fn put_memory(&self, hash: String, hits: Vec<WebHit>) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(hash, hits);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(hash, hits);
            }
        }
    }

    async fn get_disk(&self, hash: &str) -> Option<Vec<WebHit>> {
        let config = self.disk.as_ref()?;
        let cache_path = Self::get_cache_path(config, hash);
        if !cache_path.exists() {
            return None;
        }

        match fs::read_to_string(&cache_path).await {
            Ok(content) => match serde_json::from_str::<CacheEntry<Vec<WebHit>>>(&content) {
                Ok(entry) => {
                    if Self::is_expired(config, entry.timestamp) {
                        // 删除过期缓存
                        let _ = fs::remove_file(&cache_path).await;
                        return None;
                    }
                    Some(entry.data)
                }
                Err(e) => {
                    self.performance_monitor
                        .record_cache_error(&format!("反序列化失败: {}", e));
                    None
                }
            },
            Err(e) => {
                self.performance_monitor
                    .record_cache_error(&format!("读取文件失败: {}", e));
                None
            }
        }
    }

    async fn put_disk(&self, hash: &str, query: &str, hits: &[WebHit]) {
        let Some(config) = self.disk.as_ref() else {
            return;
        };
        let cache_path = Self::get_cache_path(config, hash);

        // 确保目录存在
        if let Some(parent) = cache_path.parent()
            && let Err(e) = fs::create_dir_all(parent).await
        {
            self.performance_monitor
                .record_cache_error(&format!("创建目录失败: {}", e));
            return;
        }

        let entry = CacheEntry {
            data: hits,
            timestamp: now_secs(),
            query_hash: hash.to_string(),
            query: query.to_string(),
        };

        match serde_json::to_string_pretty(&entry) {
            Ok(content) => match fs::write(&cache_path, content).await {
                Ok(_) => self.performance_monitor.record_cache_write(),
                Err(e) => self
                    .performance_monitor
                    .record_cache_error(&format!("写入文件失败: {}", e)),
            },
            Err(e) => self
                .performance_monitor
                .record_cache_error(&format!("序列化失败: {}", e)),
        }
    }

    /// 命中则直接返回已有结果；未命中时调用检索服务并写入缓存
    ///
    /// 检索失败的结果不缓存。并发下同一查询可能被重复检索，但不会写坏缓存。
    pub async fn get_or_fetch(
        &self,
        query: &str,
        max_results: usize,
        provider: &dyn SearchProvider,
    ) -> Result<CacheLookup, ProviderError> {
        let hash = Self::hash_query(query);

        if let Some(hits) = self.get_memory(&hash) {
            self.performance_monitor.record_memory_hit(query);
            return Ok(CacheLookup {
                hits,
                from_cache: true,
            });
        }

        if let Some(hits) = self.get_disk(&hash).await {
            self.performance_monitor.record_disk_hit(query);
            self.put_memory(hash, hits.clone());
            return Ok(CacheLookup {
                hits,
                from_cache: true,
            });
        }

        self.performance_monitor.record_cache_miss(query);
        let hits = match provider.search(query, max_results).await {
            Ok(hits) => hits,
            Err(e) => {
                self.performance_monitor.record_fetch_failure();
                return Err(e);
            }
        };

        self.put_disk(&hash, query, &hits).await;
        self.put_memory(hash, hits.clone());
        Ok(CacheLookup {
            hits,
            from_cache: false,
        })
    }

    /// 内存层中的查询数
    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 生成性能报告
    pub fn generate_performance_report(&self) -> CachePerformanceReport {
        self.performance_monitor.generate_report()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}
