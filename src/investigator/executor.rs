use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};

use crate::cache::QueryCache;
use crate::search::{ProviderError, SearchProvider, WebHit};
use crate::types::task::{SearchTask, Tier};

/// 单个检索任务的执行结果
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: SearchTask,
    pub hits: Vec<WebHit>,
    pub from_cache: bool,
    /// 检索失败或超时，此时 `hits` 为空
    pub failed: bool,
}

/// 并发执行器：层内并发、层间屏障
pub struct ConcurrentExecutor {
    provider: Arc<dyn SearchProvider>,
    cache: Arc<QueryCache>,
    workers: usize,
    timeout: Duration,
}

impl ConcurrentExecutor {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        cache: Arc<QueryCache>,
        workers: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            workers: workers.max(1),
            timeout,
        }
    }

    /// 执行同一层的全部任务，全部完成后才返回
    ///
    /// 单个任务失败只记为空结果，不影响同层其它任务。
    pub async fn execute_tier(&self, tasks: Vec<SearchTask>) -> Vec<TaskOutcome> {
        stream::iter(tasks)
            .map(|task| self.run_task(task))
            .buffer_unordered(self.workers)
            .collect()
            .await
    }

    /// 按层依次执行全部任务，不做提前终止判断
    pub async fn execute(&self, tasks: Vec<SearchTask>) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::with_capacity(tasks.len());
        for tier in Tier::ALL {
            let batch: Vec<SearchTask> = tasks.iter().filter(|t| t.tier == tier).cloned().collect();
            if batch.is_empty() {
                continue;
            }
            outcomes.extend(self.execute_tier(batch).await);
        }
        outcomes
    }

    async fn run_task(&self, task: SearchTask) -> TaskOutcome {
        let fetch = self
            .cache
            .get_or_fetch(&task.query, task.max_results, self.provider.as_ref());

        let result = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
        };

        match result {
            Ok(lookup) => {
                tracing::debug!(
                    "  ✓ [{}] {} ({} results)",
                    task.tier,
                    task.query,
                    lookup.hits.len()
                );
                TaskOutcome {
                    task,
                    hits: lookup.hits,
                    from_cache: lookup.from_cache,
                    failed: false,
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ 检索失败 [{}] {}: {}", task.tier, task.query, e);
                TaskOutcome {
                    task,
                    hits: Vec::new(),
                    from_cache: false,
                    failed: true,
                }
            }
        }
    }
}
