//! 调查编排器 - 单条线索的规划、本地库查询、分层检索、聚合与评分

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures::{StreamExt, stream};

use crate::cache::{CachePerformanceReport, QueryCache};
use crate::config::Config;
use crate::llm::client::{LLMClient, ReasoningModel};
use crate::search::{SearchProvider, TavilyProvider};
use crate::store::{EvidenceStore, SqliteStore};
use crate::types::evidence::DatabaseEvidence;
use crate::types::identifier::Identifier;
use crate::types::lead::Lead;
use crate::types::task::{SearchPurpose, SearchTask, Tier};
use crate::types::verdict::{FailedInvestigation, InvestigationOutcome, StopReason, Telemetry};

pub mod aggregator;
pub mod executor;
pub mod planner;
pub mod scoring;
pub mod termination;

use executor::{ConcurrentExecutor, TaskOutcome};
use planner::SearchPlanner;
use scoring::ScoringEngine;
use termination::TerminationPolicy;

/// 时间跟踪作用域
pub struct TimingScope {
    start_time: std::time::Instant,
    phase_start_times: HashMap<String, std::time::Instant>,
    phase_durations: HashMap<String, Duration>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: std::time::Instant::now(),
            phase_start_times: HashMap::new(),
            phase_durations: HashMap::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, phase_name: &str) {
        self.phase_start_times
            .insert(phase_name.to_string(), std::time::Instant::now());
    }

    /// 结束一个阶段的计时，同名阶段多次出现时累加
    pub fn end_phase(&mut self, phase_name: &str) -> Option<Duration> {
        let start_time = self.phase_start_times.remove(phase_name)?;
        let duration = start_time.elapsed();
        *self
            .phase_durations
            .entry(phase_name.to_string())
            .or_default() += duration;
        Some(duration)
    }

    /// 获取总执行时间
    pub fn get_total_duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 各阶段耗时（毫秒）
    pub fn phase_millis(&self) -> std::collections::BTreeMap<String, u64> {
        self.phase_durations
            .iter()
            .map(|(phase, duration)| (phase.clone(), duration.as_millis() as u64))
            .collect()
    }
}

/// 时间跟踪常量
pub struct TimingKeys;

impl TimingKeys {
    pub const PLAN: &'static str = "plan";
    pub const DB_LOOKUP: &'static str = "db_lookup";
    pub const SEARCH: &'static str = "search";
    pub const AGGREGATE: &'static str = "aggregate";
    pub const SCORING: &'static str = "scoring";
}

/// 单条线索的调查状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestigationState {
    Planned,
    DbLookup,
    Searching(Tier),
    Aggregating,
    Scoring,
    Done,
    Failed,
}

impl Display for InvestigationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InvestigationState::Planned => write!(f, "PLANNED"),
            InvestigationState::DbLookup => write!(f, "DB_LOOKUP"),
            InvestigationState::Searching(tier) => write!(f, "SEARCHING({})", tier),
            InvestigationState::Aggregating => write!(f, "AGGREGATING"),
            InvestigationState::Scoring => write!(f, "SCORING"),
            InvestigationState::Done => write!(f, "DONE"),
            InvestigationState::Failed => write!(f, "FAILED"),
        }
    }
}

fn transition(lead_id: &str, state: &mut InvestigationState, next: InvestigationState) {
    tracing::info!("🔎 线索 {}: {} → {}", lead_id, state, next);
    *state = next;
}

/// 批量调查汇总
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub done: usize,
    pub failed: usize,
    pub cache: CachePerformanceReport,
}

/// 调查编排器
///
/// 除共享的检索缓存外不持有任何跨线索状态，可被多条线索并发调用。
pub struct Investigator {
    planner: SearchPlanner,
    store: Arc<dyn EvidenceStore>,
    executor: ConcurrentExecutor,
    termination: TerminationPolicy,
    scoring: ScoringEngine,
    cache: Arc<QueryCache>,
}

impl Investigator {
    pub fn new(
        config: &Config,
        provider: Arc<dyn SearchProvider>,
        store: Arc<dyn EvidenceStore>,
        model: Arc<dyn ReasoningModel>,
        cache: Arc<QueryCache>,
    ) -> Result<Self> {
        let reference_year = config.reference_year();
        Ok(Self {
            planner: SearchPlanner::new(config.planner.clone(), reference_year),
            store,
            executor: ConcurrentExecutor::new(
                provider,
                cache.clone(),
                config.search.workers,
                Duration::from_secs(config.search.timeout_seconds),
            ),
            termination: TerminationPolicy::new(&config.termination, reference_year),
            scoring: ScoringEngine::new(model, config.scoring.clone())?,
            cache,
        })
    }

    /// 使用真实的检索服务、SQLite 库与 LLM 创建编排器
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.search.api_key.trim().is_empty() {
            tracing::warn!("⚠️ 未配置 TAVILY_API_KEY，所有网页检索都将失败并记为空结果");
        }
        if !config.store.database_path.exists() {
            tracing::warn!(
                "⚠️ 本地证据库不存在: {:?}，将仅使用网页检索",
                config.store.database_path
            );
        }

        let provider: Arc<dyn SearchProvider> = Arc::new(TavilyProvider::new(&config.search)?);
        let store: Arc<dyn EvidenceStore> =
            Arc::new(SqliteStore::new(config.store.database_path.clone()));
        let model: Arc<dyn ReasoningModel> = Arc::new(LLMClient::new(config.llm.clone())?);
        let cache = Arc::new(QueryCache::from_config(&config.cache));

        Self::new(config, provider, store, model, cache)
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// 本地库查询，返回命中记录与可以跳过的 (目的, 标识)
    fn lookup_database(
        &self,
        identifiers: Vec<Identifier>,
    ) -> (Vec<DatabaseEvidence>, HashSet<(SearchPurpose, Identifier)>) {
        let mut hits = Vec::new();
        let mut covered = HashSet::new();

        for identifier in identifiers {
            let Some(record) = self.store.lookup(&identifier) else {
                continue;
            };
            tracing::info!("  ✓ 本地库命中 {} ({})", identifier, record.table());
            if record.is_detailed() && !matches!(identifier, Identifier::Actor(_)) {
                covered.insert((record.covered_purpose(), identifier.clone()));
            }
            hits.push(DatabaseEvidence { identifier, record });
        }

        (hits, covered)
    }

    /// 调查单条线索，结果为完成或失败，不会向外抛出错误
    pub async fn investigate(&self, lead: &Lead) -> InvestigationOutcome {
        let mut timing = TimingScope::new();
        let mut telemetry = Telemetry::default();
        let mut state = InvestigationState::Planned;

        timing.start_phase(TimingKeys::PLAN);
        let planned = self.planner.plan(lead);
        timing.end_phase(TimingKeys::PLAN);
        tracing::info!("📋 线索 {} 规划了 {} 个检索任务", lead.id, planned.len());

        transition(&lead.id, &mut state, InvestigationState::DbLookup);
        timing.start_phase(TimingKeys::DB_LOOKUP);
        let (database_hits, covered) = self.lookup_database(lead.identifiers());
        timing.end_phase(TimingKeys::DB_LOOKUP);
        telemetry.database_hits = database_hits.len();

        let tasks: Vec<SearchTask> = planned
            .into_iter()
            .filter(|task| {
                let redundant = task
                    .target
                    .as_ref()
                    .is_some_and(|target| covered.contains(&(task.purpose, target.clone())));
                if redundant {
                    tracing::info!("  ⏭️ 本地库已覆盖，跳过检索: {}", task.query);
                    telemetry.skipped_by_database += 1;
                }
                !redundant
            })
            .collect();

        let mut outcomes: Vec<TaskOutcome> = Vec::new();
        let mut stop_reason = StopReason::TiersExhausted;

        for tier in Tier::ALL {
            let batch: Vec<SearchTask> =
                tasks.iter().filter(|t| t.tier == tier).cloned().collect();

            if !batch.is_empty() {
                transition(&lead.id, &mut state, InvestigationState::Searching(tier));
                timing.start_phase(TimingKeys::SEARCH);
                outcomes.extend(self.executor.execute_tier(batch).await);
                timing.end_phase(TimingKeys::SEARCH);
            }

            let interim = aggregator::aggregate(&database_hits, &outcomes);
            if let Some(reason) = self.termination.should_stop(&interim, tier) {
                if tier.next().is_some() {
                    tracing::info!("⚠️ 线索 {} 在 {} 层后提前终止: {}", lead.id, tier, reason);
                }
                stop_reason = reason;
                break;
            }
        }

        transition(&lead.id, &mut state, InvestigationState::Aggregating);
        timing.start_phase(TimingKeys::AGGREGATE);
        let bundle = aggregator::aggregate(&database_hits, &outcomes);
        timing.end_phase(TimingKeys::AGGREGATE);

        telemetry.search_count = outcomes.len();
        telemetry.cache_hits = outcomes.iter().filter(|o| o.from_cache).count();
        telemetry.failed_searches = outcomes.iter().filter(|o| o.failed).count();
        telemetry.results_count = bundle.summary().results_count;
        telemetry.tiers_executed = bundle.summary().tiers_executed.clone();
        telemetry.stop_reason = Some(stop_reason);

        transition(&lead.id, &mut state, InvestigationState::Scoring);
        timing.start_phase(TimingKeys::SCORING);
        let scored = self.scoring.score(lead, &bundle).await;
        timing.end_phase(TimingKeys::SCORING);

        telemetry.elapsed_ms = timing.get_total_duration().as_millis() as u64;
        telemetry.phase_ms = timing.phase_millis();

        match scored {
            Ok(mut verdict) => {
                telemetry.scoring_attempts = verdict.telemetry.scoring_attempts;
                verdict.telemetry = telemetry;
                transition(&lead.id, &mut state, InvestigationState::Done);
                tracing::info!(
                    "✅ 线索 {} 调查完成: {} 分 ({})，检索 {} 次，本地库命中 {} 条",
                    lead.id,
                    verdict.score,
                    verdict.evidence_quality,
                    verdict.telemetry.search_count,
                    verdict.telemetry.database_hits
                );
                InvestigationOutcome::Done(verdict)
            }
            Err(e) => {
                telemetry.scoring_attempts = e.attempts();
                transition(&lead.id, &mut state, InvestigationState::Failed);
                tracing::warn!("❌ 线索 {} 调查未完成: {}", lead.id, e);
                InvestigationOutcome::Failed(FailedInvestigation {
                    lead_id: lead.id.clone(),
                    error: e.to_string(),
                    telemetry,
                    investigated_at: Utc::now(),
                })
            }
        }
    }

    /// 并发调查多条线索，每完成一条即交给 `sink` 处理
    ///
    /// 单条线索失败不影响其它线索；只有 `sink` 返回的错误会中断批次。
    pub async fn investigate_batch<F>(
        &self,
        leads: &[Lead],
        max_concurrent: usize,
        mut sink: F,
    ) -> Result<BatchSummary>
    where
        F: FnMut(&InvestigationOutcome) -> Result<()>,
    {
        let mut done = 0;
        let mut failed = 0;

        let mut outcomes = stream::iter(leads)
            .map(|lead| self.investigate(lead))
            .buffer_unordered(max_concurrent.max(1));

        while let Some(outcome) = outcomes.next().await {
            if outcome.is_failed() {
                failed += 1;
            } else {
                done += 1;
            }
            sink(&outcome)?;
        }

        let summary = BatchSummary {
            done,
            failed,
            cache: self.cache.generate_performance_report(),
        };
        tracing::info!(
            "📊 批次完成: {} 条完成, {} 条失败, 缓存命中率 {:.1}%",
            summary.done,
            summary.failed,
            summary.cache.hit_rate * 100.0
        );
        Ok(summary)
    }
}
