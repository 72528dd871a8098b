use crate::config::{Config, LLMProvider};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lead Investigator - 医疗与科研欺诈线索的分层检索与证据评分引擎
#[derive(Parser, Debug)]
#[command(name = "lead-investigator")]
#[command(
    about = "Investigates healthcare and research fraud leads with tiered web search, a local evidence database and an evidence-gated LLM score."
)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 是否启用详细日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// LLM Provider (openai, anthropic, deepseek, openrouter, ollama)
    #[arg(long, global = true)]
    pub llm_provider: Option<String>,

    /// 评分模型
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// LLM API KEY
    #[arg(long, global = true)]
    pub llm_api_key: Option<String>,

    /// 检索并发数
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// 同时调查的线索数
    #[arg(long, global = true)]
    pub max_concurrent: Option<usize>,

    /// 本地证据库路径
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// 是否禁用磁盘检索缓存
    #[arg(long, global = true)]
    pub no_cache: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// 调查线索数据集中的全部线索
    Investigate {
        /// 线索数据集 (JSONL)
        #[arg(short, long)]
        leads: PathBuf,

        /// 结果输出路径，默认使用配置中的 run.output_path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 启发式分数门槛，低于门槛的线索不进入调查
        #[arg(long)]
        min_score: Option<f64>,

        /// 最多调查的线索数
        #[arg(long)]
        limit: Option<usize>,
    },
    /// 重新调查失败或低分的线索，新结果追加到同一数据集
    Rerun {
        /// 线索数据集 (JSONL)
        #[arg(short, long)]
        leads: PathBuf,

        /// 已有的结果数据集 (JSONL)
        #[arg(short, long)]
        results: PathBuf,

        /// 低于该分数的线索将被重新调查
        #[arg(long, default_value_t = 50)]
        below: u8,
    },
}

impl Args {
    /// 将CLI参数转换为配置
    pub fn into_config(self) -> Result<(Config, Command)> {
        let mut config = Config::load(self.config.as_deref())?;

        // 覆盖LLM配置
        if let Some(provider_str) = self.llm_provider {
            match provider_str.parse::<LLMProvider>() {
                Ok(provider) => config.llm.provider = provider,
                // 此时日志尚未初始化
                Err(_) => eprintln!(
                    "⚠️ 警告: 未知的provider: {}，使用配置中的provider",
                    provider_str
                ),
            }
        }
        if let Some(model) = self.model {
            config.llm.model = model;
        }
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }

        if let Some(workers) = self.workers {
            config.search.workers = workers;
        }
        if let Some(max_concurrent) = self.max_concurrent {
            config.run.max_concurrent_investigations = max_concurrent;
        }
        if let Some(database) = self.database {
            config.store.database_path = database;
        }

        // 缓存配置
        if self.no_cache {
            config.cache.enabled = false;
        }

        match &self.command {
            Command::Investigate {
                output, min_score, ..
            } => {
                if let Some(output) = output {
                    config.run.output_path = output.clone();
                }
                if min_score.is_some() {
                    config.run.min_heuristic_score = *min_score;
                }
            }
            Command::Rerun { results, .. } => {
                config.run.output_path = results.clone();
            }
        }

        config.verbose = config.verbose || self.verbose;

        Ok((config, self.command))
    }
}

// Include tests
#[cfg(test)]
mod tests;
