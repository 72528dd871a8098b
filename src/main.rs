use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use lead_investigator::cli::{Args, Command};
use lead_investigator::config::Config;
use lead_investigator::investigator::Investigator;
use lead_investigator::outlet::{self, ResultsWriter};
use lead_investigator::types::Lead;

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// 根据子命令挑选本次需要调查的线索
fn select_leads(config: &Config, command: &Command) -> Result<Vec<Lead>> {
    match command {
        Command::Investigate { leads, limit, .. } => {
            let mut selected =
                outlet::gate_by_heuristic(outlet::read_leads(leads)?, config.run.min_heuristic_score);
            if let Some(limit) = limit {
                selected.truncate(*limit);
            }
            Ok(selected)
        }
        Command::Rerun {
            leads,
            results,
            below,
        } => {
            let latest = outlet::latest_outcomes(outlet::read_outcomes(results)?);
            let selected = outlet::select_for_rerun(outlet::read_leads(leads)?, &latest, *below);
            tracing::info!("🔁 {} 条线索需要重新调查（失败或低于 {} 分）", selected.len(), below);
            Ok(selected)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, command) = args.into_config()?;
    init_tracing(&config);

    let leads = select_leads(&config, &command)?;
    if leads.is_empty() {
        tracing::info!("📭 没有需要调查的线索");
        return Ok(());
    }

    let investigator = Investigator::from_config(&config)?;
    let mut writer = ResultsWriter::open(&config.run.output_path)?;
    tracing::info!(
        "🚀 开始调查 {} 条线索，结果写入 {}",
        leads.len(),
        writer.path().display()
    );

    let summary = investigator
        .investigate_batch(&leads, config.run.max_concurrent_investigations, |outcome| {
            writer.append(outcome)
        })
        .await?;

    let cache = &summary.cache;
    tracing::info!(
        "🎉 全部完成: {} 条完成, {} 条失败, 共写入 {} 条记录",
        summary.done,
        summary.failed,
        writer.written()
    );
    tracing::info!(
        "📈 检索缓存: 命中 {} 次 (内存 {} / 磁盘 {}), 外部检索 {} 次, 失败 {} 次",
        cache.cache_hits(),
        cache.memory_hits,
        cache.disk_hits,
        cache.cache_misses,
        cache.fetch_failures
    );

    Ok(())
}
