//! 结果数据集 - 线索输入与调查结果的 JSONL 读写

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::lead::Lead;
use crate::types::verdict::InvestigationOutcome;

/// 结果写入器，每条调查结果追加一行，已有记录从不修改
pub struct ResultsWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl ResultsWriter {
    /// 以追加方式打开数据集，父目录不存在时自动创建
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建输出目录 {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("无法打开结果文件 {:?}", path))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// 追加一条结果并立即落盘，中途退出不会丢失已完成的调查
    pub fn append(&mut self, outcome: &InvestigationOutcome) -> Result<()> {
        let line = serde_json::to_string(outcome)?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        self.written += 1;
        tracing::debug!("💾 已写入线索 {} 的调查结果", outcome.lead_id());
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 逐行读取 JSONL，无法解析的行记录告警后跳过
fn read_jsonl<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("无法读取{}文件 {:?}", what, path))?;
    let mut records = Vec::new();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("⚠️ 跳过{}第 {} 行: {}", what, index + 1, e),
        }
    }

    Ok(records)
}

/// 读取线索数据集
pub fn read_leads(path: &Path) -> Result<Vec<Lead>> {
    read_jsonl(path, "线索")
}

/// 读取调查结果数据集
pub fn read_outcomes(path: &Path) -> Result<Vec<InvestigationOutcome>> {
    read_jsonl(path, "结果")
}

/// 每条线索只保留数据集中最后出现的结果
pub fn latest_outcomes(outcomes: Vec<InvestigationOutcome>) -> HashMap<String, InvestigationOutcome> {
    let mut latest = HashMap::new();
    for outcome in outcomes {
        latest.insert(outcome.lead_id().to_string(), outcome);
    }
    latest
}

/// 挑选需要重新调查的线索：最近一次结果为失败或分数低于阈值
pub fn select_for_rerun(
    leads: Vec<Lead>,
    latest: &HashMap<String, InvestigationOutcome>,
    below: u8,
) -> Vec<Lead> {
    leads
        .into_iter()
        .filter(|lead| {
            latest
                .get(&lead.id)
                .is_some_and(|outcome| outcome.score().is_none_or(|score| score < below))
        })
        .collect()
}

/// 按启发式分数过滤线索；没有分数的线索视为未达到门槛
pub fn gate_by_heuristic(leads: Vec<Lead>, min_score: Option<f64>) -> Vec<Lead> {
    let Some(min_score) = min_score else {
        return leads;
    };
    let total = leads.len();
    let kept: Vec<Lead> = leads
        .into_iter()
        .filter(|lead| lead.heuristic_score.is_some_and(|score| score >= min_score))
        .collect();
    tracing::info!(
        "🔍 启发式门槛 {}: {}/{} 条线索进入调查",
        min_score,
        kept.len(),
        total
    );
    kept
}

#[cfg(test)]
mod tests;
