//! 评分引擎 - 构造推理请求、解析并校验模型输出、执行分数封顶

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ScoringConfig;
use crate::llm::client::ReasoningModel;
use crate::types::evidence::EvidenceBundle;
use crate::types::lead::Lead;
use crate::types::verdict::{
    Answer, CHECKLIST, ChecklistAnswer, EvidenceQuality, FEDERAL_INVOLVEMENT_DOCUMENTED,
    FRAUD_DOCUMENTED, Telemetry, VerdictRecord,
};

/// 内置评分细则，可通过 `[scoring].rubric_path` 替换
pub const DEFAULT_RUBRIC: &str = r#"You are a clinical research fraud investigator assessing whether a lead is a viable qui tam (False Claims Act) case.

Work strictly from the evidence provided below. DATABASE FINDINGS are pre-verified local records and take precedence over web search results.

Scoring guidelines:
- 80-100: clear, documented fraud with documented federal program impact and no recent settlement.
- 60-79: documented fraud with some federal involvement; timeline or impact partially established.
- 40-59: suspected fraud, limited documentation, or a recent settlement found.
- 0-39: not viable. Recent settlement, non-fraud retraction (copyright, permission, licensing), statute expired, or insufficient evidence.

Evidence quality:
- DOCUMENTED: key facts are supported by cited sources in the evidence.
- SUSPECTED: indicators exist but are not explicitly documented.
- SPECULATIVE: little or no supporting evidence.

Rules:
- NO HALLUCINATIONS. Never invent dates, amounts or citations.
- A YES answer MUST cite the exact URL of a web source, or the database marker in the form table:key (for example clinical_trials:NCT01234567).
- If evidence is missing, answer NO and leave the citation null.
- A retraction for copyright, permission or licensing reasons is NOT fraud.
- A settlement in the current or previous calendar year means the case is already resolved; score accordingly.
"#;

const STRICT_FORMAT_INSTRUCTION: &str = "Respond with ONLY one JSON object that matches the schema. No markdown, no code fences, no commentary before or after the object.";

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("reasoning model call failed after {attempts} attempt(s): {reason}")]
    Model { attempts: u32, reason: String },
    #[error("model response malformed after {attempts} attempt(s): {reason}")]
    Malformed { attempts: u32, reason: String },
}

impl ScoringError {
    pub fn attempts(&self) -> u32 {
        match self {
            ScoringError::Model { attempts, .. } | ScoringError::Malformed { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// One answered checklist question
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ModelChecklistItem {
    /// Checklist item key, e.g. fraud_documented
    pub item: String,
    pub answer: Answer,
    /// Exact URL or table:key from the evidence; null when answer is NO
    pub citation: Option<String>,
}

/// Structured investigation verdict
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ModelVerdict {
    /// Viability score between 0 and 100
    pub score: i64,
    pub evidence_quality: EvidenceQuality,
    pub checklist: Vec<ModelChecklistItem>,
    /// Free-text rationale for the score
    pub rationale: String,
}

/// 从模型输出中截取 JSON 对象，兼容代码块包裹与前后多余文字
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let body = match trimmed.find("```") {
        Some(fence) => {
            let after = &trimmed[fence + 3..];
            let after = after.strip_prefix("json").unwrap_or(after);
            match after.find("```") {
                Some(end) => &after[..end],
                None => after,
            }
        }
        None => trimmed,
    };
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}

/// 解析并严格校验模型输出，不做任何强制纠正
pub fn parse_response(text: &str) -> Result<ModelVerdict, String> {
    let json = extract_json(text).ok_or_else(|| "no JSON object found in response".to_string())?;
    let verdict: ModelVerdict =
        serde_json::from_str(json).map_err(|e| format!("invalid verdict JSON: {}", e))?;
    validate(&verdict)?;
    Ok(verdict)
}

fn validate(verdict: &ModelVerdict) -> Result<(), String> {
    if !(0..=100).contains(&verdict.score) {
        return Err(format!("score {} outside 0..=100", verdict.score));
    }
    if verdict.rationale.trim().is_empty() {
        return Err("rationale is empty".to_string());
    }
    if verdict.checklist.is_empty() {
        return Err("checklist is empty".to_string());
    }

    // 每个条目只能回答一次
    let mut items: HashSet<&str> = HashSet::new();
    for entry in &verdict.checklist {
        if !items.insert(entry.item.trim()) {
            return Err(format!("checklist item {} listed more than once", entry.item.trim()));
        }
    }
    for required in [FRAUD_DOCUMENTED, FEDERAL_INVOLVEMENT_DOCUMENTED] {
        if !items.contains(required) {
            return Err(format!("checklist item {} missing", required));
        }
    }

    for entry in &verdict.checklist {
        let cited = entry
            .citation
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if entry.answer.is_yes() && !cited {
            return Err(format!("checklist item {} answered YES without citation", entry.item));
        }
    }
    Ok(())
}

fn answered_yes(checklist: &[ChecklistAnswer], item: &str) -> bool {
    checklist
        .iter()
        .any(|a| a.item == item && a.answer.is_yes())
}

/// 按检查表封顶，缺失条目按 NO 处理
pub fn apply_caps(
    model_score: u8,
    checklist: &[ChecklistAnswer],
    config: &ScoringConfig,
) -> (u8, Vec<String>) {
    let mut score = model_score.min(100);
    let mut caps = Vec::new();

    if !answered_yes(checklist, FRAUD_DOCUMENTED) && score > config.fraud_cap {
        score = config.fraud_cap;
        caps.push(format!("{}=NO: capped at {}", FRAUD_DOCUMENTED, config.fraud_cap));
    }
    if !answered_yes(checklist, FEDERAL_INVOLVEMENT_DOCUMENTED) && score > config.federal_cap {
        score = config.federal_cap;
        caps.push(format!(
            "{}=NO: capped at {}",
            FEDERAL_INVOLVEMENT_DOCUMENTED, config.federal_cap
        ));
    }
    (score, caps)
}

/// 评分引擎
pub struct ScoringEngine {
    model: Arc<dyn ReasoningModel>,
    config: ScoringConfig,
    rubric: String,
}

impl ScoringEngine {
    /// 配置了细则文件时从文件读取，否则使用内置细则
    pub fn new(model: Arc<dyn ReasoningModel>, config: ScoringConfig) -> Result<Self> {
        let rubric = match &config.rubric_path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read rubric file: {:?}", path))?,
            None => DEFAULT_RUBRIC.to_string(),
        };
        Ok(Self::with_rubric(model, config, rubric))
    }

    pub fn with_rubric(model: Arc<dyn ReasoningModel>, config: ScoringConfig, rubric: String) -> Self {
        Self {
            model,
            config,
            rubric,
        }
    }

    pub fn system_prompt(&self) -> String {
        let schema = schemars::schema_for!(ModelVerdict);
        let schema_text = serde_json::to_string_pretty(&schema).unwrap_or_default();
        let checklist: Vec<String> = CHECKLIST
            .iter()
            .map(|(item, question)| format!("- {}: {}", item, question))
            .collect();

        format!(
            "{}\n### CHECKLIST\nAnswer every item below with YES or NO:\n{}\n\n### OUTPUT FORMAT\nReturn a single JSON object matching this JSON schema:\n{}\n",
            self.rubric.trim_end(),
            checklist.join("\n"),
            schema_text
        )
    }

    pub fn build_prompt(&self, lead: &Lead, bundle: &EvidenceBundle) -> String {
        format!(
            "{}\n{}\nConduct the investigation using the protocol. Prioritize DATABASE FINDINGS (pre-verified, local) over web search results when available.",
            lead.describe(),
            bundle.render(self.config.max_web_results, self.config.snippet_chars)
        )
    }

    /// 对冻结的证据包评分
    ///
    /// 输出不合格时追加更严格的格式要求重试一次；模型调用本身失败不重试。
    pub async fn score(
        &self,
        lead: &Lead,
        bundle: &EvidenceBundle,
    ) -> Result<VerdictRecord, ScoringError> {
        let system_prompt = self.system_prompt();
        let prompt = self.build_prompt(lead, bundle);

        let mut attempts = 0;
        let mut last_reason = String::new();

        while attempts < 2 {
            let request = if attempts == 0 {
                prompt.clone()
            } else {
                format!(
                    "{}\n\n**FORMAT ERROR** Your previous response could not be accepted: {}\n{}",
                    prompt, last_reason, STRICT_FORMAT_INSTRUCTION
                )
            };
            attempts += 1;

            let response = self
                .model
                .complete(&system_prompt, &request)
                .await
                .map_err(|e| ScoringError::Model {
                    attempts,
                    reason: e.to_string(),
                })?;

            match parse_response(&response) {
                Ok(verdict) => return Ok(self.finalize(lead, bundle, verdict, attempts)),
                Err(reason) => {
                    tracing::warn!(
                        "⚠️ 线索 {} 的模型输出不合格（第 {} 次）: {}",
                        lead.id,
                        attempts,
                        reason
                    );
                    last_reason = reason;
                }
            }
        }

        Err(ScoringError::Malformed {
            attempts,
            reason: last_reason,
        })
    }

    fn finalize(
        &self,
        lead: &Lead,
        bundle: &EvidenceBundle,
        verdict: ModelVerdict,
        attempts: u32,
    ) -> VerdictRecord {
        let checklist: Vec<ChecklistAnswer> = verdict
            .checklist
            .into_iter()
            .map(|entry| {
                let citation = entry
                    .citation
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty());
                let grounded = citation.as_deref().is_some_and(|c| bundle.grounds(c));
                ChecklistAnswer {
                    item: entry.item.trim().to_string(),
                    answer: entry.answer,
                    citation,
                    grounded,
                }
            })
            .collect();

        // validate 已保证 0..=100
        let model_score = verdict.score.clamp(0, 100) as u8;
        let (score, mut caps_applied) = apply_caps(model_score, &checklist, &self.config);

        let mut evidence_quality = verdict.evidence_quality;
        if evidence_quality == EvidenceQuality::Documented && !checklist.iter().any(|a| a.grounded)
        {
            evidence_quality = EvidenceQuality::Suspected;
            caps_applied.push("DOCUMENTED without grounded citation: downgraded to SUSPECTED".into());
        }

        VerdictRecord {
            lead_id: lead.id.clone(),
            score,
            model_score,
            evidence_quality,
            checklist,
            rationale: verdict.rationale.trim().to_string(),
            caps_applied,
            telemetry: Telemetry {
                scoring_attempts: attempts,
                ..Default::default()
            },
            investigated_at: Utc::now(),
        }
    }
}
