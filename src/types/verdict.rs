use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::task::Tier;

/// 必须出现在检查表中的条目
pub const FRAUD_DOCUMENTED: &str = "fraud_documented";
pub const FEDERAL_INVOLVEMENT_DOCUMENTED: &str = "federal_involvement_documented";

/// 检查表条目及其问题
pub const CHECKLIST: [(&str, &str); 5] = [
    (
        FRAUD_DOCUMENTED,
        "Is fraud or research misconduct explicitly documented (retraction for fabrication, ORI finding, indictment, settlement admission)?",
    ),
    (
        FEDERAL_INVOLVEMENT_DOCUMENTED,
        "Is involvement of a federal program (NIH grant, Medicare, Medicaid, other federal funding) explicitly documented?",
    ),
    (
        "no_recent_settlement",
        "Is there NO settlement or resolution of this matter in the current or previous calendar year?",
    ),
    (
        "fraud_gap_established",
        "Is there a dated gap between the first fraud indicator and institutional or regulatory action?",
    ),
    (
        "statute_violation_identified",
        "Can a specific statute violation (False Claims Act, Anti-Kickback, Stark, research misconduct) be tied to the evidence?",
    ),
];

/// 证据质量标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceQuality {
    Documented,
    Suspected,
    Speculative,
}

impl Display for EvidenceQuality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceQuality::Documented => write!(f, "DOCUMENTED"),
            EvidenceQuality::Suspected => write!(f, "SUSPECTED"),
            EvidenceQuality::Speculative => write!(f, "SPECULATIVE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    pub fn is_yes(self) -> bool {
        self == Answer::Yes
    }
}

/// 检查表中的一项回答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistAnswer {
    pub item: String,
    pub answer: Answer,
    pub citation: Option<String>,
    /// 引用是否指向证据包中真实存在的出处
    #[serde(default)]
    pub grounded: bool,
}

/// 提前终止或正常结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    NonFraudRetraction,
    RecentSettlement,
    SufficientForHighConfidence,
    TiersExhausted,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::NonFraudRetraction => "non-fraud-retraction",
            StopReason::RecentSettlement => "recent-settlement",
            StopReason::SufficientForHighConfidence => "sufficient-for-high-confidence",
            StopReason::TiersExhausted => "tiers-exhausted",
        }
    }
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次调查的运行计数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// 实际执行的网页检索数
    pub search_count: usize,
    /// 因本地库命中而跳过的检索数
    pub skipped_by_database: usize,
    pub database_hits: usize,
    pub cache_hits: usize,
    pub failed_searches: usize,
    pub results_count: usize,
    pub tiers_executed: Vec<Tier>,
    pub stop_reason: Option<StopReason>,
    pub scoring_attempts: u32,
    pub elapsed_ms: u64,
    /// 各阶段耗时（毫秒）
    #[serde(default)]
    pub phase_ms: BTreeMap<String, u64>,
}

/// 单条线索的评分结果，写出后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub lead_id: String,
    pub score: u8,
    /// 模型给出的原始分数，封顶前
    pub model_score: u8,
    pub evidence_quality: EvidenceQuality,
    pub checklist: Vec<ChecklistAnswer>,
    pub rationale: String,
    #[serde(default)]
    pub caps_applied: Vec<String>,
    pub telemetry: Telemetry,
    pub investigated_at: DateTime<Utc>,
}

impl VerdictRecord {
    pub fn answer(&self, item: &str) -> Option<&ChecklistAnswer> {
        self.checklist.iter().find(|a| a.item == item)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedInvestigation {
    pub lead_id: String,
    pub error: String,
    pub telemetry: Telemetry,
    pub investigated_at: DateTime<Utc>,
}

/// 调查的最终结果：完成或失败，互不影响
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvestigationOutcome {
    Done(VerdictRecord),
    Failed(FailedInvestigation),
}

impl InvestigationOutcome {
    pub fn lead_id(&self) -> &str {
        match self {
            InvestigationOutcome::Done(v) => &v.lead_id,
            InvestigationOutcome::Failed(f) => &f.lead_id,
        }
    }

    pub fn score(&self) -> Option<u8> {
        match self {
            InvestigationOutcome::Done(v) => Some(v.score),
            InvestigationOutcome::Failed(_) => None,
        }
    }

    pub fn telemetry(&self) -> &Telemetry {
        match self {
            InvestigationOutcome::Done(v) => &v.telemetry,
            InvestigationOutcome::Failed(f) => &f.telemetry,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, InvestigationOutcome::Failed(_))
    }

    pub fn verdict(&self) -> Option<&VerdictRecord> {
        match self {
            InvestigationOutcome::Done(v) => Some(v),
            InvestigationOutcome::Failed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let failed = InvestigationOutcome::Failed(FailedInvestigation {
            lead_id: "7".into(),
            error: "malformed".into(),
            telemetry: Telemetry::default(),
            investigated_at: Utc::now(),
        });
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["lead_id"], "7");
        assert!(failed.score().is_none());

        let back: InvestigationOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, failed);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&EvidenceQuality::Speculative).unwrap(),
            "\"SPECULATIVE\""
        );
        assert_eq!(serde_json::to_string(&Answer::Yes).unwrap(), "\"YES\"");
        assert_eq!(
            serde_json::to_string(&StopReason::NonFraudRetraction).unwrap(),
            "\"non-fraud-retraction\""
        );
    }

    #[test]
    fn test_checklist_contains_required_items() {
        let items: Vec<&str> = CHECKLIST.iter().map(|(item, _)| *item).collect();
        assert!(items.contains(&FRAUD_DOCUMENTED));
        assert!(items.contains(&FEDERAL_INVOLVEMENT_DOCUMENTED));
    }
}
