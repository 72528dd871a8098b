use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::types::identifier::Identifier;

/// 检索优先级分层，层与层之间是严格的屏障
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Critical,
    High,
    Medium,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Critical, Tier::High, Tier::Medium];

    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Critical => Some(Tier::High),
            Tier::High => Some(Tier::Medium),
            Tier::Medium => None,
        }
    }
}

impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Critical => write!(f, "CRITICAL"),
            Tier::High => write!(f, "HIGH"),
            Tier::Medium => write!(f, "MEDIUM"),
        }
    }
}

/// 检索任务的取证目的
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchPurpose {
    CopyrightCheck,
    Settlement,
    FraudDocumentation,
    TrialStatus,
    FederalFunding,
    ActorHistory,
    General,
}

impl SearchPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchPurpose::CopyrightCheck => "copyright-check",
            SearchPurpose::Settlement => "settlement",
            SearchPurpose::FraudDocumentation => "fraud-documentation",
            SearchPurpose::TrialStatus => "trial-status",
            SearchPurpose::FederalFunding => "federal-funding",
            SearchPurpose::ActorHistory => "actor-history",
            SearchPurpose::General => "general",
        }
    }
}

impl Display for SearchPurpose {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次规划好的网页检索，执行器只消费一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTask {
    pub query: String,
    pub tier: Tier,
    pub max_results: usize,
    pub purpose: SearchPurpose,
    /// 任务针对的标识；标题类检索为空
    pub target: Option<Identifier>,
}

impl SearchTask {
    pub fn new(
        query: impl Into<String>,
        tier: Tier,
        max_results: usize,
        purpose: SearchPurpose,
        target: Option<Identifier>,
    ) -> Self {
        Self {
            query: query.into(),
            tier,
            max_results,
            purpose,
            target,
        }
    }
}
