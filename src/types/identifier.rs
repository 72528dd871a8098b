use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static TRIAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"NCT\d{8}").expect("valid trial id pattern"));

static PUBLICATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)PMID[:\s]*(\d{6,})|/(\d{8,})/").expect("valid publication id pattern")
});

static GRANT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([A-Z]\d{2})\s+([A-Z]{1,3}\d{4,6})\b").expect("valid grant number pattern")
});

/// 线索中提取出的结构化标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identifier {
    /// 临床试验注册号，如 NCT04204668
    Trial(String),
    /// 文献编号（PMID / DOI）
    Publication(String),
    /// 资助项目编号，如 R01 CA12345
    Grant(String),
    /// 涉事人员或机构
    Actor(String),
}

/// 标识类型，按照检索优先级从高到低排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Trial,
    Publication,
    Grant,
    Actor,
}

impl Identifier {
    pub fn kind(&self) -> IdentifierKind {
        match self {
            Identifier::Trial(_) => IdentifierKind::Trial,
            Identifier::Publication(_) => IdentifierKind::Publication,
            Identifier::Grant(_) => IdentifierKind::Grant,
            Identifier::Actor(_) => IdentifierKind::Actor,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Identifier::Trial(v)
            | Identifier::Publication(v)
            | Identifier::Grant(v)
            | Identifier::Actor(v) => v,
        }
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Identifier::Trial(v) => write!(f, "trial {}", v),
            Identifier::Publication(v) => write!(f, "PMID {}", v),
            Identifier::Grant(v) => write!(f, "grant {}", v),
            Identifier::Actor(v) => write!(f, "actor {}", v),
        }
    }
}

impl IdentifierKind {
    /// 数值越小越优先，超出规划预算时从大到小丢弃
    pub fn rank(self) -> u8 {
        match self {
            IdentifierKind::Trial => 0,
            IdentifierKind::Publication => 1,
            IdentifierKind::Grant => 2,
            IdentifierKind::Actor => 3,
        }
    }
}

pub fn extract_trial_ids(text: &str) -> Vec<String> {
    TRIAL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn extract_publication_ids(text: &str) -> Vec<String> {
    PUBLICATION_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// 提取 NIH 资助编号，统一为大写并以单个空格分隔
pub fn extract_grant_numbers(text: &str) -> Vec<String> {
    GRANT_PATTERN
        .captures_iter(text)
        .map(|caps| format!("{} {}", &caps[1], &caps[2]).to_uppercase())
        .collect()
}

/// 拆分以分号分隔的人员列表，过滤空值与 `Unknown`
pub fn split_actors(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|a| !a.is_empty() && !a.contains("Unknown"))
        .map(str::to_string)
        .collect()
}

/// 保序去重
pub(crate) fn dedup_preserving_order(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.to_uppercase()))
        .collect()
}
