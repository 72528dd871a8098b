use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::store::StoreRecord;
use crate::types::identifier::Identifier;
use crate::types::task::{SearchPurpose, Tier};

/// 网页检索得到的证据，保留来源检索的层级与目的
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebEvidence {
    pub url: String,
    pub title: String,
    pub content: String,
    pub query: String,
    pub tier: Tier,
    pub purpose: SearchPurpose,
}

/// 本地库命中的证据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseEvidence {
    pub identifier: Identifier,
    pub record: StoreRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum EvidenceItem {
    Database(DatabaseEvidence),
    Web(WebEvidence),
}

/// URL 归一化：去掉片段、末尾斜杠，统一小写
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
    without_fragment.trim_end_matches('/').to_lowercase()
}

const CITATION_SEPARATORS: &[char] = &['(', ')', '[', ']', '<', '>', '{', '}', '"', '\'', '`', ',', ';', '|'];
const CITATION_TRAILING: &[char] = &['.', ':', '!', '?', '*'];

/// 把一段引用文字切成归一化后的候选出处
fn citation_tokens(citation: &str) -> impl Iterator<Item = String> + '_ {
    citation
        .split(|c: char| c.is_whitespace() || CITATION_SEPARATORS.contains(&c))
        .map(|token| normalize_url(token.trim_matches(CITATION_TRAILING)))
        .filter(|token| !token.is_empty())
}

impl EvidenceItem {
    /// 去重依据：网页按归一化 URL，本地库按 表名:主键
    pub fn dedup_key(&self) -> String {
        match self {
            EvidenceItem::Database(db) => format!("{}:{}", db.record.table(), db.record.key()),
            EvidenceItem::Web(web) => normalize_url(&web.url),
        }
    }

    /// 可被引用的出处
    pub fn provenance(&self) -> String {
        match self {
            EvidenceItem::Database(db) => format!("{}:{}", db.record.table(), db.record.key()),
            EvidenceItem::Web(web) => web.url.trim().to_string(),
        }
    }

    /// 供关键词匹配的小写文本
    pub fn searchable_text(&self) -> String {
        match self {
            EvidenceItem::Database(db) => db.record.render().to_lowercase(),
            EvidenceItem::Web(web) => format!("{} {}", web.title, web.content).to_lowercase(),
        }
    }

    /// 数据库证据没有所属层级
    pub fn tier(&self) -> Option<Tier> {
        match self {
            EvidenceItem::Database(_) => None,
            EvidenceItem::Web(web) => Some(web.tier),
        }
    }

    pub fn purpose(&self) -> SearchPurpose {
        match self {
            EvidenceItem::Database(db) => db.record.covered_purpose(),
            EvidenceItem::Web(web) => web.purpose,
        }
    }

    pub fn is_database(&self) -> bool {
        matches!(self, EvidenceItem::Database(_))
    }
}

/// 证据包汇总计数，用于审计与遥测
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub results_count: usize,
    pub database_hits: usize,
    pub distinct_searches: usize,
    pub tiers_executed: Vec<Tier>,
}

/// 单条线索的证据包
///
/// 只能由聚合器构造，字段不对外可变；交给评分引擎后即为冻结输入。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    items: Vec<EvidenceItem>,
    summary: EvidenceSummary,
}

impl EvidenceBundle {
    pub(crate) fn new(items: Vec<EvidenceItem>, summary: EvidenceSummary) -> Self {
        Self { items, summary }
    }

    pub fn items(&self) -> &[EvidenceItem] {
        &self.items
    }

    pub fn summary(&self) -> &EvidenceSummary {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn database_items(&self) -> impl Iterator<Item = &DatabaseEvidence> {
        self.items.iter().filter_map(|item| match item {
            EvidenceItem::Database(db) => Some(db),
            EvidenceItem::Web(_) => None,
        })
    }

    pub fn web_items(&self) -> impl Iterator<Item = &WebEvidence> {
        self.items.iter().filter_map(|item| match item {
            EvidenceItem::Web(web) => Some(web),
            EvidenceItem::Database(_) => None,
        })
    }

    /// 证据包内所有可引用出处（已归一化）
    pub fn provenance_keys(&self) -> HashSet<String> {
        self.items
            .iter()
            .map(|item| match item {
                EvidenceItem::Web(web) => normalize_url(&web.url),
                EvidenceItem::Database(_) => item.provenance().to_lowercase(),
            })
            .filter(|key| !key.is_empty())
            .collect()
    }

    /// 判断一条引用是否指向证据包中的某个出处
    ///
    /// 引用按空白与括号引号切分后逐个归一化，必须与出处完全相同，
    /// 出处只是某个引用片段的前缀时不算命中
    pub fn grounds(&self, citation: &str) -> bool {
        let keys = self.provenance_keys();
        let whole = normalize_url(citation);
        if whole.is_empty() {
            return false;
        }
        if keys.contains(&whole) {
            return true;
        }
        citation_tokens(citation).any(|token| keys.contains(&token))
    }

    /// 渲染为提示词中的证据段落
    pub fn render(&self, max_web_results: usize, snippet_chars: usize) -> String {
        let mut out = String::from("## DATABASE FINDINGS (pre-verified, local)\n\n");
        let mut db_count = 0;
        for db in self.database_items() {
            out.push_str(&db.record.render());
            out.push('\n');
            db_count += 1;
        }
        if db_count == 0 {
            out.push_str("*No database matches found for identifiers in this lead.*\n\n");
        }

        out.push_str("## WEB SEARCH RESULTS\n\n");
        let mut web_count = 0;
        for (idx, web) in self.web_items().take(max_web_results).enumerate() {
            let title = if web.title.trim().is_empty() {
                "Untitled"
            } else {
                web.title.as_str()
            };
            let snippet: String = web.content.chars().take(snippet_chars).collect();
            out.push_str(&format!(
                "### Source {}: {}\nURL: {}\nTier: {} / {}\nContent: {}...\n\n",
                idx + 1,
                title,
                web.url,
                web.tier,
                web.purpose,
                snippet
            ));
            web_count += 1;
        }
        if web_count == 0 {
            out.push_str("*No web search results.*\n\n");
        }
        out
    }
}
