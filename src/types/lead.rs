use serde::{Deserialize, Deserializer, Serialize};

use crate::types::identifier::{
    Identifier, dedup_preserving_order, extract_grant_numbers, extract_publication_ids,
    extract_trial_ids, split_actors,
};

/// 待调查的线索
///
/// 调查开始后不再修改，编排器只以只读引用的方式使用它。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lead {
    /// 线索编号，兼容上游数据集中的 `source_row_index`
    #[serde(alias = "source_row_index", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub key_facts: String,
    #[serde(default)]
    pub fraud_type: String,
    #[serde(default, deserialize_with = "list_or_delimited")]
    pub implicated_actors: Vec<String>,
    #[serde(
        default,
        alias = "federal_programs_involved",
        deserialize_with = "list_or_delimited"
    )]
    pub federal_programs: Vec<String>,
    #[serde(default)]
    pub nct_ids: Vec<String>,
    #[serde(default)]
    pub pmids: Vec<String>,
    #[serde(default)]
    pub grant_numbers: Vec<String>,
    /// 原始来源文件名，可能包含试验编号
    #[serde(default)]
    pub filename: String,
    /// 原始文本摘录
    #[serde(default)]
    pub original_text: String,
    /// 初筛阶段给出的启发式分数
    #[serde(default, alias = "qui_tam_score")]
    pub heuristic_score: Option<f64>,
}

impl Lead {
    /// 合并显式给出的标识与从原文、文件名中抽取的标识
    ///
    /// 同一类型内保序去重，类型之间按试验、文献、资助、人员排列。
    pub fn identifiers(&self) -> Vec<Identifier> {
        let corpus = format!("{} {}", self.filename, self.original_text);

        let trials = dedup_preserving_order(
            self.nct_ids
                .iter()
                .map(|v| v.to_uppercase())
                .chain(extract_trial_ids(&corpus)),
        );
        let publications = dedup_preserving_order(
            self.pmids
                .iter()
                .cloned()
                .chain(extract_publication_ids(&corpus)),
        );
        let grants = dedup_preserving_order(
            self.grant_numbers
                .iter()
                .map(|v| v.to_uppercase())
                .chain(extract_grant_numbers(&self.original_text)),
        );
        let actors = dedup_preserving_order(
            self.implicated_actors
                .iter()
                .flat_map(|a| split_actors(a)),
        );

        trials
            .into_iter()
            .map(Identifier::Trial)
            .chain(publications.into_iter().map(Identifier::Publication))
            .chain(grants.into_iter().map(Identifier::Grant))
            .chain(actors.into_iter().map(Identifier::Actor))
            .collect()
    }

    /// 用于提示词的线索描述
    pub fn describe(&self) -> String {
        let or_na = |s: &str| {
            if s.trim().is_empty() {
                "N/A".to_string()
            } else {
                s.to_string()
            }
        };
        let mut out = String::from("## LEAD DATA\n\n");
        out.push_str(&format!("**Lead ID:** {}\n", self.id));
        out.push_str(&format!("**Headline:** {}\n", or_na(&self.headline)));
        if let Some(score) = self.heuristic_score {
            out.push_str(&format!("**Heuristic Score:** {}\n", score));
        }
        out.push_str(&format!("**Key Facts:** {}\n", or_na(&self.key_facts)));
        out.push_str(&format!("**Fraud Type:** {}\n", or_na(&self.fraud_type)));
        out.push_str(&format!(
            "**Implicated Actors:** {}\n",
            or_na(&self.implicated_actors.join("; "))
        ));
        out.push_str(&format!(
            "**Federal Programs:** {}\n",
            or_na(&self.federal_programs.join("; "))
        ));

        let identifiers = self.identifiers();
        if !identifiers.is_empty() {
            let listed: Vec<String> = identifiers.iter().map(|i| i.to_string()).collect();
            out.push_str(&format!("**Identifiers:** {}\n", listed.join(", ")));
        }
        if !self.original_text.trim().is_empty() {
            let excerpt: String = self.original_text.chars().take(1000).collect();
            out.push_str(&format!("**Original Source Text (excerpt):**\n{}\n", excerpt));
        }
        out
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

/// 上游数据中列表字段既可能是数组，也可能是分号分隔的字符串
fn list_or_delimited<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Delimited(String),
        Missing(Option<()>),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::List(items) => items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Raw::Delimited(s) => s
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Raw::Missing(_) => Vec::new(),
    })
}
