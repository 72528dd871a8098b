//! 本地证据库 - 对试验注册、资助登记、撤稿登记的只读查询

use serde::{Deserialize, Serialize};

use crate::types::identifier::Identifier;
use crate::types::task::SearchPurpose;

pub mod sqlite;

pub use sqlite::SqliteStore;

/// 临床试验登记记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub nct_id: String,
    pub title: Option<String>,
    pub status: Option<String>,
    pub principal_investigator: Option<String>,
    pub sponsor: Option<String>,
    pub funded_by: Option<String>,
}

/// NIH 资助登记记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub project_num: String,
    pub pi_name: Option<String>,
    pub org_name: Option<String>,
    pub total_cost: Option<f64>,
    pub fiscal_year: Option<i64>,
    pub project_title: Option<String>,
}

/// 撤稿登记记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetractionRecord {
    pub pmid: Option<String>,
    pub doi: Option<String>,
    pub title: Option<String>,
    pub journal: Option<String>,
    pub retraction_date: Option<String>,
    pub retraction_reason: Option<String>,
}

/// 本地库返回的带类型记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum StoreRecord {
    ClinicalTrials(TrialRecord),
    NihGrants(GrantRecord),
    Retractions(RetractionRecord),
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn or_na(value: &Option<String>) -> &str {
    value.as_deref().filter(|v| !v.trim().is_empty()).unwrap_or("N/A")
}

impl StoreRecord {
    pub fn table(&self) -> &'static str {
        match self {
            StoreRecord::ClinicalTrials(_) => "clinical_trials",
            StoreRecord::NihGrants(_) => "nih_grants",
            StoreRecord::Retractions(_) => "retractions",
        }
    }

    /// 记录在其所属表中的主键
    pub fn key(&self) -> String {
        match self {
            StoreRecord::ClinicalTrials(r) => r.nct_id.clone(),
            StoreRecord::NihGrants(r) => r.project_num.clone(),
            StoreRecord::Retractions(r) => r
                .pmid
                .clone()
                .filter(|v| !v.is_empty())
                .or_else(|| r.doi.clone())
                .unwrap_or_default(),
        }
    }

    /// 记录是否足够详细，可以替代同目的的网页检索
    pub fn is_detailed(&self) -> bool {
        match self {
            StoreRecord::ClinicalTrials(r) => {
                present(&r.status) && present(&r.principal_investigator) && present(&r.funded_by)
            }
            StoreRecord::NihGrants(r) => present(&r.pi_name) && r.total_cost.is_some(),
            StoreRecord::Retractions(r) => present(&r.retraction_reason),
        }
    }

    /// 该记录能够覆盖的检索目的
    pub fn covered_purpose(&self) -> SearchPurpose {
        match self {
            StoreRecord::ClinicalTrials(_) => SearchPurpose::TrialStatus,
            StoreRecord::NihGrants(_) => SearchPurpose::FederalFunding,
            StoreRecord::Retractions(_) => SearchPurpose::FraudDocumentation,
        }
    }

    /// 提示词中的展示形式
    pub fn render(&self) -> String {
        match self {
            StoreRecord::ClinicalTrials(r) => format!(
                "**Clinical Trial ({})** [clinical_trials:{}]\n- Title: {}\n- PI: {}\n- Sponsor: {}\n- Status: {}\n- Funding: {}\n",
                r.nct_id,
                r.nct_id,
                or_na(&r.title),
                or_na(&r.principal_investigator),
                or_na(&r.sponsor),
                or_na(&r.status),
                or_na(&r.funded_by),
            ),
            StoreRecord::NihGrants(r) => format!(
                "**NIH Grant ({})** [nih_grants:{}]\n- PI: {}\n- Organization: {}\n- Total Cost: {}\n- Fiscal Year: {}\n- Title: {}\n",
                r.project_num,
                r.project_num,
                or_na(&r.pi_name),
                or_na(&r.org_name),
                r.total_cost
                    .map(|c| format!("${:.0}", c))
                    .unwrap_or_else(|| "N/A".to_string()),
                r.fiscal_year
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
                or_na(&r.project_title),
            ),
            StoreRecord::Retractions(r) => format!(
                "**Retraction ({})** [retractions:{}]\n- Title: {}\n- Journal: {}\n- Retraction Reason: {}\n- Retraction Date: {}\n",
                self.key(),
                self.key(),
                or_na(&r.title),
                or_na(&r.journal),
                or_na(&r.retraction_reason),
                or_na(&r.retraction_date),
            ),
        }
    }
}

/// 本地证据库查询接口
///
/// 查询失败一律视为未命中，实现方负责记录告警，绝不向上抛出。
pub trait EvidenceStore: Send + Sync {
    fn lookup_trial(&self, nct_id: &str) -> Option<TrialRecord>;

    fn lookup_publication(&self, pmid: &str) -> Option<RetractionRecord>;

    fn lookup_grant(&self, project_num: &str) -> Option<GrantRecord>;

    fn lookup_actor(&self, name: &str) -> Option<GrantRecord>;

    fn lookup(&self, identifier: &Identifier) -> Option<StoreRecord> {
        match identifier {
            Identifier::Trial(v) => self.lookup_trial(v).map(StoreRecord::ClinicalTrials),
            Identifier::Publication(v) => self.lookup_publication(v).map(StoreRecord::Retractions),
            Identifier::Grant(v) => self.lookup_grant(v).map(StoreRecord::NihGrants),
            Identifier::Actor(v) => self.lookup_actor(v).map(StoreRecord::NihGrants),
        }
    }
}

/// 未配置本地库时使用的空实现
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyStore;

impl EvidenceStore for EmptyStore {
    fn lookup_trial(&self, _nct_id: &str) -> Option<TrialRecord> {
        None
    }

    fn lookup_publication(&self, _pmid: &str) -> Option<RetractionRecord> {
        None
    }

    fn lookup_grant(&self, _project_num: &str) -> Option<GrantRecord> {
        None
    }

    fn lookup_actor(&self, _name: &str) -> Option<GrantRecord> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_trial() -> TrialRecord {
        TrialRecord {
            nct_id: "NCT04204668".into(),
            title: Some("A trial".into()),
            status: Some("WITHDRAWN".into()),
            principal_investigator: Some("Jane Roe".into()),
            sponsor: None,
            funded_by: Some("NIH".into()),
        }
    }

    #[test]
    fn test_trial_detail_requires_status_pi_and_funding() {
        let record = StoreRecord::ClinicalTrials(complete_trial());
        assert!(record.is_detailed());

        let partial = StoreRecord::ClinicalTrials(TrialRecord {
            funded_by: Some("  ".into()),
            ..complete_trial()
        });
        assert!(!partial.is_detailed());
    }

    #[test]
    fn test_retraction_key_falls_back_to_doi() {
        let record = StoreRecord::Retractions(RetractionRecord {
            doi: Some("10.1000/xyz".into()),
            retraction_reason: Some("Copyright infringement".into()),
            ..Default::default()
        });
        assert_eq!(record.key(), "10.1000/xyz");
        assert!(record.is_detailed());
        assert_eq!(record.covered_purpose(), SearchPurpose::FraudDocumentation);
    }

    #[test]
    fn test_render_carries_table_key() {
        let record = StoreRecord::ClinicalTrials(complete_trial());
        let text = record.render();
        assert!(text.contains("[clinical_trials:NCT04204668]"));
        assert!(text.contains("- Sponsor: N/A"));
    }

    #[test]
    fn test_empty_store_never_finds() {
        let store = EmptyStore;
        assert!(store.lookup(&Identifier::Trial("NCT04204668".into())).is_none());
        assert!(store.lookup(&Identifier::Actor("Jane Roe".into())).is_none());
    }
}
