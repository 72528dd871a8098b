use std::collections::HashSet;

use crate::config::PlannerConfig;
use crate::types::identifier::Identifier;
use crate::types::lead::Lead;
use crate::types::task::{SearchPurpose, SearchTask, Tier};

/// 标题检索的类型序号，排在所有标识之后
const HEADLINE_RANK: u8 = 4;

/// 检索规划器
///
/// 输出按 (层级, 标识类型, 标识序号) 排序，超出预算时从尾部截断，
/// 因此总是先丢弃 MEDIUM 层，再丢弃低优先级的标识类型。
pub struct SearchPlanner {
    config: PlannerConfig,
    reference_year: i32,
}

struct Planned {
    rank: u8,
    index: usize,
    task: SearchTask,
}

impl SearchPlanner {
    pub fn new(config: PlannerConfig, reference_year: i32) -> Self {
        Self {
            config,
            reference_year,
        }
    }

    pub fn budget(&self) -> usize {
        self.config.budget
    }

    pub fn plan(&self, lead: &Lead) -> Vec<SearchTask> {
        let identifiers = lead.identifiers();
        let trials: Vec<&Identifier> = identifiers
            .iter()
            .filter(|i| matches!(i, Identifier::Trial(_)))
            .collect();

        let mut planned = Vec::new();
        let mut index_of_kind = [0usize; 4];

        for identifier in &identifiers {
            let rank = identifier.kind().rank();
            let index = index_of_kind[rank as usize];
            index_of_kind[rank as usize] += 1;

            for (tier, purpose, query) in self.queries_for(identifier, trials.is_empty()) {
                let max_results = self.max_results(tier);
                planned.push(Planned {
                    rank,
                    index,
                    task: SearchTask::new(query, tier, max_results, purpose, Some(identifier.clone())),
                });
            }
        }

        if let Some(query) = self.headline_query(&lead.headline) {
            planned.push(Planned {
                rank: HEADLINE_RANK,
                index: 0,
                task: SearchTask::new(
                    query,
                    Tier::Medium,
                    self.max_results(Tier::Medium),
                    SearchPurpose::General,
                    None,
                ),
            });
        }

        planned.sort_by_key(|p| (p.task.tier, p.rank, p.index));

        let mut seen = HashSet::new();
        planned
            .into_iter()
            .map(|p| p.task)
            .filter(|task| seen.insert(task.query.trim().to_lowercase()))
            .take(self.config.budget)
            .collect()
    }

    fn max_results(&self, tier: Tier) -> usize {
        match tier {
            Tier::Critical => self.config.critical_max_results,
            Tier::High | Tier::Medium => self.config.max_results,
        }
    }

    fn queries_for(
        &self,
        identifier: &Identifier,
        no_trials: bool,
    ) -> Vec<(Tier, SearchPurpose, String)> {
        match identifier {
            Identifier::Publication(pmid) => {
                let mut queries = vec![
                    (
                        Tier::Critical,
                        SearchPurpose::CopyrightCheck,
                        format!("PMID {} retraction reason copyright permission license", pmid),
                    ),
                    (
                        Tier::Critical,
                        SearchPurpose::Settlement,
                        format!("site:justice.gov PMID {} settlement qui tam", pmid),
                    ),
                    (
                        Tier::High,
                        SearchPurpose::FraudDocumentation,
                        format!("PMID {} retraction fraud fabrication", pmid),
                    ),
                ];
                if no_trials {
                    queries.push((
                        Tier::High,
                        SearchPurpose::FederalFunding,
                        format!("site:reporter.nih.gov PMID {}", pmid),
                    ));
                }
                queries
            }
            Identifier::Trial(nct_id) => vec![
                (
                    Tier::Critical,
                    SearchPurpose::Settlement,
                    format!("site:justice.gov {} settlement qui tam False Claims", nct_id),
                ),
                (
                    Tier::High,
                    SearchPurpose::TrialStatus,
                    format!("{} site:clinicaltrials.gov", nct_id),
                ),
                (
                    Tier::High,
                    SearchPurpose::FraudDocumentation,
                    format!("{} withdrawn terminated fraud", nct_id),
                ),
                (
                    Tier::High,
                    SearchPurpose::FederalFunding,
                    format!("site:reporter.nih.gov {}", nct_id),
                ),
            ],
            Identifier::Grant(grant) => vec![
                (
                    Tier::High,
                    SearchPurpose::FederalFunding,
                    format!("site:reporter.nih.gov {}", grant),
                ),
                (
                    Tier::Medium,
                    SearchPurpose::FraudDocumentation,
                    format!("{} grant fraud investigation", grant),
                ),
            ],
            Identifier::Actor(actor) => vec![(
                Tier::Medium,
                SearchPurpose::ActorHistory,
                format!("{} fraud settlement NIH", actor),
            )],
        }
    }

    fn headline_query(&self, headline: &str) -> Option<String> {
        let words: Vec<&str> = headline
            .split_whitespace()
            .take(self.config.headline_words)
            .collect();
        if words.is_empty() {
            return None;
        }
        Some(format!(
            "{} fraud retraction settlement {} {}",
            words.join(" "),
            self.reference_year - 1,
            self.reference_year
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> SearchPlanner {
        SearchPlanner::new(PlannerConfig::default(), 2025)
    }

    fn rich_lead() -> Lead {
        Lead {
            id: "1".into(),
            headline: "Cancer trial withdrawn after data fabrication".into(),
            nct_ids: vec!["NCT04204668".into()],
            pmids: vec!["31234567".into()],
            original_text: "Funded by R01 CA123456.".into(),
            implicated_actors: vec!["Dr. Jane Roe".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_tiers_are_ordered_critical_first() {
        let tasks = planner().plan(&rich_lead());

        let tiers: Vec<Tier> = tasks.iter().map(|t| t.tier).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);
        assert_eq!(tasks[0].tier, Tier::Critical);
        assert_eq!(tasks[0].purpose, SearchPurpose::Settlement);
        assert!(tasks[0].query.contains("NCT04204668"));
    }

    #[test]
    fn test_result_caps_follow_tier() {
        for task in planner().plan(&rich_lead()) {
            match task.tier {
                Tier::Critical => assert_eq!(task.max_results, 3),
                _ => assert_eq!(task.max_results, 5),
            }
        }
    }

    #[test]
    fn test_full_lead_plans_within_budget() {
        let tasks = planner().plan(&rich_lead());
        // 3 CRITICAL + 5 HIGH + 3 MEDIUM
        assert_eq!(tasks.len(), 11);
        assert_eq!(tasks.iter().filter(|t| t.tier == Tier::Medium).count(), 3);
    }

    #[test]
    fn test_budget_drops_medium_first() {
        let config = PlannerConfig {
            budget: 8,
            ..Default::default()
        };
        let tasks = SearchPlanner::new(config, 2025).plan(&rich_lead());

        assert_eq!(tasks.len(), 8);
        assert!(tasks.iter().all(|t| t.tier != Tier::Medium));
    }

    #[test]
    fn test_many_identifiers_never_exceed_budget() {
        let lead = Lead {
            id: "2".into(),
            headline: "Headline".into(),
            nct_ids: (0..6).map(|i| format!("NCT0000000{}", i)).collect(),
            pmids: (0..6).map(|i| format!("1000000{}", i)).collect(),
            ..Default::default()
        };
        let tasks = planner().plan(&lead);
        assert_eq!(tasks.len(), 12);
        // 越靠前的标识越优先保留
        assert!(tasks.iter().any(|t| t.query.contains("NCT00000000")));
    }

    #[test]
    fn test_publication_only_lead_searches_funding_by_pmid() {
        let lead = Lead {
            id: "3".into(),
            pmids: vec!["31234567".into()],
            ..Default::default()
        };
        let tasks = planner().plan(&lead);

        assert!(tasks.iter().any(|t| t.purpose == SearchPurpose::FederalFunding
            && t.query == "site:reporter.nih.gov PMID 31234567"));
        assert!(tasks.iter().any(|t| t.purpose == SearchPurpose::CopyrightCheck));
    }

    #[test]
    fn test_no_identifiers_yields_headline_search_only() {
        let lead = Lead {
            id: "4".into(),
            headline: "Hospital billed Medicare for phantom visits".into(),
            ..Default::default()
        };
        let tasks = planner().plan(&lead);

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].tier, Tier::Medium);
        assert_eq!(tasks[0].purpose, SearchPurpose::General);
        assert_eq!(
            tasks[0].query,
            "Hospital billed Medicare for fraud retraction settlement 2024 2025"
        );
        assert!(tasks[0].target.is_none());
    }

    #[test]
    fn test_empty_lead_plans_nothing() {
        let lead = Lead {
            id: "5".into(),
            ..Default::default()
        };
        assert!(planner().plan(&lead).is_empty());
    }

    #[test]
    fn test_identical_queries_planned_once() {
        let lead = Lead {
            id: "6".into(),
            grant_numbers: vec!["R01 CA123456".into()],
            original_text: "R01 CA123456".into(),
            ..Default::default()
        };
        let tasks = planner().plan(&lead);
        let queries: HashSet<String> = tasks.iter().map(|t| t.query.clone()).collect();
        assert_eq!(queries.len(), tasks.len());
    }
}
