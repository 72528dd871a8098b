use std::collections::{BTreeSet, HashSet};

use crate::investigator::executor::TaskOutcome;
use crate::types::evidence::{
    DatabaseEvidence, EvidenceBundle, EvidenceItem, EvidenceSummary, WebEvidence,
};

/// 合并本地库命中与网页检索结果
///
/// 本地库证据在前，网页证据按层级顺序在后；同一 URL 或同一 表名:主键 只保留首次出现。
pub fn aggregate(database_hits: &[DatabaseEvidence], search_hits: &[TaskOutcome]) -> EvidenceBundle {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for db in database_hits {
        let item = EvidenceItem::Database(db.clone());
        if seen.insert(item.dedup_key()) {
            items.push(item);
        }
    }

    let mut ordered: Vec<&TaskOutcome> = search_hits.iter().collect();
    ordered.sort_by_key(|outcome| outcome.task.tier);

    for outcome in &ordered {
        for hit in &outcome.hits {
            if hit.url.trim().is_empty() {
                continue;
            }
            let item = EvidenceItem::Web(WebEvidence {
                url: hit.url.clone(),
                title: hit.title.clone(),
                content: hit.content.clone(),
                query: outcome.task.query.clone(),
                tier: outcome.task.tier,
                purpose: outcome.task.purpose,
            });
            if seen.insert(item.dedup_key()) {
                items.push(item);
            }
        }
    }

    let distinct_searches = ordered
        .iter()
        .filter(|o| !o.failed)
        .map(|o| o.task.query.trim().to_lowercase())
        .collect::<HashSet<_>>()
        .len();
    let tiers_executed = ordered
        .iter()
        .map(|o| o.task.tier)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let summary = EvidenceSummary {
        results_count: items.len(),
        database_hits: items.iter().filter(|i| i.is_database()).count(),
        distinct_searches,
        tiers_executed,
    };

    EvidenceBundle::new(items, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::WebHit;
    use crate::store::{StoreRecord, TrialRecord};
    use crate::types::identifier::Identifier;
    use crate::types::task::{SearchPurpose, SearchTask, Tier};

    fn outcome(query: &str, tier: Tier, urls: &[&str], failed: bool) -> TaskOutcome {
        TaskOutcome {
            task: SearchTask::new(query, tier, 5, SearchPurpose::General, None),
            hits: urls
                .iter()
                .map(|u| WebHit {
                    title: "t".into(),
                    url: u.to_string(),
                    content: "c".into(),
                })
                .collect(),
            from_cache: false,
            failed,
        }
    }

    fn trial(nct_id: &str) -> DatabaseEvidence {
        DatabaseEvidence {
            identifier: Identifier::Trial(nct_id.into()),
            record: StoreRecord::ClinicalTrials(TrialRecord {
                nct_id: nct_id.into(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_duplicates_collapse_by_url_and_key() {
        let db = vec![trial("NCT04204668"), trial("NCT04204668")];
        let web = vec![
            outcome("a", Tier::High, &["https://x.org/1", "https://x.org/2"], false),
            outcome("b", Tier::Critical, &["https://X.org/1/", ""], false),
        ];

        let bundle = aggregate(&db, &web);

        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.summary().database_hits, 1);
        assert_eq!(bundle.summary().results_count, 3);
    }

    #[test]
    fn test_items_keep_provenance_and_tier_order() {
        let web = vec![
            outcome("high query", Tier::High, &["https://x.org/h"], false),
            outcome("critical query", Tier::Critical, &["https://x.org/c"], false),
        ];
        let bundle = aggregate(&[trial("NCT00000001")], &web);

        assert!(bundle.items()[0].is_database());
        let tiers: Vec<Option<Tier>> = bundle.items().iter().map(|i| i.tier()).collect();
        assert_eq!(tiers, vec![None, Some(Tier::Critical), Some(Tier::High)]);

        let first_web = bundle.web_items().next().unwrap();
        assert_eq!(first_web.query, "critical query");
    }

    #[test]
    fn test_summary_counts_searches_and_tiers() {
        let web = vec![
            outcome("q1", Tier::Critical, &[], false),
            outcome("q2", Tier::High, &["https://x.org/1"], false),
            outcome("q3", Tier::High, &[], true),
        ];
        let bundle = aggregate(&[], &web);

        assert_eq!(bundle.summary().distinct_searches, 2);
        assert_eq!(
            bundle.summary().tiers_executed,
            vec![Tier::Critical, Tier::High]
        );
    }
}
