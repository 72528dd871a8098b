use std::sync::LazyLock;

use regex::Regex;

use crate::config::TerminationConfig;
use crate::store::StoreRecord;
use crate::types::evidence::{EvidenceBundle, EvidenceItem};
use crate::types::task::Tier;
use crate::types::verdict::StopReason;

static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid year pattern"));

/// 从证据中识别出的信号
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvidenceSignals {
    /// 因版权/授权问题撤稿，属于非欺诈撤稿
    pub copyright_retraction: bool,
    /// 参考年份或前一年内的和解
    pub recent_settlement: bool,
    pub fraud_documented: bool,
    pub federal_involvement: bool,
}

/// 提前终止策略
pub struct TerminationPolicy {
    copyright_markers: Vec<String>,
    retraction_markers: Vec<String>,
    settlement_markers: Vec<String>,
    fraud_markers: Vec<String>,
    federal_markers: Vec<String>,
    reference_year: i32,
}

fn lowered(markers: &[String]) -> Vec<String> {
    markers
        .iter()
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .collect()
}

fn contains_any(text: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| text.contains(m.as_str()))
}

impl TerminationPolicy {
    pub fn new(config: &TerminationConfig, reference_year: i32) -> Self {
        Self {
            copyright_markers: lowered(&config.copyright_markers),
            retraction_markers: lowered(&config.retraction_markers),
            settlement_markers: lowered(&config.settlement_markers),
            fraud_markers: lowered(&config.fraud_markers),
            federal_markers: lowered(&config.federal_markers),
            reference_year,
        }
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    fn mentions_recent_year(&self, text: &str) -> bool {
        YEAR_PATTERN.find_iter(text).any(|m| {
            m.as_str()
                .parse::<i32>()
                .is_ok_and(|y| y == self.reference_year || y == self.reference_year - 1)
        })
    }

    /// 扫描证据包，计算各类信号
    pub fn detect(&self, bundle: &EvidenceBundle) -> EvidenceSignals {
        let mut signals = EvidenceSignals::default();

        for item in bundle.items() {
            let text = item.searchable_text();

            let fraud = contains_any(&text, &self.fraud_markers);

            // 同一条证据提到造假时，版权或许可字样只是出版方的样板文字
            if !fraud
                && contains_any(&text, &self.retraction_markers)
                && contains_any(&text, &self.copyright_markers)
            {
                signals.copyright_retraction = true;
            }
            if contains_any(&text, &self.settlement_markers) && self.mentions_recent_year(&text) {
                signals.recent_settlement = true;
            }
            if fraud {
                signals.fraud_documented = true;
            }
            let grant_record = matches!(
                item,
                EvidenceItem::Database(db) if matches!(db.record, StoreRecord::NihGrants(_))
            );
            if grant_record || contains_any(&text, &self.federal_markers) {
                signals.federal_involvement = true;
            }
        }

        signals
    }

    /// 在一层检索全部完成后判断是否停止
    pub fn should_stop(&self, bundle: &EvidenceBundle, tier_just_completed: Tier) -> Option<StopReason> {
        decide(&self.detect(bundle), tier_just_completed)
    }
}

/// 纯判定函数，按顺序匹配，首个命中的原因生效
pub fn decide(signals: &EvidenceSignals, tier_just_completed: Tier) -> Option<StopReason> {
    if signals.copyright_retraction {
        return Some(StopReason::NonFraudRetraction);
    }
    if signals.recent_settlement {
        return Some(StopReason::RecentSettlement);
    }
    if tier_just_completed >= Tier::High
        && signals.fraud_documented
        && signals.federal_involvement
    {
        return Some(StopReason::SufficientForHighConfidence);
    }
    match tier_just_completed.next() {
        Some(_) => None,
        None => Some(StopReason::TiersExhausted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{GrantRecord, RetractionRecord};
    use crate::types::evidence::{DatabaseEvidence, EvidenceSummary, WebEvidence};
    use crate::types::identifier::Identifier;
    use crate::types::task::SearchPurpose;

    fn policy() -> TerminationPolicy {
        TerminationPolicy::new(&TerminationConfig::default(), 2025)
    }

    fn web(title: &str, content: &str) -> EvidenceItem {
        EvidenceItem::Web(WebEvidence {
            url: format!("https://example.org/{}", title.len()),
            title: title.into(),
            content: content.into(),
            query: String::new(),
            tier: Tier::Critical,
            purpose: SearchPurpose::General,
        })
    }

    fn bundle(items: Vec<EvidenceItem>) -> EvidenceBundle {
        EvidenceBundle::new(items, EvidenceSummary::default())
    }

    #[test]
    fn test_copyright_retraction_stops_after_critical() {
        let evidence = bundle(vec![web(
            "Retraction notice",
            "This article has been retracted because the authors did not have permission to reuse figures.",
        )]);
        assert_eq!(
            policy().should_stop(&evidence, Tier::Critical),
            Some(StopReason::NonFraudRetraction)
        );
    }

    #[test]
    fn test_fraud_retraction_with_license_boilerplate_continues() {
        let evidence = bundle(vec![web(
            "Retraction notice",
            "This article has been retracted due to data fabrication and image falsification. \
             This is an open access article distributed under the Creative Commons Attribution License.",
        )]);
        let signals = policy().detect(&evidence);

        assert!(!signals.copyright_retraction);
        assert!(signals.fraud_documented);
        assert_eq!(policy().should_stop(&evidence, Tier::Critical), None);
    }

    #[test]
    fn test_copyright_without_retraction_is_not_terminal() {
        let evidence = bundle(vec![web("Journal license", "Published under a CC-BY license.")]);
        assert_eq!(policy().should_stop(&evidence, Tier::Critical), None);
    }

    #[test]
    fn test_database_retraction_reason_counts() {
        let evidence = bundle(vec![EvidenceItem::Database(DatabaseEvidence {
            identifier: Identifier::Publication("31234567".into()),
            record: StoreRecord::Retractions(RetractionRecord {
                pmid: Some("31234567".into()),
                retraction_reason: Some("Copyright claim".into()),
                ..Default::default()
            }),
        })]);
        assert!(policy().detect(&evidence).copyright_retraction);
    }

    #[test]
    fn test_recent_settlement_window() {
        let recent = bundle(vec![web("DOJ", "Settlement announced in March 2024.")]);
        let current = bundle(vec![web("DOJ", "The university settled in 2025.")]);
        let old = bundle(vec![web("DOJ", "Settlement reached in 2019.")]);

        assert_eq!(
            policy().should_stop(&recent, Tier::Critical),
            Some(StopReason::RecentSettlement)
        );
        assert_eq!(
            policy().should_stop(&current, Tier::Critical),
            Some(StopReason::RecentSettlement)
        );
        assert_eq!(policy().should_stop(&old, Tier::Critical), None);
    }

    #[test]
    fn test_sufficient_evidence_only_after_high() {
        let signals = EvidenceSignals {
            fraud_documented: true,
            federal_involvement: true,
            ..Default::default()
        };
        assert_eq!(decide(&signals, Tier::Critical), None);
        assert_eq!(
            decide(&signals, Tier::High),
            Some(StopReason::SufficientForHighConfidence)
        );
    }

    #[test]
    fn test_grant_record_implies_federal_involvement() {
        let evidence = bundle(vec![EvidenceItem::Database(DatabaseEvidence {
            identifier: Identifier::Grant("R01 CA123456".into()),
            record: StoreRecord::NihGrants(GrantRecord {
                project_num: "5R01CA123456-03".into(),
                ..Default::default()
            }),
        })]);
        assert!(policy().detect(&evidence).federal_involvement);
    }

    #[test]
    fn test_medium_always_stops() {
        let none = EvidenceSignals::default();
        assert_eq!(decide(&none, Tier::High), None);
        assert_eq!(decide(&none, Tier::Medium), Some(StopReason::TiersExhausted));
    }

    #[test]
    fn test_first_matching_reason_wins() {
        let signals = EvidenceSignals {
            copyright_retraction: true,
            recent_settlement: true,
            fraud_documented: true,
            federal_involvement: true,
        };
        assert_eq!(
            decide(&signals, Tier::High),
            Some(StopReason::NonFraudRetraction)
        );
    }
}
