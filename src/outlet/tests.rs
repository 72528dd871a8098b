use super::*;
use crate::types::verdict::{EvidenceQuality, FailedInvestigation, Telemetry, VerdictRecord};
use chrono::Utc;
use tempfile::TempDir;

fn done(lead_id: &str, score: u8) -> InvestigationOutcome {
    InvestigationOutcome::Done(VerdictRecord {
        lead_id: lead_id.into(),
        score,
        model_score: score,
        evidence_quality: EvidenceQuality::Suspected,
        checklist: Vec::new(),
        rationale: "r".into(),
        caps_applied: Vec::new(),
        telemetry: Telemetry::default(),
        investigated_at: Utc::now(),
    })
}

fn failed(lead_id: &str) -> InvestigationOutcome {
    InvestigationOutcome::Failed(FailedInvestigation {
        lead_id: lead_id.into(),
        error: "malformed".into(),
        telemetry: Telemetry::default(),
        investigated_at: Utc::now(),
    })
}

fn lead(id: &str, heuristic_score: Option<f64>) -> Lead {
    Lead {
        id: id.into(),
        heuristic_score,
        ..Default::default()
    }
}

#[test]
fn test_writer_creates_parent_and_appends() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("results/nested/out.jsonl");

    let mut writer = ResultsWriter::open(&path).unwrap();
    writer.append(&done("1", 20)).unwrap();
    writer.append(&failed("2")).unwrap();
    assert_eq!(writer.written(), 2);
    drop(writer);

    // 重新打开后继续追加，不覆盖已有记录
    let mut writer = ResultsWriter::open(&path).unwrap();
    writer.append(&done("2", 70)).unwrap();
    drop(writer);

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 3);
    assert!(content.lines().next().unwrap().contains("\"status\":\"done\""));
    assert!(content.lines().nth(1).unwrap().contains("\"status\":\"failed\""));

    let outcomes = read_outcomes(&path).unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[1].is_failed());
    assert_eq!(outcomes[2].score(), Some(70));
}

#[test]
fn test_read_outcomes_skips_malformed_lines() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("out.jsonl");
    let good = serde_json::to_string(&done("5", 40)).unwrap();
    std::fs::write(&path, format!("{}\n\nnot json\n{{\"status\":\"unknown\"}}\n", good)).unwrap();

    let outcomes = read_outcomes(&path).unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].lead_id(), "5");
}

#[test]
fn test_read_missing_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    assert!(read_outcomes(&temp_dir.path().join("absent.jsonl")).is_err());
}

#[test]
fn test_read_leads_accepts_upstream_field_names() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("leads.jsonl");
    std::fs::write(
        &path,
        concat!(
            r#"{"source_row_index": 17, "headline": "Trial halted", "qui_tam_score": 72, "implicated_actors": "Dr. A; Dr. B"}"#,
            "\n",
            r#"{"id": "x-2", "headline": "Second"}"#,
            "\n",
        ),
    )
    .unwrap();

    let leads = read_leads(&path).unwrap();

    assert_eq!(leads.len(), 2);
    assert_eq!(leads[0].id, "17");
    assert_eq!(leads[0].heuristic_score, Some(72.0));
    assert_eq!(leads[0].implicated_actors, vec!["Dr. A", "Dr. B"]);
    assert_eq!(leads[1].id, "x-2");
}

#[test]
fn test_latest_outcome_wins() {
    let latest = latest_outcomes(vec![failed("1"), done("2", 10), done("1", 80)]);

    assert_eq!(latest.len(), 2);
    assert_eq!(latest["1"].score(), Some(80));
    assert_eq!(latest["2"].score(), Some(10));
}

#[test]
fn test_select_for_rerun_picks_failed_and_low_scores() {
    let latest = latest_outcomes(vec![done("1", 80), done("2", 49), failed("3"), done("4", 50)]);
    let leads = vec![
        lead("1", None),
        lead("2", None),
        lead("3", None),
        lead("4", None),
        lead("5", None),
    ];

    let ids: Vec<String> = select_for_rerun(leads, &latest, 50)
        .into_iter()
        .map(|l| l.id)
        .collect();

    assert_eq!(ids, vec!["2", "3"]);
}

#[test]
fn test_gate_by_heuristic() {
    let leads = vec![lead("1", Some(80.0)), lead("2", Some(30.0)), lead("3", None)];

    assert_eq!(gate_by_heuristic(leads.clone(), None).len(), 3);

    let kept = gate_by_heuristic(leads, Some(50.0));
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, "1");
}
