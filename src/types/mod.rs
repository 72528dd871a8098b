pub mod evidence;
pub mod identifier;
pub mod lead;
pub mod task;
pub mod verdict;

pub use evidence::{DatabaseEvidence, EvidenceBundle, EvidenceItem, EvidenceSummary, WebEvidence};
pub use identifier::{Identifier, IdentifierKind};
pub use lead::Lead;
pub use task::{SearchPurpose, SearchTask, Tier};
pub use verdict::{
    Answer, ChecklistAnswer, EvidenceQuality, FailedInvestigation, InvestigationOutcome,
    StopReason, Telemetry, VerdictRecord,
};
