pub mod cache;
pub mod cli;
pub mod config;
pub mod investigator;
pub mod llm;
pub mod outlet;
pub mod search;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use investigator::Investigator;
pub use types::{InvestigationOutcome, Lead};
