//! 网页检索适配层

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod tavily;

pub use tavily::TavilyProvider;

/// 检索服务返回的单条结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("search transport failed: {0}")]
    Transport(String),
    #[error("search service returned status {0}")]
    Status(u16),
    #[error("search response could not be decoded: {0}")]
    Decode(String),
    #[error("search api key is not configured")]
    MissingApiKey,
    #[error("search timed out after {0}s")]
    Timeout(u64),
}

/// 外部网页检索服务
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>, ProviderError>;
}
