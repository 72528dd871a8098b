use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{ProviderError, SearchProvider, WebHit};
use crate::config::SearchConfig;

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<WebHit>,
}

/// Tavily 检索服务客户端
#[derive(Clone)]
pub struct TavilyProvider {
    http: Client,
    api_key: String,
    api_base_url: String,
    search_depth: String,
    timeout_seconds: u64,
}

impl TavilyProvider {
    pub fn new(config: &SearchConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.clone(),
            search_depth: config.search_depth.clone(),
            timeout_seconds: config.timeout_seconds,
        })
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        let payload = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "search_depth": self.search_depth,
            "max_results": max_results,
            "include_domains": [],
            "exclude_domains": [],
        });

        let response = self
            .http
            .post(&self.api_base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout_seconds)
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response
            .json::<TavilyResponse>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(body.results.into_iter().take(max_results).collect())
    }
}
