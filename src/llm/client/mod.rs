//! LLM客户端 - 评分引擎使用的推理模型接口

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::config::LLMConfig;

mod providers;

use providers::ProviderClient;

/// 推理模型
///
/// 只做单轮补全，不做任何重试；重试策略由调用方决定。
#[async_trait]
pub trait ReasoningModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String>;
}

/// 基于 rig 的LLM客户端
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() && config.provider != crate::config::LLMProvider::Ollama
        {
            anyhow::bail!(
                "LLM API key is not configured for provider {}",
                config.provider
            );
        }
        let client = ProviderClient::new(&config)?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ReasoningModel for LLMClient {
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String> {
        let agent = self
            .client
            .create_agent(&self.config.model, system_prompt, &self.config);
        let timeout = Duration::from_secs(self.config.timeout_seconds);

        match tokio::time::timeout(timeout, agent.prompt(prompt)).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!(
                "model {} timed out after {}s",
                self.config.model,
                self.config.timeout_seconds
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LLMProvider;

    #[test]
    fn test_missing_api_key_is_rejected() {
        let config = LLMConfig {
            provider: LLMProvider::Anthropic,
            api_key: String::new(),
            ..Default::default()
        };
        assert!(LLMClient::new(config).is_err());
    }

    #[test]
    fn test_ollama_needs_no_api_key() {
        let config = LLMConfig {
            provider: LLMProvider::Ollama,
            api_key: String::new(),
            model: "llama3".into(),
            ..Default::default()
        };
        let client = LLMClient::new(config).unwrap();
        assert_eq!(client.model(), "llama3");
    }
}
