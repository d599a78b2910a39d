use std::sync::OnceLock;

use ::llm::builder::{LLMBackend, LLMBuilder};
use ::llm::chat::ChatMessage;
use async_trait::async_trait;
use tracing::debug;

use crate::config::{ProviderConfig, ProviderKind};
use crate::errors::ErrorKind;
use crate::prelude::*;
use crate::types::{Completion, LlmUsage};

/// A single LLM backend: prompt in, text out.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human readable identifier used in error messages.
    fn label(&self) -> String;

    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<Completion>;
}

pub struct LlmClient {
    config: ProviderConfig,
    client: OnceLock<std::result::Result<Box<dyn ::llm::LLMProvider>, String>>,
}

impl LlmClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Builds the underlying client on first use. A failed build is cached and
    /// reported on every later attempt.
    fn client(&self) -> Result<&dyn ::llm::LLMProvider> {
        let cached = self.client.get_or_init(|| {
            debug!("Building LLM client for {}", self.config.label());
            build_client(&self.config).map_err(|err| err.to_string())
        });
        match cached {
            Ok(client) => Ok(client.as_ref()),
            Err(err) => Err(BuildScopeError::provider(format!(
                "client construction failed: {err}"
            ))),
        }
    }
}

#[async_trait]
impl Provider for LlmClient {
    fn label(&self) -> String {
        self.config.label()
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str) -> Result<Completion> {
        let client = self.client()?;
        let messages = vec![ChatMessage::user().content(prompt).build()];
        let response = client.chat(&messages).await?;
        let usage = response.usage().map(LlmUsage::from);
        let text = response
            .text()
            .ok_or_else(|| BuildScopeError::from(ErrorKind::MissingResponseText))?;
        Ok(Completion { text, usage })
    }
}

fn build_client(config: &ProviderConfig) -> Result<Box<dyn ::llm::LLMProvider>> {
    let backend = match config.kind {
        ProviderKind::Hosted => LLMBackend::OpenAI,
        ProviderKind::LocalServer => LLMBackend::Ollama,
    };

    let mut builder = LLMBuilder::new()
        .backend(backend)
        .model(config.model.clone())
        .temperature(ProviderConfig::TEMPERATURE)
        .timeout_seconds(config.timeout_secs)
        .normalize_response(true);

    if let Some(base_url) = &config.base_url {
        if !base_url.trim().is_empty() {
            builder = builder.base_url(base_url.trim().to_string());
        }
    }
    if let Some(api_key) = &config.api_key {
        builder = builder.api_key(api_key.clone());
    }

    let llm = builder.build()?;
    Ok(llm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_exposes_config_identity() {
        let client = LlmClient::new(ProviderConfig::hosted("gpt-4", "sk-test"));
        assert_eq!(client.model_name(), "gpt-4");
        assert_eq!(client.label(), "hosted (gpt-4)");
        assert_eq!(client.config().kind, ProviderKind::Hosted);
    }

    #[test]
    fn local_client_builds_lazily() {
        let client = LlmClient::new(ProviderConfig::local_server(
            "llama3.2",
            "http://127.0.0.1:11434",
        ));
        assert!(client.client.get().is_none());
        assert!(client.client().is_ok());
        assert!(client.client.get().is_some());
    }
}
