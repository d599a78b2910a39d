use std::sync::Arc;

use tracing::{info, warn};

use crate::config::LlmSettings;
use crate::provider::{LlmClient, Provider};
use crate::types::InvocationResult;

pub const NO_BACKEND_MESSAGE: &str =
    "No LLM backend available: set OPENAI_API_KEY or OLLAMA_BASE_URL to enable analysis.";
pub const NO_BACKEND_MODEL: &str = "none";

/// Tries each configured provider in order and normalizes the outcome into a
/// single [`InvocationResult`]. One attempt per provider, no retries.
#[derive(Clone)]
pub struct ResilientInvoker {
    providers: Vec<Arc<dyn Provider>>,
}

impl ResilientInvoker {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { providers }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        let providers: Vec<Arc<dyn Provider>> = settings
            .provider_configs()
            .into_iter()
            .map(|config| Arc::new(LlmClient::new(config)) as Arc<dyn Provider>)
            .collect();
        if providers.is_empty() {
            warn!("No LLM provider configured; LLM-backed tools will report {NO_BACKEND_MESSAGE:?}");
        } else {
            let labels: Vec<String> = providers.iter().map(|p| p.label()).collect();
            info!("LLM providers in fallback order: {}", labels.join(", "));
        }
        Self::new(providers)
    }

    pub fn has_backend(&self) -> bool {
        !self.providers.is_empty()
    }

    pub fn provider_labels(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.label()).collect()
    }

    pub async fn invoke(&self, prompt: &str) -> InvocationResult {
        if self.providers.is_empty() {
            return InvocationResult::failure(NO_BACKEND_MODEL, NO_BACKEND_MESSAGE);
        }

        let mut errors = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match provider.complete(prompt).await {
                Ok(completion) => {
                    if !errors.is_empty() {
                        info!(
                            "Provider {} answered after {} failed attempt(s)",
                            provider.label(),
                            errors.len()
                        );
                    }
                    return InvocationResult::success(provider.model_name(), completion);
                }
                Err(err) => {
                    warn!("Provider {} failed: {err}", provider.label());
                    errors.push(format!("{}: {err}", provider.label()));
                }
            }
        }

        let model_name = self
            .providers
            .last()
            .map(|p| p.model_name().to_string())
            .unwrap_or_else(|| NO_BACKEND_MODEL.to_string());
        InvocationResult::failure(model_name, errors.join(" | "))
    }
}

impl std::fmt::Debug for ResilientInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientInvoker")
            .field("providers", &self.provider_labels())
            .finish()
    }
}
