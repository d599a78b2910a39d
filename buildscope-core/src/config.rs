use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// API key values shipped in example `.env` files. A key equal to one of these
/// is treated as absent.
pub const PLACEHOLDER_API_KEYS: &[&str] = &[
    "your-openai-api-key",
    "your_openai_api_key",
    "your_openai_api_key_here",
    "sk-...",
    "changeme",
];

pub const DEFAULT_HOSTED_MODEL: &str = "gpt-4";
pub const DEFAULT_LOCAL_MODEL: &str = "llama3.2";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
pub enum ProviderKind {
    Hosted,
    LocalServer,
}

/// Connection settings for a single LLM backend. Temperature is pinned to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub const TEMPERATURE: f32 = 0.0;

    pub fn hosted(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Hosted,
            model: model.into(),
            api_key: Some(api_key.into()),
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn local_server(model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::LocalServer,
            model: model.into(),
            api_key: None,
            base_url: Some(base_url.into()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Whether the connection information required by `kind` is present and
    /// well formed.
    pub fn is_configured(&self) -> bool {
        if self.model.trim().is_empty() {
            return false;
        }
        match self.kind {
            ProviderKind::Hosted => self
                .api_key
                .as_deref()
                .map(is_usable_api_key)
                .unwrap_or(false),
            ProviderKind::LocalServer => self
                .base_url
                .as_deref()
                .map(is_valid_base_url)
                .unwrap_or(false),
        }
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.kind, self.model)
    }
}

fn is_usable_api_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty()
        && !PLACEHOLDER_API_KEYS
            .iter()
            .any(|placeholder| key.eq_ignore_ascii_case(placeholder))
}

fn is_valid_base_url(url: &str) -> bool {
    match url.trim().parse::<http::Uri>() {
        Ok(uri) => {
            matches!(uri.scheme_str(), Some("http") | Some("https")) && uri.authority().is_some()
        }
        Err(_) => false,
    }
}

/// LLM settings collected at startup. Either backend may be absent.
#[derive(Debug, Clone, Default)]
pub struct LlmSettings {
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub ollama_base_url: Option<String>,
    pub ollama_model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl LlmSettings {
    /// Provider configs in fallback order: hosted first, then local server.
    /// Unconfigured entries are dropped.
    pub fn provider_configs(&self) -> Vec<ProviderConfig> {
        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let mut configs = Vec::new();
        if let Some(api_key) = &self.openai_api_key {
            let model = self
                .openai_model
                .clone()
                .unwrap_or_else(|| DEFAULT_HOSTED_MODEL.to_string());
            configs.push(
                ProviderConfig::hosted(model, api_key.clone()).with_timeout_secs(timeout_secs),
            );
        }
        if let Some(base_url) = &self.ollama_base_url {
            let model = self
                .ollama_model
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
            configs.push(
                ProviderConfig::local_server(model, base_url.clone())
                    .with_timeout_secs(timeout_secs),
            );
        }
        configs.retain(ProviderConfig::is_configured);
        configs
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub project_root: PathBuf,
    /// Deadline applied to each dispatched unit. `None` waits indefinitely.
    pub unit_timeout: Option<Duration>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            unit_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_key_is_not_configured() {
        let config = ProviderConfig::hosted("gpt-4", "your_openai_api_key_here");
        assert!(!config.is_configured());
        let config = ProviderConfig::hosted("gpt-4", "   ");
        assert!(!config.is_configured());
        let config = ProviderConfig::hosted("gpt-4", "sk-live-123");
        assert!(config.is_configured());
    }

    #[test]
    fn local_server_requires_absolute_http_url() {
        assert!(ProviderConfig::local_server("llama3.2", "http://localhost:11434").is_configured());
        assert!(ProviderConfig::local_server("llama3.2", "https://ollama.internal").is_configured());
        assert!(!ProviderConfig::local_server("llama3.2", "localhost:11434").is_configured());
        assert!(!ProviderConfig::local_server("llama3.2", "ftp://host").is_configured());
        assert!(!ProviderConfig::local_server("llama3.2", "").is_configured());
    }

    #[test]
    fn provider_configs_keep_fallback_order() {
        let settings = LlmSettings {
            openai_api_key: Some("sk-real".to_string()),
            ollama_base_url: Some("http://127.0.0.1:11434".to_string()),
            timeout_secs: Some(5),
            ..Default::default()
        };
        let configs = settings.provider_configs();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].kind, ProviderKind::Hosted);
        assert_eq!(configs[0].model, DEFAULT_HOSTED_MODEL);
        assert_eq!(configs[1].kind, ProviderKind::LocalServer);
        assert_eq!(configs[1].model, DEFAULT_LOCAL_MODEL);
        assert_eq!(configs[1].timeout_secs, 5);
    }

    #[test]
    fn empty_settings_produce_no_providers() {
        assert!(LlmSettings::default().provider_configs().is_empty());
    }

    #[test]
    fn label_names_kind_and_model() {
        let config = ProviderConfig::local_server("llama3.2", "http://localhost:11434");
        assert_eq!(config.label(), "local-server (llama3.2)");
        assert_eq!("hosted".parse::<ProviderKind>().unwrap(), ProviderKind::Hosted);
    }
}
