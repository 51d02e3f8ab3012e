//! Settings for the agent and its providers.
//!
//! Loaded from a TOML file, then overridden from the environment:
//!
//! ```toml
//! default_provider = "anthropic"
//!
//! [agent]
//! max_turns = 5
//! temperature = 0.2
//!
//! [anthropic]
//! model = "claude-sonnet-4-20250514"
//!
//! [custom]
//! base_url = "http://localhost:11434/v1"
//! model = "llama3.1"
//! headers = { "x-tenant" = "acme" }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::llm::provider::{Credential, Provider, ProviderConfig};

// ---------------------------------------------------------------------------
// Agent settings
// ---------------------------------------------------------------------------

/// Loop budgets and sampling defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum provider calls per run.
    pub max_turns: u32,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Checkpoints older than this are not resumed.
    pub checkpoint_max_age_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_turns: 5,
            temperature: 0.2,
            max_tokens: 4096,
            checkpoint_max_age_secs: 1800,
        }
    }
}

impl AgentSettings {
    pub fn checkpoint_max_age(&self) -> Duration {
        Duration::from_secs(self.checkpoint_max_age_secs)
    }
}

// ---------------------------------------------------------------------------
// Provider settings
// ---------------------------------------------------------------------------

/// Per-provider connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    /// An OAuth access token, used instead of `api_key` when present.
    pub oauth_token: Option<String>,
    /// Whether the OAuth account is still linked.
    pub oauth_connected: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            oauth_token: None,
            oauth_connected: true,
            model: None,
            base_url: None,
            headers: BTreeMap::new(),
        }
    }
}

impl ProviderSettings {
    pub fn credential(&self) -> Credential {
        if let Some(token) = non_empty(self.oauth_token.as_deref()) {
            return Credential::OAuth {
                access_token: token.to_owned(),
                connected: self.oauth_connected,
            };
        }
        match non_empty(self.api_key.as_deref()) {
            Some(key) => Credential::api_key(key),
            None => Credential::None,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_provider: Provider,
    pub agent: AgentSettings,
    pub openai: ProviderSettings,
    pub anthropic: ProviderSettings,
    pub google: ProviderSettings,
    pub custom: ProviderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_provider: Provider::OpenAi,
            agent: AgentSettings::default(),
            openai: ProviderSettings::default(),
            anthropic: ProviderSettings::default(),
            google: ProviderSettings::default(),
            custom: ProviderSettings::default(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)
            .map_err(|e| AgentError::configuration(format!("invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AgentError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.agent.max_turns == 0 {
            return Err(AgentError::configuration("agent.max_turns must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(AgentError::configuration(
                "agent.temperature must be between 0 and 2",
            ));
        }
        Ok(())
    }

    pub fn provider(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Anthropic => &self.anthropic,
            Provider::Google => &self.google,
            Provider::Custom => &self.custom,
        }
    }

    pub fn provider_mut(&mut self, provider: Provider) -> &mut ProviderSettings {
        match provider {
            Provider::OpenAi => &mut self.openai,
            Provider::Anthropic => &mut self.anthropic,
            Provider::Google => &mut self.google,
            Provider::Custom => &mut self.custom,
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup. Empty values are
    /// ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(provider) = var("STYLEPILOT_PROVIDER") {
            self.default_provider = provider.parse()?;
        }
        if let Some(model) = var("STYLEPILOT_MODEL") {
            self.provider_mut(self.default_provider).model = Some(model);
        }

        if let Some(key) = var("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(key) = var("ANTHROPIC_API_KEY") {
            self.anthropic.api_key = Some(key);
        }
        if let Some(key) = var("GOOGLE_API_KEY").or_else(|| var("GEMINI_API_KEY")) {
            self.google.api_key = Some(key);
        }
        if let Some(endpoint) = var("STYLEPILOT_CUSTOM_ENDPOINT") {
            self.custom.base_url = Some(endpoint);
        }
        if let Some(key) = var("STYLEPILOT_CUSTOM_API_KEY") {
            self.custom.api_key = Some(key);
        }

        if let Some(turns) = var("STYLEPILOT_MAX_TURNS") {
            self.agent.max_turns = turns
                .trim()
                .parse()
                .map_err(|e| AgentError::configuration(format!("STYLEPILOT_MAX_TURNS: {e}")))?;
        }

        self.validate()
    }

    /// Build the provider configuration for one request.
    pub fn provider_config(&self, provider: Provider, model_override: Option<&str>) -> ProviderConfig {
        let settings = self.provider(provider);
        let model = non_empty(model_override)
            .or(non_empty(settings.model.as_deref()))
            .unwrap_or_default();

        let mut config = ProviderConfig::new(provider, model, settings.credential());
        if let Some(base_url) = non_empty(settings.base_url.as_deref()) {
            config = config.with_base_url(base_url);
        }
        for (name, value) in &settings.headers {
            config = config.with_header(name, value);
        }
        config
    }
}
