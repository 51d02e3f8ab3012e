//! Provider identity, credentials, and endpoint resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// The closed set of supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI chat completions.
    #[serde(alias = "gpt")]
    OpenAi,
    /// Anthropic messages API.
    #[serde(alias = "claude")]
    Anthropic,
    /// Google Gemini `generateContent`.
    #[serde(alias = "gemini")]
    Google,
    /// Any OpenAI-compatible endpoint supplied by the user.
    #[serde(alias = "compatible")]
    Custom,
}

impl Provider {
    pub const ALL: [Provider; 4] = [Self::OpenAi, Self::Anthropic, Self::Google, Self::Custom];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Custom => "custom",
        }
    }

    /// Model used when the caller does not pick one. Custom endpoints have
    /// no sensible default.
    pub fn default_model(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("gpt-4o-mini"),
            Self::Anthropic => Some("claude-sonnet-4-20250514"),
            Self::Google => Some("gemini-2.5-flash"),
            Self::Custom => None,
        }
    }

    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Anthropic => Some("https://api.anthropic.com"),
            Self::Google => Some("https://generativelanguage.googleapis.com"),
            Self::Custom => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "gpt" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "google" | "gemini" => Ok(Self::Google),
            "custom" | "compatible" => Ok(Self::Custom),
            other => Err(AgentError::configuration(format!(
                "unknown provider `{other}`"
            ))),
        }
    }
}

/// How requests to a provider are authenticated.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    #[default]
    None,
    ApiKey { key: String },
    #[serde(rename = "oauth")]
    OAuth { access_token: String, connected: bool },
}

impl Credential {
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey { key: key.into() }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::ApiKey { .. } => f.write_str("ApiKey(***)"),
            Self::OAuth { connected, .. } => f
                .debug_struct("OAuth")
                .field("access_token", &"***")
                .field("connected", connected)
                .finish(),
        }
    }
}

/// Everything needed to address one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    /// Model id; blank means the provider default.
    pub model: String,
    pub credential: Credential,
    /// Overrides the provider's default base URL. Required for
    /// [`Provider::Custom`], where it may also be the full endpoint.
    pub base_url: Option<String>,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl ProviderConfig {
    pub fn new(provider: Provider, model: impl Into<String>, credential: Credential) -> Self {
        Self {
            provider,
            model: model.into(),
            credential,
            base_url: None,
            headers: Vec::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Fill in defaults and check that the provider is actually reachable
    /// with what was supplied.
    pub fn resolve(&self) -> Result<ResolvedEndpoint> {
        let provider = self.provider;

        let model = match self.model.trim() {
            "" => provider.default_model().ok_or_else(|| {
                AgentError::configuration(format!("no model configured for {provider}"))
            })?,
            model => model,
        }
        .to_owned();

        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .or(provider.default_base_url())
            .ok_or_else(|| {
                AgentError::configuration(format!("no endpoint configured for {provider}"))
            })?
            .trim_end_matches('/')
            .to_owned();

        let url = match provider {
            Provider::OpenAi => format!("{base_url}/chat/completions"),
            Provider::Custom if base_url.ends_with("/chat/completions") => base_url,
            Provider::Custom => format!("{base_url}/chat/completions"),
            Provider::Anthropic => format!("{base_url}/v1/messages"),
            Provider::Google => format!("{base_url}/v1beta/models/{model}:generateContent"),
        };

        let mut headers = self.auth_headers()?;
        if provider == Provider::Anthropic {
            headers.push(("anthropic-version".into(), ANTHROPIC_VERSION.into()));
        }
        headers.extend(self.headers.iter().cloned());

        Ok(ResolvedEndpoint {
            provider,
            model,
            url,
            headers,
        })
    }

    fn auth_headers(&self) -> Result<Vec<(String, String)>> {
        let provider = self.provider;
        let secret = match &self.credential {
            Credential::None if provider == Provider::Custom => return Ok(Vec::new()),
            Credential::None => {
                return Err(AgentError::configuration(format!(
                    "missing API key for {provider}"
                )));
            }
            Credential::ApiKey { key } if key.trim().is_empty() => {
                return Err(AgentError::configuration(format!(
                    "missing API key for {provider}"
                )));
            }
            Credential::ApiKey { key } => Secret::Key(key.trim()),
            Credential::OAuth {
                access_token,
                connected,
            } => {
                if !connected || access_token.trim().is_empty() {
                    return Err(AgentError::configuration(format!(
                        "{provider} account is not connected"
                    )));
                }
                Secret::Token(access_token.trim())
            }
        };

        let headers = match (provider, secret) {
            (Provider::Anthropic, Secret::Key(key)) => vec![("x-api-key".into(), key.into())],
            (Provider::Anthropic, Secret::Token(token)) => vec![
                ("authorization".into(), format!("Bearer {token}")),
                ("anthropic-beta".into(), ANTHROPIC_OAUTH_BETA.into()),
            ],
            (Provider::Google, Secret::Key(key)) => vec![("x-goog-api-key".into(), key.into())],
            (_, Secret::Key(value) | Secret::Token(value)) => {
                vec![("authorization".into(), format!("Bearer {value}"))]
            }
        };
        Ok(headers)
    }
}

enum Secret<'a> {
    Key(&'a str),
    Token(&'a str),
}

pub(crate) const ANTHROPIC_VERSION: &str = "2023-06-01";
pub(crate) const ANTHROPIC_OAUTH_BETA: &str = "oauth-2025-04-20";

/// A fully resolved request target.
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint {
    pub provider: Provider,
    pub model: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}
