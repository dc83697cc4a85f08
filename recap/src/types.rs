use crate::auth::Credential;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Provider identity & configuration
// ---------------------------------------------------------------------------

/// Which backend service a provider entry talks to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Gemini,
    Groq,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
    /// Anything the factory does not recognize; rejected at build time.
    #[serde(untagged)]
    Other(String),
}

impl ProviderKind {
    pub fn as_str(&self) -> &str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Other(name) => name,
        }
    }

    /// Whether requests to this backend need a credential at all.
    pub fn requires_credential(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

/// Declarative description of one backend, as read from the configuration store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Unique name used in results, logs and `remove_provider`.
    pub display_name: String,
    #[serde(default)]
    pub credential: Credential,
    pub model: String,
    /// Per-call timeout override in seconds; fractions are kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
    /// Provider-specific extras (`base_url`, `system_prompt`, `max_tokens`, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_settings: HashMap<String, serde_json::Value>,
    /// Retry policy for this provider only; the orchestrator default applies otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, display_name: &str, credential: &str, model: &str) -> Self {
        Self {
            kind,
            display_name: display_name.to_string(),
            credential: Credential::new(credential),
            model: model.to_string(),
            timeout_secs: None,
            custom_settings: HashMap::new(),
            retry: None,
        }
    }

    pub fn with_setting(mut self, key: &str, value: serde_json::Value) -> Self {
        self.custom_settings.insert(key.to_string(), value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// The configured timeout, if it is a positive duration.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .filter(|d| !d.is_zero())
    }

    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.custom_settings
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn setting_u32(&self, key: &str) -> Option<u32> {
        self.custom_settings
            .get(key)
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
    }
}

/// What a provider instance supports. Produced once per instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub supports_transcript_input: bool,
    pub supports_custom_prompt: bool,
    pub supports_max_tokens: bool,
    pub supports_temperature: bool,
    pub supports_cancellation: bool,
    /// Accepts the source URL as native video input rather than as text.
    pub supports_video_input: bool,
    #[serde(with = "secs")]
    pub default_timeout: Duration,
    /// Output token ceiling, if the backend has one.
    pub max_tokens: Option<u32>,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            supports_transcript_input: true,
            supports_custom_prompt: true,
            supports_max_tokens: true,
            supports_temperature: true,
            supports_cancellation: true,
            supports_video_input: false,
            default_timeout: Duration::from_secs(60),
            max_tokens: None,
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
    /// Upper bound of the random jitter, as a fraction of the computed delay.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            max_delay_ms: 10_000,
            jitter_fraction: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Attempt budget, never below one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

// ---------------------------------------------------------------------------
// Requests & results
// ---------------------------------------------------------------------------

/// One content-processing request.
#[derive(Debug, Clone, Default)]
pub struct ProcessingRequest {
    pub source_url: Option<String>,
    pub transcript: Option<String>,
    pub custom_prompt: Option<String>,
    /// Sampling temperature in `[0, 2]`.
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Per-call budget; only wins over the provider timeout when shorter.
    pub timeout: Option<Duration>,
    /// Send the source URL as native video input instead of referencing it in text.
    pub video_input: bool,
    pub cancellation: CancellationToken,
}

impl ProcessingRequest {
    pub fn from_transcript(transcript: impl Into<String>) -> Self {
        Self {
            transcript: Some(transcript.into()),
            ..Self::default()
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            source_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_video_input(mut self) -> Self {
        self.video_input = true;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn source_url(&self) -> Option<&str> {
        non_blank(self.source_url.as_deref())
    }

    pub fn transcript(&self) -> Option<&str> {
        non_blank(self.transcript.as_deref())
    }

    pub fn custom_prompt(&self) -> Option<&str> {
        non_blank(self.custom_prompt.as_deref())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// A successful summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub provider_name: String,
    pub model_name: String,
    pub took_ms: u64,
}

/// How the orchestrator spreads a request over its providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessMode {
    /// Race every provider, first success wins. With `fallback`, a total failure
    /// is retried once through the sequential chain.
    Parallel { fallback: bool },
    /// Try providers one at a time in configuration order.
    Sequential,
}

/// Introspection entry for one active provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    pub capabilities: ProviderCapabilities,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_known_and_unknown() {
        let k: ProviderKind = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(k, ProviderKind::OpenAi);
        let k: ProviderKind = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(k, ProviderKind::Gemini);
        let k: ProviderKind = serde_json::from_str("\"mistral\"").unwrap();
        assert_eq!(k, ProviderKind::Other("mistral".into()));
    }

    #[test]
    fn provider_config_from_json() {
        let cfg: ProviderConfig = serde_json::from_str(
            r#"{
                "kind": "groq",
                "display_name": "Groq",
                "credential": "gsk_abc",
                "model": "llama-3.3-70b-versatile",
                "timeout_secs": 20,
                "custom_settings": { "max_tokens": 2048 }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.kind, ProviderKind::Groq);
        assert_eq!(cfg.credential.expose(), "gsk_abc");
        assert_eq!(cfg.request_timeout(), Some(Duration::from_secs(20)));
        assert_eq!(cfg.setting_u32("max_tokens"), Some(2048));
        assert!(cfg.retry.is_none());
    }

    #[test]
    fn sub_second_timeouts_survive() {
        let cfg = ProviderConfig::new(ProviderKind::Groq, "Groq", "gsk_abc", "m")
            .with_timeout(Duration::from_millis(800));
        assert_eq!(cfg.request_timeout(), Some(Duration::from_millis(800)));

        let cfg: ProviderConfig = serde_json::from_str(
            r#"{"kind": "ollama", "display_name": "L", "model": "m", "timeout_secs": 1.5}"#,
        )
        .unwrap();
        assert_eq!(cfg.request_timeout(), Some(Duration::from_millis(1_500)));

        let zero = ProviderConfig::new(ProviderKind::Groq, "Groq", "gsk_abc", "m")
            .with_timeout(Duration::ZERO);
        assert_eq!(zero.request_timeout(), None);
    }

    #[test]
    fn blank_fields_are_treated_as_absent() {
        let req = ProcessingRequest::from_transcript("   ").with_custom_prompt("");
        assert!(req.transcript().is_none());
        assert!(req.custom_prompt().is_none());
    }

    #[test]
    fn retry_policy_attempts_floor() {
        assert_eq!(RetryPolicy::default().with_max_attempts(0).attempts(), 1);
    }
}
