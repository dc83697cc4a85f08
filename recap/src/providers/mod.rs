pub mod anthropic;
pub mod compatible;
pub mod factory;
pub mod google;
pub mod retry;
pub mod sanitize;

use crate::failure::{Failure, FailureKind};
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::types::{
    Completion, ProcessingRequest, ProviderCapabilities, ProviderConfig, ProviderKind,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Contract every backend implements.
///
/// Implementations are stateless per call; one instance is shared by all
/// concurrent calls of an orchestrator.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Display name, unique within an orchestrator.
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    fn model(&self) -> &str;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Offline credential/config sanity check. Never touches the network.
    fn validate_config(&self) -> bool;

    /// Issue exactly one request to the backend and classify the outcome.
    async fn process(&self, request: &ProcessingRequest) -> Result<Completion, Failure>;

    /// Best-effort model listing; failures degrade to a static or empty list.
    async fn list_models(&self) -> Vec<String>;
}

/// State shared by the concrete providers: config, endpoint and transport.
pub(crate) struct ProviderCore {
    pub config: ProviderConfig,
    pub base_url: String,
    pub capabilities: ProviderCapabilities,
    pub transport: Arc<dyn Transport>,
}

impl ProviderCore {
    pub fn new(
        config: ProviderConfig,
        default_base_url: &str,
        mut capabilities: ProviderCapabilities,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let base_url = config
            .setting_str("base_url")
            .unwrap_or(default_base_url)
            .trim_end_matches('/')
            .to_string();
        if let Some(timeout) = config.request_timeout() {
            capabilities.default_timeout = timeout;
        }
        Self {
            config,
            base_url,
            capabilities,
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.display_name
    }

    /// Local capability check run before anything is sent.
    pub fn check_request(&self, request: &ProcessingRequest) -> Result<(), Failure> {
        let caps = &self.capabilities;
        if request.video_input && !caps.supports_video_input {
            return Err(self.fail(Failure::invalid_config(
                "provider does not accept video input",
            )));
        }
        if request.custom_prompt().is_some() && !caps.supports_custom_prompt {
            return Err(self.fail(Failure::invalid_config(
                "provider does not accept custom prompts",
            )));
        }
        if request.transcript().is_some() && !caps.supports_transcript_input {
            return Err(self.fail(Failure::invalid_config(
                "provider does not accept transcripts",
            )));
        }
        Ok(())
    }

    /// Provider timeout, shortened by the request's own budget when that is smaller.
    pub fn effective_timeout(&self, request: &ProcessingRequest) -> Duration {
        let provider = self.capabilities.default_timeout;
        match request.timeout {
            Some(t) if t < provider => t,
            _ => provider,
        }
    }

    /// Requested (or configured) output ceiling, clamped to the backend's limit.
    pub fn effective_max_tokens(&self, request: &ProcessingRequest) -> Option<u32> {
        if !self.capabilities.supports_max_tokens {
            return None;
        }
        let wanted = request
            .max_tokens
            .or_else(|| self.config.setting_u32("max_tokens"));
        match (wanted, self.capabilities.max_tokens) {
            (Some(w), Some(cap)) => Some(w.min(cap)),
            (w, _) => w,
        }
    }

    pub fn effective_temperature(&self, request: &ProcessingRequest) -> Option<f32> {
        if !self.capabilities.supports_temperature {
            return None;
        }
        request.temperature
    }

    /// Send one request and turn anything but a 2xx into a classified failure.
    pub async fn send(
        &self,
        http: HttpRequest,
        request: &ProcessingRequest,
    ) -> Result<HttpResponse, Failure> {
        let resp = self
            .transport
            .send(http, &request.cancellation)
            .await
            .map_err(|e| self.fail(classify_transport(e)))?;
        if resp.is_success() {
            return Ok(resp);
        }
        let kind = classify_status(resp.status, &resp.body);
        let message = format!(
            "HTTP {}: {}",
            resp.status,
            sanitize::clean_error_body(&resp.body)
        );
        Err(self.fail(Failure::new(kind, message).with_retry_after(parse_retry_after(&resp))))
    }

    pub fn fail(&self, failure: Failure) -> Failure {
        failure.with_provider(self.name())
    }

    pub fn completion(&self, content: String, took: Duration) -> Completion {
        Completion {
            content,
            provider_name: self.name().to_string(),
            model_name: self.config.model.clone(),
            took_ms: took.as_millis() as u64,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome classification
// ---------------------------------------------------------------------------

fn is_quota_signal(lower: &str) -> bool {
    [
        "insufficient_quota",
        "exceeded your current quota",
        "billing",
        "credit balance",
        "per day",
        "perday",
    ]
    .iter()
    .any(|s| lower.contains(s))
}

fn is_auth_signal(lower: &str) -> bool {
    [
        "api key not valid",
        "api_key_invalid",
        "invalid api key",
        "incorrect api key",
        "invalid x-api-key",
    ]
    .iter()
    .any(|s| lower.contains(s))
}

fn is_model_signal(lower: &str) -> bool {
    lower.contains("model")
        && ["not found", "does not exist", "decommissioned", "not supported"]
            .iter()
            .any(|s| lower.contains(s))
}

/// Map an HTTP status (and body hints) to a failure kind.
pub fn classify_status(status: u16, body: &str) -> FailureKind {
    let lower = body.to_ascii_lowercase();
    match status {
        401 | 403 => FailureKind::AuthenticationRejected,
        402 => FailureKind::QuotaExhausted,
        429 | 529 if is_quota_signal(&lower) => FailureKind::QuotaExhausted,
        429 | 529 => FailureKind::RateLimited,
        404 => FailureKind::ModelUnavailable,
        408 | 504 => FailureKind::Timeout,
        400..=499 if is_auth_signal(&lower) => FailureKind::AuthenticationRejected,
        400..=499 if is_model_signal(&lower) => FailureKind::ModelUnavailable,
        400..=499 => FailureKind::InvalidConfig,
        500..=599 => FailureKind::NetworkUnreachable,
        _ => FailureKind::MalformedResponse,
    }
}

pub fn classify_transport(err: TransportError) -> Failure {
    match err {
        TransportError::Timeout(_) => Failure::new(FailureKind::Timeout, err.to_string()),
        TransportError::Cancelled => Failure::cancelled(),
        TransportError::Connect(_) | TransportError::Other(_) => {
            Failure::new(FailureKind::NetworkUnreachable, err.to_string())
        }
    }
}

/// `Retry-After` header in seconds, or a `retry-after: N` hint inside the body.
pub fn parse_retry_after(resp: &HttpResponse) -> Option<Duration> {
    if let Some(value) = resp.header("retry-after") {
        if let Some(d) = parse_secs(value) {
            return Some(d);
        }
    }
    let lower = resp.body.to_lowercase();
    for prefix in ["retry-after:", "retry_after:", "retry-after ", "retry_after "] {
        if let Some(pos) = lower.find(prefix) {
            let after = &lower[pos + prefix.len()..];
            let num: String = after
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            if let Some(d) = parse_secs(&num) {
                return Some(d);
            }
        }
    }
    None
}

fn parse_secs(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    // rejects negatives, NaN and values past Duration::MAX
    Duration::try_from_secs_f64(secs).ok()
}

/// Decode a 2xx body; structural mismatches are `MalformedResponse`.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, Failure> {
    serde_json::from_str(body).map_err(|e| Failure::malformed(format!("unexpected response body: {}", e)))
}

/// Trimmed text, or `MalformedResponse` when nothing is left.
pub(crate) fn require_text(text: Option<String>) -> Result<String, Failure> {
    let text = text.unwrap_or_default();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(Failure::malformed("response contained no text"))
    } else {
        Ok(trimmed.to_string())
    }
}
