use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Closed taxonomy every failure path is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    #[error("invalid config")]
    InvalidConfig,
    #[error("authentication rejected")]
    AuthenticationRejected,
    #[error("rate limited")]
    RateLimited,
    #[error("quota exhausted")]
    QuotaExhausted,
    #[error("model unavailable")]
    ModelUnavailable,
    #[error("timeout")]
    Timeout,
    #[error("network unreachable")]
    NetworkUnreachable,
    #[error("malformed response")]
    MalformedResponse,
    #[error("all providers exhausted")]
    AllProvidersExhausted,
}

impl FailureKind {
    /// False for failures that would repeat identically on every attempt.
    pub fn is_retryable(self) -> bool {
        !matches!(
            self,
            FailureKind::InvalidConfig
                | FailureKind::AuthenticationRejected
                | FailureKind::AllProvidersExhausted
        )
    }

    /// Short actionable message for end users.
    pub fn hint(self) -> &'static str {
        match self {
            FailureKind::InvalidConfig => "check the provider settings and the request",
            FailureKind::AuthenticationRejected => "check your API key",
            FailureKind::RateLimited => "the provider is rate limiting requests, try again shortly",
            FailureKind::QuotaExhausted => "the account quota or billing limit has been reached",
            FailureKind::ModelUnavailable => "the configured model is not available",
            FailureKind::Timeout => "the request timed out or was cancelled",
            FailureKind::NetworkUnreachable => "the provider could not be reached",
            FailureKind::MalformedResponse => "the provider returned an unexpected response",
            FailureKind::AllProvidersExhausted => "every configured provider failed",
        }
    }
}

/// A classified failure.
///
/// `causes` is only populated for [`FailureKind::AllProvidersExhausted`] and holds
/// one entry per provider that was tried, in the order they gave up.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}{kind}: {message}{}", provider_prefix(.provider_name), causes_suffix(.causes))]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub provider_name: Option<String>,
    /// Server-provided hint for how long to wait before retrying.
    pub retry_after: Option<Duration>,
    pub causes: Vec<Failure>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider_name: None,
            retry_after: None,
            causes: Vec::new(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidConfig, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedResponse, message)
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Timeout, "cancelled")
    }

    /// Aggregate the failures of every provider that was tried.
    pub fn exhausted(causes: Vec<Failure>) -> Self {
        let message = format!("{} provider(s) failed", causes.len());
        Self {
            causes,
            ..Self::new(FailureKind::AllProvidersExhausted, message)
        }
    }

    pub fn with_provider(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

fn provider_prefix(name: &Option<String>) -> String {
    name.as_ref().map(|n| format!("[{}] ", n)).unwrap_or_default()
}

fn causes_suffix(causes: &[Failure]) -> String {
    causes.iter().map(|c| format!("; {}", c)).collect()
}
