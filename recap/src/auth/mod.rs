pub mod config;
pub mod sniff;

use crate::types::ProviderKind;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Credential type
// ---------------------------------------------------------------------------

/// A secret API key. Never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Credential(<empty>)")
        } else {
            f.write_str("Credential([REDACTED])")
        }
    }
}

// ---------------------------------------------------------------------------
// Format heuristics
// ---------------------------------------------------------------------------

/// Offline sanity check of a key's shape for the given backend.
///
/// Only prefixes and lengths are inspected; a key that passes may still be
/// rejected by the service.
pub fn credential_looks_valid(kind: &ProviderKind, credential: &Credential) -> bool {
    let key = credential.expose();
    if key.chars().any(char::is_whitespace) {
        return false;
    }
    match kind {
        // Google API keys are "AIza" followed by 35 url-safe characters.
        ProviderKind::Gemini => key.starts_with("AIza") && key.len() == 39,
        ProviderKind::Groq => key.starts_with("gsk_") && key.len() >= 20,
        ProviderKind::Anthropic => key.starts_with("sk-ant-") && key.len() >= 20,
        ProviderKind::OpenAi => key.starts_with("sk-") && key.len() >= 20,
        ProviderKind::Ollama => true,
        ProviderKind::Other(_) => false,
    }
}
