use crate::types::ProviderKind;

// ---------------------------------------------------------------------------
// Environment variable sniffing
// ---------------------------------------------------------------------------

/// Provider-specific environment variables, in lookup order.
pub fn provider_env_candidates(kind: &ProviderKind) -> &'static [&'static str] {
    match kind {
        ProviderKind::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        ProviderKind::Groq => &["GROQ_API_KEY"],
        ProviderKind::OpenAi => &["OPENAI_API_KEY"],
        ProviderKind::Anthropic => &["ANTHROPIC_API_KEY"],
        ProviderKind::Ollama | ProviderKind::Other(_) => &[],
    }
}

/// Resolve an API key for a provider. Resolution order:
/// 1. Explicit key from the config file (trimmed, ignored if empty)
/// 2. Provider-specific environment variable(s), read through `lookup`
pub(crate) fn resolve_with(
    kind: &ProviderKind,
    explicit: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    if let Some(raw) = explicit {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_owned());
        }
    }

    for &env_var in provider_env_candidates(kind) {
        if let Some(val) = lookup(env_var) {
            let val = val.trim();
            if !val.is_empty() {
                return Some(val.to_owned());
            }
        }
    }

    None
}
