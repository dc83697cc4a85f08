use crate::types::ProviderKind;

/// Built-in model catalog per backend, used when a backend offers no listing endpoint
/// or the listing call fails.
pub fn static_models_for(kind: &ProviderKind) -> Vec<String> {
    let ids: &[&str] = match kind {
        ProviderKind::Gemini => &[
            "gemini-2.5-pro",
            "gemini-2.5-flash",
            "gemini-2.5-flash-lite",
            "gemini-2.0-flash",
            "gemini-2.0-flash-lite",
            "gemini-1.5-pro",
            "gemini-1.5-flash",
        ],
        ProviderKind::Groq => &[
            "llama-3.3-70b-versatile",
            "llama-3.1-8b-instant",
            "meta-llama/llama-4-scout-17b-16e-instruct",
            "openai/gpt-oss-120b",
            "openai/gpt-oss-20b",
            "qwen/qwen3-32b",
            "moonshotai/kimi-k2-instruct",
        ],
        ProviderKind::OpenAi => &[
            "gpt-4.1",
            "gpt-4.1-mini",
            "gpt-4.1-nano",
            "gpt-4o",
            "gpt-4o-mini",
            "o4-mini",
        ],
        ProviderKind::Anthropic => &[
            "claude-sonnet-4-5",
            "claude-haiku-4-5",
            "claude-opus-4-1",
            "claude-sonnet-4-20250514",
            "claude-3-7-sonnet-latest",
            "claude-3-5-haiku-latest",
        ],
        ProviderKind::Ollama => &["llama3.2", "llama3.1", "qwen2.5", "mistral", "gemma2"],
        ProviderKind::Other(_) => &[],
    };
    ids.iter().map(|s| s.to_string()).collect()
}
