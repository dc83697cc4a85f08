use super::Provider;
use super::anthropic::AnthropicProvider;
use super::compatible::OpenAiCompatibleProvider;
use super::google::GeminiProvider;
use crate::failure::Failure;
use crate::transport::Transport;
use crate::types::{ProviderConfig, ProviderKind};
use std::sync::Arc;

/// Build a provider from its config entry. Pure: no network or file access.
pub fn build_provider(
    config: ProviderConfig,
    transport: Arc<dyn Transport>,
) -> Result<Arc<dyn Provider>, Failure> {
    let name = config.display_name.trim().to_string();
    if name.is_empty() {
        return Err(Failure::invalid_config("provider display name is empty"));
    }
    if config.model.trim().is_empty() {
        return Err(Failure::invalid_config("model is empty").with_provider(name));
    }
    if config.kind.requires_credential() && config.credential.is_empty() {
        return Err(Failure::invalid_config("credential is missing").with_provider(name));
    }
    if let Some(secs) = config.timeout_secs {
        if config.request_timeout().is_none() {
            return Err(Failure::invalid_config(format!(
                "timeout_secs must be a positive number of seconds, got {}",
                secs
            ))
            .with_provider(name));
        }
    }
    if let Some(base_url) = config.setting_str("base_url") {
        if let Err(e) = url::Url::parse(base_url) {
            return Err(
                Failure::invalid_config(format!("invalid base_url {:?}: {}", base_url, e))
                    .with_provider(name),
            );
        }
    }

    let provider: Arc<dyn Provider> = match config.kind.clone() {
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(config, transport)),
        ProviderKind::Groq | ProviderKind::OpenAi | ProviderKind::Ollama => {
            Arc::new(OpenAiCompatibleProvider::new(config, transport))
        }
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config, transport)),
        ProviderKind::Other(kind) => {
            return Err(
                Failure::invalid_config(format!("unknown provider kind: {}", kind))
                    .with_provider(name),
            );
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureKind;
    use crate::transport::ReqwestTransport;
    use serde_json::json;

    fn transport() -> Arc<dyn Transport> {
        Arc::new(ReqwestTransport::new())
    }

    #[test]
    fn builds_each_known_kind() {
        for (kind, key) in [
            (ProviderKind::Gemini, "AIza-x"),
            (ProviderKind::Groq, "gsk_x"),
            (ProviderKind::OpenAi, "sk-x"),
            (ProviderKind::Anthropic, "sk-ant-x"),
            (ProviderKind::Ollama, ""),
        ] {
            let cfg = ProviderConfig::new(kind.clone(), "p", key, "m");
            let p = build_provider(cfg, transport()).unwrap();
            assert_eq!(p.kind(), kind);
            assert_eq!(p.name(), "p");
            assert_eq!(p.model(), "m");
        }
    }

    #[test]
    fn unknown_kind_is_invalid_config() {
        let cfg = ProviderConfig::new(ProviderKind::Other("mistral".into()), "M", "k", "m");
        let err = build_provider(cfg, transport()).err().unwrap();
        assert_eq!(err.kind, FailureKind::InvalidConfig);
        assert!(err.message.contains("mistral"));
    }

    #[test]
    fn rejects_blank_fields_and_bad_urls() {
        let blank_model = ProviderConfig::new(ProviderKind::Groq, "G", "gsk_x", " ");
        assert!(build_provider(blank_model, transport()).is_err());

        let blank_name = ProviderConfig::new(ProviderKind::Groq, "", "gsk_x", "m");
        assert!(build_provider(blank_name, transport()).is_err());

        let no_key = ProviderConfig::new(ProviderKind::Groq, "G", "", "m");
        assert!(build_provider(no_key, transport()).is_err());

        let bad_url = ProviderConfig::new(ProviderKind::Ollama, "L", "", "m")
            .with_setting("base_url", json!("not a url"));
        assert_eq!(
            build_provider(bad_url, transport()).err().unwrap().kind,
            FailureKind::InvalidConfig
        );
    }

    #[test]
    fn rejects_zero_or_negative_timeouts() {
        let zero = ProviderConfig::new(ProviderKind::Groq, "G", "gsk_x", "m")
            .with_timeout(std::time::Duration::ZERO);
        let err = build_provider(zero, transport()).err().unwrap();
        assert_eq!(err.kind, FailureKind::InvalidConfig);
        assert!(err.message.contains("timeout_secs"));

        let mut negative = ProviderConfig::new(ProviderKind::Ollama, "L", "", "m");
        negative.timeout_secs = Some(-1.0);
        assert!(build_provider(negative, transport()).is_err());

        let ok = ProviderConfig::new(ProviderKind::Groq, "G", "gsk_x", "m")
            .with_timeout(std::time::Duration::from_millis(250));
        assert!(build_provider(ok, transport()).is_ok());
    }
}
