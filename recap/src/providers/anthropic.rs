use super::{Provider, ProviderCore, parse_body, require_text};
use crate::auth::credential_looks_valid;
use crate::failure::Failure;
use crate::models::static_models_for;
use crate::prompt::build_prompt;
use crate::transport::{HttpRequest, Transport};
use crate::types::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4_096;

pub struct AnthropicProvider {
    core: ProviderCore,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig, transport: Arc<dyn Transport>) -> Self {
        let capabilities = ProviderCapabilities {
            default_timeout: Duration::from_secs(60),
            max_tokens: Some(8_192),
            ..Default::default()
        };
        Self {
            core: ProviderCore::new(config, ANTHROPIC_BASE_URL, capabilities, transport),
        }
    }

    fn build_request(&self, request: &ProcessingRequest) -> Result<HttpRequest, Failure> {
        let prompt = build_prompt(request, self.core.config.setting_str("system_prompt"))
            .map_err(|e| self.core.fail(e))?;
        let body = MessagesRequest {
            model: self.core.config.model.clone(),
            // max_tokens is mandatory on this API
            max_tokens: self
                .core
                .effective_max_tokens(request)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            system: prompt.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt.user,
            }],
            // Anthropic accepts [0, 1] only
            temperature: self
                .core
                .effective_temperature(request)
                .map(|t| t.clamp(0.0, 1.0)),
            stream: false,
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| self.core.fail(Failure::invalid_config(e.to_string())))?;

        let version = self
            .core
            .config
            .setting_str("anthropic_version")
            .unwrap_or(ANTHROPIC_VERSION);
        Ok(HttpRequest::post(
            format!("{}/messages", self.core.base_url),
            body,
            self.core.effective_timeout(request),
        )
        .header("x-api-key", self.core.config.credential.expose())
        .header("anthropic-version", version))
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<AnthropicContentResp>,
}

#[derive(Deserialize)]
struct AnthropicContentResp {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.core.config.model
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.core.capabilities.clone()
    }

    fn validate_config(&self) -> bool {
        !self.core.config.model.trim().is_empty()
            && credential_looks_valid(&ProviderKind::Anthropic, &self.core.config.credential)
    }

    async fn process(&self, request: &ProcessingRequest) -> Result<Completion, Failure> {
        self.core.check_request(request)?;
        let http = self.build_request(request)?;
        let started = Instant::now();
        let resp = self.core.send(http, request).await?;

        let msg: MessagesResponse = parse_body(&resp.body).map_err(|e| self.core.fail(e))?;
        let text: String = msg
            .content
            .into_iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n");
        let content = require_text(Some(text)).map_err(|e| self.core.fail(e))?;
        Ok(self.core.completion(content, started.elapsed()))
    }

    async fn list_models(&self) -> Vec<String> {
        static_models_for(&ProviderKind::Anthropic)
    }
}
