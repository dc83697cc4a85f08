//! OpenAI-compatible `/chat/completions` backends: OpenAI, Groq and Ollama.

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

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Provider that speaks OpenAI-compatible `/chat/completions`.
pub struct OpenAiCompatibleProvider {
    core: ProviderCore,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: ProviderConfig, transport: Arc<dyn Transport>) -> Self {
        let (base_url, capabilities) = defaults_for(&config.kind);
        Self {
            core: ProviderCore::new(config, base_url, capabilities, transport),
        }
    }

    fn chat_completions_url(&self) -> String {
        let base = &self.core.base_url;
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }

    /// Ollama's native tag listing lives beside the OpenAI-compatible `/v1` root.
    fn ollama_tags_url(&self) -> String {
        let root = self.core.base_url.trim_end_matches("/v1");
        format!("{}/api/tags", root)
    }

    fn build_request(&self, request: &ProcessingRequest) -> Result<HttpRequest, Failure> {
        let prompt = build_prompt(request, self.core.config.setting_str("system_prompt"))
            .map_err(|e| self.core.fail(e))?;
        let body = ChatRequest {
            model: self.core.config.model.clone(),
            messages: vec![
                ChatMsg {
                    role: "system",
                    content: prompt.system,
                },
                ChatMsg {
                    role: "user",
                    content: prompt.user,
                },
            ],
            temperature: self.core.effective_temperature(request),
            max_tokens: self.core.effective_max_tokens(request),
            stream: false,
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| self.core.fail(Failure::invalid_config(e.to_string())))?;

        let mut http = HttpRequest::post(
            self.chat_completions_url(),
            body,
            self.core.effective_timeout(request),
        );
        let key = self.core.config.credential.expose();
        if !key.is_empty() {
            http = http.header("authorization", format!("Bearer {}", key));
        }
        Ok(http)
    }
}

fn defaults_for(kind: &ProviderKind) -> (&'static str, ProviderCapabilities) {
    match kind {
        ProviderKind::Groq => (
            GROQ_BASE_URL,
            ProviderCapabilities {
                default_timeout: Duration::from_secs(30),
                max_tokens: Some(8_192),
                ..Default::default()
            },
        ),
        ProviderKind::Ollama => (
            OLLAMA_BASE_URL,
            ProviderCapabilities {
                default_timeout: Duration::from_secs(120),
                max_tokens: None,
                ..Default::default()
            },
        ),
        _ => (
            OPENAI_BASE_URL,
            ProviderCapabilities {
                default_timeout: Duration::from_secs(60),
                max_tokens: Some(16_384),
                ..Default::default()
            },
        ),
    }
}

// ---- Request/response types (OpenAI wire format) ----
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMsg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMsg {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResp,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    content: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> ProviderKind {
        self.core.config.kind.clone()
    }

    fn model(&self) -> &str {
        &self.core.config.model
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.core.capabilities.clone()
    }

    fn validate_config(&self) -> bool {
        !self.core.config.model.trim().is_empty()
            && credential_looks_valid(&self.core.config.kind, &self.core.config.credential)
    }

    async fn process(&self, request: &ProcessingRequest) -> Result<Completion, Failure> {
        self.core.check_request(request)?;
        let http = self.build_request(request)?;
        let started = Instant::now();
        let resp = self.core.send(http, request).await?;

        let chat: ChatResponse = parse_body(&resp.body).map_err(|e| self.core.fail(e))?;
        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        let content = require_text(text).map_err(|e| self.core.fail(e))?;
        Ok(self.core.completion(content, started.elapsed()))
    }

    async fn list_models(&self) -> Vec<String> {
        let kind = &self.core.config.kind;
        if *kind != ProviderKind::Ollama {
            return static_models_for(kind);
        }
        let http = HttpRequest::get(self.ollama_tags_url(), Duration::from_secs(5));
        let cancel = tokio_util::sync::CancellationToken::new();
        match self.core.transport.send(http, &cancel).await {
            Ok(resp) if resp.is_success() => match serde_json::from_str::<TagsResponse>(&resp.body) {
                Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
                Err(e) => {
                    tracing::debug!(provider = self.name(), "unreadable model list: {}", e);
                    static_models_for(kind)
                }
            },
            Ok(resp) => {
                tracing::debug!(provider = self.name(), status = resp.status, "model listing failed");
                static_models_for(kind)
            }
            Err(e) => {
                tracing::debug!(provider = self.name(), "model listing failed: {}", e);
                static_models_for(kind)
            }
        }
    }
}
