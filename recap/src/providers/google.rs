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

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Generative AI (Gemini API key) provider.
///
/// The only backend that can take the source URL as native video input.
pub struct GeminiProvider {
    core: ProviderCore,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig, transport: Arc<dyn Transport>) -> Self {
        let capabilities = ProviderCapabilities {
            supports_video_input: true,
            default_timeout: Duration::from_secs(60),
            max_tokens: Some(8_192),
            ..Default::default()
        };
        Self {
            core: ProviderCore::new(config, GEMINI_BASE_URL, capabilities, transport),
        }
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.core.base_url, self.core.config.model
        )
    }

    fn build_request(&self, request: &ProcessingRequest) -> Result<HttpRequest, Failure> {
        let prompt = build_prompt(request, self.core.config.setting_str("system_prompt"))
            .map_err(|e| self.core.fail(e))?;

        let mut parts = Vec::new();
        if let Some(uri) = prompt.video_url {
            parts.push(Part {
                text: None,
                file_data: Some(FileData {
                    mime_type: "video/*".into(),
                    file_uri: uri,
                }),
            });
        }
        parts.push(Part {
            text: Some(prompt.user),
            file_data: None,
        });

        let temperature = self.core.effective_temperature(request);
        let max_output_tokens = self.core.effective_max_tokens(request);
        let generation_config = if temperature.is_none() && max_output_tokens.is_none() {
            None
        } else {
            Some(GenerationConfig {
                temperature,
                max_output_tokens,
            })
        };

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".into(),
                parts,
            }],
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: Some(prompt.system),
                    file_data: None,
                }],
            },
            generation_config,
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| self.core.fail(Failure::invalid_config(e.to_string())))?;

        Ok(HttpRequest::post(self.generate_url(), body, self.core.effective_timeout(request))
            .header("x-goog-api-key", self.core.config.credential.expose()))
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.core.config.model
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.core.capabilities.clone()
    }

    fn validate_config(&self) -> bool {
        !self.core.config.model.trim().is_empty()
            && credential_looks_valid(&ProviderKind::Gemini, &self.core.config.credential)
    }

    async fn process(&self, request: &ProcessingRequest) -> Result<Completion, Failure> {
        self.core.check_request(request)?;
        let http = self.build_request(request)?;
        let started = Instant::now();
        let resp = self.core.send(http, request).await?;

        let parsed: GenerateContentResponse =
            parse_body(&resp.body).map_err(|e| self.core.fail(e))?;
        if parsed.candidates.is_empty() {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".into());
            return Err(self.core.fail(Failure::malformed(format!(
                "response has no candidates ({})",
                reason
            ))));
        }
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default();
        let content = require_text(Some(text)).map_err(|e| self.core.fail(e))?;
        Ok(self.core.completion(content, started.elapsed()))
    }

    async fn list_models(&self) -> Vec<String> {
        static_models_for(&ProviderKind::Gemini)
    }
}
