//! Turns a request into the instruction/material pair every provider sends.

use crate::failure::Failure;
use crate::types::ProcessingRequest;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a precise assistant that turns video content into well-structured Markdown notes.";

pub const DEFAULT_SUMMARY_PROMPT: &str = "Summarize the following video. Start with a one-paragraph overview, then list the key points as bullets, then any notable quotes or action items. Use Markdown headings.";

/// Provider-agnostic prompt. Identical requests always yield identical prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    /// The full user message.
    pub user: String,
    /// Set when the URL travels as native video input instead of text.
    pub video_url: Option<String>,
}

/// Build the prompt for `request`.
///
/// The custom prompt, when given, replaces the default summary instruction.
/// Material is the transcript if present, otherwise a reference to the source URL.
/// With `video_input` the URL always travels as `video_url` and never as text.
pub fn build_prompt(
    request: &ProcessingRequest,
    system_override: Option<&str>,
) -> Result<Prompt, Failure> {
    let instruction = request.custom_prompt();
    let transcript = request.transcript();
    let url = request.source_url();

    if instruction.is_none() && transcript.is_none() && url.is_none() {
        return Err(Failure::invalid_config(
            "request has no transcript, source URL or prompt",
        ));
    }

    if request.video_input && url.is_none() {
        return Err(Failure::invalid_config("video input requires a source URL"));
    }

    let mut user = instruction.unwrap_or(DEFAULT_SUMMARY_PROMPT).to_string();
    let video_url = url.filter(|_| request.video_input).map(str::to_string);
    let text_url = if video_url.is_some() { None } else { url };
    match (transcript, text_url) {
        (Some(t), Some(u)) => {
            user.push_str(&format!("\n\nSource: {}\n\nTranscript:\n{}", u, t));
        }
        (Some(t), None) => {
            user.push_str(&format!("\n\nTranscript:\n{}", t));
        }
        (None, Some(u)) => {
            user.push_str(&format!("\n\nVideo: {}", u));
        }
        (None, None) => {}
    }

    Ok(Prompt {
        system: system_override.unwrap_or(DEFAULT_SYSTEM_PROMPT).to_string(),
        user,
        video_url,
    })
}
