use anyhow::Context;
use recap::{Failure, Orchestrator, ProcessMode, ProcessingRequest};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub struct SummarizeArgs {
    pub url: Option<String>,
    pub transcript: Option<PathBuf>,
    pub prompt: Option<String>,
    pub mode: ProcessMode,
    pub video: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub json: bool,
}

/// Run one summarization and print the result to stdout.
pub async fn run_summarize(orchestrator: &Orchestrator, args: SummarizeArgs) -> anyhow::Result<()> {
    let transcript = match &args.transcript {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading transcript {}", path.display()))?,
        ),
        None => None,
    };

    let token = CancellationToken::new();
    let request = ProcessingRequest {
        source_url: args.url,
        transcript,
        custom_prompt: args.prompt,
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        video_input: args.video,
        cancellation: token.clone(),
        ..Default::default()
    };

    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling");
            ctrl_c.cancel();
        }
    });

    let outcome = orchestrator.process(&request, args.mode).await;
    token.cancel();

    match outcome {
        Ok(done) if args.json => {
            println!("{}", serde_json::to_string_pretty(&done)?);
            Ok(())
        }
        Ok(done) => {
            println!("{}", done.content);
            eprintln!(
                "\n-- {} ({}) in {} ms",
                done.provider_name, done.model_name, done.took_ms
            );
            Ok(())
        }
        Err(failure) => {
            report_failure(&failure);
            Err(anyhow::anyhow!("summarization failed: {}", failure.kind))
        }
    }
}

fn report_failure(failure: &Failure) {
    eprintln!("❌ {}", failure.kind);
    eprintln!("   {}", failure.kind.hint());
    if failure.causes.is_empty() {
        eprintln!("   {}", failure);
    }
    for cause in &failure.causes {
        eprintln!(
            "   - {}: {} ({})",
            cause.provider_name.as_deref().unwrap_or("?"),
            cause.kind,
            cause.message
        );
    }
}
