use recap::{AppConfig, Orchestrator, ReqwestTransport, build_provider, credential_looks_valid};
use std::sync::Arc;

/// Offline sanity check of every configured provider.
pub fn run_check(config: &AppConfig) -> anyhow::Result<()> {
    if config.providers.is_empty() {
        println!("No providers configured.");
        return Ok(());
    }

    let transport = Arc::new(ReqwestTransport::new());
    let mut healthy = 0;
    for provider_config in &config.providers {
        let label = format!("{} ({})", provider_config.display_name, provider_config.kind.as_str());
        match build_provider(provider_config.clone(), transport.clone()) {
            Ok(provider) if provider.validate_config() => {
                healthy += 1;
                println!("  {:<28} ✅ {}", label, provider.model());
            }
            Ok(_) => {
                let reason = if provider_config.kind.requires_credential()
                    && !credential_looks_valid(&provider_config.kind, &provider_config.credential)
                {
                    "credential format looks wrong"
                } else {
                    "config incomplete"
                };
                println!("  {:<28} ⚠️  {}", label, reason);
            }
            Err(failure) => println!("  {:<28} ❌ {}", label, failure.message),
        }
    }

    println!("\n{}/{} providers look usable.", healthy, config.providers.len());
    if healthy == 0 {
        anyhow::bail!("no usable provider");
    }
    Ok(())
}

pub async fn run_models(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    for (provider, models) in orchestrator.list_models().await {
        println!("{}:", provider);
        if models.is_empty() {
            println!("  (no models listed)");
        }
        for model in models {
            println!("  {}", model);
        }
    }
    Ok(())
}

pub fn run_providers(orchestrator: &Orchestrator, json: bool) -> anyhow::Result<()> {
    let providers = orchestrator.provider_info();
    if json {
        println!("{}", serde_json::to_string_pretty(&providers)?);
        return Ok(());
    }
    for info in providers {
        let caps = &info.capabilities;
        let video = if caps.supports_video_input { ", video" } else { "" };
        let ceiling = caps
            .max_tokens
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<20} {:<10} {:<32} timeout {:.1}s, max tokens {}{}",
            info.name,
            info.kind.as_str(),
            info.model,
            caps.default_timeout.as_secs_f64(),
            ceiling,
            video
        );
    }
    Ok(())
}
