mod doctor;
mod summarize;

use clap::{Parser, Subcommand, ValueEnum};
use recap::{AppConfig, ConfigManager, Orchestrator};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recap", version, about = "Summarize videos and transcripts with any AI provider")]
struct Cli {
    /// Config file (default: ~/.recap/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Race all providers, first success wins
    Parallel,
    /// Try providers one by one in config order
    Sequential,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a video URL and/or a transcript file
    Summarize {
        /// Source video URL
        #[arg(short, long)]
        url: Option<String>,

        /// Transcript file
        #[arg(short, long)]
        transcript: Option<PathBuf>,

        /// Instruction replacing the default summary prompt
        #[arg(short, long)]
        prompt: Option<String>,

        #[arg(short, long, value_enum, default_value = "parallel")]
        mode: Mode,

        /// Re-run the providers one by one if the parallel race fails
        #[arg(long)]
        fallback: bool,

        /// Send the URL as native video input (providers without support are skipped)
        #[arg(long)]
        video: bool,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List models per configured provider
    Models,

    /// Show the configured providers and their capabilities
    Providers {
        #[arg(long)]
        json: bool,
    },

    /// Validate provider configs and credentials offline
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recap=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Summarize {
            url,
            transcript,
            prompt,
            mode,
            fallback,
            video,
            temperature,
            max_tokens,
            json,
        } => {
            let mode = match mode {
                Mode::Parallel => recap::ProcessMode::Parallel {
                    fallback: fallback || config.fallback,
                },
                Mode::Sequential => recap::ProcessMode::Sequential,
            };
            let args = summarize::SummarizeArgs {
                url,
                transcript,
                prompt,
                mode,
                video,
                temperature,
                max_tokens,
                json,
            };
            let orchestrator = build_orchestrator(config)?;
            summarize::run_summarize(&orchestrator, args).await?;
        }
        Commands::Models => {
            doctor::run_models(&build_orchestrator(config)?).await?;
        }
        Commands::Providers { json } => {
            doctor::run_providers(&build_orchestrator(config)?, json)?;
        }
        Commands::Check => {
            doctor::run_check(&config)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let manager = match path {
        Some(path) => ConfigManager::new(path),
        None => ConfigManager::default_path(),
    };
    manager.load()
}

fn build_orchestrator(config: AppConfig) -> anyhow::Result<Orchestrator> {
    let orchestrator = Orchestrator::builder()
        .with_configs(config.providers)
        .with_retry_policy(config.retry)
        .build()?;
    Ok(orchestrator)
}
