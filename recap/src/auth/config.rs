use super::Credential;
use super::sniff;
use crate::types::{ProviderConfig, RetryPolicy};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Providers in priority order (first = tried first in sequential mode).
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Default retry policy for providers without their own.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Fall back to the sequential chain when a parallel race fails entirely.
    #[serde(default)]
    pub fallback: bool,
}

impl AppConfig {
    /// Fill blank credentials through `lookup`, keyed by environment variable name.
    fn resolve_credentials_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for provider in &mut self.providers {
            if !provider.kind.requires_credential() {
                continue;
            }
            let explicit = provider.credential.expose().to_string();
            if let Some(key) = sniff::resolve_with(&provider.kind, Some(&explicit), &lookup) {
                provider.credential = Credential::new(key);
            }
        }
    }
}

/// Reads the config file from a fixed location.
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager with a custom path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a config manager with the default path (~/.recap/config.json).
    pub fn default_path() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".recap").join("config.json"))
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and parse the config, then resolve missing credentials from the environment.
    pub fn load(&self) -> anyhow::Result<AppConfig> {
        self.load_with(|name| std::env::var(name).ok())
    }

    fn load_with(&self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<AppConfig> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading config {}", self.path.display()))?;
        let mut cfg: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", self.path.display()))?;
        cfg.resolve_credentials_with(lookup);
        tracing::debug!(
            path = %self.path.display(),
            providers = cfg.providers.len(),
            "loaded config"
        );
        Ok(cfg)
    }
}
