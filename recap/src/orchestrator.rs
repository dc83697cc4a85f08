use crate::failure::{Failure, FailureKind};
use crate::providers::Provider;
use crate::providers::factory::build_provider;
use crate::providers::retry::execute_with_retry;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::task::JoinSet;
use tokio::time::Instant;

/// One active provider plus the retry policy its calls run under.
#[derive(Clone)]
struct ProviderEntry {
    provider: Arc<dyn Provider>,
    policy: RetryPolicy,
}

impl ProviderEntry {
    fn name(&self) -> &str {
        self.provider.name()
    }
}

/// Dispatches summarization requests over a set of providers, racing them or
/// walking them in order, with per-provider retries.
///
/// The provider set is copy-on-write: every call works on its own snapshot, so
/// [`add_provider`](Self::add_provider) and friends only affect later calls.
pub struct Orchestrator {
    providers: RwLock<Arc<Vec<ProviderEntry>>>,
    default_policy: RetryPolicy,
    transport: Arc<dyn Transport>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Run one request through the providers according to `mode`.
    pub async fn process(
        &self,
        request: &ProcessingRequest,
        mode: ProcessMode,
    ) -> Result<Completion, Failure> {
        let started = Instant::now();
        validate_request(request)?;

        let snapshot = self.snapshot();
        let eligible: Vec<ProviderEntry> = snapshot
            .iter()
            .filter(|e| can_handle(&e.provider.capabilities(), request))
            .cloned()
            .collect();
        if eligible.is_empty() {
            return Err(Failure::invalid_config(
                "no configured provider can handle this request",
            ));
        }
        tracing::debug!(
            providers = eligible.len(),
            skipped = snapshot.len() - eligible.len(),
            ?mode,
            "dispatching request"
        );

        let outcome = match mode {
            ProcessMode::Sequential => run_chain(&eligible, request).await,
            ProcessMode::Parallel { fallback } => match run_race(&eligible, request).await {
                Err(failure)
                    if fallback
                        && failure.kind == FailureKind::AllProvidersExhausted
                        && !request.cancellation.is_cancelled() =>
                {
                    tracing::warn!("parallel race failed, falling back to sequential: {}", failure);
                    run_chain(&eligible, request).await
                }
                other => other,
            },
        };

        match outcome {
            Ok(mut completion) => {
                completion.took_ms = started.elapsed().as_millis() as u64;
                tracing::info!(
                    provider = %completion.provider_name,
                    model = %completion.model_name,
                    took_ms = completion.took_ms,
                    "request succeeded"
                );
                Ok(completion)
            }
            Err(_) if request.cancellation.is_cancelled() => {
                tracing::debug!("request cancelled");
                Err(Failure::cancelled())
            }
            Err(failure) => {
                tracing::warn!("request failed: {}", failure);
                Err(failure)
            }
        }
    }

    /// Models per provider name. Providers that cannot list degrade to empty.
    pub async fn list_models(&self) -> BTreeMap<String, Vec<String>> {
        let snapshot = self.snapshot();
        let listings = futures::future::join_all(snapshot.iter().map(|entry| async move {
            (entry.name().to_string(), entry.provider.list_models().await)
        }))
        .await;
        listings.into_iter().collect()
    }

    pub fn provider_info(&self) -> Vec<ProviderInfo> {
        self.snapshot()
            .iter()
            .map(|e| ProviderInfo {
                name: e.name().to_string(),
                kind: e.provider.kind(),
                model: e.provider.model().to_string(),
                capabilities: e.provider.capabilities(),
            })
            .collect()
    }

    /// Active providers in dispatch order.
    pub fn providers(&self) -> Vec<Arc<dyn Provider>> {
        self.snapshot().iter().map(|e| e.provider.clone()).collect()
    }

    /// Build a provider from `config` and append it to the set.
    pub fn add_provider(&self, config: ProviderConfig) -> Result<(), Failure> {
        let entry = self.entry_from_config(config)?;
        let mut guard = self.providers.write().unwrap_or_else(|e| e.into_inner());
        if guard.iter().any(|e| e.name() == entry.name()) {
            return Err(Failure::invalid_config(format!(
                "a provider named {:?} already exists",
                entry.name()
            )));
        }
        let mut next = guard.as_ref().clone();
        tracing::info!(provider = entry.name(), "provider added");
        next.push(entry);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Drop the provider called `name`. The last provider cannot be removed.
    pub fn remove_provider(&self, name: &str) -> Result<(), Failure> {
        let mut guard = self.providers.write().unwrap_or_else(|e| e.into_inner());
        if !guard.iter().any(|e| e.name() == name) {
            return Err(Failure::invalid_config(format!("no provider named {:?}", name)));
        }
        if guard.len() == 1 {
            return Err(Failure::invalid_config("cannot remove the last provider")
                .with_provider(name));
        }
        let next: Vec<ProviderEntry> = guard.iter().filter(|e| e.name() != name).cloned().collect();
        *guard = Arc::new(next);
        tracing::info!(provider = name, "provider removed");
        Ok(())
    }

    /// Replace the whole provider set. Nothing changes unless every config builds.
    pub fn reconfigure(&self, configs: Vec<ProviderConfig>) -> Result<(), Failure> {
        let entries = configs
            .into_iter()
            .map(|c| self.entry_from_config(c))
            .collect::<Result<Vec<_>, _>>()?;
        check_provider_set(&entries)?;
        let count = entries.len();
        *self.providers.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(entries);
        tracing::info!(providers = count, "provider set replaced");
        Ok(())
    }

    fn entry_from_config(&self, config: ProviderConfig) -> Result<ProviderEntry, Failure> {
        let policy = config.retry.clone().unwrap_or_else(|| self.default_policy.clone());
        let provider = build_provider(config, self.transport.clone())?;
        Ok(ProviderEntry { provider, policy })
    }

    fn snapshot(&self) -> Arc<Vec<ProviderEntry>> {
        self.providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

fn validate_request(request: &ProcessingRequest) -> Result<(), Failure> {
    if request.source_url().is_none()
        && request.transcript().is_none()
        && request.custom_prompt().is_none()
    {
        return Err(Failure::invalid_config(
            "request needs a source URL, a transcript or a custom prompt",
        ));
    }
    if request.video_input && request.source_url().is_none() {
        return Err(Failure::invalid_config("video input requires a source URL"));
    }
    if let Some(url) = request.source_url() {
        if let Err(e) = url::Url::parse(url) {
            return Err(Failure::invalid_config(format!("invalid source URL {:?}: {}", url, e)));
        }
    }
    if let Some(t) = request.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(Failure::invalid_config(format!(
                "temperature {} is outside [0, 2]",
                t
            )));
        }
    }
    if request.max_tokens == Some(0) {
        return Err(Failure::invalid_config("max_tokens must be positive"));
    }
    Ok(())
}

fn can_handle(caps: &ProviderCapabilities, request: &ProcessingRequest) -> bool {
    (!request.video_input || caps.supports_video_input)
        && (request.custom_prompt().is_none() || caps.supports_custom_prompt)
        && (request.transcript().is_none() || caps.supports_transcript_input)
}

/// Copy of `request` limited to what the provider accepts.
fn clamp_request(caps: &ProviderCapabilities, request: &ProcessingRequest) -> ProcessingRequest {
    let mut clamped = request.clone();
    clamped.max_tokens = match (caps.supports_max_tokens, request.max_tokens, caps.max_tokens) {
        (false, _, _) => None,
        (true, Some(wanted), Some(ceiling)) => Some(wanted.min(ceiling)),
        (true, wanted, _) => wanted,
    };
    if !caps.supports_temperature {
        clamped.temperature = None;
    }
    clamped
}

/// All attempts against one provider under its retry policy.
async fn call_provider(
    entry: ProviderEntry,
    request: ProcessingRequest,
) -> Result<Completion, Failure> {
    let request = clamp_request(&entry.provider.capabilities(), &request);
    let provider = &entry.provider;
    let request = &request;
    let name = provider.name().to_string();
    let result = execute_with_retry(&entry.policy, &request.cancellation, |attempt| async move {
        tracing::debug!(provider = provider.name(), attempt, "calling provider");
        provider.process(request).await
    })
    .await;
    result.map_err(|f| {
        if f.provider_name.is_some() {
            f
        } else {
            f.with_provider(name)
        }
    })
}

async fn run_chain(
    entries: &[ProviderEntry],
    request: &ProcessingRequest,
) -> Result<Completion, Failure> {
    let mut failures = Vec::with_capacity(entries.len());
    for entry in entries {
        if request.cancellation.is_cancelled() {
            return Err(Failure::cancelled());
        }
        match call_provider(entry.clone(), request.clone()).await {
            Ok(completion) => return Ok(completion),
            Err(failure) => {
                tracing::debug!(provider = entry.name(), "provider gave up: {}", failure);
                failures.push(failure);
            }
        }
    }
    Err(Failure::exhausted(failures))
}

async fn run_race(
    entries: &[ProviderEntry],
    request: &ProcessingRequest,
) -> Result<Completion, Failure> {
    let race = request.cancellation.child_token();
    let mut tasks = JoinSet::new();
    for (index, entry) in entries.iter().cloned().enumerate() {
        let request = request.clone().with_cancellation(race.child_token());
        tasks.spawn(async move { (index, call_provider(entry, request).await) });
    }

    let mut failures: Vec<Option<Failure>> = vec![None; entries.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(completion))) => {
                race.cancel();
                tasks.abort_all();
                return Ok(completion);
            }
            Ok((index, Err(failure))) => {
                tracing::debug!(provider = entries[index].name(), "provider gave up: {}", failure);
                failures[index] = Some(failure);
            }
            Err(e) => tracing::warn!("provider task ended abnormally: {}", e),
        }
    }

    let causes = failures
        .into_iter()
        .zip(entries)
        .map(|(failure, entry)| {
            failure.unwrap_or_else(|| {
                Failure::malformed("provider task ended without a result").with_provider(entry.name())
            })
        })
        .collect();
    Err(Failure::exhausted(causes))
}

fn check_provider_set(entries: &[ProviderEntry]) -> Result<(), Failure> {
    if entries.is_empty() {
        return Err(Failure::invalid_config("at least one provider is required"));
    }
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.name()) {
            return Err(Failure::invalid_config(format!(
                "duplicate provider name {:?}",
                entry.name()
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

enum PendingProvider {
    Config(ProviderConfig),
    Built(Arc<dyn Provider>),
}

pub struct OrchestratorBuilder {
    pending: Vec<PendingProvider>,
    retry: RetryPolicy,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            retry: RetryPolicy::default(),
            transport: None,
        }
    }

    /// Add a provider config; order is the sequential dispatch order.
    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.pending.push(PendingProvider::Config(config));
        self
    }

    pub fn with_configs(mut self, configs: impl IntoIterator<Item = ProviderConfig>) -> Self {
        self.pending
            .extend(configs.into_iter().map(PendingProvider::Config));
        self
    }

    /// Add an already constructed provider. It runs under the default retry policy.
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.pending.push(PendingProvider::Built(provider));
        self
    }

    /// Retry policy for providers whose config carries none.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Orchestrator, Failure> {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let orchestrator = Orchestrator {
            providers: RwLock::new(Arc::new(Vec::new())),
            default_policy: self.retry,
            transport,
        };
        let entries = self
            .pending
            .into_iter()
            .map(|pending| match pending {
                PendingProvider::Config(config) => orchestrator.entry_from_config(config),
                PendingProvider::Built(provider) => Ok(ProviderEntry {
                    provider,
                    policy: orchestrator.default_policy.clone(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        check_provider_set(&entries)?;
        tracing::debug!(providers = entries.len(), "orchestrator built");
        *orchestrator
            .providers
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Arc::new(entries);
        Ok(orchestrator)
    }
}
