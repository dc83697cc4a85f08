pub mod auth;
pub mod failure;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use auth::config::{AppConfig, ConfigManager};
pub use auth::{Credential, credential_looks_valid};
pub use failure::{Failure, FailureKind};
pub use models::static_models_for;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use providers::Provider;
pub use providers::factory::build_provider;
pub use providers::retry::execute_with_retry;
pub use transport::{ReqwestTransport, Transport, TransportError};
pub use types::*;
