//! Completion backend clients for rpgforge.
//!
//! All providers implement the `rpgforge_core::Provider` trait. The server
//! talks to a single Azure OpenAI deployment through a [`RetryingProvider`].

pub mod azure_openai;
pub mod retry;

pub use azure_openai::AzureOpenAiProvider;
pub use retry::{RetryPolicy, RetryingProvider};

use rpgforge_config::AppConfig;
use rpgforge_core::error::ProviderError;
use rpgforge_core::Provider;
use std::sync::Arc;

/// Build the configured completion backend, wrapped in the retry policy.
///
/// Fails with `NotConfigured` when the endpoint or API key is missing.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let azure = AzureOpenAiProvider::from_config(&config.llm)?;
    let policy = RetryPolicy::from_config(&config.llm);
    tracing::info!(
        deployment = %azure.deployment(),
        max_attempts = policy.max_attempts,
        "Completion backend configured"
    );
    Ok(Arc::new(RetryingProvider::new(Arc::new(azure), policy)))
}
