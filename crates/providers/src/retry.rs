//! Retry wrapper: bounded attempts with per-attempt timeouts and
//! exponential backoff.
//!
//! Transient failures (timeouts, rate limits, 5xx, network errors) are
//! retried. Authentication and configuration failures are returned on the
//! first occurrence.

use async_trait::async_trait;
use rpgforge_core::error::ProviderError;
use rpgforge_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How many times and how patiently to call the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. At least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Deadline for a single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(8000),
            timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &rpgforge_config::LlmConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Backoff before the attempt following failed attempt `attempt` (1-based).
    ///
    /// Doubles from `base_delay` and never exceeds `max_delay`. A rate-limit
    /// hint from the backend raises the wait toward the hint, still capped
    /// at `max_delay`.
    pub fn delay_after(&self, attempt: u32, error: &ProviderError) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        match error {
            ProviderError::RateLimited { retry_after_secs } => {
                backoff
                    .max(Duration::from_secs(*retry_after_secs))
                    .min(self.max_delay)
            }
            _ => backoff,
        }
    }
}

/// A provider that retries another provider according to a [`RetryPolicy`].
pub struct RetryingProvider {
    inner: Arc<dyn Provider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn Provider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let provider_name = self.inner.name().to_string();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match tokio::time::timeout(
                self.policy.timeout,
                self.inner.complete(request.clone()),
            )
            .await
            {
                Ok(Ok(response)) => {
                    if attempt > 1 {
                        info!(provider = %provider_name, attempt, "Retry: call succeeded");
                    }
                    return Ok(response);
                }
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout(format!(
                    "Provider '{}' timed out after {}s",
                    provider_name,
                    self.policy.timeout.as_secs()
                )),
            };

            if !error.is_retryable() {
                warn!(provider = %provider_name, error = %error, "Retry: non-retryable failure");
                return Err(error);
            }

            if attempt >= max_attempts {
                warn!(
                    provider = %provider_name,
                    attempts = attempt,
                    error = %error,
                    "Retry: attempts exhausted"
                );
                return Err(error);
            }

            let delay = self.policy.delay_after(attempt, &error);
            warn!(
                provider = %provider_name,
                attempt,
                total = max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retry: call failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
