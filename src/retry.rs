//! Retry execution for FHIR requests with policy-driven error classification.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::{debug, warn};
use reqwest::Method;

use crate::error::FhirError;
use crate::policy::{RetryPolicy, RetryPolicyRegistry};

/// Whether a failed attempt may be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Retryable,
    Terminal,
}

/// Classifies a failure against `policy`.
///
/// Status failures are retryable when the policy lists their code.
/// Transport failures are retryable regardless of the configured
/// status codes. Everything else, including decode and unsupported
/// operation failures, is terminal.
pub fn classify(error: &anyhow::Error, policy: &RetryPolicy) -> Classification {
    match error.downcast_ref::<FhirError>() {
        Some(FhirError::Status { status, .. }) if policy.is_retryable_status(*status) => {
            Classification::Retryable
        }
        Some(FhirError::Transport { .. }) => Classification::Retryable,
        _ => Classification::Terminal,
    }
}

/// Runs operations under the retry policy resolved for their HTTP method.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    registry: Arc<RetryPolicyRegistry>,
}

impl RetryExecutor {
    pub fn new(registry: Arc<RetryPolicyRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RetryPolicyRegistry {
        &self.registry
    }

    /// Executes `operation` until it succeeds, fails terminally, or the
    /// policy for `method` is exhausted. A policy allowing N retries
    /// runs the operation at most N + 1 times; exhaustion reports that
    /// total alongside the last failure.
    #[tracing::instrument(skip(self, operation))]
    pub async fn execute<T, F, Fut>(&self, method: Method, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let policy = self.registry.resolve(&method);
        let total_attempts = policy.max_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 1..=total_attempts {
            debug!("{}: attempt {}/{}", method, attempt, total_attempts);
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("{}: succeeded on attempt {}/{}", method, attempt, total_attempts);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if classify(&e, policy) == Classification::Terminal {
                        debug!("{}: non-retryable error: {}", method, e);
                        return Err(annotate(e, &method));
                    }

                    if attempt < total_attempts {
                        warn!(
                            "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                            method,
                            attempt,
                            total_attempts,
                            e,
                            policy.wait_time.as_millis()
                        );
                        tokio::time::sleep(policy.wait_time).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        warn!("{}: giving up after {} attempts", method, total_attempts);
        let source =
            last_error.unwrap_or_else(|| anyhow!("{} request was never executed", method));
        Err(FhirError::Exhausted {
            method,
            attempts: total_attempts,
            source,
        }
        .into())
    }
}

/// Terminal failures keep their identity; untyped ones gain the method
/// they were attempted under.
fn annotate(error: anyhow::Error, method: &Method) -> anyhow::Error {
    if error.downcast_ref::<FhirError>().is_some() {
        error
    } else {
        error.context(format!("{method} request failed"))
    }
}
