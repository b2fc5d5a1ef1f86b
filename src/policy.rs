//! Retry policies and the per-HTTP-method registry that resolves them.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use reqwest::Method;

use crate::config::RetrySettings;

/// Effective retry behavior for one kind of request: how many times a
/// failed call may be retried, how long to pause between attempts, and
/// which HTTP status codes are worth retrying at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub wait_time: Duration,
    pub retryable_status_codes: HashSet<u16>,
}

impl Default for RetryPolicy {
    /// No retries, with the minimum wait a host could configure.
    fn default() -> Self {
        Self {
            max_retries: 0,
            wait_time: Duration::from_millis(1),
            retryable_status_codes: HashSet::new(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, wait_time: Duration) -> Self {
        Self {
            max_retries,
            wait_time,
            ..Default::default()
        }
    }

    pub fn with_status_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}

/// Maps HTTP methods to retry policies.
///
/// Lookups are case-insensitive over the method name; methods without
/// an override fall back to the default policy. An empty registry
/// therefore means "execute once, never retry".
#[derive(Debug, Clone, Default)]
pub struct RetryPolicyRegistry {
    default_policy: RetryPolicy,
    per_method: HashMap<String, RetryPolicy>,
}

impl RetryPolicyRegistry {
    pub fn new(default_policy: RetryPolicy) -> Self {
        Self {
            default_policy,
            per_method: HashMap::new(),
        }
    }

    pub fn with_method_policy(mut self, method: Method, policy: RetryPolicy) -> Self {
        self.per_method
            .insert(method.as_str().to_ascii_uppercase(), policy);
        self
    }

    /// Builds a registry from host configuration, applying the value
    /// normalization the settings define.
    pub fn from_settings(settings: &RetrySettings) -> Self {
        let default_policy = RetryPolicy::new(
            settings.effective_max_retries(),
            settings.effective_wait_time(),
        )
        .with_status_codes(settings.retry_status_codes.iter().copied());

        let per_method = settings
            .http_methods
            .iter()
            .map(|(method, overrides)| {
                let policy = RetryPolicy::new(
                    overrides.effective_max_retries(),
                    overrides.effective_wait_time(),
                )
                .with_status_codes(overrides.retry_status_codes.iter().copied());
                (method.to_ascii_uppercase(), policy)
            })
            .collect();

        Self {
            default_policy,
            per_method,
        }
    }

    pub fn resolve(&self, method: &Method) -> &RetryPolicy {
        self.per_method
            .get(&method.as_str().to_ascii_uppercase())
            .unwrap_or(&self.default_policy)
    }

    pub fn default_policy(&self) -> &RetryPolicy {
        &self.default_policy
    }
}
