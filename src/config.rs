use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry configuration as supplied by the host application, before
/// normalization.
///
/// Values are kept signed so that hosts may pass `-1` (or any
/// non-positive value) to disable retries; the `effective_*` accessors
/// apply the normalization instead of rejecting the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: i64,
    pub wait_time_millis: i64,
    pub retry_status_codes: Vec<u16>,
    /// Per-HTTP-method overrides, keyed by method name in any casing.
    pub http_methods: HashMap<String, MethodSettings>,
}

/// Override values for a single HTTP method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodSettings {
    pub max_retries: i64,
    pub wait_time_millis: i64,
    pub retry_status_codes: Vec<u16>,
}

impl RetrySettings {
    /// Configured retry count, with non-positive values treated as zero.
    pub fn effective_max_retries(&self) -> u32 {
        normalized_retries(self.max_retries)
    }

    /// Configured wait between attempts, with non-positive values
    /// treated as one millisecond.
    pub fn effective_wait_time(&self) -> Duration {
        normalized_wait(self.wait_time_millis)
    }
}

impl MethodSettings {
    pub fn effective_max_retries(&self) -> u32 {
        normalized_retries(self.max_retries)
    }

    pub fn effective_wait_time(&self) -> Duration {
        normalized_wait(self.wait_time_millis)
    }
}

fn normalized_retries(max_retries: i64) -> u32 {
    if max_retries > 0 {
        u32::try_from(max_retries).unwrap_or(u32::MAX)
    } else {
        0
    }
}

fn normalized_wait(wait_time_millis: i64) -> Duration {
    if wait_time_millis > 0 {
        Duration::from_millis(wait_time_millis as u64)
    } else {
        Duration::from_millis(1)
    }
}
