//! Retrying decorators over the client capability traits.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;

use super::{
    CacheControl, Encoding, FhirClient, FhirRead, FhirReadExecutable, FhirReadTyped, FhirSearch,
    FhirSearchExecutable,
};
use crate::config::RetrySettings;
use crate::error::FhirError;
use crate::policy::RetryPolicyRegistry;
use crate::resource::{Bundle, Resource};
use crate::retry::RetryExecutor;

/// Decorates another [`FhirClient`] so reads and searches run under the
/// registry's retry policies.
///
/// Every builder stage the inner client hands out is wrapped again, so
/// a chain started here never escapes the decorator. Builder options
/// outside the supported set are rejected with
/// [`FhirError::Unsupported`].
pub struct RetryFhirClient {
    inner: Arc<dyn FhirClient>,
    executor: Arc<RetryExecutor>,
}

impl RetryFhirClient {
    pub fn new(inner: Arc<dyn FhirClient>, registry: Arc<RetryPolicyRegistry>) -> Self {
        Self {
            inner,
            executor: Arc::new(RetryExecutor::new(registry)),
        }
    }

    /// Builds the client straight from host configuration.
    pub fn from_settings(inner: Arc<dyn FhirClient>, settings: &RetrySettings) -> Self {
        Self::new(inner, Arc::new(RetryPolicyRegistry::from_settings(settings)))
    }

    pub fn registry(&self) -> &RetryPolicyRegistry {
        self.executor.registry()
    }
}

impl FhirClient for RetryFhirClient {
    fn read(&self) -> Box<dyn FhirRead> {
        Box::new(RetryRead {
            inner: self.inner.read(),
            executor: Arc::clone(&self.executor),
        })
    }

    fn search(&self) -> Box<dyn FhirSearch> {
        Box::new(RetrySearch {
            inner: self.inner.search(),
            executor: Arc::clone(&self.executor),
        })
    }
}

struct RetryRead {
    inner: Box<dyn FhirRead>,
    executor: Arc<RetryExecutor>,
}

impl FhirRead for RetryRead {
    fn resource(&self, resource_type: &str) -> Box<dyn FhirReadTyped> {
        Box::new(RetryReadTyped {
            inner: self.inner.resource(resource_type),
            executor: Arc::clone(&self.executor),
        })
    }
}

struct RetryReadTyped {
    inner: Box<dyn FhirReadTyped>,
    executor: Arc<RetryExecutor>,
}

impl FhirReadTyped for RetryReadTyped {
    fn with_id(&self, id: &str) -> Box<dyn FhirReadExecutable> {
        wrap_read(self.inner.with_id(id), &self.executor)
    }

    fn with_id_and_version(&self, id: &str, version: &str) -> Box<dyn FhirReadExecutable> {
        wrap_read(self.inner.with_id_and_version(id, version), &self.executor)
    }

    fn with_url(&self, url: &str) -> Box<dyn FhirReadExecutable> {
        wrap_read(self.inner.with_url(url), &self.executor)
    }
}

fn wrap_read(
    inner: Box<dyn FhirReadExecutable>,
    executor: &Arc<RetryExecutor>,
) -> Box<dyn FhirReadExecutable> {
    Box::new(RetryReadExecutable {
        inner,
        executor: Arc::clone(executor),
    })
}

struct RetryReadExecutable {
    inner: Box<dyn FhirReadExecutable>,
    executor: Arc<RetryExecutor>,
}

#[async_trait]
impl FhirReadExecutable for RetryReadExecutable {
    fn log_request_and_response(&self, enabled: bool) -> Box<dyn FhirReadExecutable> {
        wrap_read(self.inner.log_request_and_response(enabled), &self.executor)
    }

    fn cache_control(&self, directive: CacheControl) -> Box<dyn FhirReadExecutable> {
        wrap_read(self.inner.cache_control(directive), &self.executor)
    }

    fn encoded(&self, _encoding: Encoding) -> Result<Box<dyn FhirReadExecutable>> {
        Err(FhirError::unsupported("encoded").into())
    }

    fn with_header(&self, _name: &str, _value: &str) -> Result<Box<dyn FhirReadExecutable>> {
        Err(FhirError::unsupported("with_header").into())
    }

    fn pretty(&self) -> Result<Box<dyn FhirReadExecutable>> {
        Err(FhirError::unsupported("pretty").into())
    }

    fn if_version_matches(&self, _version: &str) -> Result<Box<dyn FhirReadExecutable>> {
        Err(FhirError::unsupported("if_version_matches").into())
    }

    #[tracing::instrument(skip(self))]
    async fn execute(&self) -> Result<Resource> {
        self.executor
            .execute(Method::GET, || self.inner.execute())
            .await
    }
}

struct RetrySearch {
    inner: Box<dyn FhirSearch>,
    executor: Arc<RetryExecutor>,
}

impl FhirSearch for RetrySearch {
    fn by_url(&self, url: &str) -> Box<dyn FhirSearchExecutable> {
        wrap_search(self.inner.by_url(url), &self.executor)
    }
}

fn wrap_search(
    inner: Box<dyn FhirSearchExecutable>,
    executor: &Arc<RetryExecutor>,
) -> Box<dyn FhirSearchExecutable> {
    Box::new(RetrySearchExecutable {
        inner,
        executor: Arc::clone(executor),
    })
}

struct RetrySearchExecutable {
    inner: Box<dyn FhirSearchExecutable>,
    executor: Arc<RetryExecutor>,
}

#[async_trait]
impl FhirSearchExecutable for RetrySearchExecutable {
    fn count(&self, count: u32) -> Box<dyn FhirSearchExecutable> {
        wrap_search(self.inner.count(count), &self.executor)
    }

    fn log_request_and_response(&self, enabled: bool) -> Box<dyn FhirSearchExecutable> {
        wrap_search(self.inner.log_request_and_response(enabled), &self.executor)
    }

    fn encoded(&self, _encoding: Encoding) -> Result<Box<dyn FhirSearchExecutable>> {
        Err(FhirError::unsupported("encoded").into())
    }

    fn with_header(&self, _name: &str, _value: &str) -> Result<Box<dyn FhirSearchExecutable>> {
        Err(FhirError::unsupported("with_header").into())
    }

    #[tracing::instrument(skip(self))]
    async fn execute(&self) -> Result<Bundle> {
        self.executor
            .execute(Method::GET, || self.inner.execute())
            .await
    }
}
