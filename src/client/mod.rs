//! Fluent request builders over a FHIR server, and their implementations.

mod rest;
mod retry;

pub use rest::RestFhirClient;
pub use retry::RetryFhirClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::resource::{Bundle, Resource};

/// Response encodings a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Xml,
}

/// Cache directives attached to a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub no_cache: bool,
    pub no_store: bool,
}

impl CacheControl {
    /// The `Cache-Control` header value for this directive, or `None`
    /// when nothing was requested.
    pub fn header_value(&self) -> Option<String> {
        let mut directives = Vec::new();
        if self.no_cache {
            directives.push("no-cache");
        }
        if self.no_store {
            directives.push("no-store");
        }
        if directives.is_empty() {
            None
        } else {
            Some(directives.join(", "))
        }
    }
}

/// A client able to start read and search request chains.
///
/// Every call in a chain returns the next stage as a boxed trait
/// object, so a decorating client can wrap each stage another client
/// hands out and a chain never escapes its decorator.
#[cfg_attr(test, mockall::automock)]
pub trait FhirClient: Send + Sync {
    fn read(&self) -> Box<dyn FhirRead>;
    fn search(&self) -> Box<dyn FhirSearch>;
}

/// Start of a read chain: pick the resource type.
#[cfg_attr(test, mockall::automock)]
pub trait FhirRead: Send + Sync {
    fn resource(&self, resource_type: &str) -> Box<dyn FhirReadTyped>;
}

/// Read chain with the resource type chosen: pick the instance.
#[cfg_attr(test, mockall::automock)]
pub trait FhirReadTyped: Send + Sync {
    fn with_id(&self, id: &str) -> Box<dyn FhirReadExecutable>;

    /// Read a specific version from the instance history.
    fn with_id_and_version(&self, id: &str, version: &str) -> Box<dyn FhirReadExecutable>;

    /// Read from an explicit URL, absolute or relative to the server base.
    fn with_url(&self, url: &str) -> Box<dyn FhirReadExecutable>;
}

/// A fully-specified read, still open for per-request options.
///
/// Option setters a given client does not provide return
/// [`FhirError::Unsupported`](crate::error::FhirError::Unsupported);
/// the failure surfaces when the option is requested, not when the
/// request executes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FhirReadExecutable: Send + Sync {
    fn log_request_and_response(&self, enabled: bool) -> Box<dyn FhirReadExecutable>;

    fn cache_control(&self, directive: CacheControl) -> Box<dyn FhirReadExecutable>;

    fn encoded(&self, encoding: Encoding) -> Result<Box<dyn FhirReadExecutable>>;

    fn with_header(&self, name: &str, value: &str) -> Result<Box<dyn FhirReadExecutable>>;

    fn pretty(&self) -> Result<Box<dyn FhirReadExecutable>>;

    fn if_version_matches(&self, version: &str) -> Result<Box<dyn FhirReadExecutable>>;

    async fn execute(&self) -> Result<Resource>;
}

/// Start of a search chain.
#[cfg_attr(test, mockall::automock)]
pub trait FhirSearch: Send + Sync {
    /// Search by query URL, absolute or relative to the server base.
    fn by_url(&self, url: &str) -> Box<dyn FhirSearchExecutable>;
}

/// A fully-specified search.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FhirSearchExecutable: Send + Sync {
    /// Cap the number of results per page.
    fn count(&self, count: u32) -> Box<dyn FhirSearchExecutable>;

    fn log_request_and_response(&self, enabled: bool) -> Box<dyn FhirSearchExecutable>;

    fn encoded(&self, encoding: Encoding) -> Result<Box<dyn FhirSearchExecutable>>;

    fn with_header(&self, name: &str, value: &str) -> Result<Box<dyn FhirSearchExecutable>>;

    async fn execute(&self) -> Result<Bundle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_control_header_value() {
        assert_eq!(CacheControl::default().header_value(), None);
        assert_eq!(
            CacheControl {
                no_cache: true,
                no_store: false
            }
            .header_value(),
            Some("no-cache".to_string())
        );
        assert_eq!(
            CacheControl {
                no_cache: true,
                no_store: true
            }
            .header_value(),
            Some("no-cache, no-store".to_string())
        );
    }
}
