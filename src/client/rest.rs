//! reqwest-backed JSON transport against a single FHIR base URL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL, IF_NONE_MATCH};
use reqwest::{Client, Method};

use super::{
    CacheControl, Encoding, FhirClient, FhirRead, FhirReadExecutable, FhirReadTyped, FhirSearch,
    FhirSearchExecutable,
};
use crate::error::FhirError;
use crate::resource::{Bundle, Resource};

const FHIR_JSON: &str = "application/fhir+json";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Client for a FHIR REST endpoint, speaking JSON only.
#[derive(Debug, Clone)]
pub struct RestFhirClient {
    http: Client,
    base_url: String,
}

impl RestFhirClient {
    /// Builds a client for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to initialize HTTP client")?;
        Ok(Self::with_http_client(http, base_url))
    }

    /// Wraps an existing reqwest client, for hosts that configure their
    /// own pooling, authentication, or timeouts.
    pub fn with_http_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl FhirClient for RestFhirClient {
    fn read(&self) -> Box<dyn FhirRead> {
        Box::new(RestRead {
            client: self.clone(),
        })
    }

    fn search(&self) -> Box<dyn FhirSearch> {
        Box::new(RestSearch {
            client: self.clone(),
        })
    }
}

/// Joins `url` onto `base` unless it is already absolute.
fn resolve(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{}/{}", base, url.trim_start_matches('/'))
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let name =
        HeaderName::try_from(name).with_context(|| format!("Invalid header name: {name}"))?;
    let value = HeaderValue::try_from(value)
        .with_context(|| format!("Invalid value for header {name}"))?;
    headers.append(name, value);
    Ok(())
}

/// Sends a GET built by a request stage and decodes the JSON body,
/// mapping each failure mode to its [`FhirError`] variant.
async fn execute_get<T>(request: reqwest::RequestBuilder, url: &str, log_exchange: bool) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let request = request.header(ACCEPT, FHIR_JSON);
    if log_exchange {
        debug!("GET {}", url);
    }

    let response = request
        .send()
        .await
        .map_err(|e| FhirError::from_reqwest(Method::GET, e))?;

    if log_exchange {
        debug!("GET {} answered {}", url, response.status());
    }

    let status = response.status();
    if !status.is_success() {
        return Err(
            FhirError::status(Method::GET, status.as_u16(), response.url().as_str()).into(),
        );
    }

    response
        .json::<T>()
        .await
        .map_err(|e| FhirError::from_reqwest(Method::GET, e).into())
}

struct RestRead {
    client: RestFhirClient,
}

impl FhirRead for RestRead {
    fn resource(&self, resource_type: &str) -> Box<dyn FhirReadTyped> {
        Box::new(RestReadTyped {
            client: self.client.clone(),
            resource_type: resource_type.to_string(),
        })
    }
}

struct RestReadTyped {
    client: RestFhirClient,
    resource_type: String,
}

impl RestReadTyped {
    fn request(&self, url: String) -> Box<dyn FhirReadExecutable> {
        Box::new(RestReadRequest {
            client: self.client.clone(),
            url,
            headers: HeaderMap::new(),
            cache: CacheControl::default(),
            pretty: false,
            log_exchange: false,
        })
    }
}

impl FhirReadTyped for RestReadTyped {
    fn with_id(&self, id: &str) -> Box<dyn FhirReadExecutable> {
        self.request(format!("{}/{}", self.resource_type, id))
    }

    fn with_id_and_version(&self, id: &str, version: &str) -> Box<dyn FhirReadExecutable> {
        self.request(format!("{}/{}/_history/{}", self.resource_type, id, version))
    }

    fn with_url(&self, url: &str) -> Box<dyn FhirReadExecutable> {
        self.request(url.to_string())
    }
}

#[derive(Clone)]
struct RestReadRequest {
    client: RestFhirClient,
    url: String,
    headers: HeaderMap,
    cache: CacheControl,
    pretty: bool,
    log_exchange: bool,
}

#[async_trait]
impl FhirReadExecutable for RestReadRequest {
    fn log_request_and_response(&self, enabled: bool) -> Box<dyn FhirReadExecutable> {
        let mut next = self.clone();
        next.log_exchange = enabled;
        Box::new(next)
    }

    fn cache_control(&self, directive: CacheControl) -> Box<dyn FhirReadExecutable> {
        let mut next = self.clone();
        next.cache = directive;
        Box::new(next)
    }

    fn encoded(&self, encoding: Encoding) -> Result<Box<dyn FhirReadExecutable>> {
        match encoding {
            Encoding::Json => Ok(Box::new(self.clone())),
            Encoding::Xml => Err(FhirError::unsupported("xml encoding").into()),
        }
    }

    fn with_header(&self, name: &str, value: &str) -> Result<Box<dyn FhirReadExecutable>> {
        let mut next = self.clone();
        insert_header(&mut next.headers, name, value)?;
        Ok(Box::new(next))
    }

    fn pretty(&self) -> Result<Box<dyn FhirReadExecutable>> {
        let mut next = self.clone();
        next.pretty = true;
        Ok(Box::new(next))
    }

    /// Sends `If-None-Match` for the given version. A server that still
    /// holds that version answers 304, which surfaces as a status failure.
    fn if_version_matches(&self, version: &str) -> Result<Box<dyn FhirReadExecutable>> {
        let mut next = self.clone();
        let etag = HeaderValue::try_from(format!("W/\"{version}\""))
            .with_context(|| format!("Invalid version for If-None-Match: {version}"))?;
        next.headers.insert(IF_NONE_MATCH, etag);
        Ok(Box::new(next))
    }

    #[tracing::instrument(skip(self))]
    async fn execute(&self) -> Result<Resource> {
        let url = resolve(&self.client.base_url, &self.url);
        let mut request = self.client.http.get(&url).headers(self.headers.clone());
        if let Some(directive) = self.cache.header_value() {
            request = request.header(CACHE_CONTROL, directive);
        }
        if self.pretty {
            request = request.query(&[("_pretty", "true")]);
        }
        execute_get(request, &url, self.log_exchange).await
    }
}

struct RestSearch {
    client: RestFhirClient,
}

impl FhirSearch for RestSearch {
    fn by_url(&self, url: &str) -> Box<dyn FhirSearchExecutable> {
        Box::new(RestSearchRequest {
            client: self.client.clone(),
            url: url.to_string(),
            count: None,
            headers: HeaderMap::new(),
            log_exchange: false,
        })
    }
}

#[derive(Clone)]
struct RestSearchRequest {
    client: RestFhirClient,
    url: String,
    count: Option<u32>,
    headers: HeaderMap,
    log_exchange: bool,
}

#[async_trait]
impl FhirSearchExecutable for RestSearchRequest {
    fn count(&self, count: u32) -> Box<dyn FhirSearchExecutable> {
        let mut next = self.clone();
        next.count = Some(count);
        Box::new(next)
    }

    fn log_request_and_response(&self, enabled: bool) -> Box<dyn FhirSearchExecutable> {
        let mut next = self.clone();
        next.log_exchange = enabled;
        Box::new(next)
    }

    fn encoded(&self, encoding: Encoding) -> Result<Box<dyn FhirSearchExecutable>> {
        match encoding {
            Encoding::Json => Ok(Box::new(self.clone())),
            Encoding::Xml => Err(FhirError::unsupported("xml encoding").into()),
        }
    }

    fn with_header(&self, name: &str, value: &str) -> Result<Box<dyn FhirSearchExecutable>> {
        let mut next = self.clone();
        insert_header(&mut next.headers, name, value)?;
        Ok(Box::new(next))
    }

    #[tracing::instrument(skip(self))]
    async fn execute(&self) -> Result<Bundle> {
        let url = resolve(&self.client.base_url, &self.url);
        let mut request = self.client.http.get(&url).headers(self.headers.clone());
        if let Some(count) = self.count {
            request = request.query(&[("_count", count.to_string())]);
        }
        execute_get(request, &url, self.log_exchange).await
    }
}
