//! Failure taxonomy shared by the transport and the retry layer.

use reqwest::Method;

/// A failed FHIR request, carrying enough context to decide whether the
/// request may be retried and to report what was attempted.
#[derive(Debug)]
pub enum FhirError {
    /// The server answered with a non-success HTTP status.
    Status {
        method: Method,
        status: u16,
        url: String,
    },
    /// The request never produced an HTTP response (DNS, connect, TLS,
    /// or the connection dropped mid-transfer).
    Transport {
        method: Method,
        source: reqwest::Error,
    },
    /// The server answered successfully but the body was not the
    /// expected JSON shape.
    Decode {
        method: Method,
        source: reqwest::Error,
    },
    /// The requested builder capability is not provided by this client.
    Unsupported { operation: &'static str },
    /// A retryable failure survived every configured attempt. `attempts`
    /// counts executions, so a policy allowing three retries reports four.
    Exhausted {
        method: Method,
        attempts: u32,
        source: anyhow::Error,
    },
}

impl FhirError {
    pub fn status(method: Method, status: u16, url: impl Into<String>) -> Self {
        Self::Status {
            method,
            status,
            url: url.into(),
        }
    }

    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// Classifies a reqwest failure into the matching variant. Errors
    /// raised before a response arrived become [`FhirError::Transport`],
    /// body-parsing errors become [`FhirError::Decode`].
    pub fn from_reqwest(method: Method, source: reqwest::Error) -> Self {
        if let Some(status) = source.status() {
            let url = source.url().map(|u| u.to_string()).unwrap_or_default();
            Self::Status {
                method,
                status: status.as_u16(),
                url,
            }
        } else if source.is_decode() {
            Self::Decode { method, source }
        } else {
            Self::Transport { method, source }
        }
    }

    /// The HTTP status of the failure, when one was received.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl std::fmt::Display for FhirError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status {
                method,
                status,
                url,
            } => {
                write!(f, "{method} {url} returned HTTP {status}")
            }
            Self::Transport { method, .. } => {
                write!(f, "{method} request failed before a response arrived")
            }
            Self::Decode { method, .. } => {
                write!(f, "{method} response was not a valid FHIR JSON body")
            }
            Self::Unsupported { operation } => {
                write!(f, "unsupported operation: {operation}")
            }
            Self::Exhausted {
                method, attempts, ..
            } => {
                write!(f, "{method} request failed after {attempts} attempts")
            }
        }
    }
}

impl std::error::Error for FhirError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport { source, .. } | Self::Decode { source, .. } => Some(source),
            Self::Exhausted { source, .. } => Some(source.as_ref()),
            Self::Status { .. } | Self::Unsupported { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_status_error_display_names_method_and_code() {
        let error = FhirError::status(Method::GET, 404, "http://fhir.example/Patient/1");
        assert_eq!(
            error.to_string(),
            "GET http://fhir.example/Patient/1 returned HTTP 404"
        );
        assert_eq!(error.http_status(), Some(404));
    }

    #[test]
    fn test_unsupported_display_names_operation() {
        let error = FhirError::unsupported("prettyPrint");
        assert_eq!(error.to_string(), "unsupported operation: prettyPrint");
        assert_eq!(error.http_status(), None);
    }

    #[test]
    fn test_exhausted_reports_total_executions_and_keeps_cause() {
        let error = FhirError::Exhausted {
            method: Method::GET,
            attempts: 4,
            source: anyhow!("connection reset"),
        };
        assert_eq!(error.to_string(), "GET request failed after 4 attempts");
        let source = std::error::Error::source(&error).expect("cause is preserved");
        assert_eq!(source.to_string(), "connection reset");
    }

    #[tokio::test]
    async fn test_from_reqwest_maps_send_failures_to_transport() {
        // Nothing listens on port 9; the request fails before any response.
        let error = reqwest::Client::new()
            .get("http://127.0.0.1:9/Patient/1")
            .send()
            .await
            .expect_err("connection should be refused");

        match FhirError::from_reqwest(Method::GET, error) {
            FhirError::Transport { method, .. } => assert_eq!(method, Method::GET),
            other => panic!("expected a transport error, got: {other}"),
        }
    }

    #[tokio::test]
    async fn test_from_reqwest_maps_body_parse_failures_to_decode() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/Patient/1")
            .with_status(200)
            .with_header("content-type", "application/fhir+json")
            .with_body("this is not json")
            .create_async()
            .await;

        let error = reqwest::Client::new()
            .get(format!("{}/Patient/1", server.url()))
            .send()
            .await
            .unwrap()
            .json::<serde_json::Value>()
            .await
            .expect_err("body is not json");

        match FhirError::from_reqwest(Method::GET, error) {
            FhirError::Decode { method, .. } => assert_eq!(method, Method::GET),
            other => panic!("expected a decode error, got: {other}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_from_reqwest_maps_status_failures_to_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/Patient/1")
            .with_status(500)
            .create_async()
            .await;

        let error = reqwest::Client::new()
            .get(format!("{}/Patient/1", server.url()))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .expect_err("server answered 500");

        let error = FhirError::from_reqwest(Method::GET, error);
        assert_eq!(error.http_status(), Some(500));
        mock.assert_async().await;
    }
}
