//! Blocking HTTP transport backed by reqwest.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use rabj_core::{Error as CoreError, HttpRequest, HttpResponse, Transport};

use crate::config::ClientConfig;
use crate::Error;

/// Settings shared by every connection a transport opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl From<&ClientConfig> for TransportSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            timeout: config.timeout,
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Production transport using a blocking reqwest client.
///
/// [`Transport::connect`] builds a fresh client, so fetch workers never
/// share a connection pool.
pub struct ReqwestTransport {
    client: Client,
    settings: TransportSettings,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Result<Self, Error> {
        let mut builder = Client::builder().user_agent(settings.user_agent.clone());
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self { client, settings })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        Self::new(config.into())
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    fn headers(request: &HttpRequest) -> Result<HeaderMap, CoreError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name =
                HeaderName::try_from(name.as_str()).map_err(|e| CoreError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            let header_value =
                HeaderValue::try_from(value.as_str()).map_err(|e| CoreError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("settings", &self.settings)
            .finish()
    }
}

fn transport_error(error: reqwest::Error) -> CoreError {
    let message = if error.is_timeout() {
        format!("request timed out: {}", error)
    } else {
        error.to_string()
    };
    CoreError::Transport {
        status: error.status().map(|s| s.as_u16()),
        message,
        body: None,
    }
}

impl Transport for ReqwestTransport {
    fn request(&self, request: &HttpRequest) -> Result<HttpResponse, CoreError> {
        let method: http::Method = request.method.into();
        let headers = Self::headers(request)?;

        let mut builder = self
            .client
            .request(method, request.url.as_str())
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().map_err(transport_error)?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("Unknown").to_string();

        let mut resp_headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                resp_headers.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
        }

        let body = response.bytes().map_err(transport_error)?;
        debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            "received response"
        );

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text,
            headers: resp_headers,
            body,
        })
    }

    fn connect(&self) -> Result<Arc<dyn Transport>, CoreError> {
        let transport = ReqwestTransport::new(self.settings.clone())?;
        Ok(Arc::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rabj_core::Method;

    fn settings() -> TransportSettings {
        TransportSettings {
            timeout: Some(Duration::from_secs(10)),
            user_agent: "rabj-tests".to_string(),
        }
    }

    #[test]
    fn transport_creation() {
        let transport = ReqwestTransport::new(settings()).unwrap();
        assert_eq!(transport.settings().user_agent, "rabj-tests");
    }

    #[test]
    fn settings_from_config() {
        let config = ClientConfig::new("http://h/").with_timeout(Duration::from_secs(3));
        let settings = TransportSettings::from(&config);
        assert_eq!(settings.timeout, Some(Duration::from_secs(3)));
        assert_eq!(settings.user_agent, config.user_agent);
    }

    #[test]
    fn connect_opens_independent_transport() {
        let transport = ReqwestTransport::new(settings()).unwrap();
        assert!(transport.connect().is_ok());
    }

    #[test]
    fn invalid_header_is_rejected_before_sending() {
        let transport = ReqwestTransport::new(settings()).unwrap();
        let request = HttpRequest::new(Method::GET, "http://127.0.0.1:9/")
            .with_header("bad header", "x");
        let err = transport.request(&request).unwrap_err();
        assert!(matches!(err, CoreError::InvalidHeader { .. }));
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        let transport = ReqwestTransport::new(TransportSettings {
            timeout: Some(Duration::from_secs(2)),
            user_agent: "rabj-tests".to_string(),
        })
        .unwrap();
        let err = transport
            .request(&HttpRequest::new(Method::GET, "http://127.0.0.1:9/"))
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.status(), None);
    }
}
