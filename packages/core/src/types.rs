use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::address::{AddressError, ResourceAddress};
use crate::params::Params;
use crate::Error;

/// Media type every RABJ request and response uses.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// HTTP verbs a resource understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
            Method::PUT => http::Method::PUT,
            Method::DELETE => http::Method::DELETE,
        }
    }
}

/// A fully encoded request, ready for a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL including any query string.
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// The body decoded as JSON, if there is one.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body
            .as_ref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }

    /// Query pairs decoded from the URL.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        Url::parse(&self.url)
            .map(|url| url.query_pairs().into_owned().collect())
            .unwrap_or_default()
    }
}

/// What the transport hands back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Status text (e.g., "OK", "Not Found")
    pub status_text: String,

    /// Response headers, names lowercased
    pub headers: BTreeMap<String, String>,

    pub body: Bytes,
}

impl HttpResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One verb invocation against one URL.
///
/// Built without I/O from a [`ResourceAddress`]; the access token is merged
/// into `params` at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Absolute URL without a query string.
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Raw body overriding the JSON-encoded params for non-GET verbs.
    pub body: Option<Bytes>,
    pub params: Params,
}

impl RequestDescriptor {
    pub fn new(method: Method, address: &ResourceAddress, params: Params) -> Self {
        Self {
            method,
            url: address.url().to_string(),
            headers: default_headers(),
            body: None,
            params: params.with_default_access_key(address.access_token()),
        }
    }

    pub fn get(address: &ResourceAddress, params: Params) -> Self {
        Self::new(Method::GET, address, params)
    }

    pub fn post(address: &ResourceAddress, params: Params) -> Self {
        Self::new(Method::POST, address, params)
    }

    pub fn put(address: &ResourceAddress, params: Params) -> Self {
        Self::new(Method::PUT, address, params)
    }

    pub fn delete(address: &ResourceAddress, params: Params) -> Self {
        Self::new(Method::DELETE, address, params)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Address the response should be resolved against.
    pub fn address(&self) -> Result<ResourceAddress, AddressError> {
        let address = ResourceAddress::parse(&self.url)?;
        Ok(match self.params.access_key() {
            Some(token) => address.with_access_token(token),
            None => address,
        })
    }

    /// Encode into the wire request.
    ///
    /// GET puts the params into the query string; other verbs send them as a
    /// JSON object body.
    pub fn to_http_request(&self) -> Result<HttpRequest, Error> {
        let mut url = Url::parse(&self.url).map_err(|e| AddressError::InvalidUrl {
            url: self.url.clone(),
            message: e.to_string(),
        })?;

        let body = match self.method {
            Method::GET => {
                let pairs = self.params.query_pairs();
                if !pairs.is_empty() {
                    url.query_pairs_mut().extend_pairs(pairs);
                }
                self.body.clone()
            }
            _ => match &self.body {
                Some(body) => Some(body.clone()),
                None => Some(Bytes::from(serde_json::to_vec(&self.params)?)),
            },
        };

        Ok(HttpRequest {
            method: self.method,
            url: url.to_string(),
            headers: self.headers.clone(),
            body,
        })
    }
}

/// Headers sent with every request.
pub fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Accept".to_string(), JSON_CONTENT_TYPE.to_string()),
        ("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string()),
    ])
}
