//! HTTP execution abstraction.
//!
//! The core never names a concrete HTTP client. Implementations execute one
//! encoded request and hand back status, headers and body; the
//! [`mock`] module provides one for tests.

use std::sync::Arc;

use crate::types::{HttpRequest, HttpResponse};
use crate::Error;

/// Trait for executing HTTP requests.
pub trait Transport: Send + Sync {
    /// Execute a request.
    ///
    /// Returns [`Error::Transport`] when no response could be obtained. Any
    /// response that arrives, whatever its status, is returned as `Ok`.
    fn request(&self, request: &HttpRequest) -> Result<HttpResponse, Error>;

    /// Open an independent connection with the same settings.
    ///
    /// Fetch workers call this once each so that no two in-flight requests
    /// share connection state.
    fn connect(&self) -> Result<Arc<dyn Transport>, Error>;
}

/// Mock transport for testing.
///
/// Returns canned responses by URL path, records every request, and can
/// inject failures and delays. All clones (including connections opened via
/// [`Transport::connect`]) share the same state.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use bytes::Bytes;
    use serde_json::{json, Value};
    use url::Url;

    use crate::types::{Method, JSON_CONTENT_TYPE};

    type Responder = dyn Fn(&HttpRequest) -> Option<Result<HttpResponse, Error>> + Send + Sync;

    #[derive(Clone)]
    enum Reply {
        Respond(HttpResponse),
        Fail(String),
    }

    #[derive(Clone)]
    struct Route {
        method: Option<Method>,
        path: String,
        reply: Reply,
    }

    /// A mock transport that returns predefined responses.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        routes: Arc<Mutex<Vec<Route>>>,
        delays: Arc<Mutex<BTreeMap<String, Duration>>>,
        responder: Arc<Mutex<Option<Arc<Responder>>>>,
        recorded_requests: Arc<Mutex<Vec<HttpRequest>>>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        connections: Arc<AtomicUsize>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Respond to any verb on `path`.
        pub fn with_response(self, path: impl Into<String>, response: HttpResponse) -> Self {
            self.push_route(None, path.into(), Reply::Respond(response));
            self
        }

        /// Respond to one verb on `path`.
        pub fn with_method_response(
            self,
            method: Method,
            path: impl Into<String>,
            response: HttpResponse,
        ) -> Self {
            self.push_route(Some(method), path.into(), Reply::Respond(response));
            self
        }

        /// Fail every request to `path` with a connection error.
        pub fn fail_path(self, path: impl Into<String>, message: impl Into<String>) -> Self {
            self.push_route(None, path.into(), Reply::Fail(message.into()));
            self
        }

        /// Sleep before answering requests to `path`.
        pub fn with_delay(self, path: impl Into<String>, delay: Duration) -> Self {
            self.delays
                .lock()
                .unwrap()
                .insert(path.into(), delay);
            self
        }

        /// Consulted before the routes; return `None` to fall through.
        pub fn with_responder<F>(self, responder: F) -> Self
        where
            F: Fn(&HttpRequest) -> Option<Result<HttpResponse, Error>> + Send + Sync + 'static,
        {
            *self.responder.lock().unwrap() = Some(Arc::new(responder));
            self
        }

        /// Get all recorded requests.
        pub fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.recorded_requests.lock().unwrap().clone()
        }

        /// Clear recorded requests.
        pub fn clear_recorded(&self) {
            self.recorded_requests.lock().unwrap().clear();
        }

        /// Highest number of requests observed executing at once.
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        /// Number of times [`Transport::connect`] was called.
        pub fn connections(&self) -> usize {
            self.connections.load(Ordering::SeqCst)
        }

        /// A 200 JSON response carrying a successful envelope.
        pub fn envelope_response(result: Value) -> HttpResponse {
            Self::json_response(200, json!({"status": {"code": 200}, "result": result}))
        }

        /// A 200 JSON response carrying an error envelope.
        pub fn error_envelope_response(code: i64, class: &str, msg: &str) -> HttpResponse {
            Self::json_response(
                200,
                json!({
                    "status": {"code": code},
                    "error": {"code": code, "class": class, "detail": {"msg": msg}}
                }),
            )
        }

        pub fn json_response(status: u16, body: Value) -> HttpResponse {
            Self::raw_response(status, JSON_CONTENT_TYPE, body.to_string())
        }

        pub fn raw_response(status: u16, content_type: &str, body: impl Into<Bytes>) -> HttpResponse {
            HttpResponse {
                status,
                status_text: http::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown")
                    .to_string(),
                headers: BTreeMap::from([("content-type".to_string(), content_type.to_string())]),
                body: body.into(),
            }
        }

        /// Create a 404 Not Found response.
        pub fn not_found() -> HttpResponse {
            Self::raw_response(404, "text/plain", "Not Found")
        }

        fn push_route(&self, method: Option<Method>, path: String, reply: Reply) {
            self.routes
                .lock()
                .unwrap()
                .push(Route { method, path, reply });
        }

        fn route_for(&self, request: &HttpRequest, path: &str) -> Option<Reply> {
            let routes = self.routes.lock().unwrap();
            routes
                .iter()
                .find(|r| r.path == path && r.method == Some(request.method))
                .or_else(|| routes.iter().find(|r| r.path == path && r.method.is_none()))
                .map(|r| r.reply.clone())
        }

        fn answer(&self, request: &HttpRequest, path: &str) -> Result<HttpResponse, Error> {
            let responder = self.responder.lock().unwrap().clone();
            if let Some(responder) = responder {
                if let Some(answer) = responder(request) {
                    return answer;
                }
            }

            match self.route_for(request, path) {
                Some(Reply::Respond(response)) => Ok(response),
                Some(Reply::Fail(message)) => Err(Error::connection(message)),
                None => Ok(Self::not_found()),
            }
        }
    }

    impl Transport for MockTransport {
        fn request(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
            self.recorded_requests.lock().unwrap().push(request.clone());

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let path = Url::parse(&request.url)
                .map(|url| url.path().to_string())
                .unwrap_or_default();
            let delay = self.delays.lock().unwrap().get(&path).copied();
            if let Some(delay) = delay {
                thread::sleep(delay);
            }

            let answer = self.answer(request, &path);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            answer
        }

        fn connect(&self) -> Result<Arc<dyn Transport>, Error> {
            self.connections.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(self.clone()))
        }
    }
}
