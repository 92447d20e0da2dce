//! The JSON envelope wrapping every RABJ response.
//!
//! ```text
//! { "status": {"code": 200}, "result": ... }
//! { "status": {"code": 404}, "error": {"code": 404, "class": "...", "detail": {"msg": "...", "alternatives": [...], "in": "..."}} }
//! ```
//!
//! The server answers with transport success even when the operation failed,
//! so the embedded status code decides between result and error.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::types::{HttpResponse, JSON_CONTENT_TYPE};
use crate::Error;

/// Embedded status code of a successful envelope.
pub const STATUS_OK: i64 = 200;

/// The structured description of an application-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: i64,
    pub class: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}. Msg: {}.", self.code, self.class, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " Error in {}", location)?;
        }
        if let Some(alternatives) = &self.alternatives {
            write!(f, " try {} instead", alternatives.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct WireEnvelope {
    status: WireStatus,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Deserialize)]
struct WireStatus {
    code: i64,
}

#[derive(Deserialize)]
struct WireError {
    code: i64,
    class: String,
    #[serde(default)]
    detail: WireDetail,
}

#[derive(Deserialize, Default)]
struct WireDetail {
    #[serde(default)]
    msg: Option<Value>,
    #[serde(default)]
    alternatives: Option<Vec<Value>>,
    #[serde(default, rename = "in")]
    location: Option<String>,
}

impl From<WireError> for ErrorDetail {
    fn from(error: WireError) -> Self {
        let message = match error.detail.msg {
            Some(Value::String(msg)) => msg,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let alternatives = error.detail.alternatives.map(|alternatives| {
            alternatives
                .into_iter()
                .map(|alt| match alt {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect()
        });
        ErrorDetail {
            code: error.code,
            class: error.class,
            message,
            alternatives,
            location: error.detail.location,
        }
    }
}

/// A decoded response envelope.
///
/// Exactly one of [`result`](Envelope::result) and [`error`](Envelope::error)
/// is present: the result when the embedded status is 200, the error
/// otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    status_code: i64,
    result: Option<Value>,
    error: Option<ErrorDetail>,
    raw: Value,
}

impl Envelope {
    /// A successful envelope carrying `result`.
    pub fn success(result: Value) -> Self {
        let raw = serde_json::json!({"status": {"code": STATUS_OK}, "result": result});
        Envelope {
            status_code: STATUS_OK,
            result: Some(result),
            error: None,
            raw,
        }
    }

    /// A failed envelope. A detail code of 200 is reported as 500 so the
    /// envelope can never be both.
    pub fn failure(detail: ErrorDetail) -> Self {
        let status_code = if detail.code == STATUS_OK {
            500
        } else {
            detail.code
        };
        let raw = serde_json::json!({
            "status": {"code": status_code},
            "error": {
                "code": detail.code,
                "class": detail.class,
                "detail": {
                    "msg": detail.message,
                    "alternatives": detail.alternatives,
                    "in": detail.location,
                },
            },
        });
        Envelope {
            status_code,
            result: None,
            error: Some(detail),
            raw,
        }
    }

    /// Interpret a decoded JSON document as an envelope.
    ///
    /// Fails with [`Error::Json`] when the document lacks the envelope shape
    /// or reports a failure without an error object.
    pub fn from_value(raw: Value) -> Result<Self, Error> {
        let wire = WireEnvelope::deserialize(&raw)?;
        let status_code = wire.status.code;
        if status_code == STATUS_OK {
            return Ok(Envelope {
                status_code,
                result: Some(wire.result.unwrap_or(Value::Null)),
                error: None,
                raw,
            });
        }

        let error = wire.error.ok_or_else(|| {
            <serde_json::Error as serde::de::Error>::custom(format!(
                "envelope reports status {} without an error object",
                status_code
            ))
        })?;

        Ok(Envelope {
            status_code,
            result: None,
            error: Some(error.into()),
            raw,
        })
    }

    /// Parse a transport response into a successful envelope.
    ///
    /// * wrong content type → [`Error::Transport`]
    /// * undecodable body on a 2xx → [`Error::Decode`]
    /// * non-2xx that is not an error envelope → [`Error::Transport`]
    /// * envelope with a non-200 embedded status → [`Error::Application`]
    pub fn parse(status: u16, content_type: Option<&str>, body: &[u8]) -> Result<Self, Error> {
        let transport_ok = (200..300).contains(&status);
        let body_text = || String::from_utf8_lossy(body).into_owned();

        if !is_json(content_type) {
            warn!(status, content_type = ?content_type, "non-json response");
            return Err(Error::Transport {
                status: Some(status),
                message: format!(
                    "expected {} but got {}",
                    JSON_CONTENT_TYPE,
                    content_type.unwrap_or("no content type")
                ),
                body: Some(body_text()),
            });
        }

        let raw: Value = match serde_json::from_slice(body) {
            Ok(raw) => raw,
            Err(e) if transport_ok => {
                warn!(status, error = %e, "undecodable response body");
                return Err(Error::Decode {
                    status,
                    message: e.to_string(),
                    body: body_text(),
                });
            }
            Err(e) => {
                return Err(Error::Transport {
                    status: Some(status),
                    message: e.to_string(),
                    body: Some(body_text()),
                })
            }
        };

        let envelope = match Self::from_value(raw) {
            Ok(envelope) => envelope,
            Err(e) if transport_ok => {
                warn!(status, error = %e, "response is not an envelope");
                return Err(Error::Decode {
                    status,
                    message: e.to_string(),
                    body: body_text(),
                });
            }
            Err(e) => {
                return Err(Error::Transport {
                    status: Some(status),
                    message: e.to_string(),
                    body: Some(body_text()),
                })
            }
        };

        if !transport_ok && envelope.is_success() {
            return Err(Error::Transport {
                status: Some(status),
                message: "transport failure with a successful envelope".to_string(),
                body: Some(body_text()),
            });
        }

        envelope.check()
    }

    /// [`Envelope::parse`] applied to a transport response.
    pub fn from_response(response: &HttpResponse) -> Result<Self, Error> {
        Self::parse(response.status, response.content_type(), &response.body)
    }

    /// Turn a failed envelope into [`Error::Application`].
    pub fn check(self) -> Result<Self, Error> {
        match self.error {
            Some(detail) => Err(Error::Application {
                detail,
                envelope: self.raw,
            }),
            None => Ok(self),
        }
    }

    pub fn status_code(&self) -> i64 {
        self.status_code
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorDetail> {
        self.error.as_ref()
    }

    /// The envelope document as received.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Unwrap the result, or raise the application error.
    pub fn into_result(self) -> Result<Value, Error> {
        let checked = self.check()?;
        Ok(checked.result.unwrap_or(Value::Null))
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|media| media.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const JSON: Option<&str> = Some("application/json");

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn success_envelope_yields_result() {
        let envelope = Envelope::parse(
            200,
            JSON,
            &body(json!({"status": {"code": 200}, "result": {"id": "/q/1"}})),
        )
        .unwrap();
        assert!(envelope.is_success());
        assert_eq!(envelope.status_code(), 200);
        assert_eq!(envelope.result(), Some(&json!({"id": "/q/1"})));
        assert!(envelope.error().is_none());
    }

    #[test]
    fn charset_parameter_is_accepted() {
        let envelope = Envelope::parse(
            200,
            Some("application/json; charset=utf-8"),
            &body(json!({"status": {"code": 200}, "result": []})),
        );
        assert!(envelope.is_ok());
    }

    #[test]
    fn application_error_is_raised() {
        let err = Envelope::parse(
            200,
            JSON,
            &body(json!({
                "status": {"code": 404},
                "error": {
                    "code": 404,
                    "class": "not_found",
                    "detail": {"msg": "no queue", "alternatives": ["q2", "q3"], "in": "queues"}
                }
            })),
        )
        .unwrap_err();
        let detail = err.application().unwrap();
        assert_eq!(detail.code, 404);
        assert_eq!(detail.class, "not_found");
        assert_eq!(detail.message, "no queue");
        assert_eq!(
            detail.alternatives,
            Some(vec!["q2".to_string(), "q3".to_string()])
        );
        assert_eq!(detail.location.as_deref(), Some("queues"));
        assert_eq!(
            err.to_string(),
            "404 not_found. Msg: no queue. Error in queues try q2, q3 instead"
        );
    }

    #[test]
    fn error_envelope_on_transport_failure_is_application_error() {
        let err = Envelope::parse(
            400,
            JSON,
            &body(json!({
                "status": {"code": 400},
                "error": {"code": 400, "class": "bad_request", "detail": {"msg": "nope"}}
            })),
        )
        .unwrap_err();
        assert!(err.is_application());
    }

    #[test]
    fn wrong_content_type_is_transport_error() {
        let err = Envelope::parse(502, Some("text/html"), b"<html>bad gateway</html>").unwrap_err();
        assert!(matches!(
            err,
            Error::Transport {
                status: Some(502),
                ..
            }
        ));
        if let Error::Transport { body, .. } = err {
            assert_eq!(body.as_deref(), Some("<html>bad gateway</html>"));
        }

        let err = Envelope::parse(200, None, b"{}").unwrap_err();
        assert!(err.is_transport());
        assert!(!err.is_decode());
    }

    #[test]
    fn malformed_body_on_success_is_decode_error() {
        let err = Envelope::parse(200, JSON, b"{not json").unwrap_err();
        assert!(err.is_decode());
        assert!(err.is_transport());
    }

    #[test]
    fn malformed_body_on_failure_is_transport_error() {
        let err = Envelope::parse(500, JSON, b"{not json").unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[test]
    fn missing_status_is_decode_error() {
        let err = Envelope::parse(200, JSON, &body(json!({"result": 1}))).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn failure_without_error_object_is_rejected() {
        let err = Envelope::from_value(json!({"status": {"code": 500}})).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn successful_envelope_on_failed_transport_is_transport_error() {
        let err = Envelope::parse(
            503,
            JSON,
            &body(json!({"status": {"code": 200}, "result": 1})),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Transport {
                status: Some(503),
                ..
            }
        ));
    }

    #[test]
    fn transport_success_is_the_2xx_range() {
        let ok = body(json!({"status": {"code": 200}, "result": 1}));
        assert!(Envelope::parse(204, JSON, &ok).is_ok());
        assert!(Envelope::parse(299, JSON, &ok).is_ok());
        assert!(Envelope::parse(300, JSON, &ok).unwrap_err().is_transport());
        assert!(Envelope::parse(199, JSON, b"{").unwrap_err().is_transport());
        assert!(!Envelope::parse(199, JSON, b"{").unwrap_err().is_decode());
    }

    #[test]
    fn missing_result_is_null() {
        let envelope = Envelope::from_value(json!({"status": {"code": 200}})).unwrap();
        assert_eq!(envelope.result(), Some(&Value::Null));
        assert_eq!(envelope.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn failure_constructor_round_trips_through_from_value() {
        let detail = ErrorDetail {
            code: 409,
            class: "conflict".to_string(),
            message: "exists".to_string(),
            alternatives: None,
            location: Some("queue".to_string()),
        };
        let envelope = Envelope::failure(detail.clone());
        let reparsed = Envelope::from_value(envelope.raw().clone()).unwrap();
        assert_eq!(reparsed.error(), Some(&detail));
        assert!(reparsed.result().is_none());
    }

    #[test]
    fn non_string_message_is_rendered() {
        let envelope = Envelope::from_value(json!({
            "status": {"code": 500},
            "error": {"code": 500, "class": "internal", "detail": {"msg": {"why": "x"}}}
        }))
        .unwrap();
        assert_eq!(envelope.error().unwrap().message, r#"{"why":"x"}"#);
    }

    proptest! {
        /// Exactly one of result and error is present, and the status decides which.
        #[test]
        fn prop_envelope_duality(code in 100i64..600, payload in "[a-z]{0,8}") {
            let raw = if code == 200 {
                json!({"status": {"code": code}, "result": payload})
            } else {
                json!({
                    "status": {"code": code},
                    "error": {"code": code, "class": "c", "detail": {"msg": payload}}
                })
            };
            let envelope = Envelope::from_value(raw).unwrap();
            prop_assert!(envelope.result().is_some() != envelope.error().is_some());
            prop_assert_eq!(code == 200, envelope.result().is_some());
            prop_assert_eq!(code != 200, envelope.error().is_some());
        }

        #[test]
        fn prop_constructed_envelopes_are_exclusive(code in 0i64..1000, ok in any::<bool>()) {
            let envelope = if ok {
                Envelope::success(json!(code))
            } else {
                Envelope::failure(ErrorDetail {
                    code,
                    class: "c".to_string(),
                    message: String::new(),
                    alternatives: None,
                    location: None,
                })
            };
            prop_assert!(envelope.result().is_some() != envelope.error().is_some());
            prop_assert_eq!(envelope.status_code() == STATUS_OK, envelope.is_success());
        }
    }
}
