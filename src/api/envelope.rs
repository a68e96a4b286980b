use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::error;

use super::error::{ApiError, ApiResult, TransportError};

pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Fixed response shape used by every backend endpoint.
///
/// `code == 0` means success; any other value is an application error whose
/// `message` is meant for the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self {
            code: 0,
            message: None,
            data: Some(data),
        }
    }

    pub fn error(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Converts the envelope into a result. Absent success data becomes `{}`.
    pub fn into_result(self) -> ApiResult<Value> {
        if self.is_success() {
            return Ok(match self.data {
                Some(data) if !data.is_null() => data,
                _ => Value::Object(Map::new()),
            });
        }

        let reason = self
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
        Err(ApiError::Application(reason))
    }
}

/// Decodes whatever the transport produced into a result.
pub fn decode(raw: Result<Value, TransportError>) -> ApiResult<Value> {
    let value = raw?;
    let envelope: Envelope = serde_json::from_value(value)
        .map_err(|e| ApiError::Transport(format!("Malformed response envelope: {}", e)))?;
    envelope.into_result()
}

/// Like [`decode`], then deserializes the success payload into `T`.
pub fn decode_as<T: DeserializeOwned>(raw: Result<Value, TransportError>) -> ApiResult<T> {
    let data = decode(raw)?;
    serde_json::from_value(data)
        .map_err(|e| ApiError::Transport(format!("Unexpected response payload: {}", e)))
}

/// Destination for errors nobody handled explicitly.
pub trait ErrorSink: Send + Sync {
    fn report(&self, err: &ApiError);
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, err: &ApiError) {
        error!("Unhandled API error: {}", err);
    }
}

/// Routes results to handlers, falling back to a default sink for errors.
#[derive(Clone)]
pub struct Dispatcher {
    fallback: Arc<dyn ErrorSink>,
}

impl Dispatcher {
    pub fn new(fallback: Arc<dyn ErrorSink>) -> Self {
        Self { fallback }
    }

    pub fn dispatch<T, R>(
        &self,
        result: ApiResult<T>,
        on_success: impl FnOnce(T) -> R,
        on_error: impl FnOnce(ApiError) -> R,
    ) -> R {
        match result {
            Ok(value) => on_success(value),
            Err(err) => on_error(err),
        }
    }

    /// Success goes to `on_success`; errors go to the fallback sink.
    pub fn dispatch_or_report<T>(&self, result: ApiResult<T>, on_success: impl FnOnce(T)) {
        match result {
            Ok(value) => on_success(value),
            Err(err) => self.fallback.report(&err),
        }
    }

    /// Returns the success value, reporting the error through the fallback sink otherwise.
    pub fn settle<T>(&self, result: ApiResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.fallback.report(&err);
                None
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(LogSink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<String>>,
    }

    impl ErrorSink for RecordingSink {
        fn report(&self, err: &ApiError) {
            self.seen.lock().push(err.reason().to_string());
        }
    }

    #[test]
    fn test_success_with_payload() {
        let result = decode(Ok(json!({"code": 0, "message": null, "data": [1, 2]})));
        assert_eq!(result, Ok(json!([1, 2])));
    }

    #[test]
    fn test_success_without_data_defaults_to_empty_object() {
        assert_eq!(decode(Ok(json!({"code": 0}))), Ok(json!({})));
        assert_eq!(
            decode(Ok(json!({"code": 0, "message": "ok", "data": null}))),
            Ok(json!({}))
        );
    }

    #[test]
    fn test_error_uses_backend_message() {
        let result = decode(Ok(json!({"code": -1, "message": "not found", "data": null})));
        assert_eq!(result, Err(ApiError::Application("not found".to_string())));
    }

    #[test]
    fn test_error_without_message_is_unknown() {
        assert_eq!(
            decode(Ok(json!({"code": 3}))),
            Err(ApiError::Application(UNKNOWN_ERROR.to_string()))
        );
        assert_eq!(
            decode(Ok(json!({"code": -1, "message": "  "}))),
            Err(ApiError::Application(UNKNOWN_ERROR.to_string()))
        );
    }

    #[test]
    fn test_transport_failures_become_errors() {
        let status = decode(Err(TransportError::Status {
            status: 500,
            status_text: "Internal Server Error".to_string(),
        }));
        assert_eq!(
            status,
            Err(ApiError::Transport("HTTP 500: Internal Server Error".to_string()))
        );

        let network = decode(Err(TransportError::Network("connection refused".to_string())));
        assert_eq!(network.unwrap_err().reason(), "connection refused");
    }

    #[test]
    fn test_non_envelope_json_is_rejected() {
        let result = decode(Ok(json!([{"alias": "a1"}])));
        match result {
            Err(ApiError::Transport(reason)) => {
                assert!(reason.starts_with("Malformed response envelope"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_as_typed_payload() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Deleted {
            deleted: u32,
        }

        let ok: ApiResult<Deleted> = decode_as(Ok(json!({"code": 0, "data": {"deleted": 1}})));
        assert_eq!(ok, Ok(Deleted { deleted: 1 }));

        let wrong: ApiResult<Deleted> = decode_as(Ok(json!({"code": 0, "data": "nope"})));
        assert!(matches!(wrong, Err(ApiError::Transport(_))));
    }

    #[test]
    fn test_dispatch_routes_by_variant() {
        let dispatcher = Dispatcher::default();
        let ok = dispatcher.dispatch(Ok::<_, ApiError>(2), |v| v * 10, |_| 0);
        assert_eq!(ok, 20);

        let err = dispatcher.dispatch(
            Err::<i32, _>(ApiError::Application("boom".to_string())),
            |_| String::new(),
            |e| e.reason().to_string(),
        );
        assert_eq!(err, "boom");
    }

    #[test]
    fn test_missing_handler_falls_back_to_sink() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(sink.clone());

        dispatcher.dispatch_or_report(
            Err::<(), _>(ApiError::Transport("HTTP 503: Service Unavailable".to_string())),
            |_| panic!("success handler must not run"),
        );
        assert_eq!(dispatcher.settle(Ok::<_, ApiError>(5)), Some(5));
        assert_eq!(
            dispatcher.settle::<u8>(Err(ApiError::Application("denied".to_string()))),
            None
        );

        let seen = sink.seen.lock();
        assert_eq!(seen.as_slice(), ["HTTP 503: Service Unavailable", "denied"]);
    }
}
