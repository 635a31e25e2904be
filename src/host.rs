//! The contract between produced functions and the serverless host.
//!
//! The host owns a [`HostContext`] per invocation: the raw request, a
//! response slot the function writes exactly once, and a logging sink. It
//! calls [`ServerlessFunction::invoke`] and reads the response back out of
//! [`ResponseWriter`] once the future resolves.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::error::FunctionError;
use crate::logging::InvocationLog;

/// A host-callable invocation function.
///
/// Produced by the terminal methods of the function builders. Implementations
/// hold only immutable configuration, so one value can serve concurrent
/// invocations.
#[async_trait]
pub trait ServerlessFunction: Send + Sync {
    /// Runs one invocation against the host context.
    ///
    /// # Errors
    ///
    /// Authorization failures are answered in the response and return
    /// `Ok(())`. Handler failures are returned for the host's own error path.
    async fn invoke(&self, host: &HostContext) -> Result<(), FunctionError>;
}

#[async_trait]
impl<F> ServerlessFunction for Arc<F>
where
    F: ServerlessFunction + ?Sized,
{
    async fn invoke(&self, host: &HostContext) -> Result<(), FunctionError> {
        (**self).invoke(host).await
    }
}

/// Per-invocation state provided by the host.
#[derive(Debug)]
pub struct HostContext {
    /// The raw trigger request
    pub req: HostRequest,
    /// Response slot written by the function
    pub res: ResponseWriter,
    /// Structured logging sink
    pub log: InvocationLog,
}

impl HostContext {
    /// Creates a context for a new invocation of `function_name`.
    ///
    /// A fresh invocation id is generated for the log sink.
    pub fn new(function_name: &str, req: HostRequest) -> Self {
        let invocation_id = uuid::Uuid::new_v4().to_string();
        Self {
            req,
            res: ResponseWriter::new(),
            log: InvocationLog::new(invocation_id, function_name),
        }
    }

    /// Removes and returns the response written during the invocation.
    pub fn take_response(&self) -> Option<HostResponse> {
        self.res.take()
    }
}

/// The raw request as the host received it.
#[derive(Debug, Clone, Default)]
pub struct HostRequest {
    /// HTTP method
    pub method: Method,
    /// Request URI
    pub uri: Uri,
    /// Request headers, including credentials
    pub headers: HeaderMap,
    /// Unparsed request body
    pub body: Bytes,
}

impl HostRequest {
    /// Creates an empty request.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and the matching content type.
    pub fn with_json(self, value: &Value) -> Self {
        self.with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )
        .with_body(value.to_string())
    }

    /// Returns a header value as a string, if present and visible ASCII.
    pub fn header_str(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the parsed `Content-Type`, if present and well formed.
    pub fn content_type(&self) -> Option<mime::Mime> {
        self.header_str(header::CONTENT_TYPE)
            .and_then(|v| v.parse().ok())
    }
}

/// A response as written back to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
}

impl HostResponse {
    /// Creates a response with a status and no body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a JSON response.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(Self {
            status,
            headers,
            body: body.into(),
        })
    }

    /// Creates a plain-text response.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let body: String = body.into();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self {
            status,
            headers,
            body: Bytes::from(body),
        }
    }

    /// Parses the body as JSON.
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Writable response slot shared between the host and the function.
///
/// Clones refer to the same slot. A later write replaces an earlier one.
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter {
    slot: Arc<Mutex<Option<HostResponse>>>,
}

impl ResponseWriter {
    /// Creates an empty response slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a complete response.
    pub fn send(&self, response: HostResponse) {
        *self.slot.lock() = Some(response);
    }

    /// Writes a bodiless response with `status`.
    pub fn status(&self, status: StatusCode) {
        self.send(HostResponse::new(status));
    }

    /// Writes `value` as a `200 OK` JSON response.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), serde_json::Error> {
        self.json_with_status(StatusCode::OK, value)
    }

    /// Writes `value` as a JSON response with `status`.
    pub fn json_with_status<T: Serialize + ?Sized>(
        &self,
        status: StatusCode,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        self.send(HostResponse::json(status, value)?);
        Ok(())
    }

    /// Writes a plain-text response.
    pub fn text(&self, status: StatusCode, body: impl Into<String>) {
        self.send(HostResponse::text(status, body));
    }

    /// Returns true once something has been written.
    pub fn is_written(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Returns a copy of the current response.
    pub fn get(&self) -> Option<HostResponse> {
        self.slot.lock().clone()
    }

    /// Removes and returns the current response.
    pub fn take(&self) -> Option<HostResponse> {
        self.slot.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writer_clones_share_slot() {
        let writer = ResponseWriter::new();
        let handle = writer.clone();

        handle.status(StatusCode::NO_CONTENT);

        assert!(writer.is_written());
        assert_eq!(writer.take().unwrap().status, StatusCode::NO_CONTENT);
        assert!(!handle.is_written());
    }

    #[test]
    fn json_response_sets_content_type() {
        let writer = ResponseWriter::new();
        writer.json(&json!({"ok": true})).unwrap();

        let response = writer.get().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(response.json_body(), Some(json!({"ok": true})));
    }

    #[test]
    fn request_content_type_parses_parameters() {
        let req = HostRequest::default().with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=xyz"),
        );

        let content_type = req.content_type().unwrap();
        assert_eq!(content_type.essence_str(), "multipart/form-data");
        assert_eq!(content_type.get_param(mime::BOUNDARY).unwrap(), "xyz");
    }

    #[test]
    fn host_context_generates_invocation_id() {
        let a = HostContext::new("ping", HostRequest::default());
        let b = HostContext::new("ping", HostRequest::default());

        assert_ne!(a.log.invocation_id(), b.log.invocation_id());
        assert_eq!(a.log.function_name(), "ping");
    }
}
