//! Result objects built from a completed HTTP exchange.
//!
//! Every adapted request settles with exactly one of these: a
//! [`SuccessResult`] when the underlying client reported success, or an
//! [`ErrorResult`] (wrapped in an [`Error`](crate::Error)) when it reported
//! failure.

use std::fmt;

use http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::Value;

use crate::ClientError;

/// Status code reported when the originating request has no response.
pub const NO_STATUS: i32 = -1;

/// The status line and headers of a received response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseHead {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseHead {
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        Self { status, headers }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Opaque handle to the request a result originated from.
///
/// A handle is created when a request is issued and is replaced by one
/// carrying the [`ResponseHead`] once the response arrives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestHandle {
    id: u64,
    method: Method,
    uri: Uri,
    response: Option<ResponseHead>,
}

impl RequestHandle {
    pub fn new(id: u64, method: Method, uri: Uri) -> Self {
        Self {
            id,
            method,
            uri,
            response: None,
        }
    }

    /// Returns a copy of this handle with the received response recorded.
    pub fn with_response(&self, response: ResponseHead) -> Self {
        Self {
            response: Some(response),
            ..self.clone()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn response(&self) -> Option<&ResponseHead> {
        self.response.as_ref()
    }

    /// The recorded response status, or [`NO_STATUS`].
    pub fn status_code(&self) -> i32 {
        self.response
            .as_ref()
            .map_or(NO_STATUS, |response| i32::from(response.status.as_u16()))
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {}", self.id, self.method, self.uri)
    }
}

fn status_code_of(request: Option<&RequestHandle>) -> i32 {
    request.map_or(NO_STATUS, RequestHandle::status_code)
}

/// Construction from the arguments of a success callback.
///
/// Implement this to have adapted requests resolve with a custom type.
pub trait FromSuccess: Send + 'static {
    fn from_success(request: Option<RequestHandle>, body: Option<Value>) -> Self;
}

/// Construction from the arguments of a failure callback.
///
/// `body` is the JSON extracted from the failing response data, if any.
pub trait FromFailure: Send + 'static {
    fn from_failure(
        request: Option<RequestHandle>,
        body: Option<Value>,
        error: Option<ClientError>,
    ) -> Self;

    /// Status code of the failed exchange, [`NO_STATUS`] when unavailable.
    fn status_code(&self) -> i32;
}

/// Outcome of a request the underlying client reported as successful.
#[derive(Clone, Debug, PartialEq)]
pub struct SuccessResult {
    status_code: i32,
    request: Option<RequestHandle>,
    body: Option<Value>,
}

impl SuccessResult {
    pub fn new(request: Option<RequestHandle>, body: Option<Value>) -> Self {
        Self {
            status_code: status_code_of(request.as_ref()),
            request,
            body,
        }
    }

    pub fn status_code(&self) -> i32 {
        self.status_code
    }

    pub fn request(&self) -> Option<&RequestHandle> {
        self.request.as_ref()
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn into_body(self) -> Option<Value> {
        self.body
    }

    /// Human readable dump of every field.
    pub fn inspect(&self) -> String {
        self.to_string()
    }
}

impl FromSuccess for SuccessResult {
    fn from_success(request: Option<RequestHandle>, body: Option<Value>) -> Self {
        Self::new(request, body)
    }
}

impl fmt::Display for SuccessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "statusCode: {}", self.status_code)?;
        writeln!(f, "request: {}", DisplayOption(self.request.as_ref()))?;
        write!(f, "body: {}", DisplayOption(self.body.as_ref()))
    }
}

/// Outcome of a request the underlying client reported as failed.
#[derive(Debug)]
pub struct ErrorResult {
    status_code: i32,
    request: Option<RequestHandle>,
    body: Option<Value>,
    error: Option<ClientError>,
}

impl ErrorResult {
    pub fn new(
        request: Option<RequestHandle>,
        body: Option<Value>,
        error: Option<ClientError>,
    ) -> Self {
        Self {
            status_code: status_code_of(request.as_ref()),
            request,
            body,
            error,
        }
    }

    pub fn status_code(&self) -> i32 {
        self.status_code
    }

    pub fn request(&self) -> Option<&RequestHandle> {
        self.request.as_ref()
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn error(&self) -> Option<&ClientError> {
        self.error.as_ref()
    }

    pub fn into_parts(self) -> (Option<RequestHandle>, Option<Value>, Option<ClientError>) {
        (self.request, self.body, self.error)
    }

    /// Human readable dump of every field.
    pub fn inspect(&self) -> String {
        self.to_string()
    }
}

impl FromFailure for ErrorResult {
    fn from_failure(
        request: Option<RequestHandle>,
        body: Option<Value>,
        error: Option<ClientError>,
    ) -> Self {
        Self::new(request, body, error)
    }

    fn status_code(&self) -> i32 {
        self.status_code
    }
}

impl fmt::Display for ErrorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "statusCode: {}", self.status_code)?;
        writeln!(f, "request: {}", DisplayOption(self.request.as_ref()))?;
        writeln!(f, "body: {}", DisplayOption(self.body.as_ref()))?;
        write!(f, "error: {}", DisplayOption(self.error.as_ref()))
    }
}

struct DisplayOption<T>(Option<T>);

impl<T: fmt::Display> fmt::Display for DisplayOption<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("none"),
        }
    }
}
