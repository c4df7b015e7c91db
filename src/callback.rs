//! The callback-style client contract that requests are adapted from.

use http::Method;
use serde_json::{Map, Value};

use crate::{ClientError, MultipartFormData, RequestHandle};

/// Request parameters: a query string for GET/HEAD/DELETE, a JSON body for
/// POST/PUT/PATCH, text fields for multipart POST.
pub type Parameters = Map<String, Value>;

/// Invoked once with the completed request and its decoded body.
pub type OnSuccess = Box<dyn FnOnce(RequestHandle, Option<Value>) + Send>;

/// Invoked once with the request (when one was created) and the failure.
pub type OnFailure = Box<dyn FnOnce(Option<RequestHandle>, ClientError) + Send>;

/// Success callback of HEAD requests, which never carry a body.
pub type OnHeadSuccess = Box<dyn FnOnce(RequestHandle) + Send>;

/// Fills in a multipart body before the request is sent.
pub type ConstructingBody = Box<dyn FnOnce(&mut MultipartFormData) + Send>;

/// A single request as handed to [`CallbackClient::dispatch`].
pub struct Call {
    pub method: Method,
    pub path: String,
    pub parameters: Option<Parameters>,
    pub constructing_body: Option<ConstructingBody>,
}

impl Call {
    pub fn new(method: Method, path: impl Into<String>, parameters: Option<Parameters>) -> Self {
        Self {
            method,
            path: path.into(),
            parameters,
            constructing_body: None,
        }
    }

    pub fn multipart(
        path: impl Into<String>,
        parameters: Option<Parameters>,
        constructing_body: ConstructingBody,
    ) -> Self {
        Self {
            constructing_body: Some(constructing_body),
            ..Self::new(Method::POST, path, parameters)
        }
    }

    pub fn is_multipart(&self) -> bool {
        self.constructing_body.is_some()
    }
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("parameters", &self.parameters)
            .field("multipart", &self.is_multipart())
            .finish()
    }
}

/// An HTTP client that reports completion through a pair of callbacks.
///
/// Implementations must invoke exactly one of `on_success` or `on_failure`,
/// exactly once, for every dispatched call.
pub trait CallbackClient: Send + Sync {
    fn dispatch(&self, call: Call, on_success: OnSuccess, on_failure: OnFailure);

    fn get(
        &self,
        path: &str,
        parameters: Option<Parameters>,
        on_success: OnSuccess,
        on_failure: OnFailure,
    ) {
        self.dispatch(Call::new(Method::GET, path, parameters), on_success, on_failure)
    }

    fn head(
        &self,
        path: &str,
        parameters: Option<Parameters>,
        on_success: OnHeadSuccess,
        on_failure: OnFailure,
    ) {
        self.dispatch(
            Call::new(Method::HEAD, path, parameters),
            Box::new(move |request, _| on_success(request)),
            on_failure,
        )
    }

    fn post(
        &self,
        path: &str,
        parameters: Option<Parameters>,
        on_success: OnSuccess,
        on_failure: OnFailure,
    ) {
        self.dispatch(Call::new(Method::POST, path, parameters), on_success, on_failure)
    }

    fn post_multipart(
        &self,
        path: &str,
        parameters: Option<Parameters>,
        constructing_body: ConstructingBody,
        on_success: OnSuccess,
        on_failure: OnFailure,
    ) {
        self.dispatch(
            Call::multipart(path, parameters, constructing_body),
            on_success,
            on_failure,
        )
    }

    fn put(
        &self,
        path: &str,
        parameters: Option<Parameters>,
        on_success: OnSuccess,
        on_failure: OnFailure,
    ) {
        self.dispatch(Call::new(Method::PUT, path, parameters), on_success, on_failure)
    }

    fn patch(
        &self,
        path: &str,
        parameters: Option<Parameters>,
        on_success: OnSuccess,
        on_failure: OnFailure,
    ) {
        self.dispatch(Call::new(Method::PATCH, path, parameters), on_success, on_failure)
    }

    fn delete(
        &self,
        path: &str,
        parameters: Option<Parameters>,
        on_success: OnSuccess,
        on_failure: OnFailure,
    ) {
        self.dispatch(Call::new(Method::DELETE, path, parameters), on_success, on_failure)
    }
}
