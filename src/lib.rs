//! Future-returning adapters over callback-based HTTP clients.
//!
//! A [`CallbackClient`] reports every request through a success/failure
//! callback pair. [`PromiseClientExt`] turns each of its verbs into a
//! function returning a [`Promise`] that resolves with a [`SuccessResult`] or
//! rejects with an [`Error`] carrying an [`ErrorResult`].
//!
//! [`SessionManager`] is a callback client over any [`HttpClient`] transport.

mod async_body;
mod callback;
mod completion;
mod config;
mod error;
mod multipart;
mod promise_ext;
mod request_builder_ext;
mod response_async_body_ext;
mod result;
mod session;

use std::{future::Future, pin::Pin};

pub use http;
pub use http::{Request, Response};
pub use serde_json::Value;

pub use crate::{
    async_body::AsyncBody,
    callback::{
        Call, CallbackClient, ConstructingBody, OnFailure, OnHeadSuccess, OnSuccess, Parameters,
    },
    completion::{CompletionSource, Promise},
    config::SessionConfig,
    error::{Cause, ClientError, Error, DOMAIN},
    multipart::{MultipartFormData, Part},
    promise_ext::{adapt, PromiseClientExt, ResultPromise},
    request_builder_ext::RequestBuilderExt,
    response_async_body_ext::ResponseAsyncBodyExt,
    result::{
        ErrorResult, FromFailure, FromSuccess, RequestHandle, ResponseHead, SuccessResult,
        NO_STATUS,
    },
    session::SessionManager,
};

/// A trait for defining an abstract HTTP client, runtime-agnostic.
pub trait HttpClient: Send + Sync {
    /// Send an HTTP request and return the response.
    fn send(
        &self,
        request: Request<AsyncBody>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Response<AsyncBody>>> + Send>>;
}

impl<R> HttpClient for R
where
    R: AsRef<dyn HttpClient> + Send + Sync,
{
    fn send(
        &self,
        request: Request<AsyncBody>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Response<AsyncBody>>> + Send>> {
        self.as_ref().send(request)
    }
}
