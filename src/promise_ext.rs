use tracing::{debug, trace};

use crate::{
    CallbackClient, CompletionSource, Error, ErrorResult, FromFailure, FromSuccess,
    MultipartFormData, OnFailure, OnSuccess, Parameters, Promise, SuccessResult,
};

/// Promise returned by the adapted verb functions.
pub type ResultPromise<S = SuccessResult, E = ErrorResult> = Promise<S, Error<E>>;

/// Future-returning versions of the [`CallbackClient`] verbs.
///
/// Each call issues exactly one underlying request and returns a pending
/// promise immediately. The promise resolves with the success result, or
/// rejects with an [`Error`] that [`Error::parse`] turns back into the error
/// result. The `_as` variants build caller supplied result types instead.
pub trait PromiseClientExt: CallbackClient {
    fn promise_get(&self, path: &str, parameters: Option<Parameters>) -> ResultPromise {
        self.promise_get_as(path, parameters)
    }

    fn promise_get_as<S, E>(
        &self,
        path: &str,
        parameters: Option<Parameters>,
    ) -> ResultPromise<S, E>
    where
        S: FromSuccess,
        E: FromFailure,
    {
        adapt(|on_success, on_failure| self.get(path, parameters, on_success, on_failure))
    }

    fn promise_head(&self, path: &str, parameters: Option<Parameters>) -> ResultPromise {
        self.promise_head_as(path, parameters)
    }

    fn promise_head_as<S, E>(
        &self,
        path: &str,
        parameters: Option<Parameters>,
    ) -> ResultPromise<S, E>
    where
        S: FromSuccess,
        E: FromFailure,
    {
        adapt(|on_success, on_failure| {
            self.head(
                path,
                parameters,
                Box::new(move |request| on_success(request, None)),
                on_failure,
            )
        })
    }

    fn promise_post(&self, path: &str, parameters: Option<Parameters>) -> ResultPromise {
        self.promise_post_as(path, parameters)
    }

    fn promise_post_as<S, E>(
        &self,
        path: &str,
        parameters: Option<Parameters>,
    ) -> ResultPromise<S, E>
    where
        S: FromSuccess,
        E: FromFailure,
    {
        adapt(|on_success, on_failure| self.post(path, parameters, on_success, on_failure))
    }

    fn promise_post_multipart<F>(
        &self,
        path: &str,
        parameters: Option<Parameters>,
        constructing_body: F,
    ) -> ResultPromise
    where
        F: FnOnce(&mut MultipartFormData) + Send + 'static,
    {
        self.promise_post_multipart_as(path, parameters, constructing_body)
    }

    fn promise_post_multipart_as<S, E, F>(
        &self,
        path: &str,
        parameters: Option<Parameters>,
        constructing_body: F,
    ) -> ResultPromise<S, E>
    where
        S: FromSuccess,
        E: FromFailure,
        F: FnOnce(&mut MultipartFormData) + Send + 'static,
    {
        adapt(|on_success, on_failure| {
            self.post_multipart(
                path,
                parameters,
                Box::new(constructing_body),
                on_success,
                on_failure,
            )
        })
    }

    fn promise_put(&self, path: &str, parameters: Option<Parameters>) -> ResultPromise {
        self.promise_put_as(path, parameters)
    }

    fn promise_put_as<S, E>(
        &self,
        path: &str,
        parameters: Option<Parameters>,
    ) -> ResultPromise<S, E>
    where
        S: FromSuccess,
        E: FromFailure,
    {
        adapt(|on_success, on_failure| self.put(path, parameters, on_success, on_failure))
    }

    fn promise_patch(&self, path: &str, parameters: Option<Parameters>) -> ResultPromise {
        self.promise_patch_as(path, parameters)
    }

    fn promise_patch_as<S, E>(
        &self,
        path: &str,
        parameters: Option<Parameters>,
    ) -> ResultPromise<S, E>
    where
        S: FromSuccess,
        E: FromFailure,
    {
        adapt(|on_success, on_failure| self.patch(path, parameters, on_success, on_failure))
    }

    fn promise_delete(&self, path: &str, parameters: Option<Parameters>) -> ResultPromise {
        self.promise_delete_as(path, parameters)
    }

    fn promise_delete_as<S, E>(
        &self,
        path: &str,
        parameters: Option<Parameters>,
    ) -> ResultPromise<S, E>
    where
        S: FromSuccess,
        E: FromFailure,
    {
        adapt(|on_success, on_failure| self.delete(path, parameters, on_success, on_failure))
    }
}

impl<C> PromiseClientExt for C where C: CallbackClient + ?Sized {}

/// Issues one request through `issue` and returns the promise its callbacks
/// settle.
///
/// The completion source exists before `issue` runs, so callbacks invoked
/// synchronously settle it just as well as asynchronous ones.
pub fn adapt<S, E, I>(issue: I) -> ResultPromise<S, E>
where
    S: FromSuccess,
    E: FromFailure,
    I: FnOnce(OnSuccess, OnFailure),
{
    let (source, promise) = CompletionSource::new();
    let failure_source = source.clone();

    issue(
        Box::new(move |request, body| {
            trace!("Resolving promise for request {}", request);
            if source.resolve(S::from_success(Some(request), body)).is_err() {
                debug!("Ignoring success callback for an already settled promise");
            }
        }),
        Box::new(move |request, error| {
            debug!("Rejecting promise: {}", error);
            if failure_source.reject(Error::create(request, error)).is_err() {
                debug!("Ignoring failure callback for an already settled promise");
            }
        }),
    );

    promise
}
