use std::{
    ops::Range,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use futures::task::{Spawn, SpawnExt};
use http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method, Request, Response, Uri,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    AsyncBody, Call, CallbackClient, ClientError, HttpClient, MultipartFormData, OnFailure,
    OnSuccess, Parameters, RequestBuilderExt, RequestHandle, ResponseAsyncBodyExt, ResponseHead,
    SessionConfig,
};

/// A [`CallbackClient`] that sends requests through an [`HttpClient`].
///
/// Requests run on the given executor, so callbacks are invoked off the
/// caller's thread. Responses with an acceptable status are decoded as JSON.
pub struct SessionManager<C> {
    client: C,
    spawner: Arc<dyn Spawn + Send + Sync>,
    config: SessionConfig,
    next_id: AtomicU64,
}

impl<C> SessionManager<C>
where
    C: HttpClient,
{
    pub fn new<S>(client: C, spawner: S) -> Self
    where
        S: Spawn + Send + Sync + 'static,
    {
        Self::with_config(client, spawner, SessionConfig::default())
    }

    pub fn with_config<S>(client: C, spawner: S, config: SessionConfig) -> Self
    where
        S: Spawn + Send + Sync + 'static,
    {
        debug!("Creating SessionManager with base URL {:?}", config.base_url);
        Self {
            client,
            spawner: Arc::new(spawner),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn build_request(
        &self,
        call: Call,
    ) -> Result<(RequestHandle, Request<AsyncBody>), (Option<RequestHandle>, ClientError)> {
        let Call {
            method,
            path,
            parameters,
            constructing_body,
        } = call;

        let mut url = self.config.resolve(&path).map_err(|e| (None, e))?;
        let in_query = matches!(method, Method::GET | Method::HEAD | Method::DELETE);
        if in_query {
            if let Some(parameters) = &parameters {
                let pairs = query_pairs(parameters);
                if !pairs.is_empty() {
                    url.query_pairs_mut().extend_pairs(pairs);
                }
            }
        }

        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e: http::uri::InvalidUri| (None, ClientError::Build(e.into())))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = RequestHandle::new(id, method.clone(), uri.clone());

        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .headers(&self.config.default_headers);

        let request = match (constructing_body, &parameters) {
            (Some(constructing_body), _) => {
                let mut form = MultipartFormData::new();
                if let Some(parameters) = &parameters {
                    for (name, value) in query_pairs(parameters) {
                        form.append_text(name, value);
                    }
                }
                constructing_body(&mut form);
                debug!("Encoded {} multipart part(s)", form.parts().len());
                builder
                    .header(CONTENT_TYPE, form.content_type())
                    .body(form.encode().into())
                    .map_err(anyhow::Error::from)
            }
            (None, Some(parameters)) if !in_query => builder.json(parameters),
            (None, _) => builder.end(),
        };

        match request {
            Ok(request) => Ok((handle, request)),
            Err(e) => Err((Some(handle), ClientError::Build(e))),
        }
    }
}

impl<C> CallbackClient for SessionManager<C>
where
    C: HttpClient,
{
    fn dispatch(&self, call: Call, on_success: OnSuccess, on_failure: OnFailure) {
        let (handle, request) = match self.build_request(call) {
            Ok(built) => built,
            Err((handle, e)) => {
                warn!("Failed to build request: {}", e);
                on_failure(handle, e);
                return;
            }
        };

        debug!("Sending request {}", handle);
        let send = self.client.send(request);
        let acceptable = self.config.acceptable_status.clone();
        let unsent = handle.clone();

        // Shared with the task so a refused spawn can still report failure.
        let on_failure = Arc::new(Mutex::new(Some(on_failure)));
        let slot = Arc::clone(&on_failure);

        let task = async move {
            let Some(on_failure) = take(&slot) else {
                return;
            };
            match send.await {
                Ok(response) => {
                    complete(handle, response, acceptable, on_success, on_failure).await
                }
                Err(e) => {
                    error!("Request {} failed: {}", handle, e);
                    on_failure(Some(handle), ClientError::Transport(e));
                }
            }
        };

        if let Err(e) = self.spawner.spawn(task) {
            error!("Failed to spawn request {}: {}", unsent, e);
            if let Some(on_failure) = take(&on_failure) {
                on_failure(Some(unsent), ClientError::Spawn(e));
            }
        }
    }
}

fn take(slot: &Mutex<Option<OnFailure>>) -> Option<OnFailure> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

async fn complete(
    handle: RequestHandle,
    response: Response<AsyncBody>,
    acceptable: Range<u16>,
    on_success: OnSuccess,
    on_failure: OnFailure,
) {
    let status = response.status();
    let handle = handle.with_response(ResponseHead::new(status, response.headers().clone()));

    if !acceptable.contains(&status.as_u16()) {
        warn!("Request {} returned unacceptable status: {}", handle, status);
        let data = response.bytes().await.unwrap_or_else(|e| {
            warn!("Failed to read failing response body: {}", e);
            Vec::new()
        });
        on_failure(Some(handle), ClientError::Status { status, data });
        return;
    }

    info!("Request {} succeeded with status: {}", handle, status);
    if handle.method() == Method::HEAD {
        on_success(handle, None);
        return;
    }

    let data = match response.bytes().await {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to read response body: {}", e);
            on_failure(Some(handle), ClientError::Body { status, source: e });
            return;
        }
    };

    if data.iter().all(u8::is_ascii_whitespace) {
        on_success(handle, None);
        return;
    }

    match serde_json::from_slice::<Value>(&data) {
        Ok(body) => on_success(handle, Some(body)),
        Err(source) => {
            warn!("Failed to decode response body: {}", source);
            on_failure(Some(handle), ClientError::Decode { data, source });
        }
    }
}

/// Flattens parameters into form pairs: nested objects become `key[sub]`,
/// arrays `key[]`.
fn query_pairs(parameters: &Parameters) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in parameters {
        flatten(key.clone(), value, &mut pairs);
    }
    pairs
}

fn flatten(key: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (sub, value) in map {
                flatten(format!("{key}[{sub}]"), value, pairs);
            }
        }
        Value::Array(items) => {
            for value in items {
                flatten(format!("{key}[]"), value, pairs);
            }
        }
        Value::Null => pairs.push((key, String::new())),
        Value::String(value) => pairs.push((key, value.clone())),
        other => pairs.push((key, other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        pin::Pin,
        sync::{mpsc, Mutex},
        time::Duration,
    };

    use futures::{
        executor::ThreadPool,
        io::{self, AsyncRead},
        task::{Context, FutureObj, Poll, SpawnError},
    };
    use http::{header::USER_AGENT, StatusCode};
    use serde_json::json;

    use super::*;

    type Handler =
        Box<dyn Fn(&Request<Vec<u8>>) -> anyhow::Result<Response<AsyncBody>> + Send + Sync>;

    /// Transport that records requests and answers through `handler`.
    struct MockClient {
        seen: Arc<Mutex<Vec<Request<Vec<u8>>>>>,
        handler: Handler,
    }

    impl MockClient {
        fn new(
            handler: impl Fn(&Request<Vec<u8>>) -> anyhow::Result<Response<AsyncBody>>
                + Send
                + Sync
                + 'static,
        ) -> Self {
            Self {
                seen: Arc::new(Mutex::new(Vec::new())),
                handler: Box::new(handler),
            }
        }

        fn respond(status: u16, body: &'static str) -> Self {
            Self::new(move |_| {
                Ok(Response::builder()
                    .status(status)
                    .body(AsyncBody::from(body))
                    .unwrap())
            })
        }
    }

    impl HttpClient for MockClient {
        fn send(
            &self,
            request: Request<AsyncBody>,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<Response<AsyncBody>>> + Send>> {
            let (parts, body) = request.into_parts();
            let body = futures::executor::block_on(Response::new(body).bytes()).unwrap();
            let request = Request::from_parts(parts, body);
            let outcome = (self.handler)(&request);
            self.seen.lock().unwrap().push(request);
            Box::pin(async move { outcome })
        }
    }

    enum Outcome {
        Success(RequestHandle, Option<Value>),
        Failure(Option<RequestHandle>, ClientError),
    }

    fn session(client: MockClient) -> SessionManager<MockClient> {
        let config = SessionConfig::new()
            .base_url("http://localhost/api")
            .unwrap()
            .default_header(USER_AGENT, HeaderValue::from_static("session-test"));
        SessionManager::with_config(client, ThreadPool::new().unwrap(), config)
    }

    fn run(session: &SessionManager<MockClient>, call: Call) -> Outcome {
        let (tx, rx) = mpsc::channel();
        let failure_tx = tx.clone();
        session.dispatch(
            call,
            Box::new(move |request, body| {
                tx.send(Outcome::Success(request, body)).unwrap();
            }),
            Box::new(move |request, error| {
                failure_tx.send(Outcome::Failure(request, error)).unwrap();
            }),
        );
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    fn params(value: Value) -> Option<Parameters> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    #[test]
    fn get_encodes_parameters_into_the_query() {
        let session = session(MockClient::respond(200, r#"{"id":1}"#));
        let call = Call::new(
            Method::GET,
            "/items",
            params(json!({ "filter": { "kind": "new" }, "page": 2, "tags": ["a", "b"] })),
        );

        let Outcome::Success(handle, body) = run(&session, call) else {
            panic!("expected success");
        };
        assert_eq!(handle.status_code(), 200);
        assert_eq!(body, Some(json!({ "id": 1 })));

        let seen = session.client().seen.lock().unwrap();
        let request = &seen[0];
        assert_eq!(request.method(), Method::GET);
        assert_eq!(
            request.uri().to_string(),
            "http://localhost/api/items?filter%5Bkind%5D=new&page=2&tags%5B%5D=a&tags%5B%5D=b"
        );
        assert_eq!(request.headers()[ACCEPT], "application/json");
        assert_eq!(request.headers()[USER_AGENT], "session-test");
        assert!(request.body().is_empty());
    }

    #[test]
    fn post_sends_parameters_as_json() {
        let session = session(MockClient::respond(201, r#"{"id":9}"#));
        let call = Call::new(Method::POST, "items", params(json!({ "name": "widget" })));

        let Outcome::Success(handle, body) = run(&session, call) else {
            panic!("expected success");
        };
        assert_eq!(handle.status_code(), 201);
        assert_eq!(body, Some(json!({ "id": 9 })));

        let seen = session.client().seen.lock().unwrap();
        assert_eq!(seen[0].headers()[CONTENT_TYPE], "application/json");
        let sent: Value = serde_json::from_slice(seen[0].body()).unwrap();
        assert_eq!(sent, json!({ "name": "widget" }));
    }

    #[test]
    fn multipart_post_runs_the_body_callback() {
        let session = session(MockClient::respond(200, ""));
        let call = Call::multipart(
            "upload",
            params(json!({ "album": "cats" })),
            Box::new(|form: &mut MultipartFormData| {
                form.append_file("photo", "cat.png", "image/png", vec![0x89, 0x50]);
            }),
        );

        let Outcome::Success(_, body) = run(&session, call) else {
            panic!("expected success");
        };
        assert!(body.is_none());

        let seen = session.client().seen.lock().unwrap();
        let content_type = seen[0].headers()[CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("multipart/form-data; boundary=Boundary+"));
        let sent = String::from_utf8_lossy(seen[0].body()).to_string();
        assert!(sent.contains("name=\"album\"\r\n\r\ncats\r\n"));
        assert!(sent.contains("filename=\"cat.png\""));
    }

    #[test]
    fn head_never_reads_a_body() {
        let session = session(MockClient::respond(204, "ignored"));
        let call = Call::new(Method::HEAD, "ping", None);

        let Outcome::Success(handle, body) = run(&session, call) else {
            panic!("expected success");
        };
        assert_eq!(handle.status_code(), 204);
        assert!(body.is_none());
    }

    #[test]
    fn unacceptable_status_fails_with_the_response_data() {
        let session = session(MockClient::respond(500, r#"{"message":"boom"}"#));
        let call = Call::new(Method::GET, "error_items", None);

        let Outcome::Failure(handle, error) = run(&session, call) else {
            panic!("expected failure");
        };
        assert_eq!(handle.map(|h| h.status_code()), Some(500));
        assert!(matches!(
            error,
            ClientError::Status { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert_eq!(
            error.failing_response_data(),
            Some(&br#"{"message":"boom"}"#[..])
        );
    }

    #[test]
    fn undecodable_body_fails_with_decode_error() {
        let session = session(MockClient::respond(200, "<html>"));

        let Outcome::Failure(handle, error) = run(&session, Call::new(Method::GET, "page", None))
        else {
            panic!("expected failure");
        };
        assert_eq!(handle.map(|h| h.status_code()), Some(200));
        assert!(matches!(error, ClientError::Decode { .. }));
    }

    #[test]
    fn transport_errors_keep_the_unanswered_handle() {
        let session = session(MockClient::new(|_| Err(anyhow::anyhow!("connection refused"))));

        let call = Call::new(Method::DELETE, "items/1", None);
        let Outcome::Failure(handle, error) = run(&session, call) else {
            panic!("expected failure");
        };
        let handle = handle.unwrap();
        assert_eq!(handle.status_code(), crate::NO_STATUS);
        assert_eq!(handle.method(), Method::DELETE);
        assert!(matches!(error, ClientError::Transport(_)));
    }

    #[test]
    fn invalid_path_fails_without_a_handle() {
        let session = SessionManager::new(MockClient::respond(200, ""), ThreadPool::new().unwrap());

        let Outcome::Failure(handle, error) = run(&session, Call::new(Method::GET, "/items", None))
        else {
            panic!("expected failure");
        };
        assert!(handle.is_none());
        assert!(matches!(error, ClientError::InvalidUrl { .. }));
        assert!(session.client().seen.lock().unwrap().is_empty());
    }

    /// Executor that has already shut down.
    struct Refusing;

    impl Spawn for Refusing {
        fn spawn_obj(&self, _future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
            Err(SpawnError::shutdown())
        }
    }

    /// Body that fails on the first read.
    struct Broken;

    impl AsyncRead for Broken {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut [u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::other("connection reset")))
        }
    }

    #[test]
    fn refused_spawn_reports_failure() {
        let config = SessionConfig::new().base_url("http://localhost/api").unwrap();
        let session =
            SessionManager::with_config(MockClient::respond(200, "{}"), Refusing, config);

        let Outcome::Failure(handle, error) = run(&session, Call::new(Method::GET, "items", None))
        else {
            panic!("expected failure");
        };
        let handle = handle.unwrap();
        assert_eq!(handle.status_code(), crate::NO_STATUS);
        assert_eq!(handle.uri(), "http://localhost/api/items");
        assert!(matches!(error, ClientError::Spawn(_)));
        assert_eq!(error.cause(), crate::Cause::Network);
    }

    #[test]
    fn body_read_failure_keeps_the_response_status() {
        let session = session(MockClient::new(|_| {
            Ok(Response::builder()
                .status(200)
                .body(AsyncBody::from_reader(Broken))
                .unwrap())
        }));

        let Outcome::Failure(handle, error) = run(&session, Call::new(Method::GET, "items", None))
        else {
            panic!("expected failure");
        };
        assert_eq!(handle.map(|h| h.status_code()), Some(200));
        assert!(matches!(error, ClientError::Body { status, .. } if status == StatusCode::OK));
        assert_eq!(error.cause(), crate::Cause::Protocol);
    }

    #[test]
    fn request_ids_increase() {
        let session = session(MockClient::respond(200, ""));
        let Outcome::Success(first, _) = run(&session, Call::new(Method::GET, "a", None)) else {
            panic!("expected success");
        };
        let Outcome::Success(second, _) = run(&session, Call::new(Method::GET, "b", None)) else {
            panic!("expected success");
        };
        assert!(second.id() > first.id());
    }

    #[test]
    fn null_and_scalar_parameters_flatten() {
        let pairs = query_pairs(&params(json!({ "a": null, "b": true, "c": 1.5 })).unwrap());
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), String::new()),
                ("b".to_string(), "true".to_string()),
                ("c".to_string(), "1.5".to_string()),
            ]
        );
    }
}
