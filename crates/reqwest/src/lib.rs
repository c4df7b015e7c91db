use std::{future::Future, pin::Pin};

use anyhow::Result;
use futures::{
    stream::StreamExt,
    task::{FutureObj, Spawn, SpawnError},
    TryStreamExt,
};
use http_client_futures::{
    http::{Request, Response},
    AsyncBody, HttpClient, SessionConfig, SessionManager,
};
use reqwest::Client;
use tokio::runtime::Handle;
use tracing::{debug, error, info};

pub struct HttpClientReqwest(Client);

impl Default for HttpClientReqwest {
    fn default() -> Self {
        debug!("Creating default HttpClientReqwest");
        Self(Client::new())
    }
}

impl From<Client> for HttpClientReqwest {
    fn from(client: Client) -> Self {
        debug!("Creating HttpClientReqwest from Client");
        Self(client)
    }
}

impl HttpClient for HttpClientReqwest {
    fn send(
        &self,
        request: Request<AsyncBody>,
    ) -> Pin<Box<dyn Future<Output = Result<Response<AsyncBody>>> + Send>> {
        debug!("Sending request to {}", request.uri());
        let client = self.0.clone();
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let chunks: Vec<Vec<u8>> = body.try_collect().await?;

            let mut builder = client
                .request(parts.method, parts.uri.to_string())
                .headers(parts.headers);
            if !chunks.is_empty() {
                builder = builder.body(chunks.concat());
            }
            let reqwest_request = builder.build().map_err(|e| {
                error!("Failed to build reqwest request: {}", e);
                e
            })?;

            let response = client.execute(reqwest_request).await.map_err(|e| {
                error!("Request failed: {}", e);
                e
            })?;
            info!("Request succeeded with status: {}", response.status());

            let mut res = Response::builder()
                .status(response.status())
                .version(response.version());
            for (key, value) in response.headers().iter() {
                res = res.header(key, value);
                debug!("Response header: {} = {:?}", key, value);
            }
            debug!("Creating streaming body for response");

            let reader = response
                .bytes_stream()
                .map(|result| result.map_err(std::io::Error::other))
                .boxed()
                .into_async_read();

            Ok(res.body(AsyncBody::from_reader(reader))?)
        })
    }
}

/// Runs spawned futures on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioSpawner(Handle);

impl TokioSpawner {
    pub fn new(handle: Handle) -> Self {
        Self(handle)
    }

    /// Spawner for the runtime the caller is running on.
    pub fn current() -> Result<Self> {
        Ok(Self(Handle::try_current()?))
    }
}

impl Spawn for TokioSpawner {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        self.0.spawn(future);
        Ok(())
    }
}

/// Reqwest backed session on the current tokio runtime.
pub fn session_manager(config: SessionConfig) -> Result<SessionManager<HttpClientReqwest>> {
    Ok(SessionManager::with_config(
        HttpClientReqwest::default(),
        TokioSpawner::current()?,
        config,
    ))
}
