use std::{future::Future, pin::Pin};

use futures::TryStreamExt;
use http::Response;
use serde::de::DeserializeOwned;

use crate::AsyncBody;

pub trait ResponseAsyncBodyExt {
    fn bytes(self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<u8>>> + Send>>;

    fn json<D>(self) -> Pin<Box<dyn Future<Output = anyhow::Result<D>> + Send>>
    where
        D: DeserializeOwned + Send + 'static;

    fn text(self) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>>;
}

impl ResponseAsyncBodyExt for Response<AsyncBody> {
    fn bytes(self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<u8>>> + Send>> {
        Box::pin(async move {
            let body: Vec<Vec<u8>> = self.into_body().try_collect().await?;
            Ok(body.concat())
        })
    }

    fn json<D>(self) -> Pin<Box<dyn Future<Output = anyhow::Result<D>> + Send>>
    where
        D: DeserializeOwned + Send + 'static,
    {
        Box::pin(async move {
            let bytes = self.bytes().await?;
            Ok(serde_json::from_slice(bytes.as_slice())?)
        })
    }

    fn text(self) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>> {
        Box::pin(async move {
            let bytes = self.bytes().await?;
            Ok(String::from_utf8(bytes)?)
        })
    }
}
