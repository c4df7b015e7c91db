use http::{
    header::CONTENT_TYPE,
    request::{Builder as RequestBuilder, Request},
    HeaderMap, HeaderValue,
};
use serde::Serialize;

use crate::AsyncBody;

pub trait RequestBuilderExt {
    fn headers(self, headers: &HeaderMap) -> Self;

    fn end(self) -> anyhow::Result<Request<AsyncBody>>;

    fn json<S>(self, payload: &S) -> anyhow::Result<Request<AsyncBody>>
    where
        S: Serialize + ?Sized;
}

impl RequestBuilderExt for RequestBuilder {
    fn end(self) -> anyhow::Result<Request<AsyncBody>> {
        Ok(self.body(AsyncBody::empty())?)
    }

    fn json<S>(self, payload: &S) -> anyhow::Result<Request<AsyncBody>>
    where
        S: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)?;
        Ok(self
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body.into())?)
    }

    fn headers(mut self, headers: &HeaderMap) -> Self {
        // A builder that already failed carries no header map; the error
        // surfaces when the body is attached.
        if let Some(h) = self.headers_mut() {
            for (key, value) in headers.iter() {
                h.insert(key, value.clone());
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use http::{header::ACCEPT, Method};
    use serde_json::json;

    use super::*;

    #[test]
    fn json_sets_content_type_and_body() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("http://localhost/items")
            .json(&json!({ "name": "widget" }))
            .unwrap();

        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert!(!request.body().is_empty());
    }

    #[test]
    fn headers_are_merged_into_the_builder() {
        let mut defaults = HeaderMap::new();
        defaults.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let request = Request::builder()
            .uri("http://localhost/")
            .headers(&defaults)
            .end()
            .unwrap();

        assert_eq!(request.headers()[ACCEPT], "application/json");
        assert!(request.body().is_empty());
    }

    #[test]
    fn invalid_uri_surfaces_on_end() {
        let result = Request::builder().uri("not a uri").end();
        assert!(result.is_err());
    }
}
