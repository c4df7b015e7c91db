use std::ops::Range;

use http::{header::IntoHeaderName, HeaderMap, HeaderValue};
use url::Url;

use crate::ClientError;

/// Settings of a [`SessionManager`](crate::SessionManager).
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Base that relative request paths are resolved against.
    pub base_url: Option<Url>,
    /// Headers sent with every request.
    pub default_headers: HeaderMap,
    /// Status codes treated as success.
    pub acceptable_status: Range<u16>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            acceptable_status: 200..300,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL. A trailing slash is added so that relative paths
    /// extend the base instead of replacing its last segment.
    pub fn base_url(mut self, base_url: &str) -> Result<Self, ClientError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let url = Url::parse(&normalized).map_err(|source| ClientError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        self.base_url = Some(url);
        Ok(self)
    }

    pub fn default_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn acceptable_status(mut self, range: Range<u16>) -> Self {
        self.acceptable_status = range;
        self
    }

    pub fn is_acceptable(&self, status: u16) -> bool {
        self.acceptable_status.contains(&status)
    }

    /// Resolves `path` against the base URL. Absolute URLs are used as is.
    pub fn resolve(&self, path: &str) -> Result<Url, ClientError> {
        let invalid = |source| ClientError::InvalidUrl {
            url: path.to_string(),
            source,
        };

        match Url::parse(path) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base.join(path.trim_start_matches('/')).map_err(invalid),
                None => Err(invalid(url::ParseError::RelativeUrlWithoutBase)),
            },
            Err(source) => Err(invalid(source)),
        }
    }
}
