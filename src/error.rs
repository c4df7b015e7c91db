use std::fmt;

use futures::{channel::oneshot::Canceled, task::SpawnError};
use http::StatusCode;
use serde_json::Value;

use crate::{ErrorResult, FromFailure, RequestHandle};

/// Marker carried by every [`Error::Failed`] so type-erased errors can be
/// told apart from errors of other origins.
pub const DOMAIN: &str = "http_client_futures::result";

/// Failure reported by the underlying callback client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid request URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build request: {0}")]
    Build(#[source] anyhow::Error),

    #[error("request failed: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("failed to schedule request: {0}")]
    Spawn(#[source] SpawnError),

    #[error("request failed with unacceptable status {status}")]
    Status { status: StatusCode, data: Vec<u8> },

    #[error("failed to read response body with status {status}: {source}")]
    Body {
        status: StatusCode,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to decode response body: {source}")]
    Decode {
        data: Vec<u8>,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    /// The raw body of the response that caused the failure, if one was
    /// received and was not empty.
    pub fn failing_response_data(&self) -> Option<&[u8]> {
        match self {
            Self::Status { data, .. } | Self::Decode { data, .. } if !data.is_empty() => {
                Some(data.as_slice())
            }
            _ => None,
        }
    }

    pub fn cause(&self) -> Cause {
        match self {
            Self::Status { .. } | Self::Body { .. } | Self::Decode { .. } => Cause::Protocol,
            Self::InvalidUrl { .. } | Self::Build(_) | Self::Transport(_) | Self::Spawn(_) => {
                Cause::Network
            }
        }
    }
}

/// Why a request failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cause {
    /// No usable HTTP response was received.
    Network,
    /// A response was received but was rejected.
    Protocol,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Protocol => f.write_str("protocol"),
        }
    }
}

/// Rejection value of an adapted request.
#[derive(Debug)]
pub enum Error<E = ErrorResult> {
    /// The underlying client reported a failure.
    Failed { cause: Cause, result: E },
    /// The completion source was dropped before it settled.
    Cancelled,
}

impl<E: FromFailure> Error<E> {
    /// Wraps a failure reported by the underlying client.
    ///
    /// The failing response data, when present, is decoded as JSON and
    /// becomes the result's body. Data that does not decode is dropped.
    pub fn create(request: Option<RequestHandle>, error: ClientError) -> Self {
        let body = error
            .failing_response_data()
            .and_then(|data| serde_json::from_slice::<Value>(data).ok());
        let cause = error.cause();
        let result = E::from_failure(request, body, Some(error));

        Self::Failed { cause, result }
    }

    /// Recovers the embedded result. `None` for absent or cancelled errors.
    pub fn parse(error: Option<&Self>) -> Option<&E> {
        match error? {
            Self::Failed { result, .. } => Some(result),
            Self::Cancelled => None,
        }
    }

    /// Status code of the embedded result, [`NO_STATUS`](crate::NO_STATUS)
    /// when cancelled.
    pub fn code(&self) -> i32 {
        match self {
            Self::Failed { result, .. } => result.status_code(),
            Self::Cancelled => crate::NO_STATUS,
        }
    }
}

impl<E> Error<E> {
    pub fn domain(&self) -> Option<&'static str> {
        match self {
            Self::Failed { .. } => Some(DOMAIN),
            Self::Cancelled => None,
        }
    }

    pub fn cause(&self) -> Option<Cause> {
        match self {
            Self::Failed { cause, .. } => Some(*cause),
            Self::Cancelled => None,
        }
    }

    pub fn into_result(self) -> Option<E> {
        match self {
            Self::Failed { result, .. } => Some(result),
            Self::Cancelled => None,
        }
    }
}

impl<E> Error<E>
where
    E: FromFailure + fmt::Debug,
{
    /// Recovers the embedded result from a type-erased error, such as one
    /// that went through `anyhow`. Errors of any other origin yield `None`.
    pub fn parse_dyn<'a>(error: Option<&'a (dyn std::error::Error + 'static)>) -> Option<&'a E> {
        Self::parse(error?.downcast_ref::<Self>())
    }
}

impl<E: FromFailure> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { cause, result } => write!(
                f,
                "{cause} failure in {DOMAIN} (code {})",
                result.status_code()
            ),
            Self::Cancelled => f.write_str("request was dropped before it settled"),
        }
    }
}

impl<E: FromFailure + fmt::Debug> std::error::Error for Error<E> {}

impl<E> From<Canceled> for Error<E> {
    fn from(_: Canceled) -> Self {
        Self::Cancelled
    }
}
