use std::{
    borrow::Cow,
    io::Read,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{AsyncRead, Stream};
use pin_project_lite::pin_project;

pin_project! {
    /// The body of a request handed to, or a response returned by, an [`HttpClient`].
    ///
    /// [`HttpClient`]: crate::HttpClient
    pub struct AsyncBody {
        #[pin]
        inner: Inner,
    }
}

enum Inner {
    /// An empty body.
    Empty,

    /// A body stored in memory.
    SyncReader(std::io::Cursor<Cow<'static, [u8]>>),

    /// An asynchronous reader.
    AsyncReader(Pin<Box<dyn AsyncRead + Send>>),
}

impl AsyncBody {
    /// Create a new empty body.
    ///
    /// An empty body represents the *absence* of a body, which is semantically
    /// different than the presence of a body of zero length.
    pub fn empty() -> Self {
        Self {
            inner: Inner::Empty,
        }
    }

    /// Create a streaming body that reads from the given reader.
    pub fn from_reader<R>(read: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            inner: Inner::AsyncReader(Box::pin(read)),
        }
    }

    /// Returns `true` when the body is known to carry no bytes.
    pub fn is_empty(&self) -> bool {
        match &self.inner {
            Inner::Empty => true,
            Inner::SyncReader(cursor) => cursor.get_ref().is_empty(),
            Inner::AsyncReader(_) => false,
        }
    }
}

impl Default for AsyncBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for AsyncBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            Inner::Empty => "Empty",
            Inner::SyncReader(_) => "SyncReader",
            Inner::AsyncReader(_) => "AsyncReader",
        };
        f.debug_tuple("AsyncBody").field(&kind).finish()
    }
}

impl From<()> for AsyncBody {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

impl From<Vec<u8>> for AsyncBody {
    fn from(body: Vec<u8>) -> Self {
        Self {
            inner: Inner::SyncReader(std::io::Cursor::new(Cow::Owned(body))),
        }
    }
}

impl From<&'static [u8]> for AsyncBody {
    fn from(body: &'static [u8]) -> Self {
        Self {
            inner: Inner::SyncReader(std::io::Cursor::new(Cow::Borrowed(body))),
        }
    }
}

impl From<String> for AsyncBody {
    fn from(body: String) -> Self {
        body.into_bytes().into()
    }
}

impl From<&'static str> for AsyncBody {
    fn from(body: &'static str) -> Self {
        body.as_bytes().into()
    }
}

impl<T: Into<Self>> From<Option<T>> for AsyncBody {
    fn from(body: Option<T>) -> Self {
        match body {
            Some(body) => body.into(),
            None => Self::empty(),
        }
    }
}

impl AsyncRead for Inner {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Inner::Empty => Poll::Ready(Ok(0)),
            // Blocking call is over an in-memory buffer
            Inner::SyncReader(cursor) => Poll::Ready(cursor.read(buf)),
            Inner::AsyncReader(async_reader) => async_reader.as_mut().poll_read(cx, buf),
        }
    }
}

impl AsyncRead for AsyncBody {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        self.project().inner.poll_read(cx, buf)
    }
}

impl Stream for AsyncBody {
    type Item = Result<Vec<u8>, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        let mut buffer = vec![0; 1024];

        match this.inner.as_mut().poll_read(cx, &mut buffer) {
            Poll::Ready(Ok(0)) => Poll::Ready(None),
            Poll::Ready(Ok(n)) => {
                buffer.truncate(n);
                Poll::Ready(Some(Ok(buffer)))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
            Poll::Pending => Poll::Pending,
        }
    }
}
