use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, PoisonError},
    task::{Context, Poll},
};

use futures::channel::oneshot::{self, Canceled};
use pin_project_lite::pin_project;
use tracing::debug;

/// Write side of a [`Promise`].
///
/// Clones share one settle-once slot: the first `resolve` or `reject` wins and
/// later attempts hand their value back.
pub struct CompletionSource<T, E> {
    slot: Arc<Mutex<Option<oneshot::Sender<Result<T, E>>>>>,
}

impl<T, E> CompletionSource<T, E> {
    /// Creates a pending source together with the promise it settles.
    pub fn new() -> (Self, Promise<T, E>) {
        let (sender, receiver) = oneshot::channel();
        let source = Self {
            slot: Arc::new(Mutex::new(Some(sender))),
        };
        (source, Promise { receiver })
    }

    pub fn resolve(&self, value: T) -> Result<(), T> {
        match self.take_sender() {
            Some(sender) => {
                Self::send(sender, Ok(value));
                Ok(())
            }
            None => Err(value),
        }
    }

    pub fn reject(&self, error: E) -> Result<(), E> {
        match self.take_sender() {
            Some(sender) => {
                Self::send(sender, Err(error));
                Ok(())
            }
            None => Err(error),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn take_sender(&self) -> Option<oneshot::Sender<Result<T, E>>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    // A dropped promise means nobody is waiting; the source still counts as
    // settled.
    fn send(sender: oneshot::Sender<Result<T, E>>, outcome: Result<T, E>) {
        if sender.send(outcome).is_err() {
            debug!("Promise dropped before it was settled");
        }
    }
}

impl<T, E> Clone for CompletionSource<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

pin_project! {
    /// Read side of a [`CompletionSource`].
    ///
    /// Resolves to the settled outcome. If every source is dropped without
    /// settling, resolves to the error produced from [`Canceled`].
    #[must_use = "promises do nothing unless awaited"]
    pub struct Promise<T, E> {
        #[pin]
        receiver: oneshot::Receiver<Result<T, E>>,
    }
}

impl<T, E> Future for Promise<T, E>
where
    E: From<Canceled>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().receiver.poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(canceled)) => Poll::Ready(Err(E::from(canceled))),
            Poll::Pending => Poll::Pending,
        }
    }
}
