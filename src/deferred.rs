//! One-shot settlement cell backing every pending request.
//!
//! A `deferred()` call hands back a [`Settler`] for the side that decides the
//! outcome and a [`Deferred`] future for the side that awaits it. The settler
//! is consumed on use, so a cell settles at most once. Dropping an unsettled
//! settler does NOT fail the future: an abandoned request must stay pending
//! forever.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

pub(crate) fn deferred<T>() -> (Settler<T>, Deferred<T>) {
    let inner = Arc::new(Mutex::new(Inner {
        value: None,
        waker: None,
    }));
    (
        Settler {
            inner: Arc::clone(&inner),
        },
        Deferred { inner },
    )
}

/// The settling half of a cell.
#[derive(Debug)]
pub(crate) struct Settler<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

/// The awaiting half of a cell.
#[derive(Debug)]
pub(crate) struct Deferred<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

#[derive(Debug)]
struct Inner<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

impl<T> Settler<T> {
    /// Store the value and wake the consumer.
    pub(crate) fn settle(self, value: T) {
        let waker = {
            let mut inner = self.inner.lock().unwrap();
            inner.value = Some(value);
            inner.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Future for Deferred<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut inner = self.inner.lock().unwrap();
        match inner.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                inner.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
