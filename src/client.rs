//! In-memory stand-in for an http client, with explicit settlement.

use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use crate::deferred::{deferred, Deferred, Settler};
use crate::request::{Request, RequestInit};
use crate::{BoxError, Error};

/// Success values travel type-erased; [`ResponseFuture`] restores the type.
type Payload = Result<Box<dyn Any + Send>, Error>;

struct Entry {
    id: u64,
    request: Request,
    settler: Settler<Payload>,
}

#[derive(Default)]
struct ClientInner {
    next_id: u64,
    pending: Vec<Entry>,
}

/// Test double for an http client.
///
/// Code under test issues calls through [`request`](Self::request) and gets a
/// future back; test code looks the call up with
/// [`expect_one`](Self::expect_one) and decides when and how it settles.
/// Nothing settles on its own, and every registered call stays visible until
/// it is resolved, rejected, removed or cleaned.
///
/// Construct one client per test case; clones share the same active set.
///
/// # Examples
///
/// ```
/// use flow_out::{Request, TestHttpClient};
/// use futures::executor::block_on;
///
/// let client = TestHttpClient::new();
/// let response = client.request::<u32>(Request::new("/items"));
/// client.expect_one::<u32>("/items", None).unwrap().resolve(3).unwrap();
/// assert_eq!(block_on(response).unwrap(), 3);
/// client.verify().unwrap();
/// ```
#[derive(Clone, Default)]
pub struct TestHttpClient {
    inner: Arc<Mutex<ClientInner>>,
}

impl TestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call and return the future of its eventual response.
    ///
    /// Registration is synchronous: the entry is visible to lookups before
    /// this returns. The future settles only when test code resolves or
    /// rejects the entry; if the entry is removed instead, the future stays
    /// pending forever.
    pub fn request<T: Send + 'static>(&self, request: Request) -> ResponseFuture<T> {
        let (settler, response) = deferred();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.pending.push(Entry {
            id,
            request,
            settler,
        });
        ResponseFuture {
            response,
            _marker: PhantomData,
        }
    }

    /// Find the oldest pending request matching `url` (and `init`, when
    /// given) without removing it. Repeated calls return handles to the same
    /// underlying entry.
    ///
    /// Fails with [`Error::NotFound`] when nothing matches, so a test that
    /// expected a call which never happened fails loudly.
    pub fn expect_one<T>(
        &self,
        url: &str,
        init: Option<&RequestInit>,
    ) -> Result<PendingRequest<T>, Error> {
        let inner = self.inner.lock().unwrap();
        let index = find_pending(&inner.pending, url, init)
            .ok_or_else(|| Error::NotFound(url.to_owned()))?;
        let entry = &inner.pending[index];
        Ok(PendingRequest {
            client: Arc::clone(&self.inner),
            id: entry.id,
            request: entry.request.clone(),
            _marker: PhantomData,
        })
    }

    /// Same lookup as [`expect_one`](Self::expect_one), but drops the entry
    /// without settling it, simulating a call abandoned by a cancelled
    /// consumer. The original response future never settles. Returns the
    /// removed descriptor.
    pub fn remove_one(&self, url: &str, init: Option<&RequestInit>) -> Result<Request, Error> {
        let mut inner = self.inner.lock().unwrap();
        let index = find_pending(&inner.pending, url, init)
            .ok_or_else(|| Error::NotFound(url.to_owned()))?;
        let entry = inner.pending.remove(index);
        Ok(entry.request)
    }

    /// Fail with [`Error::PendingRequests`] if any calls were never settled.
    /// Intended for the end of a test.
    pub fn verify(&self) -> Result<(), Error> {
        let inner = self.inner.lock().unwrap();
        if inner.pending.is_empty() {
            return Ok(());
        }
        Err(Error::PendingRequests {
            count: inner.pending.len(),
            urls: inner
                .pending
                .iter()
                .map(|entry| entry.request.url().to_owned())
                .collect(),
        })
    }

    /// Discard every pending request without settling it. Idempotent.
    pub fn clean(&self) {
        self.inner.lock().unwrap().pending.clear();
    }
}

/// Registration-order scan shared by lookup and removal.
fn find_pending(pending: &[Entry], url: &str, init: Option<&RequestInit>) -> Option<usize> {
    pending
        .iter()
        .position(|entry| entry.request.matches(url, init))
}

/// Handle to one registered, not-yet-settled request.
///
/// Settling consumes the handle and removes the entry from the client's
/// active set in the same step; a second handle to the same entry then fails
/// with [`Error::NotFound`].
pub struct PendingRequest<T> {
    client: Arc<Mutex<ClientInner>>,
    id: u64,
    request: Request,
    _marker: PhantomData<fn(T)>,
}

impl<T> PendingRequest<T> {
    /// The descriptor this handle matched.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Resolve the response future with `value` and remove the entry.
    pub fn resolve(self, value: T) -> Result<(), Error>
    where
        T: Send + 'static,
    {
        self.settle(Ok(Box::new(value)))
    }

    /// Reject the response future with `reason` and remove the entry.
    pub fn reject(self, reason: impl Into<BoxError>) -> Result<(), Error> {
        self.settle(Err(Error::Rejected(reason.into())))
    }

    fn settle(self, payload: Payload) -> Result<(), Error> {
        // Removal happens under the lock, before the consumer can observe
        // anything: no window where a settled entry is still visible.
        let settler = {
            let mut inner = self.client.lock().unwrap();
            let index = inner
                .pending
                .iter()
                .position(|entry| entry.id == self.id)
                .ok_or_else(|| Error::NotFound(self.request.url().to_owned()))?;
            inner.pending.remove(index).settler
        };
        settler.settle(payload);
        Ok(())
    }
}

/// Future returned by [`TestHttpClient::request`].
pub struct ResponseFuture<T> {
    response: Deferred<Payload>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Future for ResponseFuture<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.response).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(
                value
                    .downcast::<T>()
                    .map(|value| *value)
                    .map_err(|_| Error::WrongResponseType),
            ),
            Poll::Ready(Err(error)) => Poll::Ready(Err(error)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;
    use futures::executor::block_on;
    use futures::FutureExt;

    fn post(body: &str) -> RequestInit {
        RequestInit::new().method(Method::Post).body(body)
    }

    #[test]
    fn finds_pending_request_by_url() {
        let client = TestHttpClient::new();
        let _response = client.request::<u32>(Request::new("test/endpoint"));
        let pending = client.expect_one::<u32>("test/endpoint", None).unwrap();
        assert_eq!(pending.request(), &Request::new("test/endpoint"));
    }

    #[test]
    fn finds_pending_request_by_url_and_init() {
        let client = TestHttpClient::new();
        let _response =
            client.request::<u32>(Request::with_init("test/endpoint", post("payload")));
        let pending = client
            .expect_one::<u32>("test/endpoint", Some(&post("payload")))
            .unwrap();
        assert_eq!(pending.request().method(), Method::Post);
    }

    #[test]
    fn lookup_without_a_match_fails() {
        let client = TestHttpClient::new();
        let _response = client.request::<u32>(Request::new("test/endpoint"));
        let missing = client.expect_one::<u32>("other/endpoint", None);
        assert!(matches!(missing, Err(Error::NotFound(url)) if url == "other/endpoint"));
        let mismatch = client.expect_one::<u32>("test/endpoint", Some(&post("payload")));
        assert!(matches!(mismatch, Err(Error::NotFound(_))));
    }

    #[test]
    fn expect_one_does_not_remove_the_entry() {
        let client = TestHttpClient::new();
        let _response = client.request::<u32>(Request::new("test/endpoint"));
        let first = client.expect_one::<u32>("test/endpoint", None).unwrap();
        let second = client.expect_one::<u32>("test/endpoint", None).unwrap();
        assert_eq!(first.request(), second.request());
        // Both handles alias the same entry: settling one invalidates the
        // other.
        first.resolve(1).unwrap();
        assert!(matches!(second.resolve(2), Err(Error::NotFound(_))));
    }

    #[test]
    fn resolves_a_pending_request() {
        let client = TestHttpClient::new();
        let response = client.request::<u32>(Request::new("test/endpoint"));
        client
            .expect_one::<u32>("test/endpoint", None)
            .unwrap()
            .resolve(3)
            .unwrap();
        assert_eq!(block_on(response).unwrap(), 3);
    }

    #[test]
    fn removes_the_entry_once_resolved() {
        let client = TestHttpClient::new();
        let _response = client.request::<u32>(Request::new("test/endpoint"));
        client
            .expect_one::<u32>("test/endpoint", None)
            .unwrap()
            .resolve(3)
            .unwrap();
        assert!(matches!(
            client.expect_one::<u32>("test/endpoint", None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn rejects_a_pending_request() {
        let client = TestHttpClient::new();
        let response = client.request::<u32>(Request::new("test/endpoint"));
        client
            .expect_one::<u32>("test/endpoint", None)
            .unwrap()
            .reject("boom")
            .unwrap();
        match block_on(response) {
            Err(Error::Rejected(reason)) => assert_eq!(reason.to_string(), "boom"),
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[test]
    fn removes_the_entry_once_rejected() {
        let client = TestHttpClient::new();
        let _response = client.request::<u32>(Request::new("test/endpoint"));
        client
            .expect_one::<u32>("test/endpoint", None)
            .unwrap()
            .reject("boom")
            .unwrap();
        assert!(matches!(
            client.expect_one::<u32>("test/endpoint", None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn verify_reports_outstanding_requests() {
        let client = TestHttpClient::new();
        let _response = client.request::<u32>(Request::new("test/endpoint"));
        match client.verify() {
            Err(Error::PendingRequests { count, urls }) => {
                assert_eq!(count, 1);
                assert_eq!(urls, vec!["test/endpoint".to_owned()]);
            }
            other => panic!("expected a verification failure, got {other:?}"),
        }
    }

    #[test]
    fn clean_discards_all_pending_requests() {
        let client = TestHttpClient::new();
        let _response = client.request::<u32>(Request::new("test/endpoint"));
        client.clean();
        client.verify().unwrap();
        client.clean();
        client.verify().unwrap();
    }

    #[test]
    fn removed_request_never_settles() {
        let client = TestHttpClient::new();
        let mut response = client.request::<u32>(Request::new("test/endpoint"));
        let removed = client.remove_one("test/endpoint", None).unwrap();
        assert_eq!(removed.url(), "test/endpoint");
        assert!((&mut response).now_or_never().is_none());
        assert!((&mut response).now_or_never().is_none());
        client.verify().unwrap();
    }

    #[test]
    fn remove_one_without_a_match_fails() {
        let client = TestHttpClient::new();
        assert!(matches!(
            client.remove_one("test/endpoint", None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_descriptors_settle_oldest_first() {
        let client = TestHttpClient::new();
        let first = client.request::<u32>(Request::new("test/endpoint"));
        let second = client.request::<u32>(Request::new("test/endpoint"));
        client
            .expect_one::<u32>("test/endpoint", None)
            .unwrap()
            .resolve(1)
            .unwrap();
        client
            .expect_one::<u32>("test/endpoint", None)
            .unwrap()
            .resolve(2)
            .unwrap();
        assert_eq!(block_on(first).unwrap(), 1);
        assert_eq!(block_on(second).unwrap(), 2);
    }

    #[test]
    fn criteria_pick_between_same_url_requests() {
        let client = TestHttpClient::new();
        let first = client.request::<u32>(Request::with_init("test/endpoint", post("{\"x\":1}")));
        let mut second =
            client.request::<u32>(Request::with_init("test/endpoint", post("{\"x\":2}")));
        client
            .expect_one::<u32>("test/endpoint", Some(&post("{\"x\":1}")))
            .unwrap()
            .resolve(1)
            .unwrap();
        assert_eq!(block_on(first).unwrap(), 1);
        assert!((&mut second).now_or_never().is_none());
        client.clean();
    }

    #[test]
    fn mismatched_response_type_surfaces() {
        let client = TestHttpClient::new();
        let response = client.request::<u32>(Request::new("test/endpoint"));
        client
            .expect_one::<String>("test/endpoint", None)
            .unwrap()
            .resolve("oops".to_owned())
            .unwrap();
        assert!(matches!(block_on(response), Err(Error::WrongResponseType)));
    }
}
