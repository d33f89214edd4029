//! Single-step flow generators and an in-memory http test double.
//!
//! Two independent pieces, composed only in tests:
//!
//! - [`to_flow`] adapts a future-returning function into a function that
//!   returns a [`FlowGenerator`]: a generator that yields exactly one
//!   awaitable step and then returns the resolved value. An external
//!   cancellable-flow driver steps it; [`drive`] is the minimal such driver.
//! - [`TestHttpClient`] registers simulated network calls and gives test code
//!   explicit control over when and how each one settles, without any real
//!   I/O.
//!
//! # Examples
//!
//! ```
//! use flow_out::{drive, to_flow, Request, TestHttpClient};
//! use futures::executor::block_on;
//!
//! let client = TestHttpClient::new();
//! let fetch = to_flow({
//!     let client = client.clone();
//!     move |req: Request| client.request::<u32>(req)
//! });
//!
//! let flow = fetch(Request::new("/answer"));
//! client.expect_one::<u32>("/answer", None).unwrap().resolve(42).unwrap();
//! assert_eq!(block_on(drive(flow)).unwrap(), 42);
//! client.verify().unwrap();
//! ```

use thiserror::Error;

mod client;
mod deferred;
mod flow;
mod request;

pub use client::{PendingRequest, ResponseFuture, TestHttpClient};
pub use flow::{drive, to_flow, FlowGenerator, FlowState, StepFuture};
pub use request::{Method, Request, RequestInit};

/// Boxed error value a pending request can be rejected with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the test double.
#[derive(Debug, Error)]
pub enum Error {
    /// No active entry matched the lookup.
    #[error("no pending request found for {0}")]
    NotFound(String),
    /// [`TestHttpClient::verify`] found requests that were never settled.
    #[error("{} pending requests remain: {}", .count, .urls.join(", "))]
    PendingRequests {
        /// Number of outstanding requests.
        count: usize,
        /// Urls of the outstanding requests, in registration order.
        urls: Vec<String>,
    },
    /// The rejection delivered through a response future, unchanged.
    #[error("request rejected: {0}")]
    Rejected(#[source] BoxError),
    /// A pending request was resolved with a value of a different type than
    /// the caller asked for.
    #[error("response value does not match the requested type")]
    WrongResponseType,
}
