//! Single-step generators over a future, for cancellable-flow drivers.
//!
//! A [`FlowGenerator`] follows a fixed two-step protocol: the first
//! [`resume`](FlowGenerator::resume) yields one awaitable [`StepFuture`], the
//! second returns the value that step produced. A driver may abandon the
//! generator between steps (cancellation); nothing here holds external
//! resources, so abandonment needs no cleanup.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

/// Adapt a future-returning function into a flow-generator function.
///
/// A function of no arguments is adapted with `A = ()`; several arguments
/// travel as a tuple. A synchronous function is adapted by wrapping its
/// result in [`std::future::ready`] at the call site; since errors are plain
/// values, a ready `Err` propagates through the step untouched.
///
/// # Examples
///
/// ```
/// use flow_out::{to_flow, FlowState};
/// use futures::executor::block_on;
/// use std::future::ready;
///
/// let double = to_flow(|n: u32| ready(n * 2));
/// let mut flow = double(21);
/// let step = match flow.resume() {
///     FlowState::Yielded(step) => step,
///     FlowState::Complete(_) => unreachable!(),
/// };
/// block_on(step);
/// match flow.resume() {
///     FlowState::Complete(value) => assert_eq!(value, 42),
///     FlowState::Yielded(_) => unreachable!(),
/// }
/// ```
pub fn to_flow<A, F, Fut>(f: F) -> impl Fn(A) -> FlowGenerator<Fut>
where
    F: Fn(A) -> Fut,
    Fut: Future,
{
    move |arg| FlowGenerator::new(f(arg))
}

/// What a [`FlowGenerator`] produced on one resumption.
pub enum FlowState<Fut: Future> {
    /// The single awaitable step. Await it, then resume again.
    Yielded(StepFuture<Fut>),
    /// The generator's final value.
    Complete(Fut::Output),
}

/// A generator that yields exactly one awaitable step, then returns the
/// value that step resolved to.
pub struct FlowGenerator<Fut: Future> {
    state: State<Fut>,
}

enum State<Fut: Future> {
    NotStarted(Fut),
    Suspended(Arc<Mutex<Option<Fut::Output>>>),
    Done,
}

impl<Fut: Future> FlowGenerator<Fut> {
    pub fn new(fut: Fut) -> Self {
        Self {
            state: State::NotStarted(fut),
        }
    }

    /// Step the generator.
    ///
    /// The first call yields the step; after the step has been awaited to
    /// completion, the second call returns the value.
    ///
    /// # Panics
    ///
    /// Panics when the protocol is violated: resuming before the yielded
    /// step completed, or resuming again after completion.
    pub fn resume(&mut self) -> FlowState<Fut> {
        match mem::replace(&mut self.state, State::Done) {
            State::NotStarted(fut) => {
                let slot = Arc::new(Mutex::new(None));
                self.state = State::Suspended(Arc::clone(&slot));
                FlowState::Yielded(StepFuture {
                    fut: Some(Box::pin(fut)),
                    slot,
                })
            }
            State::Suspended(slot) => {
                let value = slot.lock().unwrap().take();
                match value {
                    Some(value) => FlowState::Complete(value),
                    None => panic!("the yielded step must be awaited to completion before resuming"),
                }
            }
            State::Done => panic!("flow generator resumed after completion"),
        }
    }
}

/// The single unit of work a [`FlowGenerator`] yields.
///
/// Resolves to `()` once the wrapped future completes; the future's output is
/// handed back through the generator's next resumption.
pub struct StepFuture<Fut: Future> {
    fut: Option<Pin<Box<Fut>>>,
    slot: Arc<Mutex<Option<Fut::Output>>>,
}

impl<Fut: Future> Future for StepFuture<Fut> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        match this.fut.as_mut() {
            None => Poll::Ready(()),
            Some(fut) => match fut.as_mut().poll(cx) {
                Poll::Ready(value) => {
                    this.fut = None;
                    *this.slot.lock().unwrap() = Some(value);
                    Poll::Ready(())
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

/// Minimal driver for a [`FlowGenerator`]: resume, await the step, resume
/// again and hand back the value. Real cancellable-flow runtimes replace
/// this; it exists so the crate is usable stand-alone.
pub async fn drive<Fut: Future>(mut flow: FlowGenerator<Fut>) -> Fut::Output {
    let step = match flow.resume() {
        FlowState::Yielded(step) => step,
        FlowState::Complete(value) => return value,
    };
    step.await;
    match flow.resume() {
        FlowState::Complete(value) => value,
        FlowState::Yielded(_) => unreachable!("a flow generator yields exactly once"),
    }
}
