//! Lazy typed values the scheduler composes over.
//!
//! A [`Deferred`] is a cloneable handle onto a shared cell with three
//! terminal outcomes: a value, a failure, or a cancellation carrying a
//! [`CancelReason`]. Combinators attach completion callbacks rather than
//! chaining futures, so completion of a fan-in like [`Deferred::all`] costs
//! O(n) with no recursion in the completion path.

mod task_group;

use std::{
    error::Error as StdError,
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll, Waker},
};

use derive_more::with_trait::Display;

pub use self::task_group::TaskGroup;

/// Why a [`Deferred`] was cancelled.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum CancelReason {
    /// The request owning this value was cancelled.
    #[display("request cancelled")]
    RequestCancelled,

    /// The request owning this value hit its deadline.
    #[display("request timed out")]
    RequestTimeout,

    /// Any other cancellation cause.
    #[display("{_0}")]
    Message(Arc<str>),
}

impl CancelReason {
    /// Creates a [`CancelReason::Message`] out of the provided text.
    pub fn message(msg: impl AsRef<str>) -> Self {
        Self::Message(msg.as_ref().into())
    }
}

/// A shared, cheaply cloneable failure.
///
/// Clones refer to the same underlying error object, observable through
/// [`Failure::ptr_eq`]; a failure stored once and rethrown later is the same
/// failure.
#[derive(Clone)]
pub struct Failure(Arc<dyn StdError + Send + Sync + 'static>);

impl Failure {
    /// Wraps the provided error.
    pub fn new(err: impl StdError + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }

    /// Creates a [`Failure`] carrying just a message.
    pub fn msg(msg: impl Into<String>) -> Self {
        Self(Arc::new(Message(msg.into())))
    }

    /// Indicates whether two [`Failure`]s share the same underlying error.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Downcasts the underlying error to a concrete type.
    pub fn downcast_ref<T: StdError + 'static>(&self) -> Option<&T> {
        (&*self.0 as &(dyn StdError + 'static)).downcast_ref()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

#[derive(Debug, Display)]
#[display("{_0}")]
struct Message(String);

impl StdError for Message {}

/// A non-value way out of a combinator closure: either a failure, or the
/// cancellation sentinel.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum Interrupt {
    Failure(Failure),
    Cancelled(CancelReason),
}

impl From<Failure> for Interrupt {
    fn from(f: Failure) -> Self {
        Self::Failure(f)
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failure(e) => fmt::Display::fmt(e, f),
            Self::Cancelled(r) => fmt::Display::fmt(r, f),
        }
    }
}

/// Terminal state of a [`Deferred`].
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum Outcome<T> {
    Value(T),
    Failure(Failure),
    Cancelled(CancelReason),
}

impl<T> Outcome<T> {
    /// Converts this [`Outcome`] into a `Result`.
    pub fn into_result(self) -> Result<T, Interrupt> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Failure(e) => Err(Interrupt::Failure(e)),
            Self::Cancelled(r) => Err(Interrupt::Cancelled(r)),
        }
    }
}

type Callback<T> = Box<dyn FnOnce(&Outcome<T>) + Send>;
type CancelHook = Box<dyn FnOnce(CancelReason) + Send>;
type Canceller = Box<dyn FnOnce(CancelReason) + Send>;

enum State<T> {
    Pending {
        wakers: Vec<Waker>,
        callbacks: Vec<Callback<T>>,
        cancel_hooks: Vec<CancelHook>,
    },
    Done(Outcome<T>),
}

struct Inner<T> {
    state: Mutex<State<T>>,
}

/// A lazy value with three terminal states: value, failure, or cancelled.
///
/// Handles are cheap to clone and all clones observe the same cell.
pub struct Deferred<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.state.lock().unwrap() {
            State::Pending { .. } => "pending",
            State::Done(Outcome::Value(_)) => "value",
            State::Done(Outcome::Failure(_)) => "failure",
            State::Done(Outcome::Cancelled(_)) => "cancelled",
        };
        f.debug_tuple("Deferred").field(&state).finish()
    }
}

impl<T: Clone + Send + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::pending()
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    /// Creates a new, still incomplete [`Deferred`].
    pub fn pending() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending {
                    wakers: Vec::new(),
                    callbacks: Vec::new(),
                    cancel_hooks: Vec::new(),
                }),
            }),
        }
    }

    /// Creates a [`Deferred`] already completed with `value`.
    pub fn completed(value: T) -> Self {
        Self::settled(Outcome::Value(value))
    }

    /// Creates a [`Deferred`] already failed with `failure`.
    pub fn failed(failure: Failure) -> Self {
        Self::settled(Outcome::Failure(failure))
    }

    /// Creates a [`Deferred`] already cancelled for `reason`.
    pub fn cancelled(reason: CancelReason) -> Self {
        Self::settled(Outcome::Cancelled(reason))
    }

    fn settled(outcome: Outcome<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Done(outcome)),
            }),
        }
    }

    /// Completes this [`Deferred`] with `value`.
    ///
    /// Returns `false` if it was already terminal.
    pub fn complete(&self, value: T) -> bool {
        self.settle(Outcome::Value(value))
    }

    /// Fails this [`Deferred`] with `failure`.
    ///
    /// Returns `false` if it was already terminal.
    pub fn fail(&self, failure: Failure) -> bool {
        self.settle(Outcome::Failure(failure))
    }

    /// Cancels this [`Deferred`] for `reason`.
    ///
    /// Returns `false` if it was already terminal.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        self.settle(Outcome::Cancelled(reason))
    }

    /// Indicates whether this [`Deferred`] has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(&*self.inner.state.lock().unwrap(), State::Done(_))
    }

    fn settle(&self, outcome: Outcome<T>) -> bool {
        let (wakers, callbacks, cancel_hooks, outcome) = {
            let mut state = self.inner.state.lock().unwrap();
            match &mut *state {
                State::Done(_) => return false,
                State::Pending {
                    wakers,
                    callbacks,
                    cancel_hooks,
                } => {
                    let wakers = std::mem::take(wakers);
                    let callbacks = std::mem::take(callbacks);
                    let cancel_hooks = std::mem::take(cancel_hooks);
                    *state = State::Done(outcome.clone());
                    (wakers, callbacks, cancel_hooks, outcome)
                }
            }
        };

        if let Outcome::Cancelled(reason) = &outcome {
            for hook in cancel_hooks {
                hook(reason.clone());
            }
        }
        for cb in callbacks {
            cb(&outcome);
        }
        for waker in wakers {
            waker.wake();
        }

        true
    }

    fn settle_result(&self, result: Result<T, Interrupt>) {
        match result {
            Ok(v) => self.complete(v),
            Err(Interrupt::Failure(e)) => self.fail(e),
            Err(Interrupt::Cancelled(r)) => self.cancel(r),
        };
    }

    /// Registers `cb` to run once this [`Deferred`] settles; runs it
    /// immediately when already terminal.
    fn on_outcome(&self, cb: Callback<T>) {
        let outcome = {
            let mut state = self.inner.state.lock().unwrap();
            match &mut *state {
                State::Pending { callbacks, .. } => {
                    callbacks.push(cb);
                    return;
                }
                State::Done(outcome) => outcome.clone(),
            }
        };

        cb(&outcome);
    }

    /// Registers a hook invoked iff this [`Deferred`] transitions to the
    /// cancelled state; runs immediately when already cancelled.
    fn on_cancel(&self, hook: CancelHook) {
        let reason = {
            let mut state = self.inner.state.lock().unwrap();
            match &mut *state {
                State::Pending { cancel_hooks, .. } => {
                    cancel_hooks.push(hook);
                    return;
                }
                State::Done(Outcome::Cancelled(r)) => r.clone(),
                State::Done(_) => return,
            }
        };

        hook(reason);
    }

    fn canceller(&self) -> Canceller {
        let this = self.clone();
        Box::new(move |reason| {
            this.cancel(reason);
        })
    }

    /// A [`Future`] resolving to this [`Deferred`]'s terminal [`Outcome`].
    pub fn outcome(&self) -> OutcomeFuture<T> {
        OutcomeFuture {
            deferred: self.clone(),
        }
    }

    /// Awaits the value, surfacing failures and cancellations as
    /// [`Interrupt`]s.
    pub async fn value(&self) -> Result<T, Interrupt> {
        self.outcome().await.into_result()
    }

    /// Always-invoked mapper over the settled value or failure.
    ///
    /// Upstream cancellation is propagated without invoking `f`. An
    /// [`Interrupt::Cancelled`] returned by `f` cancels the result; an
    /// [`Interrupt::Failure`] fails it.
    pub fn handle<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Result<T, Failure>) -> Result<U, Interrupt> + Send + 'static,
    {
        let result = Deferred::pending();

        let out = result.clone();
        self.on_outcome(Box::new(move |outcome| {
            if out.is_terminal() {
                return;
            }
            match outcome {
                Outcome::Cancelled(r) => {
                    out.cancel(r.clone());
                }
                Outcome::Value(v) => out.settle_result(f(Ok(v.clone()))),
                Outcome::Failure(e) => out.settle_result(f(Err(e.clone()))),
            }
        }));

        result
    }

    /// Maps the settled value; failures and cancellations propagate without
    /// invoking `f`.
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.handle(move |r| match r {
            Ok(v) => Ok(f(v)),
            Err(e) => Err(Interrupt::Failure(e)),
        })
    }

    /// Chains into the [`Deferred`] returned by `f`.
    ///
    /// Upstream cancellation skips `f`. Cancelling the returned value cancels
    /// the currently-active link: the upstream before `f` ran, the inner one
    /// after. Inner failure and cancellation propagate to the returned value.
    pub fn flat_map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Deferred<U> + Send + 'static,
    {
        let result: Deferred<U> = Deferred::pending();

        let active_link: Arc<Mutex<Option<Canceller>>> =
            Arc::new(Mutex::new(Some(self.canceller())));

        {
            let active_link = Arc::clone(&active_link);
            result.on_cancel(Box::new(move |reason| {
                if let Some(cancel) = active_link.lock().unwrap().take() {
                    cancel(reason);
                }
            }));
        }

        let out = result.clone();
        self.on_outcome(Box::new(move |outcome| {
            if out.is_terminal() {
                return;
            }
            match outcome {
                Outcome::Cancelled(r) => {
                    *active_link.lock().unwrap() = None;
                    out.cancel(r.clone());
                }
                Outcome::Failure(e) => {
                    *active_link.lock().unwrap() = None;
                    out.fail(e.clone());
                }
                Outcome::Value(v) => {
                    let inner = f(v.clone());
                    *active_link.lock().unwrap() = Some(inner.canceller());
                    let out = out.clone();
                    inner.on_outcome(Box::new(move |o| {
                        if out.is_terminal() {
                            return;
                        }
                        match o {
                            Outcome::Value(v) => {
                                out.complete(v.clone());
                            }
                            Outcome::Failure(e) => {
                                out.fail(e.clone());
                            }
                            Outcome::Cancelled(r) => {
                                out.cancel(r.clone());
                            }
                        }
                    }));
                }
            }
        }));

        result
    }

    /// Runs `f` on failure only; values pass through and upstream
    /// cancellation bypasses recovery.
    pub fn recover<F>(&self, f: F) -> Deferred<T>
    where
        F: FnOnce(Failure) -> Result<T, Interrupt> + Send + 'static,
    {
        self.handle(move |r| match r {
            Ok(v) => Ok(v),
            Err(e) => f(e),
        })
    }

    /// Waits for both values and combines them with `f`.
    ///
    /// The first failure fails the result; cancellation of either side
    /// cancels it.
    pub fn combine<U, R, F>(&self, other: &Deferred<U>, f: F) -> Deferred<R>
    where
        U: Clone + Send + 'static,
        R: Clone + Send + 'static,
        F: FnOnce(T, U) -> R + Send + 'static,
    {
        struct Both<T, U, F> {
            left: Option<T>,
            right: Option<U>,
            f: Option<F>,
        }

        let result: Deferred<R> = Deferred::pending();
        let both = Arc::new(Mutex::new(Both {
            left: None,
            right: None,
            f: Some(f),
        }));

        fn step<T, U, R, F>(
            result: &Deferred<R>,
            both: &Arc<Mutex<Both<T, U, F>>>,
        ) where
            R: Clone + Send + 'static,
            F: FnOnce(T, U) -> R,
        {
            let ready = {
                let mut both = both.lock().unwrap();
                match (both.left.take(), both.right.take()) {
                    (Some(l), Some(r)) => both.f.take().map(|f| f(l, r)),
                    (l, r) => {
                        both.left = l;
                        both.right = r;
                        None
                    }
                }
            };
            if let Some(value) = ready {
                result.complete(value);
            }
        }

        {
            let result = result.clone();
            let both = Arc::clone(&both);
            self.on_outcome(Box::new(move |outcome| {
                if result.is_terminal() {
                    return;
                }
                match outcome {
                    Outcome::Value(v) => {
                        both.lock().unwrap().left = Some(v.clone());
                        step(&result, &both);
                    }
                    Outcome::Failure(e) => {
                        result.fail(e.clone());
                    }
                    Outcome::Cancelled(r) => {
                        result.cancel(r.clone());
                    }
                }
            }));
        }
        {
            let result = result.clone();
            other.on_outcome(Box::new(move |outcome| {
                if result.is_terminal() {
                    return;
                }
                match outcome {
                    Outcome::Value(v) => {
                        both.lock().unwrap().right = Some(v.clone());
                        step(&result, &both);
                    }
                    Outcome::Failure(e) => {
                        result.fail(e.clone());
                    }
                    Outcome::Cancelled(r) => {
                        result.cancel(r.clone());
                    }
                }
            }));
        }

        result
    }

    /// Waits for every element to settle, then yields all values.
    ///
    /// Failure or cancellation of one element never cancels its siblings: the
    /// result stays pending until every element is terminal, and only then
    /// reflects the earliest (in `items` order) non-value outcome, if any.
    ///
    /// Completion uses a fan-in counter, not chained callbacks, so settling
    /// thousands of elements costs O(n) with no recursion.
    pub fn all(items: Vec<Deferred<T>>) -> Deferred<Vec<T>> {
        if items.is_empty() {
            return Deferred::completed(Vec::new());
        }

        struct FanIn<T> {
            slots: Vec<Option<Outcome<T>>>,
            remaining: usize,
        }

        let result: Deferred<Vec<T>> = Deferred::pending();
        let fan_in = Arc::new(Mutex::new(FanIn {
            slots: (0..items.len()).map(|_| None).collect(),
            remaining: items.len(),
        }));

        for (i, item) in items.iter().enumerate() {
            let result = result.clone();
            let fan_in = Arc::clone(&fan_in);
            item.on_outcome(Box::new(move |outcome| {
                let done = {
                    let mut fan_in = fan_in.lock().unwrap();
                    fan_in.slots[i] = Some(outcome.clone());
                    fan_in.remaining -= 1;
                    if fan_in.remaining == 0 {
                        Some(std::mem::take(&mut fan_in.slots))
                    } else {
                        None
                    }
                };

                let Some(slots) = done else { return };

                let mut values = Vec::with_capacity(slots.len());
                for slot in slots {
                    match slot.expect("all slots settled") {
                        Outcome::Value(v) => values.push(v),
                        Outcome::Failure(e) => {
                            result.fail(e);
                            return;
                        }
                        Outcome::Cancelled(r) => {
                            result.cancel(r);
                            return;
                        }
                    }
                }
                result.complete(values);
            }));
        }

        result
    }
}

/// [`Future`] resolving to a [`Deferred`]'s terminal [`Outcome`].
pub struct OutcomeFuture<T> {
    deferred: Deferred<T>,
}

impl<T: Clone> Future for OutcomeFuture<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.deferred.inner.state.lock().unwrap();
        match &mut *state {
            State::Done(outcome) => Poll::Ready(outcome.clone()),
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}
