//! Observability hooks around field execution and access checks.
//!
//! An engine carries an ordered list of [`Instrumentation`]s. Each produces
//! its own per-request state and only ever sees that state. Hook failures
//! are deliberately fatal for the whole operation: the hooks run outside the
//! field-fetch error scope, so an error here is an engine-integration bug,
//! not a data problem.

use std::{any::Any, sync::Arc};

use derive_more::with_trait::{Display, Error};
use futures::future::BoxFuture;

use crate::checker::CheckerResult;

/// Error raised by an instrumentation hook. Always fatal for the operation.
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
#[display("{message}")]
pub struct InstrumentationError {
    /// Human-readable description of what blew up, and where.
    #[error(not(source))]
    pub message: String,
}

impl InstrumentationError {
    /// Creates a new [`InstrumentationError`] with the provided message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Per-request state owned by one instrumentation.
pub type InstrumentationState = Arc<dyn Any + Send + Sync>;

/// The field a hook is being invoked for.
#[derive(Clone, Copy, Debug)]
pub struct FieldRef<'a> {
    /// Owning type name.
    pub type_name: &'a str,

    /// Field name.
    pub field_name: &'a str,
}

/// Completion callbacks returned by [`Instrumentation::begin_field_execution`].
///
/// Both callbacks run outside the field-fetch error scope; an error aborts
/// the operation.
#[derive(Default)]
pub struct FieldObserver {
    /// Invoked when the field's resolver has been handed to its batch.
    pub on_dispatched: Option<Box<dyn FnOnce() -> Result<(), InstrumentationError> + Send>>,

    /// Invoked when the field completed; the flag tells success from field
    /// failure.
    pub on_completed: Option<Box<dyn FnOnce(bool) -> Result<(), InstrumentationError> + Send>>,
}

/// An access-check execution, wrappable by instrumentations.
pub type AccessCheck = Arc<dyn Fn() -> BoxFuture<'static, CheckerResult> + Send + Sync>;

/// One observability layer.
///
/// Every hook has a no-op default, so implementations only override what
/// they observe.
pub trait Instrumentation: Send + Sync {
    /// Creates this instrumentation's per-request state.
    fn begin_request(&self) -> InstrumentationState {
        Arc::new(())
    }

    /// Invoked before a field execution is planned and dispatched.
    fn begin_field_execution(
        &self,
        state: &InstrumentationState,
        field: &FieldRef<'_>,
    ) -> Result<FieldObserver, InstrumentationError> {
        let (_, _) = (state, field);
        Ok(FieldObserver::default())
    }

    /// Invoked before a resolver's output object is fetched into engine
    /// object data.
    fn begin_fetch_object(
        &self,
        state: &InstrumentationState,
        type_name: &str,
    ) -> Result<(), InstrumentationError> {
        let (_, _) = (state, type_name);
        Ok(())
    }

    /// Invoked before a composite value is completed against its selections.
    fn begin_complete_object(
        &self,
        state: &InstrumentationState,
        type_name: &str,
    ) -> Result<(), InstrumentationError> {
        let (_, _) = (state, type_name);
        Ok(())
    }

    /// Wraps an access-check execution; the default returns it untouched.
    fn instrument_access_check(
        &self,
        state: &InstrumentationState,
        check: AccessCheck,
    ) -> AccessCheck {
        let _ = state;
        check
    }
}

/// An ordered chain of instrumentations.
#[derive(Clone, Default)]
pub struct ChainedInstrumentation {
    entries: Vec<Arc<dyn Instrumentation>>,
}

impl ChainedInstrumentation {
    /// Builds a chain out of the provided instrumentations, invoked in
    /// order.
    pub fn new(entries: Vec<Arc<dyn Instrumentation>>) -> Self {
        Self { entries }
    }

    /// Indicates whether the chain has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Starts a request: every entry creates its own state.
    pub fn begin_request(&self) -> RequestInstrumentation {
        RequestInstrumentation {
            entries: self
                .entries
                .iter()
                .map(|i| (Arc::clone(i), i.begin_request()))
                .collect(),
        }
    }
}

/// A request-scoped view of the instrumentation chain: each entry paired
/// with its own state.
pub struct RequestInstrumentation {
    entries: Vec<(Arc<dyn Instrumentation>, InstrumentationState)>,
}

impl RequestInstrumentation {
    /// Runs every `begin_field_execution` hook, collecting their observers.
    ///
    /// The first hook error aborts (and is fatal for the operation).
    pub fn begin_field_execution(
        &self,
        field: &FieldRef<'_>,
    ) -> Result<Vec<FieldObserver>, InstrumentationError> {
        self.entries
            .iter()
            .map(|(i, state)| i.begin_field_execution(state, field))
            .collect()
    }

    /// Runs every `begin_fetch_object` hook.
    pub fn begin_fetch_object(&self, type_name: &str) -> Result<(), InstrumentationError> {
        for (i, state) in &self.entries {
            i.begin_fetch_object(state, type_name)?;
        }
        Ok(())
    }

    /// Runs every `begin_complete_object` hook.
    pub fn begin_complete_object(&self, type_name: &str) -> Result<(), InstrumentationError> {
        for (i, state) in &self.entries {
            i.begin_complete_object(state, type_name)?;
        }
        Ok(())
    }

    /// Chains `instrument_access_check` through every entry: the output of
    /// entry *i* is the input of entry *i + 1*.
    pub fn instrument_access_check(&self, initial: AccessCheck) -> AccessCheck {
        self.entries
            .iter()
            .fold(initial, |check, (i, state)| {
                i.instrument_access_check(state, check)
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use futures::executor::block_on;

    use crate::checker::CheckerResult;

    use super::{
        AccessCheck, ChainedInstrumentation, FieldRef, Instrumentation, InstrumentationState,
    };

    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    }

    impl Instrumentation for Recorder {
        fn begin_request(&self) -> InstrumentationState {
            Arc::new(AtomicUsize::new(0))
        }

        fn begin_field_execution(
            &self,
            state: &InstrumentationState,
            field: &FieldRef<'_>,
        ) -> Result<super::FieldObserver, super::InstrumentationError> {
            // Each instrumentation sees its own state only.
            let counter = state
                .downcast_ref::<AtomicUsize>()
                .expect("own state type");
            let n = counter.fetch_add(1, Ordering::SeqCst);
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}:{}", self.tag, field.field_name, n));
            Ok(super::FieldObserver::default())
        }

        fn instrument_access_check(
            &self,
            _state: &InstrumentationState,
            check: AccessCheck,
        ) -> AccessCheck {
            let log = Arc::clone(&self.log);
            let tag = self.tag;
            Arc::new(move || {
                log.lock().unwrap().push(format!("{tag}:check"));
                check()
            })
        }
    }

    #[test]
    fn each_entry_has_isolated_state() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = ChainedInstrumentation::new(vec![
            Arc::new(Recorder {
                log: Arc::clone(&log),
                tag: "a",
            }),
            Arc::new(Recorder {
                log: Arc::clone(&log),
                tag: "b",
            }),
        ]);

        let request = chain.begin_request();
        let field = FieldRef {
            type_name: "Query",
            field_name: "foo",
        };
        request.begin_field_execution(&field).unwrap();
        request.begin_field_execution(&field).unwrap();

        // Both entries counted to 1 independently.
        let log = log.lock().unwrap();
        assert_eq!(*log, vec!["a:foo:0", "b:foo:0", "a:foo:1", "b:foo:1"]);
    }

    #[test]
    fn access_check_wrapping_chains_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = ChainedInstrumentation::new(vec![
            Arc::new(Recorder {
                log: Arc::clone(&log),
                tag: "first",
            }),
            Arc::new(Recorder {
                log: Arc::clone(&log),
                tag: "second",
            }),
        ]);
        let request = chain.begin_request();

        let initial: AccessCheck = {
            let log = Arc::clone(&log);
            Arc::new(move || {
                log.lock().unwrap().push("inner".into());
                Box::pin(async { CheckerResult::Success })
            })
        };

        let wrapped = request.instrument_access_check(initial);
        block_on(wrapped());

        // The last entry's wrapper is outermost.
        assert_eq!(
            *log.lock().unwrap(),
            vec!["second:check", "first:check", "inner"],
        );
    }
}
