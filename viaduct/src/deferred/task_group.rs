use std::sync::{Arc, Mutex};

use crate::deferred::{CancelReason, Deferred};

/// The per-request parent of every [`Deferred`] the engine creates.
///
/// Children are supervised: a child completing, failing or being cancelled
/// never affects its siblings, while cancelling the group cancels every
/// still-pending child. Deferreds created without a group behave identically
/// except for the cancellation cascade.
#[derive(Clone, Default)]
pub struct TaskGroup {
    inner: Arc<GroupInner>,
}

#[derive(Default)]
struct GroupInner {
    state: Mutex<GroupState>,
}

#[derive(Default)]
struct GroupState {
    cancelled: Option<CancelReason>,
    children: Vec<Box<dyn Cancellable>>,
}

trait Cancellable: Send {
    fn cancel_with(&self, reason: &CancelReason);
    fn is_terminal(&self) -> bool;
}

impl<T: Clone + Send + 'static> Cancellable for Deferred<T> {
    fn cancel_with(&self, reason: &CancelReason) {
        self.cancel(reason.clone());
    }

    fn is_terminal(&self) -> bool {
        Deferred::is_terminal(self)
    }
}

impl TaskGroup {
    /// Creates a new, uncancelled [`TaskGroup`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pending [`Deferred`] supervised by this group.
    ///
    /// When the group is already cancelled the returned value is born
    /// cancelled with the group's reason.
    pub fn deferred<T: Clone + Send + 'static>(&self) -> Deferred<T> {
        let d = Deferred::pending();
        self.adopt(&d);
        d
    }

    /// Links an existing [`Deferred`] into this group's cancellation scope.
    pub fn adopt<T: Clone + Send + 'static>(&self, deferred: &Deferred<T>) {
        let mut state = self.inner.state.lock().unwrap();

        if let Some(reason) = &state.cancelled {
            let reason = reason.clone();
            drop(state);
            deferred.cancel(reason);
            return;
        }

        // Settled children are never cancelled again; dropping them here
        // keeps the supervisor list proportional to in-flight work.
        state.children.retain(|c| !c.is_terminal());
        state.children.push(Box::new(deferred.clone()));
    }

    /// Cancels this group and every still-pending child.
    ///
    /// The first reason wins; repeated cancellation is a no-op.
    pub fn cancel(&self, reason: CancelReason) {
        let children = {
            let mut state = self.inner.state.lock().unwrap();
            if state.cancelled.is_some() {
                return;
            }
            state.cancelled = Some(reason.clone());
            std::mem::take(&mut state.children)
        };

        for child in children {
            child.cancel_with(&reason);
        }
    }

    /// The reason this group was cancelled for, if it was.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.inner.state.lock().unwrap().cancelled.clone()
    }

    /// Indicates whether this group was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().unwrap().cancelled.is_some()
    }
}
