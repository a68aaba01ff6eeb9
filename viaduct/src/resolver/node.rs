use std::sync::{Arc, Mutex};

use crate::{
    ast::Name,
    executor::FieldError,
    resolver::EngineObjectData,
};

/// Lifecycle state of a [`NodeReference`].
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum NodeState {
    Unresolved,
    Resolving,
    Resolved(EngineObjectData),
    Failed(FieldError),
    /// Resolved, and the type-level access check passed.
    Checked(EngineObjectData),
    /// Resolved, but the type-level access check failed: every read through
    /// this reference surfaces the stored error.
    CheckFailed(FieldError),
}

/// A by-id reference to a `Node` object, resolved at most once per request.
#[derive(Clone, Debug)]
pub struct NodeReference {
    inner: Arc<NodeRefInner>,
}

#[derive(Debug)]
struct NodeRefInner {
    type_name: Name,
    id: String,
    state: Mutex<NodeState>,
}

impl NodeReference {
    /// Creates a new, unresolved reference to the node of the provided type
    /// and id.
    pub fn new(type_name: impl Into<Name>, id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(NodeRefInner {
                type_name: type_name.into(),
                id: id.into(),
                state: Mutex::new(NodeState::Unresolved),
            }),
        }
    }

    /// The concrete object type this reference points at.
    pub fn type_name(&self) -> &Name {
        &self.inner.type_name
    }

    /// The opaque node id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Marks this reference as being resolved.
    ///
    /// Returns `false` when resolution already started elsewhere.
    pub(crate) fn begin_resolving(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if matches!(*state, NodeState::Unresolved) {
            *state = NodeState::Resolving;
            true
        } else {
            false
        }
    }

    /// Stores the resolver's result on this reference.
    ///
    /// Idempotent: the first call returns `true`, any further call does
    /// nothing and returns `false`.
    pub fn resolve_data(&self, result: Result<EngineObjectData, FieldError>) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        match *state {
            NodeState::Unresolved | NodeState::Resolving => {
                *state = match result {
                    Ok(data) => NodeState::Resolved(data),
                    Err(e) => NodeState::Failed(e),
                };
                true
            }
            _ => false,
        }
    }

    /// Records the type-level access check verdict.
    ///
    /// Only meaningful on a resolved reference; does nothing otherwise.
    pub(crate) fn record_check(&self, error: Option<FieldError>) {
        let mut state = self.inner.state.lock().unwrap();
        if let NodeState::Resolved(data) = &*state {
            *state = match error {
                None => NodeState::Checked(data.clone()),
                Some(e) => NodeState::CheckFailed(e),
            };
        }
    }

    /// The resolved data or stored failure, if this reference is terminal.
    pub fn data(&self) -> Option<Result<EngineObjectData, FieldError>> {
        match &*self.inner.state.lock().unwrap() {
            NodeState::Resolved(data) | NodeState::Checked(data) => Some(Ok(data.clone())),
            NodeState::Failed(e) | NodeState::CheckFailed(e) => Some(Err(e.clone())),
            NodeState::Unresolved | NodeState::Resolving => None,
        }
    }

    /// Snapshot of the current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.inner.state.lock().unwrap().clone()
    }
}
