//! Resolver contracts: selectors, resolved values, engine object data and
//! node references.

mod node;
mod object_data;

use std::sync::Arc;

use async_trait::async_trait;
use fnv::FnvHashMap;
use indexmap::IndexMap;

use crate::{
    ast::{Fragment, InputValue, Name},
    executor::{FieldError, RequestContext, Variables},
    schema::SchemaType,
    select::RawSelectionSet,
    value::Value,
};

pub use self::{
    node::{NodeReference, NodeState},
    object_data::{EngineObjectData, NodeResolveDelegate},
};

/// The result of resolving one selector.
pub type FieldResolution = Result<ResolvedValue, FieldError>;

/// A value produced by a resolver, not yet completed against the schema.
#[derive(Clone, Debug)]
pub enum ResolvedValue {
    /// An explicit `null`.
    Null,

    /// A leaf value.
    Scalar(Value),

    /// A list of values.
    List(Vec<ResolvedValue>),

    /// A composite value read through [`EngineObjectData`].
    Object(EngineObjectData),

    /// A by-id reference to a `Node`, loaded through the node cache when a
    /// sub-selection first reads through it.
    Node(NodeReference),
}

impl ResolvedValue {
    /// Creates a node reference value.
    pub fn node_reference(type_name: impl Into<Name>, id: impl Into<String>) -> Self {
        Self::Node(NodeReference::new(type_name, id))
    }

    /// Does this value represent `null`?
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts a constant [`InputValue`] (no variables left) into a
    /// resolver value. Enum names become strings.
    pub fn from_input(value: &InputValue) -> Self {
        match value {
            InputValue::Null => Self::Null,
            InputValue::Int(i) => Self::Scalar(Value::Int(*i)),
            InputValue::Float(f) => Self::Scalar(Value::Float(*f)),
            InputValue::String(s) => Self::Scalar(Value::String(s.clone())),
            InputValue::Boolean(b) => Self::Scalar(Value::Bool(*b)),
            InputValue::Enum(e) => Self::Scalar(Value::String(e.to_string())),
            InputValue::Variable(_) => Self::Null,
            InputValue::List(l) => Self::List(l.iter().map(Self::from_input).collect()),
            InputValue::Object(o) => Self::Object(EngineObjectData::from_values(
                "",
                o.iter().map(|(k, v)| (k.clone(), Self::from_input(v))),
            )),
        }
    }
}

impl PartialEq for ResolvedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.same_instance(b),
            (Self::Node(a), Self::Node(b)) => {
                a.type_name() == b.type_name() && a.id() == b.id()
            }
            _ => false,
        }
    }
}

impl<T: Into<Value>> From<T> for ResolvedValue {
    fn from(v: T) -> Self {
        Self::Scalar(v.into())
    }
}

/// Coerced field arguments handed to a resolver.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments {
    items: IndexMap<Name, InputValue>,
}

impl Arguments {
    /// Builds [`Arguments`] out of name/value pairs; later duplicates win.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Name, InputValue)>) -> Self {
        Self {
            items: pairs.into_iter().collect(),
        }
    }

    /// Looks up an argument value by name.
    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.items.get(name)
    }

    /// Looks up an `Int` argument.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(InputValue::as_int_value)
    }

    /// Looks up a `String` argument.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(InputValue::as_string_value)
    }

    /// Looks up a `Boolean` argument.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(InputValue::as_boolean_value)
    }

    /// Indicates whether no arguments were passed.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates the arguments in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &InputValue)> {
        self.items.iter()
    }
}

/// Per-task context holding the current fragment registry and variable
/// environment.
///
/// Reset to [`FieldScope::default`] at node-batch boundaries so a caller's
/// fragment registry never leaks into an unrelated node fetch.
#[derive(Clone, Debug, Default)]
pub struct FieldScope {
    /// Fragments of the operation (or required selection set) being served.
    pub fragments: Arc<FnvHashMap<Name, Fragment>>,

    /// The variable environment those fragments are evaluated under.
    pub variables: Arc<Variables>,
}

impl FieldScope {
    /// Creates a scope carrying the provided fragments and variables.
    pub fn new(fragments: Arc<FnvHashMap<Name, Fragment>>, variables: Arc<Variables>) -> Self {
        Self {
            fragments,
            variables,
        }
    }

    /// Indicates whether this scope carries no bindings at all.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.variables.is_empty()
    }
}

/// Context a resolver executes in.
#[derive(Clone)]
pub struct ResolverContext {
    /// The schema being executed against.
    pub schema: Arc<SchemaType>,

    /// The host-supplied request context.
    pub request: RequestContext,

    /// The caller's field scope; empty inside node batch resolution.
    pub field_scope: FieldScope,
}

impl ResolverContext {
    /// Downcasts the request context to a concrete type.
    pub fn request_as<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.request.downcast_ref()
    }

    /// This context with the field scope cleared.
    pub(crate) fn with_cleared_scope(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            request: Arc::clone(&self.request),
            field_scope: FieldScope::default(),
        }
    }
}

/// One input to a (possibly batched) field resolver call.
#[derive(Clone)]
pub struct FieldSelector {
    /// Coerced field arguments.
    pub arguments: Arguments,

    /// The parent object's required-selection-set view.
    pub object_value: EngineObjectData,

    /// The query root's required-selection-set view.
    pub query_value: EngineObjectData,

    /// The caller's sub-selection of this field, if the output type is
    /// composite.
    pub selections: Option<RawSelectionSet>,
}

/// One input to a (possibly batched) node resolver call.
#[derive(Clone)]
pub struct NodeSelector {
    /// The opaque node id.
    pub id: String,

    /// The selections requested from this node.
    pub selections: RawSelectionSet,
}

/// A field resolver.
///
/// Batching resolvers receive every selector enqueued for them within one
/// scheduler tick; non-batching resolvers always receive single-element
/// selector lists. Results are index-aligned with the input selectors. The
/// outer `Err` is a resolver-global failure poisoning the whole batch.
#[async_trait]
pub trait FieldResolver: Send + Sync {
    /// Resolves a batch of selectors.
    async fn batch_resolve(
        &self,
        selectors: Vec<FieldSelector>,
        ctx: &ResolverContext,
    ) -> Result<Vec<FieldResolution>, FieldError>;
}

/// A node resolver: loads objects of one `Node` type by id.
#[async_trait]
pub trait NodeResolver: Send + Sync {
    /// Resolves a batch of id selectors. Results are index-aligned with the
    /// input; the outer `Err` poisons the whole batch.
    async fn batch_resolve(
        &self,
        selectors: Vec<NodeSelector>,
        ctx: &ResolverContext,
    ) -> Result<Vec<Result<EngineObjectData, FieldError>>, FieldError>;
}
