//! The execution core: planning, scheduling, batching and error scoping.

pub(crate) mod complete;
pub(crate) mod node_loader;
pub(crate) mod planner;
pub(crate) mod scheduler;

use std::{any::Any, fmt, sync::Arc};

use derive_more::with_trait::{Display, Error, From};
use fnv::FnvHashMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::{
    ast::{Definition, InputValue, Name, Operation},
    config::EngineConfig,
    deferred::{CancelReason, TaskGroup},
    instrument::{ChainedInstrumentation, InstrumentationError},
    parser::{ParseError, Spanning, parse_document_source},
    registry::DispatcherRegistry,
    response::ExecutionOutput,
    schema::SchemaType,
};

pub use self::planner::PlanError;

/// The map of variables used for substitution during execution.
pub type Variables = FnvHashMap<Name, InputValue>;

/// The host-supplied per-request context, read by resolvers.
pub type RequestContext = Arc<dyn Any + Send + Sync>;

/// Classification of a field error, surfaced as `errorType` on the wire.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ErrorType {
    /// A resolver (or its required selections) failed.
    #[display("DataFetchingException")]
    DataFetchingException,

    /// A resolver read a selection it never declared.
    #[display("UnsetSelection")]
    UnsetSelection,

    /// The engine violated one of its own invariants.
    #[display("InternalEngineError")]
    InternalEngineError,
}

/// Error produced while resolving a single field.
///
/// Cheap to clone; clones share the same underlying error, so a stored
/// failure rethrown later is observably the same one ([`FieldError::ptr_eq`]).
#[derive(Clone)]
pub struct FieldError {
    inner: Arc<FieldErrorInner>,
}

struct FieldErrorInner {
    message: String,
    error_type: ErrorType,
}

impl FieldError {
    /// Creates a new [`FieldError`] with the provided message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_type(message, ErrorType::DataFetchingException)
    }

    /// Creates a new [`FieldError`] of the provided classification.
    pub fn with_type(message: impl Into<String>, error_type: ErrorType) -> Self {
        Self {
            inner: Arc::new(FieldErrorInner {
                message: message.into(),
                error_type,
            }),
        }
    }

    pub(crate) fn cancelled(reason: CancelReason) -> Self {
        Self::new(reason.to_string())
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// The wire classification.
    pub fn error_type(&self) -> ErrorType {
        self.inner.error_type
    }

    /// Indicates whether two handles refer to the same underlying error.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.message)
    }
}

impl fmt::Debug for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldError")
            .field("message", &self.inner.message)
            .field("error_type", &self.inner.error_type)
            .finish()
    }
}

impl PartialEq for FieldError {
    fn eq(&self, other: &Self) -> bool {
        self.inner.message == other.inner.message
            && self.inner.error_type == other.inner.error_type
    }
}

impl std::error::Error for FieldError {}

impl From<&str> for FieldError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for FieldError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// One step of a response path.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[allow(missing_docs)]
pub enum PathSegment {
    Field(Name),
    Index(usize),
}

impl Serialize for PathSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Field(name) => serializer.serialize_str(name),
            Self::Index(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

/// A field error located at its response path.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionError {
    path: Vec<PathSegment>,
    error: FieldError,
}

impl ExecutionError {
    pub(crate) fn new(path: Vec<PathSegment>, error: FieldError) -> Self {
        Self { path, error }
    }

    /// The response path of the failed field.
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// The underlying field error.
    pub fn error(&self) -> &FieldError {
        &self.error
    }
}

impl Serialize for ExecutionError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("message", self.error.message())?;
        map.serialize_entry("path", &self.path)?;
        map.serialize_entry("errorType", &self.error.error_type().to_string())?;
        map.end()
    }
}

/// An error that prevented execution entirely.
#[derive(Debug, Display, Error, From)]
pub enum OperationError {
    /// The operation text failed to parse.
    Parse(Spanning<ParseError>),

    /// The operation does not validate against the schema.
    Validation(PlanError),

    /// The document carries no operation at all.
    #[display("No operation provided")]
    NoOperationProvided,

    /// Several operations but no `operationName` to choose by.
    #[display("Multiple operations provided")]
    MultipleOperationsProvided,

    /// The requested `operationName` is not in the document.
    #[display("Unknown operation name")]
    UnknownOperationName,

    /// An instrumentation hook failed; fatal by contract.
    Instrumentation(InstrumentationError),

    /// The request was cancelled before completion.
    #[display("Operation cancelled: {_0}")]
    #[from(ignore)]
    Cancelled(#[error(not(source))] CancelReason),

    /// The engine violated one of its own invariants.
    #[display("Internal engine error: {_0}")]
    #[from(ignore)]
    Internal(#[error(not(source))] String),
}

/// One incoming operation.
pub struct OperationRequest {
    /// The operation source text.
    pub operation_text: String,

    /// Which operation of the document to run, when it has several.
    pub operation_name: Option<String>,

    /// The operation's variable values.
    pub variables: Variables,

    /// Opaque host context handed to every resolver.
    pub context: RequestContext,
}

impl OperationRequest {
    /// Creates a request for the provided operation text.
    pub fn new(operation_text: impl Into<String>) -> Self {
        Self {
            operation_text: operation_text.into(),
            operation_name: None,
            variables: Variables::default(),
            context: Arc::new(()),
        }
    }

    /// Selects an operation by name.
    #[must_use]
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Sets the variables from a JSON object.
    #[must_use]
    pub fn variables_json(mut self, json: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = json {
            self.variables = map
                .into_iter()
                .map(|(k, v)| (Name::from(k), InputValue::from_json(v)))
                .collect();
        }
        self
    }

    /// Sets the host request context.
    #[must_use]
    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// Selects the operation to run and collects the document's fragments.
fn get_operation(
    document: Vec<Definition>,
    operation_name: Option<&str>,
) -> Result<(Operation, FnvHashMap<Name, crate::ast::Fragment>), OperationError> {
    let mut operation = None;
    let mut fragments = FnvHashMap::default();

    for def in document {
        match def {
            Definition::Operation(op) => match operation_name {
                Some(name) => {
                    if op.name.as_deref() == Some(name) {
                        operation = Some(op);
                    }
                }
                None => {
                    if operation.is_some() {
                        return Err(OperationError::MultipleOperationsProvided);
                    }
                    operation = Some(op);
                }
            },
            Definition::Fragment(fragment) => {
                fragments.insert(fragment.name.clone(), fragment);
            }
        }
    }

    let operation = operation.ok_or(match operation_name {
        Some(_) => OperationError::UnknownOperationName,
        None => OperationError::NoOperationProvided,
    })?;

    Ok((operation, fragments))
}

/// Applies variable-definition defaults to the request's variable values.
fn coerce_variables(operation: &Operation, mut provided: Variables) -> Variables {
    for def in &operation.variable_definitions {
        if !provided.contains_key(def.name.as_str()) {
            if let Some(default) = &def.default_value {
                provided.insert(def.name.clone(), default.clone());
            }
        }
    }
    provided
}

/// Parses, plans and executes one operation.
pub(crate) async fn execute_request(
    schema: Arc<SchemaType>,
    registry: Arc<DispatcherRegistry>,
    instrumentation: &ChainedInstrumentation,
    config: &EngineConfig,
    group: TaskGroup,
    request: OperationRequest,
) -> Result<ExecutionOutput, OperationError> {
    let document = parse_document_source(&request.operation_text)?;
    let (operation, fragments) = get_operation(document, request.operation_name.as_deref())?;
    let variables = Arc::new(coerce_variables(&operation, request.variables));
    let fragments = Arc::new(fragments);

    let plan = planner::plan_operation(&schema, &registry, &operation, &fragments, &variables)?;

    tracing::debug!(
        operation = operation.name.as_deref().unwrap_or("<anonymous>"),
        root_fields = plan.roots.len(),
        "executing operation",
    );

    scheduler::run(
        schema,
        registry,
        instrumentation,
        config,
        group,
        plan,
        variables,
        fragments,
        request.context,
    )
    .await
}
