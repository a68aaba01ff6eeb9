//! Viaduct is a GraphQL execution engine whose resolvers declare the
//! parent-object and query-root fields they need — required selection sets —
//! before they run. The engine plans the resulting dependency graph, runs it
//! concurrently with per-tick batching, memoises `Node` lookups per request,
//! and contains failures to the smallest correct scope.
//!
//! ```rust
//! use viaduct::{Engine, OperationRequest, ResolvedValue, TenantModuleBootstrapper};
//!
//! # futures::executor::block_on(async {
//! let mut module = TenantModuleBootstrapper::new();
//! module.value("Query", "foo", ResolvedValue::from("hello world"));
//!
//! let engine = Engine::builder()
//!     .schema_sdl("type Query { foo: String }")
//!     .module(module)
//!     .build()
//!     .unwrap();
//!
//! let output = engine
//!     .execute(OperationRequest::new("{ foo }"))
//!     .await
//!     .unwrap();
//! assert_eq!(
//!     output.to_json(),
//!     serde_json::json!({"data": {"foo": "hello world"}}),
//! );
//! # });
//! ```

pub mod ast;
pub mod checker;
pub mod config;
pub mod deferred;
pub mod executor;
pub mod instrument;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod response;
pub mod rss;
pub mod schema;
pub mod select;
pub mod value;

#[cfg(any(test, feature = "expose-test-harness"))]
pub mod tests;

#[cfg(test)]
mod executor_tests;

use std::{future::Future, sync::Arc};

use derive_more::with_trait::{Display, Error, From};

use crate::{deferred::TaskGroup, executor::execute_request};

pub use crate::{
    checker::{CheckerError, CheckerKind, CheckerResult},
    config::EngineConfig,
    deferred::{CancelReason, Deferred},
    executor::{
        ErrorType, ExecutionError, FieldError, OperationError, OperationRequest, Variables,
    },
    instrument::{ChainedInstrumentation, Instrumentation, InstrumentationError},
    registry::{DispatcherRegistry, TenantModuleBootstrapper},
    resolver::{
        Arguments, EngineObjectData, FieldSelector, NodeReference, NodeSelector, ResolvedValue,
        ResolverContext,
    },
    response::ExecutionOutput,
    rss::{RequiredSelectionSet, VariableSpec},
    schema::{SchemaError, SchemaType},
    select::RawSelectionSet,
    value::{Object, Value},
};

/// Error assembling an [`Engine`].
#[derive(Debug, Display, Error, From)]
#[allow(missing_docs)]
pub enum EngineError {
    Schema(SchemaError),
    Bootstrap(registry::BootstrapError),

    /// The builder was not given a schema.
    #[display("No schema provided")]
    MissingSchema,
}

/// An assembled engine: schema, dispatcher registry, instrumentation chain
/// and configuration. Immutable once built; one instance serves any number
/// of concurrent requests.
pub struct Engine {
    schema: Arc<SchemaType>,
    registry: Arc<DispatcherRegistry>,
    instrumentation: ChainedInstrumentation,
    config: EngineConfig,
}

impl Engine {
    /// Starts building an [`Engine`].
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The schema this engine executes against.
    pub fn schema(&self) -> &Arc<SchemaType> {
        &self.schema
    }

    /// Executes one operation to completion.
    pub async fn execute(
        &self,
        request: OperationRequest,
    ) -> Result<ExecutionOutput, OperationError> {
        let (execution, _handle) = self.execute_with_handle(request);
        execution.await
    }

    /// Executes one operation, also returning a handle that can cancel it
    /// from outside.
    pub fn execute_with_handle(
        &self,
        request: OperationRequest,
    ) -> (
        impl Future<Output = Result<ExecutionOutput, OperationError>> + Send + '_,
        RequestHandle,
    ) {
        let group = TaskGroup::new();
        let handle = RequestHandle {
            group: group.clone(),
        };

        let execution = execute_request(
            Arc::clone(&self.schema),
            Arc::clone(&self.registry),
            &self.instrumentation,
            &self.config,
            group,
            request,
        );

        (execution, handle)
    }
}

/// Cancels an in-flight request from outside the execution.
#[derive(Clone)]
pub struct RequestHandle {
    group: TaskGroup,
}

impl RequestHandle {
    /// Cancels the request; every in-flight resolver is cancelled through
    /// the request's task group.
    pub fn cancel(&self, reason: CancelReason) {
        self.group.cancel(reason);
    }
}

/// Builder for an [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    sdl: Option<String>,
    schema: Option<Arc<SchemaType>>,
    modules: Vec<TenantModuleBootstrapper>,
    instrumentations: Vec<Arc<dyn Instrumentation>>,
    config: EngineConfig,
}

impl EngineBuilder {
    /// Provides the schema as SDL text.
    #[must_use]
    pub fn schema_sdl(mut self, sdl: impl Into<String>) -> Self {
        self.sdl = Some(sdl.into());
        self
    }

    /// Provides an already-built schema.
    #[must_use]
    pub fn schema(mut self, schema: Arc<SchemaType>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Adds a module's registrations. Order matters for duplicate detection
    /// diagnostics only.
    #[must_use]
    pub fn module(mut self, module: TenantModuleBootstrapper) -> Self {
        self.modules.push(module);
        self
    }

    /// Appends an instrumentation to the chain.
    #[must_use]
    pub fn instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.instrumentations.push(instrumentation);
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates everything and assembles the engine.
    pub fn build(self) -> Result<Engine, EngineError> {
        let schema = match (self.schema, self.sdl) {
            (Some(schema), _) => schema,
            (None, Some(sdl)) => Arc::new(SchemaType::from_sdl(&sdl)?),
            (None, None) => return Err(EngineError::MissingSchema),
        };

        let registry = Arc::new(DispatcherRegistry::assemble(&schema, self.modules)?);

        Ok(Engine {
            schema,
            registry,
            instrumentation: ChainedInstrumentation::new(self.instrumentations),
            config: self.config,
        })
    }
}
