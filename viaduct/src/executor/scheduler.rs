//! The request scheduler.
//!
//! A request executes as one future driving a set of field tasks. A tick
//! boundary is the moment no task can make progress without waiting; at that
//! point every non-empty batch buffer dispatches, in insertion order. This
//! is what lets sibling resolvers land in one `batch_resolve` call without
//! timers or explicit coordination.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, Weak},
    task::{Context, Poll},
};

use fnv::FnvHashMap;
use futures::{
    FutureExt as _,
    future::{self, BoxFuture},
    stream::{FuturesUnordered, StreamExt as _},
};
use indexmap::IndexMap;

use crate::{
    ast::{Fragment, Name, OperationType},
    config::EngineConfig,
    deferred::{Deferred, Outcome, TaskGroup},
    executor::{
        ExecutionError, FieldError, OperationError, PathSegment, RequestContext, Variables,
        complete::run_field,
        node_loader::{self, NodeLoader},
        planner::OperationPlan,
    },
    instrument::{ChainedInstrumentation, RequestInstrumentation},
    registry::{DispatcherRegistry, FieldDispatcher, NodeDispatcher},
    resolver::{
        EngineObjectData, FieldResolution, FieldScope, FieldSelector, ResolverContext,
    },
    response::ExecutionOutput,
    schema::SchemaType,
    select::RawSelectionSet,
    value::{Object, Value},
};

/// Everything a field task needs, shared across the request.
pub(crate) struct RequestCtx {
    pub schema: Arc<SchemaType>,
    pub registry: Arc<DispatcherRegistry>,
    pub variables: Arc<Variables>,
    pub fragments: Arc<FnvHashMap<Name, Fragment>>,
    pub request_context: RequestContext,
    pub group: TaskGroup,
    pub spawner: Spawner,
    pub batches: BatchBuffer,
    pub node_loader: Arc<NodeLoader>,
    pub instrumentation: Arc<RequestInstrumentation>,
    errors: Mutex<Vec<ExecutionError>>,
    fatal: Mutex<Option<OperationError>>,
}

impl RequestCtx {
    /// Captures a field error at its response path.
    pub fn record_error(&self, path: Vec<PathSegment>, error: FieldError) {
        tracing::debug!(error = %error, "field error captured");
        self.errors.lock().unwrap().push(ExecutionError::new(path, error));
    }

    /// Records a fatal error; the first one wins and aborts the request.
    pub fn record_fatal(&self, error: OperationError) {
        let mut fatal = self.fatal.lock().unwrap();
        if fatal.is_none() {
            *fatal = Some(error);
        }
    }

    fn has_fatal(&self) -> bool {
        self.fatal.lock().unwrap().is_some()
    }

    /// A resolver context carrying the operation's field scope.
    pub fn resolver_context(&self, scope: FieldScope) -> ResolverContext {
        ResolverContext {
            schema: Arc::clone(&self.schema),
            request: Arc::clone(&self.request_context),
            field_scope: scope,
        }
    }
}

/// Queue of tasks waiting to join the driver's set.
#[derive(Clone, Default)]
pub(crate) struct Spawner {
    queue: Arc<Mutex<Vec<BoxFuture<'static, ()>>>>,
}

impl Spawner {
    /// Enqueues a task; the driver adopts it before its next poll round.
    pub fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.queue.lock().unwrap().push(task);
    }

    fn drain(&self) -> Vec<BoxFuture<'static, ()>> {
        std::mem::take(&mut *self.queue.lock().unwrap())
    }

    fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    fn clear(&self) {
        self.queue.lock().unwrap().clear();
    }
}

/// One selector waiting for its node batch to dispatch.
pub(crate) struct NodeBatchItem {
    pub reference: crate::resolver::NodeReference,
    pub selections: RawSelectionSet,
    pub output: Deferred<Result<EngineObjectData, FieldError>>,
}

/// A buffered batch, keyed by resolver id.
pub(crate) enum PendingBatch {
    Field {
        dispatcher: Arc<FieldDispatcher>,
        items: Vec<(FieldSelector, Deferred<FieldResolution>)>,
    },
    Node {
        dispatcher: Arc<NodeDispatcher>,
        items: Vec<NodeBatchItem>,
    },
}

/// Per-request buffers of selectors grouped by resolver id, drained at tick
/// boundaries in insertion order.
#[derive(Default)]
pub(crate) struct BatchBuffer {
    queues: Mutex<IndexMap<Name, PendingBatch>>,
}

impl BatchBuffer {
    /// Buffers a field selector, returning the deferred its result lands in.
    pub fn enqueue_field(
        &self,
        dispatcher: &Arc<FieldDispatcher>,
        selector: FieldSelector,
        group: &TaskGroup,
    ) -> Deferred<FieldResolution> {
        let output: Deferred<FieldResolution> = group.deferred();

        let mut queues = self.queues.lock().unwrap();
        let batch = queues
            .entry(dispatcher.resolver_id.clone())
            .or_insert_with(|| PendingBatch::Field {
                dispatcher: Arc::clone(dispatcher),
                items: Vec::new(),
            });
        match batch {
            PendingBatch::Field { items, .. } => items.push((selector, output.clone())),
            PendingBatch::Node { .. } => {
                // Node ids are prefixed, so the keys cannot collide.
                output.complete(Err(FieldError::with_type(
                    "Batch buffer key collision",
                    crate::executor::ErrorType::InternalEngineError,
                )));
            }
        }

        output
    }

    /// Buffers a node selector under the node type's batch.
    pub fn enqueue_node(&self, dispatcher: &Arc<NodeDispatcher>, item: NodeBatchItem) {
        let key = Name::from(format!("node:{}", dispatcher.type_name));

        let mut queues = self.queues.lock().unwrap();
        let batch = queues.entry(key).or_insert_with(|| PendingBatch::Node {
            dispatcher: Arc::clone(dispatcher),
            items: Vec::new(),
        });
        if let PendingBatch::Node { items, .. } = batch {
            items.push(item);
        }
    }

    /// Drains every non-empty buffer, in insertion order.
    fn flush(&self) -> Vec<PendingBatch> {
        let mut queues = self.queues.lock().unwrap();
        queues.drain(..).map(|(_, batch)| batch).collect()
    }

    fn clear(&self) {
        self.queues.lock().unwrap().clear();
    }
}

/// Drives every task of a request; flushes batch buffers at tick boundaries.
struct Driver {
    ctx: Arc<RequestCtx>,
    tasks: FuturesUnordered<BoxFuture<'static, ()>>,
}

impl Driver {
    fn new(ctx: Arc<RequestCtx>) -> Self {
        Self {
            ctx,
            tasks: FuturesUnordered::new(),
        }
    }
}

impl Future for Driver {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        loop {
            for task in self.ctx.spawner.drain() {
                self.tasks.push(task);
            }

            // Poll until nothing is ready: every remaining task is waiting.
            loop {
                match self.tasks.poll_next_unpin(cx) {
                    Poll::Ready(Some(())) => {}
                    Poll::Ready(None) | Poll::Pending => break,
                }
            }

            if !self.ctx.spawner.is_empty() {
                continue;
            }

            // A fatal error abandons all in-flight work.
            if self.ctx.has_fatal() {
                return Poll::Ready(());
            }

            if self.tasks.is_empty() {
                return Poll::Ready(());
            }

            // Tick boundary: dispatch every buffered batch.
            let batches = self.ctx.batches.flush();
            if batches.is_empty() {
                return Poll::Pending;
            }

            for batch in batches {
                let ctx = Arc::clone(&self.ctx);
                match batch {
                    PendingBatch::Field { dispatcher, items } => {
                        tracing::trace!(
                            resolver = %dispatcher.resolver_id,
                            selectors = items.len(),
                            "dispatching field batch",
                        );
                        self.ctx
                            .spawner
                            .spawn(dispatch_field_batch(ctx, dispatcher, items).boxed());
                    }
                    PendingBatch::Node { dispatcher, items } => {
                        tracing::trace!(
                            node_type = %dispatcher.type_name,
                            selectors = items.len(),
                            "dispatching node batch",
                        );
                        self.ctx.spawner.spawn(
                            node_loader::dispatch_node_batch(ctx, dispatcher, items).boxed(),
                        );
                    }
                }
            }
        }
    }
}

/// Calls a field resolver with one tick's worth of selectors and fans the
/// results back out, correlated by position.
async fn dispatch_field_batch(
    ctx: Arc<RequestCtx>,
    dispatcher: Arc<FieldDispatcher>,
    items: Vec<(FieldSelector, Deferred<FieldResolution>)>,
) {
    let (selectors, outputs): (Vec<_>, Vec<_>) = items.into_iter().unzip();
    let resolver_ctx = ctx.resolver_context(FieldScope::new(
        Arc::clone(&ctx.fragments),
        Arc::clone(&ctx.variables),
    ));

    match dispatcher.resolver.batch_resolve(selectors, &resolver_ctx).await {
        Ok(results) if results.len() == outputs.len() => {
            for (output, result) in outputs.into_iter().zip(results) {
                output.complete(result);
            }
        }
        Ok(results) => {
            let error = FieldError::with_type(
                format!(
                    "Batch resolver \"{}\" returned {} results for {} selectors",
                    dispatcher.resolver_id,
                    results.len(),
                    outputs.len(),
                ),
                crate::executor::ErrorType::InternalEngineError,
            );
            for output in outputs {
                output.complete(Err(error.clone()));
            }
        }
        // A resolver-global failure poisons every selector of the batch.
        Err(error) => {
            for output in outputs {
                output.complete(Err(error.clone()));
            }
        }
    }
}

/// Executes a planned operation to its response value and captured errors.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run(
    schema: Arc<SchemaType>,
    registry: Arc<DispatcherRegistry>,
    instrumentation: &ChainedInstrumentation,
    config: &EngineConfig,
    group: TaskGroup,
    plan: OperationPlan,
    variables: Arc<Variables>,
    fragments: Arc<FnvHashMap<Name, Fragment>>,
    request_context: RequestContext,
) -> Result<ExecutionOutput, OperationError> {
    let instrumentation = Arc::new(instrumentation.begin_request());

    let ctx = Arc::new_cyclic(|weak: &Weak<RequestCtx>| RequestCtx {
        schema,
        registry,
        variables,
        fragments,
        request_context,
        group: group.clone(),
        spawner: Spawner::default(),
        batches: BatchBuffer::default(),
        node_loader: Arc::new(NodeLoader::new(weak.clone())),
        instrumentation,
        errors: Mutex::new(Vec::new()),
        fatal: Mutex::new(None),
    });

    let root_data = EngineObjectData::from_values(plan.root_type.clone(), []);
    // Deliberately not a group child: a timed-out request still completes
    // with partial data and field errors.
    let result: Deferred<Value> = Deferred::pending();

    {
        let ctx = Arc::clone(&ctx);
        let result = result.clone();
        let root_data = root_data.clone();
        ctx.clone().spawner.spawn(
            async move {
                let value = run_roots(&ctx, &plan, &root_data).await;
                result.complete(value);
            }
            .boxed(),
        );
    }

    let mut driver = Driver::new(Arc::clone(&ctx));
    match config.timeout {
        None => (&mut driver).await,
        Some(timeout) => {
            tokio::select! {
                () = &mut driver => {}
                () = tokio::time::sleep(timeout) => {
                    tracing::warn!(?timeout, "request deadline hit");
                    ctx.group.cancel(crate::deferred::CancelReason::RequestTimeout);
                    (&mut driver).await;
                }
            }
        }
    }

    // Undrained work would otherwise keep the request context alive.
    ctx.spawner.clear();
    ctx.batches.clear();

    if let Some(fatal) = ctx.fatal.lock().unwrap().take() {
        return Err(fatal);
    }

    let data = match result.outcome().now_or_never() {
        Some(Outcome::Value(v)) => v,
        Some(Outcome::Cancelled(reason)) => return Err(OperationError::Cancelled(reason)),
        Some(Outcome::Failure(f)) => return Err(OperationError::Internal(f.to_string())),
        None => {
            return Err(match ctx.group.cancel_reason() {
                Some(reason) => OperationError::Cancelled(reason),
                None => OperationError::Internal("request finished without a result".into()),
            });
        }
    };

    let mut errors = std::mem::take(&mut *ctx.errors.lock().unwrap());
    errors.sort_by(|a, b| a.path().cmp(b.path()));

    Ok(ExecutionOutput { data, errors })
}

/// Runs the root fields: concurrently for queries, serially for mutations.
async fn run_roots(
    ctx: &Arc<RequestCtx>,
    plan: &OperationPlan,
    root_data: &EngineObjectData,
) -> Value {
    let root = |fe: &Arc<crate::executor::planner::FieldExecution>| {
        run_field(
            Arc::clone(ctx),
            Arc::clone(fe),
            root_data.clone(),
            root_data.clone(),
            vec![PathSegment::Field(fe.response_key.clone())],
        )
    };

    let results = match plan.operation_type {
        OperationType::Query => future::join_all(plan.roots.iter().map(root)).await,
        OperationType::Mutation => {
            let mut results = Vec::with_capacity(plan.roots.len());
            for fe in &plan.roots {
                results.push(root(fe).await);
            }
            results
        }
    };

    let mut object = Object::with_capacity(plan.roots.len());
    for (fe, result) in plan.roots.iter().zip(results) {
        match result {
            Ok(value) => {
                object.add_field(fe.response_key.as_str(), value);
            }
            // A propagating root field nulls the whole response data.
            Err(_) => return Value::Null,
        }
    }

    Value::Object(object)
}
