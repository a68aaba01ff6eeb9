//! Field dispatch and value completion.
//!
//! `run_field` is the unit of execution: it materialises the resolver's
//! required selections, hands a selector to the batch scheduler, applies the
//! field's access check, and completes the result against the schema with
//! GraphQL null-propagation. Required-selection-set materialisation re-enters
//! the same machinery, which is what turns declared dependencies into a
//! dependency graph of field computations.

use std::sync::Arc;

use fnv::FnvHashMap;
use futures::future::{self, BoxFuture};

use crate::{
    ast::Name,
    checker::{CheckerError, CheckerKind, CheckerResult, CheckerResultContext},
    deferred::{CancelReason, Deferred, Interrupt},
    executor::{
        ErrorType, FieldError, OperationError, PathSegment, Variables,
        planner::{self, Dispatch, FieldExecution},
        scheduler::RequestCtx,
    },
    instrument::{AccessCheck, FieldRef},
    registry::CheckerDispatcher,
    resolver::{
        Arguments, EngineObjectData, FieldResolution, FieldScope, FieldSelector,
        NodeResolveDelegate, ResolvedValue,
    },
    rss::{RequiredSelectionSet, VariablesContext},
    select::{Applies, ParsedSelections, RawSelectionSet},
    value::{Object, Value},
};

/// Signal that a field's null must bubble to the nearest nullable ancestor.
pub(crate) struct Propagate;

type CompletionResult = Result<Value, Propagate>;

/// Executes one planned field against its parent object data.
pub(crate) fn run_field(
    ctx: Arc<RequestCtx>,
    fe: Arc<FieldExecution>,
    parent: EngineObjectData,
    query_root: EngineObjectData,
    path: Vec<PathSegment>,
) -> BoxFuture<'static, CompletionResult> {
    Box::pin(async move {
        let mut observers = match ctx.instrumentation.begin_field_execution(&FieldRef {
            type_name: &fe.parent_type,
            field_name: &fe.field_name,
        }) {
            Ok(observers) => observers,
            Err(e) => {
                ctx.record_fatal(OperationError::Instrumentation(e));
                return Err(Propagate);
            }
        };

        for observer in &mut observers {
            if let Some(on_dispatched) = observer.on_dispatched.take() {
                if let Err(e) = on_dispatched() {
                    ctx.record_fatal(OperationError::Instrumentation(e));
                    return Err(Propagate);
                }
            }
        }

        let fetch = fetch_field_value(&ctx, &fe, &parent, &query_root);
        let check = field_check(&ctx, &fe, &parent, &query_root);
        let (mut fetched, check_error) = future::join(fetch, check).await;
        if let Some(error) = check_error {
            fetched = Err(error);
        }

        let completed = match fetched {
            Ok(value) => {
                complete_value(&ctx, &fe, &fe.field_type, value, path.clone(), &query_root)
                    .await
            }
            Err(error) => {
                ctx.record_error(path.clone(), error);
                if fe.field_type.is_non_null() {
                    Err(Propagate)
                } else {
                    Ok(Value::Null)
                }
            }
        };

        let succeeded = completed.is_ok();
        for observer in &mut observers {
            if let Some(on_completed) = observer.on_completed.take() {
                if let Err(e) = on_completed(succeeded) {
                    ctx.record_fatal(OperationError::Instrumentation(e));
                    return Err(Propagate);
                }
            }
        }

        completed
    })
}

/// The fetch boundary: everything in here fails the field, not the request.
async fn fetch_field_value(
    ctx: &Arc<RequestCtx>,
    fe: &Arc<FieldExecution>,
    parent: &EngineObjectData,
    query_root: &EngineObjectData,
) -> FieldResolution {
    match &fe.dispatch {
        Dispatch::TypeName => Ok(ResolvedValue::Scalar(Value::String(
            parent.type_name().to_string(),
        ))),
        Dispatch::Property => parent.fetch(&fe.field_name).await,
        Dispatch::NodeField => node_field_value(ctx, fe),
        Dispatch::Resolver(dispatcher) => {
            let dispatcher = Arc::clone(dispatcher);
            resolve_with_dispatcher(ctx, fe, &dispatcher, parent, query_root).await
        }
    }
}

async fn resolve_with_dispatcher(
    ctx: &Arc<RequestCtx>,
    fe: &Arc<FieldExecution>,
    dispatcher: &Arc<crate::registry::FieldDispatcher>,
    parent: &EngineObjectData,
    query_root: &EngineObjectData,
) -> FieldResolution {
    let arguments = Arguments::from_pairs(fe.arguments.iter().cloned());

    // Both planes materialise in parallel, each as a fresh object-data view.
    let object_view = async {
        match &dispatcher.object_selections {
            Some(rss) => materialize_rss(ctx, rss, parent, query_root, &arguments)
                .await
                .map(Some),
            None => Ok(None),
        }
    };
    let query_view = async {
        match &dispatcher.query_selections {
            Some(rss) => materialize_rss(ctx, rss, query_root, query_root, &arguments)
                .await
                .map(Some),
            None => Ok(None),
        }
    };
    let (object_view, query_view) = future::try_join(object_view, query_view).await?;

    let selector = FieldSelector {
        arguments,
        object_value: object_view
            .unwrap_or_else(|| EngineObjectData::from_values(fe.parent_type.clone(), [])),
        query_value: query_view
            .unwrap_or_else(|| EngineObjectData::from_values(query_root.type_name().clone(), [])),
        selections: (!fe.selection_ast.is_empty()).then(|| raw_selections(ctx, fe)),
    };

    if dispatcher.batching {
        let output = ctx.batches.enqueue_field(dispatcher, selector, &ctx.group);
        match output.value().await {
            Ok(resolution) => resolution,
            Err(interrupt) => Err(interrupt_to_error(ctx, interrupt)),
        }
    } else {
        let resolver_ctx = ctx.resolver_context(fe.scope.clone());
        let resolve = dispatcher.resolver.batch_resolve(vec![selector], &resolver_ctx);

        match race_cancellation(ctx, resolve).await {
            Err(interrupt) => Err(interrupt_to_error(ctx, interrupt)),
            Ok(Ok(mut results)) if results.len() == 1 => match results.pop() {
                Some(result) => result,
                None => Err(internal_error("resolver dropped its only result")),
            },
            Ok(Ok(results)) => Err(internal_error(format!(
                "Resolver \"{}\" returned {} results for 1 selector",
                dispatcher.resolver_id,
                results.len(),
            ))),
            Ok(Err(e)) => Err(e),
        }
    }
}

/// Awaits `fut`, abandoning it when the request's task group is cancelled.
///
/// Cancellation is best-effort: the in-flight future is dropped, and its
/// would-be result discarded.
async fn race_cancellation<F: std::future::Future>(
    ctx: &Arc<RequestCtx>,
    fut: F,
) -> Result<F::Output, Interrupt> {
    let gate: Deferred<()> = ctx.group.deferred();

    futures::pin_mut!(fut);
    match future::select(fut, gate.outcome()).await {
        future::Either::Left((value, _)) => {
            gate.complete(());
            Ok(value)
        }
        future::Either::Right((outcome, _)) => match outcome {
            crate::deferred::Outcome::Cancelled(reason) => Err(Interrupt::Cancelled(reason)),
            _ => Err(Interrupt::Cancelled(CancelReason::RequestCancelled)),
        },
    }
}

/// The query-root `node(id:)` field: ids carry their concrete type as a
/// `Type:rest` prefix and resolve through the node loader.
fn node_field_value(ctx: &Arc<RequestCtx>, fe: &Arc<FieldExecution>) -> FieldResolution {
    let id = fe
        .arguments
        .iter()
        .find(|(name, _)| name.as_str() == "id")
        .and_then(|(_, v)| v.as_string_value())
        .ok_or_else(|| FieldError::new("node(id:) requires a string id"))?;

    let type_name = id.split(':').next().unwrap_or_default();
    let known = ctx
        .schema
        .concrete_type_by_name(type_name)
        .is_some_and(crate::schema::meta::MetaType::is_concrete);
    if type_name.is_empty() || !known {
        return Err(FieldError::new(format!("Cannot resolve node id \"{id}\"")));
    }

    Ok(ResolvedValue::node_reference(type_name, id))
}

/// Maps a scheduler-level interruption into the field-level error policy.
pub(crate) fn interrupt_to_error(ctx: &Arc<RequestCtx>, interrupt: Interrupt) -> FieldError {
    match interrupt {
        Interrupt::Failure(f) => {
            FieldError::with_type(f.to_string(), ErrorType::InternalEngineError)
        }
        Interrupt::Cancelled(reason) => match ctx.group.cancel_reason() {
            // Timeouts degrade into field errors with a stable message.
            Some(CancelReason::RequestTimeout) => FieldError::new("request timed out"),
            // A request-level cancellation wins over the local one.
            Some(existing) => {
                ctx.record_fatal(OperationError::Cancelled(existing.clone()));
                FieldError::cancelled(existing)
            }
            None => FieldError::cancelled(reason),
        },
    }
}

fn internal_error(message: impl Into<String>) -> FieldError {
    FieldError::with_type(message, ErrorType::InternalEngineError)
}

/// The caller's sub-selection of this field as a raw selection set.
fn raw_selections(ctx: &Arc<RequestCtx>, fe: &Arc<FieldExecution>) -> RawSelectionSet {
    let root = Name::from(fe.field_type.innermost_name());
    RawSelectionSet::new(
        Arc::clone(&ctx.schema),
        ParsedSelections::from_shared(
            root,
            Arc::clone(&fe.selection_ast),
            Arc::clone(&fe.scope.fragments),
        ),
        Arc::clone(&fe.scope.variables),
    )
}

// ===== Completion =====

/// Completes a resolver value against its declared type, absorbing nested
/// nulls at this position when the type allows it.
async fn complete_value(
    ctx: &Arc<RequestCtx>,
    fe: &Arc<FieldExecution>,
    ty: &crate::ast::TypeRef,
    value: ResolvedValue,
    path: Vec<PathSegment>,
    query_root: &EngineObjectData,
) -> CompletionResult {
    match complete_strict(ctx, fe, ty, value, path, query_root).await {
        Err(Propagate) if !ty.is_non_null() => Ok(Value::Null),
        other => other,
    }
}

fn complete_strict<'a>(
    ctx: &'a Arc<RequestCtx>,
    fe: &'a Arc<FieldExecution>,
    ty: &'a crate::ast::TypeRef,
    value: ResolvedValue,
    path: Vec<PathSegment>,
    query_root: &'a EngineObjectData,
) -> BoxFuture<'a, CompletionResult> {
    use crate::ast::TypeRef;

    Box::pin(async move {
        match ty {
            TypeRef::NonNull(inner) => {
                if value.is_null() {
                    ctx.record_error(
                        path,
                        FieldError::new(format!(
                            "Cannot return null for non-nullable field {}.{}",
                            fe.parent_type, fe.field_name,
                        )),
                    );
                    return Err(Propagate);
                }
                complete_strict(ctx, fe, inner, value, path, query_root).await
            }

            TypeRef::List(inner) => match value {
                ResolvedValue::Null => Ok(Value::Null),
                ResolvedValue::List(items) => {
                    let elements = items.into_iter().enumerate().map(|(i, item)| {
                        let mut element_path = path.clone();
                        element_path.push(PathSegment::Index(i));
                        complete_value(ctx, fe, inner, item, element_path, query_root)
                    });
                    let results = future::join_all(elements).await;

                    let mut values = Vec::with_capacity(results.len());
                    for result in results {
                        match result {
                            Ok(v) => values.push(v),
                            Err(Propagate) => return Err(Propagate),
                        }
                    }
                    Ok(Value::List(values))
                }
                other => {
                    ctx.record_error(
                        path,
                        internal_error(format!(
                            "Expected a list for {}.{}, got {other:?}",
                            fe.parent_type, fe.field_name,
                        )),
                    );
                    Err(Propagate)
                }
            },

            TypeRef::Named(name) => match value {
                ResolvedValue::Null => Ok(Value::Null),
                value => {
                    let Some(meta) = ctx.schema.concrete_type_by_name(name) else {
                        ctx.record_error(
                            path,
                            internal_error(format!("Unknown output type \"{name}\"")),
                        );
                        return Err(Propagate);
                    };

                    if meta.is_composite() {
                        complete_object(ctx, fe, value, path, query_root).await
                    } else {
                        complete_leaf(ctx, fe, value, path)
                    }
                }
            },
        }
    })
}

fn complete_leaf(
    ctx: &Arc<RequestCtx>,
    fe: &Arc<FieldExecution>,
    value: ResolvedValue,
    path: Vec<PathSegment>,
) -> CompletionResult {
    match value {
        ResolvedValue::Scalar(v) => Ok(v),
        other => {
            ctx.record_error(
                path,
                internal_error(format!(
                    "Expected a leaf value for {}.{}, got {other:?}",
                    fe.parent_type, fe.field_name,
                )),
            );
            Err(Propagate)
        }
    }
}

async fn complete_object(
    ctx: &Arc<RequestCtx>,
    fe: &Arc<FieldExecution>,
    value: ResolvedValue,
    path: Vec<PathSegment>,
    query_root: &EngineObjectData,
) -> CompletionResult {
    if let Err(e) = ctx
        .instrumentation
        .begin_fetch_object(fe.field_type.innermost_name())
    {
        ctx.record_fatal(OperationError::Instrumentation(e));
        return Err(Propagate);
    }

    let object_data = match value {
        ResolvedValue::Object(data) => data,
        // A node reference is touched here: its sub-selection is about to be
        // completed, so resolution happens now and a failure scopes to this
        // value's own path.
        ResolvedValue::Node(reference) => {
            let selections = raw_selections(ctx, fe);
            match ctx.node_loader.resolve(&reference, &selections).value().await {
                Ok(Ok(data)) => data,
                Ok(Err(error)) => {
                    ctx.record_error(path, error);
                    return Err(Propagate);
                }
                Err(interrupt) => {
                    let error = interrupt_to_error(ctx, interrupt);
                    ctx.record_error(path, error);
                    return Err(Propagate);
                }
            }
        }
        other => {
            ctx.record_error(
                path,
                internal_error(format!(
                    "Expected an object for {}.{}, got {other:?}",
                    fe.parent_type, fe.field_name,
                )),
            );
            return Err(Propagate);
        }
    };

    let runtime_type = object_data.type_name().clone();
    if let Err(e) = ctx.instrumentation.begin_complete_object(&runtime_type) {
        ctx.record_fatal(OperationError::Instrumentation(e));
        return Err(Propagate);
    }

    // Runtime narrowing: only children whose condition matches the concrete
    // type run; the first selection of a response key wins.
    let mut applicable: Vec<Arc<FieldExecution>> = Vec::new();
    for child in &fe.children {
        let matches = match &child.applies {
            Applies::All => true,
            Applies::OnlyType(t) => ctx.schema.is_possible_type(t, &runtime_type),
        };
        if matches && !applicable.iter().any(|c| c.response_key == child.response_key) {
            applicable.push(Arc::clone(child));
        }
    }

    let children = applicable.iter().map(|child| {
        let mut child_path = path.clone();
        child_path.push(PathSegment::Field(child.response_key.clone()));
        run_field(
            Arc::clone(ctx),
            Arc::clone(child),
            object_data.clone(),
            query_root.clone(),
            child_path,
        )
    });
    let results = future::join_all(children).await;

    let mut object = Object::with_capacity(applicable.len());
    for (child, result) in applicable.iter().zip(results) {
        match result {
            Ok(v) => {
                object.add_field(child.response_key.as_str(), v);
            }
            Err(Propagate) => return Err(Propagate),
        }
    }

    Ok(Value::Object(object))
}

// ===== Required-selection-set materialisation =====

/// Materialises a required selection set into a fresh object-data view:
/// variables resolvers run concurrently, then the bound selections execute
/// through the regular dispatch machinery against `parent`.
pub(crate) fn materialize_rss<'a>(
    ctx: &'a Arc<RequestCtx>,
    rss: &'a RequiredSelectionSet,
    parent: &'a EngineObjectData,
    query_root: &'a EngineObjectData,
    arguments: &'a Arguments,
) -> BoxFuture<'a, Result<EngineObjectData, FieldError>> {
    Box::pin(async move {
        let resolvers = rss.variables_resolvers().iter().map(|vr| async move {
            // A resolver's input selections materialise against the plane
            // their root type names: query-rooted inputs read the query
            // root even when the main set is an object-plane one.
            let input_view = match vr.input_selections() {
                Some(input) => {
                    let base = if input.selections().type_condition()
                        == ctx.schema.query_type_name()
                        && parent.type_name() != ctx.schema.query_type_name()
                    {
                        query_root
                    } else {
                        parent
                    };
                    Some(materialize_rss(ctx, input, base, query_root, arguments).await?)
                }
                None => None,
            };

            let resolver_ctx = ctx.resolver_context(FieldScope::default());
            let variables_ctx = VariablesContext {
                arguments,
                object_value: Some(input_view.as_ref().unwrap_or(parent)),
                query_value: Some(input_view.as_ref().unwrap_or(query_root)),
                resolver: &resolver_ctx,
            };
            vr.resolve(&variables_ctx).await
        });

        let mut merged = Variables::default();
        for vars in future::try_join_all(resolvers).await? {
            merged.extend(vars);
        }

        let raw = RawSelectionSet::new(
            Arc::clone(&ctx.schema),
            rss.selections().clone(),
            Arc::new(merged),
        );
        let view = execute_selection_data(ctx, &raw, parent, query_root)?;

        // The whole set settles before the dependent resolver runs: a
        // selector never observes a half-materialised view, and a failure
        // anywhere in the set fails the dependent field up front.
        settle_view(&view).await?;
        Ok(view)
    })
}

/// Awaits every reachable selection of a materialised view.
fn settle_view(data: &EngineObjectData) -> BoxFuture<'_, Result<(), FieldError>> {
    Box::pin(async move {
        for name in data.selections() {
            settle_value(&data.fetch(&name).await?).await?;
        }
        Ok(())
    })
}

fn settle_value<'a>(value: &'a ResolvedValue) -> BoxFuture<'a, Result<(), FieldError>> {
    Box::pin(async move {
        match value {
            ResolvedValue::Object(data) => settle_view(data).await,
            ResolvedValue::List(items) => {
                for item in items {
                    settle_value(item).await?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    })
}

/// Executes a raw selection set against `parent`, producing lazy object data
/// whose slots fill in as the spawned field tasks finish.
pub(crate) fn execute_selection_data(
    ctx: &Arc<RequestCtx>,
    raw: &RawSelectionSet,
    parent: &EngineObjectData,
    query_root: &EngineObjectData,
) -> Result<EngineObjectData, FieldError> {
    let mut planned = Vec::new();
    for (selections, variables) in raw.parts() {
        let fields = planner::plan_selections(
            &ctx.schema,
            &ctx.registry,
            selections.type_condition(),
            selections.selections(),
            &selections.shared_fragments(),
            variables,
        )
        .map_err(|e| FieldError::new(e.to_string()))?;
        planned.extend(fields);
    }

    Ok(execute_planned_fields(ctx, &planned, parent, query_root))
}

/// Spawns one task per planned field; reads through the returned object data
/// suspend until the corresponding task finishes.
fn execute_planned_fields(
    ctx: &Arc<RequestCtx>,
    fields: &[Arc<FieldExecution>],
    parent: &EngineObjectData,
    query_root: &EngineObjectData,
) -> EngineObjectData {
    let mut slots: FnvHashMap<Name, Deferred<FieldResolution>> = FnvHashMap::default();

    for fe in fields {
        if slots.contains_key(&fe.field_name) {
            continue;
        }
        let slot: Deferred<FieldResolution> = ctx.group.deferred();
        slots.insert(fe.field_name.clone(), slot.clone());

        let ctx = Arc::clone(ctx);
        let fe = Arc::clone(fe);
        let parent = parent.clone();
        let query_root = query_root.clone();
        ctx.clone().spawner.spawn(Box::pin(async move {
            let fetch = fetch_field_value(&ctx, &fe, &parent, &query_root);
            let check = field_check(&ctx, &fe, &parent, &query_root);
            let (mut fetched, check_error) = future::join(fetch, check).await;
            if let Some(error) = check_error {
                fetched = Err(error);
            }

            let projected = match fetched {
                Ok(value) => project_value(&ctx, &fe, value, &query_root).await,
                Err(e) => Err(e),
            };
            slot.complete(projected);
        }));
    }

    EngineObjectData::pending_slots(parent.type_name().clone(), slots)
}

/// Wraps a fetched value's composite parts into lazy sub-views, so nested
/// required selections resolve through the engine too.
fn project_value<'a>(
    ctx: &'a Arc<RequestCtx>,
    fe: &'a Arc<FieldExecution>,
    value: ResolvedValue,
    query_root: &'a EngineObjectData,
) -> BoxFuture<'a, FieldResolution> {
    Box::pin(async move {
        match value {
            ResolvedValue::Object(data) if !fe.children.is_empty() => Ok(ResolvedValue::Object(
                execute_planned_fields(ctx, &fe.children, &data, query_root),
            )),
            ResolvedValue::Node(reference) if !fe.children.is_empty() => {
                Ok(ResolvedValue::Object(EngineObjectData::node(
                    reference,
                    node_delegate(ctx),
                    raw_selections(ctx, fe),
                )))
            }
            ResolvedValue::List(items) => {
                let projected =
                    future::join_all(items.into_iter().map(|item| {
                        project_value(ctx, fe, item, query_root)
                    }))
                    .await;
                Ok(ResolvedValue::List(
                    projected.into_iter().collect::<Result<_, _>>()?,
                ))
            }
            other => Ok(other),
        }
    })
}

fn node_delegate(ctx: &Arc<RequestCtx>) -> Arc<dyn NodeResolveDelegate> {
    Arc::clone(&ctx.node_loader) as Arc<dyn NodeResolveDelegate>
}

// ===== Access checks =====

async fn field_check(
    ctx: &Arc<RequestCtx>,
    fe: &Arc<FieldExecution>,
    parent: &EngineObjectData,
    query_root: &EngineObjectData,
) -> Option<FieldError> {
    let dispatcher = ctx
        .registry
        .field_checker_dispatcher(&fe.parent_type, &fe.field_name)
        .map(Arc::clone)?;

    run_checker(
        ctx,
        dispatcher,
        CheckerKind::Field,
        Some((fe.parent_type.clone(), fe.field_name.clone())),
        parent,
        query_root,
        Arguments::from_pairs(fe.arguments.iter().cloned()),
    )
    .await
}

/// Runs one checker, with instrumentation wrapping, returning the error to
/// degrade the guarded field(s) with, if any.
pub(crate) async fn run_checker(
    ctx: &Arc<RequestCtx>,
    dispatcher: Arc<CheckerDispatcher>,
    kind: CheckerKind,
    guarded_field: Option<(Name, Name)>,
    parent: &EngineObjectData,
    query_root: &EngineObjectData,
    arguments: Arguments,
) -> Option<FieldError> {
    let check: AccessCheck = {
        let ctx = Arc::clone(ctx);
        let dispatcher = Arc::clone(&dispatcher);
        let parent = parent.clone();
        let query_root = query_root.clone();
        let arguments = arguments.clone();

        Arc::new(move || {
            let ctx = Arc::clone(&ctx);
            let dispatcher = Arc::clone(&dispatcher);
            let parent = parent.clone();
            let query_root = query_root.clone();
            let arguments = arguments.clone();

            Box::pin(async move {
                let mut data_map: FnvHashMap<Name, EngineObjectData> = FnvHashMap::default();

                for (key, rss) in dispatcher.executor.required_selection_sets() {
                    let data = match rss {
                        Some(rss) => {
                            // Query-rooted entries materialise against the
                            // query root, object-rooted ones against the
                            // guarded object.
                            let base = if rss.selections().type_condition()
                                == ctx.schema.query_type_name()
                                && parent.type_name() != ctx.schema.query_type_name()
                            {
                                &query_root
                            } else {
                                &parent
                            };
                            match materialize_rss(&ctx, rss, base, &query_root, &arguments)
                                .await
                            {
                                Ok(data) => data,
                                Err(e) => {
                                    return CheckerResult::Error(CheckerError::new(e));
                                }
                            }
                        }
                        None => EngineObjectData::from_values(parent.type_name().clone(), []),
                    };
                    data_map.insert(key.clone(), data);
                }

                let resolver_ctx = ctx.resolver_context(FieldScope::default());
                dispatcher
                    .executor
                    .execute(&arguments, &data_map, &resolver_ctx, kind)
                    .await
            })
        })
    };

    let wrapped = ctx.instrumentation.instrument_access_check(check);
    let result = wrapped().await;

    let guarded = guarded_field
        .as_ref()
        .map(|(t, f)| (t.as_str(), f.as_str()));
    let error = result.error_for(&CheckerResultContext { field: guarded });
    if let Some(error) = &error {
        tracing::debug!(
            checker = %dispatcher.checker_id,
            error = %error,
            "access check degraded field",
        );
    }
    error
}
