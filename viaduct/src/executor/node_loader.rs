//! The per-request node cache.
//!
//! Node lookups are memoised per `(type, id)`. A non-selective resolver's
//! output covers any request for the same id; a selective resolver's output
//! only covers requests whose selections the stored entry's selections
//! cover. In-flight lookups share one deferred, so duplicates within a batch
//! collapse before the resolver ever sees them.

use std::sync::{Arc, Mutex, Weak};

use fnv::FnvHashMap;
use futures::FutureExt as _;
use indexmap::IndexMap;

use crate::{
    ast::Name,
    checker::CheckerKind,
    deferred::Deferred,
    executor::{
        FieldError,
        complete::run_checker,
        scheduler::{NodeBatchItem, RequestCtx},
    },
    resolver::{
        EngineObjectData, FieldScope, NodeReference, NodeResolveDelegate, NodeSelector,
    },
    select::RawSelectionSet,
};

type NodeResult = Result<EngineObjectData, FieldError>;

struct CacheEntry {
    /// `None` for non-selective resolvers: the stored data is a superset of
    /// any request's.
    selections: Option<RawSelectionSet>,
    result: Deferred<NodeResult>,
}

impl CacheEntry {
    fn covers(&self, requested: &RawSelectionSet) -> bool {
        match &self.selections {
            None => true,
            Some(stored) => stored.covers(requested),
        }
    }
}

/// Per-request keyed store of node lookups.
pub(crate) struct NodeLoader {
    ctx: Weak<RequestCtx>,
    cache: Mutex<FnvHashMap<(Name, String), Vec<CacheEntry>>>,
}

impl NodeLoader {
    pub(crate) fn new(ctx: Weak<RequestCtx>) -> Self {
        Self {
            ctx,
            cache: Mutex::new(FnvHashMap::default()),
        }
    }

    /// Starts (or joins) resolution of one node reference.
    fn load(
        &self,
        reference: &NodeReference,
        selections: &RawSelectionSet,
    ) -> Deferred<NodeResult> {
        let Some(ctx) = self.ctx.upgrade() else {
            return Deferred::cancelled(crate::deferred::CancelReason::RequestCancelled);
        };

        let type_name = reference.type_name().clone();
        let Some(dispatcher) = ctx.registry.node_dispatcher(&type_name).map(Arc::clone) else {
            return Deferred::completed(Err(FieldError::new(format!(
                "No node resolver registered for type \"{type_name}\"",
            ))));
        };

        let key = (type_name, reference.id().to_owned());
        let mut cache = self.cache.lock().unwrap();
        let bucket = cache.entry(key).or_default();

        if let Some(entry) = bucket
            .iter()
            .find(|e| !dispatcher.selective || e.covers(selections))
        {
            tracing::trace!(
                node_type = %reference.type_name(),
                id = reference.id(),
                "node cache hit",
            );
            return entry.result.clone();
        }

        let result: Deferred<NodeResult> = ctx.group.deferred();
        bucket.push(CacheEntry {
            selections: dispatcher.selective.then(|| selections.clone()),
            result: result.clone(),
        });
        drop(cache);

        reference.begin_resolving();

        let item = NodeBatchItem {
            reference: reference.clone(),
            selections: selections.clone(),
            output: result.clone(),
        };

        if dispatcher.batching {
            ctx.batches.enqueue_node(&dispatcher, item);
        } else {
            let ctx = Arc::clone(&ctx);
            ctx.clone()
                .spawner
                .spawn(dispatch_node_batch(ctx, dispatcher, vec![item]).boxed());
        }

        result
    }

    /// Records a selective resolver's dispatched result under the widest
    /// selection set its batch observed, so later covered requests hit.
    fn store_merged(
        &self,
        type_name: &Name,
        id: &str,
        selections: Option<RawSelectionSet>,
        result: Deferred<NodeResult>,
    ) {
        let mut cache = self.cache.lock().unwrap();
        cache
            .entry((type_name.clone(), id.to_owned()))
            .or_default()
            .push(CacheEntry { selections, result });
    }
}

impl NodeResolveDelegate for NodeLoader {
    fn resolve(
        &self,
        reference: &NodeReference,
        selections: &RawSelectionSet,
    ) -> Deferred<NodeResult> {
        self.load(reference, selections)
    }
}

/// Dispatches one node batch: selectors grouped by id (one resolver call per
/// id, with that id's selections merged), results fanned back out to every
/// waiting reference.
pub(crate) async fn dispatch_node_batch(
    ctx: Arc<RequestCtx>,
    dispatcher: Arc<crate::registry::NodeDispatcher>,
    items: Vec<NodeBatchItem>,
) {
    let mut groups: IndexMap<String, Vec<NodeBatchItem>> = IndexMap::new();
    for item in items {
        groups
            .entry(item.reference.id().to_owned())
            .or_default()
            .push(item);
    }

    // One selector per distinct id, carrying the widest selection set the
    // batch observed for it.
    let mut selectors = Vec::with_capacity(groups.len());
    let mut dispatched: Vec<(String, Vec<NodeBatchItem>, RawSelectionSet)> =
        Vec::with_capacity(groups.len());
    for (id, group) in groups {
        let merged =
            RawSelectionSet::merged(group.iter().map(|item| item.selections.clone()).collect());
        // Groups are never empty, so the merge always yields a set.
        if let Some(merged) = merged {
            selectors.push(NodeSelector {
                id: id.clone(),
                selections: merged.clone(),
            });
            dispatched.push((id, group, merged));
        }
    }

    // The caller's field scope never leaks into a node fetch: the selections
    // carry their own fragments and variables, and the context starts clean.
    let resolver_ctx = ctx.resolver_context(FieldScope::default());

    let outcome = dispatcher
        .resolver
        .batch_resolve(selectors, &resolver_ctx)
        .await;

    let results: Vec<NodeResult> = match outcome {
        Ok(results) if results.len() == dispatched.len() => results,
        Ok(results) => {
            let error = FieldError::with_type(
                format!(
                    "Node resolver for \"{}\" returned {} results for {} selectors",
                    dispatcher.type_name,
                    results.len(),
                    dispatched.len(),
                ),
                crate::executor::ErrorType::InternalEngineError,
            );
            dispatched.iter().map(|_| Err(error.clone())).collect()
        }
        // A resolver-global failure poisons every selector of the batch.
        Err(error) => dispatched.iter().map(|_| Err(error.clone())).collect(),
    };

    for ((id, group, merged), result) in dispatched.into_iter().zip(results) {
        let result: NodeResult = match result {
            Ok(data) => {
                // Type-level access check: a failure degrades every read
                // through this node, never the operation.
                let check_error = node_type_check(&ctx, &dispatcher.type_name, &data).await;
                for item in &group {
                    item.reference.resolve_data(Ok(data.clone()));
                    item.reference.record_check(check_error.clone());
                }
                match check_error {
                    None => Ok(data),
                    Some(e) => Err(e),
                }
            }
            Err(e) => {
                for item in &group {
                    item.reference.resolve_data(Err(e.clone()));
                }
                Err(e)
            }
        };

        for item in &group {
            item.output.complete(result.clone());
        }

        // Later covered lookups of this id are satisfied from this result,
        // cached under the widest selections observed in this batch.
        if dispatcher.selective {
            ctx.node_loader.store_merged(
                &dispatcher.type_name,
                &id,
                Some(merged),
                Deferred::completed(result),
            );
        }
    }
}

/// Runs the type checker for a node type, if one is registered.
async fn node_type_check(
    ctx: &Arc<RequestCtx>,
    type_name: &Name,
    data: &EngineObjectData,
) -> Option<FieldError> {
    let dispatcher = ctx.registry.type_checker_dispatcher(type_name)?.clone();

    // The query root of a node fetch is an empty view.
    let query_root =
        EngineObjectData::from_values(ctx.schema.query_type_name().clone(), []);

    run_checker(
        ctx,
        dispatcher,
        CheckerKind::Type,
        None,
        data,
        &query_root,
        crate::resolver::Arguments::default(),
    )
    .await
}

