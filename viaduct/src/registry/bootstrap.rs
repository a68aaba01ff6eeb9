//! The module bootstrapper DSL: how tenants register resolvers and
//! checkers.
//!
//! Resolver metadata that would be annotations elsewhere is carried here as
//! explicit registration data: every resolver is added by a builder call
//! with the same payload an annotation would have.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use fnv::FnvHashMap;
use futures::future::BoxFuture;

use crate::{
    ast::Name,
    checker::{CheckerExecutor, CheckerKind, CheckerResult},
    executor::FieldError,
    registry::{
        BootstrapError, CheckerDispatcher, DispatcherRegistry, FieldDispatcher, NodeDispatcher,
    },
    resolver::{
        Arguments, EngineObjectData, FieldResolution, FieldResolver, FieldSelector, NodeResolver,
        NodeSelector, ResolvedValue, ResolverContext,
    },
    rss::{
        RequiredSelectionSet, ResolverSelectionsSpec, VariableSpec, VariablesProviderFn,
        build_selection_sets,
    },
    schema::SchemaType,
};

type ResolveFn =
    Arc<dyn Fn(FieldSelector, ResolverContext) -> BoxFuture<'static, FieldResolution> + Send + Sync>;

type BatchResolveFn = Arc<
    dyn Fn(
            Vec<FieldSelector>,
            ResolverContext,
        ) -> BoxFuture<'static, Result<Vec<FieldResolution>, FieldError>>
        + Send
        + Sync,
>;

type NodeBatchFn = Arc<
    dyn Fn(
            Vec<NodeSelector>,
            ResolverContext,
        )
            -> BoxFuture<'static, Result<Vec<Result<EngineObjectData, FieldError>>, FieldError>>
        + Send
        + Sync,
>;

type NodeFn = Arc<
    dyn Fn(NodeSelector, ResolverContext) -> BoxFuture<'static, Result<EngineObjectData, FieldError>>
        + Send
        + Sync,
>;

type CheckerFn = Arc<
    dyn Fn(
            Arguments,
            FnvHashMap<Name, EngineObjectData>,
            ResolverContext,
            CheckerKind,
        ) -> BoxFuture<'static, CheckerResult>
        + Send
        + Sync,
>;

/// A namespaced bundle of field/node/checker registrations.
#[derive(Default)]
pub struct TenantModuleBootstrapper {
    fields: Vec<FieldRegistration>,
    nodes: Vec<NodeRegistration>,
    checkers: Vec<CheckerRegistration>,
}

struct FieldRegistration {
    type_name: Name,
    field_name: Name,
    def: ResolverDef,
}

struct NodeRegistration {
    type_name: Name,
    selective: bool,
    batching: bool,
    resolve: NodeBatchFn,
}

struct CheckerRegistration {
    type_name: Name,
    field_name: Option<Name>,
    def: CheckerDef,
}

impl TenantModuleBootstrapper {
    /// Creates an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constant-value resolver for a coordinate.
    pub fn value(
        &mut self,
        type_name: impl Into<Name>,
        field_name: impl Into<Name>,
        value: ResolvedValue,
    ) -> &mut Self {
        self.resolver(type_name, field_name, move |r| {
            let value = value.clone();
            r.resolve(move |_, _| {
                let value = value.clone();
                async move { Ok(value) }
            });
        })
    }

    /// Registers a resolver computing its value from the request context
    /// only.
    pub fn value_from_context(
        &mut self,
        type_name: impl Into<Name>,
        field_name: impl Into<Name>,
        f: impl Fn(&ResolverContext) -> ResolvedValue + Send + Sync + 'static,
    ) -> &mut Self {
        let f = Arc::new(f);
        self.resolver(type_name, field_name, move |r| {
            let f = Arc::clone(&f);
            r.resolve(move |_, ctx| {
                let f = Arc::clone(&f);
                async move { Ok(f(&ctx)) }
            });
        })
    }

    /// Registers a field resolver, configured through the builder closure.
    pub fn resolver(
        &mut self,
        type_name: impl Into<Name>,
        field_name: impl Into<Name>,
        configure: impl FnOnce(&mut ResolverDef),
    ) -> &mut Self {
        let mut def = ResolverDef::default();
        configure(&mut def);

        self.fields.push(FieldRegistration {
            type_name: type_name.into(),
            field_name: field_name.into(),
            def,
        });
        self
    }

    /// Registers a batched node executor for a `Node` type.
    pub fn node_batched<F, Fut>(
        &mut self,
        type_name: impl Into<Name>,
        selective: bool,
        f: F,
    ) -> &mut Self
    where
        F: Fn(Vec<NodeSelector>, ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Result<EngineObjectData, FieldError>>, FieldError>>
            + Send
            + 'static,
    {
        self.nodes.push(NodeRegistration {
            type_name: type_name.into(),
            selective,
            batching: true,
            resolve: Arc::new(move |selectors, ctx| Box::pin(f(selectors, ctx))),
        });
        self
    }

    /// Registers an unbatched node executor for a `Node` type.
    pub fn node_unbatched<F, Fut>(
        &mut self,
        type_name: impl Into<Name>,
        selective: bool,
        f: F,
    ) -> &mut Self
    where
        F: Fn(NodeSelector, ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<EngineObjectData, FieldError>> + Send + 'static,
    {
        let single: NodeFn = Arc::new(move |selector, ctx| Box::pin(f(selector, ctx)));

        self.nodes.push(NodeRegistration {
            type_name: type_name.into(),
            selective,
            batching: false,
            resolve: Arc::new(move |selectors, ctx| {
                let single = Arc::clone(&single);
                Box::pin(async move {
                    let mut out = Vec::with_capacity(selectors.len());
                    for selector in selectors {
                        out.push(single(selector, ctx.clone()).await);
                    }
                    Ok(out)
                })
            }),
        });
        self
    }

    /// Registers a field checker for a coordinate.
    pub fn field_checker(
        &mut self,
        type_name: impl Into<Name>,
        field_name: impl Into<Name>,
        configure: impl FnOnce(&mut CheckerDef),
    ) -> &mut Self {
        let mut def = CheckerDef::default();
        configure(&mut def);

        self.checkers.push(CheckerRegistration {
            type_name: type_name.into(),
            field_name: Some(field_name.into()),
            def,
        });
        self
    }

    /// Registers a type checker, run against every object of the type.
    pub fn type_checker(
        &mut self,
        type_name: impl Into<Name>,
        configure: impl FnOnce(&mut CheckerDef),
    ) -> &mut Self {
        let mut def = CheckerDef::default();
        configure(&mut def);

        self.checkers.push(CheckerRegistration {
            type_name: type_name.into(),
            field_name: None,
            def,
        });
        self
    }
}

/// Builder for one field-resolver registration.
#[derive(Default)]
pub struct ResolverDef {
    object_selections: Option<String>,
    query_selections: Option<String>,
    variables: Vec<VariableSpec>,
    provider: Option<(String, VariablesProviderFn)>,
    resolve: Option<ResolveFn>,
    batch_resolve: Option<BatchResolveFn>,
}

impl ResolverDef {
    /// Declares the parent-object selections this resolver needs.
    pub fn object_selections(&mut self, source: impl Into<String>) -> &mut Self {
        self.object_selections = Some(source.into());
        self
    }

    /// Declares the query-root selections this resolver needs.
    pub fn query_selections(&mut self, source: impl Into<String>) -> &mut Self {
        self.query_selections = Some(source.into());
        self
    }

    /// Declares one bound variable.
    pub fn variable(&mut self, spec: VariableSpec) -> &mut Self {
        self.variables.push(spec);
        self
    }

    /// Declares a variables provider: `declaration` is a comma-separated
    /// `name:Type` list, `f` produces exactly those names at request time.
    pub fn variables_provider<F, Fut>(&mut self, declaration: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<crate::executor::Variables, FieldError>> + Send + 'static,
    {
        self.provider = Some((declaration.into(), Arc::new(move |_| Box::pin(f()))));
        self
    }

    /// The resolve function of an unbatched resolver.
    pub fn resolve<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(FieldSelector, ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FieldResolution> + Send + 'static,
    {
        self.resolve = Some(Arc::new(move |selector, ctx| Box::pin(f(selector, ctx))));
        self
    }

    /// The resolve function of a batching resolver: receives every selector
    /// of a scheduler tick at once.
    pub fn batch_resolve<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Vec<FieldSelector>, ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<FieldResolution>, FieldError>> + Send + 'static,
    {
        self.batch_resolve = Some(Arc::new(move |selectors, ctx| Box::pin(f(selectors, ctx))));
        self
    }
}

/// Builder for one checker registration.
#[derive(Default)]
pub struct CheckerDef {
    selections: Vec<(Name, Plane, String)>,
    variables: Vec<VariableSpec>,
    execute: Option<CheckerFn>,
}

#[derive(Clone, Copy, Eq, PartialEq)]
enum Plane {
    Object,
    Query,
}

impl CheckerDef {
    /// Declares guarded-object selections, materialised under `key`.
    pub fn object_selections(
        &mut self,
        key: impl Into<Name>,
        source: impl Into<String>,
    ) -> &mut Self {
        self.selections.push((key.into(), Plane::Object, source.into()));
        self
    }

    /// Declares query-root selections, materialised under `key`.
    pub fn query_selections(
        &mut self,
        key: impl Into<Name>,
        source: impl Into<String>,
    ) -> &mut Self {
        self.selections.push((key.into(), Plane::Query, source.into()));
        self
    }

    /// Declares one bound variable, usable by any of the selection entries.
    pub fn variable(&mut self, spec: VariableSpec) -> &mut Self {
        self.variables.push(spec);
        self
    }

    /// The check function: returning `Err` fails the guarded field(s).
    pub fn execute<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arguments, FnvHashMap<Name, EngineObjectData>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), FieldError>> + Send + 'static,
    {
        self.execute = Some(Arc::new(move |args, data, _ctx, _kind| {
            let fut = f(args, data);
            Box::pin(async move {
                match fut.await {
                    Ok(()) => CheckerResult::Success,
                    Err(e) => CheckerResult::Error(crate::checker::CheckerError::new(e)),
                }
            })
        }));
        self
    }

    /// The full-form check function, receiving context and kind and
    /// returning a [`CheckerResult`] directly.
    pub fn execute_with<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arguments, FnvHashMap<Name, EngineObjectData>, ResolverContext, CheckerKind) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = CheckerResult> + Send + 'static,
    {
        self.execute = Some(Arc::new(move |args, data, ctx, kind| {
            Box::pin(f(args, data, ctx, kind))
        }));
        self
    }
}

struct FnFieldResolver {
    f: ResolveFn,
}

#[async_trait]
impl FieldResolver for FnFieldResolver {
    async fn batch_resolve(
        &self,
        selectors: Vec<FieldSelector>,
        ctx: &ResolverContext,
    ) -> Result<Vec<FieldResolution>, FieldError> {
        let mut out = Vec::with_capacity(selectors.len());
        for selector in selectors {
            out.push((self.f)(selector, ctx.clone()).await);
        }
        Ok(out)
    }
}

struct FnBatchFieldResolver {
    f: BatchResolveFn,
}

#[async_trait]
impl FieldResolver for FnBatchFieldResolver {
    async fn batch_resolve(
        &self,
        selectors: Vec<FieldSelector>,
        ctx: &ResolverContext,
    ) -> Result<Vec<FieldResolution>, FieldError> {
        (self.f)(selectors, ctx.clone()).await
    }
}

struct FnNodeResolver {
    f: NodeBatchFn,
}

#[async_trait]
impl NodeResolver for FnNodeResolver {
    async fn batch_resolve(
        &self,
        selectors: Vec<NodeSelector>,
        ctx: &ResolverContext,
    ) -> Result<Vec<Result<EngineObjectData, FieldError>>, FieldError> {
        (self.f)(selectors, ctx.clone()).await
    }
}

struct FnChecker {
    selection_sets: FnvHashMap<Name, Option<RequiredSelectionSet>>,
    f: CheckerFn,
}

#[async_trait]
impl CheckerExecutor for FnChecker {
    fn required_selection_sets(&self) -> &FnvHashMap<Name, Option<RequiredSelectionSet>> {
        &self.selection_sets
    }

    async fn execute(
        &self,
        arguments: &Arguments,
        object_data_map: &FnvHashMap<Name, EngineObjectData>,
        ctx: &ResolverContext,
        kind: CheckerKind,
    ) -> CheckerResult {
        (self.f)(
            arguments.clone(),
            object_data_map.clone(),
            ctx.clone(),
            kind,
        )
        .await
    }
}

pub(crate) fn assemble(
    schema: &Arc<SchemaType>,
    modules: Vec<TenantModuleBootstrapper>,
) -> Result<DispatcherRegistry, BootstrapError> {
    let mut registry = DispatcherRegistry::default();
    let query_type = schema.query_type_name().clone();

    for module in modules {
        for reg in module.fields {
            let coordinate = Name::from(format!("{}.{}", reg.type_name, reg.field_name));

            check_type(schema, &reg.type_name)?;
            if schema.field(&reg.type_name, &reg.field_name).is_none() {
                return Err(BootstrapError::UnknownField {
                    type_name: reg.type_name.clone(),
                    field_name: reg.field_name.clone(),
                });
            }

            let sets = build_selection_sets(
                Name::from(format!("resolver:{coordinate}")),
                &reg.type_name,
                &query_type,
                ResolverSelectionsSpec {
                    object_selections: reg.def.object_selections,
                    query_selections: reg.def.query_selections,
                    variables: reg.def.variables,
                    provider: reg.def.provider,
                },
                false,
            )?;

            let (resolver, batching): (Arc<dyn FieldResolver>, bool) =
                match (reg.def.batch_resolve, reg.def.resolve) {
                    (Some(f), _) => (Arc::new(FnBatchFieldResolver { f }), true),
                    (None, Some(f)) => (Arc::new(FnFieldResolver { f }), false),
                    (None, None) => {
                        return Err(BootstrapError::MissingResolveFn { coordinate });
                    }
                };

            registry.insert_field(
                reg.type_name,
                reg.field_name,
                FieldDispatcher {
                    resolver_id: coordinate,
                    resolver,
                    object_selections: sets.object_selections,
                    query_selections: sets.query_selections,
                    batching,
                },
            )?;
        }

        for reg in module.nodes {
            check_type(schema, &reg.type_name)?;

            registry.insert_node(
                reg.type_name.clone(),
                NodeDispatcher {
                    type_name: reg.type_name,
                    resolver: Arc::new(FnNodeResolver { f: reg.resolve }),
                    selective: reg.selective,
                    batching: reg.batching,
                },
            )?;
        }

        for reg in module.checkers {
            check_type(schema, &reg.type_name)?;

            let coordinate = match &reg.field_name {
                Some(field) => {
                    if schema.field(&reg.type_name, field).is_none() {
                        return Err(BootstrapError::UnknownField {
                            type_name: reg.type_name.clone(),
                            field_name: field.clone(),
                        });
                    }
                    Name::from(format!("{}.{field}", reg.type_name))
                }
                None => reg.type_name.clone(),
            };

            let executor = build_checker(
                &coordinate,
                &reg.type_name,
                &query_type,
                reg.def,
            )?;

            let dispatcher = CheckerDispatcher {
                checker_id: coordinate,
                executor,
            };

            match reg.field_name {
                Some(field) => {
                    registry.insert_field_checker(reg.type_name, field, dispatcher)?;
                }
                None => registry.insert_type_checker(reg.type_name, dispatcher)?,
            }
        }
    }

    Ok(registry)
}

fn check_type(schema: &SchemaType, name: &Name) -> Result<(), BootstrapError> {
    if schema.concrete_type_by_name(name).is_none() {
        return Err(BootstrapError::UnknownType { name: name.clone() });
    }
    Ok(())
}

/// Builds a checker executor: each keyed selection entry is validated
/// independently, with the checker's variable bindings filtered down to the
/// variables that entry references.
fn build_checker(
    coordinate: &Name,
    guarded_type: &Name,
    query_type: &Name,
    def: CheckerDef,
) -> Result<Arc<dyn CheckerExecutor>, BootstrapError> {
    let execute = def.execute.ok_or_else(|| BootstrapError::MissingResolveFn {
        coordinate: coordinate.clone(),
    })?;

    let mut selection_sets: FnvHashMap<Name, Option<RequiredSelectionSet>> =
        FnvHashMap::default();
    let mut used_variables: Vec<Name> = Vec::new();

    for (key, plane, source) in def.selections {
        let attribution = Name::from(format!("checker:{coordinate}:{key}"));
        let root = match plane {
            Plane::Object => guarded_type,
            Plane::Query => query_type,
        };

        let free = crate::select::ParsedSelections::parse(root.clone(), &source)
            .map_err(BootstrapError::SelectionsParse)?
            .free_variables();

        let entry_variables: Vec<VariableSpec> = def
            .variables
            .iter()
            .filter(|v| free.contains(&v.variable))
            .cloned()
            .collect();
        used_variables.extend(entry_variables.iter().map(|v| v.variable.clone()));

        let spec = match plane {
            Plane::Object => ResolverSelectionsSpec {
                object_selections: Some(source),
                variables: entry_variables,
                ..Default::default()
            },
            Plane::Query => ResolverSelectionsSpec {
                query_selections: Some(source),
                variables: entry_variables,
                ..Default::default()
            },
        };

        let sets = build_selection_sets(attribution, guarded_type, query_type, spec, true)?;
        let rss = match plane {
            Plane::Object => sets.object_selections,
            Plane::Query => sets.query_selections,
        };
        selection_sets.insert(key, rss);
    }

    let unused: Vec<Name> = def
        .variables
        .iter()
        .map(|v| v.variable.clone())
        .filter(|v| !used_variables.contains(v))
        .collect();
    if !unused.is_empty() {
        let mut unused = unused;
        unused.sort();
        return Err(BootstrapError::UnusedVariables { variables: unused });
    }

    Ok(Arc::new(FnChecker {
        selection_sets,
        f: execute,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        registry::{BootstrapError, DispatcherRegistry, TenantModuleBootstrapper},
        resolver::ResolvedValue,
        schema::SchemaType,
    };

    fn schema() -> Arc<SchemaType> {
        Arc::new(
            SchemaType::from_sdl(
                "type Query { foo: String bar(answer: Int): Int baz: Baz }
                 interface Node { id: ID! }
                 type Baz implements Node { id: ID! x: Int }",
            )
            .unwrap(),
        )
    }

    #[test]
    fn assembles_and_looks_up_dispatchers() {
        let mut module = TenantModuleBootstrapper::new();
        module
            .value("Query", "foo", ResolvedValue::from("hello world"))
            .node_batched("Baz", false, |selectors, _ctx| async move {
                Ok(selectors
                    .iter()
                    .map(|_| Err(crate::executor::FieldError::new("unused")))
                    .collect())
            })
            .field_checker("Query", "foo", |c| {
                c.execute(|_args, _data| async { Ok(()) });
            })
            .type_checker("Baz", |c| {
                c.execute(|_args, _data| async { Ok(()) });
            });

        let registry = DispatcherRegistry::assemble(&schema(), vec![module]).unwrap();

        assert!(registry.field_dispatcher("Query", "foo").is_some());
        assert!(registry.field_dispatcher("Query", "missing").is_none());
        assert!(registry.node_dispatcher("Baz").is_some());
        assert!(registry.node_dispatcher("Query").is_none());
        assert!(registry.field_checker_dispatcher("Query", "foo").is_some());
        assert!(registry.type_checker_dispatcher("Baz").is_some());
        assert!(registry.type_checker_dispatcher("Query").is_none());

        let dispatcher = registry.field_dispatcher("Query", "foo").unwrap();
        assert_eq!(dispatcher.resolver_id.as_str(), "Query.foo");
        assert!(!dispatcher.batching);
    }

    #[test]
    fn rejects_duplicate_coordinates() {
        let mut a = TenantModuleBootstrapper::new();
        a.value("Query", "foo", ResolvedValue::from("a"));
        let mut b = TenantModuleBootstrapper::new();
        b.value("Query", "foo", ResolvedValue::from("b"));

        let err = DispatcherRegistry::assemble(&schema(), vec![a, b]).unwrap_err();
        assert!(matches!(err, BootstrapError::DuplicateFieldResolver { .. }));
    }

    #[test]
    fn rejects_unknown_coordinates() {
        let mut module = TenantModuleBootstrapper::new();
        module.value("Query", "nope", ResolvedValue::from("x"));
        let err = DispatcherRegistry::assemble(&schema(), vec![module]).unwrap_err();
        assert!(matches!(err, BootstrapError::UnknownField { .. }));

        let mut module = TenantModuleBootstrapper::new();
        module.value("Ghost", "foo", ResolvedValue::from("x"));
        let err = DispatcherRegistry::assemble(&schema(), vec![module]).unwrap_err();
        assert!(matches!(err, BootstrapError::UnknownType { .. }));
    }

    #[test]
    fn rejects_registration_without_resolve_fn() {
        let mut module = TenantModuleBootstrapper::new();
        module.resolver("Query", "foo", |r| {
            r.object_selections("baz { id }");
        });

        let err = DispatcherRegistry::assemble(&schema(), vec![module]).unwrap_err();
        assert!(matches!(err, BootstrapError::MissingResolveFn { .. }));
    }
}
