//! Required selection sets: the declarative parent-object and query-root
//! dependencies a resolver needs materialised before it runs.

pub mod factory;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{
    ast::{InputValue, Name},
    executor::{FieldError, Variables},
    resolver::{Arguments, EngineObjectData, ResolvedValue, ResolverContext},
    select::ParsedSelections,
    value::Value,
};

pub use self::factory::{
    RequiredSelectionSets, ResolverSelectionsSpec, VariableSpec, build_selection_sets,
};

/// The declarative dependencies of one resolver plane (parent object or
/// query root): a parsed selection set plus the resolvers producing every
/// variable those selections reference.
#[derive(Clone)]
pub struct RequiredSelectionSet {
    selections: ParsedSelections,
    variables_resolvers: Vec<Arc<dyn VariablesResolver>>,
    for_checker: bool,
    attribution: Name,
}

impl RequiredSelectionSet {
    /// Assembles a [`RequiredSelectionSet`]; the factory validates the
    /// variable/selection invariants before calling this.
    pub(crate) fn new(
        selections: ParsedSelections,
        variables_resolvers: Vec<Arc<dyn VariablesResolver>>,
        for_checker: bool,
        attribution: Name,
    ) -> Self {
        Self {
            selections,
            variables_resolvers,
            for_checker,
            attribution,
        }
    }

    /// The parsed selections.
    pub fn selections(&self) -> &ParsedSelections {
        &self.selections
    }

    /// The resolvers producing the selections' variables. Their name sets
    /// are pairwise disjoint and union to the selections' free variables.
    pub fn variables_resolvers(&self) -> &[Arc<dyn VariablesResolver>] {
        &self.variables_resolvers
    }

    /// Indicates whether this set feeds an access check rather than a
    /// user-visible field.
    pub fn for_checker(&self) -> bool {
        self.for_checker
    }

    /// Who declared this set, for diagnostics.
    pub fn attribution(&self) -> &Name {
        &self.attribution
    }
}

impl std::fmt::Debug for RequiredSelectionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequiredSelectionSet")
            .field("attribution", &self.attribution)
            .field("type_condition", self.selections.type_condition())
            .field("variables_resolvers", &self.variables_resolvers.len())
            .field("for_checker", &self.for_checker)
            .finish()
    }
}

/// Everything a [`VariablesResolver`] may read while producing its values.
pub struct VariablesContext<'a> {
    /// The resolver's own coerced field arguments.
    pub arguments: &'a Arguments,

    /// Parent-object data (the resolver's input selections view when it
    /// declared one).
    pub object_value: Option<&'a EngineObjectData>,

    /// Query-root data.
    pub query_value: Option<&'a EngineObjectData>,

    /// The enclosing resolver context.
    pub resolver: &'a ResolverContext,
}

/// Produces the values of a fixed set of variable names.
#[async_trait]
pub trait VariablesResolver: Send + Sync {
    /// The names this resolver produces, exactly.
    fn variable_names(&self) -> &[Name];

    /// A sub-selection this resolver needs materialised first (e.g. the
    /// parent field a variable is read from).
    fn input_selections(&self) -> Option<&RequiredSelectionSet> {
        None
    }

    /// Produces the variable values.
    async fn resolve(&self, ctx: &VariablesContext<'_>) -> Result<Variables, FieldError>;
}

/// A user-supplied variables-provider function.
pub type VariablesProviderFn = Arc<
    dyn Fn(&VariablesContext<'_>) -> BoxFuture<'static, Result<Variables, FieldError>>
        + Send
        + Sync,
>;

/// Copies a variable from the resolver's own field arguments.
pub(crate) struct ArgumentVariable {
    names: [Name; 1],
    argument: Name,
}

impl ArgumentVariable {
    pub(crate) fn new(variable: Name, argument: Name) -> Self {
        Self {
            names: [variable],
            argument,
        }
    }
}

#[async_trait]
impl VariablesResolver for ArgumentVariable {
    fn variable_names(&self) -> &[Name] {
        &self.names
    }

    async fn resolve(&self, ctx: &VariablesContext<'_>) -> Result<Variables, FieldError> {
        let value = ctx
            .arguments
            .get(&self.argument)
            .cloned()
            .unwrap_or(InputValue::Null);

        Ok([(self.names[0].clone(), value)].into_iter().collect())
    }
}

/// Which plane a field-path variable reads from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum PathPlane {
    Object,
    Query,
}

/// Reads a variable from a field path of the parent object or query root.
pub(crate) struct FieldPathVariable {
    names: [Name; 1],
    path: Vec<Name>,
    plane: PathPlane,
    input: RequiredSelectionSet,
}

impl FieldPathVariable {
    pub(crate) fn new(
        variable: Name,
        path: Vec<Name>,
        plane: PathPlane,
        input: RequiredSelectionSet,
    ) -> Self {
        Self {
            names: [variable],
            path,
            plane,
            input,
        }
    }
}

#[async_trait]
impl VariablesResolver for FieldPathVariable {
    fn variable_names(&self) -> &[Name] {
        &self.names
    }

    fn input_selections(&self) -> Option<&RequiredSelectionSet> {
        Some(&self.input)
    }

    async fn resolve(&self, ctx: &VariablesContext<'_>) -> Result<Variables, FieldError> {
        let source = match self.plane {
            PathPlane::Object => ctx.object_value,
            PathPlane::Query => ctx.query_value,
        }
        .ok_or_else(|| {
            FieldError::new(format!(
                "No {} data available for variable \"{}\"",
                match self.plane {
                    PathPlane::Object => "parent-object",
                    PathPlane::Query => "query-root",
                },
                self.names[0],
            ))
        })?;

        let value = source.fetch_path(&self.path).await?;

        Ok([(self.names[0].clone(), resolved_to_input(value)?)]
            .into_iter()
            .collect())
    }
}

/// A user-supplied provider producing several variables at once.
///
/// The declared name set is enforced at resolution time: a provider
/// returning missing or extra names fails the dependent field, not
/// bootstrap.
pub(crate) struct ProviderVariables {
    names: Vec<Name>,
    provider: VariablesProviderFn,
}

impl ProviderVariables {
    pub(crate) fn new(names: Vec<Name>, provider: VariablesProviderFn) -> Self {
        Self { names, provider }
    }
}

#[async_trait]
impl VariablesResolver for ProviderVariables {
    fn variable_names(&self) -> &[Name] {
        &self.names
    }

    async fn resolve(&self, ctx: &VariablesContext<'_>) -> Result<Variables, FieldError> {
        let values = (self.provider)(ctx).await?;

        let mut missing: Vec<&Name> = self
            .names
            .iter()
            .filter(|n| !values.contains_key(n.as_str()))
            .collect();
        missing.sort();
        if !missing.is_empty() {
            return Err(FieldError::new(format!(
                "Variables provider did not produce declared variables: {}",
                missing
                    .iter()
                    .map(|n| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )));
        }

        let mut extra: Vec<&Name> = values
            .keys()
            .filter(|k| !self.names.contains(*k))
            .collect();
        extra.sort();
        if !extra.is_empty() {
            return Err(FieldError::new(format!(
                "Variables provider produced undeclared variables: {}",
                extra
                    .iter()
                    .map(|n| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )));
        }

        Ok(values)
    }
}

/// Converts a resolver value into a variable value. Composite values cannot
/// be bound to variables.
pub(crate) fn resolved_to_input(value: ResolvedValue) -> Result<InputValue, FieldError> {
    match value {
        ResolvedValue::Null => Ok(InputValue::Null),
        ResolvedValue::Scalar(v) => Ok(value_to_input(v)),
        ResolvedValue::List(items) => Ok(InputValue::List(
            items
                .into_iter()
                .map(resolved_to_input)
                .collect::<Result<_, _>>()?,
        )),
        ResolvedValue::Object(_) | ResolvedValue::Node(_) => Err(FieldError::new(
            "A composite value cannot be bound to a variable",
        )),
    }
}

fn value_to_input(value: Value) -> InputValue {
    match value {
        Value::Null => InputValue::Null,
        Value::Bool(b) => InputValue::Boolean(b),
        Value::Int(i) => InputValue::Int(i),
        Value::Float(f) => InputValue::Float(f),
        Value::String(s) => InputValue::String(s),
        Value::List(l) => InputValue::List(l.into_iter().map(value_to_input).collect()),
        Value::Object(o) => InputValue::Object(
            o.into_key_value_list()
                .into_iter()
                .map(|(k, v)| (Name::from(k), value_to_input(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::executor::block_on;

    use crate::{
        ast::InputValue,
        executor::Variables,
        resolver::{Arguments, EngineObjectData, FieldScope, ResolvedValue, ResolverContext},
        schema::SchemaType,
        value::Value,
    };

    use super::{
        ArgumentVariable, ProviderVariables, VariablesContext, VariablesProviderFn,
        VariablesResolver,
    };

    fn resolver_ctx() -> ResolverContext {
        ResolverContext {
            schema: Arc::new(
                SchemaType::from_sdl("type Query { ok: Boolean }").unwrap(),
            ),
            request: Arc::new(()),
            field_scope: FieldScope::default(),
        }
    }

    fn ctx_args(args: &Arguments, resolver: &ResolverContext) -> Variables {
        let ctx = VariablesContext {
            arguments: args,
            object_value: None,
            query_value: None,
            resolver,
        };
        block_on(ArgumentVariable::new("x".into(), "arg".into()).resolve(&ctx)).unwrap()
    }

    #[test]
    fn argument_variable_copies_the_argument() {
        let resolver = resolver_ctx();
        let args = Arguments::from_pairs([("arg".into(), InputValue::Int(7))]);

        let vars = ctx_args(&args, &resolver);
        assert_eq!(vars.get("x"), Some(&InputValue::Int(7)));

        // A missing argument binds null.
        let vars = ctx_args(&Arguments::default(), &resolver);
        assert_eq!(vars.get("x"), Some(&InputValue::Null));
    }

    #[test]
    fn provider_key_set_is_enforced_at_resolution_time() {
        let resolver = resolver_ctx();
        let args = Arguments::default();
        let ctx = VariablesContext {
            arguments: &args,
            object_value: None,
            query_value: None,
            resolver: &resolver,
        };

        let missing: VariablesProviderFn = Arc::new(|_| {
            Box::pin(async { Ok([("a".into(), InputValue::Int(1))].into_iter().collect()) })
        });
        let provider =
            ProviderVariables::new(vec!["a".into(), "b".into()], missing);
        let err = block_on(provider.resolve(&ctx)).unwrap_err();
        assert!(err.message().contains('b'), "{}", err.message());

        let extra: VariablesProviderFn = Arc::new(|_| {
            Box::pin(async {
                Ok([
                    ("a".into(), InputValue::Int(1)),
                    ("rogue".into(), InputValue::Int(2)),
                ]
                .into_iter()
                .collect())
            })
        });
        let provider = ProviderVariables::new(vec!["a".into()], extra);
        let err = block_on(provider.resolve(&ctx)).unwrap_err();
        assert!(err.message().contains("rogue"), "{}", err.message());

        let exact: VariablesProviderFn = Arc::new(|_| {
            Box::pin(async { Ok([("a".into(), InputValue::Int(1))].into_iter().collect()) })
        });
        let provider = ProviderVariables::new(vec!["a".into()], exact);
        assert!(block_on(provider.resolve(&ctx)).is_ok());
    }

    #[test]
    fn resolved_values_convert_to_variable_values() {
        assert_eq!(
            super::resolved_to_input(ResolvedValue::Scalar(Value::from("id-1"))).unwrap(),
            InputValue::from("id-1"),
        );
        assert!(super::resolved_to_input(ResolvedValue::Object(
            EngineObjectData::from_values("X", []),
        ))
        .is_err());
    }
}
