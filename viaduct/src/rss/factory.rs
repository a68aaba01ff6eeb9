//! Validates and constructs required selection sets at bootstrap time.
//!
//! Every variable referenced free in a selection set must be produced by
//! exactly one source (argument, parent field, query-root field, or
//! provider), and every declared variable must actually be used. Violations
//! fail assembly, not requests.

use std::{collections::BTreeSet, sync::Arc};

use crate::{
    ast::Name,
    registry::BootstrapError,
    rss::{
        ArgumentVariable, FieldPathVariable, PathPlane, ProviderVariables, RequiredSelectionSet,
        VariablesProviderFn, VariablesResolver,
    },
    select::ParsedSelections,
};

/// One declared variable and its (exactly one, validated here) source.
#[derive(Clone, Debug, Default)]
pub struct VariableSpec {
    /// The variable name, without the `$`.
    pub variable: Name,

    /// Copy the value of this resolver argument.
    pub from_argument: Option<Name>,

    /// Read the value from this parent-object field path.
    pub from_object_field: Option<Vec<Name>>,

    /// Read the value from this query-root field path.
    pub from_query_field: Option<Vec<Name>>,
}

impl VariableSpec {
    /// A variable copied from a resolver argument.
    pub fn from_argument(variable: impl Into<Name>, argument: impl Into<Name>) -> Self {
        Self {
            variable: variable.into(),
            from_argument: Some(argument.into()),
            ..Self::default()
        }
    }

    /// A variable read from a `.`-separated parent-object field path.
    pub fn from_object_field(variable: impl Into<Name>, path: &str) -> Self {
        Self {
            variable: variable.into(),
            from_object_field: Some(split_path(path)),
            ..Self::default()
        }
    }

    /// A variable read from a `.`-separated query-root field path.
    pub fn from_query_field(variable: impl Into<Name>, path: &str) -> Self {
        Self {
            variable: variable.into(),
            from_query_field: Some(split_path(path)),
            ..Self::default()
        }
    }
}

fn split_path(path: &str) -> Vec<Name> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .map(Name::from)
        .collect()
}

/// Raw selection-set and variable declarations of one resolver or checker.
#[derive(Clone, Default)]
pub struct ResolverSelectionsSpec {
    /// Parent-object selections source, if any.
    pub object_selections: Option<String>,

    /// Query-root selections source, if any.
    pub query_selections: Option<String>,

    /// Individually-bound variables.
    pub variables: Vec<VariableSpec>,

    /// A variables provider: its declaration string (`"name:Type, ..."`)
    /// and the function producing the values.
    pub provider: Option<(String, VariablesProviderFn)>,
}

/// The validated output of the factory.
#[derive(Clone, Debug, Default)]
pub struct RequiredSelectionSets {
    /// The parent-object plane.
    pub object_selections: Option<RequiredSelectionSet>,

    /// The query-root plane.
    pub query_selections: Option<RequiredSelectionSet>,
}

/// Parses a provider declaration string into its variable names.
///
/// Entries are comma-separated `name:Type` pairs; all-whitespace and
/// all-comma strings declare zero variables. Malformed entries (`a:`, `:a`,
/// `a:b:c`, bare names) fail with a structured error naming the entry.
pub(crate) fn parse_variables_declaration(
    declaration: &str,
) -> Result<Vec<Name>, BootstrapError> {
    let mut names = Vec::new();

    for entry in declaration.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let mut pieces = entry.split(':');
        let (name, ty) = match (pieces.next(), pieces.next(), pieces.next()) {
            (Some(name), Some(ty), None) => (name.trim(), ty.trim()),
            _ => {
                return Err(BootstrapError::VariablesDecl {
                    entry: entry.into(),
                });
            }
        };

        if name.is_empty() || ty.is_empty() || !is_graphql_name(name) {
            return Err(BootstrapError::VariablesDecl {
                entry: entry.into(),
            });
        }

        let name = Name::from(name);
        if names.contains(&name) {
            return Err(BootstrapError::DuplicateVariable { variable: name });
        }
        names.push(name);
    }

    Ok(names)
}

fn is_graphql_name(s: &str) -> bool {
    let mut bytes = s.bytes();
    bytes
        .next()
        .is_some_and(|b| b == b'_' || b.is_ascii_alphabetic())
        && bytes.all(|b| b == b'_' || b.is_ascii_alphanumeric())
}

/// Validates `spec` and constructs the resolver's required selection sets.
pub fn build_selection_sets(
    attribution: impl Into<Name>,
    object_type: &Name,
    query_type: &Name,
    spec: ResolverSelectionsSpec,
    for_checker: bool,
) -> Result<RequiredSelectionSets, BootstrapError> {
    let attribution = attribution.into();

    let provider_names = match &spec.provider {
        Some((declaration, _)) => parse_variables_declaration(declaration)?,
        None => Vec::new(),
    };

    let declares_variables = !spec.variables.is_empty() || !provider_names.is_empty();
    if declares_variables
        && spec.object_selections.is_none()
        && spec.query_selections.is_none()
    {
        return Err(BootstrapError::VariablesRequireFragment {
            attribution: attribution.clone(),
        });
    }

    let object_selections = spec
        .object_selections
        .as_deref()
        .map(|src| parse_selections(object_type, src))
        .transpose()?;
    let query_selections = spec
        .query_selections
        .as_deref()
        .map(|src| parse_selections(query_type, src))
        .transpose()?;

    // Free variables across both planes.
    let mut free: BTreeSet<Name> = BTreeSet::new();
    if let Some(s) = &object_selections {
        free.extend(s.free_variables());
    }
    if let Some(s) = &query_selections {
        free.extend(s.free_variables());
    }

    // Each declared variable must have exactly one source, be produced
    // exactly once, and each path source must be reachable in its plane.
    let mut produced: Vec<Name> = Vec::new();
    let mut resolvers: Vec<Arc<dyn VariablesResolver>> = Vec::new();

    for v in &spec.variables {
        let sources = usize::from(v.from_argument.is_some())
            + usize::from(v.from_object_field.is_some())
            + usize::from(v.from_query_field.is_some());

        match sources {
            0 => {
                return Err(BootstrapError::UnsourcedVariable {
                    variable: v.variable.clone(),
                });
            }
            1 => {}
            _ => {
                return Err(BootstrapError::OverconstrainedVariable {
                    variable: v.variable.clone(),
                });
            }
        }

        if produced.contains(&v.variable) || provider_names.contains(&v.variable) {
            return Err(BootstrapError::DuplicateVariable {
                variable: v.variable.clone(),
            });
        }
        produced.push(v.variable.clone());

        if let Some(argument) = &v.from_argument {
            resolvers.push(Arc::new(ArgumentVariable::new(
                v.variable.clone(),
                argument.clone(),
            )));
        } else if let Some(path) = &v.from_object_field {
            let selections = object_selections.as_ref().ok_or_else(|| {
                BootstrapError::PathNotReachable {
                    variable: v.variable.clone(),
                    path: path_display(path),
                }
            })?;
            if !selections.has_path(path) {
                return Err(BootstrapError::PathNotReachable {
                    variable: v.variable.clone(),
                    path: path_display(path),
                });
            }
            resolvers.push(Arc::new(FieldPathVariable::new(
                v.variable.clone(),
                path.clone(),
                PathPlane::Object,
                path_input_selections(object_type, path, &attribution)?,
            )));
        } else if let Some(path) = &v.from_query_field {
            let selections = query_selections.as_ref().ok_or_else(|| {
                BootstrapError::MissingQuerySelections {
                    variable: v.variable.clone(),
                }
            })?;
            if !selections.has_path(path) {
                return Err(BootstrapError::PathNotReachable {
                    variable: v.variable.clone(),
                    path: path_display(path),
                });
            }
            resolvers.push(Arc::new(FieldPathVariable::new(
                v.variable.clone(),
                path.clone(),
                PathPlane::Query,
                path_input_selections(query_type, path, &attribution)?,
            )));
        }
    }

    if let Some((_, provider)) = &spec.provider {
        if !provider_names.is_empty() {
            resolvers.push(Arc::new(ProviderVariables::new(
                provider_names.clone(),
                Arc::clone(provider),
            )));
            produced.extend(provider_names.iter().cloned());
        }
    }

    // Every free variable needs a producer...
    for name in &free {
        if !produced.contains(name) {
            return Err(BootstrapError::UnsourcedVariable {
                variable: name.clone(),
            });
        }
    }

    // ...and every producer a consumer.
    let unused: Vec<Name> = produced
        .iter()
        .filter(|n| !free.contains(*n))
        .cloned()
        .collect();
    if !unused.is_empty() {
        let mut unused = unused;
        unused.sort();
        return Err(BootstrapError::UnusedVariables { variables: unused });
    }

    // Hand each plane the resolvers for its own free variables.
    let split = |selections: Option<ParsedSelections>| -> Option<RequiredSelectionSet> {
        selections.map(|s| {
            let plane_vars = s.free_variables();
            let plane_resolvers = resolvers
                .iter()
                .filter(|r| {
                    r.variable_names()
                        .iter()
                        .any(|n| plane_vars.contains(n))
                })
                .cloned()
                .collect();
            RequiredSelectionSet::new(s, plane_resolvers, for_checker, attribution.clone())
        })
    };

    Ok(RequiredSelectionSets {
        object_selections: split(object_selections),
        query_selections: split(query_selections),
    })
}

fn parse_selections(
    root_type: &Name,
    source: &str,
) -> Result<ParsedSelections, BootstrapError> {
    let selections = ParsedSelections::parse(root_type.clone(), source)
        .map_err(BootstrapError::SelectionsParse)?;

    if let Some(name) = selections.unknown_fragment() {
        return Err(BootstrapError::UnknownFragment { name });
    }

    Ok(selections)
}

/// The input selections of a field-path variable: the path itself, nested.
fn path_input_selections(
    root_type: &Name,
    path: &[Name],
    attribution: &Name,
) -> Result<RequiredSelectionSet, BootstrapError> {
    let mut source = String::new();
    for (i, step) in path.iter().enumerate() {
        if i > 0 {
            source.push_str(" { ");
        }
        source.push_str(step);
    }
    for _ in 1..path.len() {
        source.push_str(" }");
    }

    let selections = parse_selections(root_type, &source)?;
    Ok(RequiredSelectionSet::new(
        selections,
        Vec::new(),
        false,
        attribution.clone(),
    ))
}

fn path_display(path: &[Name]) -> String {
    path.iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(".")
}
