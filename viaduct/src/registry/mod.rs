//! The dispatcher registry: immutable, assembled once per deploy from an
//! ordered list of tenant module bootstrappers.

mod bootstrap;

use std::sync::Arc;

use derive_more::with_trait::{Display, Error, From};
use fnv::FnvHashMap;
use itertools::Itertools as _;

use crate::{
    ast::Name,
    checker::CheckerExecutor,
    parser::{ParseError, Spanning},
    resolver::{FieldResolver, NodeResolver},
    rss::RequiredSelectionSet,
    schema::SchemaType,
};

pub use self::bootstrap::{CheckerDef, ResolverDef, TenantModuleBootstrapper};

/// Registry-facing view of one field resolver.
pub struct FieldDispatcher {
    /// Stable id batches are grouped under (`Type.field`).
    pub resolver_id: Name,

    /// The resolver itself.
    pub resolver: Arc<dyn FieldResolver>,

    /// Parent-object required selections.
    pub object_selections: Option<RequiredSelectionSet>,

    /// Query-root required selections.
    pub query_selections: Option<RequiredSelectionSet>,

    /// Whether selectors buffer for per-tick batch dispatch.
    pub batching: bool,
}

/// Registry-facing view of one node resolver.
pub struct NodeDispatcher {
    /// The `Node` type this resolver loads.
    pub type_name: Name,

    /// The resolver itself.
    pub resolver: Arc<dyn NodeResolver>,

    /// Whether the resolver's output depends on the requested selection set.
    pub selective: bool,

    /// Whether selectors buffer for per-tick batch dispatch.
    pub batching: bool,
}

/// Registry-facing view of one checker.
pub struct CheckerDispatcher {
    /// Stable id for diagnostics (`Type.field` or `Type`).
    pub checker_id: Name,

    /// The checker itself.
    pub executor: Arc<dyn CheckerExecutor>,
}

/// Error assembling the registry. Fails the deploy, never a request.
#[derive(Clone, Debug, Display, Error, From)]
pub enum BootstrapError {
    /// Two modules registered a resolver for the same field coordinate.
    #[display("Duplicate field resolver for {type_name}.{field_name}")]
    #[from(ignore)]
    DuplicateFieldResolver {
        #[error(not(source))]
        type_name: Name,
        field_name: Name,
    },

    /// Two modules registered a node resolver for the same type.
    #[display("Duplicate node resolver for {type_name}")]
    #[from(ignore)]
    DuplicateNodeResolver {
        #[error(not(source))]
        type_name: Name,
    },

    /// Two modules registered a checker for the same coordinate.
    #[display("Duplicate checker for {coordinate}")]
    #[from(ignore)]
    DuplicateChecker {
        #[error(not(source))]
        coordinate: Name,
    },

    /// A registration names a type the schema does not define.
    #[display("Registration references unknown type \"{name}\"")]
    #[from(ignore)]
    UnknownType {
        #[error(not(source))]
        name: Name,
    },

    /// A registration names a field the schema does not define.
    #[display("Registration references unknown field {type_name}.{field_name}")]
    #[from(ignore)]
    UnknownField {
        #[error(not(source))]
        type_name: Name,
        field_name: Name,
    },

    /// A resolver registration carries no resolve function.
    #[display("Registration for {coordinate} has no resolve function")]
    #[from(ignore)]
    MissingResolveFn {
        #[error(not(source))]
        coordinate: Name,
    },

    /// A variable is produced by more than one binding.
    #[display("Variable \"{variable}\" is bound more than once")]
    #[from(ignore)]
    DuplicateVariable {
        #[error(not(source))]
        variable: Name,
    },

    /// Declared variables are never referenced by any selection set.
    #[display("Unused variables: {}", join_names(variables))]
    #[from(ignore)]
    UnusedVariables {
        #[error(not(source))]
        variables: Vec<Name>,
    },

    /// A referenced variable has no producing binding, or a binding carries
    /// no source.
    #[display("Variable \"{variable}\" has no source")]
    #[from(ignore)]
    UnsourcedVariable {
        #[error(not(source))]
        variable: Name,
    },

    /// A binding carries more than one source.
    #[display("Variable \"{variable}\" has more than one source")]
    #[from(ignore)]
    OverconstrainedVariable {
        #[error(not(source))]
        variable: Name,
    },

    /// Variables were declared without any selection set to use them in.
    #[display("{attribution} declares variables but no selection sets")]
    #[from(ignore)]
    VariablesRequireFragment {
        #[error(not(source))]
        attribution: Name,
    },

    /// A provider declaration entry is not a `name:Type` pair.
    #[display("Malformed variables declaration entry \"{entry}\"")]
    #[from(ignore)]
    VariablesDecl {
        #[error(not(source))]
        entry: String,
    },

    /// A `fromQueryField` binding without query selections to read from.
    #[display("Variable \"{variable}\" reads from query selections that were not declared")]
    #[from(ignore)]
    MissingQuerySelections {
        #[error(not(source))]
        variable: Name,
    },

    /// A field-path binding names a path its selection set does not reach.
    #[display("Variable \"{variable}\" binds path \"{path}\", which its selections do not reach")]
    #[from(ignore)]
    PathNotReachable {
        #[error(not(source))]
        variable: Name,
        path: String,
    },

    /// A selection set spreads an undefined fragment.
    #[display("Unknown fragment \"{name}\"")]
    #[from(ignore)]
    UnknownFragment {
        #[error(not(source))]
        name: Name,
    },

    /// A selection-set source failed to parse.
    SelectionsParse(Spanning<ParseError>),
}

fn join_names(names: &[Name]) -> String {
    names.iter().map(|n| n.as_str()).join(", ")
}

/// Keyed lookup of field/node resolvers and checkers. Immutable after
/// assembly; lookups are O(1) and missing keys answer [`None`].
#[derive(Default)]
pub struct DispatcherRegistry {
    fields: FnvHashMap<Name, FnvHashMap<Name, Arc<FieldDispatcher>>>,
    nodes: FnvHashMap<Name, Arc<NodeDispatcher>>,
    field_checkers: FnvHashMap<Name, FnvHashMap<Name, Arc<CheckerDispatcher>>>,
    type_checkers: FnvHashMap<Name, Arc<CheckerDispatcher>>,
}

impl std::fmt::Debug for DispatcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherRegistry").finish_non_exhaustive()
    }
}

impl DispatcherRegistry {
    /// Assembles a registry out of an ordered list of module bootstrappers,
    /// validating every registration against `schema`.
    pub fn assemble(
        schema: &Arc<SchemaType>,
        modules: Vec<TenantModuleBootstrapper>,
    ) -> Result<Self, BootstrapError> {
        bootstrap::assemble(schema, modules)
    }

    pub(crate) fn insert_field(
        &mut self,
        type_name: Name,
        field_name: Name,
        dispatcher: FieldDispatcher,
    ) -> Result<(), BootstrapError> {
        let by_field = self.fields.entry(type_name.clone()).or_default();
        if by_field.contains_key(&field_name) {
            return Err(BootstrapError::DuplicateFieldResolver {
                type_name,
                field_name,
            });
        }
        by_field.insert(field_name, Arc::new(dispatcher));
        Ok(())
    }

    pub(crate) fn insert_node(
        &mut self,
        type_name: Name,
        dispatcher: NodeDispatcher,
    ) -> Result<(), BootstrapError> {
        if self.nodes.contains_key(&type_name) {
            return Err(BootstrapError::DuplicateNodeResolver { type_name });
        }
        self.nodes.insert(type_name, Arc::new(dispatcher));
        Ok(())
    }

    pub(crate) fn insert_field_checker(
        &mut self,
        type_name: Name,
        field_name: Name,
        dispatcher: CheckerDispatcher,
    ) -> Result<(), BootstrapError> {
        let by_field = self.field_checkers.entry(type_name.clone()).or_default();
        if by_field.contains_key(&field_name) {
            return Err(BootstrapError::DuplicateChecker {
                coordinate: Name::from(format!("{type_name}.{field_name}")),
            });
        }
        by_field.insert(field_name, Arc::new(dispatcher));
        Ok(())
    }

    pub(crate) fn insert_type_checker(
        &mut self,
        type_name: Name,
        dispatcher: CheckerDispatcher,
    ) -> Result<(), BootstrapError> {
        if self.type_checkers.contains_key(&type_name) {
            return Err(BootstrapError::DuplicateChecker {
                coordinate: type_name,
            });
        }
        self.type_checkers.insert(type_name, Arc::new(dispatcher));
        Ok(())
    }

    /// Looks up the field resolver dispatcher for a coordinate.
    pub fn field_dispatcher(
        &self,
        type_name: &str,
        field_name: &str,
    ) -> Option<&Arc<FieldDispatcher>> {
        self.fields.get(type_name)?.get(field_name)
    }

    /// Looks up the node resolver dispatcher for a type.
    pub fn node_dispatcher(&self, type_name: &str) -> Option<&Arc<NodeDispatcher>> {
        self.nodes.get(type_name)
    }

    /// Looks up the field checker dispatcher for a coordinate.
    pub fn field_checker_dispatcher(
        &self,
        type_name: &str,
        field_name: &str,
    ) -> Option<&Arc<CheckerDispatcher>> {
        self.field_checkers.get(type_name)?.get(field_name)
    }

    /// Looks up the type checker dispatcher for a type.
    pub fn type_checker_dispatcher(&self, type_name: &str) -> Option<&Arc<CheckerDispatcher>> {
        self.type_checkers.get(type_name)
    }
}
