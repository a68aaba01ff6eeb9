//! Rewrites a validated operation into a tree of field executions.

use std::sync::Arc;

use derive_more::with_trait::{Display, Error};
use fnv::FnvHashMap;

use crate::{
    ast::{
        Directive, Fragment, InputValue, Name, Operation, OperationType, Selection, TypeRef,
    },
    executor::Variables,
    registry::{DispatcherRegistry, FieldDispatcher},
    resolver::FieldScope,
    schema::{Literal, SchemaType, meta},
    select::Applies,
};

/// The operation does not fit the schema. Surfaces before any resolver runs.
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
pub enum PlanError {
    /// A selected field is not defined on its parent type.
    #[display("Unknown field \"{field_name}\" on type \"{type_name}\"")]
    UnknownField {
        #[error(not(source))]
        type_name: Name,
        field_name: Name,
    },

    /// A type condition names an undefined type.
    #[display("Unknown type \"{name}\" in type condition")]
    UnknownType {
        #[error(not(source))]
        name: Name,
    },

    /// A spread fragment is not defined in the document.
    #[display("Unknown fragment \"{name}\"")]
    UnknownFragment {
        #[error(not(source))]
        name: Name,
    },

    /// A leaf field carries a sub-selection.
    #[display("Field \"{field_name}\" of leaf type \"{type_name}\" cannot have a sub-selection")]
    SelectionsOnLeaf {
        #[error(not(source))]
        type_name: Name,
        field_name: Name,
    },

    /// A composite field carries no sub-selection.
    #[display("Field \"{field_name}\" of composite type \"{type_name}\" needs a sub-selection")]
    MissingSelections {
        #[error(not(source))]
        type_name: Name,
        field_name: Name,
    },

    /// Two selections merge into the same response key with different
    /// arguments.
    #[display("Conflicting selections for response key \"{response_key}\"")]
    FieldConflict {
        #[error(not(source))]
        response_key: Name,
    },

    /// The schema has no mutation type but the operation is a mutation.
    #[display("Schema does not define a mutation type")]
    NoMutationType,
}

/// How a planned field gets its value.
#[derive(Clone)]
pub(crate) enum Dispatch {
    /// A registered resolver.
    Resolver(Arc<FieldDispatcher>),

    /// Read the field straight off the parent object data.
    Property,

    /// The `__typename` meta field.
    TypeName,

    /// The query-root `node(id:)` field, served by the node loader.
    NodeField,
}

/// One field of the operation, rewritten for execution.
pub(crate) struct FieldExecution {
    pub parent_type: Name,
    pub applies: Applies,
    pub field_name: Name,
    pub response_key: Name,
    pub field_type: TypeRef,
    pub arguments: Vec<(Name, InputValue)>,
    pub dispatch: Dispatch,
    pub children: Vec<Arc<FieldExecution>>,
    /// The original sub-selection AST, for the resolver's raw selection set.
    pub selection_ast: Arc<Vec<Selection>>,
    /// The fragment registry and variable environment the selections were
    /// written in.
    pub scope: FieldScope,
}

/// An executable plan for one operation.
pub(crate) struct OperationPlan {
    pub operation_type: OperationType,
    pub root_type: Name,
    pub roots: Vec<Arc<FieldExecution>>,
}

struct Planner<'a> {
    schema: &'a Arc<SchemaType>,
    registry: &'a Arc<DispatcherRegistry>,
    fragments: &'a Arc<FnvHashMap<Name, Fragment>>,
    variables: &'a Arc<Variables>,
}

/// Plans a parsed operation against the schema and registry.
pub(crate) fn plan_operation(
    schema: &Arc<SchemaType>,
    registry: &Arc<DispatcherRegistry>,
    operation: &Operation,
    fragments: &Arc<FnvHashMap<Name, Fragment>>,
    variables: &Arc<Variables>,
) -> Result<OperationPlan, PlanError> {
    let root_type = match operation.operation_type {
        OperationType::Query => schema.query_type_name().clone(),
        OperationType::Mutation => match schema.mutation_type() {
            Some(t) => t.name().clone(),
            None => return Err(PlanError::NoMutationType),
        },
    };

    let planner = Planner {
        schema,
        registry,
        fragments,
        variables,
    };
    let roots = planner.plan_selection_set(&root_type, &operation.selection_set)?;

    Ok(OperationPlan {
        operation_type: operation.operation_type,
        root_type,
        roots,
    })
}

/// Plans a bare selection set (a required-selection-set body) against the
/// schema and registry.
pub(crate) fn plan_selections(
    schema: &Arc<SchemaType>,
    registry: &Arc<DispatcherRegistry>,
    root_type: &Name,
    selections: &[Selection],
    fragments: &Arc<FnvHashMap<Name, Fragment>>,
    variables: &Arc<Variables>,
) -> Result<Vec<Arc<FieldExecution>>, PlanError> {
    Planner {
        schema,
        registry,
        fragments,
        variables,
    }
    .plan_selection_set(root_type, selections)
}

impl Planner<'_> {
    fn plan_selection_set(
        &self,
        root_type: &Name,
        selections: &[Selection],
    ) -> Result<Vec<Arc<FieldExecution>>, PlanError> {
        let mut out: Vec<FieldExecution> = Vec::new();
        self.collect(root_type, root_type, selections, &Applies::All, &mut out)?;

        let mut merged: Vec<FieldExecution> = Vec::new();
        for field in out {
            if let Some(existing) = merged.iter_mut().find(|f| {
                f.response_key == field.response_key && f.applies == field.applies
            }) {
                if existing.field_name != field.field_name
                    || existing.arguments != field.arguments
                {
                    return Err(PlanError::FieldConflict {
                        response_key: field.response_key.clone(),
                    });
                }
                existing.children.extend(field.children);
                if !field.selection_ast.is_empty() {
                    let mut combined = (*existing.selection_ast).clone();
                    combined.extend((*field.selection_ast).clone());
                    existing.selection_ast = Arc::new(combined);
                }
                continue;
            }
            merged.push(field);
        }

        Ok(merged.into_iter().map(Arc::new).collect())
    }

    fn collect(
        &self,
        root_type: &Name,
        on_type: &Name,
        selections: &[Selection],
        condition: &Applies,
        out: &mut Vec<FieldExecution>,
    ) -> Result<(), PlanError> {
        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    if !self.should_include(&field.directives) {
                        continue;
                    }
                    out.push(self.plan_field(on_type, field, condition)?);
                }
                Selection::FragmentSpread(spread) => {
                    if !self.should_include(&spread.directives) {
                        continue;
                    }
                    let fragment = self.fragments.get(&spread.name).ok_or_else(|| {
                        PlanError::UnknownFragment {
                            name: spread.name.clone(),
                        }
                    })?;
                    self.enter_fragment(
                        root_type,
                        Some(&fragment.type_condition),
                        &fragment.selection_set,
                        condition,
                        out,
                    )?;
                }
                Selection::InlineFragment(inline) => {
                    if !self.should_include(&inline.directives) {
                        continue;
                    }
                    self.enter_fragment(
                        root_type,
                        inline.type_condition.as_ref(),
                        &inline.selection_set,
                        condition,
                        out,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn enter_fragment(
        &self,
        root_type: &Name,
        type_condition: Option<&Name>,
        selections: &[Selection],
        outer: &Applies,
        out: &mut Vec<FieldExecution>,
    ) -> Result<(), PlanError> {
        let Some(tc) = type_condition else {
            return self.collect(root_type, root_type, selections, outer, out);
        };

        if self.schema.concrete_type_by_name(tc).is_none() {
            return Err(PlanError::UnknownType { name: tc.clone() });
        }
        // A fragment that can never match the enclosing type selects
        // nothing.
        if !self.schema.type_overlap(root_type, tc) {
            return Ok(());
        }

        let (on_type, condition) = if tc == root_type {
            (root_type, outer.clone())
        } else {
            (tc, Applies::OnlyType(tc.clone()))
        };
        self.collect(root_type, on_type, selections, &condition, out)
    }

    fn plan_field(
        &self,
        on_type: &Name,
        field: &crate::ast::Field,
        condition: &Applies,
    ) -> Result<FieldExecution, PlanError> {
        if field.name.as_str() == "__typename" {
            return Ok(FieldExecution {
                parent_type: on_type.clone(),
                applies: condition.clone(),
                field_name: field.name.clone(),
                response_key: field.response_key().clone(),
                field_type: TypeRef::named("String").non_null(),
                arguments: Vec::new(),
                dispatch: Dispatch::TypeName,
                children: Vec::new(),
                selection_ast: Arc::new(Vec::new()),
                scope: self.scope(),
            });
        }

        let def = self
            .schema
            .field(on_type, &field.name)
            .ok_or_else(|| PlanError::UnknownField {
                type_name: on_type.clone(),
                field_name: field.name.clone(),
            })?
            .clone();

        let arguments = self.coerce_arguments(&def, field);

        let output_name = Name::from(def.field_type.innermost_name());
        let output_meta = self.schema.concrete_type_by_name(&output_name);
        let is_composite = output_meta.is_some_and(meta::MetaType::is_composite);

        let children = if is_composite {
            if field.selection_set.is_empty() {
                return Err(PlanError::MissingSelections {
                    type_name: output_name.clone(),
                    field_name: field.name.clone(),
                });
            }
            self.plan_selection_set(&output_name, &field.selection_set)?
        } else {
            if !field.selection_set.is_empty() {
                return Err(PlanError::SelectionsOnLeaf {
                    type_name: output_name.clone(),
                    field_name: field.name.clone(),
                });
            }
            Vec::new()
        };

        let dispatch = match self.registry.field_dispatcher(on_type, &field.name) {
            Some(d) => Dispatch::Resolver(Arc::clone(d)),
            None if on_type == self.schema.query_type_name()
                && field.name.as_str() == "node" =>
            {
                Dispatch::NodeField
            }
            None => Dispatch::Property,
        };

        Ok(FieldExecution {
            parent_type: on_type.clone(),
            applies: condition.clone(),
            field_name: field.name.clone(),
            response_key: field.response_key().clone(),
            field_type: def.field_type.clone(),
            arguments,
            dispatch,
            children,
            selection_ast: Arc::new(field.selection_set.clone()),
            scope: self.scope(),
        })
    }

    fn scope(&self) -> FieldScope {
        FieldScope::new(Arc::clone(self.fragments), Arc::clone(self.variables))
    }

    /// Merges definition defaults into the provided arguments and
    /// substitutes variables.
    fn coerce_arguments(
        &self,
        def: &meta::Field,
        field: &crate::ast::Field,
    ) -> Vec<(Name, InputValue)> {
        let mut out: Vec<(Name, InputValue)> = field
            .arguments
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().into_const(self.variables)))
            .collect();

        for arg_def in &def.arguments {
            if out.iter().any(|(k, _)| k == &arg_def.name) {
                continue;
            }
            if let Some(default) = &arg_def.default_value {
                out.push((arg_def.name.clone(), literal_to_input(default)));
            }
        }

        out
    }

    fn should_include(&self, directives: &[Directive]) -> bool {
        directives.iter().all(|d| {
            let condition = || {
                d.arguments
                    .iter()
                    .find(|(name, _)| name.as_str() == "if")
                    .map(|(_, v)| v.clone().into_const(self.variables))
                    .and_then(|v| v.as_boolean_value())
            };

            match d.name.as_str() {
                "include" => condition().unwrap_or(true),
                "skip" => !condition().unwrap_or(false),
                _ => true,
            }
        })
    }
}

/// Converts a schema literal into an executable input value.
fn literal_to_input(literal: &Literal) -> InputValue {
    match literal {
        Literal::Null => InputValue::Null,
        Literal::Boolean(b) => InputValue::Boolean(*b),
        Literal::String(s) => InputValue::String(s.clone()),
        Literal::Int(i) => match i.to_i64() {
            Some(v) => InputValue::Int(v),
            None => InputValue::Float(i.text().parse().unwrap_or(f64::NAN)),
        },
        Literal::Float(f) => InputValue::Float(f.to_f64()),
        Literal::Enum(name) => InputValue::Enum(name.clone()),
        Literal::List(items) => InputValue::List(items.iter().map(literal_to_input).collect()),
        Literal::Object(fields) => InputValue::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), literal_to_input(v)))
                .collect(),
        ),
    }
}
