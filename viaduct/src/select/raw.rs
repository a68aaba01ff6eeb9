use std::sync::Arc;

use fnv::FnvHashMap;

use crate::{
    ast::{Directive, Fragment, InputValue, Name, Selection},
    executor::Variables,
    schema::SchemaType,
    select::ParsedSelections,
};

/// Which runtime types a selected field applies to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Applies {
    /// Applies to every possible runtime type.
    All,

    /// Applies only to the named runtime type (or types narrowing to it).
    OnlyType(Name),
}

impl Applies {
    /// Indicates whether a field under `self` is guaranteed present whenever
    /// a field under `other` is.
    fn covers(&self, other: &Applies) -> bool {
        match (self, other) {
            (Self::All, _) => true,
            (Self::OnlyType(_), Self::All) => false,
            (Self::OnlyType(a), Self::OnlyType(b)) => a == b,
        }
    }
}

/// A single field of a normalized selection set: fragments flattened,
/// conditions evaluated, variables substituted.
#[derive(Clone, Debug, PartialEq)]
pub struct RawField {
    /// The field name in the schema.
    pub name: Name,

    /// The key this field responds under (alias, or the name).
    pub response_key: Name,

    /// Constant arguments, with variables already substituted.
    pub arguments: Vec<(Name, InputValue)>,

    /// The runtime-type condition this field is selected under.
    pub applies: Applies,

    /// Normalized sub-selections.
    pub children: Vec<RawField>,
}

/// A parsed selection tree bound to the host schema and a concrete variable
/// environment.
///
/// Several bound trees of the same root type can be unioned into one
/// [`RawSelectionSet`] ([`RawSelectionSet::merged`]); normalization merges
/// them field-by-field. The [coverage] relation compares normalized trees.
///
/// [coverage]: RawSelectionSet::covers
#[derive(Clone, Debug)]
pub struct RawSelectionSet {
    schema: Arc<SchemaType>,
    parts: Vec<RawPart>,
}

#[derive(Clone, Debug)]
struct RawPart {
    selections: ParsedSelections,
    variables: Arc<Variables>,
}

impl RawSelectionSet {
    /// Binds `selections` to a schema and a variable environment.
    pub fn new(
        schema: Arc<SchemaType>,
        selections: ParsedSelections,
        variables: Arc<Variables>,
    ) -> Self {
        Self {
            schema,
            parts: vec![RawPart {
                selections,
                variables,
            }],
        }
    }

    /// An empty selection set of the provided root type.
    pub fn empty(schema: Arc<SchemaType>, type_condition: impl Into<Name>) -> Self {
        Self::new(
            schema,
            ParsedSelections::empty(type_condition),
            Arc::new(Variables::default()),
        )
    }

    /// Unions several selection sets of the same root type.
    ///
    /// Returns [`None`] when `sets` is empty.
    pub fn merged(sets: Vec<RawSelectionSet>) -> Option<RawSelectionSet> {
        let mut iter = sets.into_iter();
        let mut merged = iter.next()?;
        for set in iter {
            merged.parts.extend(set.parts);
        }
        Some(merged)
    }

    /// The host schema.
    pub fn schema(&self) -> &Arc<SchemaType> {
        &self.schema
    }

    /// The `(selections, variables)` parts this set unions over.
    pub(crate) fn parts(&self) -> impl Iterator<Item = (&ParsedSelections, &Arc<Variables>)> {
        self.parts.iter().map(|p| (&p.selections, &p.variables))
    }

    /// The name of the type these selections apply to.
    pub fn type_condition(&self) -> &Name {
        self.parts[0].selections.type_condition()
    }

    /// Indicates whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| p.selections.is_empty())
    }

    /// Normalizes into merged [`RawField`] trees: fragments flattened,
    /// `@include`/`@skip` evaluated under the bound variables, variables
    /// substituted into arguments.
    pub fn resolve(&self) -> Vec<RawField> {
        let mut fields = Vec::new();
        for part in &self.parts {
            let normalizer = Normalizer {
                variables: &part.variables,
                fragments: part.selections.fragments(),
                root_type: part.selections.type_condition(),
            };
            normalizer.normalize(
                part.selections.selections(),
                &Applies::All,
                &mut fields,
            );
        }

        merge_fields(fields)
    }

    /// The normalized fields that apply to the provided concrete type.
    pub fn fields_for_type(&self, concrete: &str) -> Vec<RawField> {
        self.resolve()
            .into_iter()
            .filter(|f| match &f.applies {
                Applies::All => true,
                Applies::OnlyType(t) => self.schema.is_possible_type(t, concrete),
            })
            .collect()
    }

    /// Indicates whether a top-level field of the provided name is selected
    /// under any type condition.
    pub fn contains_field(&self, name: &str) -> bool {
        self.resolve().iter().any(|f| f.name.as_str() == name)
    }

    /// The coverage relation: `self` covers `other` iff every leaf path
    /// reachable through `other` is reachable through `self`, with selection
    /// conditions evaluated under each side's bound variables.
    pub fn covers(&self, other: &RawSelectionSet) -> bool {
        covers_fields(&self.resolve(), &other.resolve())
    }
}

fn covers_fields(covering: &[RawField], covered: &[RawField]) -> bool {
    covered.iter().all(|b| {
        covering.iter().any(|a| {
            a.name == b.name
                && a.arguments == b.arguments
                && a.applies.covers(&b.applies)
                && covers_fields(&a.children, &b.children)
        })
    })
}

/// Merges duplicate selections of the same field into one, recursively.
fn merge_fields(fields: Vec<RawField>) -> Vec<RawField> {
    let mut merged: Vec<RawField> = Vec::with_capacity(fields.len());

    for field in fields {
        if let Some(existing) = merged.iter_mut().find(|f| {
            f.name == field.name && f.arguments == field.arguments && f.applies == field.applies
        }) {
            existing.children.extend(field.children);
            continue;
        }
        merged.push(field);
    }

    for field in &mut merged {
        let children = std::mem::take(&mut field.children);
        field.children = merge_fields(children);
    }

    merged
}

struct Normalizer<'a> {
    variables: &'a Variables,
    fragments: &'a FnvHashMap<Name, Fragment>,
    root_type: &'a Name,
}

impl Normalizer<'_> {
    fn normalize(&self, selections: &[Selection], condition: &Applies, out: &mut Vec<RawField>) {
        for selection in selections {
            match selection {
                Selection::Field(f) => {
                    if !self.should_include(&f.directives) {
                        continue;
                    }

                    let mut children = Vec::new();
                    self.normalize(&f.selection_set, &Applies::All, &mut children);

                    out.push(RawField {
                        name: f.name.clone(),
                        response_key: f.response_key().clone(),
                        arguments: f
                            .arguments
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone().into_const(self.variables)))
                            .collect(),
                        applies: condition.clone(),
                        children,
                    });
                }
                Selection::FragmentSpread(s) => {
                    if !self.should_include(&s.directives) {
                        continue;
                    }
                    if let Some(fragment) = self.fragments.get(&s.name) {
                        let narrowed =
                            self.narrow(condition, Some(&fragment.type_condition));
                        self.normalize(&fragment.selection_set, &narrowed, out);
                    }
                }
                Selection::InlineFragment(i) => {
                    if !self.should_include(&i.directives) {
                        continue;
                    }
                    let narrowed = self.narrow(condition, i.type_condition.as_ref());
                    self.normalize(&i.selection_set, &narrowed, out);
                }
            }
        }
    }

    /// Combines the enclosing condition with a fragment's type condition.
    fn narrow(&self, outer: &Applies, type_condition: Option<&Name>) -> Applies {
        match type_condition {
            // A condition naming the root type does not narrow anything.
            None => outer.clone(),
            Some(tc) if tc == self.root_type => outer.clone(),
            Some(tc) => Applies::OnlyType(tc.clone()),
        }
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        ast::{InputValue, Name},
        executor::Variables,
        schema::SchemaType,
        select::ParsedSelections,
    };

    use super::{Applies, RawSelectionSet};

    fn schema() -> Arc<SchemaType> {
        Arc::new(
            SchemaType::from_sdl(
                "type Query { pets: [Pet] listing: Listing }
                 interface Pet { name: String }
                 type Dog implements Pet { name: String barks: Boolean }
                 type Cat implements Pet { name: String meows: Boolean }
                 type Listing {
                     id: ID!
                     host(verified: Boolean): Host
                     reviews(first: Int): [String]
                 }
                 type Host { id: ID! name: String }",
            )
            .unwrap(),
        )
    }

    fn raw(root: &str, source: &str, vars: Variables) -> RawSelectionSet {
        RawSelectionSet::new(
            schema(),
            ParsedSelections::parse(root, source).unwrap(),
            Arc::new(vars),
        )
    }

    fn vars(pairs: &[(&str, InputValue)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (Name::from(*k), v.clone()))
            .collect()
    }

    #[test]
    fn normalizes_fragments_and_conditions() {
        let set = raw(
            "Pet",
            "name ... on Dog { barks } ...cats fragment cats on Cat { meows }",
            Variables::default(),
        );

        let fields = set.resolve();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].applies, Applies::All);
        assert_eq!(fields[1].applies, Applies::OnlyType("Dog".into()));
        assert_eq!(fields[2].applies, Applies::OnlyType("Cat".into()));

        let dog_fields = set.fields_for_type("Dog");
        assert_eq!(dog_fields.len(), 2);
        assert!(dog_fields.iter().any(|f| f.name.as_str() == "barks"));
    }

    #[test]
    fn skip_and_include_evaluated_under_variables() {
        let set = raw(
            "Listing",
            "id @include(if: $a) host @skip(if: $b) { id } reviews @include(if: $b)",
            vars(&[
                ("a", InputValue::Boolean(true)),
                ("b", InputValue::Boolean(false)),
            ]),
        );

        let names: Vec<_> = set.resolve().iter().map(|f| f.name.to_string()).collect();
        assert_eq!(names, vec!["id", "host"]);
    }

    #[test]
    fn substitutes_argument_variables() {
        let set = raw(
            "Listing",
            "reviews(first: $n)",
            vars(&[("n", InputValue::Int(5))]),
        );

        let fields = set.resolve();
        assert_eq!(
            fields[0].arguments,
            vec![(Name::from("first"), InputValue::Int(5))],
        );
    }

    #[test]
    fn merges_duplicate_selections() {
        let set = raw(
            "Listing",
            "host { id } host { name }",
            Variables::default(),
        );

        let fields = set.resolve();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].children.len(), 2);
    }

    #[test]
    fn coverage_is_leaf_path_inclusion() {
        let wide = raw("Listing", "id host { id name }", Variables::default());
        let narrow = raw("Listing", "host { name }", Variables::default());

        assert!(wide.covers(&narrow));
        assert!(!narrow.covers(&wide));
        assert!(wide.covers(&wide));
    }

    #[test]
    fn coverage_respects_arguments() {
        let with_arg = raw("Listing", "reviews(first: 1)", Variables::default());
        let other_arg = raw("Listing", "reviews(first: 2)", Variables::default());
        let bound = raw(
            "Listing",
            "reviews(first: $n)",
            vars(&[("n", InputValue::Int(1))]),
        );

        assert!(!with_arg.covers(&other_arg));
        // Identical after variable substitution.
        assert!(with_arg.covers(&bound));
        assert!(bound.covers(&with_arg));
    }

    #[test]
    fn coverage_respects_type_conditions() {
        let all_pets = raw("Pet", "name", Variables::default());
        let dogs_only = raw("Pet", "... on Dog { name }", Variables::default());

        assert!(all_pets.covers(&dogs_only));
        assert!(!dogs_only.covers(&all_pets));
    }

    #[test]
    fn coverage_sees_through_conditions_evaluated_false() {
        let plain = raw("Listing", "id", Variables::default());
        let with_skipped = raw(
            "Listing",
            "id host @include(if: $withHost) { id }",
            vars(&[("withHost", InputValue::Boolean(false))]),
        );

        // The host selection is disabled under these variables, so plain
        // `id` covers the whole set.
        assert!(plain.covers(&with_skipped));
    }

    #[test]
    fn merged_sets_cover_their_parts() {
        let a = raw("Listing", "id", Variables::default());
        let b = raw("Listing", "host { id }", Variables::default());
        let merged = RawSelectionSet::merged(vec![a.clone(), b.clone()]).unwrap();

        assert!(merged.covers(&a));
        assert!(merged.covers(&b));
        assert!(!a.covers(&merged));
        assert!(RawSelectionSet::merged(Vec::new()).is_none());
    }
}
