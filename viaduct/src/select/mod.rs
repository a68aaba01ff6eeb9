//! Selection-set models: schema-aware parsed trees and variable-bound raw
//! selection sets with the coverage relation.

mod raw;

use std::{collections::BTreeSet, sync::Arc};

use fnv::{FnvHashMap, FnvHashSet};

use crate::{
    ast::{Fragment, Name, Selection},
    parser::{ParseError, Spanning, parse_selections_source},
};

pub use self::raw::{Applies, RawField, RawSelectionSet};

/// A parsed selection tree rooted at a named type.
///
/// Pure AST: fragment spreads are kept as spreads and no variable values are
/// substituted. The named fragment definitions parsed alongside the
/// selections travel with the tree, so a [`ParsedSelections`] is
/// self-contained.
#[derive(Clone, Debug)]
pub struct ParsedSelections {
    type_condition: Name,
    selections: Arc<Vec<Selection>>,
    fragments: Arc<FnvHashMap<Name, Fragment>>,
}

impl ParsedSelections {
    /// Parses a selection-set source rooted at `type_condition`.
    ///
    /// The source is a bare or braced selection list, optionally followed by
    /// the fragment definitions it spreads:
    ///
    /// ```graphql
    /// id ...details fragment details on Listing { hostId }
    /// ```
    pub fn parse(
        type_condition: impl Into<Name>,
        source: &str,
    ) -> Result<Self, Spanning<ParseError>> {
        let (selections, fragments) = parse_selections_source(source)?;

        Ok(Self::from_parts(
            type_condition,
            selections,
            fragments
                .into_iter()
                .map(|f| (f.name.clone(), f))
                .collect(),
        ))
    }

    /// Builds a [`ParsedSelections`] out of already-parsed pieces.
    pub fn from_parts(
        type_condition: impl Into<Name>,
        selections: Vec<Selection>,
        fragments: FnvHashMap<Name, Fragment>,
    ) -> Self {
        Self {
            type_condition: type_condition.into(),
            selections: Arc::new(selections),
            fragments: Arc::new(fragments),
        }
    }

    /// An empty selection set rooted at `type_condition`.
    pub fn empty(type_condition: impl Into<Name>) -> Self {
        Self::from_parts(type_condition, Vec::new(), FnvHashMap::default())
    }

    /// Builds a [`ParsedSelections`] sharing already-interned pieces.
    pub(crate) fn from_shared(
        type_condition: impl Into<Name>,
        selections: Arc<Vec<Selection>>,
        fragments: Arc<FnvHashMap<Name, Fragment>>,
    ) -> Self {
        Self {
            type_condition: type_condition.into(),
            selections,
            fragments,
        }
    }

    /// The fragment map, shared.
    pub(crate) fn shared_fragments(&self) -> Arc<FnvHashMap<Name, Fragment>> {
        Arc::clone(&self.fragments)
    }

    /// The name of the type these selections apply to.
    pub fn type_condition(&self) -> &Name {
        &self.type_condition
    }

    /// The root selections.
    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    /// The named fragment definitions these selections may spread.
    pub fn fragments(&self) -> &FnvHashMap<Name, Fragment> {
        &self.fragments
    }

    /// Indicates whether no fields are selected at all.
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// The set of variables referenced free anywhere in these selections,
    /// including through fragment spreads. Sorted for deterministic output.
    pub fn free_variables(&self) -> BTreeSet<Name> {
        let mut out = FnvHashSet::default();
        let mut visited_fragments = FnvHashSet::default();
        self.collect_variables(&self.selections, &mut out, &mut visited_fragments);

        out.into_iter().collect()
    }

    fn collect_variables(
        &self,
        selections: &[Selection],
        out: &mut FnvHashSet<Name>,
        visited_fragments: &mut FnvHashSet<Name>,
    ) {
        for selection in selections {
            match selection {
                Selection::Field(f) => {
                    for (_, v) in &f.arguments {
                        v.referenced_variables(out);
                    }
                    for d in &f.directives {
                        for (_, v) in &d.arguments {
                            v.referenced_variables(out);
                        }
                    }
                    self.collect_variables(&f.selection_set, out, visited_fragments);
                }
                Selection::FragmentSpread(s) => {
                    for d in &s.directives {
                        for (_, v) in &d.arguments {
                            v.referenced_variables(out);
                        }
                    }
                    if visited_fragments.insert(s.name.clone()) {
                        if let Some(fragment) = self.fragments.get(&s.name) {
                            self.collect_variables(
                                &fragment.selection_set,
                                out,
                                visited_fragments,
                            );
                        }
                    }
                }
                Selection::InlineFragment(i) => {
                    for d in &i.directives {
                        for (_, v) in &d.arguments {
                            v.referenced_variables(out);
                        }
                    }
                    self.collect_variables(&i.selection_set, out, visited_fragments);
                }
            }
        }
    }

    /// The name of the first fragment spread that has no matching
    /// definition, if any.
    pub fn unknown_fragment(&self) -> Option<Name> {
        self.find_unknown(&self.selections)
    }

    fn find_unknown(&self, selections: &[Selection]) -> Option<Name> {
        for selection in selections {
            match selection {
                Selection::Field(f) => {
                    if let Some(found) = self.find_unknown(&f.selection_set) {
                        return Some(found);
                    }
                }
                Selection::FragmentSpread(s) => match self.fragments.get(&s.name) {
                    Some(fragment) => {
                        if let Some(found) = self.find_unknown(&fragment.selection_set) {
                            return Some(found);
                        }
                    }
                    None => return Some(s.name.clone()),
                },
                Selection::InlineFragment(i) => {
                    if let Some(found) = self.find_unknown(&i.selection_set) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    /// Indicates whether the field path is reachable through these
    /// selections, looking through fragments and ignoring conditions.
    pub fn has_path(&self, path: &[Name]) -> bool {
        let Some((first, rest)) = path.split_first() else {
            return true;
        };
        self.path_step(&self.selections, first, rest)
    }

    fn path_step(&self, selections: &[Selection], first: &Name, rest: &[Name]) -> bool {
        for selection in selections {
            let found = match selection {
                Selection::Field(f) => {
                    f.name == *first
                        && match rest.split_first() {
                            None => true,
                            Some((next, tail)) => self.path_step(&f.selection_set, next, tail),
                        }
                }
                Selection::FragmentSpread(s) => self
                    .fragments
                    .get(&s.name)
                    .is_some_and(|f| self.path_step(&f.selection_set, first, rest)),
                Selection::InlineFragment(i) => self.path_step(&i.selection_set, first, rest),
            };
            if found {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::ParsedSelections;

    #[test]
    fn collects_free_variables_through_fragments() {
        let parsed = ParsedSelections::parse(
            "Listing",
            "host(id: $hostId) @include(if: $withHost) { name } ...details \
             fragment details on Listing { reviews(first: $first) { text } }",
        )
        .unwrap();

        let vars: Vec<_> = parsed
            .free_variables()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(vars, vec!["first", "hostId", "withHost"]);
    }

    #[test]
    fn empty_selections_have_no_variables() {
        let parsed = ParsedSelections::empty("Listing");
        assert!(parsed.is_empty());
        assert!(parsed.free_variables().is_empty());
    }

    #[test]
    fn reports_unknown_fragment_spreads() {
        let parsed = ParsedSelections::parse("Listing", "id ...missing").unwrap();
        assert_eq!(parsed.unknown_fragment().unwrap().as_str(), "missing");

        let parsed = ParsedSelections::parse(
            "Listing",
            "id ...known fragment known on Listing { id }",
        )
        .unwrap();
        assert_eq!(parsed.unknown_fragment(), None);
    }

    #[test]
    fn path_reachability() {
        use crate::ast::Name;

        let parsed = ParsedSelections::parse(
            "Listing",
            "id host { address { city } } ...frag fragment frag on Listing { stats { count } }",
        )
        .unwrap();

        let path =
            |names: &[&str]| -> Vec<Name> { names.iter().map(|n| Name::from(*n)).collect() };

        assert!(parsed.has_path(&path(&["id"])));
        assert!(parsed.has_path(&path(&["host", "address", "city"])));
        assert!(parsed.has_path(&path(&["stats", "count"])));
        assert!(!parsed.has_path(&path(&["host", "city"])));
        assert!(!parsed.has_path(&path(&["missing"])));
    }
}
