use derive_more::with_trait::{Display, Error, From};
use fnv::FnvHashMap;

use crate::{
    ast::{Name, TypeRef},
    parser::{ParseError, Spanning},
    schema::meta::{Argument, MetaType, ObjectMeta},
};

/// Metadata for a schema: the immutable type graph the engine executes
/// against.
#[derive(Clone, Debug)]
pub struct SchemaType {
    types: FnvHashMap<Name, MetaType>,
    query_type_name: Name,
    mutation_type_name: Option<Name>,
    directives: FnvHashMap<Name, DirectiveType>,
}

/// Definition of a directive usable in operations or schema documents.
#[derive(Clone, Debug)]
pub struct DirectiveType {
    pub name: Name,
    pub description: Option<String>,
    pub locations: Vec<DirectiveLocation>,
    pub arguments: Vec<Argument>,
}

/// Locations a directive may be applied at.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum DirectiveLocation {
    Query,
    Mutation,
    Field,
    FragmentDefinition,
    FragmentSpread,
    InlineFragment,
    Object,
    FieldDefinition,
    Scalar,
    Interface,
    Union,
    Enum,
    EnumValue,
    InputObject,
    InputFieldDefinition,
}

impl DirectiveType {
    fn new_skip() -> Self {
        Self {
            name: arcstr::literal!("skip"),
            description: None,
            locations: vec![
                DirectiveLocation::Field,
                DirectiveLocation::FragmentSpread,
                DirectiveLocation::InlineFragment,
            ],
            arguments: vec![Argument::new("if", TypeRef::named("Boolean").non_null())],
        }
    }

    fn new_include() -> Self {
        Self {
            name: arcstr::literal!("include"),
            description: None,
            locations: vec![
                DirectiveLocation::Field,
                DirectiveLocation::FragmentSpread,
                DirectiveLocation::InlineFragment,
            ],
            arguments: vec![Argument::new("if", TypeRef::named("Boolean").non_null())],
        }
    }
}

/// Error assembling or validating a [`SchemaType`].
#[derive(Clone, Debug, Display, Error, From, PartialEq)]
pub enum SchemaError {
    /// The schema document failed to parse.
    Parse(Spanning<ParseError>),

    /// Two type definitions carry the same name.
    #[display("Duplicate type definition \"{name}\"")]
    #[from(ignore)]
    DuplicateType {
        #[error(not(source))]
        name: Name,
    },

    /// A definition references a type that is not defined in the schema.
    #[display("\"{referenced_by}\" references unknown type \"{name}\"")]
    #[from(ignore)]
    UnknownType {
        #[error(not(source))]
        referenced_by: Name,
        name: Name,
    },

    /// The root query type is missing.
    #[display("Root query type \"{name}\" is not defined")]
    #[from(ignore)]
    MissingQueryType {
        #[error(not(source))]
        name: Name,
    },

    /// A union member is not an object type.
    #[display("Union \"{union_name}\" member \"{member}\" is not an object type")]
    #[from(ignore)]
    NonObjectUnionMember {
        #[error(not(source))]
        union_name: Name,
        member: Name,
    },

    /// An object implements something that is not an interface type.
    #[display("\"{object}\" implements \"{interface}\", which is not an interface type")]
    #[from(ignore)]
    NonInterfaceImplemented {
        #[error(not(source))]
        object: Name,
        interface: Name,
    },

    /// An extension targets a type that is not defined or of another kind.
    #[display("Cannot extend \"{name}\": no such {kind} type")]
    #[from(ignore)]
    InvalidExtension {
        #[error(not(source))]
        name: Name,
        kind: &'static str,
    },
}

impl SchemaType {
    /// Assembles and validates a new [`SchemaType`] out of type definitions.
    ///
    /// The `skip` and `include` executable directives are always available.
    pub fn new(
        types: Vec<MetaType>,
        query_type_name: impl Into<Name>,
        mutation_type_name: Option<Name>,
        directives: Vec<DirectiveType>,
    ) -> Result<Self, SchemaError> {
        let mut type_map = FnvHashMap::default();
        for t in types {
            let name = t.name().clone();
            if type_map.insert(name.clone(), t).is_some() {
                return Err(SchemaError::DuplicateType { name });
            }
        }

        let mut directive_map = FnvHashMap::default();
        for d in [DirectiveType::new_skip(), DirectiveType::new_include()]
            .into_iter()
            .chain(directives)
        {
            directive_map.insert(d.name.clone(), d);
        }

        let schema = Self {
            types: type_map,
            query_type_name: query_type_name.into(),
            mutation_type_name,
            directives: directive_map,
        };
        schema.validate()?;

        Ok(schema)
    }

    /// Parses an SDL document into a validated [`SchemaType`].
    pub fn from_sdl(source: &str) -> Result<Self, SchemaError> {
        crate::schema::parse::parse_schema(source)
    }

    /// Checks the schema invariants: every type reference is resolvable, the
    /// root query type exists, and union/interface membership is consistent.
    fn validate(&self) -> Result<(), SchemaError> {
        if !matches!(
            self.types.get(&self.query_type_name),
            Some(MetaType::Object(_)),
        ) {
            return Err(SchemaError::MissingQueryType {
                name: self.query_type_name.clone(),
            });
        }

        if let Some(mutation) = &self.mutation_type_name {
            if !matches!(self.types.get(mutation), Some(MetaType::Object(_))) {
                return Err(SchemaError::MissingQueryType {
                    name: mutation.clone(),
                });
            }
        }

        for t in self.types.values() {
            self.validate_type(t)?;
        }

        Ok(())
    }

    fn validate_type(&self, t: &MetaType) -> Result<(), SchemaError> {
        let check_ref = |referenced: &TypeRef| -> Result<(), SchemaError> {
            let name = referenced.innermost_name();
            if self.types.contains_key(name) {
                Ok(())
            } else {
                Err(SchemaError::UnknownType {
                    referenced_by: t.name().clone(),
                    name: Name::from(name),
                })
            }
        };

        match t {
            MetaType::Object(m) => {
                for f in &m.fields {
                    check_ref(&f.field_type)?;
                    for a in &f.arguments {
                        check_ref(&a.arg_type)?;
                    }
                }
                for i in &m.interface_names {
                    match self.types.get(i) {
                        Some(MetaType::Interface(_)) => {}
                        Some(_) => {
                            return Err(SchemaError::NonInterfaceImplemented {
                                object: m.name.clone(),
                                interface: i.clone(),
                            });
                        }
                        None => {
                            return Err(SchemaError::UnknownType {
                                referenced_by: m.name.clone(),
                                name: i.clone(),
                            });
                        }
                    }
                }
            }
            MetaType::Interface(m) => {
                for f in &m.fields {
                    check_ref(&f.field_type)?;
                    for a in &f.arguments {
                        check_ref(&a.arg_type)?;
                    }
                }
            }
            MetaType::Union(m) => {
                for member in &m.of_type_names {
                    match self.types.get(member) {
                        Some(MetaType::Object(_)) => {}
                        Some(_) => {
                            return Err(SchemaError::NonObjectUnionMember {
                                union_name: m.name.clone(),
                                member: member.clone(),
                            });
                        }
                        None => {
                            return Err(SchemaError::UnknownType {
                                referenced_by: m.name.clone(),
                                name: member.clone(),
                            });
                        }
                    }
                }
            }
            MetaType::InputObject(m) => {
                for f in &m.input_fields {
                    check_ref(&f.arg_type)?;
                }
            }
            MetaType::Scalar(_) | MetaType::Enum(_) => {}
        }

        Ok(())
    }

    /// Looks up a type definition by name.
    pub fn concrete_type_by_name(&self, name: &str) -> Option<&MetaType> {
        self.types.get(name)
    }

    /// The root query type.
    pub fn query_type(&self) -> &MetaType {
        self.types
            .get(&self.query_type_name)
            .expect("validation asserted the query type exists")
    }

    /// The name of the root query type.
    pub fn query_type_name(&self) -> &Name {
        &self.query_type_name
    }

    /// The root mutation type, if any.
    pub fn mutation_type(&self) -> Option<&MetaType> {
        self.mutation_type_name
            .as_ref()
            .and_then(|n| self.types.get(n))
    }

    /// Looks up a directive definition by name.
    pub fn directive_by_name(&self, name: &str) -> Option<&DirectiveType> {
        self.directives.get(name)
    }

    /// Looks up a field definition by `(type, field)` coordinate.
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&crate::schema::meta::Field> {
        self.types.get(type_name)?.field_by_name(field_name)
    }

    /// The concrete object types an abstract type can resolve to.
    ///
    /// For an object type this is the type itself.
    pub fn possible_types(&self, name: &str) -> Vec<&ObjectMeta> {
        match self.types.get(name) {
            Some(MetaType::Object(m)) => vec![m],
            Some(MetaType::Union(u)) => u
                .of_type_names
                .iter()
                .filter_map(|n| self.types.get(n).and_then(MetaType::as_object))
                .collect(),
            Some(MetaType::Interface(i)) => {
                let mut out: Vec<_> = self
                    .types
                    .values()
                    .filter_map(MetaType::as_object)
                    .filter(|o| o.interface_names.contains(&i.name))
                    .collect();
                out.sort_by(|a, b| a.name.cmp(&b.name));
                out
            }
            _ => Vec::new(),
        }
    }

    /// Indicates whether `object_name` is a possible runtime type of
    /// `abstract_name`.
    pub fn is_possible_type(&self, abstract_name: &str, object_name: &str) -> bool {
        if abstract_name == object_name {
            return true;
        }
        self.possible_types(abstract_name)
            .iter()
            .any(|o| o.name.as_str() == object_name)
    }

    /// Indicates whether the two named composite types can overlap at
    /// runtime, i.e. share at least one possible object type.
    pub fn type_overlap(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        let b_possible = self.possible_types(b);
        self.possible_types(a)
            .iter()
            .any(|o| b_possible.iter().any(|p| p.name == o.name))
    }
}
