use crate::{
    ast::{Name, TypeRef},
    parser::SourcePosition,
    schema::literal::Literal,
};

/// A directive applied to a schema definition, e.g. `@key(fields: "id")`.
///
/// Arguments keep the order they were written in; defaulted arguments are
/// omitted rather than filled in.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectiveApplication {
    pub name: Name,
    pub arguments: Vec<(Name, Literal)>,
}

/// Scalar type metadata.
#[derive(Clone, Debug)]
pub struct ScalarMeta {
    pub name: Name,
    pub description: Option<String>,
    pub directives: Vec<DirectiveApplication>,
    pub position: Option<SourcePosition>,
}

/// Field argument metadata.
#[derive(Clone, Debug)]
pub struct Argument {
    pub name: Name,
    pub arg_type: TypeRef,
    pub default_value: Option<Literal>,
    pub description: Option<String>,
}

impl Argument {
    /// Creates a new [`Argument`] of the provided name and type.
    pub fn new(name: impl Into<Name>, arg_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            arg_type,
            default_value: None,
            description: None,
        }
    }
}

/// Field metadata.
#[derive(Clone, Debug)]
pub struct Field {
    pub name: Name,
    pub field_type: TypeRef,
    pub arguments: Vec<Argument>,
    pub directives: Vec<DirectiveApplication>,
    pub description: Option<String>,
}

impl Field {
    /// Creates a new [`Field`] of the provided name and type.
    pub fn new(name: impl Into<Name>, field_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            field_type,
            arguments: Vec::new(),
            directives: Vec::new(),
            description: None,
        }
    }

    /// Looks up an argument definition by name.
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name.as_str() == name)
    }
}

/// Object type metadata, with any `extend type` members already merged in.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    pub name: Name,
    pub description: Option<String>,
    pub fields: Vec<Field>,
    pub interface_names: Vec<Name>,
    pub directives: Vec<DirectiveApplication>,
    pub position: Option<SourcePosition>,
}

/// Interface type metadata.
#[derive(Clone, Debug)]
pub struct InterfaceMeta {
    pub name: Name,
    pub description: Option<String>,
    pub fields: Vec<Field>,
    pub directives: Vec<DirectiveApplication>,
    pub position: Option<SourcePosition>,
}

/// Union type metadata.
#[derive(Clone, Debug)]
pub struct UnionMeta {
    pub name: Name,
    pub description: Option<String>,
    pub of_type_names: Vec<Name>,
    pub directives: Vec<DirectiveApplication>,
    pub position: Option<SourcePosition>,
}

/// A single enum member.
#[derive(Clone, Debug)]
pub struct EnumValue {
    pub name: Name,
    pub directives: Vec<DirectiveApplication>,
}

/// Enum type metadata.
#[derive(Clone, Debug)]
pub struct EnumMeta {
    pub name: Name,
    pub description: Option<String>,
    pub values: Vec<EnumValue>,
    pub directives: Vec<DirectiveApplication>,
    pub position: Option<SourcePosition>,
}

/// Input object type metadata.
#[derive(Clone, Debug)]
pub struct InputObjectMeta {
    pub name: Name,
    pub description: Option<String>,
    pub input_fields: Vec<Argument>,
    pub directives: Vec<DirectiveApplication>,
    pub position: Option<SourcePosition>,
}

/// Metadata for a type definition.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum MetaType {
    Scalar(ScalarMeta),
    Object(ObjectMeta),
    Interface(InterfaceMeta),
    Union(UnionMeta),
    Enum(EnumMeta),
    InputObject(InputObjectMeta),
}

impl MetaType {
    /// The name of this type definition.
    pub fn name(&self) -> &Name {
        match self {
            Self::Scalar(m) => &m.name,
            Self::Object(m) => &m.name,
            Self::Interface(m) => &m.name,
            Self::Union(m) => &m.name,
            Self::Enum(m) => &m.name,
            Self::InputObject(m) => &m.name,
        }
    }

    /// The applied directives of this type definition.
    pub fn directives(&self) -> &[DirectiveApplication] {
        match self {
            Self::Scalar(m) => &m.directives,
            Self::Object(m) => &m.directives,
            Self::Interface(m) => &m.directives,
            Self::Union(m) => &m.directives,
            Self::Enum(m) => &m.directives,
            Self::InputObject(m) => &m.directives,
        }
    }

    /// Looks up a field definition by name on an object or interface type.
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        match self {
            Self::Object(m) => m.fields.iter().find(|f| f.name.as_str() == name),
            Self::Interface(m) => m.fields.iter().find(|f| f.name.as_str() == name),
            _ => None,
        }
    }

    /// Indicates whether selection sets can be applied to this type.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Interface(_) | Self::Union(_))
    }

    /// Indicates whether this type can be the concrete runtime type of a
    /// value (i.e. is an object type).
    pub fn is_concrete(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Indicates whether this type is abstract (interface or union).
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Interface(_) | Self::Union(_))
    }

    /// Indicates whether values of this type are leaves of a response.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_))
    }

    /// Indicates whether this type can be used as an input value.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_) | Self::InputObject(_))
    }

    /// Views this type's object metadata, if it is an object.
    pub fn as_object(&self) -> Option<&ObjectMeta> {
        match self {
            Self::Object(m) => Some(m),
            _ => None,
        }
    }
}
