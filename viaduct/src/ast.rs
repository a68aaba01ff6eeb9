use std::fmt;

use arcstr::ArcStr;
use fnv::FnvHashSet;

use crate::executor::Variables;

/// Interned name of a type, field, argument, variable or directive.
pub type Name = ArcStr;

/// Type literal in a syntax tree.
///
/// Carries no semantic information and might refer to types that don't exist.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TypeRef {
    /// Named, `null`able type (e.g. `Int`).
    Named(Name),

    /// Non-`null` type (e.g. `Int!`).
    NonNull(Box<TypeRef>),

    /// List type (e.g. `[Int]`).
    List(Box<TypeRef>),
}

impl TypeRef {
    /// Creates a new `null`able named [`TypeRef`].
    pub fn named(name: impl Into<Name>) -> Self {
        Self::Named(name.into())
    }

    /// Wraps this [`TypeRef`] as a non-`null` one.
    pub fn non_null(self) -> Self {
        Self::NonNull(Box::new(self))
    }

    /// Wraps this [`TypeRef`] into a list.
    pub fn list(self) -> Self {
        Self::List(Box::new(self))
    }

    /// Returns the innermost name of this [`TypeRef`] by unpacking lists and
    /// non-`null` modifiers.
    pub fn innermost_name(&self) -> &str {
        match self {
            Self::Named(n) => n,
            Self::NonNull(inner) | Self::List(inner) => inner.innermost_name(),
        }
    }

    /// Indicates whether this [`TypeRef`] is non-`null` at the top level.
    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Strips the top-level non-`null` modifier, if any.
    pub fn nullable(&self) -> &Self {
        match self {
            Self::NonNull(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(n) => write!(f, "{n}"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
            Self::List(inner) => write!(f, "[{inner}]"),
        }
    }
}

/// A JSON-like value that can be passed into the query execution, either
/// out-of-band, or in-band as default variable values. These are _not_
/// constant and might contain variables.
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum InputValue {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Enum(Name),
    Variable(Name),
    List(Vec<InputValue>),
    Object(Vec<(Name, InputValue)>),
}

impl InputValue {
    /// Constructs a `null` value.
    pub fn null() -> Self {
        Self::Null
    }

    /// Constructs an enum value.
    pub fn enum_value(s: impl Into<Name>) -> Self {
        Self::Enum(s.into())
    }

    /// Constructs a variable value.
    pub fn variable(v: impl Into<Name>) -> Self {
        Self::Variable(v.into())
    }

    /// Resolves all variables of this [`InputValue`] to their actual `values`.
    ///
    /// A variable not present in `values` becomes an [`InputValue::Null`]
    /// (defaulting, if any, has already happened by the time an engine value
    /// is materialised).
    #[must_use]
    pub fn into_const(self, values: &Variables) -> Self {
        match self {
            Self::Variable(v) => values.get(v.as_str()).cloned().unwrap_or(Self::Null),
            Self::List(l) => Self::List(l.into_iter().map(|v| v.into_const(values)).collect()),
            Self::Object(o) => Self::Object(
                o.into_iter()
                    .map(|(k, v)| (k, v.into_const(values)))
                    .collect(),
            ),
            v => v,
        }
    }

    /// Does the value represent a `null`?
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Does the value represent a variable?
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    /// Views the underlying enum name, if present.
    pub fn as_enum_value(&self) -> Option<&str> {
        match self {
            Self::Enum(e) => Some(e.as_str()),
            _ => None,
        }
    }

    /// Views the underlying string value, if present.
    pub fn as_string_value(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Views the underlying int value, if present.
    pub fn as_int_value(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Views the underlying float value, if present.
    pub fn as_float_value(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Views the underlying boolean value, if present.
    pub fn as_boolean_value(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Recursively collects all referenced variables into `out`.
    pub fn referenced_variables(&self, out: &mut FnvHashSet<Name>) {
        match self {
            Self::Variable(name) => {
                out.insert(name.clone());
            }
            Self::List(l) => {
                for v in l {
                    v.referenced_variables(out);
                }
            }
            Self::Object(o) => {
                for (_, v) in o {
                    v.referenced_variables(out);
                }
            }
            _ => {}
        }
    }

    /// Converts a JSON value into an [`InputValue`], mapping JSON strings to
    /// GraphQL strings (never enums).
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(l) => {
                Self::List(l.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(o) => Self::Object(
                o.into_iter()
                    .map(|(k, v)| (Name::from(k), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Enum(v) => write!(f, "{v}"),
            Self::Variable(v) => write!(f, "${v}"),
            Self::List(v) => {
                write!(f, "[")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt(f)?;
                }
                write!(f, "]")
            }
            Self::Object(o) => {
                write!(f, "{{")?;
                for (i, (k, v)) in o.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for InputValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for InputValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for InputValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for InputValue {
    fn from(v: &str) -> Self {
        Self::String(v.into())
    }
}

impl From<String> for InputValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// A directive applied to a selection (e.g. `@include(if: $flag)`).
#[derive(Clone, Debug, PartialEq)]
pub struct Directive {
    pub name: Name,
    pub arguments: Vec<(Name, InputValue)>,
}

/// A single field selection, possibly aliased and with a sub-selection.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub alias: Option<Name>,
    pub name: Name,
    pub arguments: Vec<(Name, InputValue)>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
}

impl Field {
    /// The key this field's value is stored under in the response.
    pub fn response_key(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.name)
    }
}

/// A named fragment spread (`...frag`).
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentSpread {
    pub name: Name,
    pub directives: Vec<Directive>,
}

/// An inline fragment (`... on Type { ... }`).
#[derive(Clone, Debug, PartialEq)]
pub struct InlineFragment {
    pub type_condition: Option<Name>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
}

/// Entry in a GraphQL selection set.
///
/// This enum represents one of the three variants of a selection that exists
/// in GraphQL: a field, a fragment spread, or an inline fragment.
///
/// ```text
/// {
///   field(withArg: 123) { subField }
///   ...fragmentSpread
///   ...on User {
///     inlineFragmentField
///   }
/// }
/// ```
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

/// A variable definition in an operation header.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableDefinition {
    pub name: Name,
    pub var_type: TypeRef,
    pub default_value: Option<InputValue>,
}

/// The kind of an executable operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum OperationType {
    Query,
    Mutation,
}

/// A single executable operation definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub operation_type: OperationType,
    pub name: Option<Name>,
    pub variable_definitions: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
}

/// A named fragment definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub name: Name,
    pub type_condition: Name,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
}

/// A top-level definition in an executable document.
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum Definition {
    Operation(Operation),
    Fragment(Fragment),
}

/// A parsed executable document.
pub type Document = Vec<Definition>;


#[cfg(test)]
mod type_ref_tests {
    use super::TypeRef;

    #[test]
    fn display() {
        assert_eq!(TypeRef::named("Int").to_string(), "Int");
        assert_eq!(TypeRef::named("Int").non_null().to_string(), "Int!");
        assert_eq!(
            TypeRef::named("Int").non_null().list().non_null().to_string(),
            "[Int!]!",
        );
    }

    #[test]
    fn innermost_name() {
        assert_eq!(
            TypeRef::named("Baz").non_null().list().innermost_name(),
            "Baz",
        );
    }
}
