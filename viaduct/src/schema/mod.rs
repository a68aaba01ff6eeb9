//! Schema model: the immutable type graph, directive definitions and the
//! literal AST schema documents are written in.

pub mod literal;
pub mod meta;
pub mod model;
pub(crate) mod parse;

pub use self::{
    literal::{FloatLiteral, IntLiteral, Literal, LiteralError},
    model::{DirectiveLocation, DirectiveType, SchemaError, SchemaType},
};
