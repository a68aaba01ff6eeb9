//! Lexing and parsing of executable GraphQL documents and selection sets.
//!
//! Full operation parsing, validation and coercion are collaborator concerns;
//! this module carries exactly the surface the engine needs: executable
//! documents for incoming operations, bare selection lists for required
//! selection sets, and the shared lexer the SDL reader builds on.

mod document;
mod lexer;
mod parser;
mod utils;
mod value;

pub use self::{
    document::{parse_document_source, parse_selections_source},
    lexer::{Lexer, LexerError, ScalarToken, Token},
    parser::{OptionParseResult, ParseError, ParseResult, Parser, UnlocatedParseResult},
    utils::{SourcePosition, Span, Spanning},
};

pub(crate) use self::document::parse_type;
