use std::fmt;

use arcstr::ArcStr;
use derive_more::with_trait::{Display, Error};

use crate::{
    ast::Name,
    parser::{Lexer, ScalarToken, Token},
};

/// A GraphQL value literal, as it appears in a schema document.
///
/// Literals keep their exact lexical forms: two [`Literal`]s compare equal iff
/// their syntactic forms match, so `3.14` and `3.140` are distinct values.
#[derive(Clone, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum Literal {
    Null,
    Boolean(bool),
    String(String),
    Int(IntLiteral),
    Float(FloatLiteral),
    Enum(Name),
    List(Vec<Literal>),
    /// Ordered field map; keys are unique by construction.
    Object(Vec<(Name, Literal)>),
}

/// An `Int` literal carrying its validated source text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IntLiteral(ArcStr);

/// A `Float` literal carrying its validated source text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FloatLiteral(ArcStr);

/// Error constructing a [`Literal`] out of a malformed source form.
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
pub enum LiteralError {
    /// Int literals must not carry leading zeros, signs other than a single
    /// leading `-`, or non-digit characters.
    #[display("Malformed int literal \"{_0}\"")]
    MalformedInt(#[error(not(source))] String),

    /// Float literals must carry a fractional part or an exponent.
    #[display("Malformed float literal \"{_0}\"")]
    MalformedFloat(#[error(not(source))] String),

    /// Enum names must match `[_A-Za-z][_A-Za-z0-9]*`.
    #[display("Malformed enum name \"{_0}\"")]
    MalformedEnumName(#[error(not(source))] String),

    /// `true`, `false` and `null` are not usable as enum names.
    #[display("Enum name \"{_0}\" is reserved")]
    ReservedEnumName(#[error(not(source))] String),

    /// Object literal fields must be unique.
    #[display("Duplicate object literal field \"{_0}\"")]
    DuplicateObjectField(#[error(not(source))] String),

    /// The source is not a single well-formed literal.
    #[display("Not a literal: \"{_0}\"")]
    NotALiteral(#[error(not(source))] String),
}

impl Literal {
    /// Constructs an `Int` [`Literal`] out of its source form, validating
    /// GraphQL lexical rules (optional leading `-`, no leading zeros).
    pub fn int(text: &str) -> Result<Self, LiteralError> {
        let digits = text.strip_prefix('-').unwrap_or(text);

        let valid = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && (digits.len() == 1 || !digits.starts_with('0'));

        if valid {
            Ok(Self::Int(IntLiteral(text.into())))
        } else {
            Err(LiteralError::MalformedInt(text.into()))
        }
    }

    /// Constructs a `Float` [`Literal`] out of its source form.
    ///
    /// The form must carry a fractional part or an exponent; its integer part
    /// follows the same rules as [`Literal::int`].
    pub fn float(text: &str) -> Result<Self, LiteralError> {
        let err = || LiteralError::MalformedFloat(text.into());

        let (mantissa, exponent) = match text.split_once(['e', 'E']) {
            Some((m, e)) => (m, Some(e)),
            None => (text, None),
        };
        let (int_part, fraction) = match mantissa.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (mantissa, None),
        };

        if fraction.is_none() && exponent.is_none() {
            return Err(err());
        }

        let digits = int_part.strip_prefix('-').unwrap_or(int_part);
        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || (digits.len() > 1 && digits.starts_with('0'))
        {
            return Err(err());
        }

        if let Some(f) = fraction {
            if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
        }

        if let Some(e) = exponent {
            let e_digits = e.strip_prefix(['+', '-']).unwrap_or(e);
            if e_digits.is_empty() || !e_digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
        }

        Ok(Self::Float(FloatLiteral(text.into())))
    }

    /// Constructs an enum [`Literal`], validating the name form and rejecting
    /// the reserved `true`/`false`/`null` names.
    pub fn enum_name(name: &str) -> Result<Self, LiteralError> {
        if matches!(name, "true" | "false" | "null") {
            return Err(LiteralError::ReservedEnumName(name.into()));
        }

        let mut bytes = name.bytes();
        let valid = bytes
            .next()
            .is_some_and(|b| b == b'_' || b.is_ascii_alphabetic())
            && bytes.all(|b| b == b'_' || b.is_ascii_alphanumeric());

        if valid {
            Ok(Self::Enum(Name::from(name)))
        } else {
            Err(LiteralError::MalformedEnumName(name.into()))
        }
    }

    /// Constructs an object [`Literal`], rejecting duplicate field names.
    pub fn object(fields: Vec<(Name, Literal)>) -> Result<Self, LiteralError> {
        for (i, (name, _)) in fields.iter().enumerate() {
            if fields[..i].iter().any(|(other, _)| other == name) {
                return Err(LiteralError::DuplicateObjectField(name.to_string()));
            }
        }

        Ok(Self::Object(fields))
    }

    /// Parses a single literal out of its canonical source form.
    ///
    /// Round-trips with [`Literal`]'s [`fmt::Display`]: number literals retain
    /// the exact lexical form they were written with.
    pub fn parse(source: &str) -> Result<Self, LiteralError> {
        let mut tokens = Vec::new();
        for res in Lexer::new(source) {
            match res {
                Ok(t) => tokens.push(t.item),
                Err(_) => return Err(LiteralError::NotALiteral(source.into())),
            }
        }

        let mut pos = 0;
        let value = parse_literal(&tokens, &mut pos)?;

        if tokens.get(pos).map(|t| t != &Token::EndOfFile) == Some(true) {
            return Err(LiteralError::NotALiteral(source.into()));
        }

        Ok(value)
    }

    /// Views the underlying boolean, if this is a boolean literal.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Views the underlying string, if this is a string literal.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl IntLiteral {
    /// The exact source form of this literal.
    pub fn text(&self) -> &str {
        &self.0
    }

    /// The numeric value, if it fits an `i64`.
    pub fn to_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl FloatLiteral {
    /// The exact source form of this literal.
    pub fn text(&self) -> &str {
        &self.0
    }

    /// The numeric value as a binary float.
    pub fn to_f64(&self) -> f64 {
        self.0.parse().unwrap_or(f64::NAN)
    }
}

fn parse_literal(tokens: &[Token<'_>], pos: &mut usize) -> Result<Literal, LiteralError> {
    let not_a_literal = |t: &Token<'_>| LiteralError::NotALiteral(t.to_string());

    let token = tokens.get(*pos).ok_or(LiteralError::NotALiteral("".into()))?;
    *pos += 1;

    match token {
        Token::Name("true") => Ok(Literal::Boolean(true)),
        Token::Name("false") => Ok(Literal::Boolean(false)),
        Token::Name("null") => Ok(Literal::Null),
        Token::Name(name) => Literal::enum_name(name),
        Token::Scalar(ScalarToken::Int(text)) => Literal::int(text),
        Token::Scalar(ScalarToken::Float(text)) => Literal::float(text),
        Token::Scalar(ScalarToken::String(raw)) => {
            // Literal display always re-escapes, so unescaping the two
            // escape forms it emits is enough for a round-trip.
            Ok(Literal::String(raw.replace("\\\"", "\"").replace("\\\\", "\\")))
        }
        Token::BracketOpen => {
            let mut items = Vec::new();
            loop {
                match tokens.get(*pos) {
                    Some(Token::BracketClose) => {
                        *pos += 1;
                        return Ok(Literal::List(items));
                    }
                    Some(_) => items.push(parse_literal(tokens, pos)?),
                    None => return Err(LiteralError::NotALiteral("[".into())),
                }
            }
        }
        Token::CurlyOpen => {
            let mut fields = Vec::new();
            loop {
                match tokens.get(*pos) {
                    Some(Token::CurlyClose) => {
                        *pos += 1;
                        return Literal::object(fields);
                    }
                    Some(Token::Name(key)) => {
                        *pos += 1;
                        match tokens.get(*pos) {
                            Some(Token::Colon) => *pos += 1,
                            Some(t) => return Err(not_a_literal(t)),
                            None => return Err(LiteralError::NotALiteral("{".into())),
                        }
                        let value = parse_literal(tokens, pos)?;
                        fields.push((Name::from(*key), value));
                    }
                    Some(t) => return Err(not_a_literal(t)),
                    None => return Err(LiteralError::NotALiteral("{".into())),
                }
            }
        }
        t => Err(not_a_literal(t)),
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Self::Int(i) => write!(f, "{}", i.text()),
            Self::Float(v) => write!(f, "{}", v.text()),
            Self::Enum(name) => write!(f, "{name}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt(f)?;
                }
                write!(f, "]")
            }
            Self::Object(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
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
