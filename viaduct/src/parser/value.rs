use crate::{
    ast::{InputValue, Name},
    parser::{ParseError, Parser, ScalarToken, Spanning, Token, UnlocatedParseResult},
};

/// Parses a single (possibly variable-bearing) input value.
pub fn parse_value_literal(parser: &mut Parser<'_>) -> UnlocatedParseResult<InputValue> {
    match parser.peek().item {
        Token::BracketOpen => parse_list_literal(parser),
        Token::CurlyOpen => parse_object_literal(parser),
        Token::Dollar => parse_variable_literal(parser),
        Token::Scalar(ScalarToken::Int(i)) => {
            let value = i
                .parse::<i64>()
                .map_err(|_| parser.unexpected_token())?;
            parser.next_token()?;
            Ok(InputValue::Int(value))
        }
        Token::Scalar(ScalarToken::Float(f)) => {
            let value = f
                .parse::<f64>()
                .map_err(|_| parser.unexpected_token())?;
            parser.next_token()?;
            Ok(InputValue::Float(value))
        }
        Token::Scalar(ScalarToken::String(_)) => parse_string_literal(parser),
        Token::Name("true") => {
            parser.next_token()?;
            Ok(InputValue::Boolean(true))
        }
        Token::Name("false") => {
            parser.next_token()?;
            Ok(InputValue::Boolean(false))
        }
        Token::Name("null") => {
            parser.next_token()?;
            Ok(InputValue::Null)
        }
        Token::Name(name) => {
            let value = InputValue::enum_value(name);
            parser.next_token()?;
            Ok(value)
        }
        _ => Err(parser.unexpected_token()),
    }
}

fn parse_list_literal(parser: &mut Parser<'_>) -> UnlocatedParseResult<InputValue> {
    parser.expect(&Token::BracketOpen)?;

    let mut items = Vec::new();

    loop {
        if parser.skip(&Token::BracketClose)?.is_some() {
            return Ok(InputValue::List(items));
        }

        items.push(parse_value_literal(parser)?);
    }
}

fn parse_object_literal(parser: &mut Parser<'_>) -> UnlocatedParseResult<InputValue> {
    parser.expect(&Token::CurlyOpen)?;

    let mut fields: Vec<(Name, InputValue)> = Vec::new();

    loop {
        if parser.skip(&Token::CurlyClose)?.is_some() {
            return Ok(InputValue::Object(fields));
        }

        let key = parser.expect_name()?.item;
        parser.expect(&Token::Colon)?;
        let value = parse_value_literal(parser)?;

        fields.push((key, value));
    }
}

fn parse_variable_literal(parser: &mut Parser<'_>) -> UnlocatedParseResult<InputValue> {
    parser.expect(&Token::Dollar)?;
    let name = parser.expect_name()?.item;

    Ok(InputValue::variable(name))
}

fn parse_string_literal(parser: &mut Parser<'_>) -> UnlocatedParseResult<InputValue> {
    let token = parser.next_token()?;

    match token.item {
        Token::Scalar(ScalarToken::String(raw)) => Ok(InputValue::String(unescape_string(
            raw, token.span.start,
        )?)),
        _ => Err(Spanning::new(
            token.span,
            ParseError::unexpected_token(token.item),
        )),
    }
}

/// Resolves escape sequences of a raw string token body.
fn unescape_string(
    raw: &str,
    start: crate::parser::SourcePosition,
) -> Result<String, Spanning<ParseError>> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let mut code = String::with_capacity(4);
                for _ in 0..4 {
                    match chars.next() {
                        Some(c) => code.push(c),
                        None => {
                            return Err(Spanning::zero_width(
                                start,
                                ParseError::UnexpectedEndOfFile,
                            ));
                        }
                    }
                }

                let code_point = u32::from_str_radix(&code, 16).map_err(|_| {
                    Spanning::zero_width(
                        start,
                        ParseError::UnexpectedToken(format!("\\u{code}")),
                    )
                })?;
                out.push(char::from_u32(code_point).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            Some(other) => {
                return Err(Spanning::zero_width(
                    start,
                    ParseError::UnexpectedToken(format!("\\{other}")),
                ));
            }
            None => {
                return Err(Spanning::zero_width(start, ParseError::UnexpectedEndOfFile));
            }
        }
    }

    Ok(out)
}
