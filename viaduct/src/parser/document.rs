use crate::{
    ast::{
        Definition, Directive, Document, Field, Fragment, FragmentSpread, InlineFragment,
        InputValue, Name, Operation, OperationType, Selection, TypeRef, VariableDefinition,
    },
    parser::{
        ParseError, Parser, Spanning, Token, UnlocatedParseResult, value::parse_value_literal,
    },
};

/// Parses an executable document: operations and fragment definitions.
pub fn parse_document_source(s: &str) -> UnlocatedParseResult<Document> {
    let mut parser = Parser::parse(s)?;
    parse_document(&mut parser)
}

/// Parses a bare selection-set source: selections (with or without the outer
/// braces) optionally followed by fragment definitions.
///
/// This is the shape required-selection-set strings are written in:
///
/// ```graphql
/// id ...pet fragment pet on Animal { name }
/// ```
pub fn parse_selections_source(
    s: &str,
) -> UnlocatedParseResult<(Vec<Selection>, Vec<Fragment>)> {
    let mut parser = Parser::parse(s)?;

    let selections = if parser.peek().item == Token::CurlyOpen {
        parse_selection_set(&mut parser)?
    } else {
        let mut selections = Vec::new();
        loop {
            match parser.peek().item {
                Token::EndOfFile | Token::Name("fragment") => break,
                _ => selections.push(parse_selection(&mut parser)?),
            }
        }
        selections
    };

    let mut fragments = Vec::new();
    while parser.peek().item != Token::EndOfFile {
        fragments.push(parse_fragment_definition(&mut parser)?);
    }

    Ok((selections, fragments))
}

fn parse_document(parser: &mut Parser<'_>) -> UnlocatedParseResult<Document> {
    let mut defs = Vec::new();

    loop {
        defs.push(parse_definition(parser)?);

        if parser.peek().item == Token::EndOfFile {
            return Ok(defs);
        }
    }
}

fn parse_definition(parser: &mut Parser<'_>) -> UnlocatedParseResult<Definition> {
    match parser.peek().item {
        Token::CurlyOpen | Token::Name("query") | Token::Name("mutation") => {
            Ok(Definition::Operation(parse_operation_definition(parser)?))
        }
        Token::Name("fragment") => Ok(Definition::Fragment(parse_fragment_definition(parser)?)),
        _ => Err(parser.unexpected_token()),
    }
}

fn parse_operation_definition(parser: &mut Parser<'_>) -> UnlocatedParseResult<Operation> {
    if parser.peek().item == Token::CurlyOpen {
        let selection_set = parse_selection_set(parser)?;

        Ok(Operation {
            operation_type: OperationType::Query,
            name: None,
            variable_definitions: Vec::new(),
            directives: Vec::new(),
            selection_set,
        })
    } else {
        let operation_type = parse_operation_type(parser)?;
        let name = match parser.peek().item {
            Token::Name(_) => Some(parser.expect_name()?.item),
            _ => None,
        };
        let variable_definitions = parse_variable_definitions(parser)?;
        let directives = parse_directives(parser)?;
        let selection_set = parse_selection_set(parser)?;

        Ok(Operation {
            operation_type,
            name,
            variable_definitions,
            directives,
            selection_set,
        })
    }
}

fn parse_fragment_definition(parser: &mut Parser<'_>) -> UnlocatedParseResult<Fragment> {
    parser.expect(&Token::Name("fragment"))?;
    let name = parser.expect_name()?;
    if name.item == "on" {
        return Err(Spanning::new(
            name.span,
            ParseError::UnexpectedToken("on".into()),
        ));
    }

    parser.expect(&Token::Name("on"))?;
    let type_condition = parser.expect_name()?.item;
    let directives = parse_directives(parser)?;
    let selection_set = parse_selection_set(parser)?;

    Ok(Fragment {
        name: name.item,
        type_condition,
        directives,
        selection_set,
    })
}

fn parse_selection_set(parser: &mut Parser<'_>) -> UnlocatedParseResult<Vec<Selection>> {
    parser.delimited_nonempty_list(&Token::CurlyOpen, parse_selection, &Token::CurlyClose)
}

fn parse_optional_selection_set(
    parser: &mut Parser<'_>,
) -> UnlocatedParseResult<Vec<Selection>> {
    if parser.peek().item == Token::CurlyOpen {
        parse_selection_set(parser)
    } else {
        Ok(Vec::new())
    }
}

fn parse_selection(parser: &mut Parser<'_>) -> UnlocatedParseResult<Selection> {
    match parser.peek().item {
        Token::Ellipsis => parse_fragment(parser),
        _ => parse_field(parser).map(Selection::Field),
    }
}

fn parse_fragment(parser: &mut Parser<'_>) -> UnlocatedParseResult<Selection> {
    parser.expect(&Token::Ellipsis)?;

    match parser.peek().item {
        Token::Name("on") => {
            parser.next_token()?;
            let type_condition = parser.expect_name()?.item;
            let directives = parse_directives(parser)?;
            let selection_set = parse_selection_set(parser)?;

            Ok(Selection::InlineFragment(InlineFragment {
                type_condition: Some(type_condition),
                directives,
                selection_set,
            }))
        }
        Token::CurlyOpen => {
            let selection_set = parse_selection_set(parser)?;

            Ok(Selection::InlineFragment(InlineFragment {
                type_condition: None,
                directives: Vec::new(),
                selection_set,
            }))
        }
        Token::Name(_) => {
            let name = parser.expect_name()?.item;
            let directives = parse_directives(parser)?;

            Ok(Selection::FragmentSpread(FragmentSpread { name, directives }))
        }
        Token::At => {
            let directives = parse_directives(parser)?;
            let selection_set = parse_selection_set(parser)?;

            Ok(Selection::InlineFragment(InlineFragment {
                type_condition: None,
                directives,
                selection_set,
            }))
        }
        _ => Err(parser.unexpected_token()),
    }
}

fn parse_field(parser: &mut Parser<'_>) -> UnlocatedParseResult<Field> {
    let mut alias = None;
    let mut name = parser.expect_name()?.item;

    if parser.skip(&Token::Colon)?.is_some() {
        alias = Some(name);
        name = parser.expect_name()?.item;
    }

    let arguments = parse_arguments(parser)?;
    let directives = parse_directives(parser)?;
    let selection_set = parse_optional_selection_set(parser)?;

    Ok(Field {
        alias,
        name,
        arguments,
        directives,
        selection_set,
    })
}

fn parse_arguments(parser: &mut Parser<'_>) -> UnlocatedParseResult<Vec<(Name, InputValue)>> {
    if parser.peek().item != Token::ParenOpen {
        return Ok(Vec::new());
    }

    parser.delimited_nonempty_list(&Token::ParenOpen, parse_argument, &Token::ParenClose)
}

fn parse_argument(parser: &mut Parser<'_>) -> UnlocatedParseResult<(Name, InputValue)> {
    let name = parser.expect_name()?.item;
    parser.expect(&Token::Colon)?;
    let value = parse_value_literal(parser)?;

    Ok((name, value))
}

fn parse_operation_type(parser: &mut Parser<'_>) -> UnlocatedParseResult<OperationType> {
    match parser.peek().item {
        Token::Name("query") => {
            parser.next_token()?;
            Ok(OperationType::Query)
        }
        Token::Name("mutation") => {
            parser.next_token()?;
            Ok(OperationType::Mutation)
        }
        _ => Err(parser.unexpected_token()),
    }
}

fn parse_variable_definitions(
    parser: &mut Parser<'_>,
) -> UnlocatedParseResult<Vec<VariableDefinition>> {
    if parser.peek().item != Token::ParenOpen {
        return Ok(Vec::new());
    }

    parser.delimited_nonempty_list(
        &Token::ParenOpen,
        parse_variable_definition,
        &Token::ParenClose,
    )
}

fn parse_variable_definition(
    parser: &mut Parser<'_>,
) -> UnlocatedParseResult<VariableDefinition> {
    parser.expect(&Token::Dollar)?;
    let name = parser.expect_name()?.item;
    parser.expect(&Token::Colon)?;
    let var_type = parse_type(parser)?;

    let default_value = if parser.skip(&Token::Equals)?.is_some() {
        Some(parse_value_literal(parser)?)
    } else {
        None
    };

    Ok(VariableDefinition {
        name,
        var_type,
        default_value,
    })
}

fn parse_directives(parser: &mut Parser<'_>) -> UnlocatedParseResult<Vec<Directive>> {
    let mut directives = Vec::new();

    while parser.peek().item == Token::At {
        parser.next_token()?;
        let name = parser.expect_name()?.item;
        let arguments = parse_arguments(parser)?;

        directives.push(Directive { name, arguments });
    }

    Ok(directives)
}

/// Parses a type reference (`Name`, `[Name!]!`, ...).
pub(crate) fn parse_type(parser: &mut Parser<'_>) -> UnlocatedParseResult<TypeRef> {
    let mut ty = match parser.peek().item {
        Token::BracketOpen => {
            parser.next_token()?;
            let inner = parse_type(parser)?;
            parser.expect(&Token::BracketClose)?;
            inner.list()
        }
        Token::Name(_) => TypeRef::Named(parser.expect_name()?.item),
        _ => return Err(parser.unexpected_token()),
    };

    if parser.skip(&Token::ExclamationMark)?.is_some() {
        ty = ty.non_null();
    }

    Ok(ty)
}
