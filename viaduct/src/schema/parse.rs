//! Reader for SDL type-system documents.
//!
//! Covers the surface the engine bootstrap and the test harness need: type
//! definitions of all kinds, `schema` root declarations, `extend type`
//! blocks, directive definitions and applied directives. Applied-directive
//! arguments are read straight into [`Literal`]s so their lexical forms
//! survive.

use crate::{
    ast::{Name, TypeRef},
    parser::{
        ParseError, Parser, ScalarToken, Spanning, Token, UnlocatedParseResult, parse_type,
    },
    schema::{
        literal::Literal,
        meta::{
            Argument, DirectiveApplication, EnumMeta, EnumValue, Field, InputObjectMeta,
            InterfaceMeta, MetaType, ObjectMeta, ScalarMeta, UnionMeta,
        },
        model::{DirectiveLocation, DirectiveType, SchemaError, SchemaType},
    },
};

/// Parses an SDL document into a validated [`SchemaType`].
pub(crate) fn parse_schema(source: &str) -> Result<SchemaType, SchemaError> {
    let mut parser = Parser::parse(source)?;

    let mut types: Vec<MetaType> = Vec::new();
    let mut extensions: Vec<Extension> = Vec::new();
    let mut directives: Vec<DirectiveType> = Vec::new();
    let mut query_type_name: Option<Name> = None;
    let mut mutation_type_name: Option<Name> = None;

    while parser.peek().item != Token::EndOfFile {
        let description = parse_description(&mut parser)?;

        match parser.peek().item {
            Token::Name("schema") => {
                let (query, mutation) = parse_schema_roots(&mut parser)?;
                query_type_name = Some(query);
                mutation_type_name = mutation;
            }
            Token::Name("type") => {
                types.push(MetaType::Object(parse_object(&mut parser, description)?));
            }
            Token::Name("interface") => {
                types.push(MetaType::Interface(parse_interface(
                    &mut parser,
                    description,
                )?));
            }
            Token::Name("union") => {
                types.push(MetaType::Union(parse_union(&mut parser, description)?));
            }
            Token::Name("enum") => {
                types.push(MetaType::Enum(parse_enum(&mut parser, description)?));
            }
            Token::Name("input") => {
                types.push(MetaType::InputObject(parse_input_object(
                    &mut parser,
                    description,
                )?));
            }
            Token::Name("scalar") => {
                types.push(MetaType::Scalar(parse_scalar(&mut parser, description)?));
            }
            Token::Name("directive") => {
                directives.push(parse_directive_definition(&mut parser, description)?);
            }
            Token::Name("extend") => {
                extensions.push(parse_extension(&mut parser)?);
            }
            _ => return Err(parser.unexpected_token().into()),
        }
    }

    apply_extensions(&mut types, extensions)?;
    add_builtin_scalars(&mut types);

    let query_type_name = query_type_name.unwrap_or_else(|| arcstr::literal!("Query"));
    let mutation_type_name = mutation_type_name.or_else(|| {
        types
            .iter()
            .find(|t| t.name().as_str() == "Mutation" && t.is_concrete())
            .map(|t| t.name().clone())
    });

    SchemaType::new(types, query_type_name, mutation_type_name, directives)
}

/// An `extend type` block, applied after every base definition is known.
struct Extension {
    target: Name,
    interface_names: Vec<Name>,
    directives: Vec<DirectiveApplication>,
    fields: Vec<Field>,
}

fn apply_extensions(
    types: &mut [MetaType],
    extensions: Vec<Extension>,
) -> Result<(), SchemaError> {
    for ext in extensions {
        let base = types
            .iter_mut()
            .find(|t| t.name() == &ext.target)
            .ok_or_else(|| SchemaError::InvalidExtension {
                name: ext.target.clone(),
                kind: "object",
            })?;

        match base {
            MetaType::Object(m) => {
                m.fields.extend(ext.fields);
                m.interface_names.extend(ext.interface_names);
                m.directives.extend(ext.directives);
            }
            MetaType::Interface(m) => {
                m.fields.extend(ext.fields);
                m.directives.extend(ext.directives);
            }
            _ => {
                return Err(SchemaError::InvalidExtension {
                    name: ext.target,
                    kind: "composite",
                });
            }
        }
    }

    Ok(())
}

fn add_builtin_scalars(types: &mut Vec<MetaType>) {
    for name in ["Int", "Float", "String", "Boolean", "ID"] {
        if !types.iter().any(|t| t.name().as_str() == name) {
            types.push(MetaType::Scalar(ScalarMeta {
                name: Name::from(name),
                description: None,
                directives: Vec::new(),
                position: None,
            }));
        }
    }
}

fn parse_description(parser: &mut Parser<'_>) -> UnlocatedParseResult<Option<String>> {
    match parser.peek().item {
        Token::Scalar(ScalarToken::String(raw)) => {
            let description = raw.to_owned();
            parser.next_token()?;
            Ok(Some(description))
        }
        _ => Ok(None),
    }
}

fn parse_schema_roots(parser: &mut Parser<'_>) -> UnlocatedParseResult<(Name, Option<Name>)> {
    parser.expect(&Token::Name("schema"))?;
    parser.expect(&Token::CurlyOpen)?;

    let mut query = None;
    let mut mutation = None;

    while parser.skip(&Token::CurlyClose)?.is_none() {
        let role = parser.expect_name()?;
        parser.expect(&Token::Colon)?;
        let name = parser.expect_name()?.item;

        match role.item.as_str() {
            "query" => query = Some(name),
            "mutation" => mutation = Some(name),
            // `subscription` roots are accepted and ignored.
            "subscription" => {}
            other => {
                return Err(Spanning::new(
                    role.span,
                    ParseError::UnexpectedToken(other.into()),
                ));
            }
        }
    }

    let query = query.ok_or_else(|| {
        Spanning::new(parser.peek().span, ParseError::UnexpectedEndOfFile)
    })?;

    Ok((query, mutation))
}

fn parse_object(
    parser: &mut Parser<'_>,
    description: Option<String>,
) -> UnlocatedParseResult<ObjectMeta> {
    let start = parser.expect(&Token::Name("type"))?;
    let name = parser.expect_name()?.item;
    let interface_names = parse_implements(parser)?;
    let directives = parse_applied_directives(parser)?;
    let fields = parse_field_definitions(parser)?;

    Ok(ObjectMeta {
        name,
        description,
        fields,
        interface_names,
        directives,
        position: Some(start.span.start),
    })
}

fn parse_interface(
    parser: &mut Parser<'_>,
    description: Option<String>,
) -> UnlocatedParseResult<InterfaceMeta> {
    let start = parser.expect(&Token::Name("interface"))?;
    let name = parser.expect_name()?.item;
    let directives = parse_applied_directives(parser)?;
    let fields = parse_field_definitions(parser)?;

    Ok(InterfaceMeta {
        name,
        description,
        fields,
        directives,
        position: Some(start.span.start),
    })
}

fn parse_union(
    parser: &mut Parser<'_>,
    description: Option<String>,
) -> UnlocatedParseResult<UnionMeta> {
    let start = parser.expect(&Token::Name("union"))?;
    let name = parser.expect_name()?.item;
    let directives = parse_applied_directives(parser)?;
    parser.expect(&Token::Equals)?;

    parser.skip(&Token::Pipe)?;
    let mut of_type_names = vec![parser.expect_name()?.item];
    while parser.skip(&Token::Pipe)?.is_some() {
        of_type_names.push(parser.expect_name()?.item);
    }

    Ok(UnionMeta {
        name,
        description,
        of_type_names,
        directives,
        position: Some(start.span.start),
    })
}

fn parse_enum(
    parser: &mut Parser<'_>,
    description: Option<String>,
) -> UnlocatedParseResult<EnumMeta> {
    let start = parser.expect(&Token::Name("enum"))?;
    let name = parser.expect_name()?.item;
    let directives = parse_applied_directives(parser)?;
    parser.expect(&Token::CurlyOpen)?;

    let mut values = Vec::new();
    while parser.skip(&Token::CurlyClose)?.is_none() {
        parse_description(parser)?;
        let value_name = parser.expect_name()?.item;
        let value_directives = parse_applied_directives(parser)?;
        values.push(EnumValue {
            name: value_name,
            directives: value_directives,
        });
    }

    Ok(EnumMeta {
        name,
        description,
        values,
        directives,
        position: Some(start.span.start),
    })
}

fn parse_input_object(
    parser: &mut Parser<'_>,
    description: Option<String>,
) -> UnlocatedParseResult<InputObjectMeta> {
    let start = parser.expect(&Token::Name("input"))?;
    let name = parser.expect_name()?.item;
    let directives = parse_applied_directives(parser)?;
    parser.expect(&Token::CurlyOpen)?;

    let mut input_fields = Vec::new();
    while parser.skip(&Token::CurlyClose)?.is_none() {
        input_fields.push(parse_argument_definition(parser)?);
    }

    Ok(InputObjectMeta {
        name,
        description,
        input_fields,
        directives,
        position: Some(start.span.start),
    })
}

fn parse_scalar(
    parser: &mut Parser<'_>,
    description: Option<String>,
) -> UnlocatedParseResult<ScalarMeta> {
    let start = parser.expect(&Token::Name("scalar"))?;
    let name = parser.expect_name()?.item;
    let directives = parse_applied_directives(parser)?;

    Ok(ScalarMeta {
        name,
        description,
        directives,
        position: Some(start.span.start),
    })
}

fn parse_directive_definition(
    parser: &mut Parser<'_>,
    description: Option<String>,
) -> UnlocatedParseResult<DirectiveType> {
    parser.expect(&Token::Name("directive"))?;
    parser.expect(&Token::At)?;
    let name = parser.expect_name()?.item;

    let arguments = if parser.peek().item == Token::ParenOpen {
        parser.expect(&Token::ParenOpen)?;
        let mut args = Vec::new();
        while parser.skip(&Token::ParenClose)?.is_none() {
            args.push(parse_argument_definition(parser)?);
        }
        args
    } else {
        Vec::new()
    };

    // `repeatable` is accepted and ignored.
    if parser.peek().item == Token::Name("repeatable") {
        parser.next_token()?;
    }

    parser.expect(&Token::Name("on"))?;

    parser.skip(&Token::Pipe)?;
    let mut locations = vec![parse_directive_location(parser)?];
    while parser.skip(&Token::Pipe)?.is_some() {
        locations.push(parse_directive_location(parser)?);
    }

    Ok(DirectiveType {
        name,
        description,
        locations,
        arguments,
    })
}

fn parse_directive_location(parser: &mut Parser<'_>) -> UnlocatedParseResult<DirectiveLocation> {
    let name = parser.expect_name()?;

    Ok(match name.item.as_str() {
        "QUERY" => DirectiveLocation::Query,
        "MUTATION" => DirectiveLocation::Mutation,
        "FIELD" => DirectiveLocation::Field,
        "FRAGMENT_DEFINITION" => DirectiveLocation::FragmentDefinition,
        "FRAGMENT_SPREAD" => DirectiveLocation::FragmentSpread,
        "INLINE_FRAGMENT" => DirectiveLocation::InlineFragment,
        "OBJECT" => DirectiveLocation::Object,
        "FIELD_DEFINITION" => DirectiveLocation::FieldDefinition,
        "SCALAR" => DirectiveLocation::Scalar,
        "INTERFACE" => DirectiveLocation::Interface,
        "UNION" => DirectiveLocation::Union,
        "ENUM" => DirectiveLocation::Enum,
        "ENUM_VALUE" => DirectiveLocation::EnumValue,
        "INPUT_OBJECT" => DirectiveLocation::InputObject,
        "INPUT_FIELD_DEFINITION" => DirectiveLocation::InputFieldDefinition,
        other => {
            return Err(Spanning::new(
                name.span,
                ParseError::UnexpectedToken(other.into()),
            ));
        }
    })
}

fn parse_extension(parser: &mut Parser<'_>) -> UnlocatedParseResult<Extension> {
    parser.expect(&Token::Name("extend"))?;
    parser.expect(&Token::Name("type"))?;
    let target = parser.expect_name()?.item;
    let interface_names = parse_implements(parser)?;
    let directives = parse_applied_directives(parser)?;

    let fields = if parser.peek().item == Token::CurlyOpen {
        parse_field_definitions(parser)?
    } else {
        Vec::new()
    };

    Ok(Extension {
        target,
        interface_names,
        directives,
        fields,
    })
}

fn parse_implements(parser: &mut Parser<'_>) -> UnlocatedParseResult<Vec<Name>> {
    if parser.peek().item != Token::Name("implements") {
        return Ok(Vec::new());
    }
    parser.next_token()?;

    parser.skip(&Token::Amp)?;
    let mut names = vec![parser.expect_name()?.item];
    while parser.skip(&Token::Amp)?.is_some() {
        names.push(parser.expect_name()?.item);
    }

    Ok(names)
}

fn parse_field_definitions(parser: &mut Parser<'_>) -> UnlocatedParseResult<Vec<Field>> {
    parser.expect(&Token::CurlyOpen)?;

    let mut fields = Vec::new();
    while parser.skip(&Token::CurlyClose)?.is_none() {
        let description = parse_description(parser)?;
        let name = parser.expect_name()?.item;

        let arguments = if parser.peek().item == Token::ParenOpen {
            parser.expect(&Token::ParenOpen)?;
            let mut args = Vec::new();
            while parser.skip(&Token::ParenClose)?.is_none() {
                args.push(parse_argument_definition(parser)?);
            }
            args
        } else {
            Vec::new()
        };

        parser.expect(&Token::Colon)?;
        let field_type = parse_type(parser)?;
        let directives = parse_applied_directives(parser)?;

        fields.push(Field {
            name,
            field_type,
            arguments,
            directives,
            description,
        });
    }

    Ok(fields)
}

fn parse_argument_definition(parser: &mut Parser<'_>) -> UnlocatedParseResult<Argument> {
    let description = parse_description(parser)?;
    let name = parser.expect_name()?.item;
    parser.expect(&Token::Colon)?;
    let arg_type = parse_type(parser)?;

    let default_value = if parser.skip(&Token::Equals)?.is_some() {
        Some(parse_literal_value(parser)?)
    } else {
        None
    };

    Ok(Argument {
        name,
        arg_type,
        default_value,
        description,
    })
}

fn parse_applied_directives(
    parser: &mut Parser<'_>,
) -> UnlocatedParseResult<Vec<DirectiveApplication>> {
    let mut directives = Vec::new();

    while parser.peek().item == Token::At {
        parser.next_token()?;
        let name = parser.expect_name()?.item;

        let arguments = if parser.peek().item == Token::ParenOpen {
            parser.expect(&Token::ParenOpen)?;
            let mut args = Vec::new();
            while parser.skip(&Token::ParenClose)?.is_none() {
                let arg_name = parser.expect_name()?.item;
                parser.expect(&Token::Colon)?;
                args.push((arg_name, parse_literal_value(parser)?));
            }
            args
        } else {
            Vec::new()
        };

        directives.push(DirectiveApplication { name, arguments });
    }

    Ok(directives)
}

/// Parses a constant value into a [`Literal`], keeping number lexical forms.
fn parse_literal_value(parser: &mut Parser<'_>) -> UnlocatedParseResult<Literal> {
    let into_err = |parser: &Parser<'_>, e: crate::schema::literal::LiteralError| {
        Spanning::new(parser.peek().span, ParseError::UnexpectedToken(e.to_string()))
    };

    match parser.peek().item {
        Token::Scalar(ScalarToken::Int(text)) => {
            let lit = Literal::int(text).map_err(|e| into_err(parser, e))?;
            parser.next_token()?;
            Ok(lit)
        }
        Token::Scalar(ScalarToken::Float(text)) => {
            let lit = Literal::float(text).map_err(|e| into_err(parser, e))?;
            parser.next_token()?;
            Ok(lit)
        }
        Token::Scalar(ScalarToken::String(_)) => {
            let token = parser.next_token()?;
            match token.item {
                Token::Scalar(ScalarToken::String(raw)) => {
                    Ok(Literal::String(raw.replace("\\\"", "\"").replace("\\\\", "\\")))
                }
                _ => unreachable!("peeked a string scalar"),
            }
        }
        Token::Name("true") => {
            parser.next_token()?;
            Ok(Literal::Boolean(true))
        }
        Token::Name("false") => {
            parser.next_token()?;
            Ok(Literal::Boolean(false))
        }
        Token::Name("null") => {
            parser.next_token()?;
            Ok(Literal::Null)
        }
        Token::Name(name) => {
            let lit = Literal::enum_name(name).map_err(|e| into_err(parser, e))?;
            parser.next_token()?;
            Ok(lit)
        }
        Token::BracketOpen => {
            parser.next_token()?;
            let mut items = Vec::new();
            while parser.skip(&Token::BracketClose)?.is_none() {
                items.push(parse_literal_value(parser)?);
            }
            Ok(Literal::List(items))
        }
        Token::CurlyOpen => {
            parser.next_token()?;
            let mut fields = Vec::new();
            while parser.skip(&Token::CurlyClose)?.is_none() {
                let key = parser.expect_name()?.item;
                parser.expect(&Token::Colon)?;
                fields.push((key, parse_literal_value(parser)?));
            }
            Literal::object(fields).map_err(|e| into_err(parser, e))
        }
        _ => Err(parser.unexpected_token()),
    }
}
