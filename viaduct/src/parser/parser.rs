use derive_more::with_trait::{Display, Error};

use crate::{
    ast::Name,
    parser::{Lexer, LexerError, Spanning, Token},
};

/// Error while parsing a GraphQL source document.
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
pub enum ParseError {
    /// An unexpected token occurred in the source.
    #[display("Unexpected \"{_0}\"")]
    UnexpectedToken(#[error(not(source))] String),

    /// The input source abruptly ended.
    #[display("Unexpected end of input")]
    UnexpectedEndOfFile,

    /// An error during tokenization occurred.
    LexerError(LexerError),
}

impl ParseError {
    /// Creates a [`ParseError::UnexpectedToken`] out of the provided [`Token`].
    #[must_use]
    pub fn unexpected_token(token: Token<'_>) -> Self {
        Self::UnexpectedToken(token.to_string())
    }
}

#[doc(hidden)]
pub type ParseResult<T> = Result<Spanning<T>, Spanning<ParseError>>;

#[doc(hidden)]
pub type UnlocatedParseResult<T> = Result<T, Spanning<ParseError>>;

#[doc(hidden)]
pub type OptionParseResult<T> = Result<Option<T>, Spanning<ParseError>>;

#[doc(hidden)]
#[derive(Debug)]
pub struct Parser<'a> {
    tokens: Vec<Spanning<Token<'a>>>,
}

impl<'a> Parser<'a> {
    #[doc(hidden)]
    pub fn new(lexer: &mut Lexer<'a>) -> Result<Parser<'a>, Spanning<LexerError>> {
        let mut tokens = Vec::new();

        for res in lexer {
            tokens.push(res?);
        }

        Ok(Parser { tokens })
    }

    #[doc(hidden)]
    pub fn parse(source: &'a str) -> Result<Parser<'a>, Spanning<ParseError>> {
        let mut lexer = Lexer::new(source);
        Parser::new(&mut lexer).map_err(|s| s.map(ParseError::LexerError))
    }

    #[doc(hidden)]
    pub fn peek(&self) -> &Spanning<Token<'a>> {
        &self.tokens[0]
    }

    #[doc(hidden)]
    pub fn next_token(&mut self) -> ParseResult<Token<'a>> {
        if self.tokens.len() == 1 {
            Err(Spanning::new(self.peek().span, ParseError::UnexpectedEndOfFile))
        } else {
            Ok(self.tokens.remove(0))
        }
    }

    #[doc(hidden)]
    pub fn expect(&mut self, expected: &Token<'_>) -> ParseResult<Token<'a>> {
        if &self.peek().item != expected {
            Err(self.unexpected_token())
        } else {
            self.next_token()
        }
    }

    #[doc(hidden)]
    pub fn skip(
        &mut self,
        expected: &Token<'_>,
    ) -> Result<Option<Spanning<Token<'a>>>, Spanning<ParseError>> {
        if &self.peek().item == expected {
            Ok(Some(self.next_token()?))
        } else {
            Ok(None)
        }
    }

    #[doc(hidden)]
    pub fn expect_name(&mut self) -> ParseResult<Name> {
        match self.peek().item {
            Token::Name(_) => Ok(self.next_token()?.map(|token| {
                if let Token::Name(name) = token {
                    Name::from(name)
                } else {
                    panic!("Internal parse error in `expect_name`");
                }
            })),
            Token::EndOfFile => Err(Spanning::new(
                self.peek().span,
                ParseError::UnexpectedEndOfFile,
            )),
            _ => Err(self.unexpected_token()),
        }
    }

    #[doc(hidden)]
    pub fn unexpected_token(&self) -> Spanning<ParseError> {
        Spanning::new(self.peek().span, ParseError::unexpected_token(self.peek().item))
    }

    /// Parses a `(`-delimited, non-empty list of `parser` items, returning
    /// their unwrapped values.
    #[doc(hidden)]
    pub fn delimited_nonempty_list<T, F>(
        &mut self,
        opening: &Token<'_>,
        parser: F,
        closing: &Token<'_>,
    ) -> UnlocatedParseResult<Vec<T>>
    where
        F: Fn(&mut Parser<'a>) -> UnlocatedParseResult<T>,
    {
        self.expect(opening)?;

        let mut items = Vec::new();

        loop {
            items.push(parser(self)?);

            if &self.peek().item == closing {
                self.next_token()?;
                return Ok(items);
            }
        }
    }
}
