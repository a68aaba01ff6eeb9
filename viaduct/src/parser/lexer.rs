use std::{fmt, iter::Peekable, str::CharIndices};

use derive_more::with_trait::{Display, Error};

use crate::parser::{SourcePosition, Span, Spanning};

/// Tokenizer for GraphQL source documents.
#[derive(Debug)]
pub struct Lexer<'a> {
    iterator: Peekable<CharIndices<'a>>,
    source: &'a str,
    length: usize,
    position: SourcePosition,
    has_reached_eof: bool,
}

/// A scalar token in the input source.
///
/// Numbers carry their raw source slice so literal lexical forms survive
/// lexing (`3.14` and `3.140` stay distinct).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScalarToken<'a> {
    /// `String` literal with escape sequences still unresolved.
    String(&'a str),

    /// `Float` literal, as written.
    Float(&'a str),

    /// `Int` literal, as written.
    Int(&'a str),
}

/// A single token in the input source.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum Token<'a> {
    Name(&'a str),
    Scalar(ScalarToken<'a>),
    ExclamationMark,
    Dollar,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    CurlyOpen,
    CurlyClose,
    Ellipsis,
    Colon,
    Equals,
    At,
    Pipe,
    Amp,
    EndOfFile,
}

impl fmt::Display for ScalarToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(s) | Self::Float(s) => write!(f, "{s}"),
            Self::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Scalar(s) => write!(f, "{s}"),
            Self::ExclamationMark => write!(f, "!"),
            Self::Dollar => write!(f, "$"),
            Self::ParenOpen => write!(f, "("),
            Self::ParenClose => write!(f, ")"),
            Self::BracketOpen => write!(f, "["),
            Self::BracketClose => write!(f, "]"),
            Self::CurlyOpen => write!(f, "{{"),
            Self::CurlyClose => write!(f, "}}"),
            Self::Ellipsis => write!(f, "..."),
            Self::Colon => write!(f, ":"),
            Self::Equals => write!(f, "="),
            Self::At => write!(f, "@"),
            Self::Pipe => write!(f, "|"),
            Self::Amp => write!(f, "&"),
            Self::EndOfFile => write!(f, "End of file"),
        }
    }
}

/// Error when tokenizing the input source.
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
pub enum LexerError {
    /// An unknown character was found.
    ///
    /// Unknown characters are characters that do not occur anywhere in the
    /// GraphQL language, such as `?` or `%`.
    #[display("Unknown character \"{_0}\"")]
    UnknownCharacter(#[error(not(source))] char),

    /// An unexpected character was found.
    ///
    /// Unexpected characters are characters that _do_ exist in the GraphQL
    /// language, but is not expected at the current position in the document.
    #[display("Unexpected character \"{_0}\"")]
    UnexpectedCharacter(#[error(not(source))] char),

    /// An unterminated string literal was found.
    ///
    /// Apart from forgetting the ending `"`, terminating a string within a
    /// Unicode escape sequence or having a line break in the string also
    /// causes this error.
    #[display("Unterminated string literal")]
    UnterminatedString,

    /// An unknown character in a string literal was found.
    ///
    /// This occurs when an invalid source character is found in a string
    /// literal, such as ASCII control characters.
    #[display("Unknown character \"{_0}\" in string literal")]
    UnknownCharacterInString(#[error(not(source))] char),

    /// An unknown escape sequence in a string literal was found.
    ///
    /// Only a limited set of escape sequences are supported, this is emitted
    /// when e.g. `\l` is parsed.
    #[display("Unknown escape sequence \"{_0}\" in string")]
    UnknownEscapeSequence(#[error(not(source))] String),

    /// The input source was unexpectedly terminated.
    ///
    /// Emitted when the current token requires a succeeding character, but
    /// the source has reached EOF. Emitted when scanning e.g. `"1.`.
    #[display("Unexpected end of input")]
    UnexpectedEndOfFile,

    /// An invalid number literal was found.
    #[display("Invalid number literal")]
    InvalidNumber,
}

pub type LexerResult<'a> = Result<Spanning<Token<'a>>, Spanning<LexerError>>;

impl<'a> Lexer<'a> {
    #[doc(hidden)]
    pub fn new(source: &'a str) -> Lexer<'a> {
        Lexer {
            iterator: source.char_indices().peekable(),
            source,
            length: source.len(),
            position: SourcePosition::new_origin(),
            has_reached_eof: false,
        }
    }

    fn peek_char(&mut self) -> Option<(usize, char)> {
        self.iterator.peek().copied()
    }

    fn next_char(&mut self) -> Option<(usize, char)> {
        let next = self.iterator.next();

        if let Some((_, ch)) = next {
            if ch == '\n' {
                self.position.advance_line();
            } else {
                self.position.advance_col();
            }
        }

        next
    }

    fn emit_single_char(&mut self, t: Token<'a>) -> Spanning<Token<'a>> {
        let start_pos = self.position;

        self.next_char();

        Spanning::single_width(start_pos, t)
    }

    fn scan_over_whitespace(&mut self) {
        while let Some((_, ch)) = self.peek_char() {
            if ch == '\t' || ch == ' ' || ch == '\n' || ch == '\r' || ch == ',' {
                self.next_char();
            } else if ch == '#' {
                self.next_char();

                while let Some((_, ch)) = self.peek_char() {
                    if is_source_char(ch) && (ch == '\n' || ch == '\r') {
                        self.next_char();
                        break;
                    } else if is_source_char(ch) {
                        self.next_char();
                    } else {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn scan_ellipsis(&mut self) -> LexerResult<'a> {
        let start_pos = self.position;

        for _ in 0..3 {
            match self.next_char() {
                Some((_, '.')) => {}
                Some((_, ch)) => {
                    return Err(Spanning::zero_width(
                        self.position,
                        LexerError::UnexpectedCharacter(ch),
                    ));
                }
                None => {
                    return Err(Spanning::zero_width(
                        self.position,
                        LexerError::UnexpectedEndOfFile,
                    ));
                }
            }
        }

        Ok(Spanning::start_end(start_pos, self.position, Token::Ellipsis))
    }

    fn scan_name(&mut self) -> LexerResult<'a> {
        let start_pos = self.position;
        let (start_idx, start_ch) = self
            .next_char()
            .ok_or_else(|| Spanning::zero_width(self.position, LexerError::UnexpectedEndOfFile))?;
        debug_assert!(is_name_start(start_ch));

        let mut end_idx = start_idx;

        while let Some((idx, ch)) = self.peek_char() {
            if is_name_cont(ch) {
                self.next_char();
                end_idx = idx;
            } else {
                break;
            }
        }

        Ok(Spanning::start_end(
            start_pos,
            self.position,
            Token::Name(&self.source[start_idx..=end_idx]),
        ))
    }

    fn scan_string(&mut self) -> LexerResult<'a> {
        let start_pos = self.position;
        let (start_idx, start_ch) = self
            .next_char()
            .ok_or_else(|| Spanning::zero_width(self.position, LexerError::UnexpectedEndOfFile))?;

        if start_ch != '"' {
            return Err(Spanning::zero_width(
                self.position,
                LexerError::UnterminatedString,
            ));
        }

        let mut escaped = false;

        while let Some((idx, ch)) = self.peek_char() {
            match ch {
                'b' | 'f' | 'n' | 'r' | 't' | '\\' | '/' | '"' | 'u' if escaped => {
                    escaped = false;
                    self.next_char();
                }
                c if escaped => {
                    return Err(Spanning::zero_width(
                        self.position,
                        LexerError::UnknownEscapeSequence(format!("\\{c}")),
                    ));
                }
                '\\' => {
                    escaped = true;
                    self.next_char();
                }
                '"' => {
                    self.next_char();

                    return Ok(Spanning::start_end(
                        start_pos,
                        self.position,
                        Token::Scalar(ScalarToken::String(&self.source[start_idx + 1..idx])),
                    ));
                }
                '\n' | '\r' => {
                    return Err(Spanning::zero_width(
                        self.position,
                        LexerError::UnterminatedString,
                    ));
                }
                c if !is_source_char(c) => {
                    return Err(Spanning::zero_width(
                        self.position,
                        LexerError::UnknownCharacterInString(c),
                    ));
                }
                _ => {
                    self.next_char();
                }
            }
        }

        Err(Spanning::zero_width(
            self.position,
            LexerError::UnterminatedString,
        ))
    }

    fn scan_number(&mut self) -> LexerResult<'a> {
        let start_pos = self.position;
        let start_idx = self
            .peek_char()
            .ok_or_else(|| Spanning::zero_width(self.position, LexerError::UnexpectedEndOfFile))?
            .0;

        if let Some((_, '-')) = self.peek_char() {
            self.next_char();
        }

        self.scan_integer_part()?;

        let mut is_float = false;

        if let Some((_, '.')) = self.peek_char() {
            self.next_char();
            self.scan_digits()?;
            is_float = true;
        }

        if let Some((_, ch)) = self.peek_char() {
            if ch == 'e' || ch == 'E' {
                self.next_char();

                if let Some((_, ch)) = self.peek_char() {
                    if ch == '-' || ch == '+' {
                        self.next_char();
                    }
                }
                self.scan_digits()?;
                is_float = true;
            }
        }

        // Everything up to the next unconsumed character belongs to the number.
        let end_idx = self.peek_char().map_or(self.length, |(idx, _)| idx);
        let text = &self.source[start_idx..end_idx];
        let token = if is_float {
            Token::Scalar(ScalarToken::Float(text))
        } else {
            Token::Scalar(ScalarToken::Int(text))
        };

        Ok(Spanning::start_end(start_pos, self.position, token))
    }

    fn scan_integer_part(&mut self) -> Result<(), Spanning<LexerError>> {
        match self.peek_char() {
            Some((_, '0')) => {
                self.next_char();

                match self.peek_char() {
                    Some((_, c)) if c.is_ascii_digit() => {
                        Err(Spanning::zero_width(self.position, LexerError::InvalidNumber))
                    }
                    _ => Ok(()),
                }
            }
            Some((_, c)) if c.is_ascii_digit() => self.scan_digits(),
            Some((_, c)) => Err(Spanning::zero_width(
                self.position,
                LexerError::UnexpectedCharacter(c),
            )),
            None => Err(Spanning::zero_width(
                self.position,
                LexerError::UnexpectedEndOfFile,
            )),
        }
    }

    fn scan_digits(&mut self) -> Result<(), Spanning<LexerError>> {
        match self.peek_char() {
            Some((_, c)) if c.is_ascii_digit() => {
                while let Some((_, ch)) = self.peek_char() {
                    if ch.is_ascii_digit() {
                        self.next_char();
                    } else {
                        break;
                    }
                }
                Ok(())
            }
            Some((_, c)) => Err(Spanning::zero_width(
                self.position,
                LexerError::UnexpectedCharacter(c),
            )),
            None => Err(Spanning::zero_width(
                self.position,
                LexerError::UnexpectedEndOfFile,
            )),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LexerResult<'a>;

    fn next(&mut self) -> Option<LexerResult<'a>> {
        if self.has_reached_eof {
            return None;
        }

        self.scan_over_whitespace();

        let ch = self.peek_char();

        Some(match ch {
            Some((_, '!')) => Ok(self.emit_single_char(Token::ExclamationMark)),
            Some((_, '$')) => Ok(self.emit_single_char(Token::Dollar)),
            Some((_, '(')) => Ok(self.emit_single_char(Token::ParenOpen)),
            Some((_, ')')) => Ok(self.emit_single_char(Token::ParenClose)),
            Some((_, '[')) => Ok(self.emit_single_char(Token::BracketOpen)),
            Some((_, ']')) => Ok(self.emit_single_char(Token::BracketClose)),
            Some((_, '{')) => Ok(self.emit_single_char(Token::CurlyOpen)),
            Some((_, '}')) => Ok(self.emit_single_char(Token::CurlyClose)),
            Some((_, ':')) => Ok(self.emit_single_char(Token::Colon)),
            Some((_, '=')) => Ok(self.emit_single_char(Token::Equals)),
            Some((_, '@')) => Ok(self.emit_single_char(Token::At)),
            Some((_, '|')) => Ok(self.emit_single_char(Token::Pipe)),
            Some((_, '&')) => Ok(self.emit_single_char(Token::Amp)),
            Some((_, '.')) => self.scan_ellipsis(),
            Some((_, '"')) => self.scan_string(),
            Some((_, ch)) if ch == '-' || ch.is_ascii_digit() => self.scan_number(),
            Some((_, ch)) if is_name_start(ch) => self.scan_name(),
            Some((_, ch)) => Err(Spanning::zero_width(
                self.position,
                LexerError::UnknownCharacter(ch),
            )),
            None => {
                self.has_reached_eof = true;
                Ok(Spanning::new(
                    Span::zero_width(self.position),
                    Token::EndOfFile,
                ))
            }
        })
    }
}

fn is_source_char(c: char) -> bool {
    c == '\t' || c == '\n' || c == '\r' || c >= ' '
}

fn is_name_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_name_cont(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}
