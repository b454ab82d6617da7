use std::{borrow::Cow, fmt, num::IntErrorKind, str};

use logos::{Lexer, Logos, Skip, Span};

use super::error::ParseErrorKind;
use crate::{lines::LineResolver, MAX_FILE_LEN};

#[derive(Debug, Clone, Logos, PartialEq, Eq)]
#[logos(extras = TokenExtras)]
#[logos(skip r"[\t\n\v\f\r ]+")]
#[logos(subpattern exponent = r"[eE][+\-]?[0-9]+")]
enum RawToken<'a> {
    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'a str),
    #[regex("0", |_| 0)]
    #[regex("0[0-7]+", |lex| int(lex, 8, 1))]
    #[regex("[1-9][0-9]*", |lex| int(lex, 10, 0))]
    #[regex("0[xX][0-9A-Fa-f]+", |lex| int(lex, 16, 2))]
    IntLiteral(u64),
    #[regex(r#"[0-9]+\.[0-9]*(?&exponent)?"#)]
    #[regex(r#"[0-9]+(?&exponent)"#)]
    #[regex(r#"\.[0-9]+(?&exponent)?"#)]
    FloatLiteral,
    #[regex(r#"'|""#, string)]
    StringLiteral(Cow<'a, [u8]>),
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("<")]
    LeftAngleBracket,
    #[token(">")]
    RightAngleBracket,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("/")]
    ForwardSlash,
    #[regex(r#"//[^\n]*"#, logos::skip)]
    #[token("/*", block_comment)]
    Comment,
}

#[derive(Default)]
struct TokenExtras {
    errors: Vec<ParseErrorKind>,
}

/// The category of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    Dot,
    Minus,
    Plus,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    LeftAngleBracket,
    RightAngleBracket,
    Comma,
    Equals,
    Colon,
    Semicolon,
    ForwardSlash,
}

/// A token, along with its position in the source.
///
/// For string literals `text` holds the decoded contents, without quotes. For every other kind it
/// is the exact source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub text: Cow<'a, str>,
    pub int_value: Option<u64>,
    pub line: u32,
    pub span: Span,
}

/// Produces tokens from a source file, one at a time, stopping at the first lexical error.
pub(crate) struct Scanner<'a> {
    lexer: Lexer<'a, RawToken<'a>>,
    lines: LineResolver,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Result<Self, ParseErrorKind> {
        if source.len() as u64 > MAX_FILE_LEN {
            return Err(ParseErrorKind::FileTooLarge);
        }

        Ok(Scanner {
            lexer: RawToken::lexer(source),
            lines: LineResolver::new(source),
        })
    }

    /// Returns the next token, or `None` at the end of the source.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, ParseErrorKind> {
        loop {
            let raw = self.lexer.next();
            if let Some(err) = self.lexer.extras.errors.drain(..).next() {
                return Err(err);
            }

            let span = self.lexer.span();
            let raw = match raw {
                None => return Ok(None),
                Some(Err(())) => return Err(ParseErrorKind::InvalidToken { span }),
                Some(Ok(raw)) => raw,
            };

            let slice = self.lexer.slice();
            let (kind, text, int_value) = match raw {
                RawToken::Ident(ident) => (TokenKind::Ident, Cow::Borrowed(ident), None),
                RawToken::IntLiteral(value) => {
                    (TokenKind::IntLiteral, Cow::Borrowed(slice), Some(value))
                }
                RawToken::FloatLiteral => (TokenKind::FloatLiteral, Cow::Borrowed(slice), None),
                RawToken::StringLiteral(bytes) => {
                    let text = match bytes {
                        Cow::Borrowed(bytes) => str::from_utf8(bytes).map(Cow::Borrowed).ok(),
                        Cow::Owned(bytes) => String::from_utf8(bytes).map(Cow::Owned).ok(),
                    };
                    match text {
                        Some(text) => (TokenKind::StringLiteral, text, None),
                        None => return Err(ParseErrorKind::InvalidUtf8String { span }),
                    }
                }
                RawToken::Dot => (TokenKind::Dot, Cow::Borrowed(slice), None),
                RawToken::Minus => (TokenKind::Minus, Cow::Borrowed(slice), None),
                RawToken::Plus => (TokenKind::Plus, Cow::Borrowed(slice), None),
                RawToken::LeftParen => (TokenKind::LeftParen, Cow::Borrowed(slice), None),
                RawToken::RightParen => (TokenKind::RightParen, Cow::Borrowed(slice), None),
                RawToken::LeftBrace => (TokenKind::LeftBrace, Cow::Borrowed(slice), None),
                RawToken::RightBrace => (TokenKind::RightBrace, Cow::Borrowed(slice), None),
                RawToken::LeftBracket => (TokenKind::LeftBracket, Cow::Borrowed(slice), None),
                RawToken::RightBracket => (TokenKind::RightBracket, Cow::Borrowed(slice), None),
                RawToken::LeftAngleBracket => {
                    (TokenKind::LeftAngleBracket, Cow::Borrowed(slice), None)
                }
                RawToken::RightAngleBracket => {
                    (TokenKind::RightAngleBracket, Cow::Borrowed(slice), None)
                }
                RawToken::Comma => (TokenKind::Comma, Cow::Borrowed(slice), None),
                RawToken::Equals => (TokenKind::Equals, Cow::Borrowed(slice), None),
                RawToken::Colon => (TokenKind::Colon, Cow::Borrowed(slice), None),
                RawToken::Semicolon => (TokenKind::Semicolon, Cow::Borrowed(slice), None),
                RawToken::ForwardSlash => (TokenKind::ForwardSlash, Cow::Borrowed(slice), None),
                RawToken::Comment => continue,
            };

            return Ok(Some(Token {
                kind,
                text,
                int_value,
                line: self.lines.resolve(span.start),
                span,
            }));
        }
    }

    /// The line on which the source ends.
    pub fn last_line(&self) -> u32 {
        self.lines.last_line()
    }
}

impl Token<'_> {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == keyword
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::StringLiteral => write!(f, "\"{}\"", self.text.escape_default()),
            _ => write!(f, "{}", self.text),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident => write!(f, "an identifier"),
            TokenKind::IntLiteral => write!(f, "an integer"),
            TokenKind::FloatLiteral => write!(f, "a float"),
            TokenKind::StringLiteral => write!(f, "a string"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::LeftParen => write!(f, "'('"),
            TokenKind::RightParen => write!(f, "')'"),
            TokenKind::LeftBrace => write!(f, "'{{'"),
            TokenKind::RightBrace => write!(f, "'}}'"),
            TokenKind::LeftBracket => write!(f, "'['"),
            TokenKind::RightBracket => write!(f, "']'"),
            TokenKind::LeftAngleBracket => write!(f, "'<'"),
            TokenKind::RightAngleBracket => write!(f, "'>'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Equals => write!(f, "'='"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Semicolon => write!(f, "';'"),
            TokenKind::ForwardSlash => write!(f, "'/'"),
        }
    }
}

fn int<'a>(lex: &mut Lexer<'a, RawToken<'a>>, radix: u32, prefix_len: usize) -> u64 {
    debug_assert!(lex.slice().len() > prefix_len);
    let span = lex.span().start + prefix_len..lex.span().end;

    match u64::from_str_radix(&lex.source()[span.clone()], radix) {
        Ok(value) => value,
        Err(err) => {
            debug_assert_eq!(err.kind(), &IntErrorKind::PosOverflow);
            lex.extras
                .errors
                .push(ParseErrorKind::IntegerOutOfRange { span: lex.span() });
            Default::default()
        }
    }
}

fn string<'a>(lex: &mut Lexer<'a, RawToken<'a>>) -> Cow<'a, [u8]> {
    #[derive(Logos)]
    #[logos(subpattern hex = r"[0-9A-Fa-f]")]
    enum Component<'a> {
        #[regex(r#"[^\x00\n\\'"]+"#)]
        Unescaped(&'a str),
        #[regex(r#"['"]"#, terminator)]
        Terminator(u8),
        #[regex(r#"\\[xX](?&hex)(?&hex)?"#, hex_escape)]
        #[regex(r#"\\[0-7][0-7]?[0-7]?"#, oct_escape)]
        #[regex(r#"\\[abfnrtv?\\'"]"#, char_escape)]
        Byte(u8),
        #[regex(r#"\\u(?&hex)(?&hex)(?&hex)(?&hex)"#, unicode_escape)]
        #[regex(
            r#"\\U(?&hex)(?&hex)(?&hex)(?&hex)(?&hex)(?&hex)(?&hex)(?&hex)"#,
            unicode_escape
        )]
        Char(char),
    }

    fn terminator<'a>(lex: &mut Lexer<'a, Component<'a>>) -> u8 {
        debug_assert_eq!(lex.slice().len(), 1);
        lex.slice().as_bytes()[0]
    }

    fn hex_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Option<u8> {
        u8::from_str_radix(&lex.slice()[2..], 16).ok()
    }

    fn oct_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Option<u8> {
        u32::from_str_radix(&lex.slice()[1..], 8)
            .ok()
            .and_then(|value| u8::try_from(value).ok())
    }

    fn char_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> u8 {
        match lex.slice().as_bytes()[1] {
            b'a' => b'\x07',
            b'b' => b'\x08',
            b'f' => b'\x0c',
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => b'\x0b',
            // '?', '\\', '\'' and '"' escape to themselves
            ch => ch,
        }
    }

    fn unicode_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Option<char> {
        u32::from_str_radix(&lex.slice()[2..], 16)
            .ok()
            .and_then(char::from_u32)
    }

    let mut result: Option<Cow<'a, [u8]>> = None;

    let mut char_lexer = Component::lexer(lex.remainder());
    let terminator = lex.slice().as_bytes()[0];

    loop {
        match char_lexer.next() {
            Some(Ok(Component::Unescaped(s))) => cow_push_bytes(&mut result, s.as_bytes()),
            Some(Ok(Component::Terminator(t))) if t == terminator => {
                break;
            }
            Some(Ok(Component::Terminator(ch) | Component::Byte(ch))) => {
                result.get_or_insert_with(Cow::default).to_mut().push(ch)
            }
            Some(Ok(Component::Char(ch))) => {
                let mut buf = [0; 4];
                let ch = ch.encode_utf8(&mut buf);
                result
                    .get_or_insert_with(Cow::default)
                    .to_mut()
                    .extend_from_slice(ch.as_bytes())
            }
            Some(Err(())) => {
                let start = lex.span().end + char_lexer.span().start;
                let end = lex.span().end + char_lexer.span().end;

                let err = if char_lexer.slice().contains('\n') {
                    ParseErrorKind::UnterminatedString {
                        span: lex.span().start..start,
                    }
                } else if char_lexer.slice().starts_with('\\') {
                    ParseErrorKind::InvalidStringEscape { span: start..end }
                } else {
                    ParseErrorKind::InvalidStringCharacters { span: start..end }
                };
                lex.extras.errors.push(err);
                break;
            }
            None => {
                lex.extras.errors.push(ParseErrorKind::UnexpectedEof {
                    expected: "string terminator".to_owned(),
                });
                break;
            }
        }
    }

    lex.bump(char_lexer.span().end);
    result.unwrap_or_default()
}

fn block_comment<'a>(lex: &mut Lexer<'a, RawToken<'a>>) -> Skip {
    match lex.remainder().find("*/") {
        Some(end) => lex.bump(end + 2),
        None => {
            lex.extras.errors.push(ParseErrorKind::UnexpectedEof {
                expected: "comment terminator".to_owned(),
            });
            lex.bump(lex.remainder().len());
        }
    }
    Skip
}

fn cow_push_bytes<'a>(cow: &mut Option<Cow<'a, [u8]>>, s: &'a [u8]) {
    match cow {
        Some(cow) => cow.to_mut().extend_from_slice(s),
        None => *cow = Some(Cow::Borrowed(s)),
    }
}
