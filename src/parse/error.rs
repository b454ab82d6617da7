use std::fmt;

use logos::Span;
use miette::{Diagnostic, NamedSource};
use thiserror::Error;

use crate::{lines::LineResolver, MAX_MESSAGE_FIELD_NUMBER};

/// An error that may occur while parsing a protobuf source file.
///
/// Parsing stops at the first error, so each failed file produces exactly one of these.
#[derive(Error, Diagnostic)]
#[error("{}", kind)]
#[diagnostic(forward(kind))]
pub struct ParseError {
    kind: Box<ParseErrorKind>,
    file: String,
    line: u32,
    #[source_code]
    source_code: NamedSource,
}

#[derive(Error, Debug, Diagnostic, PartialEq)]
pub(crate) enum ParseErrorKind {
    #[error("invalid token")]
    InvalidToken {
        #[label("found here")]
        span: Span,
    },
    #[error("integer is too large")]
    IntegerOutOfRange {
        #[label("integer defined here")]
        span: Span,
    },
    #[error("invalid string character")]
    InvalidStringCharacters {
        #[label("invalid characters")]
        span: Span,
    },
    #[error("unterminated string")]
    UnterminatedString {
        #[label("string starts here")]
        span: Span,
    },
    #[error("invalid string escape")]
    InvalidStringEscape {
        #[label("defined here")]
        span: Span,
    },
    #[error("string is not valid utf-8")]
    InvalidUtf8String {
        #[label("defined here")]
        span: Span,
    },
    #[error("unknown syntax '{syntax}'")]
    #[diagnostic(help("possible values are 'proto2' and 'proto3'"))]
    UnknownSyntax {
        syntax: String,
        #[label("defined here")]
        span: Span,
    },
    #[error("multiple package names specified")]
    DuplicatePackage {
        #[label("defined here…")]
        first: Span,
        #[label("…and again here")]
        second: Span,
    },
    #[error("expected {expected}, but found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        #[label("found here")]
        span: Span,
    },
    #[error("expected {expected}, but reached end of file")]
    UnexpectedEof { expected: String },
    #[error("message numbers must be between 1 and {}", MAX_MESSAGE_FIELD_NUMBER)]
    InvalidMessageNumber {
        #[label("defined here")]
        span: Span,
    },
    #[error("enum numbers must be between {} and {}", i32::MIN, i32::MAX)]
    InvalidEnumNumber {
        #[label("defined here")]
        span: Span,
    },
    #[error("messages may not be nested more than {limit} levels deep")]
    NestingTooDeep {
        limit: usize,
        #[label("defined here")]
        span: Span,
    },
    #[error("file is too large")]
    #[diagnostic(help("the maximum file length is 2,147,483,647 bytes"))]
    FileTooLarge,
}

impl ParseErrorKind {
    /// Gets the primary source code span associated with this error, if any.
    pub(crate) fn span(&self) -> Option<Span> {
        match self {
            ParseErrorKind::InvalidToken { span }
            | ParseErrorKind::IntegerOutOfRange { span }
            | ParseErrorKind::InvalidStringCharacters { span }
            | ParseErrorKind::UnterminatedString { span }
            | ParseErrorKind::InvalidStringEscape { span }
            | ParseErrorKind::InvalidUtf8String { span }
            | ParseErrorKind::UnknownSyntax { span, .. }
            | ParseErrorKind::UnexpectedToken { span, .. }
            | ParseErrorKind::InvalidMessageNumber { span }
            | ParseErrorKind::InvalidEnumNumber { span }
            | ParseErrorKind::NestingTooDeep { span, .. } => Some(span.clone()),
            ParseErrorKind::DuplicatePackage { second, .. } => Some(second.clone()),
            ParseErrorKind::UnexpectedEof { .. } | ParseErrorKind::FileTooLarge => None,
        }
    }
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, name: &str, source: &str) -> Self {
        let lines = LineResolver::new(source);
        let line = match kind.span() {
            Some(span) => lines.resolve(span.start),
            None if kind == ParseErrorKind::FileTooLarge => 0,
            None => lines.last_line(),
        };

        ParseError {
            kind: Box::new(kind),
            file: name.to_owned(),
            line,
            source_code: NamedSource::new(name, source.to_owned()),
        }
    }

    #[cfg(test)]
    pub(crate) fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Gets the name of the file in which this error occurred.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Gets the 1-based line on which this error occurred.
    ///
    /// Errors that occur at the end of the file are reported on its last line. Errors that are not
    /// associated with any position, such as the file being too large, return `0`.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Gets the primary source code span associated with this error, if any.
    pub fn span(&self) -> Option<Span> {
        self.kind.span()
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line != 0 {
            write!(f, "{}:{}: ", self.file, self.line)?;
        } else {
            write!(f, "{}: ", self.file)?;
        }

        write!(f, "{}", self)
    }
}
