//! The schema grammar, producing one package tree per file.

mod error;
mod lex;

use logos::Span;

pub use self::error::ParseError;
pub(crate) use self::error::ParseErrorKind;

use self::lex::{Scanner, Token, TokenKind};
use crate::{
    case::{group_field_name, map_entry_name},
    file::Syntax,
    Label, NodeBuilder, NodeFlags, NodeKind, ProtoNode, DEFAULT_MAX_NESTING_DEPTH,
    MAX_MESSAGE_FIELD_NUMBER,
};

/// The name given to the node holding a field's options.
pub(crate) const OPTIONS_NODE_NAME: &str = "options";

/// The result of successfully parsing a single schema file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    syntax: Syntax,
    package: ProtoNode,
    imports: Vec<String>,
}

/// Parses a single schema file.
///
/// The returned package tree contains every top-level declaration of the file. Imports are
/// recorded but not followed; use a [`DescriptorPool`](crate::DescriptorPool) to load them.
///
/// # Examples
///
/// ```
/// # use protoschema::{parse, NodeKind, Syntax};
/// let file = parse("foo.proto", "syntax = 'proto3'; package foo; message Foo { map<string, int32> counts = 1; }").unwrap();
/// assert_eq!(file.syntax(), Syntax::Proto3);
/// assert_eq!(file.package_name(), "foo");
///
/// let counts = file.package().children()[0].find_child_by_name("counts").unwrap();
/// assert_eq!(counts.kind(), NodeKind::MapField);
/// assert_eq!(counts.type_ref(), Some("CountsEntry"));
///
/// let err = parse("bar.proto", "message {}").unwrap_err();
/// assert_eq!(err.to_string(), "expected an identifier, but found '{'");
/// assert_eq!(err.line(), 1);
/// ```
pub fn parse(name: &str, source: &str) -> Result<ParsedFile, ParseError> {
    parse_with_limit(name, source, DEFAULT_MAX_NESTING_DEPTH)
}

pub(crate) fn parse_with_limit(
    name: &str,
    source: &str,
    max_depth: usize,
) -> Result<ParsedFile, ParseError> {
    let scanner = Scanner::new(source).map_err(|kind| ParseError::new(kind, name, source))?;
    let mut parser = Parser::new(scanner, max_depth);
    match parser.parse_file() {
        Ok(file) if parser.error.is_none() => Ok(file),
        _ => {
            debug_assert!(parser.error.is_some());
            let kind = parser
                .error
                .take()
                .unwrap_or_else(|| ParseErrorKind::UnexpectedEof {
                    expected: "a definition".to_owned(),
                });
            Err(ParseError::new(kind, name, source))
        }
    }
}

impl ParsedFile {
    /// The syntax version declared by the file.
    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// The package declared by the file, or the empty string if there was no package statement.
    pub fn package_name(&self) -> &str {
        self.package.name()
    }

    /// The names of the files imported by this file, in the order they were declared.
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// The package tree holding this file's declarations.
    pub fn package(&self) -> &ProtoNode {
        &self.package
    }

    pub(crate) fn into_parts(self) -> (Syntax, ProtoNode, Vec<String>) {
        (self.syntax, self.package, self.imports)
    }
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    peek: Option<Token<'a>>,
    error: Option<ParseErrorKind>,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn new(scanner: Scanner<'a>, max_depth: usize) -> Self {
        Parser {
            scanner,
            peek: None,
            error: None,
            depth: 0,
            max_depth,
        }
    }

    fn parse_file(&mut self) -> Result<ParsedFile, ()> {
        let syntax = self.parse_syntax()?;

        let mut package = ProtoNode::builder(NodeKind::Package);
        let mut package_name: Option<(String, Span, u32)> = None;
        let mut imports = Vec::new();

        loop {
            match self.peek() {
                Some(tok) if tok.is(TokenKind::Semicolon) => self.bump(),
                Some(tok) if tok.is_keyword("import") => imports.push(self.parse_import()?),
                Some(tok) if tok.is_keyword("package") => {
                    let (name, span) = self.parse_package()?;
                    if let Some((_, first, _)) = &package_name {
                        self.add_error(ParseErrorKind::DuplicatePackage {
                            first: first.clone(),
                            second: span,
                        });
                        return Err(());
                    }
                    package_name = Some((name, span, tok.line));
                }
                Some(tok) if tok.is_keyword("option") => self.parse_option_statement()?,
                Some(tok) if tok.is_keyword("message") => {
                    let message = self.parse_message()?;
                    package.add_child(message);
                }
                Some(tok) if tok.is_keyword("enum") => {
                    let enum_ = self.parse_enum()?;
                    package.add_child(enum_);
                }
                Some(tok) if tok.is_keyword("service") => {
                    let service = self.parse_service()?;
                    package.add_child(service);
                }
                Some(tok) if tok.is_keyword("extend") => {
                    let extend = self.parse_extend()?;
                    package.add_child(extend);
                }
                Some(_) => self.unexpected_token(
                    "'enum', 'extend', 'import', 'message', 'option', 'package', 'service' or ';'",
                )?,
                None => break,
            }
        }

        let package = match package_name {
            Some((name, _, line)) => package.line(line).finish(name),
            None => package.finish(""),
        };

        Ok(ParsedFile {
            syntax,
            package,
            imports,
        })
    }

    fn parse_syntax(&mut self) -> Result<Syntax, ()> {
        if !self.bump_if_keyword("syntax") {
            return Ok(Syntax::Proto2);
        }

        self.expect_kind(TokenKind::Equals)?;
        let tok = self.expect_kind(TokenKind::StringLiteral)?;
        let syntax = match tok.text.as_ref() {
            "proto2" => Syntax::Proto2,
            "proto3" => Syntax::Proto3,
            _ => {
                self.add_error(ParseErrorKind::UnknownSyntax {
                    syntax: tok.text.into_owned(),
                    span: tok.span,
                });
                return Err(());
            }
        };
        self.expect_kind(TokenKind::Semicolon)?;

        Ok(syntax)
    }

    fn parse_import(&mut self) -> Result<String, ()> {
        self.expect_keyword("import")?;
        let _ = self.bump_if_keyword("weak") || self.bump_if_keyword("public");
        let name = self.parse_string()?;
        self.expect_kind(TokenKind::Semicolon)?;
        Ok(name)
    }

    fn parse_package(&mut self) -> Result<(String, Span), ()> {
        self.expect_keyword("package")?;
        let name = self.parse_full_ident()?;
        self.expect_kind(TokenKind::Semicolon)?;
        Ok(name)
    }

    fn parse_message(&mut self) -> Result<ProtoNode, ()> {
        let keyword = self.expect_keyword("message")?;
        let name = self.parse_ident()?;

        let mut message = ProtoNode::builder(NodeKind::Message).line(keyword.line);
        self.parse_message_body(&mut message, keyword.span)?;
        Ok(message.finish(name))
    }

    fn parse_message_body(&mut self, message: &mut NodeBuilder, span: Span) -> Result<(), ()> {
        self.enter(span)?;
        self.expect_kind(TokenKind::LeftBrace)?;

        loop {
            match self.peek() {
                Some(tok) if tok.is(TokenKind::RightBrace) => {
                    self.bump();
                    break;
                }
                Some(tok) if tok.is(TokenKind::Semicolon) => self.bump(),
                Some(tok) if tok.is_keyword("message") => {
                    let nested = self.parse_message()?;
                    message.add_child(nested);
                }
                Some(tok) if tok.is_keyword("enum") => {
                    let enum_ = self.parse_enum()?;
                    message.add_child(enum_);
                }
                Some(tok) if tok.is_keyword("extend") => {
                    let extend = self.parse_extend()?;
                    message.add_child(extend);
                }
                Some(tok) if tok.is_keyword("oneof") => self.parse_oneof(message)?,
                Some(tok) if tok.is_keyword("map") => {
                    let map = self.parse_map()?;
                    message.add_child(map);
                }
                Some(tok) if tok.is_keyword("option") => self.parse_option_statement()?,
                Some(tok) if tok.is_keyword("reserved") => self.parse_reserved()?,
                Some(tok) if tok.is_keyword("extensions") => self.parse_extensions()?,
                Some(tok) if is_field_start_token(&tok) => {
                    let label = self.parse_label();
                    let (field, group) = self.parse_field(label, tok.line)?;
                    if let Some(group) = group {
                        message.add_child(group);
                    }
                    message.add_child(field);
                }
                _ => self.unexpected_token("a message field, '}' or ';'")?,
            }
        }

        self.depth -= 1;
        Ok(())
    }

    fn parse_label(&mut self) -> Option<Label> {
        let label = match self.peek() {
            Some(tok) if tok.is_keyword("optional") => Label::Optional,
            Some(tok) if tok.is_keyword("required") => Label::Required,
            Some(tok) if tok.is_keyword("repeated") => Label::Repeated,
            _ => return None,
        };
        self.bump();
        Some(label)
    }

    /// Parses a field or group after its label. For groups, the message declared by the group
    /// body is returned alongside the field.
    fn parse_field(
        &mut self,
        label: Option<Label>,
        line: u32,
    ) -> Result<(ProtoNode, Option<ProtoNode>), ()> {
        if let Some(keyword) = self.next_if(|tok| tok.is_keyword("group")) {
            let (field, group) = self.parse_group(label, line, keyword.span)?;
            return Ok((field, Some(group)));
        }

        let type_ref = self.parse_type_name()?;
        let name = self.parse_ident()?;
        self.expect_kind(TokenKind::Equals)?;
        let number = self.parse_field_number()?;
        let options = self.parse_field_options()?;
        self.expect_kind(TokenKind::Semicolon)?;

        let mut field = ProtoNode::builder(NodeKind::Field)
            .line(line)
            .label(label)
            .type_ref(type_ref)
            .number(number);
        if let Some(options) = options {
            field.add_child(options);
        }
        Ok((field.finish(name), None))
    }

    fn parse_group(
        &mut self,
        label: Option<Label>,
        line: u32,
        span: Span,
    ) -> Result<(ProtoNode, ProtoNode), ()> {
        let name = self.parse_ident()?;
        self.expect_kind(TokenKind::Equals)?;
        let number = self.parse_field_number()?;
        let options = self.parse_field_options()?;

        let mut body = ProtoNode::builder(NodeKind::Message).line(line);
        self.parse_message_body(&mut body, span)?;

        let mut field = ProtoNode::builder(NodeKind::Field)
            .line(line)
            .label(label)
            .type_ref(name.clone())
            .number(number)
            .flags(NodeFlags {
                group: true,
                ..Default::default()
            });
        if let Some(options) = options {
            field.add_child(options);
        }

        Ok((field.finish(group_field_name(&name)), body.finish(name)))
    }

    fn parse_map(&mut self) -> Result<ProtoNode, ()> {
        let keyword = self.expect_keyword("map")?;
        self.expect_kind(TokenKind::LeftAngleBracket)?;
        let key_type = self.parse_ident()?;
        self.expect_kind(TokenKind::Comma)?;
        let value_type = self.parse_type_name()?;
        self.expect_kind(TokenKind::RightAngleBracket)?;

        let name = self.parse_ident()?;
        self.expect_kind(TokenKind::Equals)?;
        let number = self.parse_field_number()?;
        // The entry type has exactly two fields, so map options are not kept.
        let _ = self.parse_field_options()?;
        self.expect_kind(TokenKind::Semicolon)?;

        let mut map = ProtoNode::builder(NodeKind::MapField)
            .line(keyword.line)
            .label(Some(Label::Repeated))
            .type_ref(map_entry_name(&name))
            .number(number);
        map.add_child(
            ProtoNode::builder(NodeKind::Field)
                .type_ref(key_type)
                .number(1)
                .finish("key"),
        );
        map.add_child(
            ProtoNode::builder(NodeKind::Field)
                .type_ref(value_type)
                .number(2)
                .finish("value"),
        );
        Ok(map.finish(name))
    }

    fn parse_oneof(&mut self, message: &mut NodeBuilder) -> Result<(), ()> {
        let keyword = self.expect_keyword("oneof")?;
        let name = self.parse_ident()?;
        self.expect_kind(TokenKind::LeftBrace)?;

        let mut oneof = ProtoNode::builder(NodeKind::Oneof).line(keyword.line);
        loop {
            match self.peek() {
                Some(tok) if tok.is(TokenKind::RightBrace) => {
                    self.bump();
                    break;
                }
                Some(tok) if tok.is(TokenKind::Semicolon) => self.bump(),
                Some(tok) if tok.is_keyword("option") => self.parse_option_statement()?,
                Some(tok) if is_field_start_token(&tok) => {
                    let (field, group) = self.parse_field(None, tok.line)?;
                    if let Some(group) = group {
                        message.add_child(group);
                    }
                    oneof.add_child(field);
                }
                _ => self.unexpected_token("a oneof field, 'option', '}' or ';'")?,
            }
        }

        message.add_child(oneof.finish(name));
        Ok(())
    }

    fn parse_extend(&mut self) -> Result<ProtoNode, ()> {
        let keyword = self.expect_keyword("extend")?;
        let extendee = self.parse_type_name()?;

        self.enter(keyword.span)?;
        self.expect_kind(TokenKind::LeftBrace)?;

        let mut extend = ProtoNode::builder(NodeKind::Message)
            .line(keyword.line)
            .type_ref(extendee.clone());
        loop {
            match self.peek() {
                Some(tok) if tok.is(TokenKind::RightBrace) => {
                    self.bump();
                    break;
                }
                Some(tok) if tok.is(TokenKind::Semicolon) => self.bump(),
                Some(tok) if is_field_start_token(&tok) => {
                    let label = self.parse_label();
                    let (field, group) = self.parse_field(label, tok.line)?;
                    if let Some(group) = group {
                        extend.add_child(group);
                    }
                    extend.add_child(field);
                }
                _ => self.unexpected_token("an extension field, '}' or ';'")?,
            }
        }

        self.depth -= 1;
        Ok(extend.finish(format!("{}Extend", extendee)))
    }

    fn parse_enum(&mut self) -> Result<ProtoNode, ()> {
        let keyword = self.expect_keyword("enum")?;
        let name = self.parse_ident()?;
        self.expect_kind(TokenKind::LeftBrace)?;

        let mut enum_ = ProtoNode::builder(NodeKind::Enum).line(keyword.line);
        loop {
            match self.peek() {
                Some(tok) if tok.is(TokenKind::RightBrace) => {
                    self.bump();
                    break;
                }
                Some(tok) if tok.is(TokenKind::Semicolon) => self.bump(),
                Some(tok) if tok.is_keyword("option") => self.parse_option_statement()?,
                Some(tok) if tok.is_keyword("reserved") => self.parse_reserved()?,
                Some(tok) if tok.is(TokenKind::Ident) => {
                    let value = self.parse_enum_value()?;
                    enum_.add_child(value);
                }
                _ => self.unexpected_token("an identifier, '}' or ';'")?,
            }
        }

        Ok(enum_.finish(name))
    }

    fn parse_enum_value(&mut self) -> Result<ProtoNode, ()> {
        let name = self.expect_kind(TokenKind::Ident)?;
        self.expect_kind(TokenKind::Equals)?;
        let number = self.parse_enum_number()?;
        // Enum value options have no effect on decoding.
        let _ = self.parse_field_options()?;
        self.expect_kind(TokenKind::Semicolon)?;

        Ok(ProtoNode::builder(NodeKind::EnumValue)
            .line(name.line)
            .number(number)
            .finish(name.text))
    }

    fn parse_service(&mut self) -> Result<ProtoNode, ()> {
        let keyword = self.expect_keyword("service")?;
        let name = self.parse_ident()?;
        self.expect_kind(TokenKind::LeftBrace)?;

        let mut service = ProtoNode::builder(NodeKind::Service).line(keyword.line);
        loop {
            match self.peek() {
                Some(tok) if tok.is(TokenKind::RightBrace) => {
                    self.bump();
                    break;
                }
                Some(tok) if tok.is(TokenKind::Semicolon) => self.bump(),
                Some(tok) if tok.is_keyword("option") => self.parse_option_statement()?,
                Some(tok) if tok.is_keyword("rpc") => {
                    let method = self.parse_rpc()?;
                    service.add_child(method);
                }
                Some(tok) if tok.is_keyword("stream") => {
                    let method = self.parse_stream()?;
                    service.add_child(method);
                }
                _ => self.unexpected_token("'rpc', 'stream', 'option', '}' or ';'")?,
            }
        }

        Ok(service.finish(name))
    }

    fn parse_rpc(&mut self) -> Result<ProtoNode, ()> {
        let keyword = self.expect_keyword("rpc")?;
        let name = self.parse_ident()?;

        self.expect_kind(TokenKind::LeftParen)?;
        let client_streaming = self.bump_if_keyword("stream");
        let input = self.parse_type_name()?;
        self.expect_kind(TokenKind::RightParen)?;

        self.expect_keyword("returns")?;

        self.expect_kind(TokenKind::LeftParen)?;
        let server_streaming = self.bump_if_keyword("stream");
        let output = self.parse_type_name()?;
        self.expect_kind(TokenKind::RightParen)?;

        self.parse_method_end()?;

        Ok(ProtoNode::builder(NodeKind::Method)
            .line(keyword.line)
            .type_ref(input)
            .response_type(output)
            .flags(NodeFlags {
                client_streaming,
                server_streaming,
                group: false,
            })
            .finish(name))
    }

    /// Parses the legacy `stream Name (Input, Output)` declaration, which streams in both directions.
    fn parse_stream(&mut self) -> Result<ProtoNode, ()> {
        let keyword = self.expect_keyword("stream")?;
        let name = self.parse_ident()?;

        self.expect_kind(TokenKind::LeftParen)?;
        let input = self.parse_type_name()?;
        self.expect_kind(TokenKind::Comma)?;
        let output = self.parse_type_name()?;
        self.expect_kind(TokenKind::RightParen)?;

        self.parse_method_end()?;

        Ok(ProtoNode::builder(NodeKind::Method)
            .line(keyword.line)
            .type_ref(input)
            .response_type(output)
            .flags(NodeFlags {
                client_streaming: true,
                server_streaming: true,
                group: false,
            })
            .finish(name))
    }

    fn parse_method_end(&mut self) -> Result<(), ()> {
        match self.peek() {
            Some(tok) if tok.is(TokenKind::Semicolon) => {
                self.bump();
                Ok(())
            }
            Some(tok) if tok.is(TokenKind::LeftBrace) => {
                self.bump();
                loop {
                    match self.peek() {
                        Some(tok) if tok.is(TokenKind::RightBrace) => {
                            self.bump();
                            return Ok(());
                        }
                        Some(tok) if tok.is(TokenKind::Semicolon) => self.bump(),
                        Some(tok) if tok.is_keyword("option") => self.parse_option_statement()?,
                        _ => self.unexpected_token("'option', '}' or ';'")?,
                    }
                }
            }
            _ => self.unexpected_token("';' or '{'"),
        }
    }

    fn parse_reserved(&mut self) -> Result<(), ()> {
        self.expect_keyword("reserved")?;
        match self.peek() {
            Some(tok) if tok.is(TokenKind::StringLiteral) => loop {
                self.parse_string()?;
                if !self.bump_if_kind(TokenKind::Comma) {
                    break;
                }
            },
            Some(tok) if tok.is(TokenKind::Ident) => loop {
                self.parse_ident()?;
                if !self.bump_if_kind(TokenKind::Comma) {
                    break;
                }
            },
            _ => self.parse_ranges()?,
        }
        self.expect_kind(TokenKind::Semicolon)?;
        Ok(())
    }

    fn parse_extensions(&mut self) -> Result<(), ()> {
        self.expect_keyword("extensions")?;
        self.parse_ranges()?;
        let _ = self.parse_field_options()?;
        self.expect_kind(TokenKind::Semicolon)?;
        Ok(())
    }

    fn parse_ranges(&mut self) -> Result<(), ()> {
        loop {
            self.parse_range_bound()?;
            if self.bump_if_keyword("to") && !self.bump_if_keyword("max") {
                self.parse_range_bound()?;
            }
            if !self.bump_if_kind(TokenKind::Comma) {
                return Ok(());
            }
        }
    }

    fn parse_range_bound(&mut self) -> Result<(), ()> {
        self.parse_sign();
        self.expect_kind(TokenKind::IntLiteral)?;
        Ok(())
    }

    fn parse_field_number(&mut self) -> Result<i64, ()> {
        let sign = self.parse_sign();
        let tok = self.expect_kind(TokenKind::IntLiteral)?;
        let negative = sign.as_ref().map_or(false, |sign| sign.is(TokenKind::Minus));

        match tok.int_value {
            Some(value)
                if !negative && (1..=MAX_MESSAGE_FIELD_NUMBER as u64).contains(&value) =>
            {
                Ok(value as i64)
            }
            _ => {
                let start = sign.map_or(tok.span.start, |sign| sign.span.start);
                self.add_error(ParseErrorKind::InvalidMessageNumber {
                    span: start..tok.span.end,
                });
                Err(())
            }
        }
    }

    fn parse_enum_number(&mut self) -> Result<i64, ()> {
        let sign = self.parse_sign();
        let tok = self.expect_kind(TokenKind::IntLiteral)?;

        let magnitude = i128::from(tok.int_value.unwrap_or_default());
        let value = match &sign {
            Some(sign) if sign.is(TokenKind::Minus) => -magnitude,
            _ => magnitude,
        };
        match i32::try_from(value) {
            Ok(value) => Ok(value.into()),
            Err(_) => {
                let start = sign.map_or(tok.span.start, |sign| sign.span.start);
                self.add_error(ParseErrorKind::InvalidEnumNumber {
                    span: start..tok.span.end,
                });
                Err(())
            }
        }
    }

    fn parse_sign(&mut self) -> Option<Token<'a>> {
        self.next_if(|tok| tok.is(TokenKind::Minus) || tok.is(TokenKind::Plus))
    }

    fn parse_option_statement(&mut self) -> Result<(), ()> {
        self.expect_keyword("option")?;
        self.parse_option_body()?;
        self.expect_kind(TokenKind::Semicolon)?;
        Ok(())
    }

    fn parse_field_options(&mut self) -> Result<Option<ProtoNode>, ()> {
        let open = match self.next_if(|tok| tok.is(TokenKind::LeftBracket)) {
            Some(open) => open,
            None => return Ok(None),
        };

        let mut options = ProtoNode::builder(NodeKind::Options).line(open.line);
        loop {
            let option = self.parse_option_body()?;
            options.add_child(option);

            match self.peek() {
                Some(tok) if tok.is(TokenKind::Comma) => self.bump(),
                Some(tok) if tok.is(TokenKind::RightBracket) => {
                    self.bump();
                    break;
                }
                _ => self.unexpected_token("',' or ']'")?,
            }
        }

        Ok(Some(options.finish(OPTIONS_NODE_NAME)))
    }

    fn parse_option_body(&mut self) -> Result<ProtoNode, ()> {
        let line = match self.peek() {
            Some(tok) => tok.line,
            None => self.scanner.last_line(),
        };
        let name = self.parse_option_name()?;
        self.expect_kind(TokenKind::Equals)?;
        let value = self.parse_constant()?;

        Ok(ProtoNode::builder(NodeKind::Option)
            .line(line)
            .value(value)
            .finish(name))
    }

    fn parse_option_name(&mut self) -> Result<String, ()> {
        let mut name = String::new();
        loop {
            match self.peek() {
                Some(tok) if tok.is(TokenKind::LeftParen) => {
                    self.bump();
                    name.push('(');
                    name.push_str(&self.parse_type_name()?);
                    self.expect_kind(TokenKind::RightParen)?;
                    name.push(')');
                }
                Some(tok) if tok.is(TokenKind::Ident) => {
                    self.bump();
                    name.push_str(&tok.text);
                }
                _ => self.unexpected_token("an identifier or '('")?,
            }

            if !self.bump_if_kind(TokenKind::Dot) {
                return Ok(name);
            }
            name.push('.');
        }
    }

    /// Parses an option value, returning it as text. Integers are written in decimal, with a
    /// leading `+` dropped. Other signs are joined to the value they precede.
    fn parse_constant(&mut self) -> Result<String, ()> {
        match self.peek() {
            Some(tok) if tok.is(TokenKind::Minus) => {
                self.bump();
                let value = self.parse_number()?;
                Ok(format!("-{}", value))
            }
            Some(tok) if tok.is(TokenKind::Plus) => {
                self.bump();
                match self.peek() {
                    Some(tok) if tok.is(TokenKind::IntLiteral) => self.parse_number(),
                    _ => Ok(format!("+{}", self.parse_number()?)),
                }
            }
            Some(tok) if tok.is(TokenKind::IntLiteral) || tok.is(TokenKind::FloatLiteral) => {
                self.parse_number()
            }
            Some(tok) if tok.is(TokenKind::Ident) => Ok(self.parse_full_ident()?.0),
            Some(tok) if tok.is(TokenKind::StringLiteral) => self.parse_string(),
            Some(tok) if tok.is(TokenKind::LeftBrace) => self.parse_aggregate(),
            _ => self.unexpected_token("a constant"),
        }
    }

    fn parse_number(&mut self) -> Result<String, ()> {
        match self.peek() {
            Some(tok) if tok.is(TokenKind::IntLiteral) => {
                self.bump();
                Ok(tok.int_value.unwrap_or_default().to_string())
            }
            // 'inf' and 'nan' are written as identifiers
            Some(tok) if tok.is(TokenKind::FloatLiteral) || tok.is(TokenKind::Ident) => {
                self.bump();
                Ok(tok.text.into_owned())
            }
            _ => self.unexpected_token("a number"),
        }
    }

    /// Skips a braced text-format value, returning its tokens joined by spaces.
    fn parse_aggregate(&mut self) -> Result<String, ()> {
        self.expect_kind(TokenKind::LeftBrace)?;

        let mut text = String::from("{");
        let mut depth = 1usize;
        while depth > 0 {
            let tok = match self.peek() {
                Some(tok) => tok,
                None => return self.unexpected_token("'}'"),
            };
            self.bump();

            match tok.kind {
                TokenKind::LeftBrace => depth += 1,
                TokenKind::RightBrace => depth -= 1,
                _ => (),
            }
            text.push(' ');
            text.push_str(&tok.to_string());
        }

        Ok(text)
    }

    fn parse_type_name(&mut self) -> Result<String, ()> {
        let mut name = String::new();
        if self.bump_if_kind(TokenKind::Dot) {
            name.push('.');
        }
        name.push_str(&self.parse_full_ident()?.0);
        Ok(name)
    }

    fn parse_full_ident(&mut self) -> Result<(String, Span), ()> {
        let first = self.expect_kind(TokenKind::Ident)?;
        let mut name = first.text.into_owned();
        let mut span = first.span;

        while self.bump_if_kind(TokenKind::Dot) {
            let next = self.expect_kind(TokenKind::Ident)?;
            name.push('.');
            name.push_str(&next.text);
            span.end = next.span.end;
        }

        Ok((name, span))
    }

    fn parse_ident(&mut self) -> Result<String, ()> {
        Ok(self.expect_kind(TokenKind::Ident)?.text.into_owned())
    }

    /// Parses a string literal, joining any adjacent literals.
    fn parse_string(&mut self) -> Result<String, ()> {
        let mut value = self.expect_kind(TokenKind::StringLiteral)?.text.into_owned();
        while let Some(next) = self.next_if(|tok| tok.is(TokenKind::StringLiteral)) {
            value.push_str(&next.text);
        }
        Ok(value)
    }

    fn enter(&mut self, span: Span) -> Result<(), ()> {
        if self.depth >= self.max_depth {
            self.add_error(ParseErrorKind::NestingTooDeep {
                limit: self.max_depth,
                span,
            });
            return Err(());
        }
        self.depth += 1;
        Ok(())
    }

    fn expect_kind(&mut self, kind: TokenKind) -> Result<Token<'a>, ()> {
        match self.next_if(|tok| tok.is(kind)) {
            Some(tok) => Ok(tok),
            None => self.unexpected_token(kind),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Token<'a>, ()> {
        match self.next_if(|tok| tok.is_keyword(keyword)) {
            Some(tok) => Ok(tok),
            None => self.unexpected_token(format!("'{}'", keyword)),
        }
    }

    fn bump_if_kind(&mut self, kind: TokenKind) -> bool {
        self.next_if(|tok| tok.is(kind)).is_some()
    }

    fn bump_if_keyword(&mut self, keyword: &str) -> bool {
        self.next_if(|tok| tok.is_keyword(keyword)).is_some()
    }

    fn next_if(&mut self, f: impl FnOnce(&Token) -> bool) -> Option<Token<'a>> {
        match self.peek() {
            Some(tok) if f(&tok) => {
                self.bump();
                Some(tok)
            }
            _ => None,
        }
    }

    fn bump(&mut self) {
        debug_assert!(self.peek.is_some(), "called bump without peek returning Some()");
        self.peek = None;
    }

    fn peek(&mut self) -> Option<Token<'a>> {
        if self.peek.is_none() {
            self.peek = self.next();
        }
        self.peek.clone()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        if self.error.is_some() {
            return None;
        }

        match self.scanner.next_token() {
            Ok(tok) => tok,
            Err(err) => {
                self.add_error(err);
                None
            }
        }
    }

    fn unexpected_token<T>(&mut self, expected: impl ToString) -> Result<T, ()> {
        match self.peek() {
            Some(found) => self.add_error(ParseErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found: found.to_string(),
                span: found.span,
            }),
            None => self.add_error(ParseErrorKind::UnexpectedEof {
                expected: expected.to_string(),
            }),
        }
        Err(())
    }

    /// Records an error. Only the first error in a file is kept.
    fn add_error(&mut self, err: ParseErrorKind) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

fn is_field_start_token(tok: &Token) -> bool {
    tok.is(TokenKind::Ident) || tok.is(TokenKind::Dot)
}
