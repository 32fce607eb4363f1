//! Type parsing implementation.
//!
//! This module handles parsing of type annotations. It supports:
//!
//! - Primitive and named types (identifiers)
//! - Dotted module paths (`geo.Point`)
//! - Pointer prefixes (`*T`, `**T`)
//!
//! Like expression parsing, handlers are looked up by the leading token.

use std::collections::HashMap;

use crate::{
    ast::ast::TypeExpr,
    errors::errors::{Error, ErrorKind},
    lexer::tokens::TokenKind,
};

use super::parser::Parser;

/// Type alias for type null denotation handler functions.
pub type TypeNUDHandler = fn(&mut Parser) -> Result<TypeExpr, Error>;

/// Type alias for type NUD lookup table.
pub type TypeNUDLookup = HashMap<TokenKind, TypeNUDHandler>;

/// Initializes the type parsing lookup table.
pub fn create_token_type_lookups(parser: &mut Parser) {
    parser.type_nud(TokenKind::Identifier, parse_symbol_type);
    parser.type_nud(TokenKind::Star, parse_pointer_type);
}

pub fn parse_symbol_type(parser: &mut Parser) -> Result<TypeExpr, Error> {
    let start = parser.get_position();
    let mut path = vec![parser.expect_identifier("in type")?];

    while parser.current_token_kind() == TokenKind::Dot {
        parser.advance();
        path.push(parser.expect_identifier("in type path")?);
    }

    Ok(TypeExpr {
        path,
        pointer_depth: 0,
        span: parser.span_from(start),
    })
}

pub fn parse_pointer_type(parser: &mut Parser) -> Result<TypeExpr, Error> {
    let start = parser.expect(TokenKind::Star)?.span.start;
    let inner = parse_type(parser)?;

    Ok(TypeExpr {
        pointer_depth: inner.pointer_depth + 1,
        span: parser.span_from(start),
        ..inner
    })
}

pub fn parse_type(parser: &mut Parser) -> Result<TypeExpr, Error> {
    let token_kind = parser.current_token_kind();

    match parser.get_type_nud_lookup().get(&token_kind).copied() {
        Some(nud) => nud(parser),
        None => Err(parser.error(ErrorKind::ExpectedType, vec![])),
    }
}
