//! Unit tests for the lexer module.
//!
//! This module contains tests for tokenization including:
//! - Keywords and identifiers
//! - Numeric literals (integers and floats with the `f` suffix)
//! - Character literals with escape sequences
//! - Operators and punctuation
//! - Comments
//! - Error cases

use super::{lexer::tokenize, tokens::TokenKind};
use crate::errors::errors::ErrorKind;

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source.to_string(), Some("test.sb".to_string()))
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn test_tokenize_keywords() {
    let source = "let const fn if else while break continue return new import mod pub struct trait impl for as true false nil";

    assert_eq!(
        kinds(source),
        vec![
            TokenKind::Let,
            TokenKind::Const,
            TokenKind::Fn,
            TokenKind::If,
            TokenKind::Else,
            TokenKind::While,
            TokenKind::Break,
            TokenKind::Continue,
            TokenKind::Return,
            TokenKind::New,
            TokenKind::Import,
            TokenKind::Mod,
            TokenKind::Pub,
            TokenKind::Struct,
            TokenKind::Trait,
            TokenKind::Impl,
            TokenKind::For,
            TokenKind::As,
            TokenKind::True,
            TokenKind::False,
            TokenKind::Nil,
            TokenKind::EOF,
        ]
    );
}

#[test]
fn test_tokenize_identifiers() {
    let source = "foo bar baz_123 _underscore CamelCase self".to_string();
    let tokens = tokenize(source, Some("test.sb".to_string())).unwrap();

    let values: Vec<&str> = tokens[..6].iter().map(|t| t.value.as_str()).collect();
    assert_eq!(values, vec!["foo", "bar", "baz_123", "_underscore", "CamelCase", "self"]);
    assert!(tokens[..6].iter().all(|t| t.kind == TokenKind::Identifier));
    assert_eq!(tokens[6].kind, TokenKind::EOF);
}

#[test]
fn test_tokenize_numbers() {
    let source = "42 3.14 0 2.5f".to_string();
    let tokens = tokenize(source, Some("test.sb".to_string())).unwrap();

    assert_eq!(tokens[0].kind, TokenKind::Integer);
    assert_eq!(tokens[0].value, "42");
    assert_eq!(tokens[1].kind, TokenKind::Float);
    assert_eq!(tokens[1].value, "3.14");
    assert_eq!(tokens[2].kind, TokenKind::Integer);
    assert_eq!(tokens[2].value, "0");
    assert_eq!(tokens[3].kind, TokenKind::Float);
    assert_eq!(tokens[3].value, "2.5f");
}

#[test]
fn test_member_access_is_not_a_float() {
    assert_eq!(
        kinds("p.x"),
        vec![TokenKind::Identifier, TokenKind::Dot, TokenKind::Identifier, TokenKind::EOF]
    );
}

#[test]
fn test_integer_above_limit() {
    let error = tokenize("99999999999999999999".to_string(), None).unwrap_err();
    assert_eq!(error.get_kind(), ErrorKind::NumberParseError);
}

#[test]
fn test_tokenize_char_literals() {
    let source = r"'a' '\n' '\t' '\0' '\\' '\'' '\x41'".to_string();
    let tokens = tokenize(source, None).unwrap();

    let values: Vec<String> = tokens[..7].iter().map(|t| t.value.clone()).collect();
    assert_eq!(values, vec!["a", "\n", "\t", "\0", "\\", "'", "A"]);
    assert!(tokens[..7].iter().all(|t| t.kind == TokenKind::Char));
}

#[test]
fn test_bad_escape_sequence() {
    let error = tokenize(r"'\q'".to_string(), None).unwrap_err();
    assert_eq!(error.get_kind(), ErrorKind::BadEscapeSequence);
    assert_eq!(error.get_args(), &["q".to_string()]);
}

#[test]
fn test_malformed_char_literals() {
    for source in ["''", "'ab'", "'a"] {
        let error = tokenize(source.to_string(), None).unwrap_err();
        assert_eq!(error.get_kind(), ErrorKind::MalformedCharLiteral, "{}", source);
    }
}

#[test]
fn test_tokenize_operators() {
    let source = "+ - * / % = == != < <= > >= ! || && | & += -= *= /=";

    assert_eq!(
        kinds(source),
        vec![
            TokenKind::Plus,
            TokenKind::Dash,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Percent,
            TokenKind::Assignment,
            TokenKind::Equals,
            TokenKind::NotEquals,
            TokenKind::Less,
            TokenKind::LessEquals,
            TokenKind::Greater,
            TokenKind::GreaterEquals,
            TokenKind::Not,
            TokenKind::Or,
            TokenKind::And,
            TokenKind::Pipe,
            TokenKind::Ampersand,
            TokenKind::PlusEquals,
            TokenKind::MinusEquals,
            TokenKind::StarEquals,
            TokenKind::SlashEquals,
            TokenKind::EOF,
        ]
    );
}

#[test]
fn test_tokenize_punctuation() {
    assert_eq!(
        kinds("{ } ( ) . ; : , ->"),
        vec![
            TokenKind::OpenCurly,
            TokenKind::CloseCurly,
            TokenKind::OpenParen,
            TokenKind::CloseParen,
            TokenKind::Dot,
            TokenKind::Semicolon,
            TokenKind::Colon,
            TokenKind::Comma,
            TokenKind::Arrow,
            TokenKind::EOF,
        ]
    );
}

#[test]
fn test_comments_are_skipped() {
    let source = "let x // trailing comment\n// full line\nx";
    assert_eq!(
        kinds(source),
        vec![TokenKind::Let, TokenKind::Identifier, TokenKind::Identifier, TokenKind::EOF]
    );
}

#[test]
fn test_token_spans() {
    let tokens = tokenize("let value = 10;".to_string(), None).unwrap();

    assert_eq!(tokens[0].span.start.0, 0);
    assert_eq!(tokens[0].span.end.0, 3);
    assert_eq!(tokens[1].span.start.0, 4);
    assert_eq!(tokens[1].span.end.0, 9);
    assert_eq!(tokens[3].span.start.0, 12);
    assert_eq!(tokens[4].span.start.0, 14);
    assert_eq!(tokens[5].span.start.0, 15);
}

#[test]
fn test_unrecognised_token() {
    let error = tokenize("let x = @;".to_string(), Some("test.sb".to_string())).unwrap_err();

    assert_eq!(error.get_kind(), ErrorKind::UnrecognisedToken);
    assert_eq!(error.get_position().0, 8);
    assert_eq!(error.get_args(), &["@".to_string()]);
}

#[test]
fn test_method_declaration_tokens() {
    let source = "impl Shape for Circle { fn area() -> f64 { return 0.0; } }";
    let k = kinds(source);

    assert_eq!(k[0], TokenKind::Impl);
    assert_eq!(k[2], TokenKind::For);
    assert_eq!(k[5], TokenKind::Fn);
    assert_eq!(k[9], TokenKind::Arrow);
    assert_eq!(k[13], TokenKind::Float);
}
