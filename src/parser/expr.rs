use crate::{
    ast::ast::{AssignOp, BinaryOp, ExprId, ExprKind, FieldInit, Literal, UnaryOp},
    errors::errors::{Error, ErrorKind},
    lexer::tokens::TokenKind,
    Span,
};

use super::{lookups::BindingPower, parser::Parser, types::parse_type};

pub fn parse_expr(parser: &mut Parser, bp: BindingPower) -> Result<ExprId, Error> {
    // First parse NUD
    let token_kind = parser.current_token_kind();
    let nud = match parser.get_nud_lookup().get(&token_kind) {
        Some(nud) => *nud,
        None => return Err(parser.error(ErrorKind::ExpectedExpression, vec![])),
    };

    let mut left = nud(parser)?;

    // While LED and current BP is less than BP of current token, continue parsing lhs
    loop {
        let token_kind = parser.current_token_kind();
        let next_bp = *parser
            .get_bp_lookup()
            .get(&token_kind)
            .unwrap_or(&BindingPower::Default);

        if next_bp <= bp {
            break;
        }

        let led = match parser.get_led_lookup().get(&token_kind) {
            Some(led) => *led,
            None => break,
        };

        left = led(parser, left, next_bp)?;
    }

    Ok(left)
}

fn span_of(parser: &Parser, id: ExprId) -> Span {
    parser.ast().expr(id).span.clone()
}

pub fn parse_primary_expr(parser: &mut Parser) -> Result<ExprId, Error> {
    let token = parser.current_token().clone();

    let literal = match token.kind {
        TokenKind::Integer => match token.value.parse::<i64>() {
            Ok(value) => Literal::Int(value),
            Err(_) => {
                return Err(parser.error(ErrorKind::NumberParseError, vec![]));
            }
        },
        TokenKind::Float => {
            let single = token.value.ends_with('f');
            match token.value.trim_end_matches('f').parse::<f64>() {
                Ok(value) => Literal::Float { value, single },
                Err(_) => return Err(parser.error(ErrorKind::NumberParseError, vec![])),
            }
        }
        TokenKind::Char => {
            let ch = token.value.chars().next().unwrap_or('\0');
            Literal::Char(ch as u32 as u8 as i8)
        }
        TokenKind::True => Literal::Bool(true),
        TokenKind::False => Literal::Bool(false),
        TokenKind::Nil => Literal::Nil,
        _ => return Err(parser.error(ErrorKind::ExpectedExpression, vec![])),
    };

    parser.advance();
    Ok(parser.alloc_expr(ExprKind::Literal(literal), token.span))
}

/// Whether the tokens ahead read `Ident (. Ident)* {`, the start of a
/// struct literal.
fn at_struct_literal(parser: &Parser) -> bool {
    let mut offset = 0;

    loop {
        if parser.peek_kind(offset) != TokenKind::Identifier {
            return false;
        }

        match parser.peek_kind(offset + 1) {
            TokenKind::Dot => offset += 2,
            TokenKind::OpenCurly => return true,
            _ => return false,
        }
    }
}

pub fn parse_symbol_expr(parser: &mut Parser) -> Result<ExprId, Error> {
    if parser.struct_literals_allowed() && at_struct_literal(parser) {
        let start = parser.get_position();
        return parse_struct_literal(parser, start, false);
    }

    let token = parser.expect(TokenKind::Identifier)?;
    Ok(parser.alloc_expr(ExprKind::Symbol(token.value), token.span))
}

pub fn parse_binary_expr(
    parser: &mut Parser,
    left: ExprId,
    bp: BindingPower,
) -> Result<ExprId, Error> {
    let operator_token = parser.advance();

    let op = match operator_token.kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Dash => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Rem,
        TokenKind::Equals => BinaryOp::Eq,
        TokenKind::NotEquals => BinaryOp::Ne,
        TokenKind::Less => BinaryOp::Lt,
        TokenKind::LessEquals => BinaryOp::Le,
        TokenKind::Greater => BinaryOp::Gt,
        TokenKind::GreaterEquals => BinaryOp::Ge,
        TokenKind::And => BinaryOp::And,
        TokenKind::Or => BinaryOp::Or,
        TokenKind::Ampersand => BinaryOp::BitAnd,
        _ => BinaryOp::BitOr,
    };

    let right = parse_expr(parser, bp)?;
    let span = span_of(parser, left).to(&span_of(parser, right));

    Ok(parser.alloc_expr(ExprKind::Binary { left, op, right }, span))
}

pub fn parse_prefix_expr(parser: &mut Parser) -> Result<ExprId, Error> {
    let operator_token = parser.advance();
    let op = match operator_token.kind {
        TokenKind::Dash => UnaryOp::Neg,
        TokenKind::Not => UnaryOp::Not,
        TokenKind::Ampersand => UnaryOp::AddressOf,
        _ => UnaryOp::Deref,
    };

    let operand = parse_expr(parser, BindingPower::Unary)?;
    let span = operator_token.span.to(&span_of(parser, operand));

    Ok(parser.alloc_expr(ExprKind::Unary { op, operand }, span))
}

pub fn parse_assignment_expr(
    parser: &mut Parser,
    left: ExprId,
    _bp: BindingPower,
) -> Result<ExprId, Error> {
    let operator_token = parser.advance();
    let op = match operator_token.kind {
        TokenKind::PlusEquals => AssignOp::Add,
        TokenKind::MinusEquals => AssignOp::Sub,
        TokenKind::StarEquals => AssignOp::Mul,
        TokenKind::SlashEquals => AssignOp::Div,
        _ => AssignOp::Assign,
    };

    // Right associative
    let value = parse_expr(parser, BindingPower::Comma)?;
    let span = span_of(parser, left).to(&span_of(parser, value));

    Ok(parser.alloc_expr(
        ExprKind::Assignment {
            target: left,
            op,
            value,
        },
        span,
    ))
}

pub fn parse_grouping_expr(parser: &mut Parser) -> Result<ExprId, Error> {
    parser.advance();
    let expr = parser.with_struct_literals(true, |p| parse_expr(p, BindingPower::Default))?;
    parser.expect(TokenKind::CloseParen)?;

    Ok(expr)
}

pub fn parse_cast_expr(
    parser: &mut Parser,
    left: ExprId,
    _bp: BindingPower,
) -> Result<ExprId, Error> {
    parser.advance();
    let ty = parse_type(parser)?;
    let span = span_of(parser, left).to(&ty.span);

    Ok(parser.alloc_expr(ExprKind::Cast { expr: left, ty }, span))
}

fn parse_arguments(parser: &mut Parser) -> Result<Vec<ExprId>, Error> {
    parser.expect(TokenKind::OpenParen)?;

    parser.with_struct_literals(true, |parser| {
        let mut args = vec![];

        while parser.current_token_kind() != TokenKind::CloseParen {
            args.push(parse_expr(parser, BindingPower::Comma)?);

            if parser.current_token_kind() != TokenKind::CloseParen {
                parser.expect(TokenKind::Comma)?;
            }
        }

        parser.expect(TokenKind::CloseParen)?;
        Ok(args)
    })
}

pub fn parse_call_expr(
    parser: &mut Parser,
    left: ExprId,
    _bp: BindingPower,
) -> Result<ExprId, Error> {
    let args = parse_arguments(parser)?;
    let start = span_of(parser, left).start;
    let span = parser.span_from(start);

    Ok(parser.alloc_expr(ExprKind::Call { callee: left, args }, span))
}

pub fn parse_member_expr(
    parser: &mut Parser,
    left: ExprId,
    _bp: BindingPower,
) -> Result<ExprId, Error> {
    parser.advance();
    let member = parser.expect_identifier("after `.`")?;
    let start = span_of(parser, left).start;

    if parser.current_token_kind() == TokenKind::OpenParen {
        let args = parse_arguments(parser)?;
        let span = parser.span_from(start);

        return Ok(parser.alloc_expr(
            ExprKind::MethodCall {
                receiver: left,
                method: member,
                args,
            },
            span,
        ));
    }

    let span = parser.span_from(start);
    Ok(parser.alloc_expr(
        ExprKind::Member {
            object: left,
            field: member,
        },
        span,
    ))
}

pub fn parse_heap_struct_expr(parser: &mut Parser) -> Result<ExprId, Error> {
    // new geo.Point { x: 1, y: 2 }
    let start = parser.advance().span.start;
    parse_struct_literal(parser, start, true)
}

fn parse_struct_literal(
    parser: &mut Parser,
    start: crate::Position,
    heap: bool,
) -> Result<ExprId, Error> {
    let mut path = vec![parser.expect_identifier("in struct literal")?];
    while parser.current_token_kind() == TokenKind::Dot {
        parser.advance();
        path.push(parser.expect_identifier("in struct path")?);
    }

    parser.expect(TokenKind::OpenCurly)?;

    let fields = parser.with_struct_literals(true, |parser| {
        let mut fields = vec![];

        while parser.current_token_kind() != TokenKind::CloseCurly {
            let field_start = parser.get_position();
            let name = parser.expect_identifier("for field name")?;
            parser.expect(TokenKind::Colon)?;
            let value = parse_expr(parser, BindingPower::Comma)?;

            fields.push(FieldInit {
                name,
                value,
                span: parser.span_from(field_start),
            });

            if parser.current_token_kind() != TokenKind::CloseCurly {
                parser.expect(TokenKind::Comma)?;
            }
        }

        Ok(fields)
    })?;

    parser.expect(TokenKind::CloseCurly)?;
    let span = parser.span_from(start);

    Ok(parser.alloc_expr(ExprKind::StructLiteral { path, fields, heap }, span))
}
