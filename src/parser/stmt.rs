use crate::{
    ast::ast::{
        Access, FieldDecl, FnDecl, FnSignature, ImplDecl, ModuleDecl, Param, StmtId, StmtKind,
        StructDecl, TraitDecl, VarDecl,
    },
    errors::errors::{Error, ErrorKind},
    lexer::tokens::TokenKind,
    parser::{expr::parse_expr, lookups::BindingPower},
    Position,
};

use super::{parser::Parser, types::parse_type};

pub fn parse_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let handler = parser
        .get_stmt_lookup()
        .get(&parser.current_token_kind())
        .copied();

    if let Some(handler) = handler {
        return handler(parser);
    }

    let start = parser.get_position();
    let expr = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(StmtKind::Expression(expr), span))
}

pub fn parse_pub_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.advance().span.start;

    match parser.current_token_kind() {
        TokenKind::Let | TokenKind::Const => parse_var_decl(parser, start, Access::Public),
        TokenKind::Fn => parse_fn_decl(parser, start, Access::Public),
        TokenKind::Struct => parse_struct_decl(parser, start, Access::Public),
        TokenKind::Trait => parse_trait_decl(parser, start, Access::Public),
        TokenKind::Mod => parse_module_decl(parser, start, Access::Public),
        _ => Err(parser.error(ErrorKind::ExpectedStatement, vec![])),
    }
}

pub fn parse_var_decl_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.get_position();
    parse_var_decl(parser, start, Access::Private)
}

fn parse_var_decl(parser: &mut Parser, start: Position, access: Access) -> Result<StmtId, Error> {
    let is_const = parser.advance().kind == TokenKind::Const;
    let name = parser.expect_identifier("in variable declaration")?;

    let ty = if parser.current_token_kind() == TokenKind::Colon {
        parser.advance();
        Some(parse_type(parser)?)
    } else {
        None
    };

    let value = if parser.current_token_kind() == TokenKind::Assignment {
        parser.advance();
        Some(parse_expr(parser, BindingPower::Default)?)
    } else {
        None
    };

    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(
        StmtKind::VarDecl(VarDecl {
            name,
            is_const,
            access,
            ty,
            value,
        }),
        span,
    ))
}

pub fn parse_import_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.advance().span.start;
    let name = parser.expect_identifier("in import")?;
    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(StmtKind::Import(name), span))
}

pub fn parse_module_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.get_position();
    parse_module_decl(parser, start, Access::Private)
}

fn parse_module_decl(
    parser: &mut Parser,
    start: Position,
    access: Access,
) -> Result<StmtId, Error> {
    parser.expect(TokenKind::Mod)?;
    let name = parser.expect_identifier("for module name")?;
    parser.expect(TokenKind::OpenCurly)?;

    let mut items = vec![];
    while parser.current_token_kind() != TokenKind::CloseCurly {
        if !parser.has_tokens() {
            return Err(parser.error(ErrorKind::ExpectedToken, vec![TokenKind::CloseCurly.to_string()]));
        }
        items.push(parse_stmt(parser)?);
    }
    parser.expect(TokenKind::CloseCurly)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(
        StmtKind::ModuleDecl(ModuleDecl {
            name,
            access,
            items,
        }),
        span,
    ))
}

pub fn parse_block_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.expect(TokenKind::OpenCurly)?.span.start;

    let mut body = vec![];
    while parser.current_token_kind() != TokenKind::CloseCurly {
        if !parser.has_tokens() {
            return Err(parser.error(ErrorKind::ExpectedToken, vec![TokenKind::CloseCurly.to_string()]));
        }
        body.push(parse_stmt(parser)?);
    }
    parser.expect(TokenKind::CloseCurly)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(StmtKind::Block(body), span))
}

pub fn parse_if_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.advance().span.start;

    let condition = parser.with_struct_literals(false, |p| parse_expr(p, BindingPower::Default))?;
    let then_branch = parse_block_stmt(parser)?;

    let else_branch = if parser.current_token_kind() == TokenKind::Else {
        parser.advance();
        if parser.current_token_kind() == TokenKind::If {
            Some(parse_if_stmt(parser)?)
        } else {
            Some(parse_block_stmt(parser)?)
        }
    } else {
        None
    };

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        },
        span,
    ))
}

pub fn parse_while_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.advance().span.start;

    let condition = parser.with_struct_literals(false, |p| parse_expr(p, BindingPower::Default))?;
    let body = parse_block_stmt(parser)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(StmtKind::While { condition, body }, span))
}

pub fn parse_break_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.advance().span.start;
    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(StmtKind::Break, span))
}

pub fn parse_continue_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.advance().span.start;
    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(StmtKind::Continue, span))
}

pub fn parse_return_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.advance().span.start;

    let value = if parser.current_token_kind() != TokenKind::Semicolon {
        Some(parse_expr(parser, BindingPower::Default)?)
    } else {
        None
    };

    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(StmtKind::Return(value), span))
}

fn parse_signature(parser: &mut Parser) -> Result<FnSignature, Error> {
    let start = parser.expect(TokenKind::Fn)?.span.start;
    let name = parser.expect_identifier("for function name")?;

    parser.expect(TokenKind::OpenParen)?;

    let mut params = vec![];
    while parser.current_token_kind() != TokenKind::CloseParen {
        let param_start = parser.get_position();
        let param_name = parser.expect_identifier("for parameter name")?;
        parser.expect(TokenKind::Colon)?;
        let ty = parse_type(parser)?;

        params.push(Param {
            name: param_name,
            ty,
            span: parser.span_from(param_start),
        });

        if parser.current_token_kind() != TokenKind::CloseParen {
            parser.expect(TokenKind::Comma)?;
        }
    }

    parser.expect(TokenKind::CloseParen)?;

    let return_type = if parser.current_token_kind() == TokenKind::Arrow {
        parser.advance();
        Some(parse_type(parser)?)
    } else {
        None
    };

    Ok(FnSignature {
        name,
        params,
        return_type,
        span: parser.span_from(start),
    })
}

fn parse_fn(parser: &mut Parser, access: Access) -> Result<FnDecl, Error> {
    let signature = parse_signature(parser)?;
    let body = parse_block_stmt(parser)?;

    Ok(FnDecl {
        signature,
        access,
        body,
    })
}

pub fn parse_fn_decl_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.get_position();
    parse_fn_decl(parser, start, Access::Private)
}

fn parse_fn_decl(parser: &mut Parser, start: Position, access: Access) -> Result<StmtId, Error> {
    let decl = parse_fn(parser, access)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(StmtKind::FnDecl(decl), span))
}

pub fn parse_struct_decl_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.get_position();
    parse_struct_decl(parser, start, Access::Private)
}

fn parse_struct_decl(
    parser: &mut Parser,
    start: Position,
    access: Access,
) -> Result<StmtId, Error> {
    parser.expect(TokenKind::Struct)?;
    let name = parser.expect_identifier("for struct name")?;
    parser.expect(TokenKind::OpenCurly)?;

    let mut fields = vec![];
    while parser.current_token_kind() != TokenKind::CloseCurly {
        let field_start = parser.get_position();

        let field_access = if parser.current_token_kind() == TokenKind::Pub {
            parser.advance();
            Access::Public
        } else {
            Access::Private
        };

        let is_const = parser.current_token_kind() == TokenKind::Const;
        if is_const {
            parser.advance();
        }

        let field_name = parser.expect_identifier("for field name")?;
        parser.expect(TokenKind::Colon)?;
        let ty = parse_type(parser)?;

        let default = if parser.current_token_kind() == TokenKind::Assignment {
            parser.advance();
            Some(parse_expr(parser, BindingPower::Comma)?)
        } else {
            None
        };

        fields.push(FieldDecl {
            name: field_name,
            ty,
            is_const,
            access: field_access,
            default,
            span: parser.span_from(field_start),
        });

        if parser.current_token_kind() != TokenKind::CloseCurly {
            parser.expect(TokenKind::Comma)?;
        }
    }

    parser.expect(TokenKind::CloseCurly)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(
        StmtKind::StructDecl(StructDecl {
            name,
            access,
            fields,
        }),
        span,
    ))
}

pub fn parse_trait_decl_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.get_position();
    parse_trait_decl(parser, start, Access::Private)
}

fn parse_trait_decl(
    parser: &mut Parser,
    start: Position,
    access: Access,
) -> Result<StmtId, Error> {
    parser.expect(TokenKind::Trait)?;
    let name = parser.expect_identifier("for trait name")?;
    parser.expect(TokenKind::OpenCurly)?;

    let mut methods = vec![];
    while parser.current_token_kind() != TokenKind::CloseCurly {
        methods.push(parse_signature(parser)?);
        parser.expect(TokenKind::Semicolon)?;
    }

    parser.expect(TokenKind::CloseCurly)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(
        StmtKind::TraitDecl(TraitDecl {
            name,
            access,
            methods,
        }),
        span,
    ))
}

pub fn parse_impl_stmt(parser: &mut Parser) -> Result<StmtId, Error> {
    let start = parser.advance().span.start;

    let mut path = vec![parser.expect_identifier("after `impl`")?];
    while parser.current_token_kind() == TokenKind::Dot {
        parser.advance();
        path.push(parser.expect_identifier("in trait path")?);
    }

    let (trait_path, struct_name) = if parser.current_token_kind() == TokenKind::For {
        parser.advance();
        (Some(path), parser.expect_identifier("for implemented struct")?)
    } else if path.len() == 1 {
        (None, path.remove(0))
    } else {
        return Err(parser.error(ErrorKind::ExpectedToken, vec![TokenKind::For.to_string()]));
    };

    parser.expect(TokenKind::OpenCurly)?;

    let mut methods = vec![];
    while parser.current_token_kind() != TokenKind::CloseCurly {
        let access = if parser.current_token_kind() == TokenKind::Pub {
            parser.advance();
            Access::Public
        } else {
            Access::Private
        };

        methods.push(parse_fn(parser, access)?);
    }

    parser.expect(TokenKind::CloseCurly)?;

    let span = parser.span_from(start);
    Ok(parser.alloc_stmt(
        StmtKind::Impl(ImplDecl {
            trait_path,
            struct_name,
            methods,
        }),
        span,
    ))
}
