//! Unit tests for the parser module.

use std::rc::Rc;

use super::parser::parse;
use crate::{
    ast::ast::{
        Access, AssignOp, Ast, BinaryOp, ExprId, ExprKind, Literal, StmtId, StmtKind, UnaryOp,
    },
    errors::errors::{Error, ErrorKind},
    lexer::lexer::tokenize,
};

fn parse_source(source: &str) -> Result<(Ast, Vec<StmtId>), Error> {
    let tokens = tokenize(source.to_string(), Some("test.sb".to_string()))?;
    let mut ast = Ast::new();
    let items = parse(tokens, Rc::new("test.sb".to_string()), &mut ast)?;
    Ok((ast, items))
}

fn parse_ok(source: &str) -> (Ast, Vec<StmtId>) {
    parse_source(source).unwrap()
}

/// Parses `source` as the only expression statement and returns it.
fn parse_expression(source: &str) -> (Ast, ExprId) {
    let (ast, items) = parse_ok(&format!("{};", source));
    let expr = match &ast.stmt(items[0]).kind {
        StmtKind::Expression(expr) => *expr,
        other => panic!("expected expression statement, found {:?}", other),
    };
    (ast, expr)
}

#[test]
fn test_precedence_of_arithmetic() {
    let (ast, expr) = parse_expression("1 + 2 * 3");

    match &ast.expr(expr).kind {
        ExprKind::Binary { op, right, .. } => {
            assert_eq!(*op, BinaryOp::Add);
            assert!(matches!(
                ast.expr(*right).kind,
                ExprKind::Binary { op: BinaryOp::Mul, .. }
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_bitwise_binds_looser_than_relational() {
    let (ast, expr) = parse_expression("a < b | c == d");

    assert!(matches!(
        ast.expr(expr).kind,
        ExprKind::Binary { op: BinaryOp::BitOr, .. }
    ));
}

#[test]
fn test_cast_binds_tighter_than_multiplication() {
    let (ast, expr) = parse_expression("a * b as f64");

    match &ast.expr(expr).kind {
        ExprKind::Binary { op: BinaryOp::Mul, right, .. } => match &ast.expr(*right).kind {
            ExprKind::Cast { ty, .. } => assert_eq!(ty.path, vec!["f64".to_string()]),
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_prefix_operators() {
    let (ast, expr) = parse_expression("-x.y");

    match &ast.expr(expr).kind {
        ExprKind::Unary { op, operand } => {
            assert_eq!(*op, UnaryOp::Neg);
            assert!(matches!(ast.expr(*operand).kind, ExprKind::Member { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }

    let (ast, expr) = parse_expression("*&p");
    assert!(matches!(
        ast.expr(expr).kind,
        ExprKind::Unary { op: UnaryOp::Deref, .. }
    ));
}

#[test]
fn test_assignment_is_right_associative() {
    let (ast, expr) = parse_expression("a = b += 1");

    match &ast.expr(expr).kind {
        ExprKind::Assignment { op, value, .. } => {
            assert_eq!(*op, AssignOp::Assign);
            assert!(matches!(
                ast.expr(*value).kind,
                ExprKind::Assignment { op: AssignOp::Add, .. }
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_literals() {
    let (ast, expr) = parse_expression("2.5f");
    assert_eq!(
        ast.expr(expr).kind,
        ExprKind::Literal(Literal::Float { value: 2.5, single: true })
    );

    let (ast, expr) = parse_expression("'A'");
    assert_eq!(ast.expr(expr).kind, ExprKind::Literal(Literal::Char(65)));

    let (ast, expr) = parse_expression("nil");
    assert_eq!(ast.expr(expr).kind, ExprKind::Literal(Literal::Nil));
}

#[test]
fn test_method_call_and_call() {
    let (ast, expr) = parse_expression("shape.area(1, 2)");

    match &ast.expr(expr).kind {
        ExprKind::MethodCall { method, args, .. } => {
            assert_eq!(method, "area");
            assert_eq!(args.len(), 2);
        }
        other => panic!("unexpected {:?}", other),
    }

    let (ast, expr) = parse_expression("make()");
    assert!(matches!(ast.expr(expr).kind, ExprKind::Call { ref args, .. } if args.is_empty()));
}

#[test]
fn test_struct_literals() {
    let (ast, expr) = parse_expression("geo.Point { x: 1, y: 2 }");

    match &ast.expr(expr).kind {
        ExprKind::StructLiteral { path, fields, heap } => {
            assert_eq!(path, &vec!["geo".to_string(), "Point".to_string()]);
            assert_eq!(fields.len(), 2);
            assert!(!heap);
        }
        other => panic!("unexpected {:?}", other),
    }

    let (ast, expr) = parse_expression("new Point { }");
    assert!(matches!(
        ast.expr(expr).kind,
        ExprKind::StructLiteral { heap: true, .. }
    ));
}

#[test]
fn test_condition_does_not_take_struct_literal() {
    let (ast, items) = parse_ok("fn f() { if ready { return; } }");

    let body = match &ast.stmt(items[0]).kind {
        StmtKind::FnDecl(decl) => decl.body,
        other => panic!("unexpected {:?}", other),
    };
    let if_stmt = match &ast.stmt(body).kind {
        StmtKind::Block(stmts) => stmts[0],
        other => panic!("unexpected {:?}", other),
    };

    match &ast.stmt(if_stmt).kind {
        StmtKind::If { condition, .. } => {
            assert_eq!(ast.expr(*condition).kind, ExprKind::Symbol("ready".into()));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parenthesised_condition_allows_struct_literal() {
    parse_ok("fn f() { if (P { x: 1 }).x == 1 { } }");
}

#[test]
fn test_struct_declaration() {
    let (ast, items) = parse_ok("pub struct Point { pub x: i32 = 1, const y: *i32, z: geo.Vec }");

    match &ast.stmt(items[0]).kind {
        StmtKind::StructDecl(decl) => {
            assert_eq!(decl.access, Access::Public);
            assert_eq!(decl.fields.len(), 3);
            assert_eq!(decl.fields[0].access, Access::Public);
            assert!(decl.fields[0].default.is_some());
            assert!(decl.fields[1].is_const);
            assert_eq!(decl.fields[1].ty.pointer_depth, 1);
            assert_eq!(decl.fields[2].ty.path, vec!["geo".to_string(), "Vec".to_string()]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_trait_and_impl() {
    let source = "
        trait Shape { fn area() -> i32; fn scale(by: i32); }
        impl Shape for Square { fn area() -> i32 { return 1; } pub fn scale(by: i32) { } }
        impl Square { fn new_one() { } }
    ";
    let (ast, items) = parse_ok(source);

    match &ast.stmt(items[0]).kind {
        StmtKind::TraitDecl(decl) => {
            assert_eq!(decl.methods.len(), 2);
            assert!(decl.methods[1].return_type.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }

    match &ast.stmt(items[1]).kind {
        StmtKind::Impl(decl) => {
            assert_eq!(decl.trait_path, Some(vec!["Shape".to_string()]));
            assert_eq!(decl.struct_name, "Square");
            assert_eq!(decl.methods[1].access, Access::Public);
        }
        other => panic!("unexpected {:?}", other),
    }

    match &ast.stmt(items[2]).kind {
        StmtKind::Impl(decl) => assert!(decl.trait_path.is_none()),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_modules_and_imports() {
    let (ast, items) = parse_ok("import geo; pub mod inner { pub fn f() { } }");

    assert_eq!(ast.stmt(items[0]).kind, StmtKind::Import("geo".into()));
    match &ast.stmt(items[1]).kind {
        StmtKind::ModuleDecl(decl) => {
            assert_eq!(decl.name, "inner");
            assert_eq!(decl.access, Access::Public);
            assert_eq!(decl.items.len(), 1);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_control_flow_statements() {
    let source = "fn f() { while true { if a { break; } else if b { continue; } else { } } return; }";
    let (ast, items) = parse_ok(source);

    let body = match &ast.stmt(items[0]).kind {
        StmtKind::FnDecl(decl) => decl.body,
        other => panic!("unexpected {:?}", other),
    };

    match &ast.stmt(body).kind {
        StmtKind::Block(stmts) => {
            assert!(matches!(ast.stmt(stmts[0]).kind, StmtKind::While { .. }));
            assert_eq!(ast.stmt(stmts[1]).kind, StmtKind::Return(None));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_spans_cover_statement() {
    let (ast, items) = parse_ok("let x: i32 = 5;");
    let span = &ast.stmt(items[0]).span;

    assert_eq!(span.start.0, 0);
    assert_eq!(span.end.0, 15);
}

#[test]
fn test_missing_semicolon() {
    let error = parse_source("let x = 5").unwrap_err();
    assert_eq!(error.get_kind(), ErrorKind::ExpectedToken);
}

#[test]
fn test_missing_expression() {
    let error = parse_source("let x = ;").unwrap_err();
    assert_eq!(error.get_kind(), ErrorKind::ExpectedExpression);
    assert_eq!(error.get_args(), &[";".to_string()]);
}

#[test]
fn test_missing_identifier() {
    let error = parse_source("fn (a: i32) { }").unwrap_err();
    assert_eq!(error.get_kind(), ErrorKind::ExpectedIdentifier);
}

#[test]
fn test_missing_type() {
    let error = parse_source("let x: 5 = 5;").unwrap_err();
    assert_eq!(error.get_kind(), ErrorKind::ExpectedType);
}

#[test]
fn test_pub_requires_item() {
    let error = parse_source("pub return;").unwrap_err();
    assert_eq!(error.get_kind(), ErrorKind::ExpectedStatement);
}
