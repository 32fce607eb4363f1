//! Unit tests for semantic analysis.

use std::rc::Rc;

use super::type_checker::{analyze, Analysis};
use crate::{
    ast::{
        ast::{Ast, StmtKind},
        types::{Type, TypeKind},
        values::ValueData,
    },
    errors::errors::ErrorKind,
    lexer::lexer::tokenize,
    parser::parser::parse,
    symbols::module::ModuleGraph,
};

fn analyze_units(units: &[(&str, &str)]) -> (Ast, Analysis) {
    let mut ast = Ast::new();
    let mut graph = ModuleGraph::new();

    for (name, source) in units {
        let file = format!("{}.sb", name);
        let tokens = tokenize(source.to_string(), Some(file.clone())).unwrap();
        let items = parse(tokens, Rc::new(file), &mut ast).unwrap();

        let unit = graph.add_unit(name);
        graph.module_mut(unit).items = items;
    }

    let analysis = analyze(&ast, graph);
    (ast, analysis)
}

fn check(source: &str) -> Analysis {
    analyze_units(&[("main", source)]).1
}

fn kinds(analysis: &Analysis) -> Vec<ErrorKind> {
    analysis
        .diagnostics
        .errors()
        .iter()
        .map(|e| e.get_kind())
        .collect()
}

fn assert_clean(source: &str) {
    let analysis = check(source);
    assert!(analysis.is_ok(), "unexpected diagnostics: {:?}", kinds(&analysis));
}

fn assert_reports(source: &str, kind: ErrorKind) {
    let analysis = check(source);
    assert!(
        analysis.diagnostics.has(kind),
        "expected {:?}, got {:?}",
        kind,
        kinds(&analysis)
    );
}

const SHAPES: &str = "
    struct Point { x: i32, y: i32 = 2 }
    trait Shaped { fn area() -> i32; }
    impl Shaped for Point { fn area() -> i32 { return self.x * self.y; } }
";

#[test]
fn test_well_formed_program() {
    assert_clean(&format!(
        "{}
        fn main() -> i32 {{
            let p = Point {{ x: 3 }};
            let s: Shaped = p;
            let t = &p as Shaped;
            return s.area() + t.area();
        }}",
        SHAPES
    ));
}

#[test]
fn test_widening_is_implicit() {
    assert_clean("fn f() { let a: char = 'a'; let b: i64 = a; let c: f64 = b; let d: f32 = 'z'; }");
}

#[test]
fn test_narrowing_needs_cast() {
    assert_reports("fn f() { let a: i64 = 5; let b: i32 = a; }", ErrorKind::CastNotAllowed);
    assert_clean("fn f() { let a: i64 = 5; let b: i32 = a as i32; let c: char = 3.7 as char; }");
}

#[test]
fn test_invalid_casts() {
    assert_reports("fn f() { let b = 1 as bool; }", ErrorKind::CastNotAllowed);
    assert_reports("fn f() { let a: bool = 1; }", ErrorKind::TypeMismatch);
}

#[test]
fn test_operator_rules() {
    assert_reports("fn f() { let a = 1 + true; }", ErrorKind::ExpectedNumeric);
    assert_reports("fn f() { let a = 1 && true; }", ErrorKind::ExpectedBoolean);
    assert_reports("fn f() { let a = 1.5 | 2; }", ErrorKind::ExpectedInteger);
    assert_reports("fn f() { let a = true < 1; }", ErrorKind::IncompatibleOperands);
    assert_reports("fn f() { let a = -true; }", ErrorKind::ExpectedNumeric);
    assert_reports("fn f() { let a = !1; }", ErrorKind::ExpectedBoolean);
    assert_clean("fn f() { let a = 1 < 2.5 && !false; let b = 'a' | 4; let c = 7 % 2; }");
}

#[test]
fn test_expression_types_are_recorded() {
    let (ast, analysis) = analyze_units(&[("main", "fn f() { let x = 1 + 2.5; let y = 'a' + 1; }")]);
    let item = analysis.graph.module(analysis.graph.entry().unwrap()).items[0];

    let StmtKind::FnDecl(decl) = &ast.stmt(item).kind else {
        panic!("expected function");
    };
    let StmtKind::Block(stmts) = &ast.stmt(decl.body).kind else {
        panic!("expected block");
    };

    let initializer = |stmt| match &ast.stmt(stmt).kind {
        StmtKind::VarDecl(var) => var.value.unwrap(),
        other => panic!("unexpected {:?}", other),
    };

    assert_eq!(analysis.type_of(initializer(stmts[0])), Some(&Type::f64()));
    assert_eq!(analysis.type_of(initializer(stmts[1])), Some(&Type::i32()));
}

#[test]
fn test_struct_redefinition_keeps_original() {
    let analysis = check("struct A { } struct A { x: i32 }");
    assert_eq!(analysis.diagnostics.count(ErrorKind::Redefinition), 1);

    let entry = analysis.graph.entry().unwrap();
    let (_, record) = analysis.graph.find_struct(entry, "A").unwrap();
    assert!(record.fields.is_empty());
}

#[test]
fn test_function_redefinition_keeps_original() {
    let analysis = check("fn f() { } fn f() -> i32 { return true; }");
    assert_eq!(kinds(&analysis), vec![ErrorKind::Redefinition]);

    let entry = analysis.graph.entry().unwrap();
    let (_, function) = analysis.graph.find_function(entry, "f").unwrap();
    assert!(function.return_type.is_nothing());
}

#[test]
fn test_field_redefinition() {
    let analysis = check("struct A { x: i32, x: i64 }");
    assert_eq!(kinds(&analysis), vec![ErrorKind::Redefinition]);

    let entry = analysis.graph.entry().unwrap();
    let (_, record) = analysis.graph.find_struct(entry, "A").unwrap();
    assert_eq!(record.fields["x"].ty, Type::i32());
}

#[test]
fn test_local_scopes() {
    assert_reports("fn f() { let a = 1; let a = 2; }", ErrorKind::Redefinition);
    assert_clean("fn g() { let a = 1; { let a = true; } if a > 0 { let b = a; } }");
    assert_reports("fn h() { { let a = 1; } a; }", ErrorKind::UndeclaredVariable);
}

#[test]
fn test_break_and_continue_need_a_loop() {
    assert_reports("fn f() { break; }", ErrorKind::CannotBeHere);
    assert_reports("fn f() { if true { continue; } }", ErrorKind::CannotBeHere);
    assert_clean("fn g() { while true { if true { break; } while false { continue; } continue; } }");
}

#[test]
fn test_return_paths() {
    assert_reports("fn f() -> i32 { if true { return 1; } }", ErrorKind::NotAllPathsReturn);
    assert_reports("fn f() -> i32 { while true { return 1; } }", ErrorKind::NotAllPathsReturn);
    assert_clean("fn g() -> i32 { if true { return 1; } else { return 2; } }");
    assert_clean("fn g() -> i32 { { return 1; } }");
}

#[test]
fn test_return_values() {
    assert_eq!(
        kinds(&check("fn f() { return 1; }")),
        vec![ErrorKind::CannotReturnValue]
    );
    assert_eq!(
        kinds(&check("fn f() -> i32 { return; }")),
        vec![ErrorKind::ExpectedReturnValue]
    );
    assert_reports("fn f() -> i32 { return true; }", ErrorKind::TypeMismatch);
}

#[test]
fn test_missing_trait_method() {
    let analysis = check(
        "trait Shaped { fn area() -> i32; }
         struct Square { }
         impl Shaped for Square { }
         fn f() { let s: Shaped = Square { }; }",
    );

    assert!(analysis.diagnostics.has(ErrorKind::TraitMethodNotImplemented));
    assert!(analysis.diagnostics.has(ErrorKind::TraitNotImplemented));
}

#[test]
fn test_trait_signature_mismatch() {
    assert_reports(
        "trait Shaped { fn area() -> i32; }
         struct Square { }
         impl Shaped for Square { fn area() -> f64 { return 1.0; } }",
        ErrorKind::TraitSignatureMismatch,
    );
}

#[test]
fn test_method_not_in_trait() {
    assert_reports(
        "trait Shaped { fn area() -> i32; }
         struct Square { }
         impl Shaped for Square { fn area() -> i32 { return 1; } fn extra() { } }",
        ErrorKind::UndeclaredMethod,
    );
}

#[test]
fn test_unimplemented_trait_cast() {
    assert_reports(
        "trait Shaped { fn area() -> i32; }
         struct Square { }
         fn f() { let s = Square { } as Shaped; }",
        ErrorKind::TraitNotImplemented,
    );
}

#[test]
fn test_trait_from_submodule() {
    assert_clean(
        "mod shapes { pub trait Shaped { fn area() -> i32; } }
         struct P { }
         impl shapes.Shaped for P { fn area() -> i32 { return 1; } }
         fn f() -> i32 { let s: shapes.Shaped = P { }; return s.area(); }",
    );
}

#[test]
fn test_struct_literal_fields() {
    assert_reports(
        "struct P { x: i32 } fn f() { let p = P { x: 1, x: 2 }; }",
        ErrorKind::FieldAlreadyInitialized,
    );
    assert_reports(
        "struct P { x: i32 } fn f() { let p = P { z: 1 }; }",
        ErrorKind::UndeclaredField,
    );
    assert_reports(
        "struct P { x: i32 } fn f() { let p = P { x: true }; }",
        ErrorKind::TypeMismatch,
    );
}

#[test]
fn test_global_struct_default_folding() {
    let analysis = check(
        "struct Inner { z: i64 = 9 }
         struct P { x: i32 = 4, y: i32, inner: Inner }
         let ORIGIN: P = P { y: 7 };",
    );
    assert!(analysis.is_ok(), "{:?}", kinds(&analysis));

    let entry = analysis.graph.entry().unwrap();
    let (_, origin) = analysis.graph.find_global_var(entry, "ORIGIN").unwrap();
    let ValueData::Aggregate(fields) = &origin.value.as_ref().unwrap().data else {
        panic!("expected aggregate");
    };

    assert_eq!(fields[0].as_i64(), Some(4));
    assert_eq!(fields[1].as_i64(), Some(7));
    match &fields[2].data {
        ValueData::Aggregate(inner) => assert_eq!(inner[0].data, ValueData::I64(9)),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_global_initializers_fold() {
    let analysis = check("let B: i32 = 2 * 3; let C: i64 = B + 1; const N: char = 300 as char;");
    assert!(analysis.is_ok(), "{:?}", kinds(&analysis));

    let entry = analysis.graph.entry().unwrap();
    let (_, c) = analysis.graph.find_global_var(entry, "C").unwrap();
    let value = c.value.as_ref().unwrap();
    assert_eq!(value.ty.kind, TypeKind::I64);
    assert_eq!(value.data, ValueData::I64(7));

    let (_, n) = analysis.graph.find_global_var(entry, "N").unwrap();
    assert_eq!(n.value.as_ref().unwrap().data, ValueData::Char(44));
    assert!(n.is_const);
}

#[test]
fn test_initializers_read_globals_declared_later() {
    let analysis = check(
        "struct S { x: i32 = LIMIT + 1 }
         let A: i32 = B * 2;
         let B: i32 = LIMIT;
         let LIMIT: i32 = 5;
         let ORIGIN: S = S { };",
    );
    assert!(analysis.is_ok(), "{:?}", kinds(&analysis));

    let entry = analysis.graph.entry().unwrap();
    let (_, a) = analysis.graph.find_global_var(entry, "A").unwrap();
    assert_eq!(a.value.as_ref().unwrap().as_i64(), Some(10));

    let (_, origin) = analysis.graph.find_global_var(entry, "ORIGIN").unwrap();
    let ValueData::Aggregate(fields) = &origin.value.as_ref().unwrap().data else {
        panic!("expected aggregate");
    };
    assert_eq!(fields[0].as_i64(), Some(6));
}

#[test]
fn test_field_default_reads_imported_global() {
    let (_, analysis) = analyze_units(&[
        ("main", "import cfg; struct S { x: i32 = cfg.SIZE } let D: i32 = SIZE;"),
        ("cfg", "pub let SIZE: i32 = 4;"),
    ]);

    assert!(analysis.is_ok(), "{:?}", kinds(&analysis));
}

#[test]
fn test_cyclic_globals_are_undeclared() {
    assert_eq!(
        kinds(&check("let A: i32 = B; let B: i32 = A;")),
        vec![ErrorKind::UndeclaredVariable]
    );
    assert_eq!(
        kinds(&check("let A: i32 = 1; let A: i32 = 2;")),
        vec![ErrorKind::Redefinition]
    );
}

#[test]
fn test_global_initializers_must_be_constant() {
    assert_reports(
        "fn one() -> i32 { return 1; } let A: i32 = one();",
        ErrorKind::NotConstantExpression,
    );
    assert_reports(
        "let G: i32 = 1; let P: *i32 = &G;",
        ErrorKind::NotConstantExpression,
    );
    assert_reports(
        "struct S { p: *i32 = &X } let X: i32 = 1;",
        ErrorKind::NotConstantExpression,
    );
    assert_clean("let Q: *i32 = nil; struct S { p: *i32 = nil, n: i32 = -4 }");
}

#[test]
fn test_recursive_structs_rejected() {
    let analysis = check("struct A { b: B } struct B { a: A }");
    assert_eq!(analysis.diagnostics.count(ErrorKind::RecursiveStruct), 2);

    assert_clean("struct Node { value: i32, next: *Node }");
}

#[test]
fn test_import_cycle_rejected() {
    let (_, analysis) = analyze_units(&[("a", "import b;"), ("b", "import a;")]);
    assert_eq!(kinds(&analysis), vec![ErrorKind::ImportCycle]);
}

#[test]
fn test_self_import_rejected() {
    assert_reports("import main;", ErrorKind::ImportCycle);
}

#[test]
fn test_cross_module_calls() {
    let geo = "pub fn area(x: i32) -> i32 { return x * x; } fn secret() -> i32 { return 1; }";

    let (_, analysis) = analyze_units(&[
        ("main", "import geo; fn f() -> i32 { return geo.area(2) + area(3); }"),
        ("geo", geo),
    ]);
    assert!(analysis.is_ok(), "{:?}", kinds(&analysis));

    let (_, analysis) = analyze_units(&[
        ("main", "import geo; fn f() -> i32 { return geo.secret(); }"),
        ("geo", geo),
    ]);
    assert_eq!(kinds(&analysis), vec![ErrorKind::AccessViolation]);
}

#[test]
fn test_same_named_structs_from_different_modules() {
    let a = "pub struct Point { pub x: i32 }";
    let b = "pub struct Point { pub x: i32 }";

    let (_, analysis) = analyze_units(&[
        ("main", "import a; import b; fn main() -> i32 { let p: a.Point = b.Point { x: 1 }; return p.x; }"),
        ("a", a),
        ("b", b),
    ]);
    assert_eq!(kinds(&analysis), vec![ErrorKind::TypeMismatch]);

    let (_, analysis) = analyze_units(&[
        ("main", "import a; import b; fn main() -> i32 { let p = b.Point { x: 1 } as a.Point; return p.x; }"),
        ("a", a),
        ("b", b),
    ]);
    assert_eq!(kinds(&analysis), vec![ErrorKind::CastNotAllowed]);

    let (_, analysis) = analyze_units(&[
        ("main", "import a; import b; fn main() -> i32 { let p: a.Point = a.Point { x: 1 }; return p.x; }"),
        ("a", a),
        ("b", b),
    ]);
    assert!(analysis.is_ok(), "{:?}", kinds(&analysis));
}

#[test]
fn test_trait_signature_compares_module_paths() {
    let (_, analysis) = analyze_units(&[
        (
            "main",
            "import a; import b;
             trait Moves { fn to() -> a.Point; }
             struct Walker { }
             impl Moves for Walker { fn to() -> b.Point { return b.Point { x: 1 }; } }",
        ),
        ("a", "pub struct Point { pub x: i32 }"),
        ("b", "pub struct Point { pub x: i32 }"),
    ]);

    assert!(analysis.diagnostics.has(ErrorKind::TraitSignatureMismatch), "{:?}", kinds(&analysis));
}

#[test]
fn test_private_field_access() {
    let (_, analysis) = analyze_units(&[
        ("main", "import geo; fn f() -> i32 { let p = geo.P { x: 1 }; return p.x + p.y; }"),
        ("geo", "pub struct P { pub x: i32, y: i32 }"),
    ]);

    assert_eq!(kinds(&analysis), vec![ErrorKind::AccessViolation]);
    assert_eq!(analysis.diagnostics.errors()[0].get_args()[1], "y");
}

#[test]
fn test_private_struct_in_submodule() {
    let analysis = check(
        "mod inner { struct Hidden { } pub fn make() { let h = Hidden { }; } }
         fn f() { let h = inner.Hidden { }; inner.make(); }",
    );

    assert_eq!(kinds(&analysis), vec![ErrorKind::AccessViolation]);
}

#[test]
fn test_private_method_access() {
    let (_, analysis) = analyze_units(&[
        ("main", "import geo; fn f(p: *geo.P) { p.open(); p.hidden(); }"),
        ("geo", "pub struct P { } impl P { pub fn open() { } fn hidden() { } }"),
    ]);

    assert_eq!(kinds(&analysis), vec![ErrorKind::AccessViolation]);
}

#[test]
fn test_constant_assignment() {
    assert_reports("fn f() { const a: i32 = 1; a = 2; }", ErrorKind::AssignToConst);
    assert_reports(
        "struct P { const id: i32 = 1 } fn f() { let p = P { }; p.id = 2; }",
        ErrorKind::AssignToConst,
    );
    assert_reports("const A: i32 = 1; fn f() { A += 1; }", ErrorKind::AssignToConst);

    let analysis = check("struct P { x: i32 } impl P { fn reset() { self.x = 0; self = nil; } }");
    assert_eq!(kinds(&analysis), vec![ErrorKind::AssignToConst]);
}

#[test]
fn test_declarations_need_a_value_or_type() {
    assert_reports("fn f() { let c; }", ErrorKind::ExpectedExplicitValue);
    assert_reports("fn f() { const b: i32; }", ErrorKind::ExpectedExplicitValue);
    assert_reports("fn f() { let n = nil; }", ErrorKind::ExpectedExplicitValue);
}

#[test]
fn test_not_assignable() {
    assert_reports("fn f() { 1 = 2; }", ErrorKind::NotAssignable);
    assert_clean("fn f(p: *i32) { *p = 3; *p += 1; p += 1; }");
}

#[test]
fn test_wrong_argument_count() {
    let analysis = check("fn g(a: i32) { } fn f() { g(1, 2); }");
    assert_eq!(kinds(&analysis), vec![ErrorKind::WrongArgumentCount]);
    assert_eq!(analysis.diagnostics.errors()[0].get_args(), &["g", "1", "2"]);
}

#[test]
fn test_argument_coercion() {
    assert_clean("fn g(a: f64) { } fn f() { g(1); g('c'); }");
    assert_reports("fn g(a: i16) { } fn f() { g(1); }", ErrorKind::CastNotAllowed);
}

#[test]
fn test_undeclared_symbols() {
    assert_reports("fn f() { x; }", ErrorKind::UndeclaredVariable);
    assert_reports("fn f() { g(); }", ErrorKind::UndeclaredFunction);
    assert_reports("fn f() { let p = Q { }; }", ErrorKind::UndeclaredStruct);
    assert_reports("struct P { } fn f() { let p = P { }; p.go(); }", ErrorKind::UndeclaredMethod);
    assert_reports("struct P { } fn f() { let p = P { }; p.z; }", ErrorKind::UndeclaredField);
    assert_reports("fn f(a: Nope) { }", ErrorKind::UnknownType);
    assert_reports("import nowhere;", ErrorKind::UndeclaredModule);
    assert_reports("impl Shaped for Nothing { }", ErrorKind::UndeclaredStruct);
}

#[test]
fn test_unknown_types_do_not_cascade() {
    let analysis = check("fn f(a: Nope) -> i32 { let b: i32 = a; return a + 1; }");
    assert_eq!(kinds(&analysis), vec![ErrorKind::UnknownType]);
}

#[test]
fn test_items_in_wrong_place() {
    assert_reports("if true { }", ErrorKind::CannotBeHere);
    assert_reports("fn f() { fn g() { } }", ErrorKind::CannotBeHere);
    assert_reports("fn f() { struct S { } }", ErrorKind::CannotBeHere);
}

#[test]
fn test_nil_comparisons() {
    assert_clean(
        "struct P { } trait T { }
         fn f(p: *P, t: T) -> bool { return p == nil && t != nil && nil == t; }",
    );
    assert_reports(
        "trait T { } fn f(a: T, b: T) -> bool { return a == b; }",
        ErrorKind::IncompatibleOperands,
    );
    assert_reports(
        "struct P { } fn f(a: P, b: P) -> bool { return a == b; }",
        ErrorKind::IncompatibleOperands,
    );
}

#[test]
fn test_conditions_must_be_boolean() {
    assert_reports("fn f() { if 1 { } }", ErrorKind::TypeMismatch);
    assert_reports("fn f() { while 'c' { } }", ErrorKind::TypeMismatch);
}

#[test]
fn test_pointers_and_heap_literals() {
    assert_clean(
        "struct P { x: i32 }
         impl P { pub fn get() -> i32 { return self.x; } }
         fn f() -> i32 { let p = new P { x: 1 }; let q: *P = p; return q.get() + (*q).x; }",
    );
    assert_reports("fn f() { let a = 1; let b = *a; }", ErrorKind::TypeMismatch);
    assert_clean("fn f(p: *i32) -> *i32 { return p + 1; }");
}

#[test]
fn test_heap_literal_type() {
    let (ast, analysis) = analyze_units(&[("main", "struct P { } fn f() { let p = new P { }; }")]);
    let item = analysis.graph.module(analysis.graph.entry().unwrap()).items[1];

    let StmtKind::FnDecl(decl) = &ast.stmt(item).kind else {
        panic!("expected function");
    };
    let StmtKind::Block(stmts) = &ast.stmt(decl.body).kind else {
        panic!("expected block");
    };
    let StmtKind::VarDecl(var) = &ast.stmt(stmts[0]).kind else {
        panic!("expected declaration");
    };

    let ty = analysis.type_of(var.value.unwrap()).unwrap();
    assert_eq!(ty.kind, TypeKind::Struct);
    assert_eq!(ty.pointer_depth, 1);
}
