//! Unit tests for lowering.

use inkwell::{
    context::Context,
    module::Module,
    targets::{InitializationConfig, Target},
    values::AnyValue,
    OptimizationLevel,
};

use super::{compiler::Compiler, dispatch::vtable_name, expr::gen_expression, identity::TypedValue};
use crate::{
    ast::{ast::StmtKind, types::Type},
    driver::{check, compile_units, SourceUnit},
    errors::errors::CodegenError,
};

const SHAPES: &str = "
    struct Point { x: i32, y: i32 = 2 }
    struct Square { side: i32 }
    trait Shaped { fn area() -> i32; }
    impl Shaped for Point { fn area() -> i32 { return self.x * self.y; } }
    impl Shaped for Square { fn area() -> i32 { return self.side * self.side; } }
";

fn lower<'ctx>(context: &'ctx Context, source: &str) -> Module<'ctx> {
    compile_units(context, &[SourceUnit::from_source("main", source)]).unwrap()
}

fn ir(source: &str) -> String {
    let context = Context::create();
    let ir = lower(&context, source).print_to_string().to_string();
    ir
}

fn run_main(source: &str) -> i32 {
    Target::initialize_native(&InitializationConfig::default()).unwrap();

    let context = Context::create();
    let module = lower(&context, source);
    let engine = module
        .create_jit_execution_engine(OptimizationLevel::None)
        .unwrap();

    unsafe {
        let main = engine
            .get_function::<unsafe extern "C" fn() -> i32>("main")
            .unwrap();
        main.call()
    }
}

fn with_shapes(body: &str) -> String {
    format!("{}\n{}", SHAPES, body)
}

#[test]
fn test_struct_layout_and_methods() {
    let ir = ir(SHAPES);

    assert!(ir.contains("%Point = type { i32, i32 }"), "{}", ir);
    assert!(ir.contains("%dyn.Shaped = type { i8*, i8** }"), "{}", ir);
    assert!(ir.contains("define i32 @Point.area(%Point*"), "{}", ir);
    assert!(ir.contains("define i32 @Square.area(%Square*"), "{}", ir);
}

#[test]
fn test_vtable_is_cached() {
    let source = with_shapes(
        "fn main() -> i32 {
            let p = Point { x: 3 };
            let a: Shaped = p;
            let b: Shaped = &p as Shaped;
            return a.area() + b.area();
        }",
    );
    let units = [SourceUnit::from_source("main", &source)];
    let (ast, analysis) = check(&units).unwrap();

    let context = Context::create();
    let mut compiler = Compiler::new(&context, &ast, &analysis, "main").unwrap();
    compiler.lower().unwrap();
    assert_eq!(compiler.vtables.len(), 1);

    let point = vec!["Point".to_string()];
    let shaped = vec!["Shaped".to_string()];
    let first = compiler.vtable_for(&point, &shaped).unwrap();
    let second = compiler.vtable_for(&point, &shaped).unwrap();
    assert_eq!(first.as_pointer_value(), second.as_pointer_value());
    assert_eq!(compiler.vtables.len(), 1);

    let ir = compiler.finish().unwrap().print_to_string().to_string();
    let declaration = format!("@{} =", vtable_name(&point, &shaped));
    assert_eq!(ir.matches(&declaration).count(), 1, "{}", ir);
    assert!(ir.contains("internal constant [1 x i8*]"), "{}", ir);
}

#[test]
fn test_unused_vtables_are_not_emitted() {
    assert!(!ir(SHAPES).contains("vtable."));
}

#[test]
fn test_default_aggregate_constant() {
    let units = [SourceUnit::from_source("main", SHAPES)];
    let (ast, analysis) = check(&units).unwrap();

    let context = Context::create();
    let mut compiler = Compiler::new(&context, &ast, &analysis, "main").unwrap();
    compiler.lower().unwrap();

    let point = compiler.default_aggregate(&["Point".to_string()]).unwrap();
    assert_eq!(point.print_to_string().to_string(), "%Point { i32 0, i32 2 }");
}

#[test]
fn test_global_initializers_are_constants() {
    let ir = ir(&with_shapes(
        "let ORIGIN: Point = Point { x: 3 };
         const LIMIT: i64 = 4 * 5;",
    ));

    assert!(ir.contains("@ORIGIN = global %Point { i32 3, i32 2 }"), "{}", ir);
    assert!(ir.contains("@LIMIT = constant i64 20"), "{}", ir);
}

#[test]
fn test_numeric_coercion_instructions() {
    let ir = ir("fn widen(a: i32) -> f64 { let b: i64 = a; return b; }
                 fn narrow(a: f64) -> char { return a as char; }");

    assert!(ir.contains("sext i32"), "{}", ir);
    assert!(ir.contains("sitofp i64"), "{}", ir);
    assert!(ir.contains("fptosi double"), "{}", ir);
}

#[test]
fn test_dynamic_dispatch_picks_implementation() {
    let result = run_main(&with_shapes(
        "fn total(a: Shaped, b: Shaped) -> i32 { return a.area() + b.area(); }
         fn main() -> i32 {
            let p = Point { x: 3 };
            let s = Square { side: 4 };
            return total(p, s);
         }",
    ));

    assert_eq!(result, 22);
}

#[test]
fn test_trait_object_aliases_variable() {
    let result = run_main(&with_shapes(
        "fn main() -> i32 {
            let p = Point { x: 3 };
            let s: Shaped = &p as Shaped;
            p.x = 10;
            return s.area();
         }",
    ));

    assert_eq!(result, 20);
}

#[test]
fn test_heap_struct_through_pointer() {
    let result = run_main(&with_shapes(
        "fn main() -> i32 {
            let q = new Point { x: 5 };
            let s: Shaped = q;
            return q.area() + s.area();
         }",
    ));

    assert_eq!(result, 20);
}

#[test]
fn test_nested_loop_break() {
    let result = run_main(
        "fn main() -> i32 {
            let count = 0;
            let i = 0;
            while i < 3 {
                let j = 0;
                while true {
                    if j == 2 { break; }
                    count += 1;
                    j += 1;
                }
                i += 1;
                if i == 100 { continue; }
            }
            return count;
         }",
    );

    assert_eq!(result, 6);
}

#[test]
fn test_logical_operators_short_circuit() {
    let result = run_main(
        "let CALLS: i32 = 0;
         fn touch() -> bool { CALLS += 1; return true; }
         fn main() -> i32 {
            let a = false && touch();
            let b = true || touch();
            let c = true && touch();
            if a || !b || !c { return -1; }
            return CALLS;
         }",
    );

    assert_eq!(result, 1);
}

#[test]
fn test_casts_truncate_and_convert() {
    let result = run_main(
        "fn main() -> i32 {
            let f = 7.9;
            let c: char = 300 as char;
            return (f as i32) * 100 + c;
         }",
    );

    assert_eq!(result, 744);
}

#[test]
fn test_nil_pointer_comparison() {
    let result = run_main(&with_shapes(
        "fn main() -> i32 {
            let p: *Point = nil;
            let s: Shaped = nil;
            if p == nil && s == nil {
                p = new Point { x: 1 };
                if p != nil { return p.y; }
            }
            return 0;
         }",
    ));

    assert_eq!(result, 2);
}

#[test]
fn test_pointer_compared_with_integer() {
    let result = run_main(
        "fn main() -> i32 {
            let x = 1;
            let p = &x;
            let q: *i32 = nil;
            let r = 0;
            if p == 0 { r += 100; }
            if p != 0 { r += 1; }
            if q == 0 { r += 10; }
            if 0 == q { r += 1000; }
            return r;
         }",
    );

    assert_eq!(result, 1011);
}

#[test]
fn test_void_call_result_is_not_a_value() {
    let units = [SourceUnit::from_source("main", SHAPES)];
    let (ast, analysis) = check(&units).unwrap();

    let context = Context::create();
    let mut compiler = Compiler::new(&context, &ast, &analysis, "main").unwrap();
    compiler.lower().unwrap();

    let unit = TypedValue::unit(&context);
    assert!(unit.ty.is_nothing());
    assert!(matches!(compiler.coerce(unit.clone(), &Type::i32()), Err(CodegenError::VoidValue)));
    assert!(compiler.coerce(unit, &Type::nothing()).is_ok());
}

#[test]
fn test_void_calls_as_statements() {
    let result = run_main(
        "let HITS: i32 = 0;
         fn hit() { HITS += 1; }
         fn main() -> i32 { hit(); hit(); return HITS; }",
    );

    assert_eq!(result, 2);
}

#[test]
fn test_defaults_read_later_globals() {
    let result = run_main(
        "struct Box { w: i32 = WIDTH * 2 }
         let FIRST: Box = Box { };
         let WIDTH: i32 = 7;
         fn main() -> i32 { let b = Box { }; return FIRST.w + b.w; }",
    );

    assert_eq!(result, 28);
}

#[test]
fn test_module_scope_read_yields_initializer() {
    let units = [SourceUnit::from_source("main", "let B: i32 = 41; let C: i32 = B;")];
    let (ast, analysis) = check(&units).unwrap();

    let context = Context::create();
    let mut compiler = Compiler::new(&context, &ast, &analysis, "main").unwrap();
    compiler.lower().unwrap();

    let entry = analysis.graph.entry().unwrap();
    let read = analysis
        .graph
        .module(entry)
        .items
        .iter()
        .find_map(|item| match &ast.stmt(*item).kind {
            StmtKind::VarDecl(decl) if decl.name == "C" => decl.value,
            _ => None,
        })
        .unwrap();

    let value = gen_expression(&mut compiler, read).unwrap();
    assert!(value.place.is_none());
    assert_eq!(value.value.into_int_value().get_sign_extended_constant(), Some(41));
}
