use indexmap::IndexMap;

use super::{
    module::{ImportCycle, ModuleGraph, ModuleId},
    records::{Field, Function, Struct},
};
use crate::{
    ast::{
        ast::Access,
        types::Type,
        values::{Value, ValueData},
    },
    Span,
};

fn function(name: &str, module: ModuleId) -> Function {
    Function {
        name: name.to_string(),
        return_type: Type::nothing(),
        params: vec![],
        body: None,
        access: Access::Public,
        module,
        span: Span::null(),
    }
}

fn field(name: &str, ty: Type, value: Option<Value>) -> Field {
    Field {
        name: name.to_string(),
        value,
        ty,
        is_const: false,
        access: Access::Public,
        manually_initialized: false,
        span: Span::null(),
    }
}

fn empty_struct(graph: &ModuleGraph, module: ModuleId, name: &str) -> Struct {
    Struct {
        name: name.to_string(),
        module,
        path: graph.qualify(module, name),
        access: Access::Public,
        fields: IndexMap::new(),
        methods: IndexMap::new(),
        traits: IndexMap::new(),
        span: Span::null(),
    }
}

#[test]
fn test_lookup_checks_local_before_imports() {
    let mut graph = ModuleGraph::new();
    let main = graph.add_unit("main");
    let util = graph.add_unit("util");

    graph.module_mut(util).functions.insert("f".into(), function("f", util));
    graph.module_mut(main).functions.insert("f".into(), function("f", main));
    graph.add_import(main, "util", util).unwrap();

    let (owner, _) = graph.find_function(main, "f").unwrap();
    assert_eq!(owner, main);
}

#[test]
fn test_first_resolving_import_wins() {
    let mut graph = ModuleGraph::new();
    let main = graph.add_unit("main");
    let a = graph.add_unit("a");
    let b = graph.add_unit("b");

    graph.module_mut(a).functions.insert("g".into(), function("g", a));
    graph.module_mut(b).functions.insert("g".into(), function("g", b));
    graph.add_import(main, "b", b).unwrap();
    graph.add_import(main, "a", a).unwrap();

    let (owner, _) = graph.find_function(main, "g").unwrap();
    assert_eq!(owner, b);
    assert!(graph.find_function(main, "missing").is_none());
}

#[test]
fn test_lookup_is_transitive() {
    let mut graph = ModuleGraph::new();
    let main = graph.add_unit("main");
    let a = graph.add_unit("a");
    let b = graph.add_unit("b");

    let point = empty_struct(&graph, b, "Point");
    graph.module_mut(b).structs.insert("Point".into(), point);
    graph.add_import(main, "a", a).unwrap();
    graph.add_import(a, "b", b).unwrap();

    let (owner, found) = graph.find_struct(main, "Point").unwrap();
    assert_eq!(owner, b);
    assert_eq!(found.path, vec!["b".to_string(), "Point".to_string()]);
}

#[test]
fn test_import_cycle_is_rejected() {
    let mut graph = ModuleGraph::new();
    let a = graph.add_unit("a");
    let b = graph.add_unit("b");
    let c = graph.add_unit("c");

    graph.add_import(a, "b", b).unwrap();
    graph.add_import(b, "c", c).unwrap();

    assert_eq!(graph.add_import(c, "a", a), Err(ImportCycle));
    assert_eq!(graph.add_import(a, "a", a), Err(ImportCycle));
    assert!(graph.module(c).imports.is_empty());
}

#[test]
fn test_module_paths() {
    let mut graph = ModuleGraph::new();
    let main = graph.add_unit("main");
    let geo = graph.add_unit("geo");
    let inner = graph.add_submodule(main, "inner", Access::Public);
    let deep = graph.add_submodule(geo, "shapes", Access::Private);

    assert!(graph.path_of(main).is_empty());
    assert_eq!(graph.path_of(inner), vec!["inner".to_string()]);
    assert_eq!(graph.path_of(deep), vec!["geo".to_string(), "shapes".to_string()]);
    assert_eq!(graph.qualify(main, "Point"), vec!["Point".to_string()]);
    assert!(graph.is_within(deep, geo));
    assert!(!graph.is_within(geo, deep));
}

#[test]
fn test_resolve_path() {
    let mut graph = ModuleGraph::new();
    let main = graph.add_unit("main");
    let geo = graph.add_unit("geo");
    let shapes = graph.add_submodule(geo, "shapes", Access::Public);
    let inner = graph.add_submodule(main, "inner", Access::Public);

    let path: Vec<String> = vec!["geo".into(), "shapes".into(), "Circle".into()];
    assert_eq!(graph.resolve_path(main, &path), Some((shapes, "Circle")));

    let local: Vec<String> = vec!["Circle".into()];
    assert_eq!(graph.resolve_path(main, &local), Some((main, "Circle")));

    // Enclosing module's submodules are visible from nested modules
    let sibling: Vec<String> = vec!["inner".into(), "f".into()];
    assert_eq!(graph.resolve_path(inner, &sibling), Some((inner, "f")));

    let missing: Vec<String> = vec!["nope".into(), "f".into()];
    assert_eq!(graph.resolve_path(main, &missing), None);
}

#[test]
fn test_default_value_is_recursive() {
    let mut graph = ModuleGraph::new();
    let main = graph.add_unit("main");

    let mut inner = empty_struct(&graph, main, "Inner");
    inner.fields.insert("a".into(), field("a", Type::i32(), Some(Value::i32(7))));
    inner.fields.insert("b".into(), field("b", Type::f64(), None));
    let inner_ty = inner.ty();
    graph.module_mut(main).structs.insert("Inner".into(), inner);

    let mut outer = empty_struct(&graph, main, "Outer");
    outer.fields.insert("flag".into(), field("flag", Type::bool(), None));
    outer.fields.insert("inner".into(), field("inner", inner_ty.clone(), None));
    outer.fields.insert("next".into(), field("next", inner_ty.pointer_to(), None));

    let value = outer.default_value(&graph);
    let ValueData::Aggregate(fields) = value.data else {
        panic!("expected aggregate");
    };

    assert_eq!(fields[0], Value::bool(false));
    assert_eq!(
        fields[1].data,
        ValueData::Aggregate(vec![Value::i32(7), Value::f64(0.0)])
    );
    assert!(fields[2].is_nil);
}

#[test]
fn test_same_signature_ignores_names() {
    let mut graph = ModuleGraph::new();
    let main = graph.add_unit("main");

    let mut a = function("a", main);
    a.params = vec![("x".into(), Type::i32())];
    let mut b = function("b", main);
    b.params = vec![("y".into(), Type::i32())];
    assert!(a.same_signature(&b));

    b.return_type = Type::i32();
    assert!(!a.same_signature(&b));
}

#[test]
fn test_same_signature_compares_struct_paths() {
    let mut graph = ModuleGraph::new();
    let main = graph.add_unit("main");
    let other = graph.add_unit("other");

    let mut a = function("a", main);
    a.return_type = empty_struct(&graph, main, "Point").ty();
    let mut b = function("b", main);
    b.return_type = empty_struct(&graph, other, "Point").ty();
    assert!(!a.same_signature(&b));

    b.return_type = empty_struct(&graph, main, "Point").ty();
    assert!(a.same_signature(&b));
}
