use super::{
    ast::{Ast, BinaryOp, ExprKind, Literal},
    types::{Type, TypeKind},
    values::{Value, ValueData},
};
use crate::Span;

const NUMERIC: [TypeKind; 6] = [
    TypeKind::Char,
    TypeKind::I16,
    TypeKind::I32,
    TypeKind::I64,
    TypeKind::F32,
    TypeKind::F64,
];

fn sample(kind: TypeKind) -> Value {
    match kind {
        TypeKind::Char => Value::char(-7),
        TypeKind::I16 => Value::new(Type::i16(), ValueData::I16(-300)),
        TypeKind::I32 => Value::i32(70_000),
        TypeKind::I64 => Value::i64(5_000_000_000),
        TypeKind::F32 => Value::f32(1.5),
        _ => Value::f64(2.25),
    }
}

#[test]
fn test_implicit_cast_is_transitive_and_one_directional() {
    for (i, from) in NUMERIC.iter().enumerate() {
        for (j, to) in NUMERIC.iter().enumerate() {
            let allowed = Type::primitive(*from).can_implicitly_cast(&Type::primitive(*to));
            assert_eq!(allowed, j >= i, "{:?} -> {:?}", from, to);
        }
    }
}

#[test]
fn test_implicit_cast_rejects_non_numeric_pairs() {
    assert!(!Type::bool().can_implicitly_cast(&Type::i32()));
    assert!(!Type::i32().can_implicitly_cast(&Type::bool()));
    assert!(!Type::i32().pointer_to().can_implicitly_cast(&Type::i64().pointer_to()));
    assert!(!Type::i32().can_implicitly_cast(&Type::i32().pointer_to()));
}

#[test]
fn test_nil_casts_to_pointers_only() {
    assert!(Type::nil().can_implicitly_cast(&Type::i32().pointer_to()));
    assert!(!Type::nil().can_implicitly_cast(&Type::i32()));
}

#[test]
fn test_cast_yields_target_type() {
    for (i, from) in NUMERIC.iter().enumerate() {
        for to in NUMERIC.iter().skip(i) {
            let target = Type::primitive(*to);
            let cast = sample(*from).cast(&target);
            assert_eq!(cast.ty, target);
        }
    }
}

#[test]
fn test_cast_preserves_value_when_widening() {
    assert_eq!(Value::char(-7).cast(&Type::i64()).data, ValueData::I64(-7));
    assert_eq!(Value::i32(70_000).cast(&Type::f64()).data, ValueData::F64(70_000.0));
    assert_eq!(Value::f32(1.5).cast(&Type::f64()).data, ValueData::F64(1.5));
}

#[test]
fn test_cast_truncates_when_narrowing() {
    assert_eq!(Value::i32(300).cast(&Type::char()).data, ValueData::Char(44));
    assert_eq!(Value::i32(70_000).cast(&Type::i16()).data, ValueData::I16(4464));
    assert_eq!(Value::f64(-2.9).cast(&Type::i32()).data, ValueData::I32(-2));
}

#[test]
fn test_get_common_is_idempotent() {
    for kind in NUMERIC.iter().chain([TypeKind::Bool].iter()) {
        let ty = Type::primitive(*kind);
        assert_eq!(Type::get_common(&ty, &ty), ty);
    }
}

#[test]
fn test_get_common_is_commutative_for_numerics() {
    for a in NUMERIC {
        for b in NUMERIC {
            let (a, b) = (Type::primitive(a), Type::primitive(b));
            assert_eq!(Type::get_common(&a, &b), Type::get_common(&b, &a));
        }
    }
    assert_eq!(Type::get_common(&Type::i16(), &Type::f32()), Type::f32());
    assert_eq!(Type::get_common(&Type::char(), &Type::i64()), Type::i64());
}

#[test]
fn test_get_common_pointer_bias() {
    let pointer = Type::char().pointer_to();
    assert_eq!(Type::get_common(&pointer, &Type::i64()), pointer);
    assert_eq!(Type::get_common(&Type::i32(), &pointer), pointer);
    assert_eq!(Type::get_common(&pointer, &Type::f64()), Type::nothing());
}

#[test]
fn test_get_common_incompatible() {
    assert_eq!(Type::get_common(&Type::bool(), &Type::i32()), Type::nothing());
    assert_eq!(Type::get_common(&Type::nil(), &Type::i32().pointer_to()), Type::i32().pointer_to());
}

#[test]
fn test_same_resolved_compares_paths() {
    let mut graph = crate::symbols::module::ModuleGraph::new();
    let a = graph.add_unit("a");
    let b = graph.add_unit("b");

    let left = Type::structure("Point", a, vec!["a".into(), "Point".into()]);
    let right = Type::structure("Point", b, vec!["b".into(), "Point".into()]);

    assert_eq!(left, right);
    assert!(!left.same_resolved(&right));
    assert!(!left.can_implicitly_cast(&right));
    assert!(left.same_resolved(&left.with_const(true)));
    assert!(!left.pointer_to().same_resolved(&left));
    assert_eq!(Type::get_common(&left, &right), Type::nothing());
}

#[test]
fn test_type_display() {
    assert_eq!(Type::i32().pointer_to().pointer_to().to_string(), "**i32");
    assert_eq!(Type::nothing().to_string(), "void");
}

#[test]
fn test_binary_folding() {
    let sum = Value::i32(2).binary(BinaryOp::Add, &Value::f64(0.5), &Type::f64());
    assert_eq!(sum.data, ValueData::F64(2.5));

    let wrap = Value::i32(i32::MAX).binary(BinaryOp::Add, &Value::i32(1), &Type::i32());
    assert_eq!(wrap.data, ValueData::I32(i32::MIN));

    let div = Value::i32(1).binary(BinaryOp::Div, &Value::i32(0), &Type::i32());
    assert_eq!(div.data, ValueData::I32(0));

    let less = Value::char(3).binary(BinaryOp::Lt, &Value::i64(4), &Type::i64());
    assert_eq!(less, Value::bool(true));

    let bits = Value::i32(6).binary(BinaryOp::BitAnd, &Value::i32(3), &Type::i32());
    assert_eq!(bits.data, ValueData::I32(2));
}

#[test]
fn test_integer_literal_width() {
    assert_eq!(Value::integer_literal(5).ty, Type::i32());
    assert_eq!(Value::integer_literal(1 << 40).ty, Type::i64());
}

#[test]
fn test_zero_values() {
    assert!(Value::zero(&Type::i32().pointer_to()).is_nil);
    assert_eq!(Value::zero(&Type::f32()).data, ValueData::F32(0.0));
    assert_eq!(Value::zero(&Type::bool()).data, ValueData::Bool(false));
}

#[test]
fn test_path_of_member_chain() {
    let mut ast = Ast::new();
    let root = ast.alloc_expr(ExprKind::Symbol("geo".into()), Span::null());
    let member = ast.alloc_expr(
        ExprKind::Member {
            object: root,
            field: "origin".into(),
        },
        Span::null(),
    );
    let literal = ast.alloc_expr(ExprKind::Literal(Literal::Int(1)), Span::null());

    assert_eq!(ast.path_of(member), Some(vec!["geo".to_string(), "origin".to_string()]));
    assert_eq!(ast.path_of(literal), None);
}
