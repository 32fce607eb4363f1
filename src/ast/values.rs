//! Compile-time values produced by literals and symbolic evaluation.

use super::{
    ast::BinaryOp,
    types::{Type, TypeKind},
};

#[derive(Debug, Clone, PartialEq)]
pub enum ValueData {
    Bool(bool),
    Char(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// Field values of a struct, in declaration order.
    Aggregate(Vec<Value>),
    /// A value only known at run time (addresses, trait objects).
    Opaque,
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub ty: Type,
    pub data: ValueData,
    pub is_nil: bool,
    /// Produced by a `new` expression.
    pub is_allocated: bool,
}

impl Value {
    pub fn new(ty: Type, data: ValueData) -> Self {
        Value {
            ty,
            data,
            is_nil: false,
            is_allocated: false,
        }
    }

    pub fn bool(value: bool) -> Self {
        Self::new(Type::bool(), ValueData::Bool(value))
    }

    pub fn char(value: i8) -> Self {
        Self::new(Type::char(), ValueData::Char(value))
    }

    pub fn i32(value: i32) -> Self {
        Self::new(Type::i32(), ValueData::I32(value))
    }

    pub fn i64(value: i64) -> Self {
        Self::new(Type::i64(), ValueData::I64(value))
    }

    pub fn f32(value: f32) -> Self {
        Self::new(Type::f32(), ValueData::F32(value))
    }

    pub fn f64(value: f64) -> Self {
        Self::new(Type::f64(), ValueData::F64(value))
    }

    pub fn nothing() -> Self {
        Self::new(Type::nothing(), ValueData::Nothing)
    }

    pub fn nil() -> Self {
        Value {
            is_nil: true,
            ..Self::new(Type::nil(), ValueData::Opaque)
        }
    }

    pub fn opaque(ty: Type) -> Self {
        Self::new(ty, ValueData::Opaque)
    }

    pub fn aggregate(ty: Type, fields: Vec<Value>) -> Self {
        Self::new(ty, ValueData::Aggregate(fields))
    }

    /// Integer value of the narrowest-fitting literal type: `i32`, else `i64`.
    pub fn integer_literal(value: i64) -> Self {
        match i32::try_from(value) {
            Ok(v) => Self::i32(v),
            Err(_) => Self::i64(value),
        }
    }

    /// The zero value of a type. Structs get an empty aggregate; use
    /// `Struct::default_value` for the field-by-field default.
    pub fn zero(ty: &Type) -> Self {
        if ty.is_pointer() || ty.is_trait_value() || ty.is_nil() {
            return Value {
                is_nil: true,
                ..Self::opaque(ty.clone())
            };
        }

        let data = match ty.kind {
            TypeKind::Bool => ValueData::Bool(false),
            TypeKind::Char => ValueData::Char(0),
            TypeKind::I16 => ValueData::I16(0),
            TypeKind::I32 => ValueData::I32(0),
            TypeKind::I64 => ValueData::I64(0),
            TypeKind::F32 => ValueData::F32(0.0),
            TypeKind::F64 => ValueData::F64(0.0),
            TypeKind::Struct => ValueData::Aggregate(vec![]),
            TypeKind::Nothing => ValueData::Nothing,
            TypeKind::Trait | TypeKind::Nil | TypeKind::Module | TypeKind::Unknown => {
                ValueData::Opaque
            }
        };

        Self::new(ty.clone(), data)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.data {
            ValueData::Bool(v) => Some(v as i64),
            ValueData::Char(v) => Some(v as i64),
            ValueData::I16(v) => Some(v as i64),
            ValueData::I32(v) => Some(v as i64),
            ValueData::I64(v) => Some(v),
            ValueData::F32(v) => Some(v as i64),
            ValueData::F64(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.data {
            ValueData::F32(v) => Some(v as f64),
            ValueData::F64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.data {
            ValueData::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Converts to `target`. Integers truncate or sign-extend, floats round
    /// to the target width, and float to integer conversion truncates
    /// toward zero. Non-numeric values only take on the new type.
    pub fn cast(&self, target: &Type) -> Value {
        if !target.is_numeric() || !self.ty.is_numeric() {
            return Value {
                ty: target.clone(),
                ..self.clone()
            };
        }

        let data = if self.ty.kind.is_float() && !target.kind.is_float() {
            let v = self.as_f64().unwrap_or_default() as i64;
            integer_data(target.kind, v)
        } else if target.kind.is_float() {
            let v = self.as_f64().unwrap_or_default();
            match target.kind {
                TypeKind::F32 => ValueData::F32(v as f32),
                _ => ValueData::F64(v),
            }
        } else {
            integer_data(target.kind, self.as_i64().unwrap_or_default())
        };

        Value::new(target.clone(), data)
    }

    /// Evaluates `self op rhs` after both sides were cast to `common`.
    ///
    /// Integer arithmetic wraps and division by zero folds to zero, so the
    /// evaluator never traps on code that would only fail at run time.
    pub fn binary(&self, op: BinaryOp, rhs: &Value, common: &Type) -> Value {
        if op.is_logical() {
            let l = self.as_bool().unwrap_or_default();
            let r = rhs.as_bool().unwrap_or_default();
            return Value::bool(match op {
                BinaryOp::And => l && r,
                _ => l || r,
            });
        }

        if !common.is_numeric() {
            return match op {
                BinaryOp::Eq | BinaryOp::Ne => {
                    let same = self.is_nil == rhs.is_nil && self.data == rhs.data;
                    Value::bool((op == BinaryOp::Eq) == same)
                }
                _ => Value::zero(common),
            };
        }

        let lhs = self.cast(common);
        let rhs = rhs.cast(common);

        if common.kind.is_float() {
            let (l, r) = (
                lhs.as_f64().unwrap_or_default(),
                rhs.as_f64().unwrap_or_default(),
            );

            if op.is_comparison() {
                return Value::bool(compare(op, l.partial_cmp(&r)));
            }

            let result = match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                BinaryOp::Rem => l % r,
                _ => 0.0,
            };
            return Value::f64(result).cast(common);
        }

        let (l, r) = (
            lhs.as_i64().unwrap_or_default(),
            rhs.as_i64().unwrap_or_default(),
        );

        if op.is_comparison() {
            return Value::bool(compare(op, Some(l.cmp(&r))));
        }

        let result = match op {
            BinaryOp::Add => l.wrapping_add(r),
            BinaryOp::Sub => l.wrapping_sub(r),
            BinaryOp::Mul => l.wrapping_mul(r),
            BinaryOp::Div => l.checked_div(r).unwrap_or(0),
            BinaryOp::Rem => l.checked_rem(r).unwrap_or(0),
            BinaryOp::BitAnd => l & r,
            BinaryOp::BitOr => l | r,
            _ => 0,
        };

        Value::new(common.clone(), integer_data(common.kind, result))
    }

    pub fn negate(&self) -> Value {
        match self.data {
            ValueData::F32(v) => Value::new(self.ty.clone(), ValueData::F32(-v)),
            ValueData::F64(v) => Value::new(self.ty.clone(), ValueData::F64(-v)),
            _ => match self.as_i64() {
                Some(v) if self.ty.is_integer() => {
                    Value::new(self.ty.clone(), integer_data(self.ty.kind, v.wrapping_neg()))
                }
                _ => self.clone(),
            },
        }
    }
}

fn integer_data(kind: TypeKind, value: i64) -> ValueData {
    match kind {
        TypeKind::Bool => ValueData::Bool(value != 0),
        TypeKind::Char => ValueData::Char(value as i8),
        TypeKind::I16 => ValueData::I16(value as i16),
        TypeKind::I32 => ValueData::I32(value as i32),
        _ => ValueData::I64(value),
    }
}

fn compare(op: BinaryOp, ordering: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    match (op, ordering) {
        (BinaryOp::Eq, Some(Equal)) => true,
        (BinaryOp::Ne, Some(o)) => o != Equal,
        (BinaryOp::Ne, None) => true,
        (BinaryOp::Lt, Some(Less)) => true,
        (BinaryOp::Le, Some(Less | Equal)) => true,
        (BinaryOp::Gt, Some(Greater)) => true,
        (BinaryOp::Ge, Some(Greater | Equal)) => true,
        _ => false,
    }
}
