//! Conversions between lowered values.
//!
//! Integer widening sign-extends and narrowing truncates. Floats extend or
//! truncate, and integer to float conversion is signed. The common type of
//! two numeric operands is decided from their lowered types alone; analysis
//! already rejected every pair that has none.

use inkwell::{
    types::{BasicTypeEnum, FloatType},
    values::{BasicValueEnum, IntValue, PointerValue},
};

use crate::{ast::types::{Type, TypeKind}, errors::errors::CodegenError};

use super::{
    compiler::Compiler,
    identity::{SourceType, TypedValue},
};

pub fn expect_pointer(value: BasicValueEnum<'_>) -> Result<PointerValue<'_>, CodegenError> {
    match value {
        BasicValueEnum::PointerValue(pointer) => Ok(pointer),
        _ => Err(CodegenError::NotAddressable),
    }
}

pub fn expect_int(value: BasicValueEnum<'_>) -> Result<IntValue<'_>, CodegenError> {
    match value {
        BasicValueEnum::IntValue(int) => Ok(int),
        other => Err(CodegenError::UnsupportedType(format!("{:?}", other.get_type()))),
    }
}

impl<'ctx, 'a> Compiler<'ctx, 'a> {
    fn float_width(&self, ty: FloatType<'ctx>) -> u32 {
        if ty == self.context.f64_type() {
            64
        } else {
            32
        }
    }

    /// Common lowered type of two numeric operands: the wider float if
    /// either side is a float, else the wider integer.
    pub fn common_lowered(&self, left: BasicTypeEnum<'ctx>, right: BasicTypeEnum<'ctx>) -> BasicTypeEnum<'ctx> {
        match (left, right) {
            (BasicTypeEnum::FloatType(l), BasicTypeEnum::FloatType(r)) => {
                if self.float_width(l) >= self.float_width(r) {
                    left
                } else {
                    right
                }
            }
            (BasicTypeEnum::FloatType(_), _) => left,
            (_, BasicTypeEnum::FloatType(_)) => right,
            (BasicTypeEnum::IntType(l), BasicTypeEnum::IntType(r)) => {
                if l.get_bit_width() >= r.get_bit_width() {
                    left
                } else {
                    right
                }
            }
            _ => left,
        }
    }

    /// Converts a numeric value to another lowered numeric type.
    pub fn convert_numeric(
        &self,
        value: BasicValueEnum<'ctx>,
        target: BasicTypeEnum<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        let converted: BasicValueEnum<'ctx> = match (value, target) {
            (BasicValueEnum::IntValue(v), BasicTypeEnum::IntType(t)) => {
                let from = v.get_type().get_bit_width();
                let to = t.get_bit_width();
                if from < to {
                    self.builder.build_int_s_extend(v, t, "sext")?.into()
                } else if from > to {
                    self.builder.build_int_truncate(v, t, "trunc")?.into()
                } else {
                    value
                }
            }
            (BasicValueEnum::IntValue(v), BasicTypeEnum::FloatType(t)) => {
                self.builder.build_signed_int_to_float(v, t, "sitofp")?.into()
            }
            (BasicValueEnum::FloatValue(v), BasicTypeEnum::IntType(t)) => {
                self.builder.build_float_to_signed_int(v, t, "fptosi")?.into()
            }
            (BasicValueEnum::FloatValue(v), BasicTypeEnum::FloatType(t)) => {
                let from = self.float_width(v.get_type());
                let to = self.float_width(t);
                if from < to {
                    self.builder.build_float_ext(v, t, "fpext")?.into()
                } else if from > to {
                    self.builder.build_float_trunc(v, t, "fptrunc")?.into()
                } else {
                    value
                }
            }
            _ => value,
        };

        Ok(converted)
    }

    /// Converts `value` to `target`. Covers every implicit conversion and
    /// explicit cast the analyzer accepts.
    pub fn coerce(&mut self, value: TypedValue<'ctx>, target: &Type) -> Result<TypedValue<'ctx>, CodegenError> {
        let target = target.with_const(false);

        if value.ty.is_nothing() && !target.is_nothing() {
            return Err(CodegenError::VoidValue);
        }

        if value.ty.is_nil() {
            let null: BasicValueEnum<'ctx> = if target.is_trait_value() {
                self.shadow_trait(&target.path)?.fat.const_zero().into()
            } else {
                self.pointer_type(&target)?.const_null().into()
            };
            return Ok(TypedValue {
                source: SourceType::of(&target),
                ..TypedValue::new(null, target)
            });
        }

        if target.is_trait_value() && value.ty.kind == TypeKind::Struct {
            return self.make_trait_object(value, &target);
        }

        if value.ty.is_numeric() && target.is_numeric() {
            let converted = self.convert_numeric(value.value, self.lower_type(&target)?)?;
            return Ok(TypedValue::new(converted, target));
        }

        if value.ty.is_pointer() && target.is_pointer() {
            let lowered = self.pointer_type(&target)?;
            let pointer = expect_pointer(value.value)?;
            let cast = if pointer.get_type() == lowered {
                pointer
            } else {
                self.builder.build_pointer_cast(pointer, lowered, "cast")?
            };
            return Ok(TypedValue {
                source: SourceType::of(&target).or(value.source),
                ..TypedValue::new(cast.into(), target)
            });
        }

        Ok(TypedValue { ty: target, ..value })
    }
}
