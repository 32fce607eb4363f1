//! Lowered representation of types and constant data.
//!
//! Scalars map onto LLVM integers and floats, structs onto named struct
//! types laid out in field declaration order, and trait values onto their
//! fat pointer type. Constants for globals and struct defaults are built
//! from the analyzer's folded [`Value`]s.

use inkwell::{
    types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FloatType, FunctionType, IntType, PointerType},
    values::{BasicValueEnum, StructValue},
    AddressSpace,
};

use crate::{
    ast::{
        types::{Type, TypeKind},
        values::{Value, ValueData},
    },
    errors::errors::CodegenError,
};

use super::{compiler::Compiler, shadow::ShadowField};

impl<'ctx, 'a> Compiler<'ctx, 'a> {
    /// `i8*`, the opaque pointer of trait objects and vtables.
    pub fn i8_ptr_type(&self) -> PointerType<'ctx> {
        self.context.i8_type().ptr_type(AddressSpace::default())
    }

    pub fn int_type(&self, kind: TypeKind) -> Option<IntType<'ctx>> {
        match kind {
            TypeKind::Bool => Some(self.context.bool_type()),
            TypeKind::Char => Some(self.context.i8_type()),
            TypeKind::I16 => Some(self.context.i16_type()),
            TypeKind::I32 => Some(self.context.i32_type()),
            TypeKind::I64 => Some(self.context.i64_type()),
            _ => None,
        }
    }

    pub fn float_type(&self, kind: TypeKind) -> Option<FloatType<'ctx>> {
        match kind {
            TypeKind::F32 => Some(self.context.f32_type()),
            TypeKind::F64 => Some(self.context.f64_type()),
            _ => None,
        }
    }

    /// Converts a semantic type to its LLVM representation.
    pub fn lower_type(&self, ty: &Type) -> Result<BasicTypeEnum<'ctx>, CodegenError> {
        let base: BasicTypeEnum<'ctx> = match ty.kind {
            kind if kind.is_integer() || kind == TypeKind::Bool => self
                .int_type(kind)
                .ok_or_else(|| CodegenError::UnsupportedType(ty.to_string()))?
                .into(),
            kind if kind.is_float() => self
                .float_type(kind)
                .ok_or_else(|| CodegenError::UnsupportedType(ty.to_string()))?
                .into(),
            TypeKind::Struct => self.shadow_struct(&ty.path)?.ty.into(),
            TypeKind::Trait => self.shadow_trait(&ty.path)?.fat.into(),
            TypeKind::Nil => return Ok(self.i8_ptr_type().into()),
            // `*void` is an untyped address
            TypeKind::Nothing if ty.is_pointer() => self.context.i8_type().into(),
            _ => return Err(CodegenError::UnsupportedType(ty.to_string())),
        };

        let mut lowered = base;
        for _ in 0..ty.pointer_depth {
            lowered = lowered.ptr_type(AddressSpace::default()).into();
        }

        Ok(lowered)
    }

    pub fn pointer_type(&self, ty: &Type) -> Result<PointerType<'ctx>, CodegenError> {
        match self.lower_type(ty)? {
            BasicTypeEnum::PointerType(pointer) => Ok(pointer),
            _ => Err(CodegenError::UnsupportedType(ty.to_string())),
        }
    }

    /// Function type for `params -> return_type`, with `receiver` prepended
    /// for methods.
    pub fn function_type(
        &self,
        params: &[Type],
        return_type: &Type,
        receiver: Option<PointerType<'ctx>>,
    ) -> Result<FunctionType<'ctx>, CodegenError> {
        let mut lowered: Vec<BasicMetadataTypeEnum<'ctx>> = vec![];
        if let Some(receiver) = receiver {
            lowered.push(receiver.into());
        }
        for param in params {
            lowered.push(self.lower_type(param)?.into());
        }

        if return_type.is_nothing() {
            return Ok(self.context.void_type().fn_type(&lowered, false));
        }

        Ok(self.lower_type(return_type)?.fn_type(&lowered, false))
    }

    /// Constant of type `ty` holding `value`. Pointers and trait objects
    /// only ever fold to null.
    pub fn const_value(&self, value: &Value, ty: &Type) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        if ty.is_pointer() || ty.is_nil() {
            return Ok(self.pointer_type(ty)?.const_null().into());
        }

        if ty.is_trait_value() {
            return Ok(self.shadow_trait(&ty.path)?.fat.const_zero().into());
        }

        match ty.kind {
            TypeKind::Bool => {
                let bit = value.as_bool().unwrap_or_default() as u64;
                Ok(self.context.bool_type().const_int(bit, false).into())
            }
            kind if kind.is_integer() => {
                let int_type = self
                    .int_type(kind)
                    .ok_or_else(|| CodegenError::UnsupportedType(ty.to_string()))?;
                let bits = value.as_i64().unwrap_or_default() as u64;
                Ok(int_type.const_int(bits, true).into())
            }
            kind if kind.is_float() => {
                let float_type = self
                    .float_type(kind)
                    .ok_or_else(|| CodegenError::UnsupportedType(ty.to_string()))?;
                Ok(float_type.const_float(value.as_f64().unwrap_or_default()).into())
            }
            TypeKind::Struct => match &value.data {
                ValueData::Aggregate(fields) if !fields.is_empty() => {
                    Ok(self.const_aggregate(&ty.path, fields)?.into())
                }
                _ => Ok(self.default_aggregate(&ty.path)?.into()),
            },
            _ => Err(CodegenError::UnsupportedType(ty.to_string())),
        }
    }

    /// Struct constant from folded field values; missing trailing fields
    /// take their defaults.
    fn const_aggregate(&self, path: &[String], values: &[Value]) -> Result<StructValue<'ctx>, CodegenError> {
        let shadow = self.shadow_struct(path)?;

        let fields = shadow
            .fields
            .values()
            .map(|field| match values.get(field.index as usize) {
                Some(value) => self.const_value(value, &field.ty),
                None => self.field_default(field),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(shadow.ty.const_named_struct(&fields))
    }

    /// The value of a struct nobody initialized. Each field takes its
    /// declared default, else a nested default struct, else zero.
    pub fn default_aggregate(&self, path: &[String]) -> Result<StructValue<'ctx>, CodegenError> {
        let shadow = self.shadow_struct(path)?;

        let fields = shadow
            .fields
            .values()
            .map(|field| self.field_default(field))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(shadow.ty.const_named_struct(&fields))
    }

    fn field_default(&self, field: &ShadowField<'ctx>) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        if let Some(value) = &field.default {
            return self.const_value(value, &field.ty);
        }

        // Self-containing structs never reach lowering
        if field.ty.is_struct_value() {
            return Ok(self.default_aggregate(&field.ty.path)?.into());
        }

        self.const_value(&Value::zero(&field.ty), &field.ty)
    }
}
