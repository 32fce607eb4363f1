//! Trait objects and dynamic dispatch.
//!
//! A trait value is a fat pointer `{ i8* data, i8** vtable }`. The vtable
//! of a (struct, trait) pair is an internal constant array holding the
//! struct's methods, bitcast to `i8*`, in the trait's declaration order.
//! Call sites rebuild the method signature as `(i8*, params...) -> ret`
//! from the trait declaration, since the slot itself is untyped.

use std::convert::TryFrom;

use inkwell::{
    module::Linkage,
    values::{BasicMetadataValueEnum, BasicValueEnum, CallableValue, GlobalValue},
    AddressSpace,
};

use crate::{ast::types::Type, errors::errors::CodegenError};

use super::{
    cast::expect_pointer,
    compiler::Compiler,
    identity::{SourceType, TypedValue},
    shadow::mangle,
};

/// Emitted name of the vtable for `struct_path` implementing `trait_path`.
pub fn vtable_name(struct_path: &[String], trait_path: &[String]) -> String {
    format!("vtable.{}.{}", mangle(struct_path), mangle(trait_path))
}

impl<'ctx, 'a> Compiler<'ctx, 'a> {
    /// The vtable of a (struct, trait) pair, synthesized on first request
    /// and reused afterwards.
    pub fn vtable_for(&mut self, struct_path: &[String], trait_path: &[String]) -> Result<GlobalValue<'ctx>, CodegenError> {
        let name = vtable_name(struct_path, trait_path);
        if let Some(vtable) = self.vtables.get(&name) {
            return Ok(*vtable);
        }

        let shadow_struct = self.shadow_struct(struct_path)?;
        let shadow_trait = self.shadow_trait(trait_path)?;
        let i8_ptr = self.i8_ptr_type();

        let slots = shadow_trait
            .methods
            .keys()
            .map(|method| {
                shadow_struct
                    .methods
                    .get(method)
                    .map(|found| {
                        found
                            .value
                            .as_global_value()
                            .as_pointer_value()
                            .const_cast(i8_ptr)
                    })
                    .ok_or_else(|| CodegenError::UnresolvedMethod(mangle(struct_path), method.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let vtable = self
            .module
            .add_global(i8_ptr.array_type(slots.len() as u32), None, &name);
        vtable.set_initializer(&i8_ptr.const_array(&slots));
        vtable.set_constant(true);
        vtable.set_linkage(Linkage::Internal);

        tracing::debug!(vtable = %name, slots = slots.len(), "synthesized vtable");

        self.vtables.insert(name, vtable);
        Ok(vtable)
    }

    /// Builds the fat pointer for a struct value or struct pointer viewed
    /// as `target`. Values without storage are spilled first.
    pub fn make_trait_object(&mut self, value: TypedValue<'ctx>, target: &Type) -> Result<TypedValue<'ctx>, CodegenError> {
        let Some(SourceType::Struct(struct_path)) = value.source.clone() else {
            return Err(CodegenError::UnknownIdentity);
        };

        let data = if value.ty.is_pointer() {
            expect_pointer(value.value)?
        } else {
            match value.place {
                Some(place) => place,
                None => self.spill(value.value)?,
            }
        };

        let i8_ptr = self.i8_ptr_type();
        let data = self.builder.build_pointer_cast(data, i8_ptr, "data")?;

        let vtable = self.vtable_for(&struct_path, &target.path)?;
        let vtable = vtable
            .as_pointer_value()
            .const_cast(i8_ptr.ptr_type(AddressSpace::default()));

        let fat = self.shadow_trait(&target.path)?.fat;
        let object = self
            .builder
            .build_insert_value(fat.get_undef(), data, 0, "")?
            .into_struct_value();
        let object = self
            .builder
            .build_insert_value(object, vtable, 1, "dyn")?
            .into_struct_value();

        Ok(TypedValue {
            source: Some(SourceType::Trait(target.path.clone())),
            ..TypedValue::new(object.into(), target.clone())
        })
    }

    /// Calls `method` through the vtable of the trait object `receiver`.
    /// `args` are already converted to the declared parameter types.
    pub fn call_dynamic(
        &mut self,
        receiver: TypedValue<'ctx>,
        method: &str,
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> Result<TypedValue<'ctx>, CodegenError> {
        let Some(SourceType::Trait(trait_path)) = receiver.source.clone() else {
            return Err(CodegenError::UnknownIdentity);
        };

        let shadow = self.shadow_trait(&trait_path)?;
        let index = shadow
            .method_index(method)
            .ok_or_else(|| CodegenError::UnresolvedMethod(mangle(&trait_path), method.to_string()))?;
        let declared = shadow.methods[index].clone();

        let BasicValueEnum::StructValue(object) = receiver.value else {
            return Err(CodegenError::UnsupportedType(receiver.ty.to_string()));
        };
        let data = self.builder.build_extract_value(object, 0, "data")?;
        let vtable = expect_pointer(self.builder.build_extract_value(object, 1, "vtable")?)?;

        let slot = unsafe {
            self.builder.build_in_bounds_gep(
                vtable,
                &[self.context.i64_type().const_int(index as u64, false)],
                "slot",
            )?
        };
        let raw = expect_pointer(self.builder.build_load(slot, method)?)?;

        let params: Vec<Type> = declared.params.iter().map(|(_, ty)| ty.clone()).collect();
        let function_type = self.function_type(&params, &declared.return_type, Some(self.i8_ptr_type()))?;
        let typed = self
            .builder
            .build_pointer_cast(raw, function_type.ptr_type(AddressSpace::default()), "")?;
        let callable = CallableValue::try_from(typed).map_err(|_| {
            CodegenError::Builder(format!("vtable slot of `{}` is not callable", method))
        })?;

        let mut call_args: Vec<BasicMetadataValueEnum<'ctx>> = vec![data.into()];
        call_args.extend_from_slice(args);

        tracing::debug!(trait_name = %mangle(&trait_path), method, slot = index, "dynamic dispatch");

        let call = self.builder.build_call(callable, &call_args, "")?;
        Ok(self.call_result(call, &declared.return_type))
    }
}
