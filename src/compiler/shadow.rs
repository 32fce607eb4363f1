//! Code-generator view of the symbol model.
//!
//! Each record mirrors an analyzer record and adds what lowering needs: the
//! LLVM type, a positional field index and the mangled symbol name.

use indexmap::IndexMap;
use inkwell::{
    types::{BasicTypeEnum, StructType},
    values::{BasicValueEnum, FunctionValue, PointerValue},
};

use crate::{
    ast::{types::Type, values::Value},
    symbols::records::Function,
};

use super::identity::SourceType;

/// Emitted name of a qualified symbol path.
pub fn mangle(path: &[String]) -> String {
    path.join(".")
}

#[derive(Debug, Clone)]
pub struct ShadowField<'ctx> {
    pub name: String,
    /// Position in the lowered struct, equal to declaration order.
    pub index: u32,
    pub ty: Type,
    pub llvm: BasicTypeEnum<'ctx>,
    pub default: Option<Value>,
    pub source: Option<SourceType>,
}

#[derive(Debug, Clone)]
pub struct ShadowFunction<'ctx> {
    pub value: FunctionValue<'ctx>,
    pub mangled: String,
    pub params: Vec<Type>,
    pub return_type: Type,
    /// Identity of the struct or trait the function returns, if any.
    pub returns: Option<SourceType>,
}

#[derive(Debug, Clone)]
pub struct ShadowStruct<'ctx> {
    pub name: String,
    pub path: Vec<String>,
    pub ty: StructType<'ctx>,
    pub fields: IndexMap<String, ShadowField<'ctx>>,
    pub methods: IndexMap<String, ShadowFunction<'ctx>>,
}

/// A trait lowers to its fat pointer type `{ i8*, i8** }`.
#[derive(Debug, Clone)]
pub struct ShadowTrait<'ctx> {
    pub name: String,
    pub path: Vec<String>,
    pub fat: StructType<'ctx>,
    /// Declared methods; their order is the vtable slot order.
    pub methods: IndexMap<String, Function>,
}

impl<'ctx> ShadowTrait<'ctx> {
    pub fn method_index(&self, method: &str) -> Option<usize> {
        self.methods.get_index_of(method)
    }
}

#[derive(Debug, Clone)]
pub struct ShadowGlobal<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub ty: Type,
    pub initializer: BasicValueEnum<'ctx>,
    pub source: Option<SourceType>,
}
