//! Static identity recovery.
//!
//! Once lowered, a struct is an anonymous aggregate or pointer and a trait
//! object is a pair of opaque pointers. Field access, method resolution and
//! trait-object construction still need to know which struct or trait an
//! expression denotes. Every lowered value therefore travels as a
//! [`TypedValue`] carrying that identity, and [`Compiler::static_source_of`]
//! recovers it from the expression itself.

use inkwell::{
    context::Context,
    values::{BasicValueEnum, PointerValue},
};

use crate::{
    ast::{
        ast::{ExprId, ExprKind, UnaryOp},
        types::{Type, TypeKind},
    },
    errors::errors::CodegenError,
};

use super::compiler::{Compiler, Local};

/// The declared struct or trait a lowered value belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceType {
    Struct(Vec<String>),
    Trait(Vec<String>),
}

impl SourceType {
    /// Identity of a struct or trait type at any pointer depth.
    pub fn of(ty: &Type) -> Option<SourceType> {
        match ty.kind {
            TypeKind::Struct => Some(SourceType::Struct(ty.path.clone())),
            TypeKind::Trait => Some(SourceType::Trait(ty.path.clone())),
            _ => None,
        }
    }

    pub fn path(&self) -> &[String] {
        match self {
            SourceType::Struct(path) | SourceType::Trait(path) => path,
        }
    }
}

/// A lowered value with its semantic type and identity.
#[derive(Debug, Clone)]
pub struct TypedValue<'ctx> {
    pub value: BasicValueEnum<'ctx>,
    pub ty: Type,
    pub source: Option<SourceType>,
    /// Storage the value was loaded from, when it has any.
    pub place: Option<PointerValue<'ctx>>,
}

impl<'ctx> TypedValue<'ctx> {
    pub fn new(value: BasicValueEnum<'ctx>, ty: Type) -> Self {
        TypedValue {
            value,
            ty,
            source: None,
            place: None,
        }
    }

    /// Result of a call returning nothing: an empty aggregate typed `void`.
    /// Conversions reject it, so it never reaches a slot.
    pub fn unit(context: &'ctx Context) -> Self {
        TypedValue::new(context.const_struct(&[], false).into(), Type::nothing())
    }

    pub fn with_place(self, place: PointerValue<'ctx>) -> Self {
        TypedValue {
            place: Some(place),
            ..self
        }
    }
}

impl<'ctx, 'a> Compiler<'ctx, 'a> {
    /// Identity tag of a local. The receiver slot carries no tag of its own
    /// and takes the owning method's struct.
    pub fn local_source(&self, local: &Local<'ctx>) -> Option<SourceType> {
        if local.receiver {
            return self.function.as_ref().and_then(|f| f.this.clone());
        }

        local.source.clone()
    }

    /// Recovers the struct or trait `expr` denotes, following the same
    /// expression kinds the lowering does.
    pub fn static_source_of(&self, expr: ExprId) -> Result<SourceType, CodegenError> {
        let found = match &self.ast.expr(expr).kind {
            ExprKind::Symbol(name) => match self.lookup_local(name) {
                Some(local) => self.local_source(local),
                None => self.find_global(name).and_then(|global| global.source.clone()),
            },
            ExprKind::Call { callee, .. } => {
                let path = self.ast.path_of(*callee).ok_or(CodegenError::UnknownIdentity)?;
                self.resolve_function(&path)?.returns.clone()
            }
            ExprKind::Member { object, field } => match self.module_path(*object) {
                Some(module) => self
                    .globals
                    .get(&self.graph.qualify(module, field))
                    .and_then(|global| global.source.clone()),
                None => match self.static_source_of(*object)? {
                    SourceType::Struct(path) => self
                        .shadow_struct(&path)?
                        .fields
                        .get(field)
                        .and_then(|declared| declared.source.clone()),
                    SourceType::Trait(_) => None,
                },
            },
            ExprKind::MethodCall {
                receiver, method, ..
            } => match self.module_path(*receiver) {
                Some(module) => self
                    .functions
                    .get(&self.graph.qualify(module, method))
                    .and_then(|function| function.returns.clone()),
                None => match self.static_source_of(*receiver)? {
                    SourceType::Struct(path) => self
                        .shadow_struct(&path)?
                        .methods
                        .get(method)
                        .and_then(|found| found.returns.clone()),
                    SourceType::Trait(path) => self
                        .shadow_trait(&path)?
                        .methods
                        .get(method)
                        .and_then(|found| SourceType::of(&found.return_type)),
                },
            },
            ExprKind::StructLiteral { path, .. } => {
                Some(SourceType::Struct(self.resolve_struct_path(path)?))
            }
            ExprKind::Cast { ty, .. } => SourceType::of(&self.resolve_type(ty)?),
            ExprKind::Unary {
                op: UnaryOp::AddressOf | UnaryOp::Deref,
                operand,
            } => Some(self.static_source_of(*operand)?),
            ExprKind::Assignment { target, .. } => Some(self.static_source_of(*target)?),
            _ => self.expr_types.get(expr).and_then(SourceType::of),
        };

        found.ok_or(CodegenError::UnknownIdentity)
    }
}
