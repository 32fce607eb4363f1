//! Semantic type descriptors.
//!
//! This module defines the types the analyzer reasons about:
//!
//! - The kind enumeration, whose declaration order is the numeric rank
//! - Type descriptors with const-ness, pointer depth and owning module
//! - The implicit-cast lattice (`char -> i16 -> i32 -> i64 -> f32 -> f64`)
//! - Common-type resolution for binary operands

use std::fmt::Display;

use crate::symbols::module::ModuleId;

/// Kind of a type. The derived ordering is the rank used for numeric
/// promotion, so `Char < I16 < I32 < I64 < F32 < F64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeKind {
    Bool,
    Char,
    I16,
    I32,
    I64,
    F32,
    F64,
    Struct,
    Trait,
    Nothing,
    Nil,
    Module,
    Unknown,
}

impl TypeKind {
    pub fn is_numeric(&self) -> bool {
        (TypeKind::Char..=TypeKind::F64).contains(self)
    }

    pub fn is_integer(&self) -> bool {
        (TypeKind::Char..=TypeKind::I64).contains(self)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, TypeKind::F32 | TypeKind::F64)
    }

    /// Every kind a value of this kind may implicitly become, itself excluded.
    pub fn implicit_targets(&self) -> &'static [TypeKind] {
        use TypeKind::*;
        match self {
            Char => &[I16, I32, I64, F32, F64],
            I16 => &[I32, I64, F32, F64],
            I32 => &[I64, F32, F64],
            I64 => &[F32, F64],
            F32 => &[F64],
            _ => &[],
        }
    }

    pub fn from_name(name: &str) -> Option<TypeKind> {
        match name {
            "bool" => Some(TypeKind::Bool),
            "char" => Some(TypeKind::Char),
            "i16" => Some(TypeKind::I16),
            "i32" => Some(TypeKind::I32),
            "i64" => Some(TypeKind::I64),
            "f32" => Some(TypeKind::F32),
            "f64" => Some(TypeKind::F64),
            "void" => Some(TypeKind::Nothing),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Bool => "bool",
            TypeKind::Char => "char",
            TypeKind::I16 => "i16",
            TypeKind::I32 => "i32",
            TypeKind::I64 => "i64",
            TypeKind::F32 => "f32",
            TypeKind::F64 => "f64",
            TypeKind::Struct => "struct",
            TypeKind::Trait => "trait",
            TypeKind::Nothing => "void",
            TypeKind::Nil => "nil",
            TypeKind::Module => "module",
            TypeKind::Unknown => "unknown",
        }
    }
}

/// A resolved type.
///
/// Equality compares kind, name and pointer depth only. The owning module
/// and const flag are ignored, so two structs sharing a bare name in
/// different modules compare equal. Conversions go through
/// [`Type::same_resolved`], which also compares the qualified path.
#[derive(Debug, Clone)]
pub struct Type {
    pub kind: TypeKind,
    pub name: String,
    pub is_const: bool,
    pub pointer_depth: u32,
    pub module: Option<ModuleId>,
    pub path: Vec<String>,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.pointer_depth == other.pointer_depth
    }
}

impl Type {
    pub fn primitive(kind: TypeKind) -> Self {
        Type {
            kind,
            name: kind.name().to_string(),
            is_const: false,
            pointer_depth: 0,
            module: None,
            path: vec![],
        }
    }

    pub fn bool() -> Self {
        Self::primitive(TypeKind::Bool)
    }

    pub fn char() -> Self {
        Self::primitive(TypeKind::Char)
    }

    pub fn i16() -> Self {
        Self::primitive(TypeKind::I16)
    }

    pub fn i32() -> Self {
        Self::primitive(TypeKind::I32)
    }

    pub fn i64() -> Self {
        Self::primitive(TypeKind::I64)
    }

    pub fn f32() -> Self {
        Self::primitive(TypeKind::F32)
    }

    pub fn f64() -> Self {
        Self::primitive(TypeKind::F64)
    }

    pub fn nothing() -> Self {
        Self::primitive(TypeKind::Nothing)
    }

    pub fn nil() -> Self {
        Self::primitive(TypeKind::Nil)
    }

    pub fn unknown() -> Self {
        Self::primitive(TypeKind::Unknown)
    }

    /// A struct type declared in `module`; `path` is its fully qualified
    /// dotted path from the root.
    pub fn structure(name: &str, module: ModuleId, path: Vec<String>) -> Self {
        Type {
            kind: TypeKind::Struct,
            name: name.to_string(),
            is_const: false,
            pointer_depth: 0,
            module: Some(module),
            path,
        }
    }

    pub fn trait_object(name: &str, module: ModuleId, path: Vec<String>) -> Self {
        Type {
            kind: TypeKind::Trait,
            ..Self::structure(name, module, path)
        }
    }

    pub fn module(name: &str, module: ModuleId) -> Self {
        Type {
            kind: TypeKind::Module,
            name: name.to_string(),
            is_const: false,
            pointer_depth: 0,
            module: Some(module),
            path: vec![],
        }
    }

    pub fn pointer_to(&self) -> Self {
        Type {
            pointer_depth: self.pointer_depth + 1,
            is_const: false,
            ..self.clone()
        }
    }

    /// The pointee of a pointer type, or `None` for a value type.
    pub fn deref(&self) -> Option<Self> {
        if self.pointer_depth == 0 {
            return None;
        }

        Some(Type {
            pointer_depth: self.pointer_depth - 1,
            is_const: false,
            ..self.clone()
        })
    }

    pub fn with_pointer_depth(&self, pointer_depth: u32) -> Self {
        Type {
            pointer_depth,
            ..self.clone()
        }
    }

    pub fn with_const(&self, is_const: bool) -> Self {
        Type {
            is_const,
            ..self.clone()
        }
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer_depth > 0
    }

    /// A non-pointer numeric type.
    pub fn is_numeric(&self) -> bool {
        !self.is_pointer() && self.kind.is_numeric()
    }

    pub fn is_integer(&self) -> bool {
        !self.is_pointer() && self.kind.is_integer()
    }

    pub fn is_bool(&self) -> bool {
        !self.is_pointer() && self.kind == TypeKind::Bool
    }

    pub fn is_nothing(&self) -> bool {
        !self.is_pointer() && self.kind == TypeKind::Nothing
    }

    pub fn is_nil(&self) -> bool {
        self.kind == TypeKind::Nil
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == TypeKind::Unknown
    }

    /// A struct held by value.
    pub fn is_struct_value(&self) -> bool {
        !self.is_pointer() && self.kind == TypeKind::Struct
    }

    /// A trait object held by value (a fat pointer once lowered).
    pub fn is_trait_value(&self) -> bool {
        !self.is_pointer() && self.kind == TypeKind::Trait
    }

    /// Whether the type may hold `nil`.
    pub fn accepts_nil(&self) -> bool {
        self.is_pointer() || self.is_trait_value() || self.is_nil()
    }

    /// Fully qualified name used to tell same-named types apart.
    pub fn qualified_name(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else {
            self.path.join(".")
        }
    }

    /// Equality that also tells same-named structs and traits of different
    /// modules apart.
    pub fn same_resolved(&self, other: &Type) -> bool {
        if self != other {
            return false;
        }

        match self.kind {
            TypeKind::Struct | TypeKind::Trait => self.qualified_name() == other.qualified_name(),
            _ => true,
        }
    }

    /// Whether a value of `self` converts to `target` without an explicit cast.
    ///
    /// Covers identity, the numeric widening chain and `nil` to any
    /// nil-accepting type. Struct to trait conversion needs symbol
    /// information and is decided by the analyzer.
    pub fn can_implicitly_cast(&self, target: &Type) -> bool {
        if self.same_resolved(target) {
            return true;
        }

        if self.is_nil() {
            return target.accepts_nil();
        }

        if self.is_pointer() || target.is_pointer() {
            return false;
        }

        self.kind.implicit_targets().contains(&target.kind)
    }

    /// Common type of two binary operands, or `nothing` when they have none.
    pub fn get_common(left: &Type, right: &Type) -> Type {
        if left.same_resolved(right) {
            return left.clone();
        }

        if left.is_pointer() && right.is_integer() {
            return left.clone();
        }

        if right.is_pointer() && left.is_integer() {
            return right.clone();
        }

        if left.is_numeric() && right.is_numeric() {
            return if left.kind >= right.kind {
                left.clone()
            } else {
                right.clone()
            };
        }

        if left.is_nil() && right.accepts_nil() {
            return right.clone();
        }

        if right.is_nil() && left.accepts_nil() {
            return left.clone();
        }

        Type::nothing()
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.kind {
            TypeKind::Struct | TypeKind::Trait | TypeKind::Module => self.qualified_name(),
            kind => kind.name().to_string(),
        };

        write!(f, "{}{}", "*".repeat(self.pointer_depth as usize), name)
    }
}
