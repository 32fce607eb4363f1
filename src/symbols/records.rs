//! Symbol records stored in module tables.

use indexmap::IndexMap;

use crate::{
    ast::{
        ast::{Access, StmtId},
        types::Type,
        values::Value,
    },
    Span,
};

use super::module::{ModuleGraph, ModuleId};

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
    /// Symbolically evaluated value; for globals this is the initializer.
    pub value: Option<Value>,
    pub is_const: bool,
    pub access: Access,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<(String, Type)>,
    pub body: Option<StmtId>,
    pub access: Access,
    pub module: ModuleId,
    pub span: Span,
}

impl Function {
    /// Same parameter types and return type, names aside.
    pub fn same_signature(&self, other: &Function) -> bool {
        self.return_type.same_resolved(&other.return_type)
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|((_, a), (_, b))| a.same_resolved(b))
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub function: Function,
    pub is_const: bool,
    pub access: Access,
    /// Trait this method was implemented for, if any.
    pub implements: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    /// Declared default, when the declaration has one.
    pub value: Option<Value>,
    pub ty: Type,
    pub is_const: bool,
    pub access: Access,
    pub manually_initialized: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Trait {
    pub name: String,
    pub module: ModuleId,
    pub path: Vec<String>,
    pub access: Access,
    pub methods: IndexMap<String, Function>,
    pub span: Span,
}

impl Trait {
    pub fn ty(&self) -> Type {
        Type::trait_object(&self.name, self.module, self.path.clone())
    }

    /// Position of `method` in declaration order.
    pub fn method_index(&self, method: &str) -> Option<usize> {
        self.methods.get_index_of(method)
    }
}

#[derive(Debug, Clone)]
pub struct Struct {
    pub name: String,
    pub module: ModuleId,
    pub path: Vec<String>,
    pub access: Access,
    pub fields: IndexMap<String, Field>,
    pub methods: IndexMap<String, Method>,
    /// Implemented traits keyed by their qualified name.
    pub traits: IndexMap<String, Trait>,
    pub span: Span,
}

impl Struct {
    pub fn ty(&self) -> Type {
        Type::structure(&self.name, self.module, self.path.clone())
    }

    pub fn implements(&self, trait_type: &Type) -> bool {
        self.traits.contains_key(&trait_type.qualified_name())
    }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.get_index_of(field)
    }

    /// The value of a struct nobody initialized: every field takes its
    /// declared default, a nested struct default, or its zero value.
    pub fn default_value(&self, graph: &ModuleGraph) -> Value {
        self.default_value_guarded(graph, &mut vec![self.path.clone()])
    }

    fn default_value_guarded(&self, graph: &ModuleGraph, stack: &mut Vec<Vec<String>>) -> Value {
        let fields = self
            .fields
            .values()
            .map(|field| {
                if let Some(value) = &field.value {
                    return value.clone();
                }

                if field.ty.is_struct_value() {
                    if let Some(nested) = graph.struct_of(&field.ty) {
                        // Self-containing structs are rejected by the analyzer
                        if !stack.contains(&nested.path) {
                            stack.push(nested.path.clone());
                            let value = nested.default_value_guarded(graph, stack);
                            stack.pop();
                            return value;
                        }
                    }
                }

                Value::zero(&field.ty)
            })
            .collect();

        Value::aggregate(self.ty(), fields)
    }
}
