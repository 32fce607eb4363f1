//! Main compiler module.
//!
//! This module contains the core Compiler structure. It owns the LLVM
//! context handles and the shadow symbol tables, runs the declaration
//! passes, and hands bodies to the statement and expression generators.

use indexmap::IndexMap;
use inkwell::{
    attributes::{Attribute, AttributeLoc},
    basic_block::BasicBlock,
    builder::Builder,
    context::Context,
    module::{Linkage, Module},
    types::{BasicType, BasicTypeEnum, FunctionType, PointerType},
    values::{BasicValueEnum, FunctionValue, GlobalValue, PointerValue},
    AddressSpace,
};
use la_arena::ArenaMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast::{
        ast::{Ast, ExprId, ExprKind, StmtKind, TypeExpr, UnaryOp},
        types::{Type, TypeKind},
        values::Value,
    },
    errors::errors::CodegenError,
    symbols::module::{ModuleGraph, ModuleId},
    type_checker::type_checker::Analysis,
};

use super::{
    identity::SourceType,
    shadow::{mangle, ShadowField, ShadowFunction, ShadowGlobal, ShadowStruct, ShadowTrait},
    stmt::gen_bodies,
};

/// A stack slot of the function being lowered.
#[derive(Debug, Clone)]
pub struct Local<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub ty: Type,
    pub source: Option<SourceType>,
    /// The implicit `self` of a method.
    pub receiver: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionState<'ctx> {
    pub value: FunctionValue<'ctx>,
    pub return_type: Type,
    /// Struct owning the method being lowered.
    pub this: Option<SourceType>,
}

#[derive(Debug, Clone, Copy)]
pub struct LoopTarget<'ctx> {
    pub continue_block: BasicBlock<'ctx>,
    pub break_block: BasicBlock<'ctx>,
}

/// The structure that holds the state of one lowering.
///
/// Shadow tables are keyed by qualified path, so same-named structs in
/// different modules never collide.
pub struct Compiler<'ctx, 'a> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,

    pub ast: &'a Ast,
    pub graph: &'a ModuleGraph,
    pub expr_types: &'a ArenaMap<ExprId, Type>,
    /// Module whose code is being lowered; name resolution starts here.
    pub current_module: ModuleId,

    pub structs: FxHashMap<Vec<String>, ShadowStruct<'ctx>>,
    pub traits: FxHashMap<Vec<String>, ShadowTrait<'ctx>>,
    pub functions: FxHashMap<Vec<String>, ShadowFunction<'ctx>>,
    pub globals: FxHashMap<Vec<String>, ShadowGlobal<'ctx>>,
    /// Synthesized vtables by their emitted name.
    pub vtables: FxHashMap<String, GlobalValue<'ctx>>,

    pub scopes: Vec<FxHashMap<String, Local<'ctx>>>,
    pub loops: Vec<LoopTarget<'ctx>>,
    pub function: Option<FunctionState<'ctx>>,
}

impl<'ctx, 'a> Compiler<'ctx, 'a> {
    pub fn new(
        context: &'ctx Context,
        ast: &'a Ast,
        analysis: &'a Analysis,
        name: &str,
    ) -> Result<Self, CodegenError> {
        let graph = &analysis.graph;
        let entry = graph.entry().ok_or(CodegenError::NoEntry)?;

        Ok(Compiler {
            context,
            module: context.create_module(name),
            builder: context.create_builder(),
            ast,
            graph,
            expr_types: &analysis.expr_types,
            current_module: entry,
            structs: FxHashMap::default(),
            traits: FxHashMap::default(),
            functions: FxHashMap::default(),
            globals: FxHashMap::default(),
            vtables: FxHashMap::default(),
            scopes: vec![],
            loops: vec![],
            function: None,
        })
    }

    /// Declares every type, function and global, then lowers every body.
    pub fn lower(&mut self) -> Result<(), CodegenError> {
        tracing::info!(module = %self.module.get_name().to_string_lossy(), "lowering started");

        self.declare_types()?;
        self.declare_functions()?;
        self.declare_globals()?;
        gen_bodies(self)?;

        tracing::info!(
            functions = self.functions.len(),
            vtables = self.vtables.len(),
            "lowering finished"
        );
        Ok(())
    }

    /// Runs the verifier and releases the module.
    pub fn finish(self) -> Result<Module<'ctx>, CodegenError> {
        self.module
            .verify()
            .map_err(|message| CodegenError::Verify(message.to_string()))?;

        Ok(self.module)
    }

    /// Top-level items of every module, in module then source order.
    fn declarations(&self) -> Vec<(ModuleId, &'a StmtKind)> {
        let ast = self.ast;
        let graph = self.graph;

        graph
            .iter()
            .flat_map(|(id, module)| module.items.iter().map(move |item| (id, &ast.stmt(*item).kind)))
            .collect()
    }

    fn declare_types(&mut self) -> Result<(), CodegenError> {
        let graph = self.graph;
        let i8_ptr = self.i8_ptr_type();
        let vtable_ptr = i8_ptr.ptr_type(AddressSpace::default());

        for (module, kind) in self.declarations() {
            match kind {
                StmtKind::StructDecl(decl) => {
                    let Some(record) = graph.module(module).structs.get(&decl.name) else {
                        continue;
                    };
                    if self.structs.contains_key(&record.path) {
                        continue;
                    }

                    let ty = self.context.opaque_struct_type(&mangle(&record.path));
                    self.structs.insert(
                        record.path.clone(),
                        ShadowStruct {
                            name: record.name.clone(),
                            path: record.path.clone(),
                            ty,
                            fields: IndexMap::new(),
                            methods: IndexMap::new(),
                        },
                    );
                }
                StmtKind::TraitDecl(decl) => {
                    let Some(record) = graph.module(module).traits.get(&decl.name) else {
                        continue;
                    };
                    if self.traits.contains_key(&record.path) {
                        continue;
                    }

                    let fat = self
                        .context
                        .opaque_struct_type(&format!("dyn.{}", mangle(&record.path)));
                    fat.set_body(&[i8_ptr.into(), vtable_ptr.into()], false);

                    self.traits.insert(
                        record.path.clone(),
                        ShadowTrait {
                            name: record.name.clone(),
                            path: record.path.clone(),
                            fat,
                            methods: record.methods.clone(),
                        },
                    );
                }
                _ => {}
            }
        }

        // Bodies are set once every struct exists, so fields may name any of them
        let mut laid_out = FxHashSet::default();

        for (module, kind) in self.declarations() {
            let StmtKind::StructDecl(decl) = kind else {
                continue;
            };
            let Some(record) = graph.module(module).structs.get(&decl.name) else {
                continue;
            };
            if !laid_out.insert(record.path.clone()) {
                continue;
            }

            let mut fields = IndexMap::new();
            for (index, field) in record.fields.values().enumerate() {
                fields.insert(
                    field.name.clone(),
                    ShadowField {
                        name: field.name.clone(),
                        index: index as u32,
                        ty: field.ty.clone(),
                        llvm: self.lower_type(&field.ty)?,
                        default: field.value.clone(),
                        source: SourceType::of(&field.ty),
                    },
                );
            }

            let body: Vec<BasicTypeEnum> = fields.values().map(|f| f.llvm).collect();
            let shadow = self
                .structs
                .get_mut(&record.path)
                .ok_or_else(|| CodegenError::UnresolvedStruct(mangle(&record.path)))?;
            shadow.ty.set_body(&body, false);
            shadow.fields = fields;

            tracing::debug!(name = %mangle(&record.path), fields = body.len(), "declared struct");
        }

        Ok(())
    }

    fn declare_functions(&mut self) -> Result<(), CodegenError> {
        let graph = self.graph;

        for (module, kind) in self.declarations() {
            match kind {
                StmtKind::FnDecl(decl) => {
                    let Some(record) = graph
                        .module(module)
                        .functions
                        .get(&decl.signature.name)
                        .filter(|f| f.body == Some(decl.body))
                    else {
                        continue;
                    };

                    let path = graph.qualify(module, &record.name);
                    let params: Vec<Type> = record.params.iter().map(|(_, ty)| ty.clone()).collect();
                    let function = self.declare_function(&path, &params, &record.return_type, None)?;
                    self.functions.insert(path, function);
                }
                StmtKind::Impl(decl) => {
                    let Some(record) = graph.module(module).structs.get(&decl.struct_name) else {
                        continue;
                    };
                    let receiver = self.shadow_struct(&record.path)?.ty.ptr_type(AddressSpace::default());

                    for method in &decl.methods {
                        let Some(found) = record
                            .methods
                            .get(&method.signature.name)
                            .filter(|found| found.function.body == Some(method.body))
                        else {
                            continue;
                        };

                        let mut path = record.path.clone();
                        path.push(found.function.name.clone());
                        let params: Vec<Type> =
                            found.function.params.iter().map(|(_, ty)| ty.clone()).collect();
                        let function = self.declare_function(
                            &path,
                            &params,
                            &found.function.return_type,
                            Some(receiver),
                        )?;

                        self.structs
                            .get_mut(&record.path)
                            .ok_or_else(|| CodegenError::UnresolvedStruct(mangle(&record.path)))?
                            .methods
                            .insert(found.function.name.clone(), function);
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn declare_function(
        &self,
        path: &[String],
        params: &[Type],
        return_type: &Type,
        receiver: Option<PointerType<'ctx>>,
    ) -> Result<ShadowFunction<'ctx>, CodegenError> {
        let mangled = mangle(path);
        let function_type = self.function_type(params, return_type, receiver)?;
        let value = self.create_function_proto(&mangled, function_type);

        tracing::debug!(name = %mangled, params = params.len(), "declared function");

        Ok(ShadowFunction {
            value,
            mangled,
            params: params.to_vec(),
            return_type: return_type.clone(),
            returns: SourceType::of(return_type),
        })
    }

    fn declare_globals(&mut self) -> Result<(), CodegenError> {
        let graph = self.graph;

        for (module, kind) in self.declarations() {
            let StmtKind::VarDecl(decl) = kind else {
                continue;
            };
            let Some(variable) = graph.module(module).variables.get(&decl.name) else {
                continue;
            };

            let path = graph.qualify(module, &variable.name);
            if self.globals.contains_key(&path) {
                continue;
            }

            let value = variable
                .value
                .clone()
                .unwrap_or_else(|| Value::zero(&variable.ty));
            let initializer = self.const_value(&value, &variable.ty)?;

            let global = self
                .module
                .add_global(self.lower_type(&variable.ty)?, None, &mangle(&path));
            global.set_initializer(&initializer);
            global.set_constant(variable.is_const);

            tracing::debug!(name = %mangle(&path), ty = %variable.ty, "declared global");

            self.globals.insert(
                path,
                ShadowGlobal {
                    ptr: global.as_pointer_value(),
                    ty: variable.ty.clone(),
                    initializer,
                    source: SourceType::of(&variable.ty),
                },
            );
        }

        Ok(())
    }

    /// Creates the function prototype in the module with the attributes
    /// every emitted function carries.
    pub fn create_function_proto(&self, name: &str, function_type: FunctionType<'ctx>) -> FunctionValue<'ctx> {
        let function = self
            .module
            .add_function(name, function_type, Some(Linkage::External));

        let attributes = [
            self.context
                .create_enum_attribute(Attribute::get_named_enum_kind_id("uwtable"), 0),
            self.context
                .create_enum_attribute(Attribute::get_named_enum_kind_id("nounwind"), 0),
        ];

        for attribute in attributes.iter() {
            function.add_attribute(AttributeLoc::Function, *attribute);
        }

        function
    }

    /// Creates the entry block of `function` and positions the builder in it.
    pub fn create_function_block(&self, function: FunctionValue<'ctx>) {
        let entry = self.create_basic_block("entry", function);
        self.builder.position_at_end(entry);
    }

    pub fn create_basic_block(&self, name: &str, function: FunctionValue<'ctx>) -> BasicBlock<'ctx> {
        self.context.append_basic_block(function, name)
    }

    pub fn current_function(&self) -> Result<FunctionValue<'ctx>, CodegenError> {
        self.function
            .as_ref()
            .map(|f| f.value)
            .ok_or_else(|| CodegenError::Builder("no function is being lowered".into()))
    }

    /// Whether the current block already ends in a terminator.
    pub fn is_terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_terminator())
            .is_some()
    }

    /// Allocates a stack slot at the top of the entry block, so slots made
    /// inside loops are not re-allocated per iteration.
    pub fn entry_alloca(&self, ty: BasicTypeEnum<'ctx>, name: &str) -> Result<PointerValue<'ctx>, CodegenError> {
        let function = self.current_function()?;
        let entry = function
            .get_first_basic_block()
            .ok_or_else(|| CodegenError::Builder("function has no entry block".into()))?;

        let builder = self.context.create_builder();
        match entry.get_first_instruction() {
            Some(first) => builder.position_before(&first),
            None => builder.position_at_end(entry),
        }

        Ok(builder.build_alloca(ty, name)?)
    }

    /// Stores `value` in a fresh stack slot and returns its address.
    pub fn spill(&self, value: BasicValueEnum<'ctx>) -> Result<PointerValue<'ctx>, CodegenError> {
        let slot = self.entry_alloca(value.get_type(), "spill")?;
        self.builder.build_store(slot, value)?;
        Ok(slot)
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn declare_local(&mut self, name: &str, local: Local<'ctx>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), local);
        }
    }

    pub fn lookup_local(&self, name: &str) -> Option<&Local<'ctx>> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn find_global(&self, name: &str) -> Option<&ShadowGlobal<'ctx>> {
        let (owner, _) = self.graph.find_global_var(self.current_module, name)?;
        self.globals.get(&self.graph.qualify(owner, name))
    }

    pub fn expr_type(&self, expr: ExprId) -> Result<Type, CodegenError> {
        self.expr_types
            .get(expr)
            .cloned()
            .ok_or_else(|| CodegenError::UnsupportedType("<unchecked expression>".into()))
    }

    pub fn shadow_struct(&self, path: &[String]) -> Result<&ShadowStruct<'ctx>, CodegenError> {
        self.structs
            .get(path)
            .ok_or_else(|| CodegenError::UnresolvedStruct(mangle(path)))
    }

    pub fn shadow_trait(&self, path: &[String]) -> Result<&ShadowTrait<'ctx>, CodegenError> {
        self.traits
            .get(path)
            .ok_or_else(|| CodegenError::UnresolvedTrait(mangle(path)))
    }

    /// Resolves a call path the way the analyzer does: a bare name searches
    /// the current module and its imports, a qualified one only the named
    /// module.
    pub fn resolve_function(&self, path: &[String]) -> Result<&ShadowFunction<'ctx>, CodegenError> {
        let key = match path {
            [name] => self
                .graph
                .find_function(self.current_module, name)
                .map(|(owner, _)| self.graph.qualify(owner, name)),
            _ => self
                .graph
                .resolve_path(self.current_module, path)
                .map(|(module, name)| self.graph.qualify(module, name)),
        };

        key.and_then(|key| self.functions.get(&key))
            .ok_or_else(|| CodegenError::UnresolvedFunction(path.join(".")))
    }

    /// The module a path expression names, unless its first segment is a
    /// variable in scope.
    pub fn module_path(&self, expr: ExprId) -> Option<ModuleId> {
        if let Some(Type {
            kind: TypeKind::Module,
            module: Some(module),
            ..
        }) = self.expr_types.get(expr)
        {
            return Some(*module);
        }

        let path = self.ast.path_of(expr)?;
        let first = path.first()?;
        if self.lookup_local(first).is_some() || self.find_global(first).is_some() {
            return None;
        }

        self.graph.resolve_module(self.current_module, &path)
    }

    /// Qualified path of the struct a literal or type names.
    pub fn resolve_struct_path(&self, path: &[String]) -> Result<Vec<String>, CodegenError> {
        self.graph
            .resolve_path(self.current_module, path)
            .and_then(|(module, name)| self.graph.find_struct(module, name))
            .map(|(_, record)| record.path.clone())
            .ok_or_else(|| CodegenError::UnresolvedStruct(path.join(".")))
    }

    /// Resolves a written type against the current module.
    pub fn resolve_type(&self, ty: &TypeExpr) -> Result<Type, CodegenError> {
        if let [name] = ty.path.as_slice() {
            if let Some(kind) = TypeKind::from_name(name) {
                return Ok(Type::primitive(kind).with_pointer_depth(ty.pointer_depth));
            }
        }

        let (module, name) = self
            .graph
            .resolve_path(self.current_module, &ty.path)
            .ok_or_else(|| CodegenError::UnsupportedType(ty.to_string()))?;

        if let Some((_, record)) = self.graph.find_struct(module, name) {
            return Ok(record.ty().with_pointer_depth(ty.pointer_depth));
        }

        if let Some((_, record)) = self.graph.find_trait(module, name) {
            return Ok(record.ty().with_pointer_depth(ty.pointer_depth));
        }

        Err(CodegenError::UnsupportedType(ty.to_string()))
    }

    /// Whether `expr` denotes storage that can be addressed without a spill.
    pub fn is_place(&self, expr: ExprId) -> bool {
        match &self.ast.expr(expr).kind {
            ExprKind::Symbol(name) => {
                self.lookup_local(name).is_some() || self.find_global(name).is_some()
            }
            ExprKind::Member { .. } => self.module_path(expr).is_none(),
            ExprKind::Unary { op, .. } => *op == UnaryOp::Deref,
            _ => false,
        }
    }
}

/// Lowers a checked program into a verified LLVM module named `name`.
pub fn compile<'ctx>(
    context: &'ctx Context,
    ast: &Ast,
    analysis: &Analysis,
    name: &str,
) -> Result<Module<'ctx>, CodegenError> {
    let mut compiler = Compiler::new(context, ast, analysis, name)?;
    compiler.lower()?;
    compiler.finish()
}
