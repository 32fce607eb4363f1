//! Discovery: everything a module declares, before any body is checked.
//!
//! Runs in sub-phases so that declarations can refer to each other
//! regardless of source order: modules, imports, struct and trait names,
//! trait signatures, field types, field defaults, functions, impls and
//! finally globals.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::{
    ast::{
        ast::{Access, FieldDecl, FnSignature, ImplDecl, StmtId, StmtKind, StructDecl, VarDecl},
        types::Type,
    },
    errors::errors::ErrorKind,
    symbols::{
        module::ModuleId,
        records::{Field, Function, Method, Struct, Trait, Variable},
    },
    Span,
};

use super::type_checker::TypeChecker;

/// Word used in diagnostics for a statement kind.
pub fn stmt_word(kind: &StmtKind) -> &'static str {
    match kind {
        StmtKind::Expression(_) => "expression",
        StmtKind::VarDecl(_) => "let",
        StmtKind::Block(_) => "block",
        StmtKind::If { .. } => "if",
        StmtKind::While { .. } => "while",
        StmtKind::Break => "break",
        StmtKind::Continue => "continue",
        StmtKind::Return(_) => "return",
        StmtKind::FnDecl(_) => "fn",
        StmtKind::StructDecl(_) => "struct",
        StmtKind::TraitDecl(_) => "trait",
        StmtKind::Impl(_) => "impl",
        StmtKind::Import(_) => "import",
        StmtKind::ModuleDecl(_) => "mod",
    }
}

impl<'a> TypeChecker<'a> {
    pub fn discover(&mut self) {
        for unit in self.graph.units().to_vec() {
            self.collect_modules(unit);
        }

        let modules: Vec<ModuleId> = self.graph.iter().map(|(id, _)| id).collect();
        for module in &modules {
            self.declare_imports(*module);
        }
        for module in &modules {
            self.declare_names(*module);
        }

        let order = self.import_order();
        tracing::debug!(modules = order.len(), "declaring signatures");

        for module in &order {
            self.declare_trait_methods(*module);
        }
        for module in &order {
            self.declare_field_types(*module);
        }
        self.check_recursive_structs();
        for module in &order {
            self.declare_functions(*module);
        }
        for module in &order {
            self.declare_impls(*module);
        }

        for module in &order {
            self.queue_initializers(*module);
        }
        for module in &order {
            self.declare_field_defaults(*module);
        }
        for module in &order {
            self.declare_globals(*module);
        }
    }

    pub fn items(&self, module: ModuleId) -> Vec<StmtId> {
        self.graph.module(module).items.clone()
    }

    /// Modules ordered so every module comes after the modules it imports.
    pub fn import_order(&self) -> Vec<ModuleId> {
        fn visit(
            checker: &TypeChecker,
            module: ModuleId,
            seen: &mut FxHashSet<ModuleId>,
            order: &mut Vec<ModuleId>,
        ) {
            if !seen.insert(module) {
                return;
            }
            for (_, import) in &checker.graph.module(module).imports {
                visit(checker, *import, seen, order);
            }
            order.push(module);
        }

        let mut seen = FxHashSet::default();
        let mut order = vec![];
        for (id, _) in self.graph.iter() {
            visit(self, id, &mut seen, &mut order);
        }
        order
    }

    fn collect_modules(&mut self, module: ModuleId) {
        let ast = self.ast;

        for item in self.items(module) {
            let StmtKind::ModuleDecl(decl) = &ast.stmt(item).kind else {
                continue;
            };

            if self.graph.module(module).submodules.contains_key(&decl.name) {
                self.report(
                    ErrorKind::Redefinition,
                    &ast.stmt(item).span,
                    vec!["module".into(), decl.name.clone()],
                );
                self.rejected.insert(item);
                continue;
            }

            let sub = self.graph.add_submodule(module, &decl.name, decl.access);
            self.graph.module_mut(sub).items = decl.items.clone();
            self.collect_modules(sub);
        }
    }

    fn declare_imports(&mut self, module: ModuleId) {
        let ast = self.ast;

        for item in self.items(module) {
            let StmtKind::Import(name) = &ast.stmt(item).kind else {
                continue;
            };
            let span = &ast.stmt(item).span;

            let Some(target) = self.graph.find_module(module, name) else {
                self.report(ErrorKind::UndeclaredModule, span, vec![name.clone()]);
                continue;
            };

            if self.graph.add_import(module, name, target).is_err() {
                let from = self.module_name(module);
                self.report(ErrorKind::ImportCycle, span, vec![name.clone(), from]);
            } else {
                tracing::debug!(module = %self.module_name(module), import = %name, "import");
            }
        }
    }

    fn declare_names(&mut self, module: ModuleId) {
        let ast = self.ast;

        for item in self.items(module) {
            let stmt = ast.stmt(item);
            let (name, access, is_struct) = match &stmt.kind {
                StmtKind::StructDecl(decl) => (&decl.name, decl.access, true),
                StmtKind::TraitDecl(decl) => (&decl.name, decl.access, false),
                StmtKind::FnDecl(_)
                | StmtKind::VarDecl(_)
                | StmtKind::Impl(_)
                | StmtKind::Import(_)
                | StmtKind::ModuleDecl(_) => continue,
                other => {
                    self.report(
                        ErrorKind::CannotBeHere,
                        &stmt.span,
                        vec![stmt_word(other).to_string()],
                    );
                    continue;
                }
            };

            let taken = {
                let m = self.graph.module(module);
                m.structs.contains_key(name) || m.traits.contains_key(name)
            };
            if taken {
                let what = if is_struct { "struct" } else { "trait" };
                self.report(
                    ErrorKind::Redefinition,
                    &stmt.span,
                    vec![what.into(), name.clone()],
                );
                self.rejected.insert(item);
                continue;
            }

            let path = self.graph.qualify(module, name);
            let target = self.graph.module_mut(module);

            if is_struct {
                target.structs.insert(
                    name.clone(),
                    Struct {
                        name: name.clone(),
                        module,
                        path,
                        access,
                        fields: IndexMap::new(),
                        methods: IndexMap::new(),
                        traits: IndexMap::new(),
                        span: stmt.span.clone(),
                    },
                );
            } else {
                target.traits.insert(
                    name.clone(),
                    Trait {
                        name: name.clone(),
                        module,
                        path,
                        access,
                        methods: IndexMap::new(),
                        span: stmt.span.clone(),
                    },
                );
            }

            tracing::debug!(name = %name, is_struct, "declared type name");
        }
    }

    /// Builds a function record from a signature, resolving every type.
    pub fn function_from(
        &mut self,
        signature: &FnSignature,
        access: Access,
        body: Option<StmtId>,
        module: ModuleId,
    ) -> Function {
        let mut params: Vec<(String, Type)> = vec![];

        for param in &signature.params {
            let ty = self.resolve_type(&param.ty);

            if params.iter().any(|(name, _)| *name == param.name) {
                self.report(
                    ErrorKind::Redefinition,
                    &param.span,
                    vec!["parameter".into(), param.name.clone()],
                );
                continue;
            }

            params.push((param.name.clone(), ty));
        }

        let return_type = match &signature.return_type {
            Some(ty) => self.resolve_type(ty),
            None => Type::nothing(),
        };

        Function {
            name: signature.name.clone(),
            return_type,
            params,
            body,
            access,
            module,
            span: signature.span.clone(),
        }
    }

    fn declare_trait_methods(&mut self, module: ModuleId) {
        let ast = self.ast;
        self.module = module;

        for item in self.items(module) {
            let StmtKind::TraitDecl(decl) = &ast.stmt(item).kind else {
                continue;
            };
            if self.rejected.contains(&item) {
                continue;
            }

            let mut methods = IndexMap::new();
            for signature in &decl.methods {
                let function = self.function_from(signature, Access::Public, None, module);

                if methods.contains_key(&signature.name) {
                    self.report(
                        ErrorKind::Redefinition,
                        &signature.span,
                        vec!["method".into(), signature.name.clone()],
                    );
                    continue;
                }

                methods.insert(signature.name.clone(), function);
            }

            if let Some(record) = self.graph.module_mut(module).traits.get_mut(&decl.name) {
                record.methods = methods;
            }
        }
    }

    fn struct_decls(&self, module: ModuleId) -> Vec<(StmtId, &'a StructDecl)> {
        let ast = self.ast;
        self.items(module)
            .into_iter()
            .filter(|item| !self.rejected.contains(item))
            .filter_map(|item| match &ast.stmt(item).kind {
                StmtKind::StructDecl(decl) => Some((item, decl)),
                _ => None,
            })
            .collect()
    }

    fn declare_field_types(&mut self, module: ModuleId) {
        self.module = module;

        for (_, decl) in self.struct_decls(module) {
            let mut fields = IndexMap::new();

            for field in &decl.fields {
                let ty = self.resolve_type(&field.ty).with_const(field.is_const);

                if fields.contains_key(&field.name) {
                    self.report(
                        ErrorKind::Redefinition,
                        &field.span,
                        vec!["field".into(), field.name.clone()],
                    );
                    continue;
                }

                fields.insert(field.name.clone(), new_field(field, ty));
            }

            if let Some(record) = self.graph.module_mut(module).structs.get_mut(&decl.name) {
                record.fields = fields;
            }
        }
    }

    /// Reports every by-value field through which a struct contains itself.
    fn check_recursive_structs(&mut self) {
        let mut found = vec![];

        for (_, module) in self.graph.iter() {
            for record in module.structs.values() {
                for field in record.fields.values() {
                    if !field.ty.is_struct_value() {
                        continue;
                    }

                    let mut seen = FxHashSet::default();
                    if self.contains_struct(&field.ty, &record.path, &mut seen) {
                        found.push((record.span.clone(), record.name.clone(), field.name.clone()));
                    }
                }
            }
        }

        for (span, name, field) in found {
            self.report(ErrorKind::RecursiveStruct, &span, vec![name, field]);
        }
    }

    fn contains_struct(&self, ty: &Type, target: &[String], seen: &mut FxHashSet<Vec<String>>) -> bool {
        let Some(record) = self.graph.struct_of(ty) else {
            return false;
        };

        if record.path == target {
            return true;
        }

        if !seen.insert(record.path.clone()) {
            return false;
        }

        record
            .fields
            .values()
            .filter(|field| field.ty.is_struct_value())
            .any(|field| self.contains_struct(&field.ty, target, seen))
    }

    fn queue_initializers(&mut self, module: ModuleId) {
        let ast = self.ast;

        for (item, decl) in self.struct_decls(module) {
            let path = self.graph.qualify(module, &decl.name);
            self.pending_defaults.entry(path).or_insert((module, item));
        }

        for item in self.items(module) {
            if let StmtKind::VarDecl(decl) = &ast.stmt(item).kind {
                self.pending_globals
                    .entry((module, decl.name.clone()))
                    .or_insert(item);
            }
        }
    }

    fn declare_field_defaults(&mut self, module: ModuleId) {
        for (_, decl) in self.struct_decls(module) {
            let path = self.graph.qualify(module, &decl.name);
            self.fold_struct_defaults(&path);
        }
    }

    /// Folds the field defaults of the struct at `path`, then those of the
    /// structs it holds by value. Does nothing once folded.
    pub fn fold_struct_defaults(&mut self, path: &[String]) {
        let ast = self.ast;
        let Some((module, item)) = self.pending_defaults.remove(path) else {
            return;
        };
        let StmtKind::StructDecl(decl) = &ast.stmt(item).kind else {
            return;
        };
        let outer = std::mem::replace(&mut self.module, module);

        for field in &decl.fields {
            let Some(default) = field.default else {
                continue;
            };

            let Some(ty) = self
                .graph
                .module(module)
                .structs
                .get(&decl.name)
                .and_then(|record| record.fields.get(&field.name))
                .map(|f| f.ty.clone())
            else {
                continue;
            };

            let span = ast.expr(default).span.clone();
            let value = self.check_expr(default);
            let value = self.coerce(value, &ty, &span);

            if !self.is_constant_initializer(default, &ty) {
                self.report(
                    ErrorKind::NotConstantExpression,
                    &span,
                    vec![format!("{}.{}", decl.name, field.name)],
                );
            }

            if let Some(record) = self
                .graph
                .module_mut(module)
                .structs
                .get_mut(&decl.name)
                .and_then(|record| record.fields.get_mut(&field.name))
            {
                record.value = Some(value);
            }
        }

        let nested: Vec<Vec<String>> = self
            .graph
            .module(module)
            .structs
            .get(&decl.name)
            .map(|record| {
                record
                    .fields
                    .values()
                    .filter(|field| field.ty.is_struct_value())
                    .map(|field| field.ty.path.clone())
                    .collect()
            })
            .unwrap_or_default();
        for path in nested {
            self.fold_struct_defaults(&path);
        }

        self.module = outer;
    }

    fn declare_functions(&mut self, module: ModuleId) {
        let ast = self.ast;
        self.module = module;

        for item in self.items(module) {
            let StmtKind::FnDecl(decl) = &ast.stmt(item).kind else {
                continue;
            };

            let function =
                self.function_from(&decl.signature, decl.access, Some(decl.body), module);

            if self.graph.module(module).functions.contains_key(&function.name) {
                self.report(
                    ErrorKind::Redefinition,
                    &ast.stmt(item).span,
                    vec!["function".into(), function.name.clone()],
                );
                self.rejected.insert(item);
                continue;
            }

            tracing::debug!(function = %function.name, "declared function");
            self.graph
                .module_mut(module)
                .functions
                .insert(function.name.clone(), function);
        }
    }

    fn declare_impls(&mut self, module: ModuleId) {
        let ast = self.ast;
        self.module = module;

        for item in self.items(module) {
            let StmtKind::Impl(decl) = &ast.stmt(item).kind else {
                continue;
            };
            let span = &ast.stmt(item).span;

            if !self.graph.module(module).structs.contains_key(&decl.struct_name) {
                self.report(
                    ErrorKind::UndeclaredStruct,
                    span,
                    vec![decl.struct_name.clone()],
                );
                self.rejected.insert(item);
                continue;
            }

            self.declare_impl(module, decl, span);
        }
    }

    fn declare_impl(&mut self, module: ModuleId, decl: &ImplDecl, span: &Span) {
        let trait_record = match &decl.trait_path {
            Some(path) => match self.resolve_trait(path, span) {
                Some(record) => Some(record),
                None => return,
            },
            None => None,
        };
        let implements = trait_record.as_ref().map(|t| t.ty().qualified_name());

        let mut methods: Vec<Method> = vec![];
        for method in &decl.methods {
            let function =
                self.function_from(&method.signature, method.access, Some(method.body), module);

            let exists = methods.iter().any(|m| m.function.name == function.name)
                || self
                    .graph
                    .module(module)
                    .structs
                    .get(&decl.struct_name)
                    .is_some_and(|record| record.methods.contains_key(&function.name));

            if exists {
                self.report(
                    ErrorKind::Redefinition,
                    &method.signature.span,
                    vec!["method".into(), function.name.clone()],
                );
                continue;
            }

            methods.push(Method {
                function,
                is_const: false,
                access: method.access,
                implements: implements.clone(),
            });
        }

        let conforms = match &trait_record {
            Some(record) => self.check_conformance(&decl.struct_name, record, &methods, span),
            None => false,
        };

        let Some(target) = self.graph.module_mut(module).structs.get_mut(&decl.struct_name) else {
            return;
        };

        for method in methods {
            target.methods.insert(method.function.name.clone(), method);
        }

        if let (Some(record), true) = (trait_record, conforms) {
            let key = record.ty().qualified_name();
            if target.traits.contains_key(&key) {
                self.report(
                    ErrorKind::Redefinition,
                    span,
                    vec!["impl".into(), record.name.clone()],
                );
                return;
            }

            tracing::debug!(trait_name = %key, struct_name = %decl.struct_name, "trait implemented");
            target.traits.insert(key, record);
        }
    }

    /// Every trait method implemented with a matching signature, and
    /// nothing the trait does not declare.
    fn check_conformance(
        &mut self,
        struct_name: &str,
        record: &Trait,
        methods: &[Method],
        span: &Span,
    ) -> bool {
        let mut conforms = true;

        for (name, required) in &record.methods {
            match methods.iter().find(|m| m.function.name == *name) {
                None => {
                    self.report(
                        ErrorKind::TraitMethodNotImplemented,
                        span,
                        vec![struct_name.to_string(), name.clone(), record.name.clone()],
                    );
                    conforms = false;
                }
                Some(method) if !method.function.same_signature(required) => {
                    self.report(
                        ErrorKind::TraitSignatureMismatch,
                        &method.function.span,
                        vec![struct_name.to_string(), name.clone(), record.name.clone()],
                    );
                    conforms = false;
                }
                Some(_) => {}
            }
        }

        for method in methods {
            if !record.methods.contains_key(&method.function.name) {
                self.report(
                    ErrorKind::UndeclaredMethod,
                    &method.function.span,
                    vec![record.name.clone(), method.function.name.clone()],
                );
                conforms = false;
            }
        }

        conforms
    }

    fn declare_globals(&mut self, module: ModuleId) {
        let ast = self.ast;
        self.module = module;

        for item in self.items(module) {
            let StmtKind::VarDecl(decl) = &ast.stmt(item).kind else {
                continue;
            };
            if self.folded.contains(&item) {
                continue;
            }

            let key = (module, decl.name.clone());
            if self.pending_globals.get(&key) == Some(&item) {
                self.fold_global(module, &decl.name);
            } else {
                self.declare_global(module, decl, &ast.stmt(item).span);
            }
        }
    }

    /// Declares the global `name` of `module` if it is still pending.
    pub fn fold_global(&mut self, module: ModuleId, name: &str) {
        let ast = self.ast;
        let Some(item) = self.pending_globals.remove(&(module, name.to_string())) else {
            return;
        };
        let StmtKind::VarDecl(decl) = &ast.stmt(item).kind else {
            return;
        };
        self.folded.insert(item);

        let outer = std::mem::replace(&mut self.module, module);
        self.declare_global(module, decl, &ast.stmt(item).span);
        self.module = outer;
    }

    /// Folds the global a bare `name` in `from` resolves to, searching the
    /// module and then its imports in order. A global whose own initializer
    /// is being folded is not pending, so a cycle reads as undeclared.
    pub fn ensure_global(&mut self, from: ModuleId, name: &str) {
        fn owner(
            checker: &TypeChecker,
            module: ModuleId,
            name: &str,
            visited: &mut FxHashSet<ModuleId>,
        ) -> Option<ModuleId> {
            if !visited.insert(module) {
                return None;
            }

            let record = checker.graph.module(module);
            if record.variables.contains_key(name)
                || checker.pending_globals.contains_key(&(module, name.to_string()))
            {
                return Some(module);
            }

            record
                .imports
                .iter()
                .find_map(|(_, import)| owner(checker, *import, name, visited))
        }

        if self.pending_globals.is_empty() {
            return;
        }

        if let Some(module) = owner(self, from, name, &mut FxHashSet::default()) {
            self.fold_global(module, name);
        }
    }

    fn declare_global(&mut self, module: ModuleId, decl: &VarDecl, span: &Span) {
        if self.graph.module(module).variables.contains_key(&decl.name) {
            self.report(
                ErrorKind::Redefinition,
                span,
                vec!["variable".into(), decl.name.clone()],
            );
            return;
        }

        let Some(variable) = self.declared_variable(decl, span) else {
            return;
        };

        if let Some(value) = decl.value {
            if !self.is_constant_initializer(value, &variable.ty) {
                let value_span = self.ast.expr(value).span.clone();
                self.report(
                    ErrorKind::NotConstantExpression,
                    &value_span,
                    vec![decl.name.clone()],
                );
            }
        }

        tracing::debug!(global = %decl.name, ty = %variable.ty, "declared global");
        self.graph
            .module_mut(module)
            .variables
            .insert(decl.name.clone(), variable);
    }

    /// Checks a `let`/`const` declaration and builds its variable, or
    /// reports why it cannot have one.
    pub fn declared_variable(&mut self, decl: &VarDecl, span: &Span) -> Option<Variable> {
        let annotated = decl.ty.as_ref().map(|ty| self.resolve_type(ty));
        let value = decl.value.map(|value| (value, self.check_expr(value)));

        let ty = match (&annotated, &value) {
            (Some(ty), _) => ty.clone(),
            (None, Some((_, value))) if !value.ty.is_nil() && !value.ty.is_nothing() => {
                value.ty.clone()
            }
            _ => {
                self.report(ErrorKind::ExpectedExplicitValue, span, vec![decl.name.clone()]);
                return None;
            }
        };

        if decl.is_const && value.is_none() {
            self.report(ErrorKind::ExpectedExplicitValue, span, vec![decl.name.clone()]);
        }

        let value = match value {
            Some((id, value)) => {
                let value_span = self.ast.expr(id).span.clone();
                self.coerce(value, &ty, &value_span)
            }
            None => {
                if ty.is_struct_value() {
                    self.fold_struct_defaults(&ty.path);
                }
                self.default_of(&ty)
            }
        };

        Some(Variable {
            name: decl.name.clone(),
            ty: ty.with_const(decl.is_const),
            value: Some(value),
            is_const: decl.is_const,
            access: decl.access,
            span: span.clone(),
        })
    }
}

fn new_field(decl: &FieldDecl, ty: Type) -> Field {
    Field {
        name: decl.name.clone(),
        value: None,
        ty,
        is_const: decl.is_const,
        access: decl.access,
        manually_initialized: decl.default.is_some(),
        span: decl.span.clone(),
    }
}
