use crate::{
    ast::{
        ast::{Access, ExprId, StmtId, StmtKind},
        types::Type,
    },
    errors::errors::ErrorKind,
    symbols::{
        module::ModuleId,
        records::{Function, Variable},
    },
    Span,
};

use super::{
    declare::stmt_word,
    type_checker::{FunctionContext, TypeChecker},
};

impl<'a> TypeChecker<'a> {
    /// Checks every function and method body, module by module in import
    /// order.
    pub fn check_bodies(&mut self) {
        let ast = self.ast;

        for module in self.import_order() {
            self.module = module;
            tracing::debug!(module = %self.module_name(module), "checking bodies");

            for item in self.items(module) {
                if self.rejected.contains(&item) {
                    continue;
                }

                match &ast.stmt(item).kind {
                    StmtKind::FnDecl(decl) => {
                        let function = self
                            .graph
                            .module(module)
                            .functions
                            .get(&decl.signature.name)
                            .filter(|f| f.body == Some(decl.body))
                            .cloned();

                        if let Some(function) = function {
                            self.check_function(&function, None);
                        }
                    }
                    StmtKind::Impl(decl) => {
                        let Some(record) = self.graph.module(module).structs.get(&decl.struct_name)
                        else {
                            continue;
                        };
                        let receiver = record.ty().pointer_to();

                        let methods: Vec<Function> = decl
                            .methods
                            .iter()
                            .filter_map(|m| {
                                record
                                    .methods
                                    .get(&m.signature.name)
                                    .filter(|found| found.function.body == Some(m.body))
                                    .map(|found| found.function.clone())
                            })
                            .collect();

                        for method in methods {
                            self.check_function(&method, Some(receiver.clone()));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Checks one body. Methods get an implicit constant `self` of the
    /// receiver pointer type.
    pub fn check_function(&mut self, function: &Function, receiver: Option<Type>) {
        let Some(body) = function.body else {
            return;
        };

        self.function = Some(FunctionContext {
            name: function.name.clone(),
            return_type: function.return_type.clone(),
        });
        self.env.push_frame();

        if let Some(receiver) = receiver {
            self.declare_local(Variable {
                name: "self".to_string(),
                value: Some(self.default_of(&receiver)),
                ty: receiver.with_const(true),
                is_const: true,
                access: Access::Private,
                span: function.span.clone(),
            });
        }

        for (name, ty) in &function.params {
            self.declare_local(Variable {
                name: name.clone(),
                value: Some(self.default_of(ty)),
                ty: ty.clone(),
                is_const: false,
                access: Access::Private,
                span: function.span.clone(),
            });
        }

        self.check_stmt(body);

        let return_type = &function.return_type;
        if !return_type.is_nothing() && !return_type.is_unknown() && !self.returns(body) {
            self.report(
                ErrorKind::NotAllPathsReturn,
                &function.span,
                vec![function.name.clone()],
            );
        }

        self.env.pop_frame();
        self.function = None;
    }

    fn declare_local(&mut self, variable: Variable) {
        if let Err(variable) = self.env.declare(variable) {
            self.report(
                ErrorKind::Redefinition,
                &variable.span,
                vec!["variable".into(), variable.name],
            );
        }
    }

    pub fn check_stmt(&mut self, id: StmtId) {
        let ast = self.ast;
        let stmt = ast.stmt(id);

        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.check_expr(*expr);
            }
            StmtKind::VarDecl(decl) => {
                if let Some(variable) = self.declared_variable(decl, &stmt.span) {
                    self.declare_local(variable);
                }
            }
            StmtKind::Block(stmts) => {
                self.env.push_frame();
                for stmt in stmts {
                    self.check_stmt(*stmt);
                }
                self.env.pop_frame();
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(*condition);
                self.check_stmt(*then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(*else_branch);
                }
            }
            StmtKind::While { condition, body } => {
                self.check_condition(*condition);
                self.loop_depth += 1;
                self.check_stmt(*body);
                self.loop_depth -= 1;
            }
            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.report(
                        ErrorKind::CannotBeHere,
                        &stmt.span,
                        vec![stmt_word(&stmt.kind).to_string()],
                    );
                }
            }
            StmtKind::Return(value) => self.check_return(*value, &stmt.span),
            other => {
                self.report(
                    ErrorKind::CannotBeHere,
                    &stmt.span,
                    vec![stmt_word(other).to_string()],
                );
            }
        }
    }

    fn check_condition(&mut self, condition: ExprId) {
        let value = self.check_expr(condition);
        if !value.ty.is_bool() && !value.ty.is_unknown() {
            let span = self.ast.expr(condition).span.clone();
            self.report(
                ErrorKind::TypeMismatch,
                &span,
                vec!["bool".into(), value.ty.to_string()],
            );
        }
    }

    fn check_return(&mut self, value: Option<ExprId>, span: &Span) {
        let Some(context) = self.function.clone() else {
            self.report(ErrorKind::CannotBeHere, span, vec!["return".into()]);
            return;
        };
        let expected = &context.return_type;

        match value {
            Some(value) if expected.is_nothing() => {
                self.check_expr(value);
                self.report(ErrorKind::CannotReturnValue, span, vec![context.name]);
            }
            Some(value) => {
                let checked = self.check_expr(value);
                let value_span = self.ast.expr(value).span.clone();
                self.coerce(checked, expected, &value_span);
            }
            None if !expected.is_nothing() && !expected.is_unknown() => {
                self.report(
                    ErrorKind::ExpectedReturnValue,
                    span,
                    vec![context.name, expected.to_string()],
                );
            }
            None => {}
        }
    }

    /// Whether every path through `id` ends in a `return`. Loops never
    /// count since their body may not run.
    pub fn returns(&self, id: StmtId) -> bool {
        match &self.ast.stmt(id).kind {
            StmtKind::Return(_) => true,
            StmtKind::Block(stmts) => stmts.iter().any(|stmt| self.returns(*stmt)),
            StmtKind::If {
                then_branch,
                else_branch: Some(else_branch),
                ..
            } => self.returns(*then_branch) && self.returns(*else_branch),
            _ => false,
        }
    }

    /// The module a path expression names, unless its first segment is a
    /// variable in scope.
    pub fn module_path(&self, expr: ExprId) -> Option<ModuleId> {
        let path = self.ast.path_of(expr)?;
        let first = path.first()?;

        if self.env.lookup(first).is_some()
            || self.graph.find_global_var(self.module, first).is_some()
        {
            return None;
        }

        self.graph.resolve_module(self.module, &path)
    }
}
