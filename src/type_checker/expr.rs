use rustc_hash::FxHashSet;

use crate::{
    ast::{
        ast::{AssignOp, BinaryOp, ExprId, ExprKind, FieldInit, Literal, TypeExpr, UnaryOp},
        types::{Type, TypeKind},
        values::{Value, ValueData},
    },
    errors::errors::ErrorKind,
    symbols::records::{Function, Variable},
    Span,
};

use super::type_checker::TypeChecker;

/// Placeholder produced after an error so checking can continue.
fn unknown() -> Value {
    Value::zero(&Type::unknown())
}

fn literal_value(literal: &Literal) -> Value {
    match *literal {
        Literal::Int(value) => Value::integer_literal(value),
        Literal::Float { value, single: true } => Value::f32(value as f32),
        Literal::Float { value, .. } => Value::f64(value),
        Literal::Char(value) => Value::char(value),
        Literal::Bool(value) => Value::bool(value),
        Literal::Nil => Value::nil(),
    }
}

fn variable_value(variable: &Variable) -> Value {
    let value = variable
        .value
        .clone()
        .unwrap_or_else(|| Value::zero(&variable.ty));

    Value {
        ty: variable.ty.clone(),
        ..value
    }
}

/// Result type of `pointer +/- integer`.
fn pointer_offset(op: BinaryOp, left: &Type, right: &Type) -> Option<Type> {
    if !matches!(op, BinaryOp::Add | BinaryOp::Sub) {
        return None;
    }

    if left.is_pointer() && right.is_integer() {
        return Some(left.with_const(false));
    }

    if op == BinaryOp::Add && right.is_pointer() && left.is_integer() {
        return Some(right.with_const(false));
    }

    None
}

impl<'a> TypeChecker<'a> {
    /// Checks `id` and evaluates it symbolically. The checked type is
    /// recorded for later passes.
    pub fn check_expr(&mut self, id: ExprId) -> Value {
        let ast = self.ast;
        let expr = ast.expr(id);
        let span = &expr.span;

        let value = match &expr.kind {
            ExprKind::Literal(literal) => literal_value(literal),
            ExprKind::Symbol(name) => self.check_symbol(name, span),
            ExprKind::Binary { left, op, right } => self.check_binary(*left, *op, *right, span),
            ExprKind::Unary { op, operand } => self.check_unary(*op, *operand, span),
            ExprKind::Assignment { target, op, value } => {
                self.check_assignment(*target, *op, *value, span)
            }
            ExprKind::Call { callee, args } => self.check_call(*callee, args, span),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => self.check_method_call(*receiver, method, args, span),
            ExprKind::Member { object, field } => self.check_member(*object, field, span),
            ExprKind::StructLiteral { path, fields, heap } => {
                self.check_struct_literal(path, fields, *heap, span)
            }
            ExprKind::Cast { expr, ty } => self.check_cast(*expr, ty),
        };

        self.record(id, value)
    }

    fn check_all(&mut self, exprs: &[ExprId]) {
        for expr in exprs {
            self.check_expr(*expr);
        }
    }

    fn check_symbol(&mut self, name: &str, span: &Span) -> Value {
        if let Some(variable) = self.env.lookup(name) {
            return variable_value(variable);
        }

        self.ensure_global(self.module, name);
        let global = self
            .graph
            .find_global_var(self.module, name)
            .map(|(owner, variable)| (owner, variable.access, variable_value(variable)));

        if let Some((owner, access, value)) = global {
            self.check_access(owner, access, "variable", name, span);
            return value;
        }

        if let Some(module) = self.graph.find_module(self.module, name) {
            return Value::opaque(Type::module(name, module));
        }

        self.report(ErrorKind::UndeclaredVariable, span, vec![name.to_string()]);
        unknown()
    }

    fn check_binary(&mut self, left: ExprId, op: BinaryOp, right: ExprId, span: &Span) -> Value {
        let l = self.check_expr(left);
        let r = self.check_expr(right);

        if l.ty.is_unknown() || r.ty.is_unknown() {
            return if op.is_comparison() || op.is_logical() {
                Value::zero(&Type::bool())
            } else {
                unknown()
            };
        }

        let operands = vec![op.to_string(), l.ty.to_string(), r.ty.to_string()];

        if op.is_logical() {
            if !l.ty.is_bool() || !r.ty.is_bool() {
                self.report(ErrorKind::ExpectedBoolean, span, operands);
                return Value::zero(&Type::bool());
            }
            return l.binary(op, &r, &Type::bool());
        }

        if op.is_bitwise() {
            if !l.ty.is_integer() || !r.ty.is_integer() {
                self.report(ErrorKind::ExpectedInteger, span, operands);
                return unknown();
            }
            let common = Type::get_common(&l.ty, &r.ty).with_const(false);
            return l.binary(op, &r, &common);
        }

        if op.is_arithmetic() {
            if let Some(pointer) = pointer_offset(op, &l.ty, &r.ty) {
                return Value::opaque(pointer);
            }
            if !l.ty.is_numeric() || !r.ty.is_numeric() {
                self.report(ErrorKind::ExpectedNumeric, span, operands);
                return unknown();
            }
            let common = Type::get_common(&l.ty, &r.ty).with_const(false);
            return l.binary(op, &r, &common);
        }

        let common = Type::get_common(&l.ty, &r.ty);
        let equality = matches!(op, BinaryOp::Eq | BinaryOp::Ne);
        let against_nil = l.ty.is_nil() || r.ty.is_nil();

        let comparable = if common.is_numeric() || common.is_pointer() {
            true
        } else if common.is_trait_value() {
            equality && against_nil
        } else {
            equality && (common.is_bool() || common.is_nil())
        };

        if !comparable {
            self.report(ErrorKind::IncompatibleOperands, span, operands);
            return Value::zero(&Type::bool());
        }

        if common.is_numeric() {
            l.binary(op, &r, &common)
        } else {
            Value::zero(&Type::bool())
        }
    }

    fn check_unary(&mut self, op: UnaryOp, operand: ExprId, span: &Span) -> Value {
        let value = self.check_expr(operand);

        if value.ty.is_unknown() {
            return match op {
                UnaryOp::Not => Value::zero(&Type::bool()),
                _ => unknown(),
            };
        }

        match op {
            UnaryOp::Neg if value.ty.is_numeric() => value.negate(),
            UnaryOp::Neg => {
                let ty = value.ty.to_string();
                self.report(ErrorKind::ExpectedNumeric, span, vec![op.to_string(), ty.clone(), ty]);
                unknown()
            }
            UnaryOp::Not if value.ty.is_bool() => {
                Value::bool(!value.as_bool().unwrap_or_default())
            }
            UnaryOp::Not => {
                let ty = value.ty.to_string();
                self.report(ErrorKind::ExpectedBoolean, span, vec![op.to_string(), ty.clone(), ty]);
                Value::zero(&Type::bool())
            }
            UnaryOp::AddressOf => Value::opaque(value.ty.with_const(false).pointer_to()),
            UnaryOp::Deref => match value.ty.deref() {
                Some(pointee) => self.default_of(&pointee),
                None => {
                    self.report(
                        ErrorKind::TypeMismatch,
                        span,
                        vec!["pointer".into(), value.ty.to_string()],
                    );
                    unknown()
                }
            },
        }
    }

    fn check_assignment(&mut self, target: ExprId, op: AssignOp, value: ExprId, span: &Span) -> Value {
        let ast = self.ast;
        let is_place = matches!(
            ast.expr(target).kind,
            ExprKind::Symbol(_)
                | ExprKind::Member { .. }
                | ExprKind::Unary {
                    op: UnaryOp::Deref,
                    ..
                }
        );

        let current = self.check_expr(target);
        let assigned = self.check_expr(value);

        if !is_place || current.ty.kind == TypeKind::Module {
            self.report(ErrorKind::NotAssignable, span, vec![]);
            return unknown();
        }

        if current.ty.is_const {
            let name = ast
                .path_of(target)
                .map(|path| path.join("."))
                .unwrap_or_else(|| "expression".to_string());
            self.report(ErrorKind::AssignToConst, span, vec![name]);
        }

        let slot = current.ty.with_const(false);
        let value_span = ast.expr(value).span.clone();

        let result = match op.binary() {
            None => self.coerce(assigned, &slot, &value_span),
            Some(_) if slot.is_unknown() || assigned.ty.is_unknown() => Value::zero(&slot),
            Some(binary) if slot.is_pointer() => match pointer_offset(binary, &slot, &assigned.ty) {
                Some(pointer) => Value::opaque(pointer),
                None => {
                    self.report(
                        ErrorKind::ExpectedNumeric,
                        span,
                        vec![binary.to_string(), slot.to_string(), assigned.ty.to_string()],
                    );
                    Value::zero(&slot)
                }
            },
            Some(binary) if slot.is_numeric() && assigned.ty.is_numeric() => {
                let common = Type::get_common(&slot, &assigned.ty).with_const(false);
                let combined = current.binary(binary, &assigned, &common);
                self.coerce(combined, &slot, &value_span)
            }
            Some(binary) => {
                self.report(
                    ErrorKind::ExpectedNumeric,
                    span,
                    vec![binary.to_string(), slot.to_string(), assigned.ty.to_string()],
                );
                Value::zero(&slot)
            }
        };

        if let ExprKind::Symbol(name) = &ast.expr(target).kind {
            if let Some(variable) = self.env.lookup_mut(name) {
                variable.value = Some(result.clone());
            }
        }

        result
    }

    /// Resolves the function a call path names, without diagnostics.
    pub fn lookup_function(&self, path: &[String]) -> Option<Function> {
        match path {
            [name] => {
                if self.env.lookup(name).is_some() {
                    return None;
                }
                self.graph
                    .find_function(self.module, name)
                    .map(|(_, function)| function.clone())
            }
            _ => {
                let (module, name) = self.graph.resolve_path(self.module, path)?;
                self.graph.module(module).functions.get(name).cloned()
            }
        }
    }

    fn check_call(&mut self, callee: ExprId, args: &[ExprId], span: &Span) -> Value {
        let Some(path) = self.ast.path_of(callee) else {
            self.check_expr(callee);
            self.check_all(args);
            self.report(ErrorKind::UndeclaredFunction, span, vec!["expression".into()]);
            return unknown();
        };

        match self.lookup_function(&path) {
            Some(function) => {
                self.check_access(function.module, function.access, "function", &function.name, span);
                self.check_call_arguments(&function, args, span)
            }
            None => {
                self.report(ErrorKind::UndeclaredFunction, span, vec![path.join(".")]);
                self.check_all(args);
                unknown()
            }
        }
    }

    /// Checks arguments against `function`'s parameters and returns the
    /// symbolic result of the call.
    fn check_call_arguments(&mut self, function: &Function, args: &[ExprId], span: &Span) -> Value {
        if function.params.len() != args.len() {
            self.report(
                ErrorKind::WrongArgumentCount,
                span,
                vec![
                    function.name.clone(),
                    function.params.len().to_string(),
                    args.len().to_string(),
                ],
            );
            self.check_all(args);
        } else {
            for ((_, ty), arg) in function.params.iter().zip(args) {
                let value = self.check_expr(*arg);
                let arg_span = self.ast.expr(*arg).span.clone();
                self.coerce(value, ty, &arg_span);
            }
        }

        self.default_of(&function.return_type)
    }

    fn check_method_call(
        &mut self,
        receiver: ExprId,
        method: &str,
        args: &[ExprId],
        span: &Span,
    ) -> Value {
        if let Some(module) = self.module_path(receiver) {
            let name = self.graph.module(module).name.clone();
            self.expr_types.insert(receiver, Type::module(&name, module));

            let function = self.graph.module(module).functions.get(method).cloned();
            return match function {
                Some(function) => {
                    self.check_access(module, function.access, "function", method, span);
                    self.check_call_arguments(&function, args, span)
                }
                None => {
                    let path = format!("{}.{}", self.module_name(module), method);
                    self.report(ErrorKind::UndeclaredFunction, span, vec![path]);
                    self.check_all(args);
                    unknown()
                }
            };
        }

        let object = self.check_expr(receiver);
        let ty = &object.ty;

        if ty.is_unknown() {
            self.check_all(args);
            return unknown();
        }

        if ty.kind == TypeKind::Struct && ty.pointer_depth <= 1 {
            let found = self.graph.struct_of(ty).and_then(|record| {
                record
                    .methods
                    .get(method)
                    .map(|found| (record.module, found.clone()))
            });

            if let Some((owner, found)) = found {
                self.check_access(owner, found.access, "method", method, span);
                return self.check_call_arguments(&found.function, args, span);
            }
        } else if ty.is_trait_value() {
            let found = self
                .graph
                .trait_of(ty)
                .and_then(|record| record.methods.get(method))
                .cloned();

            if let Some(function) = found {
                return self.check_call_arguments(&function, args, span);
            }
        }

        self.report(
            ErrorKind::UndeclaredMethod,
            span,
            vec![ty.to_string(), method.to_string()],
        );
        self.check_all(args);
        unknown()
    }

    fn check_member(&mut self, object: ExprId, field: &str, span: &Span) -> Value {
        let target = self.check_expr(object);
        let ty = &target.ty;

        if ty.kind == TypeKind::Module {
            return self.check_module_member(ty, field, span);
        }

        if ty.is_unknown() {
            return unknown();
        }

        if ty.kind == TypeKind::Struct && ty.pointer_depth <= 1 {
            let found = self.graph.struct_of(ty).and_then(|record| {
                let index = record.field_index(field)?;
                let declared = &record.fields[index];
                Some((record.module, index, declared.access, declared.ty.clone()))
            });

            if let Some((owner, index, access, field_ty)) = found {
                self.check_access(owner, access, "field", field, span);

                // Fields of a constant struct value are constant too
                let inherited = ty.is_const && !ty.is_pointer();
                let field_ty = field_ty.with_const(field_ty.is_const || inherited);

                let slot = match &target.data {
                    ValueData::Aggregate(fields) if !ty.is_pointer() => fields.get(index).cloned(),
                    _ => None,
                };
                let value = slot.unwrap_or_else(|| self.default_of(&field_ty));

                return Value {
                    ty: field_ty,
                    ..value
                };
            }
        }

        self.report(
            ErrorKind::UndeclaredField,
            span,
            vec![ty.to_string(), field.to_string()],
        );
        unknown()
    }

    /// `module.name`: a global or a nested module.
    fn check_module_member(&mut self, ty: &Type, field: &str, span: &Span) -> Value {
        let Some(module) = ty.module else {
            return unknown();
        };

        self.fold_global(module, field);
        let global = self
            .graph
            .module(module)
            .variables
            .get(field)
            .map(|variable| (variable.access, variable_value(variable)));

        if let Some((access, value)) = global {
            self.check_access(module, access, "variable", field, span);
            return value;
        }

        let nested = self.graph.module(module).submodules.get(field).copied();
        if let Some(nested) = nested {
            let access = self.graph.module(nested).access;
            self.check_access(module, access, "module", field, span);
            return Value::opaque(Type::module(field, nested));
        }

        let path = format!("{}.{}", self.module_name(module), field);
        self.report(ErrorKind::UndeclaredVariable, span, vec![path]);
        unknown()
    }

    fn check_struct_literal(
        &mut self,
        path: &[String],
        fields: &[FieldInit],
        heap: bool,
        span: &Span,
    ) -> Value {
        let Some(record) = self.resolve_struct(path, span) else {
            for init in fields {
                self.check_expr(init.value);
            }
            return unknown();
        };

        self.fold_struct_defaults(&record.path);
        let defaults = self
            .graph
            .struct_of(&record.ty())
            .map(|folded| folded.default_value(&self.graph).data);
        let mut slots = match defaults {
            Some(ValueData::Aggregate(slots)) => slots,
            _ => vec![],
        };
        let mut initialized = FxHashSet::default();

        for init in fields {
            let value = self.check_expr(init.value);

            let Some(index) = record.field_index(&init.name) else {
                self.report(
                    ErrorKind::UndeclaredField,
                    &init.span,
                    vec![record.name.clone(), init.name.clone()],
                );
                continue;
            };
            let declared = &record.fields[index];

            self.check_access(record.module, declared.access, "field", &init.name, &init.span);

            if !initialized.insert(init.name.as_str()) {
                self.report(
                    ErrorKind::FieldAlreadyInitialized,
                    &init.span,
                    vec![init.name.clone()],
                );
                continue;
            }

            let value_span = self.ast.expr(init.value).span.clone();
            let value = self.coerce(value, &declared.ty.with_const(false), &value_span);
            if let Some(slot) = slots.get_mut(index) {
                *slot = value;
            }
        }

        let value = Value::aggregate(record.ty(), slots);
        if heap {
            Value {
                ty: record.ty().pointer_to(),
                is_allocated: true,
                ..value
            }
        } else {
            value
        }
    }

    fn check_cast(&mut self, expr: ExprId, ty: &TypeExpr) -> Value {
        let value = self.check_expr(expr);
        let target = self.resolve_type(ty);

        if value.ty.is_unknown() || target.is_unknown() {
            return Value::zero(&target);
        }

        let span = self.ast.expr(expr).span.to(&ty.span);

        if !self.can_explicitly_cast(&value.ty, &target) {
            if self.struct_to_trait(&value.ty, &target) == Some(false) {
                self.report(
                    ErrorKind::TraitNotImplemented,
                    &span,
                    vec![value.ty.qualified_name(), target.qualified_name()],
                );
            } else {
                self.report(
                    ErrorKind::CastNotAllowed,
                    &span,
                    vec![value.ty.to_string(), target.to_string()],
                );
            }
            return self.default_of(&target);
        }

        if target.is_trait_value() && value.ty.kind == TypeKind::Struct {
            return Value::opaque(target);
        }

        value.cast(&target)
    }
}
