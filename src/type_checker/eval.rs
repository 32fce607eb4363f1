//! Classification of module-scope initializers.
//!
//! Globals and field defaults are emitted as constant data, so their
//! initializers must be built from literals, other globals and operators
//! over them. The symbolic value computed while checking is the folded
//! result; this module only decides whether folding was legitimate.

use crate::ast::{
    ast::{ExprId, ExprKind, Literal, UnaryOp},
    types::Type,
};

use super::type_checker::TypeChecker;

impl<'a> TypeChecker<'a> {
    /// Whether `expr` may initialize a global or field default of type `ty`.
    /// Pointers and trait values only take `nil` at module scope.
    pub fn is_constant_initializer(&self, expr: ExprId, ty: &Type) -> bool {
        if ty.is_pointer() || ty.is_trait_value() {
            return self.is_nil_literal(expr);
        }

        self.is_constant(expr)
    }

    fn is_nil_literal(&self, expr: ExprId) -> bool {
        matches!(self.ast.expr(expr).kind, ExprKind::Literal(Literal::Nil))
    }

    pub fn is_constant(&self, expr: ExprId) -> bool {
        if let Some(ty) = self.expr_types.get(expr) {
            // Already reported
            if ty.is_unknown() {
                return true;
            }
            if ty.is_pointer() || ty.is_trait_value() {
                return self.is_nil_literal(expr);
            }
        }

        match &self.ast.expr(expr).kind {
            ExprKind::Literal(_) => true,
            ExprKind::Symbol(name) => {
                self.env.lookup(name).is_none()
                    && self.graph.find_global_var(self.module, name).is_some()
            }
            ExprKind::Member { object, field } => match self.module_path(*object) {
                Some(module) => self.graph.module(module).variables.contains_key(field),
                None => self.is_constant(*object),
            },
            ExprKind::Binary { left, right, .. } => {
                self.is_constant(*left) && self.is_constant(*right)
            }
            ExprKind::Unary {
                op: UnaryOp::Neg | UnaryOp::Not,
                operand,
            } => self.is_constant(*operand),
            ExprKind::Cast { expr, .. } => self.is_constant(*expr),
            ExprKind::StructLiteral {
                fields,
                heap: false,
                ..
            } => fields.iter().all(|init| self.is_constant(init.value)),
            _ => false,
        }
    }
}
