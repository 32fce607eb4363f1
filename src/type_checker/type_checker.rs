use la_arena::ArenaMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast::{
        ast::{Access, Ast, ExprId, StmtId, TypeExpr},
        types::{Type, TypeKind},
        values::Value,
    },
    errors::errors::{Diagnostics, ErrorKind},
    symbols::{
        module::{ModuleGraph, ModuleId},
        records::{Struct, Trait, Variable},
    },
    Span,
};

/// Lexical scopes of the function being checked, innermost last.
#[derive(Debug, Default)]
pub struct Environment {
    frames: Vec<FxHashMap<String, Variable>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Declares `variable` in the innermost frame. Returns the variable back
    /// if that frame already holds the name.
    pub fn declare(&mut self, variable: Variable) -> Result<(), Variable> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(variable);
        };

        if frame.contains_key(&variable.name) {
            return Err(variable);
        }

        frame.insert(variable.name.clone(), variable);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.frames
            .iter_mut()
            .rev()
            .find_map(|frame| frame.get_mut(name))
    }
}

/// The function whose body is being checked.
#[derive(Debug, Clone)]
pub struct FunctionContext {
    pub name: String,
    pub return_type: Type,
}

/// Result of semantic analysis: the populated module graph, the checked
/// type of every expression, and every diagnostic reported.
#[derive(Debug)]
pub struct Analysis {
    pub graph: ModuleGraph,
    pub expr_types: ArenaMap<ExprId, Type>,
    pub diagnostics: Diagnostics,
}

impl Analysis {
    pub fn type_of(&self, id: ExprId) -> Option<&Type> {
        self.expr_types.get(id)
    }

    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

pub struct TypeChecker<'a> {
    pub ast: &'a Ast,
    pub graph: ModuleGraph,
    pub diagnostics: Diagnostics,
    pub env: Environment,
    pub module: ModuleId,
    pub function: Option<FunctionContext>,
    pub loop_depth: usize,
    pub expr_types: ArenaMap<ExprId, Type>,
    /// Items whose declaration was rejected; later phases skip them.
    pub rejected: FxHashSet<StmtId>,
    /// Globals not folded yet, keyed by owner and name. Module-scope
    /// initializers fold on first use, so they may read globals declared
    /// later in the unit or in another unit.
    pub pending_globals: FxHashMap<(ModuleId, String), StmtId>,
    /// Structs whose field defaults are not folded yet, by qualified path.
    pub pending_defaults: FxHashMap<Vec<String>, (ModuleId, StmtId)>,
    pub folded: FxHashSet<StmtId>,
}

/// Runs every analysis phase over the units already registered in `graph`.
pub fn analyze(ast: &Ast, graph: ModuleGraph) -> Analysis {
    let Some(entry) = graph.entry() else {
        return Analysis {
            graph,
            expr_types: ArenaMap::default(),
            diagnostics: Diagnostics::new(),
        };
    };

    let mut checker = TypeChecker {
        ast,
        graph,
        diagnostics: Diagnostics::new(),
        env: Environment::new(),
        module: entry,
        function: None,
        loop_depth: 0,
        expr_types: ArenaMap::default(),
        rejected: FxHashSet::default(),
        pending_globals: FxHashMap::default(),
        pending_defaults: FxHashMap::default(),
        folded: FxHashSet::default(),
    };

    tracing::info!(units = checker.graph.units().len(), "semantic analysis started");

    checker.discover();
    checker.check_bodies();

    tracing::info!(
        errors = checker.diagnostics.len(),
        "semantic analysis finished"
    );

    Analysis {
        graph: checker.graph,
        expr_types: checker.expr_types,
        diagnostics: checker.diagnostics,
    }
}

impl<'a> TypeChecker<'a> {
    pub fn report(&mut self, kind: ErrorKind, span: &Span, args: Vec<String>) {
        self.diagnostics.report(kind, span, args);
    }

    pub fn record(&mut self, id: ExprId, value: Value) -> Value {
        self.expr_types.insert(id, value.ty.clone());
        value
    }

    pub fn module_name(&self, module: ModuleId) -> String {
        let path = self.graph.path_of(module);
        if path.is_empty() {
            self.graph.module(module).name.clone()
        } else {
            path.join(".")
        }
    }

    /// Code in the current module may use a symbol of `owner` with `access`.
    pub fn can_access(&self, owner: ModuleId, access: Access) -> bool {
        access == Access::Public || self.graph.is_within(self.module, owner)
    }

    /// Reports an access violation for `what` named `name` owned by `owner`.
    pub fn check_access(&mut self, owner: ModuleId, access: Access, what: &str, name: &str, span: &Span) {
        if !self.can_access(owner, access) {
            let module = self.module_name(owner);
            self.report(
                ErrorKind::AccessViolation,
                span,
                vec![what.to_string(), name.to_string(), module],
            );
        }
    }

    /// Resolves a struct by its written path, reporting when it is missing
    /// or inaccessible.
    pub fn resolve_struct(&mut self, path: &[String], span: &Span) -> Option<Struct> {
        let found = self.lookup_struct(path);

        match found {
            Some(record) => {
                self.check_access(record.module, record.access, "struct", &record.name, span);
                Some(record)
            }
            None => {
                self.report(ErrorKind::UndeclaredStruct, span, vec![path.join(".")]);
                None
            }
        }
    }

    pub fn lookup_struct(&self, path: &[String]) -> Option<Struct> {
        let (module, name) = self.graph.resolve_path(self.module, path)?;
        self.graph
            .find_struct(module, name)
            .map(|(_, record)| record.clone())
    }

    pub fn lookup_trait(&self, path: &[String]) -> Option<Trait> {
        let (module, name) = self.graph.resolve_path(self.module, path)?;
        self.graph
            .find_trait(module, name)
            .map(|(_, record)| record.clone())
    }

    pub fn resolve_trait(&mut self, path: &[String], span: &Span) -> Option<Trait> {
        match self.lookup_trait(path) {
            Some(record) => {
                self.check_access(record.module, record.access, "trait", &record.name, span);
                Some(record)
            }
            None => {
                self.report(ErrorKind::UndeclaredTrait, span, vec![path.join(".")]);
                None
            }
        }
    }

    /// Resolves a written type. Unknown names are reported and yield the
    /// unknown type so checking can continue.
    pub fn resolve_type(&mut self, ty: &TypeExpr) -> Type {
        if let [name] = ty.path.as_slice() {
            if let Some(kind) = TypeKind::from_name(name) {
                return Type::primitive(kind).with_pointer_depth(ty.pointer_depth);
            }
        }

        if let Some(record) = self.lookup_struct(&ty.path) {
            self.check_access(record.module, record.access, "struct", &record.name, &ty.span);
            return record.ty().with_pointer_depth(ty.pointer_depth);
        }

        if let Some(record) = self.lookup_trait(&ty.path) {
            self.check_access(record.module, record.access, "trait", &record.name, &ty.span);
            return record.ty().with_pointer_depth(ty.pointer_depth);
        }

        self.report(ErrorKind::UnknownType, &ty.span, vec![ty.path.join(".")]);
        Type::unknown()
    }

    /// The value a freshly declared, uninitialized slot of `ty` holds.
    pub fn default_of(&self, ty: &Type) -> Value {
        if ty.is_struct_value() {
            if let Some(record) = self.graph.struct_of(ty) {
                return record.default_value(&self.graph);
            }
        }

        Value::zero(ty)
    }

    /// Whether `from` converts to the trait type `target`, which requires
    /// the struct (or pointer to it) to implement the trait.
    pub fn struct_to_trait(&self, from: &Type, target: &Type) -> Option<bool> {
        if !target.is_trait_value() || from.kind != TypeKind::Struct || from.pointer_depth > 1 {
            return None;
        }

        let record = self.graph.struct_of(from)?;
        Some(record.implements(target))
    }

    /// Converts `value` for a slot of type `target`, reporting when the
    /// conversion is not implicit. Returns a placeholder of the target type
    /// on failure so checking continues.
    pub fn coerce(&mut self, value: Value, target: &Type, span: &Span) -> Value {
        if target.is_unknown() || value.ty.is_unknown() {
            return Value { ty: target.clone(), ..value };
        }

        if value.ty.can_implicitly_cast(target) {
            return value.cast(target);
        }

        match self.struct_to_trait(&value.ty, target) {
            Some(true) => return Value::opaque(target.clone()),
            Some(false) => {
                self.report(
                    ErrorKind::TraitNotImplemented,
                    span,
                    vec![value.ty.qualified_name(), target.qualified_name()],
                );
                return Value::zero(target);
            }
            None => {}
        }

        if value.ty.is_numeric() && target.is_numeric() {
            self.report(
                ErrorKind::CastNotAllowed,
                span,
                vec![value.ty.to_string(), target.to_string()],
            );
        } else {
            self.report(
                ErrorKind::TypeMismatch,
                span,
                vec![target.to_string(), value.ty.to_string()],
            );
        }

        self.default_of(target)
    }

    /// Whether an explicit `as` cast from `from` to `to` is permitted.
    pub fn can_explicitly_cast(&self, from: &Type, to: &Type) -> bool {
        if from.can_implicitly_cast(to) {
            return true;
        }

        if from.is_numeric() && to.is_numeric() {
            return true;
        }

        if from.is_pointer() && to.is_pointer() {
            return true;
        }

        self.struct_to_trait(from, to).unwrap_or(false)
    }
}
