//! Hierarchical namespaces and the graph that owns them.

use la_arena::{Arena, Idx};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{
    ast::{Access, StmtId},
    types::Type,
};

use super::records::{Function, Struct, Trait, Variable};

pub type ModuleId = Idx<Module>;

#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub access: Access,
    pub parent: Option<ModuleId>,
    /// Top-level items of this module in source order.
    pub items: Vec<StmtId>,
    pub variables: FxHashMap<String, Variable>,
    pub functions: FxHashMap<String, Function>,
    pub structs: FxHashMap<String, Struct>,
    pub traits: FxHashMap<String, Trait>,
    pub submodules: FxHashMap<String, ModuleId>,
    /// Imported modules in import order.
    pub imports: Vec<(String, ModuleId)>,
}

impl Module {
    pub fn new(name: &str, access: Access, parent: Option<ModuleId>) -> Self {
        Module {
            name: name.to_string(),
            access,
            parent,
            items: vec![],
            variables: FxHashMap::default(),
            functions: FxHashMap::default(),
            structs: FxHashMap::default(),
            traits: FxHashMap::default(),
            submodules: FxHashMap::default(),
            imports: vec![],
        }
    }
}

/// Returned by [`ModuleGraph::add_import`] when the import would close a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportCycle;

/// Owner of every module in a compilation.
///
/// One module is the entry unit: its symbols are mangled without a prefix.
/// Other source units are top-level modules addressed by name.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Arena<Module>,
    units: FxHashMap<String, ModuleId>,
    unit_order: Vec<ModuleId>,
    entry: Option<ModuleId>,
}

macro_rules! define_lookup {
    ($(#[$doc:meta])* $name:ident, $table:ident, $record:ty) => {
        $(#[$doc])*
        pub fn $name(&self, module: ModuleId, name: &str) -> Option<(ModuleId, &$record)> {
            let mut visited = FxHashSet::default();
            self.search(module, &mut visited, &|m| m.$table.get(name))
        }
    };
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source unit. The first unit added is the entry unit.
    pub fn add_unit(&mut self, name: &str) -> ModuleId {
        let id = self.modules.alloc(Module::new(name, Access::Public, None));
        self.units.insert(name.to_string(), id);
        self.unit_order.push(id);
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    pub fn add_submodule(&mut self, parent: ModuleId, name: &str, access: Access) -> ModuleId {
        let id = self.modules.alloc(Module::new(name, access, Some(parent)));
        self.modules[parent].submodules.insert(name.to_string(), id);
        id
    }

    pub fn entry(&self) -> Option<ModuleId> {
        self.entry
    }

    pub fn units(&self) -> &[ModuleId] {
        &self.unit_order
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules.iter()
    }

    /// Dotted path of a module from the root. The entry unit has an empty path.
    pub fn path_of(&self, id: ModuleId) -> Vec<String> {
        if Some(id) == self.entry {
            return vec![];
        }

        let module = &self.modules[id];
        let mut path = match module.parent {
            Some(parent) => self.path_of(parent),
            None => vec![],
        };
        path.push(module.name.clone());
        path
    }

    /// Qualified path of a symbol named `name` declared in `module`.
    pub fn qualify(&self, module: ModuleId, name: &str) -> Vec<String> {
        let mut path = self.path_of(module);
        path.push(name.to_string());
        path
    }

    /// Records `import name` in `from`. Fails without modifying anything if
    /// `target` already reaches `from` through its imports.
    pub fn add_import(
        &mut self,
        from: ModuleId,
        name: &str,
        target: ModuleId,
    ) -> Result<(), ImportCycle> {
        if self.reaches(target, from) {
            return Err(ImportCycle);
        }

        let imports = &mut self.modules[from].imports;
        if !imports.iter().any(|(_, id)| *id == target) {
            imports.push((name.to_string(), target));
        }
        Ok(())
    }

    fn reaches(&self, start: ModuleId, goal: ModuleId) -> bool {
        let mut stack = vec![start];
        let mut visited = FxHashSet::default();

        while let Some(id) = stack.pop() {
            if id == goal {
                return true;
            }
            if visited.insert(id) {
                stack.extend(self.modules[id].imports.iter().map(|(_, m)| *m));
            }
        }

        false
    }

    /// Whether `inner` is `outer` or nested inside it.
    pub fn is_within(&self, inner: ModuleId, outer: ModuleId) -> bool {
        let mut current = Some(inner);
        while let Some(id) = current {
            if id == outer {
                return true;
            }
            current = self.modules[id].parent;
        }
        false
    }

    fn search<'a, T>(
        &'a self,
        module: ModuleId,
        visited: &mut FxHashSet<ModuleId>,
        get: &dyn Fn(&'a Module) -> Option<&'a T>,
    ) -> Option<(ModuleId, &'a T)> {
        if !visited.insert(module) {
            return None;
        }

        let current = &self.modules[module];
        if let Some(found) = get(current) {
            return Some((module, found));
        }

        current
            .imports
            .iter()
            .find_map(|(_, import)| self.search(*import, visited, get))
    }

    define_lookup!(
        /// Finds a struct in `module` or, failing that, its imports in order.
        find_struct, structs, Struct
    );
    define_lookup!(find_trait, traits, Trait);
    define_lookup!(find_function, functions, Function);
    define_lookup!(find_global_var, variables, Variable);

    /// Resolves the first segment of a module path as seen from `from`:
    /// a submodule, an import, a submodule of an enclosing module, then a
    /// source unit.
    pub fn find_module(&self, from: ModuleId, name: &str) -> Option<ModuleId> {
        let mut current = Some(from);
        while let Some(id) = current {
            let module = &self.modules[id];
            if let Some(sub) = module.submodules.get(name) {
                return Some(*sub);
            }
            if id == from {
                if let Some((_, import)) = module.imports.iter().find(|(n, _)| n == name) {
                    return Some(*import);
                }
            }
            current = module.parent;
        }

        self.units.get(name).copied()
    }

    /// Walks `segments` as nested modules starting from `from`.
    pub fn resolve_module(&self, from: ModuleId, segments: &[String]) -> Option<ModuleId> {
        let (first, rest) = segments.split_first()?;
        let mut module = self.find_module(from, first)?;

        for segment in rest {
            module = *self.modules[module].submodules.get(segment)?;
        }

        Some(module)
    }

    /// Splits a qualified name into the module holding it and the bare name.
    /// A single segment resolves to `from` itself.
    pub fn resolve_path<'p>(&self, from: ModuleId, path: &'p [String]) -> Option<(ModuleId, &'p str)> {
        let (last, prefix) = path.split_last()?;
        if prefix.is_empty() {
            return Some((from, last.as_str()));
        }

        Some((self.resolve_module(from, prefix)?, last.as_str()))
    }

    /// The struct record a struct type refers to.
    pub fn struct_of(&self, ty: &Type) -> Option<&Struct> {
        self.modules[ty.module?].structs.get(&ty.name)
    }

    /// The trait record a trait type refers to.
    pub fn trait_of(&self, ty: &Type) -> Option<&Trait> {
        self.modules[ty.module?].traits.get(&ty.name)
    }
}
