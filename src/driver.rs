//! Compilation pipeline.
//!
//! Source units are lexed and parsed into one shared [`Ast`], registered in
//! a [`ModuleGraph`] (the first unit is the entry unit), analyzed, and
//! lowered into a single LLVM module. The backend then verifies the module,
//! optimizes it at the requested level and writes IR or an object file.

use std::{
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use inkwell::{
    context::Context,
    module::Module,
    passes::{PassManager, PassManagerBuilder},
    targets::{CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple},
    OptimizationLevel,
};

use crate::{
    ast::ast::Ast,
    compiler::compiler::compile,
    errors::errors::CompileError,
    lexer::lexer::tokenize,
    parser::parser::parse,
    symbols::module::ModuleGraph,
    type_checker::type_checker::{analyze, Analysis},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EmitKind {
    /// Textual LLVM IR
    Ir,
    /// Native object file
    Object,
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub output: PathBuf,
    pub emit: EmitKind,
    /// 0 to 3
    pub opt_level: u8,
    /// Defaults to the host triple.
    pub target: Option<String>,
}

impl CompileOptions {
    pub fn optimization_level(&self) -> OptimizationLevel {
        match self.opt_level {
            0 => OptimizationLevel::None,
            1 => OptimizationLevel::Less,
            2 => OptimizationLevel::Default,
            _ => OptimizationLevel::Aggressive,
        }
    }
}

/// One source file. Its unit name is the file stem, which is also the
/// name other units import it by.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub name: String,
    pub path: PathBuf,
    pub content: String,
}

impl SourceUnit {
    pub fn load(path: &Path) -> Result<Self, CompileError> {
        let content = fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string());

        Ok(SourceUnit {
            name,
            path: path.to_path_buf(),
            content,
        })
    }

    pub fn from_source(name: &str, content: &str) -> Self {
        SourceUnit {
            name: name.to_string(),
            path: PathBuf::from(format!("{}.sb", name)),
            content: content.to_string(),
        }
    }

    /// Name diagnostics from this unit carry in their positions.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Parses every unit into one arena and registers it in a fresh graph.
pub fn parse_units(units: &[SourceUnit]) -> Result<(Ast, ModuleGraph), CompileError> {
    let mut ast = Ast::new();
    let mut graph = ModuleGraph::new();

    for unit in units {
        let file = unit.file_name();
        let tokens = tokenize(unit.content.clone(), Some(file.clone())).map_err(CompileError::Lex)?;
        let items = parse(tokens, Rc::new(file), &mut ast).map_err(CompileError::Parse)?;

        let id = graph.add_unit(&unit.name);
        graph.module_mut(id).items = items;
        tracing::debug!(unit = %unit.name, items = graph.module(id).items.len(), "parsed unit");
    }

    Ok((ast, graph))
}

/// Parses and analyzes `units`. Every diagnostic is returned at once.
pub fn check(units: &[SourceUnit]) -> Result<(Ast, Analysis), CompileError> {
    let (ast, graph) = parse_units(units)?;

    tracing::info!(units = units.len(), "analyzing");
    let analysis = analyze(&ast, graph);

    if !analysis.is_ok() {
        return Err(CompileError::Semantic(analysis.diagnostics.into_errors()));
    }

    Ok((ast, analysis))
}

/// Runs the whole front end and lowers the result into `context`.
pub fn compile_units<'ctx>(context: &'ctx Context, units: &[SourceUnit]) -> Result<Module<'ctx>, CompileError> {
    let (ast, analysis) = check(units)?;
    let name = units.first().map(|unit| unit.name.as_str()).unwrap_or("main");

    tracing::info!(module = name, "lowering");
    Ok(compile(context, &ast, &analysis, name)?)
}

fn target_machine(options: &CompileOptions) -> Result<TargetMachine, CompileError> {
    Target::initialize_all(&InitializationConfig::default());

    let triple = match &options.target {
        Some(triple) => TargetTriple::create(triple),
        None => TargetMachine::get_default_triple(),
    };
    let target = Target::from_triple(&triple).map_err(|e| CompileError::Backend(e.to_string()))?;

    target
        .create_target_machine(
            &triple,
            "generic",
            "",
            options.optimization_level(),
            RelocMode::PIC,
            CodeModel::Default,
        )
        .ok_or_else(|| CompileError::Backend(format!("no target machine for `{}`", triple.as_str().to_string_lossy())))
}

/// Optimizes `module` and writes it as `options.emit` to `options.output`.
pub fn emit(module: &Module<'_>, options: &CompileOptions) -> Result<(), CompileError> {
    let machine = target_machine(options)?;
    module.set_triple(&machine.get_triple());
    module.set_data_layout(&machine.get_target_data().get_data_layout());

    if options.opt_level > 0 {
        let builder = PassManagerBuilder::create();
        builder.set_optimization_level(options.optimization_level());

        let passes = PassManager::create(());
        builder.populate_module_pass_manager(&passes);
        passes.run_on(module);
    }

    module
        .verify()
        .map_err(|e| CompileError::Backend(e.to_string()))?;

    match options.emit {
        EmitKind::Ir => module.print_to_file(&options.output),
        EmitKind::Object => machine.write_to_file(module, FileType::Object, &options.output),
    }
    .map_err(|e| CompileError::Backend(e.to_string()))?;

    tracing::info!(output = %options.output.display(), emit = ?options.emit, "wrote output");
    Ok(())
}

/// Compiles the files at `paths`, the first being the entry unit.
pub fn compile_files(paths: &[PathBuf], options: &CompileOptions) -> Result<Vec<SourceUnit>, (Vec<SourceUnit>, CompileError)> {
    let mut units = vec![];
    for path in paths {
        match SourceUnit::load(path) {
            Ok(unit) => units.push(unit),
            Err(error) => return Err((units, error)),
        }
    }

    let context = Context::create();
    let result = compile_units(&context, &units).and_then(|module| emit(&module, options));

    match result {
        Ok(()) => Ok(units),
        Err(error) => Err((units, error)),
    }
}
