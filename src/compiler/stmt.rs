use crate::{
    ast::{
        ast::{StmtId, StmtKind, VarDecl},
        types::Type,
        values::Value,
    },
    errors::errors::CodegenError,
    symbols::records::Function,
};

use super::{
    cast::expect_int,
    compiler::{Compiler, FunctionState, Local, LoopTarget},
    expr::gen_expression,
    identity::SourceType,
    shadow::{mangle, ShadowFunction},
};

/// Lowers every function and method body, module by module.
pub fn gen_bodies(compiler: &mut Compiler<'_, '_>) -> Result<(), CodegenError> {
    let ast = compiler.ast;
    let graph = compiler.graph;

    for (module, record) in graph.iter() {
        compiler.current_module = module;

        for item in &record.items {
            match &ast.stmt(*item).kind {
                StmtKind::FnDecl(decl) => {
                    let Some(function) = record
                        .functions
                        .get(&decl.signature.name)
                        .filter(|f| f.body == Some(decl.body))
                    else {
                        continue;
                    };

                    let shadow = compiler
                        .functions
                        .get(&graph.qualify(module, &function.name))
                        .cloned()
                        .ok_or_else(|| CodegenError::UnresolvedFunction(function.name.clone()))?;
                    gen_function(compiler, &shadow, function, None)?;
                }
                StmtKind::Impl(decl) => {
                    let Some(owner) = record.structs.get(&decl.struct_name) else {
                        continue;
                    };

                    for method in &decl.methods {
                        let Some(found) = owner
                            .methods
                            .get(&method.signature.name)
                            .filter(|found| found.function.body == Some(method.body))
                        else {
                            continue;
                        };

                        let shadow = compiler
                            .shadow_struct(&owner.path)?
                            .methods
                            .get(&found.function.name)
                            .cloned()
                            .ok_or_else(|| {
                                CodegenError::UnresolvedMethod(mangle(&owner.path), found.function.name.clone())
                            })?;
                        gen_function(compiler, &shadow, &found.function, Some(owner.ty()))?;
                    }
                }
                _ => {}
            }
        }
    }

    Ok(())
}

/// Lowers one body into its declared prototype. Parameters are copied into
/// stack slots; methods bind their first parameter to `self`, typed as a
/// pointer to `owner`.
pub fn gen_function<'ctx>(
    compiler: &mut Compiler<'ctx, '_>,
    shadow: &ShadowFunction<'ctx>,
    record: &Function,
    owner: Option<Type>,
) -> Result<(), CodegenError> {
    let Some(body) = record.body else {
        return Ok(());
    };
    let function = shadow.value;
    tracing::debug!(function = %function.get_name().to_string_lossy(), "lowering body");

    compiler.create_function_block(function);
    compiler.function = Some(FunctionState {
        value: function,
        return_type: record.return_type.clone(),
        this: owner.as_ref().and_then(SourceType::of),
    });
    compiler.push_scope();

    let mut params = function.get_param_iter();

    if let Some(owner) = &owner {
        let receiver = params
            .next()
            .ok_or_else(|| CodegenError::UnresolvedVariable("self".into()))?;

        let slot = compiler.entry_alloca(receiver.get_type(), "self")?;
        compiler.builder.build_store(slot, receiver)?;
        compiler.declare_local(
            "self",
            Local {
                ptr: slot,
                ty: owner.pointer_to(),
                source: None,
                receiver: true,
            },
        );
    }

    for ((name, ty), value) in record.params.iter().zip(params) {
        let slot = compiler.entry_alloca(value.get_type(), name)?;
        compiler.builder.build_store(slot, value)?;
        compiler.declare_local(
            name,
            Local {
                ptr: slot,
                ty: ty.clone(),
                source: SourceType::of(ty),
                receiver: false,
            },
        );
    }

    gen_statement(compiler, body)?;

    // Analysis guarantees value-returning functions return on every path
    if !compiler.is_terminated() {
        if record.return_type.is_nothing() {
            compiler.builder.build_return(None)?;
        } else {
            compiler.builder.build_unreachable()?;
        }
    }

    compiler.pop_scope();
    compiler.function = None;
    Ok(())
}

pub fn gen_statement(compiler: &mut Compiler<'_, '_>, id: StmtId) -> Result<(), CodegenError> {
    let ast = compiler.ast;

    match &ast.stmt(id).kind {
        StmtKind::Expression(expr) => {
            gen_expression(compiler, *expr)?;
        }
        StmtKind::VarDecl(decl) => gen_var_decl(compiler, decl)?,
        StmtKind::Block(stmts) => {
            compiler.push_scope();
            for stmt in stmts {
                // Code after a return, break or continue is unreachable
                if compiler.is_terminated() {
                    break;
                }
                gen_statement(compiler, *stmt)?;
            }
            compiler.pop_scope();
        }
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let function = compiler.current_function()?;
            let condition = expect_int(gen_expression(compiler, *condition)?.value)?;

            let then_block = compiler.create_basic_block("if.then", function);
            let else_block = else_branch.map(|_| compiler.create_basic_block("if.else", function));
            let end_block = compiler.create_basic_block("if.end", function);

            compiler.builder.build_conditional_branch(
                condition,
                then_block,
                else_block.unwrap_or(end_block),
            )?;

            compiler.builder.position_at_end(then_block);
            gen_statement(compiler, *then_branch)?;
            if !compiler.is_terminated() {
                compiler.builder.build_unconditional_branch(end_block)?;
            }

            if let (Some(else_block), Some(else_branch)) = (else_block, else_branch) {
                compiler.builder.position_at_end(else_block);
                gen_statement(compiler, *else_branch)?;
                if !compiler.is_terminated() {
                    compiler.builder.build_unconditional_branch(end_block)?;
                }
            }

            compiler.builder.position_at_end(end_block);
        }
        StmtKind::While { condition, body } => {
            let function = compiler.current_function()?;

            let condition_block = compiler.create_basic_block("while.cond", function);
            let body_block = compiler.create_basic_block("while.body", function);
            let end_block = compiler.create_basic_block("while.end", function);

            compiler.builder.build_unconditional_branch(condition_block)?;
            compiler.builder.position_at_end(condition_block);
            let condition = expect_int(gen_expression(compiler, *condition)?.value)?;
            compiler
                .builder
                .build_conditional_branch(condition, body_block, end_block)?;

            compiler.builder.position_at_end(body_block);
            compiler.loops.push(LoopTarget {
                continue_block: condition_block,
                break_block: end_block,
            });
            gen_statement(compiler, *body)?;
            compiler.loops.pop();

            if !compiler.is_terminated() {
                compiler.builder.build_unconditional_branch(condition_block)?;
            }

            compiler.builder.position_at_end(end_block);
        }
        StmtKind::Break => {
            let target = compiler
                .loops
                .last()
                .ok_or_else(|| CodegenError::OutsideLoop("break".into()))?;
            compiler.builder.build_unconditional_branch(target.break_block)?;
        }
        StmtKind::Continue => {
            let target = compiler
                .loops
                .last()
                .ok_or_else(|| CodegenError::OutsideLoop("continue".into()))?;
            compiler.builder.build_unconditional_branch(target.continue_block)?;
        }
        StmtKind::Return(value) => {
            let return_type = compiler
                .function
                .as_ref()
                .map(|f| f.return_type.clone())
                .ok_or_else(|| CodegenError::Builder("return outside of a function".into()))?;

            match value {
                Some(value) => {
                    let value = gen_expression(compiler, *value)?;
                    let value = compiler.coerce(value, &return_type)?;
                    compiler.builder.build_return(Some(&value.value))?;
                }
                None => {
                    compiler.builder.build_return(None)?;
                }
            }
        }
        // Items are lowered by the declaration passes
        StmtKind::FnDecl(_)
        | StmtKind::StructDecl(_)
        | StmtKind::TraitDecl(_)
        | StmtKind::Impl(_)
        | StmtKind::Import(_)
        | StmtKind::ModuleDecl(_) => {}
    }

    Ok(())
}

fn gen_var_decl(compiler: &mut Compiler<'_, '_>, decl: &VarDecl) -> Result<(), CodegenError> {
    let ty = match (&decl.ty, decl.value) {
        (Some(ty), _) => compiler.resolve_type(ty)?,
        (None, Some(value)) => compiler.expr_type(value)?,
        (None, None) => return Err(CodegenError::UnresolvedVariable(decl.name.clone())),
    }
    .with_const(false);

    let initial = match decl.value {
        Some(value) => {
            let value = gen_expression(compiler, value)?;
            compiler.coerce(value, &ty)?.value
        }
        None => {
            let default = match compiler.graph.struct_of(&ty) {
                Some(record) if ty.is_struct_value() => record.default_value(compiler.graph),
                _ => Value::zero(&ty),
            };
            compiler.const_value(&default, &ty)?
        }
    };

    let slot = compiler.entry_alloca(compiler.lower_type(&ty)?, &decl.name)?;
    compiler.builder.build_store(slot, initial)?;
    compiler.declare_local(
        &decl.name,
        Local {
            ptr: slot,
            source: SourceType::of(&ty),
            ty,
            receiver: false,
        },
    );

    Ok(())
}
