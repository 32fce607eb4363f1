use inkwell::{
    values::{BasicMetadataValueEnum, BasicValueEnum, CallSiteValue, IntValue, PointerValue},
    FloatPredicate, IntPredicate,
};

use crate::{
    ast::{
        ast::{AssignOp, BinaryOp, ExprId, ExprKind, FieldInit, Literal, TypeExpr, UnaryOp},
        types::{Type, TypeKind},
    },
    errors::errors::CodegenError,
};

use super::{
    cast::{expect_int, expect_pointer},
    compiler::Compiler,
    identity::{SourceType, TypedValue},
    shadow::{mangle, ShadowFunction},
};

impl<'ctx, 'a> Compiler<'ctx, 'a> {
    /// Wraps a call result. Calls returning nothing yield the unit marker.
    pub fn call_result(&self, call: CallSiteValue<'ctx>, return_type: &Type) -> TypedValue<'ctx> {
        match call.try_as_basic_value().left() {
            Some(value) => TypedValue::new(value, return_type.clone()),
            None => TypedValue::unit(self.context),
        }
    }
}

/// Lowers an expression to an rvalue. Struct and trait values leave with
/// their identity attached.
pub fn gen_expression<'ctx>(compiler: &mut Compiler<'ctx, '_>, id: ExprId) -> Result<TypedValue<'ctx>, CodegenError> {
    let ast = compiler.ast;

    let mut value = match &ast.expr(id).kind {
        ExprKind::Literal(literal) => gen_literal(compiler, id, literal)?,
        ExprKind::Symbol(_) | ExprKind::Member { .. } if compiler.function.is_none() => {
            module_scope_read(compiler, id).ok_or(CodegenError::NotAddressable)?
        }
        ExprKind::Symbol(_) | ExprKind::Member { .. } => {
            let (ptr, ty) = gen_place(compiler, id)?;
            let loaded = compiler.builder.build_load(ptr, "load")?;
            TypedValue::new(loaded, ty).with_place(ptr)
        }
        ExprKind::Binary { left, op, right } => gen_binary(compiler, *left, *op, *right)?,
        ExprKind::Unary { op, operand } => gen_unary(compiler, id, *op, *operand)?,
        ExprKind::Assignment { target, op, value } => gen_assignment(compiler, *target, *op, *value)?,
        ExprKind::Call { callee, args } => {
            let path = ast
                .path_of(*callee)
                .ok_or_else(|| CodegenError::UnresolvedFunction("expression".into()))?;
            let function = compiler.resolve_function(&path)?.clone();
            gen_direct_call(compiler, &function, None, args)?
        }
        ExprKind::MethodCall {
            receiver,
            method,
            args,
        } => gen_method_call(compiler, *receiver, method, args)?,
        ExprKind::StructLiteral { path, fields, heap } => gen_struct_literal(compiler, path, fields, *heap)?,
        ExprKind::Cast { expr, ty } => gen_cast(compiler, *expr, ty)?,
    };

    if value.source.is_none() && matches!(value.ty.kind, TypeKind::Struct | TypeKind::Trait) {
        value.source = Some(compiler.static_source_of(id)?);
    }

    Ok(value)
}

/// A global read outside any function. Module-scope code runs at
/// elaboration time, so the read yields the constant initializer and emits
/// no load.
fn module_scope_read<'ctx>(compiler: &Compiler<'ctx, '_>, id: ExprId) -> Option<TypedValue<'ctx>> {
    let global = match &compiler.ast.expr(id).kind {
        ExprKind::Symbol(name) => compiler.find_global(name)?,
        ExprKind::Member { object, field } => {
            let module = compiler.module_path(*object)?;
            compiler.globals.get(&compiler.graph.qualify(module, field))?
        }
        _ => return None,
    };

    Some(TypedValue {
        source: global.source.clone(),
        ..TypedValue::new(global.initializer, global.ty.clone())
    })
}

fn gen_literal<'ctx>(compiler: &Compiler<'ctx, '_>, id: ExprId, literal: &Literal) -> Result<TypedValue<'ctx>, CodegenError> {
    let ty = compiler.expr_type(id)?;

    let value: BasicValueEnum<'ctx> = match *literal {
        Literal::Int(v) => compiler
            .int_type(ty.kind)
            .ok_or_else(|| CodegenError::UnsupportedType(ty.to_string()))?
            .const_int(v as u64, true)
            .into(),
        Literal::Float { value, .. } => compiler
            .float_type(ty.kind)
            .ok_or_else(|| CodegenError::UnsupportedType(ty.to_string()))?
            .const_float(value)
            .into(),
        Literal::Char(v) => compiler.context.i8_type().const_int(v as u64, true).into(),
        Literal::Bool(v) => compiler.context.bool_type().const_int(v as u64, false).into(),
        Literal::Nil => compiler.i8_ptr_type().const_null().into(),
    };

    Ok(TypedValue::new(value, ty))
}

/// Address and type of an assignable expression: a variable, a field or
/// a dereference. Fields of values without storage are spilled first.
pub fn gen_place<'ctx>(compiler: &mut Compiler<'ctx, '_>, id: ExprId) -> Result<(PointerValue<'ctx>, Type), CodegenError> {
    let ast = compiler.ast;

    match &ast.expr(id).kind {
        ExprKind::Symbol(name) => {
            if let Some(local) = compiler.lookup_local(name) {
                return Ok((local.ptr, local.ty.clone()));
            }

            compiler
                .find_global(name)
                .map(|global| (global.ptr, global.ty.clone()))
                .ok_or_else(|| CodegenError::UnresolvedVariable(name.clone()))
        }
        ExprKind::Member { object, field } => {
            if let Some(module) = compiler.module_path(*object) {
                let path = compiler.graph.qualify(module, field);
                return compiler
                    .globals
                    .get(&path)
                    .map(|global| (global.ptr, global.ty.clone()))
                    .ok_or_else(|| CodegenError::UnresolvedVariable(mangle(&path)));
            }

            let SourceType::Struct(struct_path) = compiler.static_source_of(*object)? else {
                return Err(CodegenError::UnresolvedField("trait object".into(), field.clone()));
            };
            let declared = compiler
                .shadow_struct(&struct_path)?
                .fields
                .get(field)
                .cloned()
                .ok_or_else(|| CodegenError::UnresolvedField(mangle(&struct_path), field.clone()))?;

            let base = address_of(compiler, *object)?;
            let ptr = compiler
                .builder
                .build_struct_gep(base, declared.index, &declared.name)?;

            Ok((ptr, declared.ty))
        }
        ExprKind::Unary {
            op: UnaryOp::Deref,
            operand,
        } => {
            let pointer = gen_expression(compiler, *operand)?;
            let pointee = pointer
                .ty
                .deref()
                .ok_or_else(|| CodegenError::UnsupportedType(pointer.ty.to_string()))?;

            Ok((expect_pointer(pointer.value)?, pointee))
        }
        _ => Err(CodegenError::NotAddressable),
    }
}

/// Address of the struct `id` denotes: the pointer itself for `*Struct`,
/// the storage of a place, or a spill slot for a temporary.
fn address_of<'ctx>(compiler: &mut Compiler<'ctx, '_>, id: ExprId) -> Result<PointerValue<'ctx>, CodegenError> {
    let ty = compiler.expr_type(id)?;

    if ty.is_pointer() {
        return expect_pointer(gen_expression(compiler, id)?.value);
    }

    if compiler.is_place(id) {
        return Ok(gen_place(compiler, id)?.0);
    }

    let value = gen_expression(compiler, id)?;
    compiler.spill(value.value)
}

fn gen_binary<'ctx>(
    compiler: &mut Compiler<'ctx, '_>,
    left: ExprId,
    op: BinaryOp,
    right: ExprId,
) -> Result<TypedValue<'ctx>, CodegenError> {
    if op.is_logical() {
        return gen_logical(compiler, left, op, right);
    }

    let l = gen_expression(compiler, left)?;
    let r = gen_expression(compiler, right)?;
    if l.ty.is_nothing() || r.ty.is_nothing() {
        return Err(CodegenError::VoidValue);
    }

    if op.is_comparison() {
        return gen_comparison(compiler, op, l, r);
    }

    gen_arithmetic(compiler, op, l, r)
}

/// `&&` and `||` only evaluate their right side when it decides the result.
fn gen_logical<'ctx>(
    compiler: &mut Compiler<'ctx, '_>,
    left: ExprId,
    op: BinaryOp,
    right: ExprId,
) -> Result<TypedValue<'ctx>, CodegenError> {
    let function = compiler.current_function()?;
    let bool_type = compiler.context.bool_type();

    let lhs = expect_int(gen_expression(compiler, left)?.value)?;
    let lhs_block = compiler
        .builder
        .get_insert_block()
        .ok_or_else(|| CodegenError::Builder("builder is not positioned".into()))?;

    let rhs_block = compiler.create_basic_block("logic.rhs", function);
    let merge_block = compiler.create_basic_block("logic.end", function);

    let short_circuit = match op {
        BinaryOp::And => {
            compiler
                .builder
                .build_conditional_branch(lhs, rhs_block, merge_block)?;
            bool_type.const_zero()
        }
        _ => {
            compiler
                .builder
                .build_conditional_branch(lhs, merge_block, rhs_block)?;
            bool_type.const_int(1, false)
        }
    };

    compiler.builder.position_at_end(rhs_block);
    let rhs = expect_int(gen_expression(compiler, right)?.value)?;
    let rhs_end = compiler
        .builder
        .get_insert_block()
        .ok_or_else(|| CodegenError::Builder("builder is not positioned".into()))?;
    compiler.builder.build_unconditional_branch(merge_block)?;

    compiler.builder.position_at_end(merge_block);
    let phi = compiler.builder.build_phi(bool_type, "logic")?;
    phi.add_incoming(&[(&short_circuit, lhs_block), (&rhs, rhs_end)]);

    Ok(TypedValue::new(phi.as_basic_value(), Type::bool()))
}

fn int_predicate(op: BinaryOp, signed: bool) -> IntPredicate {
    match (op, signed) {
        (BinaryOp::Eq, _) => IntPredicate::EQ,
        (BinaryOp::Ne, _) => IntPredicate::NE,
        (BinaryOp::Lt, true) => IntPredicate::SLT,
        (BinaryOp::Le, true) => IntPredicate::SLE,
        (BinaryOp::Gt, true) => IntPredicate::SGT,
        (BinaryOp::Ge, true) => IntPredicate::SGE,
        (BinaryOp::Lt, false) => IntPredicate::ULT,
        (BinaryOp::Le, false) => IntPredicate::ULE,
        (BinaryOp::Gt, false) => IntPredicate::UGT,
        _ => IntPredicate::UGE,
    }
}

fn float_predicate(op: BinaryOp) -> FloatPredicate {
    match op {
        BinaryOp::Eq => FloatPredicate::OEQ,
        BinaryOp::Ne => FloatPredicate::UNE,
        BinaryOp::Lt => FloatPredicate::OLT,
        BinaryOp::Le => FloatPredicate::OLE,
        BinaryOp::Gt => FloatPredicate::OGT,
        _ => FloatPredicate::OGE,
    }
}

/// One side of a pointer comparison as an i64 address. Integer operands
/// are sign-extended and compared as raw addresses.
fn address_operand<'ctx>(
    compiler: &mut Compiler<'ctx, '_>,
    operand: TypedValue<'ctx>,
    common: &Type,
) -> Result<IntValue<'ctx>, CodegenError> {
    let i64_type = compiler.context.i64_type();

    if operand.ty.is_integer() {
        return expect_int(compiler.convert_numeric(operand.value, i64_type.into())?);
    }

    let pointer = expect_pointer(compiler.coerce(operand, common)?.value)?;
    Ok(compiler.builder.build_ptr_to_int(pointer, i64_type, "addr")?)
}

fn gen_comparison<'ctx>(
    compiler: &mut Compiler<'ctx, '_>,
    op: BinaryOp,
    l: TypedValue<'ctx>,
    r: TypedValue<'ctx>,
) -> Result<TypedValue<'ctx>, CodegenError> {
    let bool_type = compiler.context.bool_type();
    let i64_type = compiler.context.i64_type();

    if l.ty.is_nil() && r.ty.is_nil() {
        let equal = (op == BinaryOp::Eq) as u64;
        return Ok(TypedValue::new(bool_type.const_int(equal, false).into(), Type::bool()));
    }

    // A trait object is nil when its data pointer is
    if l.ty.is_trait_value() || r.ty.is_trait_value() {
        let object = if l.ty.is_trait_value() { &l } else { &r };
        let BasicValueEnum::StructValue(fat) = object.value else {
            return Err(CodegenError::UnsupportedType(object.ty.to_string()));
        };
        let data = expect_pointer(compiler.builder.build_extract_value(fat, 0, "data")?)?;
        let address = compiler.builder.build_ptr_to_int(data, i64_type, "addr")?;
        let result = compiler.builder.build_int_compare(
            int_predicate(op, false),
            address,
            i64_type.const_zero(),
            "cmp",
        )?;
        return Ok(TypedValue::new(result.into(), Type::bool()));
    }

    if l.ty.is_pointer() || r.ty.is_pointer() {
        let common = Type::get_common(&l.ty, &r.ty);
        let lhs = address_operand(compiler, l, &common)?;
        let rhs = address_operand(compiler, r, &common)?;
        let result = compiler
            .builder
            .build_int_compare(int_predicate(op, false), lhs, rhs, "cmp")?;
        return Ok(TypedValue::new(result.into(), Type::bool()));
    }

    let common = compiler.common_lowered(l.value.get_type(), r.value.get_type());
    let lhs = compiler.convert_numeric(l.value, common)?;
    let rhs = compiler.convert_numeric(r.value, common)?;

    let result = match (lhs, rhs) {
        (BasicValueEnum::FloatValue(a), BasicValueEnum::FloatValue(b)) => compiler
            .builder
            .build_float_compare(float_predicate(op), a, b, "cmp")?,
        (BasicValueEnum::IntValue(a), BasicValueEnum::IntValue(b)) => compiler
            .builder
            .build_int_compare(int_predicate(op, true), a, b, "cmp")?,
        _ => return Err(CodegenError::UnsupportedType(l.ty.to_string())),
    };

    Ok(TypedValue::new(result.into(), Type::bool()))
}

/// Arithmetic and bitwise operators, including pointer offsets.
fn gen_arithmetic<'ctx>(
    compiler: &mut Compiler<'ctx, '_>,
    op: BinaryOp,
    l: TypedValue<'ctx>,
    r: TypedValue<'ctx>,
) -> Result<TypedValue<'ctx>, CodegenError> {
    if l.ty.is_pointer() || r.ty.is_pointer() {
        let (pointer, offset) = if l.ty.is_pointer() { (l, r) } else { (r, l) };
        let i64_type = compiler.context.i64_type();

        let mut index = expect_int(compiler.convert_numeric(offset.value, i64_type.into())?)?;
        if op == BinaryOp::Sub {
            index = compiler.builder.build_int_neg(index, "neg")?;
        }

        let address = unsafe {
            compiler
                .builder
                .build_in_bounds_gep(expect_pointer(pointer.value)?, &[index], "offset")?
        };
        return Ok(TypedValue {
            source: pointer.source,
            ..TypedValue::new(address.into(), pointer.ty.with_const(false))
        });
    }

    let ty = Type::get_common(&l.ty, &r.ty).with_const(false);
    let common = compiler.common_lowered(l.value.get_type(), r.value.get_type());
    let lhs = compiler.convert_numeric(l.value, common)?;
    let rhs = compiler.convert_numeric(r.value, common)?;
    let builder = &compiler.builder;

    let result: BasicValueEnum<'ctx> = match (lhs, rhs) {
        (BasicValueEnum::FloatValue(a), BasicValueEnum::FloatValue(b)) => match op {
            BinaryOp::Add => builder.build_float_add(a, b, "add")?,
            BinaryOp::Sub => builder.build_float_sub(a, b, "sub")?,
            BinaryOp::Mul => builder.build_float_mul(a, b, "mul")?,
            BinaryOp::Div => builder.build_float_div(a, b, "div")?,
            _ => builder.build_float_rem(a, b, "rem")?,
        }
        .into(),
        (BasicValueEnum::IntValue(a), BasicValueEnum::IntValue(b)) => match op {
            BinaryOp::Add => builder.build_int_add(a, b, "add")?,
            BinaryOp::Sub => builder.build_int_sub(a, b, "sub")?,
            BinaryOp::Mul => builder.build_int_mul(a, b, "mul")?,
            BinaryOp::Div => builder.build_int_signed_div(a, b, "div")?,
            BinaryOp::Rem => builder.build_int_signed_rem(a, b, "rem")?,
            BinaryOp::BitAnd => builder.build_and(a, b, "and")?,
            _ => builder.build_or(a, b, "or")?,
        }
        .into(),
        _ => return Err(CodegenError::UnsupportedType(ty.to_string())),
    };

    Ok(TypedValue::new(result, ty))
}

fn gen_unary<'ctx>(
    compiler: &mut Compiler<'ctx, '_>,
    id: ExprId,
    op: UnaryOp,
    operand: ExprId,
) -> Result<TypedValue<'ctx>, CodegenError> {
    match op {
        UnaryOp::Neg => {
            let value = gen_expression(compiler, operand)?;
            let negated: BasicValueEnum<'ctx> = match value.value {
                BasicValueEnum::FloatValue(v) => compiler.builder.build_float_neg(v, "neg")?.into(),
                BasicValueEnum::IntValue(v) => compiler.builder.build_int_neg(v, "neg")?.into(),
                _ => return Err(CodegenError::UnsupportedType(value.ty.to_string())),
            };
            Ok(TypedValue::new(negated, value.ty.with_const(false)))
        }
        UnaryOp::Not => {
            let value = expect_int(gen_expression(compiler, operand)?.value)?;
            let inverted = compiler.builder.build_not(value, "not")?;
            Ok(TypedValue::new(inverted.into(), Type::bool()))
        }
        UnaryOp::AddressOf => {
            let ty = compiler.expr_type(id)?;
            let address = if compiler.is_place(operand) {
                gen_place(compiler, operand)?.0
            } else {
                let value = gen_expression(compiler, operand)?;
                compiler.spill(value.value)?
            };
            Ok(TypedValue::new(address.into(), ty))
        }
        UnaryOp::Deref => {
            let (ptr, ty) = gen_place(compiler, id)?;
            let loaded = compiler.builder.build_load(ptr, "deref")?;
            Ok(TypedValue::new(loaded, ty).with_place(ptr))
        }
    }
}

fn gen_assignment<'ctx>(
    compiler: &mut Compiler<'ctx, '_>,
    target: ExprId,
    op: AssignOp,
    value: ExprId,
) -> Result<TypedValue<'ctx>, CodegenError> {
    let (ptr, slot) = gen_place(compiler, target)?;
    let slot = slot.with_const(false);
    let assigned = gen_expression(compiler, value)?;

    let stored = match op.binary() {
        None => compiler.coerce(assigned, &slot)?,
        Some(binary) => {
            let current = compiler.builder.build_load(ptr, "current")?;
            let current = TypedValue::new(current, slot.clone());
            let combined = gen_arithmetic(compiler, binary, current, assigned)?;
            compiler.coerce(combined, &slot)?
        }
    };

    compiler.builder.build_store(ptr, stored.value)?;
    Ok(stored.with_place(ptr))
}

/// Lowers arguments converted to the parameter types of the callee.
fn gen_arguments<'ctx>(
    compiler: &mut Compiler<'ctx, '_>,
    args: &[ExprId],
    params: &[Type],
) -> Result<Vec<BasicMetadataValueEnum<'ctx>>, CodegenError> {
    args.iter()
        .zip(params)
        .map(|(arg, ty)| {
            let value = gen_expression(compiler, *arg)?;
            Ok(compiler.coerce(value, ty)?.value.into())
        })
        .collect()
}

/// Calls a known function or method. Methods take the receiver address
/// first.
fn gen_direct_call<'ctx>(
    compiler: &mut Compiler<'ctx, '_>,
    function: &ShadowFunction<'ctx>,
    receiver: Option<PointerValue<'ctx>>,
    args: &[ExprId],
) -> Result<TypedValue<'ctx>, CodegenError> {
    let mut call_args: Vec<BasicMetadataValueEnum<'ctx>> = vec![];
    if let Some(receiver) = receiver {
        call_args.push(receiver.into());
    }
    call_args.extend(gen_arguments(compiler, args, &function.params)?);

    let call = compiler.builder.build_call(function.value, &call_args, "")?;
    Ok(compiler.call_result(call, &function.return_type))
}

fn gen_method_call<'ctx>(
    compiler: &mut Compiler<'ctx, '_>,
    receiver: ExprId,
    method: &str,
    args: &[ExprId],
) -> Result<TypedValue<'ctx>, CodegenError> {
    if let Some(module) = compiler.module_path(receiver) {
        let path = compiler.graph.qualify(module, method);
        let function = compiler
            .functions
            .get(&path)
            .cloned()
            .ok_or_else(|| CodegenError::UnresolvedFunction(mangle(&path)))?;
        return gen_direct_call(compiler, &function, None, args);
    }

    match compiler.static_source_of(receiver)? {
        SourceType::Struct(struct_path) => {
            let function = compiler
                .shadow_struct(&struct_path)?
                .methods
                .get(method)
                .cloned()
                .ok_or_else(|| CodegenError::UnresolvedMethod(mangle(&struct_path), method.to_string()))?;

            let this = address_of(compiler, receiver)?;
            gen_direct_call(compiler, &function, Some(this), args)
        }
        SourceType::Trait(trait_path) => {
            let params: Vec<Type> = compiler
                .shadow_trait(&trait_path)?
                .methods
                .get(method)
                .map(|declared| declared.params.iter().map(|(_, ty)| ty.clone()).collect())
                .ok_or_else(|| CodegenError::UnresolvedMethod(mangle(&trait_path), method.to_string()))?;

            let object = gen_expression(compiler, receiver)?;
            let args = gen_arguments(compiler, args, &params)?;
            compiler.call_dynamic(object, method, &args)
        }
    }
}

fn gen_struct_literal<'ctx>(
    compiler: &mut Compiler<'ctx, '_>,
    path: &[String],
    fields: &[FieldInit],
    heap: bool,
) -> Result<TypedValue<'ctx>, CodegenError> {
    let struct_path = compiler.resolve_struct_path(path)?;
    let shadow = compiler.shadow_struct(&struct_path)?;
    let struct_type = shadow.ty;

    let declared = fields
        .iter()
        .map(|init| {
            shadow
                .fields
                .get(&init.name)
                .map(|field| (field.index, field.ty.with_const(false), init.value))
                .ok_or_else(|| CodegenError::UnresolvedField(mangle(&struct_path), init.name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut aggregate = compiler.default_aggregate(&struct_path)?;
    for (index, ty, value) in declared {
        let value = gen_expression(compiler, value)?;
        let value = compiler.coerce(value, &ty)?;
        aggregate = compiler
            .builder
            .build_insert_value(aggregate, value.value, index, "")?
            .into_struct_value();
    }

    let record = compiler
        .graph
        .resolve_path(compiler.current_module, path)
        .and_then(|(module, name)| compiler.graph.find_struct(module, name))
        .map(|(_, record)| record.ty())
        .ok_or_else(|| CodegenError::UnresolvedStruct(path.join(".")))?;
    let source = Some(SourceType::Struct(struct_path));

    if heap {
        let ptr = compiler.builder.build_malloc(struct_type, "new")?;
        compiler.builder.build_store(ptr, aggregate)?;
        return Ok(TypedValue {
            source,
            ..TypedValue::new(ptr.into(), record.pointer_to())
        });
    }

    Ok(TypedValue {
        source,
        ..TypedValue::new(aggregate.into(), record)
    })
}

fn gen_cast<'ctx>(compiler: &mut Compiler<'ctx, '_>, expr: ExprId, ty: &TypeExpr) -> Result<TypedValue<'ctx>, CodegenError> {
    let target = compiler.resolve_type(ty)?;
    let value = gen_expression(compiler, expr)?;
    compiler.coerce(value, &target)
}
