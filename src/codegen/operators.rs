//! IR builders for the built-in operators.
//!
//! The registry side of the operator table lives in the typechecker; this
//! is the matching code generation side, keyed by the same composite key.
//! Every entry carries one of two builder shapes: an eager builder receives
//! already-evaluated operand values, a lazy builder receives producers and
//! controls in which basic block each operand is emitted. `if` is the one
//! lazy entry; it needs fresh blocks and a phi merge.

use std::collections::HashMap;

use inkwell::{
    builder::Builder,
    values::BasicValueEnum,
    FloatPredicate, IntPredicate,
};
use once_cell::sync::Lazy;

use crate::typechecker::{
    ops::{composite_key, OpInfo, OpKey},
    types::Type,
};

use super::{CodegenContext, CodegenError};

/// Emits IR for one operand on demand, in the builder's current block.
pub type ValueProducer<'p, 'ctx> =
    Box<dyn FnMut() -> Result<BasicValueEnum<'ctx>, CodegenError> + 'p>;

pub type EagerBuilder = for<'ctx, 'a> fn(
    &'a Builder<'ctx>,
    &'a [BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError>;

pub type LazyBuilder = for<'ctx, 'a, 'p> fn(
    &'a CodegenContext<'ctx>,
    Vec<ValueProducer<'p, 'ctx>>,
) -> Result<BasicValueEnum<'ctx>, CodegenError>;

pub struct OpBuilders {
    pub eager: Option<EagerBuilder>,
    pub lazy: Option<LazyBuilder>,
}

impl OpBuilders {
    fn eager(builder: EagerBuilder) -> Self {
        OpBuilders {
            eager: Some(builder),
            lazy: None,
        }
    }

    fn lazy(builder: LazyBuilder) -> Self {
        OpBuilders {
            eager: None,
            lazy: Some(builder),
        }
    }
}

static BUILDERS: Lazy<HashMap<String, OpBuilders>> = Lazy::new(|| {
    let real = Type::Real;
    let integer = Type::Integer;
    let boolean = Type::Boolean;

    let mut table: HashMap<String, OpBuilders> = HashMap::new();
    let mut op = |key: OpKey, operands: &[Type], builders: OpBuilders| {
        table.insert(composite_key(&key, operands), builders);
    };

    op(
        OpKey::Op('+'),
        &[real.clone(), real.clone()],
        OpBuilders::eager(add_real),
    );
    op(
        OpKey::Op('-'),
        &[real.clone(), real.clone()],
        OpBuilders::eager(sub_real),
    );
    op(
        OpKey::Op('*'),
        &[real.clone(), real.clone()],
        OpBuilders::eager(mul_real),
    );
    op(
        OpKey::Op('<'),
        &[real.clone(), real.clone()],
        OpBuilders::eager(lt_real),
    );
    op(
        OpKey::Op('>'),
        &[real.clone(), real.clone()],
        OpBuilders::eager(gt_real),
    );

    op(
        OpKey::Op('+'),
        &[integer.clone(), integer.clone()],
        OpBuilders::eager(add_integer),
    );
    op(
        OpKey::Op('-'),
        &[integer.clone(), integer.clone()],
        OpBuilders::eager(sub_integer),
    );
    op(
        OpKey::Op('*'),
        &[integer.clone(), integer.clone()],
        OpBuilders::eager(mul_integer),
    );
    op(
        OpKey::Op('<'),
        &[integer.clone(), integer.clone()],
        OpBuilders::eager(lt_integer),
    );
    op(
        OpKey::Op('>'),
        &[integer.clone(), integer.clone()],
        OpBuilders::eager(gt_integer),
    );

    op(
        OpKey::named("or"),
        &[boolean.clone(), boolean.clone()],
        OpBuilders::eager(or_boolean),
    );
    op(
        OpKey::named("and"),
        &[boolean.clone(), boolean.clone()],
        OpBuilders::eager(and_boolean),
    );

    op(
        OpKey::named("if"),
        &[boolean.clone(), real.clone(), real],
        OpBuilders::lazy(if_merge),
    );
    op(
        OpKey::named("if"),
        &[boolean, integer.clone(), integer],
        OpBuilders::lazy(if_merge),
    );

    table
});

/// Dispatches a registered operation to its IR builder. Lazy builders win
/// when both shapes exist; eager builders see their operands evaluated in
/// order beforehand.
pub fn build_op<'ctx>(
    ctx: &CodegenContext<'ctx>,
    info: &OpInfo,
    mut operands: Vec<ValueProducer<'_, 'ctx>>,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let key = composite_key(&info.key, &info.args);
    let Some(entry) = BUILDERS.get(&key) else {
        return Err(CodegenError::new(format!("invalid binary operator {key}")));
    };

    if let Some(lazy) = entry.lazy {
        return lazy(ctx, operands);
    }

    let Some(eager) = entry.eager else {
        return Err(CodegenError::new(format!("operator {key} has no builder")));
    };
    let mut values = Vec::with_capacity(operands.len());
    for producer in operands.iter_mut() {
        values.push(producer()?);
    }
    eager(&ctx.builder, &values)
}

fn add_real<'ctx>(
    builder: &Builder<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let result = builder.build_float_add(
        values[0].into_float_value(),
        values[1].into_float_value(),
        "addtmp",
    )?;
    Ok(result.into())
}

fn sub_real<'ctx>(
    builder: &Builder<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let result = builder.build_float_sub(
        values[0].into_float_value(),
        values[1].into_float_value(),
        "subtmp",
    )?;
    Ok(result.into())
}

fn mul_real<'ctx>(
    builder: &Builder<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let result = builder.build_float_mul(
        values[0].into_float_value(),
        values[1].into_float_value(),
        "multmp",
    )?;
    Ok(result.into())
}

fn lt_real<'ctx>(
    builder: &Builder<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let result = builder.build_float_compare(
        FloatPredicate::ULT,
        values[0].into_float_value(),
        values[1].into_float_value(),
        "lttmp",
    )?;
    Ok(result.into())
}

fn gt_real<'ctx>(
    builder: &Builder<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let result = builder.build_float_compare(
        FloatPredicate::UGT,
        values[0].into_float_value(),
        values[1].into_float_value(),
        "gttmp",
    )?;
    Ok(result.into())
}

fn add_integer<'ctx>(
    builder: &Builder<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let result = builder.build_int_add(
        values[0].into_int_value(),
        values[1].into_int_value(),
        "addtmp",
    )?;
    Ok(result.into())
}

fn sub_integer<'ctx>(
    builder: &Builder<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let result = builder.build_int_sub(
        values[0].into_int_value(),
        values[1].into_int_value(),
        "subtmp",
    )?;
    Ok(result.into())
}

fn mul_integer<'ctx>(
    builder: &Builder<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let result = builder.build_int_mul(
        values[0].into_int_value(),
        values[1].into_int_value(),
        "multmp",
    )?;
    Ok(result.into())
}

fn lt_integer<'ctx>(
    builder: &Builder<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let result = builder.build_int_compare(
        IntPredicate::ULT,
        values[0].into_int_value(),
        values[1].into_int_value(),
        "lttmp",
    )?;
    Ok(result.into())
}

fn gt_integer<'ctx>(
    builder: &Builder<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let result = builder.build_int_compare(
        IntPredicate::UGT,
        values[0].into_int_value(),
        values[1].into_int_value(),
        "gttmp",
    )?;
    Ok(result.into())
}

fn or_boolean<'ctx>(
    builder: &Builder<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let result = builder.build_or(
        values[0].into_int_value(),
        values[1].into_int_value(),
        "ortmp",
    )?;
    Ok(result.into())
}

fn and_boolean<'ctx>(
    builder: &Builder<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let result = builder.build_and(
        values[0].into_int_value(),
        values[1].into_int_value(),
        "andtmp",
    )?;
    Ok(result.into())
}

/// `if(cond, a, b)`: the condition is evaluated in the current block, each
/// arm only inside its own block, and the arms meet in a phi. The incoming
/// blocks are the builder's position after each arm, since an arm may have
/// opened further blocks of its own.
fn if_merge<'ctx>(
    ctx: &CodegenContext<'ctx>,
    mut operands: Vec<ValueProducer<'_, 'ctx>>,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    if operands.len() != 3 {
        return Err(CodegenError::new(format!(
            "'if' takes 3 operands, got {}",
            operands.len()
        )));
    }
    let (Some(mut else_arm), Some(mut then_arm), Some(mut cond)) =
        (operands.pop(), operands.pop(), operands.pop())
    else {
        unreachable!("length checked above");
    };

    let cond = cond()?.into_int_value();

    let function = ctx
        .builder
        .get_insert_block()
        .and_then(|block| block.get_parent())
        .ok_or_else(|| CodegenError::new("'if' emitted outside of a function"))?;

    let then_block = ctx.context.append_basic_block(function, "then");
    let else_block = ctx.context.append_basic_block(function, "else");
    let merge_block = ctx.context.append_basic_block(function, "ifcont");

    ctx.builder
        .build_conditional_branch(cond, then_block, else_block)?;

    ctx.builder.position_at_end(then_block);
    let then_value = then_arm()?;
    let then_end = ctx.builder.get_insert_block().unwrap();
    ctx.builder.build_unconditional_branch(merge_block)?;

    ctx.builder.position_at_end(else_block);
    let else_value = else_arm()?;
    let else_end = ctx.builder.get_insert_block().unwrap();
    ctx.builder.build_unconditional_branch(merge_block)?;

    ctx.builder.position_at_end(merge_block);
    let phi = ctx.builder.build_phi(then_value.get_type(), "iftmp")?;
    phi.add_incoming(&[(&then_value, then_end), (&else_value, else_end)]);

    Ok(phi.as_basic_value())
}
