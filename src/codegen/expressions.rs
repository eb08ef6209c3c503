//! Expression lowering.
//!
//! Lowering follows the AST's natural recursion. Operand evaluation order
//! is only ever changed by a lazy operator builder, which receives
//! producers instead of values (see [`super::operators`]).

use std::rc::Rc;

use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum};

use crate::{
    parser::ast::{Expr, ExprKind, Literal},
    typechecker::{context::Context, ops, ops::OpKey, types::Type},
};

use super::{
    operators::{self, ValueProducer},
    CodeGen, CodegenContext, CodegenError,
};

/// Fetches the type the analyzer recorded for `expr`. A missing annotation
/// is a stage-skew bug, not a user error.
fn expr_type(scope: &Context, expr: &Expr) -> Result<Type, CodegenError> {
    scope.expression_type(expr.id).cloned().ok_or_else(|| {
        CodegenError::new(format!(
            "pom should have caught: expression {} has no recorded type",
            expr.id
        ))
    })
}

impl<'ctx> CodeGen<'ctx> for Expr {
    type Output = BasicValueEnum<'ctx>;

    fn codegen(
        &self,
        ctx: &CodegenContext<'ctx>,
        scope: &Context,
    ) -> Result<Self::Output, CodegenError> {
        match &self.kind {
            ExprKind::Literal(Literal::Real(value)) => {
                Ok(ctx.context.f64_type().const_float(*value).into())
            }
            ExprKind::Literal(Literal::Integer(value)) => Ok(ctx
                .context
                .i64_type()
                .const_int(*value as u64, true)
                .into()),
            ExprKind::Literal(Literal::Boolean(value)) => Ok(ctx
                .context
                .bool_type()
                .const_int(u64::from(*value), false)
                .into()),
            ExprKind::Var { name, subscript } => self.lower_var(ctx, scope, name, *subscript),
            ExprKind::List(elems) => self.lower_list(ctx, scope, elems),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_type = expr_type(scope, lhs)?;
                let rhs_type = expr_type(scope, rhs)?;
                let info = ops::lookup(&OpKey::Op(*op), &[lhs_type, rhs_type])
                    .map_err(|e| CodegenError::new(format!("pom should have caught: {e}")))?;

                let producers: Vec<ValueProducer<'_, 'ctx>> = vec![
                    Box::new(move || lhs.codegen(ctx, scope)),
                    Box::new(move || rhs.codegen(ctx, scope)),
                ];
                operators::build_op(ctx, info, producers)
            }
            ExprKind::Call { callee, args } => self.lower_call(ctx, scope, callee, args),
        }
    }
}

impl Expr {
    fn lower_var<'ctx>(
        &self,
        ctx: &CodegenContext<'ctx>,
        scope: &Context,
        name: &str,
        subscript: Option<i64>,
    ) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        let value = ctx
            .named_values
            .borrow()
            .get(name)
            .copied()
            .ok_or_else(|| {
                CodegenError::new(format!("pom should have caught: unknown variable '{name}'"))
            })?;

        let Some(index) = subscript else {
            return Ok(value);
        };

        // The recorded type of a subscript node is already the element type.
        let elem_type = ctx.llvm_type(&expr_type(scope, self)?);
        let index = ctx.context.i64_type().const_int(index as u64, false);
        let addr = unsafe {
            ctx.builder
                .build_in_bounds_gep(elem_type, value.into_pointer_value(), &[index], "elemptr")
        }?;
        Ok(ctx.builder.build_load(elem_type, addr, "elemtmp")?)
    }

    /// Lists live on the heap: one `malloc` of `size_of(elem) * len`, then
    /// one store per element.
    fn lower_list<'ctx>(
        &self,
        ctx: &CodegenContext<'ctx>,
        scope: &Context,
        elems: &[Rc<Expr>],
    ) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        let list_type = expr_type(scope, self)?;
        let elem_type = list_type.subscripted_type().ok_or_else(|| {
            CodegenError::new(format!(
                "pom should have caught: list literal typed as '{list_type}'"
            ))
        })?;
        let elem_llvm = ctx.llvm_type(elem_type);

        let elem_size = elem_llvm.size_of().ok_or_else(|| {
            CodegenError::new(format!("element type '{elem_type}' has no size"))
        })?;
        let length = ctx.context.i64_type().const_int(elems.len() as u64, false);
        let byte_size = ctx.builder.build_int_mul(elem_size, length, "listsize")?;

        let malloc = ctx.malloc();
        let raw = ctx
            .builder
            .build_call(malloc, &[byte_size.into()], "listmem")?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| CodegenError::new("malloc did not produce a value"))?;
        let base = raw.into_pointer_value();

        for (i, elem) in elems.iter().enumerate() {
            let value = elem.codegen(ctx, scope)?;
            let index = ctx.context.i64_type().const_int(i as u64, false);
            let addr = unsafe {
                ctx.builder
                    .build_in_bounds_gep(elem_llvm, base, &[index], "listptr")
            }?;
            ctx.builder.build_store(addr, value)?;
        }

        Ok(base.into())
    }

    fn lower_call<'ctx>(
        &self,
        ctx: &CodegenContext<'ctx>,
        scope: &Context,
        callee: &str,
        args: &[Rc<Expr>],
    ) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        let arg_types = args
            .iter()
            .map(|arg| expr_type(scope, arg))
            .collect::<Result<Vec<_>, _>>()?;

        // Built-in operators take precedence, with lazily produced
        // operands so a builder like `if` can place them in its own blocks.
        if let Ok(info) = ops::lookup(&OpKey::named(callee), &arg_types) {
            let producers: Vec<ValueProducer<'_, 'ctx>> = args
                .iter()
                .map(|arg| Box::new(move || arg.codegen(ctx, scope)) as ValueProducer<'_, 'ctx>)
                .collect();
            return operators::build_op(ctx, info, producers);
        }

        let function = ctx.module.get_function(callee).ok_or_else(|| {
            CodegenError::new(format!("pom should have caught: unknown function '{callee}'"))
        })?;

        if function.count_params() as usize != args.len() {
            return Err(CodegenError::new(format!(
                "pom should have caught: '{callee}' expects {} arguments but got {}",
                function.count_params(),
                args.len()
            )));
        }

        let mut values: Vec<BasicMetadataValueEnum<'ctx>> = Vec::with_capacity(args.len());
        for arg in args {
            values.push(arg.codegen(ctx, scope)?.into());
        }

        let call = ctx.builder.build_call(function, &values, "calltmp")?;
        call.try_as_basic_value()
            .left()
            .ok_or_else(|| CodegenError::new(format!("call to '{callee}' produced no value")))
    }
}
