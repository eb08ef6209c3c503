//! Semantic analysis.
//!
//! Walks the parsed top level in source order, resolves every name and
//! annotation, computes the type of every expression node and records it in
//! the per-function [`Context`]. Later units see the bindings of earlier
//! ones; a function sees itself only when its return type was declared.

pub mod context;
pub mod error;
pub mod ops;
pub mod typed_ast;
pub mod types;

use crate::parser::ast::{Expr, ExprKind, Function, Literal, Signature, TopLevel, TopLevelUnit};

use self::{
    context::Context,
    error::{
        ArgumentMismatch, ListElementMismatch, MissingReturnType, NotCallable, NotSubscriptable,
        ReturnTypeMismatch, TypeCheckError, UndefinedFunction, UndefinedVariable,
    },
    ops::OpKey,
    typed_ast::{TypedFunction, TypedSignature, TypedTopLevel, TypedUnit},
    types::Type,
};

pub type TypeResult<T> = Result<T, TypeCheckError>;

pub fn analyze(top_level: &TopLevel) -> TypeResult<TypedTopLevel> {
    let mut outer = Context::default();
    let mut analyzed = vec![];

    for unit in top_level {
        match unit {
            TopLevelUnit::Extern(sig) => {
                let typed = analyze_extern(sig)?;
                outer.bind(&typed.name, typed.function_type());
                analyzed.push(TypedUnit::Extern(typed));
            }
            TopLevelUnit::Function(fun) => {
                let typed = analyze_function(fun, &outer)?;
                outer.bind(&typed.sig.name, typed.sig.function_type());
                analyzed.push(TypedUnit::Function(typed));
            }
        }
    }

    Ok(analyzed)
}

/// Externs have no body to infer from, so the return type is mandatory.
fn analyze_extern(sig: &Signature) -> TypeResult<TypedSignature> {
    let args = resolve_args(sig)?;
    let Some(ret_desc) = &sig.ret_type else {
        return Err(TypeCheckError::MissingReturnType(MissingReturnType {
            function_name: sig.name.clone(),
        }));
    };

    Ok(TypedSignature {
        name: sig.name.clone(),
        args,
        ret_type: Type::try_from(ret_desc)?,
    })
}

fn analyze_function(fun: &Function, outer: &Context) -> TypeResult<TypedFunction> {
    let args = resolve_args(&fun.sig)?;

    let mut context = outer.clone();
    for (ty, name) in &args {
        context.bind(name, ty.clone());
    }

    // A declared return type is what makes recursion resolvable: only then
    // can the function be bound in its own body scope.
    let declared = match &fun.sig.ret_type {
        Some(ret_desc) => {
            let declared = Type::try_from(ret_desc)?;
            context.bind(
                &fun.sig.name,
                Type::Function {
                    ret: Box::new(declared.clone()),
                    args: args.iter().map(|(ty, _)| ty.clone()).collect(),
                },
            );
            Some(declared)
        }
        None => None,
    };

    let inferred = expression_type(&fun.body, &mut context)?;

    if let Some(declared) = declared {
        if declared != inferred {
            return Err(TypeCheckError::ReturnTypeMismatch(ReturnTypeMismatch {
                function_name: fun.sig.name.clone(),
                declared,
                inferred,
            }));
        }
    }

    Ok(TypedFunction {
        sig: TypedSignature {
            name: fun.sig.name.clone(),
            args,
            ret_type: inferred,
        },
        body: fun.body.clone(),
        context,
    })
}

fn resolve_args(sig: &Signature) -> TypeResult<Vec<(Type, String)>> {
    sig.args
        .iter()
        .map(|arg| Ok((Type::try_from(&arg.type_desc)?, arg.name.clone())))
        .collect()
}

/// Computes the type of `expr`, recording every visited node's ID in the
/// context on the way out.
fn expression_type(expr: &Expr, context: &mut Context) -> TypeResult<Type> {
    let ty = match &expr.kind {
        ExprKind::Literal(Literal::Real(_)) => Type::Real,
        ExprKind::Literal(Literal::Integer(_)) => Type::Integer,
        ExprKind::Literal(Literal::Boolean(_)) => Type::Boolean,
        ExprKind::Var { name, subscript } => {
            let ty = context
                .lookup(name)
                .ok_or_else(|| {
                    TypeCheckError::UndefinedVariable(UndefinedVariable {
                        variable_name: name.clone(),
                    })
                })?
                .clone();
            match subscript {
                None => ty,
                Some(_) => ty
                    .subscripted_type()
                    .ok_or_else(|| {
                        TypeCheckError::NotSubscriptable(NotSubscriptable {
                            name: name.clone(),
                            actual: ty.clone(),
                        })
                    })?
                    .clone(),
            }
        }
        ExprKind::List(elems) => {
            let mut elem_type = None;
            for elem in elems {
                let ty = expression_type(elem, context)?;
                match &elem_type {
                    None => elem_type = Some(ty),
                    Some(expected) if *expected != ty => {
                        return Err(TypeCheckError::ListElementMismatch(ListElementMismatch {
                            expected: expected.clone(),
                            actual: ty,
                        }));
                    }
                    Some(_) => {}
                }
            }
            let elem_type = elem_type.ok_or(TypeCheckError::EmptyList)?;
            Type::List(Box::new(elem_type))
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let lhs_type = expression_type(lhs, context)?;
            let rhs_type = expression_type(rhs, context)?;
            ops::lookup(&OpKey::Op(*op), &[lhs_type, rhs_type])?
                .ret_type
                .clone()
        }
        ExprKind::Call { callee, args } => {
            let arg_types = args
                .iter()
                .map(|arg| expression_type(arg, context))
                .collect::<TypeResult<Vec<_>>>()?;

            // Built-in operators shadow user functions of the same name.
            match ops::lookup(&OpKey::named(callee), &arg_types) {
                Ok(info) => info.ret_type.clone(),
                Err(_) => {
                    let ty = context
                        .lookup(callee)
                        .ok_or_else(|| {
                            TypeCheckError::UndefinedFunction(UndefinedFunction {
                                function_name: callee.clone(),
                            })
                        })?
                        .clone();

                    let Type::Function { ret, args: expected } = &ty else {
                        return Err(TypeCheckError::NotCallable(NotCallable {
                            name: callee.clone(),
                            actual: ty.clone(),
                        }));
                    };

                    if expected.as_slice() != arg_types.as_slice() {
                        return Err(TypeCheckError::ArgumentMismatch(ArgumentMismatch {
                            name: callee.clone(),
                            expected: expected.clone(),
                            given: arg_types,
                        }));
                    }
                    ret.as_ref().clone()
                }
            }
        }
    };

    context.annotate(expr.id, ty.clone());
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use crate::{lexer::Lexer, parser};

    use super::{
        error::TypeCheckError,
        typed_ast::{TypedTopLevel, TypedUnit},
        types::Type,
        *,
    };

    fn analyze_source(source: &str) -> TypeResult<TypedTopLevel> {
        let tokens = Lexer::new(source).lex().expect("lexing should succeed");
        let top_level = parser::parse(&tokens).expect("parsing should succeed");
        analyze(&top_level)
    }

    #[test]
    fn test_anonymous_expression_infers_real() -> Result<()> {
        let analyzed = analyze_source("4.0 + 5.0;")?;

        let [TypedUnit::Function(fun)] = analyzed.as_slice() else {
            panic!("expected a single function");
        };
        assert_eq!(Type::Real, fun.sig.ret_type);
        assert_eq!(Some(&Type::Real), fun.context.expression_type(fun.body.id));

        Ok(())
    }

    #[test]
    fn test_every_expression_is_annotated() -> Result<()> {
        let analyzed = analyze_source("def sq(integer x):integer x*x; sq(3i)+sq(2i);")?;

        // x, x, x*x in sq; 3i, sq(3i), 2i, sq(2i), + in the wrapper
        let mut annotated = 0;
        for unit in &analyzed {
            if let TypedUnit::Function(fun) = unit {
                annotated += fun.context.expression_count();
            }
        }
        assert_eq!(8, annotated);

        Ok(())
    }

    #[test]
    fn test_signature_return_type_matches_body_annotation() -> Result<()> {
        let analyzed = analyze_source("def ok(boolean b): boolean b; 1i + 2i;")?;

        for unit in &analyzed {
            let TypedUnit::Function(fun) = unit else {
                continue;
            };
            assert_eq!(
                Some(&fun.sig.ret_type),
                fun.context.expression_type(fun.body.id)
            );
        }

        Ok(())
    }

    #[test]
    fn test_later_units_see_earlier_bindings() -> Result<()> {
        let analyzed = analyze_source("def one(): integer 1i; def two(): integer one() + one();")?;

        let [_, TypedUnit::Function(two)] = analyzed.as_slice() else {
            panic!("expected two functions");
        };
        assert_eq!(Type::Integer, two.sig.ret_type);

        Ok(())
    }

    #[test]
    fn test_extern_requires_return_type() {
        let result = analyze_source("extern cos(real x);");

        assert!(matches!(
            result,
            Err(TypeCheckError::MissingReturnType(_))
        ));
    }

    #[test]
    fn test_mixed_operand_types_are_rejected() {
        let result = analyze_source("3i + 1.0;");

        assert!(
            matches!(result, Err(TypeCheckError::UndefinedOperator(_))),
            "expected an operator lookup failure, got {result:?}"
        );
    }

    #[test]
    fn test_subscript_on_non_list_is_rejected() {
        let result = analyze_source("def f(real a): real a[0]; ");

        let Err(TypeCheckError::NotSubscriptable(e)) = result else {
            panic!("expected a subscript error, got {result:?}");
        };
        assert_eq!("'a' of type 'real' is not subscriptable", e.to_string());
    }

    #[test]
    fn test_recursion_needs_a_declared_return_type() {
        // Without an annotation the function is not in its own scope.
        let result = analyze_source("def f() f();");
        assert!(matches!(result, Err(TypeCheckError::UndefinedFunction(_))));

        // With one it is.
        let analyzed = analyze_source("def f():real f();").unwrap();
        let [TypedUnit::Function(fun)] = analyzed.as_slice() else {
            panic!("expected a single function");
        };
        assert_eq!(Type::Real, fun.sig.ret_type);
    }

    #[test]
    fn test_declared_and_inferred_types_must_agree() {
        let result = analyze_source("def f(): integer 1.0;");

        let Err(TypeCheckError::ReturnTypeMismatch(e)) = result else {
            panic!("expected a return type mismatch, got {result:?}");
        };
        assert_eq!(Type::Integer, e.declared);
        assert_eq!(Type::Real, e.inferred);
    }

    #[test]
    fn test_list_elements_must_share_a_type() {
        assert!(matches!(
            analyze_source("[1i 2i 3.0];"),
            Err(TypeCheckError::ListElementMismatch(_))
        ));
        assert_eq!(Err(TypeCheckError::EmptyList), analyze_source("[];"));

        let analyzed = analyze_source("[1i 2i 3i];").unwrap();
        let [TypedUnit::Function(fun)] = analyzed.as_slice() else {
            panic!("expected a single function");
        };
        assert_eq!(Type::List(Box::new(Type::Integer)), fun.sig.ret_type);
    }

    #[test]
    fn test_calling_a_variable_is_rejected() {
        let result = analyze_source("def f(real a): real a(1.0);");

        assert!(matches!(result, Err(TypeCheckError::NotCallable(_))));
    }

    #[test]
    fn test_argument_types_are_checked() {
        let result = analyze_source("def sq(integer x):integer x*x; sq(1.0);");

        let Err(TypeCheckError::ArgumentMismatch(e)) = result else {
            panic!("expected an argument mismatch, got {result:?}");
        };
        assert_eq!(vec![Type::Integer], e.expected);
        assert_eq!(vec![Type::Real], e.given);
    }

    #[test]
    fn test_if_and_boolean_operators_type_check() -> Result<()> {
        let analyzed = analyze_source("if(True, 1i, 2i);")?;
        let [TypedUnit::Function(fun)] = analyzed.as_slice() else {
            panic!("expected a single function");
        };
        assert_eq!(Type::Integer, fun.sig.ret_type);

        let analyzed = analyze_source("True and (False or True);")?;
        let [TypedUnit::Function(fun)] = analyzed.as_slice() else {
            panic!("expected a single function");
        };
        assert_eq!(Type::Boolean, fun.sig.ret_type);

        Ok(())
    }

    #[test]
    fn test_unknown_annotation_is_rejected() {
        assert!(matches!(
            analyze_source("def f(quux a): real 1.0;"),
            Err(TypeCheckError::UndefinedType(_))
        ));
    }
}
