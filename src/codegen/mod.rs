//! Code generation and JIT evaluation.
//!
//! Consumes the analyzed top level, lowers every unit into a single LLVM
//! module, runs the fixed function-level optimization pipeline and, when
//! the program ends in a zero-argument function, compiles the module and
//! calls it through the C ABI pointer for its return type.

pub mod expressions;
pub mod jit;
pub mod operators;

use std::{cell::RefCell, collections::HashMap, error::Error, fmt::Display};

use inkwell::{
    builder::{Builder, BuilderError},
    context::Context,
    module::Module,
    passes::PassBuilderOptions,
    targets::{CodeModel, InitializationConfig, RelocMode, Target, TargetMachine},
    types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum},
    values::{BasicValueEnum, FunctionValue},
    AddressSpace, OptimizationLevel,
};
use log::info;
use once_cell::sync::Lazy;

use crate::typechecker::{
    context::Context as TypeContext,
    typed_ast::{TypedFunction, TypedSignature, TypedTopLevel, TypedUnit},
    types::Type,
};

use self::jit::Jit;

/// The function passes run over every compiled module, in order.
const FUNCTION_PASSES: &str = "instcombine,reassociate,gvn,simplifycfg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenError(String);

impl CodegenError {
    pub fn new(message: impl ToString) -> Self {
        CodegenError(message.to_string())
    }
}

impl Display for CodegenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for CodegenError {}

impl From<BuilderError> for CodegenError {
    fn from(value: BuilderError) -> Self {
        CodegenError(format!("IR builder error: {value}"))
    }
}

/// The evaluated result of a program, tagged by its scalar type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvalResult {
    None,
    Double(f64),
    Int64(i64),
    Bool(bool),
}

impl Display for EvalResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalResult::None => f.write_str("void"),
            EvalResult::Double(value) => write!(f, "{value:?}"),
            EvalResult::Int64(value) => write!(f, "{value}i"),
            EvalResult::Bool(true) => f.write_str("True"),
            EvalResult::Bool(false) => f.write_str("False"),
        }
    }
}

/// LLVM's native-target setup is a process-wide one-shot.
static NATIVE_TARGET: Lazy<Result<(), String>> =
    Lazy::new(|| Target::initialize_native(&InitializationConfig::default()));

fn initialize_native_target() -> Result<(), CodegenError> {
    (*NATIVE_TARGET)
        .clone()
        .map_err(|e| CodegenError::new(format!("failed to initialize native target: {e}")))
}

/// Implemented by everything that can lower itself into the module.
pub trait CodeGen<'ctx> {
    type Output;

    fn codegen(
        &self,
        ctx: &CodegenContext<'ctx>,
        scope: &TypeContext,
    ) -> Result<Self::Output, CodegenError>;
}

/// Per-compilation state: one module, one builder, one JIT session and the
/// name map of the function currently being lowered.
pub struct CodegenContext<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,
    pub machine: TargetMachine,
    pub jit: Jit<'ctx>,
    pub named_values: RefCell<HashMap<String, BasicValueEnum<'ctx>>>,
}

impl<'ctx> CodegenContext<'ctx> {
    pub fn new(context: &'ctx Context) -> Result<Self, CodegenError> {
        initialize_native_target()?;

        let jit = Jit::new(context)?;

        let module = context.create_module("conflake");
        module.set_triple(&TargetMachine::get_default_triple());
        module.set_data_layout(&jit.target_data().get_data_layout());

        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple)
            .map_err(|e| CodegenError::new(format!("no target for triple: {e}")))?;
        let machine = target
            .create_target_machine(
                &triple,
                "generic",
                "",
                OptimizationLevel::None,
                RelocMode::Default,
                CodeModel::Default,
            )
            .ok_or_else(|| CodegenError::new("could not create a target machine"))?;

        Ok(Self {
            context,
            module,
            builder: context.create_builder(),
            machine,
            jit,
            named_values: RefCell::new(HashMap::new()),
        })
    }

    /// Scalars lower to their primitive types; lists and function values
    /// lower to pointers (opaque under LLVM 18).
    pub fn llvm_type(&self, ty: &Type) -> BasicTypeEnum<'ctx> {
        match ty {
            Type::Real => self.context.f64_type().into(),
            Type::Integer => self.context.i64_type().into(),
            Type::Boolean => self.context.bool_type().into(),
            Type::List(_) | Type::Function { .. } => {
                self.context.ptr_type(AddressSpace::default()).into()
            }
        }
    }

    /// `ptr malloc(i64)`, declared on first use and resolved by the JIT
    /// against the host process.
    pub fn malloc(&self) -> FunctionValue<'ctx> {
        self.module.get_function("malloc").unwrap_or_else(|| {
            let ptr_type = self.context.ptr_type(AddressSpace::default());
            let fn_type = ptr_type.fn_type(&[self.context.i64_type().into()], false);
            self.module.add_function("malloc", fn_type, None)
        })
    }

    fn declare_function(&self, sig: &TypedSignature) -> FunctionValue<'ctx> {
        let args: Vec<BasicMetadataTypeEnum<'ctx>> = sig
            .args
            .iter()
            .map(|(ty, _)| self.llvm_type(ty).into())
            .collect();
        let fn_type = self.llvm_type(&sig.ret_type).fn_type(&args, false);
        self.module.add_function(&sig.name, fn_type, None)
    }

    fn lower_function(&self, fun: &TypedFunction) -> Result<FunctionValue<'ctx>, CodegenError> {
        // Reuse a matching extern declaration; a name that already has a
        // body (repeated anonymous expressions) gets a fresh, uniquified
        // function instead.
        let function = match self.module.get_function(&fun.sig.name) {
            Some(function) if function.count_basic_blocks() == 0 => function,
            _ => self.declare_function(&fun.sig),
        };

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        {
            let mut named_values = self.named_values.borrow_mut();
            named_values.clear();
            for (i, (_, name)) in fun.sig.args.iter().enumerate() {
                let param = function.get_nth_param(i as u32).ok_or_else(|| {
                    CodegenError::new(format!(
                        "pom should have caught: '{}' has no parameter {i}",
                        fun.sig.name
                    ))
                })?;
                named_values.insert(name.clone(), param);
            }
        }

        let ret = fun.body.codegen(self, &fun.context)?;
        self.builder.build_return(Some(&ret))?;

        if !function.verify(true) {
            return Err(CodegenError::new(format!(
                "generated function '{}' failed verification",
                fun.sig.name
            )));
        }

        Ok(function)
    }

    fn evaluate(&self, top_level: &TypedTopLevel, dump_ir: bool) -> Result<EvalResult, CodegenError> {
        // The unit to run afterwards: the last zero-argument function.
        let mut entry: Option<(String, Type)> = None;

        for unit in top_level {
            match unit {
                TypedUnit::Extern(sig) => {
                    self.declare_function(sig);
                }
                TypedUnit::Function(fun) => {
                    let function = self.lower_function(fun)?;
                    if function.count_params() == 0 {
                        let name = function.get_name().to_string_lossy().into_owned();
                        entry = Some((name, fun.sig.ret_type.clone()));
                    }
                }
            }
        }

        self.module
            .run_passes(FUNCTION_PASSES, &self.machine, PassBuilderOptions::create())
            .map_err(|e| CodegenError::new(format!("optimization pipeline failed: {e}")))?;

        if dump_ir {
            info!("generated module:\n{}", self.module.print_to_string());
        }

        let Some((name, ret_type)) = entry else {
            return Ok(EvalResult::None);
        };

        self.jit.add_module(&self.module)?;
        let result = self.call_entry(&name, &ret_type);
        self.jit.remove_module(&self.module)?;
        result
    }

    fn call_entry(&self, name: &str, ret_type: &Type) -> Result<EvalResult, CodegenError> {
        unsafe {
            match ret_type {
                Type::Real => {
                    let function = self.jit.function::<unsafe extern "C" fn() -> f64>(name)?;
                    Ok(EvalResult::Double(function.call()))
                }
                Type::Integer => {
                    let function = self.jit.function::<unsafe extern "C" fn() -> i64>(name)?;
                    Ok(EvalResult::Int64(function.call()))
                }
                Type::Boolean => {
                    let function = self.jit.function::<unsafe extern "C" fn() -> bool>(name)?;
                    Ok(EvalResult::Bool(function.call()))
                }
                other => Err(CodegenError::new(format!(
                    "Cannot evaluate something of type {}",
                    other.describe()
                ))),
            }
        }
    }
}

/// Compiles the analyzed top level into a fresh module and evaluates its
/// trailing anonymous function, if any.
pub fn run(top_level: &TypedTopLevel, dump_ir: bool) -> Result<EvalResult, CodegenError> {
    let context = Context::create();
    let ctx = CodegenContext::new(&context)?;
    ctx.evaluate(top_level, dump_ir)
}
