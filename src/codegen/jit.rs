//! JIT session wrapper.
//!
//! Thin shell around inkwell's MCJIT [`ExecutionEngine`] exposing the
//! session shape the driver relies on: modules are added after lowering,
//! symbols are only resolved while a module is in the session, and removal
//! releases the native code again. The engine itself is anchored on an
//! empty module so its target data is available before lowering starts.

use inkwell::{
    context::Context,
    execution_engine::{ExecutionEngine, JitFunction, UnsafeFunctionPointer},
    module::Module,
    targets::TargetData,
    OptimizationLevel,
};

use super::CodegenError;

pub struct Jit<'ctx> {
    engine: ExecutionEngine<'ctx>,
    _anchor: Module<'ctx>,
}

impl<'ctx> Jit<'ctx> {
    pub fn new(context: &'ctx Context) -> Result<Self, CodegenError> {
        let anchor = context.create_module("conflake.jit");
        let engine = anchor
            .create_jit_execution_engine(OptimizationLevel::None)
            .map_err(|e| CodegenError::new(format!("failed to create JIT session: {e}")))?;

        Ok(Self {
            engine,
            _anchor: anchor,
        })
    }

    pub fn target_data(&self) -> &TargetData {
        self.engine.get_target_data()
    }

    pub fn add_module(&self, module: &Module<'ctx>) -> Result<(), CodegenError> {
        self.engine
            .add_module(module)
            .map_err(|()| CodegenError::new("module is already part of a JIT session"))
    }

    pub fn remove_module(&self, module: &Module<'ctx>) -> Result<(), CodegenError> {
        self.engine
            .remove_module(module)
            .map_err(|e| CodegenError::new(format!("failed to remove module: {e}")))
    }

    /// Resolves `name` to a callable function pointer.
    ///
    /// # Safety
    ///
    /// `F` must match the C ABI signature of the compiled function; calling
    /// through a mismatched type is undefined behavior.
    pub unsafe fn function<F>(&self, name: &str) -> Result<JitFunction<'ctx, F>, CodegenError>
    where
        F: UnsafeFunctionPointer,
    {
        self.engine
            .get_function(name)
            .map_err(|_| CodegenError::new(format!("Could not find symbol: {name}")))
    }
}
