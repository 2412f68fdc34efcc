use super::CompiledCode;
use crate::func::FuncBody;
use crate::{Caller, MemoryMode, Trap, Val};
use anyhow::{Result, bail};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use wasmlink_environ::{DefinedFuncIndex, PrimaryMap};

/// Function bodies written as Rust closures.
///
/// This is the code provider used when the embedder implements module
/// functions natively, and the one the test suite uses. Bodies are the same
/// for every memory mode; what differs is which modes count as compiled.
/// Modes listed with [`FunctionBodies::precompiled`] are runnable right away,
/// any other mode is compiled when first needed unless compilation was
/// disabled with [`FunctionBodies::fail_compilation`].
#[derive(Default)]
pub struct FunctionBodies {
    bodies: PrimaryMap<DefinedFuncIndex, FuncBody>,
    compiled: RefCell<HashSet<MemoryMode>>,
    compilation_error: Option<String>,
}

impl FunctionBodies {
    /// Creates a provider with no bodies, compiled for no mode.
    pub fn new() -> FunctionBodies {
        FunctionBodies::default()
    }

    /// Appends the body of the next module-defined function.
    pub fn push(
        &mut self,
        body: impl Fn(&mut Caller<'_>, &[Val]) -> Result<Vec<Val>, Trap> + 'static,
    ) -> DefinedFuncIndex {
        self.bodies.push(Rc::new(body))
    }

    /// Marks the bodies as already compiled for `mode`.
    pub fn precompiled(&mut self, mode: MemoryMode) -> &mut Self {
        self.compiled.get_mut().insert(mode);
        self
    }

    /// Makes every future compilation fail with `reason`.
    pub fn fail_compilation(&mut self, reason: impl Into<String>) -> &mut Self {
        self.compilation_error = Some(reason.into());
        self
    }
}

impl CompiledCode for FunctionBodies {
    fn is_runnable(&self, mode: MemoryMode) -> bool {
        self.compiled.borrow().contains(&mode)
    }

    fn compile(&self, mode: MemoryMode) -> Result<()> {
        if let Some(reason) = &self.compilation_error {
            bail!("compilation for {mode} memory failed: {reason}");
        }
        log::trace!("compiled {} function bodies for {mode} memory", self.bodies.len());
        self.compiled.borrow_mut().insert(mode);
        Ok(())
    }

    fn entrypoint(&self, mode: MemoryMode, index: DefinedFuncIndex) -> Option<FuncBody> {
        if !self.is_runnable(mode) {
            return None;
        }
        self.bodies.get(index).cloned()
    }
}
