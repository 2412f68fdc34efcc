use crate::func::FuncBody;
use crate::{Engine, MemoryMode};
use anyhow::{Context, Result, bail};
use std::fmt;
use std::rc::Rc;
use wasmlink_environ::{DefinedFuncIndex, EntityRef, EntityType, ModuleBuilder, ModuleInformation};

mod code;
pub use code::FunctionBodies;

/// The provider of the executable bodies of a module's functions.
///
/// Code is produced per [`MemoryMode`]: a body compiled for one addressing
/// mode cannot run against a memory of the other. Providers may compile
/// lazily, which is why every method takes `&self`.
pub trait CompiledCode {
    /// Whether bodies for `mode` are available without compiling.
    fn is_runnable(&self, mode: MemoryMode) -> bool;

    /// Compiles the module's functions for `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error when compilation fails; the provider stays
    /// non-runnable for `mode`.
    fn compile(&self, mode: MemoryMode) -> Result<()>;

    /// Returns the body of a module-defined function for `mode`, or `None`
    /// when the code is not runnable in that mode or `index` has no body.
    fn entrypoint(&self, mode: MemoryMode, index: DefinedFuncIndex) -> Option<FuncBody>;
}

/// A compiled WebAssembly module, ready to be instantiated.
///
/// A `Module` pairs the static description of a validated module with the
/// code for its functions. A `Module` is then used to create an
/// [`Instance`](crate::Instance) through an instantiation process. You cannot
/// call functions or fetch globals on a `Module` because it's purely a code
/// representation.
///
/// ## Modules and `Clone`
///
/// Using `clone` on a `Module` is a cheap operation. It will not create an
/// entirely new module, but rather just a new reference to the existing module.
/// In other words it's a shallow copy, not a deep copy.
#[derive(Clone)]
pub struct Module {
    inner: Rc<ModuleInner>,
}

struct ModuleInner {
    engine: Engine,
    info: ModuleInformation,
    code: Box<dyn CompiledCode>,
}

impl Module {
    /// Creates a new module from its static description and its code.
    ///
    /// The code is compiled for the engine's configured memory mode if it is
    /// not runnable in that mode already.
    ///
    /// # Errors
    ///
    /// Fails if a function type of `info` is not registered with `engine`, if
    /// compilation fails, or if a module-defined function has no body.
    pub fn new(
        engine: &Engine,
        info: ModuleInformation,
        code: impl CompiledCode + 'static,
    ) -> Result<Module> {
        for (index, ty) in info.functions.iter() {
            if !engine.types().contains(*ty) {
                bail!(
                    "function {} has a type not registered with this engine",
                    index.as_u32()
                );
            }
        }

        let mode = engine.config().memory_mode;
        if !code.is_runnable(mode) {
            code.compile(mode)
                .with_context(|| format!("failed to compile module for {mode} memory"))?;
        }
        for i in 0..info.num_defined_funcs() {
            let index = DefinedFuncIndex::new(i);
            if code.entrypoint(mode, index).is_none() {
                bail!(
                    "no code for function {}",
                    info.func_index(index).as_u32()
                );
            }
        }

        log::debug!(
            "created module {:?} with {} functions",
            info.name,
            info.functions.len()
        );
        Ok(Module {
            inner: Rc::new(ModuleInner {
                engine: engine.clone(),
                info,
                code: Box::new(code),
            }),
        })
    }

    /// Validates the module being built by `builder` against `engine`'s type
    /// registry and creates a module from it.
    pub fn from_builder(
        engine: &Engine,
        builder: ModuleBuilder,
        code: impl CompiledCode + 'static,
    ) -> Result<Module> {
        let info = builder.finish(&engine.types())?;
        Module::new(engine, info, code)
    }

    /// Returns the [`Engine`] that this [`Module`] was compiled by.
    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    /// Returns the static description of this module.
    pub fn info(&self) -> &ModuleInformation {
        &self.inner.info
    }

    /// Returns identifier/name that this [`Module`] has. This name
    /// is used in traps/backtrace details.
    pub fn name(&self) -> Option<&str> {
        self.inner.info.name.as_deref()
    }

    /// Returns the list of imports that this [`Module`] has and must be
    /// satisfied, in declaration order.
    pub fn imports(&self) -> impl ExactSizeIterator<Item = (&str, &str, EntityType)> + '_ {
        self.inner.info.imports()
    }

    /// Returns the list of exports that this [`Module`] has and will be
    /// available after instantiation.
    pub fn exports(&self) -> impl ExactSizeIterator<Item = (&str, EntityType)> + '_ {
        self.inner.info.exports()
    }

    /// Whether this module's code can run against a memory of `mode`.
    pub fn is_runnable(&self, mode: MemoryMode) -> bool {
        self.inner.code.is_runnable(mode)
    }

    /// Makes the code runnable in `mode`, compiling on demand.
    pub(crate) fn ensure_runnable(&self, mode: MemoryMode) -> Result<()> {
        if self.inner.code.is_runnable(mode) {
            return Ok(());
        }
        log::debug!("compiling module {:?} on demand for {mode} memory", self.name());
        self.inner.code.compile(mode)?;
        if !self.inner.code.is_runnable(mode) {
            bail!("module is not runnable with {mode} memory after compilation");
        }
        Ok(())
    }

    /// Returns the body of `index` for `mode`.
    ///
    /// # Panics
    ///
    /// Panics if the code is not runnable in `mode`; instantiation makes it
    /// runnable before any function of the instance is created.
    pub(crate) fn entrypoint(&self, mode: MemoryMode, index: DefinedFuncIndex) -> FuncBody {
        match self.inner.code.entrypoint(mode, index) {
            Some(body) => body,
            None => panic!(
                "no {mode} code for function {}",
                self.inner.info.func_index(index).as_u32()
            ),
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name())
            .field("imports", &self.inner.info.imports.len())
            .field("exports", &self.inner.info.exports.len())
            .finish_non_exhaustive()
    }
}
