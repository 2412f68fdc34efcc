use crate::Config;
use anyhow::{Context, Result};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use wasmlink_environ::{TypeIndex, TypeRegistry, WasmFuncType, WasmSubType};

/// An `Engine` which is a global context for instantiation.
///
/// An engine owns the [`Config`] and the registry of canonical function types
/// shared by every module created with it. Modules can only be instantiated
/// in stores of the engine they were created with.
///
/// Engines are cheap to clone: clones share the same underlying state.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

struct EngineInner {
    config: Config,
    types: RefCell<TypeRegistry>,
}

impl Engine {
    /// Creates a new [`Engine`] with the specified compilation and
    /// configuration settings.
    ///
    /// # Errors
    ///
    /// This method can fail if the `config` is invalid.
    pub fn new(config: &Config) -> Result<Engine> {
        config.validate().context("invalid engine configuration")?;
        Ok(Engine {
            inner: Rc::new(EngineInner {
                config: config.clone(),
                types: RefCell::new(TypeRegistry::new()),
            }),
        })
    }

    /// Returns the configuration settings that this engine is using.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns whether the engine `a` and `b` refer to the same configuration.
    pub fn same(a: &Engine, b: &Engine) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Registers a final function type, returning its canonical index.
    pub fn register_func_type(&self, ty: WasmFuncType) -> TypeIndex {
        self.inner.types.borrow_mut().register_func(ty)
    }

    /// Registers a function type with an explicit position in the subtyping
    /// hierarchy.
    pub fn register_type(&self, ty: WasmSubType) -> Result<TypeIndex> {
        self.inner.types.borrow_mut().register(ty)
    }

    /// Borrows the registry of canonical types.
    ///
    /// # Panics
    ///
    /// Panics if a type is being registered concurrently, which is only
    /// possible from within `register_*` itself.
    pub fn types(&self) -> Ref<'_, TypeRegistry> {
        self.inner.types.borrow()
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine {
            inner: Rc::new(EngineInner {
                config: Config::default(),
                types: RefCell::new(TypeRegistry::new()),
            }),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("types", &self.inner.types.borrow().len())
            .finish()
    }
}
