//! The instantiation pipeline.
//!
//! Instantiating a module runs four phases, each of which must complete
//! before the next one starts:
//!
//! 1. [`link`]: every declared import is resolved and checked against its
//!    declaration. Nothing is allocated in the store until all imports are
//!    accepted.
//! 2. [`initialize`]: module-defined memory, tags, tables and globals are
//!    created, the export surface is assembled and frozen and the start
//!    function, if any, is looked up.
//! 3. [`segments`]: active element segments, then active data segments, are
//!    bounds-checked as a whole and then written.
//! 4. [`start`]: the start function runs.
//!
//! A failure in any phase aborts instantiation and no [`Instance`] is
//! returned. Writes already made by a completed phase, for example element
//! segments written into an imported table before a data segment failed its
//! bounds check, are not undone.

use crate::resolve::ImportResolver;
use crate::store::AsContextMut;
use crate::{Engine, Instance, InstantiationError, Module, TypeError};

mod initialize;
mod link;
mod segments;
mod start;

impl Instance {
    /// Creates a new [`Instance`] from the previously compiled [`Module`] and
    /// the values `imports` supplies for its imports.
    ///
    /// Any [`ImportResolver`] may supply the imports; the common case is a
    /// [`HostObject`](crate::HostObject) of namespaces:
    ///
    /// ```
    /// # use wasmlink::*;
    /// # fn main() -> anyhow::Result<()> {
    /// let engine = Engine::default();
    /// let mut builder = ModuleBuilder::new();
    /// builder.import_global("env", "g", GlobalType::immutable(WasmValType::I32));
    /// let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;
    ///
    /// let mut store = Store::new(&engine);
    /// let imports = HostObject::new().with("env", HostObject::new().with("g", 42.0));
    /// let instance = Instance::new(&mut store, &module, &imports)?;
    /// assert_eq!(instance.global_value(&store, GlobalIndex::from_u32(0)).unwrap_i32(), 42);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// * [`InstantiationError::Type`] if `module` belongs to another engine,
    ///   an import namespace is not an object or a function import is not
    ///   callable.
    /// * [`InstantiationError::Link`] if a provided value doesn't match its
    ///   import declaration, or a table or memory couldn't be created.
    /// * [`InstantiationError::Runtime`] if a constant expression fails, a
    ///   segment doesn't fit, or the start function traps.
    pub fn new(
        mut store: impl AsContextMut,
        module: &Module,
        imports: &dyn ImportResolver,
    ) -> Result<Instance, InstantiationError> {
        let store = store.as_context_mut();
        if !Engine::same(store.engine(), module.engine()) {
            return Err(TypeError(
                "cross-`Engine` instantiation is not currently supported".to_string(),
            )
            .into());
        }

        log::debug!("instantiating module {:?}", module.name());
        let data = link::link(store, module, imports)?;
        let instance = Instance(store.store_data_mut().insert(data));

        initialize::initialize(store, instance)?;
        segments::apply_segments(store, instance)?;
        start::run_start(store, instance)?;
        log::debug!("instantiated module {:?}", module.name());
        Ok(instance)
    }
}
