use crate::func::{FuncBody, FuncKind};
use crate::store::{AsContext, AsContextMut, Stored};
use crate::{Caller, Extern, Func, Global, Memory, MemoryMode, Module, Store, Table, Tag, Trap, Val};
use anyhow::{Result, bail};
use indexmap::IndexMap;
use std::rc::Rc;
use wasmlink_environ::{
    FuncIndex, GlobalIndex, PrimaryMap, SecondaryMap, TableIndex, TagIndex, TypeIndex,
};

mod exports;
pub use exports::ExportSurface;

/// An instantiated WebAssembly module.
///
/// This type represents the instantiation of a [`Module`]. Once instantiated
/// you can access the [`exports`](Instance::exports) which are of type
/// [`Extern`] and provide the ability to call functions, set globals, read
/// memory, etc. When interacting with any wasm code you'll want to make an
/// [`Instance`] to call any code or execute anything.
///
/// Instances are owned by a [`Store`] which is passed in at creation time.
/// Instances are created with [`Instance::new`], see its documentation for
/// the phases instantiation goes through.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Instance(pub(crate) Stored<InstanceData>);

/// How an imported function is reached from the importing instance.
pub(crate) enum ImportCallee {
    /// A module function of another instance: calls run its body directly in
    /// the defining instance.
    Wasm { instance: Instance, body: FuncBody },
    /// A host function, called through the host-call adapter.
    Host(Func),
}

pub(crate) struct FunctionImport {
    /// The value the import was satisfied with.
    pub(crate) func: Func,
    /// The signature the module declared for this import.
    pub(crate) type_index: TypeIndex,
    pub(crate) callee: ImportCallee,
}

/// Storage for one global of an instance.
pub(crate) enum GlobalSlot {
    /// The value lives in the instance.
    Inline(Val),
    /// The value lives in a global object that may be shared with the host
    /// and with other instances.
    Shared(Global),
}

pub(crate) struct InstanceData {
    pub(crate) module: Module,
    pub(crate) imported_functions: PrimaryMap<FuncIndex, FunctionImport>,
    pub(crate) tables: PrimaryMap<TableIndex, Table>,
    pub(crate) globals: PrimaryMap<GlobalIndex, GlobalSlot>,
    pub(crate) memory: Option<Memory>,
    pub(crate) memory_mode: MemoryMode,
    pub(crate) tags: PrimaryMap<TagIndex, Tag>,
    pub(crate) func_refs: SecondaryMap<FuncIndex, Option<Func>>,
    pub(crate) start: Option<Func>,
    pub(crate) exports: ExportSurface,
}

impl InstanceData {
    pub(crate) fn new(module: &Module) -> InstanceData {
        let info = module.info();
        InstanceData {
            module: module.clone(),
            imported_functions: PrimaryMap::with_capacity(info.num_imported_funcs),
            tables: PrimaryMap::with_capacity(info.tables.len()),
            globals: PrimaryMap::with_capacity(info.globals.len()),
            memory: None,
            memory_mode: module.engine().config().memory_mode,
            tags: PrimaryMap::with_capacity(info.tags.len()),
            func_refs: SecondaryMap::with_capacity(info.functions.len()),
            start: None,
            exports: ExportSurface::default(),
        }
    }
}

impl Instance {
    /// Returns the module this instance was created from.
    pub fn module<'a>(&self, store: &'a impl AsContext) -> &'a Module {
        &store.as_context()[self.0].module
    }

    /// Returns the export surface of this instance: every export, in
    /// declaration order.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this instance.
    pub fn exports(&self, store: impl AsContext) -> ExportSurface {
        store.as_context()[self.0].exports.clone()
    }

    /// Looks up an export by name.
    pub fn get_export(&self, store: impl AsContext, name: &str) -> Option<Extern> {
        store.as_context()[self.0].exports.get(name)
    }

    /// Looks up an exported [`Func`] by name.
    pub fn get_func(&self, store: impl AsContext, name: &str) -> Option<Func> {
        self.get_export(store, name)?.into_func()
    }

    /// Looks up an exported [`Global`] by name.
    pub fn get_global(&self, store: impl AsContext, name: &str) -> Option<Global> {
        self.get_export(store, name)?.into_global()
    }

    /// Looks up an exported [`Table`] by name.
    pub fn get_table(&self, store: impl AsContext, name: &str) -> Option<Table> {
        self.get_export(store, name)?.into_table()
    }

    /// Looks up an exported [`Memory`] by name.
    pub fn get_memory(&self, store: impl AsContext, name: &str) -> Option<Memory> {
        self.get_export(store, name)?.into_memory()
    }

    /// Looks up an exported [`Tag`] by name.
    pub fn get_tag(&self, store: impl AsContext, name: &str) -> Option<Tag> {
        self.get_export(store, name)?.into_tag()
    }

    /// Reads the current value of global `index`, whether or not it is
    /// exported. Shared globals are read through the global object, so
    /// mutations made by the host are visible here.
    ///
    /// # Panics
    ///
    /// Panics if the global has not been initialized yet or `index` is out
    /// of bounds.
    pub fn global_value(&self, store: impl AsContext, index: GlobalIndex) -> Val {
        let store = store.as_context();
        match &store[self.0].globals[index] {
            GlobalSlot::Inline(val) => val.clone(),
            GlobalSlot::Shared(global) => global.get(store),
        }
    }

    pub(crate) fn set_global_value(
        &self,
        mut store: impl AsContextMut,
        index: GlobalIndex,
        val: Val,
    ) -> Result<()> {
        let store = store.as_context_mut();
        let ty = store[self.0].module.info().globals[index];
        if !ty.mutability {
            bail!("global {} is immutable", index.as_u32());
        }
        if !val.matches_ty(&*store, ty.wasm_ty) {
            bail!("value does not match the type of global {}", index.as_u32());
        }
        match &mut store[self.0].globals[index] {
            GlobalSlot::Inline(slot) => {
                *slot = val;
                Ok(())
            }
            GlobalSlot::Shared(global) => {
                let global = *global;
                global.set(store, val)
            }
        }
    }

    /// Returns table `index` of this instance, imported or defined.
    pub fn table(&self, store: impl AsContext, index: TableIndex) -> Table {
        store.as_context()[self.0].tables[index]
    }

    /// Returns the memory of this instance, imported or defined.
    pub fn memory(&self, store: impl AsContext) -> Option<Memory> {
        store.as_context()[self.0].memory
    }

    /// Returns the addressing mode this instance's code runs with.
    pub fn memory_mode(&self, store: impl AsContext) -> MemoryMode {
        store.as_context()[self.0].memory_mode
    }

    /// Returns tag `index` of this instance, imported or defined.
    pub fn tag(&self, store: impl AsContext, index: TagIndex) -> Tag {
        store.as_context()[self.0].tags[index]
    }

    /// Returns the start function, if the module declares one.
    pub fn start(&self, store: impl AsContext) -> Option<Func> {
        store.as_context()[self.0].start
    }

    /// Returns the function for `index` of this instance's function index
    /// space, creating it on first use.
    ///
    /// Every call for the same index returns the same [`Func`]. An imported
    /// function that already is a module function is returned as is; an
    /// imported host function gets a typed wrapper; a module-defined function
    /// gets an exported function running the module's code.
    pub fn func(&self, mut store: impl AsContextMut, index: FuncIndex) -> Func {
        let store = store.as_context_mut();
        if let Some(func) = store[self.0].func_refs[index] {
            return func;
        }

        let data = &store[self.0];
        let info = data.module.info();
        let type_index = info.functions[index];
        let kind = match info.defined_func_index(index) {
            None => {
                let import = &data.imported_functions[index];
                if import.func.is_module_function(&*store) {
                    let func = import.func;
                    store[self.0].func_refs[index] = Some(func);
                    return func;
                }
                FuncKind::Wrapper {
                    callee: import.func,
                    instance: *self,
                    index,
                    type_index,
                }
            }
            Some(defined) => FuncKind::Exported {
                instance: *self,
                index,
                type_index,
                body: data.module.entrypoint(data.memory_mode, defined),
            },
        };

        log::trace!("creating function wrapper for function {}", index.as_u32());
        let func = Func::from_kind(store.store_data_mut(), kind);
        store[self.0].func_refs[index] = Some(func);
        func
    }

    /// Calls `index` the way code of this instance does: module-defined
    /// functions run their body, imports go through their import slot.
    pub(crate) fn call_func(
        &self,
        store: &mut Store,
        index: FuncIndex,
        args: &[Val],
    ) -> Result<Vec<Val>, Trap> {
        let data = &store[self.0];
        let (instance, body) = match data.module.info().defined_func_index(index) {
            Some(defined) => (*self, data.module.entrypoint(data.memory_mode, defined)),
            None => match &data.imported_functions[index].callee {
                ImportCallee::Wasm { instance, body } => (*instance, body.clone()),
                ImportCallee::Host(func) => {
                    let func = *func;
                    return func.call(store, args);
                }
            },
        };
        body(&mut Caller::new(store, Some(instance)), args)
    }
}

/// Collects `exports` into a frozen [`ExportSurface`].
pub(crate) fn freeze_exports(exports: IndexMap<String, Extern>) -> ExportSurface {
    ExportSurface::new(Rc::new(exports))
}
