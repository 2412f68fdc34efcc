use crate::store::{AsContext, AsContextMut, StoreData, Stored};
use crate::{Instance, Memory, Store, Table, Trap, TrapCode, Val};
use std::fmt;
use std::rc::Rc;
use wasmlink_environ::{FuncIndex, GlobalIndex, TableIndex, TypeIndex, WasmFuncType, WasmValType};

/// The signature shared by host functions and module function bodies.
///
/// The [`Caller`] gives access to the store and, for module code, to the
/// instance the function belongs to.
pub type FuncBody = Rc<dyn Fn(&mut Caller<'_>, &[Val]) -> Result<Vec<Val>, Trap>>;

/// A WebAssembly function which can be called.
///
/// A `Func` is one of three things:
///
/// * a host function created with [`Func::new`], which is untyped and accepts
///   whatever it is given;
/// * a function defined by a module and exported (or referenced) from one of
///   its instances;
/// * a typed wrapper an instance created around a host function it imported,
///   so the import can be handed back to the host or stored in a table.
///
/// The last two are "module functions": they have a signature and can be
/// linked directly into other instances.
///
/// Like every other runtime object a `Func` belongs to the [`Store`] it was
/// created in, and equality is identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Func(Stored<FuncData>);

pub(crate) struct FuncData {
    kind: FuncKind,
}

pub(crate) enum FuncKind {
    Host(FuncBody),
    Exported {
        instance: Instance,
        index: FuncIndex,
        type_index: TypeIndex,
        body: FuncBody,
    },
    Wrapper {
        callee: Func,
        instance: Instance,
        index: FuncIndex,
        type_index: TypeIndex,
    },
}

impl Func {
    /// Creates a new host function.
    ///
    /// The closure receives a [`Caller`] and the arguments, and either returns
    /// the results or raises a [`Trap`].
    pub fn new(
        mut store: impl AsContextMut,
        func: impl Fn(&mut Caller<'_>, &[Val]) -> Result<Vec<Val>, Trap> + 'static,
    ) -> Func {
        Func::from_kind(
            store.as_context_mut().store_data_mut(),
            FuncKind::Host(Rc::new(func)),
        )
    }

    pub(crate) fn from_kind(data: &mut StoreData, kind: FuncKind) -> Func {
        Func(data.insert(FuncData { kind }))
    }

    pub(crate) fn kind<'a>(&self, store: &'a Store) -> &'a FuncKind {
        &store[self.0].kind
    }

    pub(crate) fn comes_from_same_store(&self, store: impl AsContext) -> bool {
        store.as_context().store_data().contains(self.0)
    }

    /// Returns the canonical signature of this function, or `None` for an
    /// untyped host function.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this function.
    pub fn type_index(&self, store: impl AsContext) -> Option<TypeIndex> {
        match self.kind(store.as_context()) {
            FuncKind::Host(_) => None,
            FuncKind::Exported { type_index, .. } | FuncKind::Wrapper { type_index, .. } => {
                Some(*type_index)
            }
        }
    }

    /// Returns the signature of this function, or `None` for an untyped host
    /// function.
    pub fn ty(&self, store: impl AsContext) -> Option<WasmFuncType> {
        let store = store.as_context();
        let index = self.type_index(store)?;
        store.engine().types().func_type(index).cloned()
    }

    /// Whether this function was produced by an instance, either from the
    /// module's own code or as a wrapper around an imported host function.
    pub fn is_module_function(&self, store: impl AsContext) -> bool {
        !matches!(self.kind(store.as_context()), FuncKind::Host(_))
    }

    /// The instance this function was produced by and its index in that
    /// instance's function index space.
    pub fn origin(&self, store: impl AsContext) -> Option<(Instance, FuncIndex)> {
        match self.kind(store.as_context()) {
            FuncKind::Host(_) => None,
            FuncKind::Exported {
                instance, index, ..
            }
            | FuncKind::Wrapper {
                instance, index, ..
            } => Some((*instance, *index)),
        }
    }

    /// Invokes this function with the `args` given, returning the results.
    ///
    /// Typed functions check their arguments and results against their
    /// signature and raise [`TrapCode::BadSignature`] on a mismatch.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this function.
    pub fn call(&self, mut store: impl AsContextMut, args: &[Val]) -> Result<Vec<Val>, Trap> {
        let store = store.as_context_mut();
        match self.kind(store) {
            FuncKind::Host(body) => {
                let body = body.clone();
                body(&mut Caller::new(store, None), args)
            }
            FuncKind::Exported {
                instance,
                type_index,
                body,
                ..
            } => {
                let (instance, type_index, body) = (*instance, *type_index, body.clone());
                invoke_typed(store, instance, type_index, args, |caller, args| {
                    body(caller, args)
                })
            }
            FuncKind::Wrapper {
                callee,
                instance,
                type_index,
                ..
            } => {
                let (callee, instance, type_index) = (*callee, *instance, *type_index);
                invoke_typed(store, instance, type_index, args, |caller, args| {
                    callee.call(&mut *caller.store, args)
                })
            }
        }
    }
}

fn invoke_typed(
    store: &mut Store,
    instance: Instance,
    type_index: TypeIndex,
    args: &[Val],
    f: impl FnOnce(&mut Caller<'_>, &[Val]) -> Result<Vec<Val>, Trap>,
) -> Result<Vec<Val>, Trap> {
    let Some(ty) = store.engine().types().func_type(type_index).cloned() else {
        panic!("unregistered function type {}", type_index.as_u32());
    };
    if !values_match(store, args, ty.params()) {
        return Err(Trap::Wasm(TrapCode::BadSignature));
    }
    let results = f(&mut Caller::new(store, Some(instance)), args)?;
    if !values_match(store, &results, ty.returns()) {
        return Err(Trap::Wasm(TrapCode::BadSignature));
    }
    Ok(results)
}

fn values_match(store: &Store, vals: &[Val], tys: &[WasmValType]) -> bool {
    vals.len() == tys.len() && vals.iter().zip(tys).all(|(v, t)| v.matches_ty(store, *t))
}

/// A structure representing the caller's context when creating a function
/// via [`Func::new`], or when module code runs.
///
/// This structure can be used to access the store as well as, for module
/// code and typed wrappers, the instance the running function belongs to.
pub struct Caller<'a> {
    pub(crate) store: &'a mut Store,
    instance: Option<Instance>,
}

impl<'a> Caller<'a> {
    pub(crate) fn new(store: &'a mut Store, instance: Option<Instance>) -> Caller<'a> {
        Caller { store, instance }
    }

    /// The instance the running function belongs to, if any.
    pub fn instance(&self) -> Option<Instance> {
        self.instance
    }

    fn current(&self) -> Result<Instance, Trap> {
        self.instance
            .ok_or_else(|| Trap::user("host function has no calling instance"))
    }

    /// Calls function `index` of the running instance's function index space,
    /// the way a `call` instruction would.
    ///
    /// Imported functions are called through their import slot: a module
    /// function of another instance runs directly in that instance, a host
    /// function is called as is.
    pub fn call(&mut self, index: FuncIndex, args: &[Val]) -> Result<Vec<Val>, Trap> {
        let instance = self.current()?;
        instance.call_func(self.store, index, args)
    }

    /// Reads global `index` of the running instance.
    pub fn global(&self, index: GlobalIndex) -> Result<Val, Trap> {
        let instance = self.current()?;
        Ok(instance.global_value(&*self.store, index))
    }

    /// Writes global `index` of the running instance.
    pub fn set_global(&mut self, index: GlobalIndex, val: Val) -> Result<(), Trap> {
        let instance = self.current()?;
        instance
            .set_global_value(&mut *self.store, index, val)
            .map_err(|e| Trap::user(format!("{e:#}")))
    }

    /// Returns table `index` of the running instance.
    pub fn table(&self, index: TableIndex) -> Result<Table, Trap> {
        let instance = self.current()?;
        Ok(instance.table(&*self.store, index))
    }

    /// Returns the memory of the running instance.
    pub fn memory(&self) -> Result<Memory, Trap> {
        let instance = self.current()?;
        instance
            .memory(&*self.store)
            .ok_or(Trap::Wasm(TrapCode::MemoryOutOfBounds))
    }
}

impl AsContext for Caller<'_> {
    #[inline]
    fn as_context(&self) -> &Store {
        self.store
    }
}

impl AsContextMut for Caller<'_> {
    #[inline]
    fn as_context_mut(&mut self) -> &mut Store {
        self.store
    }
}

impl fmt::Debug for Caller<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caller")
            .field("instance", &self.instance)
            .finish()
    }
}
