use crate::store::{AsContext, AsContextMut, Stored};
use crate::Val;
use anyhow::{Result, bail};
use wasmlink_environ::Global as GlobalType;

/// A WebAssembly `global` value which can be read and written to.
///
/// A `global` in WebAssembly is sort of like a global variable within an
/// [`Instance`](crate::Instance). The `global.get` and `global.set`
/// instructions will modify and read global values in a wasm module. Globals
/// can either be imported or exported from wasm modules.
///
/// A [`Global`] "belongs" to the store that it was originally created within
/// (either via [`Global::new`] or via instantiating a
/// [`Module`](crate::Module)). Operations on a [`Global`] only work with the
/// store it belongs to, and if another store is passed in by accident then
/// methods will panic.
///
/// Every holder of the same `Global` observes the same value: a mutable
/// global imported by an instance is the very object the host created, so a
/// `set` on either side is seen by the other.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Global(Stored<GlobalData>);

pub(crate) struct GlobalData {
    ty: GlobalType,
    value: Val,
}

impl Global {
    /// Creates a new WebAssembly `global` value with the provided type `ty`
    /// and initial value `val`.
    ///
    /// # Errors
    ///
    /// Returns an error if `val` is not an instance of the value type of
    /// `ty`, or if it references objects of another store.
    pub fn new(mut store: impl AsContextMut, ty: GlobalType, val: Val) -> Result<Global> {
        let store = store.as_context_mut();
        if !val.comes_from_same_store(&*store) {
            bail!("cross-`Store` globals are not supported");
        }
        if !val.matches_ty(&*store, ty.wasm_ty) {
            bail!("value provided does not match the type of this global");
        }
        Ok(Global(store.store_data_mut().insert(GlobalData { ty, value: val })))
    }

    /// Allocates a reference-typed global holding null, to be given its real
    /// value with [`Global::set`] once allocated.
    pub(crate) fn placeholder(mut store: impl AsContextMut, ty: GlobalType) -> Global {
        let Some(ref_ty) = ty.wasm_ty.ref_type() else {
            panic!("placeholder for non-reference global of type {}", ty.wasm_ty);
        };
        let value = Val::null_ref(*ref_ty);
        Global(store.as_context_mut().store_data_mut().insert(GlobalData { ty, value }))
    }

    /// Returns the underlying type of this `global`.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this global.
    pub fn ty(&self, store: impl AsContext) -> GlobalType {
        store.as_context()[self.0].ty
    }

    /// Returns the current [`Val`] of this global.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this global.
    pub fn get(&self, store: impl AsContext) -> Val {
        store.as_context()[self.0].value.clone()
    }

    /// Attempts to set the current value of this global to [`Val`].
    ///
    /// # Errors
    ///
    /// Returns an error if this global has a different type than `Val`, if
    /// it's not a mutable global, or if `val` comes from a different store
    /// than the one provided.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this global.
    pub fn set(&self, mut store: impl AsContextMut, val: Val) -> Result<()> {
        let store = store.as_context_mut();
        let ty = store[self.0].ty;
        if !ty.mutability {
            bail!("immutable global cannot be set");
        }
        if !val.comes_from_same_store(&*store) {
            bail!("cross-`Store` values are not supported");
        }
        if !val.matches_ty(&*store, ty.wasm_ty) {
            bail!("value provided does not match the type of this global");
        }
        store[self.0].value = val;
        Ok(())
    }

    pub(crate) fn comes_from_same_store(&self, store: impl AsContext) -> bool {
        store.as_context().store_data().contains(self.0)
    }
}
