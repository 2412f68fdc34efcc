use crate::store::{AsContext, AsContextMut, Stored};
use crate::Val;
use anyhow::{Result, bail};
use wasmlink_environ::{Table as TableType, WasmValType};

/// A WebAssembly `table`, or an array of values.
///
/// Like [`Memory`][crate::Memory] a table is an indexed array of values, but
/// unlike [`Memory`][crate::Memory] it's an array of WebAssembly reference type
/// values rather than bytes. One of the most common usages of a table is a
/// function table for wasm modules (a `funcref` table), where each element has
/// the `funcref` type.
///
/// A [`Table`] "belongs" to the store that it was originally created within
/// (either via [`Table::new`] or via instantiating a
/// [`Module`](crate::Module)). Operations on a [`Table`] only work with the
/// store it belongs to, and if another store is passed in by accident then
/// methods will panic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Table(Stored<TableData>);

pub(crate) struct TableData {
    ty: TableType,
    elements: Vec<Val>,
}

impl Table {
    /// Creates a new [`Table`] with the given parameters.
    ///
    /// * `store` - the owner of the resulting [`Table`]
    /// * `ty` - the type of this table, containing both the element type as
    ///   well as the initial size and maximum size, if any.
    /// * `init` - the initial value to fill all table entries with, if the
    ///   table starts with an initial size.
    ///
    /// # Errors
    ///
    /// Returns an error if `init` does not match the element type of the table,
    /// if `init` does not belong to the `store` provided, if the maximum is
    /// smaller than the minimum, or if the minimum exceeds the engine's
    /// configured table limit.
    pub fn new(mut store: impl AsContextMut, ty: TableType, init: Val) -> Result<Table> {
        let store = store.as_context_mut();
        if let Some(max) = ty.maximum {
            if max < ty.minimum {
                bail!("table maximum of {max} is smaller than its minimum of {}", ty.minimum);
            }
        }
        let limit = store.engine().config().max_table_elements;
        if u64::from(ty.minimum) > limit {
            bail!(
                "table minimum size of {} elements exceeds table limits of {limit}",
                ty.minimum
            );
        }
        check_element(store, &ty, &init)?;
        let elements = vec![init; ty.minimum as usize];
        Ok(Table(store.store_data_mut().insert(TableData { ty, elements })))
    }

    /// Returns the underlying type of this table, including its element type as
    /// well as the maximum/minimum lower bounds.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this table.
    pub fn ty(&self, store: impl AsContext) -> TableType {
        store.as_context()[self.0].ty
    }

    /// Returns the current size of this table.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this table.
    pub fn size(&self, store: impl AsContext) -> u32 {
        // Growth is capped by `max_table_elements`, which fits in a u32.
        store.as_context()[self.0].elements.len() as u32
    }

    /// Returns the table element value at `index`.
    ///
    /// Returns `None` if `index` is out of bounds.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this table.
    pub fn get(&self, store: impl AsContext, index: u32) -> Option<Val> {
        store.as_context()[self.0]
            .elements
            .get(index as usize)
            .cloned()
    }

    /// Writes the `val` provided into `index` within this table.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of bounds, if `val` does not have
    /// the right type to be stored in this table, or if `val` belongs to a
    /// different store.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this table.
    pub fn set(&self, mut store: impl AsContextMut, index: u32, val: Val) -> Result<()> {
        let store = store.as_context_mut();
        let ty = store[self.0].ty;
        check_element(store, &ty, &val)?;
        match store[self.0].elements.get_mut(index as usize) {
            Some(slot) => {
                *slot = val;
                Ok(())
            }
            None => bail!("table element index out of bounds"),
        }
    }

    /// Grows the size of this table by `delta` more elements, initialization
    /// all new elements to `init`.
    ///
    /// Returns the previous size of this table if successful.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be grown by `delta`, for example
    /// if it would cause the table to exceed its maximum size. Also returns an
    /// error if `init` is not of the right type or if `init` does not belong to
    /// `store`.
    pub fn grow(&self, mut store: impl AsContextMut, delta: u32, init: Val) -> Result<u32> {
        let store = store.as_context_mut();
        let ty = store[self.0].ty;
        check_element(store, &ty, &init)?;
        let old = self.size(&*store);
        let Some(new) = old.checked_add(delta) else {
            bail!("failed to grow table by `{delta}`");
        };
        let max = ty.maximum.unwrap_or(u32::MAX);
        let limit = store.engine().config().max_table_elements;
        if new > max || u64::from(new) > limit {
            bail!("failed to grow table by `{delta}`");
        }
        store[self.0].elements.resize(new as usize, init);
        Ok(old)
    }

    /// Fill `table[dst..(dst + len)]` with the given value.
    ///
    /// # Errors
    ///
    /// Returns an error if
    ///
    /// * `val` is not of the same type as this table's
    ///   element type,
    ///
    /// * the region to be filled is out of bounds, or
    ///
    /// * `val` comes from a different `Store` from this table.
    pub fn fill(&self, mut store: impl AsContextMut, dst: u32, val: Val, len: u32) -> Result<()> {
        let store = store.as_context_mut();
        let ty = store[self.0].ty;
        check_element(store, &ty, &val)?;
        let elements = &mut store[self.0].elements;
        let start = dst as usize;
        match start.checked_add(len as usize) {
            Some(end) if end <= elements.len() => {
                elements[start..end].fill(val);
                Ok(())
            }
            _ => bail!("fill of {len} elements at {dst} is out of bounds"),
        }
    }

    /// Writes already type-checked values starting at `dst`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds; callers validate it first.
    pub(crate) fn write_validated(
        &self,
        mut store: impl AsContextMut,
        dst: u32,
        vals: impl IntoIterator<Item = Val>,
    ) {
        let elements = &mut store.as_context_mut()[self.0].elements;
        for (slot, val) in elements[dst as usize..].iter_mut().zip(vals) {
            *slot = val;
        }
    }

    pub(crate) fn comes_from_same_store(&self, store: impl AsContext) -> bool {
        store.as_context().store_data().contains(self.0)
    }
}

fn check_element(store: &crate::Store, ty: &TableType, val: &Val) -> Result<()> {
    if !val.comes_from_same_store(store) {
        bail!("cross-`Store` table elements are not supported");
    }
    if !val.matches_ty(store, WasmValType::Ref(ty.wasm_ty)) {
        bail!("value does not match table element type {}", ty.wasm_ty);
    }
    Ok(())
}
