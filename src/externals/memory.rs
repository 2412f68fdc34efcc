use crate::store::{AsContext, AsContextMut, Stored};
use crate::MemoryMode;
use anyhow::{Context, Result, bail};
use wasmlink_environ::{Memory as MemoryType, WASM_PAGE_SIZE};

/// A WebAssembly linear memory.
///
/// WebAssembly memories represent a contiguous array of bytes that have a size
/// that is always a multiple of the WebAssembly page size, currently 64
/// kilobytes.
///
/// Every memory also carries the [`MemoryMode`] code running against it is
/// compiled for. Instantiating a module against an imported memory makes the
/// module's code runnable in that memory's mode first.
///
/// A [`Memory`] "belongs" to the store that it was originally created within
/// (either via [`Memory::new`] or via instantiating a
/// [`Module`](crate::Module)). Operations on a [`Memory`] only work with the
/// store it belongs to, and if another store is passed in by accident then
/// methods will panic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Memory(Stored<MemoryData>);

pub(crate) struct MemoryData {
    ty: MemoryType,
    mode: MemoryMode,
    data: Vec<u8>,
}

impl Memory {
    /// Creates a new WebAssembly memory given the configuration of `ty`,
    /// using the engine's configured [`MemoryMode`].
    ///
    /// # Errors
    ///
    /// Returns an error if the maximum is smaller than the minimum or if the
    /// minimum exceeds the engine's configured page limit.
    pub fn new(mut store: impl AsContextMut, ty: MemoryType) -> Result<Memory> {
        let store = store.as_context_mut();
        let mode = store.engine().config().memory_mode;
        Memory::new_with_mode(store, ty, mode)
    }

    /// Creates a new WebAssembly memory for code compiled for `mode`.
    pub fn new_with_mode(
        mut store: impl AsContextMut,
        ty: MemoryType,
        mode: MemoryMode,
    ) -> Result<Memory> {
        let store = store.as_context_mut();
        if let Some(max) = ty.maximum {
            if max < ty.minimum {
                bail!(
                    "memory maximum of {max} pages is smaller than its minimum of {}",
                    ty.minimum
                );
            }
        }
        let limit = store.engine().config().max_memory_pages;
        if ty.minimum > limit {
            bail!(
                "memory minimum size of {} pages exceeds memory limits of {limit} pages",
                ty.minimum
            );
        }
        let bytes = ty
            .minimum_byte_size()
            .and_then(|b| usize::try_from(b).ok())
            .context("memory size overflows the host address space")?;
        log::trace!("allocating {bytes} bytes of {mode} memory");
        Ok(Memory(store.store_data_mut().insert(MemoryData {
            ty,
            mode,
            data: vec![0; bytes],
        })))
    }

    /// Returns the underlying type of this memory.
    ///
    /// # Panics
    ///
    /// Panics if this memory doesn't belong to `store`.
    pub fn ty(&self, store: impl AsContext) -> MemoryType {
        store.as_context()[self.0].ty
    }

    /// Returns the addressing mode of this memory.
    pub fn mode(&self, store: impl AsContext) -> MemoryMode {
        store.as_context()[self.0].mode
    }

    /// Returns this memory as a native Rust slice.
    ///
    /// # Panics
    ///
    /// Panics if this memory doesn't belong to `store`.
    pub fn data<'a, T: AsContext + ?Sized>(&self, store: &'a T) -> &'a [u8] {
        &store.as_context()[self.0].data
    }

    /// Returns this memory as a native Rust mutable slice.
    ///
    /// # Panics
    ///
    /// Panics if this memory doesn't belong to `store`.
    pub fn data_mut<'a, T: AsContextMut + ?Sized>(&self, store: &'a mut T) -> &'a mut [u8] {
        &mut store.as_context_mut()[self.0].data
    }

    /// Returns the byte length of this memory.
    ///
    /// # Panics
    ///
    /// Panics if this memory doesn't belong to `store`.
    pub fn data_size(&self, store: impl AsContext) -> usize {
        store.as_context()[self.0].data.len()
    }

    /// Returns the size, in WebAssembly pages, of this wasm memory.
    ///
    /// # Panics
    ///
    /// Panics if this memory doesn't belong to `store`.
    pub fn size(&self, store: impl AsContext) -> u64 {
        (self.data_size(store) / WASM_PAGE_SIZE as usize) as u64
    }

    /// Grows this WebAssembly memory by `delta` pages.
    ///
    /// On success returns the number of pages this memory previously had
    /// before the growth succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if memory could not be grown, for example if it exceeds
    /// the maximum limits of this memory.
    pub fn grow(&self, mut store: impl AsContextMut, delta: u64) -> Result<u64> {
        let store = store.as_context_mut();
        let old = self.size(&*store);
        let max = store[self.0]
            .ty
            .maximum
            .unwrap_or(u64::MAX)
            .min(store.engine().config().max_memory_pages);
        let new = match old.checked_add(delta) {
            Some(new) if new <= max => new,
            _ => bail!("failed to grow memory by `{delta}`"),
        };
        let bytes = usize::try_from(new * u64::from(WASM_PAGE_SIZE))
            .context("memory size overflows the host address space")?;
        store[self.0].data.resize(bytes, 0);
        Ok(old)
    }

    pub(crate) fn comes_from_same_store(&self, store: impl AsContext) -> bool {
        store.as_context().store_data().contains(self.0)
    }
}
