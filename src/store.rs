//! The owner of every runtime object.
//!
//! Functions, globals, tables, memories, tags and instances all live in a
//! [`Store`] and are referred to through small copyable handles. A handle is
//! only meaningful together with the store that created it; using it with
//! any other store panics, and offering it as an import to an instance of
//! another store is a link error.
//!
//! Objects live as long as their store. Handles can therefore never dangle,
//! and cycles between instances (an instance's table holding a function of
//! another instance that imports the first one's memory, say) need no
//! special treatment.

use crate::Engine;
use std::fmt;

mod data;
pub(crate) use data::{StoreData, Stored};

/// A collection of WebAssembly instances and host-defined state.
pub struct Store {
    engine: Engine,
    data: StoreData,
}

impl Store {
    /// Creates a new, empty store associated with `engine`.
    pub fn new(engine: &Engine) -> Store {
        Store {
            engine: engine.clone(),
            data: StoreData::new(),
        }
    }

    /// Returns the [`Engine`] that this store is associated with.
    #[inline]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.data.id()
    }

    #[inline]
    pub(crate) fn store_data(&self) -> &StoreData {
        &self.data
    }

    #[inline]
    pub(crate) fn store_data_mut(&mut self) -> &mut StoreData {
        &mut self.data
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("id", &self.id()).finish()
    }
}

/// A trait used to get shared access to a [`Store`].
///
/// Every API that reads runtime objects takes `impl AsContext`, so it can be
/// called with a `&Store`, a `&mut Store` or a [`Caller`](crate::Caller).
pub trait AsContext {
    /// Returns the store this context refers to.
    fn as_context(&self) -> &Store;
}

/// A trait used to get exclusive mutable access to a [`Store`].
pub trait AsContextMut: AsContext {
    /// Returns the store this context refers to.
    fn as_context_mut(&mut self) -> &mut Store;
}

impl AsContext for Store {
    #[inline]
    fn as_context(&self) -> &Store {
        self
    }
}

impl AsContextMut for Store {
    #[inline]
    fn as_context_mut(&mut self) -> &mut Store {
        self
    }
}

impl<T: AsContext + ?Sized> AsContext for &T {
    #[inline]
    fn as_context(&self) -> &Store {
        T::as_context(*self)
    }
}

impl<T: AsContext + ?Sized> AsContext for &mut T {
    #[inline]
    fn as_context(&self) -> &Store {
        T::as_context(*self)
    }
}

impl<T: AsContextMut + ?Sized> AsContextMut for &mut T {
    #[inline]
    fn as_context_mut(&mut self) -> &mut Store {
        T::as_context_mut(*self)
    }
}
