//! Strategies for finding the host value that satisfies an import.
//!
//! The linker asks an [`ImportResolver`] for one value per declared import
//! and then checks that value against the import's declared kind and type.
//! Two strategies are provided: [`HostObject`](crate::HostObject) looks the
//! value up as `imports[module][field]`, and [`ModuleGraph`] resolves the
//! import as a binding exported by another module record.

use crate::{HostValue, InstantiationError, Store};
use wasmlink_environ::Import;

mod import_object;
mod module_graph;

pub use module_graph::{ModuleGraph, ModuleRecord, Resolution};

/// Supplies the host value for each import of a module being instantiated.
pub trait ImportResolver {
    /// Returns the value provided for `import`.
    ///
    /// A missing value is reported as [`HostValue::Undefined`], which then
    /// fails the linker's kind check for the import. An `Err` aborts
    /// instantiation as is.
    fn resolve(&self, store: &Store, import: &Import) -> Result<HostValue, InstantiationError>;
}

impl<T: ImportResolver + ?Sized> ImportResolver for &T {
    fn resolve(&self, store: &Store, import: &Import) -> Result<HostValue, InstantiationError> {
        T::resolve(self, store, import)
    }
}
