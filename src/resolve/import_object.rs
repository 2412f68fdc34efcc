use super::ImportResolver;
use crate::{HostObject, HostValue, InstantiationError, Store, TypeError};
use wasmlink_environ::Import;

/// Looks up `import.module` in the object, requires the result to be an
/// object itself and returns its `import.field` property.
impl ImportResolver for HostObject {
    fn resolve(&self, _store: &Store, import: &Import) -> Result<HostValue, InstantiationError> {
        let namespace = self.get(&import.module).unwrap_or(&HostValue::Undefined);
        let Some(namespace) = namespace.as_object() else {
            return Err(TypeError::import(import, "import", "must be an object").into());
        };
        Ok(namespace.get(&import.field).cloned().unwrap_or_default())
    }
}

/// Same as the [`HostObject`] lookup, with non-object values (for example
/// `Undefined` for a module instantiated without imports) failing the first
/// import.
impl ImportResolver for HostValue {
    fn resolve(&self, store: &Store, import: &Import) -> Result<HostValue, InstantiationError> {
        match self.as_object() {
            Some(object) => object.resolve(store, import),
            None => Err(TypeError::import(import, "import", "must be an object").into()),
        }
    }
}
