use crate::store::{AsContext, AsContextMut, Stored};
use anyhow::{Result, bail};
use wasmlink_environ::Tag as TagType;

/// A WebAssembly `tag`.
///
/// Tags only carry a signature; two tags are the same tag exactly when they
/// are the same object, which is what `==` compares.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag(Stored<TagData>);

pub(crate) struct TagData {
    ty: TagType,
}

impl Tag {
    /// Create a new tag instance from a given TagType.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag's signature is not registered with the
    /// store's engine.
    pub fn new(mut store: impl AsContextMut, ty: TagType) -> Result<Tag> {
        let store = store.as_context_mut();
        if !store.engine().types().contains(ty.ty) {
            bail!("tag signature {} is not registered with this engine", ty.ty.as_u32());
        }
        Ok(Tag(store.store_data_mut().insert(TagData { ty })))
    }

    /// Returns the underlying type of this `tag`.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this tag.
    pub fn ty(&self, store: impl AsContext) -> TagType {
        store.as_context()[self.0].ty
    }

    pub(crate) fn comes_from_same_store(&self, store: impl AsContext) -> bool {
        store.as_context().store_data().contains(self.0)
    }
}
