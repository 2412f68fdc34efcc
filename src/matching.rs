//! Checks of provided import values against the types a module declares.
//!
//! Each check fails with the reason to report after the import's name, for
//! example `provided an 'initial' that is too small`.

use crate::{Memory, Store, Table, Tag};
use anyhow::{Result, bail};
use std::cell::Ref;
use wasmlink_environ::{
    Global as GlobalType, Memory as MemoryType, Table as TableType, TypeIndex, TypeRegistry,
    WasmRefType,
};

pub(crate) struct MatchCx<'a> {
    store: &'a Store,
    types: Ref<'a, TypeRegistry>,
}

impl<'a> MatchCx<'a> {
    pub(crate) fn new(store: &'a Store) -> MatchCx<'a> {
        MatchCx {
            store,
            types: store.engine().types(),
        }
    }

    /// A module function of type `actual` may satisfy an import of type
    /// `expected` if it is a subtype.
    pub(crate) fn func(&self, expected: TypeIndex, actual: TypeIndex) -> Result<()> {
        if !self.types.is_subtype(actual, expected) {
            bail!("signature doesn't match the provided WebAssembly function's signature");
        }
        Ok(())
    }

    /// An immutable global import is satisfied by any immutable global whose
    /// type is a subtype of the declared one; its value is copied.
    pub(crate) fn immutable_global(
        &self,
        expected: &GlobalType,
        actual: &GlobalType,
    ) -> Result<()> {
        debug_assert!(!expected.mutability);
        if !self.types.is_subtype_val(actual.wasm_ty, expected.wasm_ty) {
            bail!("must be a same type");
        }
        if actual.mutability {
            bail!("must be a same mutability");
        }
        Ok(())
    }

    /// A mutable global import aliases the provided global, so the types
    /// must be equivalent in both directions.
    pub(crate) fn mutable_global(&self, expected: &GlobalType, actual: &GlobalType) -> Result<()> {
        debug_assert!(expected.mutability);
        if !self.types.is_subtype_val(actual.wasm_ty, expected.wasm_ty)
            || !self.types.is_subtype_val(expected.wasm_ty, actual.wasm_ty)
        {
            bail!("must be a same type");
        }
        if !actual.mutability {
            bail!("must be a same mutability");
        }
        Ok(())
    }

    pub(crate) fn table(&self, expected: &TableType, actual: Table) -> Result<()> {
        let actual_ty = actual.ty(self.store);
        if actual.size(self.store) < expected.minimum {
            bail!("provided an 'initial' that is too small");
        }
        match_maximum(
            expected.maximum.map(u64::from),
            actual_ty.maximum.map(u64::from),
        )?;
        if !self.equivalent_refs(expected.wasm_ty, actual_ty.wasm_ty) {
            bail!("provided a 'type' that is wrong");
        }
        Ok(())
    }

    pub(crate) fn memory(&self, expected: &MemoryType, actual: Memory) -> Result<()> {
        let actual_ty = actual.ty(self.store);
        let declared = expected.minimum_byte_size().unwrap_or(u64::MAX);
        if (actual.data_size(self.store) as u64) < declared {
            bail!(
                "provided a 'size' that is smaller than the module's declared 'initial' import memory size"
            );
        }
        match_maximum(expected.maximum, actual_ty.maximum)?;
        if actual_ty.shared != expected.shared {
            bail!(
                "provided a 'shared' that is different from the module's declared 'shared' import memory attribute"
            );
        }
        Ok(())
    }

    pub(crate) fn tag(&self, expected: TypeIndex, actual: Tag) -> Result<()> {
        if actual.ty(self.store).ty != expected {
            bail!("signature doesn't match the imported Tag's signature");
        }
        Ok(())
    }

    fn equivalent_refs(&self, a: WasmRefType, b: WasmRefType) -> bool {
        self.types.is_subtype_ref(a, b) && self.types.is_subtype_ref(b, a)
    }
}

fn match_maximum(expected: Option<u64>, actual: Option<u64>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match actual {
        None => bail!("does not have a 'maximum' but the module requires that it does"),
        Some(actual) if actual > expected => {
            bail!("provided a 'maximum' that is larger than the module's declared 'maximum'")
        }
        Some(_) => Ok(()),
    }
}
