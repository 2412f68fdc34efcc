use crate::{
    PrimaryMap, TypeIndex, WasmFuncType, WasmHeapType, WasmRefType, WasmSubType, WasmValType,
};
use anyhow::{Result, bail};
use std::collections::HashMap;

/// A registry of canonicalized function types.
///
/// Registering a type that is structurally identical to an already
/// registered one returns the existing index, which makes [`TypeIndex`]
/// equality the same thing as type equality for every module sharing a
/// registry.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: PrimaryMap<TypeIndex, WasmSubType>,
    interned: HashMap<WasmSubType, TypeIndex>,
}

impl TypeRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `ty`, returning its canonical index.
    ///
    /// # Errors
    ///
    /// Returns an error if the declared supertype isn't registered, is final,
    /// or isn't actually a supertype of `ty`.
    pub fn register(&mut self, ty: WasmSubType) -> Result<TypeIndex> {
        if let Some(index) = self.interned.get(&ty) {
            return Ok(*index);
        }
        if let Some(sup) = ty.supertype {
            let Some(sup_ty) = self.types.get(sup) else {
                bail!("supertype {} is not registered", sup.as_u32());
            };
            if sup_ty.is_final {
                bail!("cannot declare a subtype of final type {}", sup.as_u32());
            }
            if !self.func_type_matches(&ty.composite_type, &sup_ty.composite_type) {
                bail!(
                    "type {} does not match its declared supertype {}",
                    ty.composite_type,
                    sup_ty.composite_type
                );
            }
        }
        Ok(self.intern(ty))
    }

    /// Registers a final function type with no supertype.
    pub fn register_func(&mut self, ty: WasmFuncType) -> TypeIndex {
        let ty = WasmSubType::func(ty);
        match self.interned.get(&ty) {
            Some(index) => *index,
            None => self.intern(ty),
        }
    }

    fn intern(&mut self, ty: WasmSubType) -> TypeIndex {
        let index = self.types.push(ty.clone());
        log::trace!("registered type {}: {ty}", index.as_u32());
        self.interned.insert(ty, index);
        index
    }

    /// Returns the registered type at `index`.
    pub fn get(&self, index: TypeIndex) -> Option<&WasmSubType> {
        self.types.get(index)
    }

    /// Returns the function type at `index`.
    pub fn func_type(&self, index: TypeIndex) -> Option<&WasmFuncType> {
        self.types.get(index).map(|ty| &ty.composite_type)
    }

    /// Returns whether `index` names a registered type.
    pub fn contains(&self, index: TypeIndex) -> bool {
        self.types.is_valid(index)
    }

    /// Returns the number of distinct types in this registry.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns whether no types have been registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Is `sub` equal to `sup` or does `sup` appear in the declared supertype
    /// chain of `sub`?
    pub fn is_subtype(&self, sub: TypeIndex, sup: TypeIndex) -> bool {
        let mut cur = Some(sub);
        while let Some(index) = cur {
            if index == sup {
                return true;
            }
            cur = self.types.get(index).and_then(|ty| ty.supertype);
        }
        false
    }

    /// Heap type subtyping.
    pub fn is_subtype_heap(&self, sub: WasmHeapType, sup: WasmHeapType) -> bool {
        use WasmHeapType as H;
        match (sub, sup) {
            (H::Extern, H::Extern) | (H::NoExtern, H::Extern | H::NoExtern) => true,
            (H::Func, H::Func) | (H::ConcreteFunc(_), H::Func) => true,
            (H::NoFunc, H::Func | H::ConcreteFunc(_) | H::NoFunc) => true,
            (H::ConcreteFunc(a), H::ConcreteFunc(b)) => self.is_subtype(a, b),
            (H::Exn, H::Exn) | (H::NoExn, H::Exn | H::NoExn) => true,
            _ => false,
        }
    }

    /// Reference type subtyping.
    pub fn is_subtype_ref(&self, sub: WasmRefType, sup: WasmRefType) -> bool {
        (!sub.nullable || sup.nullable) && self.is_subtype_heap(sub.heap_type, sup.heap_type)
    }

    /// Value type subtyping.
    pub fn is_subtype_val(&self, sub: WasmValType, sup: WasmValType) -> bool {
        match (sub, sup) {
            (WasmValType::Ref(sub), WasmValType::Ref(sup)) => self.is_subtype_ref(sub, sup),
            (sub, sup) => sub == sup,
        }
    }

    /// Function subtyping: contravariant parameters, covariant results.
    fn func_type_matches(&self, sub: &WasmFuncType, sup: &WasmFuncType) -> bool {
        sub.params().len() == sup.params().len()
            && sub.returns().len() == sup.returns().len()
            && sub
                .params()
                .iter()
                .zip(sup.params())
                .all(|(a, b)| self.is_subtype_val(*b, *a))
            && sub
                .returns()
                .iter()
                .zip(sup.returns())
                .all(|(a, b)| self.is_subtype_val(*a, *b))
    }
}
