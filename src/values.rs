use crate::store::AsContext;
use crate::{Func, HostValue};
use std::fmt;
use std::rc::Rc;
use wasmlink_environ::{WasmHeapTopType, WasmHeapType, WasmRefType, WasmValType};

/// Possible runtime values that a WebAssembly module can either consume or
/// produce.
///
/// Floats are stored as their raw bits so that NaN payloads survive a trip
/// through a global or a table.
#[derive(Debug, Clone)]
pub enum Val {
    /// A 32-bit integer.
    I32(i32),
    /// A 64-bit integer.
    I64(i64),
    /// A 32-bit float, as its raw bits.
    F32(u32),
    /// A 64-bit float, as its raw bits.
    F64(u64),
    /// A 128-bit vector.
    V128(u128),
    /// A function reference.
    FuncRef(Option<Func>),
    /// An external reference.
    ExternRef(Option<ExternRef>),
    /// An exception reference.
    ExnRef(Option<ExternRef>),
}

macro_rules! accessors {
    ($bind:ident $(($variant:ident($ty:ty) $get:ident $unwrap:ident $cvt:expr))*) => ($(
        /// Attempt to access the underlying value of this `Val`, returning
        /// `None` if it is not the correct type.
        pub fn $get(&self) -> Option<$ty> {
            if let Val::$variant($bind) = self {
                Some($cvt)
            } else {
                None
            }
        }

        /// Returns the underlying value of this `Val`, panicking if it's the
        /// wrong type.
        ///
        /// # Panics
        ///
        /// Panics if `self` is not of the right type.
        pub fn $unwrap(&self) -> $ty {
            match self.$get() {
                Some(v) => v,
                None => panic!(concat!("expected ", stringify!($ty))),
            }
        }
    )*)
}

impl Val {
    /// Returns the null reference for the given reference type.
    pub fn null_ref(ty: WasmRefType) -> Val {
        match ty.heap_type.top() {
            WasmHeapTopType::Func => Val::FuncRef(None),
            WasmHeapTopType::Extern => Val::ExternRef(None),
            WasmHeapTopType::Exn => Val::ExnRef(None),
        }
    }

    accessors! {
        e
        (I32(i32) i32 unwrap_i32 *e)
        (I64(i64) i64 unwrap_i64 *e)
        (F32(f32) f32 unwrap_f32 f32::from_bits(*e))
        (F64(f64) f64 unwrap_f64 f64::from_bits(*e))
        (FuncRef(Option<&Func>) funcref unwrap_funcref e.as_ref())
        (V128(u128) v128 unwrap_v128 *e)
    }

    /// Attempt to access the underlying `externref` value of this `Val`.
    ///
    /// If this is not an `externref`, then `None` is returned.
    ///
    /// If this is a null `externref`, then `Some(None)` is returned.
    ///
    /// If this is a non-null `externref`, then `Some(Some(..))` is returned.
    pub fn externref(&self) -> Option<Option<&ExternRef>> {
        match self {
            Val::ExternRef(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// Whether this is a null reference of any hierarchy.
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Val::FuncRef(None) | Val::ExternRef(None) | Val::ExnRef(None)
        )
    }

    /// Returns whether this value is an instance of `ty`.
    ///
    /// Function references are checked against concrete signatures using the
    /// subtyping relation of the store's engine.
    pub fn matches_ty(&self, store: impl AsContext, ty: WasmValType) -> bool {
        let store = store.as_context();
        match (self, ty) {
            (Val::I32(_), WasmValType::I32)
            | (Val::I64(_), WasmValType::I64)
            | (Val::F32(_), WasmValType::F32)
            | (Val::F64(_), WasmValType::F64)
            | (Val::V128(_), WasmValType::V128) => true,
            (Val::FuncRef(f), WasmValType::Ref(r))
                if r.heap_type.top() == WasmHeapTopType::Func =>
            {
                match f {
                    None => r.nullable,
                    Some(f) => match r.heap_type {
                        WasmHeapType::Func => true,
                        WasmHeapType::ConcreteFunc(expected) => {
                            f.type_index(store).is_some_and(|actual| {
                                store.engine().types().is_subtype(actual, expected)
                            })
                        }
                        _ => false,
                    },
                }
            }
            (Val::ExternRef(e), WasmValType::Ref(r))
                if r.heap_type.top() == WasmHeapTopType::Extern =>
            {
                match e {
                    None => r.nullable,
                    Some(_) => r.heap_type == WasmHeapType::Extern,
                }
            }
            (Val::ExnRef(e), WasmValType::Ref(r)) if r.heap_type.top() == WasmHeapTopType::Exn => {
                match e {
                    None => r.nullable,
                    Some(_) => r.heap_type == WasmHeapType::Exn,
                }
            }
            _ => false,
        }
    }

    /// Whether any store-owned object referenced by this value belongs to
    /// `store`.
    pub(crate) fn comes_from_same_store(&self, store: impl AsContext) -> bool {
        match self {
            Val::FuncRef(Some(f)) => f.comes_from_same_store(store),
            _ => true,
        }
    }
}

impl From<i32> for Val {
    fn from(val: i32) -> Val {
        Val::I32(val)
    }
}

impl From<i64> for Val {
    fn from(val: i64) -> Val {
        Val::I64(val)
    }
}

impl From<f32> for Val {
    fn from(val: f32) -> Val {
        Val::F32(val.to_bits())
    }
}

impl From<f64> for Val {
    fn from(val: f64) -> Val {
        Val::F64(val.to_bits())
    }
}

impl From<Func> for Val {
    fn from(val: Func) -> Val {
        Val::FuncRef(Some(val))
    }
}

impl From<ExternRef> for Val {
    fn from(val: ExternRef) -> Val {
        Val::ExternRef(Some(val))
    }
}

/// A reference to an opaque host value.
///
/// Cloning an `ExternRef` yields another reference to the same value;
/// [`ExternRef::ptr_eq`] compares identity.
#[derive(Clone)]
pub struct ExternRef {
    inner: Rc<HostValue>,
}

impl ExternRef {
    /// Wraps `value` in a new reference.
    pub fn new(value: impl Into<HostValue>) -> ExternRef {
        ExternRef {
            inner: Rc::new(value.into()),
        }
    }

    /// Returns the wrapped host value.
    pub fn data(&self) -> &HostValue {
        &self.inner
    }

    /// Whether `a` and `b` refer to the same host value.
    pub fn ptr_eq(a: &ExternRef, b: &ExternRef) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for ExternRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExternRef").field(&self.inner).finish()
    }
}
