use crate::{TypeIndex, WASM_PAGE_SIZE};
use core::fmt;
use serde_derive::{Deserialize, Serialize};

/// WebAssembly value type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasmValType {
    /// I32 type
    I32,
    /// I64 type
    I64,
    /// F32 type
    F32,
    /// F64 type
    F64,
    /// V128 type
    V128,
    /// Reference type
    Ref(WasmRefType),
}

impl fmt::Display for WasmValType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WasmValType::I32 => write!(f, "i32"),
            WasmValType::I64 => write!(f, "i64"),
            WasmValType::F32 => write!(f, "f32"),
            WasmValType::F64 => write!(f, "f64"),
            WasmValType::V128 => write!(f, "v128"),
            WasmValType::Ref(rt) => write!(f, "{rt}"),
        }
    }
}

impl WasmValType {
    /// Shorthand for a nullable `funcref`.
    pub const FUNCREF: WasmValType = WasmValType::Ref(WasmRefType::FUNCREF);
    /// Shorthand for a nullable `externref`.
    pub const EXTERNREF: WasmValType = WasmValType::Ref(WasmRefType::EXTERNREF);

    /// Is this one of the numeric types (`i32`, `i64`, `f32`, `f64`)?
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            WasmValType::I32 | WasmValType::I64 | WasmValType::F32 | WasmValType::F64
        )
    }

    /// Returns the reference type, if this is one.
    pub fn ref_type(&self) -> Option<&WasmRefType> {
        match self {
            WasmValType::Ref(r) => Some(r),
            _ => None,
        }
    }
}

/// WebAssembly reference type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WasmRefType {
    /// Whether `null` inhabits this type.
    pub nullable: bool,
    /// The heap type being referenced.
    pub heap_type: WasmHeapType,
}

impl WasmRefType {
    /// `(ref null extern)`
    pub const EXTERNREF: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::Extern,
    };
    /// `(ref null func)`
    pub const FUNCREF: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::Func,
    };
    /// `(ref null exn)`
    pub const EXNREF: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::Exn,
    };
}

impl fmt::Display for WasmRefType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::FUNCREF => write!(f, "funcref"),
            Self::EXTERNREF => write!(f, "externref"),
            Self::EXNREF => write!(f, "exnref"),
            _ => {
                if self.nullable {
                    write!(f, "(ref null {})", self.heap_type)
                } else {
                    write!(f, "(ref {})", self.heap_type)
                }
            }
        }
    }
}

/// WebAssembly heap type.
///
/// Only the function, external and exception hierarchies exist here; the GC
/// proposal's internal hierarchy is not supported.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasmHeapType {
    /// Any host reference.
    Extern,
    /// The bottom of the external hierarchy.
    NoExtern,

    /// Any function.
    Func,
    /// Functions of a particular signature, or a subtype of it.
    ConcreteFunc(TypeIndex),
    /// The bottom of the function hierarchy.
    NoFunc,

    /// Any exception.
    Exn,
    /// The bottom of the exception hierarchy.
    NoExn,
}

impl fmt::Display for WasmHeapType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Extern => write!(f, "extern"),
            Self::NoExtern => write!(f, "noextern"),
            Self::Func => write!(f, "func"),
            Self::ConcreteFunc(i) => write!(f, "func {}", i.as_u32()),
            Self::NoFunc => write!(f, "nofunc"),
            Self::Exn => write!(f, "exn"),
            Self::NoExn => write!(f, "noexn"),
        }
    }
}

impl WasmHeapType {
    /// Get this type's top type.
    #[inline]
    pub fn top(&self) -> WasmHeapTopType {
        match self {
            WasmHeapType::Extern | WasmHeapType::NoExtern => WasmHeapTopType::Extern,
            WasmHeapType::Func | WasmHeapType::ConcreteFunc(_) | WasmHeapType::NoFunc => {
                WasmHeapTopType::Func
            }
            WasmHeapType::Exn | WasmHeapType::NoExn => WasmHeapTopType::Exn,
        }
    }

    /// Is this the bottom type of its hierarchy, only inhabited by `null`?
    #[inline]
    pub fn is_bottom(&self) -> bool {
        matches!(
            self,
            WasmHeapType::NoExtern | WasmHeapType::NoFunc | WasmHeapType::NoExn
        )
    }
}

/// A top heap type.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum WasmHeapTopType {
    /// The common supertype of all external references.
    Extern,
    /// The common supertype of all function references.
    Func,
    /// The common supertype of all exception references.
    Exn,
}

impl From<WasmHeapTopType> for WasmHeapType {
    #[inline]
    fn from(value: WasmHeapTopType) -> Self {
        match value {
            WasmHeapTopType::Extern => Self::Extern,
            WasmHeapTopType::Func => Self::Func,
            WasmHeapTopType::Exn => Self::Exn,
        }
    }
}

/// WebAssembly function type.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WasmFuncType {
    params: Box<[WasmValType]>,
    returns: Box<[WasmValType]>,
}

impl WasmFuncType {
    /// Creates a new function type from its parameter and result types.
    pub fn new(
        params: impl IntoIterator<Item = WasmValType>,
        returns: impl IntoIterator<Item = WasmValType>,
    ) -> Self {
        WasmFuncType {
            params: params.into_iter().collect(),
            returns: returns.into_iter().collect(),
        }
    }

    /// Function params types.
    #[inline]
    pub fn params(&self) -> &[WasmValType] {
        &self.params
    }

    /// Returns params types.
    #[inline]
    pub fn returns(&self) -> &[WasmValType] {
        &self.returns
    }
}

impl fmt::Display for WasmFuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(func")?;
        if !self.params.is_empty() {
            write!(f, " (param")?;
            for p in self.params.iter() {
                write!(f, " {p}")?;
            }
            write!(f, ")")?;
        }
        if !self.returns.is_empty() {
            write!(f, " (result")?;
            for r in self.returns.iter() {
                write!(f, " {r}")?;
            }
            write!(f, ")")?;
        }
        write!(f, ")")
    }
}

/// A function type together with its position in the declared subtyping
/// hierarchy.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WasmSubType {
    /// Whether this type is forbidden from being the supertype of any other
    /// type.
    pub is_final: bool,
    /// This type's declared supertype, if any.
    pub supertype: Option<TypeIndex>,
    /// The underlying function type.
    pub composite_type: WasmFuncType,
}

impl WasmSubType {
    /// A final function type without a supertype, the shape of every MVP
    /// function type.
    pub fn func(ty: WasmFuncType) -> Self {
        WasmSubType {
            is_final: true,
            supertype: None,
            composite_type: ty,
        }
    }
}

impl fmt::Display for WasmSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_final && self.supertype.is_none() {
            return fmt::Display::fmt(&self.composite_type, f);
        }
        write!(f, "(sub")?;
        if self.is_final {
            write!(f, " final")?;
        }
        if let Some(sup) = self.supertype {
            write!(f, " {}", sup.as_u32())?;
        }
        write!(f, " {})", self.composite_type)
    }
}

/// A WebAssembly global.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Global {
    /// The Wasm type of the value stored in the global.
    pub wasm_ty: WasmValType,
    /// A flag indicating whether the value may change at runtime.
    pub mutability: bool,
}

impl Global {
    /// An immutable global of the given type.
    pub fn immutable(wasm_ty: WasmValType) -> Global {
        Global {
            wasm_ty,
            mutability: false,
        }
    }

    /// A mutable global of the given type.
    pub fn mutable(wasm_ty: WasmValType) -> Global {
        Global {
            wasm_ty,
            mutability: true,
        }
    }
}

/// WebAssembly table.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// The table elements' Wasm type.
    pub wasm_ty: WasmRefType,
    /// The minimum number of elements in the table.
    pub minimum: u32,
    /// The maximum number of elements in the table.
    pub maximum: Option<u32>,
}

/// WebAssembly linear memory.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// The minimum number of pages in the memory.
    pub minimum: u64,
    /// The maximum number of pages in the memory.
    pub maximum: Option<u64>,
    /// Whether the memory may be shared between multiple threads.
    pub shared: bool,
}

impl Memory {
    /// Returns the minimum size, in bytes, that this memory must be.
    ///
    /// Returns `None` if the calculation overflows.
    pub fn minimum_byte_size(&self) -> Option<u64> {
        self.minimum.checked_mul(u64::from(WASM_PAGE_SIZE))
    }

    /// Returns the maximum size, in bytes, that this memory is allowed to be,
    /// if it declares one.
    pub fn maximum_byte_size(&self) -> Option<u64> {
        self.maximum?.checked_mul(u64::from(WASM_PAGE_SIZE))
    }
}

/// WebAssembly exception tag.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// The tag signature type.
    pub ty: TypeIndex,
}

/// A type of an item in a wasm module where an item is typically something that
/// can be exported.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// A global variable with the specified content type
    Global(Global),
    /// A linear memory with the specified limits
    Memory(Memory),
    /// An exception tag with the specified signature
    Tag(Tag),
    /// A table with the specified element type and limits
    Table(Table),
    /// A function type where the index points to the type section and records a
    /// function signature.
    Function(TypeIndex),
}

impl EntityType {
    /// A short description of the kind of entity.
    pub fn desc(&self) -> &'static str {
        match self {
            EntityType::Global(_) => "global",
            EntityType::Memory(_) => "memory",
            EntityType::Tag(_) => "tag",
            EntityType::Table(_) => "table",
            EntityType::Function(_) => "function",
        }
    }
}
