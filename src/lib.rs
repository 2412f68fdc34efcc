//! Instantiation and linking of WebAssembly modules.
//!
//! A [`Module`] pairs the static description of a validated module with the
//! code of its functions. [`Instance::new`] turns it into a live [`Instance`]
//! inside a [`Store`]: imports are resolved and checked, module-defined
//! tables, globals, memory and tags are created, active segments are written
//! and the start function runs. Failures surface as one of three kinds of
//! [`InstantiationError`]: a [`TypeError`] for misuse of the host API, a
//! [`LinkError`] for imports that don't match their declaration, and a
//! [`RuntimeError`] for failures while running module code or applying
//! segments.
//!
//! Imports are supplied by an [`ImportResolver`]: a [`HostObject`] of import
//! namespaces, or a [`ModuleGraph`] that resolves them as exports of other
//! modules.

#![deny(missing_docs)]

mod config;
mod const_expr;
mod engine;
mod error;
mod externals;
mod func;
mod host;
mod instance;
mod instantiate;
mod matching;
mod module;
mod resolve;
mod store;
mod trap;
mod values;

pub use crate::config::{Config, MemoryMode};
pub use crate::engine::Engine;
pub use crate::error::{InstantiationError, LinkError, RuntimeError, TypeError};
pub use crate::externals::{Extern, Global, Memory, Table, Tag};
pub use crate::func::{Caller, Func, FuncBody};
pub use crate::host::{HostObject, HostValue, to_big_int64, to_f32, to_int32};
pub use crate::instance::{ExportSurface, Instance};
pub use crate::module::{CompiledCode, FunctionBodies, Module};
pub use crate::resolve::{ImportResolver, ModuleGraph, ModuleRecord, Resolution};
pub use crate::store::{AsContext, AsContextMut, Store};
pub use crate::trap::{Trap, TrapCode};
pub use crate::values::{ExternRef, Val};

pub use wasmlink_environ;
pub use wasmlink_environ::{
    ConstExpr, ConstOp, DataIndex, DefinedFuncIndex, ElemIndex, EntityIndex, EntityRef, FuncIndex,
    Global as GlobalType, GlobalBinding, GlobalIndex, InitExpr, Memory as MemoryType,
    MemoryIndex, ModuleBuilder, ModuleInformation, SegmentElements, Table as TableType,
    TableIndex, TableInitialValue, Tag as TagType, TagIndex, TypeIndex, WasmFuncType,
    WasmHeapType, WasmRefType, WasmSubType, WasmValType,
};
