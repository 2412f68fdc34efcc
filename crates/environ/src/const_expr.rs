use crate::{ConstExprIndex, FuncIndex, GlobalIndex, WasmHeapType};
use serde_derive::{Deserialize, Serialize};
use smallvec::SmallVec;

/// An extended constant expression.
///
/// These are used to initialize globals, table elements, etc...
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ConstExpr {
    ops: SmallVec<[ConstOp; 2]>,
}

impl ConstExpr {
    /// Create a new const expression from the given opcodes.
    ///
    /// Does not do any validation that the const expression is well-typed.
    ///
    /// Panics if given zero opcodes.
    pub fn new(ops: impl IntoIterator<Item = ConstOp>) -> Self {
        let ops = ops.into_iter().collect::<SmallVec<[ConstOp; 2]>>();
        assert!(!ops.is_empty());
        ConstExpr { ops }
    }

    /// Get the opcodes that make up this const expression.
    pub fn ops(&self) -> &[ConstOp] {
        &self.ops
    }

    /// Iterate over the functions this expression takes a reference to.
    pub fn referenced_funcs(&self) -> impl Iterator<Item = FuncIndex> + '_ {
        self.ops.iter().filter_map(|op| match op {
            ConstOp::RefFunc(f) => Some(*f),
            _ => None,
        })
    }

    /// Iterate over the globals this expression reads.
    pub fn referenced_globals(&self) -> impl Iterator<Item = GlobalIndex> + '_ {
        self.ops.iter().filter_map(|op| match op {
            ConstOp::GlobalGet(g) => Some(*g),
            _ => None,
        })
    }
}

/// The subset of Wasm opcodes that are constant.
#[allow(missing_docs, reason = "self-describing opcodes")]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ConstOp {
    I32Const(i32),
    I64Const(i64),
    F32Const(u32),
    F64Const(u64),
    V128Const(u128),
    GlobalGet(GlobalIndex),
    RefNull(WasmHeapType),
    RefFunc(FuncIndex),
    I32Add,
    I32Sub,
    I32Mul,
    I64Add,
    I64Sub,
    I64Mul,
}

/// How the initial value of a global, a table, or a segment offset is
/// computed.
///
/// The common single-instruction shapes are spelled out directly; anything
/// longer lives in the module's constant expression table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum InitExpr {
    /// An `i32.const`.
    I32Const(i32),
    /// An `i64.const`.
    I64Const(i64),
    /// An `f32.const`, as raw bits.
    F32Const(u32),
    /// An `f64.const`, as raw bits.
    F64Const(u64),
    /// A `v128.const`.
    V128Const(u128),
    /// A `ref.null` of the given heap type.
    RefNull(WasmHeapType),
    /// A copy of the current value of a global.
    GetGlobal(GlobalIndex),
    /// A `ref.func`.
    RefFunc(FuncIndex),
    /// An extended constant expression.
    Extended(ConstExprIndex),
}
