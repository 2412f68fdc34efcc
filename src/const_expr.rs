//! Evaluation of constant expressions against a partially built instance.

use crate::{Instance, Store, Val};
use anyhow::{Result, anyhow, bail};
use smallvec::SmallVec;
use wasmlink_environ::{ConstExpr, ConstOp, FuncIndex, GlobalIndex, InitExpr};

/// Simple interpreter for constant expressions.
#[derive(Default)]
pub(crate) struct ConstExprEvaluator {
    stack: SmallVec<[Val; 2]>,
}

/// The instance constant expressions of a module are evaluated in.
pub(crate) struct ConstEvalContext {
    pub(crate) instance: Instance,
}

impl ConstEvalContext {
    pub(crate) fn new(instance: Instance) -> Self {
        Self { instance }
    }

    fn global_get(&mut self, store: &mut Store, index: GlobalIndex) -> Result<Val> {
        if !store[self.instance.0].globals.is_valid(index) {
            bail!(
                "const expr evaluation error: global {} read before it was initialized",
                index.as_u32()
            );
        }
        Ok(self.instance.global_value(&*store, index))
    }

    fn ref_func(&mut self, store: &mut Store, index: FuncIndex) -> Result<Val> {
        Ok(self.instance.func(store, index).into())
    }
}

impl ConstExprEvaluator {
    /// Computes the value of an initializer.
    pub(crate) fn eval_init(
        &mut self,
        store: &mut Store,
        context: &mut ConstEvalContext,
        init: &InitExpr,
    ) -> Result<Val> {
        let val = match init {
            InitExpr::I32Const(i) => Val::I32(*i),
            InitExpr::I64Const(i) => Val::I64(*i),
            InitExpr::F32Const(f) => Val::F32(*f),
            InitExpr::F64Const(f) => Val::F64(*f),
            InitExpr::V128Const(v) => Val::V128(*v),
            InitExpr::RefNull(ty) => Val::null_ref(wasmlink_environ::WasmRefType {
                nullable: true,
                heap_type: *ty,
            }),
            InitExpr::GetGlobal(g) => context.global_get(store, *g)?,
            InitExpr::RefFunc(f) => context.ref_func(store, *f)?,
            InitExpr::Extended(index) => {
                let module = store[context.instance.0].module.clone();
                let Some(expr) = module.info().const_exprs.get(*index) else {
                    bail!(
                        "const expr evaluation error: unknown constant expression {}",
                        index.as_u32()
                    );
                };
                return self.eval(store, context, expr);
            }
        };
        log::trace!("initializer {init:?} evaluated to {val:?}");
        Ok(val)
    }

    /// Same as [`ConstExprEvaluator::eval_init`] but requires the result to
    /// be an `i32`, reinterpreted as an unsigned offset.
    pub(crate) fn eval_offset(
        &mut self,
        store: &mut Store,
        context: &mut ConstEvalContext,
        init: &InitExpr,
    ) -> Result<u32> {
        match self.eval_init(store, context, init)? {
            Val::I32(i) => Ok(i as u32),
            other => bail!("const expr evaluation error: expected an i32 offset, found {other:?}"),
        }
    }

    /// Evaluate the given const expression in the given context.
    pub(crate) fn eval(
        &mut self,
        store: &mut Store,
        context: &mut ConstEvalContext,
        expr: &ConstExpr,
    ) -> Result<Val> {
        log::trace!("evaluating const expr: {expr:?}");

        self.stack.clear();

        for op in expr.ops() {
            log::trace!("const-evaluating op: {op:?}");
            match op {
                ConstOp::I32Const(i) => self.stack.push(Val::I32(*i)),
                ConstOp::I64Const(i) => self.stack.push(Val::I64(*i)),
                ConstOp::F32Const(f) => self.stack.push(Val::F32(*f)),
                ConstOp::F64Const(f) => self.stack.push(Val::F64(*f)),
                ConstOp::V128Const(v) => self.stack.push(Val::V128(*v)),
                ConstOp::GlobalGet(g) => self.stack.push(context.global_get(store, *g)?),
                ConstOp::RefNull(ty) => self.stack.push(Val::null_ref(
                    wasmlink_environ::WasmRefType {
                        nullable: true,
                        heap_type: *ty,
                    },
                )),
                ConstOp::RefFunc(f) => self.stack.push(context.ref_func(store, *f)?),
                ConstOp::I32Add => {
                    let (a, b) = self.pop_i32_pair()?;
                    self.stack.push(Val::I32(a.wrapping_add(b)));
                }
                ConstOp::I32Sub => {
                    let (a, b) = self.pop_i32_pair()?;
                    self.stack.push(Val::I32(a.wrapping_sub(b)));
                }
                ConstOp::I32Mul => {
                    let (a, b) = self.pop_i32_pair()?;
                    self.stack.push(Val::I32(a.wrapping_mul(b)));
                }
                ConstOp::I64Add => {
                    let (a, b) = self.pop_i64_pair()?;
                    self.stack.push(Val::I64(a.wrapping_add(b)));
                }
                ConstOp::I64Sub => {
                    let (a, b) = self.pop_i64_pair()?;
                    self.stack.push(Val::I64(a.wrapping_sub(b)));
                }
                ConstOp::I64Mul => {
                    let (a, b) = self.pop_i64_pair()?;
                    self.stack.push(Val::I64(a.wrapping_mul(b)));
                }
            }
        }

        if self.stack.len() == 1 {
            let val = self.pop()?;
            log::trace!("const expr evaluated to {val:?}");
            Ok(val)
        } else {
            bail!(
                "const expr evaluation error: expected 1 resulting value, found {}",
                self.stack.len()
            )
        }
    }

    fn pop(&mut self) -> Result<Val> {
        self.stack.pop().ok_or_else(|| {
            anyhow!(
                "const expr evaluation error: attempted to pop from an empty \
                 evaluation stack"
            )
        })
    }

    fn pop_i32_pair(&mut self) -> Result<(i32, i32)> {
        let b = self.pop()?;
        let a = self.pop()?;
        match (a, b) {
            (Val::I32(a), Val::I32(b)) => Ok((a, b)),
            _ => bail!("const expr evaluation error: expected two i32 operands"),
        }
    }

    fn pop_i64_pair(&mut self) -> Result<(i64, i64)> {
        let b = self.pop()?;
        let a = self.pop()?;
        match (a, b) {
            (Val::I64(a), Val::I64(b)) => Ok((a, b)),
            _ => bail!("const expr evaluation error: expected two i64 operands"),
        }
    }
}
