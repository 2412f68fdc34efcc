//! Application of active element and data segments.

use crate::const_expr::{ConstEvalContext, ConstExprEvaluator};
use crate::{Instance, InstantiationError, RuntimeError, Store, Table, TrapCode, Val};
use wasmlink_environ::{
    DataIndex, DataSegmentKind, ElemIndex, ElementSegmentKind, SegmentElements,
};

/// Writes every active element segment, then every active data segment.
///
/// Each of the two passes first checks all of its segments against the
/// current size of their target and writes nothing if any of them doesn't
/// fit. A failing data pass leaves the element writes in place.
pub(super) fn apply_segments(
    store: &mut Store,
    instance: Instance,
) -> Result<(), InstantiationError> {
    let mut evaluator = ConstExprEvaluator::default();
    let mut context = ConstEvalContext::new(instance);
    apply_elements(store, instance, &mut evaluator, &mut context)?;
    apply_data(store, instance, &mut evaluator, &mut context)?;
    Ok(())
}

struct ActiveElements {
    segment: ElemIndex,
    table: Table,
    offset: u32,
    vals: Vec<Val>,
}

fn apply_elements(
    store: &mut Store,
    instance: Instance,
    evaluator: &mut ConstExprEvaluator,
    context: &mut ConstEvalContext,
) -> Result<(), RuntimeError> {
    let module = store[instance.0].module.clone();
    let info = module.info();
    log::debug!("applying {} element segments", info.element_segments.len());

    // Offsets and items are all evaluated before the first write.
    let mut active = Vec::new();
    for (segment, elements) in info.element_segments.iter() {
        let ElementSegmentKind::Active {
            table_index,
            offset,
        } = &elements.kind
        else {
            continue;
        };
        let offset = evaluator
            .eval_offset(store, context, offset)
            .map_err(|e| RuntimeError::const_expr(&e))?;
        let table = instance.table(&*store, *table_index);
        let len = elements.elements.len() as u64;
        let size = table.size(&*store);
        if u64::from(offset) + len > u64::from(size) {
            return Err(RuntimeError::with_trap(
                format!(
                    "Element segment {} is trying to set an out of bounds table index \
                     (offset {offset}, length {len}, table size {size})",
                    segment.as_u32()
                ),
                TrapCode::TableOutOfBounds,
            ));
        }
        let null = Val::null_ref(table.ty(&*store).wasm_ty);
        let vals = match &elements.elements {
            SegmentElements::Functions(funcs) => funcs
                .iter()
                .map(|f| Val::FuncRef(Some(instance.func(&mut *store, *f))))
                .collect::<Vec<_>>(),
            SegmentElements::Expressions(exprs) => {
                let mut vals = Vec::with_capacity(exprs.len());
                for expr in exprs.iter() {
                    let val = evaluator
                        .eval_init(store, context, expr)
                        .map_err(|e| RuntimeError::const_expr(&e))?;
                    vals.push(if val.is_null() { null.clone() } else { val });
                }
                vals
            }
        };
        active.push(ActiveElements {
            segment,
            table,
            offset,
            vals,
        });
    }

    for ActiveElements {
        segment,
        table,
        offset,
        vals,
    } in active
    {
        log::trace!(
            "writing {} elements of segment {} at offset {offset}",
            vals.len(),
            segment.as_u32()
        );
        table.write_validated(&mut *store, offset, vals);
    }
    Ok(())
}

fn apply_data(
    store: &mut Store,
    instance: Instance,
    evaluator: &mut ConstExprEvaluator,
    context: &mut ConstEvalContext,
) -> Result<(), RuntimeError> {
    let module = store[instance.0].module.clone();
    let info = module.info();
    log::debug!("applying {} data segments", info.data_segments.len());
    let memory = instance.memory(&*store);
    let memory_size = memory.map_or(0, |m| m.data_size(&*store) as u64);

    let mut active: Vec<(DataIndex, u32)> = Vec::new();
    for (segment, data) in info.data_segments.iter() {
        let DataSegmentKind::Active { offset } = &data.kind else {
            continue;
        };
        let offset = evaluator
            .eval_offset(store, context, offset)
            .map_err(|e| RuntimeError::const_expr(&e))?;
        let len = data.data.len() as u64;
        let fail = |reason: &str| {
            RuntimeError::with_trap(
                format!(
                    "Invalid data segment {} initialization: segment of {len} bytes memory of \
                     {memory_size} bytes, at offset {offset}, {reason}",
                    segment.as_u32()
                ),
                TrapCode::MemoryOutOfBounds,
            )
        };
        if memory_size < len {
            return Err(fail("segment is too big"));
        }
        if u64::from(offset) > memory_size - len {
            return Err(fail("segment writes outside of memory"));
        }
        active.push((segment, offset));
    }

    for (segment, offset) in active {
        let bytes = &info.data_segments[segment].data;
        if bytes.is_empty() {
            continue;
        }
        let Some(memory) = memory else {
            panic!("non-empty data segment {} without a memory", segment.as_u32());
        };
        log::trace!(
            "writing {} bytes of data segment {} at offset {offset}",
            bytes.len(),
            segment.as_u32()
        );
        let start = offset as usize;
        memory.data_mut(store)[start..start + bytes.len()].copy_from_slice(bytes);
    }
    Ok(())
}
