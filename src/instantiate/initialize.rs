//! Creation of module-defined entities and of the export surface.

use crate::const_expr::{ConstEvalContext, ConstExprEvaluator};
use crate::instance::{GlobalSlot, freeze_exports};
use crate::{
    Extern, Global, Instance, InstantiationError, LinkError, Memory, RuntimeError, Store, Table,
    Tag, Val,
};
use indexmap::IndexMap;
use wasmlink_environ::{EntityIndex, GlobalBinding, TableInitialValue, WasmValType};

pub(super) fn initialize(store: &mut Store, instance: Instance) -> Result<(), InstantiationError> {
    let module = store[instance.0].module.clone();
    let info = module.info();
    log::debug!("initializing instance of module {:?}", module.name());

    // Memory first: the code of every function created below depends on the
    // memory's mode.
    if let Some(ty) = info.memory {
        let memory = if info.is_imported_memory() {
            match store[instance.0].memory {
                Some(memory) => memory,
                None => panic!("imported memory was not linked"),
            }
        } else {
            Memory::new(&mut *store, ty).map_err(|e| {
                log::debug!("failed to create memory: {e:#}");
                LinkError("couldn't create Memory".to_string())
            })?
        };
        let mode = memory.mode(&*store);
        module
            .ensure_runnable(mode)
            .map_err(|e| LinkError(format!("{e:#}")))?;
        let data = &mut store[instance.0];
        data.memory = Some(memory);
        data.memory_mode = mode;
    }

    for (index, ty) in info.tags.iter().skip(info.num_imported_tags) {
        let tag = Tag::new(&mut *store, *ty)
            .map_err(|e| LinkError(format!("couldn't create Tag: {e:#}")))?;
        let pushed = store[instance.0].tags.push(tag);
        debug_assert_eq!(pushed, index);
    }

    let mut evaluator = ConstExprEvaluator::default();
    let mut context = ConstEvalContext::new(instance);

    for (defined, init) in info.table_initialization.iter() {
        let index = info.table_index(defined);
        let ty = info.tables[index];
        let null = Val::null_ref(ty.wasm_ty);
        // Non-nullable tables never hold null, so the initial value is known
        // before the table is allocated.
        let init = match init {
            TableInitialValue::Default => null,
            TableInitialValue::Expr(expr) => {
                let val = evaluator
                    .eval_init(store, &mut context, expr)
                    .map_err(|e| RuntimeError::const_expr(&e))?;
                let val = if val.is_null() { null } else { val };
                if !val.matches_ty(&*store, WasmValType::Ref(ty.wasm_ty)) {
                    log::debug!(
                        "initial value of table {} doesn't match {}",
                        index.as_u32(),
                        ty.wasm_ty
                    );
                    return Err(LinkError("failed to initialize Table".to_string()).into());
                }
                val
            }
        };
        let table = Table::new(&mut *store, ty, init).map_err(|e| {
            log::debug!("failed to create table {}: {e:#}", index.as_u32());
            LinkError("couldn't create Table".to_string())
        })?;
        let pushed = store[instance.0].tables.push(table);
        debug_assert_eq!(pushed, index);
    }

    for (defined, init) in info.global_initializers.iter() {
        let index = info.global_index(defined);
        let ty = info.globals[index];
        let val = evaluator
            .eval_init(store, &mut context, init)
            .map_err(|e| RuntimeError::const_expr(&e))?;

        let slot = match info.global_bindings[index] {
            GlobalBinding::Embedded => GlobalSlot::Inline(val),
            GlobalBinding::Portable => {
                assert!(ty.mutability, "portable binding of immutable global");
                let global = if ty.wasm_ty.ref_type().is_some() {
                    // Allocate first, then store the reference.
                    let global = Global::placeholder(&mut *store, ty);
                    global.set(&mut *store, val).map(|()| global)
                } else {
                    Global::new(&mut *store, ty, val)
                }
                .map_err(|e| {
                    log::debug!("failed to create global {}: {e:#}", index.as_u32());
                    LinkError("couldn't create Global".to_string())
                })?;
                GlobalSlot::Shared(global)
            }
        };
        log::trace!("initialized global {}", index.as_u32());
        let pushed = store[instance.0].globals.push(slot);
        debug_assert_eq!(pushed, index);
    }

    let mut exports = IndexMap::with_capacity(info.exports.len());
    for (name, index) in info.exports.iter() {
        let export = match *index {
            EntityIndex::Function(f) => Extern::Func(instance.func(&mut *store, f)),
            EntityIndex::Table(t) => Extern::Table(instance.table(&*store, t)),
            EntityIndex::Memory(_) => match instance.memory(&*store) {
                Some(memory) => Extern::Memory(memory),
                None => panic!("export `{name}` names a memory the module doesn't have"),
            },
            EntityIndex::Global(g) => match &store[instance.0].globals[g] {
                GlobalSlot::Shared(global) => Extern::Global(*global),
                // Embedded globals are exported as a detached snapshot.
                GlobalSlot::Inline(val) => {
                    let val = val.clone();
                    let global = Global::new(&mut *store, info.globals[g], val).map_err(|e| {
                        log::debug!("failed to export global {}: {e:#}", g.as_u32());
                        LinkError("couldn't create Global".to_string())
                    })?;
                    Extern::Global(global)
                }
            },
            EntityIndex::Tag(t) => Extern::Tag(instance.tag(&*store, t)),
        };
        exports.insert(name.clone(), export);
    }
    store[instance.0].exports = freeze_exports(exports);

    if let Some(start) = info.start_func {
        let func = instance.func(&mut *store, start);
        store[instance.0].start = Some(func);
    }

    Ok(())
}
