//! Resolution and checking of imports.

use crate::func::FuncKind;
use crate::instance::{FunctionImport, GlobalSlot, ImportCallee, InstanceData};
use crate::matching::MatchCx;
use crate::resolve::ImportResolver;
use crate::{
    ExternRef, Func, HostValue, InstantiationError, LinkError, Module, Store, TypeError, Val,
    to_big_int64, to_f32, to_int32,
};
use wasmlink_environ::{
    EntityIndex, FuncIndex, Global as GlobalType, Import, ModuleInformation, WasmHeapTopType,
    WasmHeapType, WasmRefType, WasmValType,
};

/// Resolves every import of `module` in declaration order and returns the
/// instance state holding them.
///
/// Nothing is inserted into `store`: a failure here leaves no trace of the
/// instantiation behind.
pub(super) fn link(
    store: &Store,
    module: &Module,
    resolver: &dyn ImportResolver,
) -> Result<InstanceData, InstantiationError> {
    let info = module.info();
    let mut data = InstanceData::new(module);
    log::debug!("linking {} imports", info.imports.len());

    for import in info.imports.iter() {
        let value = resolver.resolve(store, import)?;
        log::trace!(
            "linking {} import {}:{} to {value:?}",
            import.index.desc(),
            import.module,
            import.field
        );

        match import.index {
            EntityIndex::Function(index) => {
                let slot = link_function(store, info, import, index, &value)?;
                let pushed = data.imported_functions.push(slot);
                debug_assert_eq!(pushed, index);
            }
            EntityIndex::Global(index) => {
                let ty = info.globals[index];
                let slot = if ty.mutability {
                    link_mutable_global(store, import, &ty, &value)?
                } else {
                    GlobalSlot::Inline(link_immutable_global(store, import, &ty, &value)?)
                };
                let pushed = data.globals.push(slot);
                debug_assert_eq!(pushed, index);
            }
            EntityIndex::Table(index) => {
                let Some(table) = value.as_table() else {
                    return Err(LinkError::import(import, "Table import", "is not a Table").into());
                };
                same_store(import, "Table import", table.comes_from_same_store(store))?;
                MatchCx::new(store)
                    .table(&info.tables[index], table)
                    .map_err(|e| LinkError::import(import, "Table import", &e.to_string()))?;
                let pushed = data.tables.push(table);
                debug_assert_eq!(pushed, index);
            }
            EntityIndex::Memory(_) => {
                let Some(memory) = value.as_memory() else {
                    return Err(
                        LinkError::import(import, "Memory import", "is not a Memory").into(),
                    );
                };
                same_store(import, "Memory import", memory.comes_from_same_store(store))?;
                let Some(ty) = info.memory else {
                    panic!("memory import without a declared memory");
                };
                MatchCx::new(store)
                    .memory(&ty, memory)
                    .map_err(|e| LinkError::import(import, "Memory import", &e.to_string()))?;
                data.memory = Some(memory);
                data.memory_mode = memory.mode(store);
            }
            EntityIndex::Tag(index) => {
                let Some(tag) = value.as_tag() else {
                    return Err(LinkError::import(import, "Tag import", "is not a Tag").into());
                };
                same_store(import, "Tag import", tag.comes_from_same_store(store))?;
                MatchCx::new(store)
                    .tag(info.tags[index].ty, tag)
                    .map_err(|e| LinkError::import(import, "imported Tag", &e.to_string()))?;
                let pushed = data.tags.push(tag);
                debug_assert_eq!(pushed, index);
            }
        }
    }

    Ok(data)
}

fn link_function(
    store: &Store,
    info: &ModuleInformation,
    import: &Import,
    index: FuncIndex,
    value: &HostValue,
) -> Result<FunctionImport, InstantiationError> {
    let Some(func) = value.as_func() else {
        return Err(TypeError::import(import, "import function", "must be callable").into());
    };
    same_store(import, "import function", func.comes_from_same_store(store))?;

    let type_index = info.functions[index];
    let callee = match func.kind(store) {
        FuncKind::Host(_) => ImportCallee::Host(func),
        FuncKind::Exported {
            instance,
            type_index: actual,
            body,
            ..
        } => {
            MatchCx::new(store)
                .func(type_index, *actual)
                .map_err(|e| LinkError::import(import, "imported function", &e.to_string()))?;
            ImportCallee::Wasm {
                instance: *instance,
                body: body.clone(),
            }
        }
        // Calls go through the wrapper so results are checked against the
        // wrapper's signature.
        FuncKind::Wrapper {
            type_index: actual, ..
        } => {
            MatchCx::new(store)
                .func(type_index, *actual)
                .map_err(|e| LinkError::import(import, "imported function", &e.to_string()))?;
            ImportCallee::Host(func)
        }
    };

    Ok(FunctionImport {
        func,
        type_index,
        callee,
    })
}

/// An immutable global is satisfied either by a global object, whose current
/// value is copied, or by a bare host value converted to the declared type.
fn link_immutable_global(
    store: &Store,
    import: &Import,
    ty: &GlobalType,
    value: &HostValue,
) -> Result<Val, InstantiationError> {
    if let Some(global) = value.as_global() {
        same_store(import, "imported global", global.comes_from_same_store(store))?;
        MatchCx::new(store)
            .immutable_global(ty, &global.ty(store))
            .map_err(|e| global_error(import, &e.to_string()))?;
        let val = global.get(store);
        if let WasmValType::Ref(r) = ty.wasm_ty {
            match r.heap_type.top() {
                WasmHeapTopType::Extern if !r.nullable && val.is_null() => {
                    return Err(global_error(import, "non-null externref cannot be null"));
                }
                WasmHeapTopType::Func => check_funcref(store, import, r, val.unwrap_funcref())?,
                _ => {}
            }
        }
        return Ok(val);
    }

    match ty.wasm_ty {
        WasmValType::I32 => Ok(Val::I32(to_int32(number(import, value)?))),
        WasmValType::I64 => match value.as_big_int() {
            Some(n) => Ok(Val::I64(to_big_int64(n))),
            None => Err(global_error(import, "must be a BigInt")),
        },
        WasmValType::F32 => Ok(Val::F32(to_f32(number(import, value)?).to_bits())),
        WasmValType::F64 => Ok(Val::F64(number(import, value)?.to_bits())),
        WasmValType::V128 => Err(global_error(import, "cannot be v128")),
        WasmValType::Ref(r) => match r.heap_type.top() {
            WasmHeapTopType::Extern => {
                if value.is_null() {
                    if !r.nullable {
                        return Err(global_error(import, "must be a non-null value"));
                    }
                    return Ok(Val::ExternRef(None));
                }
                if r.heap_type == WasmHeapType::NoExtern {
                    return Err(global_error(
                        import,
                        "Argument value did not match the reference type",
                    ));
                }
                Ok(Val::ExternRef(Some(ExternRef::new(value.clone()))))
            }
            WasmHeapTopType::Func => {
                let func = match value {
                    HostValue::Null => None,
                    HostValue::Function(f) => {
                        same_store(import, "imported global", f.comes_from_same_store(store))?;
                        Some(*f)
                    }
                    _ => return Err(global_error(import, funcref_message(&r))),
                };
                check_funcref(store, import, r, func.as_ref())?;
                Ok(Val::FuncRef(func))
            }
            WasmHeapTopType::Exn => Err(global_error(import, "cannot be exnref")),
        },
    }
}

/// A mutable global is shared with the provider, so only a global object of
/// an equivalent type will do.
fn link_mutable_global(
    store: &Store,
    import: &Import,
    ty: &GlobalType,
    value: &HostValue,
) -> Result<GlobalSlot, InstantiationError> {
    let Some(global) = value.as_global() else {
        return Err(global_error(import, "must be a Global since it is mutable"));
    };
    same_store(import, "imported global", global.comes_from_same_store(store))?;
    MatchCx::new(store)
        .mutable_global(ty, &global.ty(store))
        .map_err(|e| global_error(import, &e.to_string()))?;
    Ok(GlobalSlot::Shared(global))
}

/// Function references stored in globals must be module functions, of exactly
/// the declared signature when one is named.
fn check_funcref(
    store: &Store,
    import: &Import,
    ty: WasmRefType,
    func: Option<&Func>,
) -> Result<(), InstantiationError> {
    let Some(func) = func else {
        return if ty.nullable {
            Ok(())
        } else {
            Err(global_error(import, funcref_message(&ty)))
        };
    };
    if !func.is_module_function(store) {
        return Err(global_error(import, funcref_message(&ty)));
    }
    let matches = match ty.heap_type {
        WasmHeapType::ConcreteFunc(expected) => func.type_index(store) == Some(expected),
        WasmHeapType::NoFunc => false,
        _ => true,
    };
    if !matches {
        return Err(global_error(
            import,
            "Argument value did not match the reference type",
        ));
    }
    Ok(())
}

fn funcref_message(ty: &WasmRefType) -> &'static str {
    if ty.nullable {
        "must be a wasm exported function or null"
    } else {
        "must be a wasm exported function"
    }
}

fn number(import: &Import, value: &HostValue) -> Result<f64, InstantiationError> {
    value
        .as_number()
        .ok_or_else(|| global_error(import, "must be a number"))
}

fn global_error(import: &Import, reason: &str) -> InstantiationError {
    LinkError::import(import, "imported global", reason).into()
}

fn same_store(import: &Import, what: &str, same: bool) -> Result<(), InstantiationError> {
    if same {
        Ok(())
    } else {
        Err(LinkError::import(import, what, "must belong to the same store").into())
    }
}
