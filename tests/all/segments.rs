use super::{env, funcref_table, instantiate_err, memory_type, sig};
use anyhow::Result;
use wasmlink::*;

#[test]
fn element_segments_write_functions() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let unit = sig(&engine, [], []);

    let mut builder = ModuleBuilder::new();
    let f = builder.define_func(unit);
    let g = builder.define_func(unit);
    let t = builder.define_table(funcref_table(4, None), TableInitialValue::Default);
    builder.active_elements(
        t,
        InitExpr::I32Const(1),
        SegmentElements::Functions(vec![f, g].into()),
    );
    builder.active_elements(
        t,
        InitExpr::I32Const(3),
        SegmentElements::Expressions(vec![InitExpr::RefNull(WasmHeapType::NoFunc)].into()),
    );
    builder.passive_elements(SegmentElements::Functions(vec![g].into()));
    builder.export("t", t).export("f", f).export("g", g);
    let mut code = FunctionBodies::new();
    code.push(|_, _| Ok(vec![]));
    code.push(|_, _| Ok(vec![]));
    let module = Module::from_builder(&engine, builder, code)?;

    let mut store = Store::new(&engine);
    let instance = Instance::new(&mut store, &module, &HostObject::new())?;
    let table = instance.get_table(&store, "t").unwrap();
    let f = instance.get_func(&store, "f").unwrap();
    let g = instance.get_func(&store, "g").unwrap();

    assert!(table.get(&store, 0).unwrap().is_null());
    assert_eq!(table.get(&store, 1).unwrap().unwrap_funcref(), Some(&f));
    assert_eq!(table.get(&store, 2).unwrap().unwrap_funcref(), Some(&g));
    // Null items take the table's own null.
    assert!(matches!(table.get(&store, 3), Some(Val::FuncRef(None))));
    Ok(())
}

#[test]
fn out_of_bounds_elements_write_nothing() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let unit = sig(&engine, [], []);

    let mut builder = ModuleBuilder::new();
    let t = builder.import_table("env", "t", funcref_table(2, None));
    let f = builder.define_func(unit);
    builder.active_elements(t, InitExpr::I32Const(0), SegmentElements::Functions(vec![f].into()));
    builder.active_elements(
        t,
        InitExpr::I32Const(1),
        SegmentElements::Functions(vec![f, f].into()),
    );
    let mut code = FunctionBodies::new();
    code.push(|_, _| Ok(vec![]));
    let module = Module::from_builder(&engine, builder, code)?;

    let mut store = Store::new(&engine);
    let table = Table::new(&mut store, funcref_table(2, None), Val::FuncRef(None))?;
    let err = instantiate_err(&mut store, &module, &env([("t", table.into())]));
    assert_eq!(
        err.to_string(),
        "RuntimeError: Element segment 1 is trying to set an out of bounds table index \
         (offset 1, length 2, table size 2)"
    );
    assert_eq!(
        err.as_runtime().and_then(RuntimeError::trap_code),
        Some(TrapCode::TableOutOfBounds)
    );
    assert!(table.get(&store, 0).unwrap().is_null());

    // The same module fits once the table has grown.
    table.grow(&mut store, 1, Val::FuncRef(None))?;
    Instance::new(&mut store, &module, &env([("t", table.into())]))?;
    assert!(!table.get(&store, 2).unwrap().is_null());
    Ok(())
}

#[test]
fn data_segments_are_copied_into_memory() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();

    let mut builder = ModuleBuilder::new();
    let m = builder.define_memory(memory_type(1, None));
    builder.active_data(InitExpr::I32Const(8), b"hello".to_vec());
    builder.passive_data(b"ignored".to_vec());
    builder.active_data(InitExpr::I32Const(10), b"LLO!".to_vec());
    builder.export("memory", m);
    let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;

    let mut store = Store::new(&engine);
    let instance = Instance::new(&mut store, &module, &HostObject::new())?;
    let memory = instance.get_memory(&store, "memory").unwrap();
    // Later segments overwrite earlier ones.
    assert_eq!(&memory.data(&store)[8..14], b"heLLO!");
    assert_eq!(memory.data(&store)[14], 0);
    Ok(())
}

#[test]
fn out_of_bounds_data_reports_the_segment() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();

    let mut builder = ModuleBuilder::new();
    builder.import_memory("env", "memory", memory_type(1, None));
    builder.active_data(InitExpr::I32Const(0), vec![1; 4]);
    builder.active_data(InitExpr::I32Const(65530), vec![2; 10]);
    let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;

    let mut store = Store::new(&engine);
    let memory = Memory::new(&mut store, memory_type(1, None))?;
    let err = instantiate_err(&mut store, &module, &env([("memory", memory.into())]));
    assert_eq!(
        err.to_string(),
        "RuntimeError: Invalid data segment 1 initialization: segment of 10 bytes memory of \
         65536 bytes, at offset 65530, segment writes outside of memory"
    );
    assert_eq!(
        err.as_runtime().and_then(RuntimeError::trap_code),
        Some(TrapCode::MemoryOutOfBounds)
    );
    assert!(memory.data(&store)[..4].iter().all(|b| *b == 0));
    Ok(())
}

#[test]
fn segments_larger_than_memory_are_too_big() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();

    let mut builder = ModuleBuilder::new();
    builder.define_memory(memory_type(0, None));
    builder.active_data(InitExpr::I32Const(0), vec![0; 1]);
    let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;

    let mut store = Store::new(&engine);
    let err = instantiate_err(&mut store, &module, &HostObject::new());
    assert_eq!(
        err.to_string(),
        "RuntimeError: Invalid data segment 0 initialization: segment of 1 bytes memory of \
         0 bytes, at offset 0, segment is too big"
    );
    Ok(())
}

#[test]
fn empty_segments_are_still_bounds_checked() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();

    let mut builder = ModuleBuilder::new();
    let t = builder.define_table(funcref_table(1, None), TableInitialValue::Default);
    builder.active_elements(t, InitExpr::I32Const(1), SegmentElements::Functions(vec![].into()));
    builder.active_data(InitExpr::I32Const(0), Vec::new());
    let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;
    let mut store = Store::new(&engine);
    Instance::new(&mut store, &module, &HostObject::new())?;

    let mut builder = ModuleBuilder::new();
    let t = builder.define_table(funcref_table(1, None), TableInitialValue::Default);
    builder.active_elements(t, InitExpr::I32Const(2), SegmentElements::Functions(vec![].into()));
    let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;
    let err = instantiate_err(&mut store, &module, &HostObject::new());
    assert_eq!(
        err.as_runtime().and_then(RuntimeError::trap_code),
        Some(TrapCode::TableOutOfBounds)
    );

    let mut builder = ModuleBuilder::new();
    builder.active_data(InitExpr::I32Const(1), Vec::new());
    let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;
    let err = instantiate_err(&mut store, &module, &HostObject::new());
    assert_eq!(
        err.to_string(),
        "RuntimeError: Invalid data segment 0 initialization: segment of 0 bytes memory of \
         0 bytes, at offset 1, segment writes outside of memory"
    );
    Ok(())
}

#[test]
fn element_writes_survive_a_failing_data_segment() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let unit = sig(&engine, [], []);

    let mut builder = ModuleBuilder::new();
    let t = builder.import_table("env", "t", funcref_table(1, None));
    builder.import_memory("env", "memory", memory_type(1, None));
    let f = builder.define_func(unit);
    builder.active_elements(t, InitExpr::I32Const(0), SegmentElements::Functions(vec![f].into()));
    builder.active_data(InitExpr::I32Const(65536), vec![1]);
    let mut code = FunctionBodies::new();
    code.push(|_, _| Ok(vec![]));
    let module = Module::from_builder(&engine, builder, code)?;

    let mut store = Store::new(&engine);
    let table = Table::new(&mut store, funcref_table(1, None), Val::FuncRef(None))?;
    let memory = Memory::new(&mut store, memory_type(1, None))?;
    let imports = env([("t", table.into()), ("memory", memory.into())]);
    let err = instantiate_err(&mut store, &module, &imports);
    assert!(err.as_runtime().is_some());

    // The function written by the failed instantiation is still callable.
    let written = table.get(&store, 0).unwrap();
    let func = *written.unwrap_funcref().unwrap();
    assert!(func.call(&mut store, &[])?.is_empty());
    Ok(())
}

#[test]
fn offsets_can_come_from_imported_globals() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();

    let mut builder = ModuleBuilder::new();
    let base = builder.import_global("env", "base", GlobalType::immutable(WasmValType::I32));
    let m = builder.define_memory(memory_type(1, None));
    let end = builder.const_expr(ConstExpr::new([
        ConstOp::GlobalGet(base),
        ConstOp::I32Const(2),
        ConstOp::I32Add,
    ]));
    builder.active_data(InitExpr::GetGlobal(base), vec![7, 7]);
    builder.active_data(InitExpr::Extended(end), vec![9]);
    builder.export("memory", m);
    let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;

    let mut store = Store::new(&engine);
    let instance = Instance::new(&mut store, &module, &env([("base", 100.0.into())]))?;
    let memory = instance.get_memory(&store, "memory").unwrap();
    assert_eq!(&memory.data(&store)[100..103], &[7, 7, 9]);

    // Offsets are unsigned.
    let err = instantiate_err(&mut store, &module, &env([("base", (-1.0).into())]));
    assert!(err.to_string().contains("at offset 4294967295"), "{err}");
    Ok(())
}

#[test]
fn failing_element_items_write_nothing() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let unit = sig(&engine, [], []);

    let mut builder = ModuleBuilder::new();
    let t = builder.import_table("env", "t", funcref_table(2, None));
    let f = builder.define_func(unit);
    let broken = builder.const_expr(ConstExpr::new([ConstOp::I32Add]));
    builder.active_elements(t, InitExpr::I32Const(0), SegmentElements::Functions(vec![f].into()));
    builder.active_elements(
        t,
        InitExpr::I32Const(1),
        SegmentElements::Expressions(vec![InitExpr::Extended(broken)].into()),
    );
    let mut code = FunctionBodies::new();
    code.push(|_, _| Ok(vec![]));
    let module = Module::from_builder(&engine, builder, code)?;

    let mut store = Store::new(&engine);
    let table = Table::new(&mut store, funcref_table(2, None), Val::FuncRef(None))?;
    let err = instantiate_err(&mut store, &module, &env([("t", table.into())]));
    assert!(
        err.to_string()
            .starts_with("RuntimeError: couldn't evaluate constant expression:"),
        "{err}"
    );
    assert!(table.get(&store, 0).unwrap().is_null());
    assert!(table.get(&store, 1).unwrap().is_null());
    Ok(())
}
