use super::{env, instantiate_err, sig};
use anyhow::Result;
use std::cell::Cell;
use std::rc::Rc;
use wasmlink::*;

fn module_calling_import(engine: &Engine, ty: TypeIndex) -> Result<Module> {
    let mut builder = ModuleBuilder::new();
    let imported = builder.import_func("env", "f", ty);
    let caller = builder.define_func(ty);
    builder.export("f", imported).export("call_f", caller);
    let mut code = FunctionBodies::new();
    code.push(move |caller, args| caller.call(imported, args));
    Module::from_builder(engine, builder, code)
}

#[test]
fn host_function_imports_get_a_typed_wrapper() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let ty = sig(&engine, [WasmValType::I32], [WasmValType::I32]);
    let module = module_calling_import(&engine, ty)?;

    let mut store = Store::new(&engine);
    let host = Func::new(&mut store, |_, args| {
        Ok(vec![Val::I32(args[0].unwrap_i32() + 1)])
    });
    let instance = Instance::new(&mut store, &module, &env([("f", host.into())]))?;

    let wrapper = instance.get_func(&store, "f").unwrap();
    assert_ne!(wrapper, host);
    assert!(wrapper.is_module_function(&store));
    assert_eq!(wrapper.type_index(&store), Some(ty));
    assert_eq!(
        wrapper.origin(&store),
        Some((instance, FuncIndex::from_u32(0)))
    );

    let call_f = instance.get_func(&store, "call_f").unwrap();
    assert_eq!(call_f.call(&mut store, &[Val::I32(41)])?[0].unwrap_i32(), 42);

    // The wrapper checks what it is given against its signature.
    let err = wrapper.call(&mut store, &[Val::I64(1)]).unwrap_err();
    assert_eq!(err.trap_code(), Some(TrapCode::BadSignature));
    Ok(())
}

#[test]
fn module_functions_pass_through_with_their_identity() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let ty = sig(&engine, [], [WasmValType::I32]);

    let mut builder = ModuleBuilder::new();
    let f = builder.define_func(ty);
    builder.export("f", f);
    let mut code = FunctionBodies::new();
    code.push(|caller, _| {
        // Runs in the defining instance, whoever calls it.
        assert!(caller.instance().is_some());
        Ok(vec![Val::I32(7)])
    });
    let provider = Module::from_builder(&engine, builder, code)?;
    let consumer = module_calling_import(&engine, ty)?;

    let mut store = Store::new(&engine);
    let a = Instance::new(&mut store, &provider, &HostObject::new())?;
    let exported = a.get_func(&store, "f").unwrap();
    let b = Instance::new(&mut store, &consumer, &env([("f", exported.into())]))?;

    assert_eq!(b.get_func(&store, "f"), Some(exported));
    let call_f = b.get_func(&store, "call_f").unwrap();
    assert_eq!(call_f.call(&mut store, &[])?[0].unwrap_i32(), 7);
    Ok(())
}

#[test]
fn function_signatures_must_match() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let provided = sig(&engine, [], [WasmValType::I64]);
    let expected = sig(&engine, [], [WasmValType::I32]);

    let mut builder = ModuleBuilder::new();
    let f = builder.define_func(provided);
    builder.export("f", f);
    let mut code = FunctionBodies::new();
    code.push(|_, _| Ok(vec![Val::I64(0)]));
    let provider = Module::from_builder(&engine, builder, code)?;
    let consumer = module_calling_import(&engine, expected)?;

    let mut store = Store::new(&engine);
    let a = Instance::new(&mut store, &provider, &HostObject::new())?;
    let exported = a.get_func(&store, "f").unwrap();
    let err = instantiate_err(&mut store, &consumer, &env([("f", exported.into())]));
    assert!(err.as_link().is_some());
    assert_eq!(
        err.to_string(),
        "LinkError: imported function env:f signature doesn't match the provided WebAssembly function's signature"
    );
    Ok(())
}

#[test]
fn function_subtypes_are_accepted() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let base = engine.register_type(WasmSubType {
        is_final: false,
        supertype: None,
        composite_type: WasmFuncType::new([], []),
    })?;
    let sub = engine.register_type(WasmSubType {
        is_final: true,
        supertype: Some(base),
        composite_type: WasmFuncType::new([], []),
    })?;
    assert_ne!(base, sub);

    let mut builder = ModuleBuilder::new();
    let f = builder.define_func(sub);
    builder.export("f", f);
    let mut code = FunctionBodies::new();
    code.push(|_, _| Ok(vec![]));
    let provider = Module::from_builder(&engine, builder, code)?;

    let mut builder = ModuleBuilder::new();
    builder.import_func("env", "f", base);
    let consumer = Module::from_builder(&engine, builder, FunctionBodies::new())?;

    let mut store = Store::new(&engine);
    let a = Instance::new(&mut store, &provider, &HostObject::new())?;
    let exported = a.get_func(&store, "f").unwrap();
    Instance::new(&mut store, &consumer, &env([("f", exported.into())]))?;

    // The other direction is not a subtype.
    let mut builder = ModuleBuilder::new();
    let f = builder.define_func(base);
    builder.export("f", f);
    let mut code = FunctionBodies::new();
    code.push(|_, _| Ok(vec![]));
    let provider = Module::from_builder(&engine, builder, code)?;
    let mut builder = ModuleBuilder::new();
    builder.import_func("env", "f", sub);
    let consumer = Module::from_builder(&engine, builder, FunctionBodies::new())?;

    let a = Instance::new(&mut store, &provider, &HostObject::new())?;
    let exported = a.get_func(&store, "f").unwrap();
    let err = instantiate_err(&mut store, &consumer, &env([("f", exported.into())]));
    assert!(err.as_link().is_some(), "{err}");
    Ok(())
}

#[test]
fn function_imports_must_be_callable() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let ty = sig(&engine, [], []);
    let module = module_calling_import(&engine, ty)?;
    let mut store = Store::new(&engine);

    let err = instantiate_err(&mut store, &module, &env([("f", 1.0.into())]));
    assert!(err.as_type().is_some());
    assert_eq!(err.to_string(), "TypeError: import function env:f must be callable");

    let err = instantiate_err(&mut store, &module, &env([]));
    assert_eq!(err.to_string(), "TypeError: import function env:f must be callable");
    Ok(())
}

#[test]
fn namespaces_must_be_objects() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let ty = sig(&engine, [], []);
    let module = module_calling_import(&engine, ty)?;
    let mut store = Store::new(&engine);

    let imports = HostObject::new().with("env", "not an object");
    let err = instantiate_err(&mut store, &module, &imports);
    assert_eq!(err.to_string(), "TypeError: import env:f must be an object");

    let err = instantiate_err(&mut store, &module, &HostValue::Undefined);
    assert!(err.as_type().is_some());
    Ok(())
}

#[test]
fn link_failures_stop_before_any_other_phase() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let unit = sig(&engine, [], []);

    let mut builder = ModuleBuilder::new();
    let log = builder.import_func("env", "log", unit);
    builder.import_memory("env", "memory", super::memory_type(1, None));
    builder.import_global("env", "g", GlobalType::immutable(WasmValType::I32));
    builder.active_data(InitExpr::I32Const(0), vec![1, 2, 3]);
    builder.start(log);
    let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;

    let mut store = Store::new(&engine);
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let log = Func::new(&mut store, move |_, _| {
        counter.set(counter.get() + 1);
        Ok(vec![])
    });
    let memory = Memory::new(&mut store, super::memory_type(1, None))?;

    let imports = env([
        ("log", log.into()),
        ("memory", memory.into()),
        ("g", "oops".into()),
    ]);
    let err = instantiate_err(&mut store, &module, &imports);
    assert_eq!(err.to_string(), "LinkError: imported global env:g must be a number");
    assert_eq!(calls.get(), 0);
    assert!(memory.data(&store)[..3].iter().all(|b| *b == 0));

    let imports = env([
        ("log", log.into()),
        ("memory", memory.into()),
        ("g", 0.0.into()),
    ]);
    Instance::new(&mut store, &module, &imports)?;
    assert_eq!(calls.get(), 1);
    assert_eq!(&memory.data(&store)[..3], &[1, 2, 3]);
    Ok(())
}

#[test]
fn imports_are_checked_in_declaration_order() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let mut builder = ModuleBuilder::new();
    builder.import_global("env", "a", GlobalType::immutable(WasmValType::I32));
    builder.import_table("env", "b", super::funcref_table(1, None));
    let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;

    let mut store = Store::new(&engine);
    let err = instantiate_err(&mut store, &module, &env([]));
    assert_eq!(err.to_string(), "LinkError: imported global env:a must be a number");
    let err = instantiate_err(&mut store, &module, &env([("a", 1.0.into())]));
    assert_eq!(err.to_string(), "LinkError: Table import env:b is not a Table");
    Ok(())
}

#[test]
fn objects_of_other_stores_and_engines_are_rejected() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let ty = sig(&engine, [], []);
    let module = module_calling_import(&engine, ty)?;

    let mut other = Store::new(&engine);
    let foreign = Func::new(&mut other, |_, _| Ok(vec![]));
    let mut store = Store::new(&engine);
    let err = instantiate_err(&mut store, &module, &env([("f", foreign.into())]));
    assert_eq!(
        err.to_string(),
        "LinkError: import function env:f must belong to the same store"
    );

    let mut store = Store::new(&Engine::default());
    let local = Func::new(&mut store, |_, _| Ok(vec![]));
    let err = instantiate_err(&mut store, &module, &env([("f", local.into())]));
    assert!(err.as_type().is_some(), "{err}");
    Ok(())
}
