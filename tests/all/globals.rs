use super::{env, instantiate_err, sig};
use anyhow::Result;
use wasmlink::*;

fn importing_global(engine: &Engine, ty: GlobalType) -> Result<Module> {
    let mut builder = ModuleBuilder::new();
    builder.import_global("env", "g", ty);
    Module::from_builder(engine, builder, FunctionBodies::new())
}

fn import_value(ty: GlobalType, value: HostValue) -> Result<Val, InstantiationError> {
    let engine = Engine::default();
    let module = importing_global(&engine, ty).expect("valid module");
    let mut store = Store::new(&engine);
    let instance = Instance::new(&mut store, &module, &env([("g", value)]))?;
    Ok(instance.global_value(&store, GlobalIndex::from_u32(0)))
}

#[test]
fn numbers_are_converted_to_the_declared_type() -> Result<()> {
    let _ = env_logger::try_init();
    let i32_ty = GlobalType::immutable(WasmValType::I32);
    assert_eq!(import_value(i32_ty, 4294967297.5.into())?.unwrap_i32(), 1);
    assert_eq!(import_value(i32_ty, (-1.9).into())?.unwrap_i32(), -1);
    assert_eq!(import_value(i32_ty, f64::NAN.into())?.unwrap_i32(), 0);

    let i64_ty = GlobalType::immutable(WasmValType::I64);
    let val = import_value(i64_ty, HostValue::BigInt(1 << 64 | 5))?;
    assert_eq!(val.unwrap_i64(), 5);
    let val = import_value(i64_ty, HostValue::BigInt(-2))?;
    assert_eq!(val.unwrap_i64(), -2);

    let f32_ty = GlobalType::immutable(WasmValType::F32);
    assert_eq!(import_value(f32_ty, 0.1.into())?.unwrap_f32(), 0.1f32);

    let f64_ty = GlobalType::immutable(WasmValType::F64);
    assert_eq!(import_value(f64_ty, 0.1.into())?.unwrap_f64(), 0.1);
    Ok(())
}

#[test]
fn bare_values_of_the_wrong_kind_are_rejected() {
    let _ = env_logger::try_init();
    let err = import_value(GlobalType::immutable(WasmValType::I64), 1.0.into()).unwrap_err();
    assert_eq!(err.to_string(), "LinkError: imported global env:g must be a BigInt");

    let err = import_value(GlobalType::immutable(WasmValType::F64), true.into()).unwrap_err();
    assert_eq!(err.to_string(), "LinkError: imported global env:g must be a number");

    let err = import_value(GlobalType::immutable(WasmValType::I32), HostValue::BigInt(1))
        .unwrap_err();
    assert_eq!(err.to_string(), "LinkError: imported global env:g must be a number");

    let err = import_value(GlobalType::immutable(WasmValType::V128), 1.0.into()).unwrap_err();
    assert_eq!(err.to_string(), "LinkError: imported global env:g cannot be v128");

    let exnref = GlobalType::immutable(WasmValType::Ref(WasmRefType::EXNREF));
    let err = import_value(exnref, HostValue::Null).unwrap_err();
    assert_eq!(err.to_string(), "LinkError: imported global env:g cannot be exnref");
}

#[test]
fn immutable_imports_copy_global_objects() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let module = importing_global(&engine, GlobalType::immutable(WasmValType::I32))?;
    let mut store = Store::new(&engine);

    let global = Global::new(&mut store, GlobalType::immutable(WasmValType::I32), Val::I32(9))?;
    let instance = Instance::new(&mut store, &module, &env([("g", global.into())]))?;
    assert_eq!(instance.global_value(&store, GlobalIndex::from_u32(0)).unwrap_i32(), 9);

    let mutable = Global::new(&mut store, GlobalType::mutable(WasmValType::I32), Val::I32(1))?;
    let err = instantiate_err(&mut store, &module, &env([("g", mutable.into())]));
    assert_eq!(
        err.to_string(),
        "LinkError: imported global env:g must be a same mutability"
    );

    let wide = Global::new(&mut store, GlobalType::immutable(WasmValType::I64), Val::I64(1))?;
    let err = instantiate_err(&mut store, &module, &env([("g", wide.into())]));
    assert_eq!(err.to_string(), "LinkError: imported global env:g must be a same type");
    Ok(())
}

#[test]
fn mutable_imports_alias_the_provided_global() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let unit = sig(&engine, [], []);

    let mut builder = ModuleBuilder::new();
    let g = builder.import_global("env", "g", GlobalType::mutable(WasmValType::I32));
    let bump = builder.define_func(unit);
    builder.export("g", g).export("bump", bump);
    let mut code = FunctionBodies::new();
    code.push(move |caller, _| {
        let current = caller.global(g)?.unwrap_i32();
        caller.set_global(g, Val::I32(current + 1))?;
        Ok(vec![])
    });
    let module = Module::from_builder(&engine, builder, code)?;

    let mut store = Store::new(&engine);
    let global = Global::new(&mut store, GlobalType::mutable(WasmValType::I32), Val::I32(10))?;
    let instance = Instance::new(&mut store, &module, &env([("g", global.into())]))?;

    assert_eq!(instance.get_global(&store, "g"), Some(global));

    global.set(&mut store, Val::I32(20))?;
    assert_eq!(instance.global_value(&store, g).unwrap_i32(), 20);

    let bump = instance.get_func(&store, "bump").unwrap();
    bump.call(&mut store, &[])?;
    assert_eq!(global.get(&store).unwrap_i32(), 21);

    let err = instantiate_err(&mut store, &module, &env([("g", 1.0.into())]));
    assert_eq!(
        err.to_string(),
        "LinkError: imported global env:g must be a Global since it is mutable"
    );

    let frozen = Global::new(&mut store, GlobalType::immutable(WasmValType::I32), Val::I32(0))?;
    let err = instantiate_err(&mut store, &module, &env([("g", frozen.into())]));
    assert_eq!(
        err.to_string(),
        "LinkError: imported global env:g must be a same mutability"
    );
    Ok(())
}

#[test]
fn defined_globals_follow_their_binding() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let unit = sig(&engine, [], []);

    let mut builder = ModuleBuilder::new();
    let constant = builder.define_global(GlobalType::immutable(WasmValType::I32), InitExpr::I32Const(1));
    let counter = builder.define_global(GlobalType::mutable(WasmValType::I32), InitExpr::I32Const(2));
    let private = builder.define_global(GlobalType::mutable(WasmValType::I64), InitExpr::I64Const(3));
    let bump = builder.define_func(unit);
    builder
        .export("constant", constant)
        .export("counter", counter)
        .export("bump", bump);
    let mut code = FunctionBodies::new();
    code.push(move |caller, _| {
        let c = caller.global(counter)?.unwrap_i32();
        caller.set_global(counter, Val::I32(c + 1))?;
        let p = caller.global(private)?.unwrap_i64();
        caller.set_global(private, Val::I64(p * 2))?;
        Ok(vec![])
    });
    let module = Module::from_builder(&engine, builder, code)?;
    assert_eq!(module.info().global_bindings[constant], GlobalBinding::Embedded);
    assert_eq!(module.info().global_bindings[counter], GlobalBinding::Portable);
    assert_eq!(module.info().global_bindings[private], GlobalBinding::Embedded);

    let mut store = Store::new(&engine);
    let instance = Instance::new(&mut store, &module, &HostObject::new())?;

    let exported_constant = instance.get_global(&store, "constant").unwrap();
    assert_eq!(exported_constant.get(&store).unwrap_i32(), 1);
    assert!(!exported_constant.ty(&store).mutability);

    let exported_counter = instance.get_global(&store, "counter").unwrap();
    let bump = instance.get_func(&store, "bump").unwrap();
    bump.call(&mut store, &[])?;
    assert_eq!(exported_counter.get(&store).unwrap_i32(), 3);
    assert_eq!(instance.global_value(&store, private).unwrap_i64(), 6);

    exported_counter.set(&mut store, Val::I32(100))?;
    assert_eq!(instance.global_value(&store, counter).unwrap_i32(), 100);
    Ok(())
}

#[test]
fn initializers_read_earlier_globals() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let mut builder = ModuleBuilder::new();
    let base = builder.import_global("env", "base", GlobalType::immutable(WasmValType::I32));
    let copy = builder.define_global(
        GlobalType::immutable(WasmValType::I32),
        InitExpr::GetGlobal(base),
    );
    let sum = builder.const_expr(ConstExpr::new([
        ConstOp::GlobalGet(copy),
        ConstOp::I32Const(10),
        ConstOp::I32Mul,
        ConstOp::GlobalGet(base),
        ConstOp::I32Add,
    ]));
    let derived = builder.define_global(
        GlobalType::immutable(WasmValType::I32),
        InitExpr::Extended(sum),
    );
    let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;

    let mut store = Store::new(&engine);
    let instance = Instance::new(&mut store, &module, &env([("base", 4.0.into())]))?;
    assert_eq!(instance.global_value(&store, copy).unwrap_i32(), 4);
    assert_eq!(instance.global_value(&store, derived).unwrap_i32(), 44);
    Ok(())
}

#[test]
fn externref_imports() -> Result<()> {
    let _ = env_logger::try_init();
    let val = import_value(
        GlobalType::immutable(WasmValType::Ref(WasmRefType::EXTERNREF)),
        "hello".into(),
    )?;
    let Some(Some(r)) = val.externref() else {
        panic!("expected a non-null externref, got {val:?}");
    };
    assert!(matches!(r.data(), HostValue::String(s) if &**s == "hello"));

    let val = import_value(
        GlobalType::immutable(WasmValType::Ref(WasmRefType::EXTERNREF)),
        HostValue::Null,
    )?;
    assert!(val.is_null());

    let non_null = WasmRefType {
        nullable: false,
        heap_type: WasmHeapType::Extern,
    };
    let err = import_value(GlobalType::immutable(WasmValType::Ref(non_null)), HostValue::Null)
        .unwrap_err();
    assert_eq!(err.to_string(), "LinkError: imported global env:g must be a non-null value");

    let none = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::NoExtern,
    };
    let err = import_value(GlobalType::immutable(WasmValType::Ref(none)), 1.0.into()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "LinkError: imported global env:g Argument value did not match the reference type"
    );
    Ok(())
}

#[test]
fn funcref_imports_require_module_functions() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let unit = sig(&engine, [], []);
    let other = sig(&engine, [WasmValType::I32], []);

    let mut builder = ModuleBuilder::new();
    let f = builder.define_func(unit);
    builder.export("f", f);
    let mut code = FunctionBodies::new();
    code.push(|_, _| Ok(vec![]));
    let provider = Module::from_builder(&engine, builder, code)?;

    let typed = |index: TypeIndex, nullable: bool| {
        GlobalType::immutable(WasmValType::Ref(WasmRefType {
            nullable,
            heap_type: WasmHeapType::ConcreteFunc(index),
        }))
    };
    let funcref = importing_global(&engine, GlobalType::immutable(WasmValType::Ref(WasmRefType::FUNCREF)))?;
    let exact = importing_global(&engine, typed(unit, false))?;
    let mismatched = importing_global(&engine, typed(other, true))?;

    let mut store = Store::new(&engine);
    let a = Instance::new(&mut store, &provider, &HostObject::new())?;
    let exported = a.get_func(&store, "f").unwrap();
    let host = Func::new(&mut store, |_, _| Ok(vec![]));

    let instance = Instance::new(&mut store, &funcref, &env([("g", exported.into())]))?;
    let val = instance.global_value(&store, GlobalIndex::from_u32(0));
    assert_eq!(val.unwrap_funcref(), Some(&exported));
    Instance::new(&mut store, &funcref, &env([("g", HostValue::Null)]))?;

    let err = instantiate_err(&mut store, &funcref, &env([("g", host.into())]));
    assert_eq!(
        err.to_string(),
        "LinkError: imported global env:g must be a wasm exported function or null"
    );
    let err = instantiate_err(&mut store, &funcref, &env([("g", 1.0.into())]));
    assert_eq!(
        err.to_string(),
        "LinkError: imported global env:g must be a wasm exported function or null"
    );

    Instance::new(&mut store, &exact, &env([("g", exported.into())]))?;
    let err = instantiate_err(&mut store, &exact, &env([("g", HostValue::Null)]));
    assert_eq!(
        err.to_string(),
        "LinkError: imported global env:g must be a wasm exported function"
    );

    let err = instantiate_err(&mut store, &mismatched, &env([("g", exported.into())]));
    assert_eq!(
        err.to_string(),
        "LinkError: imported global env:g Argument value did not match the reference type"
    );
    Ok(())
}

#[test]
fn reference_globals_can_hold_own_functions() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let unit = sig(&engine, [], []);

    let mut builder = ModuleBuilder::new();
    let f = builder.define_func(unit);
    let g = builder.define_global(
        GlobalType::mutable(WasmValType::Ref(WasmRefType::FUNCREF)),
        InitExpr::RefFunc(f),
    );
    builder.export("f", f).export("g", g);
    let mut code = FunctionBodies::new();
    code.push(|_, _| Ok(vec![]));
    let module = Module::from_builder(&engine, builder, code)?;

    let mut store = Store::new(&engine);
    let instance = Instance::new(&mut store, &module, &HostObject::new())?;
    let exported_f = instance.get_func(&store, "f").unwrap();
    let exported_g = instance.get_global(&store, "g").unwrap();
    assert_eq!(exported_g.get(&store).unwrap_funcref(), Some(&exported_f));
    Ok(())
}

#[test]
fn module_code_writes_are_seen_by_the_host() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let set = sig(&engine, [WasmValType::I64], []);
    let unit = sig(&engine, [], []);

    let mut builder = ModuleBuilder::new();
    let g = builder.define_global(GlobalType::mutable(WasmValType::I64), InitExpr::I64Const(0));
    let frozen = builder.define_global(GlobalType::immutable(WasmValType::I64), InitExpr::I64Const(7));
    let store_value = builder.define_func(set);
    let overwrite = builder.define_func(unit);
    builder
        .export("g", g)
        .export("set", store_value)
        .export("overwrite", overwrite);
    let mut code = FunctionBodies::new();
    code.push(move |caller, args| {
        caller.set_global(g, args[0].clone())?;
        Ok(vec![])
    });
    code.push(move |caller, _| {
        caller.set_global(frozen, Val::I64(8))?;
        Ok(vec![])
    });
    let module = Module::from_builder(&engine, builder, code)?;

    let mut store = Store::new(&engine);
    let instance = Instance::new(&mut store, &module, &HostObject::new())?;
    let global = instance.get_global(&store, "g").unwrap();
    let set = instance.get_func(&store, "set").unwrap();
    set.call(&mut store, &[Val::I64(-3)])?;
    assert_eq!(global.get(&store).unwrap_i64(), -3);
    assert_eq!(instance.global_value(&store, g).unwrap_i64(), -3);

    let overwrite = instance.get_func(&store, "overwrite").unwrap();
    let trap = overwrite.call(&mut store, &[]).unwrap_err();
    assert!(matches!(&trap, Trap::User(msg) if msg.contains("immutable")));
    assert_eq!(instance.global_value(&store, frozen).unwrap_i64(), 7);
    Ok(())
}
