use super::{env, funcref_table, instantiate_err, sig};
use anyhow::Result;
use wasmlink::*;

fn importing_table(engine: &Engine, ty: TableType) -> Result<Module> {
    let mut builder = ModuleBuilder::new();
    let t = builder.import_table("env", "t", ty);
    builder.export("t", t);
    Module::from_builder(engine, builder, FunctionBodies::new())
}

#[test]
fn imported_tables_are_checked_against_their_declaration() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let module = importing_table(&engine, funcref_table(2, Some(10)))?;
    let mut store = Store::new(&engine);

    let ok = Table::new(&mut store, funcref_table(2, Some(5)), Val::FuncRef(None))?;
    let instance = Instance::new(&mut store, &module, &env([("t", ok.into())]))?;
    assert_eq!(instance.get_table(&store, "t"), Some(ok));

    let cases = [
        (
            funcref_table(1, Some(5)),
            "provided an 'initial' that is too small",
        ),
        (
            funcref_table(2, None),
            "does not have a 'maximum' but the module requires that it does",
        ),
        (
            funcref_table(2, Some(11)),
            "provided a 'maximum' that is larger than the module's declared 'maximum'",
        ),
        (
            TableType {
                wasm_ty: WasmRefType::EXTERNREF,
                minimum: 2,
                maximum: Some(5),
            },
            "provided a 'type' that is wrong",
        ),
    ];
    for (ty, reason) in cases {
        let init = Val::null_ref(ty.wasm_ty);
        let table = Table::new(&mut store, ty, init)?;
        let err = instantiate_err(&mut store, &module, &env([("t", table.into())]));
        assert_eq!(err.to_string(), format!("LinkError: Table import env:t {reason}"));
    }

    let err = instantiate_err(&mut store, &module, &env([("t", 1.0.into())]));
    assert_eq!(err.to_string(), "LinkError: Table import env:t is not a Table");
    Ok(())
}

#[test]
fn the_current_size_counts_not_the_declared_minimum() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let module = importing_table(&engine, funcref_table(3, None))?;
    let mut store = Store::new(&engine);

    let table = Table::new(&mut store, funcref_table(1, None), Val::FuncRef(None))?;
    let err = instantiate_err(&mut store, &module, &env([("t", table.into())]));
    assert!(err.as_link().is_some());

    table.grow(&mut store, 2, Val::FuncRef(None))?;
    Instance::new(&mut store, &module, &env([("t", table.into())]))?;
    Ok(())
}

#[test]
fn defined_tables_are_filled_with_their_initializer() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let unit = sig(&engine, [], []);

    let mut builder = ModuleBuilder::new();
    let f = builder.define_func(unit);
    let plain = builder.define_table(funcref_table(2, None), TableInitialValue::Default);
    let filled = builder.define_table(
        funcref_table(3, None),
        TableInitialValue::Expr(InitExpr::RefFunc(f)),
    );
    builder
        .export("f", f)
        .export("plain", plain)
        .export("filled", filled);
    let mut code = FunctionBodies::new();
    code.push(|_, _| Ok(vec![]));
    let module = Module::from_builder(&engine, builder, code)?;

    let mut store = Store::new(&engine);
    let instance = Instance::new(&mut store, &module, &HostObject::new())?;
    let f = instance.get_func(&store, "f").unwrap();

    let plain = instance.get_table(&store, "plain").unwrap();
    assert_eq!(plain.size(&store), 2);
    assert!(plain.get(&store, 0).unwrap().is_null());

    let filled = instance.get_table(&store, "filled").unwrap();
    for i in 0..3 {
        assert_eq!(filled.get(&store, i).unwrap().unwrap_funcref(), Some(&f));
    }
    assert_eq!(instance.table(&store, TableIndex::from_u32(1)), filled);
    Ok(())
}

#[test]
fn tables_are_shared_live() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let ty = sig(&engine, [], [WasmValType::I32]);

    let mut builder = ModuleBuilder::new();
    let t = builder.import_table("env", "t", funcref_table(1, None));
    let size = builder.define_func(ty);
    builder.export("size", size);
    let mut code = FunctionBodies::new();
    code.push(move |caller, _| {
        let table = caller.table(t)?;
        Ok(vec![Val::I32(table.size(&*caller) as i32)])
    });
    let module = Module::from_builder(&engine, builder, code)?;

    let mut store = Store::new(&engine);
    let table = Table::new(&mut store, funcref_table(1, None), Val::FuncRef(None))?;
    let instance = Instance::new(&mut store, &module, &env([("t", table.into())]))?;
    let size = instance.get_func(&store, "size").unwrap();
    assert_eq!(size.call(&mut store, &[])?[0].unwrap_i32(), 1);
    table.grow(&mut store, 4, Val::FuncRef(None))?;
    assert_eq!(size.call(&mut store, &[])?[0].unwrap_i32(), 5);
    Ok(())
}

#[test]
fn oversized_tables_fail_to_link() -> Result<()> {
    let _ = env_logger::try_init();
    let mut config = Config::new();
    config.max_table_elements(100);
    let engine = Engine::new(&config)?;

    let mut builder = ModuleBuilder::new();
    builder.define_table(funcref_table(1000, None), TableInitialValue::Default);
    let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;

    let mut store = Store::new(&engine);
    let err = instantiate_err(&mut store, &module, &HostObject::new());
    assert_eq!(err.to_string(), "LinkError: couldn't create Table");
    Ok(())
}

#[test]
fn non_nullable_tables_start_out_filled() -> Result<()> {
    let _ = env_logger::try_init();
    let engine = Engine::default();
    let unit = sig(&engine, [], []);
    let non_null = TableType {
        wasm_ty: WasmRefType {
            nullable: false,
            heap_type: WasmHeapType::Func,
        },
        minimum: 2,
        maximum: None,
    };

    let mut builder = ModuleBuilder::new();
    let f = builder.define_func(unit);
    let t = builder.define_table(non_null, TableInitialValue::Expr(InitExpr::RefFunc(f)));
    builder.export("f", f).export("t", t);
    let mut code = FunctionBodies::new();
    code.push(|_, _| Ok(vec![]));
    let module = Module::from_builder(&engine, builder, code)?;

    let mut store = Store::new(&engine);
    let instance = Instance::new(&mut store, &module, &HostObject::new())?;
    let f = instance.get_func(&store, "f").unwrap();
    let table = instance.get_table(&store, "t").unwrap();
    assert_eq!(table.size(&store), 2);
    for i in 0..2 {
        assert_eq!(table.get(&store, i).unwrap().unwrap_funcref(), Some(&f));
    }

    // A null initializer can't fill a non-nullable table.
    let mut builder = ModuleBuilder::new();
    builder.define_table(
        non_null,
        TableInitialValue::Expr(InitExpr::RefNull(WasmHeapType::NoFunc)),
    );
    let module = Module::from_builder(&engine, builder, FunctionBodies::new())?;
    let err = instantiate_err(&mut store, &module, &HostObject::new());
    assert_eq!(err.to_string(), "LinkError: failed to initialize Table");
    Ok(())
}
