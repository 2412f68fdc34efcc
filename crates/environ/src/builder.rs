//! Incremental construction of a [`ModuleInformation`].

use crate::{
    ConstExpr, ConstExprIndex, DataSegment, DataSegmentKind, ElementSegment, ElementSegmentKind,
    EntityIndex, FuncIndex, Global, GlobalBinding, GlobalIndex, Import, InitExpr, Memory,
    MemoryIndex, ModuleInformation, SegmentElements, Table, TableIndex, TableInitialValue, Tag,
    TagIndex, TypeIndex, TypeRegistry,
};
use anyhow::{Result, bail};
use cranelift_entity::EntityRef;
use std::collections::HashSet;

/// Builds a [`ModuleInformation`] one declaration at a time.
///
/// This is the shape a decoder produces: all imports of a kind precede the
/// definitions of that kind, so each index space is laid out with imports
/// first. [`ModuleBuilder::finish`] checks everything the instantiation
/// engine relies on having been validated.
#[derive(Default)]
pub struct ModuleBuilder {
    module: ModuleInformation,
    exports: Vec<(String, EntityIndex)>,
}

impl ModuleBuilder {
    /// Creates a builder for an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the module's name.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.module.name = Some(name.into());
        self
    }

    fn import(&mut self, module: &str, field: &str, index: EntityIndex) {
        self.module.imports.push(Import {
            module: module.to_string(),
            field: field.to_string(),
            index,
        });
    }

    /// Declares an imported function with signature `ty`.
    ///
    /// # Panics
    ///
    /// Panics if a function has already been defined.
    pub fn import_func(&mut self, module: &str, field: &str, ty: TypeIndex) -> FuncIndex {
        assert_eq!(
            self.module.num_imported_funcs,
            self.module.functions.len(),
            "function imports must precede function definitions"
        );
        let index = self.module.functions.push(ty);
        self.module.num_imported_funcs += 1;
        self.import(module, field, index.into());
        index
    }

    /// Declares an imported table.
    ///
    /// # Panics
    ///
    /// Panics if a table has already been defined.
    pub fn import_table(&mut self, module: &str, field: &str, ty: Table) -> TableIndex {
        assert_eq!(
            self.module.num_imported_tables,
            self.module.tables.len(),
            "table imports must precede table definitions"
        );
        let index = self.module.tables.push(ty);
        self.module.num_imported_tables += 1;
        self.import(module, field, index.into());
        index
    }

    /// Declares an imported global.
    ///
    /// # Panics
    ///
    /// Panics if a global has already been defined.
    pub fn import_global(&mut self, module: &str, field: &str, ty: Global) -> GlobalIndex {
        assert_eq!(
            self.module.num_imported_globals,
            self.module.globals.len(),
            "global imports must precede global definitions"
        );
        let index = self.module.globals.push(ty);
        self.module.num_imported_globals += 1;
        self.import(module, field, index.into());
        index
    }

    /// Declares the imported memory.
    ///
    /// # Panics
    ///
    /// Panics if the module already has a memory.
    pub fn import_memory(&mut self, module: &str, field: &str, ty: Memory) -> MemoryIndex {
        assert!(self.module.memory.is_none(), "at most one memory is allowed");
        self.module.memory = Some(ty);
        self.module.num_imported_memories = 1;
        let index = MemoryIndex::new(0);
        self.import(module, field, index.into());
        index
    }

    /// Declares an imported tag.
    ///
    /// # Panics
    ///
    /// Panics if a tag has already been defined.
    pub fn import_tag(&mut self, module: &str, field: &str, ty: Tag) -> TagIndex {
        assert_eq!(
            self.module.num_imported_tags,
            self.module.tags.len(),
            "tag imports must precede tag definitions"
        );
        let index = self.module.tags.push(ty);
        self.module.num_imported_tags += 1;
        self.import(module, field, index.into());
        index
    }

    /// Declares a module-defined function with signature `ty`. Its body is
    /// supplied separately, by the compiled code of the module.
    pub fn define_func(&mut self, ty: TypeIndex) -> FuncIndex {
        self.module.functions.push(ty)
    }

    /// Declares a module-defined table.
    pub fn define_table(&mut self, ty: Table, init: TableInitialValue) -> TableIndex {
        self.module.table_initialization.push(init);
        self.module.tables.push(ty)
    }

    /// Declares a module-defined global.
    pub fn define_global(&mut self, ty: Global, init: InitExpr) -> GlobalIndex {
        self.module.global_initializers.push(init);
        self.module.globals.push(ty)
    }

    /// Declares the module-defined memory.
    ///
    /// # Panics
    ///
    /// Panics if the module already has a memory.
    pub fn define_memory(&mut self, ty: Memory) -> MemoryIndex {
        assert!(self.module.memory.is_none(), "at most one memory is allowed");
        self.module.memory = Some(ty);
        MemoryIndex::new(0)
    }

    /// Declares a module-defined tag.
    pub fn define_tag(&mut self, ty: Tag) -> TagIndex {
        self.module.tags.push(ty)
    }

    /// Adds an extended constant expression, to be referenced through
    /// [`InitExpr::Extended`].
    pub fn const_expr(&mut self, expr: ConstExpr) -> ConstExprIndex {
        self.module.const_exprs.push(expr)
    }

    /// Adds an active element segment.
    pub fn active_elements(
        &mut self,
        table_index: TableIndex,
        offset: InitExpr,
        elements: SegmentElements,
    ) -> &mut Self {
        self.module.element_segments.push(ElementSegment {
            kind: ElementSegmentKind::Active {
                table_index,
                offset,
            },
            elements,
        });
        self
    }

    /// Adds a passive element segment.
    pub fn passive_elements(&mut self, elements: SegmentElements) -> &mut Self {
        self.module.element_segments.push(ElementSegment {
            kind: ElementSegmentKind::Passive,
            elements,
        });
        self
    }

    /// Adds an active data segment.
    pub fn active_data(&mut self, offset: InitExpr, data: impl Into<Box<[u8]>>) -> &mut Self {
        self.module.data_segments.push(DataSegment {
            kind: DataSegmentKind::Active { offset },
            data: data.into(),
        });
        self
    }

    /// Adds a passive data segment.
    pub fn passive_data(&mut self, data: impl Into<Box<[u8]>>) -> &mut Self {
        self.module.data_segments.push(DataSegment {
            kind: DataSegmentKind::Passive,
            data: data.into(),
        });
        self
    }

    /// Exports `index` under `name`.
    pub fn export(&mut self, name: &str, index: impl Into<EntityIndex>) -> &mut Self {
        self.exports.push((name.to_string(), index.into()));
        self
    }

    /// Sets the start function.
    pub fn start(&mut self, func: FuncIndex) -> &mut Self {
        self.module.start_func = Some(func);
        self
    }

    /// Validates the module against `types` and returns it.
    ///
    /// Global bindings are chosen here: mutable globals that are imported or
    /// exported get [`GlobalBinding::Portable`], everything else is
    /// [`GlobalBinding::Embedded`].
    pub fn finish(self, types: &TypeRegistry) -> Result<ModuleInformation> {
        let ModuleBuilder {
            mut module,
            exports,
        } = self;

        let mut seen = HashSet::new();
        for (name, index) in exports {
            if !seen.insert(name.clone()) {
                bail!("duplicate export name `{name}`");
            }
            check_entity(&module, index)
                .map_err(|e| e.context(format!("invalid export `{name}`")))?;
            module.exports.insert(name, index);
        }

        for (index, ty) in module.functions.iter() {
            if !types.contains(*ty) {
                bail!(
                    "function {} has unregistered type {}",
                    index.as_u32(),
                    ty.as_u32()
                );
            }
        }
        for (index, tag) in module.tags.iter() {
            if !types.contains(tag.ty) {
                bail!("tag {} has unregistered type {}", index.as_u32(), tag.ty.as_u32());
            }
        }

        if let Some(start) = module.start_func {
            let Some(ty) = module.functions.get(start) else {
                bail!("unknown start function {}", start.as_u32());
            };
            match types.func_type(*ty) {
                Some(sig) if sig.params().is_empty() && sig.returns().is_empty() => {}
                _ => bail!("start function must take no arguments and return nothing"),
            }
        }

        for (index, table) in module.tables.iter() {
            if let Some(max) = table.maximum {
                if max < table.minimum {
                    bail!("table {} has a maximum smaller than its minimum", index.as_u32());
                }
            }
        }
        // Tables are created before any global is defined, so their
        // initializers may only read imported globals.
        for init in module.table_initialization.values() {
            if let TableInitialValue::Expr(expr) = init {
                check_init(&module, expr, module.num_imported_globals)?;
            }
        }
        for (def, init) in module.global_initializers.iter() {
            // Initializers may only read imports and globals defined before
            // this one.
            let limit = module.global_index(def).index();
            check_init(&module, init, limit)
                .map_err(|e| e.context(format!("invalid initializer for global {limit}")))?;
        }

        for (index, segment) in module.element_segments.iter() {
            if let ElementSegmentKind::Active {
                table_index,
                offset,
            } = &segment.kind
            {
                if !module.tables.is_valid(*table_index) {
                    bail!(
                        "element segment {} targets unknown table {}",
                        index.as_u32(),
                        table_index.as_u32()
                    );
                }
                check_init(&module, offset, module.globals.len())?;
            }
            match &segment.elements {
                SegmentElements::Functions(funcs) => {
                    for f in funcs.iter() {
                        if !module.functions.is_valid(*f) {
                            bail!(
                                "element segment {} references unknown function {}",
                                index.as_u32(),
                                f.as_u32()
                            );
                        }
                    }
                }
                SegmentElements::Expressions(exprs) => {
                    for e in exprs.iter() {
                        check_init(&module, e, module.globals.len())?;
                    }
                }
            }
        }
        for (index, segment) in module.data_segments.iter() {
            if let DataSegmentKind::Active { offset } = &segment.kind {
                if module.memory.is_none() && !segment.data.is_empty() {
                    bail!("data segment {} requires a memory", index.as_u32());
                }
                check_init(&module, offset, module.globals.len())?;
            }
        }

        let exported_globals = module
            .exports
            .values()
            .filter_map(|e| match e {
                EntityIndex::Global(g) => Some(*g),
                _ => None,
            })
            .collect::<HashSet<_>>();
        for (index, ty) in module.globals.iter() {
            let crosses_boundary =
                module.is_imported_global(index) || exported_globals.contains(&index);
            module
                .global_bindings
                .push(GlobalBinding::for_global(ty, crosses_boundary));
        }

        log::trace!(
            "built module with {} imports and {} exports",
            module.imports.len(),
            module.exports.len()
        );
        Ok(module)
    }
}

fn check_entity(module: &ModuleInformation, index: EntityIndex) -> Result<()> {
    let valid = match index {
        EntityIndex::Function(i) => module.functions.is_valid(i),
        EntityIndex::Table(i) => module.tables.is_valid(i),
        EntityIndex::Memory(i) => module.memory.is_some() && i.index() == 0,
        EntityIndex::Global(i) => module.globals.is_valid(i),
        EntityIndex::Tag(i) => module.tags.is_valid(i),
    };
    if !valid {
        bail!("unknown {} index", index.desc());
    }
    Ok(())
}

/// Checks that `init` only reads globals below `global_limit` and only
/// references existing functions and expressions.
fn check_init(module: &ModuleInformation, init: &InitExpr, global_limit: usize) -> Result<()> {
    let check_global = |g: GlobalIndex| {
        if g.index() >= global_limit {
            bail!("constant expression reads global {} before it is defined", g.as_u32());
        }
        Ok(())
    };
    let check_func = |f: FuncIndex| {
        if !module.functions.is_valid(f) {
            bail!("constant expression references unknown function {}", f.as_u32());
        }
        Ok(())
    };
    match init {
        InitExpr::GetGlobal(g) => check_global(*g),
        InitExpr::RefFunc(f) => check_func(*f),
        InitExpr::RefNull(_) => Ok(()),
        InitExpr::Extended(e) => {
            let Some(expr) = module.const_exprs.get(*e) else {
                bail!("unknown constant expression {}", e.as_u32());
            };
            expr.referenced_globals().try_for_each(check_global)?;
            expr.referenced_funcs().try_for_each(check_func)
        }
        InitExpr::I32Const(_)
        | InitExpr::I64Const(_)
        | InitExpr::F32Const(_)
        | InitExpr::F64Const(_)
        | InitExpr::V128Const(_) => Ok(()),
    }
}
