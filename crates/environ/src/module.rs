//! Data structures for representing decoded wasm modules.

use crate::{
    ConstExpr, ConstExprIndex, DataIndex, DefinedFuncIndex, DefinedGlobalIndex,
    DefinedTableIndex, ElemIndex, EntityIndex, EntityType, FuncIndex, Global, GlobalIndex,
    InitExpr, Memory, MemoryIndex, PrimaryMap, Table, TableIndex, Tag, TagIndex, TypeIndex,
};
use cranelift_entity::EntityRef;
use indexmap::IndexMap;
use serde_derive::{Deserialize, Serialize};

/// A declared import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    /// Name of the module that this is importing from.
    pub module: String,
    /// Name of the item within `module` that this is importing.
    pub field: String,
    /// The kind of item and its index in the corresponding index space.
    pub index: EntityIndex,
}

/// How a global's value is stored inside an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlobalBinding {
    /// The value lives inline in the instance. Used for globals that are never
    /// shared live with the host: immutable ones, and internal mutable ones.
    Embedded,
    /// The value lives in a separately addressable cell that host-visible
    /// `Global` objects share by identity. Required for every mutable global
    /// that is imported or exported.
    Portable,
}

impl GlobalBinding {
    /// The binding a global of type `ty` needs given whether it crosses the
    /// module boundary (imported or exported).
    pub fn for_global(ty: &Global, crosses_boundary: bool) -> GlobalBinding {
        if ty.mutability && crosses_boundary {
            GlobalBinding::Portable
        } else {
            GlobalBinding::Embedded
        }
    }
}

/// How a module-defined table's slots are filled when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableInitialValue {
    /// Every slot starts as the null reference of the element type.
    Default,
    /// Every slot starts as the value of this expression.
    Expr(InitExpr),
}

/// Whether a segment is applied during instantiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ElementSegmentKind {
    /// Written into `table_index` at `offset` during instantiation.
    Active {
        /// The table the segment is written to.
        table_index: TableIndex,
        /// The index of the first slot written.
        offset: InitExpr,
    },
    /// Only available to explicit table instructions.
    Passive,
    /// Only declares functions that may be referenced with `ref.func`.
    Declared,
}

/// The items of an element segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SegmentElements {
    /// A list of function references by index.
    Functions(Box<[FuncIndex]>),
    /// A list of initializer expressions, one per slot. `ref.null` items are
    /// written as the null reference of the target table.
    Expressions(Box<[InitExpr]>),
}

impl SegmentElements {
    /// The number of items in this segment.
    pub fn len(&self) -> usize {
        match self {
            SegmentElements::Functions(f) => f.len(),
            SegmentElements::Expressions(e) => e.len(),
        }
    }

    /// Whether this segment has no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A WebAssembly element segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSegment {
    /// Whether and where this segment is applied.
    pub kind: ElementSegmentKind,
    /// The values written by this segment.
    pub elements: SegmentElements,
}

/// Whether a data segment is applied during instantiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataSegmentKind {
    /// Copied into the module's memory at `offset` during instantiation.
    Active {
        /// The byte offset of the first byte written.
        offset: InitExpr,
    },
    /// Only available to explicit memory instructions.
    Passive,
}

/// A WebAssembly data segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSegment {
    /// Whether and where this segment is applied.
    pub kind: DataSegmentKind,
    /// The bytes written by this segment.
    pub data: Box<[u8]>,
}

/// The static description of a decoded, validated module.
///
/// Every index in here is guaranteed to be in bounds, export names are
/// unique, there is at most one memory and the start function takes no
/// arguments and returns nothing.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInformation {
    /// The name of this wasm module, often found in the wasm file.
    pub name: Option<String>,

    /// All import records, in the order they are declared in the module.
    pub imports: Vec<Import>,

    /// Exported entities, in declaration order.
    pub exports: IndexMap<String, EntityIndex>,

    /// The module "start" function, if present.
    pub start_func: Option<FuncIndex>,

    /// Types of functions, imported and local.
    pub functions: PrimaryMap<FuncIndex, TypeIndex>,

    /// WebAssembly tables, imported and local.
    pub tables: PrimaryMap<TableIndex, Table>,

    /// How each module-defined table is initialized.
    pub table_initialization: PrimaryMap<DefinedTableIndex, TableInitialValue>,

    /// WebAssembly global variables, imported and local.
    pub globals: PrimaryMap<GlobalIndex, Global>,

    /// How each global, imported and local, is stored in an instance.
    pub global_bindings: PrimaryMap<GlobalIndex, GlobalBinding>,

    /// Initializers of each module-defined global.
    pub global_initializers: PrimaryMap<DefinedGlobalIndex, InitExpr>,

    /// The single linear memory, if any.
    pub memory: Option<Memory>,

    /// WebAssembly exception tags, imported and local.
    pub tags: PrimaryMap<TagIndex, Tag>,

    /// Element segments in declaration order.
    pub element_segments: PrimaryMap<ElemIndex, ElementSegment>,

    /// Data segments in declaration order.
    pub data_segments: PrimaryMap<DataIndex, DataSegment>,

    /// Extended constant expressions referenced by [`InitExpr::Extended`].
    pub const_exprs: PrimaryMap<ConstExprIndex, ConstExpr>,

    /// Number of imported functions in the module.
    pub num_imported_funcs: usize,

    /// Number of imported tables in the module.
    pub num_imported_tables: usize,

    /// Number of imported memories in the module.
    pub num_imported_memories: usize,

    /// Number of imported globals in the module.
    pub num_imported_globals: usize,

    /// Number of imported tags in the module.
    pub num_imported_tags: usize,
}

impl ModuleInformation {
    /// Allocates the module data structures.
    pub fn new() -> Self {
        ModuleInformation::default()
    }

    /// Convert a `DefinedFuncIndex` into a `FuncIndex`.
    #[inline]
    pub fn func_index(&self, defined_func: DefinedFuncIndex) -> FuncIndex {
        FuncIndex::new(self.num_imported_funcs + defined_func.index())
    }

    /// Convert a `FuncIndex` into a `DefinedFuncIndex`. Returns None if the
    /// index is an imported function.
    #[inline]
    pub fn defined_func_index(&self, func: FuncIndex) -> Option<DefinedFuncIndex> {
        if func.index() < self.num_imported_funcs {
            None
        } else {
            Some(DefinedFuncIndex::new(
                func.index() - self.num_imported_funcs,
            ))
        }
    }

    /// Test whether the given function index is for an imported function.
    #[inline]
    pub fn is_imported_function(&self, index: FuncIndex) -> bool {
        index.index() < self.num_imported_funcs
    }

    /// Convert a `DefinedTableIndex` into a `TableIndex`.
    #[inline]
    pub fn table_index(&self, defined_table: DefinedTableIndex) -> TableIndex {
        TableIndex::new(self.num_imported_tables + defined_table.index())
    }

    /// Convert a `TableIndex` into a `DefinedTableIndex`. Returns None if the
    /// index is an imported table.
    #[inline]
    pub fn defined_table_index(&self, table: TableIndex) -> Option<DefinedTableIndex> {
        if table.index() < self.num_imported_tables {
            None
        } else {
            Some(DefinedTableIndex::new(
                table.index() - self.num_imported_tables,
            ))
        }
    }

    /// Convert a `DefinedGlobalIndex` into a `GlobalIndex`.
    #[inline]
    pub fn global_index(&self, defined_global: DefinedGlobalIndex) -> GlobalIndex {
        GlobalIndex::new(self.num_imported_globals + defined_global.index())
    }

    /// Convert a `GlobalIndex` into a `DefinedGlobalIndex`. Returns None if the
    /// index is an imported global.
    #[inline]
    pub fn defined_global_index(&self, global: GlobalIndex) -> Option<DefinedGlobalIndex> {
        if global.index() < self.num_imported_globals {
            None
        } else {
            Some(DefinedGlobalIndex::new(
                global.index() - self.num_imported_globals,
            ))
        }
    }

    /// Test whether the given global index is for an imported global.
    #[inline]
    pub fn is_imported_global(&self, index: GlobalIndex) -> bool {
        index.index() < self.num_imported_globals
    }

    /// Whether the module's memory, if any, is imported.
    #[inline]
    pub fn is_imported_memory(&self) -> bool {
        self.num_imported_memories > 0
    }

    /// Number of module-defined functions.
    #[inline]
    pub fn num_defined_funcs(&self) -> usize {
        self.functions.len() - self.num_imported_funcs
    }

    /// Returns the type of an item based on its index
    pub fn type_of(&self, index: EntityIndex) -> EntityType {
        match index {
            EntityIndex::Global(i) => EntityType::Global(self.globals[i]),
            EntityIndex::Table(i) => EntityType::Table(self.tables[i]),
            EntityIndex::Memory(_) => match self.memory {
                Some(memory) => EntityType::Memory(memory),
                None => panic!("module has no memory"),
            },
            EntityIndex::Function(i) => EntityType::Function(self.functions[i]),
            EntityIndex::Tag(i) => EntityType::Tag(self.tags[i]),
        }
    }

    /// Returns an iterator of all the imports in this module, along with their
    /// module name, field name, and type that's being imported.
    pub fn imports(&self) -> impl ExactSizeIterator<Item = (&str, &str, EntityType)> {
        self.imports
            .iter()
            .map(|i| (i.module.as_str(), i.field.as_str(), self.type_of(i.index)))
    }

    /// Returns an iterator of all the exports in this module, along with their
    /// name and type.
    pub fn exports(&self) -> impl ExactSizeIterator<Item = (&str, EntityType)> {
        self.exports
            .iter()
            .map(|(name, index)| (name.as_str(), self.type_of(*index)))
    }

    /// The memory index space only ever has this one entry.
    pub fn memory_index(&self) -> Option<MemoryIndex> {
        self.memory.map(|_| MemoryIndex::new(0))
    }
}
