use super::ImportResolver;
use crate::{HostValue, Instance, InstantiationError, LinkError, Store};
use indexmap::IndexMap;
use std::collections::HashSet;
use wasmlink_environ::Import;

/// One module of a [`ModuleGraph`].
///
/// A record lists what it exports and how: a local binding of its own
/// environment, an indirect re-export of another module's export, or a star
/// re-export of everything another module exports. The environment holding
/// the local bindings' values stays empty until [`ModuleRecord::link`] is
/// called, which is how cycles in a graph are modelled.
#[derive(Clone, Debug, Default)]
pub struct ModuleRecord {
    local_exports: IndexMap<String, String>,
    indirect_exports: IndexMap<String, (String, String)>,
    star_exports: Vec<String>,
    environment: Option<IndexMap<String, HostValue>>,
}

impl ModuleRecord {
    /// Creates a record that exports nothing and is not linked.
    pub fn new() -> ModuleRecord {
        ModuleRecord::default()
    }

    /// Exports the local binding `local` under `name`.
    pub fn local_export(&mut self, name: &str, local: &str) -> &mut Self {
        self.local_exports.insert(name.to_string(), local.to_string());
        self
    }

    /// Exports `module`'s export `import_name` under `name`.
    pub fn indirect_export(&mut self, name: &str, module: &str, import_name: &str) -> &mut Self {
        self.indirect_exports
            .insert(name.to_string(), (module.to_string(), import_name.to_string()));
        self
    }

    /// Re-exports every export of `module` except `default`.
    pub fn star_export(&mut self, module: &str) -> &mut Self {
        self.star_exports.push(module.to_string());
        self
    }

    /// Links the record's environment. Until then every binding resolved to
    /// this record reads as [`HostValue::Undefined`].
    pub fn link(&mut self) -> &mut Self {
        self.environment.get_or_insert_with(IndexMap::new);
        self
    }

    /// Sets the value of local binding `local`, linking the environment if
    /// needed.
    pub fn define(&mut self, local: &str, value: impl Into<HostValue>) -> &mut Self {
        self.environment
            .get_or_insert_with(IndexMap::new)
            .insert(local.to_string(), value.into());
        self
    }

    /// Whether the record's environment is linked.
    pub fn is_linked(&self) -> bool {
        self.environment.is_some()
    }
}

/// The outcome of resolving an exported name through a [`ModuleGraph`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The export is the local binding `binding` of module `module`.
    Resolved {
        /// The module whose environment holds the binding.
        module: String,
        /// The name of the binding in that environment.
        binding: String,
    },
    /// No module exports the name, or resolution ran into a cycle.
    NotFound,
    /// Two star re-exports provide different bindings for the name.
    Ambiguous,
    /// `default` was requested through star re-exports only.
    Error,
}

/// Resolves imports as named exports of other module records.
///
/// An import `m:f` resolves export `f` of the record registered as `m`,
/// following indirect and star re-exports, and reads the bound value from
/// the environment of the module that finally defines it.
#[derive(Clone, Debug, Default)]
pub struct ModuleGraph {
    records: IndexMap<String, ModuleRecord>,
}

impl ModuleGraph {
    /// Creates an empty graph.
    pub fn new() -> ModuleGraph {
        ModuleGraph::default()
    }

    /// Registers `record` as module `name`, replacing any previous record.
    pub fn register(&mut self, name: &str, record: ModuleRecord) -> &mut Self {
        self.records.insert(name.to_string(), record);
        self
    }

    /// Registers the exports of `instance` as a linked module `name` whose
    /// bindings are its exports.
    pub fn register_instance(
        &mut self,
        name: &str,
        store: &Store,
        instance: Instance,
    ) -> &mut Self {
        let mut record = ModuleRecord::new();
        record.link();
        for (export, ext) in instance.exports(store).iter() {
            record.local_export(export, export);
            record.define(export, ext);
        }
        self.register(name, record)
    }

    /// Returns the record registered as `name`.
    pub fn record(&self, name: &str) -> Option<&ModuleRecord> {
        self.records.get(name)
    }

    /// Returns the record registered as `name` for modification, for example
    /// to link it after a dependent module was instantiated.
    pub fn record_mut(&mut self, name: &str) -> Option<&mut ModuleRecord> {
        self.records.get_mut(name)
    }

    /// Resolves export `name` of module `module`.
    pub fn resolve_export(&self, module: &str, name: &str) -> Resolution {
        self.resolve_export_in(module, name, &mut HashSet::new())
    }

    fn resolve_export_in(
        &self,
        module: &str,
        name: &str,
        resolve_set: &mut HashSet<(String, String)>,
    ) -> Resolution {
        // A repeated request is a cycle of re-exports.
        if !resolve_set.insert((module.to_string(), name.to_string())) {
            log::trace!("circular re-export of `{name}` through `{module}`");
            return Resolution::NotFound;
        }
        let Some(record) = self.records.get(module) else {
            return Resolution::NotFound;
        };

        if let Some(local) = record.local_exports.get(name) {
            return Resolution::Resolved {
                module: module.to_string(),
                binding: local.clone(),
            };
        }

        if let Some((target, import_name)) = record.indirect_exports.get(name) {
            return self.resolve_export_in(target, import_name, resolve_set);
        }

        if name == "default" {
            return Resolution::Error;
        }

        let mut star_resolution = None;
        for target in record.star_exports.iter() {
            match self.resolve_export_in(target, name, resolve_set) {
                Resolution::NotFound => {}
                resolved @ Resolution::Resolved { .. } => match &star_resolution {
                    None => star_resolution = Some(resolved),
                    Some(previous) if *previous == resolved => {}
                    Some(_) => return Resolution::Ambiguous,
                },
                other => return other,
            }
        }
        star_resolution.unwrap_or(Resolution::NotFound)
    }
}

impl ImportResolver for ModuleGraph {
    fn resolve(&self, _store: &Store, import: &Import) -> Result<HostValue, InstantiationError> {
        let name = &import.field;
        let (module, binding) = match self.resolve_export(&import.module, name) {
            Resolution::Resolved { module, binding } => (module, binding),
            Resolution::NotFound => {
                return Err(
                    LinkError(format!("Importing binding name '{name}' is not found.")).into(),
                );
            }
            Resolution::Ambiguous => {
                return Err(LinkError(format!(
                    "Importing binding name '{name}' cannot be resolved due to ambiguous multiple bindings."
                ))
                .into());
            }
            Resolution::Error => {
                return Err(LinkError(
                    "Importing binding name 'default' cannot be resolved by star export entries."
                        .to_string(),
                )
                .into());
            }
        };

        let environment = self
            .records
            .get(&module)
            .and_then(|record| record.environment.as_ref());
        match environment {
            Some(environment) => Ok(environment.get(&binding).cloned().unwrap_or_default()),
            // The target can be part of a cycle that is still being
            // instantiated.
            None => {
                log::debug!(
                    "import {}:{} resolved to unlinked module `{module}`",
                    import.module,
                    import.field
                );
                Ok(HostValue::Undefined)
            }
        }
    }
}
