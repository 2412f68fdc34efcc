use crate::Extern;
use indexmap::IndexMap;
use std::rc::Rc;

/// The frozen exports of an instance, in declaration order.
///
/// The surface is built once, when instantiation assembles it, and never
/// changes afterwards. Clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct ExportSurface {
    exports: Rc<IndexMap<String, Extern>>,
}

impl ExportSurface {
    pub(crate) fn new(exports: Rc<IndexMap<String, Extern>>) -> ExportSurface {
        ExportSurface { exports }
    }

    /// Returns the export named `name`.
    pub fn get(&self, name: &str) -> Option<Extern> {
        self.exports.get(name).copied()
    }

    /// Whether an export named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.exports.contains_key(name)
    }

    /// Iterates over the exports in declaration order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, Extern)> + '_ {
        self.exports.iter().map(|(name, ext)| (name.as_str(), *ext))
    }

    /// Iterates over the export names in declaration order.
    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.exports.keys().map(String::as_str)
    }

    /// The number of exports.
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    /// Whether there are no exports.
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}
