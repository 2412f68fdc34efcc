use anyhow::{Result, bail};
use std::fmt;
use wasmlink_environ::WASM32_MAX_PAGES;

/// How compiled code addresses linear memory.
///
/// Code compiled for one mode cannot run against a memory created for the
/// other, so instantiating a module against an imported memory may require
/// compiling the module again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryMode {
    /// Every access is explicitly bounds-checked.
    BoundsChecking,
    /// Accesses rely on guard pages and a fault handler.
    Signaling,
}

impl fmt::Display for MemoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryMode::BoundsChecking => write!(f, "bounds-checking"),
            MemoryMode::Signaling => write!(f, "signaling"),
        }
    }
}

/// Global configuration options used to create an [`Engine`](crate::Engine)
/// and customize its behavior.
///
/// This structure exposed a builder-like interface and is primarily consumed by
/// [`Engine::new()`](crate::Engine::new)
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) max_table_elements: u64,
    pub(crate) max_memory_pages: u64,
    pub(crate) memory_mode: MemoryMode,
}

impl Config {
    /// Creates a new configuration object with the default configuration
    /// specified.
    pub fn new() -> Config {
        Config {
            max_table_elements: 10_000_000,
            max_memory_pages: WASM32_MAX_PAGES,
            memory_mode: MemoryMode::BoundsChecking,
        }
    }

    /// Configures the largest number of elements any table created by this
    /// engine may have, whether created by the host or by a module.
    ///
    /// Creating a larger table fails, which surfaces as a link error during
    /// instantiation.
    ///
    /// By default this is 10 million.
    pub fn max_table_elements(&mut self, elements: u64) -> &mut Self {
        self.max_table_elements = elements;
        self
    }

    /// Configures the largest size, in 64KiB pages, of any linear memory
    /// created by this engine.
    ///
    /// By default this is 65536, the whole 32-bit address space.
    pub fn max_memory_pages(&mut self, pages: u64) -> &mut Self {
        self.max_memory_pages = pages;
        self
    }

    /// Configures the [`MemoryMode`] of memories created by this engine.
    ///
    /// Modules are compiled for this mode up front; instantiating against a
    /// memory of another mode compiles on demand.
    ///
    /// By default this is [`MemoryMode::BoundsChecking`].
    pub fn memory_mode(&mut self, mode: MemoryMode) -> &mut Self {
        self.memory_mode = mode;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_memory_pages > WASM32_MAX_PAGES {
            bail!(
                "max_memory_pages of {} exceeds the 32-bit limit of {WASM32_MAX_PAGES} pages",
                self.max_memory_pages
            );
        }
        if self.max_table_elements > u64::from(u32::MAX) {
            bail!(
                "max_table_elements of {} does not fit in a 32-bit table index",
                self.max_table_elements
            );
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}
