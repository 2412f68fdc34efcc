use crate::{Trap, TrapCode};
use thiserror::Error;
use wasmlink_environ::Import;

/// The host API was used incorrectly, for example an import namespace that
/// is not an object or a function import that is not callable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TypeError(pub String);

impl TypeError {
    pub(crate) fn import(import: &Import, before: &str, after: &str) -> TypeError {
        TypeError(import_message(import, before, after))
    }
}

/// A provided import does not match the shape or type the module declared,
/// or a module-owned resource could not be constructed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct LinkError(pub String);

impl LinkError {
    pub(crate) fn import(import: &Import, before: &str, after: &str) -> LinkError {
        LinkError(import_message(import, before, after))
    }
}

fn import_message(import: &Import, before: &str, after: &str) -> String {
    format!("{before} {}:{} {after}", import.module, import.field)
}

/// Execution failed after linking: a constant expression could not be
/// evaluated, a segment did not fit, or the start function trapped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RuntimeError {
    message: String,
    trap: Option<Trap>,
}

impl RuntimeError {
    pub(crate) fn new(message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            message: message.into(),
            trap: None,
        }
    }

    pub(crate) fn with_trap(message: impl Into<String>, trap: impl Into<Trap>) -> RuntimeError {
        RuntimeError {
            message: message.into(),
            trap: Some(trap.into()),
        }
    }

    pub(crate) fn const_expr(cause: &anyhow::Error) -> RuntimeError {
        RuntimeError::new(format!("couldn't evaluate constant expression: {cause:#}"))
    }

    /// The trap that caused this error, if it was raised by executing code.
    pub fn trap(&self) -> Option<&Trap> {
        self.trap.as_ref()
    }

    /// Shorthand for the engine trap code of [`RuntimeError::trap`].
    pub fn trap_code(&self) -> Option<TrapCode> {
        self.trap.as_ref().and_then(Trap::trap_code)
    }

    /// The human-readable description of this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Trap> for RuntimeError {
    fn from(trap: Trap) -> RuntimeError {
        RuntimeError {
            message: trap.to_string(),
            trap: Some(trap),
        }
    }
}

/// An error while instantiating a module.
///
/// Every phase of instantiation fails fast; when this is returned no
/// [`Instance`](crate::Instance) is handed back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstantiationError {
    /// The host API was misused.
    #[error("TypeError: {0}")]
    Type(#[from] TypeError),

    /// A wasm link error occurred.
    #[error("LinkError: {0}")]
    Link(#[from] LinkError),

    /// A trap occurred during instantiation, after linking.
    #[error("RuntimeError: {0}")]
    Runtime(#[from] RuntimeError),
}

impl InstantiationError {
    /// Returns the link error, if this is one.
    pub fn as_link(&self) -> Option<&LinkError> {
        match self {
            InstantiationError::Link(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the runtime error, if this is one.
    pub fn as_runtime(&self) -> Option<&RuntimeError> {
        match self {
            InstantiationError::Runtime(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the type error, if this is one.
    pub fn as_type(&self) -> Option<&TypeError> {
        match self {
            InstantiationError::Type(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Trap> for InstantiationError {
    fn from(trap: Trap) -> InstantiationError {
        InstantiationError::Runtime(trap.into())
    }
}
