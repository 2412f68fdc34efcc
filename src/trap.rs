use std::fmt;
use thiserror::Error;

/// A trap code describing the reason for a trap raised by the engine itself.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrapCode {
    /// An out-of-bounds memory access.
    MemoryOutOfBounds,
    /// An out-of-bounds access to a table.
    TableOutOfBounds,
    /// Indirect call to a null table entry.
    IndirectCallToNull,
    /// Signature mismatch on indirect call, or a host function returning
    /// values of the wrong type.
    BadSignature,
    /// An integer arithmetic operation caused an overflow.
    IntegerOverflow,
    /// An integer division by zero.
    IntegerDivisionByZero,
    /// Code that was supposed to have been unreachable was reached.
    UnreachableCodeReached,
    /// A null reference was dereferenced.
    NullReference,
}

impl fmt::Display for TrapCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = match self {
            TrapCode::MemoryOutOfBounds => "out of bounds memory access",
            TrapCode::TableOutOfBounds => "undefined element: out of bounds table access",
            TrapCode::IndirectCallToNull => "uninitialized element",
            TrapCode::BadSignature => "indirect call type mismatch",
            TrapCode::IntegerOverflow => "integer overflow",
            TrapCode::IntegerDivisionByZero => "integer divide by zero",
            TrapCode::UnreachableCodeReached => "wasm `unreachable` instruction executed",
            TrapCode::NullReference => "null reference",
        };
        write!(f, "{desc}")
    }
}

/// An abnormal termination of a function, either raised by the engine or
/// by host code.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Trap {
    /// A trap raised by the engine.
    #[error("wasm trap: {0}")]
    Wasm(TrapCode),
    /// A trap raised by a host function.
    #[error("{0}")]
    User(String),
}

impl Trap {
    /// Creates a trap carrying a host-provided message.
    pub fn user(message: impl Into<String>) -> Trap {
        Trap::User(message.into())
    }

    /// Returns the engine trap code, if this trap was raised by the engine.
    pub fn trap_code(&self) -> Option<TrapCode> {
        match self {
            Trap::Wasm(code) => Some(*code),
            Trap::User(_) => None,
        }
    }
}

impl From<TrapCode> for Trap {
    fn from(code: TrapCode) -> Trap {
        Trap::Wasm(code)
    }
}
