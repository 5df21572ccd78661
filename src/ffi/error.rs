//! FFI error type

use std::io;

use nix::errno::Errno;
use thiserror::Error;

/// Error type for FFI operations
#[derive(Debug, Error)]
pub enum FfiError {
    /// Failed to load a library
    #[error("Load error: {0}")]
    LoadError(String),

    /// Symbol not found in library
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Invalid symbol name
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Operation not exposed by a wrapped library
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Two registries declare the same function with different contracts
    #[error("Conflicting signatures for '{0}'")]
    SignatureConflict(String),

    /// The operation's native symbol could not be resolved
    #[error("{0} not implemented.")]
    NotImplemented(String),

    /// OS-level failure: an errno raised by an error-check hook, or a
    /// failed descriptor operation
    #[error("OS error: {0}")]
    Os(#[from] io::Error),

    /// Invalid argument count
    #[error("Invalid argument count: expected {expected}, got {got}")]
    InvalidArgCount { expected: usize, got: usize },

    /// Too many arguments
    #[error("Too many arguments: {0} (max 6)")]
    TooManyArgs(usize),
}

impl FfiError {
    /// OS error carrying the given errno and its platform message
    pub fn from_errno(errno: Errno) -> Self {
        FfiError::Os(io::Error::from_raw_os_error(errno as i32))
    }

    /// Numeric errno carried by an OS-level failure
    pub fn os_code(&self) -> Option<i32> {
        match self {
            FfiError::Os(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Check whether this error comes from an unresolved symbol
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, FfiError::NotImplemented(_))
    }
}
