//! Symbol Binder
//!
//! Turns a registry entry into something callable: either a resolved native
//! entry point carrying its signature, or a placeholder that fails with
//! [`FfiError::NotImplemented`] whenever it is invoked.

use std::sync::Arc;

use nix::errno::Errno;

use super::loader::DynamicLibrary;
use super::types::{FfiSignature, FfiValue, MAX_ARGS};
use super::FfiError;

/// What a native call produced, before any envelope is built
#[derive(Debug, Clone, PartialEq)]
pub struct NativeReturn {
    /// Return value, after the error-check hook
    pub value: FfiValue,
    /// errno when the call returned (`None` if the call left it at 0)
    pub errno: Option<i32>,
}

/// A native entry point bound to its calling contract
pub enum BoundSymbol {
    /// Symbol found in the library
    Resolved {
        /// Calling contract applied to every call
        signature: FfiSignature,
        /// Entry point address
        address: usize,
        /// Keeps the library mapped while the symbol is alive
        library: Arc<DynamicLibrary>,
    },
    /// Symbol missing from the library
    Placeholder {
        /// Stand-in contract (undeclared arguments, void return)
        signature: FfiSignature,
    },
}

impl BoundSymbol {
    /// Resolve `symbol` in `library` and attach `signature`.
    ///
    /// A missing symbol is not an error here; a placeholder named after the
    /// symbol takes its place.
    pub fn bind(library: &Arc<DynamicLibrary>, symbol: &str, signature: &FfiSignature) -> Self {
        match library.get_symbol(symbol) {
            Ok(address) => {
                log::debug!("bound {} at {:#x} as {}", symbol, address, signature);
                let mut signature = signature.clone();
                signature.name = symbol.to_string();
                BoundSymbol::Resolved {
                    signature,
                    address,
                    library: Arc::clone(library),
                }
            }
            Err(e) => {
                log::warn!("{}; substituting a placeholder", e);
                BoundSymbol::placeholder(symbol)
            }
        }
    }

    /// A stand-in for a symbol that could not be resolved
    pub fn placeholder(name: impl Into<String>) -> Self {
        BoundSymbol::Placeholder {
            signature: FfiSignature::undeclared(name),
        }
    }

    /// Symbol name
    pub fn name(&self) -> &str {
        &self.signature().name
    }

    /// Calling contract of this symbol
    pub fn signature(&self) -> &FfiSignature {
        match self {
            BoundSymbol::Resolved { signature, .. } | BoundSymbol::Placeholder { signature } => {
                signature
            }
        }
    }

    /// Check whether the native symbol was found
    pub fn is_resolved(&self) -> bool {
        matches!(self, BoundSymbol::Resolved { .. })
    }

    /// Library the symbol was resolved in
    pub fn library(&self) -> Option<&Arc<DynamicLibrary>> {
        match self {
            BoundSymbol::Resolved { library, .. } => Some(library),
            BoundSymbol::Placeholder { .. } => None,
        }
    }

    /// Call the native function.
    ///
    /// errno is cleared right before the call and read right after it; the
    /// error-check hook, if any, sees the narrowed return value together
    /// with that snapshot.
    pub fn invoke(&self, args: &[FfiValue]) -> Result<NativeReturn, FfiError> {
        let (signature, address) = match self {
            BoundSymbol::Resolved {
                signature, address, ..
            } => (signature, *address),
            BoundSymbol::Placeholder { signature } => {
                return Err(FfiError::NotImplemented(signature.name.clone()));
            }
        };

        if !signature.validate_args(args.len()) {
            return Err(FfiError::InvalidArgCount {
                expected: signature.params.len(),
                got: args.len(),
            });
        }
        if args.len() > MAX_ARGS {
            return Err(FfiError::TooManyArgs(args.len()));
        }

        let words: Vec<u64> = args.iter().map(FfiValue::to_word).collect();

        clear_errno();
        // Safety: the address came from dlsym and is called with the arity
        // the caller supplied; matching the real prototype is the registry's
        // responsibility.
        let raw = unsafe { call_words(address, &words) };
        let errno = Errno::last();

        let value = signature.return_type.from_word(raw);
        let value = match signature.error_check {
            Some(check) => check(value, self, args, errno)?,
            None => value,
        };

        Ok(NativeReturn {
            value,
            errno: match errno as i32 {
                0 => None,
                code => Some(code),
            },
        })
    }
}

impl std::fmt::Debug for BoundSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundSymbol::Resolved {
                signature, address, ..
            } => f
                .debug_struct("Resolved")
                .field("signature", signature)
                .field("address", &format_args!("{:#x}", address))
                .finish(),
            BoundSymbol::Placeholder { signature } => f
                .debug_struct("Placeholder")
                .field("name", &signature.name)
                .finish(),
        }
    }
}

fn clear_errno() {
    // Safety: the errno location is thread-local and always valid.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    unsafe {
        *libc::__errno_location() = 0;
    }
    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    unsafe {
        *libc::__error() = 0;
    }
}

// Every supported argument travels in an integer register, so one
// `extern "C"` shape per arity covers all declared signatures. Narrow
// integer returns are fixed up afterwards by `FfiType::from_word`.
unsafe fn call_words(addr: usize, w: &[u64]) -> u64 {
    type Fn0 = extern "C" fn() -> u64;
    type Fn1 = extern "C" fn(u64) -> u64;
    type Fn2 = extern "C" fn(u64, u64) -> u64;
    type Fn3 = extern "C" fn(u64, u64, u64) -> u64;
    type Fn4 = extern "C" fn(u64, u64, u64, u64) -> u64;
    type Fn5 = extern "C" fn(u64, u64, u64, u64, u64) -> u64;
    type Fn6 = extern "C" fn(u64, u64, u64, u64, u64, u64) -> u64;

    match w.len() {
        0 => std::mem::transmute::<usize, Fn0>(addr)(),
        1 => std::mem::transmute::<usize, Fn1>(addr)(w[0]),
        2 => std::mem::transmute::<usize, Fn2>(addr)(w[0], w[1]),
        3 => std::mem::transmute::<usize, Fn3>(addr)(w[0], w[1], w[2]),
        4 => std::mem::transmute::<usize, Fn4>(addr)(w[0], w[1], w[2], w[3]),
        5 => std::mem::transmute::<usize, Fn5>(addr)(w[0], w[1], w[2], w[3], w[4]),
        _ => std::mem::transmute::<usize, Fn6>(addr)(w[0], w[1], w[2], w[3], w[4], w[5]),
    }
}
