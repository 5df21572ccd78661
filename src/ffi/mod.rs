//! FFI Module
//!
//! Binds exported symbols of a native shared library to typed, callable
//! entries.
//!
//! # Architecture
//!
//! ```text
//! SignatureRegistry (name -> FfiSignature)
//!       │
//!       ▼
//! DynamicLibrary (libloading)  ── symbol lookup
//!       │
//!       ▼
//! BoundSymbol::Resolved | BoundSymbol::Placeholder
//!       │
//!       ▼
//! Native call ── errno snapshot ── ErrorCheck hook
//! ```
//!
//! # Example
//!
//! ```ignore
//! let libc = Arc::new(DynamicLibrary::load_system("libc.so.6")?);
//! let sig = FfiSignature::new("strlen", vec![FfiType::CStr], FfiType::Size);
//! let strlen = BoundSymbol::bind(&libc, "strlen", &sig);
//! let ret = strlen.invoke(&[FfiValue::bytes(b"foo")])?;
//! assert_eq!(ret.value, FfiValue::UInt(3));
//! ```

mod binder;
mod buffer;
mod errcheck;
mod error;
mod loader;
mod registry;
mod types;

pub use binder::{BoundSymbol, NativeReturn};
pub use buffer::{free_native, read_cstr, CBuffer};
pub use errcheck::{integer_errcheck, pointer_errcheck, ErrorCheck};
pub use error::FfiError;
pub use loader::{DynamicLibrary, LibrarySource};
pub use registry::SignatureRegistry;
pub use types::{FfiSignature, FfiType, FfiValue, MAX_ARGS};

#[cfg(test)]
mod tests;
