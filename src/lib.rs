//! libasm-tester - Native Library Test Harness
//!
//! Loads a libasm shared object (or the platform C library as reference),
//! binds every function of the project to a typed operation and runs it
//! with errno and descriptor traffic captured around the call.
//!
//! # Features
//!
//! - **Typed binding**: each symbol carries its argument and return types and
//!   an optional error-check hook turning `-1`/`NULL` into an OS error
//! - **Placeholders**: functions the library does not export still exist and
//!   fail with `NotImplemented` when called
//! - **Descriptor interception**: bytes staged into pipes before a call and
//!   captured from them after it
//! - **Reference mode**: the same operations over `libc.so.6`, unprefixed,
//!   for differential checks
//!
//! # Example
//!
//! ```no_run
//! use libasm_tester::{FfiValue, LibAsm};
//!
//! let libc = LibAsm::reference()?;
//! let outcome = libc.call("strlen", &[FfiValue::bytes(b"foo")])?;
//! assert_eq!(outcome, 3usize);
//!
//! let libasm = LibAsm::subject("./libasm.so")?;
//! let outcome = libasm.call("ft_strlen", &[FfiValue::bytes(b"foo")])?;
//! assert_eq!(outcome, 3usize);
//! # Ok::<(), libasm_tester::FfiError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │ SignatureRegistry │  mandatory + bonus + tool
//! └─────────┬─────────┘
//!           │ NamingPolicy / BindingMode
//!           ▼
//! ┌───────────────────┐
//! │  WrappedLibrary   │  exposed name -> BoundSymbol
//! └─────────┬─────────┘
//!           │ call_with(name, args, Intercepts)
//!           ▼
//! ┌───────────────────┐
//! │    Intercepts     │  stage writes ─ call ─ capture listens
//! └─────────┬─────────┘
//!           ▼
//!      CallOutcome
//! ```

pub mod builder;
pub mod config;
pub mod ffi;
pub mod harness;
pub mod intercept;
pub mod linked_list;

pub use builder::{BuildError, LibraryBuilder, LinkStatus};
pub use config::{ConfigError, TesterConfig};
pub use ffi::{
    BoundSymbol, CBuffer, DynamicLibrary, FfiError, FfiSignature, FfiType, FfiValue,
    LibrarySource, NativeReturn, SignatureRegistry,
};
pub use harness::compare::{compare, compare_calls, Observed, Projection, Verdict};
pub use harness::libasm::{FunctionCategory, LibAsm};
pub use harness::{BindingMode, CallOutcome, CapturedOutput, NamingPolicy, WrappedLibrary};
pub use intercept::{pipe, FdMode, Intercepts, ListenRequest, WriteRequest};
pub use linked_list::IntList;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
