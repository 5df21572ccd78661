//! libasm bindings
//!
//! Function tables of the libasm project and a [`WrappedLibrary`] built
//! from them, either over the library under test or over the platform C
//! library as reference.

use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;

use crate::ffi::{
    integer_errcheck, pointer_errcheck, FfiError, FfiSignature, FfiType, FfiValue, LibrarySource,
    SignatureRegistry,
};
use crate::intercept::Intercepts;

use super::{BindingMode, CallOutcome, NamingPolicy, WrappedLibrary, DEFAULT_PREFIX};

/// System library used as reference
pub const REFERENCE_LIBRARY: &str = "libc.so.6";

/// Part of the project a function belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCategory {
    Mandatory,
    /// No reference on the platform; always prefixed
    Bonus,
    /// Helpers used by the tests themselves
    Tool,
}

impl FunctionCategory {
    pub const ALL: [FunctionCategory; 3] = [
        FunctionCategory::Mandatory,
        FunctionCategory::Bonus,
        FunctionCategory::Tool,
    ];

    /// Signatures of this category, in declaration order
    pub fn signatures(self) -> Vec<FfiSignature> {
        use FfiType::*;

        match self {
            FunctionCategory::Mandatory => vec![
                FfiSignature::new("strlen", vec![CStr], Size),
                FfiSignature::new("strcpy", vec![Ptr, CStr], Ptr),
                FfiSignature::new("strcmp", vec![CStr, CStr], I32),
                FfiSignature::new("write", vec![I32, Ptr, Size], SSize)
                    .with_error_check(integer_errcheck),
                FfiSignature::new("read", vec![I32, Ptr, Size], SSize)
                    .with_error_check(integer_errcheck),
                FfiSignature::new("strdup", vec![CStr], CStr).with_error_check(pointer_errcheck),
            ],
            FunctionCategory::Bonus => vec![
                FfiSignature::new("atoi_base", vec![CStr, CStr], I32),
                // t_list **begin_list, void *data
                FfiSignature::new("list_push_front", vec![Ptr, Ptr], Void),
                FfiSignature::new("list_size", vec![Ptr], I32),
                // t_list **begin_list, int (*cmp)()
                FfiSignature::new("list_sort", vec![Ptr, FnPtr], Void),
                // t_list **begin_list, void *data_ref, int (*cmp)(), void (*free_fct)(void *)
                FfiSignature::new("list_remove_if", vec![Ptr, Ptr, FnPtr, FnPtr], Void),
            ],
            FunctionCategory::Tool => vec![FfiSignature::new("strchr", vec![Ptr, I32], Ptr)],
        }
    }

    pub fn registry(self) -> Result<SignatureRegistry, FfiError> {
        SignatureRegistry::from_signatures(self.signatures())
    }

    /// Category a function name belongs to
    pub fn of(function: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.signatures().iter().any(|s| s.name == function))
    }
}

impl fmt::Display for FunctionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionCategory::Mandatory => write!(f, "mandatory"),
            FunctionCategory::Bonus => write!(f, "bonus"),
            FunctionCategory::Tool => write!(f, "tool"),
        }
    }
}

/// Every libasm function: mandatory, bonus, then tool
pub fn registry() -> Result<SignatureRegistry, FfiError> {
    FunctionCategory::Mandatory
        .registry()?
        .merge(&FunctionCategory::Bonus.registry()?)?
        .merge(&FunctionCategory::Tool.registry()?)
}

/// Naming policy with the bonus functions as always-prefixed extras
pub fn naming_policy(prefix: &str) -> NamingPolicy {
    NamingPolicy::new(prefix).with_extras(
        FunctionCategory::Bonus
            .signatures()
            .into_iter()
            .map(|s| s.name),
    )
}

/// A libasm build, or the platform C library standing in for one
#[derive(Debug)]
pub struct LibAsm {
    inner: WrappedLibrary,
}

impl LibAsm {
    pub fn open(source: LibrarySource, prefix: &str, mode: BindingMode) -> Result<Self, FfiError> {
        let inner = WrappedLibrary::new(source, registry()?, naming_policy(prefix), mode)?;
        Ok(Self { inner })
    }

    /// The library under test at `path`, with `ft_` operations
    pub fn subject(path: impl Into<PathBuf>) -> Result<Self, FfiError> {
        Self::open(LibrarySource::Path(path.into()), DEFAULT_PREFIX, BindingMode::Subject)
    }

    /// The platform C library with bare operation names
    pub fn reference() -> Result<Self, FfiError> {
        Self::open(
            LibrarySource::System(REFERENCE_LIBRARY.to_string()),
            DEFAULT_PREFIX,
            BindingMode::Reference,
        )
    }

    fn call_fn(&self, function: &str, args: &[FfiValue]) -> Result<CallOutcome, FfiError> {
        self.inner.call_function(function, args, Intercepts::new())
    }

    pub fn strlen(&self, s: &[u8]) -> Result<CallOutcome, FfiError> {
        self.call_fn("strlen", &[FfiValue::bytes(s)])
    }

    pub fn strcmp(&self, s1: &[u8], s2: &[u8]) -> Result<CallOutcome, FfiError> {
        self.call_fn("strcmp", &[FfiValue::bytes(s1), FfiValue::bytes(s2)])
    }

    /// `dst` must hold at least `src.len() + 1` bytes
    pub fn strcpy(&self, dst: FfiValue, src: &[u8]) -> Result<CallOutcome, FfiError> {
        self.call_fn("strcpy", &[dst, FfiValue::bytes(src)])
    }

    /// The returned pointer is owned by the caller and released with
    /// [`free_native`](crate::ffi::free_native)
    pub fn strdup(&self, s: &[u8]) -> Result<CallOutcome, FfiError> {
        self.call_fn("strdup", &[FfiValue::bytes(s)])
    }

    pub fn write(
        &self,
        fd: i32,
        buf: FfiValue,
        count: usize,
        intercepts: Intercepts,
    ) -> Result<CallOutcome, FfiError> {
        self.inner
            .call_function("write", &[fd.into(), buf, count.into()], intercepts)
    }

    pub fn read(
        &self,
        fd: i32,
        buf: FfiValue,
        count: usize,
        intercepts: Intercepts,
    ) -> Result<CallOutcome, FfiError> {
        self.inner
            .call_function("read", &[fd.into(), buf, count.into()], intercepts)
    }

    pub fn into_inner(self) -> WrappedLibrary {
        self.inner
    }
}

impl Deref for LibAsm {
    type Target = WrappedLibrary;

    fn deref(&self) -> &WrappedLibrary {
        &self.inner
    }
}
