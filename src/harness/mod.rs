//! Library Wrapper
//!
//! One object exposing every registered function of a native library as a
//! named operation. Each operation is bound once, at construction, to either
//! the native symbol or a placeholder; calls go through the descriptor
//! interception pipeline and come back as a [`CallOutcome`].
//!
//! # Naming
//!
//! ```text
//!                 Subject (default)     Reference
//! strlen          ft_strlen             strlen
//! list_size*      ft_list_size          ft_list_size
//!
//! * extra: always prefixed, no reference exists on the platform
//! ```
//!
//! The native symbol looked up is the exposed name, so a subject library
//! must export `ft_strlen` while the platform C library provides `strlen`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::ffi::{
    BoundSymbol, DynamicLibrary, FfiError, FfiValue, LibrarySource, NativeReturn,
    SignatureRegistry,
};
use crate::intercept::Intercepts;

pub mod compare;
pub mod libasm;
mod outcome;

pub use outcome::{CallOutcome, CapturedOutput};

/// Default prefix of subject operations
pub const DEFAULT_PREFIX: &str = "ft_";

/// Which side of a comparison a wrapped library plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingMode {
    /// Platform implementation, exposed under bare names
    Reference,
    /// Library under test, exposed under prefixed names
    #[default]
    Subject,
}

/// How function names map to exposed operation names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPolicy {
    prefix: String,
    extras: BTreeSet<String>,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl NamingPolicy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extras: BTreeSet::new(),
        }
    }

    /// Functions that keep the prefix in reference mode too
    pub fn with_extras<I, S>(mut self, extras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extras.extend(extras.into_iter().map(Into::into));
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_extra(&self, function: &str) -> bool {
        self.extras.contains(function)
    }

    /// Operation name for `function` under `mode`
    pub fn exposed_name(&self, function: &str, mode: BindingMode) -> String {
        if mode == BindingMode::Subject || self.is_extra(function) {
            format!("{}{}", self.prefix, function)
        } else {
            function.to_string()
        }
    }
}

/// A native library with every registered function bound to an operation
#[derive(Debug)]
pub struct WrappedLibrary {
    library: Arc<DynamicLibrary>,
    functions: SignatureRegistry,
    /// Exposed operation name -> bound symbol
    operations: BTreeMap<String, BoundSymbol>,
    /// Function name -> exposed operation name
    exposed: BTreeMap<String, String>,
    policy: NamingPolicy,
    mode: BindingMode,
}

impl WrappedLibrary {
    /// Load `source` and bind every function of `functions`.
    ///
    /// Only a failure to load the library itself is an error. Functions the
    /// library does not export become placeholders.
    pub fn new(
        source: LibrarySource,
        functions: SignatureRegistry,
        policy: NamingPolicy,
        mode: BindingMode,
    ) -> Result<Self, FfiError> {
        let library = source.open()?;

        let mut operations = BTreeMap::new();
        let mut exposed = BTreeMap::new();
        for signature in functions.iter() {
            let name = policy.exposed_name(&signature.name, mode);
            let symbol = BoundSymbol::bind(&library, &name, signature);
            exposed.insert(signature.name.clone(), name.clone());
            operations.insert(name, symbol);
        }

        let missing = operations.values().filter(|s| !s.is_resolved()).count();
        log::debug!(
            "wrapped {} ({:?}): {} operations, {} placeholders",
            library.path().display(),
            mode,
            operations.len(),
            missing
        );

        Ok(Self {
            library,
            functions,
            operations,
            exposed,
            policy,
            mode,
        })
    }

    pub fn library(&self) -> &Arc<DynamicLibrary> {
        &self.library
    }

    /// Registry the operations were built from
    pub fn functions(&self) -> &SignatureRegistry {
        &self.functions
    }

    pub fn policy(&self) -> &NamingPolicy {
        &self.policy
    }

    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    /// Exposed operation names, sorted
    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    /// Operation name a registered function is exposed under
    pub fn exposed_name(&self, function: &str) -> Option<&str> {
        self.exposed.get(function).map(String::as_str)
    }

    /// Bound symbol behind an operation
    pub fn operation(&self, name: &str) -> Result<&BoundSymbol, FfiError> {
        self.operations
            .get(name)
            .ok_or_else(|| FfiError::UnknownOperation(name.to_string()))
    }

    /// Check whether an operation is backed by a native symbol
    pub fn is_resolved(&self, name: &str) -> bool {
        self.operations.get(name).is_some_and(BoundSymbol::is_resolved)
    }

    /// Call an operation and wrap its result
    pub fn call(&self, name: &str, args: &[FfiValue]) -> Result<CallOutcome, FfiError> {
        self.call_with(name, args, Intercepts::new())
    }

    /// Call an operation with descriptor interception around it
    pub fn call_with(
        &self,
        name: &str,
        args: &[FfiValue],
        intercepts: Intercepts,
    ) -> Result<CallOutcome, FfiError> {
        let symbol = self.operation(name)?;
        intercepts.run(|| symbol.invoke(args))
    }

    /// Call an operation without building an outcome
    pub fn call_raw(&self, name: &str, args: &[FfiValue]) -> Result<NativeReturn, FfiError> {
        self.operation(name)?.invoke(args)
    }

    /// Call a registered function by its unprefixed name
    pub fn call_function(
        &self,
        function: &str,
        args: &[FfiValue],
        intercepts: Intercepts,
    ) -> Result<CallOutcome, FfiError> {
        let name = self
            .exposed_name(function)
            .ok_or_else(|| FfiError::UnknownOperation(function.to_string()))?;
        self.call_with(name, args, intercepts)
    }
}
