//! Call outcomes
//!
//! What one invocation of a wrapped operation produced: the return value,
//! bytes captured from intercepted descriptors and the errno snapshot.

use std::collections::BTreeMap;
use std::os::fd::RawFd;

use crate::ffi::{FfiValue, NativeReturn};

/// Bytes read back from a listened descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub bytes: Vec<u8>,
    /// Descriptor the bytes were read from
    pub listened_on: RawFd,
}

/// Result of one call through a [`WrappedLibrary`](super::WrappedLibrary)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    return_value: FfiValue,
    /// Keyed by the descriptor the native function wrote to
    outputs: BTreeMap<RawFd, CapturedOutput>,
    errno: Option<i32>,
}

impl CallOutcome {
    /// Outcome with no captured output and no errno
    pub fn new(return_value: impl Into<FfiValue>) -> Self {
        Self {
            return_value: return_value.into(),
            outputs: BTreeMap::new(),
            errno: None,
        }
    }

    pub fn from_native(native: NativeReturn) -> Self {
        Self {
            return_value: native.value,
            outputs: BTreeMap::new(),
            errno: native.errno,
        }
    }

    /// Record bytes captured after the call.
    ///
    /// Each listen request adds exactly one entry; a second capture for the
    /// same write descriptor replaces the first.
    pub fn add_output(&mut self, bytes: Vec<u8>, listened_on: RawFd, written_to: RawFd) {
        self.outputs.insert(written_to, CapturedOutput { bytes, listened_on });
    }

    pub fn return_value(&self) -> &FfiValue {
        &self.return_value
    }

    pub fn outputs(&self) -> &BTreeMap<RawFd, CapturedOutput> {
        &self.outputs
    }

    /// Output captured for the descriptor the call wrote to
    pub fn output(&self, written_to: RawFd) -> Option<&CapturedOutput> {
        self.outputs.get(&written_to)
    }

    /// errno at call completion, `None` when it was left at 0
    pub fn errno(&self) -> Option<i32> {
        self.errno
    }

    /// Consume the outcome, keeping only the return value
    pub fn into_value(self) -> FfiValue {
        self.return_value
    }
}

impl From<NativeReturn> for CallOutcome {
    fn from(native: NativeReturn) -> Self {
        Self::from_native(native)
    }
}

// A bare value stands for an outcome that captured nothing and left errno
// untouched.
impl PartialEq<FfiValue> for CallOutcome {
    fn eq(&self, other: &FfiValue) -> bool {
        self.outputs.is_empty() && self.errno.is_none() && self.return_value == *other
    }
}

macro_rules! outcome_eq_scalar {
    ($($t:ty),*) => {
        $(impl PartialEq<$t> for CallOutcome {
            fn eq(&self, other: &$t) -> bool {
                *self == FfiValue::from(*other)
            }
        })*
    };
}

outcome_eq_scalar!(i32, i64, u32, u64, usize);
