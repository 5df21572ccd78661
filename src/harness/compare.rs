//! Differential comparison
//!
//! Runs the same function on a subject and a reference library and checks
//! that both behave alike. Raw results are first projected onto what can
//! be compared across libraries: pointers differ between processes' heaps,
//! and `strcmp` only promises a sign.

use std::cmp::Ordering;
use std::fmt;

use crate::ffi::{read_cstr, FfiError, FfiValue};
use crate::intercept::Intercepts;

use super::{CallOutcome, WrappedLibrary};

/// How a return value is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// The value itself
    Value,
    /// Sign of an integer
    Sign,
    /// String a non-null `char *` points to
    Text,
}

/// A projected return value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projected {
    Value(FfiValue),
    Sign(Ordering),
    Text(Vec<u8>),
}

impl fmt::Display for Projected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projected::Value(v) => write!(f, "{:?}", v),
            Projected::Sign(Ordering::Less) => write!(f, "< 0"),
            Projected::Sign(Ordering::Equal) => write!(f, "0"),
            Projected::Sign(Ordering::Greater) => write!(f, "> 0"),
            Projected::Text(t) if t.len() > 32 => write!(
                f,
                "{:?}... ({} bytes)",
                String::from_utf8_lossy(&t[..16]),
                t.len()
            ),
            Projected::Text(t) => write!(f, "{:?}", String::from_utf8_lossy(t)),
        }
    }
}

/// What one side of a comparison did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Returned {
        value: Projected,
        /// Captured bytes, in descriptor order
        outputs: Vec<Vec<u8>>,
    },
    OsError(i32),
    NotImplemented,
    Failed(String),
}

impl Observed {
    pub fn observe(result: &Result<CallOutcome, FfiError>, projection: Projection) -> Self {
        match result {
            Ok(outcome) => Self::returned(outcome, projection),
            Err(e) => Self::failed(e),
        }
    }

    pub fn returned(outcome: &CallOutcome, projection: Projection) -> Self {
        Observed::Returned {
            value: project(outcome.return_value(), projection),
            outputs: outcome
                .outputs()
                .values()
                .map(|o| o.bytes.clone())
                .collect(),
        }
    }

    pub fn failed(error: &FfiError) -> Self {
        match error {
            FfiError::NotImplemented(_) => Observed::NotImplemented,
            e => match e.os_code() {
                Some(code) => Observed::OsError(code),
                None => Observed::Failed(e.to_string()),
            },
        }
    }
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Returned { value, outputs } if outputs.is_empty() => write!(f, "{}", value),
            Observed::Returned { value, outputs } => {
                write!(f, "{} (captured", value)?;
                for out in outputs {
                    write!(f, " {:?}", String::from_utf8_lossy(out))?;
                }
                write!(f, ")")
            }
            Observed::OsError(code) => {
                write!(f, "errno {} ({})", code, std::io::Error::from_raw_os_error(*code))
            }
            Observed::NotImplemented => write!(f, "not implemented"),
            Observed::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

fn project(value: &FfiValue, projection: Projection) -> Projected {
    match (projection, value) {
        (Projection::Sign, v) => match v.as_i64() {
            Some(n) => Projected::Sign(n.cmp(&0)),
            None => Projected::Value(v.clone()),
        },
        (Projection::Text, FfiValue::Bytes(b)) => {
            Projected::Text(b.strip_suffix(&[0u8]).unwrap_or(b).to_vec())
        }
        (Projection::Text, FfiValue::Pointer(addr)) => {
            // Safety: Text is only requested for functions returning a
            // NUL-terminated string.
            Projected::Text(unsafe { read_cstr(*addr) })
        }
        (_, v) => Projected::Value(v.clone()),
    }
}

/// Outcome of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Match(Observed),
    Mismatch { subject: Observed, reference: Observed },
}

impl Verdict {
    pub fn of(subject: Observed, reference: Observed) -> Self {
        if subject == reference {
            Verdict::Match(subject)
        } else {
            Verdict::Mismatch { subject, reference }
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Match(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Match(observed) => write!(f, "ok: {}", observed),
            Verdict::Mismatch { subject, reference } => {
                write!(f, "MISMATCH: got {}, expected {}", subject, reference)
            }
        }
    }
}

/// Compare two results already obtained
pub fn compare(
    subject: &Result<CallOutcome, FfiError>,
    reference: &Result<CallOutcome, FfiError>,
    projection: Projection,
) -> Verdict {
    Verdict::of(
        Observed::observe(subject, projection),
        Observed::observe(reference, projection),
    )
}

/// Call `function` on both libraries with the same arguments and compare.
///
/// Arguments must not point to memory the call writes to; give each side
/// its own buffers and use [`compare`] for that.
pub fn compare_calls(
    subject: &WrappedLibrary,
    reference: &WrappedLibrary,
    function: &str,
    args: &[FfiValue],
    projection: Projection,
) -> Verdict {
    let got = subject.call_function(function, args, Intercepts::new());
    let expected = reference.call_function(function, args, Intercepts::new());
    let verdict = compare(&got, &expected, projection);
    log::debug!("{}{:?}: {}", function, args, verdict);
    verdict
}
