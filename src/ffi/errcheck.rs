//! Error-check hooks
//!
//! A hook runs right after every native call with the narrowed return value,
//! the symbol that was called, the argument list and the errno captured when
//! the call returned. It passes the value through or turns a C failure
//! convention into an [`FfiError::Os`].

use nix::errno::Errno;

use super::binder::BoundSymbol;
use super::error::FfiError;
use super::types::FfiValue;

/// Signature of an error-check hook
pub type ErrorCheck = fn(FfiValue, &BoundSymbol, &[FfiValue], Errno) -> Result<FfiValue, FfiError>;

/// Fails with the captured errno when an integer-returning call returns -1.
pub fn integer_errcheck(
    result: FfiValue,
    symbol: &BoundSymbol,
    _args: &[FfiValue],
    errno: Errno,
) -> Result<FfiValue, FfiError> {
    if result.as_i64() == Some(-1) {
        log::debug!("{} returned -1 (errno {})", symbol.name(), errno as i32);
        return Err(FfiError::from_errno(errno));
    }
    Ok(result)
}

/// Fails with the captured errno when a pointer-returning call returns NULL.
pub fn pointer_errcheck(
    result: FfiValue,
    symbol: &BoundSymbol,
    _args: &[FfiValue],
    errno: Errno,
) -> Result<FfiValue, FfiError> {
    if result.is_null() {
        log::debug!("{} returned NULL (errno {})", symbol.name(), errno as i32);
        return Err(FfiError::from_errno(errno));
    }
    Ok(result)
}
