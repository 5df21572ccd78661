//! C string buffers
//!
//! Owned, zero-filled memory handed to native functions by pointer, plus
//! helpers for reading NUL-terminated strings the native side returns.

use std::ffi::CStr;

use super::types::FfiValue;

/// Zero-filled byte buffer passed to native code as `char *` / `void *`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CBuffer {
    data: Vec<u8>,
}

impl CBuffer {
    /// Create a buffer with the given size, filled with zeros
    pub fn zeroed(size: usize) -> Self {
        Self {
            data: vec![0u8; size],
        }
    }

    /// Create a buffer holding `init` followed by a terminating NUL
    pub fn from_bytes(init: &[u8]) -> Self {
        let mut data = Vec::with_capacity(init.len() + 1);
        data.extend_from_slice(init);
        data.push(0);
        Self { data }
    }

    /// Buffer size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer has no storage at all
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Address of the first byte
    pub fn addr(&self) -> usize {
        self.data.as_ptr() as usize
    }

    /// Pointer argument referring to this buffer.
    ///
    /// The buffer must outlive the call the argument is passed to.
    pub fn as_arg(&mut self) -> FfiValue {
        FfiValue::Pointer(self.data.as_mut_ptr() as usize)
    }

    /// Bytes up to (not including) the first NUL
    pub fn value(&self) -> &[u8] {
        let end = self
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len());
        &self.data[..end]
    }

    /// Whole buffer, including NULs
    pub fn raw(&self) -> &[u8] {
        &self.data
    }

    /// Offset of `addr` inside this buffer, if it points into it
    pub fn offset_of(&self, addr: usize) -> Option<usize> {
        let start = self.addr();
        (addr >= start && addr < start + self.data.len()).then(|| addr - start)
    }
}

/// Copy the NUL-terminated string at `addr`.
///
/// # Safety
///
/// `addr` must point to a readable NUL-terminated string.
pub unsafe fn read_cstr(addr: usize) -> Vec<u8> {
    CStr::from_ptr(addr as *const libc::c_char).to_bytes().to_vec()
}

/// Release memory the native side allocated with `malloc`.
///
/// # Safety
///
/// `addr` must come from the C allocator and not have been freed.
pub unsafe fn free_native(addr: usize) {
    libc::free(addr as *mut libc::c_void);
}
