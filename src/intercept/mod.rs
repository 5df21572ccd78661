//! Descriptor interception
//!
//! Stages bytes into file descriptors before a native call and captures
//! bytes from file descriptors after it, so that functions such as `read`
//! and `write` can be driven and observed through pipes.
//!
//! # Ordering
//!
//! ```text
//! write requests ── stage + close, one at a time
//!       │
//!       ▼
//! listen requests armed (descriptors held open)
//!       │
//!       ▼
//! native call  ──►  CallOutcome
//!       │
//!       ▼
//! listen requests: close paired writer, read source, add_output
//! ```
//!
//! Every descriptor handed to a request is owned by that request and is
//! closed on every path out of [`Intercepts::run`], including errors from
//! staging, from the native call or from another capture.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::fcntl::OFlag;
use nix::unistd::pipe2;

use crate::ffi::{FfiError, NativeReturn};
use crate::harness::CallOutcome;

/// How bytes crossing an intercepted descriptor are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FdMode {
    /// Raw bytes
    #[default]
    Binary,
    /// ASCII text; anything else is rejected with `InvalidData`
    Text,
}

impl FdMode {
    fn check(self, data: &[u8]) -> io::Result<()> {
        if self == FdMode::Text && !data.is_ascii() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "non-ASCII bytes on a text-mode descriptor",
            ));
        }
        Ok(())
    }
}

/// Bytes to write into a descriptor before the call
#[derive(Debug)]
pub struct WriteRequest {
    target: OwnedFd,
    payload: Vec<u8>,
    count: Option<usize>,
    paired_listen: Option<RawFd>,
    mode: FdMode,
}

impl WriteRequest {
    /// Write all of `payload` into `target`, then close it
    pub fn new(target: OwnedFd, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            target,
            payload: payload.into(),
            count: None,
            paired_listen: None,
            mode: FdMode::Binary,
        }
    }

    /// Only write the first `count` bytes of the payload
    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Descriptor the native function reads the staged bytes from
    pub fn paired_with(mut self, listen_fd: RawFd) -> Self {
        self.paired_listen = Some(listen_fd);
        self
    }

    /// Set the descriptor mode
    pub fn mode(mut self, mode: FdMode) -> Self {
        self.mode = mode;
        self
    }

    /// Descriptor being written to
    pub fn target_fd(&self) -> RawFd {
        self.target.as_raw_fd()
    }

    fn stage(self) -> Result<(), FfiError> {
        let WriteRequest {
            target,
            payload,
            count,
            paired_listen,
            mode,
        } = self;
        let end = count.map_or(payload.len(), |n| n.min(payload.len()));
        let data = &payload[..end];
        mode.check(data)?;
        log::debug!(
            "staging {} bytes into fd {} (read back on {:?})",
            data.len(),
            target.as_raw_fd(),
            paired_listen
        );

        let mut file = File::from(target);
        file.write_all(data)?;
        file.flush()?;
        // `file` closes the descriptor here, on success or failure alike.
        Ok(())
    }
}

/// Bytes to read from a descriptor after the call
#[derive(Debug)]
pub struct ListenRequest {
    source: OwnedFd,
    paired_write: OwnedFd,
    count: Option<usize>,
    mode: FdMode,
}

impl ListenRequest {
    /// Capture everything written to `paired_write` as read from `source`.
    ///
    /// `paired_write` is the descriptor the native function writes to; it
    /// is closed once the call returns so that reading `source` sees EOF.
    pub fn new(source: OwnedFd, paired_write: OwnedFd) -> Self {
        Self {
            source,
            paired_write,
            count: None,
            mode: FdMode::Binary,
        }
    }

    /// Read at most `count` bytes instead of reading to EOF
    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Set the descriptor mode
    pub fn mode(mut self, mode: FdMode) -> Self {
        self.mode = mode;
        self
    }

    /// Descriptor being read from
    pub fn source_fd(&self) -> RawFd {
        self.source.as_raw_fd()
    }

    /// Descriptor the captured bytes are recorded under
    pub fn paired_write_fd(&self) -> RawFd {
        self.paired_write.as_raw_fd()
    }

    fn collect(self, outcome: &mut CallOutcome) -> Result<(), FfiError> {
        let written_to = self.paired_write_fd();
        let listened_on = self.source_fd();
        drop(self.paired_write);

        let mut data = Vec::new();
        let mut file = File::from(self.source);
        match self.count {
            Some(n) => (&mut file).take(n as u64).read_to_end(&mut data)?,
            None => file.read_to_end(&mut data)?,
        };
        self.mode.check(&data)?;
        log::debug!(
            "captured {} bytes from fd {} (written to fd {})",
            data.len(),
            listened_on,
            written_to
        );

        outcome.add_output(data, listened_on, written_to);
        Ok(())
    }
}

/// Write-before and listen-after requests attached to one call
#[derive(Debug, Default)]
pub struct Intercepts {
    writes: BTreeMap<RawFd, WriteRequest>,
    listens: BTreeMap<RawFd, ListenRequest>,
}

impl Intercepts {
    /// No interception
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a write-before request, keyed by its target descriptor
    pub fn write_before(mut self, request: WriteRequest) -> Self {
        self.writes.insert(request.target_fd(), request);
        self
    }

    /// Add a listen-after request, keyed by its source descriptor
    pub fn listen_after(mut self, request: ListenRequest) -> Self {
        self.listens.insert(request.source_fd(), request);
        self
    }

    /// Check whether no request is pending
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.listens.is_empty()
    }

    /// Number of pending write-before requests
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Number of pending listen-after requests
    pub fn pending_listens(&self) -> usize {
        self.listens.len()
    }

    /// Run `call` with every request applied around it.
    ///
    /// Each write request is consumed exactly once before the call; each
    /// listen request is consumed exactly once after it.
    pub fn run<F>(mut self, call: F) -> Result<CallOutcome, FfiError>
    where
        F: FnOnce() -> Result<NativeReturn, FfiError>,
    {
        while let Some((_, request)) = self.writes.pop_first() {
            request.stage()?;
        }

        let native = call()?;
        let mut outcome = CallOutcome::from_native(native);

        while let Some((_, request)) = self.listens.pop_first() {
            request.collect(&mut outcome)?;
        }
        Ok(outcome)
    }
}

/// Create a pipe, returning `(read_end, write_end)`.
///
/// Both ends are close-on-exec: a child spawned while a request is pending
/// must not keep a write end open and stall a read-to-EOF capture.
pub fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    Ok(pipe2(OFlag::O_CLOEXEC)?)
}

#[cfg(test)]
mod tests;
