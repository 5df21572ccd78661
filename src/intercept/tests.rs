//! Interception pipeline tests
//!
//! The native call is simulated by closures that read from or write to the
//! same descriptors a real `read`/`write` would use.

use std::cell::Cell;
use std::fs::File;
use std::io::Read;
use std::os::fd::AsRawFd;

use super::*;
use crate::ffi::FfiValue;
use crate::harness::CapturedOutput;

fn returning(value: i64) -> Result<NativeReturn, FfiError> {
    Ok(NativeReturn {
        value: FfiValue::Int(value),
        errno: None,
    })
}

fn raw_write(fd: RawFd, data: &[u8]) -> isize {
    unsafe { libc::write(fd, data.as_ptr() as *const libc::c_void, data.len()) }
}

fn raw_read(fd: RawFd, count: usize) -> Vec<u8> {
    let mut buf = vec![0u8; count];
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, count) };
    buf.truncate(n.max(0) as usize);
    buf
}

#[test]
fn test_no_intercepts_wraps_return_value() {
    let outcome = Intercepts::new().run(|| returning(3)).unwrap();
    assert_eq!(outcome.return_value(), &FfiValue::Int(3));
    assert!(outcome.outputs().is_empty());
    assert_eq!(outcome.errno(), None);
}

#[test]
fn test_write_before_is_staged_before_call() {
    let (r, w) = pipe().unwrap();
    let r_fd = r.as_raw_fd();
    let intercepts =
        Intercepts::new().write_before(WriteRequest::new(w, b"foo".to_vec()).paired_with(r_fd));

    let seen = Cell::new(Vec::new());
    let outcome = intercepts
        .run(|| {
            let data = raw_read(r_fd, 16);
            let n = data.len() as i64;
            seen.set(data);
            returning(n)
        })
        .unwrap();

    assert_eq!(seen.take(), b"foo");
    assert_eq!(outcome, 3i64);

    // The write end was closed after staging
    let mut rest = Vec::new();
    File::from(r).read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());
}

#[test]
fn test_write_before_count_prefix() {
    let (r, w) = pipe().unwrap();
    let request = WriteRequest::new(w, b"foobar".to_vec()).count(3);
    let intercepts = Intercepts::new().write_before(request);
    intercepts.run(|| returning(0)).unwrap();

    let mut staged = Vec::new();
    File::from(r).read_to_end(&mut staged).unwrap();
    assert_eq!(staged, b"foo");

    // A count past the payload writes the whole payload
    let (r, w) = pipe().unwrap();
    let request = WriteRequest::new(w, b"foo".to_vec()).count(10);
    let intercepts = Intercepts::new().write_before(request);
    intercepts.run(|| returning(0)).unwrap();

    let mut staged = Vec::new();
    File::from(r).read_to_end(&mut staged).unwrap();
    assert_eq!(staged, b"foo");
}

#[test]
fn test_listen_after_captures_call_output() {
    let (r, w) = pipe().unwrap();
    let (r_fd, w_fd) = (r.as_raw_fd(), w.as_raw_fd());
    let intercepts = Intercepts::new().listen_after(ListenRequest::new(r, w).count(3));

    let outcome = intercepts
        .run(|| returning(raw_write(w_fd, b"foo") as i64))
        .unwrap();

    assert_eq!(outcome.return_value(), &FfiValue::Int(3));
    assert_eq!(
        outcome.output(w_fd),
        Some(&CapturedOutput {
            bytes: b"foo".to_vec(),
            listened_on: r_fd,
        })
    );
}

#[test]
fn test_listen_after_reads_to_eof_without_count() {
    let (r, w) = pipe().unwrap();
    let w_fd = w.as_raw_fd();
    let intercepts = Intercepts::new().listen_after(ListenRequest::new(r, w));

    let outcome = intercepts
        .run(|| {
            raw_write(w_fd, b"foo");
            raw_write(w_fd, b"bar");
            returning(0)
        })
        .unwrap();

    assert_eq!(outcome.output(w_fd).unwrap().bytes, b"foobar");
}

#[test]
fn test_listen_count_limits_capture() {
    let (r, w) = pipe().unwrap();
    let w_fd = w.as_raw_fd();
    let intercepts = Intercepts::new().listen_after(ListenRequest::new(r, w).count(2));

    let outcome = intercepts
        .run(|| returning(raw_write(w_fd, b"foo") as i64))
        .unwrap();

    assert_eq!(outcome.output(w_fd).unwrap().bytes, b"fo");
}

#[test]
fn test_every_request_consumed_once() {
    let (r1, w1) = pipe().unwrap();
    let (r2, w2) = pipe().unwrap();
    let (r3, w3) = pipe().unwrap();
    let (r4, w4) = pipe().unwrap();
    let (r1_fd, r2_fd) = (r1.as_raw_fd(), r2.as_raw_fd());
    let (w3_fd, w4_fd) = (w3.as_raw_fd(), w4.as_raw_fd());

    let intercepts = Intercepts::new()
        .write_before(WriteRequest::new(w1, b"one".to_vec()))
        .write_before(WriteRequest::new(w2, b"two".to_vec()))
        .listen_after(ListenRequest::new(r3, w3))
        .listen_after(ListenRequest::new(r4, w4));
    assert_eq!(intercepts.pending_writes(), 2);
    assert_eq!(intercepts.pending_listens(), 2);
    assert!(!intercepts.is_empty());

    let calls = Cell::new(0);
    let outcome = intercepts
        .run(|| {
            calls.set(calls.get() + 1);
            // Both writes are already staged
            let a = raw_read(r1_fd, 8);
            let b = raw_read(r2_fd, 8);
            raw_write(w3_fd, &a);
            raw_write(w4_fd, &b);
            returning(0)
        })
        .unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(outcome.outputs().len(), 2);
    assert_eq!(outcome.output(w3_fd).unwrap().bytes, b"one");
    assert_eq!(outcome.output(w4_fd).unwrap().bytes, b"two");
    drop((r1, r2));
}

#[test]
fn test_call_failure_releases_listen_descriptors() {
    // The request owns the writer of pipe B; the test keeps B's reader.
    let (r_a, _w_a) = pipe().unwrap();
    let (r_b, w_b) = pipe().unwrap();

    let intercepts = Intercepts::new().listen_after(ListenRequest::new(r_a, w_b));
    let err = intercepts
        .run(|| Err(FfiError::NotImplemented("ft_write".to_string())))
        .unwrap_err();
    assert!(err.is_not_implemented());

    // EOF right away: the only writer was closed on the error path
    let mut rest = Vec::new();
    File::from(r_b).read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());
}

#[test]
fn test_text_mode_rejects_non_ascii_before_call() {
    let (r, w) = pipe().unwrap();
    let intercepts =
        Intercepts::new().write_before(WriteRequest::new(w, vec![0x80u8]).mode(FdMode::Text));

    let called = Cell::new(false);
    let err = intercepts
        .run(|| {
            called.set(true);
            returning(0)
        })
        .unwrap_err();

    assert!(!called.get());
    assert!(matches!(&err, FfiError::Os(e) if e.kind() == io::ErrorKind::InvalidData));

    // The target descriptor was still closed
    let mut rest = Vec::new();
    File::from(r).read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());
}

#[test]
fn test_text_mode_accepts_ascii() {
    let (r, w) = pipe().unwrap();
    let w_fd = w.as_raw_fd();
    let intercepts = Intercepts::new().listen_after(ListenRequest::new(r, w).mode(FdMode::Text));

    let outcome = intercepts
        .run(|| returning(raw_write(w_fd, b"plain") as i64))
        .unwrap();
    assert_eq!(outcome.output(w_fd).unwrap().bytes, b"plain");
}

#[test]
fn test_pipe_ends_are_close_on_exec() {
    let (r, w) = pipe().unwrap();
    for fd in [r.as_raw_fd(), w.as_raw_fd()] {
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        assert!(flags >= 0);
        assert_ne!(flags & libc::FD_CLOEXEC, 0, "fd {} leaks into children", fd);
    }
}
