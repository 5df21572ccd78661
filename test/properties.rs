//! Property Tests against the platform C library
//!
//! The reference operations must satisfy the properties every libasm build
//! is held to: copies are identical, comparison follows byte order and
//! lengths are exact.

#![cfg(target_os = "linux")]

use std::os::fd::AsRawFd;

use libasm_tester::{pipe, CBuffer, Intercepts, LibAsm, WriteRequest};
use proptest::prelude::*;

fn libc() -> LibAsm {
    LibAsm::reference().expect("libc.so.6 should load")
}

/// Byte strings without an interior NUL
fn c_string(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(1u8..=255, 0..max)
}

proptest! {
    #[test]
    fn strcpy_round_trip(s in c_string(512)) {
        let libc = libc();
        let mut dst = CBuffer::zeroed(s.len() + 1);
        libc.strcpy(dst.as_arg(), &s).unwrap();
        prop_assert_eq!(dst.value(), &s[..]);
        prop_assert_eq!(dst.raw()[s.len()], 0);
    }

    #[test]
    fn strcmp_follows_byte_order(a in c_string(64), b in c_string(64)) {
        let libc = libc();
        let got = libc.strcmp(&a, &b).unwrap().return_value().as_i64().unwrap();
        prop_assert_eq!(got.cmp(&0), a.cmp(&b));
    }

    #[test]
    fn strcmp_shared_prefix(prefix in c_string(64), x in 1u8..=255, y in 1u8..=255) {
        let libc = libc();
        let mut a = prefix.clone();
        a.push(x);
        let mut b = prefix;
        b.push(y);
        let got = libc.strcmp(&a, &b).unwrap().return_value().as_i64().unwrap();
        prop_assert_eq!(got.cmp(&0), x.cmp(&y));
    }

    #[test]
    fn strlen_is_exact(s in c_string(4096)) {
        let libc = libc();
        prop_assert_eq!(libc.strlen(&s).unwrap(), s.len());
    }

    #[test]
    fn staged_read_returns_min(
        payload in prop::collection::vec(any::<u8>(), 0..2048),
        count in 0usize..4096,
    ) {
        let libc = libc();
        let (r, w) = pipe().unwrap();
        let fd = r.as_raw_fd();
        let request = WriteRequest::new(w, payload.clone()).paired_with(fd);
        let intercepts = Intercepts::new().write_before(request);

        let mut buf = CBuffer::zeroed(count + 1);
        let outcome = libc.read(fd, buf.as_arg(), count, intercepts).unwrap();

        let expected = count.min(payload.len());
        prop_assert_eq!(outcome.return_value().as_i64(), Some(expected as i64));
        prop_assert_eq!(&buf.raw()[..expected], &payload[..expected]);
    }
}
