//! A small libasm written in C, compiled into a shared object per test
//! directory with the host C compiler (`$CC`, or `cc`).

#![allow(dead_code)]

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// C source of the fixture library
pub const SOURCE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/test/fixtures/libasm.c");

/// Compile the fixture into `<dir>/libasm.so`, with extra `-D` defines
pub fn build_libasm(dir: &Path, defines: &[&str]) -> PathBuf {
    let out = dir.join("libasm.so");
    let cc = env::var("CC").unwrap_or_else(|_| "cc".to_string());
    let status = Command::new(&cc)
        .args(["-shared", "-fPIC", "-O1", "-Wall", "-o"])
        .arg(&out)
        .args(defines.iter().map(|d| format!("-D{}", d)))
        .arg(SOURCE)
        .status()
        .expect("Failed to run the C compiler");
    assert!(status.success(), "{} failed to build {}", cc, SOURCE);
    out
}

/// The fixture built as-is
pub fn libasm(dir: &Path) -> PathBuf {
    build_libasm(dir, &[])
}

/// The fixture with an off-by-one `ft_strlen`
pub fn broken_strlen(dir: &Path) -> PathBuf {
    build_libasm(dir, &["BROKEN_STRLEN"])
}
