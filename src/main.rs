//! libasm-tester - Native Library Test Harness
//!
//! Command-line entry point: builds the shared object, lists what it
//! exports and runs a differential check against the platform C library.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libasm_tester::ffi::free_native;
use libasm_tester::harness::compare::{compare, Observed, Projection, Verdict};
use libasm_tester::harness::libasm::registry;
use libasm_tester::{
    pipe, BindingMode, CBuffer, CallOutcome, FfiError, FfiValue, FunctionCategory, Intercepts,
    LibAsm, LibrarySource, LibraryBuilder, LinkStatus, ListenRequest, TesterConfig, WriteRequest,
};
use serde::Serialize;
use std::os::fd::AsRawFd;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "libasm-tester")]
#[command(version)]
#[command(about = "Test a libasm shared library against the platform libc", long_about = None)]
struct Cli {
    /// Configuration file (default: libasm-tester.toml in this or a parent directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run make and link the shared library
    Build {
        /// Path to the libasm repository
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Remove the shared library first so it is always relinked
        #[arg(long)]
        clean: bool,
    },

    /// List every operation and whether the library provides it
    Probe {
        /// Path to the libasm repository
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Probe the reference library instead
        #[arg(long)]
        reference: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Compare the mandatory functions against the reference library
    Check {
        /// Path to the libasm repository
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Build before checking
        #[arg(long)]
        build: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TesterConfig::load(path).context("Failed to load config")?,
        None => TesterConfig::load_from_cwd().context("Failed to load config")?,
    };

    match cli.command {
        Commands::Build { path, clean } => cmd_build(with_repo(config, path), clean),
        Commands::Probe {
            path,
            reference,
            json,
        } => cmd_probe(&with_repo(config, path), reference, json),
        Commands::Check { path, build } => {
            let config = with_repo(config, path);
            if build {
                cmd_build(config.clone(), false)?;
            }
            cmd_check(&config)
        }
    }
}

fn with_repo(mut config: TesterConfig, path: Option<PathBuf>) -> TesterConfig {
    if let Some(path) = path {
        config.build.repo = path;
    }
    config
}

fn open_subject(config: &TesterConfig) -> Result<LibAsm> {
    let path = config.subject_path();
    LibAsm::open(
        LibrarySource::Path(path.clone()),
        &config.library.prefix,
        BindingMode::Subject,
    )
    .with_context(|| format!("Failed to load {}", path.display()))
}

fn open_reference(config: &TesterConfig) -> Result<LibAsm> {
    LibAsm::open(
        LibrarySource::System(config.library.reference.clone()),
        &config.library.prefix,
        BindingMode::Reference,
    )
    .with_context(|| format!("Failed to load {}", config.library.reference))
}

fn cmd_build(config: TesterConfig, clean: bool) -> Result<()> {
    let builder = LibraryBuilder::new(config.build).context("Invalid repository path")?;
    if clean {
        builder.clean().context("Failed to remove shared library")?;
    }

    match builder.build().context("Build failed")? {
        LinkStatus::Linked => println!("Linked {}", builder.shared_lib().display()),
        LinkStatus::UpToDate => println!("{} is up to date", builder.shared_lib().display()),
    }
    Ok(())
}

#[derive(Serialize)]
struct ProbeEntry {
    operation: String,
    function: String,
    category: String,
    resolved: bool,
    signature: String,
}

fn cmd_probe(config: &TesterConfig, reference: bool, json: bool) -> Result<()> {
    let lib = if reference {
        open_reference(config)?
    } else {
        open_subject(config)?
    };

    let functions = registry().context("Invalid function table")?;
    let mut entries = Vec::new();
    for signature in functions.iter() {
        let operation = lib
            .exposed_name(&signature.name)
            .unwrap_or(&signature.name)
            .to_string();
        entries.push(ProbeEntry {
            resolved: lib.is_resolved(&operation),
            category: FunctionCategory::of(&signature.name)
                .map(|c| c.to_string())
                .unwrap_or_default(),
            function: signature.name.clone(),
            signature: signature.to_string(),
            operation,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{}", lib.library().path().display());
    for entry in &entries {
        println!(
            "  {:<20} {:<10} {:<16} {}",
            entry.operation,
            entry.category,
            if entry.resolved { "ok" } else { "not implemented" },
            entry.signature
        );
    }
    let resolved = entries.iter().filter(|e| e.resolved).count();
    println!("\n{}/{} operations resolved", resolved, entries.len());
    Ok(())
}

struct Report {
    total: usize,
    failed: usize,
}

impl Report {
    fn record(&mut self, label: &str, verdict: Verdict) {
        self.total += 1;
        if !verdict.is_match() {
            self.failed += 1;
        }
        println!("  {:<32} {}", label, verdict);
    }
}

fn cmd_check(config: &TesterConfig) -> Result<()> {
    let subject = open_subject(config)?;
    let reference = open_reference(config)?;
    let mut report = Report {
        total: 0,
        failed: 0,
    };

    println!("strlen");
    let cases: [&[u8]; 4] = [b"", b"foo", b"\x80\xff", &[b'*'; 4096]];
    for s in cases {
        let verdict = compare(&subject.strlen(s), &reference.strlen(s), Projection::Value);
        report.record(&label(s), verdict);
    }

    println!("strcmp");
    let pairs: [(&[u8], &[u8]); 6] = [
        (b"", b""),
        (b"", b"foo"),
        (b"foo", b"bar"),
        (b"bar", b"foo"),
        (b"\x80", b"\x7f"),
        (b"\x7f", b"\x80"),
    ];
    for (a, b) in pairs {
        let verdict = compare(&subject.strcmp(a, b), &reference.strcmp(a, b), Projection::Sign);
        report.record(&format!("{} vs {}", label(a), label(b)), verdict);
    }

    println!("strcpy");
    let cases: [&[u8]; 3] = [b"", b"foo", &[b'x'; 1024]];
    for s in cases {
        let (got, got_returned) = copied(&subject, s);
        let (expected, expected_returned) = copied(&reference, s);
        report.record(&label(s), Verdict::of(got, expected));
        report.record(
            &format!("{} returns dst", label(s)),
            Verdict::of(got_returned, expected_returned),
        );
    }

    println!("strdup");
    let cases: [&[u8]; 3] = [b"", b"foo", &[b'*'; 4096]];
    for s in cases {
        let got = subject.strdup(s);
        let expected = reference.strdup(s);
        report.record(&label(s), compare(&got, &expected, Projection::Text));
        release(&got);
        release(&expected);
    }

    println!("write");
    let cases: [&[u8]; 2] = [b"foo", b""];
    for s in cases {
        let got = written(&subject, s)?;
        let expected = written(&reference, s)?;
        report.record(&label(s), compare(&got, &expected, Projection::Value));
    }
    let got = subject.write(-1, FfiValue::bytes(b"foo"), 3, Intercepts::new());
    let expected = reference.write(-1, FfiValue::bytes(b"foo"), 3, Intercepts::new());
    report.record("bad descriptor", compare(&got, &expected, Projection::Value));

    println!("read");
    let cases: [(&[u8], usize); 3] = [(b"foobar", 3), (b"foo", 16), (b"", 4)];
    for (payload, count) in cases {
        let got = read_back(&subject, payload, count)?;
        let expected = read_back(&reference, payload, count)?;
        report.record(
            &format!("{} ({} bytes)", label(payload), count),
            compare(&got, &expected, Projection::Value),
        );
    }
    let mut buf = CBuffer::zeroed(4);
    let got = subject.read(-1, buf.as_arg(), 2, Intercepts::new());
    let expected = reference.read(-1, buf.as_arg(), 2, Intercepts::new());
    report.record("bad descriptor", compare(&got, &expected, Projection::Value));

    println!("\n{}/{} checks passed", report.total - report.failed, report.total);
    if report.failed > 0 {
        anyhow::bail!("{} checks failed", report.failed);
    }
    Ok(())
}

fn label(s: &[u8]) -> String {
    if s.len() > 16 {
        format!("{} bytes", s.len())
    } else {
        format!("{:?}", String::from_utf8_lossy(s))
    }
}

/// strcpy into a fresh buffer: the copied string, and the returned
/// pointer as an offset from the buffer (0 when strcpy returns `dst`)
fn copied(lib: &LibAsm, src: &[u8]) -> (Observed, Observed) {
    let mut dst = CBuffer::zeroed(src.len() + 1);
    match lib.strcpy(dst.as_arg(), src) {
        Ok(outcome) => {
            let returned = outcome.return_value().as_ptr().unwrap_or(0) as i64;
            let offset = returned.wrapping_sub(dst.addr() as i64);
            let copy = CallOutcome::new(FfiValue::bytes(dst.value()));
            (
                Observed::returned(&copy, Projection::Text),
                Observed::returned(&CallOutcome::new(FfiValue::Int(offset)), Projection::Value),
            )
        }
        Err(e) => (Observed::failed(&e), Observed::failed(&e)),
    }
}

fn release(result: &Result<CallOutcome, FfiError>) {
    if let Ok(outcome) = result {
        if let FfiValue::Pointer(addr) = outcome.return_value() {
            // Safety: strdup results come from malloc and are freed once.
            unsafe { free_native(*addr) };
        }
    }
}

/// write into a pipe, capturing what came out of it
fn written(lib: &LibAsm, payload: &[u8]) -> Result<Result<CallOutcome, FfiError>> {
    let (r, w) = pipe().context("Failed to create pipe")?;
    let fd = w.as_raw_fd();
    let intercepts = Intercepts::new().listen_after(ListenRequest::new(r, w));
    Ok(lib.write(fd, FfiValue::bytes(payload), payload.len(), intercepts))
}

/// read from a pipe preloaded with `payload`; the outcome carries the
/// return value and the bytes read
fn read_back(lib: &LibAsm, payload: &[u8], count: usize) -> Result<Result<CallOutcome, FfiError>> {
    let (r, w) = pipe().context("Failed to create pipe")?;
    let fd = r.as_raw_fd();
    let intercepts = Intercepts::new().write_before(WriteRequest::new(w, payload).paired_with(fd));
    let mut buf = CBuffer::zeroed(count + 1);
    let result = lib.read(fd, buf.as_arg(), count, intercepts);
    drop(r);

    Ok(result.map(|outcome| {
        let mut seen = CallOutcome::new(outcome.into_value());
        seen.add_output(buf.value().to_vec(), fd, fd);
        seen
    }))
}
